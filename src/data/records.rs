use super::bands::PriceBand;
use serde::{Serialize, Serializer};
use std::fmt;

/// Identifier of a geographic unit (e.g. an SA2 area); the join key between
/// the listing and rental datasets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Wraps a raw id, trimming surrounding whitespace.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Bedroom breakdown shared by both datasets. Declaration order is the
/// display order: 1..7, "8 or more", then the all-bedrooms total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BedroomCategory {
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    EightOrMore,
    Total,
}

impl BedroomCategory {
    /// Label used in tab names, hover text and the comparison CSV.
    pub fn label(self) -> &'static str {
        match self {
            BedroomCategory::One => "1",
            BedroomCategory::Two => "2",
            BedroomCategory::Three => "3",
            BedroomCategory::Four => "4",
            BedroomCategory::Five => "5",
            BedroomCategory::Six => "6",
            BedroomCategory::Seven => "7",
            BedroomCategory::EightOrMore => "8 or more",
            BedroomCategory::Total => "total",
        }
    }

    /// Category for a listing with `bedrooms` bedrooms. Studios (0) have no
    /// category of their own and only count towards the total.
    pub fn from_count(bedrooms: u32) -> Option<Self> {
        match bedrooms {
            0 => None,
            1 => Some(BedroomCategory::One),
            2 => Some(BedroomCategory::Two),
            3 => Some(BedroomCategory::Three),
            4 => Some(BedroomCategory::Four),
            5 => Some(BedroomCategory::Five),
            6 => Some(BedroomCategory::Six),
            7 => Some(BedroomCategory::Seven),
            _ => Some(BedroomCategory::EightOrMore),
        }
    }

    /// Parses labels as they appear in either dataset: "2", "2.0",
    /// "2 bedrooms", "8 or more bedrooms", "total",
    /// "Total households stated - number of bedrooms".
    pub fn parse(raw: &str) -> Option<Self> {
        let lower = raw.trim().to_ascii_lowercase();
        if lower.starts_with("total") {
            return Some(BedroomCategory::Total);
        }
        if lower.starts_with("8 or more") {
            return Some(BedroomCategory::EightOrMore);
        }
        let number = lower.split_whitespace().next()?;
        let bedrooms = number.parse::<f64>().ok()?;
        if !(bedrooms.is_finite() && bedrooms >= 0.0) {
            return None;
        }
        Self::from_count(bedrooms.round() as u32)
    }
}

impl fmt::Display for BedroomCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for BedroomCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// One short-term listing after parsing and locating.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRow {
    pub unit: UnitId,
    /// `None` for studios, which only count towards the total.
    pub bedrooms: Option<BedroomCategory>,
    /// Price per rental period (weekly after the multiplier is applied).
    pub price: f64,
}

/// Listings grouped per unit and bedroom category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingAggregate {
    pub unit: UnitId,
    pub bedrooms: BedroomCategory,
    pub count: u64,
    pub median_price: f64,
}

/// Pre-aggregated rental statistics for a unit and bedroom category.
///
/// # Fields
/// * `unit`: Geographic unit
/// * `bedrooms`: Bedroom category, `Total` when the input has no breakdown
/// * `count`: Households renting; suppressed cells read as 0
/// * `median_price`: Median weekly rent, or the representative price of
///   `price_band`; 0 when unknown
/// * `price_band`: Band holding the median, when the input reports bands
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RentalStat {
    pub unit: UnitId,
    pub bedrooms: BedroomCategory,
    pub count: u64,
    pub median_price: f64,
    pub price_band: Option<PriceBand>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bedroom_parsing() {
        assert_eq!(BedroomCategory::parse("2"), Some(BedroomCategory::Two));
        assert_eq!(BedroomCategory::parse("3.0"), Some(BedroomCategory::Three));
        assert_eq!(BedroomCategory::parse("1 bedroom"), Some(BedroomCategory::One));
        assert_eq!(BedroomCategory::parse("12"), Some(BedroomCategory::EightOrMore));
        assert_eq!(
            BedroomCategory::parse("8 or more bedrooms"),
            Some(BedroomCategory::EightOrMore)
        );
        assert_eq!(
            BedroomCategory::parse("Total households stated - number of bedrooms"),
            Some(BedroomCategory::Total)
        );
        assert_eq!(BedroomCategory::parse("0"), None);
        assert_eq!(BedroomCategory::parse("many"), None);
    }

    #[test]
    fn test_display_order() {
        let mut shuffled = vec![
            BedroomCategory::Total,
            BedroomCategory::EightOrMore,
            BedroomCategory::One,
            BedroomCategory::Three,
        ];
        shuffled.sort();
        let labels: Vec<&str> = shuffled.iter().map(|c| c.label()).collect();
        assert_eq!(labels, vec!["1", "3", "8 or more", "total"]);
    }

    #[test]
    fn test_unit_ids_are_trimmed() {
        assert_eq!(UnitId::new("  Ponsonby East "), UnitId::from("Ponsonby East"));
    }
}
