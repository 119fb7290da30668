use super::records::BedroomCategory;
use serde::{Serialize, Serializer};
use std::fmt;

/// Weekly rent bands used by the census rental statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PriceBand {
    Under100,
    From100To149,
    From150To199,
    From200To299,
    From300To399,
    From400To499,
    From500To599,
    From600,
}

impl PriceBand {
    pub const ALL: [PriceBand; 8] = [
        PriceBand::Under100,
        PriceBand::From100To149,
        PriceBand::From150To199,
        PriceBand::From200To299,
        PriceBand::From300To399,
        PriceBand::From400To499,
        PriceBand::From500To599,
        PriceBand::From600,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PriceBand::Under100 => "Under $100",
            PriceBand::From100To149 => "$100 - $149",
            PriceBand::From150To199 => "$150 - $199",
            PriceBand::From200To299 => "$200 - $299",
            PriceBand::From300To399 => "$300 - $399",
            PriceBand::From400To499 => "$400 - $499",
            PriceBand::From500To599 => "$500 - $599",
            PriceBand::From600 => "$600 and over",
        }
    }

    /// Representative weekly price, used when comparing against listings.
    pub fn representative_price(self) -> f64 {
        match self {
            PriceBand::Under100 => 49.5,
            PriceBand::From100To149 => 124.5,
            PriceBand::From150To199 => 174.5,
            PriceBand::From200To299 => 249.5,
            PriceBand::From300To399 => 349.5,
            PriceBand::From400To499 => 449.5,
            PriceBand::From500To599 => 549.5,
            PriceBand::From600 => 800.0,
        }
    }

    /// Matches a band label, ignoring case and runs of whitespace.
    ///
    /// The census export spells one band "$500  - $599" and sometimes
    /// shortens "Under $100" to "$100"; both are accepted. A label carrying a
    /// bedroom prefix ("2 bedrooms: $100 - $149") is not a band on its own,
    /// see [`RentalHeader::parse`].
    pub fn from_label(raw: &str) -> Option<Self> {
        let normalized = collapse_whitespace(raw).to_ascii_lowercase();
        Self::ALL.into_iter().find(|band| {
            let label = band.label().to_ascii_lowercase();
            normalized == label || (*band == PriceBand::Under100 && normalized == "$100")
        })
    }
}

/// What a column of a rental statistics table counts, read from its header.
///
/// NZ.Stat exports name their columns `<bedroom category>: <measure>`, e.g.
/// `1 bedroom: Under $100` or
/// `Total households stated - number of bedrooms: Total households stated`.
/// Tables already split by bedroom category use bare band labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentalHeader {
    /// Households renting in `band`, for one bedroom category when the header
    /// names one.
    Band {
        bedrooms: Option<BedroomCategory>,
        band: PriceBand,
    },
    /// Households stated for one bedroom category.
    Households(BedroomCategory),
}

impl RentalHeader {
    /// Classifies a header, returning `None` for columns that are neither a
    /// band nor a household total (unit ids, counts, prices).
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = collapse_whitespace(raw);
        match normalized.split_once(": ") {
            Some((prefix, measure)) => {
                let bedrooms = BedroomCategory::parse(prefix)?;
                if measure.to_ascii_lowercase().starts_with("total households stated") {
                    return Some(RentalHeader::Households(bedrooms));
                }
                PriceBand::from_label(measure).map(|band| RentalHeader::Band {
                    bedrooms: Some(bedrooms),
                    band,
                })
            }
            None => PriceBand::from_label(&normalized).map(|band| RentalHeader::Band { bedrooms: None, band }),
        }
    }
}

impl fmt::Display for PriceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for PriceBand {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Finds the band holding the median household from per-band counts.
///
/// Bands are walked in order until the running total reaches half of the
/// overall count. Returns `None` when no households were counted.
pub fn weighted_median_band(counts: &[(PriceBand, u64)]) -> Option<PriceBand> {
    let total: u64 = counts.iter().map(|(_, count)| count).sum();
    if total == 0 {
        return None;
    }

    let half = total as f64 * 0.5;
    let mut cumulative = 0u64;
    for (band, count) in counts {
        cumulative += count;
        if cumulative > 0 && cumulative as f64 >= half {
            return Some(*band);
        }
    }
    counts.last().map(|(band, _)| *band)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_matching_is_lenient() {
        assert_eq!(PriceBand::from_label("$500  - $599"), Some(PriceBand::From500To599));
        assert_eq!(PriceBand::from_label("under $100"), Some(PriceBand::Under100));
        assert_eq!(PriceBand::from_label("$100"), Some(PriceBand::Under100));
        assert_eq!(PriceBand::from_label("2 bedrooms: $100 - $149"), None);
        assert_eq!(PriceBand::from_label("$600 and over"), Some(PriceBand::From600));
        assert_eq!(PriceBand::from_label("Total households stated"), None);
    }

    #[test]
    fn test_headers_keep_their_bedroom_category() {
        assert_eq!(
            RentalHeader::parse("2 bedrooms: $100 - $149"),
            Some(RentalHeader::Band {
                bedrooms: Some(BedroomCategory::Two),
                band: PriceBand::From100To149,
            })
        );
        assert_eq!(
            RentalHeader::parse("Total households stated - number of bedrooms: $500  - $599"),
            Some(RentalHeader::Band {
                bedrooms: Some(BedroomCategory::Total),
                band: PriceBand::From500To599,
            })
        );
        assert_eq!(
            RentalHeader::parse("8 or more bedrooms: Total households stated"),
            Some(RentalHeader::Households(BedroomCategory::EightOrMore))
        );
        assert_eq!(
            RentalHeader::parse("$600 and over"),
            Some(RentalHeader::Band {
                bedrooms: None,
                band: PriceBand::From600,
            })
        );
        assert_eq!(RentalHeader::parse("count"), None);
        assert_eq!(RentalHeader::parse("Area: Under $100"), None);
    }

    #[test]
    fn test_median_on_exact_half_takes_lower_band() {
        let counts = [(PriceBand::Under100, 5), (PriceBand::From100To149, 5)];
        assert_eq!(weighted_median_band(&counts), Some(PriceBand::Under100));
    }

    #[test]
    fn test_weighted_median_band() {
        let counts = [
            (PriceBand::Under100, 3),
            (PriceBand::From100To149, 6),
            (PriceBand::From150To199, 12),
            (PriceBand::From200To299, 9),
        ];
        // total 30, half 15: cumulative 3, 9, 21
        assert_eq!(weighted_median_band(&counts), Some(PriceBand::From150To199));
    }

    #[test]
    fn test_weighted_median_skips_leading_empty_bands() {
        let counts = [
            (PriceBand::Under100, 0),
            (PriceBand::From100To149, 0),
            (PriceBand::From150To199, 1),
        ];
        assert_eq!(weighted_median_band(&counts), Some(PriceBand::From150To199));
    }

    #[test]
    fn test_no_households_means_no_band() {
        let counts = [(PriceBand::Under100, 0), (PriceBand::From600, 0)];
        assert_eq!(weighted_median_band(&counts), None);
        assert_eq!(weighted_median_band(&[]), None);
    }

    #[test]
    fn test_representative_prices_increase() {
        let prices: Vec<f64> = PriceBand::ALL.iter().map(|b| b.representative_price()).collect();
        assert!(prices.windows(2).all(|w| w[0] < w[1]));
    }
}
