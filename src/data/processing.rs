use super::records::{BedroomCategory, ListingAggregate, ListingRow, RentalStat, UnitId};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Join key shared by both datasets.
pub type UnitKey = (UnitId, BedroomCategory);

/// Standard median: the middle value, or the mean of the two middle values
/// for an even number of values. Returns `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;

    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Groups listings by unit and bedroom category.
///
/// Every listing counts towards its unit's `total` group as well as its own
/// category; studios only appear in the total. Output is ordered by unit and
/// then bedroom display order.
///
/// # Arguments
/// * `rows`: Located listings with prices already in the rental period
///
/// # Returns
/// One aggregate per non-empty group, holding the listing count and the
/// median price
pub fn aggregate_listings(rows: &[ListingRow]) -> Vec<ListingAggregate> {
    let mut groups: BTreeMap<UnitKey, Vec<f64>> = BTreeMap::new();

    for row in rows {
        if let Some(category) = row.bedrooms {
            groups
                .entry((row.unit.clone(), category))
                .or_default()
                .push(row.price);
        }
        groups
            .entry((row.unit.clone(), BedroomCategory::Total))
            .or_default()
            .push(row.price);
    }

    let aggregates: Vec<ListingAggregate> = groups
        .into_iter()
        .filter_map(|((unit, bedrooms), prices)| {
            median(&prices).map(|median_price| ListingAggregate {
                unit,
                bedrooms,
                count: prices.len() as u64,
                median_price,
            })
        })
        .collect();

    debug!(groups = aggregates.len(), "aggregated listings");
    aggregates
}

/// Keys rental statistics by unit and bedroom category. When a key repeats
/// the later row wins.
pub fn index_rentals(stats: Vec<RentalStat>) -> BTreeMap<UnitKey, RentalStat> {
    let mut indexed = BTreeMap::new();
    for stat in stats {
        let key = (stat.unit.clone(), stat.bedrooms);
        if let Some(previous) = indexed.insert(key, stat) {
            warn!(
                unit = %previous.unit,
                bedrooms = %previous.bedrooms,
                "duplicate rental statistics row, keeping the later one"
            );
        }
    }
    indexed
}

/// Adds a zero listing aggregate for every rental key with no listings, so
/// that units without any short-term listings still reach the comparison.
///
/// # Arguments
/// * `aggregates`: Listing aggregates, extended and re-sorted in place
/// * `rentals`: Indexed rental statistics
///
/// # Returns
/// How many aggregates were added
pub fn zero_fill(
    aggregates: &mut Vec<ListingAggregate>,
    rentals: &BTreeMap<UnitKey, RentalStat>,
) -> usize {
    let present: HashSet<UnitKey> = aggregates
        .iter()
        .map(|a| (a.unit.clone(), a.bedrooms))
        .collect();

    let before = aggregates.len();
    aggregates.extend(
        rentals
            .keys()
            .filter(|key| !present.contains(*key))
            .map(|(unit, bedrooms)| ListingAggregate {
                unit: unit.clone(),
                bedrooms: *bedrooms,
                count: 0,
                median_price: 0.0,
            }),
    );
    aggregates.sort_by(|a, b| (&a.unit, a.bedrooms).cmp(&(&b.unit, b.bedrooms)));

    let added = aggregates.len() - before;
    debug!(added, "zero-filled listing aggregates");
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(unit: &str, bedrooms: u32, price: f64) -> ListingRow {
        ListingRow {
            unit: UnitId::from(unit),
            bedrooms: BedroomCategory::from_count(bedrooms),
            price,
        }
    }

    fn rental(unit: &str, bedrooms: BedroomCategory, count: u64) -> RentalStat {
        RentalStat {
            unit: UnitId::from(unit),
            bedrooms,
            count,
            median_price: 100.0,
            price_band: None,
        }
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[10.0, 20.0, 30.0, 40.0]), Some(25.0));
        assert_eq!(median(&[200.0, 100.0, 150.0]), Some(150.0));
        assert_eq!(median(&[7.0]), Some(7.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_median_price_per_unit() {
        let rows = vec![
            listing("A", 1, 40.0),
            listing("A", 1, 10.0),
            listing("A", 1, 30.0),
            listing("A", 1, 20.0),
        ];
        let aggregates = aggregate_listings(&rows);
        let total = aggregates
            .iter()
            .find(|a| a.bedrooms == BedroomCategory::Total)
            .unwrap();
        assert_eq!(total.count, 4);
        assert_eq!(total.median_price, 25.0);
    }

    #[test]
    fn test_groups_by_bedrooms_and_total() {
        let rows = vec![
            listing("B", 2, 100.0),
            listing("A", 0, 80.0),
            listing("A", 2, 120.0),
            listing("A", 3, 300.0),
        ];
        let aggregates = aggregate_listings(&rows);
        let keys: Vec<(String, &str, u64)> = aggregates
            .iter()
            .map(|a| (a.unit.to_string(), a.bedrooms.label(), a.count))
            .collect();

        assert_eq!(
            keys,
            vec![
                ("A".to_string(), "2", 1),
                ("A".to_string(), "3", 1),
                ("A".to_string(), "total", 3),
                ("B".to_string(), "2", 1),
                ("B".to_string(), "total", 1),
            ]
        );
    }

    #[test]
    fn test_zero_fill_adds_missing_rental_keys() {
        let mut aggregates = aggregate_listings(&[listing("A", 1, 50.0)]);
        let rentals = index_rentals(vec![
            rental("A", BedroomCategory::Total, 3),
            rental("C", BedroomCategory::Total, 2),
            rental("C", BedroomCategory::Two, 1),
        ]);

        let added = zero_fill(&mut aggregates, &rentals);

        assert_eq!(added, 2);
        let c_total = aggregates
            .iter()
            .find(|a| a.unit.as_str() == "C" && a.bedrooms == BedroomCategory::Total)
            .unwrap();
        assert_eq!(c_total.count, 0);
        assert_eq!(c_total.median_price, 0.0);
    }

    #[test]
    fn test_duplicate_rentals_keep_last() {
        let rentals = index_rentals(vec![
            rental("A", BedroomCategory::Total, 3),
            rental("A", BedroomCategory::Total, 9),
        ]);
        assert_eq!(rentals.len(), 1);
        assert_eq!(rentals.values().next().unwrap().count, 9);
    }
}
