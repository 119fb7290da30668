use super::ratio::favorability_ratio;
use crate::data::{BedroomCategory, ListingAggregate, PriceBand, RentalStat, UnitId, UnitKey};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

/// Both favorability ratios for one unit and bedroom category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatioRecord {
    pub count_ratio: f64,
    pub price_ratio: f64,
}

impl RatioRecord {
    /// Count and price ratios of one listing aggregate against the rental
    /// statistics for the same key.
    pub fn compute(listing: &ListingAggregate, rental: &RentalStat) -> Self {
        Self {
            count_ratio: favorability_ratio(listing.count as f64, rental.count as f64),
            price_ratio: favorability_ratio(listing.median_price, rental.median_price),
        }
    }
}

/// One row of the table handed to the renderer: raw values from both sides
/// plus the derived ratios.
///
/// # Fields
/// * `unit`, `bedrooms`: The join key
/// * `rental_count`, `listing_count`: Households renting and listings
/// * `rental_price`, `listing_price`: Median weekly prices (0 means no data)
/// * `rental_price_band`: Band behind `rental_price`, when known
/// * `count_ratio`, `price_ratio`: Signed favorability ratios; positive
///   favours rentals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub unit: UnitId,
    pub bedrooms: BedroomCategory,
    pub rental_count: u64,
    pub listing_count: u64,
    pub rental_price: f64,
    pub rental_price_band: Option<PriceBand>,
    pub listing_price: f64,
    pub count_ratio: f64,
    pub price_ratio: f64,
}

/// Result of joining listing aggregates with rental statistics.
#[derive(Debug, Clone, Default)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
    /// Keys with listings but no rental statistics.
    pub unmatched_listings: Vec<UnitKey>,
    /// Keys with rental statistics but no listings.
    pub unmatched_rentals: Vec<UnitKey>,
}

impl ComparisonTable {
    /// Rows for one bedroom category, in unit order.
    pub fn frame(&self, bedrooms: BedroomCategory) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(move |row| row.bedrooms == bedrooms)
    }

    /// Bedroom categories that have at least one row, in display order.
    pub fn categories(&self) -> Vec<BedroomCategory> {
        let mut categories: Vec<BedroomCategory> = self.rows.iter().map(|row| row.bedrooms).collect();
        categories.sort();
        categories.dedup();
        categories
    }
}

/// Inner join on unit and bedroom category.
///
/// A key present on only one side is left out of `rows` and recorded as
/// unmatched; it never produces a ratio.
///
/// # Arguments
/// * `listings`: Listing aggregates, possibly zero-filled
/// * `rentals`: Rental statistics keyed by unit and bedroom category
///
/// # Returns
/// The matched rows, sorted by unit and bedroom display order, and the
/// unmatched keys from each side
pub fn merge(listings: &[ListingAggregate], rentals: &BTreeMap<UnitKey, RentalStat>) -> ComparisonTable {
    let mut table = ComparisonTable::default();
    let mut listing_keys = HashSet::with_capacity(listings.len());

    for listing in listings {
        let key = (listing.unit.clone(), listing.bedrooms);
        match rentals.get(&key) {
            Some(rental) => {
                let ratios = RatioRecord::compute(listing, rental);
                table.rows.push(ComparisonRow {
                    unit: listing.unit.clone(),
                    bedrooms: listing.bedrooms,
                    rental_count: rental.count,
                    listing_count: listing.count,
                    rental_price: rental.median_price,
                    rental_price_band: rental.price_band,
                    listing_price: listing.median_price,
                    count_ratio: ratios.count_ratio,
                    price_ratio: ratios.price_ratio,
                });
            }
            None => {
                debug!(unit = %listing.unit, bedrooms = %listing.bedrooms, "no rental statistics for listings");
                table.unmatched_listings.push(key.clone());
            }
        }
        listing_keys.insert(key);
    }

    table.unmatched_rentals = rentals
        .keys()
        .filter(|key| !listing_keys.contains(*key))
        .cloned()
        .collect();

    table
        .rows
        .sort_by(|a, b| (&a.unit, a.bedrooms).cmp(&(&b.unit, b.bedrooms)));

    info!(
        matched = table.rows.len(),
        unmatched_listings = table.unmatched_listings.len(),
        unmatched_rentals = table.unmatched_rentals.len(),
        "joined listings with rental statistics"
    );
    table
}
