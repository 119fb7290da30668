pub mod bands;
pub mod ingestion;
pub mod processing;
pub mod records;

pub use bands::PriceBand;
pub use ingestion::{load_listings, load_rentals, open_source, Ingested, ListingOptions, UnitLocator};
pub use processing::{aggregate_listings, index_rentals, zero_fill, UnitKey};
pub use records::{BedroomCategory, ListingAggregate, RentalStat, UnitId};
