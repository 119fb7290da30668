pub mod merge;
pub mod ratio;

pub use merge::{merge, ComparisonRow, ComparisonTable};
