use crate::analysis::{merge, ComparisonTable};
use crate::config::Config;
use crate::data::{
    aggregate_listings, index_rentals, load_listings, load_rentals, open_source, zero_fill, Ingested,
    ListingOptions, UnitLocator,
};
use crate::error::RowIssue;
use crate::geography::Boundaries;
use crate::render::{self, MapKind, MapRenderer};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::File;
use std::path::PathBuf;
use tracing::{info, warn};

/// What happened to one input dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetSummary {
    pub source: String,
    pub rows_read: usize,
    pub rows_used: usize,
    pub rows_filtered: usize,
    pub issues: Vec<RowIssue>,
}

impl DatasetSummary {
    fn new<T>(source: String, ingested: &Ingested<T>) -> Self {
        Self {
            source,
            rows_read: ingested.rows_read,
            rows_used: ingested.rows.len(),
            rows_filtered: ingested.rows_filtered,
            issues: ingested.issues.clone(),
        }
    }
}

/// Record of a pipeline run, also written as `{prefix}_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub city: Option<String>,
    pub listings: DatasetSummary,
    pub rentals: DatasetSummary,
    pub listing_groups: usize,
    pub zero_filled: usize,
    pub compared_rows: usize,
    pub unmatched_listings: usize,
    pub unmatched_rentals: usize,
    pub outside_boundaries: usize,
    pub maps: Vec<MapKind>,
    pub outputs: Vec<PathBuf>,
}

/// Runs the whole pipeline: load, aggregate, join, render.
///
/// 1. Load boundaries (when configured), rental statistics and listings
/// 2. Aggregate listings and zero-fill units that only have rental data
/// 3. Join both sides and drop units outside the boundary file
/// 4. Write `{prefix}_comparison.csv`
/// 5. Render the six maps (only with boundaries and a non-empty table)
/// 6. Write `{prefix}_summary.json`
///
/// # Arguments
/// * `config`: Resolved run configuration
/// * `renderer`: Map renderer used for the six maps
/// * `progress`: Called after each map is written with the number written
///   so far and the number planned
///
/// # Errors
/// Returns an error if:
/// - An input cannot be opened, fetched or parsed structurally
/// - The boundary file is invalid or nothing matches the configured city
/// - A map cannot be rendered
/// - An output file cannot be written
///
/// # Returns
/// A summary of what was read, joined and written
pub fn run<P>(config: &Config, renderer: &dyn MapRenderer, mut progress: P) -> Result<RunSummary>
where
    P: FnMut(usize, usize),
{
    let generated_at = Utc::now();

    let boundaries = config
        .boundaries_path
        .as_deref()
        .map(|path| Boundaries::load(path, &config.columns, config.city.as_deref()))
        .transpose()
        .context("failed to load boundaries")?;

    let rentals_reader = open_source(&config.rental_source)?;
    let rentals = load_rentals(rentals_reader, &config.columns)
        .with_context(|| format!("failed to load rental statistics from {}", config.rental_source))?;

    let options = ListingOptions {
        columns: &config.columns,
        price_multiplier: config.price_multiplier,
        room_type_filter: config.room_type_filter.as_deref(),
    };
    let locator = boundaries.as_ref().map(|b| b as &dyn UnitLocator);
    let listings_reader = open_source(&config.listings_source)?;
    let listings = load_listings(listings_reader, &options, locator)
        .with_context(|| format!("failed to load listings from {}", config.listings_source))?;

    let listing_summary = DatasetSummary::new(config.listings_source.to_string(), &listings);
    let rental_summary = DatasetSummary::new(config.rental_source.to_string(), &rentals);

    let mut aggregates = aggregate_listings(&listings.rows);
    let listing_groups = aggregates.len();
    let rental_index = index_rentals(rentals.rows);
    let zero_filled = if config.zero_fill_units {
        zero_fill(&mut aggregates, &rental_index)
    } else {
        0
    };

    let mut table = merge(&aggregates, &rental_index);
    let outside_boundaries = match &boundaries {
        Some(boundaries) => restrict_to_boundaries(&mut table, boundaries),
        None => 0,
    };
    if table.rows.is_empty() {
        warn!("no unit appears in both datasets; outputs will be empty");
    }

    let mut outputs = Vec::new();
    let table_path = config.output_dir.join(format!("{}_comparison.csv", config.prefix));
    write_table(&table, &table_path)?;
    outputs.push(table_path);

    let mut maps = Vec::new();
    match &boundaries {
        Some(boundaries) if !table.rows.is_empty() => {
            for (idx, kind) in MapKind::ALL.into_iter().enumerate() {
                let html = renderer
                    .render(kind, &table, boundaries)
                    .with_context(|| format!("failed to render {}", kind.file_stem()))?;
                let path = render::map_path(&config.output_dir, &config.prefix, kind);
                render::write_document(&path, &html)?;
                outputs.push(path);
                maps.push(kind);
                progress(idx + 1, MapKind::ALL.len());
            }
        }
        Some(_) => warn!("nothing to draw, skipping maps"),
        None => warn!("no boundary file configured, skipping maps"),
    }

    let mut summary = RunSummary {
        generated_at,
        city: config.city.clone(),
        listings: listing_summary,
        rentals: rental_summary,
        listing_groups,
        zero_filled,
        compared_rows: table.rows.len(),
        unmatched_listings: table.unmatched_listings.len(),
        unmatched_rentals: table.unmatched_rentals.len(),
        outside_boundaries,
        maps,
        outputs,
    };

    let summary_path = config.output_dir.join(format!("{}_summary.json", config.prefix));
    summary.outputs.push(summary_path.clone());
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?;
    render::write_document(&summary_path, &json)?;

    info!(
        compared = summary.compared_rows,
        outputs = summary.outputs.len(),
        "pipeline finished"
    );
    Ok(summary)
}

/// Drops rows for units the boundary file does not cover. Returns how many
/// rows were dropped.
fn restrict_to_boundaries(table: &mut ComparisonTable, boundaries: &Boundaries) -> usize {
    let before = table.rows.len();
    table.rows.retain(|row| boundaries.get(&row.unit).is_some());
    let dropped = before - table.rows.len();
    if dropped > 0 {
        info!(dropped, "dropped rows outside the boundary file");
    }
    dropped
}

fn write_table(table: &ComparisonTable, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("could not create output directory {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("could not create {}", path.display()))?;
    render::write_table_csv(table, file)?;
    info!(path = %path.display(), rows = table.rows.len(), "wrote comparison table");
    Ok(())
}
