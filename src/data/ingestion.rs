use super::bands::{weighted_median_band, PriceBand, RentalHeader};
use super::records::{BedroomCategory, ListingRow, RentalStat, UnitId};
use crate::config::{ColumnConfig, InputSource};
use crate::error::{IngestError, RowIssue};
use csv::StringRecord;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};

/// Census exports use ".." for suppressed or confidential cells.
const SUPPRESSED: &str = "..";

/// Resolves a unit for listings that only carry coordinates.
///
/// Implemented by [`crate::geography::Boundaries`] with a point-in-polygon
/// lookup; tests use fixed lookups.
pub trait UnitLocator {
    /// Returns the unit containing the point, or `None` when no unit does.
    fn locate(&self, longitude: f64, latitude: f64) -> Option<UnitId>;
}

/// Rows parsed from one dataset, plus what was dropped along the way.
///
/// # Fields
/// * `rows`: Parsed rows in file order
/// * `issues`: One entry per skipped row (or, for wide rental tables, per
///   skipped bedroom category)
/// * `rows_read`: Data records read from the file, excluding the header
/// * `rows_filtered`: Records dropped on purpose, e.g. other room types
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub rows: Vec<T>,
    pub issues: Vec<RowIssue>,
    pub rows_read: usize,
    pub rows_filtered: usize,
}

impl<T> Ingested<T> {
    fn new() -> Self {
        Self {
            rows: Vec::new(),
            issues: Vec::new(),
            rows_read: 0,
            rows_filtered: 0,
        }
    }
}

/// Settings that shape how listing rows are read.
///
/// # Fields
/// * `columns`: Column names of the listings file
/// * `price_multiplier`: Factor turning the listed (nightly) price into the
///   rental period of the rental statistics
/// * `room_type_filter`: Only listings of this room type are kept; `None`
///   keeps all
#[derive(Debug, Clone)]
pub struct ListingOptions<'a> {
    pub columns: &'a ColumnConfig,
    pub price_multiplier: f64,
    pub room_type_filter: Option<&'a str>,
}

/// Opens a local file or downloads a URL, returning a reader over its bytes.
///
/// URLs are fetched in full with a blocking request before parsing starts.
///
/// # Errors
/// Returns an error if:
/// - The file cannot be opened (`IngestError::InvalidInputPath`)
/// - The request fails or the server answers with an error status
///   (`IngestError::Http`)
pub fn open_source(source: &InputSource) -> Result<Box<dyn Read>, IngestError> {
    match source {
        InputSource::File(path) => {
            let file = File::open(path).map_err(|e| IngestError::InvalidInputPath {
                path: path.clone(),
                source: e,
            })?;
            Ok(Box::new(file))
        }
        InputSource::Url(url) => {
            info!(%url, "downloading input");
            let to_http_error = |e| IngestError::Http {
                url: url.clone(),
                source: e,
            };
            let bytes = reqwest::blocking::get(url)
                .and_then(|response| response.error_for_status())
                .and_then(|response| response.bytes())
                .map_err(to_http_error)?;
            Ok(Box::new(Cursor::new(bytes.to_vec())))
        }
    }
}

/// Header name to column index, matched case-insensitively.
struct Headers(HashMap<String, usize>);

impl Headers {
    fn new(record: &StringRecord) -> Self {
        Self(
            record
                .iter()
                .enumerate()
                .map(|(idx, name)| (normalize_header(name), idx))
                .collect(),
        )
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.0.get(&normalize_header(name)).copied()
    }

    fn require(&self, name: &str, dataset: &'static str) -> Result<usize, IngestError> {
        self.find(name).ok_or_else(|| IngestError::MissingColumn {
            dataset,
            column: name.to_string(),
        })
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

/// Line a record starts on; quoted fields may span several lines.
fn record_line(record: &StringRecord, idx: usize) -> usize {
    record.position().map_or(idx + 2, |position| position.line() as usize)
}

fn error_line(error: &csv::Error, idx: usize) -> usize {
    error.position().map_or(idx + 2, |position| position.line() as usize)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Parses a price such as "$1,234.00". Negative or non-finite values fail.
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    let price = cleaned.parse::<f64>().ok()?;
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// Parses a household or listing count; suppressed cells read as zero.
pub fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw == SUPPRESSED {
        return Some(0);
    }
    if let Ok(count) = raw.replace(',', "").parse::<u64>() {
        return Some(count);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value >= 0.0 && value.fract() == 0.0).then_some(value as u64)
}

/// Non-empty trimmed cell, or a `MissingField` issue.
fn cell<'r>(record: &'r StringRecord, idx: usize, column: &str, line: usize) -> Result<&'r str, RowIssue> {
    match record.get(idx).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(RowIssue::MissingField {
            line,
            column: column.to_string(),
        }),
    }
}

fn invalid(line: usize, column: &str, value: &str) -> RowIssue {
    RowIssue::InvalidValue {
        line,
        column: column.to_string(),
        value: value.to_string(),
    }
}

enum UnitSource {
    Column(usize),
    Coordinates { latitude: usize, longitude: usize },
}

struct ListingLayout {
    unit: UnitSource,
    price: usize,
    bedrooms: Option<usize>,
    room_type: Option<usize>,
}

/// Reads short-term listings and resolves each to a unit and bedroom category.
///
/// The unit comes from the configured unit column when present, otherwise
/// from the latitude/longitude columns via `locator`. Bad rows are skipped
/// and recorded in `issues`; only structural problems are fatal.
///
/// Listings of other room types are counted in `rows_filtered`. A missing
/// bedroom count reads as one bedroom; studios (0) only count towards the
/// total. Prices are multiplied by `options.price_multiplier`.
///
/// # Arguments
/// * `reader`: CSV bytes, e.g. from [`open_source`]
/// * `options`: Column names, price multiplier and room type filter
/// * `locator`: Unit lookup for coordinate-only files
///
/// # Errors
/// Returns an error if:
/// - The header row cannot be read
/// - The price column is missing
/// - There is no unit column and no latitude/longitude columns
/// - There is no unit column and no `locator` was given
///
/// # Returns
/// The parsed listings, in file order, with row counts and issues
pub fn load_listings<R: Read>(
    reader: R,
    options: &ListingOptions<'_>,
    locator: Option<&dyn UnitLocator>,
) -> Result<Ingested<ListingRow>, IngestError> {
    const DATASET: &str = "listings";
    let columns = options.columns;
    let mut reader = csv_reader(reader);
    let headers = Headers::new(reader.headers().map_err(|e| IngestError::Csv {
        dataset: DATASET,
        source: e,
    })?);

    let unit = match headers.find(&columns.listing_unit) {
        Some(idx) => UnitSource::Column(idx),
        None => {
            let latitude = headers.require(&columns.listing_latitude, DATASET)?;
            let longitude = headers.require(&columns.listing_longitude, DATASET)?;
            if locator.is_none() {
                return Err(IngestError::NeedsBoundaries {
                    column: columns.listing_unit.clone(),
                });
            }
            UnitSource::Coordinates { latitude, longitude }
        }
    };
    let layout = ListingLayout {
        unit,
        price: headers.require(&columns.listing_price, DATASET)?,
        bedrooms: headers.find(&columns.listing_bedrooms),
        room_type: headers.find(&columns.listing_room_type),
    };
    if options.room_type_filter.is_some() && layout.room_type.is_none() {
        warn!(
            column = %columns.listing_room_type,
            "room type column not found, keeping every listing"
        );
    }

    let mut out = Ingested::new();
    for (idx, result) in reader.records().enumerate() {
        out.rows_read += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = error_line(&e, idx);
                warn!(line, error = %e, "unreadable listing row");
                out.issues.push(invalid(line, "row", &e.to_string()));
                continue;
            }
        };
        let line = record_line(&record, idx);

        if let (Some(wanted), Some(idx)) = (options.room_type_filter, layout.room_type) {
            if record.get(idx).map(str::trim) != Some(wanted) {
                out.rows_filtered += 1;
                continue;
            }
        }

        match parse_listing(&record, &layout, columns, options.price_multiplier, locator, line) {
            Ok(row) => out.rows.push(row),
            Err(issue) => {
                warn!(%issue, "skipping listing row");
                out.issues.push(issue);
            }
        }
    }

    info!(
        read = out.rows_read,
        used = out.rows.len(),
        filtered = out.rows_filtered,
        skipped = out.issues.len(),
        "loaded listings"
    );
    Ok(out)
}

fn parse_listing(
    record: &StringRecord,
    layout: &ListingLayout,
    columns: &ColumnConfig,
    price_multiplier: f64,
    locator: Option<&dyn UnitLocator>,
    line: usize,
) -> Result<ListingRow, RowIssue> {
    let raw_price = cell(record, layout.price, &columns.listing_price, line)?;
    let price = parse_price(raw_price).ok_or_else(|| invalid(line, &columns.listing_price, raw_price))?;

    // A missing bedroom count is read as one bedroom.
    let bedrooms = match layout.bedrooms.and_then(|idx| record.get(idx)).map(str::trim) {
        None | Some("") => Some(BedroomCategory::One),
        Some(raw) => {
            let count = raw
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .ok_or_else(|| invalid(line, &columns.listing_bedrooms, raw))?;
            BedroomCategory::from_count(count.round() as u32)
        }
    };

    let unit = match layout.unit {
        UnitSource::Column(idx) => UnitId::new(cell(record, idx, &columns.listing_unit, line)?),
        UnitSource::Coordinates { latitude, longitude } => {
            let raw_lat = cell(record, latitude, &columns.listing_latitude, line)?;
            let raw_lon = cell(record, longitude, &columns.listing_longitude, line)?;
            let lat = raw_lat
                .parse::<f64>()
                .map_err(|_| invalid(line, &columns.listing_latitude, raw_lat))?;
            let lon = raw_lon
                .parse::<f64>()
                .map_err(|_| invalid(line, &columns.listing_longitude, raw_lon))?;
            locator
                .and_then(|locator| locator.locate(lon, lat))
                .ok_or(RowIssue::Unlocated {
                    line,
                    latitude: lat,
                    longitude: lon,
                })?
        }
    };

    Ok(ListingRow {
        unit,
        bedrooms,
        price: price * price_multiplier,
    })
}

/// A band column and the bedroom category its header names, if any.
struct BandColumn {
    idx: usize,
    bedrooms: Option<BedroomCategory>,
    band: PriceBand,
}

enum RentalPrice {
    Column(usize),
    Bands(Vec<BandColumn>),
}

/// The columns of one bedroom category in a wide table.
struct CategoryBlock {
    bedrooms: BedroomCategory,
    households: usize,
    bands: Vec<BandColumn>,
}

enum RentalLayout {
    /// One row per unit and bedroom category.
    Long {
        count: usize,
        bedrooms: Option<usize>,
        price: RentalPrice,
    },
    /// One row per unit with a block of columns per bedroom category, as
    /// NZ.Stat exports it.
    Wide(Vec<CategoryBlock>),
}

impl RentalLayout {
    fn detect(header_record: &StringRecord, headers: &Headers, columns: &ColumnConfig) -> Result<Self, IngestError> {
        const DATASET: &str = "rental";
        let classified: Vec<(usize, RentalHeader)> = header_record
            .iter()
            .enumerate()
            .filter_map(|(idx, name)| RentalHeader::parse(name).map(|header| (idx, header)))
            .collect();
        let mut bands: Vec<BandColumn> = classified
            .iter()
            .filter_map(|&(idx, header)| match header {
                RentalHeader::Band { bedrooms, band } => Some(BandColumn { idx, bedrooms, band }),
                RentalHeader::Households(_) => None,
            })
            .collect();
        bands.sort_by_key(|column| column.band);

        if let Some(count) = headers.find(&columns.rental_count) {
            let price = match headers.find(&columns.rental_price) {
                Some(idx) => RentalPrice::Column(idx),
                None if !bands.is_empty() => {
                    debug!(bands = bands.len(), "deriving rental medians from band counts");
                    RentalPrice::Bands(bands)
                }
                None => {
                    return Err(IngestError::MissingColumn {
                        dataset: DATASET,
                        column: columns.rental_price.clone(),
                    })
                }
            };
            return Ok(RentalLayout::Long {
                count,
                bedrooms: headers.find(&columns.rental_bedrooms),
                price,
            });
        }

        let mut blocks: Vec<CategoryBlock> = Vec::new();
        for &(households, header) in &classified {
            let RentalHeader::Households(bedrooms) = header else {
                continue;
            };
            if blocks.iter().any(|block| block.bedrooms == bedrooms) {
                warn!(%bedrooms, "repeated households column, keeping the first");
                continue;
            }
            let block_bands = bands
                .iter()
                .filter(|column| column.bedrooms == Some(bedrooms))
                .map(|column| BandColumn {
                    idx: column.idx,
                    bedrooms: column.bedrooms,
                    band: column.band,
                })
                .collect();
            blocks.push(CategoryBlock {
                bedrooms,
                households,
                bands: block_bands,
            });
        }
        if blocks.is_empty() {
            return Err(IngestError::MissingColumn {
                dataset: DATASET,
                column: columns.rental_count.clone(),
            });
        }
        blocks.sort_by_key(|block| block.bedrooms);
        debug!(categories = blocks.len(), "reading wide rental table");
        Ok(RentalLayout::Wide(blocks))
    }
}

/// Reads pre-aggregated rental statistics.
///
/// Two layouts are accepted:
/// * Long: one row per unit and bedroom category, with the unit, count and
///   (optionally) bedrooms columns from `columns`. The median price comes
///   from the price column, which may hold a number or a band label. Without
///   that column, band count columns are used, restricted to the row's
///   bedroom category when their headers name one.
/// * Wide: one row per unit, no count column, and for each bedroom category a
///   `<category>: Total households stated` column plus that category's
///   `<category>: <band>` columns. Each row yields one statistic per category.
///
/// Suppressed cells ("..") read as zero. Rows that cannot be parsed are
/// skipped and recorded in `issues`.
///
/// # Arguments
/// * `reader`: CSV bytes, e.g. from [`open_source`]
/// * `columns`: Column names of the rental dataset
///
/// # Errors
/// Returns an error if:
/// - The header row cannot be read
/// - The unit column is missing
/// - Neither a count column nor any households column is present
/// - A long table has neither a price column nor band columns
///
/// # Returns
/// The parsed statistics, in file order, with row counts and issues
pub fn load_rentals<R: Read>(reader: R, columns: &ColumnConfig) -> Result<Ingested<RentalStat>, IngestError> {
    const DATASET: &str = "rental";
    let mut reader = csv_reader(reader);
    let header_record = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            dataset: DATASET,
            source: e,
        })?
        .clone();
    let headers = Headers::new(&header_record);

    let unit_idx = headers.require(&columns.rental_unit, DATASET)?;
    let layout = RentalLayout::detect(&header_record, &headers, columns)?;

    let mut out = Ingested::new();
    for (idx, result) in reader.records().enumerate() {
        out.rows_read += 1;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                let line = error_line(&e, idx);
                warn!(line, error = %e, "unreadable rental row");
                out.issues.push(invalid(line, "row", &e.to_string()));
                continue;
            }
        };
        let line = record_line(&record, idx);

        let parsed = match &layout {
            RentalLayout::Long { count, bedrooms, price } => {
                vec![parse_rental(&record, unit_idx, *count, *bedrooms, price, columns, line)]
            }
            RentalLayout::Wide(blocks) => parse_wide_rental(&record, unit_idx, blocks, columns, line),
        };

        for result in parsed {
            match result {
                Ok(stat) => out.rows.push(stat),
                Err(issue) => {
                    warn!(%issue, "skipping rental row");
                    out.issues.push(issue);
                }
            }
        }
    }

    info!(
        read = out.rows_read,
        used = out.rows.len(),
        skipped = out.issues.len(),
        "loaded rental statistics"
    );
    Ok(out)
}

fn parse_rental(
    record: &StringRecord,
    unit_idx: usize,
    count_idx: usize,
    bedrooms_idx: Option<usize>,
    price: &RentalPrice,
    columns: &ColumnConfig,
    line: usize,
) -> Result<RentalStat, RowIssue> {
    let unit = UnitId::new(cell(record, unit_idx, &columns.rental_unit, line)?);
    let raw_count = cell(record, count_idx, &columns.rental_count, line)?;
    let count = parse_count(raw_count).ok_or_else(|| invalid(line, &columns.rental_count, raw_count))?;
    let bedrooms = match bedrooms_idx {
        None => BedroomCategory::Total,
        Some(idx) => {
            let raw = cell(record, idx, &columns.rental_bedrooms, line)?;
            BedroomCategory::parse(raw).ok_or_else(|| invalid(line, &columns.rental_bedrooms, raw))?
        }
    };
    let (median_price, price_band) = match price {
        RentalPrice::Column(idx) => column_price(record, *idx, columns, line)?,
        RentalPrice::Bands(bands) => band_price(
            record,
            bands
                .iter()
                .filter(|column| column.bedrooms.map_or(true, |own| own == bedrooms)),
            line,
        )?,
    };

    Ok(RentalStat {
        unit,
        bedrooms,
        count,
        median_price,
        price_band,
    })
}

/// One statistic per bedroom category of a wide row. A bad unit cell skips
/// the whole row; a bad cell inside a block skips only that category.
fn parse_wide_rental(
    record: &StringRecord,
    unit_idx: usize,
    blocks: &[CategoryBlock],
    columns: &ColumnConfig,
    line: usize,
) -> Vec<Result<RentalStat, RowIssue>> {
    let unit = match cell(record, unit_idx, &columns.rental_unit, line) {
        Ok(raw) => UnitId::new(raw),
        Err(issue) => return vec![Err(issue)],
    };

    blocks
        .iter()
        .map(|block| -> Result<RentalStat, RowIssue> {
            let column = format!("households ({} bedrooms)", block.bedrooms);
            let raw_count = cell(record, block.households, &column, line)?;
            let count = parse_count(raw_count).ok_or_else(|| invalid(line, &column, raw_count))?;
            let (median_price, price_band) = band_price(record, block.bands.iter(), line)?;
            Ok(RentalStat {
                unit: unit.clone(),
                bedrooms: block.bedrooms,
                count,
                median_price,
                price_band,
            })
        })
        .collect()
}

fn column_price(
    record: &StringRecord,
    idx: usize,
    columns: &ColumnConfig,
    line: usize,
) -> Result<(f64, Option<PriceBand>), RowIssue> {
    let raw = cell(record, idx, &columns.rental_price, line)?;
    if raw == SUPPRESSED {
        return Ok((0.0, None));
    }
    if let Some(band) = PriceBand::from_label(raw) {
        return Ok((band.representative_price(), Some(band)));
    }
    parse_price(raw)
        .map(|value| (value, None))
        .ok_or_else(|| invalid(line, &columns.rental_price, raw))
}

/// Weighted median band over the given band columns; empty cells count as
/// zero households.
fn band_price<'c, I>(record: &StringRecord, bands: I, line: usize) -> Result<(f64, Option<PriceBand>), RowIssue>
where
    I: Iterator<Item = &'c BandColumn>,
{
    let mut counts = Vec::new();
    for column in bands {
        let raw = record.get(column.idx).map(str::trim).unwrap_or("");
        let count = if raw.is_empty() {
            0
        } else {
            parse_count(raw).ok_or_else(|| invalid(line, column.band.label(), raw))?
        };
        counts.push((column.band, count));
    }
    Ok(match weighted_median_band(&counts) {
        Some(band) => (band.representative_price(), Some(band)),
        None => (0.0, None),
    })
}
