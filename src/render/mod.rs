pub mod projection;
pub mod scale;
pub mod templates;

use crate::analysis::{ComparisonRow, ComparisonTable};
use crate::data::{BedroomCategory, UnitId};
use crate::error::RenderError;
use crate::geography::Boundaries;
use chrono::{DateTime, Utc};
use projection::Projection;
use scale::{ColorScale, Palette, NA_COLOR, NO_DATA_COLOR};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use templates::{Frame, Legend, MapPage, Shape};
use tracing::{debug, info};

const CANVAS_WIDTH: f64 = 900.0;

/// The six maps produced per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MapKind {
    RentalCount,
    ListingCount,
    RentalPrice,
    ListingPrice,
    CountRatio,
    PriceRatio,
}

impl MapKind {
    /// Rendering order, which is also the order of progress reports.
    pub const ALL: [MapKind; 6] = [
        MapKind::RentalCount,
        MapKind::ListingCount,
        MapKind::RentalPrice,
        MapKind::ListingPrice,
        MapKind::CountRatio,
        MapKind::PriceRatio,
    ];

    /// File name without prefix or extension.
    pub fn file_stem(self) -> &'static str {
        match self {
            MapKind::RentalCount => "rental_count_map",
            MapKind::ListingCount => "airbnb_count_map",
            MapKind::RentalPrice => "rental_price_map",
            MapKind::ListingPrice => "airbnb_price_map",
            MapKind::CountRatio => "count_ratio_map",
            MapKind::PriceRatio => "price_ratio_map",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            MapKind::RentalCount => "Number of rentals, by area and number of bedrooms",
            MapKind::ListingCount => "Number of Airbnbs, by area and number of bedrooms",
            MapKind::RentalPrice => "Median price of rentals, by area and number of bedrooms",
            MapKind::ListingPrice => "Median price of Airbnbs, by area and number of bedrooms",
            MapKind::CountRatio => "Ratio of rental counts to Airbnb counts, by area and number of bedrooms",
            MapKind::PriceRatio => {
                "Ratio of median rental prices to median Airbnb prices, by area and number of bedrooms"
            }
        }
    }

    fn value(self, row: &ComparisonRow) -> f64 {
        match self {
            MapKind::RentalCount => row.rental_count as f64,
            MapKind::ListingCount => row.listing_count as f64,
            MapKind::RentalPrice => row.rental_price,
            MapKind::ListingPrice => row.listing_price,
            MapKind::CountRatio => row.count_ratio,
            MapKind::PriceRatio => row.price_ratio,
        }
    }

    /// Price maps treat a zero median as missing data.
    fn zero_is_missing(self) -> bool {
        matches!(self, MapKind::RentalPrice | MapKind::ListingPrice)
    }

    fn is_ratio(self) -> bool {
        matches!(self, MapKind::CountRatio | MapKind::PriceRatio)
    }

    fn scale(self, table: &ComparisonTable) -> ColorScale {
        let values = table
            .rows
            .iter()
            .map(|row| self.value(row))
            .filter(|v| !(self.zero_is_missing() && *v == 0.0));
        match self {
            MapKind::RentalCount | MapKind::ListingCount => ColorScale::sequential(Palette::Plasma, values),
            MapKind::RentalPrice => ColorScale::sequential(Palette::BlueRed, values),
            MapKind::ListingPrice => ColorScale::sequential(Palette::Turbo, values),
            MapKind::CountRatio | MapKind::PriceRatio => ColorScale::centred(values),
        }
    }

    fn format_value(self, value: f64) -> String {
        match self {
            MapKind::RentalCount | MapKind::ListingCount => format!("{value:.0}"),
            MapKind::RentalPrice | MapKind::ListingPrice => format!("${value:.2}"),
            MapKind::CountRatio | MapKind::PriceRatio => format!("{value:.2}"),
        }
    }

    fn hover(self, row: &ComparisonRow) -> String {
        let mut lines = vec![row.unit.to_string(), format!("Bedrooms: {}", row.bedrooms)];
        match self {
            MapKind::RentalCount | MapKind::ListingCount => {
                lines.push(format!("Count: {}", self.format_value(self.value(row))));
            }
            MapKind::RentalPrice => lines.push(format!("Median price: {}", rental_price_text(row))),
            MapKind::ListingPrice => {
                lines.push(format!("Median price (per week): ${:.2}", row.listing_price));
            }
            MapKind::CountRatio => {
                lines.push(format!("Rental count: {}", row.rental_count));
                lines.push(format!("Airbnb count: {}", row.listing_count));
                lines.push(format!("Ratio: {:.2}", row.count_ratio));
            }
            MapKind::PriceRatio => {
                lines.push(format!("Rental price: {}", rental_price_text(row)));
                lines.push(format!("Airbnb price: ${:.2}", row.listing_price));
                lines.push(format!("Ratio: {:.2}", row.price_ratio));
            }
        }
        lines.join("\n")
    }

    fn legend(self, scale: &ColorScale) -> Legend {
        let mut notes = Vec::new();
        if self.zero_is_missing() {
            notes.push("Grey: no data".to_string());
        }
        if self.is_ratio() {
            notes.push("Positive: more rentals than Airbnbs. Negative: more Airbnbs than rentals.".to_string());
        }
        let title = match self {
            MapKind::RentalCount | MapKind::ListingCount => "Count",
            MapKind::RentalPrice | MapKind::ListingPrice => "Median price (per week)",
            MapKind::CountRatio | MapKind::PriceRatio => "Ratio",
        };
        Legend {
            title: title.to_string(),
            gradient: scale.gradient_css(),
            low: self.format_value(scale.min),
            high: self.format_value(scale.max),
            notes,
        }
    }
}

fn rental_price_text(row: &ComparisonRow) -> String {
    match row.rental_price_band {
        Some(band) => band.label().to_string(),
        None if row.rental_price == 0.0 => "NA".to_string(),
        None => format!("${:.2}", row.rental_price),
    }
}

/// Turns the comparison table into a map document.
pub trait MapRenderer {
    /// Renders one map.
    ///
    /// # Arguments
    /// * `kind`: Which of the six maps to draw
    /// * `table`: Joined rows, one frame per bedroom category present
    /// * `boundaries`: Outlines of the units in `table`
    ///
    /// # Errors
    /// Returns `RenderError::NothingToDraw` if no unit of `table` has a
    /// boundary
    fn render(&self, kind: MapKind, table: &ComparisonTable, boundaries: &Boundaries) -> Result<String, RenderError>;
}

/// Renders standalone HTML pages with one inline SVG per bedroom category.
#[derive(Debug, Clone)]
pub struct HtmlMapRenderer {
    pub place: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl HtmlMapRenderer {
    pub fn new(place: Option<String>) -> Self {
        Self {
            place,
            generated_at: Utc::now(),
        }
    }
}

impl MapRenderer for HtmlMapRenderer {
    fn render(&self, kind: MapKind, table: &ComparisonTable, boundaries: &Boundaries) -> Result<String, RenderError> {
        let units_in_table: HashSet<&UnitId> = table.rows.iter().map(|row| &row.unit).collect();
        let extent = boundaries
            .extent(|unit| units_in_table.contains(unit))
            .ok_or(RenderError::NothingToDraw)?;
        let projection = Projection::fit(extent, CANVAS_WIDTH);
        let scale = kind.scale(table);

        let drawn: Vec<(&UnitId, String)> = boundaries
            .units()
            .iter()
            .filter(|boundary| units_in_table.contains(&boundary.unit))
            .map(|boundary| (&boundary.unit, projection.path(&boundary.shape)))
            .collect();

        let categories = table.categories();
        let frames: Vec<Frame> = categories
            .iter()
            .map(|&category| {
                let rows: HashMap<&UnitId, &ComparisonRow> =
                    table.frame(category).map(|row| (&row.unit, row)).collect();
                let shapes = drawn
                    .iter()
                    .map(|(unit, path)| match rows.get(unit) {
                        Some(row) => {
                            let value = kind.value(row);
                            let fill = if kind.zero_is_missing() && value == 0.0 {
                                NA_COLOR.to_string()
                            } else {
                                scale.color(value)
                            };
                            Shape {
                                path: path.clone(),
                                fill,
                                hover: kind.hover(row),
                            }
                        }
                        None => Shape {
                            path: path.clone(),
                            fill: NO_DATA_COLOR.to_string(),
                            hover: format!("{unit}\nBedrooms: {category}\nNo data"),
                        },
                    })
                    .collect();
                Frame {
                    label: category.label().to_string(),
                    shapes,
                }
            })
            .collect();

        let selected = categories
            .iter()
            .position(|c| *c == BedroomCategory::Total)
            .unwrap_or(0);

        debug!(map = ?kind, frames = frames.len(), shapes = drawn.len(), "rendering map");
        let page = MapPage {
            title: kind.title(),
            subtitle: self.place.clone(),
            view_box: projection.view_box(),
            frames,
            selected,
            legend: kind.legend(&scale),
            footer: format!("Generated {}", self.generated_at.format("%Y-%m-%d %H:%M UTC")),
        };
        Ok(templates::map_page(&page).into_string())
    }
}

/// Output file for a map kind, e.g. `output/akl_rental_count_map.html`.
pub fn map_path(output_dir: &Path, prefix: &str, kind: MapKind) -> PathBuf {
    output_dir.join(format!("{prefix}_{}.html", kind.file_stem()))
}

/// Writes a finished document, creating the parent directory if needed.
///
/// # Errors
/// Returns `RenderError::Write` if the directory or the file cannot be
/// written
pub fn write_document(path: &Path, contents: &str) -> Result<(), RenderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RenderError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, contents).map_err(|e| RenderError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!(path = %path.display(), "wrote document");
    Ok(())
}

/// Flat CSV form of a comparison row.
#[derive(Debug, Serialize)]
struct TableRecord<'a> {
    unit: &'a str,
    bedrooms: &'static str,
    rental_count: u64,
    airbnb_count: u64,
    rental_price: f64,
    rental_price_band: &'static str,
    airbnb_price: f64,
    count_ratio: f64,
    price_ratio: f64,
}

/// Writes the comparison table handed to the renderer as CSV.
///
/// Columns: unit, bedrooms, rental_count, airbnb_count, rental_price,
/// rental_price_band, airbnb_price, count_ratio, price_ratio.
///
/// # Errors
/// Returns `RenderError::Csv` if serialisation or the underlying writer fails
pub fn write_table_csv<W: std::io::Write>(table: &ComparisonTable, writer: W) -> Result<(), RenderError> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in &table.rows {
        csv.serialize(TableRecord {
            unit: row.unit.as_str(),
            bedrooms: row.bedrooms.label(),
            rental_count: row.rental_count,
            airbnb_count: row.listing_count,
            rental_price: row.rental_price,
            rental_price_band: row.rental_price_band.map(|band| band.label()).unwrap_or(""),
            airbnb_price: row.listing_price,
            count_ratio: row.count_ratio,
            price_ratio: row.price_ratio,
        })?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnConfig;
    use crate::data::PriceBand;

    fn row(unit: &str, bedrooms: BedroomCategory, rental_count: u64, listing_count: u64) -> ComparisonRow {
        ComparisonRow {
            unit: UnitId::from(unit),
            bedrooms,
            rental_count,
            listing_count,
            rental_price: 174.5,
            rental_price_band: Some(PriceBand::From150To199),
            listing_price: 0.0,
            count_ratio: crate::analysis::ratio::favorability_ratio(listing_count as f64, rental_count as f64),
            price_ratio: 0.0,
        }
    }

    fn sample_table() -> ComparisonTable {
        ComparisonTable {
            rows: vec![
                row("West", BedroomCategory::Two, 4, 1),
                row("West", BedroomCategory::Total, 10, 2),
                row("East", BedroomCategory::Total, 1, 5),
            ],
            ..Default::default()
        }
    }

    fn boundaries() -> Boundaries {
        Boundaries::from_geojson(crate::geography::tests::SAMPLE, &ColumnConfig::default(), Some("Auckland"))
            .unwrap()
    }

    #[test]
    fn test_file_names_use_prefix() {
        let path = map_path(Path::new("output"), "akl", MapKind::ListingCount);
        assert_eq!(path, PathBuf::from("output/akl_airbnb_count_map.html"));
    }

    #[test]
    fn test_ratio_map_frames_and_hover() {
        let renderer = HtmlMapRenderer::new(Some("Auckland".to_string()));
        let html = renderer
            .render(MapKind::CountRatio, &sample_table(), &boundaries())
            .unwrap();

        assert!(html.contains("Ratio of rental counts to Airbnb counts"));
        assert!(html.contains("Bedrooms: 2"));
        assert!(html.contains("Bedrooms: total"));
        assert!(html.contains("id=\"frame-1\" checked"));
        assert!(html.contains("Ratio: 5.00"));
        assert!(html.contains("Ratio: -5.00"));
        // East has no 2-bedroom row.
        assert!(html.contains("No data"));
    }

    #[test]
    fn test_zero_prices_render_grey() {
        let renderer = HtmlMapRenderer::new(None);
        let html = renderer
            .render(MapKind::ListingPrice, &sample_table(), &boundaries())
            .unwrap();
        assert!(html.contains(&format!("fill=\"{NA_COLOR}\"")));
        assert!(html.contains("Grey: no data"));
    }

    #[test]
    fn test_rental_price_hover_shows_band() {
        let renderer = HtmlMapRenderer::new(None);
        let html = renderer
            .render(MapKind::RentalPrice, &sample_table(), &boundaries())
            .unwrap();
        assert!(html.contains("Median price: $150 - $199"));
    }

    #[test]
    fn test_nothing_to_draw() {
        let renderer = HtmlMapRenderer::new(None);
        let table = ComparisonTable {
            rows: vec![row("Elsewhere", BedroomCategory::Total, 1, 1)],
            ..Default::default()
        };
        let result = renderer.render(MapKind::RentalCount, &table, &boundaries());
        assert!(matches!(result, Err(RenderError::NothingToDraw)));
    }

    #[test]
    fn test_table_csv() {
        let mut buffer = Vec::new();
        write_table_csv(&sample_table(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("unit,bedrooms,rental_count,airbnb_count,rental_price,rental_price_band,airbnb_price,count_ratio,price_ratio")
        );
        assert_eq!(lines.next(), Some("West,2,4,1,174.5,$150 - $199,0.0,4.0,0.0"));
        assert_eq!(text.lines().count(), 4);
    }
}
