use crate::config::ColumnConfig;
use crate::data::{UnitId, UnitLocator};
use crate::error::GeographyError;
use geo::{BoundingRect, Contains, MultiPolygon, Point, Rect};
use geojson::GeoJson;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// The polygon outline of one geographic unit.
///
/// # Fields
/// * `unit`: Identifier shared with the tabular datasets
/// * `shape`: Outline in longitude/latitude degrees; single polygons are
///   wrapped into a one-member multipolygon
/// * `bbox`: Cached bounding box, `None` for an empty shape
#[derive(Debug, Clone)]
pub struct Boundary {
    pub unit: UnitId,
    pub shape: MultiPolygon<f64>,
    bbox: Option<Rect<f64>>,
}

impl Boundary {
    pub fn new(unit: UnitId, shape: MultiPolygon<f64>) -> Self {
        let bbox = shape.bounding_rect();
        Self { unit, shape, bbox }
    }

    /// Bounding box of the shape, if it has any coordinates.
    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.bbox
    }

    fn contains(&self, point: &Point<f64>) -> bool {
        let Some(bbox) = self.bbox else {
            return false;
        };
        let (x, y) = point.x_y();
        if x < bbox.min().x || x > bbox.max().x || y < bbox.min().y || y > bbox.max().y {
            return false;
        }
        self.shape.contains(point)
    }
}

/// Unit boundaries for the chosen city, in longitude/latitude degrees.
///
/// Keeps the boundaries in file order, for drawing, plus an index by unit id
/// for lookups. When a unit id repeats, lookups return the first boundary.
#[derive(Debug, Clone)]
pub struct Boundaries {
    units: Vec<Boundary>,
    index: HashMap<UnitId, usize>,
}

impl Boundaries {
    pub fn new(units: Vec<Boundary>) -> Self {
        let mut index = HashMap::with_capacity(units.len());
        for (position, boundary) in units.iter().enumerate() {
            index.entry(boundary.unit.clone()).or_insert(position);
        }
        Self { units, index }
    }

    /// Reads and parses a boundary file.
    ///
    /// # Arguments
    /// * `path`: GeoJSON file holding a FeatureCollection
    /// * `columns`: Names of the unit id and city properties
    /// * `city`: Keep only features whose city property equals this value
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - Any of the conditions listed on [`Boundaries::from_geojson`] holds
    pub fn load(path: &Path, columns: &ColumnConfig, city: Option<&str>) -> Result<Self, GeographyError> {
        let text = std::fs::read_to_string(path).map_err(|e| GeographyError::InvalidInputPath {
            path: path.to_path_buf(),
            source: e,
        })?;
        let boundaries = Self::from_geojson(&text, columns, city)?;
        info!(path = %path.display(), units = boundaries.units.len(), "loaded boundaries");
        Ok(boundaries)
    }

    /// Parses a FeatureCollection, keeping Polygon and MultiPolygon features
    /// that carry a unit id and, when `city` is given, match it.
    ///
    /// Unit ids may be strings or numbers. Features without an id, without a
    /// geometry or with a non-polygon geometry are skipped with a warning.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The text is not valid GeoJSON
    /// - The document is not a FeatureCollection
    /// - `city` is given and no feature matches it
    pub fn from_geojson(text: &str, columns: &ColumnConfig, city: Option<&str>) -> Result<Self, GeographyError> {
        let collection = match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(collection) => collection,
            _ => return Err(GeographyError::NotFeatureCollection),
        };

        let mut units = Vec::new();
        for (idx, feature) in collection.features.into_iter().enumerate() {
            if let Some(city) = city {
                let feature_city = feature
                    .property(&columns.boundary_city_property)
                    .and_then(property_text);
                if feature_city.as_deref() != Some(city.trim()) {
                    continue;
                }
            }

            let Some(unit) = feature
                .property(&columns.boundary_unit_property)
                .and_then(property_text)
            else {
                warn!(feature = idx, property = %columns.boundary_unit_property, "boundary feature has no unit id");
                continue;
            };

            let Some(geometry) = feature.geometry else {
                warn!(%unit, "boundary feature has no geometry");
                continue;
            };
            let shape = match geo::Geometry::<f64>::try_from(geometry) {
                Ok(geo::Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
                Ok(geo::Geometry::MultiPolygon(multi)) => multi,
                Ok(_) => {
                    warn!(%unit, "boundary geometry is not a polygon");
                    continue;
                }
                Err(e) => {
                    warn!(%unit, error = %e, "unreadable boundary geometry");
                    continue;
                }
            };

            units.push(Boundary::new(UnitId::new(&unit), shape));
        }

        if units.is_empty() {
            if let Some(city) = city {
                return Err(GeographyError::EmptyAfterFilter(city.to_string()));
            }
        }
        Ok(Self::new(units))
    }

    /// Boundaries in file order.
    pub fn units(&self) -> &[Boundary] {
        &self.units
    }

    /// Boundary of `unit`, if the file has one.
    pub fn get(&self, unit: &UnitId) -> Option<&Boundary> {
        self.index.get(unit).map(|&position| &self.units[position])
    }

    /// Combined extent of every boundary accepted by `keep`.
    pub fn extent<F>(&self, keep: F) -> Option<Rect<f64>>
    where
        F: Fn(&UnitId) -> bool,
    {
        self.units
            .iter()
            .filter(|boundary| keep(&boundary.unit))
            .filter_map(Boundary::bbox)
            .reduce(|acc, rect| {
                Rect::new(
                    (acc.min().x.min(rect.min().x), acc.min().y.min(rect.min().y)),
                    (acc.max().x.max(rect.max().x), acc.max().y.max(rect.max().y)),
                )
            })
    }
}

impl UnitLocator for Boundaries {
    fn locate(&self, longitude: f64, latitude: f64) -> Option<UnitId> {
        let point = Point::new(longitude, latitude);
        self.units
            .iter()
            .find(|boundary| boundary.contains(&point))
            .map(|boundary| boundary.unit.clone())
    }
}

fn property_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::polygon;

    /// Two unit squares side by side in Auckland and one elsewhere.
    pub(crate) const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "SA22018__1": "West", "TA2018_V_1": "Auckland" },
                "geometry": { "type": "Polygon", "coordinates": [[[174.0, -37.0], [175.0, -37.0], [175.0, -36.0], [174.0, -36.0], [174.0, -37.0]]] }
            },
            {
                "type": "Feature",
                "properties": { "SA22018__1": "East", "TA2018_V_1": "Auckland" },
                "geometry": { "type": "MultiPolygon", "coordinates": [[[[175.0, -37.0], [176.0, -37.0], [176.0, -36.0], [175.0, -36.0], [175.0, -37.0]]]] }
            },
            {
                "type": "Feature",
                "properties": { "SA22018__1": 101, "TA2018_V_1": "Wellington City" },
                "geometry": { "type": "Polygon", "coordinates": [[[174.7, -41.4], [174.9, -41.4], [174.9, -41.2], [174.7, -41.2], [174.7, -41.4]]] }
            },
            {
                "type": "Feature",
                "properties": { "TA2018_V_1": "Auckland" },
                "geometry": { "type": "Point", "coordinates": [174.5, -36.5] }
            }
        ]
    }"#;

    #[test]
    fn test_city_filter() {
        let columns = ColumnConfig::default();
        let all = Boundaries::from_geojson(SAMPLE, &columns, None).unwrap();
        assert_eq!(all.units().len(), 3);

        let auckland = Boundaries::from_geojson(SAMPLE, &columns, Some("Auckland")).unwrap();
        let units: Vec<&str> = auckland.units().iter().map(|b| b.unit.as_str()).collect();
        assert_eq!(units, vec!["West", "East"]);
    }

    #[test]
    fn test_numeric_unit_ids() {
        let columns = ColumnConfig::default();
        let wellington = Boundaries::from_geojson(SAMPLE, &columns, Some("Wellington City")).unwrap();
        assert_eq!(wellington.units()[0].unit, UnitId::from("101"));
    }

    #[test]
    fn test_unknown_city_is_an_error() {
        let columns = ColumnConfig::default();
        let result = Boundaries::from_geojson(SAMPLE, &columns, Some("Dunedin"));
        assert!(matches!(result, Err(GeographyError::EmptyAfterFilter(_))));
    }

    #[test]
    fn test_locate_points() {
        let columns = ColumnConfig::default();
        let boundaries = Boundaries::from_geojson(SAMPLE, &columns, Some("Auckland")).unwrap();

        assert_eq!(boundaries.locate(174.5, -36.5), Some(UnitId::from("West")));
        assert_eq!(boundaries.locate(175.5, -36.2), Some(UnitId::from("East")));
        assert_eq!(boundaries.locate(170.0, -36.5), None);
    }

    #[test]
    fn test_extent_of_selected_units() {
        let columns = ColumnConfig::default();
        let boundaries = Boundaries::from_geojson(SAMPLE, &columns, None).unwrap();
        let extent = boundaries
            .extent(|unit| unit.as_str() != "101")
            .unwrap();
        assert_eq!(extent.min().x, 174.0);
        assert_eq!(extent.max().x, 176.0);
        assert_eq!(extent.min().y, -37.0);
        assert_eq!(extent.max().y, -36.0);
    }

    #[test]
    fn test_lookup_by_unit() {
        let columns = ColumnConfig::default();
        let boundaries = Boundaries::from_geojson(SAMPLE, &columns, None).unwrap();

        let east = boundaries.get(&UnitId::from("East")).unwrap();
        assert_eq!(east.bbox().map(|rect| rect.min().x), Some(175.0));
        assert_eq!(boundaries.get(&UnitId::from("101")).unwrap().unit.as_str(), "101");
        assert!(boundaries.get(&UnitId::from("Quiet")).is_none());
    }

    #[test]
    fn test_repeated_unit_ids_resolve_to_the_first() {
        let square = |x: f64| {
            MultiPolygon::new(vec![geo::polygon![
                (x: x, y: 0.0),
                (x: x + 1.0, y: 0.0),
                (x: x + 1.0, y: 1.0),
                (x: x, y: 1.0),
            ]])
        };
        let boundaries = Boundaries::new(vec![
            Boundary::new(UnitId::from("A"), square(0.0)),
            Boundary::new(UnitId::from("A"), square(5.0)),
        ]);
        let first = boundaries.get(&UnitId::from("A")).unwrap();
        assert_eq!(first.bbox().map(|rect| rect.min().x), Some(0.0));
        assert_eq!(boundaries.units().len(), 2);
    }

    #[test]
    fn test_not_a_collection() {
        let columns = ColumnConfig::default();
        let result = Boundaries::from_geojson(r#"{"type": "Point", "coordinates": [0, 0]}"#, &columns, None);
        assert!(matches!(result, Err(GeographyError::NotFeatureCollection)));
    }
}
