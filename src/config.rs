use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;

const ENV_PREFIX: &str = "FAVMAP_";

/// Inside Airbnb publishes nightly rates; rental statistics are weekly.
pub const DEFAULT_PRICE_MULTIPLIER: f64 = 7.0;
pub const DEFAULT_ROOM_TYPE: &str = "Entire home/apt";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Where a tabular input comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InputSource {
    File(PathBuf),
    Url(String),
}

impl InputSource {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            InputSource::Url(raw.to_string())
        } else {
            InputSource::File(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::File(path) => write!(f, "{}", path.display()),
            InputSource::Url(url) => f.write_str(url),
        }
    }
}

/// Column and property names of the input datasets.
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub listing_unit: String,
    pub listing_latitude: String,
    pub listing_longitude: String,
    pub listing_price: String,
    pub listing_bedrooms: String,
    pub listing_room_type: String,
    pub rental_unit: String,
    pub rental_bedrooms: String,
    pub rental_count: String,
    pub rental_price: String,
    pub boundary_unit_property: String,
    pub boundary_city_property: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            listing_unit: "unit".to_string(),
            listing_latitude: "latitude".to_string(),
            listing_longitude: "longitude".to_string(),
            listing_price: "price".to_string(),
            listing_bedrooms: "bedrooms".to_string(),
            listing_room_type: "room_type".to_string(),
            rental_unit: "unit".to_string(),
            rental_bedrooms: "bedrooms".to_string(),
            rental_count: "count".to_string(),
            rental_price: "median_price".to_string(),
            boundary_unit_property: "SA22018__1".to_string(),
            boundary_city_property: "TA2018_V_1".to_string(),
        }
    }
}

/// Everything a pipeline run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct Config {
    pub rental_source: InputSource,
    pub listings_source: InputSource,
    pub boundaries_path: Option<PathBuf>,
    pub city: Option<String>,
    pub prefix: String,
    pub output_dir: PathBuf,
    pub price_multiplier: f64,
    pub room_type_filter: Option<String>,
    pub zero_fill_units: bool,
    pub columns: ColumnConfig,
}

impl Config {
    /// Builds a config with defaults for everything but the required inputs.
    pub fn new(rental: &str, listings: &str, prefix: &str) -> Self {
        Self {
            rental_source: InputSource::parse(rental),
            listings_source: InputSource::parse(listings),
            boundaries_path: None,
            city: None,
            prefix: prefix.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            price_multiplier: DEFAULT_PRICE_MULTIPLIER,
            room_type_filter: Some(DEFAULT_ROOM_TYPE.to_string()),
            zero_fill_units: true,
            columns: ColumnConfig::default(),
        }
    }
}

/// Values collected from the environment before prompting.
///
/// `None` means "not supplied"; for the optional inputs an empty string means
/// "supplied as blank" and disables the feature.
#[derive(Debug, Default, Clone)]
pub struct PartialConfig {
    pub rental_path: Option<String>,
    pub listings_path: Option<String>,
    pub boundaries_path: Option<String>,
    pub city: Option<String>,
    pub prefix: Option<String>,
    pub output_dir: Option<String>,
    pub price_multiplier: Option<f64>,
    pub room_type_filter: Option<String>,
    pub zero_fill_units: Option<bool>,
}

impl PartialConfig {
    /// Reads `FAVMAP_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        let price_multiplier = get("PRICE_MULTIPLIER")
            .map(|raw| {
                raw.trim()
                    .parse::<f64>()
                    .with_context(|| format!("{ENV_PREFIX}PRICE_MULTIPLIER='{raw}' is not a number"))
            })
            .transpose()?;

        let zero_fill_units = get("ZERO_FILL").map(|raw| parse_flag(&raw)).transpose()?;

        Ok(Self {
            rental_path: get("RENTAL_PATH"),
            listings_path: get("LISTINGS_PATH"),
            boundaries_path: get("BOUNDARIES_PATH"),
            city: get("CITY"),
            prefix: get("PREFIX"),
            output_dir: get("OUTPUT_DIR"),
            price_multiplier,
            room_type_filter: get("ROOM_TYPE"),
            zero_fill_units,
        })
    }

    /// Resolves the final config, failing if a required value is absent.
    pub fn resolve(self) -> Result<Config> {
        let rental = required(self.rental_path, "rental statistics path")?;
        let listings = required(self.listings_path, "listings path")?;
        let prefix = required(self.prefix, "output prefix")?;

        let mut config = Config::new(&rental, &listings, &prefix);
        config.boundaries_path = non_blank(self.boundaries_path).map(PathBuf::from);
        config.city = non_blank(self.city);
        if let Some(dir) = non_blank(self.output_dir) {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(multiplier) = self.price_multiplier {
            if !(multiplier.is_finite() && multiplier > 0.0) {
                bail!("price multiplier must be a positive number, got {multiplier}");
            }
            config.price_multiplier = multiplier;
        }
        if let Some(room_type) = self.room_type_filter {
            config.room_type_filter = non_blank(Some(room_type));
        }
        if let Some(zero_fill) = self.zero_fill_units {
            config.zero_fill_units = zero_fill;
        }
        Ok(config)
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    non_blank(value).ok_or_else(|| anyhow!("{what} is required"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("'{other}' is not a boolean flag"),
    }
}

/// Thin interactive adapter: asks for whatever the environment did not supply.
pub mod prompt {
    use super::*;

    pub fn fill_missing<R, W>(mut partial: PartialConfig, input: &mut R, output: &mut W) -> Result<Config>
    where
        R: BufRead,
        W: Write,
    {
        if partial.rental_path.is_none() {
            partial.rental_path = Some(ask(input, output, "Enter the path of your rental statistics CSV: ")?);
        }
        if partial.boundaries_path.is_none() {
            partial.boundaries_path = Some(ask(
                input,
                output,
                "Enter the path of the boundary GeoJSON (blank to skip maps): ",
            )?);
        }
        if partial.city.is_none() {
            partial.city = Some(ask(input, output, "Choose a city (blank for every unit): ")?);
        }
        if partial.listings_path.is_none() {
            partial.listings_path = Some(ask(input, output, "Enter the path of your Airbnb listings CSV: ")?);
        }
        if partial.prefix.is_none() {
            partial.prefix = Some(ask(input, output, "Enter a prefix to add to the map filenames: ")?);
        }
        partial.resolve()
    }

    fn ask<R, W>(input: &mut R, output: &mut W, question: &str) -> Result<String>
    where
        R: BufRead,
        W: Write,
    {
        write!(output, "{question}")?;
        output.flush()?;
        let mut line = String::new();
        input.read_line(&mut line).context("failed to read answer")?;
        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_values_resolve_with_defaults() {
        let partial = PartialConfig::from_lookup(lookup_from(&[
            ("FAVMAP_RENTAL_PATH", "input/rentals.csv"),
            ("FAVMAP_LISTINGS_PATH", "https://example.org/listings.csv"),
            ("FAVMAP_PREFIX", "akl"),
        ]))
        .unwrap();
        let config = partial.resolve().unwrap();

        assert_eq!(
            config.rental_source,
            InputSource::File(PathBuf::from("input/rentals.csv"))
        );
        assert!(matches!(config.listings_source, InputSource::Url(_)));
        assert_eq!(config.price_multiplier, 7.0);
        assert_eq!(config.room_type_filter.as_deref(), Some("Entire home/apt"));
        assert!(config.zero_fill_units);
        assert!(config.boundaries_path.is_none());
    }

    #[test]
    fn test_blank_room_type_disables_filter() {
        let partial = PartialConfig::from_lookup(lookup_from(&[
            ("FAVMAP_RENTAL_PATH", "r.csv"),
            ("FAVMAP_LISTINGS_PATH", "l.csv"),
            ("FAVMAP_PREFIX", "p"),
            ("FAVMAP_ROOM_TYPE", ""),
            ("FAVMAP_ZERO_FILL", "no"),
            ("FAVMAP_PRICE_MULTIPLIER", "1"),
        ]))
        .unwrap();
        let config = partial.resolve().unwrap();

        assert!(config.room_type_filter.is_none());
        assert!(!config.zero_fill_units);
        assert_eq!(config.price_multiplier, 1.0);
    }

    #[test]
    fn test_bad_multiplier_is_rejected() {
        let result = PartialConfig::from_lookup(lookup_from(&[("FAVMAP_PRICE_MULTIPLIER", "weekly")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_prompt_fills_only_missing_values() {
        let partial = PartialConfig {
            listings_path: Some("listings.csv".to_string()),
            ..Default::default()
        };
        let mut input = Cursor::new("rentals.csv\n\nWellington City\nwlg\n");
        let mut output = Vec::new();

        let config = prompt::fill_missing(partial, &mut input, &mut output).unwrap();

        assert_eq!(config.rental_source, InputSource::File(PathBuf::from("rentals.csv")));
        assert!(config.boundaries_path.is_none());
        assert_eq!(config.city.as_deref(), Some("Wellington City"));
        assert_eq!(config.prefix, "wlg");
        let asked = String::from_utf8(output).unwrap();
        assert!(!asked.contains("listings CSV"));
    }

    #[test]
    fn test_missing_required_value_fails() {
        let mut input = Cursor::new("\n\n\nl.csv\np\n");
        let mut output = Vec::new();
        let result = prompt::fill_missing(PartialConfig::default(), &mut input, &mut output);
        assert!(result.is_err());
    }
}
