use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while reading one of the input datasets.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("could not open input '{path}': {source}")]
    InvalidInputPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not fetch input '{url}': {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{dataset} data is missing required column '{column}'")]
    MissingColumn {
        dataset: &'static str,
        column: String,
    },

    #[error("listings have no '{column}' column and no boundary file was given to locate them by coordinates")]
    NeedsBoundaries { column: String },

    #[error("failed to read {dataset} CSV: {source}")]
    Csv {
        dataset: &'static str,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Error)]
pub enum GeographyError {
    #[error("could not open boundaries '{path}': {source}")]
    InvalidInputPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("boundaries are not valid GeoJSON: {0}")]
    Parse(#[from] geojson::Error),

    #[error("boundaries must be a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    #[error("no boundary features remain after filtering to '{0}'")]
    EmptyAfterFilter(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write comparison table: {0}")]
    Csv(#[from] csv::Error),

    #[error("no boundary geometry overlaps the comparison table")]
    NothingToDraw,
}

/// A non-fatal problem with a single input row. The row is skipped and the
/// issue is reported in the run summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowIssue {
    MissingField {
        line: usize,
        column: String,
    },
    InvalidValue {
        line: usize,
        column: String,
        value: String,
    },
    Unlocated {
        line: usize,
        latitude: f64,
        longitude: f64,
    },
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowIssue::MissingField { line, column } => {
                write!(f, "line {line}: missing value for '{column}'")
            }
            RowIssue::InvalidValue {
                line,
                column,
                value,
            } => write!(f, "line {line}: '{value}' is not a valid '{column}'"),
            RowIssue::Unlocated {
                line,
                latitude,
                longitude,
            } => write!(
                f,
                "line {line}: ({latitude}, {longitude}) is outside every boundary"
            ),
        }
    }
}
