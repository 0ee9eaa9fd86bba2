//! Chart selection parsing and PNG rendering.
//!
//! The model answers the chart prompt with a single `KIND,X,Y` line. That
//! line is parsed into a [`ChartSpec`] and drawn with [`render`] against the
//! rows of the last successful query. Every failure is a [`ChartError`]; the
//! chart step logs it and leaves the run without a chart.

mod render;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use sherlock_core::outcome::Row;

pub use render::render;

/// The fixed set of chart families the model may choose from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "pie" => Ok(ChartKind::Pie),
            _ => Err(ChartError::UnknownKind(s.trim().to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("expected `KIND,X_COLUMN,Y_COLUMN`, got {0:?}")]
    Malformed(String),

    #[error("unknown chart kind {0:?}")]
    UnknownKind(String),

    #[error("column {0:?} is not in the result")]
    UnknownColumn(String),

    #[error("column {column:?} has a non-numeric value in row {row}")]
    NonNumeric { column: String, row: usize },

    #[error("no rows to chart")]
    EmptyData,

    #[error("values cannot be drawn as a {kind} chart: {reason}")]
    InvalidValues { kind: ChartKind, reason: String },

    #[error("PNG encoding failed: {0}")]
    Encode(String),
}

/// A parsed chart decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    /// Category / label column.
    pub x: String,
    /// Numeric column.
    pub y: String,
}

impl ChartSpec {
    /// Parse the model's reply. The reply must be exactly three non-empty
    /// comma-separated fields after trimming.
    pub fn parse(text: &str) -> Result<Self, ChartError> {
        let fields: Vec<&str> = text.trim().split(',').map(str::trim).collect();
        let [kind, x, y] = fields.as_slice() else {
            return Err(ChartError::Malformed(text.trim().to_string()));
        };
        if x.is_empty() || y.is_empty() {
            return Err(ChartError::Malformed(text.trim().to_string()));
        }
        Ok(Self {
            kind: kind.parse()?,
            x: (*x).to_string(),
            y: (*y).to_string(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
}

impl ChartOptions {
    pub const MIN_SIDE: u32 = 100;
    pub const MAX_SIDE: u32 = 4096;

    /// The same options with each side forced into `MIN_SIDE..=MAX_SIDE`.
    pub fn clamped(self) -> Self {
        Self {
            width: self.width.clamp(Self::MIN_SIDE, Self::MAX_SIDE),
            height: self.height.clamp(Self::MIN_SIDE, Self::MAX_SIDE),
        }
    }
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
        }
    }
}

/// The two named fields pulled out of the result rows.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Series {
    /// `x` values as display text, one per row.
    pub labels: Vec<String>,
    /// `x` values as numbers, when every one of them is numeric.
    pub positions: Option<Vec<f64>>,
    /// `y` values.
    pub values: Vec<f64>,
}

fn as_number(value: &serde_json::Value) -> Option<f64> {
    let number = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

fn as_label(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Extract `x` and `y` from `rows`. Numeric strings count as numbers since
/// SQLite happily stores numbers as text.
pub(crate) fn series(rows: &[Row], x: &str, y: &str) -> Result<Series, ChartError> {
    let Some(first) = rows.first() else {
        return Err(ChartError::EmptyData);
    };
    for column in [x, y] {
        if !first.contains_key(column) {
            return Err(ChartError::UnknownColumn(column.to_string()));
        }
    }

    let mut labels = Vec::with_capacity(rows.len());
    let mut positions = Some(Vec::with_capacity(rows.len()));
    let mut values = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let x_value = row
            .get(x)
            .ok_or_else(|| ChartError::UnknownColumn(x.to_string()))?;
        let y_value = row
            .get(y)
            .ok_or_else(|| ChartError::UnknownColumn(y.to_string()))?;

        let value = as_number(y_value).ok_or_else(|| ChartError::NonNumeric {
            column: y.to_string(),
            row: i,
        })?;
        values.push(value);
        labels.push(as_label(x_value));
        positions = positions.and_then(|mut p: Vec<f64>| {
            p.push(as_number(x_value)?);
            Some(p)
        });
    }

    Ok(Series {
        labels,
        positions,
        values,
    })
}
