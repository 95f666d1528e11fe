//! Measurement points and batches.
//!
//! A [`MeasurementPoint`] is a named series with a tag set, a field set and a
//! timestamp. Points are encoded to InfluxDB line protocol at second
//! precision when a [`Batch`] is transmitted.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Encoded as integer nanoseconds.
    Duration(Duration),
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u16> for FieldValue {
    fn from(v: u16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Duration> for FieldValue {
    fn from(v: Duration) -> Self {
        Self::Duration(v)
    }
}

/// A measurement observed at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    pub series: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl MeasurementPoint {
    /// Create an empty point stamped with the current time.
    pub fn new(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Encode as one line of InfluxDB line protocol.
    ///
    /// Returns `None` when the point has no encodable field, which the
    /// write API would reject. Empty tag values and non-finite floats are
    /// omitted.
    pub fn to_line_protocol(&self) -> Option<String> {
        let mut fields = String::new();
        for (key, value) in &self.fields {
            let encoded = match value {
                FieldValue::Str(s) => format!("\"{}\"", escape_string_field(s)),
                FieldValue::Int(i) => format!("{i}i"),
                FieldValue::Float(f) if f.is_finite() => format!("{f}"),
                FieldValue::Float(_) => continue,
                FieldValue::Bool(b) => b.to_string(),
                FieldValue::Duration(d) => {
                    format!("{}i", i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
                }
            };
            if !fields.is_empty() {
                fields.push(',');
            }
            let _ = write!(fields, "{}={}", escape_key(key), encoded);
        }
        if fields.is_empty() {
            return None;
        }

        let mut line = escape_measurement(&self.series);
        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
        }
        let _ = write!(line, " {} {}", fields, self.timestamp.timestamp());
        Some(line)
    }
}

// Line protocol has no escape for line breaks, so they become spaces.
fn flatten_line_breaks(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

fn escape_measurement(s: &str) -> String {
    flatten_line_breaks(s).replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_key(s: &str) -> String {
    flatten_line_breaks(s)
        .replace(',', "\\,")
        .replace('=', "\\=")
        .replace(' ', "\\ ")
}

fn escape_string_field(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Points accumulated between two flushes.
///
/// Owned by the batch actor; once swapped out it is only read for
/// transmission and then dropped.
#[derive(Debug, Default)]
pub struct Batch {
    points: Vec<MeasurementPoint>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: MeasurementPoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[MeasurementPoint] {
        &self.points
    }

    /// Encode every point, one per line. Points without fields are skipped.
    pub fn to_line_protocol(&self) -> String {
        let mut body = String::new();
        for point in &self.points {
            match point.to_line_protocol() {
                Some(line) => {
                    body.push_str(&line);
                    body.push('\n');
                }
                None => {
                    tracing::warn!(series = %point.series, "Skipping point without fields");
                }
            }
        }
        body
    }
}
