use crate::error::SimError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of simulated sensor a device represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorCategory {
    Temperature,
    Pressure,
    Motion,
    Voltage,
    Custom,
}

impl SensorCategory {
    pub const ALL: [SensorCategory; 5] = [
        SensorCategory::Temperature,
        SensorCategory::Pressure,
        SensorCategory::Motion,
        SensorCategory::Voltage,
        SensorCategory::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorCategory::Temperature => "temperature",
            SensorCategory::Pressure => "pressure",
            SensorCategory::Motion => "motion",
            SensorCategory::Voltage => "voltage",
            SensorCategory::Custom => "custom",
        }
    }

    /// Numeric fields produced for this category with their inclusive bounds.
    pub fn numeric_ranges(&self) -> &'static [(&'static str, f64, f64)] {
        match self {
            SensorCategory::Temperature => &[("temperature", 15.0, 35.0), ("humidity", 30.0, 80.0)],
            SensorCategory::Pressure => &[("pressure", 980.0, 1050.0), ("altitude", 0.0, 500.0)],
            SensorCategory::Motion => &[("distance", 0.0, 10.0)],
            SensorCategory::Voltage => &[("voltage", 210.0, 240.0), ("current", 0.0, 15.0)],
            SensorCategory::Custom => &[("value", 0.0, 100.0)],
        }
    }
}

impl fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorCategory {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SensorCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SimError::Validation(format!("Unknown sensor category: {}", s)))
    }
}

/// One reading as it travels on the wire: a flat JSON object with numeric
/// measurements and an ISO-8601 `timestamp`. Custom readings may carry any
/// additional fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorReading(Map<String, Value>);

impl SensorReading {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(Value::as_f64)
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.0.get("timestamp").and_then(Value::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub(crate) fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }
}

impl From<Map<String, Value>> for SensorReading {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Body delivered to the destination for every send.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorPayload {
    pub api_key: String,
    pub json_data: Vec<SensorReading>,
}

impl SensorPayload {
    pub fn new(api_key: impl Into<String>, json_data: Vec<SensorReading>) -> Self {
        Self {
            api_key: api_key.into(),
            json_data,
        }
    }
}
