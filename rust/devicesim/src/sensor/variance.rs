use super::interface::{SensorCategory, SensorPayload, SensorReading};
use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde_json::Value;

/// Maximum relative perturbation applied to a numeric field.
pub const VARIANCE_RATIO: f64 = 0.02;
/// Chance that a motion reading's `motion_detected` flag is inverted.
pub const MOTION_FLIP_PROBABILITY: f64 = 0.2;

pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const MOTION_FIELD: &str = "motion_detected";

pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn generate_sample(category: SensorCategory) -> SensorReading {
    generate_sample_with(&mut rand::thread_rng(), category)
}

pub fn generate_sample_with<R: Rng + ?Sized>(rng: &mut R, category: SensorCategory) -> SensorReading {
    let mut reading = SensorReading::new();
    for &(field, min, max) in category.numeric_ranges() {
        reading = reading.with_field(field, round2(rng.gen_range(min..=max)));
    }
    if category == SensorCategory::Motion {
        reading = reading.with_field(MOTION_FIELD, rng.gen_bool(0.5));
    }
    if category == SensorCategory::Custom {
        reading = reading.with_field("unit", "units");
    }
    reading.with_field(TIMESTAMP_FIELD, now_timestamp())
}

/// Builds a payload of `count` fresh samples for a device.
pub fn generate_payload(category: SensorCategory, api_key: &str, count: usize) -> SensorPayload {
    let mut rng = rand::thread_rng();
    let json_data = (0..count.max(1))
        .map(|_| generate_sample_with(&mut rng, category))
        .collect();
    SensorPayload::new(api_key, json_data)
}

/// Returns a copy of `payload` with sensor noise applied. The key set of every
/// reading is preserved; only numeric magnitudes (and, for motion sensors, the
/// detection flag) change.
pub fn add_variance(payload: &SensorPayload, category: SensorCategory) -> SensorPayload {
    add_variance_with(&mut rand::thread_rng(), payload, category)
}

pub fn add_variance_with<R: Rng + ?Sized>(
    rng: &mut R,
    payload: &SensorPayload,
    category: SensorCategory,
) -> SensorPayload {
    let json_data = payload
        .json_data
        .iter()
        .map(|reading| perturb_reading(rng, reading, category))
        .collect();
    SensorPayload::new(payload.api_key.clone(), json_data)
}

fn perturb_reading<R: Rng + ?Sized>(
    rng: &mut R,
    reading: &SensorReading,
    category: SensorCategory,
) -> SensorReading {
    let mut out = reading.clone();
    for (key, value) in out.fields_mut().iter_mut() {
        if key == TIMESTAMP_FIELD {
            continue;
        }
        if value.is_number() {
            if let Some(v) = value.as_f64() {
                let factor = 1.0 + rng.gen_range(-VARIANCE_RATIO..=VARIANCE_RATIO);
                let varied = round2(v * factor);
                // an overflowed result would serialize as null
                if varied.is_finite() {
                    *value = Value::from(varied);
                }
            }
        } else if category == SensorCategory::Motion && key == MOTION_FIELD {
            if let Some(detected) = value.as_bool() {
                if rng.gen_bool(MOTION_FLIP_PROBABILITY) {
                    *value = Value::Bool(!detected);
                }
            }
        }
    }
    out
}
