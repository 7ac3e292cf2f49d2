pub mod interface;
pub mod variance;

pub use interface::{SensorCategory, SensorPayload, SensorReading};
pub use variance::{add_variance, generate_payload, generate_sample};

#[cfg(test)]
mod tests {
    use super::variance::{MOTION_FIELD, TIMESTAMP_FIELD, VARIANCE_RATIO};
    use super::*;
    use std::collections::BTreeSet;

    fn within_variance(original: f64, perturbed: f64) -> bool {
        // rounding to two decimals may add up to half a cent on top of the jitter
        (perturbed - original).abs() <= original.abs() * VARIANCE_RATIO + 0.005 + 1e-9
    }

    #[test]
    fn test_generate_sample_ranges() {
        for category in SensorCategory::ALL {
            for _ in 0..200 {
                let reading = generate_sample(category);
                for &(field, min, max) in category.numeric_ranges() {
                    let value = reading.get_f64(field).unwrap();
                    assert!(
                        value >= min && value <= max,
                        "{} {} = {} outside [{}, {}]",
                        category,
                        field,
                        value,
                        min,
                        max
                    );
                }
                let timestamp = reading.timestamp().unwrap();
                assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
            }
        }
    }

    #[test]
    fn test_generate_sample_motion_has_flag() {
        let reading = generate_sample(SensorCategory::Motion);
        assert!(reading.get(MOTION_FIELD).unwrap().is_boolean());
    }

    #[test]
    fn test_generate_payload_count() {
        let payload = generate_payload(SensorCategory::Voltage, "key-1", 3);
        assert_eq!(payload.api_key, "key-1");
        assert_eq!(payload.json_data.len(), 3);
    }

    #[test]
    fn test_add_variance_preserves_keys_and_bounds() {
        for category in SensorCategory::ALL {
            let payload = generate_payload(category, "key", 5);
            for _ in 0..50 {
                let varied = add_variance(&payload, category);
                assert_eq!(varied.api_key, payload.api_key);
                assert_eq!(varied.json_data.len(), payload.json_data.len());
                for (before, after) in payload.json_data.iter().zip(&varied.json_data) {
                    let before_keys: BTreeSet<_> = before.keys().collect();
                    let after_keys: BTreeSet<_> = after.keys().collect();
                    assert_eq!(before_keys, after_keys);
                    assert_eq!(before.get(TIMESTAMP_FIELD), after.get(TIMESTAMP_FIELD));
                    for &(field, _, _) in category.numeric_ranges() {
                        let original = before.get_f64(field).unwrap();
                        let perturbed = after.get_f64(field).unwrap();
                        assert!(within_variance(original, perturbed));
                    }
                }
            }
        }
    }

    #[test]
    fn test_add_variance_passes_through_non_numeric_fields() {
        let reading = SensorReading::new()
            .with_field("value", 50.0)
            .with_field("label", "boiler room")
            .with_field("active", true)
            .with_field(TIMESTAMP_FIELD, "2024-01-01T00:00:00.000Z");
        let payload = SensorPayload::new("key", vec![reading]);

        let varied = add_variance(&payload, SensorCategory::Custom);
        let out = &varied.json_data[0];
        assert_eq!(out.get("label").unwrap(), "boiler room");
        assert_eq!(out.get("active").unwrap(), true);
        assert_eq!(out.timestamp(), Some("2024-01-01T00:00:00.000Z"));
        assert!(within_variance(50.0, out.get_f64("value").unwrap()));
    }

    #[test]
    fn test_add_variance_keeps_values_that_would_overflow() {
        let reading = SensorReading::new()
            .with_field("value", f64::MAX)
            .with_field("floor", -f64::MAX);
        let payload = SensorPayload::new("key", vec![reading]);

        for _ in 0..50 {
            let varied = add_variance(&payload, SensorCategory::Custom);
            let out = &varied.json_data[0];
            assert_eq!(out.get_f64("value"), Some(f64::MAX));
            assert_eq!(out.get_f64("floor"), Some(-f64::MAX));
        }
    }

    #[test]
    fn test_motion_flag_flip_frequency() {
        let reading = SensorReading::new()
            .with_field(MOTION_FIELD, false)
            .with_field("distance", 4.0);
        let payload = SensorPayload::new("key", vec![reading]);

        let trials = 1000;
        let flips = (0..trials)
            .filter(|_| {
                let varied = add_variance(&payload, SensorCategory::Motion);
                varied.json_data[0].get(MOTION_FIELD).unwrap() == true
            })
            .count();
        let frequency = flips as f64 / trials as f64;
        assert!(
            (0.15..=0.25).contains(&frequency),
            "observed flip frequency {}",
            frequency
        );
    }

    #[test]
    fn test_motion_flag_untouched_for_other_categories() {
        let reading = SensorReading::new().with_field(MOTION_FIELD, false);
        let payload = SensorPayload::new("key", vec![reading]);
        for _ in 0..200 {
            let varied = add_variance(&payload, SensorCategory::Custom);
            assert_eq!(varied.json_data[0].get(MOTION_FIELD).unwrap(), false);
        }
    }

    #[test]
    fn test_category_parse() {
        assert_eq!("Motion".parse::<SensorCategory>().unwrap(), SensorCategory::Motion);
        assert!("sonar".parse::<SensorCategory>().is_err());
    }
}
