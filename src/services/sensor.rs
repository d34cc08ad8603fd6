//! Simulated field-sensor feed.
//!
//! Generates the live-data samples served by `/api/live-data`: uniform draws
//! for the raw sensor values and a weighted crop-stress index derived from
//! them. Stress weights: temperature 0.4, humidity 0.3, soil moisture 0.3,
//! each normalized over its sensor's simulated range.

use chrono::Utc;
use rand::Rng;

use crate::services::monitor::Sample;

const TEMP_RANGE_C: (f64, f64) = (20.0, 45.0);
const HUMIDITY_RANGE_PCT: (f64, f64) = (20.0, 90.0);
const SOIL_RANGE_PCT: (f64, f64) = (10.0, 80.0);

/// CSI above which the backend raises its own alert string.
const BACKEND_ALERT_CSI: f64 = 75.0;

const BACKEND_ALERT_TEXT: &str = "\u{26a0} High Crop Stress \u{2013} Irrigation Recommended";

/// Generate one sample for the given location.
pub fn generate_sample(location_name: &str, region: &str) -> Sample {
    let mut rng = rand::thread_rng();
    let temperature = round2(rng.gen_range(TEMP_RANGE_C.0..=TEMP_RANGE_C.1));
    let humidity = round2(rng.gen_range(HUMIDITY_RANGE_PCT.0..=HUMIDITY_RANGE_PCT.1));
    let soil_moisture = round2(rng.gen_range(SOIL_RANGE_PCT.0..=SOIL_RANGE_PCT.1));

    let csi = crop_stress_index(temperature, humidity, soil_moisture);

    Sample {
        timestamp: Utc::now(),
        temperature,
        humidity,
        soil_moisture,
        csi,
        status: status_band(csi).to_string(),
        location_name: location_name.to_string(),
        region: region.to_string(),
        alert: backend_alert(csi),
    }
}

/// Weighted crop-stress index on [≈0, 100], rounded to 2 decimal places.
pub fn crop_stress_index(temperature: f64, humidity: f64, soil_moisture: f64) -> f64 {
    let temp_stress = (temperature - TEMP_RANGE_C.0) / (TEMP_RANGE_C.1 - TEMP_RANGE_C.0);
    let humidity_stress =
        (HUMIDITY_RANGE_PCT.1 - humidity) / (HUMIDITY_RANGE_PCT.1 - HUMIDITY_RANGE_PCT.0);
    let moisture_stress = (SOIL_RANGE_PCT.1 - soil_moisture) / (SOIL_RANGE_PCT.1 - SOIL_RANGE_PCT.0);

    round2((0.4 * temp_stress + 0.3 * humidity_stress + 0.3 * moisture_stress) * 100.0)
}

/// Status band for a CSI value.
pub fn status_band(csi: f64) -> &'static str {
    if csi > 80.0 {
        "Critical"
    } else if csi > 60.0 {
        "High Risk"
    } else if csi > 30.0 {
        "Moderate"
    } else {
        "Healthy"
    }
}

fn backend_alert(csi: f64) -> Option<String> {
    (csi > BACKEND_ALERT_CSI).then(|| BACKEND_ALERT_TEXT.to_string())
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
