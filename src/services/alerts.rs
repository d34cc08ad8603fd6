//! Threshold-based alert evaluation.
//!
//! Pure and stateless: alerts are recomputed fresh from every sample and
//! never persisted or merged across samples. The CSI bands are mutually
//! exclusive (only the highest matching band fires); the remaining rules are
//! independent and additive.

use serde::Serialize;
use utoipa::ToSchema;

use crate::services::monitor::Sample;

/// Temperature at or above which heat stress is critical (°C).
const TEMP_HIGH_C: f64 = 38.0;
/// Humidity at or below which evapotranspiration losses spike (%).
const HUMIDITY_LOW_PCT: f64 = 35.0;
/// Soil moisture at or below which irrigation is needed now (%).
const SOIL_LOW_PCT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

/// A classified alert for one render pass. `key` is the stable identity used
/// by the frontend to de-duplicate within a pass.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Alert {
    #[schema(value_type = String)]
    pub key: &'static str,
    pub level: AlertLevel,
    pub text: String,
}

/// Clamp a crop-stress index to the displayable [0, 100] range. Idempotent.
pub fn clamp_csi(csi: f64) -> f64 {
    csi.clamp(0.0, 100.0)
}

/// Evaluate a sample into its ordered alert list.
pub fn evaluate(sample: &Sample) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let csi = clamp_csi(sample.csi);

    if csi >= 80.0 {
        alerts.push(Alert {
            key: "csi-critical",
            level: AlertLevel::Critical,
            text: format!(
                "Critical crop stress ({}%). Immediate irrigation and canopy cooling needed.",
                csi
            ),
        });
    } else if csi >= 60.0 {
        alerts.push(Alert {
            key: "csi-high",
            level: AlertLevel::Warning,
            text: format!(
                "High crop stress ({}%). Increase irrigation frequency and monitor within 30 minutes.",
                csi
            ),
        });
    } else if csi >= 30.0 {
        alerts.push(Alert {
            key: "csi-moderate",
            level: AlertLevel::Warning,
            text: format!(
                "Moderate crop stress ({}%). Check field conditions and prepare preventive irrigation.",
                csi
            ),
        });
    }

    if sample.temperature >= TEMP_HIGH_C {
        alerts.push(Alert {
            key: "temp-high",
            level: AlertLevel::Critical,
            text: format!(
                "Temperature spike: {} C. Heat stress risk is high.",
                sample.temperature
            ),
        });
    }
    if sample.humidity <= HUMIDITY_LOW_PCT {
        alerts.push(Alert {
            key: "humidity-low",
            level: AlertLevel::Warning,
            text: format!(
                "Low humidity: {}%. Evapotranspiration losses may increase.",
                sample.humidity
            ),
        });
    }
    if sample.soil_moisture <= SOIL_LOW_PCT {
        alerts.push(Alert {
            key: "soil-low",
            level: AlertLevel::Critical,
            text: format!(
                "Low soil moisture: {}%. Irrigation recommended now.",
                sample.soil_moisture
            ),
        });
    }

    if let Some(raw) = sample.alert.as_deref() {
        if !raw.is_empty() {
            let stripped = strip_non_printable(raw);
            alerts.push(Alert {
                key: "backend-alert",
                level: AlertLevel::Critical,
                text: if stripped.is_empty() {
                    "High crop stress detected.".to_string()
                } else {
                    stripped
                },
            });
        }
    }

    alerts
}

/// Overall critical flag for the UI: any produced alert is critical.
pub fn has_critical(alerts: &[Alert]) -> bool {
    alerts.iter().any(|a| a.level == AlertLevel::Critical)
}

/// Keep printable ASCII only (backend alert strings may carry emoji or
/// control characters), then trim.
fn strip_non_printable(s: &str) -> String {
    s.chars()
        .filter(|c| (' '..='~').contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample(csi: f64, temperature: f64, humidity: f64, soil: f64) -> Sample {
        Sample {
            timestamp: Utc::now(),
            temperature,
            humidity,
            soil_moisture: soil,
            csi,
            status: "Healthy".to_string(),
            location_name: "Guntur".to_string(),
            region: "India".to_string(),
            alert: None,
        }
    }

    #[test]
    fn test_clamp_is_idempotent() {
        for csi in [-10.0, 0.0, 42.5, 100.0, 250.0] {
            let once = clamp_csi(csi);
            assert!((0.0..=100.0).contains(&once));
            assert_eq!(clamp_csi(once), once);
        }
    }

    #[test]
    fn test_critical_csi_fires_single_alert() {
        let alerts = evaluate(&sample(85.0, 30.0, 50.0, 50.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key, "csi-critical");
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert!(has_critical(&alerts));
    }

    #[test]
    fn test_low_csi_with_sensor_breaches_fires_three() {
        let alerts = evaluate(&sample(20.0, 39.0, 30.0, 20.0));
        let keys: Vec<_> = alerts.iter().map(|a| a.key).collect();
        assert_eq!(keys, vec!["temp-high", "humidity-low", "soil-low"]);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[1].level, AlertLevel::Warning);
        assert_eq!(alerts[2].level, AlertLevel::Critical);
        assert!(has_critical(&alerts));
    }

    #[test]
    fn test_csi_bands_are_mutually_exclusive() {
        let keys = |csi: f64| -> Vec<&'static str> {
            evaluate(&sample(csi, 25.0, 50.0, 50.0))
                .iter()
                .map(|a| a.key)
                .collect()
        };
        assert!(keys(10.0).is_empty());
        assert_eq!(keys(30.0), vec!["csi-moderate"]);
        assert_eq!(keys(59.9), vec!["csi-moderate"]);
        assert_eq!(keys(60.0), vec!["csi-high"]);
        assert_eq!(keys(79.9), vec!["csi-high"]);
        assert_eq!(keys(80.0), vec!["csi-critical"]);
    }

    #[test]
    fn test_csi_clamped_before_banding() {
        // 250 clamps to 100, landing in the critical band — not unbanded.
        let alerts = evaluate(&sample(250.0, 25.0, 50.0, 50.0));
        assert_eq!(alerts[0].key, "csi-critical");
        assert!(alerts[0].text.contains("100%"));
    }

    #[test]
    fn test_warning_only_sample_is_not_critical() {
        let alerts = evaluate(&sample(45.0, 25.0, 50.0, 50.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key, "csi-moderate");
        assert!(!has_critical(&alerts));
    }

    #[test]
    fn test_backend_alert_stripped_of_non_printables() {
        let mut s = sample(10.0, 25.0, 50.0, 50.0);
        s.alert = Some("\u{26a0} High Crop Stress \u{2013} Irrigation Recommended".to_string());
        let alerts = evaluate(&s);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].key, "backend-alert");
        assert_eq!(alerts[0].level, AlertLevel::Critical);
        assert_eq!(alerts[0].text, "High Crop Stress  Irrigation Recommended");
    }

    #[test]
    fn test_backend_alert_all_non_printable_uses_fallback_text() {
        let mut s = sample(10.0, 25.0, 50.0, 50.0);
        s.alert = Some("\u{26a0}\u{fe0f}".to_string());
        let alerts = evaluate(&s);
        assert_eq!(alerts[0].text, "High crop stress detected.");
    }

    #[test]
    fn test_empty_backend_alert_is_absent() {
        let mut s = sample(10.0, 25.0, 50.0, 50.0);
        s.alert = Some(String::new());
        assert!(evaluate(&s).is_empty());
        s.alert = None;
        assert!(evaluate(&s).is_empty());
    }

    #[test]
    fn test_deterministic_for_identical_input() {
        let s = sample(65.0, 39.0, 20.0, 10.0);
        let a = evaluate(&s);
        let b = evaluate(&s);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.key, y.key);
            assert_eq!(x.text, y.text);
        }
    }
}
