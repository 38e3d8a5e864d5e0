//! # Gain schedule
//!
//! The lateral controller gains are scheduled on vehicle speed. The table is a list of buckets,
//! each with an upper speed bound, probed in the order given. The first bucket whose bound is
//! strictly above the current speed supplies the gains.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID gain triple.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gains {
    /// Proportional gain
    pub k_p: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Integral gain
    pub k_i: f64,
}

/// One entry of the gain table.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
pub struct GainBucket {
    /// The bucket applies to speeds strictly below this bound.
    ///
    /// Units: km/h
    pub speed_upper_bound: f64,

    /// Proportional gain
    pub k_p: f64,

    /// Derivative gain
    pub k_d: f64,

    /// Integral gain
    pub k_i: f64,
}

/// Speed scheduled gain table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct GainTable {
    buckets: Vec<GainBucket>,
}

/// Gains as stored in the JSON tuning files.
#[derive(Deserialize)]
struct JsonGains {
    #[serde(rename = "Kp")]
    k_p: f64,
    #[serde(rename = "Kd")]
    k_d: f64,
    #[serde(rename = "Ki")]
    k_i: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while loading a gain table.
#[derive(Debug, thiserror::Error)]
pub enum GainTableError {
    #[error("Gain table is not valid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Gain table key {0:?} is not a speed bound")]
    InvalidSpeedBound(String),

    #[error("Gain table entry {0:?} is malformed: {1}")]
    InvalidEntry(String, serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Gains {
    /// Proportional only fallback used when no bucket matches.
    pub const NEUTRAL: Gains = Gains {
        k_p: 1.0,
        k_d: 0.0,
        k_i: 0.0,
    };
}

impl Default for Gains {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

impl GainBucket {
    pub fn gains(&self) -> Gains {
        Gains {
            k_p: self.k_p,
            k_d: self.k_d,
            k_i: self.k_i,
        }
    }
}

impl GainTable {
    /// Build a table from buckets, keeping their order.
    pub fn new(buckets: Vec<GainBucket>) -> Self {
        Self { buckets }
    }

    /// Parse a JSON gain table of the form
    /// `{"60": {"Kp": 0.8, "Kd": 0.05, "Ki": 0.05}, ...}`.
    ///
    /// Key order in the document is the probe order.
    pub fn from_json_str(json: &str) -> Result<Self, GainTableError> {
        let map: Map<String, Value> =
            serde_json::from_str(json).map_err(GainTableError::InvalidJson)?;

        let mut buckets = Vec::with_capacity(map.len());

        for (key, value) in map {
            let speed_upper_bound: f64 = key
                .trim()
                .parse()
                .map_err(|_| GainTableError::InvalidSpeedBound(key.clone()))?;

            let g: JsonGains = serde_json::from_value(value)
                .map_err(|e| GainTableError::InvalidEntry(key.clone(), e))?;

            buckets.push(GainBucket {
                speed_upper_bound,
                k_p: g.k_p,
                k_d: g.k_d,
                k_i: g.k_i,
            });
        }

        if buckets.is_empty() {
            warn!("Loaded an empty gain table, neutral gains will always be used");
        }

        Ok(Self { buckets })
    }

    /// The buckets in probe order.
    pub fn buckets(&self) -> &[GainBucket] {
        &self.buckets
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Get the gains for the given speed.
    ///
    /// Returns `Gains::NEUTRAL` if the speed is not below any bound, which includes an empty table
    /// and a non-finite speed.
    pub fn lookup(&self, speed_kmh: f64) -> Gains {
        self.buckets
            .iter()
            .find(|b| speed_kmh < b.speed_upper_bound)
            .map(GainBucket::gains)
            .unwrap_or(Gains::NEUTRAL)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn bucket(bound: f64, k_p: f64) -> GainBucket {
        GainBucket {
            speed_upper_bound: bound,
            k_p,
            k_d: 0.1,
            k_i: 0.01,
        }
    }

    #[test]
    fn test_first_bucket_wins() {
        let table = GainTable::new(vec![bucket(50.0, 0.8), bucket(100.0, 0.5)]);

        assert_eq!(table.lookup(30.0).k_p, 0.8);
        assert_eq!(table.lookup(50.0).k_p, 0.5);
        assert_eq!(table.lookup(99.9).k_p, 0.5);
    }

    #[test]
    fn test_probe_order_is_table_order() {
        // An unsorted table is not re-sorted, the wider bucket listed first wins
        let table = GainTable::new(vec![bucket(100.0, 0.5), bucket(50.0, 0.8)]);
        assert_eq!(table.lookup(30.0).k_p, 0.5);
    }

    #[test]
    fn test_neutral_fallback() {
        let table = GainTable::new(vec![bucket(50.0, 0.8), bucket(100.0, 0.5)]);
        assert_eq!(table.lookup(150.0), Gains::NEUTRAL);
        assert_eq!(table.lookup(100.0), Gains::NEUTRAL);
        assert_eq!(table.lookup(std::f64::NAN), Gains::NEUTRAL);

        assert_eq!(GainTable::default().lookup(10.0), Gains::NEUTRAL);
        assert_eq!(Gains::NEUTRAL, Gains { k_p: 1.0, k_d: 0.0, k_i: 0.0 });
    }

    #[test]
    fn test_from_json_keeps_document_order() {
        let table = GainTable::from_json_str(
            r#"{
                "120": {"Kp": 0.4, "Kd": 0.2, "Ki": 0.02},
                "60": {"Kp": 0.8, "Kd": 0.05, "Ki": 0.05},
                "300": {"Kp": 0.2, "Kd": 0.3, "Ki": 0.0}
            }"#,
        )
        .unwrap();

        let bounds: Vec<f64> = table.buckets().iter().map(|b| b.speed_upper_bound).collect();
        assert_eq!(bounds, vec![120.0, 60.0, 300.0]);

        // 30 is below 120, which is probed first
        assert_eq!(table.lookup(30.0).k_p, 0.4);
        assert_eq!(table.lookup(200.0).k_d, 0.3);
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            GainTable::from_json_str(r#"{"fast": {"Kp": 1.0, "Kd": 0.0, "Ki": 0.0}}"#),
            Err(GainTableError::InvalidSpeedBound(_))
        ));
        assert!(matches!(
            GainTable::from_json_str(r#"{"60": {"Kp": 1.0}}"#),
            Err(GainTableError::InvalidEntry(_, _))
        ));
        assert!(matches!(
            GainTable::from_json_str("[1, 2]"),
            Err(GainTableError::InvalidJson(_))
        ));
        assert!(GainTable::from_json_str("{}").unwrap().is_empty());
    }
}
