//! # Region calibration table
//!
//! Each region of the track has an ordered list of stages. A stage is an ordered list of guarded
//! rules where the first matching rule wins. Stages are evaluated in order and a later stage that
//! matches replaces whatever an earlier stage decided, which is how "check this last and
//! overwrite" behaviour is written down in the table.
//!
//! A rule in the parameter file looks like:
//!
//! ```toml
//! { when = { all = ["sharp_error >= 0.68", "speed > 80"] }, then = { throttle = -0.6, brake = 1.0 } }
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Speed coefficient inside the wide turn throttle reduction.
pub const WIDE_TURN_SPEED_FACTOR: f64 = 0.003;

/// Exponent of the wide turn throttle reduction.
pub const WIDE_TURN_EXPONENT: i32 = 6;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The values rules are evaluated against.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize)]
pub struct RuleInputs {
    /// Absolute sharp error rounded to 3 decimal places
    pub sharp_error: f64,

    /// Absolute wide error rounded to 3 decimal places
    pub wide_error: f64,

    /// Units: km/h
    pub speed: f64,

    /// True while a braking pulse is active
    pub pulse_active: bool,
}

/// A single comparison, written as `"<signal> <comparator> <value>"`, e.g. `"speed <= 105"`.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Condition {
    pub signal: Signal,
    pub cmp: Comparator,
    pub value: f64,
}

/// Conditions a rule requires.
///
/// All of `all` must hold and, if `any` is not empty, at least one of `any`. With `brake_pulse`
/// set the rule only matches during a braking pulse. An empty guard always matches.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Guard {
    #[serde(default)]
    pub all: Vec<Condition>,

    #[serde(default)]
    pub any: Vec<Condition>,

    #[serde(default)]
    pub brake_pulse: bool,
}

/// A guarded response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    #[serde(default)]
    pub when: Guard,

    pub then: Response,

    /// Steering demand replacing the lateral controller's output when this rule is chosen
    #[serde(default)]
    pub steering: Option<f64>,
}

/// First-match list of rules.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Stage {
    pub rules: Vec<Rule>,
}

/// Calibration for one region.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionRules {
    #[serde(default)]
    pub name: String,

    /// Distance to the head of the braking queue at which a braking pulse is triggered. Only
    /// regions with this set consume braking waypoints or run braking pulses.
    ///
    /// Units: meters
    #[serde(default)]
    pub braking_trigger_m: Option<f64>,

    /// Steering demand replacing the lateral controller's output for the whole region
    #[serde(default)]
    pub steering: Option<f64>,

    pub stages: Vec<Stage>,
}

/// The full table, region 1 first.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegionTable {
    pub regions: Vec<RegionRules>,
}

/// Throttle and brake pair.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Pedals {
    pub throttle: f64,
    pub brake: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Inputs a condition can test.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Signal {
    SharpError,
    WideError,
    Speed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
}

/// What a rule commands.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Fixed throttle and brake
    Fixed { throttle: f64, brake: f64 },

    /// Throttle reduced with wide error and speed, `max(0, 1 - c*(wide + 0.003*speed)^6)`, no
    /// brake
    WideTurn { wide_turn: f64 },
}

/// Errors in a region table.
#[derive(Debug, thiserror::Error)]
pub enum RegionTableError {
    #[error("The region table is empty")]
    Empty,

    #[error("Region {0} has no stages")]
    NoStages(usize),

    #[error("Region {0} stage {1} has no rules")]
    EmptyStage(usize, usize),

    #[error("Region {0} has an invalid braking trigger distance {1}")]
    InvalidBrakingTrigger(usize, f64),

    #[error("Region {0} contains a non-finite value")]
    NonFinite(usize),
}

/// Errors loading a region table.
#[derive(Debug, thiserror::Error)]
pub enum RegionTableLoadError {
    #[error("Could not load the region table: {0}")]
    Load(util::params::LoadError),

    #[error("Invalid region table: {0}")]
    Invalid(RegionTableError),
}

/// Errors parsing a condition string.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ConditionParseError {
    #[error("Expected \"<signal> <comparator> <value>\", found {0:?}")]
    Malformed(String),

    #[error("Unknown signal {0:?}, expected sharp_error, wide_error or speed")]
    UnknownSignal(String),

    #[error("Unknown comparator {0:?}, expected <, <=, > or >=")]
    UnknownComparator(String),

    #[error("Invalid threshold {0:?}")]
    InvalidValue(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pedals {
    /// Full acceleration, no brake
    pub const FULL_THROTTLE: Pedals = Pedals {
        throttle: 1.0,
        brake: 0.0,
    };

    /// Full reverse throttle and full brake, used for braking pulses
    pub const HARD_BRAKE: Pedals = Pedals {
        throttle: -1.0,
        brake: 1.0,
    };
}

impl RuleInputs {
    fn get(&self, signal: Signal) -> f64 {
        match signal {
            Signal::SharpError => self.sharp_error,
            Signal::WideError => self.wide_error,
            Signal::Speed => self.speed,
        }
    }
}

impl Condition {
    pub fn new(signal: Signal, cmp: Comparator, value: f64) -> Self {
        Self { signal, cmp, value }
    }

    pub fn holds(&self, inputs: &RuleInputs) -> bool {
        let x = inputs.get(self.signal);

        match self.cmp {
            Comparator::Lt => x < self.value,
            Comparator::Le => x <= self.value,
            Comparator::Gt => x > self.value,
            Comparator::Ge => x >= self.value,
        }
    }
}

impl FromStr for Condition {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        if tokens.len() != 3 {
            return Err(ConditionParseError::Malformed(s.to_string()));
        }

        let signal = match tokens[0] {
            "sharp_error" => Signal::SharpError,
            "wide_error" => Signal::WideError,
            "speed" => Signal::Speed,
            other => return Err(ConditionParseError::UnknownSignal(other.to_string())),
        };

        let cmp = match tokens[1] {
            "<" => Comparator::Lt,
            "<=" => Comparator::Le,
            ">" => Comparator::Gt,
            ">=" => Comparator::Ge,
            other => return Err(ConditionParseError::UnknownComparator(other.to_string())),
        };

        let value = tokens[2]
            .parse()
            .map_err(|_| ConditionParseError::InvalidValue(tokens[2].to_string()))?;

        Ok(Self { signal, cmp, value })
    }
}

impl TryFrom<String> for Condition {
    type Error = ConditionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl Guard {
    pub fn matches(&self, inputs: &RuleInputs) -> bool {
        (!self.brake_pulse || inputs.pulse_active)
            && self.all.iter().all(|c| c.holds(inputs))
            && (self.any.is_empty() || self.any.iter().any(|c| c.holds(inputs)))
    }
}

impl Response {
    /// Get the throttle and brake for the given inputs.
    pub fn pedals(&self, inputs: &RuleInputs) -> Pedals {
        match *self {
            Response::Fixed { throttle, brake } => Pedals { throttle, brake },
            Response::WideTurn { wide_turn } => {
                let x = inputs.wide_error + inputs.speed * WIDE_TURN_SPEED_FACTOR;
                Pedals {
                    throttle: (1.0 - wide_turn * x.powi(WIDE_TURN_EXPONENT)).max(0.0),
                    brake: 0.0,
                }
            }
        }
    }

    fn is_finite(&self) -> bool {
        match *self {
            Response::Fixed { throttle, brake } => throttle.is_finite() && brake.is_finite(),
            Response::WideTurn { wide_turn } => wide_turn.is_finite(),
        }
    }
}

impl Stage {
    /// Index of the first matching rule.
    pub fn first_match(&self, inputs: &RuleInputs) -> Option<usize> {
        self.rules.iter().position(|r| r.when.matches(inputs))
    }
}

impl RegionRules {
    pub fn is_braking(&self) -> bool {
        self.braking_trigger_m.is_some()
    }
}

impl RegionTable {
    /// Load and validate a table from a file in the parameters directory.
    pub fn load(param_file_path: &str) -> Result<Self, RegionTableLoadError> {
        let table: Self = util::params::load(param_file_path)
            .map_err(RegionTableLoadError::Load)?;
        table.validate().map_err(RegionTableLoadError::Invalid)?;
        Ok(table)
    }

    /// Parse and validate a table from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, RegionTableLoadError> {
        let table: Self = util::params::load_str(toml_str)
            .map_err(RegionTableLoadError::Load)?;
        table.validate().map_err(RegionTableLoadError::Invalid)?;
        Ok(table)
    }

    /// Get the rules for a 1-based region index.
    pub fn get(&self, region_index: usize) -> Option<&RegionRules> {
        region_index
            .checked_sub(1)
            .and_then(|i| self.regions.get(i))
    }

    /// Number of regions, which is also the index of the terminal region.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Check the table is usable.
    pub fn validate(&self) -> Result<(), RegionTableError> {
        if self.regions.is_empty() {
            return Err(RegionTableError::Empty);
        }

        for (i, region) in self.regions.iter().enumerate() {
            let index = i + 1;

            if region.stages.is_empty() {
                return Err(RegionTableError::NoStages(index));
            }

            if let Some(d) = region.braking_trigger_m {
                if !d.is_finite() || d < 0.0 {
                    return Err(RegionTableError::InvalidBrakingTrigger(index, d));
                }
            }

            if region.steering.map_or(false, |s| !s.is_finite()) {
                return Err(RegionTableError::NonFinite(index));
            }

            for (j, stage) in region.stages.iter().enumerate() {
                if stage.rules.is_empty() {
                    return Err(RegionTableError::EmptyStage(index, j + 1));
                }

                for rule in stage.rules.iter() {
                    let finite = rule.then.is_finite()
                        && rule.steering.map_or(true, f64::is_finite)
                        && rule
                            .when
                            .all
                            .iter()
                            .chain(rule.when.any.iter())
                            .all(|c| c.value.is_finite());

                    if !finite {
                        return Err(RegionTableError::NonFinite(index));
                    }
                }
            }
        }

        Ok(())
    }
}
