use crate::fuzzy::{FuzzyEngine, FuzzyRule, FuzzyVariable, MembershipFunction};
use crate::policy::{self, Timing};
use crate::util::Interval;
use serde::{Deserialize, Serialize};

/// The complete static configuration of a control run: the controlled
/// intersections, the fuzzy definitions, and the timing bounds.
///
/// Everything the decision procedure depends on is data here, so signal
/// plans that differ only in membership tuning or rule tables are
/// different configurations of the same engine, not different programs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// The controlled intersections.
    pub intersections: Vec<IntersectionConfig>,
    /// The fuzzy variables and rule table.
    pub fuzzy: FuzzyConfig,
    /// The timing bounds.
    pub timing: Timing,
}

/// One intersection's signal program.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IntersectionConfig {
    /// The intersection ID, as known to the simulation.
    pub id: String,
    /// The number of phases in the signal program.
    pub phase_count: usize,
    /// The phase the controller starts in.
    #[serde(default)]
    pub start_phase: usize,
    /// The green phases and the lane groups they serve.
    pub green_phases: Vec<GreenPhase>,
}

/// A green phase and its served lane group.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GreenPhase {
    /// The phase index.
    pub phase: usize,
    /// The lanes whose queues this phase serves.
    pub lanes: Vec<String>,
}

/// The fuzzy variable definitions and the rule table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FuzzyConfig {
    /// The queue-size input variable.
    pub vehicles: VariableConfig,
    /// The arrival-rate input variable.
    pub arrival: VariableConfig,
    /// The green-duration output variable.
    pub green: VariableConfig,
    /// The rule table.
    pub rules: Vec<RuleConfig>,
}

/// A fuzzy variable definition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariableConfig {
    /// The domain the variable is defined over.
    pub range: Interval<f64>,
    /// The sampling resolution across the domain.
    pub step: f64,
    /// The labelled membership functions.
    pub sets: Vec<SetConfig>,
}

/// A labelled membership function given by its breakpoints:
/// three for a triangle, four for a trapezoid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SetConfig {
    /// The linguistic label.
    pub label: String,
    /// The ascending breakpoints.
    pub points: Vec<f64>,
}

/// One rule of the table: vehicles label AND arrival label implies
/// green label.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleConfig {
    /// The queue-size label.
    pub vehicles: String,
    /// The arrival-rate label.
    pub arrival: String,
    /// The concluded green-duration label.
    pub green: String,
}

/// A configuration problem. All variants are fatal at startup; no
/// controller is built from a partially valid configuration.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration is not valid JSON: {0}")]
    Json(String),
    #[error("intersection {intersection} has unusable phase count {count}")]
    BadPhaseCount { intersection: String, count: usize },
    #[error("intersection {intersection} cannot start in phase {phase}")]
    BadStartPhase { intersection: String, phase: usize },
    #[error("intersection {intersection} declares green phase {phase} outside its program")]
    BadGreenPhase { intersection: String, phase: usize },
    #[error("variable {variable} has an empty or inverted domain")]
    BadDomain { variable: String },
    #[error("variable {variable} has a non-positive sampling step")]
    BadStep { variable: String },
    #[error("variable {variable} defines no sets")]
    NoSets { variable: String },
    #[error("set {label} of variable {variable} has malformed breakpoints")]
    BadBreakpoints { variable: String, label: String },
    #[error("rule references unknown variable {variable}")]
    UnknownVariable { variable: String },
    #[error("rule references unknown label {label} of variable {variable}")]
    UnknownLabel { variable: String, label: String },
    #[error("the rule table is empty")]
    NoRules,
    #[error("green bounds are inverted: min {min} > max {max}")]
    BadGreenBounds { min: u32, max: u32 },
}

impl Config {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|err| ConfigError::Json(err.to_string()))
    }

    /// Builds the inference engine from the fuzzy definitions,
    /// validating variables and the rule table.
    pub fn build_engine(&self) -> Result<FuzzyEngine, ConfigError> {
        let inputs = vec![
            self.fuzzy.vehicles.build(policy::VEHICLES_VAR)?,
            self.fuzzy.arrival.build(policy::ARRIVAL_VAR)?,
        ];
        let output = self.fuzzy.green.build(policy::GREEN_VAR)?;
        let rules = self
            .fuzzy
            .rules
            .iter()
            .map(|rule| FuzzyRule {
                antecedents: vec![
                    (policy::VEHICLES_VAR.to_owned(), rule.vehicles.clone()),
                    (policy::ARRIVAL_VAR.to_owned(), rule.arrival.clone()),
                ],
                consequent: rule.green.clone(),
            })
            .collect();
        FuzzyEngine::new(inputs, output, rules)
    }

    /// Validates the timing bounds.
    pub fn validate_timing(&self) -> Result<(), ConfigError> {
        if self.timing.min_green > self.timing.max_green {
            return Err(ConfigError::BadGreenBounds {
                min: self.timing.min_green,
                max: self.timing.max_green,
            });
        }
        Ok(())
    }
}

impl VariableConfig {
    /// Builds the fuzzy variable under the given role name.
    fn build(&self, name: &str) -> Result<FuzzyVariable, ConfigError> {
        if self.range.length() <= 0.0 {
            return Err(ConfigError::BadDomain {
                variable: name.to_owned(),
            });
        }
        if self.step <= 0.0 {
            return Err(ConfigError::BadStep {
                variable: name.to_owned(),
            });
        }
        if self.sets.is_empty() {
            return Err(ConfigError::NoSets {
                variable: name.to_owned(),
            });
        }
        let mut variable = FuzzyVariable::new(name, self.range, self.step);
        for set in &self.sets {
            let function = MembershipFunction::from_breakpoints(&set.points).ok_or_else(|| {
                ConfigError::BadBreakpoints {
                    variable: name.to_owned(),
                    label: set.label.clone(),
                }
            })?;
            variable.add_set(&set.label, function);
        }
        Ok(variable)
    }
}
