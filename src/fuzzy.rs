use crate::config::ConfigError;
use crate::util::Interval;

/// Aggregated output mass below this is treated as "no rule fired".
const MIN_AGGREGATE_MASS: f64 = 1e-9;

/// A piecewise-linear membership function mapping a crisp value
/// to a degree of truth in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MembershipFunction {
    /// Triangular function with feet at `a` and `c` and peak at `b`.
    Triangular { a: f64, b: f64, c: f64 },
    /// Trapezoidal function with feet at `a` and `d` and a flat top over `[b, c]`.
    Trapezoidal { a: f64, b: f64, c: f64, d: f64 },
}

impl MembershipFunction {
    /// Builds a function from its breakpoints: three for a triangle,
    /// four for a trapezoid. Returns `None` if the breakpoints are not
    /// in ascending order or the count is wrong.
    pub fn from_breakpoints(points: &[f64]) -> Option<Self> {
        if points.windows(2).any(|w| w[0] > w[1]) {
            return None;
        }
        match *points {
            [a, b, c] => Some(Self::Triangular { a, b, c }),
            [a, b, c, d] => Some(Self::Trapezoidal { a, b, c, d }),
            _ => None,
        }
    }

    /// Computes the degree of membership at the given crisp value.
    pub fn degree(&self, x: f64) -> f64 {
        let (a, b, c, d) = match *self {
            Self::Triangular { a, b, c } => (a, b, b, c),
            Self::Trapezoidal { a, b, c, d } => (a, b, c, d),
        };
        if x < a || x > d {
            0.0
        } else if x < b {
            // `b > a` here, since `a <= x < b`
            (x - a) / (b - a)
        } else if x <= c {
            1.0
        } else {
            // `d > c` here, since `c < x <= d`
            (d - x) / (d - c)
        }
    }
}

/// A labelled fuzzy set belonging to a [FuzzyVariable].
#[derive(Clone, Debug)]
struct FuzzySet {
    /// The linguistic label, e.g. "few" or "short".
    label: String,
    /// The membership function for the label.
    function: MembershipFunction,
}

/// A named numeric axis partitioned into labelled fuzzy sets.
#[derive(Clone, Debug)]
pub struct FuzzyVariable {
    /// The variable name, e.g. "vehicles".
    name: String,
    /// The domain the variable is defined over; inputs are clamped to it.
    domain: Interval<f64>,
    /// The sampling resolution used when defuzzifying over the domain.
    step: f64,
    /// The labelled membership functions.
    sets: Vec<FuzzySet>,
}

impl FuzzyVariable {
    /// Creates a variable with no sets.
    pub fn new(name: impl Into<String>, domain: Interval<f64>, step: f64) -> Self {
        Self {
            name: name.into(),
            domain,
            step,
            sets: vec![],
        }
    }

    /// Adds a labelled set to the variable.
    pub fn add_set(&mut self, label: impl Into<String>, function: MembershipFunction) {
        self.sets.push(FuzzySet {
            label: label.into(),
            function,
        });
    }

    /// Gets the variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the variable's domain.
    pub fn domain(&self) -> Interval<f64> {
        self.domain
    }

    /// Returns true if the variable defines the given label.
    pub fn has_label(&self, label: &str) -> bool {
        self.sets.iter().any(|set| set.label == label)
    }

    /// Computes the membership of the (clamped) value in the given label's set.
    pub fn membership(&self, label: &str, value: f64) -> Option<f64> {
        let value = self.domain.clamp(value);
        self.sets
            .iter()
            .find(|set| set.label == label)
            .map(|set| set.function.degree(value))
    }
}

/// A single inference rule: the conjunction of one label per antecedent
/// variable, concluding one label of the engine's output variable.
#[derive(Clone, Debug)]
pub struct FuzzyRule {
    /// Pairs of (variable name, label) combined with Mamdani AND.
    pub antecedents: Vec<(String, String)>,
    /// The concluded label of the output variable.
    pub consequent: String,
}

/// The error produced by the inference engine when no rule fires
/// for a given set of inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no fuzzy rule fired for the given inputs")]
pub struct InferenceUndefined;

/// A Mamdani max-min inference system with centroid defuzzification.
#[derive(Clone, Debug)]
pub struct FuzzyEngine {
    /// The antecedent variables.
    inputs: Vec<FuzzyVariable>,
    /// The consequent variable.
    output: FuzzyVariable,
    /// The rule base.
    rules: Vec<FuzzyRule>,
}

impl FuzzyEngine {
    /// Creates an engine, checking that every rule references
    /// only defined variables and labels.
    pub fn new(
        inputs: Vec<FuzzyVariable>,
        output: FuzzyVariable,
        rules: Vec<FuzzyRule>,
    ) -> Result<Self, ConfigError> {
        if rules.is_empty() {
            return Err(ConfigError::NoRules);
        }
        for rule in &rules {
            for (variable, label) in &rule.antecedents {
                let input = inputs
                    .iter()
                    .find(|input| input.name() == variable)
                    .ok_or_else(|| ConfigError::UnknownVariable {
                        variable: variable.clone(),
                    })?;
                if !input.has_label(label) {
                    return Err(ConfigError::UnknownLabel {
                        variable: variable.clone(),
                        label: label.clone(),
                    });
                }
            }
            if !output.has_label(&rule.consequent) {
                return Err(ConfigError::UnknownLabel {
                    variable: output.name().to_owned(),
                    label: rule.consequent.clone(),
                });
            }
        }
        Ok(Self {
            inputs,
            output,
            rules,
        })
    }

    /// Gets the input variable with the given name.
    pub fn input(&self, name: &str) -> Option<&FuzzyVariable> {
        self.inputs.iter().find(|input| input.name() == name)
    }

    /// Gets the output variable.
    pub fn output(&self) -> &FuzzyVariable {
        &self.output
    }

    /// Evaluates the rule base against the given crisp input values and
    /// returns the defuzzified output value.
    ///
    /// Values are clamped to their variable's domain before fuzzification.
    /// A rule whose antecedent variable has no supplied value does not fire.
    pub fn evaluate(&self, values: &[(&str, f64)]) -> Result<f64, InferenceUndefined> {
        // Rule strengths aggregated per output label with max
        let strengths: Vec<f64> = self
            .output
            .sets
            .iter()
            .map(|set| {
                self.rules
                    .iter()
                    .filter(|rule| rule.consequent == set.label)
                    .map(|rule| self.rule_strength(rule, values))
                    .fold(0.0, f64::max)
            })
            .collect();

        // Centroid of the aggregated output set, sampled at the
        // output variable's configured resolution
        let domain = self.output.domain;
        let steps = (domain.length() / self.output.step).round() as usize;
        let mut moment = 0.0;
        let mut mass = 0.0;
        for i in 0..=steps {
            let y = domain.min + (i as f64) * self.output.step;
            let mu = self
                .output
                .sets
                .iter()
                .zip(&strengths)
                .map(|(set, strength)| f64::min(*strength, set.function.degree(y)))
                .fold(0.0, f64::max);
            moment += y * mu;
            mass += mu;
        }
        if mass <= MIN_AGGREGATE_MASS {
            return Err(InferenceUndefined);
        }
        Ok(moment / mass)
    }

    /// Computes the firing strength of a rule: the minimum membership
    /// over its antecedents.
    fn rule_strength(&self, rule: &FuzzyRule, values: &[(&str, f64)]) -> f64 {
        rule.antecedents
            .iter()
            .map(|(variable, label)| {
                values
                    .iter()
                    .find(|(name, _)| name == variable)
                    .and_then(|(_, value)| {
                        self.input(variable)
                            .and_then(|input| input.membership(label, *value))
                    })
                    .unwrap_or(0.0)
            })
            .fold(1.0, f64::min)
    }
}
