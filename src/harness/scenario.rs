//! Load/call orderings
//!
//! A scenario is written as dash or comma separated steps: `a` and `b` load
//! the probe bindings, `em` loads the event-loop library. Calls follow the
//! order in which `a` and `b` appear unless overridden.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::bindings::Target;

/// Scenario parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("empty scenario")]
    Empty,

    #[error("unknown scenario step '{0}' (expected a, b or em)")]
    UnknownStep(String),

    #[error("step '{0}' appears more than once")]
    Duplicate(String),

    #[error("unknown call target '{0}' (expected a or b)")]
    UnknownTarget(String),
}

/// One load performed before any call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStep {
    /// Load a probe library and bind its demo function
    Binding(Target),
    /// Load the event-loop library
    EventLoop,
}

impl LoadStep {
    fn token(&self) -> &'static str {
        match self {
            LoadStep::Binding(Target::A) => "a",
            LoadStep::Binding(Target::B) => "b",
            LoadStep::EventLoop => "em",
        }
    }
}

impl FromStr for LoadStep {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "a" => Ok(LoadStep::Binding(Target::A)),
            "b" => Ok(LoadStep::Binding(Target::B)),
            "em" => Ok(LoadStep::EventLoop),
            other => Err(ScenarioError::UnknownStep(other.to_string())),
        }
    }
}

impl fmt::Display for LoadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A load order followed by a call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    loads: Vec<LoadStep>,
    calls: Vec<Target>,
}

impl Scenario {
    /// Build from explicit steps; calls follow the binding load order
    pub fn new(loads: Vec<LoadStep>) -> Self {
        let calls = loads
            .iter()
            .filter_map(|step| match step {
                LoadStep::Binding(target) => Some(*target),
                LoadStep::EventLoop => None,
            })
            .collect();
        Self { loads, calls }
    }

    /// The three orderings the harness ships with
    pub fn presets() -> Vec<Scenario> {
        use LoadStep::{Binding, EventLoop};
        vec![
            Scenario::new(vec![Binding(Target::A), Binding(Target::B), EventLoop]),
            Scenario::new(vec![Binding(Target::B), Binding(Target::A), EventLoop]),
            Scenario::new(vec![EventLoop, Binding(Target::B), Binding(Target::A)]),
        ]
    }

    /// Replace the call order
    pub fn with_calls(mut self, calls: Vec<Target>) -> Self {
        self.calls = calls;
        self
    }

    pub fn loads(&self) -> &[LoadStep] {
        &self.loads
    }

    pub fn calls(&self) -> &[Target] {
        &self.calls
    }

    /// Canonical name, e.g. `a-b-em`
    pub fn name(&self) -> String {
        self.loads
            .iter()
            .map(LoadStep::token)
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Whether the call order differs from the default for these loads
    pub fn has_custom_calls(&self) -> bool {
        Scenario::new(self.loads.clone()).calls != self.calls
    }

    /// Every `(target, input)` pair in invocation order
    pub fn call_plan(&self, probes: &[i32]) -> Vec<(Target, i32)> {
        self.calls
            .iter()
            .flat_map(|&target| probes.iter().map(move |&input| (target, input)))
            .collect()
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut loads: Vec<LoadStep> = Vec::new();
        for token in s.split(['-', ',']).map(str::trim).filter(|t| !t.is_empty()) {
            let step: LoadStep = token.parse()?;
            if loads.contains(&step) {
                return Err(ScenarioError::Duplicate(step.to_string()));
            }
            loads.push(step);
        }
        if loads.is_empty() {
            return Err(ScenarioError::Empty);
        }
        Ok(Scenario::new(loads))
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        if self.has_custom_calls() {
            write!(f, " (calls {})", format_calls(&self.calls))?;
        }
        Ok(())
    }
}

/// Parse a call order such as `b,a`
pub fn parse_calls(s: &str) -> Result<Vec<Target>, ScenarioError> {
    let calls = s
        .split([',', '-'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|token| match token.to_lowercase().as_str() {
            "a" => Ok(Target::A),
            "b" => Ok(Target::B),
            _ => Err(ScenarioError::UnknownTarget(token.to_string())),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if calls.is_empty() {
        return Err(ScenarioError::Empty);
    }
    Ok(calls)
}

/// Render a call order the way [`parse_calls`] reads it
pub fn format_calls(calls: &[Target]) -> String {
    calls
        .iter()
        .map(|t| match t {
            Target::A => "a",
            Target::B => "b",
        })
        .collect::<Vec<_>>()
        .join(",")
}
