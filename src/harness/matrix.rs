//! Cross-order comparison
//!
//! Each scenario runs in its own child process, since load order only means
//! something in a fresh address space. The per-call results are then lined up
//! by `(target, input)`; any pair that differs between scenarios is reported.

use std::collections::BTreeMap;
use std::io::{self, Write};

use log::{info, warn};

use super::supervisor::{Outcome, Supervisor};
use super::{CallRecord, HarnessError, HarnessOptions, LoadStep, Scenario};
use crate::bindings::Target;

/// One scenario's run
#[derive(Debug, Clone)]
pub struct MatrixEntry {
    pub scenario: Scenario,
    pub outcome: Outcome,
    /// Completed calls, matched against the scenario's call plan
    pub records: Vec<CallRecord>,
    /// Load steps the child skipped
    pub skipped: Vec<LoadStep>,
}

/// A `(target, input)` pair that produced different outputs across scenarios
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    pub target: Target,
    pub input: i32,
    /// `(scenario name, output)` for every scenario that made this call
    pub outputs: Vec<(String, i32)>,
}

/// All scenario runs
#[derive(Debug, Clone, Default)]
pub struct MatrixReport {
    pub entries: Vec<MatrixEntry>,
}

impl MatrixReport {
    pub fn divergences(&self) -> Vec<Divergence> {
        let mut by_call: BTreeMap<(Target, i32), Vec<(String, i32)>> = BTreeMap::new();
        for entry in &self.entries {
            for record in &entry.records {
                by_call
                    .entry((record.target, record.input))
                    .or_default()
                    .push((entry.scenario.name(), record.output));
            }
        }

        by_call
            .into_iter()
            .filter(|(_, outputs)| outputs.windows(2).any(|w| w[0].1 != w[1].1))
            .map(|((target, input), outputs)| Divergence {
                target,
                input,
                outputs,
            })
            .collect()
    }

    /// Scenarios that did not complete
    pub fn faults(&self) -> Vec<&MatrixEntry> {
        self.entries
            .iter()
            .filter(|e| !e.outcome.is_success())
            .collect()
    }

    /// Scenarios that ran without all of their load steps
    pub fn incomplete(&self) -> Vec<&MatrixEntry> {
        self.entries
            .iter()
            .filter(|e| !e.skipped.is_empty())
            .collect()
    }

    /// Every scenario completed and all agree
    ///
    /// Skipped steps do not count against consistency; check
    /// [`MatrixReport::incomplete`] before trusting the load orders.
    pub fn is_consistent(&self) -> bool {
        self.faults().is_empty() && self.divergences().is_empty()
    }

    /// Human-readable summary
    pub fn write_summary<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for entry in &self.entries {
            let outputs: Vec<String> = entry.records.iter().map(|r| r.output.to_string()).collect();
            write!(out, "{:<8} {}", entry.scenario.name(), outputs.join(" "))?;
            if let Some(fault) = &entry.outcome.fault {
                write!(out, "  [{} after {} call(s)]", fault, entry.records.len())?;
            }
            if entry.skipped.contains(&LoadStep::EventLoop) {
                write!(out, "  [event loop skipped]")?;
            }
            writeln!(out)?;
        }

        let divergences = self.divergences();
        for d in &divergences {
            let values: Vec<String> = d
                .outputs
                .iter()
                .map(|(scenario, output)| format!("{}={}", scenario, output))
                .collect();
            writeln!(out, "divergence {}({}): {}", d.target, d.input, values.join(" "))?;
        }

        let incomplete = self.incomplete().len();
        if self.is_consistent() && incomplete == 0 {
            writeln!(out, "consistent across {} scenarios", self.entries.len())?;
        } else if self.is_consistent() {
            writeln!(
                out,
                "incomplete: results agree across {} scenarios, event loop skipped in {}",
                self.entries.len(),
                incomplete
            )?;
        } else {
            writeln!(
                out,
                "inconsistent: {} divergence(s), {} failed scenario(s)",
                divergences.len(),
                self.faults().len()
            )?;
        }
        Ok(())
    }
}

/// Match result lines against the scenario's call plan
fn records_from_lines(
    scenario: &Scenario,
    probes: &[i32],
    lines: &[String],
) -> Result<Vec<CallRecord>, HarnessError> {
    scenario
        .call_plan(probes)
        .into_iter()
        .zip(lines)
        .map(|((target, input), line)| -> Result<CallRecord, HarnessError> {
            let output = line
                .trim()
                .parse::<i32>()
                .map_err(|_| HarnessError::ChildOutput(line.clone()))?;
            Ok(CallRecord {
                target,
                input,
                output,
            })
        })
        .collect()
}

/// Run every scenario under the supervisor and compare the results
pub fn run_matrix(
    supervisor: &Supervisor,
    scenarios: &[Scenario],
    options: &HarnessOptions,
) -> Result<MatrixReport, HarnessError> {
    let mut entries = Vec::with_capacity(scenarios.len());
    for scenario in scenarios {
        let outcome = supervisor.run(scenario, options, &mut io::sink())?;
        let records = records_from_lines(scenario, &options.probes, &outcome.lines)?;
        let skipped = options.skipped_steps(scenario);
        if !skipped.is_empty() {
            warn!("matrix: {} ran without its event loop", scenario.name());
        }
        info!(
            "matrix: {} produced {} result(s)",
            scenario.name(),
            records.len()
        );
        entries.push(MatrixEntry {
            scenario: scenario.clone(),
            outcome,
            records,
            skipped,
        });
    }
    Ok(MatrixReport { entries })
}
