//! Load-order harness
//!
//! Runs a [`Scenario`]: performs its loads in order, then calls each probe
//! binding with every probe input and writes one integer per line.
//!
//! ```text
//! Scenario "b-a-em"
//!       │
//!       ├── load B, load A, load event loop   (LibraryLoader, load once)
//!       ▼
//! B(5)  B(-1)  A(5)  A(-1)  ──▶  stdout, one line each
//! ```
//!
//! There is no recovery: the first error stops the run. Lines already
//! written stay written. A native fault kills the process unless the run
//! goes through the [`Supervisor`].

mod matrix;
mod scenario;
mod supervisor;

pub use matrix::{run_matrix, Divergence, MatrixEntry, MatrixReport};
pub use scenario::{format_calls, parse_calls, LoadStep, Scenario, ScenarioError};
pub use supervisor::{Fault, Outcome, Supervisor};

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use crate::bindings::{probe_library_path, EmbugBinding, ProbeNames, Target};
use crate::ffi::{FfiError, LibraryLoader};

/// Harness errors
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Ffi(#[from] FfiError),

    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("child harness failed: {0}")]
    ChildFailed(String),

    #[error("unexpected output from child harness: {0:?}")]
    ChildOutput(String),
}

/// Where libraries come from and what to call them with
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessOptions {
    /// Directory holding `lib<name>/` subdirectories
    pub lib_dir: PathBuf,
    /// Probe library names
    pub names: ProbeNames,
    /// Event-loop library for the `em` step
    pub event_loop: Option<PathBuf>,
    /// Inputs passed to every call
    pub probes: Vec<i32>,
}

impl HarnessOptions {
    pub fn new(lib_dir: impl Into<PathBuf>) -> Self {
        Self {
            lib_dir: lib_dir.into(),
            names: ProbeNames::default(),
            event_loop: None,
            probes: vec![5, -1],
        }
    }

    pub fn with_event_loop(mut self, event_loop: impl Into<PathBuf>) -> Self {
        self.event_loop = Some(event_loop.into());
        self
    }

    pub fn with_probes(mut self, probes: Vec<i32>) -> Self {
        self.probes = probes;
        self
    }

    /// Expected location of a target's library
    pub fn library_path(&self, target: Target) -> PathBuf {
        probe_library_path(&self.lib_dir, self.names.name(target))
    }

    /// Steps of `scenario` these options cannot perform
    ///
    /// The `em` step needs an event-loop library; without one it is skipped.
    pub fn skipped_steps(&self, scenario: &Scenario) -> Vec<LoadStep> {
        scenario
            .loads()
            .iter()
            .copied()
            .filter(|step| *step == LoadStep::EventLoop && self.event_loop.is_none())
            .collect()
    }
}

/// One completed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallRecord {
    pub target: Target,
    pub input: i32,
    pub output: i32,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Scenario name
    pub scenario: String,
    /// Calls in invocation order
    pub calls: Vec<CallRecord>,
    /// Libraries mapped by this harness, in load order
    pub loaded: Vec<PathBuf>,
    /// Load steps that were not performed
    pub skipped: Vec<LoadStep>,
}

impl RunReport {
    pub fn outputs(&self) -> Vec<i32> {
        self.calls.iter().map(|c| c.output).collect()
    }

    /// Whether every load step of the scenario was performed
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// In-process harness owning the loader and the attached bindings
#[derive(Debug)]
pub struct Harness {
    options: HarnessOptions,
    loader: LibraryLoader,
    bindings: BTreeMap<Target, EmbugBinding>,
}

impl Harness {
    /// Bare event-loop names are also looked up in the library directory
    pub fn new(options: HarnessOptions) -> Self {
        let mut loader = LibraryLoader::new();
        loader.add_search_path(&options.lib_dir);
        Self {
            options,
            loader,
            bindings: BTreeMap::new(),
        }
    }

    /// Perform one load step
    ///
    /// Returns `Ok(false)` when the step was skipped because no event-loop
    /// library is configured.
    pub fn load(&mut self, step: LoadStep) -> Result<bool, HarnessError> {
        match step {
            LoadStep::Binding(target) => {
                if self.bindings.contains_key(&target) {
                    debug!("binding {} already attached", target);
                    return Ok(true);
                }
                let name = self.options.names.name(target).to_string();
                let binding =
                    EmbugBinding::attach(&mut self.loader, &name, &self.options.lib_dir)?;
                info!("attached {} ({})", target, binding.path().display());
                self.bindings.insert(target, binding);
            }
            LoadStep::EventLoop => match &self.options.event_loop {
                Some(path) => {
                    let lib = self.loader.load(path)?;
                    info!("loaded event loop library {}", lib.path().display());
                }
                None => {
                    warn!("no event-loop library configured, skipping 'em' step");
                    return Ok(false);
                }
            },
        }
        Ok(true)
    }

    /// Call a target's demo function; the target must have been loaded
    pub fn call(&self, target: Target, input: i32) -> Result<i32, HarnessError> {
        let binding = self.bindings.get(&target).ok_or_else(|| {
            FfiError::NotLoaded(self.options.library_path(target).display().to_string())
        })?;
        let output = binding.demo(input);
        debug!("{}({}) = {}", binding.name(), input, output);
        Ok(output)
    }

    /// Run a scenario, writing each result to `out` as soon as it is known
    pub fn run<W: Write>(
        &mut self,
        scenario: &Scenario,
        out: &mut W,
    ) -> Result<RunReport, HarnessError> {
        info!("running scenario {}", scenario);

        let mut skipped = Vec::new();
        for &step in scenario.loads() {
            if !self.load(step)? {
                skipped.push(step);
            }
        }

        let mut calls = Vec::new();
        for (target, input) in scenario.call_plan(&self.options.probes) {
            let output = self.call(target, input)?;
            writeln!(out, "{}", output)?;
            out.flush()?;
            calls.push(CallRecord {
                target,
                input,
                output,
            });
        }

        info!("scenario {} finished with {} calls", scenario.name(), calls.len());
        Ok(RunReport {
            scenario: scenario.name(),
            calls,
            loaded: self.loaded_libraries(),
            skipped,
        })
    }

    fn loaded_libraries(&self) -> Vec<PathBuf> {
        self.loader
            .loaded_libraries()
            .into_iter()
            .map(Path::to_path_buf)
            .collect()
    }
}
