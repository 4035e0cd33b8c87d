//! Process isolation for scenario runs
//!
//! The supervisor re-executes the harness binary as a child running one
//! scenario in-process. Result lines are forwarded as they arrive, so a
//! native fault in the child loses nothing printed before it.

use std::ffi::OsString;
use std::fmt;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use log::{debug, info};

use super::scenario::format_calls;
use super::{HarnessError, HarnessOptions, Scenario};
use crate::ffi::FfiError;

/// How a child run ended abnormally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Killed by a signal (name when known, e.g. `SIGSEGV`)
    Signal(String),
    /// Exited with a non-zero status
    Exit(i32),
    /// Ended without an exit code or signal
    Unknown,
}

impl Fault {
    fn from_status(status: ExitStatus) -> Option<Fault> {
        if status.success() {
            return None;
        }
        if let Some(code) = status.code() {
            return Some(Fault::Exit(code));
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Some(Fault::Signal(signal_name(signal)));
            }
        }
        Some(Fault::Unknown)
    }

    /// Whether the child died inside native code rather than reporting an error
    pub fn is_native(&self) -> bool {
        matches!(self, Fault::Signal(_) | Fault::Unknown)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Signal(name) => write!(f, "terminated by {}", name),
            Fault::Exit(code) => write!(f, "exited with status {}", code),
            Fault::Unknown => write!(f, "terminated abnormally"),
        }
    }
}

#[cfg(unix)]
fn signal_name(signal: i32) -> String {
    nix::sys::signal::Signal::try_from(signal)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("signal {}", signal))
}

/// What a child run printed and how it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Result lines, in order
    pub lines: Vec<String>,
    /// `None` when the child exited cleanly
    pub fault: Option<Fault>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.fault.is_none()
    }

    /// Turn an abnormal end into an error
    ///
    /// A signal is a native call fault; a non-zero exit means the child
    /// reported a load or resolution error on its own stderr.
    pub fn into_result(self) -> Result<Vec<String>, HarnessError> {
        match self.fault {
            None => Ok(self.lines),
            Some(fault) if fault.is_native() => Err(FfiError::Call(format!(
                "child {} after {} result line(s)",
                fault,
                self.lines.len()
            ))
            .into()),
            Some(fault) => Err(HarnessError::ChildFailed(fault.to_string())),
        }
    }
}

/// Runs scenarios in child processes
#[derive(Debug, Clone)]
pub struct Supervisor {
    program: PathBuf,
    prefix: Vec<OsString>,
}

impl Supervisor {
    /// Supervise the running executable
    pub fn current() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix: Vec::new(),
        }
    }

    /// Arguments placed before the generated `run ...` arguments
    pub fn with_prefix<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.prefix = args.into_iter().map(Into::into).collect();
        self
    }

    /// Command line that makes the child run `scenario` in-process
    ///
    /// Everything the child needs is passed explicitly, and the child reads
    /// no config file, so it runs with exactly the parent's options.
    pub fn child_args(scenario: &Scenario, options: &HarnessOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--no-config".into(),
            "run".into(),
            "--no-isolate".into(),
            "--scenario".into(),
            scenario.name().into(),
        ];
        if !scenario.calls().is_empty() {
            args.push("--calls".into());
            args.push(format_calls(scenario.calls()).into());
        }
        args.push("--lib-dir".into());
        args.push(options.lib_dir.clone().into_os_string());
        args.push("--lib-a".into());
        args.push(options.names.a.clone().into());
        args.push("--lib-b".into());
        args.push(options.names.b.clone().into());
        match &options.event_loop {
            Some(event_loop) => {
                args.push("--event-loop".into());
                args.push(event_loop.clone().into_os_string());
            }
            None => args.push("--no-event-loop".into()),
        }
        if options.probes.is_empty() {
            args.push("--no-probes".into());
        }
        for probe in &options.probes {
            // `=` keeps negative inputs from being read as flags
            args.push(format!("--probe={}", probe).into());
        }
        args
    }

    /// Run a scenario in a child, forwarding each result line to `out`
    pub fn run<W: Write>(
        &self,
        scenario: &Scenario,
        options: &HarnessOptions,
        out: &mut W,
    ) -> Result<Outcome, HarnessError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.prefix)
            .args(Self::child_args(scenario, options))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        debug!("spawning {:?}", command);

        let mut child = command.spawn()?;
        let mut lines = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                let line = line?;
                writeln!(out, "{}", line)?;
                out.flush()?;
                lines.push(line);
            }
        }
        let status = child.wait()?;

        let fault = Fault::from_status(status);
        match &fault {
            None => info!("isolated scenario {} completed", scenario.name()),
            Some(fault) => info!("isolated scenario {} {}", scenario.name(), fault),
        }
        Ok(Outcome { lines, fault })
    }
}
