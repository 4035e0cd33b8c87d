//! embug - load-order interference harness for native shared libraries
//!
//! Loads two independently built probe libraries (`libembuga`, `libembugb`)
//! into one process, binds their exported `int <name>_demo(int)` functions
//! and calls each with fixed probe inputs. Running the same calls under
//! different load orders, optionally with an event-loop library mapped before
//! or after the probes, exposes symbol collisions and initialization-order
//! bugs as differing results or crashes.
//!
//! # Example
//!
//! ```no_run
//! use embug::harness::{Harness, HarnessOptions, Scenario};
//!
//! let options = HarnessOptions::new("./native");
//! let scenario: Scenario = "b-a-em".parse().unwrap();
//!
//! let mut harness = Harness::new(options);
//! let report = harness.run(&scenario, &mut std::io::stdout()).unwrap();
//! assert_eq!(report.calls.len(), 4);
//! ```
//!
//! # Modules
//!
//! - [`ffi`]: library loading and typed symbol bindings (libloading)
//! - [`bindings`]: the probe-library naming convention, bindings A and B
//! - [`harness`]: scenarios, the in-process runner, process isolation and
//!   cross-order comparison
//! - [`config`]: `embug.toml`

pub mod bindings;
pub mod config;
pub mod ffi;
pub mod harness;

#[cfg(test)]
mod testutil;

pub use bindings::{EmbugBinding, Target};
pub use config::EmbugConfig;
pub use ffi::{FfiError, LibraryLoader};
pub use harness::{Harness, HarnessError, HarnessOptions, Scenario};
