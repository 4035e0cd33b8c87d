//! Probe library bindings
//!
//! Each probe library lives at `<base>/lib<name>/lib<name>.<ext>` and exports
//! `int <name>_demo(int)`. Binding A and binding B are two instances of
//! [`EmbugBinding`] with different names.

use std::env;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::ffi::{library_filename, Binding, FfiError, FfiSignature, IntFn, LibraryLoader};

/// Default name of binding A
pub const EMBUG_A: &str = "embuga";
/// Default name of binding B
pub const EMBUG_B: &str = "embugb";

/// Which of the two probe bindings a step refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    A,
    B,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::A => write!(f, "A"),
            Target::B => write!(f, "B"),
        }
    }
}

/// Library names for the two targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeNames {
    pub a: String,
    pub b: String,
}

impl ProbeNames {
    pub fn name(&self, target: Target) -> &str {
        match target {
            Target::A => &self.a,
            Target::B => &self.b,
        }
    }
}

impl Default for ProbeNames {
    fn default() -> Self {
        Self {
            a: EMBUG_A.to_string(),
            b: EMBUG_B.to_string(),
        }
    }
}

/// Path of a probe library below `base_dir`
pub fn probe_library_path(base_dir: &Path, name: &str) -> PathBuf {
    base_dir
        .join(format!("lib{}", name))
        .join(library_filename(name))
}

/// Name of the symbol a probe library exports
pub fn probe_symbol(name: &str) -> String {
    format!("{}_demo", name)
}

/// Directory holding the running executable
pub fn executable_dir() -> io::Result<PathBuf> {
    let exe = env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "executable has no parent directory")
    })
}

/// A probe library with its `<name>_demo` function bound
#[derive(Debug, Clone)]
pub struct EmbugBinding {
    name: String,
    demo: Binding<IntFn>,
}

impl EmbugBinding {
    /// Load `lib<name>` below `base_dir` and bind `<name>_demo`
    pub fn attach(
        loader: &mut LibraryLoader,
        name: &str,
        base_dir: &Path,
    ) -> Result<Self, FfiError> {
        let path = probe_library_path(base_dir, name);
        debug!("attaching {} from {}", name, path.display());
        let demo = loader.bind::<IntFn>(&path, &FfiSignature::int_to_int(probe_symbol(name)))?;
        Ok(Self {
            name: name.to_string(),
            demo,
        })
    }

    /// Library name, e.g. `embuga`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the library was loaded from
    pub fn path(&self) -> &Path {
        self.demo.library().path()
    }

    /// Call `<name>_demo(x)`
    pub fn demo(&self, x: i32) -> i32 {
        self.demo.call(x)
    }
}
