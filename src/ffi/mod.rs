//! FFI Module for embug
//!
//! Loads native shared libraries and binds their exported functions to typed
//! Rust callables.
//!
//! # Architecture
//!
//! ```text
//! LibraryLoader::bind::<IntFn>(path, signature)
//!       │
//!       ├── signature checked against IntFn
//!       ▼
//! Dynamic Loader (libloading, load-once cache)
//!       │
//!       ▼
//! Binding<IntFn>  ──call(x)──▶  native function
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut loader = LibraryLoader::new();
//! let sig = FfiSignature::parse("int embuga_demo(int)").unwrap();
//! let demo = loader.bind::<IntFn>(Path::new("./libembuga/libembuga.so"), &sig)?;
//! println!("{}", demo.call(5));
//! ```

mod binding;
mod error;
mod loader;
mod types;

pub use binding::{Binding, F64Fn, ForeignFn, I64Fn, IntFn, NullaryIntFn, U32Fn};
pub use error::{ErrorKind, FfiError};
pub use loader::{library_filename, DynamicLibrary, LibraryLoader};
pub use types::{FfiSignature, FfiType};

#[cfg(test)]
mod tests;
