//! Dynamic Library Loader
//!
//! Safe wrapper around libloading for loading shared libraries. Every library
//! is mapped at most once per [`LibraryLoader`]; later requests for the same
//! path hand back the cached handle.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use log::debug;

use super::binding::{Binding, ForeignFn};
use super::{FfiError, FfiSignature};

/// A dynamically loaded library
#[derive(Debug)]
pub struct DynamicLibrary {
    /// Path (or bare soname) the library was opened with
    path: PathBuf,
    /// The loaded library handle
    library: Library,
}

impl DynamicLibrary {
    /// Load a library from the given path
    ///
    /// A path with a directory component must exist. A bare filename is handed
    /// to the platform loader unchanged, which searches the system paths.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FfiError> {
        let path = path.as_ref().to_path_buf();

        if has_directory(&path) && !path.exists() {
            return Err(FfiError::LibraryLoad {
                path,
                reason: "no such file".to_string(),
            });
        }

        // Safety: loading a library runs its initializers. That is exactly
        // what the harness wants to observe; the caller chose the path.
        let library = unsafe {
            Library::new(&path).map_err(|e| FfiError::LibraryLoad {
                path: path.clone(),
                reason: e.to_string(),
            })?
        };

        debug!("loaded library {}", path.display());
        Ok(Self { path, library })
    }

    /// Get the path to this library
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve a symbol as the function type `F`
    ///
    /// The returned pointer is only valid while this library stays loaded;
    /// [`Binding`] pairs it with an `Arc` to enforce that.
    pub(crate) fn resolve<F: ForeignFn>(&self, name: &str) -> Result<F, FfiError> {
        let c_name =
            CString::new(name).map_err(|_| FfiError::InvalidSymbol(name.to_string()))?;

        // Safety: the type `F` was checked against the declared signature by
        // the caller. The symbol's real type cannot be verified at runtime.
        let symbol: Symbol<F> = unsafe {
            self.library
                .get(c_name.as_bytes_with_nul())
                .map_err(|e| FfiError::SymbolResolution {
                    symbol: name.to_string(),
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?
        };

        debug!("resolved {} in {}", name, self.path.display());
        Ok(*symbol)
    }
}

/// Library loader with search paths and a load-once cache
#[derive(Debug)]
pub struct LibraryLoader {
    /// Search paths for bare library names
    search_paths: Vec<PathBuf>,
    /// Loaded libraries keyed by resolved path
    libraries: HashMap<PathBuf, Arc<DynamicLibrary>>,
    /// Keys of `libraries` in the order they were first loaded
    load_order: Vec<PathBuf>,
}

impl LibraryLoader {
    /// Create a new library loader
    pub fn new() -> Self {
        Self {
            search_paths: default_search_paths(),
            libraries: HashMap::new(),
            load_order: Vec::new(),
        }
    }

    /// Add a search path
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        self.search_paths.push(path.as_ref().to_path_buf());
    }

    /// Find a library by path or short name
    ///
    /// `ev` is tried as `libev.so` (platform dependent) in every search path.
    /// Names that are not valid UTF-8 are only matched as given.
    pub fn find_library(&self, name: impl AsRef<Path>) -> Option<PathBuf> {
        let path = name.as_ref();
        if path.exists() {
            return Some(path.to_path_buf());
        }
        if has_directory(path) {
            return None;
        }

        let lib_name = library_filename(path.to_str()?);
        self.search_paths
            .iter()
            .map(|dir| dir.join(&lib_name))
            .find(|candidate| candidate.exists())
    }

    /// Load a library by path or name, reusing an already loaded handle
    pub fn load(&mut self, name: impl AsRef<Path>) -> Result<Arc<DynamicLibrary>, FfiError> {
        let name = name.as_ref();
        match self.find_library(name) {
            Some(path) => self.load_path(&path),
            None if !has_directory(name) => self.load_path(name),
            None => Err(FfiError::LibraryLoad {
                path: name.to_path_buf(),
                reason: "no such file".to_string(),
            }),
        }
    }

    /// Load the library at an explicit path, reusing an already loaded handle
    pub fn load_path(&mut self, path: &Path) -> Result<Arc<DynamicLibrary>, FfiError> {
        let key = cache_key(path);
        if let Some(lib) = self.libraries.get(&key) {
            debug!("reusing loaded library {}", key.display());
            return Ok(Arc::clone(lib));
        }

        let lib = Arc::new(DynamicLibrary::load(path)?);
        self.libraries.insert(key.clone(), Arc::clone(&lib));
        self.load_order.push(key);
        Ok(lib)
    }

    /// Get a loaded library
    pub fn get(&self, path: &Path) -> Option<Arc<DynamicLibrary>> {
        self.libraries.get(&cache_key(path)).cloned()
    }

    /// Check whether a library is loaded
    pub fn is_loaded(&self, path: &Path) -> bool {
        self.libraries.contains_key(&cache_key(path))
    }

    /// Resolve a symbol from a library that must already be loaded
    pub fn resolve<F: ForeignFn>(
        &self,
        path: &Path,
        signature: &FfiSignature,
    ) -> Result<Binding<F>, FfiError> {
        let library = self
            .get(path)
            .ok_or_else(|| FfiError::NotLoaded(path.display().to_string()))?;
        Binding::resolve(library, signature)
    }

    /// Load (or reuse) a library and bind one of its symbols
    ///
    /// The symbol name is `signature.name`. The declared signature is checked
    /// against `F` before anything is loaded.
    pub fn bind<F: ForeignFn>(
        &mut self,
        path: &Path,
        signature: &FfiSignature,
    ) -> Result<Binding<F>, FfiError> {
        Binding::<F>::check_signature(signature)?;
        let library = self.load_path(path)?;
        Binding::resolve(library, signature)
    }

    /// Loaded libraries, in load order
    pub fn loaded_libraries(&self) -> Vec<&Path> {
        self.load_order.iter().map(|p| p.as_path()).collect()
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn has_directory(path: &Path) -> bool {
    path.parent().map_or(false, |p| !p.as_os_str().is_empty())
}

/// Existing files are keyed by canonical path so `./a/../liba.so` and
/// `liba.so` share one handle; bare sonames are keyed as given.
fn cache_key(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Get the default library search paths for this platform
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // Current directory
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }

    #[cfg(target_os = "linux")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/lib"));
        paths.push(PathBuf::from("/lib64"));
        paths.push(PathBuf::from("/usr/lib64"));

        if let Ok(ld_path) = std::env::var("LD_LIBRARY_PATH") {
            paths.extend(ld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "macos")]
    {
        paths.push(PathBuf::from("/usr/lib"));
        paths.push(PathBuf::from("/usr/local/lib"));
        paths.push(PathBuf::from("/opt/homebrew/lib"));

        if let Ok(dyld_path) = std::env::var("DYLD_LIBRARY_PATH") {
            paths.extend(dyld_path.split(':').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    #[cfg(target_os = "windows")]
    {
        paths.push(PathBuf::from("C:\\Windows\\System32"));

        if let Ok(path) = std::env::var("PATH") {
            paths.extend(path.split(';').filter(|p| !p.is_empty()).map(PathBuf::from));
        }
    }

    paths
}

/// Construct the platform-specific library filename
pub fn library_filename(name: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        if name.starts_with("lib") && name.contains(".so") {
            name.to_string()
        } else {
            format!("lib{}.so", name)
        }
    }

    #[cfg(target_os = "macos")]
    {
        if name.starts_with("lib") && name.ends_with(".dylib") {
            name.to_string()
        } else {
            format!("lib{}.dylib", name)
        }
    }

    #[cfg(target_os = "windows")]
    {
        if name.ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        format!("lib{}.so", name)
    }
}
