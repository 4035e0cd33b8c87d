//! Typed symbol bindings
//!
//! A [`Binding`] is a resolved native function pointer together with a shared
//! handle to the library it came from, so the pointer cannot outlive the code
//! it points into.

use std::fmt;
use std::sync::Arc;

use libc::c_int;
use log::trace;

use super::loader::DynamicLibrary;
use super::{FfiError, FfiSignature, FfiType};

/// `int f(void)`
pub type NullaryIntFn = unsafe extern "C" fn() -> c_int;
/// `int f(int)`, the probe shape
pub type IntFn = unsafe extern "C" fn(c_int) -> c_int;
/// `uint32_t f(uint32_t)`
pub type U32Fn = unsafe extern "C" fn(u32) -> u32;
/// `int64_t f(int64_t)`
pub type I64Fn = unsafe extern "C" fn(i64) -> i64;
/// `double f(double)`
pub type F64Fn = unsafe extern "C" fn(f64) -> f64;

/// A native function pointer type with a known C signature
pub trait ForeignFn: Copy + 'static {
    /// Parameter types, in order
    const PARAMS: &'static [FfiType];
    /// Return type
    const RETURN: FfiType;

    /// Render the shape the way [`FfiSignature`] displays
    fn describe(name: &str) -> String {
        FfiSignature::new(name, Self::PARAMS.to_vec(), Self::RETURN).to_string()
    }
}

macro_rules! foreign_fn {
    ($ty:ty, [$($param:ident),*] -> $ret:ident) => {
        impl ForeignFn for $ty {
            const PARAMS: &'static [FfiType] = &[$(FfiType::$param),*];
            const RETURN: FfiType = FfiType::$ret;
        }
    };
}

foreign_fn!(NullaryIntFn, [] -> I32);
foreign_fn!(IntFn, [I32] -> I32);
foreign_fn!(U32Fn, [U32] -> U32);
foreign_fn!(I64Fn, [I64] -> I64);
foreign_fn!(F64Fn, [F64] -> F64);

/// A resolved, typed native symbol
pub struct Binding<F: ForeignFn> {
    signature: FfiSignature,
    func: F,
    library: Arc<DynamicLibrary>,
}

impl<F: ForeignFn> Binding<F> {
    /// Fail unless `signature` describes `F`
    pub(crate) fn check_signature(signature: &FfiSignature) -> Result<(), FfiError> {
        if signature.has_shape(F::PARAMS, F::RETURN) {
            Ok(())
        } else {
            Err(FfiError::SignatureMismatch {
                symbol: signature.name.clone(),
                declared: signature.to_string(),
                bound: F::describe(&signature.name),
            })
        }
    }

    /// Resolve `signature.name` from an already loaded library
    pub(crate) fn resolve(
        library: Arc<DynamicLibrary>,
        signature: &FfiSignature,
    ) -> Result<Self, FfiError> {
        Self::check_signature(signature)?;
        let func = library.resolve::<F>(&signature.name)?;
        Ok(Self {
            signature: signature.clone(),
            func,
            library,
        })
    }

    /// Symbol name
    pub fn name(&self) -> &str {
        &self.signature.name
    }

    /// Library the symbol was resolved from
    pub fn library(&self) -> &DynamicLibrary {
        &self.library
    }
}

impl<F: ForeignFn> Clone for Binding<F> {
    fn clone(&self) -> Self {
        Self {
            signature: self.signature.clone(),
            func: self.func,
            library: Arc::clone(&self.library),
        }
    }
}

impl<F: ForeignFn> fmt::Debug for Binding<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("signature", &self.signature.to_string())
            .field("library", &self.library.path())
            .finish()
    }
}

// Safety for all `call` methods below: the pointer was resolved with a
// signature checked against its Rust type, and `self.library` keeps the code
// mapped. Faults inside the native function are not recoverable here.

impl Binding<NullaryIntFn> {
    pub fn call(&self) -> i32 {
        trace!("call {}()", self.name());
        unsafe { (self.func)() }
    }
}

impl Binding<IntFn> {
    /// Call the native function with one `int`
    pub fn call(&self, x: i32) -> i32 {
        trace!("call {}({})", self.name(), x);
        unsafe { (self.func)(x) }
    }
}

impl Binding<U32Fn> {
    pub fn call(&self, x: u32) -> u32 {
        trace!("call {}({})", self.name(), x);
        unsafe { (self.func)(x) }
    }
}

impl Binding<I64Fn> {
    pub fn call(&self, x: i64) -> i64 {
        trace!("call {}({})", self.name(), x);
        unsafe { (self.func)(x) }
    }
}

impl Binding<F64Fn> {
    pub fn call(&self, x: f64) -> f64 {
        trace!("call {}({})", self.name(), x);
        unsafe { (self.func)(x) }
    }
}
