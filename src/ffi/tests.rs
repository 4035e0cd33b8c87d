//! FFI Module Tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::*;

#[test]
fn test_ffi_type_parsing() {
    assert_eq!("int".parse::<FfiType>(), Ok(FfiType::I32));
    assert_eq!("int32_t".parse::<FfiType>(), Ok(FfiType::I32));
    assert_eq!("double".parse::<FfiType>(), Ok(FfiType::F64));
    assert_eq!("uint64_t".parse::<FfiType>(), Ok(FfiType::U64));
    assert_eq!("VOID".parse::<FfiType>(), Ok(FfiType::Void));
    assert!("char*".parse::<FfiType>().is_err());
}

#[test]
fn test_signature_parsing() {
    let sig = FfiSignature::parse("int embuga_demo(int x)").unwrap();
    assert_eq!(sig.name, "embuga_demo");
    assert_eq!(sig.return_type, FfiType::I32);
    assert_eq!(sig.params, vec![FfiType::I32]);

    let sig = FfiSignature::parse("void tick(void);").unwrap();
    assert_eq!(sig.name, "tick");
    assert_eq!(sig.return_type, FfiType::Void);
    assert!(sig.params.is_empty());

    let sig = FfiSignature::parse("int add(int a, int b)").unwrap();
    assert_eq!(sig.params, vec![FfiType::I32, FfiType::I32]);

    assert!(FfiSignature::parse("embuga_demo(int)").is_none());
    assert!(FfiSignature::parse("int embuga_demo").is_none());
    assert!(FfiSignature::parse("int f(char* s)").is_none());
}

#[test]
fn test_signature_display() {
    let sig = FfiSignature::int_to_int("embugb_demo");
    assert_eq!(sig.to_string(), "i32 embugb_demo(i32)");

    let sig = FfiSignature::new("now", vec![], FfiType::U64);
    assert_eq!(sig.to_string(), "u64 now()");
}

#[test]
fn test_signature_checked_before_load() {
    let mut loader = LibraryLoader::new();
    let sig = FfiSignature::new("embuga_demo", vec![FfiType::I64], FfiType::I64);

    let err = loader
        .bind::<IntFn>(Path::new("/nonexistent/libembuga.so"), &sig)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Signature);
    assert!(err.to_string().contains("i64 embuga_demo(i64)"));
    assert!(err.to_string().contains("i32 embuga_demo(i32)"));
    assert!(loader.loaded_libraries().is_empty());
}

#[test]
fn test_missing_library_is_load_error() {
    let mut loader = LibraryLoader::new();
    let path = Path::new("/nonexistent/libembuga/libembuga.so");

    let err = loader
        .bind::<IntFn>(path, &FfiSignature::int_to_int("embuga_demo"))
        .unwrap_err();
    assert!(matches!(err, FfiError::LibraryLoad { .. }));
    assert_eq!(err.kind(), ErrorKind::LibraryLoad);
    assert!(!loader.is_loaded(path));
    assert!(loader.loaded_libraries().is_empty());
}

#[test]
fn test_malformed_library_is_load_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(library_filename("garbage"));
    std::fs::write(&path, b"definitely not an ELF or Mach-O image").unwrap();

    let mut loader = LibraryLoader::new();
    let err = loader.load_path(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LibraryLoad);
    assert!(!loader.is_loaded(&path));
}

#[test]
fn test_resolve_before_load_fails() {
    let loader = LibraryLoader::new();
    let err = loader
        .resolve::<IntFn>(
            Path::new("libembuga.so"),
            &FfiSignature::int_to_int("embuga_demo"),
        )
        .unwrap_err();
    assert!(matches!(err, FfiError::NotLoaded(_)));
    assert_eq!(err.kind(), ErrorKind::LibraryLoad);
}

#[test]
fn test_ffi_error_display() {
    let err = FfiError::LibraryLoad {
        path: PathBuf::from("/tmp/libx.so"),
        reason: "no such file".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "failed to load library '/tmp/libx.so': no such file"
    );

    let err = FfiError::InvalidSymbol("bad\0name".to_string());
    assert_eq!(err.kind(), ErrorKind::SymbolResolution);
}

#[test]
fn test_library_filename() {
    #[cfg(target_os = "linux")]
    {
        assert_eq!(library_filename("embuga"), "libembuga.so");
        assert_eq!(library_filename("libc.so.6"), "libc.so.6");
    }
    #[cfg(target_os = "macos")]
    assert_eq!(library_filename("embuga"), "libembuga.dylib");
}

#[cfg(target_os = "linux")]
mod libc_tests {
    use super::*;

    fn load_libc(loader: &mut LibraryLoader) -> Option<Arc<DynamicLibrary>> {
        loader.load("libc.so.6").ok()
    }

    #[test]
    fn test_libc_binding() {
        let mut loader = LibraryLoader::new();
        let Some(libc) = load_libc(&mut loader) else {
            return;
        };

        let abs = loader
            .bind::<IntFn>(libc.path(), &FfiSignature::int_to_int("abs"))
            .expect("Failed to bind abs");
        assert_eq!(abs.call(5), 5);
        assert_eq!(abs.call(-1), 1);
        // Same input, same output
        assert_eq!(abs.call(-7), abs.call(-7));

        let getpid = loader
            .bind::<NullaryIntFn>(
                libc.path(),
                &FfiSignature::new("getpid", vec![], FfiType::I32),
            )
            .expect("Failed to bind getpid");
        assert_eq!(getpid.call() as u32, std::process::id());

        let labs = loader
            .bind::<I64Fn>(
                libc.path(),
                &FfiSignature::parse("int64_t labs(int64_t)").unwrap(),
            )
            .expect("Failed to bind labs");
        assert_eq!(labs.call(-1 << 40), 1 << 40);
    }

    #[test]
    fn test_libc_unsigned_and_float() {
        let mut loader = LibraryLoader::new();
        let Some(libc) = load_libc(&mut loader) else {
            return;
        };

        let htonl = loader
            .bind::<U32Fn>(
                libc.path(),
                &FfiSignature::parse("uint32_t htonl(uint32_t)").unwrap(),
            )
            .expect("Failed to bind htonl");
        assert_eq!(htonl.call(0x0102_0304), 0x0102_0304u32.to_be());

        let Ok(libm) = loader.load("libm.so.6") else {
            return;
        };
        let fabs = loader
            .bind::<F64Fn>(
                libm.path(),
                &FfiSignature::parse("double fabs(double)").unwrap(),
            )
            .expect("Failed to bind fabs");
        assert_eq!(fabs.call(-2.5), 2.5);
        assert_eq!(loader.loaded_libraries().len(), 2);
    }

    #[test]
    fn test_libc_loaded_once() {
        let mut loader = LibraryLoader::new();
        let Some(first) = load_libc(&mut loader) else {
            return;
        };
        let second = loader.load("libc.so.6").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.loaded_libraries().len(), 1);

        let abs = loader
            .resolve::<IntFn>(first.path(), &FfiSignature::int_to_int("abs"))
            .unwrap();
        assert!(std::ptr::eq(abs.library(), first.as_ref()));
    }

    #[test]
    fn test_libc_missing_symbol() {
        let mut loader = LibraryLoader::new();
        let Some(libc) = load_libc(&mut loader) else {
            return;
        };

        let err = loader
            .bind::<IntFn>(
                libc.path(),
                &FfiSignature::int_to_int("embug_no_such_symbol"),
            )
            .unwrap_err();
        assert!(matches!(err, FfiError::SymbolResolution { .. }));
        assert!(err.to_string().contains("embug_no_such_symbol"));

        let err = loader
            .bind::<IntFn>(libc.path(), &FfiSignature::int_to_int("ab\0s"))
            .unwrap_err();
        assert!(matches!(err, FfiError::InvalidSymbol(_)));
    }
}

#[test]
fn test_stub_binding_reusable() {
    let Some(dir) = crate::testutil::stub_dir() else {
        return;
    };
    let path = dir
        .join("libembuga")
        .join(library_filename("embuga"));

    let mut loader = LibraryLoader::new();
    let demo = loader
        .bind::<IntFn>(&path, &FfiSignature::int_to_int("embuga_demo"))
        .unwrap();
    for _ in 0..3 {
        assert_eq!(demo.call(5), 10);
        assert_eq!(demo.call(-1), -2);
    }

    // Binding again reuses the handle
    let again = loader
        .bind::<IntFn>(&path, &FfiSignature::int_to_int("embuga_demo"))
        .unwrap();
    assert!(std::ptr::eq(demo.library(), again.library()));
    assert_eq!(loader.loaded_libraries().len(), 1);
}
