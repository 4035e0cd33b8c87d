//! Build script for the embug probe libraries
//!
//! Compiles the native sources under `native/` into shared libraries using the
//! host C/C++ toolchain. Each library lands in `OUT_DIR/<set>/lib<name>/`, the
//! same layout the bindings expect next to the executable. A failed compile is
//! only a warning: the harness still builds, and the tests that need these
//! libraries skip themselves.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const PROBE_NAMES: [&str; 2] = ["embuga", "embugb"];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=native/");

    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    if env::var_os("CARGO_CFG_UNIX").is_none() {
        println!("cargo:warning=probe libraries are only built for unix targets");
        return;
    }

    // Demo libraries: 42 + x, C++ exception path for negative input
    let demo_dir = out_dir.join("demo");
    let demo_ok = PROBE_NAMES.iter().all(|name| {
        let source = Path::new("native")
            .join(format!("lib{}", name))
            .join(format!("lib{}.cpp", name));
        compile_shared(&source, &demo_dir, name, true, &[])
    });
    if demo_ok {
        println!("cargo:rustc-env=EMBUG_DEMO_DIR={}", demo_dir.display());
    }

    // Doubling stubs, one per exported symbol name
    let stub_dir = out_dir.join("stub");
    let stub_ok = PROBE_NAMES.iter().all(|name| {
        let define = format!("-DSTUB_SYMBOL={}_demo", name);
        compile_shared(Path::new("native/stub/stub.c"), &stub_dir, name, false, &[define])
    });
    if stub_ok {
        println!("cargo:rustc-env=EMBUG_STUB_DIR={}", stub_dir.display());
    }

    // Same stubs, but abort() on negative input
    let fault_dir = out_dir.join("fault");
    let fault_ok = PROBE_NAMES.iter().all(|name| {
        let define = format!("-DSTUB_SYMBOL={}_demo", name);
        compile_shared(Path::new("native/stub/fault.c"), &fault_dir, name, false, &[define])
    });
    if fault_ok {
        println!("cargo:rustc-env=EMBUG_FAULT_DIR={}", fault_dir.display());
    }
}

/// Compile one source file into `<out_root>/lib<name>/<shared library name>`
fn compile_shared(source: &Path, out_root: &Path, name: &str, cpp: bool, defines: &[String]) -> bool {
    let lib_dir = out_root.join(format!("lib{}", name));
    if let Err(e) = fs::create_dir_all(&lib_dir) {
        println!("cargo:warning=cannot create {}: {}", lib_dir.display(), e);
        return false;
    }
    let output = lib_dir.join(shared_library_name(name));

    let compiler = match cc::Build::new()
        .cpp(cpp)
        .cargo_metadata(false)
        .warnings(false)
        .try_get_compiler()
    {
        Ok(compiler) => compiler,
        Err(e) => {
            println!("cargo:warning=no C/C++ compiler for probe libraries: {}", e);
            return false;
        }
    };

    let status = compiler
        .to_command()
        .args(["-shared", "-fPIC", "-O2"])
        .args(defines)
        .arg("-o")
        .arg(&output)
        .arg(source)
        .status();

    match status {
        Ok(s) if s.success() => true,
        Ok(s) => {
            println!(
                "cargo:warning=compiling {} failed with {}",
                source.display(),
                s
            );
            false
        }
        Err(e) => {
            println!("cargo:warning=failed to run compiler for {}: {}", source.display(), e);
            false
        }
    }
}

/// Platform-specific shared library filename for the target
fn shared_library_name(name: &str) -> String {
    match env::var("CARGO_CFG_TARGET_OS").as_deref() {
        Ok("macos") | Ok("ios") => format!("lib{}.dylib", name),
        _ => format!("lib{}.so", name),
    }
}
