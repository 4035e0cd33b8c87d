//! Harness Integration Tests
//!
//! Exercises the library API against the probe libraries compiled by the
//! build script, including supervised runs through the real `embug` binary.
//! Set `EMBUG_REQUIRE_NATIVE` to fail instead of skip when they are missing.

use std::path::{Path, PathBuf};

use embug::bindings::{probe_library_path, EmbugBinding, Target, EMBUG_A, EMBUG_B};
use embug::ffi::{ErrorKind, FfiSignature, IntFn, LibraryLoader};
use embug::harness::{run_matrix, Fault, Harness, HarnessOptions, Scenario, Supervisor};

/// Directory of a library set compiled by the build script
///
/// Skips (with a note on stderr) when the set was not built, unless
/// `EMBUG_REQUIRE_NATIVE` is set, in which case the test fails.
fn native_dir(var: &str, dir: Option<&'static str>) -> Option<&'static Path> {
    match dir {
        Some(dir) => Some(Path::new(dir)),
        None if std::env::var_os("EMBUG_REQUIRE_NATIVE").is_some() => {
            panic!("{} is not set: the build script did not compile it", var)
        }
        None => {
            eprintln!("skipping: {} is not set, native libraries were not built", var);
            None
        }
    }
}

fn stub_dir() -> Option<&'static Path> {
    native_dir("EMBUG_STUB_DIR", option_env!("EMBUG_STUB_DIR"))
}

fn supervisor() -> Supervisor {
    Supervisor::new(PathBuf::from(env!("CARGO_BIN_EXE_embug")))
}

#[test]
fn test_bind_through_loader() {
    let Some(dir) = stub_dir() else {
        return;
    };
    let mut loader = LibraryLoader::new();
    let path = probe_library_path(dir, EMBUG_B);

    let demo = loader
        .bind::<IntFn>(&path, &FfiSignature::parse("int embugb_demo(int)").unwrap())
        .unwrap();
    assert_eq!(demo.call(5), 10);
    assert_eq!(demo.call(-1), -2);
    assert_eq!(demo.name(), "embugb_demo");

    // The handle is loaded; resolving again needs no load
    let again = loader
        .resolve::<IntFn>(&path, &FfiSignature::int_to_int("embugb_demo"))
        .unwrap();
    assert_eq!(again.call(21), 42);
    assert_eq!(loader.loaded_libraries().len(), 1);
}

#[test]
fn test_symbol_from_wrong_library() {
    let Some(dir) = stub_dir() else {
        return;
    };
    let mut loader = LibraryLoader::new();
    let err = loader
        .bind::<IntFn>(
            &probe_library_path(dir, EMBUG_A),
            &FfiSignature::int_to_int("embugb_demo"),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SymbolResolution);

    // The library itself loaded fine and stays mapped
    assert!(loader.is_loaded(&probe_library_path(dir, EMBUG_A)));
}

#[test]
fn test_bindings_share_one_loader() {
    let Some(dir) = stub_dir() else {
        return;
    };
    let mut loader = LibraryLoader::new();
    let b = EmbugBinding::attach(&mut loader, EMBUG_B, dir).unwrap();
    let a = EmbugBinding::attach(&mut loader, EMBUG_A, dir).unwrap();

    assert_eq!(a.demo(5), b.demo(5));
    assert_eq!(a.demo(-1), b.demo(-1));

    let loaded: Vec<&Path> = loader.loaded_libraries();
    assert_eq!(loaded.len(), 2);
    assert!(loaded[0].parent().unwrap().ends_with("libembugb"));
}

#[test]
fn test_harness_report() {
    let Some(dir) = stub_dir() else {
        return;
    };
    let mut harness = Harness::new(HarnessOptions::new(dir).with_probes(vec![0, 7]));
    let scenario: Scenario = "b-a-em".parse().unwrap();

    let mut out = Vec::new();
    let report = harness.run(&scenario, &mut out).unwrap();

    assert_eq!(report.scenario, "b-a-em");
    assert_eq!(report.outputs(), vec![0, 14, 0, 14]);
    assert_eq!(report.calls[0].target, Target::B);
    assert_eq!(report.calls[3].target, Target::A);
    assert_eq!(report.calls[3].input, 7);
    assert_eq!(String::from_utf8(out).unwrap(), "0\n14\n0\n14\n");
}

#[test]
fn test_supervised_run_matches_in_process() {
    let Some(dir) = stub_dir() else {
        return;
    };
    let options = HarnessOptions::new(dir);
    let scenario: Scenario = "em-b-a".parse().unwrap();

    let mut in_process = Vec::new();
    Harness::new(options.clone())
        .run(&scenario, &mut in_process)
        .unwrap();

    let mut isolated = Vec::new();
    let outcome = supervisor().run(&scenario, &options, &mut isolated).unwrap();

    assert!(outcome.is_success());
    assert_eq!(in_process, isolated);
    assert_eq!(outcome.lines, vec!["10", "-2", "10", "-2"]);
}

#[test]
fn test_matrix_over_presets() {
    let Some(dir) = stub_dir() else {
        return;
    };
    let report = run_matrix(&supervisor(), &Scenario::presets(), &HarnessOptions::new(dir))
        .unwrap();

    assert_eq!(report.entries.len(), 3);
    assert!(report.is_consistent());
    for entry in &report.entries {
        assert_eq!(entry.records.len(), 4);
    }
    // Every preset has an `em` step and no event loop was given
    assert_eq!(report.incomplete().len(), 3);
}

#[cfg(unix)]
#[test]
fn test_supervised_fault() {
    let Some(dir) = native_dir("EMBUG_FAULT_DIR", option_env!("EMBUG_FAULT_DIR")) else {
        return;
    };
    let scenario: Scenario = "b-a".parse().unwrap();
    let options = HarnessOptions::new(dir).with_probes(vec![1, 2, -1]);

    let mut out = Vec::new();
    let outcome = supervisor().run(&scenario, &options, &mut out).unwrap();

    assert_eq!(outcome.lines, vec!["2", "4"]);
    assert_eq!(outcome.fault, Some(Fault::Signal("SIGABRT".to_string())));
    assert_eq!(String::from_utf8(out).unwrap(), "2\n4\n");

    let err = outcome.into_result().unwrap_err();
    assert!(err.to_string().contains("after 2 result line(s)"));
}
