//! Helpers shared by unit tests

use std::path::Path;

/// Environment variable that turns a missing native library set into a failure
pub(crate) const REQUIRE_NATIVE: &str = "EMBUG_REQUIRE_NATIVE";

/// Directory of a library set compiled by the build script
///
/// `None` means the set was not built; the caller skips and a note goes to
/// stderr. With `EMBUG_REQUIRE_NATIVE` set the test fails instead.
pub(crate) fn native_dir(var: &str, dir: Option<&'static str>) -> Option<&'static Path> {
    match dir {
        Some(dir) => Some(Path::new(dir)),
        None if std::env::var_os(REQUIRE_NATIVE).is_some() => {
            panic!("{} is not set: the build script did not compile it", var)
        }
        None => {
            eprintln!("skipping: {} is not set, native libraries were not built", var);
            None
        }
    }
}

pub(crate) fn stub_dir() -> Option<&'static Path> {
    native_dir("EMBUG_STUB_DIR", option_env!("EMBUG_STUB_DIR"))
}

pub(crate) fn demo_dir() -> Option<&'static Path> {
    native_dir("EMBUG_DEMO_DIR", option_env!("EMBUG_DEMO_DIR"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_dir() {
        assert_eq!(
            native_dir("EMBUG_OTHER_DIR", Some("/opt/embug")),
            Some(Path::new("/opt/embug"))
        );
        if std::env::var_os(REQUIRE_NATIVE).is_none() {
            assert_eq!(native_dir("EMBUG_OTHER_DIR", None), None);
        }
    }
}
