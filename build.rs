//! Builds the C plugin fixtures used by the native loader tests.
//!
//! Fixtures are optional: without a working C compiler (or on targets
//! without `dlopen`) the build proceeds and the native tests are compiled
//! out.

use std::env;
use std::path::PathBuf;
use std::process::Command;

const FIXTURE_SRC: &str = "tests/fixtures/udf_plugin.c";

/// Output name and preprocessor defines of each fixture variant.
const VARIANTS: &[(&str, &[&str])] = &[
    ("udf_ok.so", &[]),
    ("udf_leak.so", &["-DUDF_LEAK"]),
    ("udf_major2.so", &["-DUDF_MAJOR=2"]),
    ("udf_no_setup.so", &["-DUDF_NO_SETUP"]),
];

fn main() {
    println!("cargo:rerun-if-changed={FIXTURE_SRC}");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(udf_fixtures)");

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if !matches!(target_os.as_str(), "linux" | "macos") {
        return;
    }
    let Ok(out_dir) = env::var("OUT_DIR").map(PathBuf::from) else {
        return;
    };
    let compiler = match cc::Build::new().try_get_compiler() {
        Ok(compiler) => compiler,
        Err(e) => {
            println!("cargo:warning=skipping UDF plugin fixtures: {e}");
            return;
        }
    };

    for (name, defines) in VARIANTS {
        let mut cmd: Command = compiler.to_command();
        cmd.args(["-shared", "-fPIC", "-o"])
            .arg(out_dir.join(name))
            .args(*defines)
            .arg(FIXTURE_SRC);
        match cmd.status() {
            Ok(status) if status.success() => {}
            other => {
                println!("cargo:warning=skipping UDF plugin fixtures: building {name} failed ({other:?})");
                return;
            }
        }
    }

    println!("cargo:rustc-env=UDF_FIXTURE_DIR={}", out_dir.display());
    println!("cargo:rustc-cfg=udf_fixtures");
}
