//! Custom cargo commands for the tagstorm crate.
//!
//! Usage:
//!   cargo xtask verify    - Run full verification suite
//!   cargo xtask test      - Run all tests
//!   cargo xtask check     - Quick check (check + clippy, both feature sets)
//!   cargo xtask bench     - Run benchmarks
//!   cargo xtask fuzz <target> [seconds]

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::Command;

const FUZZ_TARGETS: &[&str] = &[
    "search_response",
    "vli_codec",
    "table_response",
    "record_builder",
];

fn main() -> Result<()> {
    let mut args = env::args().skip(1);
    let task = args.next();
    match task.as_deref() {
        Some("verify") => verify()?,
        Some("test") => test()?,
        Some("check") => check()?,
        Some("bench") => bench()?,
        Some("fuzz") => {
            let target = args.next().context("fuzz needs a target name")?;
            let seconds = args.next().unwrap_or_else(|| "60".to_string());
            fuzz(&target, &seconds)?;
        }
        _ => print_help(),
    }
    Ok(())
}

fn print_help() {
    eprintln!(
        r#"
cargo xtask <COMMAND>

Commands:
  verify            Run full verification suite (tests + clippy + wire constants)
  test              Run all Rust tests
  check             Quick check (with and without the http feature)
  bench             Run benchmarks
  fuzz <target> [s] Run a fuzz target for s seconds (default 60)

Fuzz targets: {}
"#,
        FUZZ_TARGETS.join(", ")
    );
}

/// Full verification suite
fn verify() -> Result<()> {
    println!("==========================================");
    println!("tagstorm Verification Suite");
    println!("==========================================\n");

    println!("[1/4] Running Rust tests...");
    run_cargo(&["test", "--quiet"])?;
    println!("✓ All Rust tests passed\n");

    println!("[2/4] Building without the http feature...");
    run_cargo(&["check", "--quiet", "--lib", "--no-default-features"])?;
    println!("✓ Codec-only build passes\n");

    println!("[3/4] Running clippy...");
    run_cargo(&["clippy", "--quiet", "--all-targets", "--", "-D", "warnings"])?;
    println!("✓ Clippy passed\n");

    println!("[4/4] Verifying wire constants against README...");
    verify_wire_constants()?;
    println!("✓ Constants aligned\n");

    println!("==========================================");
    println!("✓ ALL VERIFICATION CHECKS PASSED");
    println!("==========================================");

    Ok(())
}

/// Run all tests
fn test() -> Result<()> {
    run_cargo(&["test"])
}

/// Quick check
fn check() -> Result<()> {
    println!("Running quick checks...\n");

    println!("[1/3] cargo check...");
    run_cargo(&["check", "--all-targets"])?;

    println!("[2/3] cargo check --no-default-features...");
    run_cargo(&["check", "--lib", "--no-default-features"])?;

    println!("[3/3] cargo clippy...");
    run_cargo(&["clippy", "--quiet", "--", "-D", "warnings"])?;

    println!("\n✓ Quick checks passed");
    Ok(())
}

/// Run benchmarks
fn bench() -> Result<()> {
    run_cargo(&["bench"])
}

/// Run one fuzz target through cargo-fuzz (needs nightly)
fn fuzz(target: &str, seconds: &str) -> Result<()> {
    if !FUZZ_TARGETS.contains(&target) {
        bail!(
            "unknown fuzz target '{}', expected one of: {}",
            target,
            FUZZ_TARGETS.join(", ")
        );
    }
    let max_time = format!("-max_total_time={}", seconds);
    let status = Command::new("cargo")
        .args(["+nightly", "fuzz", "run", target, "--", &max_time])
        .current_dir(project_root()?)
        .status()
        .context("Failed to run cargo fuzz (is cargo-fuzz installed?)")?;

    if !status.success() {
        bail!("fuzz target {} failed", target);
    }
    Ok(())
}

// ============================================================================
// Helper functions
// ============================================================================

fn project_root() -> Result<PathBuf> {
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => env::current_dir().context("no current directory")?,
    };

    // xtask is in project_root/xtask, so go up one level
    let root = manifest_dir.parent().unwrap_or(&manifest_dir);
    Ok(root.to_path_buf())
}

fn run_cargo(args: &[&str]) -> Result<()> {
    let root = project_root()?;

    let status = Command::new("cargo")
        .args(args)
        .current_dir(&root)
        .status()
        .with_context(|| format!("Failed to run cargo {:?}", args))?;

    if !status.success() {
        bail!("cargo {:?} failed", args);
    }

    Ok(())
}

/// The README's flag table is what service implementers read; it must match
/// the decoder's constants.
fn verify_wire_constants() -> Result<()> {
    let root = project_root()?;

    let header_rs = std::fs::read_to_string(root.join("src/wire/header.rs"))
        .context("Failed to read src/wire/header.rs")?;
    let readme = std::fs::read_to_string(root.join("README.md"))
        .context("Failed to read README.md")?;

    for (constant, doc_name) in [
        ("HAS_IDS", "ids"),
        ("HAS_HASHES", "hashes"),
        ("HAS_TAGS", "tags"),
        ("HAS_ATTRIBUTES", "attributes"),
    ] {
        let rust = extract_rust_const(&header_rs, constant)
            .with_context(|| format!("{} not found in header.rs", constant))?;
        let doc = extract_readme_bit(&readme, doc_name)
            .with_context(|| format!("'{}' row not found in README flag table", doc_name))?;
        if rust != doc {
            bail!(
                "{} is {:#04x} in header.rs but README documents {:#04x}",
                constant,
                rust,
                doc
            );
        }
    }

    Ok(())
}

fn extract_rust_const(content: &str, name: &str) -> Option<u8> {
    // Look for "pub const HAS_IDS: u8 = 0b0000_1000;"
    let line = content
        .lines()
        .find(|l| l.contains(&format!("const {}:", name)))?;
    let value = line.split('=').nth(1)?.trim().trim_end_matches(';').trim();
    parse_u8_literal(value)
}

fn extract_readme_bit(content: &str, name: &str) -> Option<u8> {
    // Look for "| ids | 0x08 | ..."
    content.lines().find_map(|line| {
        let cells: Vec<&str> = line.split('|').map(str::trim).collect();
        if cells.len() > 2 && cells[1].trim_matches('`') == name {
            parse_u8_literal(cells[2].trim_matches('`'))
        } else {
            None
        }
    })
}

fn parse_u8_literal(s: &str) -> Option<u8> {
    let s = s.replace('_', "");
    if let Some(bin) = s.strip_prefix("0b") {
        u8::from_str_radix(bin, 2).ok()
    } else if let Some(hex) = s.strip_prefix("0x") {
        u8::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}
