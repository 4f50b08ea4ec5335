use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn harvest(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_harvest"))
        .args(args)
        .output()
        .expect("binary runs")
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

// Placeholder rows never reach the network, so these runs need neither a
// browser nor a server.
#[test]
fn placeholder_only_input_completes_without_fetching() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sites.csv");
    let output = dir.path().join("out.csv");
    let manifest = dir.path().join("manifest.json");
    fs::write(&input, "Website\nN/A\nn/a\n").unwrap();

    let result = harvest(&[
        "--input", &arg(&input),
        "--mode", "contact",
        "--output", &arg(&output),
        "--manifest", &arg(&manifest),
        "--fetcher", "http",
    ]);

    assert_eq!(result.status.code(), Some(0));
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "Website,email_2\nN/A,N/A\nn/a,N/A\n"
    );
    assert!(String::from_utf8_lossy(&result.stdout)
        .contains("total=2 succeeded=0 not_found=2 failed=0"));
    assert!(manifest.exists());
}

#[test]
fn missing_input_exits_with_input_error() {
    let dir = TempDir::new().unwrap();
    let result = harvest(&[
        "-i", &arg(&dir.path().join("absent.csv")),
        "-m", "listing",
        "-o", &arg(&dir.path().join("out.csv")),
    ]);
    assert_eq!(result.status.code(), Some(2));
    assert!(!dir.path().join("out.csv").exists());
}

#[test]
fn input_without_the_mode_column_is_an_input_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sites.csv");
    fs::write(&input, "Website\nacme.example\n").unwrap();

    let result = harvest(&[
        "-i", &arg(&input),
        "-m", "listing",
        "-o", &arg(&dir.path().join("out.csv")),
    ]);
    assert_eq!(result.status.code(), Some(2));
}

#[test]
fn unwritable_output_flushes_results_to_stdout() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("queries.csv");
    let blocker = dir.path().join("blocker");
    fs::write(&input, "Query\nN/A\n").unwrap();
    fs::write(&blocker, "x").unwrap();

    let result = harvest(&[
        "-i", &arg(&input),
        "-m", "listing",
        "-o", &arg(&blocker.join("out.csv")),
        "--fetcher", "http",
    ]);

    assert_eq!(result.status.code(), Some(3));
    assert_eq!(
        String::from_utf8_lossy(&result.stdout),
        "Query,name,address\nN/A,N/A,N/A\n"
    );
}

#[test]
fn invalid_settings_fail_before_reading_input() {
    let dir = TempDir::new().unwrap();
    let result = harvest(&[
        "-i", &arg(&dir.path().join("absent.csv")),
        "-m", "contact",
        "-o", &arg(&dir.path().join("out.csv")),
        "--concurrency", "0",
    ]);
    assert_eq!(result.status.code(), Some(1));
}
