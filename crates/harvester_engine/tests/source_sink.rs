use std::fs;
use std::sync::Once;

use harvester_core::{ExtractedRecord, FailureKind, Fields, ReportBuilder, Target, TargetKind};
use harvester_engine::{read_targets, render_manifest, write_manifest, write_results, SinkError, SourceError};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const BASE: &str = "https://maps.example/search";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn email(address: &str) -> Vec<Fields> {
    let mut fields = Fields::new();
    fields.insert("email".to_string(), address.to_string());
    fields.insert("phones".to_string(), "(555) 010-2030".to_string());
    vec![fields]
}

fn contact_run() -> (Vec<Target>, harvester_core::HarvestReport) {
    let targets = vec![
        Target::site_contact(1, "acme.example"),
        Target::site_contact(2, "N/A"),
        Target::site_contact(3, "down.example"),
    ];
    let mut builder = ReportBuilder::new(vec![1, 2, 3]);
    builder.insert(2, ExtractedRecord::failed(3, FailureKind::Timeout).with_retries(1));
    builder.insert(0, ExtractedRecord::found(1, email("sales@acme.example")));
    builder.insert(1, ExtractedRecord::not_found(2));
    (targets, builder.finish())
}

#[test]
fn unreadable_row_becomes_a_defect_and_reading_continues() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("sites.csv");
    let mut bytes = b"Name,Website\nAcme,acme.example\nBad,\xff\xfe.example\n".to_vec();
    bytes.extend_from_slice(b"Bolt,http://bolt.example\n");
    fs::write(&input, bytes).unwrap();

    let targets = read_targets(&input, TargetKind::SiteContact, BASE).unwrap();

    assert_eq!(targets.len(), 3);
    assert_eq!(targets[0].primary_url.as_deref(), Some("https://acme.example"));
    assert!(targets[1].defect.is_some());
    assert_eq!(targets[1].primary_url, None);
    assert_eq!(targets[2].primary_url.as_deref(), Some("http://bolt.example"));
    assert_eq!(targets.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn listing_queries_become_search_urls() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("queries.csv");
    fs::write(&input, "query\nbakery in Springfield\n\n").unwrap();

    let targets = read_targets(&input, TargetKind::ListingQuery, BASE).unwrap();

    assert_eq!(targets.len(), 1);
    assert_eq!(
        targets[0].primary_url.as_deref(),
        Some("https://maps.example/search/bakery+in+Springfield")
    );
}

#[test]
fn missing_input_file_is_an_open_error() {
    let dir = TempDir::new().unwrap();
    let err = read_targets(&dir.path().join("absent.csv"), TargetKind::SiteContact, BASE)
        .unwrap_err();
    assert!(matches!(err, SourceError::Open { .. }));
}

#[test]
fn results_are_written_in_input_order() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.csv");
    let (targets, report) = contact_run();

    write_results(&output, TargetKind::SiteContact, &targets, &report).unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "Website,email_2\nacme.example,sales@acme.example\nN/A,N/A\ndown.example,Error\n"
    );
}

#[test]
fn failed_write_keeps_the_rendered_output() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    fs::write(&blocker, "x").unwrap();
    let (targets, report) = contact_run();

    let err = write_results(&blocker.join("out.csv"), TargetKind::SiteContact, &targets, &report)
        .unwrap_err();

    assert!(matches!(err, SinkError::Write { .. }));
    assert_eq!(
        err.rendered(),
        Some("Website,email_2\nacme.example,sales@acme.example\nN/A,N/A\ndown.example,Error\n")
    );
}

#[test]
fn manifest_carries_counts_and_failure_kinds() {
    let (targets, report) = contact_run();
    let manifest: serde_json::Value =
        serde_json::from_str(&render_manifest(&targets, &report).unwrap()).unwrap();

    assert_eq!(manifest["total"], 3);
    assert_eq!(manifest["succeeded"], 1);
    assert_eq!(manifest["not_found"], 1);
    assert_eq!(manifest["failed"], 1);
    assert_eq!(manifest["targets"][0]["status"], "ok");
    assert_eq!(manifest["targets"][1]["status"], "not_found");
    assert_eq!(manifest["targets"][2]["failure"], "timeout");
    assert_eq!(manifest["targets"][2]["retries"], 1);
    assert_eq!(manifest["targets"][0]["fields"][0]["phones"], "(555) 010-2030");
    assert_eq!(manifest["targets"][1]["fields"], serde_json::json!([]));

    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir.path().join("manifest.json"), &targets, &report).unwrap();
    assert!(fs::read_to_string(path).unwrap().contains("\"cancelled\": 0"));
}
