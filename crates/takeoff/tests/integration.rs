use std::path::PathBuf;

use framecount_takeoff::batch::{build_index, BatchPartition, FilterPolicy, ValidJobIdSet};
use framecount_takeoff::config::FrameConfig;
use framecount_takeoff::extract::extract_document;
use framecount_takeoff::group::process_members;
use framecount_takeoff::model::{ManifestBatch, ManifestRow, TakeoffFile};
use framecount_takeoff::summary::{summarize, SummaryKey, SummaryReport};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load(config: &FrameConfig, job_id: &str, fixture: &str) -> TakeoffFile {
    let path = fixtures_dir().join(fixture);
    let xml = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    let extraction = extract_document(&xml);
    assert!(!extraction.is_malformed(), "{fixture} should parse");
    TakeoffFile {
        job_id: job_id.into(),
        file_name: fixture.into(),
        groups: process_members(extraction.members, &config.grouping, &config.length),
    }
}

fn run(config: &FrameConfig, files: &[TakeoffFile], manifests: &[ManifestBatch]) -> SummaryReport {
    let mut valid = ValidJobIdSet::new();
    let mut batches = BatchPartition::new();
    for manifest in manifests {
        valid.extend_rows(&manifest.rows);
        batches.register_rows(&manifest.name, &manifest.rows);
    }
    let (index, _) = build_index(files, &valid, config.filter);
    summarize(&index, &batches, manifests, &config.summary_rules())
}

fn manifest(name: &str, jobs: &[&str]) -> ManifestBatch {
    ManifestBatch {
        name: name.into(),
        rows: jobs
            .iter()
            .enumerate()
            .map(|(i, job)| ManifestRow::new(i + 2, job, &format!("B{i}"), "0/100"))
            .collect(),
    }
}

// -------------------------------------------------------------------------
// End-to-end
// -------------------------------------------------------------------------

#[test]
fn stud_lengths_roll_up_by_converted_length() {
    let config = FrameConfig::default();
    let files = vec![load(&config, "J100", "studs.xml")];
    let report = run(&config, &files, &[manifest("mesa2", &["J100"])]);

    let studs = report.overall.category("stud").unwrap();
    assert_eq!(studs.len(), 2);
    assert_eq!(studs.get(&SummaryKey::length("7-8-0")), 2);
    assert_eq!(studs.get(&SummaryKey::length("8-8-8")), 3);
    assert_eq!(studs.total(), 5);
    // plates never reach the summary
    assert_eq!(report.overall.members, 5);
}

#[test]
fn job_missing_from_manifest_is_excluded() {
    let config = FrameConfig::default();
    let files = vec![load(&config, "J100", "studs.xml"), load(&config, "J200", "opening.xml")];
    let report = run(&config, &files, &[manifest("mesa2", &["J200"])]);

    assert_eq!(report.overall.jobs, 1);
    assert_eq!(report.overall.category("stud").unwrap().total(), 0);
    assert_eq!(report.overall.interest_total("headers_3_3_0"), 1);
    assert_eq!(report.overall.interest_total("jacks_6_9_6"), 2);
}

#[test]
fn unfiltered_policy_reports_unbatched_jobs() {
    let config = FrameConfig {
        filter: FilterPolicy::Unfiltered,
        ..FrameConfig::default()
    };
    let files = vec![load(&config, "J100", "studs.xml"), load(&config, "J200", "opening.xml")];
    let report = run(&config, &files, &[manifest("mesa2", &["J200"])]);

    assert_eq!(report.overall.jobs, 2);
    let unbatched = report.unbatched.as_ref().unwrap();
    assert_eq!(unbatched.category("stud").unwrap().total(), 5);
    assert_eq!(report.batch("mesa2").unwrap().category("king stud").unwrap().total(), 2);
}

#[test]
fn two_batches_split_totals() {
    let config = FrameConfig::default();
    let files = vec![load(&config, "J100", "studs.xml"), load(&config, "J200", "opening.xml")];
    let report = run(
        &config,
        &files,
        &[manifest("mesa2", &["J100"]), manifest("mesa3", &["J200", "J100"])],
    );

    assert_eq!(report.batch("mesa2").unwrap().category("stud").unwrap().total(), 5);
    assert_eq!(report.batch("mesa3").unwrap().category("stud").unwrap().total(), 0);
    assert_eq!(report.batch("mesa3").unwrap().interest_total("jacks_6_9_6"), 2);
    // J100 footage only counted for its owner
    assert_eq!(report.batch("mesa2").unwrap().manifest_footage, 100.0);
    assert_eq!(report.batch("mesa3").unwrap().manifest_footage, 100.0);
    assert!(report.unbatched.is_none());
}

#[test]
fn opening_file_sorted_by_priority() {
    let config = FrameConfig::default();
    let file = load(&config, "J200", "opening.xml");
    let types: Vec<_> = file.groups.iter().map(|g| g.member_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["KING STUD", "JACK", "HEADER", "SILL", "HEADER CRIPPLE", "BLOCKING"]
    );
    // uncarried sixteenths edge case is kept
    assert_eq!(file.groups[4].converted_length, "0-11-16");
}

#[test]
fn report_is_stable_json() {
    let config = FrameConfig::default();
    let files = vec![load(&config, "J100", "studs.xml"), load(&config, "J200", "opening.xml")];
    let manifests = [manifest("mesa2", &["J100", "J200"])];
    let a = run(&config, &files, &manifests).to_json_pretty().unwrap();
    let b = run(&config, &files, &manifests).to_json_pretty().unwrap();
    assert_eq!(a, b);

    let value: serde_json::Value = serde_json::from_str(&a).unwrap();
    assert_eq!(value["overall"]["interest"]["headers_3_3_0"], 1);
    assert_eq!(value["batches"]["mesa2"]["categories"]["stud"][0]["length"], "8-8-8");
}
