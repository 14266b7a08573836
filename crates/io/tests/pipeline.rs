//! End-to-end runs over real files: manifest spreadsheets written with
//! rust_xlsxwriter and take-off folders laid out as `{job}/{file}.xml`.

use std::fs;
use std::path::Path;

use framecount_io::{Diagnostic, Pipeline};
use framecount_takeoff::config::ManifestSource;
use framecount_takeoff::FrameConfig;
use rust_xlsxwriter::Workbook;
use tempfile::tempdir;

const STUDS: &str = include_str!("../../takeoff/tests/fixtures/studs.xml");
const OPENING: &str = include_str!("../../takeoff/tests/fixtures/opening.xml");

/// Write a one-sheet workbook. Numeric-looking cells are stored as numbers so
/// job ids round-trip through calamine as floats.
fn write_xlsx(path: &Path, sheet: Option<&str>, rows: &[&[&str]]) {
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    if let Some(name) = sheet {
        ws.set_name(name).unwrap();
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            match cell.parse::<f64>() {
                Ok(n) => ws.write_number(r as u32, c as u16, n).unwrap(),
                Err(_) => ws.write_string(r as u32, c as u16, *cell).unwrap(),
            };
        }
    }
    workbook.save(path).unwrap();
}

fn write_takeoff(root: &Path, job: &str, file: &str, xml: &str) {
    let dir = root.join(job);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), xml).unwrap();
}

#[test]
fn stud_summary_from_files() {
    let dir = tempdir().unwrap();
    write_xlsx(
        &dir.path().join("mesa2.xlsx"),
        None,
        &[
            &["Date", "Order", "Job", "Bundle", "LF"],
            &["45000", "A1", "100", "B-1", "12/340"],
        ],
    );
    let jobs = dir.path().join("jobs");
    write_takeoff(&jobs, "100", "walls.xml", STUDS);
    write_takeoff(&jobs, "999", "walls.xml", STUDS);

    let mut pipeline = Pipeline::with_base_dir(FrameConfig::default(), dir.path());
    assert_eq!(pipeline.load_manifest(&ManifestSource::mesa2("mesa2.xlsx")).unwrap(), 1);
    assert_eq!(pipeline.ingest_directory(&jobs).unwrap(), 2);

    let stats = pipeline.index_stats();
    assert_eq!(stats.files_indexed, 1);
    assert_eq!(stats.files_excluded, 1);

    let report = pipeline.summarize();
    let studs = report.batch("mesa2").unwrap().category("stud").unwrap();
    assert_eq!(studs.at_length("7-8-0"), 2);
    assert_eq!(studs.at_length("8-8-8"), 3);
    assert_eq!(studs.total(), 5);
    assert_eq!(report.overall.manifest_footage, 340.0);
    assert!(report.unbatched.is_none());
}

#[test]
fn two_manifest_layouts_union() {
    let dir = tempdir().unwrap();
    write_xlsx(
        &dir.path().join("mesa2.xlsx"),
        None,
        &[
            &["Date", "Order", "Job", "Bundle", "LF"],
            &["45000", "A1", "100", "B-1", "1/10"],
            &["45000", "A2", "200", "B-2", "1/20"],
        ],
    );
    write_xlsx(
        &dir.path().join("mesa3.xlsx"),
        Some("Deliveries"),
        &[
            &["Order", "Job", "Bundle", "Note", "LF"],
            &["C1", "200", "B-3", "", "30"],
            &["C2", "300", "B-4", "", "40"],
            &["C3", "", "B-5", "", "50"],
        ],
    );

    let mut mesa3 = ManifestSource::mesa3("mesa3.xlsx");
    mesa3.sheet = Some("Deliveries".into());

    let mut pipeline = Pipeline::with_base_dir(FrameConfig::default(), dir.path());
    pipeline.load_manifest(&ManifestSource::mesa2("mesa2.xlsx")).unwrap();
    assert_eq!(pipeline.load_manifest(&mesa3).unwrap(), 1);
    assert_eq!(pipeline.valid_ids().iter().collect::<Vec<_>>(), vec!["100", "200", "300"]);

    // reloading changes nothing
    assert_eq!(pipeline.load_manifest(&ManifestSource::mesa2("mesa2.xlsx")).unwrap(), 0);
    assert_eq!(pipeline.valid_ids().len(), 3);

    assert_eq!(pipeline.batches().batch_of("200"), Some("mesa2"));
    assert_eq!(pipeline.batches().batch_of("300"), Some("mesa3"));

    let diags = pipeline.diagnostics();
    assert!(diags.contains(&Diagnostic::ManifestRow {
        manifest: "mesa3".into(),
        row: 4,
        reason: "empty job id".into(),
    }));
    assert!(diags
        .iter()
        .any(|d| matches!(d, Diagnostic::BatchConflict { job_id, .. } if job_id == "200")));

    // reloading replaces that manifest's row and conflict diagnostics
    let before = pipeline.diagnostics().to_vec();
    pipeline.load_manifest(&mesa3).unwrap();
    assert_eq!(pipeline.diagnostics(), before.as_slice());

    let report = pipeline.summarize();
    assert_eq!(report.batch("mesa2").unwrap().manifest_footage, 30.0);
    assert_eq!(report.batch("mesa3").unwrap().manifest_footage, 40.0);
}

#[test]
fn config_file_run_resolves_relative_paths() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("deliveries.csv"),
        "Order,Job,Bundle,Note,LF\nA1,100,B-1,,5/96\nA2,200,B-2,,48\n",
    )
    .unwrap();
    let jobs = dir.path().join("jobs");
    write_takeoff(&jobs, "100", "wall.xml", STUDS);
    write_takeoff(&jobs, "200", "opening.xml", OPENING);
    write_takeoff(&jobs, "200", "broken.xml", "<PROJECT><MEMBER_DATA>");

    let config_path = dir.path().join("framecount.toml");
    fs::write(
        &config_path,
        r#"
name = "Mesa deliveries"

[[manifests]]
name = "mesa3"
file = "deliveries.csv"
job_column = "B"
bundle_column = "C"
footage_column = "E"

[[takeoffs]]
root = "jobs"
"#,
    )
    .unwrap();

    let mut pipeline = Pipeline::from_config_file(&config_path).unwrap();
    let first = pipeline.run().unwrap();

    let overall = &first.overall;
    assert_eq!(overall.jobs, 2);
    assert_eq!(overall.files, 3);
    assert_eq!(overall.interest_total("headers_3_3_0"), 1);
    assert_eq!(overall.interest_total("jacks_6_9_6"), 2);
    assert_eq!(overall.category("king stud").unwrap().at_length("7-8-0"), 2);
    assert_eq!(overall.manifest_footage, 144.0);

    assert!(pipeline
        .diagnostics()
        .iter()
        .any(|d| matches!(d, Diagnostic::MalformedDocument { file_name, .. } if file_name == "broken.xml")));

    // a second run starts clean and agrees
    let diagnostics = pipeline.diagnostics().len();
    let second = pipeline.run().unwrap();
    assert_eq!(first, second);
    assert_eq!(pipeline.diagnostics().len(), diagnostics);
    assert_eq!(
        first.to_json_pretty().unwrap(),
        second.to_json_pretty().unwrap()
    );

    let out = dir.path().join("report.json");
    pipeline.write_report(&out).unwrap();
    let written: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["name"], "Mesa deliveries");
    assert_eq!(written["index"]["files_indexed"], 3);
    assert_eq!(written["diagnostics"][0]["kind"], "malformed_document");
}

#[test]
fn missing_manifest_file_is_an_error() {
    let dir = tempdir().unwrap();
    let mut pipeline = Pipeline::with_base_dir(FrameConfig::default(), dir.path());
    assert!(pipeline.load_manifest(&ManifestSource::mesa2("absent.xlsx")).is_err());
    assert!(pipeline.valid_ids().is_empty());
}

#[test]
fn invalid_config_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "filter = \"sometimes\"\n").unwrap();
    assert!(Pipeline::from_config_file(&path).is_err());
}
