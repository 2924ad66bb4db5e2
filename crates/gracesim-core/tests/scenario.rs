//! End-to-end scenarios against the fake store.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use gracesim_core::{
    AlertMonitor, AlertType, Classification, EventDb, FakeDb, GraceId, Group, Label, Pipeline,
    Search,
};

fn stub_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn create_then_label_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let db = FakeDb::open(tmp.path().join("db")).unwrap();
    let mut monitor = AlertMonitor::attach(db.alert_path()).unwrap();

    let classification = Classification::new(Group::Test, Pipeline::Gstlal, Some(Search::LowMass));
    let coinc = stub_file(
        tmp.path(),
        "coinc.json",
        r#"{"gpstime": 1137313504.83, "far": 1e-9}"#,
    );

    let record = db.create_event(classification, &coinc).unwrap();
    let id = record.graceid;
    assert_eq!(id.prefix(), 'T');
    assert_eq!(id.to_string().len(), 7);
    assert_eq!(record.gpstime, Some(1_137_313_504.83));

    // Creation emits exactly one "new" followed by one "update".
    let alerts = monitor.poll().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].0, "Test_gstlal_LowMass");
    assert_eq!(alerts[0].1.alert_type, AlertType::New);
    assert_eq!(alerts[1].1.alert_type, AlertType::Update);
    assert_eq!(alerts[1].1.description, "initial data");

    // Labelling couples a log entry with the label itself.
    db.write_label(id, &Label::parse("EM_READY").unwrap()).unwrap();

    let labels = db.labels(id).unwrap();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].name.as_str(), "EM_READY");

    let page = db.logs(id).unwrap();
    assert!(page
        .log
        .iter()
        .any(|e| e.comment == "applying label : EM_READY"));

    let alerts = monitor.poll().unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].1.alert_type, AlertType::Update);
    assert_eq!(alerts[1].1.alert_type, AlertType::Label);
    assert_eq!(alerts[1].1.description, "EM_READY");
}

#[test]
fn round_trip_counts() {
    let tmp = TempDir::new().unwrap();
    let db = FakeDb::open(tmp.path().join("db")).unwrap();
    let classification = Classification::new(Group::Test, Pipeline::Cwb, None);
    let trigger = stub_file(tmp.path(), "trigger_1137313504.8337.txt", "time: 1137313504.8337\n");
    let id = db.create_event(classification, &trigger).unwrap().graceid;

    for n in 0..3 {
        db.write_log(id, &format!("log {n}"), None, &[]).unwrap();
    }
    db.write_label(id, &Label::parse("INJ").unwrap()).unwrap();
    db.write_label(id, &Label::parse("DQV").unwrap()).unwrap();
    db.write_file(id, &stub_file(tmp.path(), "skymap.fits.gz", "fits"))
        .unwrap();

    // 1 implicit + 3 logs + 2 label logs + 1 file log.
    let page = db.logs(id).unwrap();
    assert_eq!(page.num_rows, 6);
    let ns: Vec<usize> = page.log.iter().map(|e| e.n).collect();
    assert_eq!(ns, (0..6).collect::<Vec<_>>());

    let labels = db.labels(id).unwrap();
    let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["INJ", "DQV"]);

    let files = db.files(id).unwrap();
    assert_eq!(files.len(), 2);
    assert!(files.contains_key("trigger_1137313504.8337.txt"));
    assert!(files.contains_key("skymap.fits.gz"));
}

#[test]
fn query_filters_intersect() {
    let tmp = TempDir::new().unwrap();
    let db = FakeDb::open(tmp.path().join("db")).unwrap();
    let classification = Classification::new(Group::Test, Pipeline::Gstlal, None);

    let early = stub_file(tmp.path(), "early.json", r#"{"gpstime": 1000.0}"#);
    let late = stub_file(tmp.path(), "late.json", r#"{"gpstime": 2000.0}"#);

    let a = db.create_event(classification, &early).unwrap().graceid;
    let b = db.create_event(classification, &late).unwrap().graceid;
    db.write_label(a, &Label::parse("EM_READY").unwrap()).unwrap();

    let ids = |query: Option<&str>| -> Vec<GraceId> {
        db.events(query)
            .unwrap()
            .map(|r| r.unwrap().record.graceid)
            .collect()
    };

    assert_eq!(ids(None), vec![a, b]);
    assert_eq!(ids(Some("500..1500")), vec![a]);
    assert_eq!(ids(Some("EM_READY")), vec![a]);
    assert_eq!(ids(Some(&b.to_string())), vec![b]);
    // Intersection: the label holder is outside the window.
    assert_eq!(ids(Some("1500..2500 EM_READY")), Vec::<GraceId>::new());
    // Two distinct identifiers can never both match.
    assert_eq!(
        ids(Some(&format!("{a} {b}"))),
        Vec::<GraceId>::new()
    );

    assert!(db.events(Some("wat")).is_err());

    // Re-querying reflects new store state.
    db.write_label(b, &Label::parse("EM_READY").unwrap()).unwrap();
    assert_eq!(ids(Some("EM_READY")), vec![a, b]);
}
