use dicomsync::core::{RecordingEventSink, SyncEvent};
use dicomsync::{
    DicomRootFolder, Domain, Place, SendOptions, StudyKey, StudyQuery, SyncEngine,
    ZippedDicomRootFolder,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn add_study(root: &Path, patient: &str, study: &str) {
    let dir = root.join(patient).join(study);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("1.dcm"), format!("{}-{}", patient, study)).unwrap();
    fs::write(dir.join("2.dcm"), b"second slice").unwrap();
}

fn setup() -> (TempDir, Domain) {
    let temp = TempDir::new().unwrap();
    let studies = temp.path().join("my_studies");
    add_study(&studies, "patient1", "study1");
    add_study(&studies, "patient1", "study2");
    add_study(&studies, "patient1", "study3");
    add_study(&studies, "patient2", "study1");

    let mut domain = Domain::new();
    domain
        .register("my_studies", Box::new(DicomRootFolder::new(studies)))
        .unwrap();
    domain
        .register(
            "zipped",
            Box::new(ZippedDicomRootFolder::new(temp.path().join("zipped"))),
        )
        .unwrap();
    (temp, domain)
}

#[tokio::test]
async fn test_send_single_study_is_idempotent() {
    let (temp, domain) = setup();
    let query = StudyQuery::parse("my_studies:patient1/study2").unwrap();
    let engine = SyncEngine::new(&domain);

    let first = engine
        .send(&query, "zipped", SendOptions::default())
        .await
        .unwrap();
    assert_eq!(first.sent_count(), 1);
    assert_eq!(first.duplicate_count(), 0);
    assert!(temp.path().join("zipped/patient1/study2.zip").exists());

    let second = engine
        .send(&query, "zipped", SendOptions::default())
        .await
        .unwrap();
    assert_eq!(
        (second.sent_count(), second.duplicate_count(), second.failed_count()),
        (0, 1, 0)
    );
}

#[tokio::test]
async fn test_round_trip_through_zip_keeps_files() {
    let (temp, mut domain) = setup();
    domain
        .register(
            "restored",
            Box::new(DicomRootFolder::new(temp.path().join("restored"))),
        )
        .unwrap();
    let engine = SyncEngine::new(&domain);

    engine
        .send(
            &StudyQuery::parse("my_studies:*").unwrap(),
            "zipped",
            SendOptions::default(),
        )
        .await
        .unwrap();
    let report = engine
        .send(
            &StudyQuery::parse("zipped:patient2").unwrap(),
            "restored",
            SendOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(report.sent_count(), 1);

    let restored = temp.path().join("restored/patient2/study1");
    assert_eq!(
        fs::read_to_string(restored.join("1.dcm")).unwrap(),
        "patient2-study1"
    );
    assert_eq!(fs::read(restored.join("2.dcm")).unwrap(), b"second slice");

    let zipped = domain.get("zipped").unwrap().list_studies().await.unwrap();
    assert_eq!(zipped.len(), 4);
    assert!(zipped.contains(&StudyKey::new("patient1", "study3")));
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let (temp, domain) = setup();
    let report = SyncEngine::new(&domain)
        .send(
            &StudyQuery::parse("my_studies:patient1*").unwrap(),
            "zipped",
            SendOptions { dry_run: true },
        )
        .await
        .unwrap();

    assert_eq!(report.would_send.len(), 3);
    assert_eq!(report.sent_count(), 0);
    assert!(!temp.path().join("zipped").exists());
}

#[tokio::test]
async fn test_events_follow_the_run() {
    let (_temp, domain) = setup();
    let sink = Arc::new(RecordingEventSink::new());
    let engine = SyncEngine::with_events(&domain, sink.clone());

    engine
        .send(
            &StudyQuery::parse("my_studies:patient2/*").unwrap(),
            "zipped",
            SendOptions::default(),
        )
        .await
        .unwrap();

    let events = sink.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, SyncEvent::StudySent { study } if study.to_string() == "my_studies:patient2/study1")));
    match events.last() {
        Some(SyncEvent::Finished(report)) => assert_eq!(report.sent_count(), 1),
        other => panic!("last event should be the report, got {:?}", other),
    }
}

#[tokio::test]
async fn test_zip_with_series_folders_unpacks_every_file() {
    let temp = TempDir::new().unwrap();
    let patient_dir = temp.path().join("zipped").join("patient1");
    fs::create_dir_all(&patient_dir).unwrap();

    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in [("series1/IM0001", "series one"), ("series2/IM0001", "series two")] {
        zip.start_file(name, zip::write::SimpleFileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut zip, data.as_bytes()).unwrap();
    }
    fs::write(
        patient_dir.join("study1.zip"),
        zip.finish().unwrap().into_inner(),
    )
    .unwrap();

    let mut domain = Domain::new();
    domain
        .register(
            "zipped",
            Box::new(ZippedDicomRootFolder::new(temp.path().join("zipped"))),
        )
        .unwrap();
    domain
        .register(
            "local",
            Box::new(DicomRootFolder::new(temp.path().join("local"))),
        )
        .unwrap();

    let report = SyncEngine::new(&domain)
        .send(
            &StudyQuery::parse("zipped:*").unwrap(),
            "local",
            SendOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!((report.sent_count(), report.failed_count()), (1, 0));

    let study = temp.path().join("local/patient1/study1");
    assert_eq!(
        fs::read_to_string(study.join("series1/IM0001")).unwrap(),
        "series one"
    );
    assert_eq!(
        fs::read_to_string(study.join("series2/IM0001")).unwrap(),
        "series two"
    );
}
