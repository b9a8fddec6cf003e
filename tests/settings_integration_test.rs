use dicomsync::app::commands;
use dicomsync::{PlaceConfig, SendOptions, Settings, SyncError};
use std::fs;
use tempfile::TempDir;

#[tokio::test]
async fn test_settings_file_drives_find_and_send() {
    let temp = TempDir::new().unwrap();
    let settings_path = Settings::default_path(temp.path());
    commands::init(&settings_path).unwrap();

    let studies = temp.path().join("studies");
    let dir = studies.join("patient1").join("study1");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("1.dcm"), b"dicom").unwrap();

    let mut settings = Settings::from_file(&settings_path).unwrap();
    commands::add_place(
        &mut settings,
        PlaceConfig::folder("studies", studies.to_str().unwrap()),
    )
    .unwrap();
    commands::add_place(
        &mut settings,
        PlaceConfig::zip("zipped", temp.path().join("zipped").to_str().unwrap()),
    )
    .unwrap();
    settings.save(&settings_path).unwrap();

    let reloaded = Settings::from_file(&settings_path).unwrap();
    assert_eq!(
        commands::status(&reloaded).text,
        "2 places defined in settings: [studies, zipped]"
    );

    let domain = reloaded.to_domain().unwrap();
    let listing = commands::list_places(&domain).text;
    assert!(listing.contains("studies"));
    assert!(listing.contains("zip"));

    let (output, report) = commands::send(&domain, "studies:*", "zipped", SendOptions::default())
        .await
        .unwrap();
    assert!(output.success);
    assert_eq!(report.sent_count(), 1);

    let found = commands::find(&domain, "zipped:*").await.unwrap();
    assert_eq!(found.text, "found 1:\nzipped:patient1/study1");
}

#[test]
fn test_missing_settings_file() {
    let temp = TempDir::new().unwrap();
    let result = Settings::from_file(temp.path().join("nothing.toml"));
    assert!(matches!(result, Err(SyncError::NoSettingsFound { .. })));
}

#[test]
fn test_remove_place_and_unknown_key() {
    let mut settings = Settings::default();
    settings.add_place(PlaceConfig::folder("a", "/data/a")).unwrap();

    let output = commands::remove_place(&mut settings, "a").unwrap();
    assert_eq!(output.text, "Removed folder place 'a'");
    assert!(matches!(
        commands::remove_place(&mut settings, "a"),
        Err(SyncError::UnknownPlace { .. })
    ));
}
