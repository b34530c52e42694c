use learned_core::model::{ItemId, PageId, ProgressDocument};
use storage::file::{FileBindingError, FileHandle, load_from_file, save_to_file};

fn sample() -> ProgressDocument {
    let mut doc = ProgressDocument::new();
    doc.set_set(
        &PageId::new("lesson-1").unwrap(),
        ["tres", "uno", "dos"].map(|label| ItemId::from_label(label).unwrap()),
    );
    doc
}

#[tokio::test]
async fn save_then_load_yields_same_sets() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("progress.json"));

    save_to_file(&handle, &sample()).await.unwrap();
    let loaded = load_from_file(&handle).await.unwrap();
    assert_eq!(loaded, sample());
}

#[tokio::test]
async fn saved_file_is_readable_and_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("progress.json"));

    save_to_file(&handle, &sample()).await.unwrap();
    let raw = std::fs::read_to_string(handle.path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        value["pages"]["lesson-1"],
        serde_json::json!(["dos", "tres", "uno"])
    );
    assert!(raw.contains('\n'));
    assert!(!dir.path().join("progress.json.tmp").exists());
}

#[tokio::test]
async fn save_replaces_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("progress.json"));
    std::fs::write(handle.path(), "x".repeat(4096)).unwrap();

    save_to_file(&handle, &ProgressDocument::new()).await.unwrap();
    let raw = std::fs::read_to_string(handle.path()).unwrap();
    assert_eq!(raw.trim(), r#"{
  "pages": {}
}"#);
}

#[tokio::test]
async fn malformed_file_loads_as_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("progress.json"));

    for garbage in ["", "{not json", r#"{"pages": {"p": [1]}}"#, "[1, 2, 3]"] {
        std::fs::write(handle.path(), garbage).unwrap();
        let loaded = load_from_file(&handle).await.unwrap();
        assert!(loaded.is_empty(), "expected empty document for {garbage:?}");
    }

    std::fs::write(handle.path(), [0xff, 0xfe, b'{', b'}']).unwrap();
    let loaded = load_from_file(&handle).await.unwrap();
    assert!(loaded.is_empty());
}

#[tokio::test]
async fn legacy_file_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("legacy.json"));
    std::fs::write(handle.path(), r#"{"lesson-1": ["uno", "dos", "tres"]}"#).unwrap();

    assert_eq!(load_from_file(&handle).await.unwrap(), sample());
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("nope.json"));
    assert!(matches!(
        load_from_file(&handle).await,
        Err(FileBindingError::Io { .. })
    ));
}
