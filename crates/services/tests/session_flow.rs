use std::sync::Arc;

use learned_core::model::{ItemId, PageId, ProgressDocument};
use learned_core::time::fixed_clock;
use services::{
    ContentFeed, ContentNode, LearnableItem, PersistenceMode, ProgressSession, RecordingStatus,
    SessionConfig, SimpleItem, StatusMessage,
};
use storage::file::{FileHandle, FsPermissionGate, PermissionGate, PromptPolicy, save_to_file};
use storage::repository::{FileHandleRepository, InMemoryRepository, ProgressRepository, Storage};

fn page() -> PageId {
    PageId::new("spanish-101").unwrap()
}

fn config() -> SessionConfig {
    SessionConfig::new(page()).with_clock(fixed_clock())
}

fn gate() -> Arc<dyn PermissionGate> {
    Arc::new(FsPermissionGate::new(PromptPolicy::Accept))
}

fn rows(labels: &[&str]) -> (Vec<Arc<SimpleItem>>, Vec<ContentNode>) {
    let items: Vec<_> = labels.iter().map(|l| SimpleItem::new(*l)).collect();
    let nodes = items
        .iter()
        .map(|item| ContentNode::item_with_control(item.clone()))
        .collect();
    (items, nodes)
}

fn control_key(node: &ContentNode) -> services::NodeKey {
    node.as_element().unwrap().children()[0].key().unwrap()
}

async fn stored(repo: &InMemoryRepository) -> ProgressDocument {
    repo.get_document().await.unwrap().unwrap_or_default()
}

#[tokio::test]
async fn boot_restores_and_paints_stored_progress() {
    let repo = InMemoryRepository::new();
    let mut doc = ProgressDocument::new();
    doc.set_set(&page(), [ItemId::from_label("hola").unwrap()]);
    repo.put_document(&doc).await.unwrap();

    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["hola", "adiós", "gracias"]);
    let session = ProgressSession::init(
        config(),
        Storage::from_repo(repo),
        gate(),
        status.clone(),
        &nodes,
    )
    .await;

    assert_eq!(session.mode(), PersistenceMode::Durable);
    assert!(items[0].is_learned());
    assert!(!items[1].is_learned());
    assert_eq!(session.summary().learned, 1);
    assert_eq!(session.summary().total, 3);
    assert_eq!(status.messages()[0], StatusMessage::Restored { learned: 1 });
}

#[tokio::test]
async fn fresh_store_starts_empty() {
    let status = Arc::new(RecordingStatus::new());
    let (_, nodes) = rows(&["uno"]);
    let session =
        ProgressSession::init(config(), Storage::in_memory(), gate(), status.clone(), &nodes)
            .await;

    assert!(session.document().is_empty());
    assert_eq!(status.last_message(), Some(StatusMessage::Fresh));
    assert_eq!(status.last_progress().unwrap().percent, 0);
}

#[tokio::test]
async fn toggle_persists_and_recomputes() {
    let repo = InMemoryRepository::new();
    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["uno", "dos", "tres", "cuatro"]);
    let mut session = ProgressSession::init(
        config(),
        Storage::from_repo(repo.clone()),
        gate(),
        status.clone(),
        &nodes,
    )
    .await;

    assert_eq!(session.activate(nodes[1].key().unwrap()).await, Some(true));
    assert!(items[1].is_learned());
    assert_eq!(status.last_message(), Some(StatusMessage::Saved));
    assert_eq!(session.summary().percent, 25);
    assert!(stored(&repo).await.contains(&page(), &ItemId::from_label("dos").unwrap()));

    // The control routes to the same item.
    assert_eq!(session.activate(control_key(&nodes[1])).await, Some(false));
    assert!(!items[1].is_learned());
    assert!(stored(&repo).await.is_empty());
}

#[tokio::test]
async fn failed_write_keeps_model_and_last_stored_state() {
    let repo = InMemoryRepository::new();
    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["uno", "dos"]);
    let mut session = ProgressSession::init(
        config(),
        Storage::from_repo(repo.clone()),
        gate(),
        status.clone(),
        &nodes,
    )
    .await;

    session.activate(nodes[0].key().unwrap()).await;
    let committed = stored(&repo).await;

    repo.set_fail_writes(true);
    assert_eq!(session.activate(nodes[1].key().unwrap()).await, Some(true));
    assert_eq!(status.last_message(), Some(StatusMessage::SaveFailed));
    assert!(items[1].is_learned());
    assert_eq!(session.document().learned_count(&page()), 2);
    assert_eq!(stored(&repo).await, committed);

    // Next successful write catches the store up.
    repo.set_fail_writes(false);
    session.activate(nodes[0].key().unwrap()).await;
    assert_eq!(&stored(&repo).await, session.document());
}

#[tokio::test]
async fn unreadable_store_runs_ephemeral_without_writing() {
    let repo = InMemoryRepository::new();
    let mut doc = ProgressDocument::new();
    doc.set_set(&page(), [ItemId::from_label("uno").unwrap()]);
    repo.put_document(&doc).await.unwrap();
    repo.set_fail_reads(true);

    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["uno", "dos"]);
    let mut session = ProgressSession::init(
        config(),
        Storage::from_repo(repo.clone()),
        gate(),
        status.clone(),
        &nodes,
    )
    .await;

    assert_eq!(session.mode(), PersistenceMode::Ephemeral);
    assert!(status.messages().contains(&StatusMessage::LoadFailed));
    assert!(!items[0].is_learned());

    session.activate(nodes[1].key().unwrap()).await;
    assert!(items[1].is_learned());

    repo.set_fail_reads(false);
    assert_eq!(stored(&repo).await, doc);
}

#[tokio::test]
async fn dynamic_insertions_bind_once_through_the_event_loop() {
    let status = Arc::new(RecordingStatus::new());
    let (_, initial) = rows(&["uno"]);
    let session =
        ProgressSession::init(config(), Storage::in_memory(), gate(), status.clone(), &initial)
            .await;

    let (feed, rx) = ContentFeed::channel(16);
    let handle = tokio::spawn(session.run(rx));

    let (added, nodes) = rows(&["a", "b", "c", "d", "e"]);
    let batch = vec![ContentNode::container(nodes.clone())];
    assert!(feed.insert(batch.clone()).await);
    assert!(feed.insert(batch).await);
    assert!(feed.activate(nodes[2].key().unwrap()).await);
    drop(feed);

    let doc = handle.await.unwrap();
    assert_eq!(doc.learned_count(&page()), 1);
    assert!(added[2].is_learned());
    // Item and control each paint once when bound and once on toggle; the
    // repeated insert adds nothing.
    assert_eq!(added[2].repaints(), 4);
    assert_eq!(added[0].repaints(), 2);
    // Teardown released the bindings.
    assert!(!nodes[0].as_element().unwrap().is_bound());

    let summary = status.last_progress().unwrap();
    assert_eq!((summary.total, summary.learned), (6, 1));
}

#[tokio::test]
async fn removal_drops_items_from_the_counters() {
    let status = Arc::new(RecordingStatus::new());
    let (_, nodes) = rows(&["uno", "dos"]);
    let mut session =
        ProgressSession::init(config(), Storage::in_memory(), gate(), status.clone(), &nodes)
            .await;
    assert_eq!(session.binding_count(), 4);

    let report = session.handle_change(&services::ContentChange::removed(vec![nodes[0].clone()]));
    assert_eq!(report.detached, 2);
    assert_eq!(session.summary().total, 1);
    assert_eq!(session.activate(nodes[0].key().unwrap()).await, None);
}

#[tokio::test]
async fn hide_learned_is_applied_and_remembered() {
    let repo = InMemoryRepository::new();
    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["uno", "dos"]);
    let mut session = ProgressSession::init(
        config(),
        Storage::from_repo(repo.clone()),
        gate(),
        status.clone(),
        &nodes,
    )
    .await;

    session.set_hide_learned(true).await;
    session.activate(nodes[0].key().unwrap()).await;
    assert!(items[0].is_hidden());
    assert!(!items[1].is_hidden());
    assert_eq!(session.summary().total, 2);
    session.teardown();

    let (items, nodes) = rows(&["uno", "dos"]);
    let session = ProgressSession::init(
        config(),
        Storage::from_repo(repo),
        gate(),
        status,
        &nodes,
    )
    .await;
    assert!(session.view_settings().hide_learned);
    assert!(items[0].is_hidden());
}

#[tokio::test]
async fn export_and_import_through_bound_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["uno", "dos"]);
    let mut session =
        ProgressSession::init(config(), Storage::in_memory(), gate(), status.clone(), &nodes)
            .await;

    session.bind_file(FileHandle::new(&path)).await.unwrap();
    session.activate(nodes[0].key().unwrap()).await;
    session.export().await.unwrap();
    assert!(matches!(
        status.last_message(),
        Some(StatusMessage::Exported { .. })
    ));

    let mut replacement = ProgressDocument::new();
    replacement.set_set(&page(), [ItemId::from_label("dos").unwrap()]);
    save_to_file(&FileHandle::new(&path), &replacement).await.unwrap();

    session.import().await.unwrap();
    assert_eq!(session.document(), &replacement);
    assert!(!items[0].is_learned());
    assert!(items[1].is_learned());
}

#[tokio::test]
async fn declined_prompt_leaves_file_unbound() {
    let dir = tempfile::tempdir().unwrap();
    let status = Arc::new(RecordingStatus::new());
    let declining: Arc<dyn PermissionGate> = Arc::new(FsPermissionGate::new(PromptPolicy::Decline));
    let mut session =
        ProgressSession::init(config(), Storage::in_memory(), declining, status.clone(), &[])
            .await;

    assert!(session.bind_file(FileHandle::new(dir.path().join("new.json"))).await.is_err());
    assert_eq!(status.last_message(), Some(StatusMessage::PermissionDenied));
    assert!(session.export().await.is_err());
}

#[tokio::test]
async fn empty_store_falls_back_to_granted_file() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("progress.json"));
    let mut doc = ProgressDocument::new();
    doc.set_set(&page(), [ItemId::from_label("uno").unwrap()]);
    save_to_file(&handle, &doc).await.unwrap();

    let repo = InMemoryRepository::new();
    let storage = Storage::from_repo(repo.clone());
    storage.file_handles.save_handle(&handle).await.unwrap();

    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["uno"]);
    let session = ProgressSession::init(config(), storage, gate(), status.clone(), &nodes).await;

    assert!(items[0].is_learned());
    assert_eq!(session.summary().percent, 100);
    assert_eq!(
        status.messages()[0],
        StatusMessage::RestoredFromFile { learned: 1 }
    );
    assert_eq!(stored(&repo).await, doc);
}

#[tokio::test]
async fn corrupt_fallback_file_boots_empty() {
    let dir = tempfile::tempdir().unwrap();
    let handle = FileHandle::new(dir.path().join("progress.json"));
    std::fs::write(handle.path(), "{{{ definitely not progress").unwrap();

    let storage = Storage::in_memory();
    storage.file_handles.save_handle(&handle).await.unwrap();

    let status = Arc::new(RecordingStatus::new());
    let session = ProgressSession::init(config(), storage, gate(), status.clone(), &[]).await;
    assert!(session.document().is_empty());
    assert_eq!(status.last_message(), Some(StatusMessage::Fresh));
}

#[tokio::test]
async fn corrupt_import_keeps_current_and_stored_progress() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("progress.json");
    let repo = InMemoryRepository::new();
    let status = Arc::new(RecordingStatus::new());
    let (items, nodes) = rows(&["uno", "dos"]);
    let mut session = ProgressSession::init(
        config(),
        Storage::from_repo(repo.clone()),
        gate(),
        status.clone(),
        &nodes,
    )
    .await;

    session.bind_file(FileHandle::new(&path)).await.unwrap();
    session.activate(nodes[0].key().unwrap()).await;
    let before = session.document().clone();

    std::fs::write(&path, [0xff, 0xfe, b'{', b'}']).unwrap();
    assert!(session.import().await.is_err());
    assert_eq!(status.last_message(), Some(StatusMessage::ImportFailed));
    assert_eq!(session.document(), &before);
    assert_eq!(stored(&repo).await, before);
    assert!(items[0].is_learned());
}
