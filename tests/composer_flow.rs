//! End-to-end compose flow: edits debounce into a SQLite store, the draft
//! sends through the outbox, and teardown flushes what's left.

use std::sync::Arc;
use std::time::Duration;

use quillpad::{
    AutosaveConfig, Composer, Draft, DraftStore, EmailAddress, MemoryOutbox, RecipientField,
    SaveOutcome, SqliteDraftStore,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn addr(s: &str) -> EmailAddress {
    EmailAddress::parse(s).unwrap()
}

// Real-clock debounce; generous margins keep this stable on slow CI.
const INTERVAL: Duration = Duration::from_millis(50);
const WELL_PAST: Duration = Duration::from_millis(400);

#[tokio::test]
async fn edits_autosave_then_send_then_flush() {
    init_tracing();

    let store = Arc::new(SqliteDraftStore::open_in_memory().unwrap());
    let outbox = Arc::new(MemoryOutbox::new());

    let draft = Draft::new();
    let id = draft.id.clone();
    let composer = Composer::new(
        draft.clone(),
        Arc::clone(&store),
        Arc::clone(&outbox),
        AutosaveConfig::with_interval(INTERVAL),
    );

    // Typing bursts faster than the window coalesce into one save.
    for body in ["D", "De", "Dea", "Dear team,"] {
        let mut edit = draft.clone();
        edit.body = body.to_string();
        composer.update_draft(edit);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    tokio::time::sleep(WELL_PAST).await;
    let persisted = store.load_draft(&id).await.unwrap().expect("autosaved");
    assert_eq!(persisted.body, "Dear team,");
    assert!(persisted.last_saved_at.is_some());
    assert!(composer.status().last_saved_at.is_some());

    // Finish the draft and send it.
    let mut finished = composer.draft().await.unwrap();
    finished.add_recipient(RecipientField::To, addr("team@example.com"));
    finished.subject = "Weekly update".to_string();
    composer.update_draft(finished);

    composer.send().await.unwrap();
    let sent = outbox.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Weekly update");

    // Sent content is settled; the end-of-session flush has nothing to do.
    assert_eq!(composer.flush().await, SaveOutcome::SkippedClean);
}

#[tokio::test]
async fn teardown_flushes_unsent_edits() {
    init_tracing();

    let store = Arc::new(SqliteDraftStore::open_in_memory().unwrap());
    let outbox = Arc::new(MemoryOutbox::new());

    let draft = Draft::new();
    let id = draft.id.clone();
    let composer = Composer::new(
        draft.clone(),
        Arc::clone(&store),
        outbox,
        AutosaveConfig::with_interval(Duration::from_secs(60)),
    );

    let mut edit = draft;
    edit.body = "half a thought".to_string();
    composer.update_draft(edit);

    // Drop the session long before the (deliberately huge) window elapses.
    drop(composer);

    let mut persisted = None;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        persisted = store.load_draft(&id).await.unwrap();
        if persisted.is_some() {
            break;
        }
    }
    assert_eq!(persisted.expect("flushed on teardown").body, "half a thought");
}

#[tokio::test]
async fn reopened_draft_only_saves_new_edits() {
    init_tracing();

    let store = Arc::new(SqliteDraftStore::open_in_memory().unwrap());
    let outbox = Arc::new(MemoryOutbox::new());

    // First session: write and save a draft.
    let mut draft = Draft::new();
    draft.subject = "Re: contract".to_string();
    draft.body = "v1".to_string();
    let id = draft.id.clone();
    let composer = Composer::new(
        draft,
        Arc::clone(&store),
        Arc::clone(&outbox),
        AutosaveConfig::with_interval(INTERVAL),
    );
    assert_eq!(composer.save_now().await, SaveOutcome::Saved);
    drop(composer);
    tokio::time::sleep(WELL_PAST).await;

    // Second session: hydrate, edit, let autosave catch up.
    let stored = store.load_draft(&id).await.unwrap().unwrap();
    let composer = Composer::new(
        stored.clone(),
        Arc::clone(&store),
        outbox,
        AutosaveConfig::with_interval(INTERVAL),
    );

    let mut edit = stored;
    edit.body = "v2".to_string();
    composer.update_draft(edit);
    tokio::time::sleep(WELL_PAST).await;

    let persisted = store.load_draft(&id).await.unwrap().unwrap();
    assert_eq!(persisted.body, "v2");

    // Clean after the save: discard tears down without another write.
    let saved_at = persisted.last_saved_at;
    composer.discard();
    tokio::time::sleep(WELL_PAST).await;
    let after = store.load_draft(&id).await.unwrap().unwrap();
    assert_eq!(after.last_saved_at, saved_at);
}
