//! End-to-end publish runs against in-memory backends.

mod common;

use std::cell::Cell;
use std::sync::Arc;

use bup_models::{Asset, AssetCollection, BackendKind, CdnConfig, PublishJournal, PublishOptions, RunStatus};
use bup_publisher::{CleanupReport, FixedAnswer, Messages, Publisher};
use common::{ftp, keyed, write_assets, FakeFactory};

fn publisher(options: PublishOptions, factory: &Arc<FakeFactory>, confirm: bool) -> Publisher {
    Publisher::new(options)
        .with_factory(factory.clone())
        .with_prompt(Arc::new(FixedAnswer(confirm)))
        .with_messages(Messages::en())
}

fn read_journal(path: &std::path::Path) -> PublishJournal {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_all_assets_published_once() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["app.js", "vendor.js", "css/theme.css", "img/logo.png"]);
    let factory = FakeFactory::new();

    let options = PublishOptions::new(keyed(BackendKind::Qiniu, "bundles", None));
    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.counters.attempted, 3);
    assert_eq!(outcome.counters.succeeded, 3);
    assert_eq!(outcome.counters.failed, 0);
    assert_eq!(outcome.cleanup, CleanupReport::NotRequested);

    let journal = read_journal(&outcome.journal.unwrap());
    let mut files = journal.file_names();
    files.sort();
    assert_eq!(files, vec!["app.js", "css/theme.css", "vendor.js"]);
    assert!(!journal.cdn.is_multiple());

    assert_eq!(
        factory.store.objects(BackendKind::Qiniu),
        vec!["app.js", "css/theme.css", "vendor.js"]
    );
    assert_eq!(*factory.store.closed.lock().unwrap(), vec![BackendKind::Qiniu]);
}

#[tokio::test]
async fn test_missing_credentials_rejected_before_any_client() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["app.js"]);
    let factory = FakeFactory::new();

    let mut route = keyed(BackendKind::Txcos, "bundles", Some(r"/\.js$/"));
    route.secret_key = None;
    let options = PublishOptions::new(vec![route, ftp("/www", Some(r"/\.css$/"))]);

    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;
    assert_eq!(outcome.status, RunStatus::Rejected);
    assert_eq!(
        outcome.error.as_deref(),
        Some("Empty Tencent COS access key or secret key CDN index:0")
    );
    assert_eq!(outcome.counters.attempted, 0);
    assert_eq!(factory.store.created_count(), 0);
    assert!(outcome.journal.is_none());
}

#[tokio::test]
async fn test_declined_duplicate_pattern_dispatches_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["app.js", "theme.css"]);
    let factory = FakeFactory::new();

    let options = PublishOptions::new(vec![
        keyed(BackendKind::S3, "a", Some(r"/\.js$/")),
        keyed(BackendKind::Qiniu, "b", Some(r"\.js$")),
    ]);

    let outcome = publisher(options, &factory, false).run(&assets, dir.path()).await;
    assert_eq!(outcome.status, RunStatus::Rejected);
    assert_eq!(outcome.counters.attempted, 0);
    assert_eq!(factory.store.created_count(), 0);
    assert!(!dir.path().join("wp.previous.json").exists());
}

#[tokio::test]
async fn test_accepted_duplicate_pattern_uploads_to_both() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["app.js"]);
    let factory = FakeFactory::new();

    let options = PublishOptions::new(vec![
        keyed(BackendKind::S3, "a", Some(r"/\.js$/")),
        keyed(BackendKind::Qiniu, "b", Some(r"/\.js$/")),
    ]);

    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;
    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.counters.succeeded, 2);
    assert_eq!(factory.store.objects(BackendKind::S3), vec!["app.js"]);
    assert_eq!(factory.store.objects(BackendKind::Qiniu), vec!["app.js"]);
}

#[tokio::test]
async fn test_multi_route_journal_records_normalized_patterns() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["js/app.js", "css/theme.css", "index.html"]);
    let factory = FakeFactory::new();

    let options = PublishOptions::new(vec![
        keyed(BackendKind::S3, "scripts", Some(r"\.js$")),
        ftp("/www", Some(r"/\.css$/i")),
    ]);

    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;
    assert_eq!(outcome.counters.attempted, 2);
    assert_eq!(factory.store.objects(BackendKind::Ftp), vec!["css/theme.css"]);

    let journal = read_journal(&outcome.journal.unwrap());
    let CdnConfig::Multiple(routes) = &journal.cdn else {
        panic!("expected multi-route journal");
    };
    assert_eq!(routes[0].test.as_deref(), Some(r"/\.js$/"));
    assert_eq!(routes[1].test.as_deref(), Some(r"/\.css$/i"));
    assert_eq!(routes[1].dest_path.as_deref(), Some("/www"));
}

#[tokio::test]
async fn test_backend_failures_do_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["a.js", "b.js", "c.js"]);
    let factory = FakeFactory::new();
    factory.store.failing_puts.lock().unwrap().insert("b.js".into());

    let options = PublishOptions::new(keyed(BackendKind::S3, "bundles", None));
    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;

    assert_eq!(outcome.status, RunStatus::PartiallySucceeded);
    assert_eq!(outcome.counters.attempted, 3);
    assert_eq!(outcome.counters.succeeded, 2);
    assert_eq!(outcome.counters.failed, 1);

    let journal = read_journal(&outcome.journal.unwrap());
    let mut files = journal.file_names();
    files.sort();
    assert_eq!(files, vec!["a.js", "c.js"]);
}

#[tokio::test]
async fn test_unreadable_asset_fails_only_that_upload() {
    let dir = tempfile::tempdir().unwrap();
    let mut assets = write_assets(dir.path(), &["a.js"]);
    assets.insert("gone.js".into(), Asset::from_path(dir.path().join("gone.js")));
    let factory = FakeFactory::new();

    let options = PublishOptions::new(keyed(BackendKind::S3, "bundles", None));
    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;

    assert_eq!(outcome.counters.attempted, 2);
    assert_eq!(outcome.counters.succeeded, 1);
    assert_eq!(outcome.counters.failed, 1);
    assert_eq!(outcome.published, vec!["a.js"]);
}

#[tokio::test]
async fn test_all_uploads_failing_is_a_failed_run() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["a.js"]);
    let factory = FakeFactory::new();
    factory.store.failing_puts.lock().unwrap().insert("a.js".into());

    let options = PublishOptions::new(keyed(BackendKind::S3, "bundles", None));
    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;

    assert_eq!(outcome.status, RunStatus::Failed);
    assert!(outcome.journal.is_none());
    assert!(!dir.path().join("wp.previous.json").exists());
    assert_eq!(factory.store.closed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_nothing_to_upload_still_closes_backends() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["index.html", "logo.png"]);
    let factory = FakeFactory::new();

    let options = PublishOptions::new(ftp("/www", None));
    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;

    assert_eq!(outcome.status, RunStatus::NothingToUpload);
    assert!(outcome.journal.is_none());
    assert_eq!(*factory.store.closed.lock().unwrap(), vec![BackendKind::Ftp]);
}

#[tokio::test]
async fn test_inline_content_and_logical_name() {
    let dir = tempfile::tempdir().unwrap();
    let mut assets = AssetCollection::new();
    assets.insert(
        "main".into(),
        Asset::from_path(dir.path().join("never-written.js"))
            .with_content(b"console.log(1)".to_vec())
            .with_logical_name("static/main.abc123.js"),
    );
    let factory = FakeFactory::new();

    let options = PublishOptions::new(keyed(BackendKind::S3, "bundles", None));
    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;

    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(factory.store.objects(BackendKind::S3), vec!["static/main.abc123.js"]);
}

#[tokio::test]
async fn test_delete_output_removes_uploaded_files_only() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["a.js", "b.js", "keep.png"]);
    let factory = FakeFactory::new();
    factory.store.failing_puts.lock().unwrap().insert("b.js".into());

    let mut options = PublishOptions::new(keyed(BackendKind::S3, "bundles", None));
    options.delete_output = true;
    publisher(options, &factory, true).run(&assets, dir.path()).await;

    assert!(!dir.path().join("a.js").exists());
    assert!(dir.path().join("b.js").exists());
    assert!(dir.path().join("keep.png").exists());
}

#[tokio::test]
async fn test_completion_signal_runs_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["a.js"]);
    let factory = FakeFactory::new();
    let calls = Cell::new(0);

    let outcome = publisher(PublishOptions::default(), &factory, true)
        .handle_emitted(&assets, dir.path(), |outcome| {
            assert_eq!(outcome.status, RunStatus::Rejected);
            calls.set(calls.get() + 1);
        })
        .await;

    assert_eq!(calls.get(), 1);
    assert_eq!(outcome.error.as_deref(), Some("Empty CDN upload config"));
}

#[tokio::test]
async fn test_custom_journal_location() {
    let dir = tempfile::tempdir().unwrap();
    let logs = tempfile::tempdir().unwrap();
    let assets = write_assets(dir.path(), &["a.js"]);
    let factory = FakeFactory::new();

    let mut options = PublishOptions::new(keyed(BackendKind::S3, "bundles", None));
    options.log_name = Some("uploads.json".into());
    options.log_path = Some(logs.path().to_path_buf());

    let outcome = publisher(options, &factory, true).run(&assets, dir.path()).await;
    assert_eq!(outcome.journal, Some(logs.path().join("uploads.json")));
    assert!(!dir.path().join("wp.previous.json").exists());
}
