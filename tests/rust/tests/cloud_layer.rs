//! End-to-end tests of the cloud file layer over the in-memory backend

use std::sync::Arc;

use cloud_core::{CloudConfig, OpKind, RequestHook};
use cloud_file::{CloudReadableFile, CloudWritableFile, FileKind};
use cloud_store::{InMemoryStore, InstrumentedStore, ObjectProvider};
use parking_lot::Mutex;
use tempfile::TempDir;

async fn setup() -> (Arc<InMemoryStore>, Arc<ObjectProvider>, TempDir) {
    let store = Arc::new(InMemoryStore::new());
    let provider = Arc::new(ObjectProvider::new(
        store.clone(),
        CloudConfig::with_dest_bucket("engine"),
    ));
    provider.sanitize().await.unwrap();
    (store, provider, TempDir::new().unwrap())
}

fn write_local(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn test_engine_file_lifecycle() {
    let (_store, provider, dir) = setup().await;

    // upload two table files
    let a = write_local(&dir, "a.sst", &[1u8; 100]);
    let b = write_local(&dir, "b.sst", &[2u8; 200]);
    provider.put_object(&a, "engine", "data/a.sst").await.unwrap();
    provider.put_object(&b, "engine", "data/b.sst").await.unwrap();

    // listing strips the prefix and sorts lexicographically
    let names = provider.list_objects("engine", "data/").await.unwrap();
    assert_eq!(names, vec!["a.sst".to_string(), "b.sst".to_string()]);

    assert_eq!(provider.get_object_size("engine", "data/a.sst").await.unwrap(), 100);
    assert!(provider.exists_object("engine", "data/a.sst").await.unwrap());
    assert!(!provider.exists_object("engine", "data/zzz.sst").await.unwrap());

    // deleting a file that was never uploaded is NotFound
    let err = provider
        .delete_object("engine", "data/zzz.sst")
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // round-trip a download and verify contents
    let restored = dir.path().join("restored.sst");
    provider
        .get_object("engine", "data/b.sst", &restored)
        .await
        .unwrap();
    assert_eq!(std::fs::read(&restored).unwrap(), vec![2u8; 200]);

    provider.empty_bucket("engine", "data/").await.unwrap();
    assert!(provider
        .list_objects("engine", "data/")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_data_file_written_through_cloud_handle() {
    let (store, provider, dir) = setup().await;
    let local = dir.path().join("000007.sst");

    let mut file = CloudWritableFile::create(
        provider.clone(),
        "engine",
        "data/000007.sst",
        &local,
        FileKind::Data,
    )
    .await
    .unwrap();
    for chunk in [b"block-one;".as_ref(), b"block-two;".as_ref()] {
        file.append(chunk).await.unwrap();
    }
    file.close().await.unwrap();

    assert_eq!(
        store.object("engine", "data/000007.sst").as_deref(),
        Some(b"block-one;block-two;".as_ref())
    );
    // local copy removed after upload by default
    assert!(!local.exists());

    // read it back through the readable handle
    let mut reader = CloudReadableFile::open(provider, "engine", "data/000007.sst")
        .await
        .unwrap();
    assert_eq!(reader.file_size(), 20);
    assert_eq!(&reader.read(10).await.unwrap()[..], b"block-one;");
    assert_eq!(&reader.read_at(10, 100).await.unwrap()[..], b"block-two;");
}

#[tokio::test]
async fn test_manifest_survives_crash_between_rewrites() {
    let (store, provider, dir) = setup().await;
    let local = dir.path().join("MANIFEST");

    // first manifest generation
    let mut manifest = CloudWritableFile::create(
        provider.clone(),
        "engine",
        "MANIFEST",
        &local,
        FileKind::Manifest,
    )
    .await
    .unwrap();
    manifest.append(b"generation-1").await.unwrap();
    manifest.sync().await.unwrap();
    manifest.close().await.unwrap();
    assert_eq!(
        store.object("engine", "MANIFEST").as_deref(),
        Some(b"generation-1".as_ref())
    );

    // a rewrite that crashes before its first sync
    {
        let mut doomed = CloudWritableFile::create(
            provider.clone(),
            "engine",
            "MANIFEST",
            &local,
            FileKind::Manifest,
        )
        .await
        .unwrap();
        doomed.append(b"generation-2-partial").await.unwrap();
        // dropped without sync or close
    }
    assert_eq!(std::fs::read(&local).unwrap(), b"generation-1");
    assert_eq!(
        store.object("engine", "MANIFEST").as_deref(),
        Some(b"generation-1".as_ref())
    );

    // a rewrite that completes replaces both copies
    let mut manifest = CloudWritableFile::create(
        provider.clone(),
        "engine",
        "MANIFEST",
        &local,
        FileKind::Manifest,
    )
    .await
    .unwrap();
    manifest.append(b"generation-2").await.unwrap();
    manifest.sync().await.unwrap();
    manifest.close().await.unwrap();

    assert_eq!(std::fs::read(&local).unwrap(), b"generation-2");
    assert_eq!(
        store.object("engine", "MANIFEST").as_deref(),
        Some(b"generation-2".as_ref())
    );
}

#[tokio::test]
async fn test_zero_length_read_issues_single_byte_request() {
    let (store, provider, _dir) = setup().await;
    store.insert_object("engine", "data/f.sst", vec![9u8; 64]);

    let reader = CloudReadableFile::open(provider, "engine", "data/f.sst")
        .await
        .unwrap();
    let bytes = reader.read_at(10, 0).await.unwrap();
    assert!(bytes.is_empty());
    assert_eq!(store.last_range(), Some((10, 10)));
}

#[tokio::test]
async fn test_every_backend_call_is_reported_exactly_once() {
    let calls: Arc<Mutex<Vec<(OpKind, bool)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let hook: Arc<RequestHook> = Arc::new(move |op, _size, _micros, success| {
        sink.lock().push((op, success));
    });

    let store = InstrumentedStore::new(InMemoryStore::new(), hook);
    let provider = Arc::new(ObjectProvider::new(
        Arc::new(store),
        CloudConfig::with_dest_bucket("engine"),
    ));
    provider.sanitize().await.unwrap();

    let dir = TempDir::new().unwrap();
    let file = write_local(&dir, "a.sst", &[1u8; 10]);
    provider.put_object(&file, "engine", "data/a.sst").await.unwrap();
    provider.list_objects("engine", "data/").await.unwrap();
    provider
        .delete_object("engine", "data/missing.sst")
        .await
        .unwrap_err();

    let calls = calls.lock();
    assert_eq!(
        calls.as_slice(),
        &[
            (OpKind::Info, true),   // sanitize: bucket exists?
            (OpKind::Create, true), // sanitize: create it
            (OpKind::Write, true),
            (OpKind::List, true),
            (OpKind::Delete, false),
        ]
    );
}

#[tokio::test]
async fn test_zero_size_upload_never_reaches_the_backend() {
    let calls: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));
    let sink = calls.clone();
    let hook: Arc<RequestHook> = Arc::new(move |_op, _size, _micros, _success| {
        *sink.lock() += 1;
    });

    let store = InstrumentedStore::new(InMemoryStore::new(), hook);
    store.inner().insert_object("engine", "marker", b"x".to_vec());
    let provider = ObjectProvider::new(
        Arc::new(store),
        CloudConfig::with_dest_bucket("engine"),
    );

    let dir = TempDir::new().unwrap();
    let empty = write_local(&dir, "empty.sst", b"");
    provider
        .put_object(&empty, "engine", "data/empty.sst")
        .await
        .unwrap_err();

    assert_eq!(*calls.lock(), 0);
}
