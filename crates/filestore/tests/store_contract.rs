//! Contract tests run against every backend through `dyn FileStore`.
//!
//! Each test builds one store per backend and checks the same behavior, so
//! callers can switch backends without noticing.

use std::io::Cursor;
use std::sync::Arc;

use filestore::{
    ContentSource, FileFilter, FileStore, Listing, LocalBackend, MemoryBackend, StoreError,
    StoreOptions, StoreResult,
};
use futures::StreamExt;
use tempfile::TempDir;

// ============================================================================
// Shared test setup
// ============================================================================

/// Every backend under test, plus the temp dir keeping the local one alive.
async fn stores() -> (Vec<Arc<dyn FileStore>>, TempDir) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("filestore=debug")
        .with_test_writer()
        .try_init();

    let dir = TempDir::new().unwrap();
    let config = StoreOptions::new()
        .with_root_path("content")
        .with_separator('/')
        .with_root_physical_path(dir.path().join("content"))
        .resolve()
        .unwrap();

    let local: Arc<dyn FileStore> = Arc::new(LocalBackend::open(config.clone()).await.unwrap());
    let memory: Arc<dyn FileStore> = Arc::new(MemoryBackend::from_config(&config));
    (vec![local, memory], dir)
}

async fn sorted(listing: StoreResult<Listing>) -> Vec<String> {
    let mut items = listing.unwrap().to_vec().await.unwrap();
    items.sort();
    items
}

// ============================================================================
// Properties
// ============================================================================

#[tokio::test]
async fn second_add_without_overwrite_conflicts() {
    let (stores, _dir) = stores().await;
    for store in stores {
        store.write_all("p.txt", b"first", false).await.unwrap();

        let err = store.write_all("p.txt", b"second", false).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{}: {err}", store.backend());
        assert_eq!(store.read_all("p.txt").await.unwrap(), b"first");
    }
}

#[tokio::test]
async fn deletes_of_missing_paths_are_noops() {
    let (stores, _dir) = stores().await;
    for store in stores {
        store.write_all("keep/me.txt", b"x", true).await.unwrap();

        store.delete_file("nope.txt").await.unwrap();
        store.delete_directory("nope", false).await.unwrap();
        store.delete_directory("nope", true).await.unwrap();

        assert_eq!(sorted(store.root_directories()).await, vec!["keep"]);
        assert!(store.file_exists("keep/me.txt").await);
    }
}

#[tokio::test]
async fn listings_of_missing_paths_are_empty() {
    let (stores, _dir) = stores().await;
    for store in stores {
        assert!(sorted(store.list_directories("nope")).await.is_empty());
        assert!(
            sorted(store.list_files("nope", &FileFilter::all()))
                .await
                .is_empty()
        );
    }
}

#[tokio::test]
async fn add_creates_missing_ancestors() {
    let (stores, _dir) = stores().await;
    for store in stores {
        assert!(!store.directory_exists("a").await);

        store.write_all("a/b/c.txt", b"content", true).await.unwrap();

        assert!(store.directory_exists("a").await);
        assert!(store.directory_exists("a/b").await);
        assert!(!store.file_exists("a/b").await);
        assert_eq!(sorted(store.list_directories("a")).await, vec!["a/b"]);
        assert_eq!(
            sorted(store.list_files("a/b", &FileFilter::all())).await,
            vec!["a/b/c.txt"]
        );
    }
}

#[tokio::test]
async fn absolute_path_ignores_existence() {
    let (stores, _dir) = stores().await;
    for store in stores {
        assert_eq!(store.absolute_path("x/y"), "content/x/y");
        assert!(!store.directory_exists("x/y").await);
        assert!(!store.file_exists("x/y").await);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_under_same_missing_parent() {
    let (stores, _dir) = stores().await;
    for store in stores {
        let mut tasks = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let path = format!("shared/sibling{i}/file.txt");
                store.write_all(&path, path.as_bytes(), false).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let dirs = sorted(store.list_directories("shared")).await;
        assert_eq!(dirs.len(), 8);
        assert_eq!(
            store.read_all("shared/sibling3/file.txt").await.unwrap(),
            b"shared/sibling3/file.txt"
        );
    }
}

// ============================================================================
// Error policy
// ============================================================================

#[tokio::test]
async fn open_and_timestamps_of_missing_are_not_found() {
    let (stores, _dir) = stores().await;
    for store in stores {
        assert!(matches!(
            store.open_file("ghost.txt").await.err().unwrap(),
            StoreError::NotFound(_)
        ));
        assert!(matches!(
            store.last_modified("ghost").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.last_accessed("ghost").await,
            Err(StoreError::NotFound(_))
        ));
    }
}

#[tokio::test]
async fn directory_timestamps_take_precedence() {
    let (stores, _dir) = stores().await;
    for store in stores {
        store.write_all("dir/file.txt", b"x", true).await.unwrap();
        assert!(store.last_modified("dir").await.is_ok());
        assert!(store.last_modified("dir/file.txt").await.is_ok());
        // The root is a directory too.
        assert!(store.last_modified("").await.is_ok());
    }
}

#[tokio::test]
async fn non_recursive_delete_of_non_empty_directory_fails() {
    let (stores, _dir) = stores().await;
    for store in stores {
        store.write_all("full/f.txt", b"x", true).await.unwrap();

        assert!(store.delete_directory("full", false).await.is_err());
        assert!(store.file_exists("full/f.txt").await);

        store.delete_directory("full", true).await.unwrap();
        assert!(!store.directory_exists("full").await);
    }
}

#[tokio::test]
async fn escaping_paths_are_rejected() {
    let (stores, _dir) = stores().await;
    for store in stores {
        assert!(matches!(
            store.write_all("../outside.txt", b"x", true).await,
            Err(StoreError::PathEscapesRoot(_))
        ));
        assert!(store.list_directories("a/../..").is_err());
        assert!(!store.directory_exists("..").await);
    }
}

#[tokio::test]
async fn paths_under_a_file_are_missing() {
    let (stores, _dir) = stores().await;
    for store in stores {
        store.write_all("f.txt", b"x", true).await.unwrap();

        assert!(sorted(store.list_files("f.txt/sub", &FileFilter::all())).await.is_empty());
        assert!(sorted(store.list_directories("f.txt/sub")).await.is_empty());
        assert!(!store.file_exists("f.txt/sub").await);
        assert!(!store.directory_exists("f.txt/sub").await);
        store.delete_file("f.txt/sub").await.unwrap();
        store.delete_directory("f.txt/sub", true).await.unwrap();

        let backend = store.backend();
        assert!(
            matches!(store.open_file("f.txt/sub").await.err().unwrap(), StoreError::NotFound(_)),
            "{backend}"
        );
        assert!(
            matches!(store.last_modified("f.txt/sub").await, Err(StoreError::NotFound(_))),
            "{backend}"
        );
        assert!(
            matches!(store.last_accessed("f.txt/sub").await, Err(StoreError::NotFound(_))),
            "{backend}"
        );
        assert_eq!(store.read_all("f.txt").await.unwrap(), b"x");
    }
}

#[tokio::test]
async fn add_over_directory_or_under_file_is_typed() {
    let (stores, _dir) = stores().await;
    for store in stores {
        store.write_all("d/f.txt", b"x", true).await.unwrap();

        let err = store.write_all("d", b"y", true).await.unwrap_err();
        assert!(matches!(err, StoreError::IsADirectory(_)), "{}: {err}", store.backend());

        let err = store.write_all("d/f.txt/g.txt", b"y", true).await.unwrap_err();
        assert!(
            matches!(&err, StoreError::NotADirectory(p) if p == "d/f.txt"),
            "{}: {err}",
            store.backend()
        );
        assert_eq!(store.read_all("d/f.txt").await.unwrap(), b"x");
    }
}

#[tokio::test]
async fn recursive_delete_of_root_keeps_root() {
    let (stores, _dir) = stores().await;
    for store in stores {
        store.write_all("a/b.txt", b"x", true).await.unwrap();
        store.write_all("top.txt", b"x", true).await.unwrap();

        store.delete_directory("", true).await.unwrap();

        assert!(store.directory_exists("").await, "{}", store.backend());
        assert!(sorted(store.root_directories()).await.is_empty());
        assert!(sorted(store.root_files()).await.is_empty());

        // The store stays usable afterwards.
        store.write_all("again.txt", b"z", true).await.unwrap();
        assert_eq!(store.read_all("again.txt").await.unwrap(), b"z");
    }
}

// ============================================================================
// Streams and listings
// ============================================================================

#[tokio::test]
async fn forward_only_content_is_copied_from_current_position() {
    let (stores, _dir) = stores().await;
    for store in stores {
        let data = b"header:body".to_vec();
        let mut reader: &[u8] = &data[7..];
        store
            .add_file("body.txt", ContentSource::forward(&mut reader), true)
            .await
            .unwrap();
        assert_eq!(store.read_all("body.txt").await.unwrap(), b"body");
    }
}

#[tokio::test]
async fn seekable_content_is_rewound() {
    let (stores, _dir) = stores().await;
    for store in stores {
        let mut cursor = Cursor::new(b"full payload".to_vec());
        cursor.set_position(5);
        let written = store
            .add_file("full.txt", ContentSource::seekable(&mut cursor), true)
            .await
            .unwrap();
        assert_eq!(written, 12);
        assert_eq!(store.read_all("full.txt").await.unwrap(), b"full payload");
    }
}

#[tokio::test]
async fn listing_restarts_see_current_state() {
    let (stores, _dir) = stores().await;
    for store in stores {
        let listing = store.list_files("docs", &FileFilter::new("*.md").unwrap()).unwrap();
        assert!(listing.to_vec().await.unwrap().is_empty());

        store.write_all("docs/a.md", b"", true).await.unwrap();
        store.write_all("docs/b.txt", b"", true).await.unwrap();
        assert_eq!(listing.to_vec().await.unwrap(), vec!["docs/a.md"]);

        store.write_all("docs/c.md", b"", true).await.unwrap();
        let mut again: Vec<String> = listing
            .stream()
            .map(|item| item.unwrap())
            .collect()
            .await;
        again.sort();
        assert_eq!(again, vec!["docs/a.md", "docs/c.md"]);
    }
}
