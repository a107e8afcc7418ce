//! End-to-end: dropped folder -> local storage endpoint -> property record.

use propmedia::db::{migrate, Db};
use propmedia::media::{IngestSession, UploadStatus};
use propmedia::properties::{get_property, insert_property};
use propmedia::storage::StorageClient;
use propmedia::storage_server::StorageServer;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn setup_db(dir: &Path) -> Db {
    let db = Db::new(dir.join("propmedia.db"));
    db.with_connection(migrate::run_migrations).await.unwrap();
    db
}

/// Start a storage endpoint on an ephemeral port; returns its base URL
async fn start_storage(root: &Path) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let server = StorageServer::new(root, format!("{}/media", base));
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });
    base
}

fn write_images(dir: &Path, files: &[(&str, &str)]) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, body) in files {
        std::fs::write(dir.join(name), body).unwrap();
    }
}

#[tokio::test]
async fn test_folder_upload_populates_property() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_db(temp_dir.path()).await;

    for title in ["Oak House", "Maple Court", "Willow Cottage", "Harbour View"] {
        insert_property(&db, title).await.unwrap();
    }
    let riverside = insert_property(&db, "Riverside Gardens").await.unwrap();
    assert_eq!(riverside, 5);

    let bucket = temp_dir.path().join("bucket");
    let base = start_storage(&bucket).await;
    let client = StorageClient::new(&format!("{}/upload", base), None, Duration::from_secs(10)).unwrap();

    let drop_dir = temp_dir.path().join("drop");
    write_images(&drop_dir.join("Riverside Gardens"), &[
        ("hero.jpg", "hero-bytes"),
        ("floorplan.png", "plan-bytes"),
        ("img1.jpg", "one"),
        ("img2.jpg", "two"),
        ("notes.txt", "not an image"),
    ]);
    // Loose files next to the folder are ignored
    std::fs::write(drop_dir.join("loose.jpg"), "loose").unwrap();

    let mut session = IngestSession::new(db.clone(), Arc::new(client));
    let added = session
        .add_dropped(vec![drop_dir.join("Riverside Gardens"), drop_dir.join("loose.jpg")])
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(session.groups()[0].property_id, Some(riverside));
    assert_eq!(session.groups()[0].files().len(), 4);

    let results = session.upload_all().await.unwrap();
    assert_eq!(results.len(), 1);
    let outcome = results[0].1.as_ref().unwrap();
    assert_eq!(outcome.uploaded, 4);
    assert_eq!(outcome.failed, 0);
    assert_eq!(session.groups()[0].status, UploadStatus::Complete);

    let property = get_property(&db, riverside).await.unwrap();
    let hero = property.hero_image.clone().unwrap();
    let plan = property.floor_plan_image.clone().unwrap();
    assert!(hero.starts_with(&format!("{}/media/", base)));
    assert!(hero.ends_with(".jpg"));
    assert!(plan.ends_with(".png"));
    assert_eq!(property.gallery_images.len(), 2);

    // Stored objects are served back with the right bytes
    let http = reqwest::Client::new();
    let hero_bytes = http.get(&hero).send().await.unwrap().bytes().await.unwrap();
    assert_eq!(hero_bytes.as_ref(), b"hero-bytes");
    let mut gallery_bodies = Vec::new();
    for url in &property.gallery_images {
        let body = http.get(url).send().await.unwrap().text().await.unwrap();
        gallery_bodies.push(body);
    }
    gallery_bodies.sort();
    assert_eq!(gallery_bodies, vec!["one", "two"]);

    // Other properties are untouched
    let oak = get_property(&db, 1).await.unwrap();
    assert!(oak.hero_image.is_none());
    assert!(oak.gallery_images.is_empty());
}

#[tokio::test]
async fn test_second_drop_keeps_existing_media() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_db(temp_dir.path()).await;
    let id = insert_property(&db, "Riverside Gardens").await.unwrap();

    let bucket = temp_dir.path().join("bucket");
    let base = start_storage(&bucket).await;
    let drop_dir = temp_dir.path().join("drop");

    write_images(&drop_dir.join("first").join("Riverside Gardens"), &[
        ("hero.jpg", "hero"),
        ("img1.jpg", "one"),
    ]);
    write_images(&drop_dir.join("second").join("Riverside Gardens"), &[
        ("img2.jpg", "two"),
    ]);

    for batch in ["first", "second"] {
        let client = StorageClient::new(&format!("{}/upload", base), None, Duration::from_secs(10)).unwrap();
        let mut session = IngestSession::new(db.clone(), Arc::new(client));
        session.add_dropped(vec![drop_dir.join(batch).join("Riverside Gardens")]).await.unwrap();
        let results = session.upload_all().await.unwrap();
        assert!(results[0].1.is_ok());
    }

    let property = get_property(&db, id).await.unwrap();
    assert!(property.hero_image.is_some());
    assert!(property.floor_plan_image.is_none());
    assert_eq!(property.gallery_images.len(), 2);
}

#[tokio::test]
async fn test_unreachable_storage_fails_files_not_group() {
    let temp_dir = TempDir::new().unwrap();
    let db = setup_db(temp_dir.path()).await;
    let id = insert_property(&db, "Riverside Gardens").await.unwrap();

    // Bind then drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = StorageClient::new(
        &format!("http://127.0.0.1:{}/upload", port),
        None,
        Duration::from_secs(2),
    )
    .unwrap();

    let folder = temp_dir.path().join("Riverside Gardens");
    write_images(&folder, &[("img1.jpg", "one"), ("img2.jpg", "two")]);

    let mut session = IngestSession::new(db.clone(), Arc::new(client));
    session.add_dropped(vec![folder]).await.unwrap();
    let results = session.upload_all().await.unwrap();

    let outcome = results[0].1.as_ref().unwrap();
    assert_eq!(outcome.uploaded, 0);
    assert_eq!(outcome.failed, 2);
    assert!(session.groups()[0]
        .files()
        .iter()
        .all(|f| f.status == UploadStatus::Error));
    assert!(get_property(&db, id).await.unwrap().gallery_images.is_empty());
}
