use chrono::{DateTime, Utc};

use super::common::{TestGallery, key_count, photo};
use crate::gallery::{FileQuery, FolderSummary, PhotoKey, UploadOptions, keys};

backend_tests!(
    trash_then_destroy_keeps_shared_thumbnails,
    trashed_views_drop_the_folder,
    restore_returns_to_origin_or_target,
    restore_onto_existing_hash_discards_trash_copy,
    move_preserves_star_and_hash,
    copy_shares_hash_and_thumbnails,
    batch_operations_skip_unknown_items,
    same_id_in_two_folders_trashes_separately,
);

async fn trash_then_destroy_keeps_shared_thumbnails(t: TestGallery) {
    let bytes = photo(80, 60);
    let root = t.gallery.upload("", bytes.clone(), "a.jpg").await.unwrap();
    let trip = t.gallery.upload("trip", bytes, "a.jpg").await.unwrap();
    let thumbs = keys::thumbnail_prefix(&root.hash);

    let trashed = t
        .gallery
        .soft_delete(&[PhotoKey::new("", &root.identifier)])
        .await
        .unwrap();
    assert_eq!(trashed, 1);
    assert!(!t.store.exists(&keys::content_key("", &root.hash)).await.unwrap());
    assert_eq!(t.gallery.list("", 1, 10, &[]).await.unwrap().total, 0);

    let destroyed = t
        .gallery
        .permanent_delete(&[root.identifier.clone()])
        .await
        .unwrap();
    assert_eq!(destroyed, 1);
    assert_eq!(key_count(&t.store, keys::TRASH_CONTENT_PREFIX).await, 0);
    // Still referenced by the copy in `trip`
    assert_eq!(key_count(&t.store, &thumbs).await, 2);

    t.gallery
        .soft_delete(&[PhotoKey::new("trip", &trip.identifier)])
        .await
        .unwrap();
    // A trashed record also keeps the set alive
    assert_eq!(key_count(&t.store, &thumbs).await, 2);

    t.gallery
        .permanent_delete(&[trip.identifier.clone()])
        .await
        .unwrap();
    assert_eq!(key_count(&t.store, &thumbs).await, 0);
    assert_eq!(t.gallery.list_trash(1, 10).await.unwrap().total, 0);
}

async fn trashed_views_drop_the_folder(t: TestGallery) {
    let uploaded = t
        .gallery
        .upload("holiday", photo(40, 40), "beach.png")
        .await
        .unwrap();
    t.gallery
        .soft_delete(&[PhotoKey::new("holiday", &uploaded.identifier)])
        .await
        .unwrap();

    let trash = t.gallery.list_trash(1, 10).await.unwrap();
    assert_eq!(trash.total, 1);
    let item = &trash.items[0];
    assert_eq!(item.folder, "");
    assert_eq!(item.identifier, uploaded.identifier);
    assert!(item.url.contains("trash=1"));
    assert!(!item.url.contains("holiday"));

    let served = t
        .gallery
        .open(&FileQuery {
            image: uploaded.identifier.clone(),
            trash: Some("1".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!served.data.is_empty());

    // No longer reachable as an active photo
    let err = t
        .gallery
        .open(&FileQuery {
            image: uploaded.identifier.clone(),
            folder: Some("holiday".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn restore_returns_to_origin_or_target(t: TestGallery) {
    let first = t.gallery.upload("cats", photo(41, 30), "a.jpg").await.unwrap();
    let second = t.gallery.upload("cats", photo(42, 30), "b.jpg").await.unwrap();
    t.gallery.create_folder("archive").await.unwrap();

    t.gallery
        .soft_delete(&[
            PhotoKey::new("cats", &first.identifier),
            PhotoKey::new("cats", &second.identifier),
        ])
        .await
        .unwrap();

    let restored = t
        .gallery
        .restore(&[first.identifier.clone()], None)
        .await
        .unwrap();
    assert_eq!(restored, 1);
    let back = t.gallery.get_photo("cats", &first.identifier).await.unwrap();
    assert_eq!(back.folder, "cats");

    t.gallery
        .restore(&[second.identifier.clone()], Some("Archive"))
        .await
        .unwrap();
    let archived = t.gallery.get_photo("archive", &second.identifier).await.unwrap();
    assert_eq!(archived.hash, second.hash);

    assert_eq!(t.gallery.list_trash(1, 10).await.unwrap().total, 0);
    assert_eq!(key_count(&t.store, keys::TRASH_CONTENT_PREFIX).await, 0);
}

async fn restore_onto_existing_hash_discards_trash_copy(t: TestGallery) {
    let bytes = photo(55, 44);
    let original = t.gallery.upload("", bytes.clone(), "a.jpg").await.unwrap();
    t.gallery
        .soft_delete(&[PhotoKey::new("", &original.identifier)])
        .await
        .unwrap();

    // Same bytes come back before the restore
    let again = t.gallery.upload("", bytes, "a.jpg").await.unwrap();

    let restored = t
        .gallery
        .restore(&[original.identifier.clone()], None)
        .await
        .unwrap();
    assert_eq!(restored, 1);

    let page = t.gallery.list("", 1, 10, &[]).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].identifier, again.identifier);
    assert_eq!(t.gallery.list_trash(1, 10).await.unwrap().total, 0);
}

async fn move_preserves_star_and_hash(t: TestGallery) {
    let uploaded = t.gallery.upload("", photo(70, 50), "m.jpg").await.unwrap();
    t.gallery
        .toggle_star("", &uploaded.identifier, true)
        .await
        .unwrap();

    let moved = t
        .gallery
        .move_items("Dest", &[PhotoKey::new("", &uploaded.identifier)])
        .await
        .unwrap();
    assert_eq!(moved, 1);

    let there = t.gallery.get_photo("dest", &uploaded.identifier).await.unwrap();
    assert!(there.starred);
    assert_eq!(there.hash, uploaded.hash);
    assert_eq!(there.identifier, uploaded.identifier);
    assert_eq!(there.uploaded_at, uploaded.uploaded_at);

    assert!(t.gallery.get_photo("", &uploaded.identifier).await.is_err());
    assert!(!t.store.exists(&keys::content_key("", &uploaded.hash)).await.unwrap());
    assert!(t.store.exists(&keys::content_key("dest", &uploaded.hash)).await.unwrap());

    // Moving into the folder it already lives in changes nothing
    let noop = t
        .gallery
        .move_items("dest", &[PhotoKey::new("dest", &uploaded.identifier)])
        .await
        .unwrap();
    assert_eq!(noop, 0);
}

async fn copy_shares_hash_and_thumbnails(t: TestGallery) {
    let uploaded = t.gallery.upload("src", photo(90, 60), "c.jpg").await.unwrap();
    t.gallery
        .toggle_star("src", &uploaded.identifier, true)
        .await
        .unwrap();
    let derived = t.gallery.thumbnails().derivation_count();

    // Upload and copy can land in the same millisecond
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;

    let copied = t
        .gallery
        .copy_items("dst", &[PhotoKey::new("src", &uploaded.identifier)])
        .await
        .unwrap();
    assert_eq!(copied, 1);

    let copy = &t.gallery.list("dst", 1, 10, &[]).await.unwrap().items[0];
    assert_ne!(copy.identifier, uploaded.identifier);
    assert_eq!(copy.hash, uploaded.hash);
    assert!(copy.starred);
    assert_eq!(copy.thumbnails.len(), uploaded.thumbnails.len());
    assert_eq!(t.gallery.thumbnails().derivation_count(), derived);

    // The original stays where it was
    assert!(t.gallery.get_photo("src", &uploaded.identifier).await.is_ok());

    // A second copy into a folder that already holds the hash is skipped
    let again = t
        .gallery
        .copy_items("dst", &[PhotoKey::new("src", &uploaded.identifier)])
        .await
        .unwrap();
    assert_eq!(again, 0);
}

async fn batch_operations_skip_unknown_items(t: TestGallery) {
    let uploaded = t.gallery.upload("", photo(25, 25), "k.jpg").await.unwrap();
    let items = [
        PhotoKey::new("", "123-ghost.jpg"),
        PhotoKey::new("", "not-an-identifier"),
        PhotoKey::new("", &uploaded.identifier),
    ];

    assert_eq!(t.gallery.soft_delete(&items).await.unwrap(), 1);
    assert_eq!(
        t.gallery
            .permanent_delete(&["123-ghost.jpg".to_string(), uploaded.identifier.clone()])
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        t.gallery
            .restore(&[uploaded.identifier.clone()], None)
            .await
            .unwrap(),
        0
    );
}

async fn same_id_in_two_folders_trashes_separately(t: TestGallery) {
    // Legacy imports carry one `<ms>-<hash>` name into several folders
    let bytes = photo(48, 36);
    let options = UploadOptions {
        uploaded_at: DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000),
        ..Default::default()
    };
    let alpha = t
        .gallery
        .upload_with("alpha", bytes.clone(), "a.jpg", options.clone())
        .await
        .unwrap();
    let beta = t
        .gallery
        .upload_with("beta", bytes, "a.jpg", options)
        .await
        .unwrap();
    assert_eq!(alpha.identifier, beta.identifier);

    let trashed = t
        .gallery
        .soft_delete(&[
            PhotoKey::new("alpha", &alpha.identifier),
            PhotoKey::new("beta", &beta.identifier),
        ])
        .await
        .unwrap();
    assert_eq!(trashed, 2);

    let trash = t.gallery.list_trash(1, 10).await.unwrap();
    assert_eq!(trash.total, 2);
    let identifiers: Vec<String> = trash.items.iter().map(|p| p.identifier.clone()).collect();
    assert_ne!(identifiers[0], identifiers[1]);
    assert_eq!(key_count(&t.store, keys::TRASH_CONTENT_PREFIX).await, 2);

    let restored = t.gallery.restore(&identifiers, None).await.unwrap();
    assert_eq!(restored, 2);
    assert_eq!(
        t.gallery.list_folders().await.unwrap(),
        vec![
            FolderSummary {
                name: "alpha".to_string(),
                count: 1
            },
            FolderSummary {
                name: "beta".to_string(),
                count: 1
            },
        ]
    );
    assert_eq!(t.gallery.list_trash(1, 10).await.unwrap().total, 0);
}
