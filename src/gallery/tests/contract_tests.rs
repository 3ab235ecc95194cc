use chrono::{Duration, TimeZone, Utc};
use std::collections::BTreeSet;

use super::common::{TestGallery, key_count, nested_key_count, photo};
use crate::gallery::{FileQuery, GalleryError, PhotoKey, UploadFile, UploadOptions, codec, keys};

backend_tests!(
    duplicate_upload_reuses_record,
    same_bytes_in_two_folders_share_thumbnails,
    landscape_upload_scenario,
    starred_across_folders_newest_first,
    concurrent_identical_uploads_converge,
    rejected_uploads_write_nothing,
    toggle_star_is_a_single_overwrite,
    list_pages_and_tag_filter,
    list_unknown_folder_is_not_found,
    missing_thumbnail_falls_back_to_original,
    batch_upload_isolates_failures,
    export_resolves_keys,
);

async fn duplicate_upload_reuses_record(t: TestGallery) {
    let bytes = photo(48, 32);

    let first = t.gallery.upload("", bytes.clone(), "a.jpg").await.unwrap();
    let second = t.gallery.upload("", bytes, "b.jpg").await.unwrap();

    assert_eq!(first.hash, second.hash);
    assert_eq!(first.identifier, second.identifier);
    assert_eq!(second.original_name, "a.jpg");
    assert_eq!(nested_key_count(&t.store, keys::CONTENT_PREFIX).await, 1);
    assert_eq!(t.gallery.thumbnails().derivation_count(), 1);

    let page = t.gallery.list("", 1, 10, &[]).await.unwrap();
    assert_eq!(page.total, 1);
}

async fn same_bytes_in_two_folders_share_thumbnails(t: TestGallery) {
    let bytes = photo(64, 40);

    let root = t.gallery.upload("", bytes.clone(), "x.jpg").await.unwrap();
    let trip = t.gallery.upload("Trip", bytes, "x.jpg").await.unwrap();

    assert_eq!(trip.folder, "trip");
    assert_eq!(root.hash, trip.hash);
    assert_eq!(t.gallery.thumbnails().derivation_count(), 1);
    assert_eq!(nested_key_count(&t.store, keys::METADATA_PREFIX).await, 2);
    assert_eq!(
        key_count(&t.store, &keys::thumbnail_prefix(&root.hash)).await,
        2
    );

    let small_root = t
        .gallery
        .open(&FileQuery {
            image: root.identifier.clone(),
            thumb: Some("small".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    let small_trip = t
        .gallery
        .open(&FileQuery {
            image: trip.identifier.clone(),
            folder: Some("trip".to_string()),
            thumb: Some("small".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(small_root.is_thumbnail);
    assert_eq!(small_root.data, small_trip.data);
}

async fn landscape_upload_scenario(t: TestGallery) {
    let bytes = photo(2000, 1000);
    let uploaded = t.gallery.upload("", bytes.clone(), "photo.jpg").await.unwrap();

    let dims = uploaded.dimensions.unwrap();
    assert_eq!((dims.width, dims.height), (2000, 1000));

    // Client identifier is `<ms>-<hash>.jpg` with no flag token
    let parsed = codec::parse(&uploaded.identifier).unwrap();
    assert_eq!(parsed.hash, uploaded.hash);
    assert!(parsed.flags.is_empty());
    assert!(uploaded.identifier.ends_with(".jpg"));
    assert!(!uploaded.url.contains("content/"));

    let original = t
        .gallery
        .open(&FileQuery {
            image: uploaded.identifier.clone(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(original.data, bytes);
    assert_eq!(original.content_type, "image/jpeg");

    let small = t
        .gallery
        .open(&FileQuery {
            image: uploaded.identifier.clone(),
            thumb: Some("small".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(small.content_type, "image/webp");
    let decoded = image::load_from_memory(&small.data).unwrap();
    assert!(decoded.width().max(decoded.height()) <= 320);
    assert_eq!((decoded.width(), decoded.height()), (320, 160));
}

async fn starred_across_folders_newest_first(t: TestGallery) {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let upload = |folder: &'static str, size: u32, offset: i64, starred: bool| {
        let gallery = &t.gallery;
        async move {
            gallery
                .upload_with(
                    folder,
                    photo(size, size),
                    "p.jpg",
                    UploadOptions {
                        uploaded_at: Some(base + Duration::minutes(offset)),
                        starred,
                        ..Default::default()
                    },
                )
                .await
                .unwrap()
        }
    };

    let older_star = upload("alpha", 20, 1, true).await;
    upload("alpha", 21, 2, false).await;
    let newer_star = upload("beta", 22, 3, true).await;
    upload("beta", 23, 4, false).await;

    let page = t.gallery.list_starred(1, 10).await.unwrap();
    assert_eq!(page.total, 2);
    let identifiers: Vec<&str> = page.items.iter().map(|p| p.identifier.as_str()).collect();
    assert_eq!(
        identifiers,
        vec![newer_star.identifier.as_str(), older_star.identifier.as_str()]
    );
    assert!(page.items.iter().all(|p| p.starred));
}

async fn concurrent_identical_uploads_converge(t: TestGallery) {
    let bytes = photo(120, 90);

    let (a, b) = tokio::join!(
        t.gallery.upload("race", bytes.clone(), "one.jpg"),
        t.gallery.upload("race", bytes.clone(), "two.jpg"),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.identifier, b.identifier);
    assert_eq!(a.uploaded_at, b.uploaded_at);
    assert_eq!(a.original_name, b.original_name);
    assert_eq!(key_count(&t.store, &keys::content_prefix("race")).await, 1);
    assert_eq!(key_count(&t.store, &keys::metadata_prefix("race")).await, 1);
    assert_eq!(key_count(&t.store, &keys::thumbnail_prefix(&a.hash)).await, 2);

    // The stored record is the one both callers were handed
    let stored = t.gallery.get_photo("race", &a.identifier).await.unwrap();
    assert_eq!(stored.identifier, a.identifier);
    assert_eq!(stored.original_name, a.original_name);
}

async fn rejected_uploads_write_nothing(t: TestGallery) {
    let err = t
        .gallery
        .upload("", photo(10, 10), "notes.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::Validation(_)));

    let err = t.gallery.upload("", Vec::new(), "empty.jpg").await.unwrap_err();
    assert!(matches!(err, GalleryError::Validation(_)));

    let err = t
        .gallery
        .upload("", b"not an image at all".to_vec(), "broken.PNG")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);

    assert!(t.store.list_all("").await.unwrap().prefixes.is_empty());
    assert_eq!(t.gallery.thumbnails().derivation_count(), 0);
}

async fn toggle_star_is_a_single_overwrite(t: TestGallery) {
    let uploaded = t.gallery.upload("", photo(30, 30), "a.gif").await.unwrap();
    assert!(!uploaded.starred);

    let starred = t
        .gallery
        .toggle_star("", &uploaded.identifier, true)
        .await
        .unwrap();
    assert!(starred.starred);
    assert_eq!(starred.identifier, uploaded.identifier);

    // Idempotent
    t.gallery
        .toggle_star("", &uploaded.identifier, true)
        .await
        .unwrap();
    assert!(t.gallery.get_photo("", &uploaded.identifier).await.unwrap().starred);

    let cleared = t
        .gallery
        .toggle_star("", &uploaded.identifier, false)
        .await
        .unwrap();
    assert!(!cleared.starred);

    let err = t
        .gallery
        .toggle_star("", "1-doesnotexist.jpg", true)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

async fn list_pages_and_tag_filter(t: TestGallery) {
    let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let mut uploaded = Vec::new();
    for (i, tags) in [vec!["cat"], vec!["cat", "outdoor"], vec!["dog"]]
        .into_iter()
        .enumerate()
    {
        let record = t
            .gallery
            .upload_with(
                "pets",
                photo(30 + i as u32, 30),
                "pet.jpeg",
                UploadOptions {
                    tags: tags.into_iter().map(String::from).collect::<BTreeSet<_>>(),
                    uploaded_at: Some(base + Duration::hours(i as i64)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        uploaded.push(record);
    }

    let first = t.gallery.list("pets", 1, 2, &[]).await.unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.items[0].identifier, uploaded[2].identifier);
    assert_eq!(first.items[1].identifier, uploaded[1].identifier);

    let second = t.gallery.list("pets", 2, 2, &[]).await.unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].identifier, uploaded[0].identifier);

    // Page 0 reads as the first page
    let zero = t.gallery.list("pets", 0, 2, &[]).await.unwrap();
    assert_eq!(zero.items[0].identifier, uploaded[2].identifier);

    let cats = t
        .gallery
        .list("pets", 1, 10, &["cat".to_string()])
        .await
        .unwrap();
    assert_eq!(cats.total, 2);

    let outdoor_cats = t
        .gallery
        .list("pets", 1, 10, &["Cat".to_string(), "outdoor".to_string()])
        .await
        .unwrap();
    assert_eq!(outdoor_cats.total, 1);
    assert_eq!(outdoor_cats.items[0].identifier, uploaded[1].identifier);
}

async fn list_unknown_folder_is_not_found(t: TestGallery) {
    let err = t.gallery.list("nowhere", 1, 10, &[]).await.unwrap_err();
    assert!(err.is_not_found());

    // The root always exists
    assert_eq!(t.gallery.list("", 1, 10, &[]).await.unwrap().total, 0);
}

async fn missing_thumbnail_falls_back_to_original(t: TestGallery) {
    let bytes = photo(50, 50);
    let uploaded = t.gallery.upload("", bytes.clone(), "a.jpg").await.unwrap();

    t.gallery.thumbnails().remove(&uploaded.hash).await.unwrap();

    let served = t
        .gallery
        .open(&FileQuery {
            image: uploaded.identifier.clone(),
            thumb: Some("large".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(!served.is_thumbnail);
    assert_eq!(served.data, bytes);

    let err = t
        .gallery
        .open(&FileQuery {
            image: uploaded.identifier.clone(),
            thumb: Some("huge".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::Validation(_)));
}

async fn batch_upload_isolates_failures(t: TestGallery) {
    let files = vec![
        UploadFile {
            name: "one.jpg".to_string(),
            data: photo(40, 41),
        },
        UploadFile {
            name: "bad.bmp".to_string(),
            data: photo(40, 42),
        },
        UploadFile {
            name: "three.jpg".to_string(),
            data: photo(40, 43),
        },
        UploadFile {
            name: "four.jpg".to_string(),
            data: photo(40, 44),
        },
    ];

    let results = t.gallery.upload_batch("", files).await;

    let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["one.jpg", "bad.bmp", "three.jpg", "four.jpg"]);
    assert!(results[0].1.is_ok());
    assert!(matches!(results[1].1, Err(GalleryError::Validation(_))));
    assert!(results[2].1.is_ok());
    assert!(results[3].1.is_ok());

    assert_eq!(t.gallery.list("", 1, 10, &[]).await.unwrap().total, 3);
}

async fn export_resolves_keys(t: TestGallery) {
    let uploaded = t.gallery.upload("docs", photo(33, 22), "scan.png").await.unwrap();

    let entries = t
        .gallery
        .resolve_export(&[
            PhotoKey::new("docs", &uploaded.identifier),
            PhotoKey::new("docs", "1-missing.jpg"),
        ])
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].key, keys::content_key("docs", &uploaded.hash));
    assert_eq!(entries[0].file_name, uploaded.identifier);
    assert!(t.store.exists(&entries[0].key).await.unwrap());
}

#[tokio::test]
async fn small_listing_pages_are_followed() {
    for t in [
        super::common::memory_with_page_size(2),
        super::common::local_with_page_size(2),
    ] {
        for i in 0..5 {
            t.gallery
                .upload("many", photo(20 + i, 20), "p.jpg")
                .await
                .unwrap();
        }
        let page = t.gallery.list("many", 1, 10, &[]).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(t.gallery.list_folders().await.unwrap()[0].count, 5);
    }
}
