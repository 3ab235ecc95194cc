use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use super::{GalleryError, GalleryService, OrphanReport, keys};
use crate::storage::StorageError;

impl GalleryService {
    /// Find objects left behind by interrupted writes: content nobody
    /// describes, records whose content is gone, and thumbnail sets no
    /// active or trashed record references. Read-only.
    pub async fn audit(&self) -> Result<OrphanReport, GalleryError> {
        let mut report = OrphanReport::default();

        let metadata_keys = self.keys_one_level_down(keys::METADATA_PREFIX).await?;
        let content_keys = self.keys_one_level_down(keys::CONTENT_PREFIX).await?;

        let described: BTreeSet<String> = metadata_keys
            .iter()
            .filter_map(|key| metadata_to_content(key))
            .collect();

        let mut referenced: BTreeSet<String> = metadata_keys
            .iter()
            .map(|key| keys::key_stem(key).to_string())
            .collect();

        report.orphaned_content.extend(
            content_keys
                .iter()
                .filter(|key| !described.contains(*key))
                .cloned(),
        );
        report.dangling_metadata.extend(
            metadata_keys
                .iter()
                .filter(|key| {
                    metadata_to_content(key).is_some_and(|content| !content_keys.contains(&content))
                })
                .cloned(),
        );

        // Trash records pair with trash content by id
        let trash_ids: BTreeSet<String> = self.index.trash_ids().await?.into_iter().collect();
        let trash_content: BTreeSet<String> = self
            .store
            .list_all(keys::TRASH_CONTENT_PREFIX)
            .await?
            .keys
            .into_iter()
            .collect();

        for id in &trash_ids {
            if !trash_content.contains(&keys::trash_content_key(id)) {
                report.dangling_metadata.push(keys::trash_metadata_key(id));
            }
            if let Some((_, hash)) = id.split_once('-') {
                referenced.insert(hash.to_string());
            }
        }
        report.orphaned_content.extend(
            trash_content
                .iter()
                .filter(|key| !trash_ids.contains(keys::key_stem(key)))
                .cloned(),
        );

        let thumbnails = self.store.list_all(keys::THUMBNAIL_PREFIX).await?;
        report.unreferenced_thumbnails.extend(
            thumbnails
                .prefixes
                .into_iter()
                .filter(|prefix| !referenced.contains(keys::key_stem(prefix))),
        );

        if report.is_clean() {
            debug!("Audit found nothing to reconcile");
        } else {
            warn!(
                "Audit: {} orphaned content, {} dangling records, {} unreferenced thumbnail sets",
                report.orphaned_content.len(),
                report.dangling_metadata.len(),
                report.unreferenced_thumbnails.len()
            );
        }
        Ok(report)
    }

    /// Delete what `report` lists. Every candidate is checked again first:
    /// anything that gained its counterpart since the audit, or was written
    /// within the grace window, is kept. Returns how many objects were
    /// removed.
    pub async fn sweep(&self, report: &OrphanReport) -> Result<usize, GalleryError> {
        let cutoff = i64::try_from(self.config.orphan_grace_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .and_then(|grace| Utc::now().checked_sub_signed(grace));
        let mut removed = 0;

        for key in &report.orphaned_content {
            if self.store.exists(&content_to_record(key)).await? {
                debug!("{} has a record now, keeping it", key);
                continue;
            }
            if self.sweepable(key, cutoff).await? {
                self.store.delete(key).await?;
                removed += 1;
            }
        }

        for key in &report.dangling_metadata {
            let Some(content) = record_to_content(key) else {
                continue;
            };
            if self.store.exists(&content).await? {
                debug!("{} has content now, keeping it", key);
                continue;
            }
            if self.sweepable(key, cutoff).await? {
                self.store.delete(key).await?;
                removed += 1;
            }
        }

        for prefix in &report.unreferenced_thumbnails {
            let hash = keys::key_stem(prefix);
            if self.index.hash_referenced(hash).await? {
                debug!("Thumbnails for {} are referenced now, keeping them", hash);
                continue;
            }

            let thumbnails = self.store.list_all(prefix).await?.keys;
            let mut all_old = true;
            for key in &thumbnails {
                if !self.sweepable(key, cutoff).await? {
                    all_old = false;
                    break;
                }
            }
            if !all_old {
                continue;
            }
            for key in &thumbnails {
                self.store.delete(key).await?;
                removed += 1;
            }
        }

        info!("Sweep removed {} object(s)", removed);
        Ok(removed)
    }

    /// Whether `key` still exists and was last written before `cutoff`.
    /// With no grace window every existing object qualifies.
    async fn sweepable(
        &self,
        key: &str,
        cutoff: Option<DateTime<Utc>>,
    ) -> Result<bool, GalleryError> {
        if self.config.orphan_grace_secs == 0 {
            return Ok(self.store.exists(key).await?);
        }

        match self.store.last_modified(key).await {
            Ok(modified) if cutoff.is_some_and(|cutoff| modified <= cutoff) => Ok(true),
            Ok(_) => {
                debug!("{} is younger than the grace window, keeping it", key);
                Ok(false)
            }
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Keys stored exactly one level below `prefix` (`<prefix><seg>/<name>`).
    async fn keys_one_level_down(&self, prefix: &str) -> Result<BTreeSet<String>, GalleryError> {
        let mut found = BTreeSet::new();
        for segment in self.store.list_all(prefix).await?.prefixes {
            found.extend(self.store.list_all(&segment).await?.keys);
        }
        Ok(found)
    }
}

/// Content object -> the record that describes it, active or trashed.
fn content_to_record(key: &str) -> String {
    if let Some(id) = key.strip_prefix(keys::TRASH_CONTENT_PREFIX) {
        return keys::trash_metadata_key(id);
    }
    let rest = key.strip_prefix(keys::CONTENT_PREFIX).unwrap_or(key);
    format!("{}{}.json", keys::METADATA_PREFIX, rest)
}

/// Record -> its content object, active or trashed.
fn record_to_content(key: &str) -> Option<String> {
    if key.starts_with(keys::TRASH_METADATA_PREFIX) {
        return Some(keys::trash_content_key(keys::key_stem(key)));
    }
    metadata_to_content(key)
}

/// `metadata/<seg>/<hash>.json` -> `content/<seg>/<hash>`
fn metadata_to_content(key: &str) -> Option<String> {
    let rest = key.strip_prefix(keys::METADATA_PREFIX)?;
    let rest = rest.strip_suffix(".json")?;
    Some(format!("{}{}", keys::CONTENT_PREFIX, rest))
}
