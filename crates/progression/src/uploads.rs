//! Date-sharded upload directory and orphan cleanup
//!
//! Uploaded images are served from `/static/uploads/YYYY/MM/DD/<file>` and
//! stored under `<uploads_dir>/YYYY/MM/DD/<file>`.

use std::io::ErrorKind;
use std::path::PathBuf;

use sea_orm::ConnectionTrait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::Database;
use crate::error::Result;
use crate::repository;

const UPLOADS_PREFIX: &str = "/static/uploads/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStore {
    root: PathBuf,
    site_url: String,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>, site_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            site_url: site_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.uploads_dir, &config.site_url)
    }

    /// Path part of an upload URL, or `None` for anything hosted elsewhere.
    fn upload_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        if url.starts_with(UPLOADS_PREFIX) {
            return Some(url);
        }
        if self.site_url.is_empty() {
            return None;
        }
        url.strip_prefix(self.site_url.as_str())
            .filter(|path| path.starts_with(UPLOADS_PREFIX))
    }

    pub fn is_upload(&self, url: &str) -> bool {
        self.upload_path(url).is_some()
    }

    /// Where an upload URL lives on disk.
    pub fn path_for(&self, url: &str) -> Option<PathBuf> {
        let path = self.upload_path(url)?;
        let rest = path.strip_prefix(UPLOADS_PREFIX)?;
        let parts: Vec<&str> = rest.split('/').collect();
        let [year, month, day, file] = parts.as_slice() else {
            return None;
        };
        let valid = [*year, *month, *day, *file]
            .iter()
            .all(|part| !part.is_empty() && *part != "." && *part != ".." && !part.contains('\\'));
        if !valid {
            return None;
        }
        Some(self.root.join(year).join(month).join(day).join(file))
    }

    /// Delete the file behind `url`. False when there was nothing to delete.
    pub async fn remove(&self, url: &str) -> Result<bool> {
        let Some(path) = self.path_for(url) else {
            warn!(url, "Unexpected upload URL format");
            return Ok(false);
        };
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), url, "Deleted orphaned upload");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Delete every upload in `urls` that no remaining block shows.
pub async fn remove_orphaned<C: ConnectionTrait>(db: &C, store: &UploadStore, urls: Vec<String>) -> Result<usize> {
    let candidates: Vec<String> = urls
        .into_iter()
        .filter(|url| {
            let upload = store.is_upload(url);
            if !upload {
                debug!(url, "Skipping external URL");
            }
            upload
        })
        .collect();
    if candidates.is_empty() {
        return Ok(0);
    }

    let in_use = repository::blocks::media_urls_in_use(db, candidates.clone(), Vec::new()).await?;
    let mut removed = 0;
    for url in candidates {
        if in_use.contains(&url) {
            debug!(url, "Upload still referenced, keeping");
            continue;
        }
        if store.remove(&url).await? {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Run [`remove_orphaned`] detached from the caller, so a dropped request
/// cannot stop it half way.
pub fn spawn_cleanup(db: Database, store: UploadStore, urls: Vec<String>) -> Option<JoinHandle<()>> {
    if urls.is_empty() {
        return None;
    }
    Some(tokio::spawn(async move {
        if let Err(e) = remove_orphaned(db.connection(), &store, urls).await {
            warn!(error = %e, "Upload cleanup failed");
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(root: &std::path::Path) -> UploadStore {
        UploadStore::new(root, "https://play.example.com/")
    }

    #[test]
    fn test_recognises_both_url_forms() {
        let store = store(std::path::Path::new("/srv/uploads"));
        assert!(store.is_upload("/static/uploads/2025/01/02/a.png"));
        assert!(store.is_upload("https://play.example.com/static/uploads/2025/01/02/a.png"));
        assert!(!store.is_upload("https://cdn.other.com/static/uploads/2025/01/02/a.png"));
        assert!(!store.is_upload("/static/images/logo.png"));
    }

    #[test]
    fn test_path_for_maps_date_shards() {
        let store = store(std::path::Path::new("/srv/uploads"));
        assert_eq!(
            store.path_for("https://play.example.com/static/uploads/2025/01/02/a.png"),
            Some(PathBuf::from("/srv/uploads/2025/01/02/a.png"))
        );
        assert_eq!(store.path_for("/static/uploads/2025/01/a.png"), None);
        assert_eq!(store.path_for("/static/uploads/2025/01/../../etc"), None);
    }

    #[test]
    fn test_relative_only_without_site_url() {
        let store = UploadStore::new("/srv/uploads", "");
        assert!(store.is_upload("/static/uploads/2025/01/02/a.png"));
        assert!(!store.is_upload("http://localhost/static/uploads/2025/01/02/a.png"));
    }

    #[tokio::test]
    async fn test_remove_deletes_file_once() {
        let dir = TempDir::new().unwrap();
        let shard = dir.path().join("2025").join("03").join("04");
        std::fs::create_dir_all(&shard).unwrap();
        std::fs::write(shard.join("cat.png"), b"png").unwrap();

        let store = store(dir.path());
        let url = "/static/uploads/2025/03/04/cat.png";
        assert!(store.remove(url).await.unwrap());
        assert!(!shard.join("cat.png").exists());
        assert!(!store.remove(url).await.unwrap());
    }
}
