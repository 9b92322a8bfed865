//! Per-account media library
//!
//! Images live under `<root>/<account_id>/`. Posts refer to them by bare
//! file name; [`MediaLibrary::resolve`] maps those names back to files
//! at delivery time.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, XcastError};
use crate::types::{AccountId, ImageMimeType};

/// Attachments per post accepted by the platform
pub const MAX_ATTACHMENTS: usize = 4;

const NAME_ATTEMPTS: usize = 8;

/// Outcome of mapping a post's image names to files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Files that exist, in reference order
    pub resolved: Vec<PathBuf>,
    /// Kept references with no matching file
    pub missing: Vec<String>,
    /// References beyond the attachment limit, never looked up
    pub dropped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn account_dir(&self, account_id: AccountId) -> PathBuf {
        self.root.join(account_id.to_string())
    }

    /// Map image names to files, keeping at most [`MAX_ATTACHMENTS`]
    pub async fn resolve(&self, account_id: AccountId, refs: &[String]) -> Resolution {
        let split = refs.len().min(MAX_ATTACHMENTS);
        let (kept, extra) = refs.split_at(split);
        let mut resolution = Resolution {
            dropped: extra.to_vec(),
            ..Default::default()
        };

        let dir = self.account_dir(account_id);
        for name in kept {
            if !is_safe_name(name) {
                resolution.missing.push(name.clone());
                continue;
            }

            let path = dir.join(name);
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => resolution.resolved.push(path),
                _ => resolution.missing.push(name.clone()),
            }
        }

        resolution
    }

    /// Save an upload under a fresh unique name and return that name
    pub async fn store(&self, account_id: AccountId, original_name: &str, bytes: &[u8]) -> Result<String> {
        let original = Path::new(original_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let mime = ImageMimeType::from_path(Path::new(original)).ok_or_else(|| {
            XcastError::InvalidInput(format!(
                "unsupported image type '{}': expected jpg, jpeg, png, gif or webp",
                original_name
            ))
        })?;
        if bytes.is_empty() {
            return Err(XcastError::InvalidInput("uploaded file is empty".to_string()));
        }

        let dir = self.account_dir(account_id);
        tokio::fs::create_dir_all(&dir).await?;

        let stem = sanitize_stem(original);
        let ext = Path::new(original)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        for _ in 0..NAME_ATTEMPTS {
            let suffix: u32 = rand::thread_rng().gen();
            let name = format!("{}_{:08x}.{}", stem, suffix, ext);
            let path = dir.join(&name);

            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            file.write_all(bytes).await?;
            file.flush().await?;

            tracing::info!(account_id, file = %name, mime = %mime, size = bytes.len(), "Stored image");
            return Ok(name);
        }

        Err(XcastError::Conflict(format!(
            "could not find a free name for '{}'",
            original_name
        )))
    }

    /// Image file names of an account, sorted
    pub async fn list(&self, account_id: AccountId) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(self.account_dir(account_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if ImageMimeType::from_path(Path::new(name)).is_some() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// File contents and MIME type
    pub async fn read(&self, account_id: AccountId, name: &str) -> Result<(Vec<u8>, ImageMimeType)> {
        let path = self.existing(account_id, name)?;
        let mime = ImageMimeType::from_path(&path).ok_or_else(|| XcastError::not_found("image", name))?;

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((bytes, mime)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(XcastError::not_found("image", name)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, account_id: AccountId, name: &str) -> Result<()> {
        let path = self.existing(account_id, name)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(account_id, file = %name, "Deleted image");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(XcastError::not_found("image", name)),
            Err(e) => Err(e.into()),
        }
    }

    fn existing(&self, account_id: AccountId, name: &str) -> Result<PathBuf> {
        if !is_safe_name(name) {
            return Err(XcastError::not_found("image", name));
        }
        Ok(self.account_dir(account_id).join(name))
    }
}

/// A bare file name with no way to leave the account directory
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

fn sanitize_stem(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(64)
        .collect();

    if cleaned.trim_matches('_').is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}
