use std::path::PathBuf;

use rocket::fs::TempFile;
use thiserror::Error;

use crate::config::AppConfig;

/// Caller-side upload problems, kept apart from storage and database errors.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file was uploaded")]
    Missing,

    #[error("File type '{0}' is not allowed")]
    InvalidExtension(String),

    #[error("File is too large ({size} bytes, limit is {max} bytes)")]
    TooLarge { size: u64, max: u64 },

    #[error("Could not store file: {0}")]
    Io(#[from] std::io::Error),
}

/// Where uploads go and what is accepted.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub dir: PathBuf,
    pub max_bytes: u64,
    pub allowed: Vec<String>,
}

impl UploadPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        UploadPolicy {
            dir: PathBuf::from(&config.upload_dir),
            max_bytes: config.upload_max_bytes,
            allowed: config
                .upload_allowed_types
                .iter()
                .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Check a file's original name and size; returns its lowercased extension.
    pub fn validate(&self, file_name: Option<&str>, size: u64) -> Result<String, UploadError> {
        let name = match file_name.map(str::trim) {
            Some(n) if !n.is_empty() && size > 0 => n,
            _ => return Err(UploadError::Missing),
        };
        let ext = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
            _ => return Err(UploadError::InvalidExtension(String::new())),
        };
        if !self.allowed.iter().any(|a| a == &ext) {
            return Err(UploadError::InvalidExtension(ext));
        }
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.max_bytes,
            });
        }
        Ok(ext)
    }

    /// `<prefix>_<uuid>.<ext>`, with the prefix slugified.
    pub fn unique_name(prefix: &str, ext: &str) -> String {
        let prefix = slug::slugify(prefix);
        let prefix = if prefix.is_empty() { "file".to_string() } else { prefix };
        format!("{}_{}.{}", prefix, uuid::Uuid::new_v4(), ext)
    }

    /// Validate and move an uploaded file into the upload directory.
    /// Returns the stored file name.
    pub async fn save(&self, file: &mut TempFile<'_>, prefix: &str) -> Result<String, UploadError> {
        let raw_name = file
            .raw_name()
            .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string());
        let ext = self.validate(raw_name.as_deref(), file.len())?;

        std::fs::create_dir_all(&self.dir)?;
        let filename = Self::unique_name(prefix, &ext);
        let dest = self.dir.join(&filename);
        file.move_copy_to(&dest).await?;
        Ok(filename)
    }
}
