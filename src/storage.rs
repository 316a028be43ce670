use std::path::PathBuf;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const MAX_PAYMENT_PROOF_KB: usize = 500;
pub const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Object storage for user files. Returns the public URL of the stored object.
#[async_trait]
pub trait FileUploader: Send + Sync {
    async fn upload(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> AppResult<String>;

    /// Deletes an object by the URL `upload` returned. Missing objects are fine.
    async fn remove(&self, url: &str) -> AppResult<()>;
}

/// Stores files on local disk under `root`, served back from `/uploads`.
pub struct LocalUploader {
    root: PathBuf,
    public_base_url: String,
}

impl LocalUploader {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl FileUploader for LocalUploader {
    async fn upload(&self, folder: &str, file_name: &str, bytes: Vec<u8>) -> AppResult<String> {
        let ext = extension_of(file_name).unwrap_or_default();
        let key = format!("{}.{}", Uuid::new_v4(), ext);
        let dir = self.root.join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("create upload dir: {e}")))?;
        tokio::fs::write(dir.join(&key), bytes)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("write upload: {e}")))?;
        Ok(format!("{}/uploads/{folder}/{key}", self.public_base_url))
    }

    async fn remove(&self, url: &str) -> AppResult<()> {
        let relative = url
            .strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix("/uploads/"))
            .filter(|rest| !rest.split('/').any(|part| part.is_empty() || part == ".."))
            .ok_or_else(|| AppError::BadRequest(format!("{url} is not a local upload")))?;
        match tokio::fs::remove_file(self.root.join(relative)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Internal(anyhow::anyhow!("remove upload: {e}"))),
        }
    }
}

pub fn extension_of(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Size cap in KB plus an extension allow-list.
pub fn validate_image(file_name: &str, size: usize, max_kb: usize) -> AppResult<()> {
    if size > max_kb * 1024 {
        return Err(AppError::PayloadTooLarge(max_kb));
    }
    match extension_of(file_name) {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(AppError::UnsupportedMediaType(IMAGE_EXTENSIONS.join(", "))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_small_images_in_any_case() {
        assert!(validate_image("proof.JPG", 200 * 1024, MAX_PAYMENT_PROOF_KB).is_ok());
        assert!(validate_image("proof.jpeg", 500 * 1024, MAX_PAYMENT_PROOF_KB).is_ok());
        assert!(validate_image("proof.png", 1, MAX_PAYMENT_PROOF_KB).is_ok());
    }

    #[test]
    fn rejects_oversized_files() {
        let err = validate_image("proof.png", 500 * 1024 + 1, MAX_PAYMENT_PROOF_KB).unwrap_err();
        assert_eq!(err.code(), "payload-too-large");
    }

    #[test]
    fn rejects_other_extensions() {
        for name in ["proof.pdf", "proof", "proof.", "png"] {
            let err = validate_image(name, 10, MAX_PAYMENT_PROOF_KB).unwrap_err();
            assert_eq!(err.code(), "unsupported-media-type", "{name}");
        }
    }

    #[tokio::test]
    async fn local_uploader_writes_and_returns_public_url() {
        let root = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        let uploader = LocalUploader::new(&root, "http://localhost:3000/");

        let url = uploader
            .upload("payment-proofs", "proof.PNG", vec![1, 2, 3])
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:3000/uploads/payment-proofs/"));
        assert!(url.ends_with(".png"));
        let key = url.rsplit('/').next().unwrap();
        let stored = tokio::fs::read(root.join("payment-proofs").join(key)).await.unwrap();
        assert_eq!(stored, vec![1, 2, 3]);
        let _ = tokio::fs::remove_dir_all(root).await;
    }

    #[tokio::test]
    async fn local_uploader_removes_only_its_own_files() {
        let root = std::env::temp_dir().join(format!("uploads-{}", Uuid::new_v4()));
        let uploader = LocalUploader::new(&root, "http://localhost:3000");

        let url = uploader
            .upload("payment-proofs", "proof.jpg", vec![7])
            .await
            .unwrap();
        let key = url.rsplit('/').next().unwrap().to_string();
        let path = root.join("payment-proofs").join(&key);
        assert!(tokio::fs::try_exists(&path).await.unwrap());

        uploader.remove(&url).await.unwrap();
        assert!(!tokio::fs::try_exists(&path).await.unwrap());
        // Already gone.
        uploader.remove(&url).await.unwrap();

        for foreign in [
            "https://elsewhere.test/uploads/payment-proofs/x.png",
            "http://localhost:3000/uploads/../secret.png",
        ] {
            let err = uploader.remove(foreign).await.unwrap_err();
            assert_eq!(err.code(), "bad-request", "{foreign}");
        }
        let _ = tokio::fs::remove_dir_all(root).await;
    }
}
