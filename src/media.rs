use async_trait::async_trait;
use std::path::Path;

/// Image-generation collaborator. Concrete pipelines live outside this
/// crate; plugins and tools only see this seam.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Generates an image for the prompt and returns its local path.
    async fn generate(&self, prompt: &str) -> Result<String, String>;
}

/// Deletes every incoming media file for a turn. Missing files are fine;
/// failures are logged and never propagate.
pub fn cleanup_media(paths: &[String]) {
    for path in paths {
        let p = Path::new(path);
        if !p.exists() {
            continue;
        }
        match std::fs::remove_file(p) {
            Ok(()) => log::debug!("[MEDIA] Removed {}", path),
            Err(e) => log::warn!("[MEDIA] Failed to remove {}: {}", path, e),
        }
    }
}

/// Creates the media drop directory if it does not exist yet.
pub fn ensure_media_dir(dir: &str) {
    if let Err(e) = std::fs::create_dir_all(dir) {
        log::warn!("[MEDIA] Could not create media dir {}: {}", dir, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_removes_existing_and_skips_missing() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.png");
        std::fs::write(&present, b"x").unwrap();
        let missing = dir.path().join("b.png");

        cleanup_media(&[
            present.to_string_lossy().into_owned(),
            missing.to_string_lossy().into_owned(),
        ]);

        assert!(!present.exists());
    }

    #[test]
    fn ensure_media_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("drop/zone");
        ensure_media_dir(&nested.to_string_lossy());
        assert!(nested.is_dir());
    }
}
