//! Transient local copies of uploads.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use super::MediaKind;

const PREFIX: &str = "genai-studio-";

/// An upload written to a temporary file.
///
/// The file is deleted when the guard is dropped, whichever way the owning
/// operation ends. [`StagedFile::remove`] deletes it explicitly and reports
/// the result; the guard is consumed so the file cannot be removed twice.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
}

impl StagedFile {
    /// Write `data` to a new temp file named with the given extension.
    pub async fn write(kind: MediaKind, extension: &str, data: Vec<u8>) -> std::io::Result<Self> {
        let suffix = format!(".{extension}");
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix(&format!("{PREFIX}{kind}-"))
                .suffix(&suffix)
                .tempfile()?;
            file.write_all(&data)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        tracing::debug!(path = %file.path().display(), %kind, "staged upload");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now.
    pub fn remove(self) -> std::io::Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        tracing::debug!(path = %path.display(), "removed staged upload");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_names_file_with_extension() {
        let staged = StagedFile::write(MediaKind::Video, "mp4", b"0123456789".to_vec())
            .await
            .unwrap();
        let path = staged.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "mp4");
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("genai-studio-video-"));
        assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");

        staged.remove().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_deletes_file() {
        let staged = StagedFile::write(MediaKind::Audio, "wav", vec![0u8; 4])
            .await
            .unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }
}
