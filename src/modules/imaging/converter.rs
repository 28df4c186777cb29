//! Format converter: raw upload bytes -> canonical WebP file in the upload directory

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use super::encoder::{EncodeError, Encoder};
use crate::modules::storage::UploadStorage;

/// Source extensions accepted for conversion (compared case-insensitively)
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Extension of every stored file
pub const CANONICAL_EXTENSION: &str = "webp";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unsupported image format '{extension}'. Only JPG, PNG, and GIF files are allowed")]
    UnsupportedFormat { extension: String },

    #[error("Failed to prepare image: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    ConversionFailed(#[from] EncodeError),

    #[error("Image conversion timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Lowercased extension of `original_name` if it is on the allow-list
pub fn allowed_extension(original_name: &str) -> Result<String, ConversionError> {
    // Text after the last dot of the final component, so ".png" counts as png
    let extension = Path::new(original_name)
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ConversionError::UnsupportedFormat { extension })
    }
}

/// 128 random bits, hex encoded, plus the canonical extension
pub fn generate_stored_name() -> String {
    format!("{:032x}.{}", rand::random::<u128>(), CANONICAL_EXTENSION)
}

pub struct ImageConverter {
    storage: Arc<UploadStorage>,
    scratch_dir: PathBuf,
    encoder: Arc<dyn Encoder>,
    timeout: Duration,
}

impl ImageConverter {
    pub fn new(
        storage: Arc<UploadStorage>,
        scratch_dir: impl Into<PathBuf>,
        encoder: Arc<dyn Encoder>,
        timeout: Duration,
    ) -> Self {
        Self {
            storage,
            scratch_dir: scratch_dir.into(),
            encoder,
            timeout,
        }
    }

    /// Convert an upload into the canonical format and return its stored name.
    ///
    /// The extension check happens before any file I/O. The scratch copy is
    /// removed whatever the outcome, and a failed conversion leaves no output
    /// file behind.
    pub async fn convert(
        &self,
        data: Bytes,
        original_name: &str,
    ) -> Result<String, ConversionError> {
        let extension = allowed_extension(original_name)?;

        let stored_name = generate_stored_name();
        let output = self.storage.path_for(&stored_name);
        tokio::fs::create_dir_all(self.storage.root()).await?;

        let scratch_dir = self.scratch_dir.clone();
        let scratch = tokio::task::spawn_blocking(move || {
            write_scratch_file(&scratch_dir, &extension, &data)
        })
        .await
        .map_err(io::Error::other)??;

        let result = match tokio::time::timeout(
            self.timeout,
            self.encoder.encode(scratch.path(), &output),
        )
        .await
        {
            Ok(Ok(())) => Ok(stored_name),
            Ok(Err(e)) => Err(ConversionError::ConversionFailed(e)),
            Err(_) => Err(ConversionError::Timeout(self.timeout)),
        };

        if result.is_err() {
            remove_partial_output(&output).await;
        }

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch file: {}", e);
        }

        if let Ok(name) = &result {
            debug!("Converted '{}' to {}", original_name, name);
        }
        result
    }
}

fn write_scratch_file(dir: &Path, extension: &str, data: &[u8]) -> io::Result<NamedTempFile> {
    let suffix = format!(".{}", extension);
    let mut file = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile_in(dir)?;
    file.write_all(data)?;
    file.flush()?;
    Ok(file)
}

async fn remove_partial_output(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => debug!("Removed partial output {}", output.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {}: {}", output.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Copies the scratch file to the output, counting invocations
    #[derive(Default)]
    struct CopyEncoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Encoder for CopyEncoder {
        async fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::copy(input, output)
                .await
                .map(|_| ())
                .map_err(|e| EncodeError::Spawn {
                    program: "copy".to_string(),
                    message: e.to_string(),
                })
        }
    }

    /// Writes half an output file, then fails
    struct BrokenEncoder;

    #[async_trait]
    impl Encoder for BrokenEncoder {
        async fn encode(&self, _input: &Path, output: &Path) -> Result<(), EncodeError> {
            tokio::fs::write(output, b"partial").await.unwrap();
            Err(EncodeError::AllFailed {
                primary: "cwebp: not found".to_string(),
                fallback: "./.bin/webp/cwebp: not found".to_string(),
            })
        }
    }

    struct StuckEncoder;

    #[async_trait]
    impl Encoder for StuckEncoder {
        async fn encode(&self, _input: &Path, _output: &Path) -> Result<(), EncodeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    struct Fixture {
        upload: tempfile::TempDir,
        scratch: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                upload: tempfile::tempdir().unwrap(),
                scratch: tempfile::tempdir().unwrap(),
            }
        }

        fn converter(&self, encoder: Arc<dyn Encoder>, timeout: Duration) -> ImageConverter {
            ImageConverter::new(
                Arc::new(UploadStorage::new(self.upload.path())),
                self.scratch.path(),
                encoder,
                timeout,
            )
        }

        fn count(dir: &Path) -> usize {
            std::fs::read_dir(dir).unwrap().count()
        }
    }

    #[test]
    fn test_allowed_extension_is_case_insensitive() {
        for name in ["a.jpg", "a.JPEG", "photo.Png", "anim.gif", "x.y.jpg", ".png", "dir/.GIF"] {
            assert!(allowed_extension(name).is_ok(), "{name} should be allowed");
        }
        for name in ["a.bmp", "a.webp", "a", "a.jpg.exe", ".png.txt", "png"] {
            assert!(
                matches!(
                    allowed_extension(name),
                    Err(ConversionError::UnsupportedFormat { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn test_generated_names_are_unique_and_canonical() {
        let a = generate_stored_name();
        let b = generate_stored_name();
        assert_ne!(a, b);
        assert!(a.ends_with(".webp"));
        assert_eq!(a.len(), 32 + ".webp".len());
    }

    #[tokio::test]
    async fn test_convert_every_allowed_extension() {
        let fixture = Fixture::new();
        let encoder = Arc::new(CopyEncoder::default());
        let converter = fixture.converter(encoder.clone(), Duration::from_secs(5));

        for ext in ALLOWED_EXTENSIONS {
            let name = converter
                .convert(Bytes::from_static(b"image bytes"), &format!("upload.{ext}"))
                .await
                .unwrap();
            assert!(name.ends_with(".webp"));
            let stored = tokio::fs::read(fixture.upload.path().join(&name))
                .await
                .unwrap();
            assert_eq!(stored, b"image bytes");
        }

        assert_eq!(encoder.calls.load(Ordering::SeqCst), ALLOWED_EXTENSIONS.len());
        assert_eq!(Fixture::count(fixture.scratch.path()), 0);
    }

    #[tokio::test]
    async fn test_unsupported_format_fails_before_any_io() {
        let fixture = Fixture::new();
        let encoder = Arc::new(CopyEncoder::default());
        let converter = fixture.converter(encoder.clone(), Duration::from_secs(5));

        let err = converter
            .convert(Bytes::from_static(b"MZ"), "evil.exe")
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::UnsupportedFormat { ref extension } if extension == "exe"));
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(Fixture::count(fixture.scratch.path()), 0);
        assert_eq!(Fixture::count(fixture.upload.path()), 0);
    }

    #[tokio::test]
    async fn test_failed_conversion_leaves_no_files() {
        let fixture = Fixture::new();
        let converter = fixture.converter(Arc::new(BrokenEncoder), Duration::from_secs(5));

        let err = converter
            .convert(Bytes::from_static(b"png"), "a.png")
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("primary encoder"));
        assert!(message.contains("fallback encoder"));
        assert_eq!(Fixture::count(fixture.scratch.path()), 0);
        assert_eq!(Fixture::count(fixture.upload.path()), 0);
    }

    #[tokio::test]
    async fn test_slow_encoder_times_out() {
        let fixture = Fixture::new();
        let converter = fixture.converter(Arc::new(StuckEncoder), Duration::from_millis(50));

        let err = converter
            .convert(Bytes::from_static(b"gif"), "a.gif")
            .await
            .unwrap_err();

        assert!(matches!(err, ConversionError::Timeout(_)));
        assert_eq!(Fixture::count(fixture.scratch.path()), 0);
    }
}
