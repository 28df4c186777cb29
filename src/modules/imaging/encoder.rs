//! External WebP encoder
//!
//! `CwebpEncoder` shells out to `cwebp`. When the primary executable cannot be
//! run or exits with a failure it tries one alternate install location; there
//! is no other retry.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("webp conversion failed (primary encoder: {primary}; fallback encoder: {fallback})")]
    AllFailed { primary: String, fallback: String },
}

/// Turns an input image file into the canonical format at `output`
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError>;
}

/// `cwebp` invoked as a child process at a fixed quality
#[derive(Debug, Clone)]
pub struct CwebpEncoder {
    primary: PathBuf,
    fallback: PathBuf,
    quality: u8,
}

impl CwebpEncoder {
    pub fn new(primary: impl Into<PathBuf>, fallback: impl Into<PathBuf>, quality: u8) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
            quality,
        }
    }

    async fn run(&self, program: &Path, input: &Path, output: &Path) -> Result<(), EncodeError> {
        let program_name = program.display().to_string();

        let result = Command::new(program)
            .arg("-quiet")
            .arg("-q")
            .arg(self.quality.to_string())
            .arg(input)
            .arg("-o")
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| EncodeError::Spawn {
                program: program_name.clone(),
                message: err.to_string(),
            })?;

        if !result.status.success() {
            return Err(EncodeError::Exit {
                program: program_name,
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        debug!("{} encoded {}", program_name, output.display());
        Ok(())
    }
}

#[async_trait]
impl Encoder for CwebpEncoder {
    async fn encode(&self, input: &Path, output: &Path) -> Result<(), EncodeError> {
        let primary_err = match self.run(&self.primary, input, output).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        warn!(
            "Primary encoder failed ({}), trying {}",
            primary_err,
            self.fallback.display()
        );

        self.run(&self.fallback, input, output)
            .await
            .map_err(|fallback_err| EncodeError::AllFailed {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_both_locations_missing_reports_both_errors() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        tokio::fs::write(&input, b"not really a png").await.unwrap();
        let output = dir.path().join("out.webp");

        let encoder = CwebpEncoder::new(
            dir.path().join("missing-cwebp"),
            dir.path().join("also-missing-cwebp"),
            75,
        );

        let err = encoder.encode(&input, &output).await.unwrap_err();
        match err {
            EncodeError::AllFailed { primary, fallback } => {
                assert!(primary.contains("missing-cwebp"));
                assert!(fallback.contains("also-missing-cwebp"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!output.exists());
    }

    /// Writes an executable sh script; cwebp args arrive as `-quiet -q N in -o out`
    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_primary_falls_back_to_alternate_location() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        tokio::fs::write(&input, b"pixels").await.unwrap();
        let output = dir.path().join("out.webp");

        let fallback = script(dir.path(), "cwebp-alt", r#"cp "$4" "$6""#);
        let encoder = CwebpEncoder::new(dir.path().join("missing-cwebp"), fallback, 75);

        encoder.encode(&input, &output).await.unwrap();
        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"pixels");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_primary_tries_fallback_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        tokio::fs::write(&input, b"pixels").await.unwrap();
        let output = dir.path().join("out.webp");
        let calls = dir.path().join("calls");
        let calls_arg = calls.display();

        let primary = script(
            dir.path(),
            "cwebp",
            &format!("echo primary >> \"{calls_arg}\"\necho 'bad input' >&2\nexit 3"),
        );
        let fallback = script(
            dir.path(),
            "cwebp-alt",
            &format!("echo fallback >> \"{calls_arg}\"\ncp \"$4\" \"$6\""),
        );
        let encoder = CwebpEncoder::new(primary, fallback, 75);

        encoder.encode(&input, &output).await.unwrap();
        assert!(output.exists());
        assert_eq!(
            tokio::fs::read_to_string(&calls).await.unwrap(),
            "primary\nfallback\n"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_working_primary_skips_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        tokio::fs::write(&input, b"pixels").await.unwrap();
        let output = dir.path().join("out.webp");
        let calls = dir.path().join("calls");

        let primary = script(dir.path(), "cwebp", r#"cp "$4" "$6""#);
        let fallback = script(
            dir.path(),
            "cwebp-alt",
            &format!("echo fallback >> \"{}\"", calls.display()),
        );
        let encoder = CwebpEncoder::new(primary, fallback, 75);

        encoder.encode(&input, &output).await.unwrap();
        assert!(output.exists());
        assert!(!calls.exists());
    }
}
