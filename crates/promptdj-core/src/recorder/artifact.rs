//! Downloadable recording artifacts

use std::path::{Path, PathBuf};

use super::{ContainerFormat, RecorderError};

/// What an artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Compressed(ContainerFormat),
    Wav,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Compressed(format) => format.extension(),
            ArtifactFormat::Wav => "wav",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ArtifactFormat::Compressed(format) => format.mime_type(),
            ArtifactFormat::Wav => "audio/wav",
        }
    }
}

/// A recording written to the recorder's private directory
///
/// The file lives exactly as long as this value: dropping or releasing it
/// deletes the file.
#[derive(Debug)]
pub struct Artifact {
    path: PathBuf,
    format: ArtifactFormat,
    size: u64,
}

impl Artifact {
    /// Write `bytes` to `path`
    pub(crate) fn write(
        path: PathBuf,
        format: ArtifactFormat,
        bytes: &[u8],
    ) -> Result<Self, RecorderError> {
        std::fs::write(&path, bytes)?;
        Ok(Self {
            path,
            format,
            size: bytes.len() as u64,
        })
    }

    /// Adopt a file that was written in place
    pub(crate) fn adopt(path: PathBuf, format: ArtifactFormat) -> Result<Self, RecorderError> {
        let size = std::fs::metadata(&path)?.len();
        Ok(Self { path, format, size })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Suggested download name
    pub fn file_name(&self) -> String {
        format!("promptdj-recording.{}", self.format.extension())
    }

    pub fn read(&self) -> Result<Vec<u8>, RecorderError> {
        Ok(std::fs::read(&self.path)?)
    }

    /// Copy to a user-chosen destination
    pub fn save_to(&self, dest: &Path) -> Result<(), RecorderError> {
        std::fs::copy(&self.path, dest)?;
        Ok(())
    }

    /// Delete the file now
    pub fn release(self) {}
}

impl Drop for Artifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Recorder: released {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Recorder: failed to release {:?}: {}", self.path, e),
        }
    }
}
