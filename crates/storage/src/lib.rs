//! On-disk state: engine settings under the platform data directory, and
//! annotation sidecar files stored next to the documents they describe.

use directories::ProjectDirs;
use doc_model::{AnnotationIndex, EngineSettings, ModelError};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_SCHEMA_VERSION: u32 = 1;
const SIDECAR_SUFFIX: &str = ".annotations.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported settings version {0}")]
    UnsupportedVersion(u32),
    #[error(transparent)]
    Model(#[from] ModelError),
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsEnvelope {
    version: u32,
    settings: EngineSettings,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "DocEditor", "DocEditor")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stored settings, or defaults when nothing has been saved yet.
    pub fn load_settings(&self) -> Result<EngineSettings, StorageError> {
        let path = self.settings_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(EngineSettings::default());
        }

        let bytes = fs::read(path)?;
        let envelope: SettingsEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != SETTINGS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }
        envelope.settings.validate()?;

        Ok(envelope.settings)
    }

    pub fn save_settings(&self, settings: &EngineSettings) -> Result<(), StorageError> {
        settings.validate()?;
        fs::create_dir_all(&self.root)?;

        let envelope =
            SettingsEnvelope { version: SETTINGS_SCHEMA_VERSION, settings: settings.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        write_atomically(&self.settings_path(), &bytes)?;
        tracing::debug!(root = %self.root.display(), "saved settings");
        Ok(())
    }

    fn settings_path(&self) -> PathBuf {
        self.root.join("settings.json")
    }
}

/// `<document>.annotations.json`, next to the document.
pub fn sidecar_path(document: &Path) -> PathBuf {
    let mut name = OsString::from(document.as_os_str());
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

/// Writes the index next to `document`. An empty index writes nothing and
/// returns `Ok(false)`.
pub fn save_annotation_sidecar(
    document: &Path,
    index: &AnnotationIndex,
) -> Result<bool, StorageError> {
    if index.is_empty() {
        return Ok(false);
    }

    let path = sidecar_path(document);
    write_atomically(&path, &index.to_json()?)?;
    tracing::debug!(
        path = %path.display(),
        annotations = index.annotation_count(),
        "saved annotation sidecar"
    );
    Ok(true)
}

pub fn load_annotation_sidecar(document: &Path) -> Result<Option<AnnotationIndex>, StorageError> {
    let path = sidecar_path(document);
    if !path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(&path)?;
    Ok(Some(AnnotationIndex::from_json(&bytes)?))
}

/// Removes the sidecar if present, reporting whether one existed.
pub fn delete_annotation_sidecar(document: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(sidecar_path(document)) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, bytes)?;
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}
