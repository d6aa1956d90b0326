//! Parameter checkpoints on disk.
//!
//! Files are JSON, named `ppo_continuous_{env}.json` with optional `_best` or
//! `_solved` suffix. Writes go to a temporary file that is renamed into place,
//! so a reader never sees a half-written checkpoint.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::policy::{ParameterError, PolicyParameters};

/// Errors raised while saving or loading checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed checkpoint {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checkpoint {path} is for environment '{found}', expected '{expected}'")]
    WrongEnvironment {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("refusing invalid parameters: {0}")]
    Invalid(#[from] ParameterError),
}

/// Which checkpoint slot to read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckpointKind {
    /// Plain checkpoint, the one `restore` loads.
    Base,
    /// Best average reward so far.
    Best,
    /// Written once the goal rate crosses the solved threshold.
    Solved,
}

impl CheckpointKind {
    fn suffix(self) -> &'static str {
        match self {
            CheckpointKind::Base => "",
            CheckpointKind::Best => "_best",
            CheckpointKind::Solved => "_solved",
        }
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointKind::Base => write!(f, "base"),
            CheckpointKind::Best => write!(f, "best"),
            CheckpointKind::Solved => write!(f, "solved"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    env_name: String,
    kind: CheckpointKind,
    episode: usize,
    parameters: PolicyParameters,
}

/// Reads and writes the checkpoints of one environment.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    folder: PathBuf,
    env_name: String,
}

impl CheckpointStore {
    pub fn new(folder: impl Into<PathBuf>, env_name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            env_name: env_name.into(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path of the given checkpoint.
    pub fn path(&self, kind: CheckpointKind) -> PathBuf {
        self.folder.join(format!(
            "ppo_continuous_{}{}.json",
            self.env_name,
            kind.suffix()
        ))
    }

    pub fn exists(&self, kind: CheckpointKind) -> bool {
        self.path(kind).is_file()
    }

    /// Validates `params` and writes them atomically.
    pub fn save(
        &self,
        kind: CheckpointKind,
        params: &PolicyParameters,
        episode: usize,
    ) -> Result<PathBuf, CheckpointError> {
        params.validate()?;
        let path = self.path(kind);
        let io_err = |source| CheckpointError::Io {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.folder).map_err(io_err)?;
        let file = CheckpointFile {
            env_name: self.env_name.clone(),
            kind,
            episode,
            parameters: params.clone(),
        };
        let json = serde_json::to_vec(&file).map_err(|source| CheckpointError::Format {
            path: path.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        info!(kind = %kind, episode, path = %path.display(), "checkpoint saved");
        Ok(path)
    }

    /// Loads and validates the given checkpoint.
    pub fn load(&self, kind: CheckpointKind) -> Result<PolicyParameters, CheckpointError> {
        let path = self.path(kind);
        let bytes = fs::read(&path).map_err(|source| CheckpointError::Io {
            path: path.clone(),
            source,
        })?;
        let file: CheckpointFile =
            serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Format {
                path: path.clone(),
                source,
            })?;
        if file.env_name != self.env_name {
            return Err(CheckpointError::WrongEnvironment {
                path,
                expected: self.env_name.clone(),
                found: file.env_name,
            });
        }
        file.parameters.validate()?;
        info!(kind = %kind, episode = file.episode, path = %path.display(), "checkpoint loaded");
        Ok(file.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{GaussianPolicyConfig, LinearGaussianPolicy, PolicyNetwork};

    fn params() -> PolicyParameters {
        LinearGaussianPolicy::new(
            9,
            GaussianPolicyConfig {
                init_scale: 0.7,
                seed: 11,
                ..GaussianPolicyConfig::default()
            },
        )
        .parameters()
    }

    #[test]
    fn file_names_follow_kind() {
        let store = CheckpointStore::new("/ckpt", "arena");
        assert_eq!(
            store.path(CheckpointKind::Base),
            PathBuf::from("/ckpt/ppo_continuous_arena.json")
        );
        assert_eq!(
            store.path(CheckpointKind::Best),
            PathBuf::from("/ckpt/ppo_continuous_arena_best.json")
        );
        assert_eq!(
            store.path(CheckpointKind::Solved),
            PathBuf::from("/ckpt/ppo_continuous_arena_solved.json")
        );
    }

    #[test]
    fn round_trip_is_bit_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested"), "arena");
        let original = params();
        store.save(CheckpointKind::Best, &original, 40).unwrap();
        assert!(store.exists(CheckpointKind::Best));
        assert!(!store.exists(CheckpointKind::Solved));

        let loaded = store.load(CheckpointKind::Best).unwrap();
        for ((name_a, a), (name_b, b)) in original.iter().zip(loaded.iter()) {
            assert_eq!(name_a, name_b);
            assert_eq!(a.shape, b.shape);
            let bits_a: Vec<u64> = a.values.iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u64> = b.values.iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b, "{name_a}");
        }
    }

    #[test]
    fn invalid_parameters_are_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "arena");
        let mut bad = PolicyParameters::new();
        bad.insert("w", vec![1], vec![f64::INFINITY]).unwrap();
        assert!(matches!(
            store.save(CheckpointKind::Base, &bad, 1),
            Err(CheckpointError::Invalid(_))
        ));
        assert!(!store.exists(CheckpointKind::Base));
    }

    #[test]
    fn missing_checkpoint_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path(), "arena");
        assert!(matches!(
            store.load(CheckpointKind::Base),
            Err(CheckpointError::Io { .. })
        ));
    }

    #[test]
    fn other_environment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        CheckpointStore::new(dir.path(), "arena")
            .save(CheckpointKind::Base, &params(), 1)
            .unwrap();
        fs::rename(
            dir.path().join("ppo_continuous_arena.json"),
            dir.path().join("ppo_continuous_corridor.json"),
        )
        .unwrap();
        let err = CheckpointStore::new(dir.path(), "corridor")
            .load(CheckpointKind::Base)
            .unwrap_err();
        assert!(matches!(err, CheckpointError::WrongEnvironment { .. }));
    }
}
