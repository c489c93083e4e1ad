use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{SecretError, SecretGetter};

/// Resolves secret resources from the local process.
///
/// | Resource | Source |
/// |----------|--------|
/// | `env:NAME` | environment variable `NAME` |
/// | `file:PATH` or `PATH` | file contents |
///
/// Relative paths are resolved against `base_dir` (the config directory).
/// Values are trimmed; an empty value is an error.
#[derive(Debug, Clone, Default)]
pub struct LocalSecretGetter {
    base_dir: Option<PathBuf>,
}

impl LocalSecretGetter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl SecretGetter for LocalSecretGetter {
    async fn get_secret(&self, resource: &str) -> Result<String, SecretError> {
        let unavailable = |source: Box<dyn std::error::Error + Send + Sync>| {
            SecretError::Unavailable {
                resource: resource.to_string(),
                source,
            }
        };

        let raw = if let Some(name) = resource.strip_prefix("env:") {
            if name.is_empty() {
                return Err(SecretError::UnsupportedResource {
                    resource: resource.to_string(),
                });
            }
            std::env::var(name).map_err(|err| unavailable(Box::new(err)))?
        } else {
            let path = resource.strip_prefix("file:").unwrap_or(resource);
            if path.is_empty() {
                return Err(SecretError::UnsupportedResource {
                    resource: resource.to_string(),
                });
            }
            tokio::fs::read_to_string(self.resolve_path(path))
                .await
                .map_err(|err| unavailable(Box::new(err)))?
        };

        let value = raw.trim();
        if value.is_empty() {
            return Err(SecretError::Empty {
                resource: resource.to_string(),
            });
        }
        Ok(value.to_string())
    }
}
