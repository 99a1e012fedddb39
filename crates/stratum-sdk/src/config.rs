use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stratum_types::KeyLayout;

use crate::error::{SdkError, SdkResult};

/// Storage settings, loadable from TOML.
///
/// Every field has a default, so a file only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bucket holding blocks, roots and leases.
    pub bucket: String,
    /// Base prefix inside the bucket; empty or ending in `/`.
    pub key_prefix: String,
    pub scratch_dir: PathBuf,
    pub frozen_dir: PathBuf,
    /// Buckets declared in the metadata store at startup.
    pub metadata_buckets: Vec<String>,
    pub http_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "stratum".into(),
            key_prefix: String::new(),
            scratch_dir: PathBuf::from(".stratum/scratch"),
            frozen_dir: PathBuf::from(".stratum/frozen"),
            metadata_buckets: vec!["dirs".into(), "roots".into(), "leases".into()],
            http_timeout_secs: 30,
        }
    }
}

impl StorageConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> SdkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> SdkResult<String> {
        toml::to_string(self).map_err(|e| SdkError::Config(e.to_string()))
    }

    pub fn validate(&self) -> SdkResult<()> {
        if self.bucket.is_empty() {
            return Err(SdkError::Config("bucket must not be empty".into()));
        }
        KeyLayout::new(&self.key_prefix).map_err(|e| SdkError::Config(e.to_string()))?;
        if self.http_timeout_secs == 0 {
            return Err(SdkError::Config("http_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = StorageConfig::default();
        assert_eq!(c.bucket, "stratum");
        assert_eq!(c.key_prefix, "");
        assert_eq!(c.metadata_buckets, vec!["dirs", "roots", "leases"]);
        assert_eq!(c.http_timeout(), Duration::from_secs(30));
        c.validate().unwrap();
    }

    #[test]
    fn parses_full_document() {
        let c = StorageConfig::from_toml_str(
            r#"
            bucket = "media-store"
            key_prefix = "fs/"
            scratch_dir = "/var/lib/stratum/scratch"
            frozen_dir = "/var/lib/stratum/frozen"
            metadata_buckets = ["dirs"]
            http_timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(c.bucket, "media-store");
        assert_eq!(c.key_prefix, "fs/");
        assert_eq!(c.scratch_dir, PathBuf::from("/var/lib/stratum/scratch"));
        assert_eq!(c.metadata_buckets, vec!["dirs"]);
        assert_eq!(c.http_timeout_secs, 5);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let c = StorageConfig::from_toml_str("bucket = \"b\"").unwrap();
        assert_eq!(c.bucket, "b");
        assert_eq!(c.frozen_dir, StorageConfig::default().frozen_dir);
    }

    #[test]
    fn rejects_prefix_without_slash() {
        let err = StorageConfig::from_toml_str("key_prefix = \"fs\"").unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
    }

    #[test]
    fn rejects_empty_bucket() {
        let err = StorageConfig::from_toml_str("bucket = \"\"").unwrap_err();
        assert!(err.to_string().contains("bucket"));
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(StorageConfig::from_toml_str("bucket = ").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let mut c = StorageConfig::default();
        c.key_prefix = "x/".into();
        let text = c.to_toml_string().unwrap();
        assert_eq!(StorageConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stratum.toml");
        std::fs::write(&path, "bucket = \"disk\"\nkey_prefix = \"a/\"\n").unwrap();
        let c = StorageConfig::load(&path).unwrap();
        assert_eq!(c.bucket, "disk");

        let err = StorageConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, SdkError::Io(_)));
    }
}
