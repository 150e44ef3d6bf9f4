//! Connector construction parameters.

use std::path::PathBuf;

use serde::Deserialize;

use crate::auth::DRIVE_SCOPE;

/// Default chunk size for media downloads (100 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 100 * 1024 * 1024;

/// Everything needed to open a [`Connector`](crate::Connector).
///
/// `auth_mode` and `service` stay strings here so that a bad value is
/// reported by [`Connector::connect`](crate::Connector::connect) with the
/// right error kind.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    pub auth_mode: String,
    pub folder_id: Option<String>,
    pub credentials_file: PathBuf,
    pub scopes: Vec<String>,
    pub service: String,
    pub api_version: String,
    /// Alternate API root, e.g. a local emulator.
    pub root_url: Option<String>,
    pub chunk_size: u64,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            auth_mode: "service".to_string(),
            folder_id: None,
            credentials_file: PathBuf::new(),
            scopes: vec![DRIVE_SCOPE.to_string()],
            service: "drive".to_string(),
            api_version: "v3".to_string(),
            root_url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ConnectorConfig {
    /// Drive v3 with full Drive scope, authenticated by `credentials_file`.
    pub fn new(credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: credentials_file.into(),
            ..Self::default()
        }
    }

    /// Sheets v4, authenticated by `credentials_file`.
    pub fn sheets(credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: credentials_file.into(),
            service: "sheets".to_string(),
            api_version: "v4".to_string(),
            ..Self::default()
        }
    }

    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_auth_mode(mut self, auth_mode: impl Into<String>) -> Self {
        self.auth_mode = auth_mode.into();
        self
    }

    pub fn with_root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = Some(root_url.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectorConfig::new("sa.json");
        assert_eq!(config.auth_mode, "service");
        assert_eq!(config.service, "drive");
        assert_eq!(config.api_version, "v3");
        assert_eq!(config.scopes, vec![DRIVE_SCOPE.to_string()]);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(config.folder_id.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ConnectorConfig = serde_json::from_str(
            r#"{"credentials_file": "/etc/sa.json", "service": "sheets", "api_version": "v4"}"#,
        )
        .unwrap();

        assert_eq!(config.credentials_file, PathBuf::from("/etc/sa.json"));
        assert_eq!(config.service, "sheets");
        assert_eq!(config.auth_mode, "service");
    }

    #[test]
    fn test_sheets_preset() {
        let config = ConnectorConfig::sheets("sa.json").with_folder("f1");
        assert_eq!(config.service, "sheets");
        assert_eq!(config.api_version, "v4");
        assert_eq!(config.folder_id.as_deref(), Some("f1"));
    }
}
