//! High-level Drive/Sheets operations over an authenticated [`Session`].

use std::path::Path;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::auth::{AuthMode, Authenticator};
use crate::config::{ConnectorConfig, DEFAULT_CHUNK_SIZE};
use crate::error::{ConnectorError, Result, TransportError};
use crate::models::{DriveFile, Spreadsheet, UploadMetadata, ValueRange};
use crate::session::{ApiService, HttpSession, Session};

/// Default content type for uploads, both media and metadata.
pub const DEFAULT_MIME_TYPE: &str = "text/plain";

/// Default target format for sheet exports.
pub const DEFAULT_EXPORT_MIME_TYPE: &str = "text/tab-separated-values";

/// Per-call upload parameters.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Remote name; defaults to the local file name.
    pub upload_name: Option<String>,
    /// Destination folder; replaces the connector's default when set.
    pub folder_id: Option<String>,
    /// Content type of the uploaded bytes.
    pub mime_type: String,
    /// `mimeType` stored in the file metadata.
    pub metadata_mime_type: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            upload_name: None,
            folder_id: None,
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            metadata_mime_type: DEFAULT_MIME_TYPE.to_string(),
        }
    }
}

impl UploadOptions {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.upload_name = Some(name.into());
        self
    }

    pub fn folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn metadata_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.metadata_mime_type = mime_type.into();
        self
    }
}

/// Maps a transport failure to the operation's error kind, logging it.
trait OrFail<T> {
    fn or_fail(self, kind: fn(TransportError) -> ConnectorError) -> Result<T>;
}

impl<T> OrFail<T> for std::result::Result<T, TransportError> {
    fn or_fail(self, kind: fn(TransportError) -> ConnectorError) -> Result<T> {
        self.map_err(|e| {
            let err = kind(e);
            warn!(error = %err, "remote call failed");
            err
        })
    }
}

/// `files.list` query matching the children of `folder_id`.
pub(crate) fn parents_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents",
        folder_id.replace('\\', "\\\\").replace('\'', "\\'")
    )
}

/// Remote name for a local path: its final segment, which must be UTF-8.
pub(crate) fn upload_name_for(path: &Path) -> std::result::Result<String, TransportError> {
    let name = path.file_name().unwrap_or(path.as_os_str());
    name.to_str()
        .map(str::to_owned)
        .ok_or_else(|| TransportError::InvalidFileName(path.to_path_buf()))
}

/// Client for one Drive or Sheets session with an optional default folder.
///
/// # Example
///
/// ```no_run
/// use gconnector::{Connector, ConnectorConfig, UploadOptions};
///
/// # async fn run() -> gconnector::Result<()> {
/// let config = ConnectorConfig::new("service-account.json").with_folder("folder-id");
/// let mut drive = Connector::connect(&config)?;
///
/// for file in drive.list_files().await? {
///     println!("{}", file);
/// }
///
/// let id = drive
///     .upload_file("out/report.csv", UploadOptions::default().mime_type("text/csv"))
///     .await?;
/// println!("uploaded {}", id);
/// # Ok(())
/// # }
/// ```
pub struct Connector<S = HttpSession> {
    session: S,
    folder_id: Option<String>,
    chunk_size: u64,
}

impl Connector<HttpSession> {
    /// Authenticate and open a session described by `config`.
    ///
    /// An unsupported `auth_mode` fails with [`ConnectorError::BadAuthMode`]
    /// before the credentials file is touched. Any failure loading
    /// credentials or opening the session is reported as
    /// [`ConnectorError::AuthenticationFailed`].
    pub fn connect(config: &ConnectorConfig) -> Result<Self> {
        let auth_mode: AuthMode = config.auth_mode.parse()?;
        let session = open_session(auth_mode, config).or_fail(ConnectorError::AuthenticationFailed)?;

        info!(
            service = %session.service(),
            version = session.version(),
            folder = ?config.folder_id,
            "Connected"
        );

        Ok(Self {
            session,
            folder_id: config.folder_id.clone(),
            chunk_size: config.chunk_size.max(1),
        })
    }
}

fn open_session(
    auth_mode: AuthMode,
    config: &ConnectorConfig,
) -> std::result::Result<HttpSession, TransportError> {
    let tokens = match auth_mode {
        AuthMode::Service => Authenticator::from_file(&config.credentials_file, config.scopes.as_slice())?,
    };
    let service: ApiService = config.service.parse()?;

    let session = HttpSession::new(tokens, service, config.api_version.clone());
    Ok(match &config.root_url {
        Some(root) => session.with_root_url(root.clone()),
        None => session,
    })
}

impl<S: Session> Connector<S> {
    /// Wrap an already authenticated session.
    pub fn with_session(session: S, folder_id: Option<String>) -> Self {
        Self {
            session,
            folder_id,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Bytes requested per media download round trip.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Default folder used for listings and uploads.
    pub fn folder_id(&self) -> Option<&str> {
        self.folder_id.as_deref()
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// List files in the default folder, or every visible file when unset.
    pub async fn list_files(&self) -> Result<Vec<DriveFile>> {
        let query = self.folder_id.as_deref().map(parents_query);
        let files = self
            .session
            .list_files(query.as_deref())
            .await
            .or_fail(ConnectorError::ListFailed)?;

        debug!(count = files.len(), "Listed files");
        Ok(files)
    }

    /// Upload a local file and return the new file id.
    ///
    /// A folder in `options` becomes the connector's default folder for
    /// later calls.
    pub async fn upload_file<P: AsRef<Path>>(
        &mut self,
        local_path: P,
        options: UploadOptions,
    ) -> Result<String> {
        let local_path = local_path.as_ref();
        if !local_path.exists() {
            return Err(ConnectorError::MissingFile(local_path.to_path_buf()));
        }

        let name = match options.upload_name {
            Some(name) => name,
            None => upload_name_for(local_path).or_fail(ConnectorError::UploadFailed)?,
        };

        if let Some(folder_id) = options.folder_id {
            self.folder_id = Some(folder_id);
        }

        let metadata = UploadMetadata {
            name,
            mime_type: options.metadata_mime_type,
            parents: self.folder_id.iter().cloned().collect(),
        };

        let media = tokio::fs::read(local_path)
            .await
            .map_err(TransportError::from)
            .or_fail(ConnectorError::UploadFailed)?;

        let id = self
            .session
            .create_file(&metadata, Bytes::from(media), &options.mime_type)
            .await
            .or_fail(ConnectorError::UploadFailed)?;

        info!(name = %metadata.name, id = %id, "Uploaded file");
        Ok(id)
    }

    /// Download a binary file's content into memory.
    ///
    /// Native Google documents have no media content; use
    /// [`export_sheet_contents`](Self::export_sheet_contents) for those.
    pub async fn download_file_contents(&self, file_id: &str) -> Result<Bytes> {
        let mut buffer = BytesMut::new();

        loop {
            let offset = buffer.len() as u64;
            let chunk = self
                .session
                .download_chunk(file_id, offset, self.chunk_size)
                .await
                .or_fail(ConnectorError::DownloadFailed)?;

            if chunk.data.is_empty() && !chunk.done {
                return Err(TransportError::StalledDownload { offset })
                    .or_fail(ConnectorError::DownloadFailed);
            }

            buffer.extend_from_slice(&chunk.data);
            debug!(file_id, received = buffer.len(), total = ?chunk.total_size, "Downloaded chunk");

            if chunk.done {
                break;
            }
        }

        Ok(buffer.freeze())
    }

    /// Export a native spreadsheet as tab-separated values.
    pub async fn export_sheet_contents(&self, file_id: &str) -> Result<Bytes> {
        self.export_sheet_contents_as(file_id, DEFAULT_EXPORT_MIME_TYPE)
            .await
    }

    /// Export a native document converted to `export_mime_type`.
    pub async fn export_sheet_contents_as(
        &self,
        file_id: &str,
        export_mime_type: &str,
    ) -> Result<Bytes> {
        self.session
            .export_file(file_id, export_mime_type)
            .await
            .or_fail(ConnectorError::SheetExportFailed)
    }

    /// Read the cell values of `tab_range` (e.g. `Sheet1!A1:D20`) row by row.
    ///
    /// An empty range yields an empty vector.
    pub async fn get_tab_contents(
        &self,
        file_id: &str,
        tab_range: &str,
    ) -> Result<Vec<Vec<serde_json::Value>>> {
        let raw = self
            .session
            .get_values(file_id, tab_range)
            .await
            .or_fail(ConnectorError::SheetExportFailed)?;

        let range: ValueRange = serde_json::from_value(raw)
            .map_err(TransportError::from)
            .or_fail(ConnectorError::SheetExportFailed)?;

        Ok(range.values.unwrap_or_default())
    }

    /// Titles of a spreadsheet's tabs, in display order.
    pub async fn get_tab_names(&self, file_id: &str) -> Result<Vec<String>> {
        let raw = self
            .session
            .get_spreadsheet(file_id)
            .await
            .or_fail(ConnectorError::SheetExportFailed)?;

        let spreadsheet: Spreadsheet = serde_json::from_value(raw)
            .map_err(TransportError::from)
            .or_fail(ConnectorError::SheetExportFailed)?;

        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|sheet| sheet.properties.title)
            .collect())
    }

    /// Move a file between folders. Both arguments take comma-separated ids.
    pub async fn reparent_file(
        &self,
        file_id: &str,
        remove_parents: Option<&str>,
        add_parents: Option<&str>,
    ) -> Result<serde_json::Value> {
        let response = self
            .session
            .update_parents(file_id, remove_parents, add_parents)
            .await
            .or_fail(ConnectorError::ReparentFailed)?;

        info!(file_id, ?remove_parents, ?add_parents, "Reparented file");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents_query() {
        assert_eq!(parents_query("abc123"), "'abc123' in parents");
        assert_eq!(parents_query("o'brien"), "'o\\'brien' in parents");
    }

    #[test]
    fn test_upload_name_for() {
        assert_eq!(upload_name_for(Path::new("a/b/report.csv")).unwrap(), "report.csv");
        assert_eq!(upload_name_for(Path::new("report.csv")).unwrap(), "report.csv");
    }

    #[cfg(unix)]
    #[test]
    fn test_upload_name_for_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new("data").join(OsStr::from_bytes(b"report\xff.csv"));
        let err = upload_name_for(&path).unwrap_err();
        assert!(matches!(err, TransportError::InvalidFileName(p) if p == path));
    }

    #[test]
    fn test_upload_options_defaults() {
        let options = UploadOptions::default();
        assert_eq!(options.mime_type, "text/plain");
        assert_eq!(options.metadata_mime_type, "text/plain");
        assert!(options.upload_name.is_none());

        let options = options.name("x.csv").folder("f1").mime_type("text/csv");
        assert_eq!(options.upload_name.as_deref(), Some("x.csv"));
        assert_eq!(options.folder_id.as_deref(), Some("f1"));
        assert_eq!(options.mime_type, "text/csv");
    }

    #[test]
    fn test_connect_rejects_auth_mode_first() {
        let config = ConnectorConfig::new("/nonexistent/sa.json").with_auth_mode("oauth");
        let err = Connector::connect(&config).err().unwrap();
        assert!(matches!(err, ConnectorError::BadAuthMode(ref mode) if mode == "oauth"));
    }
}
