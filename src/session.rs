//! Authenticated handle to the Drive or Sheets REST API.
//!
//! [`Session`] is the boundary the [`Connector`](crate::Connector) talks
//! through: one method per remote call, returning raw [`TransportError`]s.
//! [`HttpSession`] implements it over reqwest.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, RANGE};
use reqwest::{Client, Response, StatusCode, Url};
use tracing::debug;

use crate::auth::TokenProvider;
use crate::error::TransportError;
use crate::models::{ApiErrorResponse, CreatedFile, DriveFile, FileListResponse, UploadMetadata};

/// Root URL for the Drive API.
const DRIVE_ROOT: &str = "https://www.googleapis.com";

/// Root URL for the Sheets API.
const SHEETS_ROOT: &str = "https://sheets.googleapis.com";

/// Fields requested from files.list.
const LIST_FIELDS: &str = "nextPageToken,files(id,parents,name)";

/// Boundary used for multipart/related uploads.
const MULTIPART_BOUNDARY: &str = "gconnector_multipart_boundary";

/// Remote API a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiService {
    Drive,
    Sheets,
}

impl ApiService {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiService::Drive => "drive",
            ApiService::Sheets => "sheets",
        }
    }

    fn default_root(&self) -> &'static str {
        match self {
            ApiService::Drive => DRIVE_ROOT,
            ApiService::Sheets => SHEETS_ROOT,
        }
    }
}

impl FromStr for ApiService {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "drive" => Ok(ApiService::Drive),
            "sheets" => Ok(ApiService::Sheets),
            other => Err(TransportError::UnknownService(other.to_string())),
        }
    }
}

impl fmt::Display for ApiService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of a ranged media download.
#[derive(Debug, Clone, Default)]
pub struct MediaChunk {
    pub data: Bytes,
    /// Total object size, when the server reported it.
    pub total_size: Option<u64>,
    /// No more chunks follow.
    pub done: bool,
}

/// Remote calls a connector can issue.
#[async_trait]
pub trait Session: Send + Sync {
    /// files.list across all drives, optionally filtered by a `q` expression.
    async fn list_files(&self, query: Option<&str>) -> Result<Vec<DriveFile>, TransportError>;

    /// Non-resumable files.create with metadata and media; returns the new id.
    async fn create_file(
        &self,
        metadata: &UploadMetadata,
        media: Bytes,
        media_mime_type: &str,
    ) -> Result<String, TransportError>;

    /// files.get?alt=media for `len` bytes starting at `offset`.
    async fn download_chunk(
        &self,
        file_id: &str,
        offset: u64,
        len: u64,
    ) -> Result<MediaChunk, TransportError>;

    /// files.export of a native document.
    async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<Bytes, TransportError>;

    /// spreadsheets.values.get, raw response.
    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<serde_json::Value, TransportError>;

    /// spreadsheets.get, raw response.
    async fn get_spreadsheet(&self, spreadsheet_id: &str)
        -> Result<serde_json::Value, TransportError>;

    /// files.update moving a file between parents, raw response.
    async fn update_parents(
        &self,
        file_id: &str,
        remove_parents: Option<&str>,
        add_parents: Option<&str>,
    ) -> Result<serde_json::Value, TransportError>;
}

/// reqwest-backed session for a single API and version.
pub struct HttpSession {
    service: ApiService,
    version: String,
    root: String,
    tokens: Arc<dyn TokenProvider>,
    http: Client,
}

impl HttpSession {
    /// Open a session for `service` at `version` (e.g. `drive`/`v3`).
    pub fn new<T>(tokens: T, service: ApiService, version: impl Into<String>) -> Self
    where
        T: TokenProvider + 'static,
    {
        Self {
            service,
            version: version.into(),
            root: service.default_root().to_string(),
            tokens: Arc::new(tokens),
            http: Client::new(),
        }
    }

    /// Send requests to `root` instead of the public Google endpoint.
    pub fn with_root_url(mut self, root: impl Into<String>) -> Self {
        self.root = root.into().trim_end_matches('/').to_string();
        self
    }

    pub fn service(&self) -> ApiService {
        self.service
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn require(&self, expected: ApiService) -> Result<(), TransportError> {
        if self.service == expected {
            Ok(())
        } else {
            Err(TransportError::WrongService {
                expected: expected.as_str(),
                actual: self.service.as_str(),
            })
        }
    }

    /// Build `<root>/<prefix...>/<version>/<segments...>`, escaping each segment.
    fn endpoint(&self, upload: bool, segments: &[&str]) -> Result<Url, TransportError> {
        let mut url = Url::parse(&self.root)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", self.root, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| TransportError::InvalidUrl(self.root.clone()))?;
            path.pop_if_empty();
            if upload {
                path.push("upload");
            }
            if self.service == ApiService::Drive {
                path.push("drive");
            }
            path.push(&self.version);
            path.extend(segments);
        }
        Ok(url)
    }

    async fn token(&self) -> Result<String, TransportError> {
        self.tokens.access_token().await
    }
}

/// Turn a non-2xx response into an API error, preferring Google's error envelope.
async fn check_response(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return Err(TransportError::Api {
            status: api_error.error.code,
            message: api_error.error.message,
        });
    }
    Err(TransportError::Api {
        status: status.as_u16(),
        message: error_body,
    })
}

async fn read_body(response: Response) -> Result<Bytes, TransportError> {
    let mut data = BytesMut::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        data.extend_from_slice(&chunk?);
    }
    Ok(data.freeze())
}

/// Parsed `Content-Range` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ContentRange {
    /// Inclusive byte range, absent for `bytes */<total>`.
    pub range: Option<(u64, u64)>,
    pub total: Option<u64>,
}

pub(crate) fn parse_content_range(value: &str) -> Option<ContentRange> {
    let rest = value.trim().strip_prefix("bytes ")?;
    let (range, total) = rest.split_once('/')?;

    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse().ok()?),
    };
    let range = match range.trim() {
        "*" => None,
        r => {
            let (start, end) = r.split_once('-')?;
            Some((start.parse().ok()?, end.parse().ok()?))
        }
    };

    Some(ContentRange { range, total })
}

/// Assemble a `multipart/related` body: JSON metadata part then media part.
pub(crate) fn multipart_related_body(
    boundary: &str,
    metadata_json: &str,
    media: &[u8],
    media_mime_type: &str,
) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + metadata_json.len() + 256);

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", media_mime_type).as_bytes());
    body.extend_from_slice(media);
    body.extend_from_slice(b"\r\n");

    body.extend_from_slice(format!("--{}--", boundary).as_bytes());
    body
}

#[async_trait]
impl Session for HttpSession {
    async fn list_files(&self, query: Option<&str>) -> Result<Vec<DriveFile>, TransportError> {
        self.require(ApiService::Drive)?;
        let token = self.token().await?;
        let url = self.endpoint(false, &["files"])?;
        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            debug!(?query, page = ?page_token, "files.list");
            let mut request = self.http.get(url.clone()).bearer_auth(&token).query(&[
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
                ("fields", LIST_FIELDS),
            ]);

            if let Some(q) = query {
                request = request.query(&[("q", q)]);
            }
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = check_response(request.send().await?).await?;
            let list_response: FileListResponse = response.json().await?;
            all_files.extend(list_response.files);

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(all_files)
    }

    async fn create_file(
        &self,
        metadata: &UploadMetadata,
        media: Bytes,
        media_mime_type: &str,
    ) -> Result<String, TransportError> {
        self.require(ApiService::Drive)?;
        let token = self.token().await?;
        let url = self.endpoint(true, &["files"])?;

        let metadata_json = serde_json::to_string(metadata)?;
        let body = multipart_related_body(MULTIPART_BOUNDARY, &metadata_json, &media, media_mime_type);

        debug!(name = %metadata.name, bytes = media.len(), "files.create");
        let response = self
            .http
            .post(url)
            .bearer_auth(&token)
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", "id"),
            ])
            .body(body)
            .send()
            .await?;

        let created: CreatedFile = check_response(response).await?.json().await?;
        Ok(created.id)
    }

    async fn download_chunk(
        &self,
        file_id: &str,
        offset: u64,
        len: u64,
    ) -> Result<MediaChunk, TransportError> {
        self.require(ApiService::Drive)?;
        let token = self.token().await?;
        let url = self.endpoint(false, &["files", file_id])?;
        let last = offset.saturating_add(len.max(1) - 1);

        debug!(file_id, offset, last, "files.get alt=media");
        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .header(RANGE, format!("bytes={}-{}", offset, last))
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;

        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);

        // Empty objects cannot satisfy any range.
        let empty = ContentRange {
            range: None,
            total: Some(0),
        };
        if response.status() == StatusCode::RANGE_NOT_SATISFIABLE && content_range == Some(empty) {
            return Ok(MediaChunk {
                data: Bytes::new(),
                total_size: Some(0),
                done: true,
            });
        }

        let response = check_response(response).await?;
        let partial = response.status() == StatusCode::PARTIAL_CONTENT;
        let data = read_body(response).await?;

        if !partial {
            let total = offset + data.len() as u64;
            return Ok(MediaChunk {
                data,
                total_size: Some(total),
                done: true,
            });
        }

        let range = content_range.and_then(|r| r.range);
        if let Some((start, _)) = range {
            if start != offset {
                return Err(TransportError::MalformedResponse(format!(
                    "requested bytes from {} but received a range starting at {}",
                    offset, start
                )));
            }
        }

        let total = content_range.and_then(|r| r.total);
        let done = match (range, total) {
            (Some((_, end)), Some(total)) => end.saturating_add(1) >= total,
            _ => (data.len() as u64) < len,
        };
        Ok(MediaChunk {
            data,
            total_size: total,
            done,
        })
    }

    async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<Bytes, TransportError> {
        self.require(ApiService::Drive)?;
        let token = self.token().await?;
        let url = self.endpoint(false, &["files", file_id, "export"])?;

        debug!(file_id, mime_type, "files.export");
        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .query(&[("mimeType", mime_type)])
            .send()
            .await?;

        read_body(check_response(response).await?).await
    }

    async fn get_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<serde_json::Value, TransportError> {
        self.require(ApiService::Sheets)?;
        let token = self.token().await?;
        let url = self.endpoint(false, &["spreadsheets", spreadsheet_id, "values", range])?;

        debug!(spreadsheet_id, range, "spreadsheets.values.get");
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn get_spreadsheet(
        &self,
        spreadsheet_id: &str,
    ) -> Result<serde_json::Value, TransportError> {
        self.require(ApiService::Sheets)?;
        let token = self.token().await?;
        let url = self.endpoint(false, &["spreadsheets", spreadsheet_id])?;

        debug!(spreadsheet_id, "spreadsheets.get");
        let response = self.http.get(url).bearer_auth(&token).send().await?;
        Ok(check_response(response).await?.json().await?)
    }

    async fn update_parents(
        &self,
        file_id: &str,
        remove_parents: Option<&str>,
        add_parents: Option<&str>,
    ) -> Result<serde_json::Value, TransportError> {
        self.require(ApiService::Drive)?;
        let token = self.token().await?;
        let url = self.endpoint(false, &["files", file_id])?;

        debug!(file_id, ?remove_parents, ?add_parents, "files.update");
        let mut request = self
            .http
            .patch(url)
            .bearer_auth(&token)
            .query(&[("supportsAllDrives", "true")])
            .json(&serde_json::json!({}));

        if let Some(remove) = remove_parents {
            request = request.query(&[("removeParents", remove)]);
        }
        if let Some(add) = add_parents {
            request = request.query(&[("addParents", add)]);
        }

        Ok(check_response(request.send().await?).await?.json().await?)
    }
}
