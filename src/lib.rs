//! gconnector - Google Drive and Sheets through a service account.
//!
//! This library provides a [`Connector`] that authenticates once and then:
//! - Lists files in a folder (across shared drives)
//! - Uploads local files with explicit content and metadata types
//! - Downloads binary file content into memory
//! - Exports native spreadsheets (tab-separated values by default)
//! - Reads tab names and cell ranges from spreadsheets
//! - Moves files between folders
//!
//! Every failure is reported as a [`ConnectorError`] naming the operation
//! that failed, with the underlying [`TransportError`] as its source.
//!
//! # Example
//!
//! ```no_run
//! use gconnector::{Connector, ConnectorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sheets = Connector::connect(&ConnectorConfig::sheets("service-account.json"))?;
//!
//!     for tab in sheets.get_tab_names("spreadsheet-id").await? {
//!         let rows = sheets.get_tab_contents("spreadsheet-id", &format!("{}!A1:Z", tab)).await?;
//!         println!("{}: {} rows", tab, rows.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod connector;
pub mod error;
pub mod models;
pub mod session;
pub mod url_parser;

// Re-exports for convenience
pub use auth::{AuthMode, Authenticator, StaticToken, TokenProvider};
pub use config::ConnectorConfig;
pub use connector::{Connector, UploadOptions};
pub use error::{ConnectorError, Result, TransportError};
pub use models::DriveFile;
pub use session::{ApiService, HttpSession, MediaChunk, Session};
pub use url_parser::extract_id;
