//! gconnector CLI - Google Drive and Sheets from the command line.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glob::glob;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use gconnector::auth::{DRIVE_READONLY_SCOPE, DRIVE_SCOPE, SPREADSHEETS_READONLY_SCOPE};
use gconnector::config::DEFAULT_CHUNK_SIZE;
use gconnector::connector::{DEFAULT_EXPORT_MIME_TYPE, DEFAULT_MIME_TYPE};
use gconnector::{extract_id, Connector, ConnectorConfig, Session, UploadOptions};

/// CLI tool for Google Drive and Sheets via a service account.
#[derive(Parser)]
#[command(name = "gconnector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to service account JSON credentials file.
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    credentials: PathBuf,

    /// Authentication mode.
    #[arg(long, default_value = "service")]
    auth_mode: String,

    /// Default folder URL or ID for listing and uploads.
    #[arg(long, env = "GCONNECTOR_FOLDER_ID")]
    folder_id: Option<String>,

    /// OAuth scopes, comma-separated (defaults depend on the command).
    #[arg(long, env = "GCONNECTOR_SCOPES", value_delimiter = ',')]
    scopes: Vec<String>,

    /// API to talk to (`drive` or `sheets`; defaults depend on the command).
    #[arg(long, env = "GCONNECTOR_SERVICE")]
    service: Option<String>,

    /// API version (defaults to v3 for drive, v4 for sheets).
    #[arg(long, env = "GCONNECTOR_API_VERSION")]
    api_version: Option<String>,

    /// Bytes per download request.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List files in the default folder (or everything visible).
    List,

    /// Upload files (supports glob patterns like *.csv, file_{1,2,3}.txt).
    Upload {
        #[arg(required = true)]
        patterns: Vec<String>,

        /// Destination folder URL or ID; becomes the default for later files.
        #[arg(long, short = 't')]
        to: Option<String>,

        /// Remote name (single file only).
        #[arg(long)]
        name: Option<String>,

        /// Content type of the uploaded bytes (guessed from the extension if omitted).
        #[arg(long)]
        mime_type: Option<String>,

        /// mimeType stored in the file metadata.
        #[arg(long, default_value = DEFAULT_MIME_TYPE)]
        metadata_mime_type: String,
    },

    /// Download a binary file's content.
    Download {
        /// File URL or ID.
        file: String,

        /// Output path (stdout if omitted).
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Export a native spreadsheet.
    Export {
        /// Spreadsheet URL or ID.
        file: String,

        /// Target format.
        #[arg(long, default_value = DEFAULT_EXPORT_MIME_TYPE)]
        mime_type: String,

        /// Output path (stdout if omitted).
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Print the tab names of a spreadsheet.
    Tabs {
        /// Spreadsheet URL or ID.
        file: String,
    },

    /// Print a cell range as tab-separated rows.
    Values {
        /// Spreadsheet URL or ID.
        file: String,

        /// Range such as `Sheet1!A1:D20`.
        range: String,
    },

    /// Move a file between folders.
    Reparent {
        /// File URL or ID.
        file: String,

        /// Folder IDs to remove, comma-separated.
        #[arg(long)]
        remove: Option<String>,

        /// Folder IDs to add, comma-separated.
        #[arg(long)]
        add: Option<String>,
    },
}

impl Commands {
    fn uses_sheets_api(&self) -> bool {
        matches!(self, Commands::Tabs { .. } | Commands::Values { .. })
    }

    fn is_read_only(&self) -> bool {
        !matches!(self, Commands::Upload { .. } | Commands::Reparent { .. })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = build_config(&cli)?;
    let mut connector = Connector::connect(&config)
        .with_context(|| format!("Failed to connect with credentials {:?}", cli.credentials))?;

    match cli.command {
        Commands::List => {
            let files = connector.list_files().await.context("Failed to list files")?;

            if files.is_empty() {
                println!("No files found.");
            } else {
                println!("{:<44} {:<44} {}", "ID", "PARENTS", "NAME");
                println!("{}", "-".repeat(100));
                for file in files {
                    println!("{}", file);
                }
            }
        }

        Commands::Upload {
            patterns,
            to,
            name,
            mime_type,
            metadata_mime_type,
        } => {
            let files_to_upload = expand_patterns(&patterns)?;
            if name.is_some() && files_to_upload.len() > 1 {
                anyhow::bail!("--name can only be used with a single file");
            }

            let folder = to
                .map(|to| extract_id(&to).with_context(|| format!("Invalid folder URL or ID: {}", to)))
                .transpose()?;

            let batch = UploadBatch {
                folder,
                name,
                mime_type,
                metadata_mime_type,
            };
            upload_all(&mut connector, &files_to_upload, batch).await?;
        }

        Commands::Download { file, out } => {
            let file_id = parse_id(&file)?;
            let data = connector
                .download_file_contents(&file_id)
                .await
                .with_context(|| format!("Failed to download file: {}", file_id))?;
            write_output(out.as_deref(), &data)?;
        }

        Commands::Export {
            file,
            mime_type,
            out,
        } => {
            let file_id = parse_id(&file)?;
            let data = connector
                .export_sheet_contents_as(&file_id, &mime_type)
                .await
                .with_context(|| format!("Failed to export file: {}", file_id))?;
            write_output(out.as_deref(), &data)?;
        }

        Commands::Tabs { file } => {
            let file_id = parse_id(&file)?;
            let tabs = connector
                .get_tab_names(&file_id)
                .await
                .with_context(|| format!("Failed to read tabs of {}", file_id))?;
            for tab in tabs {
                println!("{}", tab);
            }
        }

        Commands::Values { file, range } => {
            let file_id = parse_id(&file)?;
            let rows = connector
                .get_tab_contents(&file_id, &range)
                .await
                .with_context(|| format!("Failed to read {} from {}", range, file_id))?;
            for row in rows {
                println!("{}", format_row(&row));
            }
        }

        Commands::Reparent { file, remove, add } => {
            let file_id = parse_id(&file)?;
            let response = connector
                .reparent_file(&file_id, remove.as_deref(), add.as_deref())
                .await
                .with_context(|| format!("Failed to move file: {}", file_id))?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "gconnector=debug" } else { "gconnector=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Settings shared by every file in one `upload` invocation.
struct UploadBatch {
    folder: Option<String>,
    name: Option<String>,
    mime_type: Option<String>,
    metadata_mime_type: String,
}

/// Upload each file in turn, failing afterwards if any upload failed.
async fn upload_all<S: Session>(
    connector: &mut Connector<S>,
    files: &[PathBuf],
    mut batch: UploadBatch,
) -> Result<()> {
    eprintln!("Uploading {} file(s)...", files.len());

    let mut failed = 0usize;
    for (idx, file_path) in files.iter().enumerate() {
        let mut options = UploadOptions::default()
            .mime_type(batch.mime_type.clone().unwrap_or_else(|| guess_mime_type(file_path)))
            .metadata_mime_type(batch.metadata_mime_type.clone());
        if let Some(name) = &batch.name {
            options = options.name(name.clone());
        }
        // Only the first upload needs the folder; it sticks as the default.
        if let Some(folder) = batch.folder.take() {
            options = options.folder(folder);
        }

        eprint!("[{}/{}] Uploading {}... ", idx + 1, files.len(), file_path.display());
        match connector.upload_file(file_path, options).await {
            Ok(id) => eprintln!("OK ({})", id),
            Err(e) => {
                failed += 1;
                eprintln!("FAILED");
                eprintln!("  Error: {}", e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} upload(s) failed", failed, files.len());
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<ConnectorConfig> {
    let sheets = cli.command.uses_sheets_api();

    let base = if sheets {
        ConnectorConfig::sheets(&cli.credentials)
    } else {
        ConnectorConfig::new(&cli.credentials)
    };
    let mut config = base
        .with_auth_mode(cli.auth_mode.clone())
        .with_scopes(default_scopes(&cli.scopes, sheets, cli.command.is_read_only()));

    if let Some(service) = &cli.service {
        config.service = service.clone();
    }
    if let Some(version) = &cli.api_version {
        config.api_version = version.clone();
    }
    if let Some(folder) = &cli.folder_id {
        config.folder_id = Some(parse_id(folder)?);
    }
    config.chunk_size = cli.chunk_size;

    Ok(config)
}

fn default_scopes(scopes: &[String], sheets: bool, read_only: bool) -> Vec<String> {
    if !scopes.is_empty() {
        return scopes.to_vec();
    }
    let scope = match (sheets, read_only) {
        (true, _) => SPREADSHEETS_READONLY_SCOPE,
        (false, true) => DRIVE_READONLY_SCOPE,
        (false, false) => DRIVE_SCOPE,
    };
    vec![scope.to_string()]
}

fn parse_id(url_or_id: &str) -> Result<String> {
    extract_id(url_or_id).with_context(|| format!("Invalid URL or ID: {}", url_or_id))
}

fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string()
}

fn write_output(out: Option<&Path>, data: &[u8]) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, data).with_context(|| format!("Failed to write {:?}", path))?;
            eprintln!("Saved {} bytes to {:?}", data.len(), path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(data)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn format_row(row: &[serde_json::Value]) -> String {
    row.iter()
        .map(|cell| match cell {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\t")
}

/// Expand glob and brace patterns into a sorted, de-duplicated file list.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        for expanded_pattern in expand_braces(pattern) {
            let matches: Vec<PathBuf> = glob(&expanded_pattern)
                .with_context(|| format!("Invalid glob pattern: {}", expanded_pattern))?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file())
                .collect();

            if matches.is_empty() {
                // Keep the literal path so the connector reports it as missing.
                warn!(pattern = %expanded_pattern, "No files matched pattern");
                files.push(PathBuf::from(&expanded_pattern));
            } else {
                files.extend(matches);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

/// Expand brace patterns like file_{1,2,3}.txt into multiple patterns.
fn expand_braces(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];

            return pattern[start + 1..end]
                .split(',')
                .flat_map(|alt| expand_braces(&format!("{}{}{}", prefix, alt.trim(), suffix)))
                .collect();
        }
    }

    vec![pattern.to_string()]
}
