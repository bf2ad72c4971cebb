//! Multipart deploy body construction.
//!
//! A deploy request carries one `metadata` form field holding
//! [`FunctionDeployMetadata`] as JSON, followed by one `file` part per
//! regular file under the function's source directory. Each file part is
//! named after its path relative to the source directory, with forward
//! slashes on every platform.

use std::fs;
use std::path::{Component, Path, PathBuf};

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ProviderError;

/// Metadata describing how the API should bundle the uploaded files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDeployMetadata {
    /// Entrypoint, relative to the source directory.
    pub entrypoint_path: String,
    /// Import map, relative to the source directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_map_path: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Glob patterns of static assets to ship with the function.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub static_patterns: Vec<String>,
    /// Whether invocations require a valid JWT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_jwt: Option<bool>,
}

impl FunctionDeployMetadata {
    /// Metadata for `entrypoint_path`, normalized to forward slashes.
    pub fn new(entrypoint_path: &str) -> Self {
        Self {
            entrypoint_path: to_slash(entrypoint_path),
            import_map_path: None,
            name: None,
            static_patterns: Vec::new(),
            verify_jwt: None,
        }
    }

    /// Set the import map path, normalized to forward slashes.
    pub fn with_import_map_path(mut self, path: Option<&str>) -> Self {
        self.import_map_path = path.map(to_slash);
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Set JWT verification.
    pub fn with_verify_jwt(mut self, verify_jwt: Option<bool>) -> Self {
        self.verify_jwt = verify_jwt;
        self
    }
}

/// A file found under a function's source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the source directory, forward-slash normalized.
    pub rel_path: String,
    /// Absolute or caller-relative path used to read the file.
    pub path: PathBuf,
}

/// Recursively collect regular files under `source_dir`, sorted by relative path.
///
/// Symbolic links are resolved; a link whose target is missing is an error.
pub fn collect_source_files(source_dir: &Path) -> Result<Vec<SourceFile>, ProviderError> {
    let meta = fs::metadata(source_dir).map_err(|e| source_error(source_dir, e))?;
    if !meta.is_dir() {
        return Err(ProviderError::Validation(format!(
            "Unable to read source directory, got error: {} is not a directory",
            source_dir.display()
        )));
    }

    let mut files = Vec::new();
    walk(source_dir, source_dir, &mut files)?;
    files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(files)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<SourceFile>) -> Result<(), ProviderError> {
    for entry in fs::read_dir(dir).map_err(|e| source_error(dir, e))? {
        let entry = entry.map_err(|e| source_error(dir, e))?;
        let path = entry.path();
        let meta = fs::metadata(&path).map_err(|e| source_error(&path, e))?;

        if meta.is_dir() {
            walk(root, &path, out)?;
        } else if meta.is_file() {
            let rel_path = normalize_path(path.strip_prefix(root).unwrap_or(&path));
            out.push(SourceFile { rel_path, path });
        }
    }
    Ok(())
}

/// Build the multipart body for a deploy call.
pub async fn build_deploy_form(
    metadata: &FunctionDeployMetadata,
    source_dir: &Path,
) -> Result<Form, ProviderError> {
    let metadata_json = serde_json::to_string(metadata)?;
    let metadata_part = Part::text(metadata_json)
        .mime_str("application/json")
        .map_err(|e| ProviderError::request("encode metadata", e))?;
    let mut form = Form::new().part("metadata", metadata_part);

    let root = source_dir.to_path_buf();
    let files = tokio::task::spawn_blocking(move || collect_source_files(&root))
        .await
        .map_err(|e| ProviderError::Io(std::io::Error::other(e)))??;
    debug!(
        source_dir = %source_dir.display(),
        files = files.len(),
        "collected function sources"
    );

    for file in files {
        let contents = tokio::fs::read(&file.path)
            .await
            .map_err(|e| source_error(&file.path, e))?;
        let part = Part::bytes(contents)
            .file_name(file.rel_path)
            .mime_str("application/octet-stream")
            .map_err(|e| ProviderError::request("encode source file", e))?;
        form = form.part("file", part);
    }

    Ok(form)
}

fn source_error(path: &Path, err: std::io::Error) -> ProviderError {
    ProviderError::Io(std::io::Error::new(
        err.kind(),
        format!(
            "Unable to read source directory, got error: {}: {}",
            path.display(),
            err
        ),
    ))
}

fn normalize_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn to_slash(path: &str) -> String {
    if cfg!(windows) {
        path.replace('\\', "/")
    } else {
        path.to_string()
    }
}
