//! Request file loading.
//!
//! A request file describes one call in YAML or JSON:
//!
//! ```yaml
//! service: assistant
//! operation: message
//! args:
//!   workspace_id: 9f2c
//! body:
//!   input:
//!     text: hello
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Error type for request loading.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to read file: {0}")]
    ReadFile(#[from] io::Error),
    #[error("failed to parse YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON: {0}")]
    ParseJson(#[from] serde_json::Error),
    #[error("failed to parse file (tried YAML and JSON)")]
    ParseFailed,
    #[error("invalid argument {0:?}, expected key=value")]
    InvalidArgument(String),
}

/// One call described in a file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RequestFile {
    pub service: Option<String>,
    pub operation: Option<String>,
    /// Named parameters. Non-string scalars are passed in their JSON form.
    pub args: BTreeMap<String, serde_json::Value>,
    /// Positional path arguments.
    pub positional: Vec<String>,
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    pub body: Option<serde_json::Value>,
    /// Path of a raw body file; its content type follows the extension.
    pub upload: Option<String>,
}

impl RequestFile {
    /// Returns the named arguments as strings.
    pub fn string_args(&self) -> Vec<(String, String)> {
        self.args
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), value_to_arg(v)))
            .collect()
    }
}

fn value_to_arg(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Loads a request from a YAML or JSON file. `-` reads stdin.
pub fn load_request<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, RequestError> {
    let path = path.as_ref();
    if path == Path::new("-") {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        return parse_request(&data, path);
    }
    let data = fs::read(path)?;
    parse_request(&data, path)
}

/// Parses request data based on file extension, or by trying YAML then JSON.
pub fn parse_request<T: DeserializeOwned>(
    data: &[u8],
    path: impl AsRef<Path>,
) -> Result<T, RequestError> {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("yaml") | Some("yml") => Ok(serde_yaml::from_slice(data)?),
        Some("json") => Ok(serde_json::from_slice(data)?),
        _ => {
            if let Ok(v) = serde_yaml::from_slice(data) {
                return Ok(v);
            }
            if let Ok(v) = serde_json::from_slice(data) {
                return Ok(v);
            }
            Err(RequestError::ParseFailed)
        }
    }
}

/// Splits a `key=value` command line argument. The value may contain `=`.
pub fn parse_key_value(arg: &str) -> Result<(String, String), RequestError> {
    match arg.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(RequestError::InvalidArgument(arg.to_string())),
    }
}
