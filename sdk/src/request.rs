//! Request building.
//!
//! [`CallArgs`] collects call-time arguments; [`prepare`] validates them
//! against an [`EndpointDescriptor`] and produces a [`Request`]. Validation
//! runs entirely locally so argument errors surface before any network I/O.

use std::{collections::HashMap, path::Path};

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use url::Url;

use crate::{
    endpoint::{BodyKind, EndpointDescriptor, Method, ParamLocation, ResponseKind},
    error::{Error, Result},
};

/// Returns the audio content type for a file extension (without the dot).
///
/// Unrecognized extensions yield an empty string. Callers sending a body
/// with an empty content type get no `Content-Type` header at all.
pub fn audio_content_type(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        "raw" => "audio/l16",
        "mp3" => "audio/mp3",
        "webm" => "audio/webm",
        _ => "",
    }
}

/// Returns the audio content type for a file path, by extension.
pub fn content_type_for_path(path: impl AsRef<Path>) -> &'static str {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(audio_content_type)
        .unwrap_or("")
}

/// Request body.
#[derive(Debug, Clone, Default)]
pub enum Body {
    #[default]
    Empty,
    /// Serialized JSON document.
    Json(Bytes),
    /// Raw bytes with a content type (possibly empty).
    Raw { data: Bytes, content_type: String },
    Multipart(Multipart),
}

impl Body {
    fn kind_name(&self) -> &'static str {
        match self {
            Body::Empty => "none",
            Body::Json(_) => "json",
            Body::Raw { .. } => "raw",
            Body::Multipart(_) => "multipart",
        }
    }
}

/// A multipart/form-data body.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    parts: Vec<Part>,
}

#[derive(Debug, Clone)]
struct Part {
    name: String,
    content: PartContent,
}

#[derive(Debug, Clone)]
enum PartContent {
    Text(String),
    File {
        file_name: String,
        data: Bytes,
        content_type: String,
    },
}

impl Multipart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(Part {
            name: name.into(),
            content: PartContent::Text(value.into()),
        });
        self
    }

    /// Adds a file part from memory.
    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        self.parts.push(Part {
            name: name.into(),
            content: PartContent::File {
                file_name: file_name.into(),
                data: data.into(),
                content_type: content_type.into(),
            },
        });
        self
    }

    /// Adds a file part read from disk.
    ///
    /// The part content type is chosen by extension; documents fall back to
    /// `application/octet-stream`.
    pub fn file_path(self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let content_type = match content_type_for_path(path) {
            "" => document_content_type(path),
            ct => ct,
        };
        Ok(self.file(name, file_name, data, content_type))
    }

    /// Returns the part names in insertion order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn into_form(self) -> Result<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part.content {
                PartContent::Text(value) => form.text(part.name, value),
                PartContent::File {
                    file_name,
                    data,
                    content_type,
                } => {
                    let mut p = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name);
                    if !content_type.is_empty() {
                        p = p.mime_str(&content_type).map_err(|e| {
                            Error::argument(format!("invalid content type {content_type:?}: {e}"))
                        })?;
                    }
                    form.part(part.name, p)
                }
            };
        }
        Ok(form)
    }
}

fn document_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("json") => "application/json",
        Some("html") | Some("htm") => "text/html",
        Some("txt") => "text/plain",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("zip") => "application/zip",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

/// Call-time arguments for one operation.
///
/// # Example
///
/// ```rust
/// use watson_sdk::CallArgs;
///
/// let args = CallArgs::new()
///     .arg("workspace_id", "abc")
///     .opt("nodes_visited_details", None::<bool>)
///     .json(&serde_json::json!({"input": {"text": "hi"}}))?;
/// # Ok::<(), watson_sdk::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    named: Vec<(String, String)>,
    positional: Vec<String>,
    headers: Vec<(String, String)>,
    body: Body,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a named parameter.
    pub fn arg(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.named.push((name.into(), value.to_string()));
        self
    }

    /// Sets a named parameter if present. Absent values are omitted entirely.
    pub fn opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.arg(name, v),
            None => self,
        }
    }

    /// Appends a positional path argument, consumed by `{0}`, `{1}`, ...
    pub fn positional(mut self, value: impl ToString) -> Self {
        self.positional.push(value.to_string());
        self
    }

    /// Adds an extra request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Body::Json(Bytes::from(serde_json::to_vec(body)?));
        Ok(self)
    }

    /// Sets a raw body with an explicit content type.
    pub fn raw(mut self, data: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.body = Body::Raw {
            data: data.into(),
            content_type: content_type.into(),
        };
        self
    }

    /// Sets a raw body read from a file; the content type follows the
    /// extension (see [`audio_content_type`]).
    pub fn file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Ok(self.raw(data, content_type_for_path(path)))
    }

    /// Sets a multipart body.
    pub fn multipart(mut self, form: Multipart) -> Self {
        self.body = Body::Multipart(form);
        self
    }

    pub fn body(&self) -> &Body {
        &self.body
    }
}

/// A fully resolved request, built fresh per call.
#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Request {
    /// Sets a header, replacing any previous value.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::argument(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::argument(format!("invalid value for header {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Returns a header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Validates `args` against `descriptor` and builds the request.
///
/// Authentication and client identification headers are attached by the
/// caller once validation has passed.
pub fn prepare(
    descriptor: &EndpointDescriptor,
    base_url: &Url,
    version: Option<&str>,
    args: CallArgs,
) -> Result<Request> {
    let CallArgs {
        named,
        positional,
        headers: extra_headers,
        mut body,
    } = args;

    let mut values: HashMap<&str, &str> = HashMap::new();
    for (name, value) in &named {
        if descriptor.param(name).is_none() {
            return Err(Error::argument(format!(
                "{}: unknown parameter {:?}",
                descriptor.name, name
            )));
        }
        values.insert(name.as_str(), value.as_str());
    }

    body = merge_form_args(descriptor, &named, body)?;

    for param in descriptor.params {
        if !param.required {
            continue;
        }
        match param.location {
            ParamLocation::Form => {
                let present = match &body {
                    Body::Multipart(form) => form.part_names().any(|n| n == param.name),
                    _ => false,
                };
                if !present {
                    return Err(Error::argument(format!(
                        "{}: form part {:?} is required",
                        descriptor.name, param.name
                    )));
                }
            }
            _ => match values.get(param.name) {
                Some(v) if !v.is_empty() => {}
                _ => {
                    return Err(Error::argument(format!(
                        "{}: {} must be non-empty",
                        descriptor.name, param.name
                    )));
                }
            },
        }
    }

    check_body(descriptor, &body)?;

    let segments = expand_path(descriptor, &values, &positional)?;
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::argument(format!("base url {base_url} cannot carry a path")))?;
        path.pop_if_empty();
        path.extend(segments.iter().map(|s| s.as_str()));
    }

    let mut query: Vec<(&str, &str)> = descriptor
        .params
        .iter()
        .filter(|p| p.location == ParamLocation::Query)
        .filter_map(|p| values.get(p.name).map(|v| (p.name, *v)))
        .collect();
    if let Some(version) = version {
        query.push(("version", version));
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    let mut request = Request {
        method: descriptor.method,
        url,
        headers: HeaderMap::new(),
        body: Body::Empty,
    };

    if descriptor.response == ResponseKind::Json {
        request.headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    }

    match &body {
        Body::Json(_) => {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        Body::Raw { content_type, .. } if !content_type.is_empty() => {
            request.set_header(CONTENT_TYPE.as_str(), content_type)?;
        }
        _ => {}
    }

    for param in descriptor
        .params
        .iter()
        .filter(|p| p.location == ParamLocation::Header)
    {
        if let Some(value) = values.get(param.name) {
            request.set_header(param.name, value)?;
        }
    }
    for (name, value) in &extra_headers {
        request.set_header(name, value)?;
    }

    request.body = body;
    Ok(request)
}

/// Moves named form-location arguments into the multipart body as text parts.
fn merge_form_args(
    descriptor: &EndpointDescriptor,
    named: &[(String, String)],
    body: Body,
) -> Result<Body> {
    let fields: Vec<&(String, String)> = named
        .iter()
        .filter(|(name, _)| {
            descriptor
                .param(name)
                .is_some_and(|p| p.location == ParamLocation::Form)
        })
        .collect();
    if fields.is_empty() {
        return Ok(body);
    }

    let form = match body {
        Body::Multipart(form) => form,
        Body::Empty if descriptor.body == BodyKind::Multipart => Multipart::new(),
        other => {
            return Err(Error::argument(format!(
                "{}: form parameter {:?} cannot travel with a {} body",
                descriptor.name,
                fields[0].0,
                other.kind_name()
            )));
        }
    };
    let form = fields
        .into_iter()
        .fold(form, |form, (name, value)| form.text(name.as_str(), value.as_str()));
    Ok(Body::Multipart(form))
}

fn check_body(descriptor: &EndpointDescriptor, body: &Body) -> Result<()> {
    let accepted = match (descriptor.body, body) {
        (_, Body::Empty) => {
            if descriptor.body_required {
                return Err(Error::argument(format!(
                    "{}: request body is required",
                    descriptor.name
                )));
            }
            true
        }
        (BodyKind::Json, Body::Json(_) | Body::Raw { .. }) => true,
        (BodyKind::Raw, Body::Raw { .. } | Body::Json(_)) => true,
        (BodyKind::Multipart, Body::Multipart(form)) => !form.is_empty(),
        _ => false,
    };

    if !accepted {
        return Err(Error::argument(format!(
            "{}: {} body not accepted",
            descriptor.name,
            body.kind_name()
        )));
    }
    Ok(())
}

/// Substitutes `{name}` and `{index}` placeholders, returning decoded path
/// segments. Each segment is percent-encoded when pushed onto the URL.
fn expand_path(
    descriptor: &EndpointDescriptor,
    values: &HashMap<&str, &str>,
    positional: &[String],
) -> Result<Vec<String>> {
    let mut segments = Vec::new();

    for raw in descriptor.path.split('/').filter(|s| !s.is_empty()) {
        let mut segment = String::new();
        let mut rest = raw;

        while let Some(start) = rest.find('{') {
            segment.push_str(&rest[..start]);
            let end = rest[start..].find('}').ok_or_else(|| {
                Error::argument(format!(
                    "{}: unterminated placeholder in {:?}",
                    descriptor.name, descriptor.path
                ))
            })? + start;
            let key = &rest[start + 1..end];

            let value = match key.parse::<usize>() {
                Ok(index) => positional.get(index).map(|s| s.as_str()),
                Err(_) => values.get(key).copied(),
            };
            match value {
                Some(v) if !v.is_empty() => segment.push_str(v),
                _ => {
                    return Err(Error::argument(format!(
                        "{}: path argument {{{}}} must be non-empty",
                        descriptor.name, key
                    )));
                }
            }
            rest = &rest[end + 1..];
        }
        segment.push_str(rest);
        // Dot segments would be normalized away and retarget the request.
        if segment == "." || segment == ".." {
            return Err(Error::argument(format!(
                "{}: path argument {:?} is not a valid segment",
                descriptor.name, segment
            )));
        }
        segments.push(segment);
    }

    Ok(segments)
}
