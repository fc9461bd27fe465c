//! Response mapping.
//!
//! Every mapped result carries a [`CustomData`] envelope with the raw
//! response headers and body text, on the success path and inside
//! [`Error::Api`] / [`Error::Serialization`] on the failure path.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    error::{Error, Result},
    http::RawResponse,
};

/// Raw response data kept alongside every typed result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomData {
    /// Response headers, lowercase names. Repeated headers are joined with ", ".
    pub headers: BTreeMap<String, String>,

    /// Response body as text. Empty for binary payloads.
    pub raw_body: String,
}

impl CustomData {
    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Parses the raw body as untyped JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.raw_body).ok()
    }
}

/// A typed result together with its status and raw envelope.
#[derive(Debug, Clone)]
pub struct DetailedResponse<T> {
    /// HTTP status code.
    pub status: u16,

    /// Typed payload.
    pub result: T,

    /// Raw headers and body.
    pub custom_data: CustomData,
}

impl<T> DetailedResponse<T> {
    /// Consumes the response, returning only the typed payload.
    pub fn into_result(self) -> T {
        self.result
    }

    /// Maps the typed payload, keeping status and envelope.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DetailedResponse<U> {
        DetailedResponse {
            status: self.status,
            result: f(self.result),
            custom_data: self.custom_data,
        }
    }
}

/// Untyped payload selected by the response content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(serde_json::Value),
    Binary(Bytes),
}

impl Payload {
    /// Returns the JSON value, if this is a JSON payload.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Binary(_) => None,
        }
    }

    /// Returns the bytes, if this is a binary payload.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Payload::Json(_) => None,
            Payload::Binary(b) => Some(b),
        }
    }
}

/// Maps a JSON response into `T`.
///
/// Unknown fields are ignored by the target type's `Deserialize` impl.
/// An empty 2xx body deserializes as JSON `null`.
pub(crate) fn map_json<T>(raw: RawResponse) -> Result<DetailedResponse<T>>
where
    T: DeserializeOwned,
{
    let custom_data = envelope(&raw);
    if !raw.is_success() {
        return Err(map_error(raw.status, custom_data));
    }

    let parsed = if raw.body.is_empty() {
        serde_json::from_slice(b"null")
    } else {
        serde_json::from_slice(&raw.body)
    };

    match parsed {
        Ok(result) => Ok(DetailedResponse {
            status: raw.status,
            result,
            custom_data,
        }),
        Err(source) => Err(Error::Serialization {
            source,
            custom_data: Box::new(custom_data),
        }),
    }
}

/// Maps a binary response without deserializing it.
pub(crate) fn map_bytes(raw: RawResponse) -> Result<DetailedResponse<Bytes>> {
    let custom_data = envelope(&raw);
    if !raw.is_success() {
        return Err(map_error(raw.status, custom_data));
    }

    Ok(DetailedResponse {
        status: raw.status,
        result: raw.body,
        custom_data,
    })
}

/// Maps a response as JSON or bytes depending on its content type.
pub(crate) fn map_payload(raw: RawResponse) -> Result<DetailedResponse<Payload>> {
    if raw.is_success() && !is_textual(raw.content_type()) {
        return map_bytes(raw).map(|r| r.map(Payload::Binary));
    }
    map_json::<serde_json::Value>(raw).map(|r| r.map(Payload::Json))
}

/// Builds an API error from a failed response.
///
/// Accepts `{"error": "...", "code": n}`, `{"error": {"description": ...}}`,
/// `{"message": "..."}` and `{"errors": [{"message": ...}]}`. Anything else
/// falls back to the HTTP status and raw body text.
pub(crate) fn map_error(http_status: u16, custom_data: CustomData) -> Error {
    if let Ok(body) = serde_json::from_str::<ErrorBody>(&custom_data.raw_body) {
        if let Some(message) = body.message() {
            let code = body
                .code
                .or_else(|| body.error.as_ref().and_then(ErrorField::code))
                .unwrap_or(http_status as i64);
            return Error::api(code, message, http_status, custom_data);
        }
    }

    let message = if custom_data.raw_body.is_empty() {
        format!("http status {}", http_status)
    } else {
        custom_data.raw_body.clone()
    };
    Error::api(http_status as i64, message, http_status, custom_data)
}

fn envelope(raw: &RawResponse) -> CustomData {
    let raw_body = if is_textual(raw.content_type()) {
        String::from_utf8_lossy(&raw.body).into_owned()
    } else {
        String::new()
    };

    CustomData {
        headers: raw.headers.clone(),
        raw_body,
    }
}

/// JSON, `text/*`, XML and missing content types are treated as text.
fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.is_empty()
        || ct.contains("json")
        || ct.starts_with("text/")
        || ct.contains("xml")
        || ct.contains("x-www-form-urlencoded")
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<ErrorField>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Detail {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        code: Option<i64>,
    },
}

#[derive(Deserialize)]
struct ErrorItem {
    #[serde(default)]
    message: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        let from_error = match &self.error {
            Some(ErrorField::Text(s)) => Some(s.clone()),
            Some(ErrorField::Detail {
                description,
                message,
                ..
            }) => description.clone().or_else(|| message.clone()),
            None => None,
        };
        from_error
            .or_else(|| self.message.clone())
            .or_else(|| self.errors.iter().find_map(|e| e.message.clone()))
    }
}

impl ErrorField {
    fn code(&self) -> Option<i64> {
        match self {
            ErrorField::Detail { code, .. } => *code,
            ErrorField::Text(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, content_type: &str, body: &[u8]) -> RawResponse {
        let mut headers = BTreeMap::new();
        if !content_type.is_empty() {
            headers.insert("content-type".to_string(), content_type.to_string());
        }
        headers.insert("x-global-transaction-id".to_string(), "tx-1".to_string());
        RawResponse {
            status,
            headers,
            body: Bytes::copy_from_slice(body),
        }
    }

    #[derive(Debug, Deserialize)]
    struct Workspace {
        workspace_id: String,
        name: String,
    }

    #[test]
    fn test_json_success_ignores_unknown_fields() {
        let body = br#"{"workspace_id":"ws-1","name":"demo","learning_opt_out":false}"#;
        let resp: DetailedResponse<Workspace> =
            map_json(raw(200, "application/json; charset=utf-8", body)).unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.result.workspace_id, "ws-1");
        assert_eq!(resp.result.name, "demo");
        assert_eq!(resp.custom_data.raw_body, String::from_utf8_lossy(body));
        assert_eq!(resp.custom_data.header("X-Global-Transaction-Id"), Some("tx-1"));
    }

    #[test]
    fn test_empty_success_body_maps_to_unit() {
        let resp: DetailedResponse<()> = map_json(raw(204, "", b"")).unwrap();
        assert_eq!(resp.status, 204);
    }

    #[test]
    fn test_structured_error_body() {
        let err = map_json::<serde_json::Value>(raw(
            404,
            "application/json",
            br#"{"error":"not found","code":404}"#,
        ))
        .unwrap_err();

        match &err {
            Error::Api {
                code,
                message,
                http_status,
                ..
            } => {
                assert_eq!(*code, 404);
                assert_eq!(message, "not found");
                assert_eq!(*http_status, 404);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(
            err.custom_data().unwrap().raw_body,
            r#"{"error":"not found","code":404}"#
        );
    }

    #[test]
    fn test_nested_error_description() {
        let err = map_error(
            400,
            CustomData {
                raw_body: r#"{"error":{"code":400,"description":"bad image","error_id":"x"}}"#
                    .to_string(),
                ..Default::default()
            },
        );
        match err {
            Error::Api { code, message, .. } => {
                assert_eq!(code, 400);
                assert_eq!(message, "bad image");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_errors_array_uses_http_status_code() {
        let err = map_error(
            409,
            CustomData {
                raw_body: r#"{"errors":[{"message":"conflict"}]}"#.to_string(),
                ..Default::default()
            },
        );
        match err {
            Error::Api { code, message, .. } => {
                assert_eq!(code, 409);
                assert_eq!(message, "conflict");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unparseable_error_falls_back_to_raw_text() {
        let err = map_json::<serde_json::Value>(raw(502, "text/html", b"<html>bad gateway</html>"))
            .unwrap_err();
        match &err {
            Error::Api { code, message, .. } => {
                assert_eq!(*code, 502);
                assert_eq!(message, "<html>bad gateway</html>");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_server_error());
    }

    #[test]
    fn test_malformed_success_body_keeps_envelope() {
        let err = map_json::<Workspace>(raw(200, "application/json", br#"{"name":1}"#)).unwrap_err();
        match &err {
            Error::Serialization { custom_data, .. } => {
                assert_eq!(custom_data.raw_body, r#"{"name":1}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_binary_payload_not_deserialized() {
        let audio = [0x52, 0x49, 0x46, 0x46, 0x00, 0xff];
        let resp = map_payload(raw(200, "audio/wav", &audio)).unwrap();
        assert_eq!(resp.result.as_bytes().unwrap().as_ref(), &audio);
        assert!(resp.custom_data.raw_body.is_empty());
        assert_eq!(resp.custom_data.header("content-type"), Some("audio/wav"));

        let resp = map_payload(raw(200, "application/json", br#"{"voices":[]}"#)).unwrap();
        assert_eq!(
            resp.result.as_json().unwrap(),
            &serde_json::json!({"voices": []})
        );
    }
}
