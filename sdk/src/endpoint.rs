//! Endpoint descriptors.
//!
//! A descriptor is static metadata for one remote operation: path template,
//! verb, parameters and body/response encodings. Descriptors are grouped per
//! service family in a [`ServiceDefinition`] which also holds the default base
//! URL and the API version date.

use std::fmt;

/// HTTP verb of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Where a named parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    /// `{name}` placeholder in the path template.
    Path,
    /// URL query argument.
    Query,
    /// Request header; the parameter name is the header name.
    Header,
    /// Part of a multipart body.
    Form,
}

/// A named operation parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub location: ParamLocation,
    pub required: bool,
}

impl Param {
    pub const fn path(name: &'static str) -> Self {
        Self {
            name,
            location: ParamLocation::Path,
            required: true,
        }
    }

    pub const fn query(name: &'static str) -> Self {
        Self {
            name,
            location: ParamLocation::Query,
            required: false,
        }
    }

    pub const fn required_query(name: &'static str) -> Self {
        Self {
            name,
            location: ParamLocation::Query,
            required: true,
        }
    }

    pub const fn header(name: &'static str) -> Self {
        Self {
            name,
            location: ParamLocation::Header,
            required: false,
        }
    }

    pub const fn form(name: &'static str) -> Self {
        Self {
            name,
            location: ParamLocation::Form,
            required: false,
        }
    }

    pub const fn required_form(name: &'static str) -> Self {
        Self {
            name,
            location: ParamLocation::Form,
            required: true,
        }
    }
}

/// Request body encoding accepted by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    None,
    /// JSON document (`application/json`). Raw bodies with an explicit
    /// content type are accepted too.
    Json,
    /// Raw byte stream with a caller-chosen content type (audio, text).
    Raw,
    /// `multipart/form-data`.
    Multipart,
}

/// Expected response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Binary,
}

/// Transport used by an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// One request, one response.
    Rest,
    /// Persistent WebSocket channel.
    Duplex,
}

/// Static description of one remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub name: &'static str,
    pub method: Method,
    /// Path template, e.g. `/v1/workspaces/{workspace_id}/message` or
    /// `/v1/workspaces/{0}/message`.
    pub path: &'static str,
    pub params: &'static [Param],
    pub body: BodyKind,
    pub body_required: bool,
    pub response: ResponseKind,
    pub kind: EndpointKind,
}

impl EndpointDescriptor {
    /// A bodiless REST operation returning JSON.
    pub const fn rest(
        name: &'static str,
        method: Method,
        path: &'static str,
        params: &'static [Param],
    ) -> Self {
        Self {
            name,
            method,
            path,
            params,
            body: BodyKind::None,
            body_required: false,
            response: ResponseKind::Json,
            kind: EndpointKind::Rest,
        }
    }

    /// A duplex streaming operation.
    pub const fn duplex(name: &'static str, path: &'static str, params: &'static [Param]) -> Self {
        Self {
            name,
            method: Method::Get,
            path,
            params,
            body: BodyKind::None,
            body_required: false,
            response: ResponseKind::Binary,
            kind: EndpointKind::Duplex,
        }
    }

    /// Sets the accepted body encoding.
    pub const fn with_body(mut self, body: BodyKind, required: bool) -> Self {
        self.body = body;
        self.body_required = required;
        self
    }

    /// Marks the response as binary.
    pub const fn binary_response(mut self) -> Self {
        self.response = ResponseKind::Binary;
        self
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// A service family: base URL, version date and its operation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub name: &'static str,
    pub default_url: &'static str,
    /// Sent as `version=<date>` on every call when present.
    pub version: Option<&'static str>,
    pub endpoints: &'static [EndpointDescriptor],
}

impl ServiceDefinition {
    /// Looks up an operation by name.
    pub fn endpoint(&self, name: &str) -> Option<&'static EndpointDescriptor> {
        let endpoints: &'static [EndpointDescriptor] = self.endpoints;
        endpoints.iter().find(|e| e.name == name)
    }

    /// Returns all operation names.
    pub fn operation_names(&self) -> impl Iterator<Item = &'static str> + use<> {
        let endpoints: &'static [EndpointDescriptor] = self.endpoints;
        endpoints.iter().map(|e| e.name)
    }
}
