//! Service catalog listing.

use clap::Args;
use serde::Serialize;

use watson_sdk::{
    EndpointDescriptor, ServiceKind,
    endpoint::{BodyKind, EndpointKind, Param, ParamLocation},
};

use super::{output, parse_service};
use crate::Cli;

/// List service families, or the operations of one family.
#[derive(Args)]
pub struct ServicesCommand {
    /// Service name (e.g. text-to-speech, stt, assistant)
    service: Option<String>,
}

#[derive(Serialize)]
struct ServiceSummary {
    name: &'static str,
    url: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'static str>,
    operations: usize,
}

#[derive(Serialize)]
struct OperationSummary {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    required: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    optional: Vec<String>,
    body: &'static str,
    streaming: bool,
}

impl OperationSummary {
    fn new(descriptor: &'static EndpointDescriptor) -> Self {
        let (required, optional): (Vec<_>, Vec<_>) =
            descriptor.params.iter().partition(|p| p.required);
        Self {
            name: descriptor.name,
            method: descriptor.method.as_str(),
            path: descriptor.path,
            required: required.into_iter().map(param_label).collect(),
            optional: optional.into_iter().map(param_label).collect(),
            body: match (descriptor.body, descriptor.body_required) {
                (BodyKind::None, _) => "none",
                (BodyKind::Json, true) => "json (required)",
                (BodyKind::Json, false) => "json",
                (BodyKind::Raw, true) => "raw (required)",
                (BodyKind::Raw, false) => "raw",
                (BodyKind::Multipart, _) => "multipart",
            },
            streaming: descriptor.kind == EndpointKind::Duplex,
        }
    }
}

fn param_label(param: &Param) -> String {
    let location = match param.location {
        ParamLocation::Path => "path",
        ParamLocation::Query => "query",
        ParamLocation::Header => "header",
        ParamLocation::Form => "form",
    };
    format!("{}:{}", location, param.name)
}

impl ServicesCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let out = output(cli);
        match &self.service {
            None => {
                let services: Vec<_> = ServiceKind::ALL
                    .iter()
                    .map(|kind| {
                        let def = kind.definition();
                        ServiceSummary {
                            name: def.name,
                            url: def.default_url,
                            version: def.version,
                            operations: def.endpoints.len(),
                        }
                    })
                    .collect();
                out.write(&services)
            }
            Some(name) => {
                let def = parse_service(name)?.definition();
                let operations: Vec<_> =
                    def.endpoints.iter().map(OperationSummary::new).collect();
                out.write(&operations)
            }
        }
    }
}
