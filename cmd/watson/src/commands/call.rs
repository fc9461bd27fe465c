//! Generic operation call.

use clap::Args;
use serde_json::json;

use watson_cli::{RequestFile, guess_extension, load_request, parse_key_value};
use watson_sdk::{CallArgs, Multipart, Payload, endpoint::EndpointKind};

use super::{create_client, format_bytes, output, parse_service, print_success, print_verbose};
use crate::Cli;

/// Call any operation of any service family.
///
/// Arguments given on the command line override those from the request file
/// given with -f. JSON responses are printed (or written to -o); binary
/// responses such as synthesized audio are written to -o, or to
/// `<operation>.<ext>` when no output file is given.
///
/// Example:
///   watson call assistant message -a workspace_id=9f2c --body '{"input":{"text":"hi"}}'
#[derive(Args)]
pub struct CallCommand {
    /// Service name (e.g. assistant, tts, discovery)
    service: Option<String>,

    /// Operation name (see `watson services <service>`)
    operation: Option<String>,

    /// Named parameter as key=value (repeatable)
    #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE")]
    args: Vec<String>,

    /// Positional path argument (repeatable)
    #[arg(short = 'p', long = "positional", value_name = "VALUE")]
    positional: Vec<String>,

    /// Extra request header as name=value (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME=VALUE")]
    headers: Vec<String>,

    /// Inline JSON body
    #[arg(long, conflicts_with = "upload")]
    body: Option<String>,

    /// Raw body file; the content type follows the extension
    #[arg(long, value_name = "PATH")]
    upload: Option<String>,

    /// Multipart part as name=value or name=@path (repeatable)
    #[arg(
        short = 'F',
        long = "form",
        value_name = "NAME=VALUE",
        conflicts_with_all = ["body", "upload"]
    )]
    form: Vec<String>,

    /// Print the request instead of sending it
    #[arg(long)]
    dry_run: bool,
}

impl CallCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let file: RequestFile = match cli.input.as_deref() {
            Some(path) => load_request(path)?,
            None => RequestFile::default(),
        };

        let service_name = self
            .service
            .clone()
            .or(file.service.clone())
            .ok_or_else(|| anyhow::anyhow!("service is required"))?;
        let operation = self
            .operation
            .clone()
            .or(file.operation.clone())
            .ok_or_else(|| anyhow::anyhow!("operation is required"))?;
        let kind = parse_service(&service_name)?;

        let client = create_client(cli, kind)?;
        let service = client.service(kind);
        if service.descriptor(&operation)?.kind == EndpointKind::Duplex {
            anyhow::bail!(
                "{}.{} is a streaming operation, use `watson synthesize --stream`",
                kind,
                operation
            );
        }

        let args = self.build_args(&file)?;

        if self.dry_run {
            let request = service.build_request(&operation, args)?;
            let headers: serde_json::Map<_, _> = request
                .headers
                .iter()
                .map(|(k, v)| (k.to_string(), json!(v.to_str().unwrap_or("<binary>"))))
                .collect();
            return output(cli).write(&json!({
                "method": request.method.to_string(),
                "url": request.url.as_str(),
                "headers": headers,
            }));
        }

        print_verbose(cli, &format!("Calling {}.{}", kind, operation));
        let resp = service.call_payload(&operation, args).await?;
        print_verbose(cli, &format!("Status: {}", resp.status));

        match resp.result {
            Payload::Json(value) => output(cli).write(&value),
            Payload::Binary(data) => {
                let path = match cli.output.clone() {
                    Some(path) => path,
                    None => {
                        let content_type = resp.custom_data.header("content-type").unwrap_or("");
                        format!("{}.{}", operation, guess_extension(content_type))
                    }
                };
                output(cli).write_binary(&data, &path)?;
                print_success(&format!("Wrote {} to {}", format_bytes(data.len()), path));
                Ok(())
            }
        }
    }

    /// Merges the request file with command line flags into call arguments.
    fn build_args(&self, file: &RequestFile) -> anyhow::Result<CallArgs> {
        let mut args = CallArgs::new();

        let mut named = file.string_args();
        for entry in &self.args {
            let (key, value) = parse_key_value(entry)?;
            named.retain(|(k, _)| k != &key);
            named.push((key, value));
        }
        for (key, value) in named {
            args = args.arg(key, value);
        }

        let positional = if self.positional.is_empty() {
            &file.positional
        } else {
            &self.positional
        };
        for value in positional {
            args = args.positional(value);
        }

        for (name, value) in &file.headers {
            args = args.header(name, value);
        }
        for entry in &self.headers {
            let (name, value) = parse_key_value(entry)?;
            args = args.header(name, value);
        }

        if !self.form.is_empty() {
            if file.body.is_some() || file.upload.is_some() {
                anyhow::bail!("-F cannot be combined with a body or upload from the request file");
            }
            let mut form = Multipart::new();
            for entry in &self.form {
                let (name, value) = parse_key_value(entry)?;
                form = match value.strip_prefix('@') {
                    Some(path) => form.file_path(name, path)?,
                    None => form.text(name, value),
                };
            }
            return Ok(args.multipart(form));
        }

        if let Some(body) = &self.body {
            let value: serde_json::Value = serde_json::from_str(body)
                .map_err(|e| anyhow::anyhow!("invalid --body JSON: {e}"))?;
            return Ok(args.json(&value)?);
        }
        if let Some(path) = self.upload.as_deref().or(file.upload.as_deref()) {
            return Ok(args.file(path)?);
        }
        if let Some(body) = &file.body {
            return Ok(args.json(body)?);
        }
        Ok(args)
    }
}
