//! Utility functions for CLI commands.

use std::time::Duration;

use watson_cli::{Config, Context, Output, OutputFormat, load_config};
use watson_sdk::{Client, ClientBuilder, Credentials, ServiceKind};

use crate::Cli;

const APP_NAME: &str = "watson";

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(APP_NAME, cli.config.as_deref())
}

/// Gets the context to use.
///
/// Returns `None` when no context was requested and none is current, in
/// which case credentials come from the environment.
pub fn get_context(cli: &Cli) -> anyhow::Result<Option<Context>> {
    let cfg = get_config(cli)?;
    match (cfg.resolve_context(cli.context.as_deref()), cli.context.as_deref()) {
        (Some(ctx), _) => Ok(Some(ctx.clone())),
        (None, Some(name)) => anyhow::bail!("context '{}' not found", name),
        (None, None) => Ok(None),
    }
}

/// Creates a client for `kind` from the selected context, or from
/// `<SERVICE>_*` environment variables when there is none.
pub fn create_client(cli: &Cli, kind: ServiceKind) -> anyhow::Result<Client> {
    match get_context(cli)? {
        Some(ctx) => {
            print_verbose(cli, &format!("Using context: {} ({})", ctx.name, ctx.auth_kind()));
            client_from_context(&ctx)
        }
        None => {
            print_verbose(cli, "No context configured, reading credentials from environment");
            let builder = ClientBuilder::from_env(kind).map_err(|e| {
                anyhow::anyhow!(
                    "{e}. Use -c flag or add a context with 'watson config add-context'"
                )
            })?;
            Ok(builder.build()?)
        }
    }
}

/// Maps a context's credentials, using the same precedence as
/// [`Context::auth_kind`].
pub fn credentials_from_context(ctx: &Context) -> anyhow::Result<Credentials> {
    let credentials = match ctx.auth_kind() {
        "iam" => Credentials::api_key(&ctx.api_key)?,
        "bearer" => Credentials::bearer_token(&ctx.bearer_token)?,
        "basic" => Credentials::basic(&ctx.username, &ctx.password)?,
        _ => anyhow::bail!("context '{}' has no credentials", ctx.name),
    };
    Ok(credentials)
}

/// Builds a client from a context.
pub fn client_from_context(ctx: &Context) -> anyhow::Result<Client> {
    let mut builder = Client::builder(credentials_from_context(ctx)?)
        .learning_opt_out(ctx.learning_opt_out)
        .disable_ssl_verification(ctx.disable_ssl_verification);

    if !ctx.iam_url.is_empty() {
        builder = builder.iam_url(&ctx.iam_url);
    }
    if ctx.timeout > 0 {
        builder = builder.timeout(Duration::from_secs(ctx.timeout as u64));
    }
    for (name, url) in &ctx.urls {
        let kind: ServiceKind = name.parse()?;
        builder = builder.url(kind, url);
    }
    for (name, version) in &ctx.versions {
        let kind: ServiceKind = name.parse()?;
        builder = builder.version(kind, version);
    }

    Ok(builder.build()?)
}

/// Parses a service name, listing the valid names on failure.
pub fn parse_service(name: &str) -> anyhow::Result<ServiceKind> {
    ServiceKind::from_name(name).ok_or_else(|| {
        let names: Vec<_> = ServiceKind::ALL.iter().map(|k| k.name()).collect();
        anyhow::anyhow!("unknown service '{}', expected one of: {}", name, names.join(", "))
    })
}

/// Returns the structured output writer for this invocation.
pub fn output(cli: &Cli) -> Output {
    Output::new(OutputFormat::from_json_flag(cli.json), cli.output.clone())
}

/// Prints verbose output if enabled.
pub fn print_verbose(cli: &Cli, msg: &str) {
    watson_cli::print_verbose(cli.verbose, msg);
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Formats bytes to human readable string.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
