//! Configuration management commands.

use clap::{Args, Subcommand};

use watson_cli::{Context as CliContext, mask_api_key, parse_key_value};

use super::{get_config, parse_service, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Contexts allow you to manage multiple Watson accounts and regions,
/// similar to kubectl's context management.
///
/// Configuration is stored in ~/.watson/watson/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or replace a context
    #[command(name = "add-context")]
    AddContext {
        /// Context name
        name: String,
        /// IAM API key
        #[arg(long)]
        api_key: Option<String>,
        /// IAM token endpoint
        #[arg(long)]
        iam_url: Option<String>,
        /// Pre-issued bearer token
        #[arg(long)]
        bearer_token: Option<String>,
        /// Basic auth username ("apikey" means the password is an IAM key)
        #[arg(long)]
        username: Option<String>,
        /// Basic auth password
        #[arg(long)]
        password: Option<String>,
        /// Service URL override, as service=url (repeatable)
        #[arg(long = "url", value_name = "SERVICE=URL")]
        urls: Vec<String>,
        /// Version date override, as service=date (repeatable)
        #[arg(long = "service-version", value_name = "SERVICE=DATE")]
        versions: Vec<String>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<i32>,
        /// Ask Watson not to use request data for training
        #[arg(long)]
        learning_opt_out: bool,
        /// Accept invalid TLS certificates
        #[arg(long)]
        disable_ssl_verification: bool,
        /// Default Text to Speech voice
        #[arg(long)]
        default_voice: Option<String>,
    },
    /// Delete a context
    #[command(name = "delete-context")]
    DeleteContext {
        /// Context name
        name: String,
    },
    /// Set the current context
    #[command(name = "use-context")]
    UseContext {
        /// Context name
        name: String,
    },
    /// Display the current context
    #[command(name = "get-context")]
    GetContext,
    /// List all contexts
    #[command(name = "list-contexts", alias = "get-contexts")]
    ListContexts,
    /// View the current configuration
    View,
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::AddContext {
                name,
                api_key,
                iam_url,
                bearer_token,
                username,
                password,
                urls,
                versions,
                timeout,
                learning_opt_out,
                disable_ssl_verification,
                default_voice,
            } => {
                let mut ctx = CliContext {
                    api_key: api_key.clone().unwrap_or_default(),
                    iam_url: iam_url.clone().unwrap_or_default(),
                    bearer_token: bearer_token.clone().unwrap_or_default(),
                    username: username.clone().unwrap_or_default(),
                    password: password.clone().unwrap_or_default(),
                    timeout: timeout.unwrap_or(0),
                    learning_opt_out: *learning_opt_out,
                    disable_ssl_verification: *disable_ssl_verification,
                    default_voice: default_voice.clone().unwrap_or_default(),
                    ..Default::default()
                };
                if ctx.auth_kind() == "none" {
                    anyhow::bail!(
                        "credentials required: --api-key, --bearer-token or --username/--password"
                    );
                }
                for entry in urls {
                    let (service, url) = parse_key_value(entry)?;
                    ctx.urls.insert(parse_service(&service)?.name().to_string(), url);
                }
                for entry in versions {
                    let (service, version) = parse_key_value(entry)?;
                    ctx.versions
                        .insert(parse_service(&service)?.name().to_string(), version);
                }

                let mut cfg = get_config(cli)?;
                cfg.add_context(name, ctx)?;
                print_success(&format!("Context \"{}\" added successfully", name));
                Ok(())
            }

            ConfigSubcommand::DeleteContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_context(name)?;
                print_success(&format!("Context \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::UseContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_context(name)?;
                print_success(&format!("Switched to context \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::GetContext => {
                let cfg = get_config(cli)?;
                if cfg.current_context.is_empty() {
                    println!("No current context set");
                } else {
                    println!("{}", cfg.current_context);
                }
                Ok(())
            }

            ConfigSubcommand::ListContexts => {
                let cfg = get_config(cli)?;

                if cfg.contexts.is_empty() {
                    println!("No contexts configured");
                    return Ok(());
                }

                println!("{:<8} {:<20} {:<8} {}", "CURRENT", "NAME", "AUTH", "URL_OVERRIDES");
                for name in cfg.list_contexts() {
                    let Some(ctx) = cfg.get_context(name) else {
                        continue;
                    };
                    let current = if name == cfg.current_context { "*" } else { "" };
                    println!(
                        "{:<8} {:<20} {:<8} {}",
                        current,
                        name,
                        ctx.auth_kind(),
                        ctx.urls.len()
                    );
                }

                Ok(())
            }

            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;

                println!("Config file: {}", cfg.path().display());
                println!("Current context: {}", cfg.current_context);
                println!("Contexts: {}", cfg.contexts.len());

                for name in cfg.list_contexts() {
                    let Some(ctx) = cfg.get_context(name) else {
                        continue;
                    };
                    println!("\n  {}:", name);
                    println!("    Auth: {}", ctx.auth_kind());
                    if !ctx.api_key.is_empty() {
                        println!("    API Key: {}", mask_api_key(&ctx.api_key));
                    }
                    if !ctx.iam_url.is_empty() {
                        println!("    IAM URL: {}", ctx.iam_url);
                    }
                    if !ctx.bearer_token.is_empty() {
                        println!("    Bearer Token: {}", mask_api_key(&ctx.bearer_token));
                    }
                    if !ctx.username.is_empty() {
                        println!("    Username: {}", ctx.username);
                        println!("    Password: {}", mask_api_key(&ctx.password));
                    }
                    let mut services: Vec<_> = ctx.urls.iter().collect();
                    services.sort();
                    for (service, url) in services {
                        println!("    URL ({}): {}", service, url);
                    }
                    let mut versions: Vec<_> = ctx.versions.iter().collect();
                    versions.sort();
                    for (service, version) in versions {
                        println!("    Version ({}): {}", service, version);
                    }
                    if ctx.timeout > 0 {
                        println!("    Timeout: {}s", ctx.timeout);
                    }
                    if ctx.learning_opt_out {
                        println!("    Learning Opt-Out: true");
                    }
                    if ctx.disable_ssl_verification {
                        println!("    SSL Verification: disabled");
                    }
                    if !ctx.default_voice.is_empty() {
                        println!("    Default Voice: {}", ctx.default_voice);
                    }
                }

                Ok(())
            }
        }
    }
}
