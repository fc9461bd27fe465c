//! Watson API client.

use std::{collections::HashMap, sync::Arc, time::Duration};

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::{
    auth::{Authenticator, Credentials},
    catalog::ServiceKind,
    error::{Error, Result},
    http::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, HttpClient, HttpConfig},
    service::{Service, parse_base_url},
};

/// Watson API client.
///
/// One client holds one set of credentials and hands out a [`Service`] per
/// family. Services from the same client share the HTTP connection pool and
/// the IAM token cache.
///
/// # Example
///
/// ```rust,no_run
/// use watson_sdk::{CallArgs, Client, Credentials};
///
/// # async fn run() -> watson_sdk::Result<()> {
/// let client = Client::new(Credentials::api_key("your-api-key")?)?;
///
/// let reply = client
///     .assistant()
///     .call::<serde_json::Value>(
///         "message",
///         CallArgs::new()
///             .arg("workspace_id", "your-workspace")
///             .json(&serde_json::json!({"input": {"text": "hello"}}))?,
///     )
///     .await?;
/// println!("{}", reply.result);
/// # Ok(())
/// # }
/// ```
pub struct Client {
    http: Arc<HttpClient>,
    auth: Arc<dyn Authenticator>,
    credentials: Option<Credentials>,
    iam_url: Option<String>,
    /// Indexed by `ServiceKind as usize`.
    urls: Vec<Url>,
    versions: Vec<Option<String>>,
}

impl Client {
    /// Creates a client with default settings.
    pub fn new(credentials: Credentials) -> Result<Self> {
        ClientBuilder::new(AuthSource::Credentials(credentials)).build()
    }

    /// Creates a builder for more configuration options.
    pub fn builder(credentials: Credentials) -> ClientBuilder {
        ClientBuilder::new(AuthSource::Credentials(credentials))
    }

    /// Creates a builder around an externally managed authenticator.
    pub fn with_authenticator(auth: Arc<dyn Authenticator>) -> ClientBuilder {
        ClientBuilder::new(AuthSource::Authenticator(auth))
    }

    /// Returns the configured credentials, if built from credentials.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Returns the HTTP transport.
    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// Returns the base URL used for a service family.
    pub fn service_url(&self, kind: ServiceKind) -> &Url {
        &self.urls[kind as usize]
    }

    /// Returns the version date used for a service family.
    pub fn service_version(&self, kind: ServiceKind) -> Option<&str> {
        self.versions[kind as usize].as_deref()
    }

    /// Returns a facade for a service family.
    pub fn service(&self, kind: ServiceKind) -> Service {
        Service::new(
            kind.definition(),
            self.http.clone(),
            self.auth.clone(),
            self.service_url(kind).clone(),
            self.service_version(kind).map(str::to_string),
        )
        .with_iam_url(self.iam_url.clone())
    }

    pub fn assistant(&self) -> Service {
        self.service(ServiceKind::Assistant)
    }

    pub fn conversation(&self) -> Service {
        self.service(ServiceKind::Conversation)
    }

    pub fn discovery(&self) -> Service {
        self.service(ServiceKind::Discovery)
    }

    pub fn speech_to_text(&self) -> Service {
        self.service(ServiceKind::SpeechToText)
    }

    pub fn text_to_speech(&self) -> Service {
        self.service(ServiceKind::TextToSpeech)
    }

    pub fn tone_analyzer(&self) -> Service {
        self.service(ServiceKind::ToneAnalyzer)
    }

    pub fn visual_recognition(&self) -> Service {
        self.service(ServiceKind::VisualRecognition)
    }

    pub fn personality_insights(&self) -> Service {
        self.service(ServiceKind::PersonalityInsights)
    }

    pub fn language_translator(&self) -> Service {
        self.service(ServiceKind::LanguageTranslator)
    }

    pub fn compare_comply(&self) -> Service {
        self.service(ServiceKind::CompareComply)
    }
}

enum AuthSource {
    Credentials(Credentials),
    Authenticator(Arc<dyn Authenticator>),
}

/// Builder for creating a Watson API client.
pub struct ClientBuilder {
    auth: AuthSource,
    urls: Vec<(ServiceKind, String)>,
    versions: Vec<(ServiceKind, String)>,
    iam_url: Option<String>,
    timeout: Duration,
    user_agent: String,
    headers: Vec<(String, String)>,
    learning_opt_out: bool,
    disable_ssl_verification: bool,
    http_client: Option<reqwest::Client>,
}

impl ClientBuilder {
    fn new(auth: AuthSource) -> Self {
        Self {
            auth,
            urls: Vec::new(),
            versions: Vec::new(),
            iam_url: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            learning_opt_out: false,
            disable_ssl_verification: false,
            http_client: None,
        }
    }

    /// Creates a builder from `<SERVICE>_*` environment variables.
    ///
    /// Credentials are read as described in [`Credentials::from_env`];
    /// `<SERVICE>_URL` overrides the service base URL.
    pub fn from_env(kind: ServiceKind) -> Result<Self> {
        Self::from_lookup(kind, |key| std::env::var(key).ok())
    }

    /// Like [`ClientBuilder::from_env`], with a custom variable lookup.
    pub fn from_lookup<F>(kind: ServiceKind, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = kind.name().to_ascii_uppercase().replace('-', "_");
        let credentials = Credentials::from_lookup(&prefix, &lookup)?.ok_or_else(|| {
            Error::argument(format!("no credentials found in {prefix}_* environment"))
        })?;

        let mut builder = Client::builder(credentials);
        if let Some(url) = lookup(&format!("{prefix}_URL")).filter(|v| !v.is_empty()) {
            builder = builder.url(kind, url);
        }
        Ok(builder)
    }

    /// Overrides the base URL of one service family.
    pub fn url(mut self, kind: ServiceKind, url: impl Into<String>) -> Self {
        self.urls.push((kind, url.into()));
        self
    }

    /// Overrides the version date of one service family.
    pub fn version(mut self, kind: ServiceKind, version: impl Into<String>) -> Self {
        self.versions.push((kind, version.into()));
        self
    }

    /// Overrides the IAM token endpoint for API key credentials.
    pub fn iam_url(mut self, url: impl Into<String>) -> Self {
        self.iam_url = Some(url.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the `User-Agent` value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sends `X-Watson-Learning-Opt-Out: true` with every request.
    pub fn learning_opt_out(mut self, opt_out: bool) -> Self {
        self.learning_opt_out = opt_out;
        self
    }

    /// Accepts invalid TLS certificates. Only for test gateways.
    pub fn disable_ssl_verification(mut self, disable: bool) -> Self {
        self.disable_ssl_verification = disable;
        self
    }

    /// Uses an externally configured reqwest client. Timeout and TLS
    /// settings on this builder are then ignored.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds the client.
    pub fn build(self) -> Result<Client> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::argument(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::argument(format!("invalid value for header {name}: {e}")))?;
            default_headers.insert(name, value);
        }
        if self.learning_opt_out {
            default_headers.insert(
                HeaderName::from_static("x-watson-learning-opt-out"),
                HeaderValue::from_static("true"),
            );
        }

        let mut url_overrides = HashMap::new();
        for (kind, url) in &self.urls {
            url_overrides.insert(*kind, parse_base_url(url)?);
        }
        let mut version_overrides = HashMap::new();
        for (kind, version) in self.versions {
            if version.is_empty() {
                return Err(Error::argument(format!("{kind}: version must be non-empty")));
            }
            version_overrides.insert(kind, version);
        }

        let mut urls = Vec::with_capacity(ServiceKind::ALL.len());
        let mut versions = Vec::with_capacity(ServiceKind::ALL.len());
        for kind in ServiceKind::ALL {
            let url = match url_overrides.remove(&kind) {
                Some(url) => url,
                None => parse_base_url(kind.definition().default_url)?,
            };
            urls.push(url);
            versions.push(
                version_overrides
                    .remove(&kind)
                    .or_else(|| kind.definition().version.map(str::to_string)),
            );
        }

        let config = HttpConfig {
            timeout: self.timeout,
            user_agent: self.user_agent,
            default_headers,
            disable_ssl_verification: self.disable_ssl_verification,
        };
        let http = match self.http_client {
            Some(client) => HttpClient::with_client(client, config)?,
            None => HttpClient::new(config)?,
        };

        let (auth, credentials) = match self.auth {
            AuthSource::Credentials(credentials) => {
                let credentials = match self.iam_url.as_deref() {
                    Some(url) => credentials.with_iam_url(url),
                    None => credentials,
                };
                let auth =
                    credentials.authenticator_with_agent(http.inner().clone(), http.user_agent())?;
                (auth, Some(credentials))
            }
            AuthSource::Authenticator(auth) => (auth, None),
        };

        Ok(Client {
            http: Arc::new(http),
            auth,
            credentials,
            iam_url: self.iam_url,
            urls,
            versions,
        })
    }
}
