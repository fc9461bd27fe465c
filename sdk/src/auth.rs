//! Credentials and authentication header providers.
//!
//! Three credential variants are supported:
//!
//! 1. Username and password, sent as `Authorization: Basic ...`.
//! 2. IAM API key, exchanged for a short-lived bearer token that is cached
//!    and refreshed shortly before it expires.
//! 3. A caller-managed bearer token, sent as-is.
//!
//! A username of `apikey` paired with a password is treated as an IAM API
//! key, matching the credentials format issued by the IBM Cloud console.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    http::DEFAULT_USER_AGENT,
};

/// Default IAM token endpoint.
pub const DEFAULT_IAM_URL: &str = "https://iam.cloud.ibm.com/identity/token";

/// Tokens are refreshed this long before they expire.
pub const DEFAULT_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Username that marks the password as an IAM API key.
pub const APIKEY_USERNAME: &str = "apikey";

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Service credentials. Exactly one variant is active per client.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        api_key: String,
        /// Token endpoint override; [`DEFAULT_IAM_URL`] when `None`.
        iam_url: Option<String>,
    },
    BearerToken(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::ApiKey { iam_url, .. } => f
                .debug_struct("ApiKey")
                .field("api_key", &"***")
                .field("iam_url", iam_url)
                .finish(),
            Credentials::BearerToken(_) => f.debug_tuple("BearerToken").field(&"***").finish(),
        }
    }
}

impl Credentials {
    /// Username/password credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let creds = Credentials::Basic {
            username: username.into(),
            password: password.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// IAM API key credentials.
    pub fn api_key(api_key: impl Into<String>) -> Result<Self> {
        let creds = Credentials::ApiKey {
            api_key: api_key.into(),
            iam_url: None,
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Caller-managed bearer token.
    pub fn bearer_token(token: impl Into<String>) -> Result<Self> {
        let creds = Credentials::BearerToken(token.into());
        creds.validate()?;
        Ok(creds)
    }

    /// Resolves the `apikey` username convention into the `ApiKey` variant.
    pub fn normalized(self) -> Self {
        match self {
            Credentials::Basic { username, password } if username == APIKEY_USERNAME => {
                Credentials::ApiKey {
                    api_key: password,
                    iam_url: None,
                }
            }
            other => other,
        }
    }

    /// Sets the IAM token endpoint unless one is already present.
    pub fn or_iam_url(self, url: Option<&str>) -> Self {
        match (self.normalized(), url) {
            (
                Credentials::ApiKey {
                    api_key,
                    iam_url: None,
                },
                Some(url),
            ) => Credentials::ApiKey {
                api_key,
                iam_url: Some(url.to_string()),
            },
            (other, _) => other,
        }
    }

    /// Overrides the IAM token endpoint. No effect on other variants.
    pub fn with_iam_url(self, url: impl Into<String>) -> Self {
        match self.normalized() {
            Credentials::ApiKey { api_key, .. } => Credentials::ApiKey {
                api_key,
                iam_url: Some(url.into()),
            },
            other => other,
        }
    }

    /// Checks that every field of the active variant is non-empty.
    pub fn validate(&self) -> Result<()> {
        match self {
            Credentials::Basic { username, password } => {
                if username.is_empty() || password.is_empty() {
                    return Err(Error::argument("username and password must be non-empty"));
                }
            }
            Credentials::ApiKey { api_key, iam_url } => {
                if api_key.is_empty() {
                    return Err(Error::argument("api_key must be non-empty"));
                }
                if iam_url.as_deref() == Some("") {
                    return Err(Error::argument("iam_url must be non-empty when set"));
                }
            }
            Credentials::BearerToken(token) => {
                if token.is_empty() {
                    return Err(Error::argument("bearer token must be non-empty"));
                }
            }
        }
        Ok(())
    }

    /// Returns the variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::Basic { .. } => "basic",
            Credentials::ApiKey { .. } => "iam",
            Credentials::BearerToken(_) => "bearer",
        }
    }

    /// Loads credentials from `<PREFIX>_*` environment variables.
    ///
    /// See [`Credentials::from_lookup`].
    pub fn from_env(prefix: &str) -> Result<Option<Self>> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Loads credentials through a variable lookup function.
    ///
    /// Checked in order: `<PREFIX>_APIKEY` (with optional `<PREFIX>_IAM_URL`),
    /// `<PREFIX>_BEARER_TOKEN`, then `<PREFIX>_USERNAME` + `<PREFIX>_PASSWORD`.
    /// Returns `Ok(None)` when none are set.
    pub fn from_lookup<F>(prefix: &str, lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = prefix.to_ascii_uppercase().replace('-', "_");
        let get = |suffix: &str| lookup(&format!("{prefix}_{suffix}")).filter(|v| !v.is_empty());

        if let Some(api_key) = get("APIKEY") {
            let mut creds = Credentials::api_key(api_key)?;
            if let Some(url) = get("IAM_URL") {
                creds = creds.with_iam_url(url);
            }
            return Ok(Some(creds));
        }
        if let Some(token) = get("BEARER_TOKEN") {
            return Credentials::bearer_token(token).map(Some);
        }
        match (get("USERNAME"), get("PASSWORD")) {
            (Some(username), Some(password)) => Credentials::basic(username, password).map(Some),
            (None, None) => Ok(None),
            _ => Err(Error::argument(format!(
                "{prefix}_USERNAME and {prefix}_PASSWORD must be set together"
            ))),
        }
    }

    /// Builds the header provider for these credentials.
    pub fn authenticator(&self, client: reqwest::Client) -> Result<Arc<dyn Authenticator>> {
        self.authenticator_with_agent(client, DEFAULT_USER_AGENT)
    }

    /// Like [`Credentials::authenticator`], identifying token exchanges
    /// with `user_agent`.
    pub fn authenticator_with_agent(
        &self,
        client: reqwest::Client,
        user_agent: &str,
    ) -> Result<Arc<dyn Authenticator>> {
        self.validate()?;
        let auth: Arc<dyn Authenticator> = match self.clone().normalized() {
            Credentials::Basic { username, password } => {
                Arc::new(BasicAuthenticator::new(&username, &password))
            }
            Credentials::ApiKey { api_key, iam_url } => Arc::new(
                IamTokenManager::new(client, api_key, iam_url.as_deref().unwrap_or(DEFAULT_IAM_URL))
                    .user_agent(user_agent),
            ),
            Credentials::BearerToken(token) => Arc::new(BearerTokenAuthenticator::new(&token)),
        };
        Ok(auth)
    }
}

/// Produces the `Authorization` header value for outbound requests.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns the header value, refreshing cached state if needed.
    async fn auth_header(&self) -> Result<String>;
}

/// Static `Basic` header, computed once.
pub struct BasicAuthenticator {
    header: String,
}

impl BasicAuthenticator {
    pub fn new(username: &str, password: &str) -> Self {
        let encoded = BASE64.encode(format!("{username}:{password}"));
        Self {
            header: format!("Basic {encoded}"),
        }
    }
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    async fn auth_header(&self) -> Result<String> {
        Ok(self.header.clone())
    }
}

/// Caller-managed bearer token.
pub struct BearerTokenAuthenticator {
    header: String,
}

impl BearerTokenAuthenticator {
    pub fn new(token: &str) -> Self {
        Self {
            header: format!("Bearer {token}"),
        }
    }
}

#[async_trait]
impl Authenticator for BearerTokenAuthenticator {
    async fn auth_header(&self) -> Result<String> {
        Ok(self.header.clone())
    }
}

/// A cached IAM access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Token {
    /// Returns true if the token is still usable at `now` with `margin` to spare.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        now.checked_add_signed(margin)
            .is_some_and(|deadline| deadline < self.expires_at)
    }
}

/// Exchanges an API key for bearer tokens and caches them.
///
/// The check-and-refresh sequence runs under one async mutex, so concurrent
/// callers wait for a single in-flight exchange and never see a partially
/// replaced token.
pub struct IamTokenManager {
    client: reqwest::Client,
    api_key: String,
    url: String,
    user_agent: String,
    refresh_margin: chrono::Duration,
    token: Mutex<Option<Token>>,
}

impl IamTokenManager {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            url: url.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            refresh_margin: to_chrono(DEFAULT_REFRESH_MARGIN),
            token: Mutex::new(None),
        }
    }

    /// Sets how long before expiry a token is replaced.
    pub fn refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = to_chrono(margin);
        self
    }

    /// Sets the `User-Agent` sent to the identity service.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns a valid access token, exchanging the API key if needed.
    pub async fn access_token(&self) -> Result<String> {
        let mut guard = self.token.lock().await;

        if let Some(token) = guard.as_ref() {
            if token.is_fresh(Utc::now(), self.refresh_margin) {
                return Ok(token.access_token.clone());
            }
            debug!(expires_at = %token.expires_at, "iam token expiring, refreshing");
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *guard = Some(token);
        Ok(access_token)
    }

    /// Returns the cached token, if any.
    pub async fn cached(&self) -> Option<Token> {
        self.token.lock().await.clone()
    }

    async fn exchange(&self) -> Result<Token> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", IAM_GRANT_TYPE)
            .append_pair("apikey", &self.api_key)
            .finish();

        debug!(url = %self.url, "exchanging api key for iam token");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .body(form)
            .send()
            .await
            .map_err(|e| Error::authentication(format!("token exchange failed: {e}"), None))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::authentication(format!("token exchange failed: {e}"), Some(status)))?;

        if !(200..300).contains(&status) {
            let message = serde_json::from_slice::<IamError>(&body)
                .ok()
                .and_then(|e| e.error_message)
                .unwrap_or_else(|| String::from_utf8_lossy(&body).into_owned());
            warn!(status, "iam token exchange rejected");
            return Err(Error::authentication(
                format!("token exchange returned {status}: {message}"),
                Some(status),
            ));
        }

        let resp: IamTokenResponse = serde_json::from_slice(&body).map_err(|e| {
            Error::authentication(format!("invalid token response: {e}"), Some(status))
        })?;
        if resp.access_token.is_empty() {
            return Err(Error::authentication("token response has no access_token", Some(status)));
        }

        let now = Utc::now();
        let expires_at = match (resp.expires_in, resp.expiration) {
            (Some(secs), _) => chrono::Duration::try_seconds(secs)
                .and_then(|ttl| now.checked_add_signed(ttl))
                .ok_or_else(|| {
                    Error::authentication(format!("invalid expires_in {secs}"), Some(status))
                })?,
            (None, Some(ts)) => DateTime::from_timestamp(ts, 0).ok_or_else(|| {
                Error::authentication(format!("invalid expiration {ts}"), Some(status))
            })?,
            (None, None) => {
                return Err(Error::authentication(
                    "token response has no expires_in",
                    Some(status),
                ));
            }
        };

        Ok(Token {
            access_token: resp.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl Authenticator for IamTokenManager {
    async fn auth_header(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.access_token().await?))
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

#[derive(Deserialize)]
struct IamTokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expiration: Option<i64>,
}

#[derive(Deserialize)]
struct IamError {
    #[serde(default, rename = "errorMessage")]
    error_message: Option<String>,
}
