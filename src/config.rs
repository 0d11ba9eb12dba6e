//! Configuration types for the named location sync.

use crate::error::SyncError;
use crate::retry::RetryPolicy;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the Entra ID tenant (directory) ID.
pub const TENANT_ID_VAR: &str = "GRAPH_TENANT_ID";
/// Environment variable holding the application (client) ID.
pub const CLIENT_ID_VAR: &str = "GRAPH_CLIENT_ID";
/// Environment variable holding the application client secret.
pub const CLIENT_SECRET_VAR: &str = "GRAPH_CLIENT_SECRET";

/// Root configuration for a sync run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Target named location.
    #[serde(default)]
    pub named_location: NamedLocationConfig,

    /// Input IP list.
    #[serde(default)]
    pub input: InputConfig,

    /// Microsoft Graph endpoints.
    #[serde(default)]
    pub graph: GraphConfig,

    /// HTTP client behavior.
    #[serde(default)]
    pub http: HttpConfig,
}

/// Named location that receives the IP ranges.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamedLocationConfig {
    /// Named location object ID.
    #[serde(default = "default_named_location_id")]
    pub id: String,

    /// Display name written on every update. Derived from the input file
    /// name when unset.
    #[serde(default)]
    pub display_name: Option<String>,
}

impl Default for NamedLocationConfig {
    fn default() -> Self {
        Self {
            id: default_named_location_id(),
            display_name: None,
        }
    }
}

fn default_named_location_id() -> String {
    "0282fa9f-d415-42f8-b491-9b88f8419ca6".to_string()
}

/// Input file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// Path to the IP list, one address or CIDR block per line.
    #[serde(default = "default_input_path")]
    pub path: PathBuf,

    /// What to do with lines that are not a valid IP or CIDR.
    #[serde(default)]
    pub on_invalid: InvalidEntryPolicy,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
            on_invalid: InvalidEntryPolicy::default(),
        }
    }
}

fn default_input_path() -> PathBuf {
    PathBuf::from("arc-known-threats.txt")
}

/// Handling of invalid input lines.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum InvalidEntryPolicy {
    /// Log a warning and leave the line out.
    #[default]
    Skip,
    /// Fail the whole run on the first invalid line.
    Abort,
}

/// Microsoft cloud environment.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CloudEnvironment {
    /// Global Azure.
    #[default]
    Commercial,
    /// Azure US Government.
    UsGovernment,
    /// Azure China (21Vianet).
    China,
}

impl CloudEnvironment {
    /// OAuth2 login endpoint.
    pub fn login_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://login.microsoftonline.com",
            Self::UsGovernment => "https://login.microsoftonline.us",
            Self::China => "https://login.chinacloudapi.cn",
        }
    }

    /// Microsoft Graph endpoint.
    pub fn graph_endpoint(&self) -> &'static str {
        match self {
            Self::Commercial => "https://graph.microsoft.com",
            Self::UsGovernment => "https://graph.microsoft.us",
            Self::China => "https://microsoftgraph.chinacloudapi.cn",
        }
    }
}

/// Graph API location.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Cloud environment.
    #[serde(default)]
    pub cloud: CloudEnvironment,

    /// Graph API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Override for the login endpoint.
    #[serde(default)]
    pub login_endpoint: Option<String>,

    /// Override for the Graph endpoint.
    #[serde(default)]
    pub graph_endpoint: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            cloud: CloudEnvironment::default(),
            api_version: default_api_version(),
            login_endpoint: None,
            graph_endpoint: None,
        }
    }
}

fn default_api_version() -> String {
    "v1.0".to_string()
}

impl GraphConfig {
    /// Login endpoint without a trailing slash.
    pub fn login_endpoint(&self) -> &str {
        self.login_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cloud.login_endpoint())
            .trim_end_matches('/')
    }

    /// Graph endpoint without a trailing slash.
    pub fn graph_endpoint(&self) -> &str {
        self.graph_endpoint
            .as_deref()
            .unwrap_or_else(|| self.cloud.graph_endpoint())
            .trim_end_matches('/')
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    /// Retry policy for transient failures.
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout(),
            retry: RetryPolicy::default(),
        }
    }
}

fn default_timeout() -> u64 {
    30_000
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.named_location.id.trim().is_empty() {
            return Err(SyncError::Config("named_location.id is empty".to_string()));
        }

        if self.input.path.as_os_str().is_empty() {
            return Err(SyncError::Config("input.path is empty".to_string()));
        }

        if self.graph.api_version.trim().is_empty() {
            return Err(SyncError::Config("graph.api_version is empty".to_string()));
        }

        if self.http.timeout_ms == 0 {
            return Err(SyncError::Config("http.timeout_ms must be > 0".to_string()));
        }

        let retry = &self.http.retry;
        if retry.initial_backoff_ms > retry.max_backoff_ms {
            return Err(SyncError::Config(format!(
                "retry.initial_backoff_ms ({}) must be <= retry.max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            )));
        }

        Ok(())
    }

    /// Display name sent to the named location.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.named_location.display_name {
            return name.clone();
        }

        let file_name = self
            .input
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input.path.display().to_string());
        format!("Github Blocklist ({})", file_name)
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# Named Location Sync Configuration
#
# Credentials are never read from this file. Set GRAPH_TENANT_ID,
# GRAPH_CLIENT_ID and GRAPH_CLIENT_SECRET in the environment.

named_location:
  id: "0282fa9f-d415-42f8-b491-9b88f8419ca6"
  # display_name: "Github Blocklist (arc-known-threats.txt)"

input:
  path: "arc-known-threats.txt"
  on_invalid: skip             # skip (warn and continue) or abort

graph:
  cloud: commercial            # commercial, us_government or china
  api_version: "v1.0"

http:
  timeout_ms: 30000
  retry:
    max_retries: 3             # 0 disables retries
    initial_backoff_ms: 500
    max_backoff_ms: 10000
"#
        .to_string()
    }
}

/// Client credentials for the app registration.
#[derive(Clone)]
pub struct Credentials {
    /// Entra ID tenant (directory) ID.
    pub tenant_id: String,
    /// Application (client) ID.
    pub client_id: String,
    /// Application client secret.
    pub client_secret: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`, reporting every missing variable at once.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let tenant_id = read(TENANT_ID_VAR);
        let client_id = read(CLIENT_ID_VAR);
        let client_secret = read(CLIENT_SECRET_VAR);

        if !missing.is_empty() {
            return Err(SyncError::Config(format!(
                "missing required environment variable(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self::new(tenant_id, client_id, client_secret))
    }

    /// Check that no field is empty.
    pub fn validate(&self) -> Result<(), SyncError> {
        let mut empty = Vec::new();
        if self.tenant_id.trim().is_empty() {
            empty.push("tenant_id");
        }
        if self.client_id.trim().is_empty() {
            empty.push("client_id");
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            empty.push("client_secret");
        }

        if empty.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(format!(
                "empty credential field(s): {}",
                empty.join(", ")
            )))
        }
    }
}

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("valid placeholder regex");

    re.replace_all(content, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_default()
    })
    .into_owned()
}
