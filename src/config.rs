use std::{fmt, fs, path::Path};

use anyhow::Context;
use log::debug;
use serde::Deserialize;

use crate::{Hook, MailAuthNotifier, MailNotifier, NotifyError, Seconds};

pub const DEFAULT_CONNECT_TIMEOUT: Seconds = Seconds::new(5);

fn default_connect_timeout() -> Seconds {
    DEFAULT_CONNECT_TIMEOUT
}

/// Where and how to send notification mails
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MailConfig {
    /// Label used in the subject line
    pub app_name: String,

    pub host: String,

    pub port: u16,

    /// Sender mailbox, either `addr@host` or `Name <addr@host>`
    pub from: String,

    /// Recipient mailbox, same forms as `from`
    pub to: String,

    /// If supplied each send authenticates on a fresh connection, otherwise a
    /// single unauthenticated session is kept open
    #[serde(default)]
    pub credentials: Option<AuthConfig>,

    /// Applies to dialing (both modes) and socket I/O
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Seconds,

    /// Only used by authenticated sends
    #[serde(default)]
    pub tls: TlsMode,
}

#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct AuthConfig {
    pub username: String,
    pub password: String,
}

impl AuthConfig {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    /// Plain text only
    None,
    /// Upgrade with STARTTLS when the server offers it
    #[default]
    Opportunistic,
    /// Fail unless STARTTLS succeeds
    Required,
    /// TLS from the first byte (usually port 465)
    Wrapper,
}

impl MailConfig {
    pub fn new(app_name: &str, host: &str, port: u16, from: &str, to: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            host: host.to_string(),
            port,
            from: from.to_string(),
            to: to.to_string(),
            credentials: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tls: TlsMode::default(),
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(AuthConfig::new(username, password));
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Seconds) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<MailConfig> {
        debug!("Loading Config from: {config_path:?}");
        let file_contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read contents of {config_path:?}"))?;
        let result = serde_json::from_str(&file_contents)
            .with_context(|| format!("Failed to parse contents of {config_path:?}"))?;
        Ok(result)
    }

    /// Builds the notifier matching this config, authenticated when credentials are present
    pub fn build_hook(&self) -> Result<Box<dyn Hook>, NotifyError> {
        Ok(match &self.credentials {
            Some(auth) => Box::new(MailAuthNotifier::from_config(self, auth)?),
            None => Box::new(MailNotifier::from_config(self)?),
        })
    }
}
