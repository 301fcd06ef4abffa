use std::{fmt, time::Duration};

use lettre::{
    address::Envelope,
    transport::smtp::{
        self,
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, SmtpTransport, Transport,
};
use log::debug;

use super::{message::render_message, parse_mailbox, probe, NOTIFY_LEVELS};
use crate::{AuthConfig, Entry, Hook, MailConfig, NotifyError, Severity, TlsMode};

/// Sends each entry over its own freshly authenticated SMTP session
///
/// Nothing is shared between sends, so this is safe to fire from many threads.
pub struct MailAuthNotifier {
    app_name: String,
    host: String,
    port: u16,
    from: Address,
    to: Address,
    username: String,
    password: String,
    timeout: Duration,
    tls: TlsMode,
}

impl MailAuthNotifier {
    pub fn new(
        app_name: &str,
        host: &str,
        port: u16,
        from: &str,
        to: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, NotifyError> {
        let auth = AuthConfig::new(username, password);
        Self::from_config(&MailConfig::new(app_name, host, port, from, to), &auth)
    }

    /// Validates both addresses then checks the server is listening
    ///
    /// No session is kept, the probe connection is closed before returning.
    pub fn from_config(config: &MailConfig, auth: &AuthConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox("sender", &config.from)?;
        let to = parse_mailbox("recipient", &config.to)?;
        let timeout = config.connect_timeout.into();
        probe(&config.host, config.port, timeout)?;

        Ok(Self {
            app_name: config.app_name.clone(),
            host: config.host.clone(),
            port: config.port,
            from,
            to,
            username: auth.username.clone(),
            password: auth.password.clone(),
            timeout,
            tls: config.tls,
        })
    }

    fn server(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn tls_parameters(&self) -> Result<TlsParameters, NotifyError> {
        TlsParameters::new(self.host.clone()).map_err(NotifyError::transport("TLS setup"))
    }

    fn transport(&self, credentials: Credentials) -> Result<SmtpTransport, NotifyError> {
        let tls = match self.tls {
            TlsMode::None => Tls::None,
            TlsMode::Opportunistic => Tls::Opportunistic(self.tls_parameters()?),
            TlsMode::Required => Tls::Required(self.tls_parameters()?),
            TlsMode::Wrapper => Tls::Wrapper(self.tls_parameters()?),
        };
        Ok(SmtpTransport::builder_dangerous(&self.host)
            .port(self.port)
            .timeout(Some(self.timeout))
            .tls(tls)
            .credentials(credentials)
            .build())
    }

    fn classify(&self, err: smtp::Error) -> NotifyError {
        if is_auth_rejection(&err) {
            NotifyError::Authentication {
                server: self.server(),
                source: err,
            }
        } else {
            NotifyError::transport("send")(err)
        }
    }
}

/// 530 (auth required), 534 (mechanism too weak) and 535 (bad credentials)
fn is_auth_rejection(err: &smtp::Error) -> bool {
    err.status()
        .is_some_and(|code| code.to_string().starts_with("53"))
        || err.to_string().to_lowercase().contains("authentication")
}

impl Hook for MailAuthNotifier {
    fn levels(&self) -> &[Severity] {
        &NOTIFY_LEVELS
    }

    fn fire(&self, entry: &Entry) -> Result<(), NotifyError> {
        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        let message = render_message(entry, &self.app_name);
        let envelope = Envelope::new(Some(self.from.clone()), vec![self.to.clone()])
            .map_err(NotifyError::transport("envelope"))?;

        debug!("Sending {} entry to {} as {}", entry.severity, self.server(), self.username);
        self.transport(credentials)?
            .send_raw(&envelope, message.as_bytes())
            .map_err(|e| self.classify(e))?;
        Ok(())
    }
}

impl fmt::Debug for MailAuthNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailAuthNotifier")
            .field("app_name", &self.app_name)
            .field("server", &self.server())
            .field("from", &self.from)
            .field("to", &self.to)
            .field("username", &self.username)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}
