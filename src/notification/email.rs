use std::{fmt, sync::Mutex};

use lettre::{
    transport::smtp::{
        client::SmtpConnection,
        commands::{Data, Mail, Rcpt, Rset},
        extension::ClientId,
    },
    Address,
};
use log::debug;

use super::{message::render_message, parse_mailbox, NOTIFY_LEVELS};
use crate::{Entry, Hook, MailConfig, NotifyError, Severity};

/// Sends entries over one unauthenticated SMTP session opened at construction
///
/// The session is guarded by a mutex so concurrent sends are serialized. There
/// is no reconnect, once the server drops the session every send fails.
pub struct MailNotifier {
    app_name: String,
    server: String,
    from: Address,
    to: Address,
    session: Mutex<Session>,
}

struct Session {
    conn: SmtpConnection,
    /// MAIL FROM and RCPT TO have been accepted for the next message
    addressed: bool,
}

impl Session {
    fn address(&mut self, from: &Address, to: &Address) -> Result<(), NotifyError> {
        self.conn
            .command(Mail::new(Some(from.clone()), vec![]))
            .map_err(NotifyError::transport("MAIL FROM"))?;
        self.conn
            .command(Rcpt::new(to.clone(), vec![]))
            .map_err(NotifyError::transport("RCPT TO"))?;
        self.addressed = true;
        Ok(())
    }

    /// Clears whatever is left of the previous transaction before addressing again
    fn readdress(&mut self, from: &Address, to: &Address) -> Result<(), NotifyError> {
        self.conn
            .command(Rset)
            .map_err(NotifyError::transport("RSET"))?;
        self.address(from, to)
    }

    fn deliver(&mut self, message: &[u8]) -> Result<(), NotifyError> {
        // The server closes the transaction after DATA whatever the outcome
        self.addressed = false;
        self.conn
            .command(Data)
            .map_err(NotifyError::transport("DATA"))?;
        self.conn
            .message(message)
            .map_err(NotifyError::transport("message write"))?;
        Ok(())
    }
}

impl MailNotifier {
    pub fn new(app_name: &str, host: &str, port: u16, from: &str, to: &str) -> Result<Self, NotifyError> {
        Self::from_config(&MailConfig::new(app_name, host, port, from, to))
    }

    /// Validates both addresses, dials the server and declares the envelope
    ///
    /// Addresses are checked before any network I/O so a bad address never
    /// leaves a connection behind. Credentials and TLS settings are ignored.
    pub fn from_config(config: &MailConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox("sender", &config.from)?;
        let to = parse_mailbox("recipient", &config.to)?;
        let server = format!("{}:{}", config.host, config.port);

        debug!("Opening mail session to {server}");
        let conn = SmtpConnection::connect(
            (config.host.as_str(), config.port),
            Some(config.connect_timeout.into()),
            &ClientId::default(),
            None,
            None,
        )
        .map_err(|e| NotifyError::Connectivity {
            server: server.clone(),
            source: e.into(),
        })?;

        let mut session = Session {
            conn,
            addressed: false,
        };
        session.address(&from, &to)?;
        debug!("Mail session to {server} addressed from {from} to {to}");

        Ok(Self {
            app_name: config.app_name.clone(),
            server,
            from,
            to,
            session: Mutex::new(session),
        })
    }

    /// Ends the session with QUIT. Dropping the notifier instead just drops the socket
    pub fn close(self) -> Result<(), NotifyError> {
        let mut session = self.session.into_inner().map_err(|_| NotifyError::Poisoned)?;
        debug!("Closing mail session to {}", self.server);
        session
            .conn
            .quit()
            .map_err(NotifyError::transport("QUIT"))?;
        Ok(())
    }
}

impl Hook for MailNotifier {
    fn levels(&self) -> &[Severity] {
        &NOTIFY_LEVELS
    }

    fn fire(&self, entry: &Entry) -> Result<(), NotifyError> {
        let mut session = self.session.lock().map_err(|_| NotifyError::Poisoned)?;
        if !session.addressed {
            session.readdress(&self.from, &self.to)?;
        }
        let message = render_message(entry, &self.app_name);
        debug!("Sending {} entry to {}", entry.severity, self.server);
        session.deliver(message.as_bytes())
    }
}

impl fmt::Debug for MailNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailNotifier")
            .field("app_name", &self.app_name)
            .field("server", &self.server)
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}
