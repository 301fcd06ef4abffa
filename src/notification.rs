mod email;
mod email_auth;
mod message;

use std::{
    net::{TcpStream, ToSocketAddrs},
    time::Duration,
};

use lettre::{message::Mailbox, Address};
use log::debug;

pub use email::MailNotifier;
pub use email_auth::MailAuthNotifier;
pub use message::render_message;

use crate::{NotifyError, Severity};

/// Severities both notifiers want delivered
pub(crate) const NOTIFY_LEVELS: [Severity; 3] = [Severity::Error, Severity::Fatal, Severity::Panic];

/// Accepts `addr@host` as well as `Name <addr@host>`
pub(crate) fn parse_mailbox(role: &'static str, value: &str) -> Result<Address, NotifyError> {
    value
        .parse::<Mailbox>()
        .map(|mailbox| mailbox.email)
        .map_err(|source| NotifyError::Address {
            role,
            value: value.to_string(),
            source,
        })
}

/// Checks that something is listening on `host:port`, closing the connection straight away
pub(crate) fn probe(host: &str, port: u16, timeout: Duration) -> Result<(), NotifyError> {
    let server = format!("{host}:{port}");
    debug!("Probing {server} with a timeout of {timeout:?}");
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| NotifyError::Connectivity {
            server: server.clone(),
            source: e.into(),
        })?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_stream) => {
                debug!("Probe of {server} succeeded via {addr}");
                return Ok(());
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(NotifyError::Connectivity {
        source: match last_err {
            Some(e) => e.into(),
            None => format!("{server} did not resolve to any address").into(),
        },
        server,
    })
}
