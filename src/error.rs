use lettre::address::AddressError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Everything that can go wrong while building a notifier or delivering an entry
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Sender or recipient is not a valid mailbox. Raised at construction only
    #[error("invalid {role} address {value:?}")]
    Address {
        role: &'static str,
        value: String,
        #[source]
        source: AddressError,
    },

    #[error("unable to reach mail server at {server}")]
    Connectivity {
        server: String,
        #[source]
        source: BoxError,
    },

    #[error("mail server at {server} rejected the credentials")]
    Authentication {
        server: String,
        #[source]
        source: lettre::transport::smtp::Error,
    },

    #[error("mail transport failed during {stage}")]
    Transport {
        stage: &'static str,
        #[source]
        source: BoxError,
    },

    /// Another sender panicked while holding the shared session
    #[error("mail session lock poisoned")]
    Poisoned,
}

impl NotifyError {
    pub(crate) fn transport<E>(stage: &'static str) -> impl FnOnce(E) -> Self
    where
        E: Into<BoxError>,
    {
        move |source| Self::Transport {
            stage,
            source: source.into(),
        }
    }
}
