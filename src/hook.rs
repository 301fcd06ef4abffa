use std::{cell::Cell, fmt::Debug};

use anyhow::Context;
use log::Record;
use log4rs::append::Append;

use crate::{Entry, NotifyError, Severity};

/// Anything that wants to receive log entries of certain severities
pub trait Hook: Debug + Send + Sync {
    /// The severities this hook should be handed, the dispatcher filters on these
    fn levels(&self) -> &[Severity];

    fn fire(&self, entry: &Entry) -> Result<(), NotifyError>;
}

impl<H: Hook + ?Sized> Hook for Box<H> {
    fn levels(&self) -> &[Severity] {
        (**self).levels()
    }

    fn fire(&self, entry: &Entry) -> Result<(), NotifyError> {
        (**self).fire(entry)
    }
}

thread_local! {
    static FIRING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as firing until dropped, including on unwind
struct FiringGuard;

impl FiringGuard {
    fn enter() -> Self {
        FIRING.with(|firing| firing.set(true));
        Self
    }
}

impl Drop for FiringGuard {
    fn drop(&mut self) {
        FIRING.with(|firing| firing.set(false));
    }
}

/// Plugs a [`Hook`] into log4rs as an appender
///
/// Records outside the hook's interest set are ignored. Records logged while
/// the hook is firing on the same thread are not dispatched to it again.
#[derive(Debug)]
pub struct HookAppender<H> {
    hook: H,
}

impl<H: Hook + 'static> HookAppender<H> {
    pub fn new(hook: H) -> Self {
        Self { hook }
    }

    pub fn hook(&self) -> &H {
        &self.hook
    }
}

impl<H: Hook + 'static> Append for HookAppender<H> {
    fn append(&self, record: &Record) -> anyhow::Result<()> {
        let severity = Severity::from(record.level());
        if !self.hook.levels().contains(&severity) || FIRING.with(Cell::get) {
            return Ok(());
        }

        let entry = Entry::from_record(record);
        let result = {
            let _guard = FiringGuard::enter();
            self.hook.fire(&entry)
        };
        result.context("Failed to deliver log entry via hook")
    }

    fn flush(&self) {}
}
