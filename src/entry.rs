use std::fmt::Display;

use chrono::{Local, NaiveDateTime};
use log::{
    kv::{self, Key, VisitSource},
    Level, Record,
};
use serde_json::{Map, Number, Value};

/// Ordered from most to least severe, so `Panic < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Panic,
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
            Severity::Error => "error",
            Severity::Warn => "warning",
            Severity::Info => "info",
            Severity::Debug => "debug",
            Severity::Trace => "trace",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl From<Level> for Severity {
    fn from(value: Level) -> Self {
        match value {
            Level::Error => Severity::Error,
            Level::Warn => Severity::Warn,
            Level::Info => Severity::Info,
            Level::Debug => Severity::Debug,
            Level::Trace => Severity::Trace,
        }
    }
}

/// A single structured log entry as handed to a hook
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub timestamp: NaiveDateTime,
    pub severity: Severity,
    pub message: String,
    /// Sorted by key
    pub fields: Map<String, Value>,
}

impl Entry {
    /// Creates an entry stamped with the current local time and no fields
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            severity,
            message: message.into(),
            fields: Map::new(),
        }
    }

    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Converts a `log` record, carrying over its key/value pairs as fields
    pub fn from_record(record: &Record) -> Self {
        let mut entry = Self::new(record.level().into(), record.args().to_string());
        let mut collector = FieldCollector(&mut entry.fields);
        // Best effort, a source that stops early just yields fewer fields
        let _ = record.key_values().visit(&mut collector);
        entry
    }
}

struct FieldCollector<'a>(&'a mut Map<String, Value>);

impl<'kvs> VisitSource<'kvs> for FieldCollector<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: kv::Value<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.to_string(), to_json(&value));
        Ok(())
    }
}

fn to_json(value: &kv::Value) -> Value {
    if let Some(b) = value.to_bool() {
        Value::Bool(b)
    } else if let Some(n) = value.to_u64() {
        n.into()
    } else if let Some(n) = value.to_i64() {
        n.into()
    } else if let Some(n) = value.to_f64() {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    } else if let Some(s) = value.to_borrowed_str() {
        s.into()
    } else {
        Value::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Severity::Panic, "panic")]
    #[case(Severity::Fatal, "fatal")]
    #[case(Severity::Error, "error")]
    #[case(Severity::Warn, "warning")]
    #[case(Severity::Info, "info")]
    #[case(Severity::Debug, "debug")]
    #[case(Severity::Trace, "trace")]
    fn severity_label(#[case] severity: Severity, #[case] expected: &str) {
        assert_eq!(severity.to_string(), expected);
    }

    #[test]
    fn severity_orders_most_severe_first() {
        assert!(Severity::Panic < Severity::Fatal);
        assert!(Severity::Fatal < Severity::Error);
        assert!(Severity::Error < Severity::Warn);
    }

    #[rstest]
    #[case(Level::Error, Severity::Error)]
    #[case(Level::Warn, Severity::Warn)]
    #[case(Level::Trace, Severity::Trace)]
    fn severity_from_level(#[case] level: Level, #[case] expected: Severity) {
        assert_eq!(Severity::from(level), expected);
    }

    #[test]
    fn from_record_collects_fields() {
        // Arrange
        let kvs: &[(&str, &dyn kv::ToValue)] = &[
            ("code", &7),
            ("retry", &false),
            ("path", &"/var"),
            ("delta", &-3),
        ];

        // Act
        let actual = Entry::from_record(
            &Record::builder()
                .level(Level::Error)
                .args(format_args!("disk full"))
                .key_values(&kvs)
                .build(),
        );

        // Assert
        assert_eq!(actual.severity, Severity::Error);
        assert_eq!(actual.message, "disk full");
        assert_eq!(
            Value::Object(actual.fields),
            json!({"code": 7, "retry": false, "path": "/var", "delta": -3})
        );
    }

    #[test]
    fn builder_sets_fields_and_timestamp() {
        let ts = NaiveDateTime::parse_from_str("2024-01-02 03:04:05", "%Y-%m-%d %H:%M:%S").unwrap();
        let entry = Entry::new(Severity::Fatal, "boom")
            .at(ts)
            .with_field("code", 7);
        assert_eq!(entry.timestamp, ts);
        assert_eq!(entry.fields.get("code"), Some(&json!(7)));
    }
}
