use log::debug;
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Map, Value};

use crate::Entry;

const TIME_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Renders an entry into the bytes handed to the mail server as the DATA payload
///
/// Layout is `Subject:<app> - <severity>\r\n\r\n<time> - <message>\r\n\r\n<fields>`
/// where fields are tab indented JSON. No other headers are emitted, routing is
/// carried by the SMTP envelope.
pub fn render_message(entry: &Entry, app_name: &str) -> String {
    let title = format!("{app_name} - {}", entry.severity);
    let body = format!(
        "{} - {}",
        entry.timestamp.format(TIME_FORMAT),
        entry.message
    );
    let fields = format_fields(&entry.fields);
    format!("Subject:{title}\r\n\r\n{body}\r\n\r\n{fields}")
}

/// Falls back to an empty block if serialization fails
fn format_fields(fields: &Map<String, Value>) -> String {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    if let Err(e) = fields.serialize(&mut serializer) {
        debug!("Dropping fields block that failed to serialize: {e}");
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
