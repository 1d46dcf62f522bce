//! Snapshot adapter: validate an upstream open-trades payload and normalize
//! it into [`Order`]s.
//!
//! # Success marker
//! A payload counts as a snapshot only when it is a JSON object with a
//! `result` key holding an array. An empty body, an error-shaped body, or a
//! body missing `result` is rejected here so that it can never be mistaken
//! for "zero open orders" (which would close every tracked order).
//!
//! # All-or-nothing
//! If any entry cannot be understood the whole snapshot is rejected. A
//! partially parsed snapshot would report the unparsed orders as closed.

use std::fmt;

use ow_schemas::{Order, OrderId};
use serde_json::Value;

/// Key carrying the open-orders array in a successful payload.
pub const RESULT_KEY: &str = "result";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// Payload is not a JSON object.
    NotAnObject,
    /// Upstream reported an error in-band (`error`, `errors`, or `status: "error"`).
    UpstreamError { message: String },
    /// Success marker absent.
    MissingResult,
    /// `result` present but not an array.
    ResultNotArray,
    /// Entry at `index` is not an object.
    EntryNotObject { index: usize },
    /// Entry at `index` has no usable `order_id`.
    BadOrderId { index: usize, raw: String },
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "snapshot payload is not a JSON object"),
            Self::UpstreamError { message } => write!(f, "upstream reported error: {message}"),
            Self::MissingResult => write!(f, "snapshot payload has no '{RESULT_KEY}' key"),
            Self::ResultNotArray => write!(f, "snapshot '{RESULT_KEY}' is not an array"),
            Self::EntryNotObject { index } => {
                write!(f, "snapshot entry {index} is not an object")
            }
            Self::BadOrderId { index, raw } => {
                write!(f, "snapshot entry {index} has unusable order_id {raw}")
            }
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Validate and normalize one open-trades payload.
pub fn parse_snapshot(payload: &Value) -> Result<Vec<Order>, SnapshotError> {
    let obj = payload.as_object().ok_or(SnapshotError::NotAnObject)?;

    if let Some(message) = upstream_error(obj) {
        return Err(SnapshotError::UpstreamError { message });
    }

    let entries = obj
        .get(RESULT_KEY)
        .ok_or(SnapshotError::MissingResult)?
        .as_array()
        .ok_or(SnapshotError::ResultNotArray)?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| normalize_entry(index, entry))
        .collect()
}

fn normalize_entry(index: usize, entry: &Value) -> Result<Order, SnapshotError> {
    let fields = entry
        .as_object()
        .ok_or(SnapshotError::EntryNotObject { index })?;

    let raw_id = fields.get("order_id").unwrap_or(&Value::Null);
    let order_id = OrderId::from_json(raw_id).ok_or_else(|| SnapshotError::BadOrderId {
        index,
        raw: raw_id.to_string(),
    })?;

    Ok(Order::new(
        order_id,
        text_field(fields.get("symbol")),
        text_field(fields.get("trade_type")),
        fields.get("open_price").cloned().unwrap_or(Value::Null),
        entry.clone(),
    ))
}

/// Strings verbatim; other scalars as their JSON text; absent/null as "".
fn text_field(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn upstream_error(obj: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["error", "errors"] {
        match obj.get(key) {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => return Some(s.clone()),
            Some(other) => return Some(other.to_string()),
        }
    }
    match obj.get("status").and_then(Value::as_str) {
        Some(s) if s.eq_ignore_ascii_case("error") => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .unwrap_or("status=error")
                .to_string(),
        ),
        _ => None,
    }
}
