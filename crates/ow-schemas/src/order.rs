use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Largest integer magnitude an `f64` represents exactly (2^53).
const MAX_EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

/// Canonical order identifier.
///
/// Upstream payloads are not consistent about the JSON type of `order_id`:
/// the same order may be reported as `12345` in one snapshot and `"12345"`
/// in the next. Every identifier is therefore reduced to a single textual
/// form before it is compared or stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Build an id from text. Surrounding whitespace is stripped; an empty
    /// result is not a valid id.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    /// Canonicalize a JSON identifier value.
    ///
    /// - strings are trimmed
    /// - integers render as plain decimal text
    /// - floats are accepted only when integral and exactly representable
    ///   (`12345.0` becomes `"12345"`)
    /// - null, bool, arrays and objects are rejected
    pub fn from_json(v: &Value) -> Option<Self> {
        match v {
            Value::String(s) => Self::new(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    return Some(Self(i.to_string()));
                }
                if let Some(u) = n.as_u64() {
                    return Some(Self(u.to_string()));
                }
                let f = n.as_f64()?;
                if f.is_finite() && f.fract() == 0.0 && f.abs() < MAX_EXACT_F64_INT {
                    Some(Self((f as i64).to_string()))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Accepts the same JSON forms as [`OrderId::from_json`], so state files
/// that stored numeric ids still load.
impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        OrderId::from_json(&v)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid order id: {v}")))
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One open order as reported by a snapshot.
///
/// `open_price` stays a raw JSON value so the number is written back out
/// exactly as the source sent it. `raw` is the complete source entry,
/// preserved verbatim and never interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub symbol: String,
    pub trade_type: String,
    pub open_price: Value,
    pub raw: Value,
}

impl Order {
    pub fn new(
        order_id: OrderId,
        symbol: impl Into<String>,
        trade_type: impl Into<String>,
        open_price: Value,
        raw: Value,
    ) -> Self {
        Self {
            order_id,
            symbol: symbol.into(),
            trade_type: trade_type.into(),
            open_price,
            raw,
        }
    }
}
