//! Model output normalization

use serde_json::Value;

/// Model output after normalization
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedRecord {
    /// Output parsed as JSON
    Parsed(Value),
    /// Output that could not be parsed, kept verbatim
    Fallback { raw: String },
}

/// Strip code-fence markers and parse the remainder as JSON
///
/// Every `` ```json `` and `` ``` `` occurrence is removed, not only leading
/// and trailing ones. Never fails: unparseable text becomes
/// [`ExtractedRecord::Fallback`].
#[must_use]
pub fn normalize(raw: &str) -> ExtractedRecord {
    let cleaned = raw.replace("```json", "").replace("```", "");

    match serde_json::from_str(cleaned.trim()) {
        Ok(value) => ExtractedRecord::Parsed(value),
        Err(e) => {
            tracing::debug!(error = %e, "model output is not JSON");
            ExtractedRecord::Fallback { raw: raw.to_string() }
        }
    }
}

impl ExtractedRecord {
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// JSON form; the fallback becomes `{"error": true, "raw": ...}`
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Parsed(value) => value.clone(),
            Self::Fallback { raw } => serde_json::json!({ "error": true, "raw": raw }),
        }
    }

    fn field(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Parsed(value) => value.get(key).filter(|v| !v.is_null()),
            Self::Fallback { .. } => None,
        }
    }

    /// String field; numbers and booleans are rendered as text
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<String> {
        match self.field(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Numeric field; numeric strings are accepted
    #[must_use]
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        match self.field(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Field as JSON text if structured, as-is if a string
    #[must_use]
    pub fn text_or_json_field(&self, key: &str) -> Option<String> {
        match self.field(key)? {
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The message the model wrote for the user
    #[must_use]
    pub fn reply_to_user(&self) -> Option<String> {
        self.str_field("reply_to_user").filter(|s| !s.trim().is_empty())
    }
}
