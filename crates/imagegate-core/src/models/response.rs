use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Outbound response handed back to the front door.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl ResponseEnvelope {
    pub fn new(status_code: u16, body: String, is_base64_encoded: bool) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body,
            is_base64_encoded,
        }
    }

    /// Set a header, replacing any existing header with the same name in any case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut envelope = ResponseEnvelope::new(200, String::new(), true);
        envelope.set_header("Cache-Control", "max-age=60");
        envelope.set_header("cache-control", "no-store");
        assert_eq!(envelope.headers.len(), 1);
        assert_eq!(envelope.header("CACHE-CONTROL"), Some("no-store"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let envelope = ResponseEnvelope::new(404, "{}".to_string(), false);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["statusCode"], 404);
        assert_eq!(json["isBase64Encoded"], false);
    }
}
