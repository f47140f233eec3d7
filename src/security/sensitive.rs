use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// A wrapper that keeps secrets out of `Debug` / `Display` output and
/// serialized configuration dumps.
#[derive(Clone, Eq, PartialEq, Hash, Deserialize)]
#[serde(transparent)]
pub struct Sensitive<T>(pub T);

impl<T> Sensitive<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> fmt::Display for Sensitive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl<T> Serialize for Sensitive<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts() {
        let s = Sensitive("admin-token-123".to_string());
        let out = format!("{s:?} {s}");
        assert!(!out.contains("admin-token-123"));
        assert!(out.contains("REDACTED"));
    }

    #[test]
    fn deserializes_transparently_and_serializes_redacted() {
        let s: Sensitive<String> = serde_json::from_str("\"k3y\"").unwrap();
        assert_eq!(s.expose(), "k3y");
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"[REDACTED]\"");
    }
}
