//! Cache key identifying a governed endpoint.

use serde::{Deserialize, Serialize};

/// A key that uniquely identifies one governed endpoint.
///
/// The key keeps `system` and `endpoint` apart so two different pairs can
/// never share cached state, even when their concatenations are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GateKey {
    /// Name of the remote service
    pub system: String,
    /// Name or path of the governed resource
    pub endpoint: String,
}

impl GateKey {
    /// Create a new gate key.
    pub fn new(system: &str, endpoint: &str) -> Self {
        Self {
            system: system.to_string(),
            endpoint: endpoint.to_string(),
        }
    }

    /// Convert the key to a flat string for string-keyed cache backends.
    ///
    /// Format: "{len(system)}:{system}|{endpoint}". The length prefix makes
    /// the encoding unambiguous whatever characters either part contains.
    pub fn to_cache_key(&self) -> String {
        format!("{}:{}|{}", self.system.len(), self.system, self.endpoint)
    }
}

impl std::fmt::Display for GateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.system, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_format() {
        let key = GateKey::new("github", "/users");
        assert_eq!(key.to_cache_key(), "6:github|/users");
    }

    #[test]
    fn test_concatenation_collisions_do_not_alias() {
        let a = GateKey::new("ab", "c");
        let b = GateKey::new("a", "bc");

        assert_ne!(a, b);
        assert_ne!(a.to_cache_key(), b.to_cache_key());
    }

    #[test]
    fn test_separator_inside_parts_does_not_alias() {
        let a = GateKey::new("api|v2", "/search");
        let b = GateKey::new("api", "v2|/search");

        assert_eq!(a.to_cache_key(), "6:api|v2|/search");
        assert_ne!(a.to_cache_key(), b.to_cache_key());
    }

    #[test]
    fn test_display_reads_like_endpoint() {
        let key = GateKey::new("github", "/users");
        assert_eq!(key.to_string(), "github/users");
    }
}
