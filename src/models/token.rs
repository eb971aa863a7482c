use serde::{Serialize, Deserialize};

/// Opaque one-time booking credential. Kept as its own type so token
/// values and slot identifiers never mix, even when a deployment reuses
/// the same literal string for both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(value: impl Into<String>) -> Self {
        TokenId(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Unregistered,
    Free,
    Used,
}

impl TokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::Unregistered => "unregistered",
            TokenState::Free => "free",
            TokenState::Used => "used",
        }
    }
}
