//! Caller authorization.

use std::collections::HashSet;

use crate::db::Database;

/// Decides whether a caller token may issue tickets.
pub trait TokenValidator {
    fn is_valid(&self, token: &str) -> bool;
}

/// Tokens are rows in `api_tokens`; storage failures deny access.
impl TokenValidator for Database {
    fn is_valid(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        match self.is_token_active(token) {
            Ok(active) => active,
            Err(e) => {
                tracing::error!(error = %e, "Token lookup failed, denying access");
                false
            }
        }
    }
}

/// Fixed set of accepted tokens.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashSet<String>,
}

impl StaticTokens {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

impl TokenValidator for StaticTokens {
    fn is_valid(&self, token: &str) -> bool {
        !token.is_empty() && self.tokens.contains(token)
    }
}
