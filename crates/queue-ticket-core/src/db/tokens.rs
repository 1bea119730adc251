//! API token database operations.

use rusqlite::OptionalExtension;

use super::{Database, DbResult};

impl Database {
    /// Register an active API token.
    pub fn add_api_token(&self, token: &str) -> DbResult<()> {
        self.conn.execute(
            "INSERT INTO api_tokens (token, active) VALUES (?, 1) ON CONFLICT(token) DO UPDATE SET active = 1",
            [token],
        )?;
        Ok(())
    }

    /// Deactivate an API token. Returns false if it was unknown.
    pub fn revoke_api_token(&self, token: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("UPDATE api_tokens SET active = 0 WHERE token = ?", [token])?;
        Ok(rows_affected > 0)
    }

    /// Whether the token exists and is active.
    pub fn is_token_active(&self, token: &str) -> DbResult<bool> {
        let active: Option<bool> = self
            .conn
            .query_row("SELECT active FROM api_tokens WHERE token = ?", [token], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(active.unwrap_or(false))
    }
}
