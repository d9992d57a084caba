//! Authorization storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::model::{AccountAuthorization, Authorization, GrantType, PendingAuthorization};
use crate::{Error, Result};

/// Repository for authorization storage and retrieval.
///
/// Owns the connector's only durable state: persisted authorizations, the
/// principal-to-authorization links, and pending (not yet finished)
/// authorization states.
#[derive(Debug, Clone)]
pub struct AuthorizationRepository {
    pool: SqlitePool,
}

impl AuthorizationRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS authorizations (
                authorization_id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                grant_type TEXT NOT NULL,
                token TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT 'null'
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS account_authorizations (
                account_identifier TEXT PRIMARY KEY,
                authorization_id TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS pending_states (
                state TEXT PRIMARY KEY,
                account_identifier TEXT NOT NULL,
                return_uri TEXT NOT NULL,
                issued_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Save (insert or replace) an authorization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or the token cannot be
    /// serialized.
    pub async fn save_authorization(&self, authorization: &Authorization) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO authorizations (authorization_id, client_id, grant_type, token, metadata)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(authorization_id) DO UPDATE SET
                client_id = excluded.client_id,
                grant_type = excluded.grant_type,
                token = excluded.token,
                metadata = excluded.metadata
            ",
        )
        .bind(&authorization.authorization_id)
        .bind(&authorization.client_id)
        .bind(authorization.grant_type.as_str())
        .bind(serde_json::to_string(&authorization.token)?)
        .bind(serde_json::to_string(&authorization.metadata)?)
        .execute(&self.pool)
        .await?;

        debug!(
            authorization_id = %authorization.authorization_id,
            "stored authorization"
        );
        Ok(())
    }

    /// Find an authorization by its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a stored record is
    /// corrupt.
    pub async fn find_authorization(&self, authorization_id: &str) -> Result<Option<Authorization>> {
        let row = sqlx::query(
            r"
            SELECT authorization_id, client_id, grant_type, token, metadata
            FROM authorizations
            WHERE authorization_id = ?
            ",
        )
        .bind(authorization_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let grant_type_raw: String = row.get("grant_type");
            let grant_type = GrantType::parse(&grant_type_raw).ok_or_else(|| {
                Error::Config(format!("unknown persisted grant type: {grant_type_raw}"))
            })?;
            Ok(Authorization {
                authorization_id: row.get("authorization_id"),
                client_id: row.get("client_id"),
                grant_type,
                token: serde_json::from_str(row.get("token"))?,
                metadata: serde_json::from_str(row.get("metadata"))?,
            })
        })
        .transpose()
    }

    /// Delete an authorization by its identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_authorization(&self, authorization_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM authorizations WHERE authorization_id = ?")
            .bind(authorization_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Link a principal to an authorization, replacing any previous link.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn link_account(&self, link: &AccountAuthorization) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO account_authorizations (account_identifier, authorization_id)
            VALUES (?, ?)
            ON CONFLICT(account_identifier) DO UPDATE SET
                authorization_id = excluded.authorization_id
            ",
        )
        .bind(&link.account_identifier)
        .bind(&link.authorization_id)
        .execute(&self.pool)
        .await?;

        debug!(account = %link.account_identifier, "linked account authorization");
        Ok(())
    }

    /// Find the authorization link for a principal.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_account_authorization(
        &self,
        account_identifier: &str,
    ) -> Result<Option<AccountAuthorization>> {
        let row = sqlx::query(
            r"
            SELECT account_identifier, authorization_id
            FROM account_authorizations
            WHERE account_identifier = ?
            ",
        )
        .bind(account_identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| AccountAuthorization {
            account_identifier: row.get("account_identifier"),
            authorization_id: row.get("authorization_id"),
        }))
    }

    /// Delete a principal's link and, cascading, its authorization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_account(&self, account_identifier: &str) -> Result<()> {
        if let Some(link) = self.find_account_authorization(account_identifier).await? {
            self.delete_authorization(&link.authorization_id).await?;
        }
        sqlx::query("DELETE FROM account_authorizations WHERE account_identifier = ?")
            .bind(account_identifier)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Persist a pending authorization state.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn put_pending_state(&self, pending: &PendingAuthorization) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO pending_states (state, account_identifier, return_uri, issued_at)
            VALUES (?, ?, ?, ?)
            ",
        )
        .bind(&pending.state)
        .bind(&pending.account_identifier)
        .bind(&pending.return_uri)
        .bind(pending.issued_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fetch and delete a pending state; each state is single use.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a stored timestamp
    /// is corrupt.
    pub async fn take_pending_state(&self, state: &str) -> Result<Option<PendingAuthorization>> {
        let row = sqlx::query(
            r"
            SELECT state, account_identifier, return_uri, issued_at
            FROM pending_states
            WHERE state = ?
            ",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM pending_states WHERE state = ?")
            .bind(state)
            .execute(&self.pool)
            .await?;

        let issued_at_raw: String = row.get("issued_at");
        let issued_at = chrono::DateTime::parse_from_rfc3339(&issued_at_raw)
            .map_err(|e| Error::Config(format!("corrupt pending state timestamp: {e}")))?
            .with_timezone(&chrono::Utc);

        Ok(Some(PendingAuthorization {
            state: row.get("state"),
            account_identifier: row.get("account_identifier"),
            return_uri: row.get("return_uri"),
            issued_at,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use canto_oauth::Token;
    use chrono::Utc;

    fn sample_authorization(id: &str) -> Authorization {
        Authorization {
            authorization_id: id.to_string(),
            client_id: "app".to_string(),
            grant_type: GrantType::AuthorizationCode,
            token: Token::new("access", "Bearer").with_refresh_token("refresh"),
            metadata: serde_json::json!({"account": "jdoe"}),
        }
    }

    #[tokio::test]
    async fn test_authorization_round_trip() {
        let repo = AuthorizationRepository::in_memory().await.unwrap();
        repo.save_authorization(&sample_authorization("auth-1"))
            .await
            .unwrap();

        let found = repo.find_authorization("auth-1").await.unwrap().unwrap();
        assert_eq!(found.client_id, "app");
        assert_eq!(found.token.access_token, "access");
        assert_eq!(found.metadata["account"], "jdoe");

        assert!(repo.find_authorization("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_supersedes_previous_authorization() {
        let repo = AuthorizationRepository::in_memory().await.unwrap();
        repo.save_authorization(&sample_authorization("auth-1"))
            .await
            .unwrap();

        let mut updated = sample_authorization("auth-1");
        updated.token = Token::new("newer", "Bearer");
        repo.save_authorization(&updated).await.unwrap();

        let found = repo.find_authorization("auth-1").await.unwrap().unwrap();
        assert_eq!(found.token.access_token, "newer");
    }

    #[tokio::test]
    async fn test_account_link_cascade_delete() {
        let repo = AuthorizationRepository::in_memory().await.unwrap();
        repo.save_authorization(&sample_authorization("auth-1"))
            .await
            .unwrap();
        repo.link_account(&AccountAuthorization {
            account_identifier: "jdoe".to_string(),
            authorization_id: "auth-1".to_string(),
        })
        .await
        .unwrap();

        let link = repo.find_account_authorization("jdoe").await.unwrap().unwrap();
        assert_eq!(link.authorization_id, "auth-1");

        repo.delete_account("jdoe").await.unwrap();
        assert!(repo.find_account_authorization("jdoe").await.unwrap().is_none());
        assert!(repo.find_authorization("auth-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_state_is_single_use() {
        let repo = AuthorizationRepository::in_memory().await.unwrap();
        repo.put_pending_state(&PendingAuthorization {
            state: "s1".to_string(),
            account_identifier: "jdoe".to_string(),
            return_uri: "https://example.net/media".to_string(),
            issued_at: Utc::now(),
        })
        .await
        .unwrap();

        let taken = repo.take_pending_state("s1").await.unwrap().unwrap();
        assert_eq!(taken.account_identifier, "jdoe");

        assert!(repo.take_pending_state("s1").await.unwrap().is_none());
    }
}
