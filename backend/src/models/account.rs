use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// Database model for account holders
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccountRow {
    pub id: String,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountRow {
    /// Parsed form of the TEXT primary key.
    pub fn uuid(&self) -> Uuid {
        Uuid::parse_str(&self.id).unwrap()
    }

    pub fn to_shared(&self) -> shared::Account {
        shared::Account {
            id: self.uuid(),
            name: self.name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            avatar_url: self.avatar_url.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub async fn find_by_username(
        pool: &SqlitePool,
        username: &str,
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM accounts WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &SqlitePool,
        id: &Uuid,
    ) -> Result<Option<AccountRow>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(pool)
            .await
    }

    /// Overwrite the stored refresh token. `None` clears it, which revokes
    /// the current session. Returns the number of rows touched.
    pub async fn update_refresh_token(
        pool: &SqlitePool,
        id: &Uuid,
        token: Option<&str>,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE accounts SET refresh_token = ?, updated_at = ? WHERE id = ?",
        )
        .bind(token)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
