use log::info;
use sqlx::postgres::PgPoolOptions;
use types::{DbAccount, DbMessage};

use crate::{config::DatabaseConfig, models};

#[cfg(test)]
pub mod memory;
mod types;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("foreign key constraint violated")]
    ForeignKeyViolation,
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("database error: {0}")]
    Internal(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        if let Some(db_error) = error.as_database_error() {
            if db_error.is_unique_violation() {
                return StorageError::UniqueViolation;
            }
            if db_error.is_foreign_key_violation() {
                return StorageError::ForeignKeyViolation;
            }
        }
        StorageError::Internal(error)
    }
}

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn username_exists(&self, username: &str) -> Result<bool, StorageError>;
    /// Fails with `UniqueViolation` when the username is already registered.
    async fn create_account(&self, username: &str, password_hash: &str) -> Result<models::Account, StorageError>;
    async fn get_account_by_username(&self, username: &str) -> Result<Option<models::Account>, StorageError>;
}

#[async_trait::async_trait]
pub trait MessageStore: Send + Sync {
    /// Fails with `ForeignKeyViolation` when `posted_by` is not a known account.
    async fn create_message(&self, posted_by: i32, text: &str, time_posted_epoch: i64) -> Result<models::Message, StorageError>;
    async fn get_messages(&self) -> Result<Vec<models::Message>, StorageError>;
    async fn get_messages_by_account(&self, account_id: i32) -> Result<Vec<models::Message>, StorageError>;
    async fn get_message(&self, message_id: i32) -> Result<Option<models::Message>, StorageError>;
    async fn update_message_text(&self, message_id: i32, text: &str) -> Result<Option<models::Message>, StorageError>;
    /// Returns the row as it was before deletion.
    async fn delete_message(&self, message_id: i32) -> Result<Option<models::Message>, StorageError>;
}

pub struct Storage {
    pool: sqlx::Pool<sqlx::Postgres>,
}

impl Storage {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        info!("Connected to the database");
        Ok(Storage { pool })
    }

    #[cfg(test)]
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Storage { pool }
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait::async_trait]
impl AccountStore for Storage {
    async fn username_exists(&self, username: &str) -> Result<bool, StorageError> {
        let exists: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1
                    FROM public.account
                    WHERE username = $1
                )
                "#,
            )
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn create_account(&self, username: &str, password_hash: &str) -> Result<models::Account, StorageError> {
        let db_account = sqlx::query_as::<_, DbAccount>(
                r#"
                INSERT INTO public.account (username, password)
                    VALUES ($1, $2)
                    RETURNING *
                "#,
            )
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(db_account.into())
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<models::Account>, StorageError> {
        let db_account = sqlx::query_as::<_, DbAccount>(
                r#"
                SELECT public.account.*
                    FROM public.account
                    WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(db_account.map(Into::into))
    }
}

#[async_trait::async_trait]
impl MessageStore for Storage {
    async fn create_message(&self, posted_by: i32, text: &str, time_posted_epoch: i64) -> Result<models::Message, StorageError> {
        let db_message = sqlx::query_as::<_, DbMessage>(
                r#"
                INSERT INTO public.message (posted_by, message_text, time_posted_epoch)
                    VALUES ($1, $2, $3)
                    RETURNING *
                "#,
            )
            .bind(posted_by)
            .bind(text)
            .bind(time_posted_epoch)
            .fetch_one(&self.pool)
            .await?;
        Ok(db_message.into())
    }

    async fn get_messages(&self) -> Result<Vec<models::Message>, StorageError> {
        let db_messages = sqlx::query_as::<_, DbMessage>(
                r#"
                SELECT public.message.*
                    FROM public.message
                    ORDER BY message_id
                "#,
            )
            .fetch_all(&self.pool)
            .await?;
        Ok(db_messages.into_iter().map(Into::into).collect())
    }

    async fn get_messages_by_account(&self, account_id: i32) -> Result<Vec<models::Message>, StorageError> {
        let db_messages = sqlx::query_as::<_, DbMessage>(
                r#"
                SELECT public.message.*
                    FROM public.message
                    WHERE posted_by = $1
                    ORDER BY message_id
                "#,
            )
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(db_messages.into_iter().map(Into::into).collect())
    }

    async fn get_message(&self, message_id: i32) -> Result<Option<models::Message>, StorageError> {
        let db_message = sqlx::query_as::<_, DbMessage>(
                r#"
                SELECT public.message.*
                    FROM public.message
                    WHERE message_id = $1
                "#,
            )
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(db_message.map(Into::into))
    }

    async fn update_message_text(&self, message_id: i32, text: &str) -> Result<Option<models::Message>, StorageError> {
        let db_message = sqlx::query_as::<_, DbMessage>(
                r#"
                UPDATE public.message
                    SET message_text = $1
                    WHERE message_id = $2
                    RETURNING *
                "#,
            )
            .bind(text)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(db_message.map(Into::into))
    }

    async fn delete_message(&self, message_id: i32) -> Result<Option<models::Message>, StorageError> {
        let db_message = sqlx::query_as::<_, DbMessage>(
                r#"
                DELETE FROM public.message
                    WHERE message_id = $1
                    RETURNING *
                "#,
            )
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(db_message.map(Into::into))
    }
}
