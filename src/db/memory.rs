//! In-memory stand-in for [`Storage`](super::Storage) that enforces the same
//! unique and foreign key constraints as the PostgreSQL schema.

use tokio::sync::RwLock;

use crate::models;

use super::{AccountStore, MessageStore, StorageError};

#[derive(Default)]
struct Tables {
    accounts: Vec<models::Account>,
    messages: Vec<models::Message>,
    next_account_id: i32,
    next_message_id: i32,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryStorage {
    async fn username_exists(&self, username: &str) -> Result<bool, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.iter().any(|account| account.username == username))
    }

    async fn create_account(&self, username: &str, password_hash: &str) -> Result<models::Account, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.accounts.iter().any(|account| account.username == username) {
            return Err(StorageError::UniqueViolation);
        }
        tables.next_account_id += 1;
        let account = models::Account {
            id: tables.next_account_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        tables.accounts.push(account.clone());
        Ok(account)
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<models::Account>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.iter().find(|account| account.username == username).cloned())
    }
}

#[async_trait::async_trait]
impl MessageStore for MemoryStorage {
    async fn create_message(&self, posted_by: i32, text: &str, time_posted_epoch: i64) -> Result<models::Message, StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.accounts.iter().any(|account| account.id == posted_by) {
            return Err(StorageError::ForeignKeyViolation);
        }
        tables.next_message_id += 1;
        let message = models::Message {
            id: tables.next_message_id,
            posted_by,
            text: text.to_string(),
            time_posted_epoch,
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn get_messages(&self) -> Result<Vec<models::Message>, StorageError> {
        Ok(self.tables.read().await.messages.clone())
    }

    async fn get_messages_by_account(&self, account_id: i32) -> Result<Vec<models::Message>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().filter(|message| message.posted_by == account_id).cloned().collect())
    }

    async fn get_message(&self, message_id: i32) -> Result<Option<models::Message>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.messages.iter().find(|message| message.id == message_id).cloned())
    }

    async fn update_message_text(&self, message_id: i32, text: &str) -> Result<Option<models::Message>, StorageError> {
        let mut tables = self.tables.write().await;
        Ok(tables.messages.iter_mut().find(|message| message.id == message_id).map(|message| {
            message.text = text.to_string();
            message.clone()
        }))
    }

    async fn delete_message(&self, message_id: i32) -> Result<Option<models::Message>, StorageError> {
        let mut tables = self.tables.write().await;
        let position = tables.messages.iter().position(|message| message.id == message_id);
        Ok(position.map(|index| tables.messages.remove(index)))
    }
}
