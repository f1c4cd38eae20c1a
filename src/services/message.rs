use std::sync::Arc;

use log::debug;

use crate::{db::{MessageStore, StorageError}, models::Message};

pub const MAX_MESSAGE_LEN: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum MessageServiceError {
    #[error(transparent)]
    Storage(StorageError),
    #[error("message text must not be blank")]
    BlankMessage,
    #[error("message text must be at most 255 characters")]
    MessageTooLong,
    #[error("message author {0} does not exist")]
    UnknownAuthor(i32),
    #[error("message {0} does not exist")]
    MessageNotFound(i32),
}

impl From<StorageError> for MessageServiceError {
    fn from(storage_error: StorageError) -> Self {
        MessageServiceError::Storage(storage_error)
    }
}

#[derive(Debug, Clone)]
pub struct MessageRequest {
    pub posted_by: i32,
    pub text: String,
    pub time_posted_epoch: i64,
}

pub fn validate_text(text: &str) -> Result<(), MessageServiceError> {
    if text.trim().is_empty() {
        return Err(MessageServiceError::BlankMessage);
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(MessageServiceError::MessageTooLong);
    }
    Ok(())
}

#[async_trait::async_trait]
pub trait MessageService {
    async fn create(&self, message_request: &MessageRequest) -> Result<Message, MessageServiceError>;
    async fn list(&self) -> Result<Vec<Message>, MessageServiceError>;
    async fn list_by_account(&self, account_id: i32) -> Result<Vec<Message>, MessageServiceError>;
    async fn get(&self, message_id: i32) -> Result<Option<Message>, MessageServiceError>;
    async fn update_text(&self, message_id: i32, text: &str) -> Result<Message, MessageServiceError>;
    async fn delete(&self, message_id: i32) -> Result<Option<Message>, MessageServiceError>;
}

pub struct ImplMessageService<S> {
    storage: Arc<S>,
}

impl<S: MessageStore> ImplMessageService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }
}

#[async_trait::async_trait]
impl<S: MessageStore> MessageService for ImplMessageService<S> {
    async fn create(&self, message_request: &MessageRequest) -> Result<Message, MessageServiceError> {
        validate_text(&message_request.text)?;
        if message_request.posted_by <= 0 {
            return Err(MessageServiceError::UnknownAuthor(message_request.posted_by));
        }
        let result = self.storage
            .create_message(message_request.posted_by, &message_request.text, message_request.time_posted_epoch)
            .await;
        match result {
            Ok(message) => {
                debug!("Message {} posted by {}", message.id, message.posted_by);
                Ok(message)
            },
            Err(StorageError::ForeignKeyViolation) => Err(MessageServiceError::UnknownAuthor(message_request.posted_by)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<Message>, MessageServiceError> {
        Ok(self.storage.get_messages().await?)
    }

    async fn list_by_account(&self, account_id: i32) -> Result<Vec<Message>, MessageServiceError> {
        Ok(self.storage.get_messages_by_account(account_id).await?)
    }

    async fn get(&self, message_id: i32) -> Result<Option<Message>, MessageServiceError> {
        Ok(self.storage.get_message(message_id).await?)
    }

    async fn update_text(&self, message_id: i32, text: &str) -> Result<Message, MessageServiceError> {
        validate_text(text)?;
        self.storage
            .update_message_text(message_id, text)
            .await?
            .ok_or(MessageServiceError::MessageNotFound(message_id))
    }

    async fn delete(&self, message_id: i32) -> Result<Option<Message>, MessageServiceError> {
        let deleted = self.storage.delete_message(message_id).await?;
        if deleted.is_some() {
            debug!("Message {} deleted", message_id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory::MemoryStorage, AccountStore};

    async fn service_with_author() -> (ImplMessageService<MemoryStorage>, i32) {
        let storage = Arc::new(MemoryStorage::new());
        let author = storage.create_account("author", "hash").await.unwrap();
        (ImplMessageService::new(storage), author.id)
    }

    fn request(posted_by: i32, text: &str) -> MessageRequest {
        MessageRequest { posted_by, text: text.to_string(), time_posted_epoch: 1000 }
    }

    #[test]
    fn text_limits() {
        assert!(matches!(validate_text(""), Err(MessageServiceError::BlankMessage)));
        assert!(matches!(validate_text(" \t\n"), Err(MessageServiceError::BlankMessage)));
        assert!(validate_text(&"a".repeat(MAX_MESSAGE_LEN)).is_ok());
        assert!(matches!(validate_text(&"a".repeat(MAX_MESSAGE_LEN + 1)), Err(MessageServiceError::MessageTooLong)));
        // counted in characters, not bytes
        assert!(validate_text(&"é".repeat(MAX_MESSAGE_LEN)).is_ok());
    }

    #[tokio::test]
    async fn create_requires_an_existing_author() {
        let (service, author) = service_with_author().await;
        let message = service.create(&request(author, "hello")).await.unwrap();
        assert_eq!(message.posted_by, author);
        assert_eq!(message.text, "hello");
        assert_eq!(message.time_posted_epoch, 1000);

        assert!(matches!(service.create(&request(0, "hello")).await, Err(MessageServiceError::UnknownAuthor(0))));
        assert!(matches!(service.create(&request(999, "hello")).await, Err(MessageServiceError::UnknownAuthor(999))));
        assert_eq!(service.list().await.unwrap(), vec![message]);
    }

    #[tokio::test]
    async fn update_preserves_author_and_timestamp() {
        let (service, author) = service_with_author().await;
        let message = service.create(&request(author, "hello")).await.unwrap();

        let updated = service.update_text(message.id, "edited").await.unwrap();
        assert_eq!(updated.id, message.id);
        assert_eq!(updated.text, "edited");
        assert_eq!(updated.posted_by, message.posted_by);
        assert_eq!(updated.time_posted_epoch, message.time_posted_epoch);

        assert!(matches!(service.update_text(message.id, "").await, Err(MessageServiceError::BlankMessage)));
        assert!(matches!(service.update_text(404, "edited").await, Err(MessageServiceError::MessageNotFound(404))));
    }

    #[tokio::test]
    async fn delete_returns_snapshot_once() {
        let (service, author) = service_with_author().await;
        let message = service.create(&request(author, "hello")).await.unwrap();

        assert_eq!(service.delete(message.id).await.unwrap(), Some(message.clone()));
        assert_eq!(service.delete(message.id).await.unwrap(), None);
        assert_eq!(service.get(message.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_by_account_filters_on_author() {
        let storage = Arc::new(MemoryStorage::new());
        let alice = storage.create_account("alice", "hash").await.unwrap();
        let bob = storage.create_account("bob", "hash").await.unwrap();
        let service = ImplMessageService::new(storage);

        let from_alice = service.create(&request(alice.id, "from alice")).await.unwrap();
        service.create(&request(bob.id, "from bob")).await.unwrap();

        assert_eq!(service.list_by_account(alice.id).await.unwrap(), vec![from_alice]);
        assert_eq!(service.list().await.unwrap().len(), 2);
    }
}
