use std::sync::Arc;

use log::debug;

use crate::{db::{AccountStore, StorageError}, models::Account, password};

const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    #[error(transparent)]
    Storage(StorageError),
    #[error("username must not be blank")]
    BlankUsername,
    #[error("password must be at least 4 characters")]
    PasswordTooShort,
    #[error("username is already taken")]
    UsernameTaken,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

impl From<StorageError> for AccountServiceError {
    fn from(storage_error: StorageError) -> Self {
        AccountServiceError::Storage(storage_error)
    }
}

pub fn validate_account(username: &str, password: &str) -> Result<(), AccountServiceError> {
    if username.trim().is_empty() {
        return Err(AccountServiceError::BlankUsername);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AccountServiceError::PasswordTooShort);
    }
    Ok(())
}

#[async_trait::async_trait]
pub trait AccountService {
    async fn username_exists(&self, username: &str) -> Result<bool, AccountServiceError>;
    async fn register(&self, username: &str, password: &str) -> Result<Account, AccountServiceError>;
    async fn login(&self, username: &str, password: &str) -> Result<Account, AccountServiceError>;
}

pub struct ImplAccountService<S> {
    storage: Arc<S>,
}

impl<S: AccountStore> ImplAccountService<S> {
    pub fn new(storage: Arc<S>) -> Self {
        ImplAccountService { storage }
    }
}

#[async_trait::async_trait]
impl<S: AccountStore> AccountService for ImplAccountService<S> {
    async fn username_exists(&self, username: &str) -> Result<bool, AccountServiceError> {
        Ok(self.storage.username_exists(username).await?)
    }

    async fn register(&self, username: &str, password: &str) -> Result<Account, AccountServiceError> {
        validate_account(username, password)?;
        if self.username_exists(username).await? {
            return Err(AccountServiceError::UsernameTaken);
        }
        let password_hash = password::hash_password(password)
            .map_err(|e| AccountServiceError::Hashing(e.to_string()))?;
        match self.storage.create_account(username, &password_hash).await {
            Ok(account) => {
                debug!("Registered account {} ({})", account.id, account.username);
                Ok(account)
            },
            // lost the race against a concurrent registration
            Err(StorageError::UniqueViolation) => Err(AccountServiceError::UsernameTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn login(&self, username: &str, password: &str) -> Result<Account, AccountServiceError> {
        let account = self.storage.get_account_by_username(username).await?;
        match account {
            Some(account) if password::verify_password(password, &account.password_hash) => Ok(account),
            _ => Err(AccountServiceError::InvalidCredentials),
        }
    }
}
