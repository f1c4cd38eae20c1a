use crate::models;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbAccount {
    pub account_id: i32,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbMessage {
    pub message_id: i32,
    pub posted_by: i32,
    pub message_text: String,
    pub time_posted_epoch: i64,
}

impl From<DbAccount> for models::Account {
    fn from(db_account: DbAccount) -> Self {
        models::Account {
            id: db_account.account_id,
            username: db_account.username,
            password_hash: db_account.password,
        }
    }
}

impl From<DbMessage> for models::Message {
    fn from(db_message: DbMessage) -> Self {
        models::Message {
            id: db_message.message_id,
            posted_by: db_message.posted_by,
            text: db_message.message_text,
            time_posted_epoch: db_message.time_posted_epoch,
        }
    }
}
