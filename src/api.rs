use std::sync::Arc;

use axum::{
    extract::{rejection::{JsonRejection, PathRejection}, FromRequest, FromRequestParts, Path, Request, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::signal;

use crate::{
    db::{AccountStore, MessageStore, Storage, StorageError},
    models::{Account, Message},
    services::{
        account::{AccountService, AccountServiceError, ImplAccountService},
        message::{ImplMessageService, MessageRequest, MessageService, MessageServiceError},
    },
};

/// Anything the handlers can persist accounts and messages through.
pub trait Store: AccountStore + MessageStore + 'static {}

impl<T: AccountStore + MessageStore + 'static> Store for T {}

pub struct AppState<S> {
    pub storage: Arc<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self { storage: self.storage.clone() }
    }
}

pub fn router<S: Store>(storage: Arc<S>) -> Router {
    Router::new()
        .route("/register", post(register::<S>))
        .route("/login", post(login::<S>))
        .route("/messages", post(create_message::<S>).get(get_messages::<S>))
        .route("/messages/{message_id}", get(get_message::<S>).patch(update_message::<S>).delete(delete_message::<S>))
        .route("/accounts/{user_id}/messages", get(get_account_messages::<S>))
        .with_state(AppState { storage })
}

pub async fn run(bind_address: &str, storage: Arc<Storage>) -> std::io::Result<()> {
    let app = router(storage);

    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("Received Ctrl+C, shutting down"),
        _ = terminate => warn!("Received SIGTERM, shutting down"),
    }
}

/// Failures carry no body; the status code is the whole contract.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] StorageError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Invalid(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) | ApiError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected: {}", self);
        }
        status.into_response()
    }
}

impl From<AccountServiceError> for ApiError {
    fn from(error: AccountServiceError) -> Self {
        match error {
            AccountServiceError::Storage(e) => ApiError::Internal(e),
            AccountServiceError::BlankUsername | AccountServiceError::PasswordTooShort => ApiError::Invalid(error.to_string()),
            AccountServiceError::UsernameTaken => ApiError::Conflict(error.to_string()),
            AccountServiceError::InvalidCredentials => ApiError::Unauthorized,
            AccountServiceError::Hashing(e) => ApiError::Unexpected(e),
        }
    }
}

impl From<MessageServiceError> for ApiError {
    fn from(error: MessageServiceError) -> Self {
        match error {
            MessageServiceError::Storage(e) => ApiError::Internal(e),
            MessageServiceError::BlankMessage
            | MessageServiceError::MessageTooLong
            | MessageServiceError::UnknownAuthor(_)
            | MessageServiceError::MessageNotFound(_) => ApiError::Invalid(error.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Invalid(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::Invalid(rejection.body_text())
    }
}

/// `Json` whose rejections (bad syntax, wrong field types, missing content type)
/// become a bodyless 400 instead of axum's descriptive 4xx.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}

/// Integer id from the single path segment, rejected the same way as bodies.
pub struct PathId(pub i32);

impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i32>::from_request_parts(parts, state).await?;
        Ok(PathId(id))
    }
}

/// A missing message is still a 200, just without a body.
fn json_or_empty<T: Serialize>(value: Option<T>) -> Response {
    match value {
        Some(value) => Json(value).into_response(),
        None => StatusCode::OK.into_response(),
    }
}

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct AccountResponse {
    pub account_id: i32,
    pub username: String,
    pub password: String,
}

impl AccountResponse {
    /// Only the hash is stored, so the password echoed back is the one the caller just proved.
    fn new(account: Account, password: String) -> Self {
        Self {
            account_id: account.id,
            username: account.username,
            password,
        }
    }
}

#[derive(Deserialize)]
pub struct CreateMessageRequest {
    pub posted_by: Option<i32>,
    pub message_text: Option<String>,
    pub time_posted_epoch: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateMessageRequest {
    pub message_text: Option<String>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct MessageResponse {
    pub message_id: i32,
    pub posted_by: i32,
    pub message_text: String,
    pub time_posted_epoch: i64,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.id,
            posted_by: message.posted_by,
            message_text: message.text,
            time_posted_epoch: message.time_posted_epoch,
        }
    }
}

fn to_responses(messages: Vec<Message>) -> Json<Vec<MessageResponse>> {
    Json(messages.into_iter().map(Into::into).collect())
}

pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_service = ImplAccountService::new(state.storage.clone());
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let account = account_service.register(&username, &password).await?;
    Ok(Json(AccountResponse::new(account, password)))
}

pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<CredentialsRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_service = ImplAccountService::new(state.storage.clone());
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();
    let account = account_service.login(&username, &password).await?;
    Ok(Json(AccountResponse::new(account, password)))
}

pub async fn create_message<S: Store>(
    State(state): State<AppState<S>>,
    JsonBody(payload): JsonBody<CreateMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message_service = ImplMessageService::new(state.storage.clone());
    let message_request = MessageRequest {
        posted_by: payload.posted_by.unwrap_or_default(),
        text: payload.message_text.unwrap_or_default(),
        time_posted_epoch: payload.time_posted_epoch.unwrap_or_default(),
    };
    let message = message_service.create(&message_request).await?;
    Ok(Json(message.into()))
}

pub async fn get_messages<S: Store>(
    State(state): State<AppState<S>>,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let message_service = ImplMessageService::new(state.storage.clone());
    Ok(to_responses(message_service.list().await?))
}

pub async fn get_account_messages<S: Store>(
    State(state): State<AppState<S>>,
    PathId(user_id): PathId,
) -> Result<Json<Vec<MessageResponse>>, ApiError> {
    let message_service = ImplMessageService::new(state.storage.clone());
    Ok(to_responses(message_service.list_by_account(user_id).await?))
}

pub async fn get_message<S: Store>(
    State(state): State<AppState<S>>,
    PathId(message_id): PathId,
) -> Result<Response, ApiError> {
    let message_service = ImplMessageService::new(state.storage.clone());
    let message = message_service.get(message_id).await?;
    Ok(json_or_empty(message.map(MessageResponse::from)))
}

pub async fn update_message<S: Store>(
    State(state): State<AppState<S>>,
    PathId(message_id): PathId,
    JsonBody(payload): JsonBody<UpdateMessageRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message_service = ImplMessageService::new(state.storage.clone());
    let text = payload.message_text.unwrap_or_default();
    let message = message_service.update_text(message_id, &text).await?;
    Ok(Json(message.into()))
}

pub async fn delete_message<S: Store>(
    State(state): State<AppState<S>>,
    PathId(message_id): PathId,
) -> Result<Response, ApiError> {
    let message_service = ImplMessageService::new(state.storage.clone());
    let deleted = message_service.delete(message_id).await?;
    Ok(json_or_empty(deleted.map(MessageResponse::from)))
}
