//! Route handler functions for all API endpoints.
//!
//! Handlers call the synchronous resolver, chat engine and stores directly;
//! every operation is in-memory or a small local file write.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use helpdesk_chat::{ChatMessage, ChatReply, ResolveError, ResponseComposer};
use helpdesk_core::types::{
    AnswerPayload, KnowledgeEntry, ResolutionResult, Ticket, TicketPriority, TicketStatus,
};
use helpdesk_storage::{NewTicket, TicketAnalytics};

use crate::auth::{bearer_token, Identity, Role};
use crate::error::ApiError;
use crate::state::AppState;

const WELCOME: &str = "Welcome to the AI Help Desk Knowledge Base API!";

// =============================================================================
// Request types
// =============================================================================

/// Body of `POST /ask`. `query` is validated by hand so a non-string query
/// gets a descriptive error instead of a generic JSON rejection.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub query: Value,
    #[serde(default)]
    pub context: Vec<String>,
    /// Resolve against this knowledge base instead of the stored one.
    #[serde(default)]
    pub knowledge_base: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    pub issue: String,
    /// Defaults to the logged-in user's name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct KbSearchParams {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct KbEntryRequest {
    /// Required when creating; defaults to the current key when updating.
    #[serde(default)]
    pub question: Option<String>,
    pub answer: AnswerPayload,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub knowledge_entries: usize,
    pub chat_sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    /// Display text: the answer, the clarification prompt or the fallback.
    pub answer: String,
    pub result: ResolutionResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub reply: ChatReply,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexedTicket {
    pub index: usize,
    #[serde(flatten)]
    pub ticket: Ticket,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicketListResponse {
    pub tickets: Vec<IndexedTicket>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KbListResponse {
    pub entries: Vec<KnowledgeEntry>,
    pub total: usize,
}

// =============================================================================
// General
// =============================================================================

/// GET / - welcome message.
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: WELCOME.to_string(),
    })
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        knowledge_entries: state.knowledge.snapshot().len(),
        chat_sessions: state.chat.list_sessions().len(),
    })
}

/// POST /ask - stateless resolution.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let resolver = state.chat.resolver();
    let result = match &req.knowledge_base {
        Some(kb) => resolver.resolve_value(&req.query, kb, &req.context)?,
        None => {
            let query = req.query.as_str().ok_or_else(|| {
                ResolveError::InvalidQuery("query must be a string".to_string())
            })?;
            resolver.resolve(query, &state.knowledge.snapshot(), &req.context)
        }
    };

    let reply = ResponseComposer.compose(result.clone(), None);
    Ok(Json(AskResponse {
        answer: reply.text,
        result,
    }))
}

// =============================================================================
// Chat
// =============================================================================

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let (reply, session_id) = state.chat.handle_message(&req.message, req.session_id)?;
    Ok(Json(ChatResponseBody { session_id, reply }))
}

/// POST /chat/{id}/select
pub async fn chat_select(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let reply = state.chat.select(session_id, &req.key)?;
    Ok(Json(ChatResponseBody { session_id, reply }))
}

/// POST /chat/{id}/reject
pub async fn chat_reject(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ChatResponseBody>, ApiError> {
    let reply = state.chat.reject(session_id)?;
    Ok(Json(ChatResponseBody { session_id, reply }))
}

/// GET /chat/{id}/history
pub async fn chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = state.chat.get_history(session_id)?;
    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

/// DELETE /chat/{id}
pub async fn chat_delete(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.chat.delete_session(session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Login
// =============================================================================

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let (token, identity) = state.logins.login(&req.name, &state.config.api.admin_users)?;
    Ok(Json(LoginResponse {
        token,
        name: identity.name,
        role: identity.role,
    }))
}

/// POST /logout - revoke the caller's token.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers)?;
    if state.logins.logout(token) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Unauthorized("Invalid bearer token".to_string()))
    }
}

// =============================================================================
// Tickets
// =============================================================================

/// POST /tickets - any logged-in caller, guests included.
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<TicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), ApiError> {
    let priority = match req.priority.as_deref().map(str::trim) {
        None | Some("") => TicketPriority::default(),
        Some(raw) => raw.parse()?,
    };
    let ticket = state.tickets.append(NewTicket {
        name: req.name.unwrap_or(identity.name),
        issue: req.issue,
        priority,
    })?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// GET /tickets
pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<TicketListResponse>, ApiError> {
    identity.require(Role::User)?;
    let tickets: Vec<IndexedTicket> = state
        .tickets
        .list()?
        .into_iter()
        .enumerate()
        .map(|(index, ticket)| IndexedTicket { index, ticket })
        .collect();
    Ok(Json(TicketListResponse {
        total: tickets.len(),
        tickets,
    }))
}

/// PUT /tickets/{index}/status
pub async fn update_ticket_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(index): Path<usize>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<IndexedTicket>, ApiError> {
    identity.require(Role::User)?;
    if req.status.trim().is_empty() {
        return Err(ApiError::UnprocessableEntity(
            "status must not be empty".to_string(),
        ));
    }
    let ticket = state
        .tickets
        .set_status(index, TicketStatus::from(req.status.as_str()))?;
    Ok(Json(IndexedTicket { index, ticket }))
}

/// GET /analytics
pub async fn analytics(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<TicketAnalytics>, ApiError> {
    identity.require(Role::User)?;
    Ok(Json(TicketAnalytics::load(&state.tickets)?))
}

// =============================================================================
// Knowledge-base editor (admin)
// =============================================================================

/// GET /kb?search=
pub async fn kb_list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(params): Query<KbSearchParams>,
) -> Result<Json<KbListResponse>, ApiError> {
    identity.require(Role::Admin)?;
    let entries = state
        .knowledge
        .search(params.search.as_deref().unwrap_or(""));
    Ok(Json(KbListResponse {
        total: entries.len(),
        entries,
    }))
}

/// POST /kb
pub async fn kb_create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<KbEntryRequest>,
) -> Result<(StatusCode, Json<KnowledgeEntry>), ApiError> {
    identity.require(Role::Admin)?;
    let question = req
        .question
        .ok_or_else(|| ApiError::UnprocessableEntity("question is required".to_string()))?;
    let entry = state.knowledge.add(&question, req.answer)?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// PUT /kb/{key}
pub async fn kb_update(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(key): Path<String>,
    Json(req): Json<KbEntryRequest>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
    identity.require(Role::Admin)?;
    let question = req.question.unwrap_or_else(|| key.clone());
    let entry = state.knowledge.update(&key, &question, req.answer)?;
    Ok(Json(entry))
}

/// DELETE /kb/{key}
pub async fn kb_delete(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(key): Path<String>,
) -> Result<Json<KnowledgeEntry>, ApiError> {
    identity.require(Role::Admin)?;
    Ok(Json(state.knowledge.delete(&key)?))
}
