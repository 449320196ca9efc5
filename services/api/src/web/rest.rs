//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{
    AnalysisStateDto, AnalyzeDreamRequest, ChatMessageDto, ChatRequest, ChatRoleDto,
    ConsultationView, CreateConsultationResponse, DreamReportDto, KnowledgeBaseResponse,
    PsychologicalDecodeDto, SourceReferenceDto, SymbolDefinitionDto, TraditionalDivinationDto,
};
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use dream_weaver_core::{knowledge_base, Consultation, InterpretError};
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinError};
use tracing::{error, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_consultation_handler,
        get_consultation_handler,
        analyze_dream_handler,
        chat_handler,
        reset_consultation_handler,
        delete_consultation_handler,
        knowledge_base_handler,
    ),
    components(
        schemas(
            AnalyzeDreamRequest, ChatRequest, CreateConsultationResponse, ConsultationView,
            AnalysisStateDto, DreamReportDto, PsychologicalDecodeDto, TraditionalDivinationDto,
            SourceReferenceDto, ChatMessageDto, ChatRoleDto, KnowledgeBaseResponse,
            SymbolDefinitionDto
        )
    ),
    tags(
        (name = "Dream Weaver API", description = "Dual-core dream interpretation with follow-up chat.")
    )
)]
pub struct ApiDoc;

type HandlerError = (StatusCode, String);

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps a core error onto an HTTP status and a user-facing message.
pub fn interpret_error_response(e: InterpretError) -> HandlerError {
    let status = match &e {
        InterpretError::EmptyInput => StatusCode::BAD_REQUEST,
        InterpretError::NoActiveSession
        | InterpretError::AnalysisInProgress
        | InterpretError::ChatInProgress
        | InterpretError::Cancelled => StatusCode::CONFLICT,
        InterpretError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
        InterpretError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        InterpretError::EmptyResponse
        | InterpretError::MalformedResponse(_)
        | InterpretError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }
    let message = if matches!(e, InterpretError::Cancelled) {
        e.to_string()
    } else {
        e.user_message()
    };
    (status, message)
}

fn task_failure(e: JoinError) -> HandlerError {
    error!("Model task failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

async fn find_consultation(
    app_state: &AppState,
    id: Uuid,
) -> Result<Arc<Mutex<Consultation>>, HandlerError> {
    app_state.consultations.get(id).await.ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Consultation {} not found", id),
        )
    })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Start a new consultation.
#[utoipa::path(
    post,
    path = "/consultations",
    responses(
        (status = 201, description = "Consultation created", body = CreateConsultationResponse),
        (status = 503, description = "Too many open consultations")
    )
)]
pub async fn create_consultation_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HandlerError> {
    let consultation_id = app_state.consultations.create().await.ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many open consultations, please try again later".to_string(),
        )
    })?;
    Ok((
        StatusCode::CREATED,
        Json(CreateConsultationResponse { consultation_id }),
    ))
}

/// Fetch the state, report and chat transcript of a consultation.
#[utoipa::path(
    get,
    path = "/consultations/{id}",
    params(("id" = Uuid, Path, description = "The consultation ID.")),
    responses(
        (status = 200, description = "Current consultation view", body = ConsultationView),
        (status = 404, description = "Unknown consultation")
    )
)]
pub async fn get_consultation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationView>, HandlerError> {
    let consultation = find_consultation(&app_state, id).await?;
    let snapshot = consultation.lock().await.snapshot();
    Ok(Json(snapshot.into()))
}

/// Analyse a dream. Replaces any previous analysis and chat of this consultation.
#[utoipa::path(
    post,
    path = "/consultations/{id}/analysis",
    params(("id" = Uuid, Path, description = "The consultation ID.")),
    request_body = AnalyzeDreamRequest,
    responses(
        (status = 200, description = "The dream report", body = DreamReportDto),
        (status = 400, description = "Empty dream text"),
        (status = 404, description = "Unknown consultation"),
        (status = 409, description = "An analysis or chat is already in progress"),
        (status = 502, description = "The model returned an unusable answer or failed"),
        (status = 503, description = "No model credential configured"),
        (status = 504, description = "The model did not answer in time")
    )
)]
pub async fn analyze_dream_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnalyzeDreamRequest>,
) -> Result<Json<DreamReportDto>, HandlerError> {
    let consultation = find_consultation(&app_state, id).await?;

    let ticket = consultation
        .lock()
        .await
        .begin_analysis(&payload.dream)
        .map_err(interpret_error_response)?;

    // If the client goes away this handler is dropped: the guard cancels the
    // model call and the task still records the outcome.
    let _abandon = ticket.cancel.clone().drop_guard();
    let interpreter = app_state.interpreter.clone();
    let task = tokio::spawn(async move {
        let result = interpreter
            .analyze_with_cancel(&ticket.dream_text, &ticket.cancel)
            .await;
        let mut guard = consultation.lock().await;
        guard.finish_analysis(ticket, result)
    });

    let report = task
        .await
        .map_err(task_failure)?
        .map_err(interpret_error_response)?;
    Ok(Json(report.into()))
}

/// Ask a follow-up question. A failed turn is returned as a message with `isError` set.
#[utoipa::path(
    post,
    path = "/consultations/{id}/chat",
    params(("id" = Uuid, Path, description = "The consultation ID.")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The model's reply", body = ChatMessageDto),
        (status = 400, description = "Empty message"),
        (status = 404, description = "Unknown consultation"),
        (status = 409, description = "No analysed dream yet, or a reply is already pending")
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatMessageDto>, HandlerError> {
    let consultation = find_consultation(&app_state, id).await?;

    let mut turn = consultation
        .lock()
        .await
        .begin_chat(&payload.message)
        .map_err(interpret_error_response)?;

    let _abandon = turn.cancel.clone().drop_guard();
    let interpreter = app_state.interpreter.clone();
    let task = tokio::spawn(async move {
        let result = interpreter
            .chat_with_cancel(&mut turn.session, &turn.message, &turn.cancel)
            .await;
        let mut guard = consultation.lock().await;
        guard.finish_chat(turn, result)
    });

    let reply = task
        .await
        .map_err(task_failure)?
        .map_err(interpret_error_response)?;
    Ok(Json(reply.into()))
}

/// Return a consultation to idle: cancels pending requests, closes the session
/// and clears the report and transcript.
#[utoipa::path(
    post,
    path = "/consultations/{id}/reset",
    params(("id" = Uuid, Path, description = "The consultation ID.")),
    responses(
        (status = 200, description = "The reset consultation", body = ConsultationView),
        (status = 404, description = "Unknown consultation")
    )
)]
pub async fn reset_consultation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConsultationView>, HandlerError> {
    let consultation = find_consultation(&app_state, id).await?;
    let mut guard = consultation.lock().await;
    guard.reset();
    Ok(Json(guard.snapshot().into()))
}

/// Reset and discard a consultation.
#[utoipa::path(
    delete,
    path = "/consultations/{id}",
    params(("id" = Uuid, Path, description = "The consultation ID.")),
    responses(
        (status = 204, description = "Consultation removed"),
        (status = 404, description = "Unknown consultation")
    )
)]
pub async fn delete_consultation_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HandlerError> {
    if app_state.consultations.remove(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            format!("Consultation {} not found", id),
        ))
    }
}

/// The static symbol knowledge base and landing-page text.
#[utoipa::path(
    get,
    path = "/knowledge-base",
    responses(
        (status = 200, description = "Knowledge base and app text", body = KnowledgeBaseResponse)
    )
)]
pub async fn knowledge_base_handler() -> Json<KnowledgeBaseResponse> {
    Json(KnowledgeBaseResponse {
        app_name: knowledge_base::APP_NAME.to_string(),
        app_subtitle: knowledge_base::APP_SUBTITLE.to_string(),
        demo_dream: knowledge_base::DEMO_DREAM.to_string(),
        poetry: knowledge_base::random_poetry().to_string(),
        scientific: knowledge_base::scientific_symbols()
            .iter()
            .map(Into::into)
            .collect(),
        traditional: knowledge_base::traditional_symbols()
            .iter()
            .map(Into::into)
            .collect(),
    })
}
