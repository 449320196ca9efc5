//! services/api/src/web/protocol.rs
//!
//! Defines the JSON message protocol between the browser client and the API server.
//! These DTOs mirror the core domain types and carry the OpenAPI schema annotations.

use chrono::{DateTime, Utc};
use dream_weaver_core::{
    AnalysisState, ChatMessage, ChatRole, ConsultationSnapshot, DreamReport, SymbolDefinition,
    SymbolKind,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// The dream narrative to analyse.
#[derive(Deserialize, Debug, ToSchema)]
pub struct AnalyzeDreamRequest {
    pub dream: String,
}

/// A follow-up question about the analysed dream.
#[derive(Deserialize, Debug, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CreateConsultationResponse {
    pub consultation_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct SourceReferenceDto {
    pub id: String,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PsychologicalDecodeDto {
    pub content: String,
    pub key_concepts: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct TraditionalDivinationDto {
    pub content: String,
    pub cultural_context: String,
}

/// A completed dual-core analysis.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct DreamReportDto {
    pub introduction: String,
    pub psychological_decode: PsychologicalDecodeDto,
    pub traditional_divination: TraditionalDivinationDto,
    pub sources: Vec<SourceReferenceDto>,
}

impl From<DreamReport> for DreamReportDto {
    fn from(report: DreamReport) -> Self {
        Self {
            introduction: report.introduction,
            psychological_decode: PsychologicalDecodeDto {
                content: report.psychological_decode.content,
                key_concepts: report.psychological_decode.key_concepts,
            },
            traditional_divination: TraditionalDivinationDto {
                content: report.traditional_divination.content,
                cultural_context: report.traditional_divination.cultural_context,
            },
            sources: report
                .sources
                .into_iter()
                .map(|s| SourceReferenceDto { id: s.id, text: s.text })
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRoleDto {
    User,
    Model,
}

/// One message of the follow-up transcript. `isError` marks a failed turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
pub struct ChatMessageDto {
    pub role: ChatRoleDto,
    pub text: String,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl From<ChatMessage> for ChatMessageDto {
    fn from(message: ChatMessage) -> Self {
        Self {
            role: match message.role {
                ChatRole::User => ChatRoleDto::User,
                ChatRole::Model => ChatRoleDto::Model,
            },
            text: message.text,
            is_error: message.is_error,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStateDto {
    Idle,
    Analyzing,
    Complete,
    Error,
}

impl From<AnalysisState> for AnalysisStateDto {
    fn from(state: AnalysisState) -> Self {
        match state {
            AnalysisState::Idle => AnalysisStateDto::Idle,
            AnalysisState::Analyzing => AnalysisStateDto::Analyzing,
            AnalysisState::Complete => AnalysisStateDto::Complete,
            AnalysisState::Error => AnalysisStateDto::Error,
        }
    }
}

/// The current view of a consultation.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ConsultationView {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub state: AnalysisStateDto,
    pub report: Option<DreamReportDto>,
    pub transcript: Vec<ChatMessageDto>,
    pub error_message: Option<String>,
    pub session_id: Option<Uuid>,
    pub chat_in_flight: bool,
}

impl From<ConsultationSnapshot> for ConsultationView {
    fn from(snapshot: ConsultationSnapshot) -> Self {
        Self {
            id: snapshot.id,
            created_at: snapshot.created_at,
            state: snapshot.state.into(),
            report: snapshot.report.map(Into::into),
            transcript: snapshot.transcript.into_iter().map(Into::into).collect(),
            error_message: snapshot.error_message,
            session_id: snapshot.session_id,
            chat_in_flight: snapshot.chat_in_flight,
        }
    }
}

/// One knowledge-base entry as exposed to clients.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct SymbolDefinitionDto {
    pub id: u32,
    pub symbol_name: String,
    pub theory_or_source: String,
    pub meaning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotional_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_type: Option<String>,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&SymbolDefinition> for SymbolDefinitionDto {
    fn from(symbol: &SymbolDefinition) -> Self {
        Self {
            id: symbol.id,
            symbol_name: symbol.symbol_name.to_string(),
            theory_or_source: symbol.theory_or_source.to_string(),
            meaning: symbol.meaning.to_string(),
            emotional_link: symbol.emotional_link.map(str::to_string),
            prediction_type: symbol.prediction_type.map(str::to_string),
            source: symbol.source.to_string(),
            kind: match symbol.kind {
                SymbolKind::Scientific => "scientific".to_string(),
                SymbolKind::Traditional => "traditional".to_string(),
            },
        }
    }
}

/// Static content a client needs to render the landing page.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct KnowledgeBaseResponse {
    pub app_name: String,
    pub app_subtitle: String,
    pub demo_dream: String,
    pub poetry: String,
    pub scientific: Vec<SymbolDefinitionDto>,
    pub traditional: Vec<SymbolDefinitionDto>,
}
