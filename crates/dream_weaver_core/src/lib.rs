pub mod consultation;
pub mod domain;
pub mod interpreter;
pub mod knowledge_base;
pub mod ports;
pub mod prompt;
pub mod schema;

#[cfg(test)]
mod test_support;

pub use consultation::{AnalysisState, AnalysisTicket, ChatTurn, Consultation, ConsultationSnapshot};
pub use domain::{
    ChatMessage, ChatRole, DreamReport, PsychologicalDecode, SourceReference, SymbolDefinition,
    SymbolKind, TraditionalDivination,
};
pub use interpreter::{Analysis, DreamInterpreter, DreamSession, InterpretError};
pub use ports::{
    GenerativeModelService, OutputMode, PortError, PortResult, SessionConfig, SessionHandle, Turn,
};
pub use schema::SchemaNode;
