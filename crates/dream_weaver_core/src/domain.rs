//! crates/dream_weaver_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! The serialized field names match the JSON shape the model is asked to produce.

use serde::{Deserialize, Serialize};

/// Which school of interpretation a symbol entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Scientific,
    Traditional,
}

/// One entry of the static dream-symbol knowledge base.
///
/// Scientific entries carry an `emotional_link`, traditional entries a
/// `prediction_type`. The other optional field stays `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolDefinition {
    pub id: u32,
    pub symbol_name: &'static str,
    pub theory_or_source: &'static str,
    pub meaning: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotional_link: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_type: Option<&'static str>,
    pub source: &'static str,
    #[serde(rename = "type")]
    pub kind: SymbolKind,
}

/// A single citation inside a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReference {
    pub id: String,
    pub text: String,
}

/// The Western-psychology half of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsychologicalDecode {
    pub content: String,
    pub key_concepts: Vec<String>,
}

/// The Eastern-tradition half of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraditionalDivination {
    pub content: String,
    pub cultural_context: String,
}

/// One completed dual-core analysis. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreamReport {
    pub introduction: String,
    pub psychological_decode: PsychologicalDecode,
    pub traditional_divination: TraditionalDivination,
    pub sources: Vec<SourceReference>,
}

impl DreamReport {
    /// Checks the invariants a usable report must hold: both analysis sections
    /// have content, at least one source is cited, and source ids are unique.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.psychological_decode.content.trim().is_empty() {
            return Err("psychological_decode.content is empty".to_string());
        }
        if self.traditional_divination.content.trim().is_empty() {
            return Err("traditional_divination.content is empty".to_string());
        }
        if self.sources.is_empty() {
            return Err("sources is empty".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.id.as_str()) {
                return Err(format!("duplicate source id '{}'", source.id));
            }
        }
        Ok(())
    }
}

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One message of the follow-up dialogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            is_error: false,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
            is_error: false,
        }
    }

    /// A model-side message standing in for a turn that failed upstream.
    pub fn model_error(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> DreamReport {
        DreamReport {
            introduction: "intro".to_string(),
            psychological_decode: PsychologicalDecode {
                content: "psych".to_string(),
                key_concepts: vec!["阴影".to_string()],
            },
            traditional_divination: TraditionalDivination {
                content: "trad".to_string(),
                cultural_context: "易经".to_string(),
            },
            sources: vec![
                SourceReference {
                    id: "Psych-1".to_string(),
                    text: "Freud".to_string(),
                },
                SourceReference {
                    id: "Trad-1".to_string(),
                    text: "周公解梦".to_string(),
                },
            ],
        }
    }

    #[test]
    fn complete_report_passes_invariants() {
        assert!(report().check_invariants().is_ok());
    }

    #[test]
    fn blank_section_or_missing_sources_fail() {
        let mut blank = report();
        blank.traditional_divination.content = "  ".to_string();
        assert!(blank.check_invariants().is_err());

        let mut unsourced = report();
        unsourced.sources.clear();
        assert_eq!(unsourced.check_invariants().unwrap_err(), "sources is empty");
    }

    #[test]
    fn duplicate_source_ids_fail() {
        let mut dup = report();
        dup.sources[1].id = "Psych-1".to_string();
        assert!(dup.check_invariants().unwrap_err().contains("Psych-1"));
    }

    #[test]
    fn chat_message_uses_camel_case_error_flag() {
        let json = serde_json::to_value(ChatMessage::model_error("x")).unwrap();
        assert_eq!(json["role"], "model");
        assert_eq!(json["isError"], true);

        let parsed: ChatMessage = serde_json::from_str(r#"{"role":"user","text":"hi"}"#).unwrap();
        assert!(!parsed.is_error);
    }
}
