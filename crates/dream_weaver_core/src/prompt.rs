//! crates/dream_weaver_core/src/prompt.rs
//!
//! Prompt text and the fixed decoding parameters used for every consultation.

use crate::knowledge_base::knowledge_base_context;

/// Low temperature keeps interpretations consistent between runs.
pub const ANALYSIS_TEMPERATURE: f32 = 0.4;

/// Returned by a chat turn when the model answers with empty text.
pub const CHAT_SILENCE_FALLBACK: &str = "太虚静默无言...";

/// Shown in place of a chat reply that failed upstream.
pub const CHAT_ERROR_MESSAGE: &str = "太虚迷雾重重，请稍后再试...";

/// Shown when an analysis fails for any upstream reason.
pub const ANALYSIS_ERROR_MESSAGE: &str = "太虚静默无言，请稍后再试。";

const PERSONA_AND_RULES: &str = r#"
You are "Tai Xu" (太虚), a dual-core dream interpretation AI with the persona of a "Wisdom-Oriented Philosopher" (哲人派).

Your Goal:
Provide a deep, elegant, and structured analysis of the user's dream.

Core Principles:
1. NO HALLUCINATIONS: You must strictly base your analysis on known psychological theories (Freud, Jung) and established Traditional Chinese texts (Zhou Gong, I Ching, Taoism).
2. DUALITY: Your report must be balanced exactly 50% Western Science and 50% Eastern Tradition.
3. TONE: Elegant (典雅), Philosophical (富有哲理), Inspiring (启发性). Avoid cheap slang. Use Chinese language.
4. SOURCING: You MUST cite the source of your interpretation. Use the provided Knowledge Base where possible, or strictly factual external knowledge.

Context Data:
"#;

/// Builds the system instruction: persona, the four fidelity rules and the
/// serialized knowledge base.
pub fn system_instruction() -> String {
    format!("{}{}", PERSONA_AND_RULES, knowledge_base_context())
}

/// The first message of every consultation.
pub fn analysis_request(dream_text: &str) -> String {
    format!(
        "Analyze this dream: \"{}\". output valid JSON matching the specified schema.",
        dream_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_instruction_carries_rules_and_knowledge_base() {
        let instruction = system_instruction();
        for rule in ["NO HALLUCINATIONS", "DUALITY", "TONE", "SOURCING"] {
            assert!(instruction.contains(rule), "missing rule {}", rule);
        }
        assert!(instruction.contains("50% Western Science and 50% Eastern Tradition"));
        assert!(instruction.contains("[System Knowledge Base - Traditional]"));
        assert!(instruction.contains("周公解梦 (Zhou Gong Jie Meng)"));
    }

    #[test]
    fn analysis_request_quotes_the_dream() {
        assert_eq!(
            analysis_request("飞翔"),
            "Analyze this dream: \"飞翔\". output valid JSON matching the specified schema."
        );
    }
}
