//! crates/dream_weaver_core/src/knowledge_base.rs
//!
//! The fixed dream-symbol knowledge base and the other static text the
//! application ships with. Nothing here is ever mutated.

use crate::domain::{SymbolDefinition, SymbolKind};
use rand::seq::SliceRandom;

pub const APP_NAME: &str = "太虚解梦";
pub const APP_SUBTITLE: &str = "一梦一世界 · 虚实皆真意";
pub const DEMO_DREAM: &str = "我梦到我在一个迷宫里奔跑，后面好像有人在追我，感觉非常焦虑。";

/// Symbols interpreted through Western psychology.
pub static SCIENTIFIC_SYMBOLS: &[SymbolDefinition] = &[
    SymbolDefinition {
        id: 101,
        symbol_name: "恐惧/追逐 (Fear/Chasing)",
        theory_or_source: "Freud/Jung/Cognitive Science",
        meaning: "象征潜意识中未解决的冲突或被压抑的欲望。追逐者往往是自我不愿面对的部分。",
        emotional_link: Some("逃避 (Avoidance), 焦虑 (Anxiety)"),
        prediction_type: None,
        source: "Sigmund Freud, 'The Interpretation of Dreams'; Carl Jung, 'Man and His Symbols'",
        kind: SymbolKind::Scientific,
    },
    SymbolDefinition {
        id: 102,
        symbol_name: "爱/亲密关系 (Love/Intimacy)",
        theory_or_source: "Jungian Psychology",
        meaning: "象征对完整性的渴望或自我的投射。梦中伴侣可能是潜意识中理想化的‘阿尼玛/阿尼姆斯’。",
        emotional_link: Some("渴望 (Desire), 完整性 (Wholeness)"),
        prediction_type: None,
        source: "Carl Jung, 'The Archetypes and The Collective Unconscious'",
        kind: SymbolKind::Scientific,
    },
    SymbolDefinition {
        id: 103,
        symbol_name: "焦虑/迷路 (Anxiety/Getting Lost)",
        theory_or_source: "Cognitive Psychology",
        meaning: "象征现实生活中方向感的缺失或认知负荷过重。是潜意识对当前生活状态失控感的反映。",
        emotional_link: Some("无助 (Helplessness), 困惑 (Confusion)"),
        prediction_type: None,
        source: "Revonsuo, 'The Re-creation of waking life events in dreams'",
        kind: SymbolKind::Scientific,
    },
];

/// Symbols interpreted through Chinese tradition.
pub static TRADITIONAL_SYMBOLS: &[SymbolDefinition] = &[
    SymbolDefinition {
        id: 201,
        symbol_name: "恐惧/追逐 (Fear/Chasing)",
        theory_or_source: "Taoism/Folk Beliefs",
        meaning: "追逐可能象征劫难或是非即将到来。但在道家思想中，也可能是心魔的外化。",
        emotional_link: None,
        prediction_type: Some("警示 (Warning)"),
        source: "道家内丹术 (Taoist Inner Alchemy Texts); 民俗口传 (Folk Oral Traditions)",
        kind: SymbolKind::Traditional,
    },
    SymbolDefinition {
        id: 202,
        symbol_name: "爱/亲密关系 (Love/Intimacy)",
        theory_or_source: "Zhou Gong's Dream Dictionary",
        meaning: "亲密关系可能象征家庭的和睦或人际关系的和谐。梦中婚嫁则常有特殊的吉凶预示。",
        emotional_link: None,
        prediction_type: Some("预兆 (Omen)"),
        source: "周公解梦 (Zhou Gong Jie Meng)",
        kind: SymbolKind::Traditional,
    },
    SymbolDefinition {
        id: 203,
        symbol_name: "焦虑/迷路 (Anxiety/Getting Lost)",
        theory_or_source: "I Ching (Book of Changes)",
        meaning: "迷路通常象征事业或前途的迷惘。在《易经》中，可能与某些爻象所代表的进退两难状态对应。",
        emotional_link: None,
        prediction_type: Some("启示 (Revelation)"),
        source: "易经 (I Ching), 坎卦 (Hexagram 29 Kan) & 蹇卦 (Hexagram 39 Jian)",
        kind: SymbolKind::Traditional,
    },
];

/// Dream-related classical verses a client may display while waiting.
pub static POETRY_QUOTES: &[&str] = &[
    "庄生晓梦迷蝴蝶，望帝春心托杜鹃。",
    "醉后不知天在水，满船清梦压星河。",
    "梦里不知身是客，一晌贪欢。",
    "世事一场大梦，人生几度秋凉。",
    "夜来幽梦忽还乡，小轩窗，正梳妆。",
    "觉后不知明月上，满身花影倩人扶。",
    "梦入江南烟水路，行尽江南，不与离人遇。",
    "云母屏风烛影深，长河渐落晓星沉。",
];

pub fn scientific_symbols() -> &'static [SymbolDefinition] {
    SCIENTIFIC_SYMBOLS
}

pub fn traditional_symbols() -> &'static [SymbolDefinition] {
    TRADITIONAL_SYMBOLS
}

/// Picks one verse at random.
pub fn random_poetry() -> &'static str {
    POETRY_QUOTES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(POETRY_QUOTES[0])
}

/// Renders both symbol lists as the JSON context block embedded in the
/// system instruction.
pub fn knowledge_base_context() -> String {
    // Serializing plain structs of strings and integers cannot fail.
    let scientific = serde_json::to_string(SCIENTIFIC_SYMBOLS).unwrap_or_default();
    let traditional = serde_json::to_string(TRADITIONAL_SYMBOLS).unwrap_or_default();
    format!(
        "\n[System Knowledge Base - Scientific]\n{}\n\n[System Knowledge Base - Traditional]\n{}\n",
        scientific, traditional
    )
}
