pub mod dream_llm;

pub use dream_llm::OpenAiDreamAdapter;
