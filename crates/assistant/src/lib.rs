//! The conversation turn for hrcounsel.
//!
//! A turn follows a fixed pipeline:
//!
//! 1. **Validate** the question, the role and the bearer credential
//! 2. **Embed** the question once
//! 3. **Gather context** concurrently (knowledge, session history,
//!    summaries, related past discussions)
//! 4. **Synthesize** an answer grounded in the knowledge excerpts, or
//!    return the fixed fallback when nothing matched
//! 5. **Persist** the question and answer to the conversation log
//!
//! Log writes never fail a turn; degraded lookups and lost writes are
//! reported on the [`EventBus`](hrcounsel_core::EventBus).

pub mod context;
pub mod prompts;
pub mod session;
pub mod settings;
pub mod synthesizer;

#[cfg(test)]
mod test_helpers;

pub use context::{AssemblyMetadata, ContextAssembler, ContextBundle, DropInfo, LayerStats, RenderedContext};
pub use session::{resolve_session, AskRequest, AskResponse, ContextUsed, ConversationSession, TurnStage};
pub use settings::AssistantSettings;
pub use synthesizer::{AnswerSynthesizer, ProviderSynthesizer};
