//! LLM Provider implementations for hrcounsel.
//!
//! All providers implement the `hrcounsel_core::Provider` trait.
//! The router selects the correct provider based on configuration, and
//! [`ProviderEmbedder`] adapts a provider to the embedding capability.

pub mod embedder;
pub mod openai_compat;
pub mod router;

pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{build_embedder, build_from_config, ProviderRouter};
