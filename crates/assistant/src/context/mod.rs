//! Context for a turn: concurrent retrieval and budgeted rendering.
//!
//! | Layer | Source | Trim strategy |
//! |-------|--------|---------------|
//! | 1. Knowledge | labor-code excerpts | Never trimmed |
//! | 2. History | this session | Oldest dropped first |
//! | 3. Summaries | earlier sessions | Oldest dropped first |
//! | 4. Related | similar past messages | Lowest similarity dropped first |

pub mod assembler;
pub mod bundle;

pub use assembler::ContextAssembler;
pub use bundle::{AssemblyMetadata, ContextBundle, DropInfo, LayerStats, RenderedContext};
