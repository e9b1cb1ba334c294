//! Identity resolution for hrcounsel.
//!
//! Provides:
//! - **HMAC tokens**: self-contained signed bearer tokens, minted by the CLI
//! - **Resolver chain**: static tokens from config, then HMAC tokens

pub mod chain;
pub mod token;

pub use chain::{build_from_config, ResolverChain};
pub use token::HmacTokenResolver;
