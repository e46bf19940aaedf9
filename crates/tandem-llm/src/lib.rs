//! Generators for tandem: the primary model, the canned fallback, and the
//! wrapper that switches between them.
//!
//! - [`Generator`] — Object-safe trait every generation stage implements
//! - [`OpenAiGenerator`] — Primary generator backed by an OpenAI-compatible API
//! - [`FallbackGenerator`] — Always streams one fixed response, one character per chunk
//! - [`WithFallback`] — Runs the primary and transparently substitutes the fallback
//!   when the primary fails before producing its first chunk
//! - [`FallbackMessageRegistry`] — Topic → canned response lookup
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tandem_llm::{FallbackGenerator, FallbackMessageRegistry, GeneratorExt, OpenAiGenerator};
//! use futures::StreamExt;
//!
//! let registry = FallbackMessageRegistry::canned();
//! let primary = OpenAiGenerator::new("gpt-4o-mini", "sk-...", None);
//! let generator = primary.with_fallback(FallbackGenerator::new(registry.get("bears")));
//!
//! let mut stream = generator.generate(&payload);
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?.content.unwrap_or_default());
//! }
//! ```
//!
//! # First-pull failures
//!
//! [`Generator::generate`] does no work until its stream is first polled, and
//! providers typically only connect at that point. [`WithFallback`] therefore
//! guards the first pull, not the call.

mod fallback;
mod generator;
mod openai;
mod scripted;
mod with_fallback;

pub use fallback::{FallbackGenerator, FallbackMessageRegistry, CANNED_EXPLAINER};
pub use generator::{ChunkStream, Generator, GeneratorExt};
pub use openai::OpenAiGenerator;
pub use scripted::ScriptedGenerator;
pub use tandem_core::{ChainError, GenerationChunk, GenerationResponse, RequestPayload};
pub use with_fallback::{FallbackPhase, FallbackStream, WithFallback};
