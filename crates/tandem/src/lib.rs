//! # Tandem — Fallback chains with incremental delivery
//!
//! Tandem composes a text-generation pipeline out of three stages: a prompt
//! formatter, a generator wrapped with a canned fallback, and an output
//! normalizer. If the primary model fails before producing anything (bad
//! credential, unknown model, unreachable endpoint) the fallback's fixed
//! response is delivered in its place, through the same stream.
//!
//! ## Quick Start — Atomic
//!
//! ```rust,ignore
//! use tandem::prelude::*;
//!
//! let pipeline = Pipeline::build("Tell me a joke about {topic}", "gpt-4o-mini", api_key, "bears")?;
//! let text = pipeline.run_sync("bears").await?;
//! ```
//!
//! ## Quick Start — Streaming
//!
//! ```rust,ignore
//! use tandem::prelude::*;
//!
//! let config = ChainConfig::from_env()?;
//! let pipeline = Pipeline::from_config(&config, &config.topic)?;
//!
//! let mut sink = MemorySink::new();
//! StreamDriver::new(config.delay())
//!     .drive(pipeline.run_stream(&config.topic), &mut sink)
//!     .await?;
//! ```
//!
//! ## Crate Structure
//!
//! | Crate | Description |
//! |-------|-------------|
//! | [`tandem_config`] | Chain configuration, env overrides, defaults |
//! | [`tandem_core`] | Error kinds, messages, payloads, generation output |
//! | [`tandem_llm`] | Generators: OpenAI primary, canned fallback, fallback wrapper |
//! | [`tandem_engine`] | Prompt formatting, stages, pipeline, stream driver |
//!
//! ## Fallback Rule
//!
//! The wrapper commits to the primary once it yields its first chunk. A
//! recoverable failure before that point switches to the fallback; any
//! failure after it is surfaced to the caller.

// Re-export config types
pub use tandem_config::{ChainConfig, ChainConfigBuilder, ConfigError};

// Re-export core types
pub use tandem_core::{
    ChainError, GenerationChunk, GenerationResponse, Message, MessageRole, RequestPayload, TokenUsage,
};

// Re-export generators
pub use tandem_llm::{
    ChunkStream, FallbackGenerator, FallbackMessageRegistry, FallbackPhase, FallbackStream, Generator,
    GeneratorExt, OpenAiGenerator, WithFallback, CANNED_EXPLAINER,
};

// Re-export engine
pub use tandem_engine::{
    drive, gather, DisplaySink, GenerationOutput, GeneratorStage, MemorySink, OutputNormalizer, Pipeline,
    PipelineBuilder, PromptTemplate, Stage, StageValue, StreamDriver, TemplateVars, TextStream, ValueStream,
};

// Scripted generator for tests and demos (hidden)
#[doc(hidden)]
pub use tandem_llm::ScriptedGenerator;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tandem::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::{ChainError, GenerationChunk, GenerationResponse, RequestPayload};

    // Config
    pub use crate::ChainConfig;

    // Generators
    pub use crate::{FallbackGenerator, FallbackMessageRegistry, Generator, GeneratorExt, OpenAiGenerator};

    // Engine
    pub use crate::{DisplaySink, MemorySink, Pipeline, PromptTemplate, StreamDriver};
}
