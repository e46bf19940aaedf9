//! Pipeline execution engine for tandem.
//!
//! This crate composes the generation stages and delivers their output:
//!
//! - [`PromptTemplate`] — Formats template variables into a request payload
//! - [`GeneratorStage`] — Runs any [`Generator`](tandem_llm::Generator), usually a fallback-wrapped one
//! - [`OutputNormalizer`] — Reduces generator output to plain text
//! - [`Pipeline`] — Ordered stages with atomic and incremental execution
//! - [`StreamDriver`] / [`DisplaySink`] — Paced full-redraw delivery
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tandem_engine::{MemorySink, Pipeline, StreamDriver};
//!
//! let pipeline = Pipeline::build("Tell me a joke about {topic}", "gpt-4o-mini", api_key, "bears")?;
//!
//! // Whole output at once
//! let text = pipeline.run_sync("bears").await?;
//!
//! // Character by character, redrawing the full text each time
//! let mut sink = MemorySink::new();
//! StreamDriver::new(Duration::from_millis(30))
//!     .drive(pipeline.run_stream("bears"), &mut sink)
//!     .await?;
//! ```
//!
//! # Execution Model
//!
//! Values flow through stages as [`StageValue`]s:
//!
//! 1. **Atomic** — each stage's `process` runs once on the previous output
//! 2. **Incremental** — each stage's `process_stream` transforms the upstream
//!    stream; stages that cannot emit partial output gather their input first
//!
//! Streams are lazy: no stage runs and no request is sent until the first
//! fragment is pulled.

mod driver;
mod normalizer;
mod pipeline;
mod prompt;
mod stage;

pub use driver::{drive, DisplaySink, MemorySink, StreamDriver};
pub use normalizer::{GenerationOutput, OutputNormalizer};
pub use pipeline::{Pipeline, PipelineBuilder, TextStream};
pub use prompt::{PromptTemplate, TemplateVars};
pub use stage::{gather, GeneratorStage, Stage, StageValue, ValueStream};
