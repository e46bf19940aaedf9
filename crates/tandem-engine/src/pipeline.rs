//! Ordered composition of stages with atomic and incremental execution.

use std::pin::Pin;
use std::sync::Arc;

use futures::{future, stream, Stream, StreamExt};
use tandem_config::{ChainConfig, TOPIC_VARIABLE};
use tandem_core::ChainError;
use tandem_llm::{FallbackGenerator, FallbackMessageRegistry, Generator, OpenAiGenerator, WithFallback};
use tracing::info;

use crate::normalizer::OutputNormalizer;
use crate::prompt::{PromptTemplate, TemplateVars};
use crate::stage::{GeneratorStage, Stage, StageValue, ValueStream};

/// A lazy stream of normalized text fragments.
pub type TextStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ChainError>> + Send + 'a>>;

fn into_text(value: StageValue) -> Result<String, ChainError> {
    match value {
        StageValue::Text(text) => Ok(text),
        other => Err(ChainError::StageInput {
            stage: "output".to_string(),
            expected: "text",
            found: other.kind(),
        }),
    }
}

/// An ordered chain of stages.
///
/// Each stage consumes exactly the previous stage's output. The standard
/// chain is prompt formatter → fallback-wrapped generator → normalizer, but
/// any stage list whose values line up is valid.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = Pipeline::from_config(&config, "bears")?;
///
/// // Atomic
/// let text = pipeline.run_sync("bears").await?;
///
/// // Incremental
/// let mut fragments = pipeline.run_stream("bears");
/// while let Some(fragment) = fragments.next().await {
///     print!("{}", fragment?);
/// }
/// ```
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    input_variable: String,
}

impl Pipeline {
    /// Creates a new builder for an arbitrary stage list.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Builds the standard chain against an OpenAI-compatible primary model.
    ///
    /// `model` and `credential` are passed through unvalidated. `topic`
    /// selects the canned fallback message.
    pub fn build(template: &str, model: &str, credential: &str, topic: &str) -> Result<Self, ChainError> {
        let config = ChainConfig::builder()
            .prompt_template(template)
            .model(model)
            .api_key(credential)
            .build();
        Self::from_config(&config, topic)
    }

    /// Builds the standard chain from a [`ChainConfig`].
    pub fn from_config(config: &ChainConfig, topic: &str) -> Result<Self, ChainError> {
        let registry = match &config.fallback_message {
            Some(message) => FallbackMessageRegistry::new(message.as_str()),
            None => FallbackMessageRegistry::canned(),
        };
        let primary = OpenAiGenerator::new(&config.model, &config.api_key, config.api_base.as_deref());
        let fallback = FallbackGenerator::new(registry.get(topic));

        Self::with_generators(&config.prompt_template, Arc::new(primary), Arc::new(fallback))
    }

    /// Builds the standard chain around the given generators.
    pub fn with_generators(
        template: &str,
        primary: Arc<dyn Generator>,
        fallback: Arc<dyn Generator>,
    ) -> Result<Self, ChainError> {
        Ok(Self::builder()
            .stage(PromptTemplate::new(template)?)
            .stage(GeneratorStage::new(Arc::new(WithFallback::new(primary, fallback))))
            .stage(OutputNormalizer)
            .build())
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    fn topic_input(&self, topic: &str) -> StageValue {
        StageValue::Vars(TemplateVars::from([(self.input_variable.clone(), topic.to_string())]))
    }

    /// Runs every stage atomically on `input`.
    pub async fn invoke(&self, input: StageValue) -> Result<StageValue, ChainError> {
        let mut value = input;
        for stage in &self.stages {
            value = stage.process(value).await?;
        }
        Ok(value)
    }

    /// Threads `input` through every stage's streaming transform.
    pub fn stream(&self, input: StageValue) -> ValueStream<'_> {
        let mut values: ValueStream<'_> = Box::pin(stream::once(future::ready(Ok(input))));
        for stage in &self.stages {
            values = stage.process_stream(values);
        }
        values
    }

    /// Atomic execution: the whole output, once.
    pub async fn run_sync(&self, topic: &str) -> Result<String, ChainError> {
        info!("╔══════════════════════════════════════════════════════════════");
        info!("║ PIPELINE (atomic): {}", self.stage_names().join(" → "));
        info!("║ Topic: {}...", topic.chars().take(50).collect::<String>());

        let text = into_text(self.invoke(self.topic_input(topic)).await?)?;

        info!("║ Complete: {} chars", text.chars().count());
        info!("╚══════════════════════════════════════════════════════════════");
        Ok(text)
    }

    /// Incremental execution: fragments as soon as the upstream stage yields them.
    ///
    /// Nothing runs until the returned stream is polled.
    pub fn run_stream(&self, topic: &str) -> TextStream<'_> {
        info!("╔══════════════════════════════════════════════════════════════");
        info!("║ PIPELINE (stream): {}", self.stage_names().join(" → "));
        info!("║ Topic: {}...", topic.chars().take(50).collect::<String>());

        Box::pin(self.stream(self.topic_input(topic)).map(|value| value.and_then(into_text)))
    }
}

/// Builder for a [`Pipeline`] with an explicit stage list.
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
    input_variable: String,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self {
            stages: Vec::new(),
            input_variable: TOPIC_VARIABLE.to_string(),
        }
    }
}

impl PipelineBuilder {
    /// Appends a stage.
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Sets the template variable the topic is bound to (default `topic`).
    pub fn input_variable(mut self, name: impl Into<String>) -> Self {
        self.input_variable = name.into();
        self
    }

    /// Builds the final [`Pipeline`].
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            input_variable: self.input_variable,
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use tandem_llm::{ScriptedGenerator, CANNED_EXPLAINER};

    use super::*;

    const JOKE: &str = "Why don't bears wear shoes? They have bear feet.";

    fn chain(primary: Arc<ScriptedGenerator>, fallback: &str) -> Pipeline {
        Pipeline::with_generators(
            "Tell me a joke about {topic}",
            primary,
            Arc::new(FallbackGenerator::new(fallback)),
        )
        .unwrap()
    }

    #[test]
    fn standard_chain_order() {
        let pipeline = chain(Arc::new(ScriptedGenerator::succeeding(JOKE)), "canned");
        assert_eq!(pipeline.stage_names(), vec!["prompt", "scripted", "normalizer"]);
    }

    #[tokio::test]
    async fn stream_matches_sync_when_primary_succeeds() {
        let primary = Arc::new(ScriptedGenerator::succeeding(JOKE));
        let pipeline = chain(primary.clone(), "canned");

        let atomic = pipeline.run_sync("bears").await.unwrap();
        let fragments: Vec<String> = pipeline.run_stream("bears").try_collect().await.unwrap();

        assert_eq!(atomic, JOKE);
        assert_eq!(fragments.concat(), atomic);
        assert_eq!(fragments.len(), JOKE.chars().count());
        assert_eq!(primary.last_payload().unwrap().text(), "Tell me a joke about bears");
    }

    #[tokio::test]
    async fn fallback_output_is_exact() {
        for topic in ["bears", "", "{weird} topic"] {
            let primary = Arc::new(ScriptedGenerator::failing(ChainError::Authentication("bad key".into())));
            let pipeline = chain(primary, CANNED_EXPLAINER);

            assert_eq!(pipeline.run_sync(topic).await.unwrap(), CANNED_EXPLAINER);
            let streamed: Vec<String> = pipeline.run_stream(topic).try_collect().await.unwrap();
            assert_eq!(streamed.concat(), CANNED_EXPLAINER);
        }
    }

    #[tokio::test]
    async fn template_error_precedes_generation() {
        let primary = Arc::new(ScriptedGenerator::succeeding(JOKE));
        let pipeline = Pipeline::with_generators(
            "Tell me a joke",
            primary.clone(),
            Arc::new(FallbackGenerator::new("canned")),
        )
        .unwrap();

        assert!(matches!(pipeline.run_sync("bears").await, Err(ChainError::Template(_))));
        let streamed: Result<Vec<String>, ChainError> = pipeline.run_stream("bears").try_collect().await;
        assert!(matches!(streamed, Err(ChainError::Template(_))));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn run_stream_is_lazy() {
        let primary = Arc::new(ScriptedGenerator::succeeding(JOKE));
        let pipeline = chain(primary.clone(), "canned");

        let stream = pipeline.run_stream("bears");
        assert_eq!(primary.calls(), 0);
        drop(stream);
    }

    #[tokio::test]
    async fn reordered_stages_report_mismatch() {
        let pipeline = Pipeline::builder()
            .stage(OutputNormalizer)
            .stage(PromptTemplate::new("{topic}").unwrap())
            .build();

        let err = pipeline.run_sync("bears").await.unwrap_err();
        assert!(matches!(err, ChainError::StageInput { expected: "chunk or response", found: "vars", .. }));
    }

    #[tokio::test]
    async fn custom_input_variable() {
        let pipeline = Pipeline::builder()
            .input_variable("subject")
            .stage(PromptTemplate::new("Tell me about {subject}").unwrap())
            .stage(GeneratorStage::new(Arc::new(ScriptedGenerator::succeeding("ok"))))
            .stage(OutputNormalizer)
            .build();

        assert_eq!(pipeline.run_sync("otters").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn late_failure_reaches_caller() {
        let primary = Arc::new(
            ScriptedGenerator::succeeding("Why").then_fail(ChainError::Transport("reset".into())),
        );
        let pipeline = chain(primary, "canned");

        let mut fragments = pipeline.run_stream("bears");
        let mut seen = String::new();
        let mut failure = None;
        while let Some(item) = fragments.next().await {
            match item {
                Ok(text) => seen.push_str(&text),
                Err(err) => failure = Some(err),
            }
        }
        assert_eq!(seen, "Why");
        assert_eq!(failure, Some(ChainError::Transport("reset".into())));
    }

    #[test]
    fn build_accepts_opaque_inputs() {
        let pipeline = Pipeline::build("Tell me a joke about {topic}", "not a model", "not a key", "bears").unwrap();
        assert_eq!(pipeline.stage_names(), vec!["prompt", "not a model", "normalizer"]);
    }
}
