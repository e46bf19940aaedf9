//! Prompt formatting: template + variables → request payload.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tandem_core::{ChainError, Message, RequestPayload};

use crate::stage::{Stage, StageValue};

/// Named values substituted into a template.
pub type TemplateVars = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// A prompt template with `{name}` substitution slots.
///
/// `{{` and `}}` produce literal braces. Substituted values are inserted
/// verbatim: no escaping and no length limit.
///
/// ```rust
/// use tandem_engine::PromptTemplate;
///
/// let template = PromptTemplate::new("Tell me a joke about {topic}").unwrap();
/// let payload = template.format_value("topic", "bears").unwrap();
/// assert_eq!(payload.text(), "Tell me a joke about bears");
/// ```
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parses `template`, failing on unbalanced braces or empty slot names.
    pub fn new(template: &str) -> Result<Self, ChainError> {
        Ok(Self {
            template: template.to_string(),
            segments: parse(template)?,
        })
    }

    /// The template source.
    pub fn source(&self) -> &str {
        &self.template
    }

    /// Slot names in order of first appearance.
    pub fn variables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Slot(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Renders the template into a single-user-message payload.
    ///
    /// The slot names and the supplied variable names must match exactly.
    pub fn format(&self, vars: &TemplateVars) -> Result<RequestPayload, ChainError> {
        let slots = self.variables();

        if let Some(missing) = slots.iter().find(|name| !vars.contains_key(**name)) {
            return Err(ChainError::Template(format!(
                "missing value for slot '{{{missing}}}' in \"{}\"",
                self.template
            )));
        }
        if let Some(extra) = vars.keys().find(|key| !slots.contains(&key.as_str())) {
            return Err(ChainError::Template(format!(
                "no slot named '{{{extra}}}' in \"{}\"",
                self.template
            )));
        }

        let mut rendered = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Slot(name) => rendered.push_str(&vars[name]),
            }
        }

        Ok(RequestPayload::new(vec![Message::user(rendered)]))
    }

    /// Renders the template with a single variable.
    pub fn format_value(&self, name: &str, value: &str) -> Result<RequestPayload, ChainError> {
        self.format(&TemplateVars::from([(name.to_string(), value.to_string())]))
    }
}

fn parse(template: &str) -> Result<Vec<Segment>, ChainError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(ChainError::Template(format!("unclosed slot in \"{template}\"")));
                        }
                        Some(ch) => name.push(ch),
                    }
                }
                if name.is_empty() {
                    return Err(ChainError::Template(format!("empty slot name in \"{template}\"")));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Slot(name));
            }
            '}' => {
                return Err(ChainError::Template(format!("unmatched '}}' in \"{template}\"")));
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[async_trait]
impl Stage for PromptTemplate {
    fn name(&self) -> &str {
        "prompt"
    }

    async fn process(&self, input: StageValue) -> Result<StageValue, ChainError> {
        match input {
            StageValue::Vars(vars) => Ok(StageValue::Payload(self.format(&vars)?)),
            other => Err(ChainError::StageInput {
                stage: self.name().to_string(),
                expected: "vars",
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(value: &str) -> TemplateVars {
        TemplateVars::from([("topic".to_string(), value.to_string())])
    }

    #[test]
    fn substitutes_topic_verbatim_once() {
        let template = PromptTemplate::new("Tell me a joke about {topic}").unwrap();
        for value in ["bears", "", "{not a slot}", "ünïcödé 🐻", "a\nb"] {
            let text = template.format(&topic(value)).unwrap().text();
            assert_eq!(text, format!("Tell me a joke about {value}"));
            assert_eq!(text.strip_prefix("Tell me a joke about "), Some(value));
        }
    }

    #[test]
    fn slot_in_the_middle() {
        let template = PromptTemplate::new("A {topic} walks into a bar.").unwrap();
        let payload = template.format(&topic("bear")).unwrap();
        assert_eq!(payload.text(), "A bear walks into a bar.");
        assert_eq!(payload.messages().len(), 1);
    }

    #[test]
    fn template_without_slot_rejects_topic() {
        let template = PromptTemplate::new("Tell me a joke").unwrap();
        let err = template.format(&topic("bears")).unwrap_err();
        assert!(matches!(err, ChainError::Template(_)));
    }

    #[test]
    fn mismatched_slot_name_fails() {
        let template = PromptTemplate::new("Tell me a joke about {subject}").unwrap();
        let err = template.format(&topic("bears")).unwrap_err();
        assert!(matches!(err, ChainError::Template(msg) if msg.contains("subject")));
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = PromptTemplate::new("{{\"topic\": {topic}}}").unwrap();
        assert_eq!(template.variables(), vec!["topic"]);
        assert_eq!(template.format(&topic("bears")).unwrap().text(), "{\"topic\": bears}");
    }

    #[test]
    fn malformed_templates_fail_to_parse() {
        for bad in ["Tell me about {topic", "Tell me about topic}", "Tell me about {}", "{a{b}}"] {
            assert!(
                matches!(PromptTemplate::new(bad), Err(ChainError::Template(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[tokio::test]
    async fn stage_rejects_wrong_input_kind() {
        let template = PromptTemplate::new("{topic}").unwrap();
        let err = template.process(StageValue::Text("bears".into())).await.unwrap_err();
        assert!(matches!(err, ChainError::StageInput { expected: "vars", found: "text", .. }));
    }
}
