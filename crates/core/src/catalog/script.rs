use serde::{Deserialize, Serialize};

use crate::domain::feature::FeatureId;
use crate::errors::DomainError;

pub const QUOTE_ANSWER_PREFIX: &str = "quote_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteOption {
    pub label: String,
    pub features: Vec<FeatureId>,
}

impl QuoteOption {
    pub fn new(label: impl Into<String>, features: &[&str]) -> Self {
        Self { label: label.into(), features: features.iter().map(|f| FeatureId::from(*f)).collect() }
    }

    /// Button payload for this option, e.g. `quote_basic_bot,custom_ui` or `quote_`.
    pub fn answer_token(&self) -> String {
        let csv = self.features.iter().map(FeatureId::as_str).collect::<Vec<_>>().join(",");
        format!("{QUOTE_ANSWER_PREFIX}{csv}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteQuestion {
    pub prompt: String,
    pub options: Vec<QuoteOption>,
}

impl QuoteQuestion {
    pub fn new(prompt: impl Into<String>, options: Vec<QuoteOption>) -> Self {
        Self { prompt: prompt.into(), options }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteScript {
    questions: Vec<QuoteQuestion>,
}

impl QuoteScript {
    pub fn new(questions: Vec<QuoteQuestion>) -> Result<Self, DomainError> {
        if questions.is_empty() {
            return Err(DomainError::InvalidQuoteScript("script has no questions".to_owned()));
        }
        if let Some(position) = questions.iter().position(|question| question.options.is_empty()) {
            return Err(DomainError::InvalidQuoteScript(format!(
                "question {} has no options",
                position + 1
            )));
        }
        Ok(Self { questions })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&QuoteQuestion> {
        self.questions.get(index)
    }

    pub fn questions(&self) -> &[QuoteQuestion] {
        &self.questions
    }
}

impl Default for QuoteScript {
    fn default() -> Self {
        let yes_no = |feature: &str| {
            vec![QuoteOption::new("Yes", &[feature]), QuoteOption::new("No", &[])]
        };

        Self {
            questions: vec![
                QuoteQuestion::new(
                    "What type of bot do you need?",
                    vec![
                        QuoteOption::new("Basic Telegram Bot", &["basic_bot"]),
                        QuoteOption::new("Advanced Bot with Custom UI", &["basic_bot", "custom_ui"]),
                        QuoteOption::new(
                            "E-commerce Bot",
                            &["basic_bot", "custom_ui", "payment_integration"],
                        ),
                    ],
                ),
                QuoteQuestion::new("Do you need API integrations?", yes_no("api_integration")),
                QuoteQuestion::new("Do you need database support?", yes_no("database_support")),
                QuoteQuestion::new("Do you need a web dashboard?", yes_no("web_dashboard")),
                QuoteQuestion::new("Do you need ongoing maintenance?", yes_no("maintenance")),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{QuoteOption, QuoteQuestion, QuoteScript};
    use crate::errors::DomainError;

    #[test]
    fn default_script_has_five_questions_with_tokens() {
        let script = QuoteScript::default();
        assert_eq!(script.len(), 5);

        let first = script.question(0).expect("first question");
        assert_eq!(first.options[2].answer_token(), "quote_basic_bot,custom_ui,payment_integration");

        let last = script.question(4).expect("last question");
        assert_eq!(last.options[1].answer_token(), "quote_");
        assert!(script.question(5).is_none());
    }

    #[test]
    fn scripts_without_questions_or_options_are_rejected() {
        assert!(matches!(QuoteScript::new(Vec::new()), Err(DomainError::InvalidQuoteScript(_))));

        let error = QuoteScript::new(vec![
            QuoteQuestion::new("Hosting?", vec![QuoteOption::new("Yes", &["hosting"])]),
            QuoteQuestion::new("Anything else?", Vec::new()),
        ])
        .expect_err("empty options");
        assert_eq!(error.to_string(), "invalid quote script: question 2 has no options");
    }
}
