//! Help and context texts for follow-up questions.

use convtax_core::config::ExplanationConfig;

/// Source of explanations for a previously handled intent.
pub trait ExplanationLookup: Send + Sync {
    /// Help for the given intent, refined by the action when one was set.
    fn help_text(&self, intent_name: &str, action_name: Option<&str>) -> String;

    /// Why the conversation is asking about the given intent.
    fn context_text(&self, intent_name: &str) -> String;

    /// Reply when there is no earlier exchange to explain.
    fn nothing_to_explain(&self) -> String;
}

/// Explanations read from the `[explanations]` config section.
#[derive(Debug, Clone, Default)]
pub struct ExplanationCatalog {
    config: ExplanationConfig,
}

impl ExplanationCatalog {
    pub fn new(config: ExplanationConfig) -> Self {
        Self { config }
    }
}

impl ExplanationLookup for ExplanationCatalog {
    fn help_text(&self, intent_name: &str, action_name: Option<&str>) -> String {
        action_name
            .and_then(|action| self.config.help_by_action.get(action))
            .or_else(|| self.config.help.get(intent_name))
            .unwrap_or(&self.config.default_help)
            .clone()
    }

    fn context_text(&self, intent_name: &str) -> String {
        self.config
            .context
            .get(intent_name)
            .unwrap_or(&self.config.default_context)
            .clone()
    }

    fn nothing_to_explain(&self) -> String {
        self.config.no_history.clone()
    }
}
