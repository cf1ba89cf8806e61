//! Prompt templates for adbrief.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub conversation: ConversationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the brief-gathering conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationPrompts {
    /// System turn that frames the assistant's task. `{{sentinel}}` is replaced
    /// with the configured completion marker.
    pub system: String,
    /// Fixed greeting returned when a session starts.
    pub greeting: String,
}

impl Default for ConversationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI advertising assistant helping to gather detailed information about ad requirements.
Ask focused questions one at a time to understand the client's needs. After each user response, evaluate if you have
enough information to generate a 4-5 word YouTube search query. If you do, start your response with '{{sentinel}}'
followed only by the suggested search query. Otherwise, ask another relevant question."#
                .to_string(),

            greeting: "Hello! I'm here to help you create an effective advertisement. What would you like to create an ad for?"
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let conversation_path = custom_path.join("conversation.toml");
            if conversation_path.exists() {
                let content = std::fs::read_to_string(&conversation_path)?;
                prompts.conversation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }

    /// The rendered system prompt for a conversation using `sentinel`.
    pub fn system_prompt(&self, sentinel: &str) -> String {
        let mut vars = HashMap::new();
        vars.insert("sentinel".to_string(), sentinel.to_string());
        self.render_with_custom(&self.conversation.system, &vars)
    }

    /// The rendered greeting.
    pub fn greeting(&self) -> String {
        self.render_with_custom(&self.conversation.greeting, &HashMap::new())
    }
}
