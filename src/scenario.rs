//! Scenario definitions loaded from TOML, and the connect configuration
//! derived from them.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::VoiceConfig;
use crate::conversation::Message;
use crate::objectives::{Objective, ObjectiveEvaluator};
use crate::voice::{ConnectConfig, LanguagePair, ModelSettings, VoiceSettings};

/// The character the assistant plays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub role: String,
}

/// Conversation goals and their index-aligned trigger phrases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Goals {
    pub objectives: Vec<String>,
    pub completion_triggers: Vec<String>,
}

/// Assistant settings. Unset fields fall back to the `[voice]` config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    pub system_prompt: String,
    pub voice_provider: Option<String>,
    pub model_provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// A role-play scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub situation: String,
    pub character: Character,
    #[serde(default)]
    pub goals: Goals,
    #[serde(default)]
    pub assistant: AssistantSettings,
}

impl Scenario {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let scenario: Self = toml::from_str(text).context("Invalid scenario definition")?;
        if scenario.goals.completion_triggers.len() < scenario.goals.objectives.len() {
            tracing::warn!(
                scenario = %scenario.id,
                objectives = scenario.goals.objectives.len(),
                triggers = scenario.goals.completion_triggers.len(),
                "Some objectives have no completion trigger and can never complete"
            );
        }
        Ok(scenario)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Failed to load scenario: {}", path.display()))
    }

    /// Fresh objectives for a new session.
    pub fn objectives(&self) -> Vec<Objective> {
        Objective::from_goals(&self.goals.objectives)
    }

    pub fn evaluator(&self) -> ObjectiveEvaluator {
        ObjectiveEvaluator::new(&self.goals.completion_triggers)
    }

    /// Display name of the assistant ("Frau Weber - Hospital Administrator").
    pub fn assistant_name(&self) -> String {
        format!("{} - {}", self.character.name, self.character.role)
    }

    /// Resolve everything the voice service needs to start this scenario.
    ///
    /// `context` holds the messages of the session being resumed; they are
    /// appended to the system prompt so the assistant can pick up where the
    /// conversation left off.
    pub fn connect_config(
        &self,
        pair: &LanguagePair,
        voice: &VoiceConfig,
        context: &[Message],
    ) -> ConnectConfig {
        let base_prompt = if self.assistant.system_prompt.trim().is_empty() {
            pair.system_prompt(&self.situation)
        } else {
            pair.adapt_scenario_prompt(&self.assistant.system_prompt)
        };

        ConnectConfig {
            name: self.assistant_name(),
            system_prompt: format!("{base_prompt}{}", context_block(context)),
            first_message: pair.target.greeting().to_string(),
            voice: VoiceSettings {
                provider: self
                    .assistant
                    .voice_provider
                    .clone()
                    .unwrap_or_else(|| voice.voice_provider.clone()),
                voice_id: pair.voice_id(voice.voice_id.as_deref()),
            },
            model: ModelSettings {
                provider: self
                    .assistant
                    .model_provider
                    .clone()
                    .unwrap_or_else(|| voice.model_provider.clone()),
                model: self
                    .assistant
                    .model
                    .clone()
                    .unwrap_or_else(|| voice.model.clone()),
                temperature: self.assistant.temperature.unwrap_or(voice.temperature),
            },
            transcriber_language: voice.transcriber_language.clone(),
            assistant_id: voice.assistant_id.clone(),
        }
    }
}

/// Previous-conversation block appended to the system prompt.
fn context_block(messages: &[Message]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let lines = messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("\n\nPrevious conversation context:\n{lines}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::voice::LanguageCode;

    const FIRST_DAY: &str = include_str!("../scenarios/first-day.toml");

    fn first_day() -> Scenario {
        Scenario::from_toml_str(FIRST_DAY).unwrap()
    }

    #[test]
    fn bundled_scenario_parses() {
        let s = first_day();
        assert_eq!(s.id, "first-day");
        assert_eq!(s.assistant_name(), "Frau Weber - Hospital Administrator");
        assert_eq!(s.goals.objectives.len(), s.goals.completion_triggers.len());
        let objectives = s.objectives();
        assert_eq!(objectives[0].id, "obj-0");
        assert_eq!(s.evaluator().trigger_count(), objectives.len());
    }

    #[test]
    fn connect_config_uses_language_defaults() {
        let s = first_day();
        let pair = LanguagePair::default();
        let cfg = s.connect_config(&pair, &VoiceConfig::default(), &[]);
        assert_eq!(cfg.first_message, LanguageCode::De.greeting());
        assert_eq!(cfg.voice.voice_id, LanguageCode::De.default_voice_id());
        assert_eq!(cfg.transcriber_language, "multi");
        assert!(cfg.system_prompt.contains("respond ONLY in German"));
        assert!(!cfg.system_prompt.contains("Previous conversation context"));
        assert!(cfg.assistant_id.is_none());
    }

    #[test]
    fn connect_config_retargets_language_and_overrides_voice() {
        let s = first_day();
        let pair = LanguagePair {
            target: LanguageCode::Es,
            known: LanguageCode::En,
        };
        let voice = VoiceConfig {
            voice_id: Some("custom".into()),
            assistant_id: Some("asst-9".into()),
            ..VoiceConfig::default()
        };
        let cfg = s.connect_config(&pair, &voice, &[]);
        assert_eq!(cfg.first_message, LanguageCode::Es.greeting());
        assert_eq!(cfg.voice.voice_id, "custom");
        assert_eq!(cfg.assistant_id.as_deref(), Some("asst-9"));
        assert!(!cfg.system_prompt.contains("German"));
        assert!(cfg.system_prompt.contains("Spanish"));
    }

    #[test]
    fn context_messages_are_appended() {
        let s = first_day();
        let context = vec![
            Message::new(Role::Assistant, "Guten Morgen!"),
            Message::new(Role::User, "Ich bin neu"),
        ];
        let cfg = s.connect_config(&LanguagePair::default(), &VoiceConfig::default(), &context);
        assert!(cfg.system_prompt.ends_with(
            "\n\nPrevious conversation context:\nassistant: Guten Morgen!\nuser: Ich bin neu"
        ));
    }

    #[test]
    fn missing_prompt_falls_back_to_tutor_prompt() {
        let s = Scenario::from_toml_str(
            r#"
            id = "cafe"
            title = "Cafe"
            situation = "Ordering coffee"

            [character]
            name = "Lena"
            role = "Barista"
            "#,
        )
        .unwrap();
        let cfg = s.connect_config(&LanguagePair::default(), &VoiceConfig::default(), &[]);
        assert!(cfg.system_prompt.contains("Context: Ordering coffee"));
        assert_eq!(cfg.model.model, "gpt-4");
        assert!(s.objectives().is_empty());
    }

    #[test]
    fn invalid_scenario_is_an_error() {
        assert!(Scenario::from_toml_str("id = 3").is_err());
    }
}
