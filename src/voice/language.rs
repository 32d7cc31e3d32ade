//! Language pair configuration: which language the user is learning, which
//! one they already know, and the per-language defaults derived from it
//! (greeting, voice id, system prompt wording, common phrase glosses).

use serde::{Deserialize, Serialize};

/// Voice used when a language has no dedicated default.
const FALLBACK_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

// ── Language codes ───────────────────────────────────────────────

/// ISO 639-1 language codes supported for role-play practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    De, // German
    En, // English
    Hi, // Hindi
    Es, // Spanish
    Fr, // French
    It, // Italian
    Pt, // Portuguese
    Ja, // Japanese
    Zh, // Chinese
    Ko, // Korean
    Ar, // Arabic
    Ru, // Russian
    Nl, // Dutch
    Sv, // Swedish
    Pl, // Polish
    Tr, // Turkish
}

impl LanguageCode {
    /// Get the ISO 639-1 code string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::De => "de",
            Self::En => "en",
            Self::Hi => "hi",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::It => "it",
            Self::Pt => "pt",
            Self::Ja => "ja",
            Self::Zh => "zh",
            Self::Ko => "ko",
            Self::Ar => "ar",
            Self::Ru => "ru",
            Self::Nl => "nl",
            Self::Sv => "sv",
            Self::Pl => "pl",
            Self::Tr => "tr",
        }
    }

    /// Get the human-readable language name.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::De => "German",
            Self::En => "English",
            Self::Hi => "Hindi",
            Self::Es => "Spanish",
            Self::Fr => "French",
            Self::It => "Italian",
            Self::Pt => "Portuguese",
            Self::Ja => "Japanese",
            Self::Zh => "Chinese",
            Self::Ko => "Korean",
            Self::Ar => "Arabic",
            Self::Ru => "Russian",
            Self::Nl => "Dutch",
            Self::Sv => "Swedish",
            Self::Pl => "Polish",
            Self::Tr => "Turkish",
        }
    }

    /// Parse from string code (case-insensitive).
    pub fn from_str_code(code: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(code.trim()))
    }

    /// All supported codes.
    pub fn all() -> &'static [LanguageCode] {
        &[
            Self::De,
            Self::En,
            Self::Hi,
            Self::Es,
            Self::Fr,
            Self::It,
            Self::Pt,
            Self::Ja,
            Self::Zh,
            Self::Ko,
            Self::Ar,
            Self::Ru,
            Self::Nl,
            Self::Sv,
            Self::Pl,
            Self::Tr,
        ]
    }

    /// Opening line the assistant speaks when a call starts.
    pub fn greeting(self) -> &'static str {
        match self {
            Self::De => "Guten Morgen! Wie kann ich Ihnen helfen?",
            Self::Hi => "नमस्ते! मैं आपकी कैसे मदद कर सकता हूं?",
            Self::Es => "¡Buenos días! ¿Cómo puedo ayudarte?",
            Self::Fr => "Bonjour! Comment puis-je vous aider?",
            Self::It => "Buongiorno! Come posso aiutarti?",
            Self::Pt => "Bom dia! Como posso ajudá-lo?",
            Self::Ja => "おはようございます！どのようにお手伝いできますか？",
            Self::Zh => "早上好！我能帮你什么？",
            Self::Ko => "좋은 아침입니다! 어떻게 도와드릴까요?",
            Self::Ar => "صباح الخير! كيف يمكنني مساعدتك؟",
            Self::Ru => "Доброе утро! Как я могу вам помочь?",
            Self::Nl => "Goedemorgen! Hoe kan ik u helpen?",
            Self::Sv => "God morgon! Hur kan jag hjälpa dig?",
            Self::Pl => "Dzień dobry! Jak mogę ci pomóc?",
            Self::Tr => "Günaydın! Size nasıl yardımcı olabilirim?",
            Self::En => "Hello! How can I help you?",
        }
    }

    /// Default synthesis voice for this language.
    pub fn default_voice_id(self) -> &'static str {
        match self {
            Self::Hi | Self::Ja | Self::Zh | Self::Ko | Self::Ar => "pNInz6obpgDQGcFmaJgB",
            Self::Es | Self::It | Self::Pt | Self::Tr => "EXAVITQu4vr4xnSDxMaL",
            Self::De | Self::Fr | Self::Ru | Self::Nl | Self::Sv | Self::Pl | Self::En => {
                FALLBACK_VOICE_ID
            }
        }
    }

    /// Everyday phrases in this language paired with their English meaning.
    /// Empty for languages without a phrase list.
    pub fn common_phrases(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::De => &[
                ("Guten Morgen", "Good morning"),
                ("Wie geht es Ihnen", "How are you"),
                ("Danke", "Thank you"),
                ("Bitte", "Please"),
                ("Ja", "Yes"),
                ("Nein", "No"),
                ("Entschuldigung", "Excuse me"),
            ],
            Self::Hi => &[
                ("नमस्ते", "Hello"),
                ("धन्यवाद", "Thank you"),
                ("कृपया", "Please"),
                ("हां", "Yes"),
                ("नहीं", "No"),
                ("माफ़ करें", "Excuse me"),
            ],
            Self::Es => &[
                ("Buenos días", "Good morning"),
                ("¿Cómo estás?", "How are you"),
                ("Gracias", "Thank you"),
                ("Por favor", "Please"),
                ("Sí", "Yes"),
                ("No", "No"),
                ("Perdón", "Excuse me"),
            ],
            _ => &[],
        }
    }

    /// Gloss the common phrases found in `text`.
    ///
    /// An exact phrase returns its meaning. Otherwise every whole-word
    /// occurrence of a known phrase is replaced, ignoring case. `None` when
    /// no phrase occurs.
    pub fn translation_hint(self, text: &str) -> Option<String> {
        let text = text.trim();
        let phrases = self.common_phrases();
        if let Some((_, meaning)) = phrases.iter().find(|(phrase, _)| *phrase == text) {
            return Some((*meaning).to_string());
        }

        let mut hint = text.to_string();
        for (phrase, meaning) in phrases {
            hint = replace_words_ignore_case(&hint, phrase, meaning);
        }
        (hint != text).then_some(hint)
    }
}

/// Byte length of the case-insensitive match of `needle` at the start of
/// `haystack`.
fn prefix_match_len(haystack: &str, needle: &str) -> Option<usize> {
    let mut hay = haystack.char_indices();
    for n in needle.chars() {
        let (_, h) = hay.next()?;
        if !h.to_lowercase().eq(n.to_lowercase()) {
            return None;
        }
    }
    Some(hay.next().map_or(haystack.len(), |(i, _)| i))
}

fn replace_words_ignore_case(text: &str, needle: &str, replacement: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(char::is_alphanumeric);
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut prev: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        if !is_word(prev) {
            if let Some(len) = prefix_match_len(rest, needle) {
                if !is_word(rest[len..].chars().next()) {
                    out.push_str(replacement);
                    prev = needle.chars().last();
                    rest = &rest[len..];
                    continue;
                }
            }
        }
        out.push(c);
        prev = Some(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

// ── Language pair ────────────────────────────────────────────────

/// The language being learned and the language the user already knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguagePair {
    pub target: LanguageCode,
    pub known: LanguageCode,
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self {
            target: LanguageCode::De,
            known: LanguageCode::En,
        }
    }
}

impl LanguagePair {
    /// Generic tutor prompt, used when no scenario prompt is available.
    pub fn system_prompt(&self, scenario_context: &str) -> String {
        let target = self.target.display_name();
        let known = self.known.display_name();
        let context = if scenario_context.trim().is_empty() {
            String::new()
        } else {
            format!("Context: {}", scenario_context.trim())
        };

        format!(
            "You are a helpful {target} language instructor helping a student learn conversational {target}.\n\
             The student knows {known} and wants to learn {target}.\n\n\
             Speak naturally and provide encouragement. Keep responses concise and contextual.\n\
             Always respond ONLY in {target} - never use {known} in your responses.\n\n\
             {context}"
        )
    }

    /// Rewrite a scenario prompt authored for German so it targets the
    /// configured language, and pin the response language.
    pub fn adapt_scenario_prompt(&self, prompt: &str) -> String {
        let target = self.target.display_name();
        let known = self.known.display_name();
        let adapted = prompt
            .replace("German", target)
            .replace("german", &target.to_lowercase())
            .replace("Deutsch", target);

        format!(
            "{adapted}\n\nIMPORTANT: You must respond ONLY in {target}. Never use {known} in your responses. \
             The student knows {known} and is learning {target}."
        )
    }

    /// Voice id to use: the explicit override when set, otherwise the
    /// target language default.
    pub fn voice_id(&self, override_id: Option<&str>) -> String {
        match override_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id.to_string(),
            None => self.target.default_voice_id().to_string(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_code_roundtrip() {
        for lang in LanguageCode::all() {
            let code = lang.as_str();
            assert_eq!(LanguageCode::from_str_code(code), Some(*lang), "{code}");
        }
    }

    #[test]
    fn from_str_code_is_case_insensitive() {
        assert_eq!(LanguageCode::from_str_code("DE"), Some(LanguageCode::De));
        assert_eq!(LanguageCode::from_str_code(" es "), Some(LanguageCode::Es));
        assert_eq!(LanguageCode::from_str_code("xx"), None);
    }

    #[test]
    fn english_falls_back_to_generic_greeting() {
        assert_eq!(LanguageCode::En.greeting(), "Hello! How can I help you?");
        assert_eq!(LanguageCode::En.default_voice_id(), FALLBACK_VOICE_ID);
    }

    #[test]
    fn voice_override_wins_when_non_empty() {
        let pair = LanguagePair {
            target: LanguageCode::Es,
            known: LanguageCode::En,
        };
        assert_eq!(pair.voice_id(Some("custom-voice")), "custom-voice");
        assert_eq!(pair.voice_id(Some("  ")), "EXAVITQu4vr4xnSDxMaL");
        assert_eq!(pair.voice_id(None), "EXAVITQu4vr4xnSDxMaL");
    }

    #[test]
    fn adapt_scenario_prompt_retargets_language() {
        let pair = LanguagePair {
            target: LanguageCode::Fr,
            known: LanguageCode::En,
        };
        let prompt = pair.adapt_scenario_prompt("Speak German only. Deutsch bitte.");
        assert!(prompt.starts_with("Speak French only. French bitte."));
        assert!(prompt.contains("respond ONLY in French"));
        assert!(prompt.contains("Never use English"));
    }

    #[test]
    fn system_prompt_includes_context_when_given() {
        let pair = LanguagePair::default();
        let with_ctx = pair.system_prompt("Hospital orientation");
        assert!(with_ctx.contains("Context: Hospital orientation"));
        assert!(with_ctx.contains("respond ONLY in German"));

        let without = pair.system_prompt("");
        assert!(!without.contains("Context:"));
    }

    #[test]
    fn common_phrases_per_language() {
        assert!(LanguageCode::De
            .common_phrases()
            .contains(&("Guten Morgen", "Good morning")));
        assert_eq!(LanguageCode::Hi.common_phrases().len(), 6);
        assert_eq!(LanguageCode::Es.common_phrases()[2], ("Gracias", "Thank you"));
        assert!(LanguageCode::Ja.common_phrases().is_empty());
    }

    #[test]
    fn exact_phrase_translates_directly() {
        assert_eq!(
            LanguageCode::De.translation_hint(" Danke "),
            Some("Thank you".to_string())
        );
    }

    #[test]
    fn known_phrases_are_glossed_inside_sentences() {
        assert_eq!(
            LanguageCode::De.translation_hint("guten morgen, Frau Weber. Danke!"),
            Some("Good morning, Frau Weber. Thank you!".to_string())
        );
        assert_eq!(
            LanguageCode::Es.translation_hint("Muchas gracias por favor"),
            Some("Muchas Thank you Please".to_string())
        );
    }

    #[test]
    fn phrases_only_match_whole_words() {
        // "Ja" inside "Januar" is not the word "Ja".
        assert_eq!(LanguageCode::De.translation_hint("Im Januar"), None);
        assert_eq!(LanguageCode::Fr.translation_hint("Merci"), None);
    }
}
