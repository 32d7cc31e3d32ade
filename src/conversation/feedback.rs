//! Practice feedback derived from user utterances.
//!
//! Scores are heuristics computed from the utterance text; they are shown
//! to the learner but never persisted with the session.

use serde::{Deserialize, Serialize};

use super::now_epoch_ms;
use crate::voice::LanguageCode;

const TYPED_FEEDBACK: &str = "Text message sent successfully. Great German sentence structure!";
const TYPED_PRONUNCIATION_SCORE: u8 = 85;

const SUGGESTIONS: &[&str] = &[
    "Focus on the 'ch' sound - it should be softer",
    "Practice rolling your 'r' sounds",
    "Work on vowel length distinctions",
    "Pay attention to word stress patterns",
];

const STRONG_POINTS: &[&str] = &[
    "Clear consonant pronunciation",
    "Good rhythm and flow",
    "Excellent intonation",
    "Natural pace",
];

/// Feedback on one user utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub id: String,
    pub german_text: String,
    pub pronunciation_score: u8,
    pub grammar_score: u8,
    pub fluency_score: u8,
    pub feedback: String,
    /// Things to work on. Empty for typed messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Things the learner did well. Empty for typed messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strong_points: Vec<String>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl FeedbackItem {
    /// Feedback for a spoken (transcribed) utterance.
    pub fn for_spoken(text: &str) -> Self {
        let words = word_count(text);
        let analysis = analyze_pronunciation(text, text);
        let mut item = Self::build(
            text,
            analysis.score,
            clamp_score(65 + (5 * words).min(30)),
            clamp_score(70 + (3 * words).min(25)),
            analysis.feedback.to_string(),
        );
        item.suggestions = to_owned(&analysis.suggestions);
        item.strong_points = to_owned(&analysis.strong_points);
        item
    }

    /// Feedback for a typed message. Pronunciation is not measured.
    pub fn for_typed(text: &str) -> Self {
        let words = word_count(text);
        Self::build(
            text,
            TYPED_PRONUNCIATION_SCORE,
            clamp_score(75 + (4 * words).min(20)),
            clamp_score(80 + (3 * words).min(15)),
            TYPED_FEEDBACK.to_string(),
        )
    }

    fn build(text: &str, pronunciation: u8, grammar: u8, fluency: u8, feedback: String) -> Self {
        Self {
            id: format!("feedback-{}", uuid::Uuid::new_v4()),
            german_text: text.to_string(),
            pronunciation_score: pronunciation,
            grammar_score: grammar,
            fluency_score: fluency,
            feedback,
            suggestions: Vec::new(),
            strong_points: Vec::new(),
            timestamp: now_epoch_ms(),
        }
    }
}

fn to_owned(hints: &[&str]) -> Vec<String> {
    hints.iter().map(|h| (*h).to_string()).collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn clamp_score(value: usize) -> u8 {
    u8::try_from(value.min(100)).unwrap_or(100)
}

// ── Pronunciation analysis ───────────────────────────────────────

/// Result of comparing what was heard against what was expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PronunciationAnalysis {
    pub score: u8,
    pub feedback: &'static str,
    pub suggestions: Vec<&'static str>,
    pub strong_points: Vec<&'static str>,
}

/// Similarity-based pronunciation score.
///
/// Identical text scores 100. Otherwise the score starts at 85 and loses
/// five points per character of length difference, floored at zero.
pub fn analyze_pronunciation(spoken: &str, target: &str) -> PronunciationAnalysis {
    let spoken = spoken.trim().to_lowercase();
    let target = target.trim().to_lowercase();

    let score = if spoken == target {
        100
    } else {
        let diff = spoken.chars().count().abs_diff(target.chars().count());
        85usize.saturating_sub(diff.saturating_mul(5))
    };
    let score = clamp_score(score);

    // Rotate through the canned hints so repeated utterances vary.
    let offset = spoken.chars().count();
    let pick = |list: &'static [&'static str], n: usize| -> Vec<&'static str> {
        (0..n).map(|i| list[(offset + i) % list.len()]).collect()
    };

    let (suggestions, strong_points) = if score < 80 {
        (pick(SUGGESTIONS, 2), pick(STRONG_POINTS, 1))
    } else {
        (pick(SUGGESTIONS, 1), pick(STRONG_POINTS, 2))
    };

    PronunciationAnalysis {
        score,
        feedback: pronunciation_feedback(score),
        suggestions,
        strong_points,
    }
}

/// Banded feedback text for a pronunciation score.
pub fn pronunciation_feedback(score: u8) -> &'static str {
    match score {
        85..=u8::MAX => "Your pronunciation is excellent! Keep up the great work.",
        70..=84 => {
            "Good pronunciation overall. Minor adjustments will help you sound even more natural."
        }
        50..=69 => {
            "Your pronunciation is understandable. Focus on the specific sounds mentioned above."
        }
        _ => "Keep practicing! Pronunciation improves with consistent effort.",
    }
}

// ── History ──────────────────────────────────────────────────────

/// In-memory feedback list for the current conversation.
#[derive(Debug, Clone, Default)]
pub struct FeedbackHistory {
    items: Vec<FeedbackItem>,
}

impl FeedbackHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless the most recent item is for the same text. Returns
    /// whether the item was added.
    pub fn push(&mut self, item: FeedbackItem) -> bool {
        if self
            .items
            .last()
            .is_some_and(|last| last.german_text == item.german_text)
        {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn items(&self) -> &[FeedbackItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Mean of all three scores across the history, if any.
    pub fn average_score(&self) -> Option<u8> {
        if self.items.is_empty() {
            return None;
        }
        let total: usize = self
            .items
            .iter()
            .map(|i| {
                usize::from(i.pronunciation_score)
                    + usize::from(i.grammar_score)
                    + usize::from(i.fluency_score)
            })
            .sum();
        Some(clamp_score(total / (self.items.len() * 3)))
    }
}

// ── Reply suggestions ────────────────────────────────────────────

/// A reply the learner could give next, with a translation into the known
/// language and a rough pronunciation guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseSuggestion {
    pub text: &'static str,
    pub translation: &'static str,
    pub pronunciation: &'static str,
}

const fn reply(
    text: &'static str,
    translation: &'static str,
    pronunciation: &'static str,
) -> ResponseSuggestion {
    ResponseSuggestion {
        text,
        translation,
        pronunciation,
    }
}

/// What the assistant's last message was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyContext {
    Greeting,
    Help,
    Other,
}

const GREETING_KEYWORDS: &[&str] = &[
    "hello",
    "welcome",
    "good morning",
    "guten morgen",
    "willkommen",
    "नमस्ते",
    "buenos días",
    "bienvenid",
];

const HELP_KEYWORDS: &[&str] = &["help", "need", "hilfe", "helfen", "मदद", "ayuda"];

/// Classify an assistant message by keyword. Greetings win over help.
pub fn reply_context(message: &str) -> ReplyContext {
    let message = message.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| message.contains(k));
    if mentions(GREETING_KEYWORDS) {
        ReplyContext::Greeting
    } else if mentions(HELP_KEYWORDS) {
        ReplyContext::Help
    } else {
        ReplyContext::Other
    }
}

struct ReplySet {
    greeting: [ResponseSuggestion; 2],
    help: [ResponseSuggestion; 2],
    other: [ResponseSuggestion; 2],
}

static GERMAN_REPLIES: ReplySet = ReplySet {
    greeting: [
        reply(
            "Guten Morgen! Ich bin die neue Krankenschwester.",
            "Good morning! I'm the new nurse.",
            "GOO-ten MOR-gen! ikh bin dee NOY-eh KRANK-en-shvess-ter",
        ),
        reply(
            "Vielen Dank für die Begrüßung.",
            "Thank you for the welcome.",
            "FEE-len dank fuer dee beh-GRUESS-ung",
        ),
    ],
    help: [
        reply(
            "Ja, ich brauche Hilfe beim Eingang.",
            "Yes, I need help with the entrance procedure.",
            "yah, ikh BROW-kheh HIL-feh baym AYN-gang",
        ),
        reply(
            "Können Sie mir zeigen, wo ich hin muss?",
            "Can you show me where I need to go?",
            "KUH-nen zee meer TSAY-gen, vo ikh hin muss",
        ),
    ],
    other: [
        reply("Ja, verstehe.", "Yes, I understand.", "yah, fer-SHTAY-eh"),
        reply(
            "Können Sie mir mehr sagen?",
            "Can you tell me more?",
            "KUH-nen zee meer mayr ZAH-gen",
        ),
    ],
};

static HINDI_REPLIES: ReplySet = ReplySet {
    greeting: [
        reply(
            "नमस्ते! मैं नई नर्स हूं।",
            "Hello! I'm the new nurse.",
            "na-mas-te! main na-yee nurse hoon",
        ),
        reply(
            "स्वागत के लिए धन्यवाद।",
            "Thank you for the welcome.",
            "swa-gat ke li-ye dhan-ya-vaad",
        ),
    ],
    help: [
        reply(
            "हां, मुझे मदद चाहिए।",
            "Yes, I need help.",
            "haan, mu-jhe ma-dad chaa-hi-ye",
        ),
        reply(
            "क्या आप मुझे दिखा सकते हैं?",
            "Can you show me?",
            "kya aap mu-jhe di-kha sak-te hain",
        ),
    ],
    other: [
        reply("हां, समझ गया।", "Yes, I understand.", "haan, samajh ga-ya"),
        reply(
            "कृपया और बताएं।",
            "Please tell me more.",
            "kri-pa-ya aur ba-taa-yen",
        ),
    ],
};

static SPANISH_REPLIES: ReplySet = ReplySet {
    greeting: [
        reply(
            "¡Buenos días! Soy la nueva enfermera.",
            "Good morning! I'm the new nurse.",
            "bwe-nos dee-as! soy la nwe-va en-fer-me-ra",
        ),
        reply(
            "Gracias por la bienvenida.",
            "Thank you for the welcome.",
            "gra-syas por la byen-ve-nee-da",
        ),
    ],
    help: [
        reply("Sí, necesito ayuda.", "Yes, I need help.", "see, ne-se-see-to a-yu-da"),
        reply(
            "¿Puede mostrarme dónde ir?",
            "Can you show me where to go?",
            "pwe-de mos-trar-me don-de eer",
        ),
    ],
    other: [
        reply("Sí, entiendo.", "Yes, I understand.", "see, en-tyen-do"),
        reply(
            "¿Puede decirme más?",
            "Can you tell me more?",
            "pwe-de de-seer-me mas",
        ),
    ],
};

fn reply_set(target: LanguageCode) -> Option<&'static ReplySet> {
    match target {
        LanguageCode::De => Some(&GERMAN_REPLIES),
        LanguageCode::Hi => Some(&HINDI_REPLIES),
        LanguageCode::Es => Some(&SPANISH_REPLIES),
        _ => None,
    }
}

/// Suggested replies to the assistant's last message, in `target`.
///
/// Keyword matches pick greeting or help replies; anything else gets the
/// general set. Languages without a reply set get no suggestions.
pub fn contextual_responses(
    last_assistant: &str,
    target: LanguageCode,
) -> Vec<ResponseSuggestion> {
    let Some(set) = reply_set(target) else {
        return Vec::new();
    };
    let replies = match reply_context(last_assistant) {
        ReplyContext::Greeting => &set.greeting,
        ReplyContext::Help => &set.help,
        ReplyContext::Other => &set.other,
    };
    replies.to_vec()
}
