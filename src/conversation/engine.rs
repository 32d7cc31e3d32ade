//! Conversation engine: a synchronous reducer over voice events and user
//! commands.
//!
//! The engine owns every piece of per-conversation state (buffers, gate,
//! history, objectives, feedback) and never performs I/O. Each call returns
//! the [`Effect`]s the runtime must carry out: provider calls, persistence,
//! timer resets, and notices for the user.

use serde::{Deserialize, Serialize};

use super::accumulator::{TranscriptAccumulator, Utterance};
use super::cleaner::MessageCleaner;
use super::feedback::{self, FeedbackHistory, FeedbackItem, ResponseSuggestion};
use super::history::ConversationHistory;
use super::turn::{ConnectionStatus, GateRefusal, ListeningState, Speaker, TurnMachine};
use super::{Message, Role};
use crate::objectives::{self, Objective, ObjectiveEvaluator};
use crate::voice::{LanguageCode, VoiceEvent};

/// Default conversation length limit, counted in messages.
pub const DEFAULT_MAX_CONVERSATION_TURNS: usize = 50;

/// Live user transcript placeholder while the gate is open.
pub const LISTENING_LABEL: &str = "Listening...";
/// Live user transcript placeholder while waiting for the final transcript.
pub const PROCESSING_LABEL: &str = "Processing...";

// ── Commands ─────────────────────────────────────────────────────

/// User-initiated actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Command {
    /// Open the listening gate (push-to-talk pressed).
    StartListening,
    /// Release push-to-talk; the final transcript is still accepted.
    StopListening,
    /// Send a typed message.
    SendText { text: String },
    /// Hang up.
    Disconnect,
}

// ── Effects ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_level(NoticeLevel::Error, title, message)
    }

    fn with_level(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Why a conversation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    ObjectivesMet,
    TurnLimit,
}

/// Something the runtime must do in response to an engine transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// A message passed every filter and was appended; persist it.
    MessageAppended(Message),
    /// Live (non-final) transcript for display. Empty text clears it.
    LiveTranscript { role: Role, text: String },
    /// Assistant started or stopped speaking.
    AssistantSpeaking(bool),
    /// Listening gate moved.
    ListeningChanged(ListeningState),
    /// Objective completion or progress changed; persist.
    ObjectivesUpdated(Vec<Objective>),
    /// The conversation reached its terminal state.
    ConversationComplete(CompletionReason),
    /// Feedback generated for a user utterance.
    Feedback(FeedbackItem),
    /// Replies the learner could give to the assistant's last message.
    Suggestions(Vec<ResponseSuggestion>),
    /// Show a notice.
    Notify(Notice),
    /// Forward typed text to the provider.
    SendText(String),
    /// Ask the provider to hang up.
    Disconnect,
    /// Reset the inactivity countdown.
    Activity,
    /// Connection status moved. `user_initiated` is only meaningful for
    /// `Disconnected`.
    ConnectionChanged {
        status: ConnectionStatus,
        user_initiated: bool,
    },
}

// ── Engine ───────────────────────────────────────────────────────

/// Per-conversation state machine.
pub struct ConversationEngine {
    accumulator: TranscriptAccumulator,
    cleaner: MessageCleaner,
    history: ConversationHistory,
    turn: TurnMachine,
    evaluator: ObjectiveEvaluator,
    objectives: Vec<Objective>,
    feedback: FeedbackHistory,
    completed: Option<CompletionReason>,
    max_turns: usize,
    language: LanguageCode,
}

impl ConversationEngine {
    pub fn new(
        cleaner: MessageCleaner,
        evaluator: ObjectiveEvaluator,
        objectives: Vec<Objective>,
    ) -> Self {
        Self {
            accumulator: TranscriptAccumulator::new(),
            cleaner,
            history: ConversationHistory::new(),
            turn: TurnMachine::new(),
            evaluator,
            objectives,
            feedback: FeedbackHistory::new(),
            completed: None,
            max_turns: DEFAULT_MAX_CONVERSATION_TURNS,
            language: LanguageCode::De,
        }
    }

    /// Set the language reply suggestions are given in.
    pub fn with_language(mut self, language: LanguageCode) -> Self {
        self.language = language;
        self
    }

    /// Set the message count at which the conversation ends.
    pub fn with_max_conversation_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Resume a persisted conversation. Objectives keep whatever completion
    /// they already had.
    pub fn restore(&mut self, messages: Vec<Message>, saved: Vec<Objective>, complete: bool) {
        self.history.restore(messages);
        if !saved.is_empty() {
            self.objectives = saved;
        }
        self.completed = if complete {
            Some(if objectives::all_complete(&self.objectives) {
                CompletionReason::ObjectivesMet
            } else {
                CompletionReason::TurnLimit
            })
        } else {
            None
        };
        tracing::info!(
            messages = self.history.len(),
            complete,
            "Restored conversation state"
        );
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn messages(&self) -> &[Message] {
        self.history.messages()
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.objectives
    }

    pub fn feedback(&self) -> &FeedbackHistory {
        &self.feedback
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.turn.connection()
    }

    pub fn listening(&self) -> ListeningState {
        self.turn.listening()
    }

    pub fn speaker(&self) -> Speaker {
        self.turn.speaker()
    }

    pub fn is_complete(&self) -> bool {
        self.completed.is_some()
    }

    pub fn completion_reason(&self) -> Option<CompletionReason> {
        self.completed
    }

    // ── Connection attempts ──────────────────────────────────────

    /// A connection attempt is starting.
    pub fn begin_connect(&mut self) -> Vec<Effect> {
        self.turn.connecting();
        vec![Effect::ConnectionChanged {
            status: ConnectionStatus::Connecting,
            user_initiated: false,
        }]
    }

    /// The connection attempt failed before the call started.
    pub fn connect_failed(&mut self, reason: &str) -> Vec<Effect> {
        self.turn.connect_failed();
        vec![
            Effect::ConnectionChanged {
                status: ConnectionStatus::Disconnected,
                user_initiated: false,
            },
            Effect::Notify(Notice::error("Connection Failed", reason)),
        ]
    }

    // ── Voice events ─────────────────────────────────────────────

    /// Speech and transcript events that change state also reset the
    /// inactivity countdown; ignored ones do not.
    pub fn handle_event(&mut self, event: VoiceEvent) -> Vec<Effect> {
        tracing::trace!(kind = event.kind(), "Voice event");
        let activity = event.is_activity();
        let mut effects = match event {
            VoiceEvent::Connected => self.on_connected(),
            VoiceEvent::Disconnected => self.on_disconnected(),
            VoiceEvent::SpeechStarted => self.on_speech_started(),
            VoiceEvent::SpeechEnded => self.on_speech_ended(),
            VoiceEvent::PartialAssistant { transcript } => self.on_assistant_partial(&transcript),
            VoiceEvent::FinalAssistant { transcript } => self.on_assistant_final(&transcript),
            VoiceEvent::PartialUser { transcript } => self.on_user_partial(&transcript),
            VoiceEvent::FinalUser { transcript } => self.on_user_final(&transcript),
            VoiceEvent::Error { message } => {
                tracing::warn!(error = %message, "Voice service error");
                vec![Effect::Notify(Notice::error("Voice Error", message))]
            }
        };
        if activity && !effects.is_empty() {
            effects.insert(0, Effect::Activity);
        }
        effects
    }

    fn on_connected(&mut self) -> Vec<Effect> {
        tracing::info!("Voice call started");
        self.turn.connected();
        vec![
            Effect::ConnectionChanged {
                status: ConnectionStatus::Connected,
                user_initiated: false,
            },
            Effect::Notify(Notice::info(
                "Connected",
                "Voice conversation started. Click the microphone to speak.",
            )),
        ]
    }

    fn on_disconnected(&mut self) -> Vec<Effect> {
        match self.teardown() {
            Some(effects) => effects,
            None => {
                tracing::debug!("Disconnect while already disconnected");
                Vec::new()
            }
        }
    }

    /// Close the gate and drop in-flight turns. `None` when already
    /// disconnected.
    fn teardown(&mut self) -> Option<Vec<Effect>> {
        let was_speaking = self.accumulator.is_accumulating_assistant();
        let was_listening = self.turn.listening() != ListeningState::Idle;
        let user_initiated = self.turn.disconnected()?;
        self.accumulator.discard();

        tracing::info!(user_initiated, "Voice call ended");

        let mut effects = Vec::new();
        if was_speaking {
            effects.push(Effect::AssistantSpeaking(false));
            effects.push(Effect::LiveTranscript {
                role: Role::Assistant,
                text: String::new(),
            });
        }
        if was_listening {
            effects.push(Effect::ListeningChanged(ListeningState::Idle));
            effects.push(Effect::LiveTranscript {
                role: Role::User,
                text: String::new(),
            });
        }
        effects.push(Effect::ConnectionChanged {
            status: ConnectionStatus::Disconnected,
            user_initiated,
        });
        Some(effects)
    }

    fn on_speech_started(&mut self) -> Vec<Effect> {
        if !self.turn.is_gate_open() {
            tracing::debug!("Speech detected outside listening mode");
            return Vec::new();
        }
        self.turn.set_speaker(Speaker::User);
        vec![Effect::LiveTranscript {
            role: Role::User,
            text: LISTENING_LABEL.to_string(),
        }]
    }

    fn on_speech_ended(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.turn.stop_listening() {
            effects.push(Effect::ListeningChanged(ListeningState::AwaitingFinal));
            effects.push(Effect::LiveTranscript {
                role: Role::User,
                text: PROCESSING_LABEL.to_string(),
            });
        }

        if let Some(utterance) = self.accumulator.flush_assistant() {
            self.finish_assistant_turn(&mut effects);
            self.record_assistant(utterance, &mut effects);
        }
        effects
    }

    fn on_assistant_partial(&mut self, transcript: &str) -> Vec<Effect> {
        if transcript.trim().is_empty() {
            return Vec::new();
        }
        let mut effects = Vec::new();
        if self.accumulator.assistant_partial(transcript) {
            effects.push(Effect::AssistantSpeaking(true));
        }
        self.turn.set_speaker(Speaker::Assistant);
        effects.push(Effect::LiveTranscript {
            role: Role::Assistant,
            text: transcript.to_string(),
        });
        effects
    }

    fn on_assistant_final(&mut self, transcript: &str) -> Vec<Effect> {
        let was_speaking = self.accumulator.is_accumulating_assistant();
        let utterance = self.accumulator.assistant_final(transcript);
        if !was_speaking && utterance.is_none() {
            return Vec::new();
        }

        let mut effects = Vec::new();
        if was_speaking {
            self.finish_assistant_turn(&mut effects);
        }
        if let Some(utterance) = utterance {
            self.record_assistant(utterance, &mut effects);
        }
        effects
    }

    fn finish_assistant_turn(&mut self, effects: &mut Vec<Effect>) {
        if self.turn.speaker() == Speaker::Assistant {
            self.turn.set_speaker(Speaker::None);
        }
        effects.push(Effect::AssistantSpeaking(false));
        effects.push(Effect::LiveTranscript {
            role: Role::Assistant,
            text: String::new(),
        });
    }

    fn on_user_partial(&mut self, transcript: &str) -> Vec<Effect> {
        if !self.turn.is_gate_open() {
            tracing::debug!("Ignoring user transcript outside listening mode");
            return Vec::new();
        }
        if !self.accumulator.user_partial(transcript) {
            return Vec::new();
        }
        vec![Effect::LiveTranscript {
            role: Role::User,
            text: transcript.to_string(),
        }]
    }

    fn on_user_final(&mut self, transcript: &str) -> Vec<Effect> {
        if !self.turn.is_gate_open() {
            tracing::debug!("Ignoring user transcript outside listening mode");
            return Vec::new();
        }
        let Some(utterance) = self.accumulator.user_final(transcript) else {
            return Vec::new();
        };

        self.turn.final_received();
        let mut effects = vec![
            Effect::ListeningChanged(ListeningState::Idle),
            Effect::LiveTranscript {
                role: Role::User,
                text: String::new(),
            },
        ];
        if let Some(message) = self.record(utterance, &mut effects) {
            self.push_feedback(FeedbackItem::for_spoken(&message.content), &mut effects);
        }
        effects
    }

    /// The final transcript did not arrive in time; close the gate.
    pub fn listening_timed_out(&mut self) -> Vec<Effect> {
        if !self.turn.abandon_final() {
            return Vec::new();
        }
        self.accumulator.clear_user();
        tracing::debug!("No final transcript received, closing listening gate");
        vec![
            Effect::ListeningChanged(ListeningState::Idle),
            Effect::LiveTranscript {
                role: Role::User,
                text: String::new(),
            },
        ]
    }

    // ── Commands ─────────────────────────────────────────────────

    pub fn handle_command(&mut self, command: Command) -> Vec<Effect> {
        match command {
            Command::StartListening => self.start_listening(),
            Command::StopListening => self.stop_listening(),
            Command::SendText { text } => self.send_text(&text),
            Command::Disconnect => self.disconnect(),
        }
    }

    fn start_listening(&mut self) -> Vec<Effect> {
        if self.is_complete() {
            return vec![Effect::Notify(completed_notice())];
        }
        match self.turn.start_listening() {
            Ok(()) => {
                tracing::debug!("Listening gate opened");
                vec![
                    Effect::ListeningChanged(ListeningState::ListeningOpen),
                    Effect::LiveTranscript {
                        role: Role::User,
                        text: LISTENING_LABEL.to_string(),
                    },
                ]
            }
            Err(GateRefusal::NotConnected) => {
                tracing::info!("Not connected, cannot start listening");
                Vec::new()
            }
            Err(GateRefusal::AlreadyOpen) => Vec::new(),
        }
    }

    fn stop_listening(&mut self) -> Vec<Effect> {
        if !self.turn.stop_listening() {
            return Vec::new();
        }
        vec![
            Effect::ListeningChanged(ListeningState::AwaitingFinal),
            Effect::LiveTranscript {
                role: Role::User,
                text: PROCESSING_LABEL.to_string(),
            },
        ]
    }

    fn send_text(&mut self, text: &str) -> Vec<Effect> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        if !self.turn.is_connected() {
            return vec![Effect::Notify(Notice::error(
                "Not connected",
                "Start a voice conversation before sending messages.",
            ))];
        }
        if self.is_complete() {
            return vec![Effect::Notify(completed_notice())];
        }

        let mut effects = vec![Effect::Activity, Effect::SendText(text.to_string())];
        let utterance = Utterance {
            role: Role::User,
            text: text.to_string(),
        };
        if let Some(message) = self.record(utterance, &mut effects) {
            self.push_feedback(FeedbackItem::for_typed(&message.content), &mut effects);
        }
        effects
    }

    fn disconnect(&mut self) -> Vec<Effect> {
        if self.turn.connection() == ConnectionStatus::Disconnected {
            return Vec::new();
        }
        self.turn.request_disconnect();
        let mut effects = vec![Effect::Disconnect];
        if let Some(teardown) = self.teardown() {
            effects.extend(teardown);
        }
        effects
    }

    // ── Recording ────────────────────────────────────────────────

    /// Clean an utterance and pass it through the gate. On success, append
    /// follow-up effects (objectives, completion) and return the message.
    fn record(&mut self, utterance: Utterance, effects: &mut Vec<Effect>) -> Option<Message> {
        let cleaned = self.cleaner.clean(&utterance.text);
        if cleaned.is_empty() {
            tracing::debug!(role = ?utterance.role, "Utterance empty after cleaning");
            return None;
        }
        let message = self.history.append(utterance.role, &cleaned)?;
        tracing::info!(
            role = ?message.role,
            messages = self.history.len(),
            "Message recorded"
        );
        effects.push(Effect::MessageAppended(message.clone()));

        if self.evaluator.evaluate(&mut self.objectives, &self.history) {
            effects.push(Effect::ObjectivesUpdated(self.objectives.clone()));
        }
        self.check_completion(effects);
        Some(message)
    }

    /// Record an assistant utterance and offer replies to it while the
    /// conversation is still open.
    fn record_assistant(&mut self, utterance: Utterance, effects: &mut Vec<Effect>) {
        let Some(message) = self.record(utterance, effects) else {
            return;
        };
        if self.is_complete() {
            return;
        }
        let suggestions = feedback::contextual_responses(&message.content, self.language);
        if !suggestions.is_empty() {
            effects.push(Effect::Suggestions(suggestions));
        }
    }

    fn check_completion(&mut self, effects: &mut Vec<Effect>) {
        if self.completed.is_some() {
            return;
        }
        let reason = if objectives::all_complete(&self.objectives) {
            CompletionReason::ObjectivesMet
        } else if self.history.len() >= self.max_turns {
            CompletionReason::TurnLimit
        } else {
            return;
        };

        self.completed = Some(reason);
        tracing::info!(?reason, "Conversation complete");
        let notice = match reason {
            CompletionReason::ObjectivesMet => Notice::info(
                "Scenario Complete!",
                "Great job! You've completed all objectives.",
            ),
            CompletionReason::TurnLimit => Notice::info(
                "Conversation Complete",
                "You've reached the maximum conversation length.",
            ),
        };
        effects.push(Effect::ConversationComplete(reason));
        effects.push(Effect::Notify(notice));
    }

    fn push_feedback(&mut self, item: FeedbackItem, effects: &mut Vec<Effect>) {
        if self.feedback.push(item.clone()) {
            effects.push(Effect::Feedback(item));
        }
    }
}

fn completed_notice() -> Notice {
    Notice::info(
        "Conversation complete",
        "This scenario is finished. Start a new session to keep practicing.",
    )
}

// ── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with(goals: &[&str], triggers: &[&str]) -> ConversationEngine {
        ConversationEngine::new(
            MessageCleaner::default(),
            ObjectiveEvaluator::new(triggers.iter().copied()),
            Objective::from_goals(goals),
        )
    }

    fn connected_engine() -> ConversationEngine {
        let mut engine = engine_with(&["Greet", "Ask about shift"], &["guten", "schicht"]);
        engine.begin_connect();
        engine.handle_event(VoiceEvent::Connected);
        engine
    }

    fn appended(effects: &[Effect]) -> Vec<&Message> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::MessageAppended(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn user_final(text: &str) -> VoiceEvent {
        VoiceEvent::FinalUser {
            transcript: text.into(),
        }
    }

    #[test]
    fn user_partial_then_final_records_one_message() {
        let mut engine = connected_engine();
        engine.handle_command(Command::StartListening);

        let effects = engine.handle_event(VoiceEvent::PartialUser {
            transcript: "Ich".into(),
        });
        assert!(appended(&effects).is_empty());
        assert!(effects.contains(&Effect::LiveTranscript {
            role: Role::User,
            text: "Ich".into()
        }));

        let effects = engine.handle_event(user_final("Ich bin neu"));
        let msgs = appended(&effects);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "Ich bin neu");
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(engine.listening(), ListeningState::Idle);
        assert!(effects.iter().any(|e| matches!(e, Effect::Feedback(_))));
    }

    #[test]
    fn user_transcripts_ignored_while_gate_closed() {
        let mut engine = connected_engine();
        let effects = engine.handle_event(VoiceEvent::PartialUser {
            transcript: "Hallo".into(),
        });
        assert!(effects.is_empty());
        let effects = engine.handle_event(user_final("Hallo"));
        assert!(effects.is_empty());
        assert!(engine.messages().is_empty());
    }

    #[test]
    fn gate_closes_after_final_transcript() {
        let mut engine = connected_engine();
        engine.handle_command(Command::StartListening);
        engine.handle_event(user_final("Ich bin neu"));
        let effects = engine.handle_event(user_final("Noch etwas"));
        assert!(effects.is_empty());
        assert_eq!(engine.messages().len(), 1);
    }

    #[test]
    fn final_after_speech_end_is_still_accepted() {
        let mut engine = connected_engine();
        engine.handle_command(Command::StartListening);
        let effects = engine.handle_event(VoiceEvent::SpeechEnded);
        assert!(effects.contains(&Effect::ListeningChanged(ListeningState::AwaitingFinal)));
        let effects = engine.handle_event(user_final("Wo ist die Station?"));
        assert_eq!(appended(&effects).len(), 1);
    }

    #[test]
    fn assistant_speech_end_flushes_buffer() {
        let mut engine = connected_engine();
        let effects = engine.handle_event(VoiceEvent::PartialAssistant {
            transcript: "Guten".into(),
        });
        assert!(effects.contains(&Effect::AssistantSpeaking(true)));
        engine.handle_event(VoiceEvent::PartialAssistant {
            transcript: "Guten Morgen!".into(),
        });
        assert_eq!(engine.speaker(), Speaker::Assistant);

        let effects = engine.handle_event(VoiceEvent::SpeechEnded);
        let msgs = appended(&effects);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "Guten Morgen!");
        assert_eq!(msgs[0].role, Role::Assistant);
        assert!(effects.contains(&Effect::AssistantSpeaking(false)));

        // The late final frame repeats the flushed text and is filtered.
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: "Guten Morgen!".into(),
        });
        assert!(appended(&effects).is_empty());
        assert_eq!(engine.messages().len(), 1);
    }

    #[test]
    fn speech_end_after_final_frame_is_noop() {
        let mut engine = connected_engine();
        engine.handle_event(VoiceEvent::PartialAssistant {
            transcript: "Guten".into(),
        });
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: "Guten Morgen!".into(),
        });
        assert_eq!(appended(&effects).len(), 1);

        let effects = engine.handle_event(VoiceEvent::SpeechEnded);
        assert!(effects.is_empty());
        assert_eq!(engine.messages().len(), 1);
        assert_eq!(engine.messages()[0].content, "Guten Morgen!");
    }

    #[test]
    fn growing_partials_flush_as_single_message() {
        let mut engine = connected_engine();
        for partial in ["Guten", "Guten Morgen", "Guten Morgen!"] {
            let effects = engine.handle_event(VoiceEvent::PartialAssistant {
                transcript: partial.into(),
            });
            assert!(appended(&effects).is_empty());
        }
        let effects = engine.handle_event(VoiceEvent::SpeechEnded);
        let msgs = appended(&effects);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "Guten Morgen!");
        assert_eq!(engine.messages().len(), 1);
    }

    #[test]
    fn speech_start_outside_listening_is_ignored() {
        let mut engine = connected_engine();
        assert!(engine.handle_event(VoiceEvent::SpeechStarted).is_empty());
        assert_eq!(engine.speaker(), Speaker::None);

        engine.handle_command(Command::StartListening);
        let effects = engine.handle_event(VoiceEvent::SpeechStarted);
        assert_eq!(effects[0], Effect::Activity);
        assert_eq!(engine.speaker(), Speaker::User);
    }

    #[test]
    fn activity_leads_handled_speech_events_only() {
        let mut engine = connected_engine();
        let effects = engine.handle_event(VoiceEvent::PartialAssistant {
            transcript: "Hallo".into(),
        });
        assert_eq!(effects[0], Effect::Activity);
        assert_eq!(
            effects.iter().filter(|e| **e == Effect::Activity).count(),
            1
        );
        assert!(engine
            .handle_event(VoiceEvent::PartialAssistant {
                transcript: "  ".into(),
            })
            .is_empty());
        assert!(!engine
            .handle_event(VoiceEvent::Disconnected)
            .contains(&Effect::Activity));
    }

    #[test]
    fn assistant_message_offers_reply_suggestions() {
        let mut engine = connected_engine();
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: "Willkommen im Team!".into(),
        });
        let suggestions = effects
            .iter()
            .find_map(|e| match e {
                Effect::Suggestions(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            suggestions[0].text,
            "Guten Morgen! Ich bin die neue Krankenschwester."
        );

        let mut engine = engine_with(&[], &[]).with_language(LanguageCode::Es);
        engine.handle_event(VoiceEvent::Connected);
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: "La sala está a la izquierda.".into(),
        });
        assert!(effects.contains(&Effect::Suggestions(
            feedback::contextual_responses("", LanguageCode::Es)
        )));
    }

    #[test]
    fn no_suggestions_once_complete_or_unsupported() {
        let mut engine = engine_with(&["Greet"], &["guten"]);
        engine.handle_event(VoiceEvent::Connected);
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: "Guten Morgen!".into(),
        });
        assert!(engine.is_complete());
        assert!(!effects.iter().any(|e| matches!(e, Effect::Suggestions(_))));

        let mut engine = engine_with(&[], &[]).with_language(LanguageCode::Ja);
        engine.handle_event(VoiceEvent::Connected);
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: "おはようございます".into(),
        });
        assert_eq!(appended(&effects).len(), 1);
        assert!(!effects.iter().any(|e| matches!(e, Effect::Suggestions(_))));
    }

    #[test]
    fn spoken_feedback_includes_pronunciation_hints() {
        let mut engine = connected_engine();
        engine.handle_command(Command::StartListening);
        let effects = engine.handle_event(user_final("Ich bin die neue Pflegekraft"));
        let item = effects
            .iter()
            .find_map(|e| match e {
                Effect::Feedback(f) => Some(f),
                _ => None,
            })
            .unwrap();
        assert!(!item.suggestions.is_empty());
        assert!(!item.strong_points.is_empty());
    }

    #[test]
    fn empty_final_frame_uses_buffered_partial() {
        let mut engine = connected_engine();
        engine.handle_event(VoiceEvent::PartialAssistant {
            transcript: "Willkommen im Team".into(),
        });
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: String::new(),
        });
        assert_eq!(appended(&effects)[0].content, "Willkommen im Team");
    }

    #[test]
    fn identical_finals_emit_once() {
        let mut engine = connected_engine();
        for _ in 0..2 {
            engine.handle_event(VoiceEvent::FinalAssistant {
                transcript: "Wie heißen Sie?".into(),
            });
        }
        assert_eq!(engine.messages().len(), 1);
    }

    #[test]
    fn filler_only_utterance_is_not_recorded() {
        let mut engine = connected_engine();
        engine.handle_command(Command::StartListening);
        let effects = engine.handle_event(user_final("what does this mean"));
        assert!(appended(&effects).is_empty());
        assert!(engine.messages().is_empty());
        assert_eq!(engine.listening(), ListeningState::Idle);
    }

    #[test]
    fn two_objectives_complete_the_conversation() {
        let mut engine = connected_engine();
        let effects = engine.handle_event(VoiceEvent::FinalAssistant {
            transcript: "Guten Morgen! Ich bin Anna.".into(),
        });
        assert!(effects.iter().any(|e| matches!(e, Effect::ObjectivesUpdated(_))));
        assert!(!engine.is_complete());

        engine.handle_command(Command::StartListening);
        let effects = engine.handle_event(user_final("Wann beginnt meine Schicht?"));
        assert!(effects.contains(&Effect::ConversationComplete(
            CompletionReason::ObjectivesMet
        )));
        assert!(engine.objectives().iter().all(|o| o.completed));
        assert!(engine.is_complete());

        let effects = engine.handle_command(Command::StartListening);
        assert!(matches!(effects.as_slice(), [Effect::Notify(_)]));
        assert_eq!(engine.listening(), ListeningState::Idle);
    }

    #[test]
    fn turn_limit_completes_conversation() {
        let mut engine = engine_with(&["Unreachable"], &["zzz"]).with_max_conversation_turns(3);
        engine.handle_event(VoiceEvent::Connected);
        let last = ["Eins", "Zwei", "Drei"]
            .into_iter()
            .map(|text| {
                engine.handle_event(VoiceEvent::FinalAssistant {
                    transcript: text.into(),
                })
            })
            .last()
            .unwrap();
        assert!(last.contains(&Effect::ConversationComplete(CompletionReason::TurnLimit)));
        assert_eq!(engine.completion_reason(), Some(CompletionReason::TurnLimit));
    }

    #[test]
    fn start_listening_requires_connection() {
        let mut engine = engine_with(&[], &[]);
        assert!(engine.handle_command(Command::StartListening).is_empty());
        assert_eq!(engine.listening(), ListeningState::Idle);
    }

    #[test]
    fn disconnect_discards_in_flight_turns() {
        let mut engine = connected_engine();
        engine.handle_event(VoiceEvent::PartialAssistant {
            transcript: "Einen Moment".into(),
        });
        engine.handle_command(Command::StartListening);

        let effects = engine.handle_event(VoiceEvent::Disconnected);
        assert!(effects.contains(&Effect::ConnectionChanged {
            status: ConnectionStatus::Disconnected,
            user_initiated: false,
        }));
        assert_eq!(engine.listening(), ListeningState::Idle);

        // Nothing buffered survives into the next call.
        engine.handle_event(VoiceEvent::Connected);
        let effects = engine.handle_event(VoiceEvent::SpeechEnded);
        assert!(appended(&effects).is_empty());
        assert!(engine.messages().is_empty());
    }

    #[test]
    fn user_disconnect_is_reported_as_user_initiated() {
        let mut engine = connected_engine();
        let effects = engine.handle_command(Command::Disconnect);
        assert_eq!(effects[0], Effect::Disconnect);
        assert!(effects.contains(&Effect::ConnectionChanged {
            status: ConnectionStatus::Disconnected,
            user_initiated: true,
        }));
        // The provider's own call-end arrives afterwards and is ignored.
        assert!(engine.handle_event(VoiceEvent::Disconnected).is_empty());
    }

    #[test]
    fn send_text_records_and_dedups_echo() {
        let mut engine = connected_engine();
        let effects = engine.handle_command(Command::SendText {
            text: " Wo ist der Aufzug? ".into(),
        });
        assert!(effects.contains(&Effect::SendText("Wo ist der Aufzug?".into())));
        assert_eq!(appended(&effects).len(), 1);
        let feedback = effects.iter().find_map(|e| match e {
            Effect::Feedback(f) => Some(f),
            _ => None,
        });
        assert_eq!(feedback.map(|f| f.pronunciation_score), Some(85));

        // Provider echoes the typed text as a final user transcript.
        engine.handle_command(Command::StartListening);
        let effects = engine.handle_event(user_final("Wo ist der Aufzug?"));
        assert!(appended(&effects).is_empty());
        assert_eq!(engine.messages().len(), 1);
    }

    #[test]
    fn send_text_requires_connection() {
        let mut engine = engine_with(&[], &[]);
        let effects = engine.handle_command(Command::SendText {
            text: "Hallo".into(),
        });
        match effects.as_slice() {
            [Effect::Notify(n)] => assert_eq!(n.level, NoticeLevel::Error),
            other => panic!("Unexpected effects: {other:?}"),
        }
        assert!(engine.messages().is_empty());
    }

    #[test]
    fn listening_timeout_closes_gate_without_message() {
        let mut engine = connected_engine();
        engine.handle_command(Command::StartListening);
        engine.handle_command(Command::StopListening);
        assert_eq!(engine.listening(), ListeningState::AwaitingFinal);

        let effects = engine.listening_timed_out();
        assert!(effects.contains(&Effect::ListeningChanged(ListeningState::Idle)));
        assert!(engine.messages().is_empty());
        assert!(engine.listening_timed_out().is_empty());
    }

    #[test]
    fn voice_error_becomes_error_notice() {
        let mut engine = connected_engine();
        let effects = engine.handle_event(VoiceEvent::Error {
            message: "quota".into(),
        });
        assert_eq!(
            effects,
            vec![Effect::Notify(Notice::error("Voice Error", "quota"))]
        );
        assert_eq!(engine.connection(), ConnectionStatus::Connected);
    }

    #[test]
    fn restore_resumes_history_and_completion() {
        let mut engine = engine_with(&["Greet"], &["hallo"]);
        let mut objectives = Objective::from_goals(&["Greet"]);
        objectives[0].completed = true;
        engine.restore(vec![Message::new(Role::User, "Hallo")], objectives, true);
        assert_eq!(engine.messages().len(), 1);
        assert_eq!(engine.completion_reason(), Some(CompletionReason::ObjectivesMet));
    }

    #[test]
    fn command_deserializes_from_kebab_case_tag() {
        let cmd: Command = serde_json::from_str(r#"{"type":"send-text","text":"Hallo"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::SendText {
                text: "Hallo".into()
            }
        );
        let cmd: Command = serde_json::from_str(r#"{"type":"start-listening"}"#).unwrap();
        assert_eq!(cmd, Command::StartListening);
    }
}
