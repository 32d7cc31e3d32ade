//! Conversation runtime: one event loop per scenario conversation.
//!
//! ```text
//!  voice events ─┐
//!  commands ─────┼─▸ select! ─▸ ConversationEngine ─▸ Effects ─┬─▸ VoiceProvider
//!  timer signals ┘                                             ├─▸ SessionManager
//!                                                              ├─▸ InactivitySupervisor
//!                                                              └─▸ observer / notices
//! ```
//!
//! Every state transition happens on the loop in [`ConversationRuntime::run`];
//! timers and the provider only feed it through channels.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{Config, VoiceConfig};
use crate::conversation::{
    Command, ConnectionStatus, ConversationEngine, Effect, ListeningState, MessageCleaner, Notice,
    NoticeLevel,
};
use crate::error::ConfigError;
use crate::scenario::Scenario;
use crate::session::SessionManager;
use crate::supervisor::{Expiry, InactivitySupervisor, Signal};
use crate::voice::{ConnectConfig, LanguagePair, VoiceEvent, VoiceProvider};

/// Runtime for a single scenario conversation.
pub struct ConversationRuntime {
    engine: ConversationEngine,
    sessions: SessionManager,
    provider: Arc<dyn VoiceProvider>,
    supervisor: InactivitySupervisor,
    signals: Option<mpsc::UnboundedReceiver<Signal>>,
    scenario: Scenario,
    pair: LanguagePair,
    voice: VoiceConfig,
    /// Config of the last successful connect, reused for reconnects.
    last_connect: Option<ConnectConfig>,
    session_id: String,
    notices: Vec<Notice>,
    observer: Option<mpsc::UnboundedSender<Effect>>,
}

impl ConversationRuntime {
    /// Prepare a conversation for `scenario`, resuming the current session
    /// when it belongs to the same scenario.
    pub fn new(
        scenario: Scenario,
        config: &Config,
        sessions: SessionManager,
        provider: Arc<dyn VoiceProvider>,
    ) -> Result<Self, ConfigError> {
        let pair = config.language.pair()?;
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let supervisor =
            InactivitySupervisor::new(config.session.supervisor_settings(), signal_tx);

        let mut engine = ConversationEngine::new(
            MessageCleaner::new(&config.cleaner.filler_words),
            scenario.evaluator(),
            scenario.objectives(),
        )
        .with_max_conversation_turns(config.session.max_conversation_turns)
        .with_language(pair.target);

        let session = sessions.resume_or_create(&scenario.id, &scenario.title);
        if session.messages.is_empty() && session.objectives.is_empty() {
            sessions.update_objectives(engine.objectives().to_vec());
        } else {
            engine.restore(session.messages, session.objectives, session.is_complete);
        }

        tracing::info!(
            session_id = %session.id,
            scenario = %scenario.id,
            target = pair.target.as_str(),
            known = pair.known.as_str(),
            provider = provider.name(),
            "Conversation runtime ready"
        );

        Ok(Self {
            engine,
            sessions,
            provider,
            supervisor,
            signals: Some(signal_rx),
            scenario,
            pair,
            voice: config.voice.clone(),
            last_connect: None,
            session_id: session.id,
            notices: Vec::new(),
            observer: None,
        })
    }

    /// Forward every effect to `observer` (live transcript display etc.).
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<Effect>) -> Self {
        self.observer = Some(observer);
        self
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Notices shown so far, oldest first.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    // ── Connection ──────────────────────────────────────────────

    /// Start the voice call for this scenario.
    ///
    /// A missing credential is reported as an error notice and returned;
    /// no connection is attempted. Provider failures are reported as
    /// notices only.
    pub async fn connect(&mut self) -> Result<(), ConfigError> {
        if self.provider.requires_credential() {
            if let Err(e) = self.voice.require_credential() {
                tracing::error!(error = %e, "Cannot connect");
                self.notify(Notice::error("Configuration Error", e.to_string()));
                return Err(e);
            }
        }

        let context = self.sessions.context_messages();
        let config = self.scenario.connect_config(&self.pair, &self.voice, &context);
        self.start_call(config).await;
        Ok(())
    }

    async fn start_call(&mut self, config: ConnectConfig) {
        let effects = self.engine.begin_connect();
        self.apply(effects).await;

        tracing::info!(
            assistant = %config.name,
            context_messages = self.engine.messages().len(),
            "Starting voice call"
        );
        match self.provider.connect(&config).await {
            Ok(()) => self.last_connect = Some(config),
            Err(e) => {
                tracing::error!(error = %e, "Voice call failed to start");
                let effects = self.engine.connect_failed(&e.to_string());
                self.apply(effects).await;
            }
        }
    }

    // ── Inputs ──────────────────────────────────────────────────

    pub async fn handle_event(&mut self, event: VoiceEvent) {
        let effects = self.engine.handle_event(event);
        self.apply(effects).await;
    }

    pub async fn handle_command(&mut self, command: Command) {
        let effects = self.engine.handle_command(command);
        self.apply(effects).await;
    }

    pub async fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::InactivityExpired => {
                let connected = self.engine.connection() == ConnectionStatus::Connected;
                if self.supervisor.on_inactivity_expired(connected) == Expiry::KeepAlive {
                    self.notify(Notice::info(
                        "Session Active",
                        "Keeping connection alive for continued practice.",
                    ));
                }
            }
            Signal::ListeningTimeout => {
                let effects = self.engine.listening_timed_out();
                self.apply(effects).await;
            }
            Signal::Reconnect => {
                if self.engine.connection() != ConnectionStatus::Disconnected {
                    tracing::debug!("Reconnect skipped, call already active");
                    return;
                }
                let Some(config) = self.last_connect.clone() else {
                    return;
                };
                tracing::info!(session_id = %self.session_id, "Reconnecting voice call");
                self.start_call(config).await;
            }
        }
    }

    /// Wait for the next timer signal. Used when driving the runtime by hand.
    pub async fn next_signal(&mut self) -> Option<Signal> {
        match self.signals.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Drive the runtime until both input channels close.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<VoiceEvent>,
        mut commands: mpsc::Receiver<Command>,
    ) -> Self {
        let Some(mut signals) = self.signals.take() else {
            tracing::warn!("Runtime loop already ran");
            return self;
        };
        let mut events_open = true;
        let mut commands_open = true;

        while events_open || commands_open {
            tokio::select! {
                event = events.recv(), if events_open => match event {
                    Some(event) => self.handle_event(event).await,
                    None => events_open = false,
                },
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command).await,
                    None => commands_open = false,
                },
                Some(signal) = signals.recv() => self.handle_signal(signal).await,
            }
        }

        self.signals = Some(signals);
        self.shutdown();
        self
    }

    /// Cancel all timers.
    pub fn shutdown(&mut self) {
        self.supervisor.shutdown();
        tracing::debug!(session_id = %self.session_id, "Runtime stopped");
    }

    // ── Effects ─────────────────────────────────────────────────

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            if let Some(observer) = &self.observer {
                let _ = observer.send(effect.clone());
            }
            self.apply_one(effect).await;
        }
    }

    async fn apply_one(&mut self, effect: Effect) {
        match effect {
            Effect::MessageAppended(message) => {
                self.sessions.record_message(message);
            }
            Effect::ObjectivesUpdated(objectives) => {
                self.sessions.update_objectives(objectives);
            }
            Effect::ConversationComplete(reason) => {
                tracing::info!(session_id = %self.session_id, ?reason, "Scenario finished");
                self.sessions.complete_session();
            }
            Effect::Feedback(item) => {
                tracing::debug!(
                    pronunciation = item.pronunciation_score,
                    grammar = item.grammar_score,
                    fluency = item.fluency_score,
                    "Feedback generated"
                );
            }
            Effect::Suggestions(suggestions) => {
                tracing::debug!(count = suggestions.len(), "Reply suggestions ready");
            }
            Effect::Notify(notice) => self.notify(notice),
            Effect::SendText(text) => {
                if let Err(e) = self.provider.send_text(&text).await {
                    tracing::error!(error = %e, "Failed to send text message");
                    self.notify(Notice::error("Send Failed", e.to_string()));
                }
            }
            Effect::Disconnect => {
                if let Err(e) = self.provider.disconnect().await {
                    tracing::warn!(error = %e, "Provider disconnect failed");
                }
            }
            Effect::Activity => self.supervisor.record_activity(),
            Effect::ConnectionChanged {
                status,
                user_initiated,
            } => match status {
                ConnectionStatus::Connected => self.supervisor.on_connected(),
                ConnectionStatus::Disconnected => {
                    let has_config = self.last_connect.is_some();
                    if self.supervisor.on_disconnected(user_initiated, has_config) {
                        self.notify(Notice::warning(
                            "Connection Lost",
                            "Attempting to reconnect...",
                        ));
                    }
                }
                ConnectionStatus::Connecting => {}
            },
            Effect::ListeningChanged(state) => {
                if state == ListeningState::AwaitingFinal {
                    self.supervisor.await_final_transcript();
                } else {
                    self.supervisor.cancel_final_transcript();
                }
            }
            Effect::LiveTranscript { role, text } => {
                tracing::trace!(role = ?role, text = %text, "Live transcript");
            }
            Effect::AssistantSpeaking(speaking) => {
                tracing::trace!(speaking, "Assistant speaking");
            }
        }
    }

    fn notify(&mut self, notice: Notice) {
        match notice.level {
            NoticeLevel::Error => tracing::warn!(title = %notice.title, "{}", notice.message),
            NoticeLevel::Warning | NoticeLevel::Info => {
                tracing::info!(title = %notice.title, "{}", notice.message)
            }
        }
        self.notices.push(notice);
    }
}

// ── Tests ───────────────────────────────────────────────────────
