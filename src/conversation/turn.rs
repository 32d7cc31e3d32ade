//! Connection and listening-gate state.
//!
//! ```text
//!              start_listening            stop_listening / speech end
//!   ┌──────┐ ─────────────────▸ ┌───────────────┐ ─────────────▸ ┌───────────────┐
//!   │ Idle │                    │ ListeningOpen │                │ AwaitingFinal │
//!   └──────┘ ◂───────────────── └───────────────┘                └───────────────┘
//!       ▲        final user transcript                                  │
//!       └──────────────── final user transcript / timeout ──────────────┘
//! ```
//!
//! User transcripts are only accepted while the gate is open, which covers
//! both `ListeningOpen` and `AwaitingFinal`: the final transcript for an
//! utterance routinely arrives after the user stopped talking.

use serde::Serialize;

/// Voice service connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// Listening gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListeningState {
    Idle,
    ListeningOpen,
    AwaitingFinal,
}

impl ListeningState {
    /// Whether user transcripts are accepted in this state.
    pub fn accepts_user_input(self) -> bool {
        matches!(self, Self::ListeningOpen | Self::AwaitingFinal)
    }
}

/// Who is currently producing speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    None,
    User,
    Assistant,
}

/// Why a request to open the gate was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRefusal {
    NotConnected,
    AlreadyOpen,
}

/// Connection, gate, and speaker state for one conversation.
#[derive(Debug)]
pub struct TurnMachine {
    connection: ConnectionStatus,
    listening: ListeningState,
    speaker: Speaker,
    /// Set when the user asked to hang up, so the following disconnect is
    /// not mistaken for a dropped call.
    disconnect_requested: bool,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnMachine {
    pub fn new() -> Self {
        Self {
            connection: ConnectionStatus::Disconnected,
            listening: ListeningState::Idle,
            speaker: Speaker::None,
            disconnect_requested: false,
        }
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionStatus::Connected
    }

    pub fn listening(&self) -> ListeningState {
        self.listening
    }

    pub fn speaker(&self) -> Speaker {
        self.speaker
    }

    pub fn set_speaker(&mut self, speaker: Speaker) {
        self.speaker = speaker;
    }

    /// Whether user transcripts should currently be accepted.
    pub fn is_gate_open(&self) -> bool {
        self.listening.accepts_user_input()
    }

    // ── Connection ───────────────────────────────────────────────

    pub fn connecting(&mut self) {
        self.connection = ConnectionStatus::Connecting;
        self.disconnect_requested = false;
    }

    pub fn connected(&mut self) {
        self.connection = ConnectionStatus::Connected;
        self.disconnect_requested = false;
    }

    /// Connection attempt failed before the call started.
    pub fn connect_failed(&mut self) {
        self.connection = ConnectionStatus::Disconnected;
    }

    /// Mark the next disconnect as user-initiated.
    pub fn request_disconnect(&mut self) {
        self.disconnect_requested = true;
    }

    /// Transition to `Disconnected`, closing the gate. Returns `None` when
    /// already disconnected, otherwise whether the user asked for it.
    pub fn disconnected(&mut self) -> Option<bool> {
        if self.connection == ConnectionStatus::Disconnected {
            return None;
        }
        self.connection = ConnectionStatus::Disconnected;
        self.listening = ListeningState::Idle;
        self.speaker = Speaker::None;
        Some(std::mem::take(&mut self.disconnect_requested))
    }

    // ── Listening gate ───────────────────────────────────────────

    /// Open the gate. Requires a connection.
    pub fn start_listening(&mut self) -> Result<(), GateRefusal> {
        if !self.is_connected() {
            return Err(GateRefusal::NotConnected);
        }
        if self.listening == ListeningState::ListeningOpen {
            return Err(GateRefusal::AlreadyOpen);
        }
        self.listening = ListeningState::ListeningOpen;
        Ok(())
    }

    /// User finished talking: keep accepting the final transcript but stop
    /// treating the user as the active speaker. Returns `true` if the state
    /// changed.
    pub fn stop_listening(&mut self) -> bool {
        if self.listening != ListeningState::ListeningOpen {
            return false;
        }
        self.listening = ListeningState::AwaitingFinal;
        if self.speaker == Speaker::User {
            self.speaker = Speaker::None;
        }
        true
    }

    /// A final user transcript was accepted; close the gate.
    pub fn final_received(&mut self) {
        self.listening = ListeningState::Idle;
        if self.speaker == Speaker::User {
            self.speaker = Speaker::None;
        }
    }

    /// The final transcript never came. Returns `true` if the gate closed.
    pub fn abandon_final(&mut self) -> bool {
        if self.listening != ListeningState::AwaitingFinal {
            return false;
        }
        self.listening = ListeningState::Idle;
        true
    }
}
