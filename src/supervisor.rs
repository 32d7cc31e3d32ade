//! Inactivity and reconnection supervision.
//!
//! Timers never touch conversation state directly. When one fires it sends a
//! [`Signal`] into the runtime's channel, and the runtime's `select!` loop
//! handles it like any other input. All state changes stay on that loop.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Timer expiry delivered to the runtime loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Signal {
    /// No activity for the whole inactivity window.
    InactivityExpired,
    /// The final user transcript did not arrive in time.
    ListeningTimeout,
    /// Backoff elapsed; try to reconnect with the last config.
    Reconnect,
}

// ── Timer ───────────────────────────────────────────────────────

/// One-shot cancellable timer backed by a tokio task.
///
/// Re-arming replaces the pending expiry. Dropping the timer aborts it.
#[derive(Debug, Default)]
pub struct Timer {
    handle: Option<JoinHandle<()>>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` once after `duration`, cancelling any pending expiry.
    pub fn arm<F>(&mut self, duration: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.disarm();
        let deadline = Instant::now() + duration;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            on_fire();
        }));
    }

    /// Cancel the pending expiry, if any.
    pub fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.disarm();
    }
}

// ── Supervisor ──────────────────────────────────────────────────

/// Timing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorSettings {
    /// Inactivity window.
    pub inactivity_timeout: Duration,
    /// Keep the call alive on expiry and retry dropped calls.
    pub auto_reconnect: bool,
    /// Delay before a reconnect attempt.
    pub reconnect_backoff: Duration,
    /// How long to wait for a final user transcript after speech ends.
    pub final_transcript_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(5 * 60),
            auto_reconnect: true,
            reconnect_backoff: Duration::from_secs(2),
            final_transcript_timeout: Duration::from_secs(15),
        }
    }
}

/// What the runtime should do when the inactivity window lapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Still connected and auto-reconnect is on: keep the call, countdown
    /// has been re-armed.
    KeepAlive,
    /// Nothing to do.
    Lapsed,
}

/// Owns the inactivity, reconnect, and final-transcript timers.
pub struct InactivitySupervisor {
    settings: SupervisorSettings,
    signals: mpsc::UnboundedSender<Signal>,
    inactivity: Timer,
    reconnect: Timer,
    final_transcript: Timer,
    last_activity: Instant,
    /// One reconnect attempt per successful connection.
    retry_used: bool,
}

impl InactivitySupervisor {
    pub fn new(settings: SupervisorSettings, signals: mpsc::UnboundedSender<Signal>) -> Self {
        Self {
            settings,
            signals,
            inactivity: Timer::new(),
            reconnect: Timer::new(),
            final_transcript: Timer::new(),
            last_activity: Instant::now(),
            retry_used: false,
        }
    }

    fn arm_signal(
        timer: &mut Timer,
        duration: Duration,
        tx: &mpsc::UnboundedSender<Signal>,
        signal: Signal,
    ) {
        let tx = tx.clone();
        timer.arm(duration, move || {
            let _ = tx.send(signal);
        });
    }

    /// Restart the inactivity countdown.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
        Self::arm_signal(
            &mut self.inactivity,
            self.settings.inactivity_timeout,
            &self.signals,
            Signal::InactivityExpired,
        );
    }

    /// A call started: a later drop may be retried again.
    pub fn on_connected(&mut self) {
        self.retry_used = false;
        self.reconnect.disarm();
        self.record_activity();
    }

    /// Handle an inactivity expiry.
    pub fn on_inactivity_expired(&mut self, connected: bool) -> Expiry {
        if connected && self.settings.auto_reconnect {
            tracing::info!("Session inactive, keeping connection alive");
            self.record_activity();
            Expiry::KeepAlive
        } else {
            tracing::debug!(connected, "Inactivity window lapsed");
            Expiry::Lapsed
        }
    }

    /// Handle a disconnect. Returns `true` when a reconnect was scheduled.
    pub fn on_disconnected(&mut self, user_initiated: bool, has_config: bool) -> bool {
        self.inactivity.disarm();
        self.final_transcript.disarm();

        if user_initiated || !self.settings.auto_reconnect || !has_config {
            return false;
        }
        if self.retry_used {
            tracing::warn!("Connection dropped again, not retrying until a call succeeds");
            return false;
        }
        let idle = self.last_activity.elapsed();
        if idle >= self.settings.inactivity_timeout {
            tracing::info!(
                idle_secs = idle.as_secs(),
                "Connection dropped after inactivity, not reconnecting"
            );
            return false;
        }

        self.retry_used = true;
        tracing::info!(
            backoff_ms = self.settings.reconnect_backoff.as_millis() as u64,
            "Connection dropped unexpectedly, scheduling reconnect"
        );
        Self::arm_signal(
            &mut self.reconnect,
            self.settings.reconnect_backoff,
            &self.signals,
            Signal::Reconnect,
        );
        true
    }

    /// Start waiting for the final user transcript.
    pub fn await_final_transcript(&mut self) {
        Self::arm_signal(
            &mut self.final_transcript,
            self.settings.final_transcript_timeout,
            &self.signals,
            Signal::ListeningTimeout,
        );
    }

    pub fn cancel_final_transcript(&mut self) {
        self.final_transcript.disarm();
    }

    /// Cancel every timer.
    pub fn shutdown(&mut self) {
        self.inactivity.disarm();
        self.reconnect.disarm();
        self.final_transcript.disarm();
    }
}

// ── Tests ───────────────────────────────────────────────────────
