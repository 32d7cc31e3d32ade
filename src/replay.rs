//! Scripted replay of a conversation.
//!
//! A replay script is JSON Lines. Each line is one of:
//!
//! - a voice service wire message (`{"type":"transcript",...}`,
//!   `{"type":"call-start"}`)
//! - a user command (`{"type":"start-listening"}`,
//!   `{"type":"send-text","text":"..."}`)
//! - a timer expiry (`{"signal":"listening-timeout"}`,
//!   `{"signal":"inactivity-expired"}`, `{"signal":"reconnect"}`), delivered
//!   as if the timer had fired at that point
//!
//! Blank lines and lines starting with `#` are skipped.

use anyhow::{bail, Result};
use serde::Deserialize;

use crate::conversation::Command;
use crate::runtime::ConversationRuntime;
use crate::supervisor::Signal;
use crate::voice::{ProviderMessage, VoiceEvent};

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Event(VoiceEvent),
    Command(Command),
    Signal(Signal),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SignalLine {
    signal: Signal,
}

impl ScriptStep {
    /// Parse one line. `Ok(None)` for blank and comment lines.
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        if let Ok(SignalLine { signal }) = serde_json::from_str::<SignalLine>(line) {
            return Ok(Some(Self::Signal(signal)));
        }
        if let Ok(command) = serde_json::from_str::<Command>(line) {
            return Ok(Some(Self::Command(command)));
        }
        match serde_json::from_str::<ProviderMessage>(line) {
            Ok(message) => Ok(Some(Self::Event(message.into_event()))),
            Err(e) => bail!("Unrecognised script line ({e}): {line}"),
        }
    }
}

/// Parse a whole script. Errors name the offending line number.
pub fn parse_script(text: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (index, line) in text.lines().enumerate() {
        match ScriptStep::parse(line) {
            Ok(Some(step)) => steps.push(step),
            Ok(None) => {}
            Err(e) => bail!("line {}: {e}", index + 1),
        }
    }
    Ok(steps)
}

/// Feed `steps` through `runtime` in order.
pub async fn replay(runtime: &mut ConversationRuntime, steps: Vec<ScriptStep>) {
    let total = steps.len();
    for step in steps {
        match step {
            ScriptStep::Event(event) => runtime.handle_event(event).await,
            ScriptStep::Command(command) => runtime.handle_command(command).await,
            ScriptStep::Signal(signal) => runtime.handle_signal(signal).await,
        }
    }
    tracing::info!(
        steps = total,
        messages = runtime.engine().messages().len(),
        "Replay finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::conversation::ListeningState;
    use crate::scenario::Scenario;
    use crate::session::{MemoryStore, SessionManager};
    use crate::voice::RecordingProvider;
    use std::sync::Arc;

    const DEMO: &str = include_str!("../demos/first-day.jsonl");
    const FIRST_DAY: &str = include_str!("../scenarios/first-day.toml");

    #[test]
    fn parses_commands_and_wire_messages() {
        assert_eq!(
            ScriptStep::parse(r#"{"type":"start-listening"}"#).unwrap(),
            Some(ScriptStep::Command(Command::StartListening))
        );
        assert_eq!(
            ScriptStep::parse(r#"{"type":"send-text","text":"Hallo"}"#).unwrap(),
            Some(ScriptStep::Command(Command::SendText {
                text: "Hallo".into()
            }))
        );
        assert_eq!(
            ScriptStep::parse(
                r#"{"type":"transcript","role":"user","transcriptType":"final","transcript":"Ja"}"#
            )
            .unwrap(),
            Some(ScriptStep::Event(VoiceEvent::FinalUser {
                transcript: "Ja".into()
            }))
        );
        assert_eq!(
            ScriptStep::parse(r#"{"type":"call-end"}"#).unwrap(),
            Some(ScriptStep::Event(VoiceEvent::Disconnected))
        );
    }

    #[test]
    fn parses_timer_signals() {
        assert_eq!(
            ScriptStep::parse(r#"{"signal":"listening-timeout"}"#).unwrap(),
            Some(ScriptStep::Signal(Signal::ListeningTimeout))
        );
        assert_eq!(
            ScriptStep::parse(r#"{"signal":"inactivity-expired"}"#).unwrap(),
            Some(ScriptStep::Signal(Signal::InactivityExpired))
        );
        assert!(ScriptStep::parse(r#"{"signal":"lunch-break"}"#).is_err());
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert_eq!(ScriptStep::parse("   ").unwrap(), None);
        assert_eq!(ScriptStep::parse("# greeting").unwrap(), None);
    }

    #[test]
    fn bad_line_reports_line_number() {
        let err = parse_script("{\"type\":\"call-start\"}\n{\"type\":\"bogus\"}").unwrap_err();
        assert!(err.to_string().starts_with("line 2:"));
    }

    fn first_day_runtime() -> ConversationRuntime {
        let scenario = Scenario::from_toml_str(FIRST_DAY).unwrap();
        let sessions = SessionManager::new(Arc::new(MemoryStore::new()));
        ConversationRuntime::new(
            scenario,
            &Config::default(),
            sessions,
            Arc::new(RecordingProvider::new()),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn signal_lines_drive_timeouts() {
        let mut runtime = first_day_runtime();
        runtime.connect().await.unwrap();
        let script = r#"
            {"type":"call-start"}
            {"type":"start-listening"}
            {"type":"stop-listening"}
            {"signal":"listening-timeout"}
            {"signal":"inactivity-expired"}
        "#;
        replay(&mut runtime, parse_script(script).unwrap()).await;

        assert_eq!(runtime.engine().listening(), ListeningState::Idle);
        assert!(runtime.engine().messages().is_empty());
        assert!(runtime
            .notices()
            .iter()
            .any(|n| n.title == "Session Active"));
    }

    #[tokio::test(start_paused = true)]
    async fn demo_script_completes_first_day() {
        let mut runtime = first_day_runtime();
        runtime.connect().await.unwrap();

        replay(&mut runtime, parse_script(DEMO).unwrap()).await;

        let engine = runtime.engine();
        assert!(engine.is_complete());
        assert!(engine.objectives().iter().all(|o| o.completed));
        assert!(!engine.feedback().is_empty());
        assert!(runtime
            .notices()
            .iter()
            .any(|n| n.title == "Session Active"));

        let session = runtime.sessions().current_session().unwrap();
        assert!(session.is_complete);
        assert_eq!(session.messages.len(), engine.messages().len());
        assert!(session.turn_count >= 3);
    }
}
