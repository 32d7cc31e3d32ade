//! Session persistence with a single current-session pointer.
//!
//! Two keys are used:
//!
//! - `vivo_fluent_current_session`: the current session as one JSON object.
//! - `vivo_fluent_sessions`: bounded JSON array of recent sessions, oldest
//!   first.
//!
//! Storage failures never reach callers. Unreadable data is treated as
//! absent and logged; failed writes are logged and dropped.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::model::{ConversationSession, SessionStats, SessionUpdate};
use super::store::KeyValueStore;
use crate::conversation::{now_epoch_ms, Message, Role};
use crate::objectives::Objective;

pub const CURRENT_SESSION_KEY: &str = "vivo_fluent_current_session";
pub const SESSIONS_KEY: &str = "vivo_fluent_sessions";
pub const DEFAULT_MAX_SESSIONS: usize = 50;

/// Handle over persisted conversation sessions.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    max_sessions: usize,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// Start a new session for a scenario and make it current.
    pub fn create_session(&self, scenario_id: &str, scenario_title: &str) -> ConversationSession {
        let now = now_epoch_ms();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let session = ConversationSession {
            id: format!("session_{now}_{}", &suffix[..9]),
            scenario_id: scenario_id.to_string(),
            scenario_title: scenario_title.to_string(),
            messages: Vec::new(),
            objectives: Vec::new(),
            started_at: now,
            last_updated: now,
            turn_count: 0,
            is_complete: false,
        };
        self.persist(&session);
        tracing::info!(session_id = %session.id, scenario = %scenario_id, "Created session");
        session
    }

    /// Reuse the current session when it belongs to `scenario_id` and is
    /// still in progress; otherwise create a fresh one.
    pub fn resume_or_create(&self, scenario_id: &str, scenario_title: &str) -> ConversationSession {
        match self.current_session() {
            Some(session) if session.scenario_id == scenario_id && !session.is_complete => {
                tracing::info!(
                    session_id = %session.id,
                    messages = session.messages.len(),
                    "Resuming session"
                );
                session
            }
            _ => self.create_session(scenario_id, scenario_title),
        }
    }

    pub fn current_session(&self) -> Option<ConversationSession> {
        self.read_json(CURRENT_SESSION_KEY)
    }

    /// Merge `update` into the current session. No-op without one.
    pub fn update_session(&self, update: SessionUpdate) -> Option<ConversationSession> {
        let Some(mut session) = self.current_session() else {
            tracing::debug!("No current session to update");
            return None;
        };

        if let Some(messages) = update.messages {
            session.messages = messages;
            session.recount_turns();
        }
        if let Some(objectives) = update.objectives {
            session.objectives = objectives;
        }
        if let Some(is_complete) = update.is_complete {
            session.is_complete = is_complete;
        }
        session.last_updated = now_epoch_ms();

        self.persist(&session);
        Some(session)
    }

    /// Append a new message built from `role` and `content`.
    pub fn add_message(&self, role: Role, content: &str) -> Option<ConversationSession> {
        self.record_message(Message::new(role, content))
    }

    /// Append an already-built message, keeping its timestamp.
    pub fn record_message(&self, message: Message) -> Option<ConversationSession> {
        let mut messages = self.current_session()?.messages;
        messages.push(message);
        self.update_session(SessionUpdate {
            messages: Some(messages),
            ..SessionUpdate::default()
        })
    }

    pub fn update_objectives(&self, objectives: Vec<Objective>) -> Option<ConversationSession> {
        self.update_session(SessionUpdate {
            objectives: Some(objectives),
            ..SessionUpdate::default()
        })
    }

    pub fn complete_session(&self) -> Option<ConversationSession> {
        let session = self.update_session(SessionUpdate {
            is_complete: Some(true),
            ..SessionUpdate::default()
        })?;
        tracing::info!(session_id = %session.id, turns = session.turn_count, "Session complete");
        Some(session)
    }

    /// Make a stored session current again.
    pub fn load_session(&self, session_id: &str) -> Option<ConversationSession> {
        let session = self
            .all_sessions()
            .into_iter()
            .find(|s| s.id == session_id)?;
        self.write_json(CURRENT_SESSION_KEY, &session);
        Some(session)
    }

    /// Remove a session. Clears the current pointer if it pointed there.
    /// Returns whether a session was removed.
    pub fn delete_session(&self, session_id: &str) -> bool {
        let mut sessions = self.all_sessions();
        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);
        let removed = sessions.len() != before;
        if removed {
            self.write_json(SESSIONS_KEY, &sessions);
        }

        if self
            .current_session()
            .is_some_and(|current| current.id == session_id)
        {
            self.clear_current_session();
        }
        removed
    }

    pub fn clear_current_session(&self) {
        if let Err(e) = self.store.delete(CURRENT_SESSION_KEY) {
            tracing::warn!(error = %e, "Failed to clear current session");
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Stored sessions, oldest first.
    pub fn all_sessions(&self) -> Vec<ConversationSession> {
        self.read_json(SESSIONS_KEY).unwrap_or_default()
    }

    pub fn sessions_by_scenario(&self, scenario_id: &str) -> Vec<ConversationSession> {
        self.all_sessions()
            .into_iter()
            .filter(|s| s.scenario_id == scenario_id)
            .collect()
    }

    /// Messages of the current session, for connection context.
    pub fn context_messages(&self) -> Vec<Message> {
        self.current_session()
            .map(|s| s.messages)
            .unwrap_or_default()
    }

    pub fn stats(&self) -> Option<SessionStats> {
        self.current_session().map(|s| s.stats())
    }

    // ── Storage helpers ─────────────────────────────────────────

    /// Write `session` as current and upsert it into the bounded list.
    fn persist(&self, session: &ConversationSession) {
        self.write_json(CURRENT_SESSION_KEY, session);

        let mut sessions = self.all_sessions();
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }
        if sessions.len() > self.max_sessions {
            let excess = sessions.len() - self.max_sessions;
            sessions.drain(..excess);
            tracing::debug!(evicted = excess, "Evicted oldest sessions");
        }
        self.write_json(SESSIONS_KEY, &sessions);
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.load(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, store = self.store.name(), error = %e, "Failed to read session data");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Ignoring corrupt session data");
                None
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize session data");
                return;
            }
        };
        if let Err(e) = self.store.save(key, &raw) {
            tracing::warn!(key, store = self.store.name(), error = %e, "Failed to save session data");
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemoryStore;

    fn manager() -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SessionManager::new(store.clone()), store)
    }

    #[test]
    fn create_sets_current_and_lists() {
        let (mgr, _) = manager();
        let s = mgr.create_session("first-day", "First Day");
        assert!(s.id.starts_with("session_"));
        assert_eq!(s.turn_count, 0);
        assert_eq!(mgr.current_session().unwrap().id, s.id);
        assert_eq!(mgr.all_sessions().len(), 1);
    }

    #[test]
    fn ids_are_unique() {
        let (mgr, _) = manager();
        let a = mgr.create_session("x", "X");
        let b = mgr.create_session("x", "X");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn turn_count_tracks_user_messages() {
        let (mgr, _) = manager();
        mgr.create_session("first-day", "First Day");
        mgr.add_message(Role::Assistant, "Guten Morgen!");
        mgr.add_message(Role::User, "Guten Morgen");
        let s = mgr.add_message(Role::User, "Ich bin neu").unwrap();
        assert_eq!(s.turn_count, 2);
        assert_eq!(s.messages.len(), 3);

        let listed = &mgr.all_sessions()[0];
        assert_eq!(listed.turn_count, 2);
        assert_eq!(listed.messages.len(), 3);
    }

    #[test]
    fn update_without_current_is_noop() {
        let (mgr, store) = manager();
        assert!(mgr.add_message(Role::User, "Hallo").is_none());
        assert!(mgr.complete_session().is_none());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let (mgr, _) = manager();
        let first = mgr.create_session("s0", "S0");
        for i in 1..=50 {
            mgr.create_session(&format!("s{i}"), "S");
        }
        let all = mgr.all_sessions();
        assert_eq!(all.len(), 50);
        assert!(all.iter().all(|s| s.id != first.id));
        assert_eq!(all[0].scenario_id, "s1");
        assert_eq!(all[49].scenario_id, "s50");
    }

    #[test]
    fn custom_cap_is_respected() {
        let store = Arc::new(MemoryStore::new());
        let mgr = SessionManager::new(store).with_max_sessions(2);
        for i in 0..4 {
            mgr.create_session(&format!("s{i}"), "S");
        }
        let ids: Vec<_> = mgr.all_sessions().into_iter().map(|s| s.scenario_id).collect();
        assert_eq!(ids, vec!["s2", "s3"]);
    }

    #[test]
    fn corrupt_data_reads_as_absent() {
        let (mgr, store) = manager();
        store.save(CURRENT_SESSION_KEY, "{not json").unwrap();
        store.save(SESSIONS_KEY, "[1,2").unwrap();
        assert!(mgr.current_session().is_none());
        assert!(mgr.all_sessions().is_empty());

        // Recovers by overwriting.
        mgr.create_session("x", "X");
        assert_eq!(mgr.all_sessions().len(), 1);
    }

    #[test]
    fn objectives_and_completion_persist() {
        let (mgr, _) = manager();
        mgr.create_session("x", "X");
        let mut objectives = Objective::from_goals(&["Greet"]);
        objectives[0].completed = true;
        mgr.update_objectives(objectives);
        let s = mgr.complete_session().unwrap();
        assert!(s.is_complete);
        assert!(s.objectives[0].completed);
        assert!(mgr.all_sessions()[0].is_complete);
    }

    #[test]
    fn load_and_delete_sessions() {
        let (mgr, _) = manager();
        let a = mgr.create_session("a", "A");
        let b = mgr.create_session("b", "B");
        assert_eq!(mgr.current_session().unwrap().id, b.id);

        assert_eq!(mgr.load_session(&a.id).unwrap().id, a.id);
        assert_eq!(mgr.current_session().unwrap().id, a.id);
        assert!(mgr.load_session("nope").is_none());

        assert!(mgr.delete_session(&a.id));
        assert!(mgr.current_session().is_none());
        assert!(!mgr.delete_session(&a.id));
        assert_eq!(mgr.all_sessions().len(), 1);
    }

    #[test]
    fn resume_reuses_matching_in_progress_session() {
        let (mgr, _) = manager();
        let s = mgr.create_session("first-day", "First Day");
        mgr.add_message(Role::User, "Hallo");

        let resumed = mgr.resume_or_create("first-day", "First Day");
        assert_eq!(resumed.id, s.id);
        assert_eq!(resumed.messages.len(), 1);

        let other = mgr.resume_or_create("hospital", "Hospital");
        assert_ne!(other.id, s.id);

        mgr.complete_session();
        let fresh = mgr.resume_or_create("hospital", "Hospital");
        assert_ne!(fresh.id, other.id);
    }

    #[test]
    fn queries_by_scenario_and_context() {
        let (mgr, _) = manager();
        mgr.create_session("a", "A");
        mgr.create_session("b", "B");
        mgr.add_message(Role::Assistant, "Willkommen");
        mgr.create_session("a", "A");

        assert_eq!(mgr.sessions_by_scenario("a").len(), 2);
        assert!(mgr.context_messages().is_empty());

        let b = mgr.sessions_by_scenario("b").remove(0);
        mgr.load_session(&b.id);
        assert_eq!(mgr.context_messages().len(), 1);
        assert_eq!(mgr.stats().unwrap().assistant_messages, 1);

        mgr.clear_current_session();
        assert!(mgr.stats().is_none());
    }
}
