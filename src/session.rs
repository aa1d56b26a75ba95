//! Conversation session controller.
//!
//! Owns the message log for one conversation and runs each turn as a two-phase
//! commit: `begin_turn` appends the user message plus a pending placeholder,
//! `finish_turn` replaces that placeholder with the committed reply. `send`
//! composes both around a single backend dispatch.
//!
//! The controller also performs identity transitions, which decide the
//! history bucket the log is loaded from and saved to.

use crate::error::{ConfigurationError, IdentityError, LogError, StoreError, TurnError};
use crate::history::HistoryStore;
use crate::identity::{self, Identity, IdentityDirectory};
use crate::logging;
use crate::message::{Message, MessageLog, Mode, CONNECTION_ERROR_REPLY, NO_MATCH_REPLY};
use crate::router::{Backend, RouterResult};
use crate::store::{self, KeyValueStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Preset questions offered next to the input box: (label, text sent).
pub static QUICK_ACTIONS: [(&str, &str); 6] = [
    ("College timings?", "What are the college timings?"),
    ("Library hours?", "What are the library hours?"),
    ("Hostel facilities?", "Does the college offer hostel facilities?"),
    ("Extracurricular?", "What extracurricular activities are available?"),
    ("Attendance?", "Is attendance compulsory?"),
    ("Wi-Fi access?", "Is there Wi-Fi on campus?"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingReply,
}

/// A turn that has been started but not yet completed.
#[derive(Debug)]
pub struct Turn {
    mode: Mode,
    text: String,
    placeholder_id: Uuid,
}

impl Turn {
    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// What the account menu shows about the saved conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistorySummary {
    pub saved_messages: usize,
    pub last_activity: Option<DateTime<Utc>>,
}

pub struct ChatSession {
    log: MessageLog,
    mode: Mode,
    state: TurnState,
    identity: Option<Identity>,
    backend: Arc<dyn Backend>,
    history: HistoryStore,
    directory: Arc<dyn IdentityDirectory>,
    store: Arc<dyn KeyValueStore>,
    snapshots: watch::Sender<MessageLog>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn KeyValueStore>,
        directory: Arc<dyn IdentityDirectory>,
    ) -> Self {
        let log = MessageLog::seeded();
        let (snapshots, _) = watch::channel(log.clone());
        Self {
            log,
            mode: Mode::default(),
            state: TurnState::Idle,
            identity: None,
            backend,
            history: HistoryStore::new(store.clone()),
            directory,
            store,
            snapshots,
        }
    }

    // ============ Accessors ============

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Receives every new log snapshot, starting with the current one.
    pub fn subscribe(&self) -> watch::Receiver<MessageLog> {
        self.snapshots.subscribe()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn history_summary(&self) -> Option<HistorySummary> {
        self.identity.as_ref()?;
        Some(HistorySummary {
            saved_messages: self.log.committed().count(),
            last_activity: self.log.last_activity(),
        })
    }

    pub fn dark_mode(&self) -> bool {
        store::load_dark_mode(self.store.as_ref())
    }

    pub fn toggle_dark_mode(&self) -> Result<bool, StoreError> {
        let enabled = !self.dark_mode();
        store::save_dark_mode(self.store.as_ref(), enabled)?;
        Ok(enabled)
    }

    // ============ Turns ============

    /// Synchronous half of a turn: append the user message and a placeholder.
    pub fn begin_turn(&mut self, text: &str) -> Result<Turn, TurnError> {
        if text.trim().is_empty() {
            return Err(TurnError::EmptyInput);
        }
        if self.state == TurnState::AwaitingReply {
            return Err(TurnError::Busy);
        }

        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id;
        let log = self.log.append(Message::user(text))?.append(placeholder)?;
        self.commit(log);
        self.state = TurnState::AwaitingReply;

        logging::log_session(
            self.account_id(),
            &format!("Turn started in {} mode", self.mode.as_str()),
        );

        Ok(Turn {
            mode: self.mode,
            text: text.to_string(),
            placeholder_id,
        })
    }

    /// Completing half of a turn: replace the placeholder and persist.
    pub fn finish_turn(
        &mut self,
        turn: Turn,
        outcome: Result<RouterResult, ConfigurationError>,
    ) -> Result<Message, TurnError> {
        let owns_placeholder = self.state == TurnState::AwaitingReply
            && self.log.pending().is_some_and(|m| m.id == turn.placeholder_id);
        if !owns_placeholder {
            return Err(LogError::InvariantViolation("turn has no placeholder to replace").into());
        }

        let reply = Message::bot(reply_text(outcome, self.account_id()));
        let log = self.log.replace_last(reply.clone())?;
        self.commit(log);
        self.state = TurnState::Idle;
        self.persist();

        Ok(reply)
    }

    /// Run one full turn against the backend.
    pub async fn send(&mut self, text: &str) -> Result<Message, TurnError> {
        let turn = self.begin_turn(text)?;
        let backend = Arc::clone(&self.backend);
        let outcome = backend.dispatch(turn.mode, &turn.text).await;
        self.finish_turn(turn, outcome)
    }

    /// Send one of the preset questions as if it had been typed.
    pub async fn send_quick_action(&mut self, index: usize) -> Option<Result<Message, TurnError>> {
        let (_, text) = QUICK_ACTIONS.get(index)?;
        Some(self.send(text).await)
    }

    // ============ Identity transitions ============

    pub fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> Result<Identity, IdentityError> {
        identity::validate_sign_up(name, email, password, confirm_password)?;
        let identity = Identity::new(email, name);
        self.directory.register(identity.clone(), password)?;
        logging::log_identity(Some(&identity.account_id), "Registered");
        self.login(identity.clone());
        Ok(identity)
    }

    pub fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        identity::validate_sign_in(email, password)?;
        let identity = self.directory.verify(email.trim(), password)?;
        self.login(identity.clone());
        Ok(identity)
    }

    /// Make `identity` active and load its saved conversation, if any.
    pub fn login(&mut self, identity: Identity) {
        if self.identity.as_ref().is_some_and(|current| *current != identity) {
            self.logout();
        }

        if let Err(e) = identity::save_active_identity(self.store.as_ref(), &identity) {
            logging::log_error(
                Some(&identity.account_id),
                &format!("Failed to remember active identity: {}", e),
            );
        }
        logging::log_identity(Some(&identity.account_id), "Logged in");
        self.activate(identity);
    }

    /// Resume the identity that was active when the app last closed.
    pub fn restore(&mut self) -> Option<&Identity> {
        let identity = identity::load_active_identity(self.store.as_ref())?;
        logging::log_identity(Some(&identity.account_id), "Restored previous session");
        self.activate(identity);
        self.identity.as_ref()
    }

    pub fn logout(&mut self) {
        let Some(identity) = self.identity.take() else {
            return;
        };
        if self.log.has_conversation() {
            if let Err(e) = self.history.save(&identity.account_id, &self.log) {
                logging::log_error(
                    Some(&identity.account_id),
                    &format!("History save on logout failed: {}", e),
                );
            }
        }
        if let Err(e) = identity::clear_active_identity(self.store.as_ref()) {
            logging::log_error(
                Some(&identity.account_id),
                &format!("Failed to forget active identity: {}", e),
            );
        }
        self.reset_to_seed();
        logging::log_identity(Some(&identity.account_id), "Logged out");
    }

    /// Delete the active account's saved history and start over.
    pub fn clear_history(&mut self) {
        if let Some(identity) = &self.identity {
            if let Err(e) = self.history.clear(&identity.account_id) {
                logging::log_error(
                    Some(&identity.account_id),
                    &format!("History clear failed: {}", e),
                );
            }
        }
        self.reset_to_seed();
    }

    // ============ Internals ============

    fn activate(&mut self, identity: Identity) {
        if let Some(saved) = self.history.load(&identity.account_id) {
            self.commit(saved);
            self.state = TurnState::Idle;
        }
        self.identity = Some(identity);
    }

    fn reset_to_seed(&mut self) {
        let log = self.log.reset(Message::greeting());
        self.commit(log);
        self.state = TurnState::Idle;
    }

    fn commit(&mut self, log: MessageLog) {
        self.log = log;
        self.snapshots.send_replace(self.log.clone());
    }

    /// Fire-and-forget history write after a completed turn.
    fn persist(&self) {
        let Some(identity) = &self.identity else {
            return;
        };
        if !self.log.has_conversation() {
            return;
        }
        if let Err(e) = self.history.save(&identity.account_id, &self.log) {
            logging::log_error(
                Some(&identity.account_id),
                &format!("History save failed: {}", e),
            );
        }
    }

    fn account_id(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.account_id.as_str())
    }
}

fn reply_text(outcome: Result<RouterResult, ConfigurationError>, account_id: Option<&str>) -> String {
    match outcome {
        Ok(RouterResult::Answered(text)) => text,
        Ok(RouterResult::NoMatch) => NO_MATCH_REPLY.to_string(),
        Ok(RouterResult::BackendError(reason)) => {
            logging::log_session(account_id, &format!("Turn failed: {}", reason));
            CONNECTION_ERROR_REPLY.to_string()
        }
        Err(e) => {
            logging::log_error(account_id, &e.to_string());
            CONNECTION_ERROR_REPLY.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::history::history_key;
    use crate::identity::{InMemoryDirectory, ACTIVE_IDENTITY_KEY};
    use crate::message::{Role, GREETING};
    use crate::router::HttpRouter;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned outcomes and records every dispatch.
    #[derive(Default)]
    struct ScriptedBackend {
        outcomes: Mutex<VecDeque<Result<RouterResult, ConfigurationError>>>,
        calls: Mutex<Vec<(Mode, String)>>,
    }

    impl ScriptedBackend {
        fn with(outcomes: Vec<Result<RouterResult, ConfigurationError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::default(),
            })
        }

        fn calls(&self) -> Vec<(Mode, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        async fn dispatch(&self, mode: Mode, text: &str) -> Result<RouterResult, ConfigurationError> {
            self.calls.lock().unwrap().push((mode, text.to_string()));
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(RouterResult::NoMatch))
        }
    }

    /// Checks the published log while the request is in flight.
    struct ObservingBackend {
        snapshots: Mutex<Option<watch::Receiver<MessageLog>>>,
    }

    #[async_trait]
    impl Backend for ObservingBackend {
        async fn dispatch(&self, _mode: Mode, _text: &str) -> Result<RouterResult, ConfigurationError> {
            let receiver = self.snapshots.lock().unwrap().clone().unwrap();
            let log = receiver.borrow().clone();
            assert_eq!(log.messages().iter().filter(|m| m.pending).count(), 1);
            assert!(log.last().unwrap().pending);
            Ok(RouterResult::Answered("seen".into()))
        }
    }

    fn session_with(backend: Arc<dyn Backend>) -> (ChatSession, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let session = ChatSession::new(backend, store.clone(), Arc::new(InMemoryDirectory::new()));
        (session, store)
    }

    fn http_router(base: &str) -> Arc<HttpRouter> {
        Arc::new(HttpRouter::new(&Config {
            api_url: Some(base.to_string()),
            request_timeout_secs: 5,
            connect_timeout_secs: 2,
            ..Config::default()
        }))
    }

    fn saved_history(store: &MemoryStore, account: &str) -> Vec<Message> {
        let raw = store.get(&history_key(account)).unwrap().unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_faq_answer_becomes_bot_message() {
        let backend = ScriptedBackend::with(vec![Ok(RouterResult::Answered(
            "Library opens at 8am".into(),
        ))]);
        let (mut session, _) = session_with(backend.clone());

        let reply = session.send("library hours").await.unwrap();

        assert_eq!(reply.text, "Library opens at 8am");
        assert_eq!(session.log().len(), 3);
        assert_eq!(session.log().messages()[1].role, Role::User);
        assert_eq!(session.log().messages()[1].text, "library hours");
        assert_eq!(session.log().last().unwrap().text, "Library opens at 8am");
        assert!(session.log().pending().is_none());
        assert_eq!(session.state(), TurnState::Idle);
        assert_eq!(backend.calls(), vec![(Mode::FaqKeyword, "library hours".to_string())]);
    }

    #[tokio::test]
    async fn test_no_match_suggests_other_mode() {
        let (mut session, _) = session_with(ScriptedBackend::with(vec![Ok(RouterResult::NoMatch)]));
        let reply = session.send("parking").await.unwrap();
        assert_eq!(reply.text, NO_MATCH_REPLY);
    }

    #[tokio::test]
    async fn test_generative_mode_is_dispatched() {
        let backend = ScriptedBackend::with(vec![Ok(RouterResult::Answered("Hello!".into()))]);
        let (mut session, _) = session_with(backend.clone());
        session.set_mode(Mode::Generative);

        let reply = session.send("hi").await.unwrap();

        assert_eq!(reply.text, "Hello!");
        assert_eq!(backend.calls()[0].0, Mode::Generative);
    }

    #[tokio::test]
    async fn test_backend_error_adds_exactly_two_messages() {
        let backend = ScriptedBackend::with(vec![Ok(RouterResult::BackendError("refused".into()))]);
        let (mut session, _) = session_with(backend);
        session.set_mode(Mode::Generative);
        let before = session.log().len();

        let reply = session.send("hi").await.unwrap();

        assert_eq!(reply.text, CONNECTION_ERROR_REPLY);
        assert_eq!(session.log().len(), before + 2);
        assert_eq!(session.state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn test_configuration_error_is_folded_into_conversation() {
        let backend = ScriptedBackend::with(vec![Err(ConfigurationError::MissingBaseUrl)]);
        let (mut session, _) = session_with(backend);

        let reply = session.send("hi").await.unwrap();

        assert_eq!(reply.text, CONNECTION_ERROR_REPLY);
        assert_eq!(session.log().len(), 3);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let backend = ScriptedBackend::with(vec![]);
        let (mut session, _) = session_with(backend.clone());

        assert_eq!(session.send("").await, Err(TurnError::EmptyInput));
        assert_eq!(session.send("   ").await, Err(TurnError::EmptyInput));
        assert_eq!(session.log().len(), 1);
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_second_turn_is_rejected_while_awaiting() {
        let (mut session, _) = session_with(ScriptedBackend::with(vec![]));

        let turn = session.begin_turn("first").unwrap();
        assert_eq!(session.state(), TurnState::AwaitingReply);
        assert_eq!(session.begin_turn("second").unwrap_err(), TurnError::Busy);
        assert_eq!(session.log().len(), 3);
        assert_eq!(session.log().messages().iter().filter(|m| m.pending).count(), 1);

        session
            .finish_turn(turn, Ok(RouterResult::Answered("done".into())))
            .unwrap();
        assert!(session.begin_turn("second").is_ok());
    }

    #[test]
    fn test_stale_turn_cannot_replace_after_reset() {
        let (mut session, _) = session_with(ScriptedBackend::with(vec![]));
        let turn = session.begin_turn("question").unwrap();
        session.clear_history();

        let result = session.finish_turn(turn, Ok(RouterResult::Answered("late".into())));
        assert!(matches!(result, Err(TurnError::Invariant(_))));
        assert_eq!(session.log().len(), 1);
    }

    #[tokio::test]
    async fn test_placeholder_is_visible_while_in_flight() {
        let backend = Arc::new(ObservingBackend {
            snapshots: Mutex::new(None),
        });
        let (mut session, _) = session_with(backend.clone());
        *backend.snapshots.lock().unwrap() = Some(session.subscribe());

        let reply = session.send("hello").await.unwrap();
        assert_eq!(reply.text, "seen");

        let latest = session.subscribe().borrow().clone();
        assert_eq!(latest, *session.log());
        assert!(latest.pending().is_none());
    }

    #[tokio::test]
    async fn test_quick_action_sends_preset_text() {
        let backend = ScriptedBackend::with(vec![]);
        let (mut session, _) = session_with(backend.clone());

        assert!(session.send_quick_action(1).await.unwrap().is_ok());
        assert!(session.send_quick_action(99).await.is_none());
        assert_eq!(backend.calls()[0].1, "What are the library hours?");
    }

    #[tokio::test]
    async fn test_history_saved_only_for_active_identity() {
        let backend = ScriptedBackend::with(vec![
            Ok(RouterResult::Answered("a1".into())),
            Ok(RouterResult::Answered("a2".into())),
        ]);
        let (mut session, store) = session_with(backend);

        session.send("guest question").await.unwrap();
        assert!(store.get(&history_key("ana@college.edu")).unwrap().is_none());

        session
            .sign_up("Ana", "ana@college.edu", "secret1", "secret1")
            .unwrap();
        session.send("member question").await.unwrap();

        let saved = saved_history(&store, "ana@college.edu");
        assert_eq!(saved.len(), 5);
        assert_eq!(saved[4].text, "a2");
        assert!(saved.iter().all(|m| !m.pending));
    }

    #[tokio::test]
    async fn test_login_replaces_seed_with_saved_history() {
        let backend = ScriptedBackend::with(vec![
            Ok(RouterResult::Answered("r1".into())),
            Ok(RouterResult::Answered("r2".into())),
        ]);
        let (mut session, _) = session_with(backend);
        session
            .sign_up("Ana", "ana@college.edu", "secret1", "secret1")
            .unwrap();
        session.send("q1").await.unwrap();
        session.send("q2").await.unwrap();
        let saved = session.log().clone();
        assert_eq!(saved.len(), 5);

        session.logout();
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.log().messages()[0].text, GREETING);
        assert!(session.identity().is_none());

        session.sign_in("ana@college.edu", "secret1").unwrap();
        assert_eq!(*session.log(), saved);
    }

    #[test]
    fn test_login_without_history_keeps_current_log() {
        let (mut session, _) = session_with(ScriptedBackend::with(vec![]));
        session.sign_up("New", "new@college.edu", "secret1", "secret1").unwrap();
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.identity().unwrap().display_name, "New");
    }

    #[test]
    fn test_sign_up_requires_a_name() {
        let (mut session, _) = session_with(ScriptedBackend::with(vec![]));
        let result = session.sign_up("  ", "new@college.edu", "secret1", "secret1");
        let Err(IdentityError::Invalid(errors)) = result else {
            panic!("expected validation failure");
        };
        assert_eq!(errors[0].field, "name");
        assert!(session.identity().is_none());
    }

    #[test]
    fn test_identity_errors_are_surfaced() {
        let (mut session, _) = session_with(ScriptedBackend::with(vec![]));
        assert_eq!(
            session.sign_in("ana@college.edu", "secret1"),
            Err(IdentityError::NotRegistered)
        );
        session.sign_up("Ana", "ana@college.edu", "secret1", "secret1").unwrap();
        session.logout();
        assert_eq!(
            session.sign_up("Ana", "ana@college.edu", "secret1", "secret1"),
            Err(IdentityError::AlreadyExists)
        );
        assert_eq!(
            session.sign_in("ana@college.edu", "secret2"),
            Err(IdentityError::WrongCredential)
        );
        assert!(matches!(
            session.sign_in("not-an-email", "secret1"),
            Err(IdentityError::Invalid(_))
        ));
        assert!(session.identity().is_none());
    }

    #[tokio::test]
    async fn test_restore_previous_identity() {
        let backend = ScriptedBackend::with(vec![Ok(RouterResult::Answered("r".into()))]);
        let store = Arc::new(MemoryStore::new());
        let directory = Arc::new(InMemoryDirectory::new());

        let mut first = ChatSession::new(backend.clone(), store.clone(), directory.clone());
        first.sign_up("Ana", "ana@college.edu", "secret1", "secret1").unwrap();
        first.send("q").await.unwrap();
        let log = first.log().clone();
        drop(first);

        let mut second = ChatSession::new(backend, store.clone(), directory);
        assert_eq!(second.restore().map(|i| i.account_id.clone()).as_deref(), Some("ana@college.edu"));
        assert_eq!(*second.log(), log);

        second.logout();
        assert!(store.get(ACTIVE_IDENTITY_KEY).unwrap().is_none());
        assert!(second.restore().is_none());
    }

    #[tokio::test]
    async fn test_clear_history_resets_and_forgets() {
        let backend = ScriptedBackend::with(vec![Ok(RouterResult::Answered("r".into()))]);
        let (mut session, store) = session_with(backend);
        session.sign_up("Ana", "ana@college.edu", "secret1", "secret1").unwrap();
        session.send("q").await.unwrap();
        assert!(store.get(&history_key("ana@college.edu")).unwrap().is_some());

        session.clear_history();

        assert_eq!(session.log().len(), 1);
        assert!(store.get(&history_key("ana@college.edu")).unwrap().is_none());
        assert!(session.identity().is_some());
    }

    #[tokio::test]
    async fn test_switching_accounts_saves_previous_one() {
        let backend = ScriptedBackend::with(vec![Ok(RouterResult::Answered("r".into()))]);
        let (mut session, store) = session_with(backend);
        session.sign_up("Ana", "ana@college.edu", "secret1", "secret1").unwrap();
        session.send("q").await.unwrap();

        session.sign_up("Ben", "ben@college.edu", "secret2", "secret2").unwrap();

        assert_eq!(saved_history(&store, "ana@college.edu").len(), 3);
        assert_eq!(session.log().len(), 1);
        assert_eq!(session.identity().unwrap().account_id, "ben@college.edu");
    }

    #[tokio::test]
    async fn test_history_summary_and_dark_mode() {
        let backend = ScriptedBackend::with(vec![Ok(RouterResult::Answered("r".into()))]);
        let (mut session, _) = session_with(backend);
        assert!(session.history_summary().is_none());

        session.sign_up("Ana", "ana@college.edu", "secret1", "secret1").unwrap();
        session.send("q").await.unwrap();
        let summary = session.history_summary().unwrap();
        assert_eq!(summary.saved_messages, 3);
        assert_eq!(summary.last_activity, session.log().last_activity());

        assert!(!session.dark_mode());
        assert!(session.toggle_dark_mode().unwrap());
        assert!(session.dark_mode());
    }

    #[tokio::test]
    async fn test_turns_through_http_router() {
        let app = axum::Router::new().route(
            "/search",
            axum::routing::get(|| async { axum::Json(serde_json::json!([])) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (mut session, _) = session_with(http_router(&base));
        let before = session.log().len();
        let reply = session.send("parking").await.unwrap();
        assert_eq!(reply.text, NO_MATCH_REPLY);
        assert_eq!(session.log().len(), before + 2);
        assert_eq!(session.log().last().unwrap().role, Role::Bot);

        let closed = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let unreachable = format!("http://{}", closed.local_addr().unwrap());
        drop(closed);

        let (mut session, _) = session_with(http_router(&unreachable));
        session.set_mode(Mode::Generative);
        let before = session.log().len();
        let reply = session.send("hi").await.unwrap();
        assert_eq!(reply.text, CONNECTION_ERROR_REPLY);
        assert_eq!(session.log().len(), before + 2);
        assert!(session.log().pending().is_none());
        assert_eq!(session.state(), TurnState::Idle);
    }
}
