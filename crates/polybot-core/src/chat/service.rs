//! Chat service orchestrating sessions, transcripts, and model calls.
//!
//! `ChatService` owns the session store and the model provider for the
//! lifetime of the process. `process_turn` runs one exchange: persist the
//! user's turns, replay the whole transcript to the model, persist and
//! return the reply.

use std::future::Future;
use std::slice;
use std::time::Duration;

use chrono::TimeDelta;
use polybot_types::chat::{
    DEFAULT_LANGUAGE, DEFAULT_RECENCY_WINDOW_DAYS, Session, SessionId, SessionSummary, Turn, TurnRole,
    recency_window,
};
use polybot_types::config::{AppConfig, PersistencePolicy, PromptPolicy};
use polybot_types::error::{ChatError, RepositoryError};
use polybot_types::llm::{CompletionRequest, LlmError};
use tokio::sync::Mutex;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::chat::locks::SessionLocks;
use crate::chat::prompt::build_prompt;
use crate::chat::repository::SessionStore;
use crate::llm::provider::LlmProvider;

/// Runtime knobs for `ChatService`, usually derived from `AppConfig`.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub persistence: PersistencePolicy,
    pub prompt: PromptPolicy,
    pub recency_window: TimeDelta,
    pub store_timeout: Duration,
    pub llm_timeout: Duration,
    /// Empty means "use the provider's configured model".
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Configured listing window; non-positive values fall back to the default.
fn settings_window(days: i64) -> TimeDelta {
    recency_window(days).unwrap_or_else(|| {
        warn!(days, "recency_window_days must be positive, using {DEFAULT_RECENCY_WINDOW_DAYS}");
        TimeDelta::days(DEFAULT_RECENCY_WINDOW_DAYS)
    })
}

impl ChatSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            persistence: config.chat.persistence,
            prompt: config.chat.prompt_policy(),
            recency_window: settings_window(config.chat.recency_window_days),
            store_timeout: Duration::from_secs(config.store.timeout_secs),
            llm_timeout: Duration::from_secs(config.llm.timeout_secs),
            model: config.llm.model.clone(),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        }
    }
}

/// Result of one successful exchange.
#[derive(Debug)]
pub struct TurnOutcome {
    /// The assistant reply exactly as returned by the model.
    pub reply: String,
    /// Language the turns were wrapped with.
    pub language: String,
    /// Persistence failures absorbed under `PersistencePolicy::BestEffort`.
    /// When non-empty the store may be missing part of this exchange.
    pub warnings: Vec<ChatError>,
}

/// Orchestrates session lifecycle and conversational turns.
///
/// Generic over `SessionStore` and `LlmProvider` so polybot-core never
/// depends on polybot-infra; the binary pins both to boxed backends.
pub struct ChatService<S: SessionStore, P: LlmProvider> {
    store: S,
    provider: P,
    settings: ChatSettings,
    locks: SessionLocks,
    /// Serializes the count-then-delete sequence of `delete_session`.
    delete_guard: Mutex<()>,
}

impl<S: SessionStore, P: LlmProvider> ChatService<S, P> {
    pub fn new(store: S, provider: P, settings: ChatSettings) -> Self {
        Self {
            store,
            provider,
            settings,
            locks: SessionLocks::new(),
            delete_guard: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    // --- Session lifecycle ---

    /// Start a new chat under a freshly generated identifier.
    pub async fn create_session(&self, name: Option<String>) -> Result<Session, ChatError> {
        let id = SessionId::generate();
        let mut session = self.with_store_timeout("create session", self.store.get_or_create(&id)).await?;

        if let Some(name) = name {
            session.name = Some(name);
            self.with_store_timeout("save session", self.store.save_session(&session)).await?;
        }

        info!(session_id = %session.id, "Session created");
        Ok(session)
    }

    /// Return the session, creating it with the default language if absent.
    pub async fn get_or_create(&self, session_id: &SessionId) -> Result<Session, ChatError> {
        self.with_store_timeout("get or create session", self.store.get_or_create(session_id))
            .await
    }

    pub async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, ChatError> {
        self.with_store_timeout("get session", self.store.get_session(session_id)).await
    }

    /// The most recently accessed session in the listing window, or a new
    /// one when the window is empty. Keeps at least one session in rotation.
    pub async fn ensure_session(&self) -> Result<Session, ChatError> {
        let recent = self.list_sessions().await?;
        match recent.first() {
            Some(summary) => self.get_or_create(&summary.id).await,
            None => self.create_session(None).await,
        }
    }

    /// Set the language preference; any string is accepted.
    pub async fn set_language(&self, session_id: &SessionId, language: &str) -> Result<Session, ChatError> {
        let session = self
            .with_store_timeout("set language", self.store.set_language(session_id, language))
            .await?;
        debug!(session_id = %session_id, language, "Session language updated");
        Ok(session)
    }

    /// Set the display name, creating the session if absent.
    pub async fn rename_session(&self, session_id: &SessionId, name: &str) -> Result<Session, ChatError> {
        let _guard = self.locks.acquire(session_id).await;
        let mut session = self.get_or_create(session_id).await?;
        session.name = Some(name.to_string());
        self.with_store_timeout("save session", self.store.save_session(&session)).await?;
        info!(session_id = %session_id, "Session renamed");
        Ok(session)
    }

    /// Sessions accessed within the configured recency window.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ChatError> {
        self.list_sessions_within(self.settings.recency_window).await
    }

    pub async fn list_sessions_within(&self, window: TimeDelta) -> Result<Vec<SessionSummary>, ChatError> {
        self.with_store_timeout("list sessions", self.store.list_sessions(window)).await
    }

    pub async fn count_sessions(&self) -> Result<u64, ChatError> {
        self.with_store_timeout("count sessions", self.store.count_sessions()).await
    }

    /// Delete a session and its transcript.
    ///
    /// Refused with `ChatError::InvariantViolation` when it is the only
    /// remaining session; nothing is changed in that case.
    pub async fn delete_session(&self, session_id: &SessionId) -> Result<(), ChatError> {
        let _delete_guard = self.delete_guard.lock().await;
        let session_guard = self.locks.acquire(session_id).await;

        if self.get_session(session_id).await?.is_none() {
            return Err(ChatError::Persistence(RepositoryError::NotFound));
        }

        let remaining = self.count_sessions().await?;
        if remaining <= 1 {
            warn!(session_id = %session_id, "Refusing to delete the last session");
            return Err(ChatError::InvariantViolation(
                "cannot delete the last remaining session".to_string(),
            ));
        }

        self.with_store_timeout("delete session", self.store.delete_session(session_id))
            .await?;
        drop(session_guard);
        self.locks.forget(session_id);
        info!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    // --- Transcript ---

    /// Append turns tagged with `role`, in the given order.
    ///
    /// Each turn records the session's language at the time of writing.
    pub async fn append_turns(
        &self,
        session_id: &SessionId,
        role: TurnRole,
        contents: &[String],
    ) -> Result<Vec<Turn>, ChatError> {
        let _guard = self.locks.acquire(session_id).await;
        let session = self.get_or_create(session_id).await?;
        let turns: Vec<Turn> = contents
            .iter()
            .map(|c| Turn::new(session_id.clone(), role, c.clone(), Some(session.language.clone())))
            .collect();
        self.with_store_timeout("append turns", self.store.append_turns(&turns)).await?;
        Ok(turns)
    }

    pub async fn get_transcript(&self, session_id: &SessionId) -> Result<Vec<Turn>, ChatError> {
        self.with_store_timeout("get transcript", self.store.get_transcript(session_id)).await
    }

    // --- Turn processing ---

    /// Run one exchange against the model.
    ///
    /// 1. An override language becomes the session language; otherwise the
    ///    stored one is used (`"English"` for a new session).
    /// 2. The user turns are persisted in order.
    /// 3. The whole transcript plus the new turns is wrapped per the prompt
    ///    policy and sent to the model once.
    /// 4. The reply is persisted and returned.
    ///
    /// Store failures follow the persistence policy. Model failures and
    /// timeouts always abort; any user turns already persisted stay in the
    /// transcript without a reply.
    pub async fn process_turn(
        &self,
        session_id: &SessionId,
        user_turns: &[String],
        language_override: Option<&str>,
    ) -> Result<TurnOutcome, ChatError> {
        if user_turns.is_empty() {
            return Err(ChatError::InvariantViolation(
                "an exchange needs at least one user turn".to_string(),
            ));
        }

        let span = info_span!("process_turn", session_id = %session_id, turns = user_turns.len());
        async {
            let _guard = self.locks.acquire(session_id).await;
            let mut warnings = Vec::new();

            let language = match language_override {
                Some(language) => {
                    let result = self
                        .with_store_timeout("set language", self.store.set_language(session_id, language))
                        .await;
                    self.absorb(result, &mut warnings)?;
                    language.to_string()
                }
                None => {
                    let result = self.get_or_create(session_id).await;
                    self.absorb(result, &mut warnings)?
                        .map(|s| s.language)
                        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
                }
            };

            let history = self.get_transcript(session_id).await;
            let mut transcript = self.absorb(history, &mut warnings)?.unwrap_or_default();

            let new_turns: Vec<Turn> = user_turns
                .iter()
                .map(|t| Turn::new(session_id.clone(), TurnRole::User, t.clone(), Some(language.clone())))
                .collect();
            let written = self
                .with_store_timeout("append user turns", self.store.append_turns(&new_turns))
                .await;
            self.absorb(written, &mut warnings)?;
            transcript.extend(new_turns);

            let request = CompletionRequest {
                model: self.settings.model.clone(),
                messages: build_prompt(&transcript, &language, self.settings.prompt),
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            };
            debug!(messages = request.messages.len(), language = %language, "Invoking model");

            let response = bounded(
                "model invocation",
                self.settings.llm_timeout,
                self.provider.complete(&request),
            )
            .await?;
            if response.content.trim().is_empty() {
                return Err(ChatError::Inference(LlmError::EmptyResponse));
            }

            let reply = Turn::new(
                session_id.clone(),
                TurnRole::Assistant,
                response.content.clone(),
                Some(language.clone()),
            );
            let written = self
                .with_store_timeout("append assistant turn", self.store.append_turns(slice::from_ref(&reply)))
                .await;
            self.absorb(written, &mut warnings)?;

            info!(
                model = %response.model,
                output_tokens = response.usage.output_tokens,
                warnings = warnings.len(),
                "Turn processed"
            );

            Ok(TurnOutcome {
                reply: response.content,
                language,
                warnings,
            })
        }
        .instrument(span)
        .await
    }

    // --- Helpers ---

    async fn with_store_timeout<T, E, F>(&self, operation: &str, fut: F) -> Result<T, ChatError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<ChatError>,
    {
        bounded(operation, self.settings.store_timeout, fut).await
    }

    /// Apply the persistence policy to a store result.
    ///
    /// Under `BestEffort`, persistence failures and store timeouts are logged,
    /// recorded in `warnings`, and turned into `Ok(None)`. Everything else
    /// (and everything under `Strict`) is returned as an error.
    fn absorb<T>(
        &self,
        result: Result<T, ChatError>,
        warnings: &mut Vec<ChatError>,
    ) -> Result<Option<T>, ChatError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err @ (ChatError::Persistence(_) | ChatError::Timeout { .. }))
                if self.settings.persistence == PersistencePolicy::BestEffort =>
            {
                warn!(error = %err, "Continuing without durable write");
                warnings.push(err);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// Await `fut` for at most `limit`, mapping expiry to `ChatError::Timeout`.
async fn bounded<T, E, F>(operation: &str, limit: Duration, fut: F) -> Result<T, ChatError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ChatError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ChatError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use polybot_types::config::{ReplayLanguage, ReplayRoles};
    use polybot_types::llm::{CompletionResponse, Message, MessageRole, StopReason, Usage};

    use crate::chat::memory_store::InMemorySessionStore;

    // --- Mocks ---

    /// Replies "reply N" and records every request it receives.
    #[derive(Default)]
    struct RecordingProvider {
        calls: AtomicUsize,
        requests: std::sync::Mutex<Vec<Vec<Message>>>,
        delay: Option<Duration>,
        fail: bool,
    }

    impl RecordingProvider {
        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn last_request(&self) -> Vec<Message> {
            self.requests.lock().unwrap().last().cloned().unwrap_or_default()
        }
    }

    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(LlmError::Provider {
                    message: "upstream 500".into(),
                });
            }
            self.requests.lock().unwrap().push(request.messages.clone());
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CompletionResponse {
                id: format!("resp-{n}"),
                content: format!("reply {n}"),
                model: "mock-model".into(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            })
        }
    }

    /// Wraps the in-memory store and fails every `append_turns` while `broken`.
    /// `delete_delay` stretches `delete_session` to widen race windows.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemorySessionStore,
        broken: AtomicBool,
        delete_delay: Option<Duration>,
    }

    impl SessionStore for FlakyStore {
        async fn get_or_create(&self, session_id: &SessionId) -> Result<Session, RepositoryError> {
            self.inner.get_or_create(session_id).await
        }

        async fn get_session(&self, session_id: &SessionId) -> Result<Option<Session>, RepositoryError> {
            self.inner.get_session(session_id).await
        }

        async fn save_session(&self, session: &Session) -> Result<(), RepositoryError> {
            self.inner.save_session(session).await
        }

        async fn set_language(&self, session_id: &SessionId, language: &str) -> Result<Session, RepositoryError> {
            self.inner.set_language(session_id, language).await
        }

        async fn append_turns(&self, turns: &[Turn]) -> Result<(), RepositoryError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(RepositoryError::Connection("store unreachable".into()));
            }
            self.inner.append_turns(turns).await
        }

        async fn get_transcript(&self, session_id: &SessionId) -> Result<Vec<Turn>, RepositoryError> {
            self.inner.get_transcript(session_id).await
        }

        async fn list_sessions(&self, window: TimeDelta) -> Result<Vec<SessionSummary>, RepositoryError> {
            self.inner.list_sessions(window).await
        }

        async fn delete_session(&self, session_id: &SessionId) -> Result<(), RepositoryError> {
            if let Some(delay) = self.delete_delay {
                tokio::time::sleep(delay).await;
            }
            self.inner.delete_session(session_id).await
        }

        async fn count_sessions(&self) -> Result<u64, RepositoryError> {
            self.inner.count_sessions().await
        }
    }

    fn service() -> ChatService<InMemorySessionStore, RecordingProvider> {
        ChatService::new(
            InMemorySessionStore::new(),
            RecordingProvider::default(),
            ChatSettings::default(),
        )
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn roles_and_contents(turns: &[Turn]) -> Vec<(TurnRole, String)> {
        turns.iter().map(|t| (t.role, t.content.clone())).collect()
    }

    // --- Sessions ---

    #[tokio::test]
    async fn test_create_session_with_name() {
        let svc = service();
        let session = svc.create_session(Some("Trip planning".into())).await.unwrap();
        assert_eq!(session.name.as_deref(), Some("Trip planning"));
        assert_eq!(session.language, "English");

        let stored = svc.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.name.as_deref(), Some("Trip planning"));
    }

    #[tokio::test]
    async fn test_ensure_session_creates_one_when_empty() {
        let svc = service();
        let first = svc.ensure_session().await.unwrap();
        let second = svc.ensure_session().await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(svc.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rename_session() {
        let svc = service();
        let id = SessionId::from("r");
        svc.rename_session(&id, "Renamed").await.unwrap();
        let session = svc.get_session(&id).await.unwrap().unwrap();
        assert_eq!(session.display_name(), "Renamed");
    }

    #[tokio::test]
    async fn test_delete_last_session_is_rejected() {
        let svc = service();
        let id = SessionId::from("only");
        svc.get_or_create(&id).await.unwrap();

        let result = svc.delete_session(&id).await;
        assert!(matches!(result, Err(ChatError::InvariantViolation(_))));
        assert_eq!(svc.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_session_cascades() {
        let svc = service();
        let keep = SessionId::from("keep");
        let drop_me = SessionId::from("drop");
        svc.get_or_create(&keep).await.unwrap();
        svc.process_turn(&drop_me, &texts(&["hello"]), None).await.unwrap();

        svc.delete_session(&drop_me).await.unwrap();
        assert!(svc.get_transcript(&drop_me).await.unwrap().is_empty());
        assert_eq!(svc.count_sessions().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_session_is_not_found() {
        let svc = service();
        svc.get_or_create(&SessionId::from("a")).await.unwrap();
        svc.get_or_create(&SessionId::from("b")).await.unwrap();
        let result = svc.delete_session(&SessionId::from("nope")).await;
        assert!(matches!(result, Err(ChatError::Persistence(RepositoryError::NotFound))));
    }

    #[tokio::test]
    async fn test_append_turns_records_language() {
        let svc = service();
        let id = SessionId::from("a");
        svc.set_language(&id, "Japanese").await.unwrap();
        let turns = svc
            .append_turns(&id, TurnRole::User, &texts(&["first", "second"]))
            .await
            .unwrap();
        assert_eq!(turns.len(), 2);
        let stored = svc.get_transcript(&id).await.unwrap();
        assert_eq!(stored[1].content, "second");
        assert_eq!(stored[0].language.as_deref(), Some("Japanese"));
    }

    // --- process_turn ---

    #[tokio::test]
    async fn test_process_turn_appends_user_then_assistant() {
        let svc = service();
        let id = SessionId::from("a");

        let outcome = svc.process_turn(&id, &texts(&["hello"]), None).await.unwrap();
        assert_eq!(outcome.reply, "reply 1");
        assert_eq!(outcome.language, "English");
        assert!(outcome.warnings.is_empty());

        let transcript = svc.get_transcript(&id).await.unwrap();
        assert_eq!(
            roles_and_contents(&transcript),
            vec![
                (TurnRole::User, "hello".to_string()),
                (TurnRole::Assistant, "reply 1".to_string()),
            ]
        );
        assert_eq!(
            svc.provider().last_request(),
            vec![Message::user("Respond in English: hello")]
        );
    }

    #[tokio::test]
    async fn test_process_turn_replays_full_history() {
        let svc = service();
        let id = SessionId::from("a");
        svc.process_turn(&id, &texts(&["one"]), None).await.unwrap();
        svc.process_turn(&id, &texts(&["two", "three"]), None).await.unwrap();

        let sent: Vec<String> = svc.provider().last_request().into_iter().map(|m| m.content).collect();
        assert_eq!(
            sent,
            vec![
                "Respond in English: one",
                "Respond in English: reply 1",
                "Respond in English: two",
                "Respond in English: three",
            ]
        );
        assert_eq!(svc.get_transcript(&id).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_language_override_rewraps_earlier_turns() {
        let svc = service();
        let id = SessionId::from("a");
        svc.process_turn(&id, &texts(&["hello"]), None).await.unwrap();
        svc.process_turn(&id, &texts(&["bonjour"]), Some("French")).await.unwrap();

        let sent = svc.provider().last_request();
        assert!(sent.iter().all(|m| m.role == MessageRole::User));
        assert!(sent.iter().all(|m| m.content.starts_with("Respond in French: ")));
        assert_eq!(svc.get_session(&id).await.unwrap().unwrap().language, "French");
    }

    #[tokio::test]
    async fn test_language_change_with_per_turn_policy() {
        let settings = ChatSettings {
            prompt: PromptPolicy {
                language: ReplayLanguage::PerTurn,
                roles: ReplayRoles::Preserve,
            },
            ..ChatSettings::default()
        };
        let svc = ChatService::new(InMemorySessionStore::new(), RecordingProvider::default(), settings);
        let id = SessionId::from("a");
        svc.process_turn(&id, &texts(&["hello"]), None).await.unwrap();
        svc.process_turn(&id, &texts(&["bonjour"]), Some("French")).await.unwrap();

        assert_eq!(
            svc.provider().last_request(),
            vec![
                Message::user("Respond in English: hello"),
                Message::assistant("reply 1"),
                Message::user("Respond in French: bonjour"),
            ]
        );
    }

    #[tokio::test]
    async fn test_stored_user_text_is_unwrapped() {
        let svc = service();
        let id = SessionId::from("a");
        svc.process_turn(&id, &texts(&["What is 2+2?"]), Some("French")).await.unwrap();
        let transcript = svc.get_transcript(&id).await.unwrap();
        assert_eq!(transcript[0].content, "What is 2+2?");
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let svc = service();
        let result = svc.process_turn(&SessionId::from("a"), &[], None).await;
        assert!(matches!(result, Err(ChatError::InvariantViolation(_))));
        assert_eq!(svc.count_sessions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inference_failure_leaves_dangling_user_turn() {
        let svc = ChatService::new(
            InMemorySessionStore::new(),
            RecordingProvider::failing(),
            ChatSettings::default(),
        );
        let id = SessionId::from("a");
        let result = svc.process_turn(&id, &texts(&["hello"]), None).await;
        assert!(matches!(result, Err(ChatError::Inference(LlmError::Provider { .. }))));

        let transcript = svc.get_transcript(&id).await.unwrap();
        assert_eq!(roles_and_contents(&transcript), vec![(TurnRole::User, "hello".to_string())]);
    }

    #[tokio::test]
    async fn test_model_timeout_is_retryable() {
        let settings = ChatSettings {
            llm_timeout: Duration::from_millis(20),
            ..ChatSettings::default()
        };
        let svc = ChatService::new(
            InMemorySessionStore::new(),
            RecordingProvider::slow(Duration::from_millis(500)),
            settings,
        );
        let err = svc
            .process_turn(&SessionId::from("a"), &texts(&["hello"]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Timeout { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_best_effort_persistence_reports_warnings() {
        let store = FlakyStore::default();
        store.broken.store(true, Ordering::SeqCst);
        let svc = ChatService::new(store, RecordingProvider::default(), ChatSettings::default());
        let id = SessionId::from("a");

        let outcome = svc.process_turn(&id, &texts(&["hello"]), None).await.unwrap();
        assert_eq!(outcome.reply, "reply 1");
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings.iter().all(|w| matches!(w, ChatError::Persistence(_))));
        // The model still saw the new turn even though it was never stored.
        assert_eq!(
            svc.provider().last_request(),
            vec![Message::user("Respond in English: hello")]
        );
        assert!(svc.get_transcript(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_strict_persistence_aborts_before_model_call() {
        let store = FlakyStore::default();
        store.broken.store(true, Ordering::SeqCst);
        let settings = ChatSettings {
            persistence: PersistencePolicy::Strict,
            ..ChatSettings::default()
        };
        let svc = ChatService::new(store, RecordingProvider::default(), settings);

        let result = svc.process_turn(&SessionId::from("a"), &texts(&["hello"]), None).await;
        assert!(matches!(result, Err(ChatError::Persistence(RepositoryError::Connection(_)))));
        assert_eq!(svc.provider().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_turns_on_one_session_do_not_interleave() {
        let svc = Arc::new(ChatService::new(
            InMemorySessionStore::new(),
            RecordingProvider::slow(Duration::from_millis(30)),
            ChatSettings::default(),
        ));
        let id = SessionId::from("shared");

        let mut handles = Vec::new();
        for i in 0..4 {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                svc.process_turn(&id, &[format!("message {i}")], None).await.map(|o| o.reply)
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let transcript = svc.get_transcript(&id).await.unwrap();
        assert_eq!(transcript.len(), 8);
        for pair in transcript.chunks(2) {
            assert_eq!(pair[0].role, TurnRole::User);
            assert_eq!(pair[1].role, TurnRole::Assistant);
        }
    }

    #[tokio::test]
    async fn test_turns_queued_behind_delete_stay_serialized() {
        let store = FlakyStore {
            delete_delay: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        let svc = Arc::new(ChatService::new(
            store,
            RecordingProvider::slow(Duration::from_millis(150)),
            ChatSettings::default(),
        ));
        let id = SessionId::from("doomed");
        svc.get_or_create(&SessionId::from("keeper")).await.unwrap();
        svc.get_or_create(&id).await.unwrap();

        let delete = {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            tokio::spawn(async move { svc.delete_session(&id).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Queued on the session lock while the delete is in flight.
        let first = {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            tokio::spawn(async move { svc.process_turn(&id, &texts(&["a"]), None).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        delete.await.unwrap().unwrap();

        // Arrives after the delete returned, while "a" is still with the model.
        let second = {
            let svc = Arc::clone(&svc);
            let id = id.clone();
            tokio::spawn(async move { svc.process_turn(&id, &texts(&["b"]), None).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let transcript = svc.get_transcript(&id).await.unwrap();
        assert_eq!(transcript.len(), 4);
        for pair in transcript.chunks(2) {
            assert_eq!(pair[0].role, TurnRole::User);
            assert_eq!(pair[1].role, TurnRole::Assistant);
        }
        assert_eq!(transcript[0].content, "a");
        assert_eq!(transcript[2].content, "b");
    }

    #[tokio::test]
    async fn test_out_of_range_recency_window_does_not_panic() {
        let mut config = AppConfig::default();
        config.chat.recency_window_days = 200_000_000;
        let svc = ChatService::new(
            InMemorySessionStore::new(),
            RecordingProvider::default(),
            ChatSettings::from_config(&config),
        );
        svc.get_or_create(&SessionId::from("a")).await.unwrap();

        assert_eq!(svc.list_sessions().await.unwrap().len(), 1);
        assert_eq!(svc.ensure_session().await.unwrap().id.as_str(), "a");
        assert_eq!(
            svc.list_sessions_within(TimeDelta::days(200_000_000)).await.unwrap().len(),
            1
        );
    }

    #[test]
    fn test_non_positive_recency_window_falls_back_to_default() {
        let mut config = AppConfig::default();
        config.chat.recency_window_days = 0;
        assert_eq!(ChatSettings::from_config(&config).recency_window, TimeDelta::days(7));

        config.chat.recency_window_days = i64::MAX;
        assert_eq!(ChatSettings::from_config(&config).recency_window, TimeDelta::MAX);
    }
}
