//! End-to-end chat flows against the in-memory store and a scripted model.

use std::sync::Mutex;

use polybot_core::chat::memory_store::InMemorySessionStore;
use polybot_core::chat::service::{ChatService, ChatSettings};
use polybot_core::llm::box_provider::BoxLlmProvider;
use polybot_core::llm::provider::LlmProvider;
use polybot_types::chat::{SessionId, TurnRole};
use polybot_types::error::ChatError;
use polybot_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, Message, StopReason, Usage,
};

/// Returns canned replies in order and keeps every prompt it was sent.
struct ScriptedModel {
    replies: Mutex<Vec<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl LlmProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.prompts.lock().unwrap().push(request.messages.clone());
        let content = self
            .replies
            .lock()
            .unwrap()
            .pop()
            .ok_or(LlmError::EmptyResponse)?;
        Ok(CompletionResponse {
            id: "scripted".into(),
            content,
            model: "scripted-1".into(),
            stop_reason: StopReason::EndTurn,
            usage: Usage::default(),
        })
    }
}

fn one(text: &str) -> Vec<String> {
    vec![text.to_string()]
}

#[tokio::test]
async fn french_question_is_wrapped_but_stored_verbatim() {
    let svc = ChatService::new(
        InMemorySessionStore::new(),
        ScriptedModel::new(&["4"]),
        ChatSettings::default(),
    );
    let id = SessionId::from("s1");

    let outcome = svc
        .process_turn(&id, &one("What is 2+2?"), Some("French"))
        .await
        .unwrap();
    assert_eq!(outcome.reply, "4");
    assert_eq!(outcome.language, "French");

    let prompts = svc.provider().prompts.lock().unwrap().clone();
    assert_eq!(prompts, vec![vec![Message::user("Respond in French: What is 2+2?")]]);

    let transcript = svc.get_transcript(&id).await.unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, TurnRole::User);
    assert_eq!(transcript[0].content, "What is 2+2?");
    assert_eq!(transcript[1].role, TurnRole::Assistant);
    assert_eq!(transcript[1].content, "4");
}

#[tokio::test]
async fn changing_language_rewraps_the_whole_history() {
    let svc = ChatService::new(
        InMemorySessionStore::new(),
        ScriptedModel::new(&["Hi!", "Hallo!"]),
        ChatSettings::default(),
    );
    let id = SessionId::from("s1");

    svc.process_turn(&id, &one("Hello"), None).await.unwrap();
    svc.process_turn(&id, &one("And now?"), Some("German")).await.unwrap();

    let prompts = svc.provider().prompts.lock().unwrap().clone();
    let second: Vec<&str> = prompts[1].iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        second,
        vec![
            "Respond in German: Hello",
            "Respond in German: Hi!",
            "Respond in German: And now?",
        ]
    );
}

#[tokio::test]
async fn sessions_are_isolated() {
    let svc = ChatService::new(
        InMemorySessionStore::new(),
        ScriptedModel::new(&["a-reply", "b-reply"]),
        ChatSettings::default(),
    );
    let a = SessionId::from("a");
    let b = SessionId::from("b");

    svc.process_turn(&a, &one("for a"), Some("Spanish")).await.unwrap();
    svc.process_turn(&b, &one("for b"), None).await.unwrap();

    let prompts = svc.provider().prompts.lock().unwrap().clone();
    assert_eq!(prompts[1], vec![Message::user("Respond in English: for b")]);
    assert_eq!(svc.get_session(&a).await.unwrap().unwrap().language, "Spanish");
    assert_eq!(svc.get_session(&b).await.unwrap().unwrap().language, "English");
}

#[tokio::test]
async fn delete_keeps_at_least_one_session() {
    let svc = ChatService::new(
        InMemorySessionStore::new(),
        BoxLlmProvider::new(ScriptedModel::new(&["one", "two"])),
        ChatSettings::default(),
    );
    let first = svc.create_session(None).await.unwrap();
    let second = svc.create_session(Some("scratch".into())).await.unwrap();
    svc.process_turn(&second.id, &one("hi"), None).await.unwrap();

    assert_eq!(svc.list_sessions().await.unwrap().len(), 2);

    svc.delete_session(&second.id).await.unwrap();
    assert!(svc.get_transcript(&second.id).await.unwrap().is_empty());

    let refused = svc.delete_session(&first.id).await;
    assert!(matches!(refused, Err(ChatError::InvariantViolation(_))));
    assert!(svc.get_session(&first.id).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_session_is_created_on_first_turn() {
    let svc = ChatService::new(
        InMemorySessionStore::new(),
        ScriptedModel::new(&["welcome"]),
        ChatSettings::default(),
    );
    let id = SessionId::from("brand-new");
    assert!(svc.get_session(&id).await.unwrap().is_none());

    svc.process_turn(&id, &one("hello"), None).await.unwrap();

    let listed = svc.list_sessions().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, id);
}
