use super::*;
use super::state::{Phase, Role};
use crate::state::test_helpers::{MockChat, MockTickets, reply};

fn settings(mode: ResponseMode) -> ConsoleSettings {
    ConsoleSettings { response_mode: mode, user_id: "agent-7".into(), record_workflow_steps: false }
}

fn console_with(chat: &Arc<MockChat>, tickets: &Arc<MockTickets>, mode: ResponseMode) -> Arc<Console> {
    Arc::new(Console::new(chat.clone(), tickets.clone(), settings(mode)))
}

fn setup() -> (Arc<Console>, Arc<MockChat>, Arc<MockTickets>) {
    let chat = Arc::new(MockChat::new());
    let tickets = Arc::new(MockTickets::default());
    (console_with(&chat, &tickets, ResponseMode::Blocking), chat, tickets)
}

fn fragment(text: &str) -> Result<StreamEvent, ChatError> {
    Ok(StreamEvent::Fragment { text: text.into(), conversation_id: Some("c-stream".into()) })
}

// =========================================================================
// send_message
// =========================================================================

#[tokio::test]
async fn first_send_adopts_conversation_and_inserts_ticket() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Ok(reply("您好，请问有什么可以帮您？", "c1", &[("language", "en")])));

    let outcome = console.send_message("Hello, I need help").await.unwrap();
    assert_eq!(outcome, Outcome::Completed);

    let calls = chat.calls();
    assert_eq!(calls, [("【工单】Hello, I need help".to_string(), None)]);

    let state = console.snapshot();
    assert_eq!(state.phase, Phase::Active);
    assert_eq!(state.conversation_id.as_deref(), Some("c1"));
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].content, "您好，请问有什么可以帮您？");
    assert_eq!(state.messages[1].variables["language"], "en");
    assert_eq!(state.detected_language.as_deref(), Some("en"));

    let inserted = tickets.inserted();
    assert_eq!(inserted.len(), 1);
    let ticket = &inserted[0];
    assert!(ticket.workflow_id.starts_with("wf_"));
    assert_eq!(ticket.conversation_id, "c1");
    assert_eq!(ticket.original_content, "Hello, I need help");
    assert_eq!(ticket.translated_content, "您好，请问有什么可以帮您？");
    assert_eq!(ticket.language, "en");
    assert_eq!(ticket.user_id, "agent-7");

    let summary = state.ticket.unwrap();
    assert_eq!(summary.workflow_id.as_deref(), Some(ticket.workflow_id.as_str()));
    assert_eq!(summary.original_content, "Hello, I need help");
}

#[tokio::test]
async fn later_sends_reuse_conversation_and_never_insert_again() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Ok(reply("a1", "c1", &[])));
    chat.push_reply(Ok(reply("a2", "c1", &[])));
    chat.push_reply(Ok(reply("a3", "c1", &[])));

    for text in ["q1", "q2", "q3"] {
        console.send_message(text).await.unwrap();
    }

    let calls = chat.calls();
    assert_eq!(calls[0].1, None);
    assert_eq!(calls[1].1.as_deref(), Some("c1"));
    assert_eq!(calls[2].1.as_deref(), Some("c1"));
    assert_eq!(tickets.inserted().len(), 1);
    assert_eq!(tickets.lookups(), 1);

    let state = console.snapshot();
    let steps: Vec<usize> = state.messages.iter().map(|m| m.step_number).collect();
    assert_eq!(steps, [0, 0, 1, 1, 2, 2]);
}

#[tokio::test]
async fn existing_ticket_is_adopted_without_insert() {
    let (console, chat, tickets) = setup();
    tickets.seed(Ticket {
        workflow_id: "wf_seed".into(),
        conversation_id: "c1".into(),
        original_content: "Bonjour".into(),
        translated_content: "你好".into(),
        language: "fr".into(),
        user_id: "someone".into(),
    });
    chat.push_reply(Ok(reply("answer", "c1", &[("language", "en")])));

    console.send_message("Bonjour").await.unwrap();

    assert!(tickets.inserted().is_empty());
    let state = console.snapshot();
    let summary = state.ticket.unwrap();
    assert_eq!(summary.workflow_id.as_deref(), Some("wf_seed"));
    assert_eq!(summary.translated_content, "你好");
    assert_eq!(state.detected_language.as_deref(), Some("fr"));
    assert_eq!(state.translation_panel.source_language, "fr");
}

#[tokio::test]
async fn missing_language_falls_back_to_unknown() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Ok(reply("answer", "c1", &[])));
    console.send_message("hi").await.unwrap();
    assert_eq!(tickets.inserted()[0].language, "unknown");
    assert_eq!(console.snapshot().detected_language, None);
}

#[tokio::test]
async fn detected_language_variable_is_accepted() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Ok(reply("answer", "c1", &[("detected_language", "ja")])));
    console.send_message("こんにちは").await.unwrap();
    assert_eq!(tickets.inserted()[0].language, "ja");
}

#[tokio::test]
async fn failed_send_removes_placeholder_and_creates_no_ticket() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Err(ChatError::ApiResponse { status: 502, body: "bad gateway".into() }));

    let outcome = console.send_message("hello").await.unwrap();
    assert_eq!(outcome, Outcome::Failed);

    let state = console.snapshot();
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.messages[0].role, Role::User);
    assert!(state.messages.iter().all(|m| !m.is_loading));
    assert_eq!(state.conversation_id, None);
    assert_eq!(state.notice.as_deref(), Some(state::SEND_FAILED_NOTICE));
    assert_eq!(state.ticket, None);
    assert!(tickets.inserted().is_empty());
    assert_eq!(tickets.lookups(), 0);
}

#[tokio::test]
async fn send_after_failed_first_exchange_bootstraps_ticket() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Err(ChatError::ApiRequest("connection refused".into())));
    chat.push_reply(Ok(reply("answer", "c1", &[])));

    console.send_message("first").await.unwrap();
    console.send_message("second").await.unwrap();

    let inserted = tickets.inserted();
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].original_content, "second");
}

#[tokio::test]
async fn blank_text_is_rejected_without_touching_log() {
    let (console, chat, _) = setup();
    let err = console.send_message("   ").await.unwrap_err();
    assert!(matches!(err, ConsoleError::EmptyMessage));
    assert!(console.snapshot().messages.is_empty());
    assert!(chat.calls().is_empty());
}

#[tokio::test]
async fn ticket_store_outage_does_not_block_conversation() {
    let (console, chat, tickets) = setup();
    tickets.fail_all();
    chat.push_reply(Ok(reply("answer", "c1", &[("language", "de")])));

    let outcome = console.send_message("Hallo").await.unwrap();
    assert_eq!(outcome, Outcome::Completed);

    let state = console.snapshot();
    assert_eq!(state.conversation_id.as_deref(), Some("c1"));
    let summary = state.ticket.unwrap();
    assert_eq!(summary.workflow_id, None);
    assert_eq!(summary.original_content, "Hallo");
    assert_eq!(state.detected_language.as_deref(), Some("de"));
}

#[tokio::test]
async fn workflow_steps_recorded_when_enabled() {
    let chat = Arc::new(MockChat::new());
    let tickets = Arc::new(MockTickets::default());
    let console = Console::new(
        chat.clone(),
        tickets.clone(),
        ConsoleSettings { record_workflow_steps: true, ..settings(ResponseMode::Blocking) },
    );
    chat.push_reply(Ok(reply("a1", "c1", &[])));
    chat.push_reply(Ok(reply("a2", "c1", &[])));

    console.send_message("q1").await.unwrap();
    console.send_message("q2").await.unwrap();

    let steps = tickets.steps();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].step_number, 0);
    assert_eq!(steps[1].step_number, 1);
    assert_eq!(steps[1].customer_message, "q2");
    assert_eq!(steps[1].ai_message, "a2");
    assert_eq!(steps[1].workflow_id, tickets.inserted()[0].workflow_id);
}

#[tokio::test]
async fn late_step_is_not_recorded_under_next_chats_ticket() {
    let chat = Arc::new(MockChat::new());
    let tickets = Arc::new(MockTickets::default());
    let console = Arc::new(Console::new(
        chat.clone(),
        tickets.clone(),
        ConsoleSettings { record_workflow_steps: true, ..settings(ResponseMode::Blocking) },
    ));
    chat.push_reply(Ok(reply("a1", "c1", &[])));
    chat.push_reply(Ok(reply("b1", "c2", &[])));
    let release = tickets.gate_lookup("c1");

    let task = tokio::spawn({
        let console = console.clone();
        async move { console.send_message("first chat").await }
    });
    tickets.wait_for_lookups(1).await;

    console.new_chat();
    console.send_message("second chat").await.unwrap();
    let second = console.snapshot().ticket.unwrap();

    release.send(()).unwrap();
    task.await.unwrap().unwrap();

    let steps = tickets.steps();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].conversation_id, "c2");
    assert_eq!(steps[0].workflow_id, second.workflow_id.unwrap());
    assert_eq!(console.snapshot().conversation_id.as_deref(), Some("c2"));
}

#[tokio::test]
async fn workflow_steps_off_by_default() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Ok(reply("a1", "c1", &[])));
    console.send_message("q1").await.unwrap();
    assert!(tickets.steps().is_empty());
}

// =========================================================================
// cancellation
// =========================================================================

#[tokio::test]
async fn new_chat_discards_late_reply() {
    let (console, chat, tickets) = setup();
    let release = chat.push_gated();

    let task = tokio::spawn({
        let console = console.clone();
        async move { console.send_message("slow").await }
    });
    chat.wait_for_calls(1).await;

    console.new_chat();
    release.send(Ok(reply("late", "c-late", &[]))).unwrap();

    assert_eq!(task.await.unwrap().unwrap(), Outcome::Superseded);
    let state = console.snapshot();
    assert!(state.messages.is_empty());
    assert_eq!(state.conversation_id, None);
    assert!(tickets.inserted().is_empty());
}

#[tokio::test]
async fn second_send_supersedes_first() {
    let (console, chat, tickets) = setup();
    let release_first = chat.push_gated();
    chat.push_reply(Ok(reply("fresh", "c2", &[])));

    let first = tokio::spawn({
        let console = console.clone();
        async move { console.send_message("one").await }
    });
    chat.wait_for_calls(1).await;

    assert_eq!(console.send_message("two").await.unwrap(), Outcome::Completed);
    release_first.send(Ok(reply("stale", "c1", &[]))).unwrap();
    assert_eq!(first.await.unwrap().unwrap(), Outcome::Superseded);

    let state = console.snapshot();
    assert_eq!(state.conversation_id.as_deref(), Some("c2"));
    let contents: Vec<&str> = state.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, ["one", "two", "fresh"]);
    assert_eq!(tickets.inserted().len(), 1);
    assert_eq!(tickets.inserted()[0].conversation_id, "c2");
}

#[tokio::test]
async fn new_chat_then_send_matches_fresh_session() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Ok(reply("a1", "c1", &[("language", "en")])));
    console.send_message("first conversation").await.unwrap();

    console.new_chat();
    let cleared = console.snapshot();
    assert!(cleared.messages.is_empty());
    assert_eq!(cleared.phase, Phase::Idle);
    assert_eq!(cleared.ticket, None);
    assert_eq!(cleared.detected_language, None);

    chat.push_reply(Ok(reply("b1", "c2", &[("language", "fr")])));
    console.send_message("second conversation").await.unwrap();

    let calls = chat.calls();
    assert_eq!(calls[1].1, None);
    let state = console.snapshot();
    assert_eq!(state.conversation_id.as_deref(), Some("c2"));
    assert_eq!(state.detected_language.as_deref(), Some("fr"));
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[0].step_number, 0);
    assert_eq!(tickets.inserted().len(), 2);
    assert_eq!(tickets.inserted()[1].original_content, "second conversation");
}

// =========================================================================
// streaming
// =========================================================================

#[tokio::test]
async fn streaming_accumulates_fragments() {
    let chat = Arc::new(MockChat::new());
    let tickets = Arc::new(MockTickets::default());
    let console = console_with(&chat, &tickets, ResponseMode::Streaming);
    chat.push_stream(vec![fragment("Hel"), fragment("lo"), Ok(StreamEvent::Other {
        event: "message_end".into(),
        conversation_id: Some("c-stream".into()),
    })]);

    let updates = console.subscribe();
    let outcome = console.send_message("hi").await.unwrap();
    assert_eq!(outcome, Outcome::Completed);
    assert!(updates.has_changed().unwrap());

    let state = console.snapshot();
    assert_eq!(state.messages[1].content, "Hello");
    assert!(!state.messages[1].is_loading);
    assert_eq!(state.conversation_id.as_deref(), Some("c-stream"));
    assert_eq!(tickets.inserted()[0].translated_content, "Hello");
}

#[tokio::test]
async fn streaming_error_removes_placeholder() {
    let chat = Arc::new(MockChat::new());
    let tickets = Arc::new(MockTickets::default());
    let console = console_with(&chat, &tickets, ResponseMode::Streaming);
    chat.push_stream(vec![fragment("partial"), Err(ChatError::Stream("upstream died".into()))]);

    assert_eq!(console.send_message("hi").await.unwrap(), Outcome::Failed);
    let state = console.snapshot();
    assert_eq!(state.messages.len(), 1);
    assert_eq!(state.conversation_id, None);
    assert!(tickets.inserted().is_empty());
}

#[tokio::test]
async fn streaming_publishes_each_fragment() {
    let chat = Arc::new(MockChat::new());
    let tickets = Arc::new(MockTickets::default());
    let console = console_with(&chat, &tickets, ResponseMode::Streaming);
    let feed = chat.push_stream_channel();
    let mut updates = console.subscribe();

    let task = tokio::spawn({
        let console = console.clone();
        async move { console.send_message("hi").await }
    });

    for (text, expected) in [("a", "a"), ("b", "ab"), ("c", "abc")] {
        feed.send(fragment(text)).unwrap();
        let state = updates
            .wait_for(|state| state.messages.last().is_some_and(|m| m.content == expected))
            .await
            .unwrap()
            .clone();
        let placeholder = &state.messages[1];
        assert!(placeholder.is_loading, "fragment {expected:?} published as finished");
        assert_eq!(state.phase, Phase::AwaitingFirstResponse);
    }

    drop(feed);
    assert_eq!(task.await.unwrap().unwrap(), Outcome::Completed);
    let state = console.snapshot();
    assert_eq!(state.messages[1].content, "abc");
    assert!(!state.messages[1].is_loading);
}

// =========================================================================
// translate_message
// =========================================================================

async fn answered_console() -> (Arc<Console>, Arc<MockChat>, Arc<MockTickets>) {
    let (console, chat, tickets) = setup();
    chat.push_reply(Ok(reply("How can I help?", "c1", &[])));
    console.send_message("hello").await.unwrap();
    (console, chat, tickets)
}

#[tokio::test]
async fn translation_attaches_to_target_message() {
    let (console, _, tickets) = answered_console().await;
    tickets.add_translation("c1", "How can I help?", "我能帮您什么？");

    assert_eq!(console.translate_message(1).await.unwrap(), Outcome::Completed);

    let state = console.snapshot();
    assert_eq!(state.messages.len(), 2);
    assert_eq!(state.messages[1].variables["translation"], "我能帮您什么？");
    assert_eq!(state.messages[1].content, "How can I help?");
}

#[tokio::test]
async fn missing_translation_shows_not_ready() {
    let (console, _, _) = answered_console().await;
    console.translate_message(0).await.unwrap();

    let state = console.snapshot();
    assert_eq!(state.messages.len(), 3);
    let placeholder = &state.messages[2];
    assert_eq!(placeholder.content, state::TRANSLATION_NOT_READY);
    assert!(!placeholder.is_loading);
    assert_eq!(placeholder.step_number, 0);
}

#[tokio::test]
async fn translation_lookup_failure_shows_failed_text() {
    let (console, _, tickets) = answered_console().await;
    tickets.fail_all();
    assert_eq!(console.translate_message(1).await.unwrap(), Outcome::Failed);
    let state = console.snapshot();
    assert_eq!(state.messages[2].content, state::TRANSLATION_FAILED);
}

#[tokio::test]
async fn translate_out_of_range_is_error() {
    let (console, _, _) = answered_console().await;
    let err = console.translate_message(5).await.unwrap_err();
    assert!(matches!(err, ConsoleError::NoSuchMessage { index: 5 }));
    assert_eq!(console.snapshot().messages.len(), 2);
}

#[tokio::test]
async fn translate_without_conversation_is_not_ready() {
    let (console, chat, tickets) = setup();
    chat.push_reply(Err(ChatError::ApiRequest("down".into())));
    console.send_message("hello").await.unwrap();

    console.translate_message(0).await.unwrap();
    let state = console.snapshot();
    assert_eq!(state.messages[1].content, state::TRANSLATION_NOT_READY);
    assert_eq!(tickets.translation_lookups(), 0);
}

// =========================================================================
// translation panel
// =========================================================================

#[tokio::test]
async fn panel_translates_within_main_conversation() {
    let (console, chat, _) = answered_console().await;
    chat.push_reply(Ok(reply("你好世界", "c1", &[])));

    console.translate_panel("hello world").await.unwrap();

    let calls = chat.calls();
    assert_eq!(calls[1], ("【翻译成中文】hello world".to_string(), Some("c1".to_string())));
    let panel = console.snapshot().translation_panel;
    assert_eq!(panel.source_text, "hello world");
    assert_eq!(panel.translated_text, "你好世界");
}

#[tokio::test]
async fn panel_uses_source_tag_after_swap_and_never_adopts_conversation() {
    let (console, chat, _) = setup();
    console.swap_panel();
    chat.push_reply(Ok(reply("hello", "panel-conv", &[])));

    console.translate_panel("你好").await.unwrap();

    assert_eq!(chat.calls()[0], ("【翻译成源语言】你好".to_string(), None));
    assert_eq!(console.snapshot().conversation_id, None);
}

#[tokio::test]
async fn panel_failure_is_reported() {
    let (console, chat, _) = setup();
    chat.push_reply(Err(ChatError::ApiResponse { status: 500, body: String::new() }));
    let err = console.translate_panel("hello").await.unwrap_err();
    assert!(matches!(err, ConsoleError::Chat(_)));
    assert!(err.retryable());
    assert_eq!(err.error_code(), "E_CHAT_RESPONSE");
}

#[tokio::test]
async fn new_chat_resets_panel_texts() {
    let (console, chat, _) = setup();
    chat.push_reply(Ok(reply("你好", "c1", &[])));
    console.translate_panel("hello").await.unwrap();
    console.new_chat();
    let panel = console.snapshot().translation_panel;
    assert!(panel.source_text.is_empty());
    assert!(panel.translated_text.is_empty());
}

#[test]
fn detected_language_prefers_language_key() {
    let vars = BTreeMap::from([
        ("detected_language".to_string(), "ja".to_string()),
        ("language".to_string(), " en ".to_string()),
    ]);
    assert_eq!(detected_language(&vars), Some("en"));
    assert_eq!(detected_language(&BTreeMap::new()), None);
}

#[test]
fn workflow_ids_are_prefixed_and_unique() {
    let a = new_workflow_id();
    let b = new_workflow_id();
    assert!(a.starts_with("wf_"));
    assert_eq!(a.len(), 35);
    assert_ne!(a, b);
}
