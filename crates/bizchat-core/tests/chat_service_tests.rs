use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bizchat_core::{
    ChatError, ChatService, FeedbackInput, IncomingMessage, ListQuery, ProfileInput, ReplySource,
    ServiceSettings,
};
use bizchat_db::{ConversationStatus, Database, MessageRole};
use bizchat_llm::{
    GeneratedText, GenerationError, GenerationRequest, GeneratorType, TextGenerator, GENERIC_REPLY,
};
use bizchat_logging::{LogFormat, Logger};

/// What the fake generator answers with.
#[derive(Clone, Copy)]
enum Script {
    Helpful,
    Generic,
    Failing,
}

struct FakeGenerator {
    script: Script,
    calls: AtomicUsize,
}

impl FakeGenerator {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    fn name(&self) -> &str {
        "fake"
    }

    fn generator_type(&self) -> GeneratorType {
        GeneratorType::Offline
    }

    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<GeneratedText, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Helpful => {
                // Give other turns a chance to interleave.
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(GeneratedText::new(
                    format!("We would love to help with that (#{}).", call),
                    Duration::from_millis(5),
                ))
            }
            Script::Generic => Ok(GeneratedText::new(GENERIC_REPLY, Duration::ZERO)),
            Script::Failing => Err(GenerationError::Http("connection refused".to_string())),
        }
    }
}

fn service_with(generator: Arc<FakeGenerator>) -> Arc<ChatService> {
    let db = Arc::new(Database::open_in_memory().unwrap());
    Arc::new(ChatService::new(
        db,
        generator,
        ServiceSettings::default(),
        Arc::new(Logger::new(LogFormat::Compact)),
    ))
}

fn salon_input() -> ProfileInput {
    serde_json::from_value(serde_json::json!({
        "businessName": "Shear Delight",
        "industry": "salon",
        "hours": "Tue-Sat 10am-7pm",
        "services": ["Haircuts", "Coloring", "Blowouts"]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_concurrent_messages_on_one_session_stay_ordered() {
    let service = service_with(FakeGenerator::new(Script::Helpful));
    let profile = service.create_profile("owner-1", salon_input()).unwrap();

    const TURNS: usize = 8;
    let mut handles = Vec::new();
    for i in 0..TURNS {
        let service = service.clone();
        let chatbot_id = profile.id.clone();
        handles.push(tokio::spawn(async move {
            service
                .process_message(
                    &chatbot_id,
                    IncomingMessage::new(format!("question {}", i)).with_session("shared"),
                )
                .await
        }));
    }
    for handle in handles {
        let reply = handle.await.unwrap().unwrap();
        assert_eq!(reply.conversation_id, "shared");
    }

    let page = service
        .list_conversations("owner-1", &profile.id, &ListQuery::default())
        .unwrap();
    assert_eq!(page.pagination.total, 1);

    let conversation = service
        .get_conversation("owner-1", &profile.id, "shared")
        .unwrap();
    // Welcome plus one user/assistant pair per turn; the system prompt is hidden.
    assert_eq!(conversation.messages.len(), 1 + 2 * TURNS);
    for pair in conversation.messages[1..].chunks(2) {
        assert_eq!(pair[0].role, MessageRole::User);
        assert_eq!(pair[1].role, MessageRole::Assistant);
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }

    let stats = service.get_profile("owner-1", &profile.id).unwrap().stats;
    assert_eq!(stats.total_conversations, 1);
    assert_eq!(stats.total_messages, (1 + 2 * TURNS) as u64);
}

#[tokio::test]
async fn test_session_opens_once() {
    let service = service_with(FakeGenerator::new(Script::Helpful));
    let profile = service.create_profile("owner-1", salon_input()).unwrap();

    let first = service
        .get_or_create_session(&profile.id, Some("widget-1"))
        .await
        .unwrap();
    assert!(first.is_new);
    assert_eq!(first.messages.len(), 1);
    assert_eq!(first.messages[0].role, MessageRole::Assistant);
    assert!(first.messages[0].content.contains("Shear Delight"));
    assert_eq!(first.chatbot_info.services.len(), 3);

    let again = service
        .get_or_create_session(&profile.id, Some("widget-1"))
        .await
        .unwrap();
    assert!(!again.is_new);
    assert_eq!(again.messages.len(), 1);

    let generated = service.get_or_create_session(&profile.id, None).await.unwrap();
    assert!(generated.is_new);
    assert_ne!(generated.session_id, "widget-1");
}

#[tokio::test]
async fn test_message_rejections() {
    let service = service_with(FakeGenerator::new(Script::Helpful));
    let profile = service.create_profile("owner-1", salon_input()).unwrap();

    let empty = service
        .process_message(&profile.id, IncomingMessage::new("   "))
        .await;
    assert!(matches!(empty, Err(ChatError::InvalidInput(_))));

    let missing = service
        .process_message("no-such-bot", IncomingMessage::new("hello"))
        .await;
    assert!(matches!(missing, Err(ChatError::ChatbotNotFound)));

    let input = ProfileInput {
        active: Some(false),
        ..Default::default()
    };
    service.update_profile("owner-1", &profile.id, input).unwrap();

    let inactive = service
        .process_message(&profile.id, IncomingMessage::new("hello"))
        .await;
    assert!(matches!(inactive, Err(ChatError::Inactive)));
    let session = service.get_or_create_session(&profile.id, None).await;
    assert!(matches!(session, Err(ChatError::Inactive)));
}

#[tokio::test]
async fn test_generic_reply_never_reaches_visitor() {
    let generator = FakeGenerator::new(Script::Generic);
    let service = service_with(generator.clone());
    let profile = service.create_profile("owner-1", salon_input()).unwrap();

    let reply = service
        .process_message(
            &profile.id,
            IncomingMessage::new("When are you open?").with_session("s-1"),
        )
        .await
        .unwrap();

    assert_eq!(reply.source, ReplySource::Fallback);
    assert_ne!(reply.message, GENERIC_REPLY);
    assert!(reply.message.contains("Tue-Sat 10am-7pm"));
    // First attempt plus the directive retry.
    assert_eq!(generator.calls.load(Ordering::SeqCst), 2);

    let conversation = service
        .get_conversation("owner-1", &profile.id, "s-1")
        .unwrap();
    assert!(conversation
        .messages
        .iter()
        .all(|m| m.content != GENERIC_REPLY));
}

#[tokio::test]
async fn test_generation_error_skips_retry() {
    let generator = FakeGenerator::new(Script::Failing);
    let service = service_with(generator.clone());
    let profile = service.create_profile("owner-1", salon_input()).unwrap();

    let reply = service
        .process_message(&profile.id, IncomingMessage::new("Do you do coloring?"))
        .await
        .unwrap();

    assert_eq!(reply.source, ReplySource::Fallback);
    assert!(reply.message.contains("Haircuts"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_first_message_keeps_metadata_and_contact() {
    let service = service_with(FakeGenerator::new(Script::Helpful));
    let profile = service.create_profile("owner-1", salon_input()).unwrap();

    let request: IncomingMessage = serde_json::from_value(serde_json::json!({
        "message": "Can I book a blowout?",
        "sessionId": "s-meta",
        "metadata": { "page": "/pricing" },
        "customerInfo": { "name": "Dana", "email": "dana@example.com" }
    }))
    .unwrap();
    service.process_message(&profile.id, request).await.unwrap();

    let conversation = service
        .get_conversation("owner-1", &profile.id, "s-meta")
        .unwrap();
    assert_eq!(conversation.metadata["page"], "/pricing");
    assert_eq!(conversation.customer_info.name.as_deref(), Some("Dana"));
    assert_eq!(conversation.status, ConversationStatus::Active);
}

#[tokio::test]
async fn test_owner_checks() {
    let service = service_with(FakeGenerator::new(Script::Helpful));
    let profile = service.create_profile("owner-1", salon_input()).unwrap();
    service
        .get_or_create_session(&profile.id, Some("s-1"))
        .await
        .unwrap();

    assert!(matches!(
        service.get_profile("intruder", &profile.id),
        Err(ChatError::Forbidden)
    ));
    assert!(matches!(
        service.list_conversations("intruder", &profile.id, &ListQuery::default()),
        Err(ChatError::Forbidden)
    ));
    assert!(matches!(
        service.get_conversation("intruder", &profile.id, "s-1"),
        Err(ChatError::Forbidden)
    ));
    assert!(matches!(
        service.delete_profile("intruder", &profile.id),
        Err(ChatError::Forbidden)
    ));
    assert!(matches!(
        service.archive_conversation("intruder", &profile.id, "s-1").await,
        Err(ChatError::Forbidden)
    ));

    assert!(service.list_profiles("intruder").unwrap().is_empty());
    assert_eq!(service.list_profiles("owner-1").unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_removes_conversations() {
    let service = service_with(FakeGenerator::new(Script::Helpful));
    let profile = service.create_profile("owner-1", salon_input()).unwrap();
    service
        .process_message(&profile.id, IncomingMessage::new("hi").with_session("s-1"))
        .await
        .unwrap();

    service.delete_profile("owner-1", &profile.id).unwrap();

    assert!(matches!(
        service.public_profile(&profile.id),
        Err(ChatError::ChatbotNotFound)
    ));
    let feedback = FeedbackInput {
        rating: Some(5),
        comment: None,
    };
    assert!(matches!(
        service.submit_feedback(&profile.id, "s-1", feedback),
        Err(ChatError::ConversationNotFound)
    ));
}

#[tokio::test]
async fn test_feedback_and_archive() {
    let service = service_with(FakeGenerator::new(Script::Helpful));
    let profile = service.create_profile("owner-1", salon_input()).unwrap();
    service
        .process_message(&profile.id, IncomingMessage::new("hi").with_session("s-1"))
        .await
        .unwrap();

    let out_of_range = FeedbackInput {
        rating: Some(9),
        comment: None,
    };
    assert!(matches!(
        service.submit_feedback(&profile.id, "s-1", out_of_range),
        Err(ChatError::InvalidInput(_))
    ));

    let feedback = FeedbackInput {
        rating: Some(4),
        comment: Some("  quick answers  ".to_string()),
    };
    let stored = service.submit_feedback(&profile.id, "s-1", feedback).unwrap();
    assert_eq!(stored.rating, 4);
    assert_eq!(stored.comment.as_deref(), Some("quick answers"));

    let archived = service
        .archive_conversation("owner-1", &profile.id, "s-1")
        .await
        .unwrap();
    assert_eq!(archived.status, ConversationStatus::Archived);
    assert_eq!(archived.feedback.map(|f| f.rating), Some(4));

    // A later message does not bring an archived conversation back.
    service
        .process_message(&profile.id, IncomingMessage::new("one more").with_session("s-1"))
        .await
        .unwrap();
    let conversation = service
        .get_conversation("owner-1", &profile.id, "s-1")
        .unwrap();
    assert_eq!(conversation.status, ConversationStatus::Archived);

    let query = ListQuery {
        status: Some("archived".to_string()),
        ..Default::default()
    };
    let page = service
        .list_conversations("owner-1", &profile.id, &query)
        .unwrap();
    assert_eq!(page.conversations.len(), 1);
    assert_eq!(page.conversations[0].message_count, 5);
}
