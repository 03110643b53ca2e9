use super::*;
use crate::audit::{AuditEvent, AuditEventType, AuditSettings};
use crate::tests::mocks::{
    create_test_response, create_test_response_text, create_tool_use_response, sample_paper,
    MockLLMProvider, MockPaperIndex, MockUI,
};
use crate::tools::default_registry;
use anyhow::Result;
use llm::MessageContent;
use papers::PaperStore;
use serde_json::json;
use std::path::Path;

const MODEL: &str = "claude-3-haiku-20240307";

fn build_engine(
    llm: MockLLMProvider,
    index: MockPaperIndex,
    ui: MockUI,
    audit: AuditLog,
    paper_dir: &Path,
) -> Result<ConversationEngine> {
    let runner = ToolRunner::new(
        default_registry()?,
        Box::new(index),
        PaperStore::new(paper_dir),
        audit.clone(),
    );
    Ok(ConversationEngine::new(
        Box::new(llm),
        runner,
        Arc::new(ui),
        audit,
        MODEL.to_string(),
        2048,
    ))
}

fn tool_results(message: &Message) -> Vec<(String, String)> {
    match &message.content {
        MessageContent::Structured(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } => Some((tool_use_id.clone(), content.clone())),
                _ => None,
            })
            .collect(),
        MessageContent::Text(_) => Vec::new(),
    }
}

fn read_events(audit: &AuditLog) -> Result<Vec<AuditEvent>> {
    let path = audit.current_file().expect("audit enabled");
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?)
}

#[tokio::test]
async fn test_text_only_answer() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![Ok(create_test_response_text("Quantum is neat."))]);
    let ui = MockUI::default();
    let mut engine = build_engine(
        llm.clone(),
        MockPaperIndex::default(),
        ui.clone(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    let outcome = engine.process_query("What is quantum computing?").await?;

    assert_eq!(outcome, QueryOutcome::Answered { tool_calls: 0 });
    assert_eq!(ui.assistant_texts(), vec!["Quantum is neat.".to_string()]);

    let requests = llm.get_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].messages,
        vec![Message::new_user("What is quantum computing?")]
    );
    Ok(())
}

#[tokio::test]
async fn test_every_request_carries_schemas_and_max_tokens() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![
        Ok(create_tool_use_response(
            "t1",
            "search_papers",
            json!({"topic": "llm", "max_results": 1}),
        )),
        Ok(create_test_response_text("done")),
    ]);
    let mut engine = build_engine(
        llm.clone(),
        MockPaperIndex::new(vec![sample_paper("2401.00001v1", "Scaling Laws")]),
        MockUI::default(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    engine.process_query("find llm papers").await?;

    let expected = default_registry()?.schemas().to_vec();
    let requests = llm.get_requests();
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.tools.as_ref(), Some(&expected));
        assert_eq!(request.max_tokens, 2048);
    }
    Ok(())
}

#[tokio::test]
async fn test_first_tool_use_ends_the_pass() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![
        Ok(create_test_response(vec![
            ContentBlock::new_text("Hello"),
            ContentBlock::new_tool_use(
                "t1",
                "search_papers",
                json!({"topic": "quantum computing", "max_results": 2}),
            ),
            ContentBlock::new_text("ignored"),
            ContentBlock::new_tool_use("t2", "extract_info", json!({"paper_id": "x"})),
        ])),
        Ok(create_test_response_text("Found two papers.")),
    ]);
    let index = MockPaperIndex::new(vec![
        sample_paper("2412.07992v3", "Quantum Error Correction"),
        sample_paper("2301.00001v1", "Variational Algorithms"),
    ]);
    let ui = MockUI::default();
    let mut engine = build_engine(
        llm.clone(),
        index.clone(),
        ui.clone(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    let outcome = engine.process_query("quantum papers please").await?;
    assert_eq!(outcome, QueryOutcome::Answered { tool_calls: 1 });

    assert_eq!(
        ui.assistant_texts(),
        vec!["Hello".to_string(), "Found two papers.".to_string()]
    );
    assert_eq!(index.calls(), vec![("quantum computing".to_string(), 2)]);

    let requests = llm.get_requests();
    assert_eq!(requests.len(), 2);
    let history = &requests[1].messages;
    assert_eq!(history.len(), 3);
    assert_eq!(
        history[1],
        Message::new_assistant_content(vec![
            ContentBlock::new_text("Hello"),
            ContentBlock::new_tool_use(
                "t1",
                "search_papers",
                json!({"topic": "quantum computing", "max_results": 2}),
            ),
        ])
    );
    assert_eq!(
        tool_results(&history[2]),
        vec![(
            "t1".to_string(),
            "2412.07992v3, 2301.00001v1".to_string()
        )]
    );
    Ok(())
}

#[tokio::test]
async fn test_nested_tool_calls_dispatch_in_sequence() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![
        Ok(create_tool_use_response(
            "t1",
            "search_papers",
            json!({"topic": "quantum computing", "max_results": 1}),
        )),
        Ok(create_tool_use_response(
            "t2",
            "extract_info",
            json!({"paper_id": "2412.07992v3"}),
        )),
        Ok(create_test_response_text("final")),
    ]);
    let ui = MockUI::default();
    let mut engine = build_engine(
        llm.clone(),
        MockPaperIndex::new(vec![sample_paper("2412.07992v3", "Quantum Error Correction")]),
        ui.clone(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    let outcome = engine.process_query("tell me about quantum").await?;
    assert_eq!(outcome, QueryOutcome::Answered { tool_calls: 2 });

    let tool_calls: Vec<String> = ui
        .get_messages()
        .into_iter()
        .filter_map(|m| match m {
            UIMessage::ToolCall { name, .. } => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(tool_calls, vec!["search_papers", "extract_info"]);
    assert_eq!(ui.assistant_texts(), vec!["final".to_string()]);

    let requests = llm.get_requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].messages.len(), 5);

    let extracted = tool_results(&requests[2].messages[4]);
    assert_eq!(extracted[0].0, "t2");
    let record: serde_json::Value = serde_json::from_str(&extracted[0].1)?;
    assert_eq!(record["title"], "Quantum Error Correction");
    Ok(())
}

#[tokio::test]
async fn test_tool_call_is_displayed_with_arguments() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![
        Ok(create_tool_use_response(
            "t1",
            "extract_info",
            json!({"paper_id": "2412.07992v3"}),
        )),
        Ok(create_test_response_text("Nothing saved yet.")),
    ]);
    let ui = MockUI::default();
    let mut engine = build_engine(
        llm,
        MockPaperIndex::default(),
        ui.clone(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    engine.process_query("paper 2412.07992v3").await?;

    assert_eq!(
        ui.get_messages()[0],
        UIMessage::ToolCall {
            name: "extract_info".to_string(),
            arguments: r#"{"paper_id":"2412.07992v3"}"#.to_string(),
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_tool_failures_are_sent_back_as_text() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![
        Ok(create_tool_use_response("t1", "read_files", json!({"path": "/etc"}))),
        Ok(create_tool_use_response(
            "t2",
            "search_papers",
            json!({"topic": "llm", "max_results": 50}),
        )),
        Ok(create_test_response_text("Sorry, those tools failed.")),
    ]);
    let mut engine = build_engine(
        llm.clone(),
        MockPaperIndex::default(),
        MockUI::default(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    let outcome = engine.process_query("do something odd").await?;
    assert_eq!(outcome, QueryOutcome::Answered { tool_calls: 2 });

    let requests = llm.get_requests();
    assert_eq!(
        tool_results(&requests[1].messages[2]),
        vec![(
            "t1".to_string(),
            "Tool execution failed: Tool 'read_files' not found. Available tools: search_papers, extract_info".to_string()
        )]
    );
    assert_eq!(
        tool_results(&requests[2].messages[4]),
        vec![(
            "t2".to_string(),
            "Tool execution failed: Tool 'search_papers' execution failed: max_results must be between 1 and 20".to_string()
        )]
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_query_makes_no_request() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![]);
    let ui = MockUI::default();
    let mut engine = build_engine(
        llm.clone(),
        MockPaperIndex::default(),
        ui.clone(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    for query in ["", "   ", "\n\t"] {
        assert_eq!(engine.process_query(query).await?, QueryOutcome::EmptyQuery);
    }

    assert!(llm.get_requests().is_empty());
    assert_eq!(
        ui.get_messages()[0],
        UIMessage::Notice("Please provide a valid query.".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_response_terminates() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![Ok(create_test_response(vec![]))]);
    let ui = MockUI::default();
    let mut engine = build_engine(
        llm.clone(),
        MockPaperIndex::default(),
        ui.clone(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    let outcome = engine.process_query("hello?").await?;
    assert_eq!(outcome, QueryOutcome::EmptyResponse { tool_calls: 0 });
    assert_eq!(llm.get_requests().len(), 1);
    assert!(ui.get_messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_tool_result_blocks_from_model_are_ignored() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let llm = MockLLMProvider::new(vec![Ok(create_test_response(vec![
        ContentBlock::new_tool_result("bogus", "not from us"),
        ContentBlock::new_text("Plain answer"),
    ]))]);
    let ui = MockUI::default();
    let mut engine = build_engine(
        llm,
        MockPaperIndex::default(),
        ui.clone(),
        AuditLog::disabled(),
        temp.path(),
    )?;

    let outcome = engine.process_query("hi").await?;
    assert_eq!(outcome, QueryOutcome::Answered { tool_calls: 0 });
    assert_eq!(ui.assistant_texts(), vec!["Plain answer".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_model_error_is_reported_and_audited() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let audit = AuditLog::open(AuditSettings {
        log_dir: temp.path().join("audit"),
        ..AuditSettings::default()
    })?;
    let llm = MockLLMProvider::new(vec![Err(anyhow::anyhow!("rate limited"))]);
    let mut engine = build_engine(
        llm,
        MockPaperIndex::default(),
        MockUI::default(),
        audit.clone(),
        &temp.path().join("papers"),
    )?;

    let error = engine.process_query("anything").await.unwrap_err();
    match &error {
        ChatError::ModelApi(message) => assert_eq!(message, "rate limited"),
        other => panic!("Expected ModelApi error, got {other:?}"),
    }
    assert_eq!(error.to_string(), "Model API error: rate limited");

    let events = read_events(&audit)?;
    let types: Vec<AuditEventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            AuditEventType::SessionStart,
            AuditEventType::UserQuery,
            AuditEventType::ApiCall,
            AuditEventType::Error,
        ]
    );
    assert!(!events[2].success);
    assert_eq!(events[2].details["model"], MODEL);
    assert_eq!(events[3].component, "chatbot");
    assert_eq!(events[3].operation, "api_call");
    Ok(())
}

#[tokio::test]
async fn test_successful_query_audit_trail() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let audit = AuditLog::open(AuditSettings {
        log_dir: temp.path().join("audit"),
        ..AuditSettings::default()
    })?;
    let llm = MockLLMProvider::new(vec![
        Ok(create_tool_use_response(
            "t1",
            "search_papers",
            json!({"topic": "llm", "max_results": 1}),
        )),
        Ok(create_test_response_text("One paper.")),
    ]);
    let mut engine = build_engine(
        llm,
        MockPaperIndex::new(vec![sample_paper("2401.00001v1", "Scaling Laws")]),
        MockUI::default(),
        audit.clone(),
        &temp.path().join("papers"),
    )?;

    engine.process_query("llm papers").await?;

    let types: Vec<AuditEventType> = read_events(&audit)?
        .iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(
        types,
        vec![
            AuditEventType::SessionStart,
            AuditEventType::UserQuery,
            AuditEventType::ApiCall,
            AuditEventType::ToolExecution,
            AuditEventType::ToolResult,
            AuditEventType::ApiCall,
        ]
    );
    Ok(())
}
