use std::fs;
use std::sync::{Arc, Mutex};

use research_agent::SessionBuilder;
use research_agent::core::tool::RegistryError;
use research_agent::core::{
    CancelSignal, Role, RunErrorKind, RunStatus, ToolRegistry,
};
use research_agent::tools::SaveTool;
use research_agent_model::{ModelMessage, ToolCallRequest};
use research_agent_test_model::{
    PresetEvent, PresetResponse, TestModelProvider,
};
use serde_json::{Value, json};
use tempfile::tempdir;

fn save_call(id: &str, arguments: Value) -> PresetEvent {
    PresetEvent::ToolCall(ToolCallRequest::new(id, "save_tool", arguments))
}

#[tokio::test]
async fn test_save_draft_then_final() {
    let dir = tempdir().unwrap();
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_turn(PresetResponse::with_events([
        PresetEvent::MessageDelta("Saving a draft first.".to_owned()),
        save_call(
            "call:1",
            json!({ "content": "draft", "filename": "out.txt" }),
        ),
    ]));
    model_provider.add_assistant_turn(PresetResponse::with_events([save_call(
        "call:2",
        json!({ "content": "final", "filename": "out.txt" }),
    )]));
    model_provider
        .add_assistant_turn(PresetResponse::with_text("Saved to out.txt."));

    let turns = Arc::new(Mutex::new(0));
    let session = SessionBuilder::with_model_provider(model_provider.clone())
        .with_output_dir(dir.path())
        .on_turn({
            let turns = Arc::clone(&turns);
            move |_| *turns.lock().unwrap() += 1
        })
        .build()
        .unwrap();

    let query = "  Write up the boiling point of water.\n";
    let outcome = session
        .research(query, &CancelSignal::never())
        .await
        .unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.final_answer(), Some("Saved to out.txt."));
    assert_eq!(outcome.acting_phases, 2);
    assert_eq!(*turns.lock().unwrap(), 5);

    let saved = fs::read_to_string(dir.path().join("out.txt")).unwrap();
    assert_eq!(saved, "final");

    let turns = outcome.history.turns();
    assert_eq!(turns[1].content(), "Write up the boiling point of water.");
    assert_eq!(turns[3].content(), "Research successfully saved to 'out.txt'");

    // The system prompt and all built-in tools reach the model.
    let request = &model_provider.requests()[0];
    assert!(matches!(
        &request.messages[0],
        ModelMessage::System(prompt) if prompt.contains("research assistant")
    ));
    let tool_names: Vec<_> =
        request.tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(tool_names, ["search_tool", "wiki_tool", "save_tool"]);
}

#[tokio::test]
async fn test_queries_are_independent() {
    let dir = tempdir().unwrap();
    let mut registry = ToolRegistry::new();
    registry
        .register(SaveTool::new().with_output_dir(dir.path()))
        .unwrap();

    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_turn(PresetResponse::with_text("An answer."));

    let session = SessionBuilder::with_model_provider(model_provider.clone())
        .with_system_prompt("Answer briefly.")
        .with_registry(Arc::new(registry))
        .build()
        .unwrap();

    for query in ["first question", "second question"] {
        let outcome = session
            .research(query, &CancelSignal::never())
            .await
            .unwrap();
        assert_eq!(outcome.history.len(), 3);
        assert_eq!(outcome.history.turns()[0].role(), Role::System);
        assert_eq!(outcome.history.turns()[0].content(), "Answer briefly.");
        assert_eq!(outcome.history.turns()[1].content(), query);
    }
    assert!(model_provider.requests().iter().all(|request| {
        request.messages.len() == 2 && request.tools.len() == 1
    }));
}

#[tokio::test]
async fn test_undeclared_argument_fails_run() {
    let dir = tempdir().unwrap();
    let mut model_provider = TestModelProvider::default();
    model_provider.add_assistant_turn(PresetResponse::with_events([save_call(
        "call:1",
        json!({ "content": "x", "path": "/etc/passwd" }),
    )]));

    let session = SessionBuilder::with_model_provider(model_provider)
        .with_output_dir(dir.path())
        .build()
        .unwrap();
    let err = session
        .research("Save something", &CancelSignal::never())
        .await
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        RunErrorKind::InvalidArguments(
            RegistryError::InvalidArguments { tool, reason }
        ) if tool == "save_tool" && reason.contains("path")
    ));
    assert_eq!(err.history().len(), 2);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_iteration_limit_from_builder() {
    let dir = tempdir().unwrap();
    let mut model_provider = TestModelProvider::default();
    for i in 0..5 {
        let content = format!("v{i}");
        model_provider.add_assistant_turn(PresetResponse::with_events([
            save_call(&format!("call:{i}"), json!({ "content": content })),
        ]));
    }

    let session = SessionBuilder::with_model_provider(model_provider)
        .with_output_dir(dir.path())
        .with_max_iterations(Some(2))
        .build()
        .unwrap();
    let outcome = session
        .research("Keep saving", &CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::IterationLimitReached);
    assert_eq!(outcome.final_answer(), None);
    let saved =
        fs::read_to_string(dir.path().join("research_output.txt")).unwrap();
    assert_eq!(saved, "v1");
}
