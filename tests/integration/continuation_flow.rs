//! Chunked runs through the engine with a scripted backend

use super::test_utils::{terse_reply, verbose_reply, FakeRunner, ScriptedClient};
use tulp::engine::{Engine, EngineSettings, RunStatus};
use tulp::exit_codes;
use tulp::protocol::TagGrammar;
use tulp::provider::{FinishReason, RawReply, Role};
use tulp::TulpError;

fn settings(max_chars: usize, cont: u32, grammar: TagGrammar) -> EngineSettings {
    EngineSettings {
        max_chars,
        continuation_retries: cont,
        max_execution_retries: 3,
        execute: false,
        grammar,
        interpreter: "python3".to_string(),
    }
}

fn engine(client: std::sync::Arc<ScriptedClient>, settings: EngineSettings) -> Engine {
    Engine::new(settings, client, FakeRunner::new(Vec::new()))
}

#[tokio::test]
async fn test_three_long_lines_become_three_ordered_chunks() {
    let line = |c: char| c.to_string().repeat(60);
    let input = format!("{}\n{}\n{}", line('a'), line('b'), line('c'));
    let client = ScriptedClient::stopping(&[
        verbose_reply("1", "first"),
        verbose_reply("2", "second"),
        verbose_reply("3", "third"),
    ]);

    let report = engine(client.clone(), settings(100, 0, TagGrammar::verbose()))
        .run("number the lines", &input)
        .await
        .unwrap();

    assert_eq!(report.output, "1\n2\n3");
    assert_eq!(report.commentary, "third");
    assert_eq!(client.calls(), 3);
    for (i, request) in client.requests().iter().enumerate() {
        let user = &request.last().unwrap().content;
        assert!(user.contains(&format!("# Input chunk {}/3", i + 1)));
    }
}

#[tokio::test]
async fn test_terse_grammar_round_trip() {
    let client = ScriptedClient::stopping(&[terse_reply("B")]);
    let report = engine(client.clone(), settings(1000, 0, TagGrammar::terse()))
        .run("uppercase", "b")
        .await
        .unwrap();
    assert_eq!(report.output, "B");
    assert_eq!(report.status, RunStatus::Success);
    assert!(client.requests()[0][0].content.contains("(#reply_end)"));
}

#[tokio::test]
async fn test_continuation_is_bounded_and_partial_output_kept() {
    let client = ScriptedClient::new(vec![
        RawReply::assistant(
            "<|||reply_start|||>\n<|||dev_file_start=stdout|||>\none",
            FinishReason::Length,
        ),
        RawReply::assistant("two", FinishReason::Length),
        RawReply::assistant("three", FinishReason::Length),
        RawReply::assistant("never", FinishReason::Length),
    ]);
    let report = engine(client.clone(), settings(1000, 2, TagGrammar::verbose()))
        .run("x", "input")
        .await
        .unwrap();

    assert_eq!(client.calls(), 3);
    assert_eq!(report.status, RunStatus::Truncated);
    assert_eq!(report.exit_code(), exit_codes::PROTOCOL_ERROR);
    assert_eq!(report.output, "one\ntwo\nthree");

    let last_request = &client.requests()[2];
    assert_eq!(last_request.len(), 6);
    assert_eq!(last_request[4].role, Role::Assistant);
    assert_eq!(last_request[4].content, "two");
}

#[tokio::test]
async fn test_truncated_middle_chunk_keeps_later_chunks() {
    let client = ScriptedClient::new(vec![
        RawReply::assistant(verbose_reply("A", ""), FinishReason::Stop),
        RawReply::assistant(
            "<|||reply_start|||>\n<|||dev_file_start=stdout|||>\nB1",
            FinishReason::Length,
        ),
        RawReply::assistant("B2", FinishReason::Length),
        RawReply::assistant(verbose_reply("C", "all chunks done"), FinishReason::Stop),
    ]);
    let report = engine(client.clone(), settings(4, 1, TagGrammar::verbose()))
        .run("upper", "aaaa\nbbbb\ncccc")
        .await
        .unwrap();

    assert_eq!(client.calls(), 4);
    assert_eq!(report.status, RunStatus::Truncated);
    assert_eq!(report.exit_code(), exit_codes::PROTOCOL_ERROR);
    assert_eq!(report.output, "A\nB1\nB2\nC");
    assert_eq!(report.commentary, "all chunks done");
    let diagnostic = report.diagnostic.unwrap();
    assert!(diagnostic.contains("--cont/TULP_CONT = 1"));
    assert!(diagnostic.contains("chunk 2/3"));
}

#[tokio::test]
async fn test_error_block_suppresses_output() {
    let reply = "<|||reply_start|||>\n<|||dev_file_start=stdout|||>\ndata\n<|||dev_file_end|||>\n\
                 <|||dev_file_start=error|||>\ninput is not CSV\n<|||dev_file_end|||>\n<|||reply_end|||>";
    let client = ScriptedClient::stopping(&[reply.to_string(), verbose_reply("later", "")]);
    let input = format!("{}\n{}", "a".repeat(8), "b".repeat(8));
    let err = engine(client.clone(), settings(10, 0, TagGrammar::verbose()))
        .run("x", &input)
        .await
        .unwrap_err();

    match err {
        TulpError::BackendDeclared(content) => assert_eq!(content, "input is not CSV"),
        other => panic!("unexpected error: {:?}", other),
    }
    // Remaining chunks are never sent
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_error_reply_from_client_is_backend_error() {
    let client = ScriptedClient::new(vec![RawReply::error("model overloaded")]);
    let err = engine(client, settings(1000, 0, TagGrammar::verbose()))
        .run("x", "")
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::BACKEND_ERROR);
}

#[tokio::test]
async fn test_fenced_stdout_is_cleaned() {
    let client = ScriptedClient::stopping(&[verbose_reply("```json\n{\"a\": 1}\n```", "")]);
    let report = engine(client, settings(1000, 0, TagGrammar::verbose()))
        .run("to json", "a=1")
        .await
        .unwrap();
    assert_eq!(report.output, "{\"a\": 1}");
}
