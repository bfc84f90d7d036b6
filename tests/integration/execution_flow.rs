//! Execution mode through the engine with scripted backend and runner

use super::test_utils::{failed_output, ok_output, verbose_reply, FakeRunner, ScriptedClient};
use tulp::engine::{Engine, EngineSettings, RunStatus};
use tulp::exit_codes;
use tulp::protocol::TagGrammar;

fn settings(max_retries: u32) -> EngineSettings {
    EngineSettings {
        max_chars: 1000,
        continuation_retries: 0,
        max_execution_retries: max_retries,
        execute: true,
        grammar: TagGrammar::verbose(),
        interpreter: "python3".to_string(),
    }
}

#[tokio::test]
async fn test_repair_loop_stops_at_first_success() {
    let client = ScriptedClient::stopping(&[
        verbose_reply("print(x)", ""),
        verbose_reply("print(1)", "fixed the name"),
        verbose_reply("unused", ""),
    ]);
    let runner = FakeRunner::new(vec![
        failed_output("NameError: name 'x' is not defined"),
        ok_output("1\n"),
    ]);
    let engine = Engine::new(settings(5), client.clone(), runner.clone());

    let report = engine.run("print one", "").await.unwrap();

    assert_eq!(report.status, RunStatus::Success);
    assert_eq!(report.output, "1\n");
    assert_eq!(report.generated_program.as_deref(), Some("print(1)"));
    assert_eq!(report.commentary, "fixed the name");
    assert_eq!(runner.programs(), vec!["print(x)", "print(1)"]);
    assert_eq!(client.calls(), 2);
    assert!(client.requests()[1]
        .last()
        .unwrap()
        .content
        .contains("NameError"));
}

#[tokio::test]
async fn test_exhausted_retries_report_failure() {
    let client = ScriptedClient::stopping(&[
        verbose_reply("a()", ""),
        verbose_reply("b()", ""),
    ]);
    let runner = FakeRunner::new(vec![failed_output("boom a"), failed_output("boom b")]);
    let engine = Engine::new(settings(2), client, runner.clone());

    let report = engine.run("x", "data").await.unwrap();

    assert_eq!(report.status, RunStatus::ExecutionFailed);
    assert_eq!(report.exit_code(), exit_codes::BACKEND_ERROR);
    assert_eq!(runner.programs().len(), 2);
    assert!(report.diagnostic.unwrap().contains("boom b"));
}

#[tokio::test]
async fn test_fenced_program_is_cleaned_before_running() {
    let client = ScriptedClient::stopping(&[verbose_reply("```python\nprint('hi')\n```", "")]);
    let runner = FakeRunner::new(vec![ok_output("hi\n")]);
    let engine = Engine::new(settings(1), client, runner.clone());

    engine.run("greet", "").await.unwrap();
    assert_eq!(runner.programs(), vec!["print('hi')"]);
}
