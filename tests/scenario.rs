use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;
use std::time::{Duration, Instant};

mod common;

use gander::prelude::*;

const NOTES_PATH: &str = "/v1/notes";
const NOTE_PATH: &str = "/v1/notes/42";
const FAIL_PATH: &str = "/v1/fail";

// Build a plan from JSON, with `{base}` replaced by the mock server's base url.
fn build_plan(server: &MockServer, plan: &str) -> LoadTestPlan {
    plan.replace("{base}", &server.base_url())
        .parse()
        .expect("failed to parse plan")
}

async fn connect(server: &MockServer, cache: SessionCache) -> OAuthClient {
    OAuthClient::connect(common::build_config(server), cache)
        .await
        .expect("failed to connect")
}

fn seed(plan: &LoadTestPlan, index: usize) -> Variables {
    plan.test_data[index].clone().into_iter().collect()
}

#[tokio::test]
async fn test_extracted_variable_is_used_by_next_step() {
    let server = MockServer::start_async().await;
    let _oauth = common::mock_oauth(&server, 3600, 300).await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(NOTES_PATH)
                .json_body(json!({"author": "alice"}));
            then.status(201).json_body(json!({"note": {"id": 42}}));
        })
        .await;
    let read = server
        .mock_async(|when, then| {
            when.method(GET).path(NOTE_PATH);
            then.status(200).json_body(json!({"id": 42, "text": "hello"}));
        })
        .await;
    let plan = build_plan(
        &server,
        r#"{
            "TestIteration": 1,
            "TestData": [{"name": "alice"}],
            "Scenario": [
                {
                    "name": "create",
                    "url": "{base}/v1/notes",
                    "method": "POST",
                    "data": {"author": "{{name}}"},
                    "variables": {
                        "noteId": {"type": "dict", "key": "note", "child": {"type": "terminal", "key": "id"}}
                    }
                },
                {"name": "read", "url": "{base}/v1/notes/{{noteId}}", "method": "GET"}
            ]
        }"#,
    );
    let (_directory, cache) = common::build_cache();
    let mut client = connect(&server, cache).await;
    let variables = seed(&plan, 0);
    let log = WorkerLog::new(1, &variables);

    let report = run_scenario(&mut client, variables, &plan.scenario, 1, &log).await;

    assert!(report.is_success(), "errors: {:?}", report.errors);
    assert_eq!(report.label, "worker 1 alice");
    assert_eq!(report.variables["noteId"], json!(42));
    assert_eq!(create.hits_async().await, 1);
    assert_eq!(read.hits_async().await, 1);
}

#[tokio::test]
async fn test_error_status_is_recorded_with_iteration_and_body() {
    let server = MockServer::start_async().await;
    let _oauth = common::mock_oauth(&server, 3600, 300).await;
    let fail = server
        .mock_async(|when, then| {
            when.method(GET).path(FAIL_PATH);
            then.status(500).body("database unavailable");
        })
        .await;
    let ok = server
        .mock_async(|when, then| {
            when.method(GET).path(NOTES_PATH);
            then.status(200).json_body(json!([]));
        })
        .await;
    let plan = build_plan(
        &server,
        r#"{
            "TestIteration": 1,
            "TestData": [{}],
            "Scenario": [
                {"name": "fail", "url": "{base}/v1/fail", "method": "GET"},
                {"name": "list", "url": "{base}/v1/notes", "method": "GET"}
            ]
        }"#,
    );
    let (_directory, cache) = common::build_cache();
    let mut client = connect(&server, cache).await;
    let variables = seed(&plan, 0);
    let log = WorkerLog::new(1, &variables);

    let report = run_scenario(&mut client, variables, &plan.scenario, 1, &log).await;

    assert_eq!(report.requests, 2);
    assert_eq!(
        report.errors,
        vec![StepError {
            iteration: 0,
            step: "fail".to_string(),
            status: Some(500),
            message: "database unavailable".to_string(),
        }]
    );
    // The failure didn't stop the next step.
    assert_eq!(fail.hits_async().await, 1);
    assert_eq!(ok.hits_async().await, 1);
}

#[tokio::test]
async fn test_delay_pauses_before_next_step() {
    let server = MockServer::start_async().await;
    let _oauth = common::mock_oauth(&server, 3600, 300).await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path(NOTES_PATH);
            then.status(200).body("");
        })
        .await;
    let plan = build_plan(
        &server,
        r#"{
            "TestIteration": 1,
            "TestData": [{}],
            "Scenario": [
                {"name": "first", "url": "{base}/v1/notes", "method": "GET", "delayToNext": 2},
                {"name": "second", "url": "{base}/v1/notes", "method": "GET"}
            ]
        }"#,
    );
    let (_directory, cache) = common::build_cache();
    let mut client = connect(&server, cache).await;
    let variables = seed(&plan, 0);
    let log = WorkerLog::new(1, &variables);

    let started = Instant::now();
    let report = run_scenario(&mut client, variables, &plan.scenario, 1, &log).await;

    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(report.is_success());
    assert_eq!(list.hits_async().await, 2);
}

#[tokio::test]
async fn test_load_test_runs_one_worker_per_record() {
    let server = MockServer::start_async().await;
    let oauth = common::mock_oauth(&server, 3600, 300).await;
    let alice = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/patients/1");
            then.status(200).json_body(json!({"id": 1}));
        })
        .await;
    let bob = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/patients/2");
            then.status(404).body("no such patient");
        })
        .await;
    let plan = build_plan(
        &server,
        r#"{
            "TestIteration": "2",
            "TestData": [{"name": "alice", "patient": 1}, {"name": "bob", "patient": 2}],
            "Scenario": [
                {"name": "read", "url": "{base}/v1/patients/{{patient}}", "method": "GET"}
            ]
        }"#,
    );
    let (_directory, cache) = common::build_cache();

    let summary = run_load_test(&common::build_config(&server), &cache, &plan).await;

    assert_eq!(summary.outcomes.len(), 2);
    assert_eq!(summary.failed_workers(), 1);
    assert!(!summary.is_success());
    assert_eq!(alice.hits_async().await, 2);
    assert_eq!(bob.hits_async().await, 2);
    // Every worker authenticates on its own.
    assert_eq!(oauth.token.hits_async().await, 2);

    let mut labels = Vec::new();
    for outcome in &summary.outcomes {
        match outcome {
            WorkerOutcome::Completed(report) => {
                labels.push(report.label.clone());
                if report.label.ends_with("bob") {
                    assert_eq!(report.errors.len(), 2);
                    assert_eq!(report.errors[1].iteration, 1);
                } else {
                    assert!(report.is_success());
                }
            }
            WorkerOutcome::Failed { label, error } => panic!("{} failed: {}", label, error),
        }
    }
    assert_eq!(labels, vec!["worker 1 alice", "worker 2 bob"]);
}

#[tokio::test]
async fn test_load_test_reports_failed_authentication() {
    let server = MockServer::start_async().await;
    let login = server
        .mock_async(|when, then| {
            when.method(POST).path(common::LOGIN_PATH);
            then.status(500).body("maintenance");
        })
        .await;
    let plan = build_plan(
        &server,
        r#"{
            "TestIteration": 1,
            "TestData": [{"name": "alice"}],
            "Scenario": [{"name": "read", "url": "{base}/v1/notes"}]
        }"#,
    );
    let (_directory, cache) = common::build_cache();

    let summary = run_load_test(&common::build_config(&server), &cache, &plan).await;

    assert_eq!(summary.failed_workers(), 1);
    match &summary.outcomes[0] {
        WorkerOutcome::Failed { label, error } => {
            assert_eq!(label, "worker 1 alice");
            assert!(error.to_string().contains("status 500"));
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(login.hits_async().await, 1);
}
