use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

mod common;

use gander::prelude::*;

// Test cases as written in a `--test-case` file, pointed at the mock server.
fn build_cases(server: &MockServer) -> TestCases {
    let cases = json!({
        "TestCases": [
            {"name": "list", "url": server.url("/v1/items")},
            {"name": "create", "url": server.url("/v1/items"), "method": "POST", "data": {"name": "widget"}},
            {"name": "broken", "url": server.url("/v1/broken")},
            {"name": "patch", "url": server.url("/v1/items"), "method": "PATCH"}
        ]
    });
    serde_json::from_value(cases).expect("failed to parse test cases")
}

#[tokio::test]
async fn test_each_case_runs_once() {
    let server = MockServer::start_async().await;
    let _oauth = common::mock_oauth(&server, 3600, 300).await;
    let list = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/items");
            then.status(200).json_body(json!({"items": [], "count": 0}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/items")
                .json_body(json!({"name": "widget"}));
            then.status(201).json_body(json!({"id": 7}));
        })
        .await;
    let broken = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/broken");
            then.status(502).body("Bad Gateway");
        })
        .await;
    let (_directory, cache) = common::build_cache();
    let mut client = OAuthClient::connect(common::build_config(&server), cache)
        .await
        .unwrap();
    let cases = build_cases(&server);

    let mut out = Vec::new();
    let summaries = run_test_cases(&mut client, &cases.test_cases, true, &mut out)
        .await
        .unwrap();
    let output = String::from_utf8(out).unwrap();

    assert_eq!(list.hits_async().await, 1);
    assert_eq!(create.hits_async().await, 1);
    assert_eq!(broken.hits_async().await, 1);

    let statuses: Vec<Option<u16>> = summaries.iter().map(|s| s.status).collect();
    assert_eq!(statuses, vec![Some(200), Some(201), Some(502), None]);
    assert_eq!(summaries[2].result, "Bad Gateway");
    assert!(summaries[3].result.contains("PATCH"));

    assert!(output.contains("Running : list\nStatus: 200\n{\n    \"count\": 0,\n    \"items\": []\n}\n"));
    assert!(output.contains("Running : broken\nStatus: 502\nResponse is not a JSON format."));

    let table = summary_table(&summaries).to_string();
    for header in &["TestName", "RCode", "Result"] {
        assert!(table.contains(header));
    }
    assert!(table.contains("create"));
    assert!(table.contains("502"));
}

#[tokio::test]
async fn test_without_detail_only_names_are_printed() {
    let server = MockServer::start_async().await;
    let _oauth = common::mock_oauth(&server, 3600, 300).await;
    let _items = server
        .mock_async(|when, then| {
            when.path("/v1/items");
            then.status(200).body("{}");
        })
        .await;
    let _broken = server
        .mock_async(|when, then| {
            when.path("/v1/broken");
            then.status(500);
        })
        .await;
    let (_directory, cache) = common::build_cache();
    let mut client = OAuthClient::connect(common::build_config(&server), cache)
        .await
        .unwrap();
    let cases = build_cases(&server);

    let mut out = Vec::new();
    run_test_cases(&mut client, &cases.test_cases, false, &mut out)
        .await
        .unwrap();
    let output = String::from_utf8(out).unwrap();

    assert_eq!(
        output,
        "Running : list\nRunning : create\nRunning : broken\nRunning : patch\n"
    );
}
