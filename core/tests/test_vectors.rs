//! Verify `build_request`/`check_response` against JSON test vectors stored
//! in `test-vectors/`.
//!
//! Each case describes the `Request` options, the expected `HttpRequest`, a
//! simulated `HttpResponse`, and either the expected result or the expected
//! error kind with its display message.

use adt_core::{Accept, ApiError, Connection, ConnectionConfig, HttpMethod, HttpResponse, Request};
use serde_json::Value;

fn connection() -> Connection {
    Connection::new(ConnectionConfig::new("localhost", "357", "user", "password"))
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        "PUT" => HttpMethod::Put,
        "DELETE" => HttpMethod::Delete,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|pair| {
                    let pair = pair.as_array().unwrap();
                    (
                        pair[0].as_str().unwrap().to_string(),
                        pair[1].as_str().unwrap().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

fn request(value: &Value) -> Request {
    Request {
        params: pairs(&value["params"]),
        headers: pairs(&value["headers"]),
        content_type: value["content_type"].as_str().map(str::to_string),
        accept: value["accept"].as_array().map(|candidates| {
            Accept::new(candidates.iter().map(|c| c.as_str().unwrap().to_string()))
        }),
        body: value["body"].as_str().map(str::to_string),
    }
}

fn error_kind(err: &ApiError) -> &'static str {
    match err {
        ApiError::Parse(_) => "Parse",
        ApiError::Serialization(_) => "Serialization",
        ApiError::Adt { .. } => "Adt",
        ApiError::HttpRequest { .. } => "HttpRequest",
        ApiError::UnexpectedResponseContent { .. } => "UnexpectedResponseContent",
        ApiError::Transport(_) => "Transport",
        ApiError::MissingLockHandle(_) => "MissingLockHandle",
        ApiError::NoEditor(_) => "NoEditor",
        ApiError::Config(_) => "Config",
    }
}

#[test]
fn execute_test_vectors() {
    let raw = include_str!("../../test-vectors/execute.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    let conn = connection();
    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let method = parse_method(case["method"].as_str().unwrap());
        let options = request(&case["request"]);

        // Verify build
        let built = conn.build_request(method, case["path"].as_str().unwrap(), &options);
        let expected = &case["expected_request"];
        assert_eq!(built.method, method, "{name}: method");
        assert_eq!(built.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(built.headers, pairs(&expected["headers"]), "{name}: headers");
        assert_eq!(built.body.as_deref(), expected["body"].as_str(), "{name}: body");

        // Verify check
        let sim = &case["simulated_response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: pairs(&sim["headers"]),
            body: sim["body"].as_str().unwrap().to_string(),
        };
        let checked = conn.check_response(&options, response);

        if let Some(expected_error) = case.get("expected_error") {
            let err = checked.expect_err(name);
            assert_eq!(error_kind(&err), expected_error["kind"].as_str().unwrap(), "{name}: kind");
            assert_eq!(err.to_string(), expected_error["message"].as_str().unwrap(), "{name}: message");
        } else {
            let response = checked.unwrap_or_else(|err| panic!("{name}: unexpected error {err}"));
            let expected = &case["expected_result"];
            assert_eq!(u64::from(response.status), expected["status"].as_u64().unwrap(), "{name}: status");
            assert_eq!(response.body, expected["body"].as_str().unwrap(), "{name}: body");
        }
    }
}
