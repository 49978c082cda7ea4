//! JSON request and response bodies.
//!
//! ```json
//! {"expressions": ["(set \"x\" 5)", "(add x 3)"]}
//! {"output": ["8"]}
//! ```
//!
//! Transport (HTTP, status codes, headers) is the caller's concern.

use serde::{Deserialize, Serialize};

use crate::batch::{BatchOutcome, run_batch};

/// An ordered batch of expressions to evaluate together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub expressions: Vec<String>,
}

/// The output log of a batch, or `["ERROR at line N"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub output: Vec<String>,
}

impl From<BatchOutcome> for BatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        BatchResponse {
            output: outcome.into_output(),
        }
    }
}

impl BatchRequest {
    pub fn evaluate(&self) -> BatchResponse {
        run_batch(self.expressions.as_slice()).into()
    }
}

/// Deserialize a request body, run the batch and serialize the response.
///
/// Only a malformed body is an `Err`; evaluation failures are reported
/// inside the response's `output`.
pub fn handle_request_body(body: &str) -> Result<String, serde_json::Error> {
    let request: BatchRequest = serde_json::from_str(body)?;
    serde_json::to_string(&request.evaluate())
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_bodies() {
        let test_cases = vec![
            (
                json!({"expressions": ["(puts \"hi\")", "(puts \"bye\")"]}),
                json!({"output": ["hi", "bye"]}),
            ),
            (
                json!({"expressions": ["(set \"x\" 5)", "(add x 3)"]}),
                json!({"output": ["8"]}),
            ),
            (
                json!({"expressions": ["(puts \"a\")", "(divide 1 0)"]}),
                json!({"output": ["ERROR at line 2"]}),
            ),
            (json!({"expressions": []}), json!({"output": []})),
            // Unknown fields are ignored
            (
                json!({"expressions": ["(str 2.0)"], "id": 7}),
                json!({"output": ["2.0"]}),
            ),
        ];

        for (i, (request, expected)) in test_cases.into_iter().enumerate() {
            let body = handle_request_body(&request.to_string()).unwrap();
            let actual: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(actual, expected, "Wire test #{}: {request}", i + 1);
        }
    }

    #[test]
    fn test_malformed_bodies() {
        for body in [
            "",
            "not json",
            "{}",
            r#"{"expressions": "(str 1)"}"#,
            r#"{"expressions": [1, 2]}"#,
        ] {
            assert!(handle_request_body(body).is_err(), "body {body:?} should be rejected");
        }
    }

    #[test]
    fn test_typed_round_trip() {
        let request = BatchRequest {
            expressions: vec!["(concat \"a\" \"b\")".to_owned()],
        };
        let response = request.evaluate();
        assert_eq!(response.output, ["ab"]);

        let body = serde_json::to_string(&response).unwrap();
        assert_eq!(body, r#"{"output":["ab"]}"#);
    }
}
