//! Wire format between the Rust side and the Node sidecar.
//!
//! One JSON object per line in each direction. Requests carry a sequential
//! `id` plus an `op` tag; every request gets exactly one response with the
//! same `id`, either `{"id":N,"ok":true,"value":...}` or
//! `{"id":N,"ok":false,"error":{"name":...,"message":...}}`. The sidecar
//! never pushes unsolicited messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One operation for the sidecar, tagged with `op`. Frame-scoped variants
/// carry the CSS selector of the iframe element; `None` targets the main
/// page.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Launch {
        headless: bool,
        slow_mo_ms: u64,
    },
    Navigate {
        url: String,
        timeout_ms: u64,
    },
    Fill {
        frame: Option<String>,
        selector: String,
        value: String,
    },
    Select {
        frame: Option<String>,
        selector: String,
        value: String,
    },
    Click {
        frame: Option<String>,
        selector: String,
    },
    Check {
        frame: Option<String>,
        selector: String,
        force: bool,
    },
    WaitFor {
        frame: Option<String>,
        selector: String,
        state: String,
        timeout_ms: u64,
    },
    IsVisible {
        frame: Option<String>,
        selector: String,
    },
    Count {
        frame: Option<String>,
        selector: String,
    },
    InnerText {
        frame: Option<String>,
        selector: String,
    },
    Content {
        frame: Option<String>,
    },
    Evaluate {
        script: String,
    },
    EvalOn {
        frame: Option<String>,
        selector: String,
        script: String,
    },
    Screenshot {
        path: String,
        full_page: bool,
    },
    ClosePage,
    CloseBrowser,
}

/// Request line sent to the sidecar.
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub id: u64,
    #[serde(flatten)]
    pub command: Command,
}

/// Response line from the sidecar.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub error: Option<WireError>,
}

/// Error payload the sidecar reports for a failed operation. `name` is the
/// JavaScript error class when one is known.
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    #[serde(default)]
    pub name: Option<String>,
    pub message: String,
}

impl WireError {
    pub fn is_timeout(&self) -> bool {
        matches!(self.name.as_deref(), Some("TimeoutError"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_lines_carry_the_op_tag() {
        let request = Request {
            id: 7,
            command: Command::Navigate {
                url: "https://rvsq.gouv.qc.ca/prendrerendezvous/Principale.aspx".into(),
                timeout_ms: 60_000,
            },
        };
        let line = serde_json::to_value(&request).unwrap();
        assert_eq!(line["id"], 7);
        assert_eq!(line["op"], "navigate");
        assert_eq!(line["timeout_ms"], 60_000);
    }

    #[test]
    fn test_unit_commands_serialize_as_tag_only() {
        let request = Request {
            id: 1,
            command: Command::ClosePage,
        };
        let line = serde_json::to_value(&request).unwrap();
        assert_eq!(line["id"], 1);
        assert_eq!(line["op"], "close_page");
    }

    #[test]
    fn test_frame_scope_serializes_as_nullable_field() {
        let scoped = serde_json::to_value(Command::Click {
            frame: Some("iframe[src*='hub.bonjour-sante.ca']".into()),
            selector: "button#confirm".into(),
        })
        .unwrap();
        assert_eq!(scoped["frame"], "iframe[src*='hub.bonjour-sante.ca']");

        let main = serde_json::to_value(Command::Click {
            frame: None,
            selector: "#btnToutAccepter".into(),
        })
        .unwrap();
        assert!(main["frame"].is_null());
    }

    #[test]
    fn test_success_response_deserializes() {
        let response: Response =
            serde_json::from_str(r#"{"id":3,"ok":true,"value":true}"#).unwrap();
        assert_eq!(response.id, 3);
        assert!(response.ok);
        assert_eq!(response.value, Some(Value::Bool(true)));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_error_response_deserializes_with_name() {
        let response: Response = serde_json::from_str(
            r#"{"id":4,"ok":false,"error":{"name":"TimeoutError","message":"locator.waitFor: Timeout 60000ms exceeded"}}"#,
        )
        .unwrap();
        let error = response.error.expect("error payload");
        assert!(error.is_timeout());
        assert!(error.message.contains("60000ms"));
    }

    #[test]
    fn test_error_name_is_optional() {
        let response: Response = serde_json::from_str(
            r#"{"id":5,"ok":false,"error":{"message":"browser has been closed"}}"#,
        )
        .unwrap();
        let error = response.error.expect("error payload");
        assert!(!error.is_timeout());
        assert_eq!(error.name, None);
    }
}
