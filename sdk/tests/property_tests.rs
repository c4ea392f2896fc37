use proptest::prelude::*;
use sdk::errors::{EngineError, EngineErrorExt};
use sdk::types::ToolResult;

// User hints are static text and never echo the raw error detail, which may
// contain remote payloads or credentials.
proptest! {
    #[test]
    fn test_error_user_hint_never_echoes_detail(detail in "[a-zA-Z0-9_]{12,40}") {
        let errs = vec![
            EngineError::Config(detail.clone()),
            EngineError::LLMProvider(detail.clone()),
            EngineError::Transport(detail.clone()),
            EngineError::ToolExecution(detail.clone()),
            EngineError::Publish(detail.clone()),
            EngineError::OrchestrationExhausted { limit: 8, publish: detail.clone() },
        ];

        for err in errs {
            let hint = err.user_hint();
            prop_assert!(!hint.is_empty());
            prop_assert!(!hint.contains(&detail));
        }
    }
}

// Whatever message a handler produces, the tool-result content stays valid
// JSON with an explicit error status.
proptest! {
    #[test]
    fn test_error_envelope_content_is_always_json(message in "\\PC*") {
        let content = ToolResult::error(message.clone()).to_content();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        prop_assert_eq!(value["status"].as_str(), Some("error"));
        prop_assert_eq!(value["error"].as_str(), Some(message.as_str()));
    }
}
