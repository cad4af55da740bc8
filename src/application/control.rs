//! Control surface messages exchanged with the external toggle UI

use serde::{Deserialize, Serialize};

use crate::application::{ApplicationError, ApplicationResult};

/// Inbound request, e.g. `{"action": "toggle"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlRequest {
    Toggle,
    GetState,
    Debug,
}

impl ControlRequest {
    pub fn from_json(text: &str) -> ApplicationResult<Self> {
        serde_json::from_str(text).map_err(ApplicationError::InvalidRequest)
    }
}

/// Response to a [`ControlRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ControlResponse {
    /// Answer to `toggle` and `getState`
    State { enabled: bool },
    /// Answer to `debug`: whether an ancestor currently resolves
    Debug { elements: bool },
}

impl ControlResponse {
    pub fn to_json(&self) -> String {
        // Plain structs of bools always serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Broadcast on every enable/disable transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleEvent {
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"action":"toggle"}"#, ControlRequest::Toggle)]
    #[case(r#"{"action":"getState"}"#, ControlRequest::GetState)]
    #[case(r#"{"action":"debug"}"#, ControlRequest::Debug)]
    fn given_json_message_when_parsing_then_maps_action(
        #[case] json: &str,
        #[case] expected: ControlRequest,
    ) {
        assert_eq!(ControlRequest::from_json(json).unwrap(), expected);
    }

    #[test]
    fn given_unknown_action_when_parsing_then_invalid_request() {
        let err = ControlRequest::from_json(r#"{"action":"explode"}"#).unwrap_err();
        assert!(matches!(err, ApplicationError::InvalidRequest(_)));
    }

    #[test]
    fn given_responses_when_serializing_then_flat_objects() {
        assert_eq!(
            ControlResponse::State { enabled: true }.to_json(),
            r#"{"enabled":true}"#
        );
        assert_eq!(
            ControlResponse::Debug { elements: false }.to_json(),
            r#"{"elements":false}"#
        );
    }
}
