use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of a GraphQL response `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            error_type: None,
        }
    }
}

#[derive(Debug, Error)]
#[error("graphql request failed: {}", join_messages(.errors))]
pub struct GraphqlFailure {
    pub errors: Vec<GraphqlError>,
}

impl GraphqlFailure {
    pub fn new(errors: Vec<GraphqlError>) -> Self {
        Self { errors }
    }
}

fn join_messages(errors: &[GraphqlError]) -> String {
    if errors.is_empty() {
        return "response carried no data".to_string();
    }
    errors
        .iter()
        .map(|err| match &err.error_type {
            Some(kind) => format!("{kind}: {}", err.message),
            None => err.message.clone(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<Vec<GraphqlError>> for GraphqlFailure {
    fn from(value: Vec<GraphqlError>) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_joins_typed_and_untyped_errors() {
        let mut typed = GraphqlError::new("not authorized");
        typed.error_type = Some("Unauthorized".to_string());
        let failure = GraphqlFailure::new(vec![typed, GraphqlError::new("boom")]);

        assert_eq!(
            failure.to_string(),
            "graphql request failed: Unauthorized: not authorized; boom"
        );
    }

    #[test]
    fn empty_failure_reports_missing_data() {
        let failure = GraphqlFailure::new(Vec::new());
        assert!(failure.to_string().contains("no data"));
    }
}
