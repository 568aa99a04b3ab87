//! Inbound webhook validation.
//!
//! The body is parsed by hand rather than through an extractor so that any
//! content type is accepted and every failure maps to one of the variants below.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::ValidPayload;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please pass a valid JSON object in the request body")]
    MalformedJson,

    #[error("Webhook payload must contain a 'control' object")]
    MissingControlObject,

    #[error("Webhook payload's 'control' object must contain a 'name' field for the work item title")]
    MissingTitle,
}

impl ValidationError {
    /// Payload field the error refers to
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::MalformedJson => None,
            ValidationError::MissingControlObject => Some("control"),
            ValidationError::MissingTitle => Some("control.name"),
        }
    }
}

/// Parse and validate a raw webhook body.
///
/// `default_work_item_type` is used when the payload carries no usable
/// `workItemType`.
pub fn validate(raw_body: &[u8], default_work_item_type: &str) -> Result<ValidPayload, ValidationError> {
    let payload = match serde_json::from_slice::<Value>(raw_body) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(kind = json_kind(&other), "Webhook body is JSON but not an object");
            return Err(ValidationError::MalformedJson);
        }
        Err(e) => {
            warn!(error = %e, "Invalid JSON received in webhook request body");
            return Err(ValidationError::MalformedJson);
        }
    };

    let control = match payload.get("control") {
        Some(Value::Object(control)) => control,
        _ => {
            warn!("Webhook payload has no 'control' object");
            return Err(ValidationError::MissingControlObject);
        }
    };

    let title = match control.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => {
            warn!("Webhook payload's 'control' object has no usable 'name'");
            return Err(ValidationError::MissingTitle);
        }
    };

    let work_item_type = match payload.get("workItemType") {
        Some(Value::String(kind)) if !kind.trim().is_empty() => kind.clone(),
        _ => default_work_item_type.to_string(),
    };

    Ok(ValidPayload {
        payload,
        title,
        work_item_type,
    })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
