use serde_json::{Map, Value};

/// A webhook body that passed validation.
///
/// The full object is kept so it can be embedded in the work item description.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPayload {
    pub payload: Map<String, Value>,
    /// `control.name`, used as the work item title
    pub title: String,
    /// `workItemType` from the payload, or the configured default
    pub work_item_type: String,
}
