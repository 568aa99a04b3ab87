use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-patch operation kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Replace,
    Remove,
    Test,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    pub value: Value,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: value.into(),
        }
    }
}

/// Ordered field operations, sent to the work item API as a JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct PatchDocument(pub Vec<PatchOperation>);

impl PatchDocument {
    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    /// Value of the first operation targeting `path`
    pub fn value_of(&self, path: &str) -> Option<&Value> {
        self.0.iter().find(|op| op.path == path).map(|op| &op.value)
    }
}

/// Identifier and link of a freshly created work item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemResult {
    pub id: i64,
    pub url: String,
}

/// Body of the 201 response returned to the webhook sender
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkItemCreatedResponse {
    pub message: String,
    pub work_item_id: i64,
    pub url: String,
}

impl From<WorkItemResult> for WorkItemCreatedResponse {
    fn from(result: WorkItemResult) -> Self {
        Self {
            message: "Work item created successfully".to_string(),
            work_item_id: result.id,
            url: result.url,
        }
    }
}
