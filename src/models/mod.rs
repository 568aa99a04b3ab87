// Data models and DTOs
// Inbound webhook payloads, outbound patch documents, API responses.

pub mod webhook;
pub mod work_item;

pub use webhook::ValidPayload;
pub use work_item::{PatchDocument, PatchOp, PatchOperation, WorkItemCreatedResponse, WorkItemResult};
