// Business services
// Webhook validation, patch building and the Azure DevOps client.

pub mod devops_client;
pub mod webhook_validator;
pub mod work_item_builder;

pub use devops_client::{DevOpsClient, DevOpsError};
pub use webhook_validator::{validate, ValidationError};
pub use work_item_builder::build_patch;
