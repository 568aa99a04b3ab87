use serde::Serialize;
use tracing::error;

use crate::models::{PatchDocument, PatchOperation};

pub const TITLE_PREFIX: &str = "Wiz - ";
pub const TITLE_FIELD: &str = "/fields/System.Title";
pub const DESCRIPTION_FIELD: &str = "/fields/System.Description";
pub const DESCRIPTION_FALLBACK: &str =
    "<p>Error formatting webhook payload for description. Check logs.</p>";

/// Map a validated webhook into the work item patch document.
///
/// Never fails: if the payload cannot be serialized the description falls back
/// to [`DESCRIPTION_FALLBACK`].
pub fn build_patch<P>(title: &str, payload: &P) -> PatchDocument
where
    P: Serialize + ?Sized,
{
    let description = match serde_json::to_string_pretty(payload) {
        Ok(json) => format!("<p>Raw Webhook Payload:</p><pre>{}</pre>", escape_html(&json)),
        Err(e) => {
            error!(error = %e, "Error formatting JSON for description");
            DESCRIPTION_FALLBACK.to_string()
        }
    };

    PatchDocument(vec![
        PatchOperation::add(TITLE_FIELD, format!("{}{}", TITLE_PREFIX, title)),
        PatchOperation::add(DESCRIPTION_FIELD, description),
    ])
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
