//! User-related models

use serde::{Deserialize, Serialize};

/// User identity as carried by messages and live events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub display_name: Option<String>,
}

impl UserRef {
    /// Display name when the server provided one, raw id otherwise
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}
