use serde::{Deserialize, Serialize};

use crate::domain::Plug;

pub const STATUS_OK: &str = "ok";

/// Response body of the catalog's plug list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlugListResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startkey: Option<i64>,
    #[serde(default)]
    pub result: Vec<String>,
}

impl PlugListResponse {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn into_plugs(self) -> Vec<Plug> {
        self.result.into_iter().map(Plug::new).collect()
    }
}
