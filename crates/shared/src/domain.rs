use serde::{Deserialize, Serialize};

/// Well-known plug identifiers as reported by the charging-station catalog.
pub mod plug_ids {
    pub const TYPE_1: &str = "Typ1";
    pub const TYPE_2: &str = "Typ2";
    pub const TYPE_3: &str = "Typ3";
    pub const CCS: &str = "CCS";
    pub const SCHUKO: &str = "Schuko";
    pub const CHADEMO: &str = "CHAdeMO";
    pub const SUPERCHARGER: &str = "Tesla Supercharger";
    pub const CEE_BLAU: &str = "CEE Blau";
    pub const CEE_ROT: &str = "CEE Rot";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plug {
    pub name: String,
}

impl Plug {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Boolean,
    MultipleChoice,
    Slider,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Boolean => "boolean",
            ValueKind::MultipleChoice => "multiple_choice",
            ValueKind::Slider => "slider",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
