use serde::{Deserialize, Serialize};

/// Discriminator tag identifying what a physical row represents.
/// Exactly one `main` row exists per grouping key; the child kinds are
/// stored as fully independent rows aligned by position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    Main,
    Prb,
    Hiim,
    Issue,
}

impl RowKind {
    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            RowKind::Main => "main",
            RowKind::Prb => "prb",
            RowKind::Hiim => "hiim",
            RowKind::Issue => "issue",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "main" => Some(RowKind::Main),
            "prb" => Some(RowKind::Prb),
            "hiim" => Some(RowKind::Hiim),
            "issue" => Some(RowKind::Issue),
            _ => None,
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, RowKind::Main)
    }
}

/// Kind selector for the row-level filter path. `TimeLoss` is not a stored
/// row kind: it matches issue rows (and legacy main rows) carrying a
/// meaningful time-loss value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    Prb,
    Hiim,
    Issue,
    TimeLoss,
}

impl RowFilter {
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "prb" => Some(RowFilter::Prb),
            "hiim" => Some(RowFilter::Hiim),
            "issue" => Some(RowFilter::Issue),
            "time_loss" | "timeloss" => Some(RowFilter::TimeLoss),
            _ => None,
        }
    }
}
