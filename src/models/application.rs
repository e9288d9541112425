use serde::Serialize;

/// The five monitored applications. Each one owns its own database file;
/// rows never cross stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Application {
    CvarAll,
    CvarNyq,
    Xva,
    Reg,
    Others,
}

pub const ALL_APPLICATIONS: [Application; 5] = [
    Application::CvarAll,
    Application::CvarNyq,
    Application::Xva,
    Application::Reg,
    Application::Others,
];

impl Application {
    /// Display name as stored in `application_name` columns.
    pub fn name(&self) -> &'static str {
        match self {
            Application::CvarAll => "CVAR ALL",
            Application::CvarNyq => "CVAR NYQ",
            Application::Xva => "XVA",
            Application::Reg => "REG",
            Application::Others => "OTHERS",
        }
    }

    /// Database file name under the data directory.
    pub fn db_file(&self) -> &'static str {
        match self {
            Application::CvarAll => "cvar_all.db",
            Application::CvarNyq => "cvar_nyq.db",
            Application::Xva => "xva.db",
            Application::Reg => "reg.db",
            Application::Others => "others.db",
        }
    }

    /// Parse a user- or API-supplied name (case-insensitive).
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "CVAR ALL" => Some(Application::CvarAll),
            "CVAR NYQ" => Some(Application::CvarNyq),
            "XVA" => Some(Application::Xva),
            "REG" => Some(Application::Reg),
            "OTHERS" => Some(Application::Others),
            _ => None,
        }
    }

    pub fn is_cvar(&self) -> bool {
        matches!(self, Application::CvarAll | Application::CvarNyq)
    }
}
