//! Service configuration read from the environment.
//!
//! - `SURVEY_DB_PATH`: SQLite database file path (default: "survey.db")
//! - `SURVEY_FLUSH_ON_DROP`: save the graph when the service is dropped
//!   without an explicit shutdown (default: "true")

pub const DB_PATH_VAR: &str = "SURVEY_DB_PATH";
pub const FLUSH_ON_DROP_VAR: &str = "SURVEY_FLUSH_ON_DROP";

const DEFAULT_DB_PATH: &str = "survey.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub db_path: String,
    pub flush_on_drop: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_vars(
            std::env::var(DB_PATH_VAR).ok(),
            std::env::var(FLUSH_ON_DROP_VAR).ok(),
        )
    }

    fn from_vars(db_path: Option<String>, flush_on_drop: Option<String>) -> Self {
        ServiceConfig {
            db_path: db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            flush_on_drop: flush_on_drop.map_or(true, |v| parse_flag(&v)),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<String>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from_vars(None, None)
    }
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
