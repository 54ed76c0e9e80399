use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no imprint.toml found at {path} — declare targets there before building")]
    ConfigNotFound { path: PathBuf },

    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("target '{target}' is invalid: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("target '{0}' is declared more than once")]
    DuplicateTarget(String),

    #[error("unknown target '{name}'; declared targets: {}", format_names(declared))]
    UnknownTarget { name: String, declared: Vec<String> },

    // ── Fingerprinting ──
    #[error("declared input not found: {path}")]
    InputNotFound { path: PathBuf },

    #[error("failed to read input {path}")]
    InputUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

fn format_names(names: &[String]) -> String {
    if names.is_empty() {
        "(none)".to_owned()
    } else {
        names.join(", ")
    }
}
