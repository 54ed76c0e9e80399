#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} not found or not executable")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} {args:?} failed ({}):\n{stderr}", format_status(*status))]
    CommandFailed {
        program: String,
        args: Vec<String>,
        /// Exit code; `None` when terminated by a signal
        status: Option<i32>,
        stderr: String,
    },

    #[error("{program} output was not valid UTF-8")]
    InvalidUtf8 {
        program: String,
        source: std::string::FromUtf8Error,
    },
}

impl ExecError {
    /// Exit code of a command that ran and failed.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { status, .. } => *status,
            _ => None,
        }
    }
}

fn format_status(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_owned(),
    }
}
