use thiserror::Error;

/// Failure to turn descriptor text into dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{}{message}", line.map(|l| format!("line {l}: ")).unwrap_or_default())]
    Malformed { message: String, line: Option<usize> },
}

impl ParseError {
    pub fn malformed(message: impl Into<String>, line: Option<usize>) -> Self {
        ParseError::Malformed {
            message: message.into(),
            line,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Malformed { line, .. } => *line,
        }
    }
}
