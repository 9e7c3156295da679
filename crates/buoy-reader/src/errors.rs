use std::fmt;

use thiserror::Error;

use crate::model::DatasetError;

/// Coarse classification of a [`ReaderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Decode,
    Parse,
    Schema,
    Value,
    Dataset,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Decode => "decode",
            ErrorKind::Parse => "parse",
            ErrorKind::Schema => "schema",
            ErrorKind::Value => "value",
            ErrorKind::Dataset => "dataset",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("{source_label}: failed to read input: {error}")]
    Io {
        source_label: String,
        #[source]
        error: std::io::Error,
    },

    #[error("{source_label}: decode error: {message}")]
    Decode {
        source_label: String,
        message: String,
    },

    #[error("{source_label}: {}{message}", line_prefix(*.line_index))]
    Parse {
        source_label: String,
        line_index: Option<usize>,
        message: String,
    },

    #[error("{source_label}: CSV error: {error}")]
    Csv {
        source_label: String,
        #[source]
        error: csv::Error,
    },

    #[error("{source_label}: missing column(s) {} required for {context}", quoted(.missing))]
    MissingColumns {
        source_label: String,
        missing: Vec<String>,
        context: &'static str,
    },

    #[error("{source_label}: '{name}' already exists ({context})")]
    NameConflict {
        source_label: String,
        name: String,
        context: &'static str,
    },

    #[error("{source_label}: line {line_index} column '{column}': {message}")]
    Value {
        source_label: String,
        line_index: usize,
        column: String,
        message: String,
    },

    #[error("{source_label}: {error}")]
    Dataset {
        source_label: String,
        #[source]
        error: DatasetError,
    },
}

impl ReaderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReaderError::Io { .. } => ErrorKind::Io,
            ReaderError::Decode { .. } => ErrorKind::Decode,
            ReaderError::Parse { .. } | ReaderError::Csv { .. } => ErrorKind::Parse,
            ReaderError::MissingColumns { .. } | ReaderError::NameConflict { .. } => {
                ErrorKind::Schema
            }
            ReaderError::Value { .. } => ErrorKind::Value,
            ReaderError::Dataset { .. } => ErrorKind::Dataset,
        }
    }

    /// Label of the input (usually the file path) the error refers to.
    pub fn source_label(&self) -> &str {
        match self {
            ReaderError::Io { source_label, .. }
            | ReaderError::Decode { source_label, .. }
            | ReaderError::Parse { source_label, .. }
            | ReaderError::Csv { source_label, .. }
            | ReaderError::MissingColumns { source_label, .. }
            | ReaderError::NameConflict { source_label, .. }
            | ReaderError::Value { source_label, .. }
            | ReaderError::Dataset { source_label, .. } => source_label,
        }
    }

    pub(crate) fn parse(source: &str, line_index: Option<usize>, message: impl Into<String>) -> Self {
        ReaderError::Parse {
            source_label: source.to_string(),
            line_index,
            message: message.into(),
        }
    }

    pub(crate) fn value(
        source: &str,
        line_index: usize,
        column: &str,
        message: impl Into<String>,
    ) -> Self {
        ReaderError::Value {
            source_label: source.to_string(),
            line_index,
            column: column.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn missing_columns(
        source: &str,
        missing: Vec<String>,
        context: &'static str,
    ) -> Self {
        ReaderError::MissingColumns {
            source_label: source.to_string(),
            missing,
            context,
        }
    }

    pub(crate) fn dataset(source: &str, error: DatasetError) -> Self {
        ReaderError::Dataset {
            source_label: source.to_string(),
            error,
        }
    }
}

fn line_prefix(line_index: Option<usize>) -> String {
    match line_index {
        Some(line) => format!("line {line}: "),
        None => String::new(),
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("'{name}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, ReaderError>;
