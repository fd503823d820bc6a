pub type MailplateResult<T> = std::result::Result<T, MailplateError>;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    UnexpectedToken {
        expected: String,
        found: String,
    },
    UnexpectedEOF {
        /// Describes what was expected, e.g., " (expected '$endif')"
        expected_what: String,
    },
    /// A `$` that does not start any known tag.
    InvalidTag {
        at: String,
    },
    UnterminatedLiteral,
    /// Blocks nested deeper than the parser accepts.
    NestingTooDeep {
        limit: usize,
    },
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedToken { expected, found } => {
                write!(f, "Expected {}, found {}", expected, found)
            }
            Self::UnexpectedEOF { expected_what } => {
                write!(f, "Unexpected EOF{}", expected_what)
            }
            Self::InvalidTag { at } => {
                write!(f, "Invalid tag starting with '{}' (use '$$' for a literal dollar)", at)
            }
            Self::UnterminatedLiteral => {
                write!(f, "Unterminated quoted literal, expected closing '\"'")
            }
            Self::NestingTooDeep { limit } => {
                write!(f, "Blocks nested more than {} deep", limit)
            }
        }
    }
}

impl std::error::Error for ParseErrorKind {}

impl ParseErrorKind {
    pub fn unexpected_eof(expected: Option<&str>) -> Self {
        Self::UnexpectedEOF {
            expected_what: expected.map_or_else(String::new, |e| format!(" (expected {})", e)),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub kind: ParseErrorKind,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Parse error at line {}, column {}: {}",
            self.line, self.column, self.kind
        )
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Failure reported by a [`crate::Procedure`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcedureError {
    message: String,
}

impl ProcedureError {
    pub fn new<T: Into<String>>(message: T) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ProcedureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProcedureError {}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MailplateError {
    TemplateExists {
        template_name: String,
    },
    MissingTemplate {
        template_name: String,
    },
    /// A procedure invoked through `$call` failed; rendering was aborted.
    Procedure {
        name: String,
        message: String,
    },
    Config {
        message: String,
    },
    /// A document could not be read from its serialized form.
    InvalidDocument {
        message: String,
    },
    Parse(ParseError),
}

impl MailplateError {
    pub(crate) fn procedure(name: &str, error: &ProcedureError) -> Self {
        Self::Procedure {
            name: name.to_string(),
            message: error.message().to_string(),
        }
    }
}

impl std::fmt::Display for MailplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateExists { template_name } => {
                write!(f, "Template already exists: {}", template_name)
            }
            Self::MissingTemplate { template_name } => {
                write!(f, "Template not found: {}", template_name)
            }
            Self::Procedure { name, message } => {
                write!(f, "Procedure '{}' failed: {}", name, message)
            }
            Self::Config { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
            Self::InvalidDocument { message } => {
                write!(f, "Invalid document: {}", message)
            }
            Self::Parse(parse_error) => {
                write!(f, "{}", parse_error)
            }
        }
    }
}

impl std::error::Error for MailplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(parse_error) => Some(parse_error),
            Self::TemplateExists { .. }
            | Self::MissingTemplate { .. }
            | Self::Procedure { .. }
            | Self::Config { .. }
            | Self::InvalidDocument { .. } => None,
        }
    }
}

impl From<ParseError> for MailplateError {
    fn from(error: ParseError) -> Self {
        Self::Parse(error)
    }
}
