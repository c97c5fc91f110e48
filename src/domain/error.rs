//! Domain error types.

/// A grammar error with position information for expression parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Top-level error type for factortrader.
#[derive(Debug, thiserror::Error)]
pub enum FactorError {
    #[error(transparent)]
    Grammar(#[from] ParseError),

    #[error("unresolved reference '{name}' at position {position}")]
    UnresolvedReference { name: String, position: usize },

    #[error("degenerate input to {operator}: {reason}")]
    DegenerateInput { operator: String, reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid price {price} for {stock}")]
    InvalidPrice { stock: String, price: f64 },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FactorError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        FactorError::Configuration {
            reason: reason.into(),
        }
    }

    pub fn degenerate(operator: &str, reason: impl Into<String>) -> Self {
        FactorError::DegenerateInput {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }

    /// True for errors caused by the expression text itself.
    pub fn is_expression_error(&self) -> bool {
        matches!(
            self,
            FactorError::Grammar(_) | FactorError::UnresolvedReference { .. }
        )
    }

    /// True for errors caused by run configuration or panel schema.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            FactorError::Configuration { .. }
                | FactorError::ConfigParse { .. }
                | FactorError::ConfigMissing { .. }
                | FactorError::ConfigInvalid { .. }
        )
    }

    /// Render expression errors with a caret under the offending character.
    pub fn display_with_context(&self, input: &str) -> String {
        match self {
            FactorError::Grammar(e) => e.display_with_context(input),
            FactorError::UnresolvedReference { position, .. } => {
                let caret = " ".repeat(*position) + "^";
                format!("{input}\n{caret}\n{self}")
            }
            other => other.to_string(),
        }
    }
}

impl From<&FactorError> for std::process::ExitCode {
    fn from(err: &FactorError) -> Self {
        let code: u8 = match err {
            FactorError::Io(_) => 1,
            FactorError::Configuration { .. }
            | FactorError::ConfigParse { .. }
            | FactorError::ConfigMissing { .. }
            | FactorError::ConfigInvalid { .. } => 2,
            FactorError::Data { .. } => 3,
            FactorError::Grammar(_) | FactorError::UnresolvedReference { .. } => 4,
            FactorError::DegenerateInput { .. } => 5,
            FactorError::InvalidPrice { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
