//! Error types for every phase from source text to rendered scene.

use std::fmt;

use crate::capability::ResolutionError;
use crate::interpreter::Exception;
use crate::value::Value;

/// Everything that can go wrong between source text and a rendered scene.
///
/// Each variant renders as one placeholder box; `title` names the phase and
/// `message` is the diagnostic shown verbatim inside it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error("{0}")]
    Load(ScriptFailure),
    #[error("{failure}")]
    Render {
        phase: RenderPhase,
        failure: ScriptFailure,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transform,
    Resolution,
    Load,
    Render,
    Configuration,
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transform(_) => ErrorKind::Transform,
            Self::Resolution(_) => ErrorKind::Resolution,
            Self::Load(_) => ErrorKind::Load,
            Self::Render { .. } => ErrorKind::Render,
            Self::Configuration(_) => ErrorKind::Configuration,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Transform => "Transformation Error",
            ErrorKind::Resolution => "Resolution Error",
            ErrorKind::Load => "Load Error",
            ErrorKind::Render => "Render Error",
            ErrorKind::Configuration => "Configuration Error",
        }
    }

    /// Diagnostic text for the placeholder. Transform errors show the full
    /// ariadne report.
    pub fn message(&self) -> String {
        match self {
            Self::Transform(error) => error.report.clone(),
            other => other.to_string(),
        }
    }

    /// Maps an exception that escaped a load.
    pub(crate) fn from_load(exception: Exception) -> Self {
        match exception {
            Exception::Resolution(error) => Self::Resolution(error),
            other => Self::Load(ScriptFailure::from(other)),
        }
    }

    /// Maps an exception that escaped a render.
    pub(crate) fn from_render(phase: RenderPhase, exception: Exception) -> Self {
        match exception {
            Exception::Resolution(error) => Self::Resolution(error),
            other => Self::Render {
                phase,
                failure: ScriptFailure::from(other),
            },
        }
    }
}

/// The source could not be parsed or lowered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {line}:{column}")]
pub struct TransformError {
    pub message: String,
    /// 1-based.
    pub line: usize,
    /// 1-based, in characters.
    pub column: usize,
    /// ariadne report, rendered without colour.
    pub report: String,
}

/// Failure raised by loaded code (or by the interpreter on its behalf).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFailure {
    /// Error name, e.g. `TypeError`; empty for non-error throws.
    pub name: String,
    pub message: String,
}

impl ScriptFailure {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Message taken from the thrown value's `message` member when it has
    /// one, its string form otherwise.
    pub fn from_thrown(value: &Value) -> Self {
        let member = |key: &str| {
            value
                .entries()
                .and_then(|entries| entries.into_iter().find(|(name, _)| &**name == key))
                .map(|(_, value)| value)
        };
        match member("message") {
            Some(message) if !matches!(value, Value::Array(_)) => Self {
                name: member("name").map(|name| name.to_display()).unwrap_or_default(),
                message: message.to_display(),
            },
            _ => Self::new("", value.to_display()),
        }
    }
}

impl From<Exception> for ScriptFailure {
    fn from(exception: Exception) -> Self {
        match exception {
            Exception::Thrown(value) => Self::from_thrown(&value),
            Exception::Resolution(error) => Self::new("ResolutionError", error.to_string()),
            Exception::BudgetExhausted { budget } => Self::new(
                "RangeError",
                format!("Execution budget of {budget} steps exhausted"),
            ),
        }
    }
}

impl fmt::Display for ScriptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() || self.name == "Error" {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    /// Calling the factory itself.
    Construction,
    /// Turning the returned element tree into a scene.
    Materialization,
}

impl fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Construction => "construction",
            Self::Materialization => "materialization",
        })
    }
}

/// Invalid host setup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("capability \"{0}\" is registered more than once")]
    DuplicateCapability(String),
    #[error("`{field}` must be greater than zero")]
    ZeroLimit { field: &'static str },
    #[error("the element runtime capability \"{0}\" is not registered")]
    MissingRuntime(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::error_value;

    #[test]
    fn thrown_errors_keep_their_message() {
        let failure = ScriptFailure::from(Exception::Thrown(error_value("Error", "boom")));
        assert_eq!(failure.to_string(), "boom");
        let failure = ScriptFailure::from(Exception::Thrown(error_value("TypeError", "bad")));
        assert_eq!(failure.to_string(), "TypeError: bad");
        let failure = ScriptFailure::from(Exception::Thrown(Value::string("plain")));
        assert_eq!(failure.to_string(), "plain");
    }

    #[test]
    fn titles_name_the_phase() {
        let error = ExecutionError::Render {
            phase: RenderPhase::Construction,
            failure: ScriptFailure::new("Error", "boom"),
        };
        assert_eq!(error.title(), "Render Error");
        assert_eq!(error.message(), "boom");
        let error = ExecutionError::from(ResolutionError::new("left-pad"));
        assert_eq!(error.title(), "Resolution Error");
        assert!(error.message().contains("left-pad"));
    }

    #[test]
    fn budget_exhaustion_is_a_load_error() {
        let error = ExecutionError::from_load(Exception::BudgetExhausted { budget: 10 });
        assert_eq!(error.kind(), ErrorKind::Load);
        assert!(error.message().contains("10 steps"));
    }
}
