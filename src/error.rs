use thiserror::Error;

/// Everything that can be wrong with a template. All of it is found while compiling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    #[error("Unknown special command \"{0}\".")]
    UnknownCommand(String),

    #[error("Invalid special command \"{0}\".")]
    InvalidCommand(String),

    #[error("\"${command}\" command {reason}.")]
    Parameters {
        command: &'static str,
        reason: String,
    },

    #[error("Could not find field \"{0}\" in source input stream.")]
    UnknownField(String),

    #[error("Invalid field-expression function \"{0}\".")]
    UnknownFunction(String),

    #[error("\"{function}\" function requires exactly {expected} parameter(s).")]
    FunctionArity {
        function: &'static str,
        expected: usize,
    },

    #[error("Invalid {what} \"{value}\".")]
    InvalidNumber { what: &'static str, value: String },

    #[error("Requested number of answers must be between 2 and 10, not {0}.")]
    ChoiceCount(usize),

    #[error("Undefined choice list \"{0}\".")]
    UnknownChoiceSet(String),

    #[error("\"{0}\" command found outside of proper context.")]
    Misplaced(&'static str),

    #[error("{0}")]
    Rejected(&'static str),

    #[error("Unclosed {0} command in template.")]
    Unclosed(&'static str),
}

impl TemplateError {
    pub(crate) fn parameters(command: &'static str, reason: impl Into<String>) -> Self {
        TemplateError::Parameters {
            command,
            reason: reason.into(),
        }
    }
}

/// A [`TemplateError`] together with where in the template it happened.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error} (in `{{{{{construct}}}}}` near \"{near}\")")]
pub struct CompileError {
    pub error: TemplateError,

    /// The `{{...}}` contents being compiled, or the last construct for end-of-template errors.
    pub construct: String,

    /// Up to 20 characters of template text on either side of the construct.
    pub near: String,

    /// Byte offset of the construct in the template.
    pub position: usize,
}

impl CompileError {
    pub(crate) fn new(
        error: TemplateError,
        construct: &str,
        template: &str,
        position: usize,
    ) -> Self {
        CompileError {
            error,
            construct: construct.to_string(),
            near: neighborhood(template, position, 20).to_string(),
            position,
        }
    }
}

/// The text within `radius` characters of byte offset `position`.
fn neighborhood(text: &str, position: usize, radius: usize) -> &str {
    let position = position.min(text.len());
    let start = text[..position]
        .char_indices()
        .rev()
        .nth(radius.saturating_sub(1))
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    let end = text[position..]
        .char_indices()
        .nth(radius)
        .map(|(idx, _)| position + idx)
        .unwrap_or(text.len());
    &text[start..end]
}

/// A feature-ID lookup that could not be completed while evaluating a record.
///
/// These never abort evaluation. The command that hit one writes an inline marker instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapperError {
    #[error("no feature-ID mapper is attached to this template")]
    NoMapper,

    #[error("no identifier has been generated for feature \"{0}\"")]
    UnknownFeature(String),

    #[error("no genome has been set up for feature \"{0}\"")]
    NoGenome(String),

    #[error("{0}")]
    Other(String),
}
