use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UriParseError {
    #[error("Lexical error in '{0}': {1}")]
    Lexical(String, String),

    #[error("Expand term '{0}' has an empty option list")]
    MissingOption(String),

    #[error("'{0}' is not a recognized query option")]
    UnrecognizedOption(String),

    #[error("Malformed query option in '{0}': {1}")]
    MalformedOption(String, String),

    #[error("Invalid value '{1}' for ${0}: {2}")]
    InvalidOptionValue(&'static str, String, String),

    #[error("Maximum expand depth exceeded at '{0}'")]
    RecursionLimitExceeded(String),

    #[error("Expression is nested too deeply in '{0}'")]
    ExpressionTooDeep(String),

    #[error("Expression parse error in '{0}': {1}")]
    ExpressionParse(String, String),

    #[error("Search parse error in '{0}': {1}")]
    SearchParse(String, String),
}
