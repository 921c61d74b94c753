use thiserror::Error;

/// A status string that is not one of the registry's record states.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown record status: {0}")]
pub struct ParseStatusError(pub String);
