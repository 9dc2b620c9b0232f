//! Reader error types.

use thiserror::Error;

/// A fatal error produced while lexing or parsing source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The lexer hit a character sequence no token rule accepts.
    #[error("unrecognized token near `{0}`")]
    UnrecognizedToken(String),

    /// A number literal did not fit the integer range.
    #[error("number literal out of range: `{0}`")]
    NumberOutOfRange(String),

    /// The input ended inside an open list.
    #[error("unexpected end of input: unbalanced `(`")]
    UnexpectedEof,

    /// A `)` appeared with no matching `(`.
    #[error("unexpected `)`")]
    UnexpectedCloseParen,
}
