//! Lexer for Vesper source using logos.

use logos::Logos;

use crate::error::ReadError;

/// Raw token produced by logos.
///
/// Whitespace and `//` line comments are skipped. A symbol is any run of
/// characters that is not whitespace, a parenthesis, or a quote, which
/// covers identifiers and operator names (`+`, `==`, `->`, ...) alike.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok(), priority = 3)]
    Number(i64),

    // Quoted string; the callback strips the surrounding quotes but keeps
    // escape sequences verbatim for the generator to interpret.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        s[1..s.len() - 1].to_owned()
    })]
    Str(String),

    #[regex(r#"[^\s()"]+"#, |lex| lex.slice().to_owned(), priority = 1)]
    Symbol(String),
}

/// Lex the whole input, failing fast on the first unrecognized sequence.
pub fn lex(source: &str) -> Result<Vec<Token>, ReadError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => {
                let snippet: String = source[span].chars().take(16).collect();
                return Err(ReadError::UnrecognizedToken(snippet));
            }
        }
    }
    Ok(tokens)
}
