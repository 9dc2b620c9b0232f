//! The expression tree.

use std::fmt;

/// A single parsed expression.
///
/// The whole surface language is four shapes: numbers, strings, symbols,
/// and nested lists. Everything else (special forms, calls, class bodies)
/// is a `List` whose leading element selects the meaning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    /// Integer literal, e.g. `42`.
    Number(i64),
    /// String literal with the surrounding quotes removed; escape
    /// sequences are kept verbatim for the generator to interpret.
    String(String),
    /// Bare identifier or operator, e.g. `x`, `+`, `->`.
    Symbol(String),
    /// Parenthesized sequence of expressions.
    List(Vec<Expression>),
}

impl Expression {
    /// The symbol's name, if this is a `Symbol`.
    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Expression::Symbol(name) => Some(name),
            _ => None,
        }
    }

    /// The element list, if this is a `List`.
    pub fn as_list(&self) -> Option<&[Expression]> {
        match self {
            Expression::List(items) => Some(items),
            _ => None,
        }
    }

    /// True if this is the symbol `name`.
    pub fn is_symbol(&self, name: &str) -> bool {
        self.as_symbol() == Some(name)
    }

    /// True if this is a list whose head is the symbol `name`.
    pub fn is_form(&self, name: &str) -> bool {
        match self {
            Expression::List(items) => items.first().is_some_and(|head| head.is_symbol(name)),
            _ => false,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Number(n) => write!(f, "{n}"),
            Expression::String(s) => write!(f, "\"{s}\""),
            Expression::Symbol(s) => write!(f, "{s}"),
            Expression::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}
