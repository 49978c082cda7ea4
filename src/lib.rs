//! minilisp - batch evaluator for a small parenthesized expression language
//!
//! This crate evaluates an ordered batch of expressions written in a Lisp-like
//! surface syntax against a fixed library of builtin operations. Each batch
//! produces either the accumulated output log or a single error naming the
//! 1-based line of the first failing expression.
//!
//! ```text
//! (set "greeting" "hello")
//! (puts (concat greeting " world"))   ; output: hello world
//! (add (multiply 2 3) 4)              ; output: 10
//! (divide 10 0)                       ; output replaced by: ERROR at line 4
//! ```
//!
//! ## Strict Typing
//!
//! Builtins never coerce their arguments:
//! - Strings are not numbers, numbers are not strings (`(concat "a" 1)` errors)
//! - Integer arithmetic is checked and reports overflow
//! - Every builtin validates its arity before looking at argument types
//! - Results that involve a float are rounded to 4 decimal places
//!
//! ## Modules
//!
//! - `tokenizer`: splits one expression into tokens
//! - `parser`: builds the expression tree from tokens
//! - `builtinops`: the builtin operation registry
//! - `evaluator`: environment, output log and tree evaluation
//! - `batch`: runs an ordered list of expressions with abort-on-first-error
//! - `wire`: JSON request/response bodies (feature `json`)

use std::fmt;

use crate::builtinops::Arity;

/// Maximum nesting depth accepted by the parser.
/// Evaluation recursion is bounded by the same limit since it walks the parsed tree.
pub const MAX_PARSE_DEPTH: usize = 128;

/// Number of decimal places kept by arithmetic involving floats
pub const ROUNDING_DECIMALS: i32 = 4;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (unclassifiable tokens, unterminated strings, missing function name)
    InvalidSyntax,
    /// Input ended before the expression was complete (empty input, unterminated string)
    Incomplete,
    /// Parentheses do not pair up
    Unbalanced,
    /// Expression nesting exceeded [`MAX_PARSE_DEPTH`]
    TooDeeplyNested,
    /// Extra tokens found after a complete expression
    TrailingContent,
}

/// A structured error describing a tokenizer or parser failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// The problematic token or input snippet, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, found: Option<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            found,
        }
    }

    /// Create a ParseError with a kind and message but nothing found
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None)
    }
}

/// What went wrong while tokenizing, parsing or evaluating one expression.
///
/// Stages report an `ErrorKind`; the batch runner pairs it with the line
/// number of the expression to build an [`Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    Parse(ParseError),
    Arity {
        expected: Arity,
        got: usize,
    },
    Type(String),
    DivisionByZero,
    /// `substring` bounds outside the string
    Range {
        start: i64,
        end: i64,
        len: usize,
    },
    UnknownFunction(String),
    UnknownVariable(String),
    /// Checked integer arithmetic overflowed
    Overflow(String),
}

impl ErrorKind {
    pub fn arity_error(expected: Arity, got: usize) -> Self {
        ErrorKind::Arity { expected, got }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        ErrorKind::Type(message.into())
    }
}

impl From<ParseError> for ErrorKind {
    fn from(error: ParseError) -> Self {
        ErrorKind::Parse(error)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Parse(e) => {
                write!(f, "ParseError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, " (found: {found})")?;
                }
                Ok(())
            }
            ErrorKind::Arity { expected, got } => {
                write!(f, "ArityError: expected {expected} arguments, got {got}")
            }
            ErrorKind::Type(msg) => write!(f, "TypeError: {msg}"),
            ErrorKind::DivisionByZero => write!(f, "DivisionByZero: divisor is 0"),
            ErrorKind::Range { start, end, len } => write!(
                f,
                "RangeError: substring {start}..{end} out of bounds for length {len}"
            ),
            ErrorKind::UnknownFunction(name) => write!(f, "UnknownFunction: {name}"),
            ErrorKind::UnknownVariable(name) => write!(f, "UnknownVariable: {name}"),
            ErrorKind::Overflow(msg) => write!(f, "OverflowError: {msg}"),
        }
    }
}

/// The single terminal error of a batch.
///
/// `Display` renders the wire message `ERROR at line N`; the kind is kept
/// for logging and tests and is available through [`Error::detail`].
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    /// 1-based index of the failing expression within its batch
    pub line: usize,
    pub kind: ErrorKind,
}

impl Error {
    pub fn new(line: usize, kind: ErrorKind) -> Self {
        Error { line, kind }
    }

    /// Human-readable description including the error kind
    pub fn detail(&self) -> String {
        format!("line {}: {}", self.line, self.kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ERROR at line {}", self.line)
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod batch;
pub mod builtinops;
pub mod evaluator;
pub(crate) mod intooperation;
pub mod parser;
pub mod tokenizer;

#[cfg(feature = "json")]
pub mod wire;

pub use batch::{Batch, BatchOutcome, run_batch};
