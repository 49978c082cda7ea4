//! Splits one raw expression into a flat token stream.
//!
//! Parentheses are always separate tokens and a quoted string is a single
//! token. Every other maximal run of non-whitespace characters is one token,
//! classified as an integer, a float, or an identifier. Runs that do not have
//! a well-formed shape are still emitted as identifiers and only logged here;
//! the parser decides whether they are acceptable.

use log::{debug, trace};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{map, value},
};

use crate::ast::{format_float, is_valid_identifier, write_quoted};
use crate::{ErrorKind, ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    OpenParen,
    CloseParen,
    Identifier(String),
    IntegerLiteral(i64),
    FloatLiteral(f64),
    StringLiteral(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::OpenParen => write!(f, "("),
            Token::CloseParen => write!(f, ")"),
            Token::Identifier(name) => write!(f, "{name}"),
            Token::IntegerLiteral(n) => write!(f, "{n}"),
            Token::FloatLiteral(x) => write!(f, "{}", format_float(*x)),
            Token::StringLiteral(s) => write_quoted(f, s),
        }
    }
}

/// Re-serialize a token stream into whitespace-normalized source text
pub fn tokens_to_source(tokens: &[Token]) -> String {
    let mut source = String::new();
    let mut previous: Option<&Token> = None;

    for token in tokens {
        let needs_space = match (previous, token) {
            (None, _) | (Some(Token::OpenParen), _) | (_, Token::CloseParen) => false,
            _ => true,
        };
        if needs_space {
            source.push(' ');
        }
        source.push_str(&token.to_string());
        previous = Some(token);
    }

    source
}

fn is_bare_char(c: char) -> bool {
    !c.is_whitespace() && c != '(' && c != ')' && c != '"'
}

/// `-?[0-9]+`
fn has_integer_shape(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// `-?[0-9]*.[0-9]*` with exactly one dot and at least one digit
fn has_float_shape(text: &str) -> bool {
    let body = text.strip_prefix('-').unwrap_or(text);
    body.chars().filter(|c| *c == '.').count() == 1
        && body.chars().any(|c| c.is_ascii_digit())
        && body.chars().all(|c| c == '.' || c.is_ascii_digit())
}

/// Classify a bare run of characters
fn classify_bare(text: &str) -> Token {
    if has_integer_shape(text) {
        if let Ok(n) = text.parse::<i64>() {
            return Token::IntegerLiteral(n);
        }
        debug!("integer literal out of range: {text}");
    } else if has_float_shape(text)
        && let Ok(f) = text.parse::<f64>()
    {
        return Token::FloatLiteral(f);
    } else if !is_valid_identifier(text) {
        debug!("token of unknown shape: {text}");
    }

    Token::Identifier(text.to_owned())
}

fn open_paren(input: &str) -> IResult<&str, Token> {
    value(Token::OpenParen, char('(')).parse(input)
}

fn close_paren(input: &str) -> IResult<&str, Token> {
    value(Token::CloseParen, char(')')).parse(input)
}

fn bare_token(input: &str) -> IResult<&str, Token> {
    map(take_while1(is_bare_char), classify_bare).parse(input)
}

/// Parse a string literal. Only `\"` and `\\` are escapes; every other
/// backslash is kept as written. Failures are `nom::Err::Failure` so no
/// other token parser is tried once an opening quote has been seen.
fn string_literal(input: &str) -> IResult<&str, Token> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                return Ok((char_iter.as_str(), Token::StringLiteral(chars)));
            }
            Some('\\') => {
                match char_iter.next() {
                    Some(escaped @ ('"' | '\\')) => chars.push(escaped),
                    // Any other backslash is literal text
                    Some(other) => {
                        chars.push('\\');
                        chars.push(other);
                    }
                    None => {
                        // Backslash at end of input
                        return Err(nom::Err::Failure(nom::error::Error::new(
                            input,
                            nom::error::ErrorKind::Eof,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            None => {
                return Err(nom::Err::Failure(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Eof,
                )));
            }
        }
    }
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((open_paren, close_paren, string_literal, bare_token)).parse(input)
}

/// Convert nom errors to parse errors with a snippet of the offending input
fn tokenizer_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            let found: String = e.input.chars().take(10).collect();
            match e.code {
                nom::error::ErrorKind::Eof => ParseError::new(
                    ParseErrorKind::Incomplete,
                    format!("Unterminated string literal at position {position}"),
                    Some(found),
                ),
                _ => ParseError::new(
                    ParseErrorKind::InvalidSyntax,
                    format!("Invalid syntax at position {position}"),
                    Some(found),
                ),
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Split one expression into tokens
pub fn tokenize(input: &str) -> Result<Vec<Token>, ErrorKind> {
    let mut tokens = Vec::new();
    let mut remaining = input.trim_start();

    while !remaining.is_empty() {
        match token(remaining) {
            Ok((rest, tok)) => {
                tokens.push(tok);
                remaining = rest.trim_start();
            }
            Err(e) => return Err(ErrorKind::Parse(tokenizer_error(input, e))),
        }
    }

    trace!("tokenized {input:?} into {tokens:?}");
    Ok(tokens)
}
