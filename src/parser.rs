//! Recursive-descent parser from tokens to an [`AstNode`] tree.
//!
//! ```text
//! expression := '(' function_name argument* ')'
//! argument   := expression | literal | identifier_ref
//! literal    := integer | float | quoted_string
//! ```
//!
//! The whole input must be exactly one parenthesized expression. Argument
//! order is preserved as written, which fixes evaluation order.

use log::trace;

use crate::MAX_PARSE_DEPTH;
use crate::ast::{AstNode, Value, is_valid_identifier};
use crate::tokenizer::{Token, tokenize};
use crate::{ErrorKind, ParseError, ParseErrorKind};

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Parser {
            tokens,
            position: 0,
        }
    }

    fn next_token(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.position)
    }

    /// Parse `'(' function_name argument* ')'`; the opening paren is already consumed
    fn parse_call(&mut self, depth: usize) -> Result<AstNode, ParseError> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(ParseError::from_message(
                ParseErrorKind::TooDeeplyNested,
                format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
            ));
        }

        let function = match self.next_token() {
            Some(Token::Identifier(name)) if is_valid_identifier(name) => name.clone(),
            Some(Token::CloseParen) => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidSyntax,
                    "Empty call: expected function name",
                    Some(")".to_owned()),
                ));
            }
            Some(other) => {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidSyntax,
                    "Expected function name",
                    Some(other.to_string()),
                ));
            }
            None => {
                return Err(ParseError::from_message(
                    ParseErrorKind::Unbalanced,
                    "Missing closing parenthesis",
                ));
            }
        };

        let mut args = Vec::new();
        loop {
            match self.next_token() {
                Some(Token::CloseParen) => return Ok(AstNode::Call { function, args }),
                Some(Token::OpenParen) => args.push(self.parse_call(depth + 1)?),
                Some(token) => args.push(parse_atom(token)?),
                None => {
                    return Err(ParseError::new(
                        ParseErrorKind::Unbalanced,
                        "Missing closing parenthesis",
                        Some(format!("({function}")),
                    ));
                }
            }
        }
    }
}

/// Classify a single non-parenthesis token as an argument
fn parse_atom(token: &Token) -> Result<AstNode, ParseError> {
    match token {
        Token::IntegerLiteral(n) => Ok(AstNode::Literal(Value::Integer(*n))),
        Token::FloatLiteral(f) => Ok(AstNode::Literal(Value::Float(*f))),
        Token::StringLiteral(s) => Ok(AstNode::Literal(Value::String(s.clone()))),
        Token::Identifier(name) if is_valid_identifier(name) => {
            Ok(AstNode::VariableRef(name.clone()))
        }
        Token::Identifier(name) => Err(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            "Cannot classify token as a literal or identifier",
            Some(name.clone()),
        )),
        Token::OpenParen | Token::CloseParen => Err(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            "Unexpected parenthesis",
            Some(token.to_string()),
        )),
    }
}

/// Parse a complete token stream into one expression tree.
pub fn parse_tokens(tokens: &[Token]) -> Result<AstNode, ErrorKind> {
    let mut parser = Parser::new(tokens);

    let root = match parser.next_token() {
        Some(Token::OpenParen) => parser.parse_call(0)?,
        Some(Token::CloseParen) => {
            return Err(ParseError::new(
                ParseErrorKind::Unbalanced,
                "Unexpected closing parenthesis",
                Some(")".to_owned()),
            )
            .into());
        }
        Some(other) => {
            return Err(ParseError::new(
                ParseErrorKind::InvalidSyntax,
                "Expression must be parenthesized",
                Some(other.to_string()),
            )
            .into());
        }
        None => {
            return Err(
                ParseError::from_message(ParseErrorKind::Incomplete, "Empty expression").into(),
            );
        }
    };

    match parser.peek() {
        None => {
            trace!("parsed {root}");
            Ok(root)
        }
        Some(Token::CloseParen) => Err(ParseError::new(
            ParseErrorKind::Unbalanced,
            "Unexpected closing parenthesis",
            Some(")".to_owned()),
        )
        .into()),
        Some(extra) => Err(ParseError::new(
            ParseErrorKind::TrailingContent,
            "Unexpected input after complete expression",
            Some(extra.to_string()),
        )
        .into()),
    }
}

/// Tokenize and parse one expression.
pub fn parse_expression(input: &str) -> Result<AstNode, ErrorKind> {
    let tokens = tokenize(input)?;
    parse_tokens(&tokens)
}
