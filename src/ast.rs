//! This module defines the value and syntax tree types shared by every stage of
//! the interpreter. [`Value`] is the tagged variant every builtin consumes and
//! produces; [`AstNode`] is the parsed form of one expression. Helper functions
//! such as [`val`], [`var`] and [`call`] are provided for convenient tree
//! construction in tests. Display logic renders values in their canonical
//! output form and trees in their whitespace-normalized source form, so a
//! displayed tree parses back to an equal tree.

use crate::ROUNDING_DECIMALS;

/// Allowed non-alphanumeric characters in identifiers
pub(crate) const IDENTIFIER_SPECIAL_CHARS: &str = "_-?!*";

/// Check if a string is a valid identifier (function name or variable name)
/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric + IDENTIFIER_SPECIAL_CHARS
pub(crate) fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first_char) => {
            if first_char.is_ascii_digit() {
                return false;
            }

            if first_char == '-'
                && let Some(second_char) = chars.next()
                && second_char.is_ascii_digit()
            {
                return false;
            }

            name.chars()
                .all(|c| c.is_alphanumeric() || IDENTIFIER_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Round a float to [`ROUNDING_DECIMALS`] decimal places
pub(crate) fn round_to_precision(value: f64) -> f64 {
    let scale = 10f64.powi(ROUNDING_DECIMALS);
    let scaled = value * scale;

    // At 2^53 and above every f64 is integral, so the value is already exact
    if !scaled.is_finite() || scaled.abs() >= 2f64.powi(f64::MANTISSA_DIGITS as i32) {
        return value;
    }
    scaled.round() / scale
}

/// Render a float the way the output log expects: integral values keep one
/// fractional digit (`4.0`), everything else uses the shortest exact form.
pub(crate) fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// A numeric argument: the two numeric kinds of [`Value`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Float(f) => f,
        }
    }

    /// Round float results to the fixed output precision; integers are exact
    pub(crate) fn rounded(self) -> Number {
        match self {
            Number::Integer(_) => self,
            Number::Float(f) => Number::Float(round_to_precision(f)),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => Value::Integer(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

/// Runtime value in the interpreter
///
/// Equality is structural: `Integer(5)` and `Float(5.0)` are different values
/// here. The `eq` builtin applies numeric comparison across the two kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl Value {
    /// Name of the value's kind, used in type error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
        }
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Integer(n) => Some(Number::Integer(*n)),
            Value::Float(f) => Some(Number::Float(*f)),
            Value::String(_) | Value::Boolean(_) => None,
        }
    }
}

// From trait implementations for Value - enables .into() conversion
impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Integer(i64::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(i64);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

/// Canonical string form, as produced by the `str` builtin and the output log
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::String(s) => write!(f, "{s}"),
            Value::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
        }
    }
}

/// Parsed expression tree
///
/// Owned by the parser's output for one expression and never mutated after
/// construction. The root of a parsed expression is always a `Call`.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Literal(Value),
    VariableRef(String),
    Call { function: String, args: Vec<AstNode> },
}

/// Helper function for creating literal nodes
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> AstNode {
    AstNode::Literal(value.into())
}

/// Helper function for creating variable references
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn var<S: AsRef<str>>(name: S) -> AstNode {
    AstNode::VariableRef(name.as_ref().to_owned())
}

/// Helper function for creating calls
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn call<S: AsRef<str>>(function: S, args: Vec<AstNode>) -> AstNode {
    AstNode::Call {
        function: function.as_ref().to_owned(),
        args,
    }
}

/// Write a string literal with quotes, escaping the two characters the
/// tokenizer unescapes
pub(crate) fn write_quoted(f: &mut std::fmt::Formatter<'_>, s: &str) -> std::fmt::Result {
    write!(f, "\"")?;
    for ch in s.chars() {
        match ch {
            '"' => write!(f, "\\\"")?,
            '\\' => write!(f, "\\\\")?,
            c => write!(f, "{c}")?,
        }
    }
    write!(f, "\"")
}

/// Whitespace-normalized source form
impl std::fmt::Display for AstNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AstNode::Literal(Value::String(s)) => write_quoted(f, s),
            AstNode::Literal(value) => write!(f, "{value}"),
            AstNode::VariableRef(name) => write!(f, "{name}"),
            AstNode::Call { function, args } => {
                write!(f, "({function}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        let cases = [
            ("x", true),
            ("foo-bar", true),
            ("_", true),
            ("is-empty?", true),
            ("var123", true),
            ("-", true),
            ("-abc", true),
            ("", false),
            ("123var", false),
            ("-42name", false),
            ("foo@bar", false),
            ("a.b", false),
            ("has space", false),
        ];

        for (name, expected) in cases {
            assert_eq!(is_valid_identifier(name), expected, "identifier {name:?}");
        }
    }

    #[test]
    fn test_canonical_value_display() {
        let cases = [
            (Value::Integer(5), "5"),
            (Value::Integer(-17), "-17"),
            (Value::Float(4.0), "4.0"),
            (Value::Float(0.3), "0.3"),
            (Value::Float(-2.5), "-2.5"),
            (Value::Float(3.1416), "3.1416"),
            (Value::Float(1e16), "10000000000000000.0"),
            (Value::Float(-2e20), "-200000000000000000000.0"),
            (Value::String("hi there".into()), "hi there"),
            (Value::String(String::new()), ""),
            (Value::Boolean(true), "True"),
            (Value::Boolean(false), "False"),
        ];

        for (value, expected) in cases {
            assert_eq!(value.to_string(), expected, "display of {value:?}");
        }
    }

    #[test]
    fn test_rounding() {
        assert_eq!(round_to_precision(0.1 + 0.2), 0.3);
        assert_eq!(round_to_precision(3.14159265), 3.1416);
        assert_eq!(round_to_precision(-1.23456), -1.2346);
        assert_eq!(Number::Float(2.000049).rounded(), Number::Float(2.0));
        assert_eq!(Number::Integer(7).rounded(), Number::Integer(7));

        // Magnitudes where scaling would overflow or lose nothing
        let large = [1e305, -1.7e308, f64::MAX, 1e12 + 0.5, 9007199254740993.0];
        for value in large {
            assert_eq!(round_to_precision(value), value, "rounding {value:e}");
        }
        assert!(round_to_precision(f64::INFINITY).is_infinite());
    }

    #[test]
    fn test_ast_display() {
        let tree = call(
            "puts",
            vec![call(
                "concat",
                vec![val("say \"hi\""), var("name"), val(1.5), val(-3)],
            )],
        );
        assert_eq!(
            tree.to_string(),
            r#"(puts (concat "say \"hi\"" name 1.5 -3))"#
        );
        assert_eq!(call("add", vec![]).to_string(), "(add)");
    }

    #[test]
    fn test_helper_functions() {
        assert_eq!(val(42), AstNode::Literal(Value::Integer(42)));
        assert_eq!(val(255u8), AstNode::Literal(Value::Integer(255)));
        assert_eq!(val("s"), AstNode::Literal(Value::String("s".into())));
        assert_eq!(val(true), AstNode::Literal(Value::Boolean(true)));
        assert_eq!(var("x"), AstNode::VariableRef("x".into()));
        assert_ne!(Value::Integer(5), Value::Float(5.0));
    }
}
