//! Built-in operations registry.
//!
//! Every operation available to expressions is defined once in a single
//! registry, with its name, arity contract and implementation:
//!
//! ```text
//! (concat "a" "b")        ; strings
//! (add 1 2.5 3)           ; arithmetic, floats rounded to 4 decimals
//! (gt 3 2)                ; comparison
//! (set "x" 5) (puts "hi") ; commands with side effects
//! ```
//!
//! ## Functions vs Commands
//!
//! - **Functions**: pure, take evaluated arguments and return a value
//! - **Commands**: `puts` and `set`, which mutate the batch's output log or
//!   environment and produce no value
//!
//! ## Error Handling
//!
//! - **Arity first**: the argument count is validated before any type check
//! - **No Coercion**: strings never become numbers and vice versa
//! - **Overflow Detection**: integer arithmetic is checked
//! - **No partial effects**: a command validates everything before mutating state
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (`String`, `i64`,
//!    `Number`, `Value`, or a `NumIterator` rest parameter)
//! 2. **Add to BUILTIN_OPS** with its name and arity
//! 3. **Add tests** covering edge cases and error conditions

use crate::ErrorKind;
use crate::ast::{Number, Value, is_valid_identifier, round_to_precision};
use crate::evaluator::{CHAINED_RESULT_NAME, EvalContext};
use crate::intooperation::{
    FromParam, IntoOperation, IntoVariadicOperation, NumIterator, NumRest, OperationFn,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

/// Argument count contract of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn validate(self, got: usize) -> Result<(), ErrorKind> {
        let ok = match self {
            Arity::Exact(n) => got == n,
            Arity::AtLeast(n) => got >= n,
        };
        if ok {
            Ok(())
        } else {
            Err(ErrorKind::arity_error(self, got))
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exact(n) => write!(f, "exactly {n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Signature of commands: evaluated arguments plus mutable batch state
pub type CommandFn = fn(Vec<Value>, &mut EvalContext<'_>) -> Result<(), ErrorKind>;

/// Represents the implementation of a built-in operation
#[derive(Clone)]
pub enum OpKind {
    /// Pure function from evaluated arguments to a value
    Function(Arc<OperationFn>),
    /// Side-effecting operation producing no value
    Command(CommandFn),
}

impl fmt::Debug for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Function(_) => write!(f, "Function(<fn>)"),
            OpKind::Command(_) => write!(f, "Command(<fn>)"),
        }
    }
}

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    pub name: &'static str,
    pub op_kind: OpKind,
    pub arity: Arity,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl BuiltinOp {
    pub fn is_command(&self) -> bool {
        matches!(self.op_kind, OpKind::Command(_))
    }

    pub(crate) fn validate_arity(&self, arg_count: usize) -> Result<(), ErrorKind> {
        self.arity.validate(arg_count)
    }
}

//
// Builtin Function Implementations
//

// Macro to generate checked binary arithmetic on numbers.
// Integer operands stay integers; any float operand makes the result a float.
macro_rules! checked_arithmetic {
    ($name:ident, $checked:ident, $op:tt, $what:literal) => {
        fn $name(lhs: Number, rhs: Number) -> Result<Number, ErrorKind> {
            match (lhs, rhs) {
                (Number::Integer(a), Number::Integer(b)) => a
                    .$checked(b)
                    .map(Number::Integer)
                    .ok_or_else(|| ErrorKind::Overflow(concat!("integer overflow in ", $what).to_owned())),
                (a, b) => Ok(Number::Float(a.as_f64() $op b.as_f64())),
            }
        }
    };
}

checked_arithmetic!(number_add, checked_add, +, "addition");
checked_arithmetic!(number_sub, checked_sub, -, "subtraction");
checked_arithmetic!(number_mul, checked_mul, *, "multiplication");

// Macro to generate numeric comparison functions
macro_rules! numeric_comparison {
    ($name:ident, $op:tt) => {
        fn $name(lhs: Number, rhs: Number) -> bool {
            match (lhs, rhs) {
                (Number::Integer(a), Number::Integer(b)) => a $op b,
                (a, b) => a.as_f64() $op b.as_f64(),
            }
        }
    };
}

numeric_comparison!(builtin_gt, >);
numeric_comparison!(builtin_lt, <);
numeric_comparison!(numbers_equal, ==);

fn builtin_add(args: NumIterator<'_>) -> Result<Number, ErrorKind> {
    args.into_iter()
        .try_fold(Number::Integer(0), number_add)
        .map(Number::rounded)
}

fn builtin_subtract(lhs: Number, rhs: Number) -> Result<Number, ErrorKind> {
    number_sub(lhs, rhs).map(Number::rounded)
}

fn builtin_multiply(args: NumIterator<'_>) -> Result<Number, ErrorKind> {
    args.into_iter()
        .try_fold(Number::Integer(1), number_mul)
        .map(Number::rounded)
}

fn builtin_divide(dividend: Number, divisor: Number) -> Result<Number, ErrorKind> {
    match (dividend, divisor) {
        (_, Number::Integer(0)) => Err(ErrorKind::DivisionByZero),
        (_, Number::Float(f)) if f == 0.0 => Err(ErrorKind::DivisionByZero),
        // Exact integer division stays an integer
        (Number::Integer(a), Number::Integer(b)) if a.checked_rem(b) == Some(0) => a
            .checked_div(b)
            .map(Number::Integer)
            .ok_or_else(|| ErrorKind::Overflow("integer overflow in division".to_owned())),
        (a, b) => Ok(Number::Float(round_to_precision(a.as_f64() / b.as_f64()))),
    }
}

/// Equality across any two values; integers and floats compare numerically
fn builtin_eq(lhs: Value, rhs: Value) -> bool {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => numbers_equal(a, b),
        _ => lhs == rhs,
    }
}

fn builtin_str(value: Value) -> String {
    value.to_string()
}

fn builtin_concat(first: String, second: String) -> String {
    first + &second
}

fn builtin_lowercase(s: String) -> String {
    s.to_lowercase()
}

fn builtin_uppercase(s: String) -> String {
    s.to_uppercase()
}

fn builtin_replace(s: String, from: String, to: String) -> String {
    s.replace(&from, &to)
}

/// Characters `start..end` of `s`. `start > end` gives an empty string.
fn builtin_substring(s: String, start: i64, end: i64) -> Result<String, ErrorKind> {
    let len = s.chars().count();
    if start < 0 || end > len as i64 {
        return Err(ErrorKind::Range { start, end, len });
    }
    if start >= end {
        return Ok(String::new());
    }

    // Both bounds are within 0..=len here
    let (start, end) = (start as usize, end as usize);
    Ok(s.chars().skip(start).take(end - start).collect())
}

fn builtin_puts(args: Vec<Value>, ctx: &mut EvalContext<'_>) -> Result<(), ErrorKind> {
    let got = args.len();
    let Ok([line]) = <[Value; 1]>::try_from(args) else {
        return Err(ErrorKind::arity_error(Arity::Exact(1), got));
    };
    let line = String::from_arg(line)?;

    ctx.output.push(line);
    Ok(())
}

fn builtin_set(args: Vec<Value>, ctx: &mut EvalContext<'_>) -> Result<(), ErrorKind> {
    let got = args.len();
    let Ok([name, value]) = <[Value; 2]>::try_from(args) else {
        return Err(ErrorKind::arity_error(Arity::Exact(2), got));
    };
    let name = String::from_arg(name)?;

    if name == CHAINED_RESULT_NAME {
        return Err(ErrorKind::type_error(format!(
            "'{CHAINED_RESULT_NAME}' is reserved for the previous result"
        )));
    }
    if !is_valid_identifier(&name) {
        return Err(ErrorKind::type_error(format!(
            "'{name}' is not a valid variable name"
        )));
    }

    ctx.env.define(name, value);
    Ok(())
}

/// Global registry of all built-in operations.
///
/// Typed implementations are wired through the adapter layer once, at
/// initialization time, via a `LazyLock`.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn builtin_fixed<Args, R, F>(f: F) -> OpKind
    where
        F: IntoOperation<Args, R>,
    {
        OpKind::Function(<F as IntoOperation<Args, R>>::into_operation(f))
    }

    fn builtin_variadic<Args, R, F>(f: F) -> OpKind
    where
        F: IntoVariadicOperation<Args, R>,
    {
        OpKind::Function(<F as IntoVariadicOperation<Args, R>>::into_variadic_operation(f))
    }

    vec![
        // Output and binding
        BuiltinOp {
            name: "puts",
            op_kind: OpKind::Command(builtin_puts),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            name: "set",
            op_kind: OpKind::Command(builtin_set),
            arity: Arity::Exact(2),
        },
        // String operations
        BuiltinOp {
            name: "concat",
            op_kind: builtin_fixed::<(String, String), String, _>(builtin_concat),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            name: "lowercase",
            op_kind: builtin_fixed::<(String,), String, _>(builtin_lowercase),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            name: "uppercase",
            op_kind: builtin_fixed::<(String,), String, _>(builtin_uppercase),
            arity: Arity::Exact(1),
        },
        BuiltinOp {
            name: "replace",
            op_kind: builtin_fixed::<(String, String, String), String, _>(builtin_replace),
            arity: Arity::Exact(3),
        },
        BuiltinOp {
            name: "substring",
            op_kind: builtin_fixed::<(String, i64, i64), String, _>(builtin_substring),
            arity: Arity::Exact(3),
        },
        // Arithmetic operations
        BuiltinOp {
            name: "add",
            op_kind: builtin_variadic::<(NumRest,), Number, _>(builtin_add),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            name: "subtract",
            op_kind: builtin_fixed::<(Number, Number), Number, _>(builtin_subtract),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            name: "multiply",
            op_kind: builtin_variadic::<(NumRest,), Number, _>(builtin_multiply),
            arity: Arity::AtLeast(2),
        },
        BuiltinOp {
            name: "divide",
            op_kind: builtin_fixed::<(Number, Number), Number, _>(builtin_divide),
            arity: Arity::Exact(2),
        },
        // Comparison operations
        BuiltinOp {
            name: "gt",
            op_kind: builtin_fixed::<(Number, Number), bool, _>(builtin_gt),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            name: "lt",
            op_kind: builtin_fixed::<(Number, Number), bool, _>(builtin_lt),
            arity: Arity::Exact(2),
        },
        BuiltinOp {
            name: "eq",
            op_kind: builtin_fixed::<(Value, Value), bool, _>(builtin_eq),
            arity: Arity::Exact(2),
        },
        // Conversion
        BuiltinOp {
            name: "str",
            op_kind: builtin_fixed::<(Value,), String, _>(builtin_str),
            arity: Arity::Exact(1),
        },
    ]
});

/// Lazy static map from name to BuiltinOp (private - use find_builtin)
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.name, op)).collect()
});

/// All builtin operations in registry order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by name
pub fn find_builtin(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(name).copied()
}
