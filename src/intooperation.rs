use crate::ErrorKind;
use crate::ast::{Number, Value};
use crate::builtinops::Arity;
use std::iter::FusedIterator;
use std::sync::Arc;

// NOTE: This module is internal plumbing for the builtin registry.
// It defines the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` used at runtime, so each
// builtin is written against `String` / `i64` / `Number` parameters
// instead of matching on `Value` by hand.

/// Canonical erased builtin function type used by the evaluator.
///
/// Builtins receive ownership of their already-evaluated argument vector.
pub type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, ErrorKind> + Send + Sync;

// =====================================================================
// Argument conversion
// =====================================================================

/// Converts one evaluated argument into a typed parameter, failing with a
/// type error when the value is of the wrong kind.
pub(crate) trait FromParam: Sized {
    fn from_arg(value: Value) -> Result<Self, ErrorKind>;
}

impl FromParam for Value {
    fn from_arg(value: Value) -> Result<Self, ErrorKind> {
        Ok(value)
    }
}

impl FromParam for String {
    fn from_arg(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(ErrorKind::type_error(format!(
                "expected string, got {}",
                other.type_name()
            ))),
        }
    }
}

impl FromParam for i64 {
    fn from_arg(value: Value) -> Result<Self, ErrorKind> {
        match value {
            Value::Integer(n) => Ok(n),
            other => Err(ErrorKind::type_error(format!(
                "expected integer, got {}",
                other.type_name()
            ))),
        }
    }
}

impl FromParam for Number {
    fn from_arg(value: Value) -> Result<Self, ErrorKind> {
        value.as_number().ok_or_else(|| {
            ErrorKind::type_error(format!("expected number, got {}", value.type_name()))
        })
    }
}

/// Normalize both plain values and `Result`-returning functions into `Result<T, ErrorKind>`.
pub(crate) trait IntoResult<T> {
    fn into_result(self) -> Result<T, ErrorKind>;
}

impl<T> IntoResult<T> for T {
    fn into_result(self) -> Result<T, ErrorKind> {
        Ok(self)
    }
}

impl<T> IntoResult<T> for Result<T, ErrorKind> {
    fn into_result(self) -> Result<T, ErrorKind> {
        self
    }
}

// =====================================================================
// Rest parameters
// =====================================================================

/// Borrowed iterator over numeric arguments.
///
/// Construction performs a single upfront type check, so a builtin
/// receiving a `NumIterator` never sees a non-number.
#[derive(Debug, Clone)]
pub struct NumIterator<'a> {
    values: std::slice::Iter<'a, Value>,
}

impl<'a> NumIterator<'a> {
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, ErrorKind> {
        if let Some(bad) = values.iter().find(|v| v.as_number().is_none()) {
            return Err(ErrorKind::type_error(format!(
                "expected number, got {}",
                bad.type_name()
            )));
        }

        Ok(NumIterator {
            values: values.iter(),
        })
    }
}

impl Iterator for NumIterator<'_> {
    type Item = Number;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.values.next()?;
        let n = v.as_number();
        // `new` guarantees all elements are numbers.
        debug_assert!(n.is_some(), "NumIterator saw non-number after construction");
        n
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}

impl ExactSizeIterator for NumIterator<'_> {}
impl FusedIterator for NumIterator<'_> {}

/// Marker type used in `Args` tuples for a numeric rest parameter.
#[derive(Debug, Clone, Copy)]
pub struct NumRest;

/// Convert a strongly-typed Rust function into the erased
/// [`OperationFn`], parameterized by an argument tuple type.
pub(crate) trait IntoOperation<Args, R> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Trait for operations whose Rust signature takes all arguments as a rest
/// parameter.
pub(crate) trait IntoVariadicOperation<Args, R> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

impl<F, FR, R> IntoVariadicOperation<(NumRest,), R> for F
where
    F: for<'a> Fn(NumIterator<'a>) -> FR + Send + Sync + 'static,
    FR: IntoResult<R> + 'static,
    R: Into<Value> + 'static,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let rest = NumIterator::new(&args)?;
            let value: R = (self)(rest).into_result()?;
            Ok(value.into())
        })
    }
}

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Helper macro to implement `IntoOperation` for functions of various
/// arities.
///
/// It performs arity checking up front, then converts every argument
/// left to right, so the first mistyped argument is the one reported.
macro_rules! impl_into_operation_for_arity {
    ($arity:literal, $( $v:ident : $A:ident ),+ ) => {
        impl<F, FR, R, $( $A ),+> IntoOperation<( $( $A, )+ ), R> for F
        where
            F: Fn( $( $A ),+ ) -> FR + Send + Sync + 'static,
            FR: IntoResult<R> + 'static,
            R: Into<Value> + 'static,
            $( $A: FromParam, )+
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |args: Vec<Value>| {
                    let got = args.len();
                    let Ok([ $( $v ),+ ]) = <[Value; $arity]>::try_from(args) else {
                        return Err(ErrorKind::arity_error(Arity::Exact($arity), got));
                    };
                    $(
                        let $v = <$A as FromParam>::from_arg($v)?;
                    )+

                    let value: R = (self)( $( $v ),+ ).into_result()?;
                    Ok(value.into())
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, v0: A1);
impl_into_operation_for_arity!(2, v0: A1, v1: A2);
impl_into_operation_for_arity!(3, v0: A1, v1: A2, v2: A3);
