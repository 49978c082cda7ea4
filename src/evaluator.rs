use crate::ErrorKind;
use crate::ast::{AstNode, Value};
use crate::builtinops::{OpKind, find_builtin};
use log::trace;
use std::collections::HashMap;

/// Reserved variable holding the previous non-null top-level result
pub const CHAINED_RESULT_NAME: &str = "_";

/// Environment for variable bindings
///
/// One flat scope per batch. Bindings persist for the rest of the batch once
/// `set`; rebinding overwrites.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Environment {
    bindings: HashMap<String, Value>,
    chained: Option<Value>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            bindings: HashMap::new(),
            chained: None,
        }
    }

    pub(crate) fn define(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Look up a variable; `_` resolves to the previous expression's result
    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == CHAINED_RESULT_NAME {
            return self.chained.as_ref();
        }
        self.bindings.get(name)
    }

    /// Record the result of the expression just completed; `None` unbinds `_`
    pub(crate) fn set_chained(&mut self, value: Option<Value>) {
        self.chained = value;
    }

    /// Get all bindings, including `_` when bound
    /// Returns a Vec of (name, value) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Value)> {
        let mut result: Vec<_> = self
            .bindings
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .chain(
                self.chained
                    .iter()
                    .map(|value| (CHAINED_RESULT_NAME.to_owned(), value.clone())),
            )
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Ordered lines produced by a batch, in execution order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputLog(Vec<String>);

impl OutputLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.0.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop every line after the first `len`
    pub(crate) fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub fn into_lines(self) -> Vec<String> {
        self.0
    }
}

/// Mutable batch state visible to commands
#[derive(Debug)]
pub struct EvalContext<'a> {
    pub env: &'a mut Environment,
    pub output: &'a mut OutputLog,
}

/// Evaluate one expression tree.
///
/// Returns `None` for expressions that produce no value (`puts`, `set`).
/// Arguments are evaluated left to right, so side effects of earlier
/// arguments happen first, and the first error in that order is reported.
pub fn eval(expr: &AstNode, ctx: &mut EvalContext<'_>) -> Result<Option<Value>, ErrorKind> {
    match expr {
        AstNode::Literal(value) => Ok(Some(value.clone())),

        // Variable lookup
        AstNode::VariableRef(name) => ctx
            .env
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ErrorKind::UnknownVariable(name.clone())),

        AstNode::Call { function, args } => {
            // Innermost errors win: arguments before the function name
            let evaluated_args = eval_args(function, args, ctx)?;
            let op = find_builtin(function)
                .ok_or_else(|| ErrorKind::UnknownFunction(function.clone()))?;
            op.validate_arity(evaluated_args.len())?;
            trace!("calling {function} with {evaluated_args:?}");

            match &op.op_kind {
                OpKind::Function(func) => func(evaluated_args).map(Some),
                OpKind::Command(command) => {
                    command(evaluated_args, ctx)?;
                    Ok(None)
                }
            }
        }
    }
}

/// Evaluate call arguments in order; a valueless argument is a type error
fn eval_args(
    function: &str,
    args: &[AstNode],
    ctx: &mut EvalContext<'_>,
) -> Result<Vec<Value>, ErrorKind> {
    args.iter()
        .map(|arg| {
            eval(arg, ctx)?.ok_or_else(|| {
                ErrorKind::type_error(format!(
                    "argument to '{function}' produced no value: {arg}"
                ))
            })
        })
        .collect()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::builtinops::Arity;
    use crate::parser::parse_expression;

    /// Test result variants for comprehensive testing
    #[derive(Debug)]
    enum TestResult {
        EvalResult(Value),        // Evaluation should succeed with this value
        NoValue,                  // Evaluation should succeed without a value
        SpecificError(ErrorKind), // Evaluation should fail with exactly this error
        Error,                    // Evaluation should fail (any error)
    }
    use TestResult::*;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, TestResult)>);

    /// Micro-helper for success cases in comprehensive tests
    fn success<T: Into<Value>>(value: T) -> TestResult {
        EvalResult(value.into())
    }

    /// Execute a single test case with detailed error reporting
    fn execute_test_case(
        input: &str,
        expected: &TestResult,
        env: &mut Environment,
        output: &mut OutputLog,
        test_id: &str,
    ) {
        let expr = match parse_expression(input) {
            Ok(expr) => expr,
            Err(parse_err) => {
                panic!("{test_id}: unexpected parse error for '{input}': {parse_err:?}");
            }
        };

        let mut ctx = EvalContext { env, output };
        match (eval(&expr, &mut ctx), expected) {
            (Ok(Some(actual)), EvalResult(expected_val)) => {
                assert_eq!(&actual, expected_val, "{test_id}: wrong value for '{input}'");
            }
            (Ok(None), NoValue) | (Err(_), Error) => {}
            (Err(e), SpecificError(expected_err)) => {
                assert_eq!(&e, expected_err, "{test_id}: wrong error for '{input}'");
            }
            (actual, expected) => {
                panic!("{test_id}: for '{input}' expected {expected:?}, got {actual:?}");
            }
        }
    }

    /// Run tests in isolated environments with shared state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let mut env = Environment::new();
            let mut output = OutputLog::default();

            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &mut env, &mut output, &test_id);
            }
        }
    }

    /// Each case in a fresh environment
    fn run_comprehensive_tests(test_cases: Vec<(&str, TestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let mut env = Environment::new();
            let mut output = OutputLog::default();
            let test_id = format!("#{}", i + 1);
            execute_test_case(input, expected, &mut env, &mut output, &test_id);
        }
    }

    #[test]
    fn test_comprehensive_operations_data_driven() {
        let test_cases = vec![
            // === CONVERSION ===
            ("(str 5)", success("5")),
            ("(str 2.5)", success("2.5")),
            ("(str (add 2 2.0))", success("4.0")),
            ("(str (gt 2 1))", success("True")),
            // === ARITHMETIC ===
            ("(add 1 2)", success(3)),
            ("(add 1 2 3 4 5)", success(15)),
            ("(add (add 1 2) (add 3 (add 4 5)))", success(15)),
            ("(add (multiply 2 3) 4)", success(10)),
            ("(subtract 10 (multiply 2 2))", success(6)),
            ("(divide 10 2)", success(5)),
            ("(divide 10 4)", success(2.5)),
            ("(divide 2 3)", success(0.6667)),
            ("(multiply 1.1 1.1)", success(1.21)),
            // === STRINGS ===
            ("(concat \"hello \" \"world\")", success("hello world")),
            ("(uppercase (concat \"a\" \"b\"))", success("AB")),
            ("(replace \"banana\" \"a\" \"o\")", success("bonono")),
            ("(substring \"hello\" 1 4)", success("ell")),
            ("(concat \"n=\" (str (add 1 1)))", success("n=2")),
            // === COMPARISON ===
            ("(gt (add 1 1) 1)", success(true)),
            ("(lt 1 1)", success(false)),
            ("(eq (divide 10 4) 2.5)", success(true)),
            ("(eq \"a\" \"b\")", success(false)),
            ("(eq (str 1) \"1\")", success(true)),
            // === COMMANDS HAVE NO VALUE ===
            ("(puts \"hi\")", NoValue),
            ("(set \"x\" 1)", NoValue),
            // === ERRORS ===
            (
                "(frobnicate 1)",
                SpecificError(ErrorKind::UnknownFunction("frobnicate".into())),
            ),
            ("(str y)", SpecificError(ErrorKind::UnknownVariable("y".into()))),
            ("(str _)", SpecificError(ErrorKind::UnknownVariable("_".into()))),
            (
                "(add 1)",
                SpecificError(ErrorKind::arity_error(Arity::AtLeast(2), 1)),
            ),
            (
                "(str)",
                SpecificError(ErrorKind::arity_error(Arity::Exact(1), 0)),
            ),
            // Arity is reported before argument types
            (
                "(concat 1)",
                SpecificError(ErrorKind::arity_error(Arity::Exact(2), 1)),
            ),
            ("(divide 1 0)", SpecificError(ErrorKind::DivisionByZero)),
            ("(divide 1 (subtract 2 2))", SpecificError(ErrorKind::DivisionByZero)),
            ("(concat \"a\" 1)", Error),
            ("(add \"1\" 2)", Error),
            ("(gt \"b\" \"a\")", Error),
            ("(uppercase 5)", Error),
            ("(substring \"abc\" 2 9)", Error),
            ("(add 9223372036854775807 1)", Error),
            // Valueless arguments are rejected
            ("(str (puts \"x\"))", Error),
            ("(add 1 (set \"x\" 2))", Error),
            // Arguments are evaluated before the function name is resolved
            (
                "(nope (frobnicate 1))",
                SpecificError(ErrorKind::UnknownFunction("frobnicate".into())),
            ),
            ("(nope (divide 1 0))", SpecificError(ErrorKind::DivisionByZero)),
            ("(nope x)", SpecificError(ErrorKind::UnknownVariable("x".into()))),
            (
                "(nope 1 2)",
                SpecificError(ErrorKind::UnknownFunction("nope".into())),
            ),
        ];

        run_comprehensive_tests(test_cases);

        // === ENVIRONMENT-SENSITIVE TESTS ===
        // Tests that require shared state between expressions in the same environment
        let environment_test_cases = vec![
            TestEnvironment(vec![
                ("(set \"x\" 5)", NoValue),
                ("(add x 3)", success(8)),
                ("(str x)", success("5")),
                ("(str y)", Error),
            ]),
            // Rebinding overwrites
            TestEnvironment(vec![
                ("(set \"x\" 5)", NoValue),
                ("(set \"x\" \"five\")", NoValue),
                ("(concat x \"!\")", success("five!")),
                ("(set \"y\" (uppercase x))", NoValue),
                ("(concat x y)", success("fiveFIVE")),
            ]),
            // Bad names are rejected and leave nothing bound
            TestEnvironment(vec![
                ("(set 1 2)", Error),
                ("(set \"_\" 2)", Error),
                ("(set \"a b\" 2)", Error),
                ("(set \"x\")", Error),
                ("(str _)", Error),
            ]),
            // Side effects of earlier arguments happen before later failures
            TestEnvironment(vec![
                ("(add 1 (add (set \"z\" 1) 2))", Error),
                ("(str z)", success("1")),
            ]),
        ];

        run_tests_in_environment(environment_test_cases);
    }

    #[test]
    fn test_puts_appends_in_evaluation_order() {
        let mut env = Environment::new();
        let mut output = OutputLog::default();

        for line in ["(puts \"first\")", "(puts (concat \"sec\" \"ond\"))", "(puts (str 3))"] {
            let expr = parse_expression(line).unwrap();
            let mut ctx = EvalContext {
                env: &mut env,
                output: &mut output,
            };
            assert_eq!(eval(&expr, &mut ctx).unwrap(), None);
        }

        assert_eq!(output.lines(), ["first", "second", "3"]);
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn test_environment_bindings() {
        let mut env = Environment::new();
        assert!(env.get_all_bindings().is_empty());
        assert_eq!(env.get(CHAINED_RESULT_NAME), None);

        env.define("b".into(), Value::Integer(2));
        env.define("a".into(), Value::from("one"));
        env.set_chained(Some(Value::Boolean(true)));

        assert_eq!(env.get("a"), Some(&Value::from("one")));
        assert_eq!(env.get(CHAINED_RESULT_NAME), Some(&Value::Boolean(true)));
        assert_eq!(
            env.get_all_bindings(),
            vec![
                ("_".to_owned(), Value::Boolean(true)),
                ("a".to_owned(), Value::from("one")),
                ("b".to_owned(), Value::Integer(2)),
            ]
        );

        env.set_chained(None);
        assert_eq!(env.get(CHAINED_RESULT_NAME), None);
        assert_eq!(env.get_all_bindings().len(), 2);
    }

    #[test]
    fn test_output_log() {
        let mut log = OutputLog::default();
        assert!(log.is_empty());
        log.push("a");
        log.push(String::from("b"));
        log.push("c");
        log.truncate(1);
        assert_eq!(log.lines(), ["a"]);
        assert_eq!(log.into_lines(), vec!["a".to_owned()]);
    }
}
