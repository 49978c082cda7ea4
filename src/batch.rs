//! Batch runner: evaluates an ordered list of expressions against one
//! environment and one output log, aborting on the first error.
//!
//! Each expression runs tokenize, parse, then eval. A non-null result is
//! appended to the output log in canonical string form and is visible to the
//! next expression as `_`.

use log::{debug, info, warn};

use crate::ast::Value;
use crate::evaluator::{EvalContext, Environment, OutputLog, eval};
use crate::parser::parse_tokens;
use crate::tokenizer::tokenize;
use crate::{Error, ErrorKind};

/// State of one batch: a fresh environment and output log, discarded when
/// the batch ends.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    env: Environment,
    output: OutputLog,
    line: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of expressions submitted so far, failed ones included
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn output(&self) -> &[String] {
        self.output.lines()
    }

    /// Evaluate the next expression of the batch.
    ///
    /// Returns the output lines this expression appended. On failure the
    /// environment and output log are left exactly as they were before the
    /// call, and the error carries this expression's 1-based line number.
    pub fn evaluate_line(&mut self, source: &str) -> Result<&[String], Error> {
        let start = self.output.len();
        let snapshot = self.env.clone();

        match self.advance(source) {
            Ok(()) => Ok(&self.output.lines()[start..]),
            Err(error) => {
                self.env = snapshot;
                self.output.truncate(start);
                Err(error)
            }
        }
    }

    /// Evaluate the next expression without restoring state on failure.
    /// Effects of a failing expression stay in place, so the batch must stop.
    fn advance(&mut self, source: &str) -> Result<(), Error> {
        self.line += 1;
        let line = self.line;

        match self.run_expression(source) {
            Ok(result) => {
                if let Some(value) = &result {
                    self.output.push(value.to_string());
                }
                debug!("line {line}: {source} => {result:?}");
                self.env.set_chained(result);
                Ok(())
            }
            Err(kind) => {
                let error = Error::new(line, kind);
                debug!("{}", error.detail());
                Err(error)
            }
        }
    }

    fn run_expression(&mut self, source: &str) -> Result<Option<Value>, ErrorKind> {
        let tokens = tokenize(source)?;
        let ast = parse_tokens(&tokens)?;
        let mut ctx = EvalContext {
            env: &mut self.env,
            output: &mut self.output,
        };
        eval(&ast, &mut ctx)
    }

    pub fn into_output(self) -> Vec<String> {
        self.output.into_lines()
    }
}

/// Final result of a batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Every expression succeeded; the accumulated output log
    Completed(Vec<String>),
    /// The first failure; earlier output is discarded
    Failed(Error),
}

impl BatchOutcome {
    /// The response output: the full log, or `["ERROR at line N"]`
    pub fn into_output(self) -> Vec<String> {
        match self {
            BatchOutcome::Completed(lines) => lines,
            BatchOutcome::Failed(error) => vec![error.to_string()],
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            BatchOutcome::Completed(_) => None,
            BatchOutcome::Failed(error) => Some(error),
        }
    }
}

/// Run a whole batch in order, stopping at the first error
pub fn run_batch<S: AsRef<str>>(expressions: &[S]) -> BatchOutcome {
    info!("evaluating batch of {} expressions", expressions.len());
    let mut batch = Batch::new();

    for expression in expressions {
        if let Err(error) = batch.advance(expression.as_ref()) {
            warn!("batch aborted: {}", error.detail());
            return BatchOutcome::Failed(error);
        }
    }

    let output = batch.into_output();
    info!("batch output: {output:?}");
    BatchOutcome::Completed(output)
}
