//! MovaScript — a small, expression-oriented language with a bilingual
//! English/Ukrainian keyword surface, compiled to compact bytecode and
//! executed by a stack virtual machine.
//!
//! The crate exposes the full pipeline:
//!
//! * [`tokenizer`] — source text to a token stream (both keyword surfaces
//!   collapse onto one token set).
//! * [`parser`] — tokens to an AST via recursive descent.
//! * [`vm::compiler`] — AST to a [`vm::Module`]: identifier resolution to
//!   local/upvalue/global slots, jump patching, constant interning.
//! * [`vm::bytecode`] — the `UABC` container format, round-trippable.
//! * [`vm::runtime`] — the stack VM with call frames, closures, bound
//!   methods, and instances.
//!
//! Embedders drive the pipeline through [`compile`], [`run`], and
//! [`run_with_output`]; failures carry `line:column` (lexical/parse) or
//! `function:ip` (runtime) positions in their display form.

pub mod ast;
pub mod parser;
pub mod tokenizer;
pub mod vm;

use thiserror::Error;
use tracing::instrument;

use parser::{ParseError, Parser};
use tokenizer::{LexError, Tokenizer};

pub use vm::bytecode::{BytecodeError, Module};
pub use vm::compiler::{compile_program, CompileError};
pub use vm::runtime::{RuntimeError, Vm, VmOptions};
pub use vm::value::Value;

/// Result type used across MovaScript.
pub type MovaResult<T> = std::result::Result<T, MovaError>;

/// The error taxonomy of the bytecode core. All errors are fatal for the
/// current `compile` or `run` call; partial state is discarded.
#[derive(Debug, Error)]
pub enum MovaError {
    #[error("lexical error: {0}")]
    Lexical(#[from] LexError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),
    #[error("link error: {0}")]
    Link(#[from] BytecodeError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
}

/// Compile MovaScript source text into a bytecode module.
#[instrument(skip_all)]
pub fn compile(source: &str) -> MovaResult<Module> {
    let tokens = Tokenizer::new(source).tokenize()?;
    let program = Parser::new(tokens).parse()?;
    let module = compile_program(&program)?;
    Ok(module)
}

/// Execute a compiled module with output going to stdout.
#[instrument(skip_all)]
pub fn run(module: &Module) -> MovaResult<Value> {
    Ok(Vm::new(module).run()?)
}

/// Execute a compiled module with a custom output sink.
pub fn run_with_output(
    module: &Module,
    sink: impl FnMut(&str) + 'static,
) -> MovaResult<Value> {
    Ok(Vm::new(module).with_output(sink).run()?)
}

/// Compile and execute in one step.
pub fn eval(source: &str) -> MovaResult<Value> {
    let module = compile(source)?;
    run(&module)
}
