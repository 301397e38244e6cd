
use std::cell::RefCell;
use std::rc::Rc;

use crate::vm::runtime::{RuntimeError, Vm};
use crate::vm::value::Value;

/// Compiles and runs a snippet, capturing everything `print` emits.
fn run_source(source: &str) -> (Value, Vec<String>) {
    let module = crate::compile(source).expect("source should compile");
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    let value = Vm::new(&module)
        .with_output(move |line| sink.borrow_mut().push(line.to_string()))
        .run()
        .expect("source should run");
    let captured = lines.borrow().clone();
    (value, captured)
}

fn output_of(source: &str) -> Vec<String> {
    run_source(source).1
}

fn run_err(source: &str) -> RuntimeError {
    let module = crate::compile(source).expect("source should compile");
    Vm::new(&module)
        .with_output(|_| {})
        .run()
        .expect_err("source should fail at runtime")
}
