// End-to-end scenarios: source in, observable output out.

use std::cell::RefCell;
use std::rc::Rc;

use movascript::{MovaError, Value};

fn run_capturing(source: &str) -> (Value, Vec<String>) {
    let module = movascript::compile(source).expect("source should compile");
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    let value = movascript::run_with_output(&module, move |line| {
        sink.borrow_mut().push(line.to_string())
    })
    .expect("source should run");
    let captured = lines.borrow().clone();
    (value, captured)
}

fn output_of(source: &str) -> Vec<String> {
    run_capturing(source).1
}

fn runtime_error(source: &str) -> String {
    let module = movascript::compile(source).expect("source should compile");
    match movascript::run_with_output(&module, |_| {}) {
        Err(MovaError::Runtime(error)) => error.to_string(),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn scenario_recursive_fib() {
    let output = output_of(
        "fun fib(n){ if n<2 { return n } return fib(n-1)+fib(n-2) } print(fib(10))",
    );
    assert_eq!(output, vec!["55"]);
}

#[test]
fn scenario_counter_closure() {
    let output = output_of(
        "var c = 0; fun inc(){ c = c + 1; return c } print(inc()); print(inc()); print(inc())",
    );
    assert_eq!(output, vec!["1", "2", "3"]);
}

#[test]
fn scenario_list_literal_and_length() {
    let output = output_of("let xs = [1,2,3,4,5]; print(xs[0]); print(xs.length)");
    assert_eq!(output, vec!["1", "5"]);
}

#[test]
fn scenario_class_distance() {
    let output = output_of(
        "class Point(x,y){ fun dist(){ return (self.x**2 + self.y**2) ** 0.5 } } \
         let p = new Point(3,4); print(p.dist())",
    );
    assert_eq!(output, vec!["5"]);
}

#[test]
fn scenario_pipe_chain() {
    let output = output_of(
        "fun dbl(x){ return x*2 } fun inc(x){ return x+1 } print(10 |> dbl |> inc)",
    );
    assert_eq!(output, vec!["21"]);
}

#[test]
fn scenario_match_guard() {
    let output = output_of(
        "match 7 { 0 => print(\"z\"), n if n > 5 => print(\"big\"), _ => print(\"other\") }",
    );
    assert_eq!(output, vec!["big"]);
}

#[test]
fn pipe_equivalence_invariant() {
    for (piped, called) in [
        ("fun f(x){ return x+1 } print(41 |> f)", "fun f(x){ return x+1 } print(f(41))"),
        ("print(\"-3.5\" |> float |> abs)", "print(abs(float(\"-3.5\")))"),
    ] {
        assert_eq!(output_of(piped), output_of(called));
    }
}

#[test]
fn print_invokes_the_sink_exactly_once_per_call() {
    let (value, output) = run_capturing("return print([1, none, \"x\"])");
    // print leaves none on the stack and emits one line.
    assert_eq!(value, Value::Null);
    assert_eq!(output, vec!["[1, none, x]"]);
}

#[test]
fn final_value_surfaces_to_the_embedder() {
    let (value, _) = run_capturing("fun sq(x){ return x*x } return sq(9)");
    assert_eq!(value, Value::Integer(81));
}

#[test]
fn top_level_without_return_yields_none() {
    let (value, _) = run_capturing("let x = 5 x + 1");
    assert_eq!(value, Value::Null);
}

#[test]
fn negative_arity_mismatch() {
    let message = runtime_error("fun add(a, b){ return a + b } add(1)");
    assert!(message.contains("expects 2 arguments, received 1"), "{message}");
}

#[test]
fn negative_empty_list_index() {
    let message = runtime_error("let xs = [] print(xs[0])");
    assert!(message.contains("out of bounds"), "{message}");
}

#[test]
fn negative_division_by_zero() {
    let message = runtime_error("1/0");
    assert!(message.contains("Division by zero"), "{message}");
}

#[test]
fn runtime_errors_name_function_and_ip() {
    let message = runtime_error("fun boom(){ return 1/0 } boom()");
    assert!(message.contains("boom"), "{message}");
    assert!(message.contains("instruction"), "{message}");
}

#[test]
fn errors_unwind_the_entire_evaluation() {
    // The failing call aborts the run; nothing after it executes.
    let module = movascript::compile("print(\"before\") 1/0 print(\"after\")").unwrap();
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    let result = movascript::run_with_output(&module, move |line| {
        sink.borrow_mut().push(line.to_string())
    });
    assert!(result.is_err());
    assert_eq!(lines.borrow().clone(), vec!["before"]);
}

#[test]
fn deep_recursion_overflows_the_frame_stack() {
    let message = runtime_error("fun loop(n){ return loop(n+1) } loop(0)");
    assert!(message.contains("frame stack overflow"), "{message}");
}

#[test]
fn parse_errors_carry_line_and_column() {
    let error = movascript::compile("let x = ").unwrap_err();
    let message = error.to_string();
    assert!(message.contains("parse error"), "{message}");
    assert!(message.contains("1:9"), "{message}");
}

#[test]
fn lexical_errors_carry_line_and_column() {
    let error = movascript::compile("let s = \"oops").unwrap_err();
    let message = error.to_string();
    assert!(message.contains("lexical error"), "{message}");
    assert!(message.contains("1:9"), "{message}");
}
