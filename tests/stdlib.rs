// Builtin registry behavior, exercised from source through the VM.

use std::cell::RefCell;
use std::rc::Rc;

use movascript::MovaError;

fn output_of(source: &str) -> Vec<String> {
    let module = movascript::compile(source).expect("source should compile");
    let lines = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lines);
    movascript::run_with_output(&module, move |line| {
        sink.borrow_mut().push(line.to_string())
    })
    .expect("source should run");
    let captured = lines.borrow().clone();
    captured
}

fn runtime_error(source: &str) -> String {
    let module = movascript::compile(source).expect("source should compile");
    match movascript::run_with_output(&module, |_| {}) {
        Err(MovaError::Runtime(error)) => error.to_string(),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[test]
fn numeric_builtins() {
    assert_eq!(output_of("print(abs(-5))"), vec!["5"]);
    assert_eq!(output_of("print(abs(-2.5))"), vec!["2.5"]);
    assert_eq!(output_of("print(sqrt(16))"), vec!["4"]);
    assert_eq!(output_of("print(min(3, 1, 2))"), vec!["1"]);
    assert_eq!(output_of("print(max(3, 1, 2))"), vec!["3"]);
    assert_eq!(output_of("print(round(2.5))"), vec!["3"]);
    assert_eq!(output_of("print(floor(2.9))"), vec!["2"]);
    assert_eq!(output_of("print(ceil(2.1))"), vec!["3"]);
}

#[test]
fn string_builtins() {
    assert_eq!(output_of("print(len(\"мова\"))"), vec!["4"]);
    assert_eq!(output_of("print(upper(\"ab\"))"), vec!["AB"]);
    assert_eq!(output_of("print(lower(\"AB\"))"), vec!["ab"]);
    assert_eq!(output_of("print(trim(\"  x  \"))"), vec!["x"]);
    assert_eq!(
        output_of("print(split(\"a,b,c\", \",\"))"),
        vec!["[a, b, c]"]
    );
    assert_eq!(
        output_of("print(join([1, 2, 3], \"-\"))"),
        vec!["1-2-3"]
    );
}

#[test]
fn conversion_builtins_via_type_words() {
    assert_eq!(output_of("print(int(\"42\"))"), vec!["42"]);
    assert_eq!(output_of("print(int(3.9))"), vec!["3"]);
    assert_eq!(output_of("print(float(2))"), vec!["2"]);
    assert_eq!(output_of("print(str(12) + \"!\")"), vec!["12!"]);
    assert_eq!(output_of("print(bool(\"\"))"), vec!["false"]);
    assert_eq!(output_of("print(bool(7))"), vec!["true"]);
    // Type words in call position resolve the same builtins.
    assert_eq!(output_of("print(string(5) + \"x\")"), vec!["5x"]);
}

#[test]
fn ukrainian_aliases_resolve_the_same_functions() {
    assert_eq!(output_of("друк(модуль(-5))"), vec!["5"]);
    assert_eq!(output_of("друк(довжина([1, 2]))"), vec!["2"]);
    assert_eq!(output_of("друк(сума(діапазон(1, 4)))"), vec!["6"]);
    assert_eq!(output_of("друк(ціле(\"7\") + 1)"), vec!["8"]);
}

#[test]
fn range_and_sum() {
    assert_eq!(output_of("print(range(4))"), vec!["[0, 1, 2, 3]"]);
    assert_eq!(output_of("print(range(1, 4))"), vec!["[1, 2, 3]"]);
    assert_eq!(output_of("print(range(6, 0, -2))"), vec!["[6, 4, 2]"]);
    assert_eq!(output_of("print(sum(range(1, 5)))"), vec!["10"]);
    assert_eq!(output_of("print(sum([1, 2.5]))"), vec!["3.5"]);
}

#[test]
fn type_builtin_names_runtime_tags() {
    assert_eq!(output_of("print(type(1))"), vec!["int"]);
    assert_eq!(output_of("print(type(1.0))"), vec!["float"]);
    assert_eq!(output_of("print(type(\"s\"))"), vec!["string"]);
    assert_eq!(output_of("print(type(none))"), vec!["none"]);
    assert_eq!(output_of("print(type([1]))"), vec!["list"]);
    assert_eq!(output_of("print(type(abs))"), vec!["function"]);
}

#[test]
fn builtins_enforce_arity() {
    let message = runtime_error("abs(1, 2)");
    assert!(message.contains("expects 1 arguments"), "{message}");
}

#[test]
fn builtins_fail_cleanly_on_type_mismatch() {
    assert!(runtime_error("abs(\"x\")").contains("expects a number"));
    assert!(runtime_error("len(5)").contains("expects a string, list, or map"));
    assert!(runtime_error("range(0, 5, 0)").contains("step"));
    assert!(runtime_error("int(\"seven\")").contains("cannot parse"));
    assert!(runtime_error("sum([1, \"a\"])").contains("expects numbers"));
}

#[test]
fn builtins_can_be_passed_as_values() {
    // A builtin is an ordinary value: pipeable and storable.
    assert_eq!(output_of("let f = abs print(f(-3))"), vec!["3"]);
    assert_eq!(output_of("print(-9 |> abs)"), vec!["9"]);
}
