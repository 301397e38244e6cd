// MovaScript smoke tests for the tokenizer and parser.
// Covers: bindings, functions, control flow, match arms, lambdas, pipes.

use movascript::ast::{
    self, BindingKind, BinaryOp, Expr, Literal, Pattern, Stmt, Type,
};
use movascript::parser::{ParseError, Parser};
use movascript::tokenizer::Tokenizer;

fn tokenize_and_parse(source: &str) -> Result<ast::Program, ParseError> {
    let tokens = Tokenizer::new(source).tokenize().unwrap();
    Parser::new(tokens).parse()
}

fn parse(source: &str) -> ast::Program {
    tokenize_and_parse(source).unwrap()
}

#[test]
fn test_variable_bindings() {
    let program = parse("let x = 1; var y = 2; const z = 3");
    match &program.statements[0] {
        Stmt::VariableDecl { decl } => {
            assert_eq!(decl.name, "x");
            assert!(matches!(decl.binding, BindingKind::Let));
        }
        other => panic!("expected variable declaration, found {other:?}"),
    }
    assert!(matches!(
        &program.statements[1],
        Stmt::VariableDecl { decl } if matches!(decl.binding, BindingKind::Var)
    ));
    assert!(matches!(
        &program.statements[2],
        Stmt::VariableDecl { decl } if matches!(decl.binding, BindingKind::Const)
    ));
}

#[test]
fn test_type_annotations_are_parsed_and_kept() {
    let program = parse("let x: int = 42");
    match &program.statements[0] {
        Stmt::VariableDecl { decl } => assert_eq!(decl.var_type, Type::Int),
        other => panic!("expected variable declaration, found {other:?}"),
    }
}

#[test]
fn test_function_declaration() {
    let program = parse("fun add(a: int, b: int) -> int { return a + b }");
    match &program.statements[0] {
        Stmt::FunctionDecl { decl } => {
            assert_eq!(decl.name, "add");
            assert_eq!(decl.params.len(), 2);
            assert_eq!(decl.return_type, Type::Int);
            assert!(matches!(decl.body[0], Stmt::Return { .. }));
        }
        other => panic!("expected function declaration, found {other:?}"),
    }
}

#[test]
fn test_ukrainian_surface_parses_identically() {
    for source in ["fun twice(x) { return x * 2 }", "функція twice(x) { повернути x * 2 }"] {
        let program = parse(source);
        let decl = match &program.statements[0] {
            Stmt::FunctionDecl { decl } => decl,
            other => panic!("expected function declaration, found {other:?}"),
        };
        assert_eq!(decl.name, "twice");
        assert_eq!(decl.params.len(), 1);
        assert!(matches!(
            decl.body[0],
            Stmt::Return {
                value: Some(Expr::Binary {
                    operator: BinaryOp::Multiply,
                    ..
                }),
                ..
            }
        ));
    }
}

#[test]
fn test_else_if_chain_nests() {
    let program = parse("if a { b } else if c { d } else { e }");
    let else_branch = match &program.statements[0] {
        Stmt::If { else_branch, .. } => else_branch.as_ref().expect("else branch"),
        other => panic!("expected if statement, found {other:?}"),
    };
    match else_branch.as_ref() {
        Stmt::If { else_branch, .. } => assert!(else_branch.is_some()),
        other => panic!("expected nested if for else-if, found {other:?}"),
    }
}

#[test]
fn test_power_is_right_associative() {
    let program = parse("a ** b ** c");
    let expr = match &program.statements[0] {
        Stmt::Expression { expr } => expr,
        other => panic!("expected expression statement, found {other:?}"),
    };
    match expr {
        Expr::Binary {
            operator: BinaryOp::Power,
            right,
            ..
        } => assert!(matches!(
            right.as_ref(),
            Expr::Binary {
                operator: BinaryOp::Power,
                ..
            }
        )),
        other => panic!("expected power expression, found {other:?}"),
    }
}

#[test]
fn test_assignment_is_right_associative_with_valid_targets() {
    let program = parse("a = b = 1");
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Assign { value, .. },
        } => assert!(matches!(value.as_ref(), Expr::Assign { .. })),
        other => panic!("expected assignment, found {other:?}"),
    }
}

#[test]
fn test_invalid_assignment_target_is_rejected() {
    let error = tokenize_and_parse("1 + 2 = 3").unwrap_err();
    assert!(matches!(
        error,
        ParseError::InvalidSyntax { ref message, .. } if message.contains("assignment target")
    ));
}

#[test]
fn test_compound_assignment_desugars() {
    let program = parse("var x = 1 x += 2");
    match &program.statements[1] {
        Stmt::Expression {
            expr: Expr::Assign { value, .. },
        } => assert!(matches!(
            value.as_ref(),
            Expr::Binary {
                operator: BinaryOp::Add,
                ..
            }
        )),
        other => panic!("expected desugared assignment, found {other:?}"),
    }
}

#[test]
fn test_pipe_chain_parses_left_to_right() {
    let program = parse("10 |> dbl |> inc");
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Pipe { value, .. },
        } => assert!(matches!(value.as_ref(), Expr::Pipe { .. })),
        other => panic!("expected pipe expression, found {other:?}"),
    }
}

#[test]
fn test_lambda_forms() {
    for source in [
        "let f = (x) -> x + 1",
        "let f = (x) => x + 1",
        "let f = (x) -> { return x + 1 }",
        "let f = () -> 0",
    ] {
        let program = parse(source);
        match &program.statements[0] {
            Stmt::VariableDecl { decl } => {
                assert!(matches!(decl.initializer, Expr::Lambda { .. }), "{source}");
            }
            other => panic!("expected variable declaration, found {other:?}"),
        }
    }
}

#[test]
fn test_grouping_still_works_after_lambda_rewind() {
    let program = parse("(1 + 2) * 3");
    match &program.statements[0] {
        Stmt::Expression {
            expr:
                Expr::Binary {
                    operator: BinaryOp::Multiply,
                    ..
                },
        } => {}
        other => panic!("expected multiplication, found {other:?}"),
    }
}

#[test]
fn test_match_arms_with_guards_and_patterns() {
    let program = parse(
        "match x { 0 => a, 1..5 => b, n if n > 9 => c, _ => d }",
    );
    let arms = match &program.statements[0] {
        Stmt::Match { arms, .. } => arms,
        other => panic!("expected match statement, found {other:?}"),
    };
    assert_eq!(arms.len(), 4);
    assert!(matches!(
        arms[0].pattern,
        Pattern::Literal(Literal::Integer(0))
    ));
    assert!(matches!(arms[1].pattern, Pattern::Range { .. }));
    assert!(matches!(arms[2].pattern, Pattern::Identifier(_)));
    assert!(arms[2].guard.is_some());
    assert!(matches!(arms[3].pattern, Pattern::Wildcard));
}

#[test]
fn test_class_declaration_with_methods() {
    let program = parse(
        "class Point(x, y) { fun dist() { return 0 } fun shift(dx) { return dx } }",
    );
    match &program.statements[0] {
        Stmt::ClassDecl { decl } => {
            assert_eq!(decl.name, "Point");
            assert_eq!(decl.fields.len(), 2);
            assert_eq!(decl.methods.len(), 2);
        }
        other => panic!("expected class declaration, found {other:?}"),
    }
}

#[test]
fn test_new_and_postfix_chain() {
    let program = parse("new Point(1, 2).dist()");
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Call { callee, .. },
        } => match callee.as_ref() {
            Expr::Member { object, member, .. } => {
                assert_eq!(member, "dist");
                assert!(matches!(object.as_ref(), Expr::New { .. }));
            }
            other => panic!("expected member access, found {other:?}"),
        },
        other => panic!("expected call expression, found {other:?}"),
    }
}

#[test]
fn test_index_chain() {
    let program = parse("grid[1][2]");
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Index { object, .. },
        } => assert!(matches!(object.as_ref(), Expr::Index { .. })),
        other => panic!("expected index expression, found {other:?}"),
    }
}

#[test]
fn test_reserved_surface_parses() {
    assert!(tokenize_and_parse("break continue").is_ok());
    assert!(tokenize_and_parse("for x in xs { print(x) }").is_ok());
    assert!(tokenize_and_parse("await f()").is_ok());
    assert!(tokenize_and_parse("spawn f()").is_ok());
    assert!(tokenize_and_parse("trait T { fun m() { return 1 } }").is_ok());
}

#[test]
fn test_parse_error_carries_position() {
    let error = tokenize_and_parse("fun { }").unwrap_err();
    match error {
        ParseError::UnexpectedToken { position, .. } => {
            assert_eq!(position.line, 1);
            assert_eq!(position.column, 5);
        }
        other => panic!("expected unexpected-token error, found {other:?}"),
    }
}

#[test]
fn test_print_is_a_dedicated_node() {
    let program = parse("print(1, 2)");
    match &program.statements[0] {
        Stmt::Expression {
            expr: Expr::Print { args, .. },
        } => assert_eq!(args.len(), 2),
        other => panic!("expected print expression, found {other:?}"),
    }
}
