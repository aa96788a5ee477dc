use indoc::indoc;

use super::ast_rewrite::fold_constant_condition;
use crate::{
    frontend::{
        ast::{Expression, ExpressionKind, Literal, Statement, StatementKind},
        lexer::Span,
    },
    middle::{
        context::SignatureTable,
        error::{CompileErrorKind, TypeBoundary},
        lir::{Instruction, ast_lowering::lower_function},
        optimization::optimize_function,
        ty::Type,
    },
    test_utils::{
        body_statements, empty_context, optimize, parse_expression, parse_function, parse_module,
    },
};

fn describe_body(source: &str) -> String {
    let function = optimize(source);
    String::from_utf8(strip_ansi_escapes::strip(function.body.describe(""))).unwrap()
}

fn optimized_expression(source: &str) -> Expression {
    parse_expression(source).optimize().unwrap()
}

#[test]
fn constant_true_condition_keeps_only_the_then_branch() {
    let source = indoc! {"
        fn f() -> int {
            if true {
                return 1;
            } else {
                return 2;
            }
        }
    "};

    assert_eq!(
        describe_body(source),
        indoc! {"
            Block
            └── Return
                └── 1
        "}
    );

    let module = parse_module(source);
    let signatures = SignatureTable::build(&module).unwrap();
    let function = optimize_function(module.functions[0].clone(), &signatures, 8).unwrap();
    let lowered = lower_function(&function, &signatures).unwrap();

    assert_eq!(lowered.blocks.len(), 1);
    assert!(
        !lowered
            .instructions()
            .any(|i| matches!(i, Instruction::Branch { .. }))
    );
}

#[test]
fn constant_false_condition_selects_the_else_branch() {
    let body = describe_body(indoc! {"
        fn f(x: int) -> int {
            if 2 < 1 {
                return 1;
            } else if x > 0 {
                return 2;
            } else {
                return 3;
            }
        }
    "});

    assert_eq!(
        body,
        indoc! {"
            Block
            └── If
                ├── condition: Binary >
                │   ├── x
                │   └── 0
                ├── then: Block
                │   └── Return
                │       └── 2
                └── else: Block
                    └── Return
                        └── 3
        "}
    );
}

#[test]
fn missing_live_branch_leaves_nothing_behind() {
    let body = describe_body(indoc! {"
        fn f() {
            if false {
                f();
            }
            if !true {
                f();
            }
        }
    "});

    assert_eq!(body, "Block\n");
}

#[test]
fn dead_branch_emits_nothing() {
    let source = indoc! {"
        fn side_effect() { }
        fn f(x: int) -> int {
            if 1 == 2 && true {
                side_effect();
            }
            return x;
        }
    "};
    let module = parse_module(source);
    let signatures = SignatureTable::build(&module).unwrap();
    let function = optimize_function(module.functions[1].clone(), &signatures, 8).unwrap();
    let lowered = lower_function(&function, &signatures).unwrap();

    assert!(
        !lowered
            .instructions()
            .any(|i| matches!(i, Instruction::FunctionCall { .. } | Instruction::Branch { .. }))
    );
}

#[test]
fn nested_ifs_collapse_into_logical_and() {
    let body = describe_body(indoc! {"
        fn f(a: bool, b: bool) {
            if a {
                if b {
                    f(a, b);
                }
            }
        }
    "});

    assert_eq!(
        body,
        indoc! {"
            Block
            └── If
                ├── condition: LogicalAnd
                │   ├── a
                │   └── b
                └── then: Block
                    └── Expression
                        └── Call f
                            ├── a
                            └── b
        "}
    );
}

#[test]
fn deeply_nested_ifs_collapse_in_one_pass() {
    let source = indoc! {"
        fn f(a: bool, b: bool, c: bool) {
            if a {
                if b {
                    if c {
                        return;
                    }
                }
            }
        }
    "};
    let module = parse_module(source);
    let signatures = SignatureTable::build(&module).unwrap();
    let function = optimize_function(module.functions[0].clone(), &signatures, 1).unwrap();

    let body = String::from_utf8(strip_ansi_escapes::strip(function.body.describe(""))).unwrap();
    assert_eq!(
        body,
        indoc! {"
            Block
            └── If
                ├── condition: LogicalAnd
                │   ├── a
                │   └── LogicalAnd
                │       ├── b
                │       └── c
                └── then: Block
                    └── Return
        "}
    );
}

#[test]
fn ifs_with_else_branches_are_not_collapsed() {
    let source = indoc! {"
        fn f(a: bool, b: bool) -> int {
            if a {
                if b {
                    return 1;
                } else {
                    return 2;
                }
            }
            return 3;
        }
    "};

    let optimized = optimize(source);
    let original = parse_function(source);

    assert_eq!(optimized.body, original.body);
}

#[test]
fn optimizing_twice_changes_nothing() {
    let sources = [
        indoc! {"
            fn f(a: bool, b: bool) -> int {
                if a { if b { if true { return 1; } } }
                { { let x = 2 * 3; } }
                while false { return 4; }
                return 5;
            }
        "},
        indoc! {"
            fn f(x: int) -> int {
                if x > 1 { return 1; } else if false { return 2; } else { if x < 0 { return 3; } }
                return 4;
            }
        "},
    ];

    for source in sources {
        let module = parse_module(source);
        let signatures = SignatureTable::build(&module).unwrap();
        let ctx = empty_context(&signatures);

        let once = module.functions[0].body.clone().optimize(&ctx).unwrap();
        let twice = once.clone().optimize(&ctx).unwrap();

        assert_eq!(once, twice);
    }
}

#[test]
fn nested_blocks_are_spliced_unless_they_declare_locals() {
    let body = describe_body(indoc! {"
        fn f(y: int) {
            { { y = 1; } ; }
            { let x = 1; { x = 2; } }
        }
    "});

    assert_eq!(
        body,
        indoc! {"
            Block
            ├── Assign y
            │   └── value: 1
            └── Block
                ├── Let x
                │   └── value: 1
                └── Assign x
                    └── value: 2
        "}
    );
}

#[test]
fn folded_branch_keeps_its_locals_in_their_own_block() {
    let body = describe_body(indoc! {"
        fn f() -> int {
            let y = 1;
            if true { let y = 2.5; }
            return y;
        }
    "});

    assert_eq!(
        body,
        indoc! {"
            Block
            ├── Let y
            │   └── value: 1
            ├── Block
            │   └── Let y
            │       └── value: 2.5
            └── Return
                └── y
        "}
    );
}

#[test]
fn constant_loops() {
    let body = describe_body(indoc! {"
        fn f() {
            while 1 > 2 { f(); }
            while true { return; }
        }
    "});

    assert_eq!(
        body,
        indoc! {"
            Block
            └── While
                ├── condition: true
                └── body: Block
                    └── Return
        "}
    );
}

#[test]
fn folds_literal_operators() {
    assert_eq!(
        optimized_expression("(1 + 2) * 3 - 4 / 2 % 3").as_literal(),
        Some(Literal::Integer(7))
    );
    assert_eq!(
        optimized_expression("-1.5 * 2.0").as_literal(),
        Some(Literal::Float(-3.0))
    );
    assert_eq!(
        optimized_expression(r#"!("a" == "b") || false"#).as_literal(),
        Some(Literal::Bool(true))
    );
    assert_eq!(
        optimized_expression("9223372036854775807 + 1").as_literal(),
        Some(Literal::Integer(i64::MIN))
    );
}

#[test]
fn leaves_runtime_and_ill_typed_operations_alone() {
    assert!(matches!(
        optimized_expression("1 + true").kind,
        ExpressionKind::Binary { .. }
    ));
    assert!(matches!(
        optimized_expression("x && (1 < 2)").kind,
        ExpressionKind::LogicalAnd { .. }
    ));

    // operands are still folded
    let ExpressionKind::LogicalAnd { rhs, .. } = optimized_expression("x && (1 < 2)").kind else {
        unreachable!()
    };
    assert_eq!(rhs.as_literal(), Some(Literal::Bool(true)));
}

#[test]
fn division_by_literal_zero_is_an_error() {
    let error = parse_expression("10 / (5 - 5)").optimize().unwrap_err();
    assert_eq!(error.kind, CompileErrorKind::DivisionByZero);

    let error = parse_expression("1 % 0").optimize().unwrap_err();
    assert_eq!(error.kind, CompileErrorKind::DivisionByZero);
}

#[test]
fn unfolded_constant_condition_is_rejected() {
    let table = SignatureTable::default();
    let ctx = empty_context(&table);

    let literal = |value| Box::new(Expression::literal(Span::default(), Literal::Bool(value)));
    let unfolded = Expression::new(
        Span::default(),
        ExpressionKind::LogicalAnd {
            lhs: literal(true),
            rhs: literal(true),
        },
    );

    let error = fold_constant_condition(&unfolded, &ctx).unwrap_err();
    assert_eq!(error.kind, CompileErrorKind::UnsupportedConstantFold);

    assert_eq!(
        fold_constant_condition(&parse_expression("false"), &ctx).unwrap(),
        Some(false)
    );
    assert_eq!(
        fold_constant_condition(&parse_expression("1 + 2"), &ctx).unwrap(),
        None
    );
}

#[test]
fn ill_typed_constant_conditions_are_left_for_lowering() {
    let table = SignatureTable::default();
    let ctx = empty_context(&table);

    assert_eq!(
        fold_constant_condition(&parse_expression("1 == true"), &ctx).unwrap(),
        None
    );

    let source = "fn f() { if 1 == true { f(); } }";
    let function = optimize(source);
    assert!(matches!(
        &body_statements(&function)[0].kind,
        StatementKind::If { .. }
    ));

    let signatures = SignatureTable::build(&parse_module(source)).unwrap();
    let error = lower_function(&function, &signatures).unwrap_err();
    assert_eq!(
        error.kind,
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::BinaryOperation,
            expected: Type::Int,
            actual: Type::Bool,
        }
    );
}

#[test]
fn a_pass_limit_of_zero_still_runs_one_pass() {
    let module = parse_module("fn f() -> int { if true { return 1; } return 2; }");
    let signatures = SignatureTable::build(&module).unwrap();

    let function = optimize_function(module.functions[0].clone(), &signatures, 0).unwrap();

    assert!(
        !body_statements(&function)
            .iter()
            .any(|statement| matches!(statement.kind, StatementKind::If { .. }))
    );
}

#[test]
fn constant_condition_replaces_if_even_without_else() {
    let table = SignatureTable::default();
    let ctx = empty_context(&table);

    let statement = Statement::new(
        Span::new(3, 9),
        StatementKind::If {
            condition: Expression::literal(Span::default(), Literal::Bool(false)),
            positive: Some(Box::new(Statement::empty(Span::default()))),
            negative: None,
        },
    );

    assert_eq!(statement.optimize(&ctx).unwrap(), Statement::empty(Span::new(3, 9)));
}
