use indoc::indoc;

use super::{BlockId, FunctionDefinition, Immediate, Instruction, Operand, RegisterId};
use crate::{
    frontend::{
        ast::{Expression, Literal, Statement, StatementKind},
        intern::InternedSymbol,
        lexer::Span,
    },
    index::Index,
    middle::{
        context::{FunctionContext, SignatureTable},
        error::{CompileErrorKind, TypeBoundary, TypeUsage},
        lir::{FunctionId, ast_lowering::lower_function, emitter::Emitter},
        ty::Type,
    },
    test_utils::{body_statements, lower, optimize, parse_function, parse_module},
};

fn lower_one(source: &str) -> FunctionDefinition {
    lower(source).remove(0)
}

fn lowering_error(source: &str) -> CompileErrorKind {
    let module = parse_module(source);
    let signatures = SignatureTable::build(&module).unwrap();

    lower_function(module.functions.last().unwrap(), &signatures)
        .unwrap_err()
        .kind
}

fn labels(function: &FunctionDefinition) -> Vec<&'static str> {
    function.blocks.values().map(|b| b.label).collect()
}

fn block_labelled<'f>(function: &'f FunctionDefinition, label: &str) -> &'f super::Block {
    function
        .blocks
        .values()
        .find(|b| b.label == label)
        .unwrap_or_else(|| panic!("no block labelled {label}"))
}

fn reads_register(instruction: &Instruction, register: RegisterId) -> bool {
    let operands = match instruction {
        Instruction::Move { source, .. } => vec![*source],
        Instruction::UnaryOperation { operand, .. } => vec![*operand],
        Instruction::BinaryOperation { lhs, rhs, .. } => vec![*lhs, *rhs],
        Instruction::Branch { condition, .. } => vec![*condition],
        Instruction::Return { value } => value.iter().copied().collect(),
        Instruction::FunctionCall { arguments, .. } => arguments.clone(),
        Instruction::Jump { .. } | Instruction::Unreachable => vec![],
    };

    operands.contains(&Operand::Register(register))
}

fn assert_no_instruction_after_terminator(function: &FunctionDefinition) {
    for block in function.blocks.values() {
        let Some((_, body)) = block.instructions.split_last() else {
            continue;
        };

        assert!(
            !body.iter().any(Instruction::is_terminator),
            "terminator in the middle of {} ({})",
            block.id,
            block.label
        );
    }
}

#[test]
fn if_without_else_falls_through_to_continuation() {
    let function = lower_one(indoc! {"
        fn f(x: int) -> int {
            if x > 0 {
                return 1;
            }
            return 0;
        }
    "});

    assert_eq!(labels(&function), vec!["entry", "then", "cont"]);

    let then = block_labelled(&function, "then").id;
    let cont = block_labelled(&function, "cont").id;

    assert!(matches!(
        function.blocks[&BlockId::ZERO].instructions.last(),
        Some(Instruction::Branch { positive, negative, .. }) if *positive == then && *negative == cont
    ));

    // the then branch returns, so it does not jump to the continuation
    assert_eq!(
        block_labelled(&function, "then").instructions,
        vec![Instruction::Return {
            value: Some(Operand::Immediate(Immediate::Int(1)))
        }]
    );
    assert_eq!(
        block_labelled(&function, "cont").predecessors.iter().collect::<Vec<_>>(),
        vec![&BlockId::ZERO]
    );
}

#[test]
fn if_else_where_both_branches_return() {
    let function = lower_one(indoc! {"
        fn f(x: int) -> int {
            if x > 0 {
                return 1;
            } else {
                return 2;
            }
        }
    "});

    assert_eq!(labels(&function), vec!["entry", "then", "else", "cont"]);
    assert!(
        !function
            .instructions()
            .any(|i| matches!(i, Instruction::Jump { .. }))
    );

    // nothing reaches the continuation but it still has to be terminated
    let cont = block_labelled(&function, "cont");
    assert!(cont.predecessors.is_empty());
    assert_eq!(cont.instructions, vec![Instruction::Unreachable]);
}

#[test]
fn branches_that_fall_through_jump_to_continuation() {
    let function = lower_one(indoc! {"
        fn f(x: bool) -> int {
            let y = 0;
            if x {
                y = 1;
            } else {
                y = 2;
            }
            return y;
        }
    "});

    let cont = block_labelled(&function, "cont").id;

    for label in ["then", "else"] {
        assert_eq!(
            block_labelled(&function, label).instructions.last(),
            Some(&Instruction::Jump { destination: cont })
        );
    }
    assert_eq!(block_labelled(&function, "cont").predecessors.len(), 2);
}

#[test]
fn logical_and_only_evaluates_rhs_when_lhs_is_true() {
    let function = lower_one(indoc! {"
        fn f(a: bool, b: bool) -> bool {
            return a && b;
        }
    "});

    let a = RegisterId::new(0);
    let b = RegisterId::new(1);
    let rhs_block = block_labelled(&function, "and_rhs");
    let end_block = block_labelled(&function, "and_end");

    assert!(matches!(
        function.blocks[&BlockId::ZERO].instructions.last(),
        Some(Instruction::Branch { condition: Operand::Register(c), positive, negative })
            if *c == a && *positive == rhs_block.id && *negative == end_block.id
    ));
    assert!(
        !function.blocks[&BlockId::ZERO]
            .instructions
            .iter()
            .any(|i| reads_register(i, b))
    );
    assert!(rhs_block.instructions.iter().any(|i| reads_register(i, b)));
    assert_eq!(
        rhs_block.instructions.last(),
        Some(&Instruction::Jump {
            destination: end_block.id
        })
    );
}

#[test]
fn logical_or_skips_rhs_when_lhs_is_true() {
    let function = lower_one(indoc! {"
        fn f(a: bool, b: bool) -> bool {
            return a || b;
        }
    "});

    let rhs_block = block_labelled(&function, "or_rhs").id;
    let end_block = block_labelled(&function, "or_end").id;

    assert!(matches!(
        function.blocks[&BlockId::ZERO].instructions.last(),
        Some(Instruction::Branch { positive, negative, .. })
            if *positive == end_block && *negative == rhs_block
    ));
}

#[test]
fn collapsed_nested_ifs_keep_short_circuit_order() {
    let source = indoc! {"
        fn f(a: bool, b: bool) {
            if a {
                if b {
                    f(a, b);
                }
            }
        }
    "};
    let module = parse_module(source);
    let signatures = SignatureTable::build(&module).unwrap();
    let function = lower_function(&optimize(source), &signatures).unwrap();

    assert_eq!(
        labels(&function),
        vec!["entry", "and_rhs", "and_end", "then", "cont"]
    );

    let b = RegisterId::new(1);
    for block in function.blocks.values() {
        let reads_b = block.instructions.iter().any(|i| reads_register(i, b));
        assert_eq!(
            reads_b,
            block.label == "and_rhs" || block.label == "then",
            "unexpected use of `b` in {}",
            block.label
        );
    }

    let then = block_labelled(&function, "then");
    assert!(matches!(
        then.instructions.first(),
        Some(Instruction::FunctionCall { target, destination: None, .. })
            if *target == FunctionId::new(0)
    ));
}

#[test]
fn loops_jump_back_to_their_condition() {
    let function = lower_one(indoc! {"
        fn count(n: int) -> int {
            let i = 0;
            while i < n {
                i = i + 1;
            }
            return i;
        }
    "});

    assert_eq!(
        labels(&function),
        vec!["entry", "while_cond", "while_body", "while_end"]
    );

    let condition = block_labelled(&function, "while_cond");
    assert_eq!(
        block_labelled(&function, "while_body").instructions.last(),
        Some(&Instruction::Jump {
            destination: condition.id
        })
    );
    assert_eq!(condition.predecessors.len(), 2);
}

#[test]
fn loops_whose_body_returns_do_not_jump_back() {
    let function = lower_one(indoc! {"
        fn f(x: bool) -> int {
            while x {
                return 1;
            }
            return 2;
        }
    "});

    let condition = block_labelled(&function, "while_cond");
    assert_eq!(condition.predecessors.len(), 1);
}

#[test]
fn statements_after_a_return_are_not_lowered() {
    let function = lower_one(indoc! {"
        fn f() -> int {
            return 1;
            return 2;
        }
    "});

    assert_eq!(
        function.blocks[&BlockId::ZERO].instructions,
        vec![Instruction::Return {
            value: Some(Operand::Immediate(Immediate::Int(1)))
        }]
    );
}

#[test]
fn unit_functions_return_implicitly() {
    let function = lower_one("fn f(x: int) { let y = x; }");

    assert_eq!(
        function.blocks[&BlockId::ZERO].instructions.last(),
        Some(&Instruction::Return { value: None })
    );
    assert_eq!(function.arguments, vec![RegisterId::new(0)]);
}

#[test]
fn no_instruction_follows_a_terminator() {
    let sources = [
        indoc! {"
            fn f(a: bool, b: bool) -> int {
                if a { if b { return 1; } else { return 2; } }
                while a && !b { if b { return 3; } }
                return 4;
            }
        "},
        indoc! {"
            fn f(x: int) -> int {
                if x > 0 { return 1; } else if x < 0 { return 2; } else { return 3; }
            }
        "},
        indoc! {"
            fn f(x: int) {
                let y = x;
                while y > 0 { y = y - 1; if y == 5 { return; } }
            }
        "},
    ];

    for source in sources {
        for function in lower(source) {
            assert_no_instruction_after_terminator(&function);

            for block in function.blocks.values() {
                if block.id == BlockId::ZERO || !block.predecessors.is_empty() {
                    assert!(block.is_terminated(), "{} is not terminated", block.label);
                }
            }
        }
    }
}

#[test]
fn if_condition_must_be_bool() {
    assert_eq!(
        lowering_error("fn f(x: int) { if x { } }"),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::IfCondition,
            expected: Type::Bool,
            actual: Type::Int,
        }
    );
}

#[test]
fn while_condition_must_be_bool() {
    assert_eq!(
        lowering_error(r#"fn f() { while "yes" { } }"#),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::WhileCondition,
            expected: Type::Bool,
            actual: Type::Str,
        }
    );
}

#[test]
fn if_without_then_branch_is_malformed() {
    let function = parse_function("fn f() { }");
    let signatures = SignatureTable::build(&parse_module("fn f() { }")).unwrap();

    let mut ctx = FunctionContext::for_function(&function, &signatures);
    ctx.set_function_handle(FunctionId::new(0));
    let mut emitter = Emitter::new(&signatures, FunctionId::new(0), InternedSymbol::new("f"), Type::Unit);
    let entry = emitter.create_block(FunctionId::new(0), "entry");
    emitter.set_insertion_cursor(entry);

    let statement = Statement::new(
        Span::default(),
        StatementKind::If {
            condition: Expression::literal(Span::default(), Literal::Bool(true)),
            positive: None,
            negative: None,
        },
    );

    let error = statement.lower(&mut emitter, &mut ctx).unwrap_err();
    assert!(matches!(error.kind, CompileErrorKind::MalformedTree(_)));
}

#[test]
fn lowering_needs_a_function_handle() {
    let function = parse_function("fn f(x: bool) { if x { } }");
    let signatures = SignatureTable::default();

    let mut ctx = FunctionContext::for_function(&function, &signatures);
    let x = function.signature.parameters[0].name;
    ctx.declare(&x, Type::Bool).unwrap().register = Some(RegisterId::new(0));

    let mut emitter = Emitter::new(&signatures, FunctionId::new(0), InternedSymbol::new("f"), Type::Unit);
    emitter.create_argument(Type::Bool);
    let entry = emitter.create_block(FunctionId::new(0), "entry");
    emitter.set_insertion_cursor(entry);

    let error = body_statements(&function)[0]
        .lower(&mut emitter, &mut ctx)
        .unwrap_err();
    assert!(matches!(error.kind, CompileErrorKind::MalformedTree(_)));
}

#[test]
fn missing_return_is_reported() {
    assert_eq!(
        lowering_error("fn f(x: bool) -> int { if x { return 1; } }"),
        CompileErrorKind::MissingReturn {
            expected: Type::Int
        }
    );
}

#[test]
fn mismatched_return_is_reported() {
    assert_eq!(
        lowering_error(r#"fn f() -> int { return "one"; }"#),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::Return,
            expected: Type::Int,
            actual: Type::Str,
        }
    );
    assert_eq!(
        lowering_error("fn f() -> int { return; }"),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::Return,
            expected: Type::Int,
            actual: Type::Unit,
        }
    );
}

#[test]
fn let_binding_rules() {
    assert_eq!(
        lowering_error("fn f() { let x: int = true; }"),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::LetBinding,
            expected: Type::Int,
            actual: Type::Bool,
        }
    );
    assert_eq!(
        lowering_error("fn f() { let x; }"),
        CompileErrorKind::CannotInfer(InternedSymbol::new("x"))
    );
    assert_eq!(
        lowering_error("fn g() { } fn f() { let x = g(); }"),
        CompileErrorKind::InvalidOperation {
            usage: TypeUsage::Binding,
            provided: Type::Unit,
        }
    );
    assert_eq!(
        lowering_error("fn f() { let x = 1; let x = 2.0; }"),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::LetRedeclaration,
            expected: Type::Int,
            actual: Type::Float,
        }
    );
}

#[test]
fn redeclaring_a_local_reuses_its_register() {
    let function = lower_one("fn f() { let x = 1; let x = x + 1; }");

    let moves = function
        .instructions()
        .filter_map(|i| match i {
            Instruction::Move { destination, .. } => Some(*destination),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(moves.len(), 2);
    assert_eq!(moves[0], moves[1]);
}

#[test]
fn an_inner_local_shadows_until_its_block_ends() {
    let function = lower_one(indoc! {"
        fn f() -> int {
            let x = 1;
            {
                let x = 2.0;
            }
            return x;
        }
    "});

    let moves = function
        .instructions()
        .filter_map(|i| match i {
            Instruction::Move { destination, .. } => Some(*destination),
            _ => None,
        })
        .collect::<Vec<_>>();

    assert_eq!(moves, vec![RegisterId::new(0), RegisterId::new(1)]);
    assert_eq!(
        function.instructions().last(),
        Some(&Instruction::Return {
            value: Some(Operand::Register(RegisterId::new(0)))
        })
    );
}

#[test]
fn locals_of_one_branch_are_not_visible_in_the_other() {
    let undefined_y = CompileErrorKind::UndefinedVariable(InternedSymbol::new("y"));

    assert_eq!(
        lowering_error("fn f(c: bool) -> int { if c { let y = 1; } else { y = 2; } return 0; }"),
        undefined_y
    );
    assert_eq!(
        lowering_error("fn f(c: bool) -> int { if c { y = 2; } else { let y = 1; } return 0; }"),
        undefined_y
    );
    assert_eq!(
        lowering_error("fn f(c: bool) -> int { if c { let y = 1; } else { y = 2; } return y; }"),
        undefined_y
    );
}

#[test]
fn assignment_rules() {
    assert_eq!(
        lowering_error("fn f() { x = 1; }"),
        CompileErrorKind::UndefinedVariable(InternedSymbol::new("x"))
    );
    assert_eq!(
        lowering_error("fn f() { let x = 1; x = false; }"),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::Assignment,
            expected: Type::Int,
            actual: Type::Bool,
        }
    );
}

#[test]
fn calls_check_their_arguments() {
    assert_eq!(
        lowering_error("fn g(a: int) { } fn f() { g(true); }"),
        CompileErrorKind::TypeMismatch {
            boundary: TypeBoundary::FunctionArgument,
            expected: Type::Int,
            actual: Type::Bool,
        }
    );
    assert_eq!(
        lowering_error("fn f() { g(); }"),
        CompileErrorKind::UndefinedFunction(InternedSymbol::new("g"))
    );
}

#[test]
fn calls_returning_values_get_a_destination() {
    let functions = lower(indoc! {"
        fn square(x: int) -> int { return x * x; }
        fn f() -> int { return square(3); }
    "});

    let call = functions[1]
        .instructions()
        .find(|i| matches!(i, Instruction::FunctionCall { .. }))
        .unwrap();

    let Instruction::FunctionCall {
        target,
        arguments,
        destination: Some(destination),
    } = call
    else {
        panic!("call without a destination: {call:?}");
    };

    assert_eq!(*target, FunctionId::new(0));
    assert_eq!(arguments, &vec![Operand::Immediate(Immediate::Int(3))]);
    assert_eq!(functions[1].registers[*destination].ty, Type::Int);
}
