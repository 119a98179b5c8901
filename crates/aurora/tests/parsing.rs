// End-to-end parsing tests over representative programs.

use aurora::Compiler;
use aurora::parser::Parser;

use aurora_ast::{Expr, Stmt, Type};

fn parse_ok(source: &str) -> (Compiler, aurora_ast::Program) {
    let compiler = Compiler::new_silent();
    let program = {
        let mut parser = Parser::new(source, &compiler);
        parser.parse_program().expect("program should parse")
    };
    assert!(!compiler.has_errors());
    (compiler, program)
}

#[test]
fn representative_program_parses() {
    let source = r#"
        package demo.geometry
        import "shapes/util"

        class Rect(pub let w: int, pub let h: int) {
            fn area() -> int { return this.w * this.h }
        }

        object Origin {
            let x: int = 0
            let y: int = 0
        }

        fn clamp(v: int, lo: int, hi: int) -> int {
            if v < lo { return lo }
            if v > hi { return hi }
            return v
        }

        fn main() -> int {
            let r = Rect(3, 4)
            var total: int = 0
            for i in 0..r.area() {
                total = total + clamp(i, 0, 10)
            }
            while total > 100 { total = total - 1 }
            return total
        }
    "#;

    let (compiler, program) = parse_ok(source);

    assert_eq!(program.package.as_ref().unwrap().name, "demo.geometry");
    assert_eq!(program.imports.len(), 1);
    assert_eq!(program.functions.len(), 2);
    assert_eq!(program.classes.len(), 2);

    let registry = compiler.registry.borrow();
    let rect = registry.decl(program.classes[0]).unwrap();
    assert_eq!(rect.fields.len(), 2);
    assert!(rect.find_method("area").is_some());
    // Primary constructor came from the class header.
    assert_eq!(rect.constructors().count(), 1);

    let origin = registry.decl(program.classes[1]).unwrap();
    assert!(origin.is_singleton);
    // No explicit constructor: the implicit one takes one param per field.
    assert_eq!(origin.constructors().next().unwrap().params.len(), 2);
}

#[test]
fn null_safety_operators_compose() {
    let source = r#"
        class Box(let v: int)
        fn main(b: Box?) -> int {
            if b? {
                let inner = b?.v
                return inner ?? 0
            }
            return b == null ? -1 : 1
        }
    "#;
    let (_c, program) = parse_ok(source);
    let body = &program.functions[0].body;

    let Stmt::If(ifs) = &body[0] else { panic!("expected if") };
    assert!(matches!(ifs.condition, Expr::NullCheck(_)));

    let Stmt::VarDecl(decl) = &ifs.then_branch[0] else {
        panic!("expected let inner")
    };
    assert!(matches!(decl.init, Expr::SafeNav(_)));
    // b?.v has type int? (field int behind an optional receiver).
    assert_eq!(decl.ty, Type::optional(Type::Int));

    let Stmt::Return(ret) = &body[1] else { panic!() };
    assert!(matches!(ret.value, Some(Expr::Ternary(_))));
}

#[test]
fn operators_follow_the_precedence_ladder() {
    // Multiplicative under additive under comparison under &&.
    let (_c, program) = parse_ok("fn main() -> bool { return 1 + 2 < 3 * 4 && true; }");
    let Stmt::Return(ret) = &program.functions[0].body[0] else {
        panic!()
    };
    let Some(Expr::Binary(and)) = &ret.value else {
        panic!("&& at the top")
    };
    assert_eq!(and.op, aurora_ast::BinaryOp::And);
    let Expr::Binary(cmp) = and.left.as_ref() else {
        panic!("comparison under &&")
    };
    assert_eq!(cmp.op, aurora_ast::BinaryOp::Less);
}

#[test]
fn lexer_diagnostics_surface_through_the_parser() {
    let compiler = Compiler::new_silent();
    let mut parser = Parser::new("fn main() { let s = \"unterminated }", &compiler);
    let _ = parser.parse_program();

    let diags = compiler.diagnostics.borrow();
    assert!(diags.has_errors());
    assert!(diags.diagnostics().iter().any(|d| d.code == "E1001"));
}

#[test]
fn parse_abort_is_not_resumable() {
    let compiler = Compiler::new_silent();
    let mut parser = Parser::new("class { }", &compiler);
    assert!(parser.parse_program().is_err());
    assert_eq!(compiler.diagnostics.borrow().error_count(), 1);
}
