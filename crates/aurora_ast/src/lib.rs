//! Aurora AST definitions
//!
//! This crate defines the abstract syntax tree (AST) and the language
//! type enum for Aurora. It serves as the contract between the parser
//! and the compiler core.

/// Identifier of an interned class type.
///
/// Class types are interned by name in the compiler's `TypeRegistry`;
/// the id indexes the registry's declaration table. Lookup is
/// infallible once the class has been registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub u32);

/// Aurora language types.
///
/// Primitive variants are plain values, so interning falls out of value
/// semantics; compound types compare structurally. `Unknown` stands in
/// for a type the parser could not resolve yet; it is refined at code
/// generation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Void,
    /// 64-bit signed integer
    Int,
    /// 64-bit IEEE float
    Double,
    Bool,
    /// Runtime-managed pointer
    String,
    /// Optional type for null safety (`T?`)
    Optional(Box<Type>),
    /// Array type (`[T]`)
    Array(Box<Type>),
    Function {
        ret: Box<Type>,
        params: Vec<Type>,
    },
    Class(ClassId),
    Unknown,
}

impl Type {
    pub fn optional(inner: Type) -> Type {
        Type::Optional(Box::new(inner))
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int)
    }

    pub fn is_double(&self) -> bool {
        matches!(self, Type::Double)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Type::Optional(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn is_class(&self) -> bool {
        matches!(self, Type::Class(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    pub fn is_nullable(&self) -> bool {
        self.is_optional()
    }

    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Type::Class(id) => Some(*id),
            _ => None,
        }
    }

    /// Inner type of an optional, if this is one.
    pub fn optional_inner(&self) -> Option<&Type> {
        match self {
            Type::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    /// Element type of an array, if this is one.
    pub fn array_elem(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }
}

// ===== Expressions =====

/// Expressions carry the type the parser attached to them; `ty()`
/// computes derived types for the operator variants. Types that cannot
/// be known until the class registry is complete are `Unknown` and are
/// refined during code generation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(IntLitExpr),
    DoubleLit(DoubleLitExpr),
    BoolLit(BoolLitExpr),
    StringLit(StringLitExpr),
    NullLit(NullLitExpr),
    Var(VarExpr),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Ternary(TernaryExpr),
    Call(CallExpr),
    New(NewExpr),
    This(ThisExpr),
    Member(MemberExpr),
    MemberCall(MemberCallExpr),
    ArrayLit(ArrayLitExpr),
    Index(IndexExpr),
    NullCheck(NullCheckExpr),
    SafeNav(SafeNavExpr),
    ForceUnwrap(ForceUnwrapExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntLitExpr {
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoubleLitExpr {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolLitExpr {
    pub value: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StringLitExpr {
    pub value: String,
}

/// The null literal. Its concrete optional type is supplied by the
/// surrounding context (declaration, assignment target, return type or
/// argument slot) during lowering; until then it reads as `void?`.
#[derive(Debug, Clone, PartialEq)]
pub struct NullLitExpr;

#[derive(Debug, Clone, PartialEq)]
pub struct VarExpr {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!x`
    Not,
    /// `-x`
    Neg,
    /// `~x`
    BitNot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub expr: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    /// `??`
    NullCoalesce,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEq
                | BinaryOp::GreaterEq
                | BinaryOp::Equal
                | BinaryOp::NotEqual
        )
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr
        )
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TernaryExpr {
    pub condition: Box<Expr>,
    pub then_expr: Box<Expr>,
    pub else_expr: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: String,
    pub args: Vec<Expr>,
    pub ty: Type,
}

/// Class instantiation. The parser turns `Name(args)` into a `New`
/// expression whenever `Name` is a registered class.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpr {
    pub class: ClassId,
    pub args: Vec<Expr>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThisExpr {
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    pub member: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberCallExpr {
    pub object: Box<Expr>,
    pub method: String,
    pub args: Vec<Expr>,
    /// Best-effort return type computed during parsing; consult the
    /// class registry at lowering time for the authoritative answer.
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayLitExpr {
    pub elements: Vec<Expr>,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexExpr {
    pub array: Box<Expr>,
    pub index: Box<Expr>,
}

/// `x?` — true when the optional holds a value.
#[derive(Debug, Clone, PartialEq)]
pub struct NullCheckExpr {
    pub expr: Box<Expr>,
}

/// `obj?.member`
#[derive(Debug, Clone, PartialEq)]
pub struct SafeNavExpr {
    pub object: Box<Expr>,
    pub member: String,
    pub ty: Type,
}

/// `x!`
#[derive(Debug, Clone, PartialEq)]
pub struct ForceUnwrapExpr {
    pub expr: Box<Expr>,
}

impl Expr {
    /// Static type of the expression as known to the parser.
    pub fn ty(&self) -> Type {
        match self {
            Expr::IntLit(_) => Type::Int,
            Expr::DoubleLit(_) => Type::Double,
            Expr::BoolLit(_) => Type::Bool,
            Expr::StringLit(_) => Type::String,
            Expr::NullLit(_) => Type::optional(Type::Void),
            Expr::Var(v) => v.ty.clone(),
            Expr::Unary(u) => match u.op {
                UnaryOp::Not => Type::Bool,
                _ => u.expr.ty(),
            },
            Expr::Binary(b) => {
                if b.op.is_comparison() || b.op.is_logical() {
                    Type::Bool
                } else if b.op.is_bitwise() {
                    Type::Int
                } else if b.op == BinaryOp::NullCoalesce {
                    match b.left.ty() {
                        Type::Optional(inner) => *inner,
                        other => other,
                    }
                } else {
                    // Arithmetic: int unless either side is floating.
                    let (l, r) = (b.left.ty(), b.right.ty());
                    if l.is_double() || r.is_double() {
                        Type::Double
                    } else if l.is_int() && r.is_int() {
                        Type::Int
                    } else {
                        l
                    }
                }
            }
            Expr::Ternary(t) => t.then_expr.ty(),
            Expr::Call(c) => c.ty.clone(),
            Expr::New(n) => n.ty.clone(),
            Expr::This(t) => t.ty.clone(),
            Expr::Member(m) => m.ty.clone(),
            Expr::MemberCall(m) => m.ty.clone(),
            Expr::ArrayLit(a) => a.ty.clone(),
            Expr::Index(ix) => match ix.array.ty() {
                Type::Array(elem) => *elem,
                _ => Type::Unknown,
            },
            Expr::NullCheck(_) => Type::Bool,
            Expr::SafeNav(s) => s.ty.clone(),
            Expr::ForceUnwrap(f) => match f.expr.ty() {
                Type::Optional(inner) => *inner,
                other => other,
            },
        }
    }
}

// ===== Statements =====

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Return(ReturnStmt),
    Expr(ExprStmt),
    VarDecl(VarDeclStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Loop(LoopStmt),
    Break(BreakStmt),
    Continue(ContinueStmt),
    Assign(AssignStmt),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmt {
    pub expr: Expr,
}

/// `let x: T = init` / `var x: T = init`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclStmt {
    pub name: String,
    pub ty: Type,
    pub init: Expr,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Vec<Stmt>,
    pub else_branch: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// Semi-open integer range loop: `for i in start..end { .. }` with an
/// optional step (defaults to 1).
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub var_name: String,
    pub start: Expr,
    pub end: Expr,
    pub step: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopStmt {
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakStmt;

#[derive(Debug, Clone, PartialEq)]
pub struct ContinueStmt;

/// Assignment; the target is a variable, member access or array index.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignStmt {
    pub target: Expr,
    pub value: Expr,
}

// ===== Declarations =====

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Parameter {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub line: usize,
    pub column: usize,
}

impl Prototype {
    pub fn new(name: impl Into<String>, params: Vec<Parameter>, return_type: Type) -> Self {
        Prototype {
            name: name.into(),
            params,
            return_type,
            line: 0,
            column: 0,
        }
    }

    pub fn set_location(&mut self, line: usize, column: usize) {
        self.line = line;
        self.column = column;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub proto: Prototype,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
    pub is_public: bool,
    pub initializer: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Parameter>,
    pub return_type: Type,
    pub body: Vec<Stmt>,
    pub is_public: bool,
    pub is_static: bool,
    pub is_constructor: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    /// true for `object` declarations
    pub is_singleton: bool,
    pub line: usize,
    pub column: usize,
}

impl ClassDecl {
    pub fn find_field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn find_method(&self, name: &str) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Signature-based lookup used for overload resolution.
    pub fn find_method_with_sig(&self, name: &str, param_types: &[Type]) -> Option<&MethodDecl> {
        self.methods.iter().find(|m| {
            m.name == name
                && m.params.len() == param_types.len()
                && m.params
                    .iter()
                    .zip(param_types)
                    .all(|(p, ty)| p.ty == *ty)
        })
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodDecl> {
        self.methods.iter().filter(|m| m.is_constructor)
    }

    /// Synthesize a constructor with one parameter per field (in field
    /// order) when the class declares none. The body assigns each
    /// parameter to the corresponding `this.field`.
    pub fn generate_implicit_constructor(&mut self, class_ty: Type) {
        if self.methods.iter().any(|m| m.is_constructor) {
            return;
        }

        let mut params = Vec::new();
        let mut body = Vec::new();

        for field in &self.fields {
            params.push(Parameter::new(field.name.clone(), field.ty.clone()));

            let this_expr = Expr::This(ThisExpr {
                ty: class_ty.clone(),
            });
            let member = Expr::Member(MemberExpr {
                object: Box::new(this_expr),
                member: field.name.clone(),
                ty: field.ty.clone(),
            });
            let param = Expr::Var(VarExpr {
                name: field.name.clone(),
                ty: field.ty.clone(),
            });
            body.push(Stmt::Assign(AssignStmt {
                target: member,
                value: param,
            }));
        }

        self.methods.push(MethodDecl {
            name: "constructor".to_string(),
            params,
            return_type: Type::Void,
            body,
            is_public: true,
            is_static: false,
            is_constructor: true,
        });
    }
}

/// `package com.example.app`
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDecl {
    pub name: String,
}

impl PackageDecl {
    /// `com.example.app` -> `com/example/app`
    pub fn to_path(&self) -> String {
        self.name.replace('.', "/")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportDecl {
    pub module_path: String,
}

/// A parsed compilation unit. Class declarations are owned by the
/// compiler's type registry; the program records them by id in
/// declaration order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub package: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub functions: Vec<Function>,
    pub classes: Vec<ClassId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_expr_type_joins_numeric_operands() {
        let e = Expr::Binary(BinaryExpr {
            op: BinaryOp::Add,
            left: Box::new(Expr::IntLit(IntLitExpr { value: 1 })),
            right: Box::new(Expr::DoubleLit(DoubleLitExpr { value: 2.0 })),
        });
        assert_eq!(e.ty(), Type::Double);

        let e = Expr::Binary(BinaryExpr {
            op: BinaryOp::Mul,
            left: Box::new(Expr::IntLit(IntLitExpr { value: 3 })),
            right: Box::new(Expr::IntLit(IntLitExpr { value: 4 })),
        });
        assert_eq!(e.ty(), Type::Int);
    }

    #[test]
    fn comparison_and_null_check_are_bool() {
        let cmp = Expr::Binary(BinaryExpr {
            op: BinaryOp::Less,
            left: Box::new(Expr::IntLit(IntLitExpr { value: 1 })),
            right: Box::new(Expr::IntLit(IntLitExpr { value: 2 })),
        });
        assert_eq!(cmp.ty(), Type::Bool);

        let check = Expr::NullCheck(NullCheckExpr {
            expr: Box::new(Expr::Var(VarExpr {
                name: "a".into(),
                ty: Type::optional(Type::Int),
            })),
        });
        assert_eq!(check.ty(), Type::Bool);
    }

    #[test]
    fn force_unwrap_strips_optional() {
        let e = Expr::ForceUnwrap(ForceUnwrapExpr {
            expr: Box::new(Expr::Var(VarExpr {
                name: "a".into(),
                ty: Type::optional(Type::String),
            })),
        });
        assert_eq!(e.ty(), Type::String);
    }

    #[test]
    fn implicit_constructor_mirrors_field_order() {
        let mut decl = ClassDecl {
            name: "Point".into(),
            fields: vec![
                FieldDecl {
                    name: "x".into(),
                    ty: Type::Int,
                    is_public: true,
                    initializer: None,
                },
                FieldDecl {
                    name: "y".into(),
                    ty: Type::Int,
                    is_public: true,
                    initializer: None,
                },
            ],
            methods: Vec::new(),
            is_singleton: false,
            line: 1,
            column: 1,
        };
        decl.generate_implicit_constructor(Type::Class(ClassId(0)));

        let ctor = decl.find_method("constructor").expect("implicit ctor");
        assert!(ctor.is_constructor);
        assert_eq!(ctor.params.len(), 2);
        assert_eq!(ctor.params[0].name, "x");
        assert_eq!(ctor.params[1].name, "y");
        assert_eq!(ctor.body.len(), 2);

        // Second call must not add another constructor.
        decl.generate_implicit_constructor(Type::Class(ClassId(0)));
        assert_eq!(decl.constructors().count(), 1);
    }

    #[test]
    fn explicit_constructor_suppresses_implicit_one() {
        let mut decl = ClassDecl {
            name: "C".into(),
            fields: vec![FieldDecl {
                name: "v".into(),
                ty: Type::Int,
                is_public: true,
                initializer: None,
            }],
            methods: vec![MethodDecl {
                name: "constructor".into(),
                params: vec![Parameter::new("x", Type::Double)],
                return_type: Type::Void,
                body: Vec::new(),
                is_public: true,
                is_static: false,
                is_constructor: true,
            }],
            is_singleton: false,
            line: 1,
            column: 1,
        };
        decl.generate_implicit_constructor(Type::Class(ClassId(0)));
        assert_eq!(decl.constructors().count(), 1);
        assert_eq!(decl.constructors().next().unwrap().params[0].ty, Type::Double);
    }

    #[test]
    fn method_signature_lookup_is_exact() {
        let decl = ClassDecl {
            name: "C".into(),
            fields: Vec::new(),
            methods: vec![
                MethodDecl {
                    name: "constructor".into(),
                    params: vec![Parameter::new("x", Type::Int)],
                    return_type: Type::Void,
                    body: Vec::new(),
                    is_public: true,
                    is_static: false,
                    is_constructor: true,
                },
                MethodDecl {
                    name: "constructor".into(),
                    params: vec![Parameter::new("x", Type::Double)],
                    return_type: Type::Void,
                    body: Vec::new(),
                    is_public: true,
                    is_static: false,
                    is_constructor: true,
                },
            ],
            is_singleton: false,
            line: 1,
            column: 1,
        };

        let m = decl
            .find_method_with_sig("constructor", &[Type::Int])
            .expect("int overload");
        assert_eq!(m.params[0].ty, Type::Int);
        assert!(decl
            .find_method_with_sig("constructor", &[Type::Bool])
            .is_none());
    }

    #[test]
    fn package_path_conversion() {
        let pkg = PackageDecl {
            name: "com.example.app".into(),
        };
        assert_eq!(pkg.to_path(), "com/example/app");
    }
}
