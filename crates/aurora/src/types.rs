//! Type registry for the Aurora compiler.
//!
//! Primitive and compound types are plain `aurora_ast::Type` values and
//! compare structurally. Class types are interned here by name: the
//! registry hands out `ClassId`s and owns the `ClassDecl` for each id
//! once parsing has registered it. A class type is *valid* as soon as
//! its declaration slot is filled, which happens at parse time, before
//! any method body is generated.

use std::collections::HashMap;

use aurora_ast::{ClassDecl, ClassId, Type};

#[derive(Default)]
pub struct TypeRegistry {
    names: Vec<String>,
    by_name: HashMap<String, ClassId>,
    decls: Vec<Option<ClassDecl>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a class type by name, creating the id on first use.
    pub fn class_type(&mut self, name: &str) -> Type {
        Type::Class(self.intern(name))
    }

    pub fn intern(&mut self, name: &str) -> ClassId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = ClassId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        self.decls.push(None);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    /// A name counts as a class only once its declaration is registered;
    /// merely mentioning `Foo` in a type annotation does not make `Foo(…)`
    /// a constructor call.
    pub fn has_class(&self, name: &str) -> bool {
        self.lookup(name)
            .map(|id| self.decl(id).is_some())
            .unwrap_or(false)
    }

    pub fn class_name(&self, id: ClassId) -> &str {
        &self.names[id.0 as usize]
    }

    pub fn register_decl(&mut self, id: ClassId, decl: ClassDecl) {
        self.decls[id.0 as usize] = Some(decl);
    }

    pub fn decl(&self, id: ClassId) -> Option<&ClassDecl> {
        self.decls.get(id.0 as usize).and_then(|d| d.as_ref())
    }

    /// Printable form of a type.
    pub fn display(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "void".to_string(),
            Type::Int => "int".to_string(),
            Type::Double => "double".to_string(),
            Type::Bool => "bool".to_string(),
            Type::String => "string".to_string(),
            Type::Optional(inner) => format!("{}?", self.display(inner)),
            Type::Array(elem) => format!("[{}]", self.display(elem)),
            Type::Function { ret, params } => {
                let params = params
                    .iter()
                    .map(|p| self.display(p))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("fn({}) -> {}", params, self.display(ret))
            }
            Type::Class(id) => self.class_name(*id).to_string(),
            Type::Unknown => "<unknown>".to_string(),
        }
    }

    /// Deterministic mangled tag used for overload-unique symbols.
    pub fn mangled(&self, ty: &Type) -> String {
        match ty {
            Type::Void => "v".to_string(),
            Type::Int => "i".to_string(),
            Type::Double => "d".to_string(),
            Type::Bool => "b".to_string(),
            Type::String => "s".to_string(),
            Type::Optional(inner) => format!("o{}", self.mangled(inner)),
            Type::Array(elem) => format!("a{}", self.mangled(elem)),
            Type::Function { ret, params } => {
                let mut out = String::from("f");
                for p in params {
                    out.push_str(&self.mangled(p));
                }
                out.push('r');
                out.push_str(&self.mangled(ret));
                out
            }
            Type::Class(id) => format!("c{}", self.class_name(*id)),
            Type::Unknown => "u".to_string(),
        }
    }

    /// Uniform constructor symbol: `Name_constructor` with no
    /// parameters, `Name_constructor_<tag>_<tag>…` otherwise. The same
    /// rule applies at definition and call sites.
    pub fn constructor_symbol(&self, class: ClassId, param_types: &[Type]) -> String {
        let mut name = format!("{}_constructor", self.class_name(class));
        for ty in param_types {
            name.push('_');
            name.push_str(&self.mangled(ty));
        }
        name
    }

    /// Method symbol: `Class_method`, with constructor mangling applied
    /// through [`constructor_symbol`](Self::constructor_symbol).
    pub fn method_symbol(&self, class: ClassId, method: &aurora_ast::MethodDecl) -> String {
        if method.is_constructor {
            let param_types: Vec<Type> = method.params.iter().map(|p| p.ty.clone()).collect();
            self.constructor_symbol(class, &param_types)
        } else {
            format!("{}_{}", self.class_name(class), method.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurora_ast::{MethodDecl, Parameter};

    fn empty_class(name: &str) -> ClassDecl {
        ClassDecl {
            name: name.to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
            is_singleton: false,
            line: 1,
            column: 1,
        }
    }

    #[test]
    fn class_types_intern_by_name() {
        let mut reg = TypeRegistry::new();
        let a = reg.class_type("Point");
        let b = reg.class_type("Point");
        let c = reg.class_type("Other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn registration_makes_class_valid() {
        let mut reg = TypeRegistry::new();
        let id = reg.intern("Point");
        assert!(!reg.has_class("Point"));
        reg.register_decl(id, empty_class("Point"));
        assert!(reg.has_class("Point"));
        assert_eq!(reg.decl(id).unwrap().name, "Point");
    }

    #[test]
    fn mangled_tags_follow_the_scheme() {
        let mut reg = TypeRegistry::new();
        let point = reg.class_type("Point");

        assert_eq!(reg.mangled(&Type::Void), "v");
        assert_eq!(reg.mangled(&Type::Int), "i");
        assert_eq!(reg.mangled(&Type::Double), "d");
        assert_eq!(reg.mangled(&Type::Bool), "b");
        assert_eq!(reg.mangled(&Type::String), "s");
        assert_eq!(reg.mangled(&Type::optional(Type::Int)), "oi");
        assert_eq!(reg.mangled(&Type::array(Type::Double)), "ad");
        assert_eq!(reg.mangled(&point), "cPoint");
        assert_eq!(
            reg.mangled(&Type::Function {
                ret: Box::new(Type::Int),
                params: vec![Type::Int, Type::Double],
            }),
            "fidri"
        );
    }

    #[test]
    fn constructor_symbols_are_uniform() {
        let mut reg = TypeRegistry::new();
        let id = reg.intern("C");
        assert_eq!(reg.constructor_symbol(id, &[]), "C_constructor");
        assert_eq!(reg.constructor_symbol(id, &[Type::Int]), "C_constructor_i");
        assert_eq!(
            reg.constructor_symbol(id, &[Type::Int, Type::Double]),
            "C_constructor_i_d"
        );

        let ctor = MethodDecl {
            name: "constructor".into(),
            params: vec![Parameter::new("x", Type::Double)],
            return_type: Type::Void,
            body: Vec::new(),
            is_public: true,
            is_static: false,
            is_constructor: true,
        };
        assert_eq!(reg.method_symbol(id, &ctor), "C_constructor_d");

        let method = MethodDecl {
            name: "area".into(),
            params: Vec::new(),
            return_type: Type::Double,
            body: Vec::new(),
            is_public: true,
            is_static: false,
            is_constructor: false,
        };
        assert_eq!(reg.method_symbol(id, &method), "C_area");
    }

    #[test]
    fn display_round_trips_compound_types() {
        let mut reg = TypeRegistry::new();
        let cls = reg.class_type("Node");
        assert_eq!(reg.display(&Type::optional(Type::Int)), "int?");
        assert_eq!(reg.display(&Type::array(Type::String)), "[string]");
        assert_eq!(reg.display(&cls), "Node");
        assert_eq!(
            reg.display(&Type::Function {
                ret: Box::new(Type::Void),
                params: vec![Type::Int],
            }),
            "fn(int) -> void"
        );
    }
}
