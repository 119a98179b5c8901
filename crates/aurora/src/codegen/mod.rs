//! LLVM-IR code generation.
//!
//! `CodeGen` walks the AST and emits IR into a single module. It keeps
//! the per-function symbol table, a break/continue target stack, a
//! function-return-type stack, a class-context stack and per-scope
//! retain/release tracking. Interior mutability keeps lowering methods
//! on `&self`, so expression lowering can recurse freely.

pub mod arrays;
pub mod classes;
pub mod emit;
pub mod expr;
pub mod stmt;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::targets::TargetMachine;
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, StructType};
use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue};
use inkwell::{AddressSpace, FloatPredicate, IntPredicate};

use aurora_ast::{ClassDecl, ClassId, Expr, Type};

use crate::Compiler;
use crate::diagnostics::Diagnostic;

/// Byte size of the reference-count header `{ i64 ref_count, i32 type_tag }`
/// that leads every heap object (padding included).
pub const HEADER_SIZE: u64 = 16;

/// Runtime type tag for class instances.
pub const TYPE_TAG_OBJECT: u64 = 1;

/// A local variable slot: the alloca and the type stored in it.
#[derive(Clone, Copy)]
pub struct Local<'a> {
    pub alloca: PointerValue<'a>,
    pub pointee: BasicTypeEnum<'a>,
}

/// Break/continue targets for the innermost loop.
pub struct LoopContext<'a> {
    pub break_target: BasicBlock<'a>,
    pub continue_target: BasicBlock<'a>,
}

/// A variable tracked for release at scope exit.
#[derive(Clone)]
struct TrackedVar<'a> {
    alloca: PointerValue<'a>,
    pointee: BasicTypeEnum<'a>,
}

pub struct CodeGen<'a> {
    pub compiler: &'a Compiler,
    pub context: &'a Context,
    pub module: Module<'a>,
    pub builder: Builder<'a>,

    // Cached LLVM types
    pub f64_t: inkwell::types::FloatType<'a>,
    pub i64_t: inkwell::types::IntType<'a>,
    pub i32_t: inkwell::types::IntType<'a>,
    pub i8_t: inkwell::types::IntType<'a>,
    pub bool_t: inkwell::types::IntType<'a>,
    pub ptr_t: inkwell::types::PointerType<'a>,

    named_values: RefCell<HashMap<String, Local<'a>>>,
    variable_types: RefCell<HashMap<String, Type>>,
    loop_stack: RefCell<Vec<LoopContext<'a>>>,
    scope_stack: RefCell<Vec<Vec<TrackedVar<'a>>>>,
    fn_return_stack: RefCell<Vec<Type>>,
    class_stack: RefCell<Vec<ClassId>>,

    // String literals are interned module-wide.
    string_literals: RefCell<HashMap<String, PointerValue<'a>>>,
    next_str_id: Cell<u32>,
}

impl<'a> CodeGen<'a> {
    pub fn new(compiler: &'a Compiler, context: &'a Context, module_name: &str) -> Self {
        let module = context.create_module(module_name);
        module.set_triple(&TargetMachine::get_default_triple());
        let builder = context.create_builder();

        CodeGen {
            compiler,
            context,
            module,
            builder,
            f64_t: context.f64_type(),
            i64_t: context.i64_type(),
            i32_t: context.i32_type(),
            i8_t: context.i8_type(),
            bool_t: context.bool_type(),
            ptr_t: context.i8_type().ptr_type(AddressSpace::default()),
            named_values: RefCell::new(HashMap::new()),
            variable_types: RefCell::new(HashMap::new()),
            loop_stack: RefCell::new(Vec::new()),
            scope_stack: RefCell::new(Vec::new()),
            fn_return_stack: RefCell::new(Vec::new()),
            class_stack: RefCell::new(Vec::new()),
            string_literals: RefCell::new(HashMap::new()),
            next_str_id: Cell::new(0),
        }
    }

    pub fn err(&self, code: &str, message: impl Into<String>) -> Diagnostic {
        Diagnostic::codegen(code, message)
    }

    /// Attach a name to an IR value (parameters, mostly).
    pub fn set_value_name(&self, value: BasicValueEnum<'a>, name: &str) {
        match value {
            BasicValueEnum::IntValue(v) => v.set_name(name),
            BasicValueEnum::FloatValue(v) => v.set_name(name),
            BasicValueEnum::PointerValue(v) => v.set_name(name),
            BasicValueEnum::StructValue(v) => v.set_name(name),
            BasicValueEnum::ArrayValue(v) => v.set_name(name),
            _ => {}
        }
    }

    /// Report a diagnostic and hand back the value for `return Err(...)`.
    pub fn report(&self, diag: Diagnostic) -> Diagnostic {
        self.compiler.diagnostics.borrow_mut().report(diag.clone());
        diag
    }

    pub fn fail<T>(&self, code: &str, message: impl Into<String>) -> Result<T, Diagnostic> {
        Err(self.report(self.err(code, message)))
    }

    // ===== Language-to-LLVM type mapping =====

    /// LLVM representation of an Aurora type; `None` for void.
    pub fn llvm_type(&self, ty: &Type) -> Option<BasicTypeEnum<'a>> {
        match ty {
            Type::Void => None,
            Type::Int => Some(self.i64_t.into()),
            Type::Double => Some(self.f64_t.into()),
            Type::Bool => Some(self.bool_t.into()),
            Type::String => Some(self.ptr_t.into()),
            Type::Class(_) => Some(self.ptr_t.into()),
            Type::Function { .. } => Some(self.ptr_t.into()),
            Type::Unknown => Some(self.ptr_t.into()),
            Type::Optional(inner) => Some(self.optional_type(inner).into()),
            Type::Array(_) => Some(self.array_struct_type().into()),
        }
    }

    /// `Optional(T)` lowers to `{ i1 has_value, T payload }`; a void
    /// payload is represented as `i8`.
    pub fn optional_type(&self, inner: &Type) -> StructType<'a> {
        let payload: BasicTypeEnum = match inner {
            Type::Void => self.i8_t.into(),
            other => self
                .llvm_type(other)
                .unwrap_or_else(|| self.i8_t.into()),
        };
        self.context
            .struct_type(&[self.bool_t.into(), payload], false)
    }

    /// Arrays lower to `{ i64 length, ptr data }`; the data is owned by
    /// the runtime object the literal was built from.
    pub fn array_struct_type(&self) -> StructType<'a> {
        self.context
            .struct_type(&[self.i64_t.into(), self.ptr_t.into()], false)
    }

    /// Header struct `{ i64 ref_count, i32 type_tag }`.
    pub fn header_struct_type(&self) -> StructType<'a> {
        self.context
            .struct_type(&[self.i64_t.into(), self.i32_t.into()], false)
    }

    pub fn fn_type(
        &self,
        params: &[BasicMetadataTypeEnum<'a>],
        ret: &Type,
    ) -> FunctionType<'a> {
        match self.llvm_type(ret) {
            Some(ret_ty) => ret_ty.fn_type(params, false),
            None => self.context.void_type().fn_type(params, false),
        }
    }

    // ===== Manual ABI sizes =====
    //
    // The sizes mirror the target data layout for the simple types the
    // language uses; keeping the table local avoids creating a target
    // machine during code generation.

    pub fn type_align(&self, ty: &Type) -> u64 {
        match ty {
            Type::Void => 1,
            Type::Bool => 1,
            Type::Optional(inner) => self.type_align(inner).max(1),
            _ => 8,
        }
    }

    pub fn type_size(&self, ty: &Type) -> u64 {
        match ty {
            Type::Void => 0,
            Type::Bool => 1,
            Type::Int | Type::Double | Type::String | Type::Class(_) | Type::Function { .. }
            | Type::Unknown => 8,
            Type::Array(_) => 16,
            Type::Optional(inner) => {
                let payload_align = match inner.as_ref() {
                    Type::Void => 1,
                    other => self.type_align(other),
                };
                let payload_size = match inner.as_ref() {
                    Type::Void => 1,
                    other => self.type_size(other),
                };
                let offset = round_up(1, payload_align);
                round_up(offset + payload_size, payload_align.max(1))
            }
        }
    }

    /// Size of a class struct: fields laid out in declaration order
    /// with natural alignment.
    pub fn class_struct_size(&self, decl: &ClassDecl) -> u64 {
        let mut offset = 0u64;
        let mut max_align = 1u64;
        for field in &decl.fields {
            let align = self.type_align(&field.ty);
            max_align = max_align.max(align);
            offset = round_up(offset, align);
            offset += self.type_size(&field.ty);
        }
        round_up(offset, max_align)
    }

    // ===== Entry-block allocas =====

    /// Allocate a local at the top of the function's entry block so the
    /// alloca dominates all uses, regardless of the current insertion
    /// point.
    pub fn create_entry_block_alloca(
        &self,
        function: FunctionValue<'a>,
        name: &str,
        ty: BasicTypeEnum<'a>,
    ) -> Result<PointerValue<'a>, Diagnostic> {
        let tmp = self.context.create_builder();
        let entry = function
            .get_first_basic_block()
            .ok_or_else(|| self.err("E3002", "function has no entry block"))?;
        match entry.get_first_instruction() {
            Some(first) => tmp.position_before(&first),
            None => tmp.position_at_end(entry),
        }
        Ok(tmp.build_alloca(ty, name)?)
    }

    // ===== Variable bookkeeping =====

    pub fn clear_locals(&self) {
        self.named_values.borrow_mut().clear();
        self.variable_types.borrow_mut().clear();
    }

    pub fn define_local(&self, name: &str, local: Local<'a>) -> Option<Local<'a>> {
        self.named_values.borrow_mut().insert(name.to_string(), local)
    }

    pub fn restore_local(&self, name: &str, previous: Option<Local<'a>>) {
        match previous {
            Some(local) => {
                self.named_values.borrow_mut().insert(name.to_string(), local);
            }
            None => {
                self.named_values.borrow_mut().remove(name);
            }
        }
    }

    pub fn lookup_local(&self, name: &str) -> Option<Local<'a>> {
        self.named_values.borrow().get(name).copied()
    }

    pub fn set_variable_type(&self, name: &str, ty: Type) {
        self.variable_types
            .borrow_mut()
            .insert(name.to_string(), ty);
    }

    pub fn variable_type(&self, name: &str) -> Option<Type> {
        self.variable_types.borrow().get(name).cloned()
    }

    // ===== Loop contexts =====

    pub fn push_loop_context(&self, break_target: BasicBlock<'a>, continue_target: BasicBlock<'a>) {
        self.loop_stack.borrow_mut().push(LoopContext {
            break_target,
            continue_target,
        });
    }

    pub fn pop_loop_context(&self) {
        self.loop_stack.borrow_mut().pop();
    }

    pub fn current_loop(&self) -> Option<(BasicBlock<'a>, BasicBlock<'a>)> {
        self.loop_stack
            .borrow()
            .last()
            .map(|ctx| (ctx.break_target, ctx.continue_target))
    }

    // ===== Function return types =====

    pub fn push_function_return_type(&self, ty: Type) {
        self.fn_return_stack.borrow_mut().push(ty);
    }

    pub fn pop_function_return_type(&self) {
        self.fn_return_stack.borrow_mut().pop();
    }

    pub fn current_function_return_type(&self) -> Option<Type> {
        self.fn_return_stack.borrow().last().cloned()
    }

    // ===== Class context =====

    pub fn push_class_context(&self, id: ClassId) {
        self.class_stack.borrow_mut().push(id);
    }

    pub fn pop_class_context(&self) {
        self.class_stack.borrow_mut().pop();
    }

    pub fn current_class(&self) -> Option<ClassId> {
        self.class_stack.borrow().last().copied()
    }

    // ===== Scoped reference counting =====

    pub fn push_scope(&self) {
        self.scope_stack.borrow_mut().push(Vec::new());
    }

    pub fn pop_scope(&self) {
        self.scope_stack.borrow_mut().pop();
    }

    /// Register a variable for release when its scope ends. Only
    /// pointer-carrying slots actually emit a release; array structs
    /// are tracked but skipped by [`emit_release`](Self::emit_release).
    pub fn track_variable(&self, alloca: PointerValue<'a>, pointee: BasicTypeEnum<'a>, ty: &Type) {
        let managed = (pointee.is_pointer_type() && ty.is_class()) || ty.is_array();
        if !managed {
            return;
        }
        if let Some(scope) = self.scope_stack.borrow_mut().last_mut() {
            scope.push(TrackedVar { alloca, pointee });
        }
    }

    fn emit_release(&self, var: &TrackedVar<'a>) -> Result<(), Diagnostic> {
        // Only slots holding a raw pointer are released here; an array
        // slot holds a {len, data} struct whose runtime object cannot
        // be recovered from the data pointer.
        if !var.pointee.is_pointer_type() {
            return Ok(());
        }
        let loaded = self
            .builder
            .build_load(var.alloca, "loaded_for_release")?;
        let release = self.get_release();
        self.builder
            .build_call(release, &[loaded.into()], "")?;
        Ok(())
    }

    /// Release the current scope's tracked variables in reverse
    /// declaration order. Nothing is emitted when the block already has
    /// a terminator.
    pub fn release_all_in_scope(&self) -> Result<(), Diagnostic> {
        let Some(block) = self.builder.get_insert_block() else {
            return Ok(());
        };
        if block.get_terminator().is_some() {
            return Ok(());
        }
        let vars: Vec<TrackedVar<'a>> = match self.scope_stack.borrow().last() {
            Some(scope) => scope.clone(),
            None => return Ok(()),
        };
        for var in vars.iter().rev() {
            self.emit_release(var)?;
        }
        Ok(())
    }

    /// Retain a value if it is a heap pointer; returns the (possibly
    /// retained) value.
    pub fn insert_retain(
        &self,
        val: BasicValueEnum<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        if !val.is_pointer_value() {
            return Ok(val);
        }
        let retain = self.get_retain();
        let call = self.builder.build_call(retain, &[val.into()], "retained")?;
        Ok(call
            .try_as_basic_value()
            .left()
            .unwrap_or(val))
    }

    /// Release the pointer currently stored in `local`, if any.
    pub fn release_stored_pointer(&self, local: Local<'a>) -> Result<(), Diagnostic> {
        if !local.pointee.is_pointer_type() {
            return Ok(());
        }
        let loaded = self
            .builder
            .build_load(local.alloca, "old_value")?;
        let release = self.get_release();
        self.builder.build_call(release, &[loaded.into()], "")?;
        Ok(())
    }

    // ===== Static expression typing =====

    /// Static Aurora type of an expression, refining the parser's
    /// answer with codegen-time knowledge (variable registry, class
    /// context, class declarations).
    pub fn expr_type(&self, expr: &Expr) -> Type {
        match expr {
            Expr::Var(v) => self.variable_type(&v.name).unwrap_or_else(|| v.ty.clone()),
            Expr::This(t) => match self.current_class() {
                Some(id) => Type::Class(id),
                None => t.ty.clone(),
            },
            Expr::Member(m) => {
                if let Some(class) = self.class_of_expr(&m.object) {
                    let registry = self.compiler.registry.borrow();
                    if let Some(field) = registry.decl(class).and_then(|d| d.find_field(&m.member))
                    {
                        return field.ty.clone();
                    }
                }
                m.ty.clone()
            }
            Expr::MemberCall(m) => self.member_call_type(m),
            Expr::Index(ix) => match self.expr_type(&ix.array) {
                Type::Array(elem) => *elem,
                _ => Type::Unknown,
            },
            Expr::Unary(u) => match u.op {
                aurora_ast::UnaryOp::Not => Type::Bool,
                _ => self.expr_type(&u.expr),
            },
            Expr::Binary(b) => {
                if b.op == aurora_ast::BinaryOp::NullCoalesce {
                    match self.expr_type(&b.left) {
                        Type::Optional(inner) => *inner,
                        other => other,
                    }
                } else if b.op.is_comparison() || b.op.is_logical() {
                    Type::Bool
                } else if b.op.is_bitwise() {
                    Type::Int
                } else {
                    let (l, r) = (self.expr_type(&b.left), self.expr_type(&b.right));
                    if l.is_double() || r.is_double() {
                        Type::Double
                    } else {
                        l
                    }
                }
            }
            Expr::Ternary(t) => self.expr_type(&t.then_expr),
            Expr::ForceUnwrap(f) => match self.expr_type(&f.expr) {
                Type::Optional(inner) => *inner,
                other => other,
            },
            Expr::SafeNav(s) => {
                let obj_ty = self.expr_type(&s.object);
                let inner = obj_ty.optional_inner().cloned().unwrap_or(obj_ty);
                if let Some(class) = inner.as_class() {
                    let registry = self.compiler.registry.borrow();
                    if let Some(field) = registry.decl(class).and_then(|d| d.find_field(&s.member))
                    {
                        return Type::optional(field.ty.clone());
                    }
                }
                s.ty.clone()
            }
            _ => expr.ty(),
        }
    }

    /// Member-call return type, refined through the current class
    /// registry (the parser may have cached `Unknown`).
    pub fn member_call_type(&self, call: &aurora_ast::MemberCallExpr) -> Type {
        if let Some(class) = self.class_of_expr(&call.object) {
            let registry = self.compiler.registry.borrow();
            if let Some(method) = registry.decl(class).and_then(|d| d.find_method(&call.method)) {
                return method.return_type.clone();
            }
        }
        call.ty.clone()
    }

    /// Resolve the class of a receiver expression, walking the same
    /// fallbacks as the original design: the static type, `new`
    /// expressions, variables and the class context for `this`.
    pub fn class_of_expr(&self, expr: &Expr) -> Option<ClassId> {
        match expr {
            Expr::This(_) => self.current_class(),
            Expr::New(n) => Some(n.class),
            Expr::Var(v) => self
                .variable_type(&v.name)
                .and_then(|ty| ty.as_class())
                .or_else(|| v.ty.as_class()),
            other => self.expr_type(other).as_class(),
        }
    }

    // ===== Value conversions =====

    /// Convert a value to `i1` for use as a branch condition.
    pub fn to_bool(&self, val: BasicValueEnum<'a>) -> Result<IntValue<'a>, Diagnostic> {
        match val {
            BasicValueEnum::IntValue(iv) => {
                if iv.get_type().get_bit_width() == 1 {
                    Ok(iv)
                } else {
                    Ok(self.builder.build_int_compare(
                        IntPredicate::NE,
                        iv,
                        iv.get_type().const_zero(),
                        "tobool",
                    )?)
                }
            }
            BasicValueEnum::FloatValue(fv) => Ok(self.builder.build_float_compare(
                FloatPredicate::UNE,
                fv,
                self.f64_t.const_zero(),
                "tobool",
            )?),
            _ => self.fail("E3002", "condition is not a numeric or boolean value"),
        }
    }

    /// Coerce a value to the declared target type. Covers the numeric
    /// conversions (int<->double, bool widening, numeric->bool) and
    /// wrapping a payload into its optional.
    pub fn coerce_to_type(
        &self,
        val: BasicValueEnum<'a>,
        target: &Type,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let Some(target_llvm) = self.llvm_type(target) else {
            return Ok(val);
        };
        if val.get_type() == target_llvm {
            return Ok(val);
        }

        match (val, target) {
            (BasicValueEnum::IntValue(iv), Type::Double) => {
                let width = iv.get_type().get_bit_width();
                let converted = if width == 1 {
                    self.builder
                        .build_unsigned_int_to_float(iv, self.f64_t, "conv")?
                } else {
                    self.builder
                        .build_signed_int_to_float(iv, self.f64_t, "conv")?
                };
                Ok(converted.into())
            }
            (BasicValueEnum::FloatValue(fv), Type::Int) => Ok(self
                .builder
                .build_float_to_signed_int(fv, self.i64_t, "conv")?
                .into()),
            (BasicValueEnum::IntValue(iv), Type::Int) => {
                let width = iv.get_type().get_bit_width();
                let converted = if width < 64 {
                    self.builder.build_int_z_extend(iv, self.i64_t, "conv")?
                } else {
                    self.builder.build_int_truncate(iv, self.i64_t, "conv")?
                };
                Ok(converted.into())
            }
            (BasicValueEnum::IntValue(iv), Type::Bool) => Ok(self
                .builder
                .build_int_compare(IntPredicate::NE, iv, iv.get_type().const_zero(), "tobool")?
                .into()),
            (BasicValueEnum::FloatValue(fv), Type::Bool) => Ok(self
                .builder
                .build_float_compare(FloatPredicate::UNE, fv, self.f64_t.const_zero(), "tobool")?
                .into()),
            (payload, Type::Optional(inner)) => {
                // Wrap a plain payload into { true, payload }.
                let payload = self.coerce_to_type(payload, inner)?;
                let opt_ty = self.optional_type(inner);
                let with_flag = self.builder.build_insert_value(
                    opt_ty.get_undef(),
                    self.bool_t.const_int(1, false),
                    0,
                    "opt_some",
                )?;
                let with_payload = self.builder.build_insert_value(
                    with_flag.into_struct_value(),
                    payload,
                    1,
                    "opt_payload",
                )?;
                Ok(with_payload.into_struct_value().into())
            }
            _ => Ok(val),
        }
    }

    /// Argument coercion against an expected LLVM parameter type
    /// (int<->double only, mirroring call-site behavior).
    pub fn coerce_to_llvm(
        &self,
        val: BasicValueEnum<'a>,
        expected: BasicTypeEnum<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        if val.get_type() == expected {
            return Ok(val);
        }
        match (val, expected) {
            (BasicValueEnum::IntValue(iv), BasicTypeEnum::FloatType(ft)) => {
                Ok(self
                    .builder
                    .build_signed_int_to_float(iv, ft, "arg_conv")?
                    .into())
            }
            (BasicValueEnum::FloatValue(fv), BasicTypeEnum::IntType(it)) => Ok(self
                .builder
                .build_float_to_signed_int(fv, it, "arg_conv")?
                .into()),
            _ => Ok(val),
        }
    }

    // ===== String literals =====

    /// Intern a string literal as a private global; identical literals
    /// share one global.
    pub fn string_literal(&self, value: &str) -> Result<PointerValue<'a>, Diagnostic> {
        if let Some(ptr) = self.string_literals.borrow().get(value) {
            return Ok(*ptr);
        }
        let id = self.next_str_id.get();
        self.next_str_id.set(id + 1);
        let name = if id == 0 {
            ".str".to_string()
        } else {
            format!(".str.{id}")
        };
        let global = self.builder.build_global_string_ptr(value, &name)?;
        let ptr = global.as_pointer_value();
        self.string_literals
            .borrow_mut()
            .insert(value.to_string(), ptr);
        Ok(ptr)
    }

    // ===== Runtime helper declarations =====

    fn get_or_declare(&self, name: &str, ty: FunctionType<'a>) -> FunctionValue<'a> {
        if let Some(f) = self.module.get_function(name) {
            return f;
        }
        self.module.add_function(name, ty, None)
    }

    pub fn get_malloc(&self) -> FunctionValue<'a> {
        let ty = self.ptr_t.fn_type(&[self.i64_t.into()], false);
        self.get_or_declare("malloc", ty)
    }

    pub fn get_retain(&self) -> FunctionValue<'a> {
        let ty = self.ptr_t.fn_type(&[self.ptr_t.into()], false);
        self.get_or_declare("aurora_retain", ty)
    }

    pub fn get_release(&self) -> FunctionValue<'a> {
        let ty = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into()], false);
        self.get_or_declare("aurora_release", ty)
    }

    pub fn get_array_create(&self) -> FunctionValue<'a> {
        let ty = self
            .ptr_t
            .fn_type(&[self.i64_t.into(), self.i64_t.into()], false);
        self.get_or_declare("aurora_array_create", ty)
    }

    pub fn get_array_set(&self) -> FunctionValue<'a> {
        let ty = self.context.void_type().fn_type(
            &[
                self.ptr_t.into(),
                self.i64_t.into(),
                self.ptr_t.into(),
                self.i64_t.into(),
            ],
            false,
        );
        self.get_or_declare("aurora_array_set", ty)
    }

    pub fn get_array_length(&self) -> FunctionValue<'a> {
        let ty = self.i64_t.fn_type(&[self.ptr_t.into()], false);
        self.get_or_declare("aurora_array_length", ty)
    }

    pub fn get_panic(&self) -> FunctionValue<'a> {
        let ty = self
            .context
            .void_type()
            .fn_type(&[self.ptr_t.into()], false);
        self.get_or_declare("aurora_panic", ty)
    }

    // ===== Built-in standard library =====

    /// Register the legacy `printd` builtin, kept for old sources.
    pub fn declare_legacy_builtins(&self) {
        let ty = self.f64_t.fn_type(&[self.f64_t.into()], false);
        self.get_or_declare("printd", ty);
    }

    /// Known standard-library prototype for a callee name, if any.
    /// Call sites declare these on demand, so the emitted module only
    /// mentions the builtins a program actually uses. Every symbol is
    /// callable under both its `aurora_` and `auroraStd_` name.
    pub fn builtin_fn_type(&self, name: &str) -> Option<FunctionType<'a>> {
        let base = name
            .strip_prefix("auroraStd_")
            .map(|rest| format!("aurora_{rest}"))
            .unwrap_or_else(|| name.to_string());

        let i = || BasicMetadataTypeEnum::from(self.i64_t);
        let d = || BasicMetadataTypeEnum::from(self.f64_t);
        let b = || BasicMetadataTypeEnum::from(self.bool_t);
        let p = || BasicMetadataTypeEnum::from(self.ptr_t);
        let void = self.context.void_type();

        Some(match base.as_str() {
            // I/O
            "aurora_print_int" | "aurora_println_int" => self.i64_t.fn_type(&[i()], false),
            "aurora_print_double" | "aurora_println_double" => self.f64_t.fn_type(&[d()], false),
            "aurora_print_bool" | "aurora_println_bool" => self.bool_t.fn_type(&[b()], false),
            "aurora_print_string" | "aurora_println_string" => void.fn_type(&[p()], false),

            // String operations
            "aurora_string_concat" => self.ptr_t.fn_type(&[p(), p()], false),
            "aurora_string_compare" => self.i64_t.fn_type(&[p(), p()], false),
            "aurora_string_equals" => self.bool_t.fn_type(&[p(), p()], false),
            "aurora_string_substring" => self.ptr_t.fn_type(&[p(), i(), i()], false),
            "aurora_string_contains" => self.bool_t.fn_type(&[p(), p()], false),
            "aurora_string_to_upper" | "aurora_string_to_lower" | "aurora_string_trim" => {
                self.ptr_t.fn_type(&[p()], false)
            }
            "aurora_string_replace" => self.ptr_t.fn_type(&[p(), p(), p()], false),
            "aurora_string_to_int" => self.i64_t.fn_type(&[p()], false),
            "aurora_string_to_double" => self.f64_t.fn_type(&[p()], false),
            "aurora_int_to_string" => self.ptr_t.fn_type(&[i()], false),
            "aurora_double_to_string" => self.ptr_t.fn_type(&[d()], false),

            // Math
            "aurora_sin" | "aurora_cos" | "aurora_tan" | "aurora_asin" | "aurora_acos"
            | "aurora_atan" | "aurora_exp" | "aurora_log" | "aurora_log10" | "aurora_sqrt"
            | "aurora_floor" | "aurora_ceil" | "aurora_round" => {
                self.f64_t.fn_type(&[d()], false)
            }
            "aurora_pow" | "aurora_atan2" => self.f64_t.fn_type(&[d(), d()], false),
            "aurora_random_int" => self.i64_t.fn_type(&[i(), i()], false),
            "aurora_random_double" => self.f64_t.fn_type(&[], false),
            "aurora_random_seed" => void.fn_type(&[i()], false),

            // Time
            "aurora_time_now" | "aurora_time_now_millis" => self.i64_t.fn_type(&[], false),
            "aurora_sleep_millis" => void.fn_type(&[i()], false),

            // File I/O
            "aurora_file_read" => self.ptr_t.fn_type(&[p()], false),
            "aurora_file_write" | "aurora_file_append" => {
                self.bool_t.fn_type(&[p(), p()], false)
            }
            "aurora_file_exists" | "aurora_file_delete" => self.bool_t.fn_type(&[p()], false),

            // Environment
            "aurora_exit" => void.fn_type(&[i()], false),
            "aurora_get_env" => self.ptr_t.fn_type(&[p()], false),
            "aurora_arg_count" => self.i64_t.fn_type(&[], false),
            "aurora_arg_get" => self.ptr_t.fn_type(&[i()], false),

            _ => return None,
        })
    }

    /// Resolve a callee by name: module functions first, then lazily
    /// declared standard-library builtins.
    pub fn resolve_callee(&self, name: &str) -> Option<FunctionValue<'a>> {
        if let Some(f) = self.module.get_function(name) {
            return Some(f);
        }
        let ty = self.builtin_fn_type(name)?;
        Some(self.module.add_function(name, ty, None))
    }
}

pub(crate) fn round_up(value: u64, align: u64) -> u64 {
    debug_assert!(align > 0);
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_behaves() {
        assert_eq!(round_up(0, 8), 0);
        assert_eq!(round_up(1, 8), 8);
        assert_eq!(round_up(8, 8), 8);
        assert_eq!(round_up(9, 8), 16);
        assert_eq!(round_up(2, 1), 2);
    }

    #[test]
    fn scalar_sizes_match_the_data_layout() {
        let compiler = Compiler::new_silent();
        let context = Context::create();
        let cg = CodeGen::new(&compiler, &context, "sizes");

        assert_eq!(cg.type_size(&Type::Int), 8);
        assert_eq!(cg.type_size(&Type::Double), 8);
        assert_eq!(cg.type_size(&Type::Bool), 1);
        assert_eq!(cg.type_size(&Type::String), 8);
        assert_eq!(cg.type_size(&Type::Array(Box::new(Type::Int))), 16);
        // {i1, i64} pads the flag to the payload alignment.
        assert_eq!(cg.type_size(&Type::optional(Type::Int)), 16);
        assert_eq!(cg.type_size(&Type::optional(Type::Void)), 2);
        assert_eq!(cg.type_size(&Type::optional(Type::Bool)), 2);
    }

    #[test]
    fn builtin_lookup_handles_both_prefixes() {
        let compiler = Compiler::new_silent();
        let context = Context::create();
        let cg = CodeGen::new(&compiler, &context, "builtins");

        assert!(cg.builtin_fn_type("aurora_println_int").is_some());
        assert!(cg.builtin_fn_type("auroraStd_println_int").is_some());
        assert!(cg.builtin_fn_type("aurora_sqrt").is_some());
        assert!(cg.builtin_fn_type("aurora_file_read").is_some());
        assert!(cg.builtin_fn_type("not_a_builtin").is_none());
    }
}
