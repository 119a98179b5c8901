//! Class lowering: struct types, member access, method calls, `new`
//! expressions and method/constructor emission.
//!
//! Every heap object leads with the reference-count header, so a class
//! instance is laid out as `{ { i64, i32 }, %Name }` where `%Name` is
//! the named struct holding the declared fields in declaration order.
//! The object pointer handed around by generated code is the base of
//! that allocation, which is exactly what `aurora_retain` and
//! `aurora_release` expect.

use inkwell::types::{BasicType, BasicTypeEnum, StructType};
use inkwell::values::{BasicValueEnum, FunctionValue, PointerValue};
use inkwell::{AddressSpace, IntPredicate};

use aurora_ast::*;

use super::{CodeGen, HEADER_SIZE, Local, TYPE_TAG_OBJECT};
use crate::diagnostics::Diagnostic;

impl<'a> CodeGen<'a> {
    /// Create (or fetch) the named struct type for a class. Fields
    /// appear in declaration order with the language-to-LLVM mapping.
    pub fn define_class_struct(&self, id: ClassId) -> Result<StructType<'a>, Diagnostic> {
        let registry = self.compiler.registry.borrow();
        let name = registry.class_name(id).to_string();

        if let Some(existing) = self.module.get_struct_type(&name) {
            return Ok(existing);
        }

        let Some(decl) = registry.decl(id) else {
            return self.fail("E3004", format!("Class not found: {name}"));
        };

        let mut field_types: Vec<BasicTypeEnum<'a>> = Vec::with_capacity(decl.fields.len());
        for field in &decl.fields {
            match self.llvm_type(&field.ty) {
                Some(ty) => field_types.push(ty),
                None => {
                    return self.fail(
                        "E3004",
                        format!("Field '{}' of class {} has void type", field.name, name),
                    );
                }
            }
        }

        let struct_ty = self.context.opaque_struct_type(&name);
        struct_ty.set_body(&field_types, false);
        Ok(struct_ty)
    }

    /// Heap layout of a class instance: header followed by the field
    /// struct.
    pub fn class_heap_type(&self, id: ClassId) -> Result<StructType<'a>, Diagnostic> {
        let fields = self.define_class_struct(id)?;
        Ok(self
            .context
            .struct_type(&[self.header_struct_type().into(), fields.into()], false))
    }

    /// Address of field `index` inside the object pointed to by `obj`.
    fn field_ptr(
        &self,
        obj: PointerValue<'a>,
        class: ClassId,
        index: usize,
        name: &str,
    ) -> Result<PointerValue<'a>, Diagnostic> {
        let heap_ty = self.class_heap_type(class)?;
        let obj = self.builder.build_pointer_cast(
            obj,
            heap_ty.ptr_type(AddressSpace::default()),
            "heap_obj",
        )?;
        let fields_ptr = self
            .builder
            .build_struct_gep(obj, 1, "fields")?;
        Ok(self
            .builder
            .build_struct_gep(fields_ptr, index as u32, name)?)
    }

    fn field_info(&self, class: ClassId, member: &str) -> Option<(usize, Type)> {
        let registry = self.compiler.registry.borrow();
        let decl = registry.decl(class)?;
        let index = decl.field_index(member)?;
        Some((index, decl.fields[index].ty.clone()))
    }

    pub(crate) fn lower_member_access(
        &self,
        member: &MemberExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let Some(class) = self.class_of_expr(&member.object) else {
            return self.fail(
                "E3004",
                format!("Cannot determine class type for member access: {}", member.member),
            );
        };
        let Some((index, field_ty)) = self.field_info(class, &member.member) else {
            let name = self.compiler.registry.borrow().class_name(class).to_string();
            return self.fail(
                "E3004",
                format!("Field not found: {} in class {}", member.member, name),
            );
        };

        let obj = self
            .lower_expr_value(&member.object, function, None)?
            .into_pointer_value();
        let ptr = self.field_ptr(obj, class, index, &member.member)?;
        let llvm_ty = self
            .llvm_type(&field_ty)
            .ok_or_else(|| self.err("E3004", "field has void type"))?;
        Ok(self.builder.build_load(ptr, &member.member)?)
    }

    /// Member assignment works for any class-typed receiver, not only
    /// `this`.
    pub(crate) fn assign_to_member(
        &self,
        member: &MemberExpr,
        value: &Expr,
        function: FunctionValue<'a>,
    ) -> Result<(), Diagnostic> {
        let Some(class) = self.class_of_expr(&member.object) else {
            return self.fail(
                "E3004",
                format!("Cannot determine class type for member assignment: {}", member.member),
            );
        };
        let Some((index, field_ty)) = self.field_info(class, &member.member) else {
            let name = self.compiler.registry.borrow().class_name(class).to_string();
            return self.fail(
                "E3004",
                format!("Field not found: {} in class {}", member.member, name),
            );
        };

        let obj = self
            .lower_expr_value(&member.object, function, None)?
            .into_pointer_value();
        let value = self.lower_expr_value(value, function, Some(&field_ty))?;
        let value = self.coerce_to_type(value, &field_ty)?;

        let ptr = self.field_ptr(obj, class, index, &member.member)?;
        self.builder.build_store(ptr, value)?;
        Ok(())
    }

    pub(crate) fn lower_member_call(
        &self,
        call: &MemberCallExpr,
        function: FunctionValue<'a>,
    ) -> Result<Option<BasicValueEnum<'a>>, Diagnostic> {
        let Some(class) = self.class_of_expr(&call.object) else {
            return self.fail(
                "E3004",
                "Cannot determine class type for method call (variable type not found)",
            );
        };

        let symbol = {
            let registry = self.compiler.registry.borrow();
            let Some(decl) = registry.decl(class) else {
                return self.fail("E3004", "Class declaration not found for method call");
            };
            let Some(method) = decl.find_method(&call.method) else {
                return self.fail("E3004", format!("Method not found: {}", call.method));
            };
            registry.method_symbol(class, method)
        };

        let Some(callee) = self.module.get_function(&symbol) else {
            return self.fail("E3004", format!("Method function not found: {symbol}"));
        };

        if callee.count_params() as usize != call.args.len() + 1 {
            return self.fail(
                "E3004",
                format!("Incorrect number of arguments to method {}", call.method),
            );
        }

        let obj = self.lower_expr_value(&call.object, function, None)?;

        let mut args: Vec<inkwell::values::BasicMetadataValueEnum<'a>> =
            Vec::with_capacity(call.args.len() + 1);
        args.push(obj.into());

        for (idx, arg) in call.args.iter().enumerate() {
            let expected = callee
                .get_nth_param(idx as u32 + 1)
                .map(|p| p.get_type())
                .ok_or_else(|| {
                    self.err(
                        "E3004",
                        format!("Incorrect number of arguments to method {}", call.method),
                    )
                })?;
            if matches!(arg, Expr::NullLit(_)) {
                args.push(self.zero_value(expected).into());
                continue;
            }
            let value = self.lower_expr_value(arg, function, None)?;
            let value = self.coerce_to_llvm(value, expected)?;
            args.push(value.into());
        }

        let call_site = self.builder.build_call(callee, &args, "")?;
        Ok(call_site.try_as_basic_value().left())
    }

    /// `Name(args)`: allocate header + zeroed fields, run initializers,
    /// then dispatch the constructor selected by signature.
    pub(crate) fn lower_new(
        &self,
        new: &NewExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let (decl, class_name) = {
            let registry = self.compiler.registry.borrow();
            (
                registry.decl(new.class).cloned(),
                registry.class_name(new.class).to_string(),
            )
        };
        let Some(decl) = decl else {
            return self.fail("E3004", format!("Class not found: {class_name}"));
        };

        let struct_size = self.class_struct_size(&decl);
        let total_size = HEADER_SIZE + struct_size;

        let malloc = self.get_malloc();
        let size_const = self.i64_t.const_int(total_size, false);
        let call_site = self
            .builder
            .build_call(malloc, &[size_const.into()], "newtmp")?;
        let obj = call_site
            .try_as_basic_value()
            .left()
            .ok_or_else(|| self.err("E3004", "malloc did not return a value"))?
            .into_pointer_value();

        // Header: ref_count = 1, type_tag = object.
        let heap_ty = self.class_heap_type(new.class)?;
        let heap_obj = self.builder.build_pointer_cast(
            obj,
            heap_ty.ptr_type(AddressSpace::default()),
            "heap_obj",
        )?;
        let header_ptr = self.builder.build_struct_gep(heap_obj, 0, "header")?;
        let rc_ptr = self
            .builder
            .build_struct_gep(header_ptr, 0, "ref_count")?;
        self.builder
            .build_store(rc_ptr, self.i64_t.const_int(1, false))?;
        let tag_ptr = self
            .builder
            .build_struct_gep(header_ptr, 1, "type_tag")?;
        self.builder
            .build_store(tag_ptr, self.i32_t.const_int(TYPE_TAG_OBJECT, false))?;

        // Field defaults: declared initializer or zero.
        for (index, field) in decl.fields.iter().enumerate() {
            let ptr = self.field_ptr(obj, new.class, index, &field.name)?;
            let value = match &field.initializer {
                Some(init) => {
                    let v = self.lower_expr_value(init, function, Some(&field.ty))?;
                    self.coerce_to_type(v, &field.ty)?
                }
                None => {
                    let llvm_ty = self
                        .llvm_type(&field.ty)
                        .ok_or_else(|| self.err("E3004", "field has void type"))?;
                    self.zero_value(llvm_ty)
                }
            };
            self.builder.build_store(ptr, value)?;
        }

        // Signature-based constructor selection: exact match first,
        // then the sole constructor when only one exists.
        let arg_types: Vec<Type> = new.args.iter().map(|a| self.expr_type(a)).collect();
        let ctor = decl
            .find_method_with_sig("constructor", &arg_types)
            .or_else(|| {
                let mut ctors = decl.constructors();
                let first = ctors.next();
                match (first, ctors.next()) {
                    (Some(only), None) if only.params.len() == new.args.len() => Some(only),
                    _ => None,
                }
            });

        let Some(ctor) = ctor else {
            return self.fail(
                "E3004",
                format!("No matching constructor for class {}", decl.name),
            );
        };

        let ctor_param_types: Vec<Type> = ctor.params.iter().map(|p| p.ty.clone()).collect();
        let symbol = self
            .compiler
            .registry
            .borrow()
            .constructor_symbol(new.class, &ctor_param_types);

        // The constructor may belong to a class whose methods are
        // emitted later in this pass; declare it on demand.
        let ctor_fn = match self.module.get_function(&symbol) {
            Some(f) => f,
            None => {
                let mut params: Vec<inkwell::types::BasicMetadataTypeEnum<'a>> =
                    vec![self.ptr_t.into()];
                for ty in &ctor_param_types {
                    if let Some(llvm) = self.llvm_type(ty) {
                        params.push(llvm.into());
                    }
                }
                let fn_ty = self.context.void_type().fn_type(&params, false);
                self.module.add_function(&symbol, fn_ty, None)
            }
        };

        let mut args: Vec<inkwell::values::BasicMetadataValueEnum<'a>> =
            Vec::with_capacity(new.args.len() + 1);
        args.push(obj.into());
        for (arg, param_ty) in new.args.iter().zip(&ctor_param_types) {
            if matches!(arg, Expr::NullLit(_)) {
                let llvm = self
                    .llvm_type(param_ty)
                    .ok_or_else(|| self.err("E3004", "constructor parameter has void type"))?;
                args.push(self.zero_value(llvm).into());
                continue;
            }
            let value = self.lower_expr_value(arg, function, Some(param_ty))?;
            let value = self.coerce_to_type(value, param_ty)?;
            args.push(value.into());
        }
        self.builder.build_call(ctor_fn, &args, "")?;

        Ok(obj.into())
    }

    /// `obj?.member`: null propagates, otherwise the member is wrapped
    /// back into an optional.
    pub(crate) fn lower_safe_nav(
        &self,
        nav: &SafeNavExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let obj_ty = self.expr_type(&nav.object);
        let Some(inner) = obj_ty.optional_inner() else {
            return self.fail("E3004", "Safe navigation requires an optional receiver");
        };
        let Some(class) = inner.as_class() else {
            return self.fail("E3004", "Safe navigation requires an optional class value");
        };
        let Some((index, field_ty)) = self.field_info(class, &nav.member) else {
            let name = self.compiler.registry.borrow().class_name(class).to_string();
            return self.fail(
                "E3004",
                format!("Field not found: {} in class {}", nav.member, name),
            );
        };

        let obj = self
            .lower_expr_value(&nav.object, function, None)?
            .into_struct_value();
        let has_value = self
            .builder
            .build_extract_value(obj, 0, "has_value")?
            .into_int_value();
        let payload = self
            .builder
            .build_extract_value(obj, 1, "payload")?
            .into_pointer_value();

        let cond = self.builder.build_int_compare(
            IntPredicate::NE,
            has_value,
            self.bool_t.const_int(0, false),
            "navcond",
        )?;

        let some_bb = self.context.append_basic_block(function, "nav_some");
        let none_bb = self.context.append_basic_block(function, "nav_none");
        let merge_bb = self.context.append_basic_block(function, "nav_merge");
        self.builder.build_conditional_branch(cond, some_bb, none_bb)?;

        let result_ty = self.optional_type(&field_ty);

        self.builder.position_at_end(some_bb);
        let field_ptr = self.field_ptr(payload, class, index, &nav.member)?;
        let field_llvm = self
            .llvm_type(&field_ty)
            .ok_or_else(|| self.err("E3004", "field has void type"))?;
        let field_val = self.builder.build_load(field_ptr, &nav.member)?;
        let wrapped = self.coerce_to_type(field_val, &Type::optional(field_ty.clone()))?;
        let some_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| self.err("E3004", "no current block"))?;
        self.builder.build_unconditional_branch(merge_bb)?;

        self.builder.position_at_end(none_bb);
        let none_val: BasicValueEnum<'a> = result_ty.const_zero().into();
        self.builder.build_unconditional_branch(merge_bb)?;

        self.builder.position_at_end(merge_bb);
        let phi = self.builder.build_phi(result_ty, "nav_result")?;
        phi.add_incoming(&[(&wrapped, some_end), (&none_val, none_bb)]);
        Ok(phi.as_basic_value())
    }

    /// Emit every method of a class. Struct types for all classes must
    /// already exist so bodies can instantiate and accept any of them.
    pub fn emit_class_methods(&self, id: ClassId) -> Result<(), Diagnostic> {
        let (decl, class_name) = {
            let registry = self.compiler.registry.borrow();
            (
                registry.decl(id).cloned(),
                registry.class_name(id).to_string(),
            )
        };
        let Some(decl) = decl else {
            return self.fail("E3004", format!("Class declaration not found: {class_name}"));
        };

        self.push_class_context(id);
        let result = (|| {
            for method in &decl.methods {
                self.emit_method(id, method)?;
            }
            Ok(())
        })();
        self.pop_class_context();
        result
    }

    fn emit_method(&self, class: ClassId, method: &MethodDecl) -> Result<(), Diagnostic> {
        let symbol = self.compiler.registry.borrow().method_symbol(class, method);

        // A forward declaration may exist from an earlier call site.
        let existing = self.module.get_function(&symbol);
        if let Some(f) = existing {
            if f.count_basic_blocks() > 0 {
                return Ok(());
            }
        }

        let mut param_types: Vec<inkwell::types::BasicMetadataTypeEnum<'a>> =
            vec![self.ptr_t.into()];
        for param in &method.params {
            let Some(llvm) = self.llvm_type(&param.ty) else {
                return self.fail(
                    "E3004",
                    format!("Parameter '{}' of method {symbol} has void type", param.name),
                );
            };
            param_types.push(llvm.into());
        }

        let fn_ty = self.fn_type(&param_types, &method.return_type);
        let function = existing.unwrap_or_else(|| self.module.add_function(&symbol, fn_ty, None));

        let mut params = function.get_param_iter();
        if let Some(this_param) = params.next() {
            self.set_value_name(this_param, "this");
        }
        for (param, decl_param) in params.zip(&method.params) {
            self.set_value_name(param, &decl_param.name);
        }

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        self.clear_locals();
        self.push_scope();
        self.push_function_return_type(method.return_type.clone());

        // `this` lives in an entry alloca like every other local.
        let this_param = function
            .get_nth_param(0)
            .ok_or_else(|| self.err("E3004", "method missing 'this' parameter"))?;
        let this_alloca =
            self.create_entry_block_alloca(function, "this", self.ptr_t.as_basic_type_enum())?;
        self.builder.build_store(this_alloca, this_param)?;
        self.define_local(
            "this",
            Local {
                alloca: this_alloca,
                pointee: self.ptr_t.as_basic_type_enum(),
            },
        );
        self.set_variable_type("this", Type::Class(class));

        for (idx, param) in method.params.iter().enumerate() {
            let value = function
                .get_nth_param(idx as u32 + 1)
                .ok_or_else(|| self.err("E3004", "method parameter count mismatch"))?;
            let llvm_ty = value.get_type();
            let alloca = self.create_entry_block_alloca(function, &param.name, llvm_ty)?;
            self.builder.build_store(alloca, value)?;
            self.define_local(
                &param.name,
                Local {
                    alloca,
                    pointee: llvm_ty,
                },
            );
            self.set_variable_type(&param.name, param.ty.clone());
        }

        self.lower_stmts(&method.body, function)?;

        // Bodies falling off the end return void or a zero value.
        if let Some(block) = self.builder.get_insert_block() {
            if block.get_terminator().is_none() {
                self.release_all_in_scope()?;
                match self.llvm_type(&method.return_type) {
                    None => {
                        self.builder.build_return(None)?;
                    }
                    Some(ret_ty) => {
                        let zero = self.zero_value(ret_ty);
                        self.builder.build_return(Some(&zero))?;
                    }
                }
            }
        }

        self.pop_function_return_type();
        self.pop_scope();

        if !function.verify(true) {
            return self.fail("E3004", format!("Method verification failed: {symbol}"));
        }
        Ok(())
    }
}
