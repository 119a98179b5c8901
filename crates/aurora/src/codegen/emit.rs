//! Top-level emission: free functions and whole programs.

use inkwell::values::FunctionValue;

use aurora_ast::{Function, Program, Prototype};

use super::{CodeGen, Local};
use crate::diagnostics::Diagnostic;

impl<'a> CodeGen<'a> {
    /// Declare a function from its prototype; reuses an existing
    /// declaration when call sites got there first.
    pub fn declare_prototype(&self, proto: &Prototype) -> Result<FunctionValue<'a>, Diagnostic> {
        if let Some(existing) = self.module.get_function(&proto.name) {
            return Ok(existing);
        }

        let mut params: Vec<inkwell::types::BasicMetadataTypeEnum<'a>> =
            Vec::with_capacity(proto.params.len());
        for param in &proto.params {
            let Some(llvm) = self.llvm_type(&param.ty) else {
                return self.fail(
                    "E3002",
                    format!(
                        "Parameter '{}' of function {} has void type",
                        param.name, proto.name
                    ),
                );
            };
            params.push(llvm.into());
        }

        let fn_ty = self.fn_type(&params, &proto.return_type);
        let function = self.module.add_function(&proto.name, fn_ty, None);

        for (param, decl_param) in function.get_param_iter().zip(&proto.params) {
            self.set_value_name(param, &decl_param.name);
        }

        Ok(function)
    }

    pub fn emit_function(&self, func: &Function) -> Result<FunctionValue<'a>, Diagnostic> {
        let function = self.declare_prototype(&func.proto)?;
        if function.count_basic_blocks() > 0 {
            return self.fail(
                "E3002",
                format!("Function '{}' is defined more than once", func.proto.name),
            );
        }

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);

        self.push_function_return_type(func.proto.return_type.clone());
        self.push_scope();
        self.clear_locals();

        // Parameters live in entry allocas so they behave like locals.
        for (idx, param) in func.proto.params.iter().enumerate() {
            let value = function
                .get_nth_param(idx as u32)
                .ok_or_else(|| self.err("E3002", "parameter count mismatch"))?;
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

        self.lower_stmts(&func.body, function)?;

        // Fall-off-the-end handling: void functions return, anything
        // else is unreachable.
        if let Some(block) = self.builder.get_insert_block() {
            if block.get_terminator().is_none() {
                self.release_all_in_scope()?;
                if function.get_type().get_return_type().is_none() {
                    self.builder.build_return(None)?;
                } else {
                    self.builder.build_unreachable()?;
                }
            }
        }

        self.pop_scope();
        self.pop_function_return_type();

        if !function.verify(true) {
            return self.fail(
                "E3002",
                format!("Function verification failed: {}", func.proto.name),
            );
        }

        Ok(function)
    }

    /// Emit one parsed program into the module: all class struct types
    /// first, then every method body, then the free functions. The
    /// ordering guarantees `new` and `this` can reference any class.
    pub fn emit_program(&self, program: &Program) -> Result<(), Diagnostic> {
        for class in &program.classes {
            self.define_class_struct(*class)?;
        }
        for class in &program.classes {
            self.emit_class_methods(*class)?;
        }
        for function in &program.functions {
            self.emit_function(function)?;
        }
        Ok(())
    }
}
