//! Statement lowering.
//!
//! `lower_stmts` walks a statement list and reports whether it emitted
//! a terminator; statements after a `return`/`break`/`continue` in the
//! same block are unreachable and are not lowered.

use inkwell::values::{BasicValueEnum, FunctionValue};
use inkwell::{FloatPredicate, IntPredicate};

use aurora_ast::*;

use super::{CodeGen, Local};
use crate::diagnostics::Diagnostic;

impl<'a> CodeGen<'a> {
    /// Lower a statement list; returns true when the list ended in a
    /// terminator (the remaining statements, if any, were skipped).
    pub fn lower_stmts(
        &self,
        stmts: &[Stmt],
        function: FunctionValue<'a>,
    ) -> Result<bool, Diagnostic> {
        for stmt in stmts {
            if self.lower_stmt(stmt, function)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn lower_stmt(&self, stmt: &Stmt, function: FunctionValue<'a>) -> Result<bool, Diagnostic> {
        match stmt {
            Stmt::Return(ret) => self.lower_return(ret, function),
            Stmt::Expr(es) => {
                self.lower_expr(&es.expr, function, None)?;
                Ok(false)
            }
            Stmt::VarDecl(decl) => {
                self.lower_var_decl(decl, function)?;
                Ok(false)
            }
            Stmt::If(ifs) => self.lower_if(ifs, function),
            Stmt::While(ws) => {
                self.lower_while(ws, function)?;
                Ok(false)
            }
            Stmt::For(fs) => {
                self.lower_for(fs, function)?;
                Ok(false)
            }
            Stmt::Loop(ls) => {
                self.lower_loop(ls, function)?;
                Ok(false)
            }
            Stmt::Break(_) => {
                let Some((break_target, _)) = self.current_loop() else {
                    return self.fail(
                        "E3003",
                        "'break' statement must be inside a loop (while, for, or loop)",
                    );
                };
                self.builder.build_unconditional_branch(break_target)?;
                Ok(true)
            }
            Stmt::Continue(_) => {
                let Some((_, continue_target)) = self.current_loop() else {
                    return self.fail(
                        "E3003",
                        "'continue' statement must be inside a loop (while, for, or loop)",
                    );
                };
                self.builder.build_unconditional_branch(continue_target)?;
                Ok(true)
            }
            Stmt::Assign(assign) => {
                self.lower_assign(assign, function)?;
                Ok(false)
            }
        }
    }

    fn lower_return(
        &self,
        ret: &ReturnStmt,
        function: FunctionValue<'a>,
    ) -> Result<bool, Diagnostic> {
        let declared = self.current_function_return_type().unwrap_or(Type::Void);
        let llvm_ret = function.get_type().get_return_type();

        match &ret.value {
            Some(value) => {
                if llvm_ret.is_none() {
                    return self.fail("E3003", "Cannot return a value from a void function");
                }
                let lowered = self.lower_expr_value(value, function, Some(&declared))?;
                let coerced = self.coerce_to_type(lowered, &declared)?;

                // All scope-tracked variables are released before the
                // terminator, in reverse declaration order.
                self.release_all_in_scope()?;
                self.builder.build_return(Some(&coerced))?;
            }
            None => {
                if llvm_ret.is_some() {
                    return self.fail("E3003", "Cannot use empty return in non-void function");
                }
                self.release_all_in_scope()?;
                self.builder.build_return(None)?;
            }
        }
        Ok(true)
    }

    fn lower_var_decl(
        &self,
        decl: &VarDeclStmt,
        function: FunctionValue<'a>,
    ) -> Result<(), Diagnostic> {
        if decl.ty.is_void() {
            return self.fail("E3003", format!("Variable '{}' cannot have void type", decl.name));
        }

        let init_val = self.lower_expr_value(&decl.init, function, Some(&decl.ty))?;

        // An unresolved declaration type falls back to the initializer.
        let (aurora_ty, init_val) = if decl.ty.is_unknown() {
            (self.expr_type(&decl.init), init_val)
        } else {
            (decl.ty.clone(), self.coerce_to_type(init_val, &decl.ty)?)
        };

        let alloca_ty = match self.llvm_type(&aurora_ty) {
            Some(ty) if !aurora_ty.is_unknown() => ty,
            _ => init_val.get_type(),
        };

        let alloca = self.create_entry_block_alloca(function, &decl.name, alloca_ty)?;
        self.builder.build_store(alloca, init_val)?;

        self.define_local(
            &decl.name,
            Local {
                alloca,
                pointee: alloca_ty,
            },
        );
        self.set_variable_type(&decl.name, aurora_ty.clone());
        self.track_variable(alloca, alloca_ty, &aurora_ty);

        Ok(())
    }

    fn lower_assign(
        &self,
        assign: &AssignStmt,
        function: FunctionValue<'a>,
    ) -> Result<(), Diagnostic> {
        match &assign.target {
            Expr::Var(var) => {
                let Some(local) = self.lookup_local(&var.name) else {
                    return self.fail("E3003", format!("Unknown variable: {}", var.name));
                };
                let var_ty = self.variable_type(&var.name).unwrap_or_else(|| var.ty.clone());

                let value = self.lower_expr_value(&assign.value, function, Some(&var_ty))?;
                let mut value = if var_ty.is_unknown() {
                    value
                } else {
                    self.coerce_to_type(value, &var_ty)?
                };

                // Class references hand their old value back to the
                // runtime and retain the new one.
                if var_ty.is_class() && value.is_pointer_value() {
                    self.release_stored_pointer(local)?;
                    value = self.insert_retain(value)?;
                }

                self.builder.build_store(local.alloca, value)?;
                Ok(())
            }
            Expr::Member(member) => self.assign_to_member(member, &assign.value, function),
            Expr::Index(index) => {
                let elem_ty = match self.expr_type(&index.array) {
                    Type::Array(elem) => *elem,
                    _ => {
                        return self.fail("E3003", "Array index on non-array type in assignment");
                    }
                };
                let elem_ptr = self.array_element_ptr(index, function)?;
                let value = self.lower_expr_value(&assign.value, function, Some(&elem_ty))?;
                let value = self.coerce_to_type(value, &elem_ty)?;
                self.builder.build_store(elem_ptr, value)?;
                Ok(())
            }
            _ => self.fail("E3003", "Invalid assignment target"),
        }
    }

    fn lower_if(&self, ifs: &IfStmt, function: FunctionValue<'a>) -> Result<bool, Diagnostic> {
        let cond = self.lower_expr_value(&ifs.condition, function, None)?;
        let cond = self.to_bool(cond)?;

        let then_bb = self.context.append_basic_block(function, "then");
        let else_bb = self.context.append_basic_block(function, "else");
        let merge_bb = self.context.append_basic_block(function, "ifcont");

        self.builder.build_conditional_branch(cond, then_bb, else_bb)?;

        self.builder.position_at_end(then_bb);
        self.lower_stmts(&ifs.then_branch, function)?;
        let then_terminated = self.current_block_terminated();
        if !then_terminated {
            self.builder.build_unconditional_branch(merge_bb)?;
        }

        self.builder.position_at_end(else_bb);
        self.lower_stmts(&ifs.else_branch, function)?;
        let else_terminated = self.current_block_terminated();
        if !else_terminated {
            self.builder.build_unconditional_branch(merge_bb)?;
        }

        if then_terminated && else_terminated {
            // Both branches terminate; the merge block would be dead.
            let _ = merge_bb.remove_from_function();
            Ok(true)
        } else {
            self.builder.position_at_end(merge_bb);
            Ok(false)
        }
    }

    fn current_block_terminated(&self) -> bool {
        self.builder
            .get_insert_block()
            .map(|b| b.get_terminator().is_some())
            .unwrap_or(true)
    }

    fn lower_while(&self, ws: &WhileStmt, function: FunctionValue<'a>) -> Result<(), Diagnostic> {
        let cond_bb = self.context.append_basic_block(function, "whilecond");
        let body_bb = self.context.append_basic_block(function, "whilebody");
        let after_bb = self.context.append_basic_block(function, "afterwhile");

        self.push_loop_context(after_bb, cond_bb);
        self.builder.build_unconditional_branch(cond_bb)?;

        self.builder.position_at_end(cond_bb);
        let cond = self.lower_expr_value(&ws.condition, function, None)?;
        // Type-appropriate comparison, parallel to `if`.
        let cond = self.to_bool(cond)?;
        self.builder.build_conditional_branch(cond, body_bb, after_bb)?;

        self.builder.position_at_end(body_bb);
        self.lower_stmts(&ws.body, function)?;
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(cond_bb)?;
        }

        self.pop_loop_context();
        self.builder.position_at_end(after_bb);
        Ok(())
    }

    fn lower_for(&self, fs: &ForStmt, function: FunctionValue<'a>) -> Result<(), Diagnostic> {
        let mut start_val = self.lower_expr_value(&fs.start, function, None)?;
        let mut end_val = self.lower_expr_value(&fs.end, function, None)?;

        // Bring both bounds to one numeric type.
        match (start_val, end_val) {
            (BasicValueEnum::FloatValue(_), BasicValueEnum::IntValue(iv)) => {
                end_val = self
                    .builder
                    .build_signed_int_to_float(iv, self.f64_t, "endconv")?
                    .into();
            }
            (BasicValueEnum::IntValue(iv), BasicValueEnum::FloatValue(_)) => {
                start_val = self
                    .builder
                    .build_signed_int_to_float(iv, self.f64_t, "startconv")?
                    .into();
            }
            _ => {}
        }

        let var_ty = start_val.get_type();
        let var_alloca = self.create_entry_block_alloca(function, &fs.var_name, var_ty)?;
        self.builder.build_store(var_alloca, start_val)?;

        let shadowed = self.define_local(
            &fs.var_name,
            Local {
                alloca: var_alloca,
                pointee: var_ty,
            },
        );
        let aurora_var_ty = if var_ty.is_float_type() {
            Type::Double
        } else {
            Type::Int
        };
        self.set_variable_type(&fs.var_name, aurora_var_ty);

        let cond_bb = self.context.append_basic_block(function, "forcond");
        let body_bb = self.context.append_basic_block(function, "forbody");
        let step_bb = self.context.append_basic_block(function, "forstep");
        let after_bb = self.context.append_basic_block(function, "afterfor");

        self.push_loop_context(after_bb, step_bb);
        self.builder.build_unconditional_branch(cond_bb)?;

        // Condition: semi-open range, var < end.
        self.builder.position_at_end(cond_bb);
        let current = self
            .builder
            .build_load(var_alloca, &fs.var_name)?;
        let cond = if current.is_int_value() {
            self.builder.build_int_compare(
                IntPredicate::SLT,
                current.into_int_value(),
                end_val.into_int_value(),
                "forcond",
            )?
        } else {
            self.builder.build_float_compare(
                FloatPredicate::ULT,
                current.into_float_value(),
                end_val.into_float_value(),
                "forcond",
            )?
        };
        self.builder.build_conditional_branch(cond, body_bb, after_bb)?;

        self.builder.position_at_end(body_bb);
        self.lower_stmts(&fs.body, function)?;
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(step_bb)?;
        }

        // Step: var = var + step (default 1).
        self.builder.position_at_end(step_bb);
        let current = self
            .builder
            .build_load(var_alloca, &fs.var_name)?;
        let step_val: BasicValueEnum<'a> = match &fs.step {
            Some(step) => {
                let raw = self.lower_expr_value(step, function, None)?;
                if current.is_int_value() {
                    self.coerce_to_type(raw, &Type::Int)?
                } else {
                    self.coerce_to_type(raw, &Type::Double)?
                }
            }
            None => {
                if current.is_int_value() {
                    self.i64_t.const_int(1, true).into()
                } else {
                    self.f64_t.const_float(1.0).into()
                }
            }
        };
        let next = if current.is_int_value() {
            self.builder
                .build_int_add(current.into_int_value(), step_val.into_int_value(), "nextvar")?
                .into()
        } else {
            BasicValueEnum::from(self.builder.build_float_add(
                current.into_float_value(),
                step_val.into_float_value(),
                "nextvar",
            )?)
        };
        self.builder.build_store(var_alloca, next)?;
        self.builder.build_unconditional_branch(cond_bb)?;

        self.pop_loop_context();
        self.builder.position_at_end(after_bb);

        self.restore_local(&fs.var_name, shadowed);
        Ok(())
    }

    fn lower_loop(&self, ls: &LoopStmt, function: FunctionValue<'a>) -> Result<(), Diagnostic> {
        let body_bb = self.context.append_basic_block(function, "loopbody");
        let after_bb = self.context.append_basic_block(function, "afterloop");

        self.push_loop_context(after_bb, body_bb);
        self.builder.build_unconditional_branch(body_bb)?;

        self.builder.position_at_end(body_bb);
        self.lower_stmts(&ls.body, function)?;
        if !self.current_block_terminated() {
            self.builder.build_unconditional_branch(body_bb)?;
        }

        self.pop_loop_context();
        self.builder.position_at_end(after_bb);
        Ok(())
    }
}
