//! Expression lowering.
//!
//! `lower_expr` returns `Ok(None)` for void-producing expressions
//! (calls to void functions); `lower_expr_value` is the strict variant
//! used where a value is required. The `expected` parameter threads the
//! type context that resolves `null` literals (declarations, assignment
//! targets, returns and argument slots).

use inkwell::types::BasicTypeEnum;
use inkwell::values::{BasicValueEnum, FunctionValue};
use inkwell::{FloatPredicate, IntPredicate};

use aurora_ast::*;

use super::CodeGen;
use crate::diagnostics::Diagnostic;

impl<'a> CodeGen<'a> {
    pub fn lower_expr_value(
        &self,
        expr: &Expr,
        function: FunctionValue<'a>,
        expected: Option<&Type>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        match self.lower_expr(expr, function, expected)? {
            Some(value) => Ok(value),
            None => self.fail("E3002", "expression does not produce a value"),
        }
    }

    pub fn lower_expr(
        &self,
        expr: &Expr,
        function: FunctionValue<'a>,
        expected: Option<&Type>,
    ) -> Result<Option<BasicValueEnum<'a>>, Diagnostic> {
        match expr {
            Expr::IntLit(lit) => Ok(Some(
                self.i64_t.const_int(lit.value as u64, true).into(),
            )),
            Expr::DoubleLit(lit) => Ok(Some(self.f64_t.const_float(lit.value).into())),
            Expr::BoolLit(lit) => Ok(Some(
                self.bool_t.const_int(lit.value as u64, false).into(),
            )),
            Expr::StringLit(lit) => Ok(Some(self.string_literal(&lit.value)?.into())),
            Expr::NullLit(_) => Ok(Some(self.lower_null(expected))),
            Expr::Var(var) => self.lower_var(var).map(Some),
            Expr::Unary(unary) => self.lower_unary(unary, function).map(Some),
            Expr::Binary(binary) => self.lower_binary(binary, function).map(Some),
            Expr::Ternary(ternary) => self.lower_ternary(ternary, function).map(Some),
            Expr::Call(call) => self.lower_call(call, function),
            Expr::New(new) => self.lower_new(new, function).map(Some),
            Expr::This(_) => self.lower_this().map(Some),
            Expr::Member(member) => self.lower_member_access(member, function).map(Some),
            Expr::MemberCall(call) => self.lower_member_call(call, function),
            Expr::ArrayLit(lit) => self.lower_array_literal(lit, function).map(Some),
            Expr::Index(index) => self.lower_array_index(index, function).map(Some),
            Expr::NullCheck(check) => self.lower_null_check(check, function).map(Some),
            Expr::SafeNav(nav) => self.lower_safe_nav(nav, function).map(Some),
            Expr::ForceUnwrap(unwrap) => self.lower_force_unwrap(unwrap, function).map(Some),
        }
    }

    /// Materialize `null` for the expected type: a zeroed optional
    /// struct when the context supplies one, otherwise a null pointer.
    fn lower_null(&self, expected: Option<&Type>) -> BasicValueEnum<'a> {
        match expected {
            Some(Type::Optional(inner)) => self.optional_type(inner).const_zero().into(),
            Some(ty) => match self.llvm_type(ty) {
                Some(llvm) => self.zero_value(llvm),
                None => self.ptr_t.const_null().into(),
            },
            None => self.ptr_t.const_null().into(),
        }
    }

    pub(crate) fn zero_value(&self, ty: BasicTypeEnum<'a>) -> BasicValueEnum<'a> {
        match ty {
            BasicTypeEnum::IntType(t) => t.const_zero().into(),
            BasicTypeEnum::FloatType(t) => t.const_zero().into(),
            BasicTypeEnum::PointerType(t) => t.const_null().into(),
            BasicTypeEnum::StructType(t) => t.const_zero().into(),
            BasicTypeEnum::ArrayType(t) => t.const_zero().into(),
            // Vector types never occur in lowered Aurora code.
            _ => self.i64_t.const_zero().into(),
        }
    }

    fn lower_var(&self, var: &VarExpr) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let Some(local) = self.lookup_local(&var.name) else {
            return self.fail("E3002", format!("Unknown variable: {}", var.name));
        };
        Ok(self
            .builder
            .build_load(local.alloca, &var.name)?)
    }

    pub(crate) fn lower_this(&self) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let Some(local) = self.lookup_local("this") else {
            return self.fail("E3004", "'this' used outside of method context");
        };
        Ok(self.builder.build_load(local.alloca, "this")?)
    }

    fn lower_unary(
        &self,
        unary: &UnaryExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let operand = self.lower_expr_value(&unary.expr, function, None)?;

        match unary.op {
            UnaryOp::Not => {
                let as_bool = self.to_bool(operand)?;
                Ok(self.builder.build_not(as_bool, "nottmp")?.into())
            }
            UnaryOp::Neg => match operand {
                BasicValueEnum::IntValue(iv) => {
                    Ok(self.builder.build_int_neg(iv, "negtmp")?.into())
                }
                BasicValueEnum::FloatValue(fv) => {
                    Ok(self.builder.build_float_neg(fv, "negtmp")?.into())
                }
                _ => self.fail("E3002", "Negation requires a numeric operand"),
            },
            UnaryOp::BitNot => match operand {
                BasicValueEnum::IntValue(iv) => {
                    Ok(self.builder.build_not(iv, "bitnottmp")?.into())
                }
                _ => self.fail("E3002", "Bitwise NOT requires integer operand"),
            },
        }
    }

    fn lower_binary(
        &self,
        binary: &BinaryExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        // Logical operators short-circuit.
        if binary.op.is_logical() {
            return self.lower_short_circuit(binary, function);
        }
        if binary.op == BinaryOp::NullCoalesce {
            return self.lower_null_coalesce(binary, function);
        }

        // Comparisons against `null` are resolved before the null
        // literal would need a type of its own.
        if matches!(binary.op, BinaryOp::Equal | BinaryOp::NotEqual) {
            let (null_side, other) = match (&*binary.left, &*binary.right) {
                (Expr::NullLit(_), other) => (true, other),
                (other, Expr::NullLit(_)) => (true, other),
                _ => (false, &*binary.left),
            };
            if null_side {
                return self.lower_null_comparison(other, binary.op, function);
            }
        }

        let left_ty = self.expr_type(&binary.left);
        let right_ty = self.expr_type(&binary.right);
        if left_ty.is_optional() || right_ty.is_optional() {
            return self.fail(
                "E3002",
                "Optional comparisons currently support only comparisons against null",
            );
        }

        let l = self.lower_expr_value(&binary.left, function, None)?;
        let r = self.lower_expr_value(&binary.right, function, None)?;

        // Pointer operands: equality only.
        if l.is_pointer_value() || r.is_pointer_value() {
            if !(l.is_pointer_value() && r.is_pointer_value()) {
                return self.fail("E3002", "Cannot compare pointer with non-pointer type");
            }
            let pred = match binary.op {
                BinaryOp::Equal => IntPredicate::EQ,
                BinaryOp::NotEqual => IntPredicate::NE,
                _ => {
                    return self
                        .fail("E3002", "Only equality operators supported for pointer types");
                }
            };
            return Ok(self
                .builder
                .build_int_compare(pred, l.into_pointer_value(), r.into_pointer_value(), "cmptmp")?
                .into());
        }

        let (l, r) = self.unify_numeric(l, r)?;
        let is_int = l.is_int_value();

        use BinaryOp::*;
        let value: BasicValueEnum<'a> = match binary.op {
            Add => {
                if is_int {
                    self.builder
                        .build_int_add(l.into_int_value(), r.into_int_value(), "addtmp")?
                        .into()
                } else {
                    self.builder
                        .build_float_add(l.into_float_value(), r.into_float_value(), "addtmp")?
                        .into()
                }
            }
            Sub => {
                if is_int {
                    self.builder
                        .build_int_sub(l.into_int_value(), r.into_int_value(), "subtmp")?
                        .into()
                } else {
                    self.builder
                        .build_float_sub(l.into_float_value(), r.into_float_value(), "subtmp")?
                        .into()
                }
            }
            Mul => {
                if is_int {
                    self.builder
                        .build_int_mul(l.into_int_value(), r.into_int_value(), "multmp")?
                        .into()
                } else {
                    self.builder
                        .build_float_mul(l.into_float_value(), r.into_float_value(), "multmp")?
                        .into()
                }
            }
            Div => {
                if is_int {
                    self.builder
                        .build_int_signed_div(l.into_int_value(), r.into_int_value(), "divtmp")?
                        .into()
                } else {
                    self.builder
                        .build_float_div(l.into_float_value(), r.into_float_value(), "divtmp")?
                        .into()
                }
            }
            Mod => {
                if is_int {
                    self.builder
                        .build_int_signed_rem(l.into_int_value(), r.into_int_value(), "modtmp")?
                        .into()
                } else {
                    self.builder
                        .build_float_rem(l.into_float_value(), r.into_float_value(), "modtmp")?
                        .into()
                }
            }
            Less | Greater | LessEq | GreaterEq | Equal | NotEqual => {
                if is_int {
                    let pred = match binary.op {
                        Less => IntPredicate::SLT,
                        Greater => IntPredicate::SGT,
                        LessEq => IntPredicate::SLE,
                        GreaterEq => IntPredicate::SGE,
                        Equal => IntPredicate::EQ,
                        _ => IntPredicate::NE,
                    };
                    self.builder
                        .build_int_compare(pred, l.into_int_value(), r.into_int_value(), "cmptmp")?
                        .into()
                } else {
                    let pred = match binary.op {
                        Less => FloatPredicate::ULT,
                        Greater => FloatPredicate::UGT,
                        LessEq => FloatPredicate::ULE,
                        GreaterEq => FloatPredicate::UGE,
                        Equal => FloatPredicate::UEQ,
                        _ => FloatPredicate::UNE,
                    };
                    self.builder
                        .build_float_compare(
                            pred,
                            l.into_float_value(),
                            r.into_float_value(),
                            "cmptmp",
                        )?
                        .into()
                }
            }
            BitAnd | BitOr | BitXor | Shl | Shr => {
                if !is_int {
                    return self.fail("E3002", "Bitwise operators require integer operands");
                }
                let (li, ri) = (l.into_int_value(), r.into_int_value());
                match binary.op {
                    BitAnd => self.builder.build_and(li, ri, "andtmp")?.into(),
                    BitOr => self.builder.build_or(li, ri, "ortmp")?.into(),
                    BitXor => self.builder.build_xor(li, ri, "xortmp")?.into(),
                    Shl => self.builder.build_left_shift(li, ri, "shltmp")?.into(),
                    // Right shift is arithmetic.
                    _ => self
                        .builder
                        .build_right_shift(li, ri, true, "ashrtmp")?
                        .into(),
                }
            }
            And | Or | NullCoalesce => {
                return self.fail("E3002", "Invalid binary operator at this point");
            }
        };

        Ok(value)
    }

    /// Promote mismatched numeric operands: int meets double as double,
    /// narrow ints (bool) widen to i64.
    fn unify_numeric(
        &self,
        l: BasicValueEnum<'a>,
        r: BasicValueEnum<'a>,
    ) -> Result<(BasicValueEnum<'a>, BasicValueEnum<'a>), Diagnostic> {
        match (l, r) {
            (BasicValueEnum::IntValue(li), BasicValueEnum::FloatValue(_)) => {
                let promoted = self
                    .builder
                    .build_signed_int_to_float(li, self.f64_t, "promotetmp")?;
                Ok((promoted.into(), r))
            }
            (BasicValueEnum::FloatValue(_), BasicValueEnum::IntValue(ri)) => {
                let promoted = self
                    .builder
                    .build_signed_int_to_float(ri, self.f64_t, "promotetmp")?;
                Ok((l, promoted.into()))
            }
            (BasicValueEnum::IntValue(li), BasicValueEnum::IntValue(ri)) => {
                let (lw, rw) = (li.get_type().get_bit_width(), ri.get_type().get_bit_width());
                if lw == rw {
                    Ok((l, r))
                } else if lw < rw {
                    let widened = self.builder.build_int_z_extend(li, ri.get_type(), "zexttmp")?;
                    Ok((widened.into(), r))
                } else {
                    let widened = self.builder.build_int_z_extend(ri, li.get_type(), "zexttmp")?;
                    Ok((l, widened.into()))
                }
            }
            _ => Ok((l, r)),
        }
    }

    /// `&&` / `||` with three basic blocks and a PHI over the boolean
    /// result; the right-hand side is only evaluated when it can still
    /// change the outcome.
    fn lower_short_circuit(
        &self,
        binary: &BinaryExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let l = self.lower_expr_value(&binary.left, function, None)?;
        let l_bool = self.to_bool(l)?;

        let entry_bb = self
            .builder
            .get_insert_block()
            .ok_or_else(|| self.err("E3002", "no current block"))?;
        let rhs_bb = self.context.append_basic_block(function, "rhs");
        let merge_bb = self.context.append_basic_block(function, "merge");

        match binary.op {
            BinaryOp::And => {
                self.builder
                    .build_conditional_branch(l_bool, rhs_bb, merge_bb)?;
            }
            _ => {
                self.builder
                    .build_conditional_branch(l_bool, merge_bb, rhs_bb)?;
            }
        }

        self.builder.position_at_end(rhs_bb);
        let r = self.lower_expr_value(&binary.right, function, None)?;
        let r_bool = self.to_bool(r)?;
        // Nested short-circuits may have moved the insertion point.
        let rhs_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| self.err("E3002", "no current block"))?;
        self.builder.build_unconditional_branch(merge_bb)?;

        self.builder.position_at_end(merge_bb);
        let phi = self.builder.build_phi(self.bool_t, "logictmp")?;
        let short_value = match binary.op {
            BinaryOp::And => self.bool_t.const_int(0, false),
            _ => self.bool_t.const_int(1, false),
        };
        phi.add_incoming(&[(&short_value, entry_bb), (&r_bool, rhs_end)]);

        Ok(phi.as_basic_value())
    }

    /// `a ?? b`: unwrap `a` when present, otherwise evaluate `b`.
    fn lower_null_coalesce(
        &self,
        binary: &BinaryExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let left_ty = self.expr_type(&binary.left);
        let Some(inner) = left_ty.optional_inner().cloned() else {
            // Left side is never null; it is the result.
            return self.lower_expr_value(&binary.left, function, None);
        };

        let l = self.lower_expr_value(&binary.left, function, None)?;
        let l_struct = l.into_struct_value();
        let has_value = self
            .builder
            .build_extract_value(l_struct, 0, "has_value")?
            .into_int_value();
        let payload = self.builder.build_extract_value(l_struct, 1, "payload")?;

        let some_bb = self.context.append_basic_block(function, "coalesce_some");
        let none_bb = self.context.append_basic_block(function, "coalesce_none");
        let merge_bb = self.context.append_basic_block(function, "coalesce_merge");

        self.builder
            .build_conditional_branch(has_value, some_bb, none_bb)?;

        self.builder.position_at_end(some_bb);
        self.builder.build_unconditional_branch(merge_bb)?;

        self.builder.position_at_end(none_bb);
        let fallback = self.lower_expr_value(&binary.right, function, Some(&inner))?;
        let fallback = self.coerce_to_type(fallback, &inner)?;
        let none_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| self.err("E3002", "no current block"))?;
        self.builder.build_unconditional_branch(merge_bb)?;

        self.builder.position_at_end(merge_bb);
        let phi = self.builder.build_phi(payload.get_type(), "coalesce_result")?;
        phi.add_incoming(&[(&payload, some_bb), (&fallback, none_end)]);

        Ok(phi.as_basic_value())
    }

    /// `x == null` / `x != null`: extract the optional's flag, or
    /// compare pointers against null.
    fn lower_null_comparison(
        &self,
        other: &Expr,
        op: BinaryOp,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let other_ty = self.expr_type(other);
        let value = self.lower_expr_value(other, function, None)?;

        // Optionals are normalized so the optional side is extracted;
        // a null-to-null comparison falls through to the pointer path.
        if other_ty.is_optional() && value.is_struct_value() {
            let has_value = self
                .builder
                .build_extract_value(value.into_struct_value(), 0, "has_value")?
                .into_int_value();
            let is_null = self.builder.build_int_compare(
                IntPredicate::EQ,
                has_value,
                self.bool_t.const_int(0, false),
                "opt_is_null",
            )?;
            let result = if op == BinaryOp::NotEqual {
                self.builder.build_not(is_null, "opt_not")?
            } else {
                is_null
            };
            return Ok(result.into());
        }

        if value.is_pointer_value() {
            let pred = if op == BinaryOp::Equal {
                IntPredicate::EQ
            } else {
                IntPredicate::NE
            };
            return Ok(self
                .builder
                .build_int_compare(
                    pred,
                    value.into_pointer_value(),
                    self.ptr_t.const_null(),
                    "cmptmp",
                )?
                .into());
        }

        self.fail("E3002", "Cannot compare non-nullable value against null")
    }

    fn lower_ternary(
        &self,
        ternary: &TernaryExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let cond = self.lower_expr_value(&ternary.condition, function, None)?;
        let cond = self.to_bool(cond)?;

        let then_bb = self.context.append_basic_block(function, "ternary_then");
        let else_bb = self.context.append_basic_block(function, "ternary_else");
        let merge_bb = self.context.append_basic_block(function, "ternary_merge");

        self.builder.build_conditional_branch(cond, then_bb, else_bb)?;

        self.builder.position_at_end(then_bb);
        let mut then_val = self.lower_expr_value(&ternary.then_expr, function, None)?;
        let then_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| self.err("E3002", "no current block"))?;
        self.builder.build_unconditional_branch(merge_bb)?;

        self.builder.position_at_end(else_bb);
        let mut else_val = self.lower_expr_value(&ternary.else_expr, function, None)?;
        let else_end = self
            .builder
            .get_insert_block()
            .ok_or_else(|| self.err("E3002", "no current block"))?;
        self.builder.build_unconditional_branch(merge_bb)?;

        self.builder.position_at_end(merge_bb);

        // Promote the int arm when the arms disagree.
        if then_val.get_type() != else_val.get_type() {
            if then_val.is_int_value() && else_val.is_float_value() {
                self.reposition_before_terminator(then_end);
                then_val = self
                    .builder
                    .build_signed_int_to_float(then_val.into_int_value(), self.f64_t, "promotetmp")?
                    .into();
                self.builder.position_at_end(merge_bb);
            } else if then_val.is_float_value() && else_val.is_int_value() {
                self.reposition_before_terminator(else_end);
                else_val = self
                    .builder
                    .build_signed_int_to_float(else_val.into_int_value(), self.f64_t, "promotetmp")?
                    .into();
                self.builder.position_at_end(merge_bb);
            }
        }

        let phi = self.builder.build_phi(then_val.get_type(), "ternary_result")?;
        phi.add_incoming(&[(&then_val, then_end), (&else_val, else_end)]);

        Ok(phi.as_basic_value())
    }

    /// Position the builder just before `block`'s terminator so a late
    /// conversion still dominates the PHI that consumes it.
    fn reposition_before_terminator(&self, block: inkwell::basic_block::BasicBlock<'a>) {
        match block.get_terminator() {
            Some(term) => self.builder.position_before(&term),
            None => self.builder.position_at_end(block),
        }
    }

    fn lower_call(
        &self,
        call: &CallExpr,
        function: FunctionValue<'a>,
    ) -> Result<Option<BasicValueEnum<'a>>, Diagnostic> {
        let Some(callee) = self.resolve_callee(&call.callee) else {
            return self.fail("E3002", format!("Unknown function: {}", call.callee));
        };

        if callee.count_params() as usize != call.args.len() {
            return self.fail(
                "E3002",
                format!(
                    "Incorrect number of arguments to '{}': expected {}, got {}",
                    call.callee,
                    callee.count_params(),
                    call.args.len()
                ),
            );
        }

        let mut arg_values: Vec<inkwell::values::BasicMetadataValueEnum<'a>> =
            Vec::with_capacity(call.args.len());
        for (idx, arg) in call.args.iter().enumerate() {
            let expected_llvm = callee
                .get_nth_param(idx as u32)
                .map(|p| p.get_type())
                .ok_or_else(|| self.err("E3002", "missing parameter type"))?;

            // Null arguments materialize directly as the parameter type.
            if matches!(arg, Expr::NullLit(_)) {
                arg_values.push(self.zero_value(expected_llvm).into());
                continue;
            }

            let value = self.lower_expr_value(arg, function, None)?;
            let value = self.coerce_to_llvm(value, expected_llvm)?;
            arg_values.push(value.into());
        }

        let call_site = self.builder.build_call(callee, &arg_values, "")?;
        Ok(call_site.try_as_basic_value().left())
    }

    fn lower_null_check(
        &self,
        check: &NullCheckExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let value = self.lower_expr_value(&check.expr, function, None)?;
        let ty = self.expr_type(&check.expr);

        if ty.is_optional() && value.is_struct_value() {
            let has_value = self
                .builder
                .build_extract_value(value.into_struct_value(), 0, "has_value")?
                .into_int_value();
            return Ok(self
                .builder
                .build_int_compare(
                    IntPredicate::NE,
                    has_value,
                    self.bool_t.const_int(0, false),
                    "nullcheck",
                )?
                .into());
        }

        if value.is_pointer_value() {
            return Ok(self
                .builder
                .build_int_compare(
                    IntPredicate::NE,
                    value.into_pointer_value(),
                    self.ptr_t.const_null(),
                    "nullcheck",
                )?
                .into());
        }

        self.fail("E3002", "Null check requires optional or pointer type")
    }

    fn lower_force_unwrap(
        &self,
        unwrap: &ForceUnwrapExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let value = self.lower_expr_value(&unwrap.expr, function, None)?;
        let ty = self.expr_type(&unwrap.expr);

        if !(ty.is_optional() && value.is_struct_value()) {
            // Unwrapping a non-optional is the identity.
            return Ok(value);
        }

        let as_struct = value.into_struct_value();
        let has_value = self
            .builder
            .build_extract_value(as_struct, 0, "has_value")?
            .into_int_value();
        let payload = self.builder.build_extract_value(as_struct, 1, "payload")?;

        let ok_bb = self.context.append_basic_block(function, "unwrap_ok");
        let fail_bb = self.context.append_basic_block(function, "unwrap_fail");
        self.builder
            .build_conditional_branch(has_value, ok_bb, fail_bb)?;

        self.builder.position_at_end(fail_bb);
        let message = self.string_literal("force unwrap of null value")?;
        let panic = self.get_panic();
        self.builder.build_call(panic, &[message.into()], "")?;
        self.builder.build_unreachable()?;

        self.builder.position_at_end(ok_bb);
        Ok(payload)
    }
}
