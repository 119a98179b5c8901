//! Array lowering.
//!
//! Array literals are backed by the reference-counted runtime: the
//! generator calls `aurora_array_create`, stores each element through
//! `aurora_array_set`, then materializes the language-level value as a
//! `{ i64 length, ptr data }` struct whose data pointer is loaded from
//! the runtime object. Indexing computes a byte offset into that data
//! pointer.

use inkwell::values::{BasicValueEnum, FunctionValue, IntValue, PointerValue};

use aurora_ast::*;

use super::CodeGen;
use crate::diagnostics::Diagnostic;

impl<'a> CodeGen<'a> {
    /// Layout of the runtime's array object:
    /// `{ { i64 ref_count, i32 type_tag }, i64 length, ptr data }`.
    fn runtime_array_type(&self) -> inkwell::types::StructType<'a> {
        self.context.struct_type(
            &[
                self.header_struct_type().into(),
                self.i64_t.into(),
                self.ptr_t.into(),
            ],
            false,
        )
    }

    pub(crate) fn lower_array_literal(
        &self,
        lit: &ArrayLitExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let Some(elem_ty) = lit.ty.array_elem().cloned() else {
            return self.fail("E3001", "Array literal has non-array type");
        };
        let Some(elem_llvm) = self.llvm_type(&elem_ty) else {
            return self.fail("E3001", "Array element type cannot be void");
        };

        let elem_size = self.type_size(&elem_ty);
        let elem_size_val = self.i64_t.const_int(elem_size, false);
        let count_val = self.i64_t.const_int(lit.elements.len() as u64, false);

        let create = self.get_array_create();
        let call_site = self
            .builder
            .build_call(create, &[elem_size_val.into(), count_val.into()], "array")?;
        let runtime_array = call_site
            .try_as_basic_value()
            .left()
            .ok_or_else(|| self.err("E3001", "aurora_array_create did not return a value"))?
            .into_pointer_value();

        // Store elements through the runtime, one temporary slot each.
        let set = self.get_array_set();
        for (i, element) in lit.elements.iter().enumerate() {
            let value = self.lower_expr_value(element, function, Some(&elem_ty))?;
            let value = self.coerce_to_type(value, &elem_ty)?;

            let tmp = self.builder.build_alloca(elem_llvm, "elem_tmp")?;
            self.builder.build_store(tmp, value)?;

            let index_val = self.i64_t.const_int(i as u64, false);
            self.builder.build_call(
                set,
                &[
                    runtime_array.into(),
                    index_val.into(),
                    tmp.into(),
                    elem_size_val.into(),
                ],
                "",
            )?;
        }

        // Build the language-level { length, data } value.
        let length_fn = self.get_array_length();
        let length = self
            .builder
            .build_call(length_fn, &[runtime_array.into()], "length")?
            .try_as_basic_value()
            .left()
            .ok_or_else(|| self.err("E3001", "aurora_array_length did not return a value"))?;

        let typed_array = self.builder.build_pointer_cast(
            runtime_array,
            self.runtime_array_type().ptr_type(inkwell::AddressSpace::default()),
            "typed_array",
        )?;
        let data_field_ptr = self.builder.build_struct_gep(
            typed_array,
            2,
            "data_field_ptr",
        )?;
        let data_ptr = self
            .builder
            .build_load(data_field_ptr, "data")?;

        let with_len = self.builder.build_insert_value(
            self.array_struct_type().get_undef(),
            length,
            0,
            "array_with_len",
        )?;
        let complete = self.builder.build_insert_value(
            with_len.into_struct_value(),
            data_ptr,
            1,
            "array_value",
        )?;

        Ok(complete.into_struct_value().into())
    }

    /// Widen or truncate an index to `i64`; double indices truncate.
    fn index_to_i64(&self, index: BasicValueEnum<'a>) -> Result<IntValue<'a>, Diagnostic> {
        match index {
            BasicValueEnum::IntValue(iv) => {
                let width = iv.get_type().get_bit_width();
                if width == 64 {
                    Ok(iv)
                } else if width < 64 {
                    Ok(self.builder.build_int_z_extend(iv, self.i64_t, "idx_ext")?)
                } else {
                    Ok(self.builder.build_int_truncate(iv, self.i64_t, "idx_trunc")?)
                }
            }
            BasicValueEnum::FloatValue(fv) => Ok(self
                .builder
                .build_float_to_signed_int(fv, self.i64_t, "idx_conv")?),
            _ => self.fail("E3001", "Array index must be numeric"),
        }
    }

    /// Address of `arr[idx]`: extract the data pointer and offset it by
    /// `idx * sizeof(element)` bytes.
    pub(crate) fn array_element_ptr(
        &self,
        index: &IndexExpr,
        function: FunctionValue<'a>,
    ) -> Result<PointerValue<'a>, Diagnostic> {
        let Type::Array(elem_ty) = self.expr_type(&index.array) else {
            return self.fail("E3001", "Array index on non-array type");
        };

        let array_val = self.lower_expr_value(&index.array, function, None)?;
        let index_val = self.lower_expr_value(&index.index, function, None)?;
        let index_val = self.index_to_i64(index_val)?;

        let data_ptr = self
            .builder
            .build_extract_value(array_val.into_struct_value(), 1, "array_data")?
            .into_pointer_value();

        let elem_size = self.type_size(&elem_ty);
        let elem_size_val = self.i64_t.const_int(elem_size, false);
        let offset = self
            .builder
            .build_int_mul(index_val, elem_size_val, "offset")?;

        // Byte-wise GEP from the data pointer.
        let elem_ptr = unsafe {
            self.builder
                .build_gep(data_ptr, &[offset], "elem_ptr")?
        };
        Ok(elem_ptr)
    }

    pub(crate) fn lower_array_index(
        &self,
        index: &IndexExpr,
        function: FunctionValue<'a>,
    ) -> Result<BasicValueEnum<'a>, Diagnostic> {
        let Type::Array(elem_ty) = self.expr_type(&index.array) else {
            return self.fail("E3001", "Array index on non-array type");
        };
        let Some(elem_llvm) = self.llvm_type(&elem_ty) else {
            return self.fail("E3001", "Array element type cannot be void");
        };

        let elem_ptr = self.array_element_ptr(index, function)?;
        Ok(self.builder.build_load(elem_ptr, "elem")?)
    }
}
