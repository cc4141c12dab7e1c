use super::{EvalMode, Expr, coerce_ref, evaluate, ops};
use crate::descriptor;
use crate::error::{Error, Result, eval_bail};
use crate::fixing::{self, coerce_to_simple_array, to_fixed_array_type, unwrap_value, value_subscript_packed};
use crate::session::Session;
use crate::types::{TypeId, TypeKind, element_count};
use crate::value::Value;
use tracing::debug;

/// A call, or a subscript of an array, array descriptor or access to array.
pub(super) fn evaluate_call(s: &mut Session, callee: &Expr, args: &[Expr], mode: EvalMode) -> Result<Value> {
    let mut f = evaluate(s, callee, None, mode)?;
    let mut argvals = Vec::with_capacity(args.len());
    for arg in args {
        argvals.push(evaluate(s, arg, None, mode)?);
    }
    f = coerce_ref(s, f)?;
    if descriptor::is_constrained_packed_array_type(&s.types, f.ty) {
        f = coerce_to_simple_array(s, f)?;
    }
    let mut ty = s.types.check_typedef(f.ty);
    if let TypeKind::Pointer { target } = s.types.kind(ty).clone() {
        let target_base = s.types.check_typedef(target);
        match s.types.kind(target_base) {
            TypeKind::Function { .. } => {
                ty = target_base;
            }
            TypeKind::Array { .. } => {}
            TypeKind::Struct { .. } => {
                f = super::deref(s, f, mode)?;
                ty = s.types.check_typedef(f.ty);
            }
            _ => eval_bail!("cannot subscript or call something of type `{}'", s.types.display_name(f.ty)),
        }
    }

    match s.types.kind(ty).clone() {
        TypeKind::Function { ret, params } => {
            if mode == EvalMode::AvoidSideEffects {
                let Some(ret) = ret else {
                    eval_bail!("Expression of type other than \"Function returning ...\" used as function");
                };
                return Ok(Value::zero(&s.types, ret));
            }
            call_function(s, &f, ret, &params, argvals)
        }
        TypeKind::Struct { .. } => {
            if !descriptor::is_array_descriptor_type(&s.types, ty) {
                eval_bail!("cannot subscript or call a record");
            }
            let arity = descriptor::array_arity(&s.types, ty);
            if arity != argvals.len() {
                eval_bail!("wrong number of subscripts; expecting {arity}");
            }
            if mode == EvalMode::AvoidSideEffects {
                let Some(elt) = descriptor::array_element_type(&s.types, ty, Some(argvals.len())) else {
                    eval_bail!("wrong number of subscripts; expecting {arity}");
                };
                return Ok(Value::zero(&s.types, elt));
            }
            let arr = coerce_to_simple_array(s, f)?;
            let v = value_subscript(s, arr, &argvals)?;
            unwrap_value(s, v)
        }
        TypeKind::Array { .. } => {
            if mode == EvalMode::AvoidSideEffects {
                let Some(elt) = descriptor::array_element_type(&s.types, ty, Some(argvals.len())) else {
                    eval_bail!("too many subscripts ({} expected)", descriptor::array_arity(&s.types, ty));
                };
                return Ok(Value::zero(&s.types, elt));
            }
            let v = value_subscript(s, f, &argvals)?;
            unwrap_value(s, v)
        }
        TypeKind::Pointer { target } => {
            let array_ty = to_fixed_array_type(s, target, None, true)?;
            if mode == EvalMode::AvoidSideEffects {
                let Some(elt) = descriptor::array_element_type(&s.types, array_ty, Some(argvals.len())) else {
                    eval_bail!("too many subscripts ({} expected)", descriptor::array_arity(&s.types, array_ty));
                };
                return Ok(Value::zero(&s.types, elt));
            }
            let address = s.value_as_address(&f)?;
            let v = value_subscript(s, Value::lazy_at(array_ty, address), &argvals)?;
            unwrap_value(s, v)
        }
        _ => Err(Error::eval("Attempt to index or call something other than an array or function")),
    }
}

/// Call the subprogram denoted by `f` with arguments converted to the
/// formal types. Nested function values are addresses of their code.
fn call_function(
    s: &mut Session,
    f: &Value,
    ret: Option<TypeId>,
    params: &[TypeId],
    argvals: Vec<Value>,
) -> Result<Value> {
    let entry = match (s.types.is_pointer(s.types.check_typedef(f.ty)), f.address) {
        (true, _) => s.value_as_address(f)?,
        (false, Some(address)) => address,
        (false, None) => eval_bail!("Cannot call a function that is not located in memory"),
    };
    if params.len() != argvals.len() {
        eval_bail!("Too few arguments in function call.");
    }
    let mut raw_args = Vec::with_capacity(argvals.len());
    for (param, arg) in params.iter().zip(argvals) {
        let arg = ops::value_cast(s, *param, arg)?;
        raw_args.push(s.fetched(&arg)?.into_bytes()?);
    }
    let ret_len = ret.map_or(0, |r| s.types.length(s.types.check_typedef(r)) as usize);
    debug!("calling function at {entry:#x} with {} arguments", raw_args.len());
    let bytes = s.target_mut().call_function(entry, &raw_args, ret_len)?;
    let ret = ret.unwrap_or_else(|| s.types.builtins().void);
    let v = Value::from_bytes(ret, bytes);
    fixing::fix_value(s, v)
}

/// Element of the array `arr` at `indices`, one index per dimension.
pub(crate) fn value_subscript(s: &mut Session, arr: Value, indices: &[Value]) -> Result<Value> {
    let mut positions = Vec::with_capacity(indices.len());
    for index in indices {
        positions.push(s.value_as_long(index)?);
    }
    if s.types.array_element_bitsize(arr.ty) > 0 {
        return value_subscript_packed(s, &arr, &positions);
    }
    let mut elt = arr;
    let expected = descriptor::array_arity(&s.types, elt.ty);
    for pos in positions {
        let ty = s.types.check_typedef(elt.ty);
        if s.types.array_element_bitsize(ty) > 0 {
            return value_subscript_packed(s, &elt, &[pos]);
        }
        let TypeKind::Array { element, index, .. } = s.types.kind(ty).clone() else {
            eval_bail!("too many subscripts ({expected} expected)");
        };
        let (lo, hi) = array_index_bounds(s, index)?;
        if pos < lo || pos > hi {
            eval_bail!("no such vector element");
        }
        let stride = s.types.length(s.types.check_typedef(element));
        elt = elt.component(&s.types, element, (pos - lo) as u64 * stride);
    }
    Ok(elt)
}

fn array_index_bounds(s: &mut Session, index: TypeId) -> Result<(i64, i64)> {
    if let Some(bounds) = s.types.discrete_bounds(index) {
        return Ok(bounds);
    }
    let fixed = fixing::to_fixed_range_type(s, index, None)?;
    s.types
        .discrete_bounds(fixed)
        .ok_or_else(|| Error::eval(format!("Cannot determine the bounds of {}", s.types.display_name(index))))
}

/// Array of no elements with the element type of `array_ty`, indexed from `low`.
fn empty_array(s: &mut Session, array_ty: TypeId, low: i64) -> Result<Value> {
    let ty = s.types.check_typedef(array_ty);
    let (Some(element), Some(index)) = (s.types.array_element(ty), s.types.array_index(ty)) else {
        eval_bail!("cannot take slice of non-array");
    };
    let index_base = s.types.base_type(index);
    let range = s.types.create_range(index_base, low, low - 1);
    let empty = s.types.create_array(None, element, range);
    Ok(Value::zero(&s.types, empty))
}

/// `array (low .. high)`.
pub(super) fn evaluate_slice(s: &mut Session, array: &Expr, low: &Expr, high: &Expr, mode: EvalMode) -> Result<Value> {
    let mut arr = evaluate(s, array, None, mode)?;
    let lo = evaluate(s, low, None, mode)?;
    let hi = evaluate(s, high, None, mode)?;
    if mode == EvalMode::Skip {
        return Ok(arr);
    }
    arr = coerce_ref(s, arr)?;

    if descriptor::is_array_descriptor_type(&s.types, arr.ty) {
        if descriptor::is_packed_array_type(&s.types, arr.ty) {
            eval_bail!("cannot slice a packed array");
        }
        if mode == EvalMode::AvoidSideEffects {
            let Some(data) = descriptor::desc_data_target_type(&s.types, arr.ty) else {
                eval_bail!("Bad GNAT array descriptor");
            };
            return empty_array(s, data, 1);
        }
        arr = coerce_to_simple_array(s, arr)?;
    }
    if descriptor::is_constrained_packed_array_type(&s.types, arr.ty)
        || s.types.array_element_bitsize(arr.ty) > 0
    {
        eval_bail!("cannot slice a packed array");
    }

    let low_bound = s.value_as_long(&lo)?;
    let high_bound = s.value_as_long(&hi)?;
    let ty = s.types.check_typedef(arr.ty);

    if let TypeKind::Pointer { target } = s.types.kind(ty).clone()
        && s.types.is_array(s.types.check_typedef(target))
    {
        let array_ty = to_fixed_array_type(s, target, None, true)?;
        if high_bound < low_bound || mode == EvalMode::AvoidSideEffects {
            return empty_array(s, array_ty, low_bound);
        }
        let base = s.value_as_address(&arr)?;
        let (slice_ty, offset) = slice_layout(s, array_ty, low_bound, high_bound)?;
        return Ok(Value::lazy_at(slice_ty, base + offset));
    }
    if !s.types.is_array(ty) {
        eval_bail!("cannot take slice of non-array");
    }
    if mode == EvalMode::AvoidSideEffects {
        return Ok(arr);
    }
    if high_bound < low_bound {
        return empty_array(s, ty, low_bound);
    }
    let (slice_ty, offset) = slice_layout(s, ty, low_bound, high_bound)?;
    Ok(arr.component(&s.types, slice_ty, offset))
}

/// Type of `array_ty (low .. high)` and the byte offset of its first element.
fn slice_layout(s: &mut Session, array_ty: TypeId, low: i64, high: i64) -> Result<(TypeId, u64)> {
    let ty = s.types.check_typedef(array_ty);
    let (Some(element), Some(index)) = (s.types.array_element(ty), s.types.array_index(ty)) else {
        eval_bail!("cannot take slice of non-array");
    };
    let (lo, hi) = array_index_bounds(s, index)?;
    if low < lo || high > hi {
        eval_bail!("slice out of range");
    }
    let index_base = s.types.base_type(index);
    let range = s.types.create_range(index_base, low, high);
    let slice_ty = s.types.create_array(None, element, range);
    let stride = s.types.length(s.types.check_typedef(element));
    debug_assert_eq!(s.types.length(slice_ty), element_count(low, high) * stride);
    Ok((slice_ty, (low - lo) as u64 * stride))
}
