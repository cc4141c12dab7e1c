use super::{EvalMode, Expr, coerce_ref, evaluate, ops};
use crate::codec;
use crate::descriptor::{self, BoundSide};
use crate::error::{Error, Result, eval_bail};
use crate::fixing::{
    self, coerce_to_simple_array, desc_bounds_value, desc_one_bound, to_fixed_array_type, to_fixed_range_type,
    value_struct_elt,
};
use crate::session::Session;
use crate::types::{TypeId, TypeKind};
use crate::value::Value;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Attribute {
    First,
    Last,
    Length,
    Pos,
    Val,
    Size,
    Tag,
    Min,
    Max,
    Modulus,
    Address,
    Small,
    Delta,
}

impl Attribute {
    pub fn name(self) -> &'static str {
        match self {
            Attribute::First => "first",
            Attribute::Last => "last",
            Attribute::Length => "length",
            Attribute::Pos => "pos",
            Attribute::Val => "val",
            Attribute::Size => "size",
            Attribute::Tag => "tag",
            Attribute::Min => "min",
            Attribute::Max => "max",
            Attribute::Modulus => "modulus",
            Attribute::Address => "address",
            Attribute::Small => "small",
            Attribute::Delta => "delta",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What an attribute applies to.
enum Prefix {
    Type(TypeId),
    Value(Value),
}

pub(super) fn evaluate_attribute(
    s: &mut Session,
    attr: Attribute,
    prefix: &Expr,
    args: &[Expr],
    mode: EvalMode,
) -> Result<Value> {
    let prefix = match prefix {
        Expr::Type(ty) => Prefix::Type(*ty),
        other => Prefix::Value(evaluate(s, other, None, mode)?),
    };
    match attr {
        Attribute::First | Attribute::Last | Attribute::Length => {
            let dim = match args {
                [] => 1,
                [Expr::Int(n)] if *n >= 1 => *n as usize,
                _ => eval_bail!("Invalid operand to '{attr}"),
            };
            match prefix {
                Prefix::Type(ty) => type_bound_attribute(s, attr, ty, dim),
                Prefix::Value(v) => value_bound_attribute(s, attr, v, dim, mode),
            }
        }
        Attribute::Pos => {
            let v = attribute_argument(s, prefix, args, mode)?;
            pos_attribute(s, v, mode)
        }
        Attribute::Val => {
            let Prefix::Type(ty) = prefix else {
                eval_bail!("'VAL only defined on discrete types");
            };
            let [arg] = args else {
                eval_bail!("Invalid operand to 'val");
            };
            let arg = evaluate(s, arg, None, mode)?;
            val_attribute(s, ty, &arg, mode)
        }
        Attribute::Size => {
            let ty = match prefix {
                Prefix::Type(ty) => fixing::static_fixed_type(s, ty),
                Prefix::Value(v) => coerce_ref(s, v)?.ty,
            };
            let bits = 8 * s.types.length(s.types.check_typedef(ty));
            Ok(s.value_from_long(s.types.builtins().integer, bits as i64))
        }
        Attribute::Tag => {
            let Prefix::Value(v) = prefix else {
                eval_bail!("Invalid operand to 'tag");
            };
            if mode == EvalMode::AvoidSideEffects {
                let ty = s.types.check_typedef(v.ty);
                let Some(tag_ty) = descriptor::lookup_struct_elt_type(&s.types, ty, "_tag") else {
                    eval_bail!("There is no member named _tag.");
                };
                return Ok(Value::zero(&s.types, tag_ty));
            }
            value_struct_elt(s, v, "_tag", false)?
                .ok_or_else(|| Error::eval("There is no member named _tag."))
        }
        Attribute::Min | Attribute::Max => {
            let [a, b] = args else {
                eval_bail!("Invalid operand to '{attr}");
            };
            let a = evaluate(s, a, None, mode)?;
            let b = evaluate(s, b, None, mode)?;
            if mode == EvalMode::AvoidSideEffects {
                let ty = match prefix {
                    Prefix::Type(ty) => ty,
                    Prefix::Value(_) => a.ty,
                };
                return Ok(Value::zero(&s.types, ty));
            }
            let pick_b = if attr == Attribute::Min { ops::less_than(s, &b, &a)? } else { ops::less_than(s, &a, &b)? };
            Ok(if pick_b { b } else { a })
        }
        Attribute::Modulus => {
            let ty = prefix_type(s, prefix)?;
            let Some(modulus) = s.types.modulus(ty) else {
                eval_bail!("'modulus must be applied to modular type");
            };
            Ok(s.value_from_long(s.types.builtins().long_integer, modulus as i64))
        }
        Attribute::Address => {
            let Prefix::Value(v) = prefix else {
                eval_bail!("Attempt to take address of value not located in memory.");
            };
            let address_ty = s.types.builtins().address;
            if mode == EvalMode::AvoidSideEffects {
                return Ok(Value::zero(&s.types, address_ty));
            }
            let v = coerce_ref(s, v)?;
            match (v.address, v.bitsize) {
                (Some(address), 0) => Ok(s.value_from_long(address_ty, address as i64)),
                _ => Err(Error::eval("Attempt to take address of value not located in memory.")),
            }
        }
        Attribute::Small | Attribute::Delta => {
            let ty = prefix_type(s, prefix)?;
            if !s.types.is_fixed_point(ty) {
                eval_bail!("'{attr} must be applied to a fixed-point type");
            }
            let x = if attr == Attribute::Small {
                codec::scaling_factor(&s.types, ty)?
            } else {
                codec::delta(&s.types, ty)?
            };
            s.value_from_double(s.types.builtins().long_float, x)
        }
    }
}

fn prefix_type(s: &mut Session, prefix: Prefix) -> Result<TypeId> {
    Ok(match prefix {
        Prefix::Type(ty) => ty,
        Prefix::Value(v) => coerce_ref(s, v)?.ty,
    })
}

/// The operand of `T'Pos (x)` or of `x'Pos`.
fn attribute_argument(s: &mut Session, prefix: Prefix, args: &[Expr], mode: EvalMode) -> Result<Value> {
    match (prefix, args) {
        (_, [arg]) => evaluate(s, arg, None, mode),
        (Prefix::Value(v), []) => Ok(v),
        _ => Err(Error::eval("Invalid operand to 'pos")),
    }
}

fn pos_attribute(s: &mut Session, v: Value, mode: EvalMode) -> Result<Value> {
    let integer = s.types.builtins().integer;
    let ty = s.types.check_typedef(v.ty);
    if !s.types.is_discrete(ty) {
        eval_bail!("'POS only defined on discrete types");
    }
    if mode == EvalMode::AvoidSideEffects {
        return Ok(Value::zero(&s.types, integer));
    }
    let n = s.value_as_long(&v)?;
    let pos = if s.types.is_enum(ty) {
        let Some(pos) = s.types.enum_literal_position(ty, n) else {
            eval_bail!("enumeration value is invalid: can't find 'POS");
        };
        pos as i64
    } else {
        n
    };
    let ty = if i32::try_from(pos).is_ok() { integer } else { s.types.builtins().long_integer };
    Ok(s.value_from_long(ty, pos))
}

fn val_attribute(s: &mut Session, ty: TypeId, arg: &Value, mode: EvalMode) -> Result<Value> {
    let base = s.types.check_typedef(ty);
    if !s.types.is_discrete(base) {
        eval_bail!("'VAL only defined on discrete types");
    }
    let arg_ty = s.types.check_typedef(arg.ty);
    if !s.types.is_integral(arg_ty) {
        eval_bail!("'VAL requires integral argument");
    }
    if mode == EvalMode::AvoidSideEffects {
        return Ok(Value::zero(&s.types, ty));
    }
    let pos = s.value_as_long(arg)?;
    if let TypeKind::Enum { literals } = s.types.kind(base) {
        let Some(literal) = usize::try_from(pos).ok().and_then(|p| literals.get(p)) else {
            eval_bail!("argument to 'VAL out of range");
        };
        let value = literal.value;
        return Ok(s.value_from_long(ty, value));
    }
    Ok(s.value_from_long(ty, pos))
}

/// `T'First`, `T'Last` or `T'Length` for a type `T`.
fn type_bound_attribute(s: &mut Session, attr: Attribute, ty: TypeId, dim: usize) -> Result<Value> {
    let base = s.types.check_typedef(ty);
    if s.types.is_discrete(base) {
        if attr == Attribute::Length {
            eval_bail!("the 'length attribute applies only to array types");
        }
        let (lo, hi) = discrete_type_bounds(s, base)?;
        return Ok(s.value_from_long(ty, if attr == Attribute::First { lo } else { hi }));
    }
    if s.types.is_float(base) {
        eval_bail!("unimplemented type attribute");
    }
    if !descriptor::is_simple_array_type(&s.types, base) && !descriptor::is_array_descriptor_type(&s.types, base) {
        eval_bail!("attempt to take bound of something that is not an array");
    }
    check_dimension(s, attr, base, dim)?;
    let index_ty = index_type(s, attr, base, dim)?;
    let (lo, hi) = if descriptor::is_simple_array_type(&s.types, base) {
        let fixed = to_fixed_array_type(s, base, None, true)?;
        array_bounds_from_type(s, fixed, dim)?
    } else {
        (0, -1)
    };
    bound_result(s, attr, index_ty, lo, hi)
}

fn discrete_type_bounds(s: &mut Session, ty: TypeId) -> Result<(i64, i64)> {
    if let Some(bounds) = s.types.discrete_bounds(ty) {
        return Ok(bounds);
    }
    let fixed = to_fixed_range_type(s, ty, None)?;
    s.types
        .discrete_bounds(fixed)
        .ok_or_else(|| Error::eval(format!("Cannot determine the bounds of {}", s.types.display_name(ty))))
}

fn check_dimension(s: &Session, attr: Attribute, ty: TypeId, dim: usize) -> Result<()> {
    let arity = descriptor::array_arity(&s.types, ty);
    if dim == 0 || dim > arity {
        eval_bail!("invalid dimension number to '{attr}");
    }
    Ok(())
}

/// Index type of dimension `dim` (1-based) of an array, access to array or
/// array descriptor.
fn index_type(s: &Session, attr: Attribute, ty: TypeId, dim: usize) -> Result<TypeId> {
    let types = &s.types;
    let ty = types.check_typedef(ty);
    if descriptor::is_array_descriptor_type(types, ty) {
        let bounds = descriptor::desc_bounds_type(types, ty);
        return Ok(bounds
            .and_then(|b| descriptor::desc_index_type(types, b, dim))
            .unwrap_or(types.builtins().integer));
    }
    let mut cur = match types.kind(ty) {
        TypeKind::Pointer { target } => types.check_typedef(*target),
        _ => ty,
    };
    if !types.is_array(cur) {
        eval_bail!("attempt to take bound of something that is not an array");
    }
    for _ in 1..dim {
        cur = types
            .array_element(cur)
            .map(|e| types.check_typedef(e))
            .ok_or_else(|| Error::eval(format!("invalid dimension number to '{attr}")))?;
    }
    types.array_index(cur).ok_or_else(|| Error::eval(format!("invalid dimension number to '{attr}")))
}

/// Static bounds of dimension `dim` of the fixed array type `ty`.
fn array_bounds_from_type(s: &mut Session, ty: TypeId, dim: usize) -> Result<(i64, i64)> {
    let mut cur = s.types.check_typedef(ty);
    for _ in 1..dim {
        cur = s.types.check_typedef(s.types.array_element(cur).unwrap_or(cur));
    }
    let Some(index) = s.types.array_index(cur) else {
        return Ok((0, -1));
    };
    discrete_type_bounds(s, index)
}

fn bound_result(s: &Session, attr: Attribute, index_ty: TypeId, lo: i64, hi: i64) -> Result<Value> {
    Ok(match attr {
        Attribute::First => s.value_from_long(index_ty, lo),
        Attribute::Last => s.value_from_long(index_ty, hi),
        _ => {
            let length = (hi as i128 - lo as i128 + 1).max(0) as i64;
            s.value_from_long(s.types.builtins().integer, length)
        }
    })
}

/// Bounds of dimension `dim` of the array value `arr`.
fn value_bounds(s: &mut Session, attr: Attribute, arr: Value, dim: usize) -> Result<(TypeId, i64, i64)> {
    let mut arr = coerce_ref(s, arr)?;
    if descriptor::is_constrained_packed_array_type(&s.types, arr.ty) {
        arr = coerce_to_simple_array(s, arr)?;
    }
    let ty = s.types.check_typedef(arr.ty);
    if !descriptor::is_simple_array_type(&s.types, ty) && !descriptor::is_array_descriptor_type(&s.types, ty) {
        eval_bail!("attempt to take bound of something that is not an array");
    }
    check_dimension(s, attr, ty, dim)?;
    let index_ty = index_type(s, attr, ty, dim)?;
    if descriptor::is_array_descriptor_type(&s.types, ty) {
        let Some(bounds) = desc_bounds_value(s, &arr)? else {
            eval_bail!("Bounds unavailable for null array pointer.");
        };
        let lo = desc_one_bound(s, &bounds, dim, BoundSide::Low)?;
        let hi = desc_one_bound(s, &bounds, dim, BoundSide::High)?;
        return Ok((index_ty, lo, hi));
    }
    let array_ty = match s.types.kind(ty) {
        TypeKind::Pointer { target } => *target,
        _ => ty,
    };
    let fixed = to_fixed_array_type(s, array_ty, None, true)?;
    let (lo, hi) = array_bounds_from_type(s, fixed, dim)?;
    Ok((index_ty, lo, hi))
}

fn value_bound_attribute(s: &mut Session, attr: Attribute, arr: Value, dim: usize, mode: EvalMode) -> Result<Value> {
    if mode == EvalMode::AvoidSideEffects {
        let arr = coerce_ref(s, arr)?;
        check_dimension(s, attr, arr.ty, dim)?;
        let ty = if attr == Attribute::Length {
            s.types.builtins().integer
        } else {
            index_type(s, attr, arr.ty, dim)?
        };
        return Ok(Value::zero(&s.types, ty));
    }
    let (index_ty, lo, hi) = value_bounds(s, attr, arr, dim)?;
    bound_result(s, attr, index_ty, lo, hi)
}

/// `v in arr'Range (dim)`
pub(super) fn in_bounds(s: &mut Session, v: &Value, arr: Value, dim: usize) -> Result<bool> {
    if dim == 0 || dim > {
        let arr_ty = coerce_ref(s, arr.clone())?.ty;
        descriptor::array_arity(&s.types, arr_ty)
    } {
        eval_bail!("invalid dimension number to 'range");
    }
    let (_, lo, hi) = value_bounds(s, Attribute::First, arr, dim)?;
    let n = s.value_as_long(v)?;
    Ok(lo <= n && n <= hi)
}
