use super::{BinaryOp, EvalMode, UnaryOp, coerce_ref};
use crate::codec;
use crate::descriptor;
use crate::error::{Error, Result, eval_bail};
use crate::fixing::{coerce_to_simple_array, to_fixed_range_type};
use crate::session::Session;
use crate::types::{TypeId, TypeKind};
use crate::value::Value;

/// An operand after promotion. Fixed-point values become floats.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(n) => n as f64,
            Scalar::Float(x) => x,
        }
    }
}

fn scalar(s: &Session, v: &Value) -> Result<Scalar> {
    let ty = s.types.check_typedef(v.ty);
    if s.types.is_fixed_point(ty) {
        let raw = s.value_as_long(v)?;
        return Ok(Scalar::Float(codec::fixed_to_float(&s.types, ty, raw)?));
    }
    if s.types.is_float(ty) {
        return Ok(Scalar::Float(s.value_as_double(v)?));
    }
    if s.types.is_scalar(ty) {
        return Ok(Scalar::Int(s.value_as_long(v)?));
    }
    Err(Error::eval("Argument to arithmetic operation not a number or boolean."))
}

fn boolean(s: &Session, b: bool) -> Value {
    s.value_from_long(s.types.builtins().boolean, i64::from(b))
}

/// Truth value of a boolean (or integer) operand.
pub(super) fn truth(s: &Session, v: &Value) -> Result<bool> {
    Ok(s.value_as_long(v)? != 0)
}

/// Type of the result of combining `l` and `r` arithmetically: the wider
/// floating type if either is floating, a modular operand's type (the left
/// one first) so that the result wraps, else the wider integer type.
fn promoted_type(s: &Session, l: TypeId, r: TypeId) -> TypeId {
    let types = &s.types;
    let (lc, rc) = (types.check_typedef(l), types.check_typedef(r));
    let lf = types.is_float(lc) || types.is_fixed_point(lc);
    let rf = types.is_float(rc) || types.is_fixed_point(rc);
    if lf || rf {
        return [lc, rc]
            .into_iter()
            .filter(|t| types.is_float(*t))
            .max_by_key(|t| types.length(*t))
            .unwrap_or(types.builtins().long_float);
    }
    if let Some(modular) = [l, r].into_iter().find(|t| types.is_modular(*t)) {
        return modular;
    }
    if types.length(rc) > types.length(lc) { r } else { l }
}

fn make(s: &Session, ty: TypeId, v: Scalar) -> Result<Value> {
    let base = s.types.check_typedef(ty);
    if s.types.is_float(base) {
        return s.value_from_double(ty, v.as_f64());
    }
    let n = match v {
        Scalar::Int(n) => n,
        Scalar::Float(x) => x as i64,
    };
    let n = match s.types.modulus(base) {
        Some(m) => codec::reduce_modular(n, m),
        None => n,
    };
    Ok(s.value_from_long(ty, n))
}

fn peel_ref(s: &mut Session, v: Value) -> Result<Value> {
    coerce_ref(s, v)
}

pub(super) fn binary(s: &mut Session, op: BinaryOp, l: Value, r: Value, mode: EvalMode) -> Result<Value> {
    let l = peel_ref(s, l)?;
    let r = peel_ref(s, r)?;
    match op {
        BinaryOp::Add | BinaryOp::Sub => add_sub(s, op, l, r),
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Mod | BinaryOp::Exp => {
            if mode == EvalMode::AvoidSideEffects {
                let ty = if s.types.is_fixed_point(l.ty) || s.types.is_fixed_point(r.ty) {
                    s.types.builtins().long_float
                } else {
                    promoted_type(s, l.ty, r.ty)
                };
                return Ok(Value::zero(&s.types, ty));
            }
            value_binop(s, op, &l, &r)
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            if mode == EvalMode::AvoidSideEffects {
                return Ok(boolean(s, false));
            }
            let eq = value_equal(s, l, r)?;
            Ok(boolean(s, if op == BinaryOp::Eq { eq } else { !eq }))
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            if mode == EvalMode::AvoidSideEffects {
                return Ok(boolean(s, false));
            }
            let ord = compare(s, &l, &r)?;
            let result = match op {
                BinaryOp::Lt => ord.is_lt(),
                BinaryOp::Le => ord.is_le(),
                BinaryOp::Gt => ord.is_gt(),
                _ => ord.is_ge(),
            };
            Ok(boolean(s, result))
        }
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => logical(s, op, &l, &r),
        BinaryOp::AndThen | BinaryOp::OrElse => {
            let (a, b) = (truth(s, &l)?, truth(s, &r)?);
            Ok(boolean(s, if op == BinaryOp::AndThen { a && b } else { a || b }))
        }
    }
}

fn add_sub(s: &mut Session, op: BinaryOp, l: Value, r: Value) -> Result<Value> {
    let (lt, rt) = (s.types.check_typedef(l.ty), s.types.check_typedef(r.ty));
    if s.types.is_pointer(lt) && s.types.is_integral(rt) {
        let (a, n) = (s.value_as_long(&l)?, s.value_as_long(&r)?);
        let address = if op == BinaryOp::Add { a.wrapping_add(n) } else { a.wrapping_sub(n) };
        return Ok(s.value_from_long(l.ty, address));
    }
    if s.types.is_pointer(rt) && s.types.is_integral(lt) && op == BinaryOp::Add {
        let (n, a) = (s.value_as_long(&l)?, s.value_as_long(&r)?);
        return Ok(s.value_from_long(r.ty, a.wrapping_add(n)));
    }
    if s.types.is_fixed_point(lt) || s.types.is_fixed_point(rt) {
        if lt != rt {
            let what = if op == BinaryOp::Add { "addition" } else { "subtraction" };
            eval_bail!("Operands of fixed-point {what} must have the same type");
        }
        let (a, b) = (s.value_as_long(&l)?, s.value_as_long(&r)?);
        let raw = if op == BinaryOp::Add { a.wrapping_add(b) } else { a.wrapping_sub(b) };
        return Ok(s.value_from_long(l.ty, raw));
    }
    value_binop(s, op, &l, &r)
}

/// Arithmetic on two scalar operands, after promotion. Fixed-point
/// operands are converted to floating point.
pub fn value_binop(s: &mut Session, op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let (a, b) = (scalar(s, l)?, scalar(s, r)?);
    let ty = promoted_type(s, l.ty, r.ty);
    let result = match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => Scalar::Int(match op {
            BinaryOp::Add => x.wrapping_add(y),
            BinaryOp::Sub => x.wrapping_sub(y),
            BinaryOp::Mul => x.wrapping_mul(y),
            BinaryOp::Div => codec::div(x, y)?,
            BinaryOp::Rem => codec::rem(x, y)?,
            BinaryOp::Mod => codec::modulo(x, y)?,
            BinaryOp::Exp => {
                let Ok(e) = u32::try_from(y) else {
                    eval_bail!("Integer exponentiation with negative exponent");
                };
                x.wrapping_pow(e)
            }
            _ => return Err(Error::internal(format!("{op:?} is not an arithmetic operator"))),
        }),
        (a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            Scalar::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => x / y,
                BinaryOp::Rem | BinaryOp::Mod => {
                    if y == 0.0 {
                        eval_bail!("Division by zero");
                    }
                    let r = x % y;
                    if op == BinaryOp::Mod && r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }
                }
                BinaryOp::Exp => match b {
                    Scalar::Int(e) => x.powi(e as i32),
                    Scalar::Float(e) => x.powf(e),
                },
                _ => return Err(Error::internal(format!("{op:?} is not an arithmetic operator"))),
            })
        }
    };
    let ty = if op == BinaryOp::Exp && matches!(result, Scalar::Int(_)) { l.ty } else { ty };
    make(s, ty, result)
}

fn compare(s: &mut Session, l: &Value, r: &Value) -> Result<std::cmp::Ordering> {
    let (lt, rt) = (s.types.check_typedef(l.ty), s.types.check_typedef(r.ty));
    if lt == rt && s.types.is_fixed_point(lt) {
        return Ok(s.value_as_long(l)?.cmp(&s.value_as_long(r)?));
    }
    match (scalar(s, l)?, scalar(s, r)?) {
        (Scalar::Int(a), Scalar::Int(b)) => Ok(a.cmp(&b)),
        (a, b) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .ok_or_else(|| Error::eval("Comparison with a NaN is undefined")),
    }
}

pub(super) fn less_than(s: &mut Session, l: &Value, r: &Value) -> Result<bool> {
    Ok(compare(s, l, r)?.is_lt())
}

/// Ada `=`: arrays compare by length and contents, scalars by value.
pub fn value_equal(s: &mut Session, l: Value, r: Value) -> Result<bool> {
    let l = peel_ref(s, l)?;
    let r = peel_ref(s, r)?;
    let is_arrayish = |s: &Session, v: &Value| {
        s.types.is_array(s.types.check_typedef(v.ty)) || descriptor::is_array_descriptor_type(&s.types, v.ty)
    };
    let (la, ra) = (is_arrayish(s, &l), is_arrayish(s, &r));
    if la || ra {
        if !(la && ra) {
            eval_bail!("Attempt to compare array with non-array");
        }
        let l = coerce_to_simple_array(s, l)?;
        let r = coerce_to_simple_array(s, r)?;
        let (l, r) = (s.fetched(&l)?, s.fetched(&r)?);
        let (ll, rl) = (s.types.length(s.types.check_typedef(l.ty)), s.types.length(s.types.check_typedef(r.ty)));
        return Ok(ll == rl && l.bytes()? == r.bytes()?);
    }
    let lt = s.types.check_typedef(l.ty);
    if s.types.is_struct(lt) || s.types.is_union(lt) {
        eval_bail!("Invalid type combination in equality test.");
    }
    Ok(compare(s, &l, &r)?.is_eq())
}

fn logical(s: &mut Session, op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let lt = s.types.check_typedef(l.ty);
    let rt = s.types.check_typedef(r.ty);
    let (a, b) = (s.value_as_long(l)?, s.value_as_long(r)?);
    if matches!(s.types.kind(lt), TypeKind::Bool) && matches!(s.types.kind(rt), TypeKind::Bool) {
        let (a, b) = (a != 0, b != 0);
        let v = match op {
            BinaryOp::And => a && b,
            BinaryOp::Or => a || b,
            _ => a ^ b,
        };
        return Ok(boolean(s, v));
    }
    if !s.types.is_integral(lt) || !s.types.is_integral(rt) {
        eval_bail!("Argument to logical operation not a boolean or modular value.");
    }
    let v = match op {
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        _ => a ^ b,
    };
    make(s, l.ty, Scalar::Int(v))
}

pub(super) fn unary(s: &mut Session, op: UnaryOp, v: Value, mode: EvalMode) -> Result<Value> {
    let v = peel_ref(s, v)?;
    let ty = s.types.check_typedef(v.ty);
    if mode == EvalMode::AvoidSideEffects {
        let ty = if op == UnaryOp::Not && matches!(s.types.kind(ty), TypeKind::Bool) { s.types.builtins().boolean } else { v.ty };
        return Ok(Value::zero(&s.types, ty));
    }
    match op {
        UnaryOp::Plus => {
            scalar(s, &v)?;
            Ok(v)
        }
        UnaryOp::Neg | UnaryOp::Abs => {
            if s.types.is_fixed_point(ty) {
                let raw = s.value_as_long(&v)?;
                let raw = if op == UnaryOp::Abs { raw.wrapping_abs() } else { raw.wrapping_neg() };
                return Ok(s.value_from_long(v.ty, raw));
            }
            let result = match scalar(s, &v)? {
                Scalar::Int(n) if op == UnaryOp::Abs => Scalar::Int(n.wrapping_abs()),
                Scalar::Int(n) => Scalar::Int(n.wrapping_neg()),
                Scalar::Float(x) if op == UnaryOp::Abs => Scalar::Float(x.abs()),
                Scalar::Float(x) => Scalar::Float(-x),
            };
            make(s, v.ty, result)
        }
        UnaryOp::Not => {
            if matches!(s.types.kind(ty), TypeKind::Bool) {
                let b = truth(s, &v)?;
                return Ok(boolean(s, !b));
            }
            if !s.types.is_integral(ty) {
                eval_bail!("Argument to complement operation not a boolean or modular value.");
            }
            let n = s.value_as_long(&v)?;
            let n = match s.types.modulus(ty) {
                Some(m) if m > 0 => (m as i64).wrapping_sub(1).wrapping_sub(n),
                _ => !n,
            };
            Ok(s.value_from_long(v.ty, n))
        }
    }
}

/// `v in lo .. hi`
pub(super) fn in_range(s: &mut Session, v: &Value, lo: &Value, hi: &Value) -> Result<bool> {
    Ok(compare(s, lo, v)?.is_le() && compare(s, v, hi)?.is_le())
}

/// `v in T` for a scalar subtype `T`.
pub(super) fn in_type(s: &mut Session, v: &Value, ty: TypeId) -> Result<bool> {
    let base = s.types.check_typedef(ty);
    match s.types.kind(base) {
        TypeKind::Int { .. }
        | TypeKind::Char
        | TypeKind::Bool
        | TypeKind::Enum { .. }
        | TypeKind::Modular { .. }
        | TypeKind::Range { .. } => {
            let bounds = match s.types.discrete_bounds(base) {
                Some(bounds) => bounds,
                None => {
                    let fixed = to_fixed_range_type(s, base, None)?;
                    s.types.discrete_bounds(fixed).unwrap_or((i64::MIN, i64::MAX))
                }
            };
            let n = s.value_as_long(v)?;
            Ok(bounds.0 <= n && n <= bounds.1)
        }
        _ => {
            s.warn("Membership test incompletely implemented; always returns true");
            Ok(true)
        }
    }
}

/// Fixed-point value of type `ty` nearest to `v`.
pub(super) fn cast_to_fixed(s: &Session, ty: TypeId, v: &Value) -> Result<Value> {
    if s.types.check_typedef(v.ty) == s.types.check_typedef(ty) {
        return Ok(v.clone());
    }
    let x = scalar(s, v)?.as_f64();
    let raw = codec::float_to_fixed(&s.types, ty, x)?;
    Ok(s.value_from_long(ty, raw))
}

/// Ada type conversion `T (v)`.
pub fn value_cast(s: &mut Session, ty: TypeId, v: Value) -> Result<Value> {
    let to = s.types.check_typedef(ty);
    if s.types.check_typedef(v.ty) == to {
        return Ok(v.retyped(ty));
    }
    if s.types.is_fixed_point(to) {
        return cast_to_fixed(s, ty, &v);
    }
    let v = peel_ref(s, v)?;
    let from = s.types.check_typedef(v.ty);
    if s.types.is_fixed_point(from) {
        let raw = s.value_as_long(&v)?;
        let x = codec::fixed_to_float(&s.types, from, raw)?;
        let as_float = s.value_from_double(s.types.builtins().long_float, x)?;
        return value_cast(s, ty, as_float);
    }
    let v = if descriptor::is_array_descriptor_type(&s.types, from)
        || descriptor::is_constrained_packed_array_type(&s.types, from)
    {
        coerce_to_simple_array(s, v)?
    } else {
        v
    };
    let from = s.types.check_typedef(v.ty);
    let types = &s.types;
    if types.is_float(to) && types.is_scalar(from) {
        let x = s.value_as_double(&v)?;
        return s.value_from_double(ty, x);
    }
    if (types.is_discrete(to) || types.is_pointer(to)) && types.is_scalar(from) {
        let n = if types.is_float(from) { s.value_as_double(&v)? as i64 } else { s.value_as_long(&v)? };
        return make(s, ty, Scalar::Int(n));
    }
    let same_length = types.length(to) == types.length(from);
    let compatible = (types.is_array(to) && types.is_array(from))
        || (types.is_struct(to) && types.is_struct(from))
        || (types.is_union(to) && types.is_union(from));
    if compatible && same_length {
        return Ok(s.fetched(&v)?.retyped(ty));
    }
    Err(Error::eval("Invalid cast."))
}
