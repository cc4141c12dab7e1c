//! Expression trees and their evaluation.
//!
//! An [`Expr`] is produced by a front end (out of scope here) and passed
//! through [`resolve`] to bind names to symbols, pick overloads and expand
//! renamings. [`evaluate`] then walks the tree depth first, left to right.
//! In [`EvalMode::AvoidSideEffects`] only types are computed: no inferior
//! calls or writes happen and values are zero placeholders of the right
//! type. [`EvalMode::Skip`] discards a subtree without looking at it.

mod aggregate;
mod attr;
mod call;
mod ops;
mod resolve;

pub use attr::Attribute;
pub use ops::{value_binop, value_cast, value_equal};
pub use resolve::resolve;

use crate::descriptor;
use crate::error::{Error, Result, eval_bail};
use crate::fixing::{self, coerce_to_simple_array, fix_value, unwrap_value, value_struct_elt};
use crate::lookup::{self, AdaSymbolInfo};
use crate::session::Session;
use crate::types::{TypeId, TypeKind};
use crate::value::{Lval, Value};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    #[default]
    Normal,
    AvoidSideEffects,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Abs,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Mod,
    Exp,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Xor,
    AndThen,
    OrElse,
}

/// One association of an aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum Association {
    Positional(Expr),
    Named { choices: Vec<Choice>, value: Expr },
    Others(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Choice {
    Index(Expr),
    Range(Expr, Expr),
    /// A record component name, or a name denoting an index value.
    Component(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Char(u8),
    Bool(bool),
    Str(String),
    /// A name not yet bound to a symbol.
    Name(String),
    Var(AdaSymbolInfo),
    Type(TypeId),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// `value in low .. high`
    InRange { value: Box<Expr>, low: Box<Expr>, high: Box<Expr> },
    /// `value in T`
    InType { value: Box<Expr>, ty: TypeId },
    /// `value in array'Range (dim)`
    InBounds { value: Box<Expr>, array: Box<Expr>, dim: usize },
    Attr { attr: Attribute, prefix: Box<Expr>, args: Vec<Expr> },
    /// A call or a subscript; which one depends on the callee's type.
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Slice { array: Box<Expr>, low: Box<Expr>, high: Box<Expr> },
    Field { record: Box<Expr>, name: String },
    /// `.all`
    Deref(Box<Expr>),
    /// `T'(expr)`
    Qualify { ty: TypeId, expr: Box<Expr> },
    /// `T(expr)`
    Convert { ty: TypeId, expr: Box<Expr> },
    Aggregate(Vec<Association>),
    Assign { target: Box<Expr>, value: Box<Expr> },
}

impl Expr {
    pub fn name(name: &str) -> Self {
        Expr::Name(name.to_string())
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary(op, Box::new(operand))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Expr::Call { callee: Box::new(callee), args }
    }

    pub fn field(record: Expr, name: &str) -> Self {
        Expr::Field { record: Box::new(record), name: name.to_string() }
    }

    pub fn slice(array: Expr, low: Expr, high: Expr) -> Self {
        Expr::Slice { array: Box::new(array), low: Box::new(low), high: Box::new(high) }
    }

    pub fn attr(attr: Attribute, prefix: Expr, args: Vec<Expr>) -> Self {
        Expr::Attr { attr, prefix: Box::new(prefix), args }
    }

    pub fn assign(target: Expr, value: Expr) -> Self {
        Expr::Assign { target: Box::new(target), value: Box::new(value) }
    }
}

/// Resolve and evaluate `expr` as one top-level command.
pub fn evaluate_expression(s: &mut Session, expr: &Expr, expect: Option<TypeId>, mode: EvalMode) -> Result<Value> {
    s.begin_command();
    let resolved = resolve(s, expr, expect)?;
    evaluate(s, &resolved, expect, mode)
}

/// Placeholder produced for skipped subtrees.
fn skipped(s: &Session) -> Value {
    s.value_from_long(s.types.builtins().integer, 1)
}

fn boolean(s: &Session, b: bool) -> Value {
    s.value_from_long(s.types.builtins().boolean, i64::from(b))
}

/// Evaluate a resolved expression. `expect` is the type the context wants,
/// used by aggregates and qualified expressions.
pub fn evaluate(s: &mut Session, expr: &Expr, expect: Option<TypeId>, mode: EvalMode) -> Result<Value> {
    if mode == EvalMode::Skip {
        return Ok(skipped(s));
    }
    let b = s.types.builtins();
    match expr {
        Expr::Int(n) => {
            let ty = if i32::try_from(*n).is_ok() { b.integer } else { b.long_integer };
            Ok(s.value_from_long(ty, *n))
        }
        Expr::Float(x) => s.value_from_double(b.long_float, *x),
        Expr::Char(c) => Ok(s.value_from_long(b.character, i64::from(*c))),
        Expr::Bool(v) => Ok(boolean(s, *v)),
        Expr::Str(text) => Ok(string_value(s, text)),
        Expr::Name(name) => Err(Error::eval(format!("No definition of \"{name}\" in current context."))),
        Expr::Var(info) => eval_var(s, info, mode),
        Expr::Type(ty) => match mode {
            EvalMode::Normal => Err(Error::eval("Attempt to use a type name as an expression")),
            _ => Ok(Value::zero(&s.types, *ty)),
        },
        Expr::Unary(op, operand) => {
            let v = evaluate(s, operand, None, mode)?;
            ops::unary(s, *op, v, mode)
        }
        Expr::Binary(op @ (BinaryOp::AndThen | BinaryOp::OrElse), lhs, rhs) => {
            let l = evaluate(s, lhs, None, mode)?;
            let l = ops::truth(s, &l)?;
            let decided = (*op == BinaryOp::AndThen && !l) || (*op == BinaryOp::OrElse && l);
            if decided {
                evaluate(s, rhs, None, EvalMode::Skip)?;
                return Ok(boolean(s, l));
            }
            let r = evaluate(s, rhs, None, mode)?;
            let r = ops::truth(s, &r)?;
            Ok(boolean(s, r))
        }
        Expr::Binary(op, lhs, rhs) => {
            let l = evaluate(s, lhs, None, mode)?;
            let r = evaluate(s, rhs, None, mode)?;
            ops::binary(s, *op, l, r, mode)
        }
        Expr::InRange { value, low, high } => {
            let v = evaluate(s, value, None, mode)?;
            let lo = evaluate(s, low, None, mode)?;
            let hi = evaluate(s, high, None, mode)?;
            if mode == EvalMode::AvoidSideEffects {
                return Ok(boolean(s, false));
            }
            ops::in_range(s, &v, &lo, &hi).map(|b| boolean(s, b))
        }
        Expr::InType { value, ty } => {
            let v = evaluate(s, value, None, mode)?;
            if mode == EvalMode::AvoidSideEffects {
                return Ok(boolean(s, false));
            }
            ops::in_type(s, &v, *ty).map(|b| boolean(s, b))
        }
        Expr::InBounds { value, array, dim } => {
            let v = evaluate(s, value, None, mode)?;
            let arr = evaluate(s, array, None, mode)?;
            if mode == EvalMode::AvoidSideEffects {
                return Ok(boolean(s, false));
            }
            attr::in_bounds(s, &v, arr, *dim).map(|b| boolean(s, b))
        }
        Expr::Attr { attr, prefix, args } => attr::evaluate_attribute(s, *attr, prefix, args, mode),
        Expr::Call { callee, args } => call::evaluate_call(s, callee, args, mode),
        Expr::Slice { array, low, high } => call::evaluate_slice(s, array, low, high, mode),
        Expr::Field { record, name } => eval_field(s, record, name, mode),
        Expr::Deref(operand) => {
            let v = evaluate(s, operand, expect, mode)?;
            deref(s, v, mode)
        }
        Expr::Qualify { ty, expr } => {
            let v = evaluate(s, expr, Some(*ty), mode)?;
            if mode == EvalMode::Normal && !matches!(**expr, Expr::Aggregate(_)) {
                return ops::value_cast(s, *ty, v);
            }
            Ok(v)
        }
        Expr::Convert { ty, expr } => {
            let v = evaluate(s, expr, Some(*ty), mode)?;
            ops::value_cast(s, *ty, v)
        }
        Expr::Aggregate(assocs) => {
            let Some(ty) = expect else {
                eval_bail!("Aggregates only allowed on the right of an assignment");
            };
            let ty = fixing::static_fixed_type(s, ty);
            aggregate::assign_aggregate(s, Value::zero(&s.types, ty), assocs, mode)
        }
        Expr::Assign { target, value } => eval_assign(s, target, value, mode),
    }
}

fn string_value(s: &mut Session, text: &str) -> Value {
    let b = s.types.builtins();
    let index = s.types.create_range(b.integer, 1, text.len() as i64);
    let ty = s.types.create_array(None, b.character, index);
    Value::from_bytes(ty, text.as_bytes().to_vec())
}

fn eval_var(s: &mut Session, info: &AdaSymbolInfo, mode: EvalMode) -> Result<Value> {
    let sym = s.symbols.symbol(info.symbol);
    let name = sym.natural_name.clone();
    let declared = sym.ty;
    if sym.is_typedef() {
        return match (mode, declared) {
            (EvalMode::Normal, _) | (_, None) => Err(Error::eval("Attempt to use a type name as an expression")),
            (_, Some(ty)) => Ok(Value::zero(&s.types, ty)),
        };
    }
    trace!("evaluating variable {name}");
    if mode == EvalMode::AvoidSideEffects
        && let Some(ty) = declared
    {
        let ty = fixing::static_unwrap_type(s, ty);
        if fixing::is_tagged_type(&s.types, ty) {
            // the specific type is only known from the object's tag
            let v = lookup::symbol_value(s, info.symbol)?;
            let v = fix_value(s, v)?;
            return Ok(Value::zero(&s.types, v.ty));
        }
        let fixed = fixing::static_fixed_type(s, ty);
        return Ok(Value::zero(&s.types, fixed));
    }
    let v = lookup::symbol_value(s, info.symbol)?;
    let v = unwrap_value(s, v)?;
    fix_value(s, v)
}

fn eval_field(s: &mut Session, record: &Expr, name: &str, mode: EvalMode) -> Result<Value> {
    let arg = evaluate(s, record, None, mode)?;
    if mode == EvalMode::AvoidSideEffects {
        let mut ty = s.types.check_typedef(arg.ty);
        if let Some(target) = s.types.target(ty).filter(|_| s.types.is_pointer(ty) || s.types.is_reference(ty)) {
            ty = s.types.check_typedef(target);
        }
        return match descriptor::lookup_struct_elt_type(&s.types, ty, name) {
            Some(field_ty) => {
                let field_ty = fixing::static_unwrap_type(s, field_ty);
                Ok(Value::zero(&s.types, field_ty))
            }
            // might exist in an extension of the tagged type
            None if fixing::is_tagged_type(&s.types, ty) => Ok(Value::zero(&s.types, s.types.builtins().void)),
            None => Err(Error::eval(format!("Type {} has no component named {name}", s.types.display_name(ty)))),
        };
    }
    let Some(v) = value_struct_elt(s, arg, name, false)? else {
        eval_bail!("There is no member named {name}.");
    };
    let v = unwrap_value(s, v)?;
    fix_value(s, v)
}

/// Object designated by the access value `v`. Integers are dereferenced
/// as addresses of integers and array descriptors yield their array.
pub(crate) fn deref(s: &mut Session, v: Value, mode: EvalMode) -> Result<Value> {
    let ty = s.types.check_typedef(v.ty);
    let b = s.types.builtins();
    if descriptor::is_array_descriptor_type(&s.types, ty) {
        if mode == EvalMode::AvoidSideEffects {
            let Some(elt) = descriptor::array_element_type(&s.types, ty, None) else {
                eval_bail!("Attempt to take contents of a non-pointer value.");
            };
            return Ok(Value::zero(&s.types, elt));
        }
        return coerce_to_simple_array(s, v);
    }
    match s.types.kind(ty).clone() {
        TypeKind::Pointer { target } | TypeKind::Reference { target } => {
            if mode == EvalMode::AvoidSideEffects {
                let target = fixing::static_unwrap_type(s, target);
                return Ok(Value::zero(&s.types, target));
            }
            let address = s.value_as_address(&v)?;
            fix_value(s, Value::lazy_at(target, address))
        }
        TypeKind::Int { .. } | TypeKind::Range { .. } => {
            if mode == EvalMode::AvoidSideEffects {
                return Ok(Value::zero(&s.types, b.integer));
            }
            let address = s.value_as_address(&v)?;
            Ok(Value::lazy_at(b.integer, address))
        }
        _ => Err(Error::eval("Attempt to take contents of a non-pointer value.")),
    }
}

/// `v` with references followed.
pub(crate) fn coerce_ref(s: &mut Session, v: Value) -> Result<Value> {
    let ty = s.types.check_typedef(v.ty);
    match s.types.kind(ty) {
        TypeKind::Reference { target } => {
            let target = *target;
            let address = s.value_as_address(&v)?;
            Ok(Value::lazy_at(target, address))
        }
        _ => Ok(v),
    }
}

fn eval_assign(s: &mut Session, target: &Expr, value: &Expr, mode: EvalMode) -> Result<Value> {
    let lhs = evaluate(s, target, None, mode)?;
    if let Expr::Aggregate(assocs) = value {
        let container = aggregate::assign_aggregate(s, lhs.clone(), assocs, mode)?;
        if mode != EvalMode::Normal {
            return Ok(container);
        }
        return value_assign(s, &lhs, &container);
    }
    let expect = match lhs.lval {
        Lval::Internal(_) => None,
        _ => Some(lhs.ty),
    };
    let rhs = evaluate(s, value, expect, mode)?;
    if mode != EvalMode::Normal {
        return Ok(lhs);
    }
    let rhs = if s.types.is_fixed_point(lhs.ty) {
        ops::cast_to_fixed(s, lhs.ty, &rhs)?
    } else if s.types.is_fixed_point(rhs.ty) {
        eval_bail!("Fixed-point values must be assigned to fixed-point variables");
    } else {
        coerce_for_assign(s, lhs.ty, rhs)?
    };
    value_assign(s, &lhs, &rhs)
}

fn coerce_for_assign(s: &mut Session, ty: TypeId, v: Value) -> Result<Value> {
    let to = s.types.check_typedef(ty);
    if s.types.check_typedef(v.ty) == to {
        return Ok(v);
    }
    let v = coerce_ref(s, v)?;
    let v = if descriptor::is_array_descriptor_type(&s.types, v.ty) { coerce_to_simple_array(s, v)? } else { v };
    if s.types.is_array(to) && s.types.is_array(v.ty) {
        if s.types.length(to) != s.types.length(s.types.check_typedef(v.ty)) {
            eval_bail!("Incompatible types in assignment");
        }
        let v = s.fetched(&v)?;
        return Ok(v.retyped(ty));
    }
    ops::value_cast(s, ty, v)
}

/// Store `from` into the location of `to` and return the updated value.
/// Bit-packed destinations are merged into their surrounding bytes.
pub(crate) fn value_assign(s: &mut Session, to: &Value, from: &Value) -> Result<Value> {
    if !to.modifiable {
        eval_bail!("Left operand of assignment is not a modifiable lvalue.");
    }
    let from = s.fetched(from)?;
    let bytes = from.bytes()?.to_vec();
    match (&to.lval, to.address) {
        (Lval::Memory, Some(address)) if to.bitsize > 0 => {
            let len = (to.bitpos + to.bitsize).div_ceil(8) as usize;
            let mut buf = s.read_memory(address, len)?;
            let src_offset = if s.bits_big_endian() { (8 * bytes.len() as u64).saturating_sub(to.bitsize) } else { 0 };
            crate::codec::move_bits(&mut buf, to.bitpos, &bytes, src_offset, to.bitsize, s.bits_big_endian());
            s.target_mut().write_memory(address, &buf)?;
        }
        (Lval::Memory, Some(_)) => {
            let stored = Value::at_with_contents(to.ty, to.address, bytes.clone());
            s.write_back(&stored)?;
        }
        (Lval::Register(regnum), _) => eval_bail!("Cannot write register {regnum} of the target"),
        _ => eval_bail!("Left operand of assignment is not a modifiable lvalue."),
    }
    let mut out = Value::at_with_contents(to.ty, to.address, bytes);
    out.bitpos = to.bitpos;
    out.bitsize = to.bitsize;
    out.offset = to.offset;
    Ok(out)
}

#[cfg(test)]
mod tests;
