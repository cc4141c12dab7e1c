//! Name resolution: binds names to symbols, picks among overloaded
//! subprograms and expands renamings before evaluation.

use super::{Association, BinaryOp, Choice, EvalMode, Expr, UnaryOp, evaluate};
use crate::error::{Error, Result, eval_bail};
use crate::lookup::{self, AdaSymbolInfo, resolve_function, user_select_syms};
use crate::names::{self, RenamingKind};
use crate::session::Session;
use crate::symbols::{Domain, SymbolClass};
use crate::types::{TypeId, TypeKind};
use crate::value::Value;
use tracing::debug;

/// Resolved copy of `expr`. `expect` is the type the context requires,
/// used to choose among overloaded functions.
pub fn resolve(s: &mut Session, expr: &Expr, expect: Option<TypeId>) -> Result<Expr> {
    Ok(match expr {
        Expr::Name(name) => resolve_name(s, name, None, expect)?,
        Expr::Call { callee, args } => {
            let args = resolve_all(s, args)?;
            match &**callee {
                Expr::Name(name) => {
                    let argvals = arg_types(s, &args)?;
                    match resolve_name(s, name, Some(&argvals), expect)? {
                        Expr::Type(ty) if args.len() == 1 => {
                            let mut args = args;
                            Expr::Convert { ty, expr: Box::new(args.remove(0)) }
                        }
                        callee => Expr::Call { callee: Box::new(callee), args },
                    }
                }
                other => Expr::Call { callee: Box::new(resolve(s, other, None)?), args },
            }
        }
        Expr::Unary(op, operand) => {
            let operand = resolve(s, operand, None)?;
            match user_operator(s, unary_operator_name(*op), std::slice::from_ref(&operand), expect, |s, v| {
                possible_unary_user_operator(s, *op, &v[0])
            })? {
                Some(call) => call,
                None => Expr::Unary(*op, Box::new(operand)),
            }
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs = resolve(s, lhs, None)?;
            let rhs = resolve(s, rhs, None)?;
            let Some(opname) = binary_operator_name(*op) else {
                return Ok(Expr::Binary(*op, Box::new(lhs), Box::new(rhs)));
            };
            let operands = [lhs, rhs];
            match user_operator(s, opname, &operands, expect, |s, v| {
                possible_binary_user_operator(s, *op, &v[0], &v[1])
            })? {
                Some(call) => call,
                None => {
                    let [lhs, rhs] = operands;
                    Expr::Binary(*op, Box::new(lhs), Box::new(rhs))
                }
            }
        }
        Expr::InRange { value, low, high } => Expr::InRange {
            value: Box::new(resolve(s, value, None)?),
            low: Box::new(resolve(s, low, None)?),
            high: Box::new(resolve(s, high, None)?),
        },
        Expr::InType { value, ty } => Expr::InType { value: Box::new(resolve(s, value, None)?), ty: *ty },
        Expr::InBounds { value, array, dim } => Expr::InBounds {
            value: Box::new(resolve(s, value, None)?),
            array: Box::new(resolve(s, array, None)?),
            dim: *dim,
        },
        Expr::Attr { attr, prefix, args } => Expr::Attr {
            attr: *attr,
            prefix: Box::new(resolve_prefix(s, prefix)?),
            args: resolve_all(s, args)?,
        },
        Expr::Slice { array, low, high } => Expr::Slice {
            array: Box::new(resolve(s, array, None)?),
            low: Box::new(resolve(s, low, None)?),
            high: Box::new(resolve(s, high, None)?),
        },
        Expr::Field { record, name } => Expr::Field { record: Box::new(resolve(s, record, None)?), name: name.clone() },
        Expr::Deref(operand) => Expr::Deref(Box::new(resolve(s, operand, None)?)),
        Expr::Qualify { ty, expr } => Expr::Qualify { ty: *ty, expr: Box::new(resolve(s, expr, Some(*ty))?) },
        Expr::Convert { ty, expr } => Expr::Convert { ty: *ty, expr: Box::new(resolve(s, expr, None)?) },
        Expr::Aggregate(assocs) => Expr::Aggregate(resolve_associations(s, assocs)?),
        Expr::Assign { target, value } => {
            let target = resolve(s, target, None)?;
            let context = evaluate(s, &target, None, EvalMode::AvoidSideEffects).ok().map(|v| v.ty);
            Expr::Assign { target: Box::new(target), value: Box::new(resolve(s, value, context)?) }
        }
        Expr::Int(_)
        | Expr::Float(_)
        | Expr::Char(_)
        | Expr::Bool(_)
        | Expr::Str(_)
        | Expr::Var(_)
        | Expr::Type(_) => expr.clone(),
    })
}

fn resolve_all(s: &mut Session, exprs: &[Expr]) -> Result<Vec<Expr>> {
    exprs.iter().map(|e| resolve(s, e, None)).collect()
}

/// Attribute prefixes may name a type or a function without calling it.
fn resolve_prefix(s: &mut Session, prefix: &Expr) -> Result<Expr> {
    match prefix {
        Expr::Name(name) => match resolve_name(s, name, Some(&[]), None)? {
            Expr::Call { callee, args } if args.is_empty() => Ok(*callee),
            other => Ok(other),
        },
        other => resolve(s, other, None),
    }
}

fn resolve_associations(s: &mut Session, assocs: &[Association]) -> Result<Vec<Association>> {
    assocs
        .iter()
        .map(|assoc| {
            Ok(match assoc {
                Association::Positional(e) => Association::Positional(resolve(s, e, None)?),
                Association::Others(e) => Association::Others(resolve(s, e, None)?),
                Association::Named { choices, value } => Association::Named {
                    choices: choices
                        .iter()
                        .map(|c| {
                            Ok(match c {
                                Choice::Index(e) => Choice::Index(resolve(s, e, None)?),
                                Choice::Range(lo, hi) => Choice::Range(resolve(s, lo, None)?, resolve(s, hi, None)?),
                                Choice::Component(name) => Choice::Component(name.clone()),
                            })
                        })
                        .collect::<Result<_>>()?,
                    value: resolve(s, value, None)?,
                },
            })
        })
        .collect()
}

/// Values standing for the types of `args`, computed without side effects.
fn arg_types(s: &mut Session, args: &[Expr]) -> Result<Vec<Value>> {
    args.iter().map(|a| evaluate(s, a, None, EvalMode::AvoidSideEffects)).collect()
}

/// Expression for the entity `name` denotes. With `call_args`, the name is
/// the callee of a call with those arguments; otherwise a parameterless
/// function is called.
fn resolve_name(s: &mut Session, name: &str, call_args: Option<&[Value]>, expect: Option<TypeId>) -> Result<Expr> {
    let block = s.frame.block;
    let mut found = lookup::lookup_name(s, name, block, Domain::Var)?;
    if found.is_empty() {
        if let Some(ty) = names::encode(&names::fold_name(name)).ok().and_then(|n| lookup::find_type(s, &n)) {
            return Ok(Expr::Type(ty));
        }
        eval_bail!("No definition of \"{name}\" in current context.");
    }
    if found.len() > 1 {
        let has_objects = found.iter().any(|f| !s.symbols.symbol(f.symbol).is_typedef());
        if has_objects {
            found.retain(|f| !s.symbols.symbol(f.symbol).is_typedef());
        }
    }
    let chosen = if found.len() > 1 {
        let all_functions = found.iter().all(|f| {
            let sym = s.symbols.symbol(f.symbol);
            sym.is_function() || matches!(sym.class, SymbolClass::Constant { .. })
        });
        if all_functions {
            let args = call_args.unwrap_or(&[]);
            match resolve_function(s, &found, args, expect, name)? {
                Some(f) => f,
                None => eval_bail!("Could not find a match for {name}"),
            }
        } else {
            match user_select_syms(s, name, found, 1)?.into_iter().next() {
                Some(f) => f,
                None => eval_bail!("No definition of \"{name}\" in current context."),
            }
        }
    } else {
        found[0]
    };
    debug!("{name} resolves to {}", lookup::describe_symbol(s, &chosen));
    symbol_expr(s, chosen, call_args.is_some())
}

fn symbol_expr(s: &mut Session, info: AdaSymbolInfo, is_callee: bool) -> Result<Expr> {
    let sym = s.symbols.symbol(info.symbol);
    if sym.is_typedef() {
        return sym.ty.map(Expr::Type).ok_or_else(|| Error::eval("Attempt to use a type name as an expression"));
    }
    if let Some(renaming) = names::parse_renaming(&sym.linkage_name) {
        return expand_renaming(s, renaming, is_callee);
    }
    let is_function = sym.is_function()
        || sym.ty.is_some_and(|t| matches!(s.types.kind(s.types.check_typedef(t)), TypeKind::Function { .. }));
    if is_function && !is_callee {
        return Ok(Expr::Call { callee: Box::new(Expr::Var(info)), args: Vec::new() });
    }
    Ok(Expr::Var(info))
}

fn expand_renaming(s: &mut Session, renaming: names::RenamingInfo, is_callee: bool) -> Result<Expr> {
    let entity = renaming.renamed_entity;
    if renaming.kind == RenamingKind::Package {
        eval_bail!("Cannot use the package renaming {} as a value", names::decode(&entity));
    }
    let block = s.frame.block;
    let Some(target) = lookup::lookup_symbol_list(s, &entity, block, Domain::Var).into_iter().next() else {
        eval_bail!("Could not find renamed entity {}", names::decode(&entity));
    };
    if renaming.kind != RenamingKind::Object {
        return symbol_expr(s, target, is_callee);
    }
    let mut expr = symbol_expr(s, target, false)?;
    let mut rest = renaming.expression.as_str();
    while !rest.is_empty() {
        let Some(tail) = rest.strip_prefix('X') else {
            eval_bail!("Invalid renaming expression \"{}\"", renaming.expression);
        };
        let (kind, tail) = tail.split_at(tail.len().min(1));
        match kind {
            "A" => {
                expr = Expr::Deref(Box::new(expr));
                rest = tail;
            }
            "R" => {
                let (field, after) = split_token(tail);
                expr = Expr::Field { record: Box::new(expr), name: field.to_string() };
                rest = after;
            }
            "S" => {
                let (index, after) = split_token(tail);
                let index = renaming_index(s, index)?;
                expr = Expr::Call { callee: Box::new(expr), args: vec![index] };
                rest = after;
            }
            "L" => {
                let (low, after) = split_token(tail);
                let Some(high_part) = after.strip_prefix("XS") else {
                    eval_bail!("Invalid renaming expression \"{}\"", renaming.expression);
                };
                let (high, after) = split_token(high_part);
                let low = renaming_index(s, low)?;
                let high = renaming_index(s, high)?;
                expr = Expr::Slice { array: Box::new(expr), low: Box::new(low), high: Box::new(high) };
                rest = after;
            }
            _ => eval_bail!("Invalid renaming expression \"{}\"", renaming.expression),
        }
    }
    Ok(expr)
}

/// Split a renaming token at the `X` that starts the next one.
fn split_token(text: &str) -> (&str, &str) {
    let end = text.find('X').unwrap_or(text.len());
    text.split_at(end)
}

/// A subscript in a renaming: a literal number or the name of a variable.
fn renaming_index(s: &mut Session, token: &str) -> Result<Expr> {
    if let Ok(n) = token.parse::<i64>() {
        return Ok(Expr::Int(n));
    }
    if token.is_empty() {
        eval_bail!("Invalid renaming index");
    }
    let block = s.frame.block;
    match lookup::lookup_symbol_list(s, token, block, Domain::Var).into_iter().next() {
        Some(info) => Ok(Expr::Var(info)),
        None => Err(Error::eval(format!("Could not find renamed index {token}"))),
    }
}

fn binary_operator_name(op: BinaryOp) -> Option<&'static str> {
    Some(match op {
        BinaryOp::Add => "Oadd",
        BinaryOp::Sub => "Osubtract",
        BinaryOp::Mul => "Omultiply",
        BinaryOp::Div => "Odivide",
        BinaryOp::Rem => "Orem",
        BinaryOp::Mod => "Omod",
        BinaryOp::Exp => "Oexpon",
        BinaryOp::Eq => "Oeq",
        BinaryOp::Ne => "One",
        BinaryOp::Lt => "Olt",
        BinaryOp::Le => "Ole",
        BinaryOp::Gt => "Ogt",
        BinaryOp::Ge => "Oge",
        BinaryOp::And => "Oand",
        BinaryOp::Or => "Oor",
        BinaryOp::Xor => "Oxor",
        BinaryOp::AndThen | BinaryOp::OrElse => return None,
    })
}

fn unary_operator_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "Osubtract",
        UnaryOp::Plus => "Oadd",
        UnaryOp::Abs => "Oabs",
        UnaryOp::Not => "Onot",
    }
}

/// A user-defined operator declaration matching `operands`, as a call.
fn user_operator(
    s: &mut Session,
    opname: &str,
    operands: &[Expr],
    expect: Option<TypeId>,
    possible: impl Fn(&Session, &[Value]) -> bool,
) -> Result<Option<Expr>> {
    let candidates = lookup::lookup_symbol_list(s, opname, None, Domain::Var);
    if candidates.is_empty() {
        return Ok(None);
    }
    let argvals = arg_types(s, operands)?;
    if !possible(s, &argvals) {
        return Ok(None);
    }
    let Some(f) = resolve_function(s, &candidates, &argvals, expect, opname)? else {
        return Ok(None);
    };
    debug!("operator {opname} resolves to {}", lookup::describe_symbol(s, &f));
    Ok(Some(Expr::Call { callee: Box::new(Expr::Var(f)), args: operands.to_vec() }))
}

fn operand_type(s: &Session, v: &Value) -> TypeId {
    let ty = s.types.check_typedef(v.ty);
    match s.types.kind(ty) {
        TypeKind::Reference { target } => s.types.check_typedef(*target),
        _ => ty,
    }
}

fn is_numeric(s: &Session, ty: TypeId) -> bool {
    s.types.is_numeric(ty) || s.types.is_fixed_point(ty)
}

fn is_integer_like(s: &Session, ty: TypeId) -> bool {
    s.types.is_integral(ty) || matches!(s.types.kind(ty), TypeKind::Bool | TypeKind::Enum { .. })
}

/// Whether the builtin meaning of `op` cannot apply to these operands, so
/// that a user-defined operator may be meant.
fn possible_binary_user_operator(s: &Session, op: BinaryOp, l: &Value, r: &Value) -> bool {
    let (lt, rt) = (operand_type(s, l), operand_type(s, r));
    match op {
        BinaryOp::Add
        | BinaryOp::Sub
        | BinaryOp::Mul
        | BinaryOp::Div
        | BinaryOp::Rem
        | BinaryOp::Mod
        | BinaryOp::Exp => !(is_numeric(s, lt) && is_numeric(s, rt)),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => !(is_integer_like(s, lt) && is_integer_like(s, rt)),
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            !(s.types.is_scalar(lt) && s.types.is_scalar(rt))
        }
        BinaryOp::AndThen | BinaryOp::OrElse => false,
    }
}

fn possible_unary_user_operator(s: &Session, op: UnaryOp, v: &Value) -> bool {
    let ty = operand_type(s, v);
    match op {
        UnaryOp::Neg | UnaryOp::Plus | UnaryOp::Abs => !is_numeric(s, ty),
        UnaryOp::Not => !is_integer_like(s, ty),
    }
}
