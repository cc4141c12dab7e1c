use super::{Association, Choice, EvalMode, Expr, evaluate, ops};
use crate::codec;
use crate::descriptor;
use crate::error::{Error, Result, eval_bail};
use crate::fixing::{search_struct_field, to_fixed_range_type, value_subscript_packed};
use crate::lookup;
use crate::session::Session;
use crate::symbols::Domain;
use crate::types::{TypeId, TypeKind};
use crate::value::Value;
use tracing::trace;

/// Index space of an aggregate's target: array positions, or the ordinal
/// of each visible record component.
enum Target {
    Array { element: TypeId, low: i64, high: i64 },
    Record { components: Vec<String> },
}

impl Target {
    fn bounds(&self) -> (i64, i64) {
        match self {
            Target::Array { low, high, .. } => (*low, *high),
            Target::Record { components } => (0, components.len() as i64 - 1),
        }
    }
}

/// Fill `container` from `assocs` and return the updated (unwritten) value.
/// Components not mentioned keep their previous contents.
pub(super) fn assign_aggregate(
    s: &mut Session,
    container: Value,
    assocs: &[Association],
    mode: EvalMode,
) -> Result<Value> {
    if !container.modifiable {
        eval_bail!("Left operand of assignment is not a modifiable lvalue.");
    }
    let mut container = s.fetched(&container)?;
    let ty = s.types.check_typedef(container.ty);
    let target = match s.types.kind(ty).clone() {
        TypeKind::Array { element, index, .. } => {
            let (low, high) = match s.types.discrete_bounds(index) {
                Some(bounds) => bounds,
                None => {
                    let fixed = to_fixed_range_type(s, index, None)?;
                    s.types.discrete_bounds(fixed).unwrap_or((0, -1))
                }
            };
            Target::Array { element, low, high }
        }
        TypeKind::Struct { .. } => Target::Record { components: visible_components(s, ty) },
        _ => eval_bail!("Left-hand side must be array or record."),
    };
    let (low, high) = target.bounds();
    trace!("aggregate over {low} .. {high}");

    let mut covered: Vec<(i64, i64)> = Vec::new();
    let mut next = low;
    for (i, assoc) in assocs.iter().enumerate() {
        match assoc {
            Association::Positional(expr) => {
                let ind = next;
                next += 1;
                if ind > high {
                    if ind == high + 1 {
                        s.warn("Extra components in aggregate ignored.");
                    }
                    continue;
                }
                assign_component(s, &mut container, &target, ind, expr, mode)?;
                add_interval(&mut covered, ind, ind);
            }
            Association::Named { choices, value } => {
                for choice in choices {
                    let (lo, hi) = choice_bounds(s, &target, choice)?;
                    if lo < low || hi > high {
                        eval_bail!("Index in component association out of bounds.");
                    }
                    for ind in lo..=hi {
                        assign_component(s, &mut container, &target, ind, value, mode)?;
                    }
                    add_interval(&mut covered, lo, hi);
                }
            }
            Association::Others(expr) => {
                if i + 1 != assocs.len() {
                    eval_bail!("Misplaced 'others' clause");
                }
                for (lo, hi) in gaps(&covered, low, high) {
                    for ind in lo..=hi {
                        assign_component(s, &mut container, &target, ind, expr, mode)?;
                    }
                }
            }
        }
    }
    Ok(container)
}

/// Names of the components a record aggregate can mention, in order.
/// Wrapper components (parents and variant branches) are flattened and
/// compiler-generated ones skipped.
fn visible_components(s: &Session, ty: TypeId) -> Vec<String> {
    let mut out = Vec::new();
    for field in s.types.get(s.types.check_typedef(ty)).fields() {
        let field_ty = s.types.check_typedef(field.ty);
        if descriptor::is_wrapper_field(&field.name) && s.types.is_struct(field_ty) {
            out.extend(visible_components(s, field_ty));
        } else if !field.name.is_empty() && !field.name.starts_with('_') {
            out.push(field.name.clone());
        }
    }
    out
}

fn choice_bounds(s: &mut Session, target: &Target, choice: &Choice) -> Result<(i64, i64)> {
    match choice {
        Choice::Index(expr) => {
            let v = evaluate(s, expr, None, EvalMode::Normal)?;
            let n = s.value_as_long(&v)?;
            Ok((n, n))
        }
        Choice::Range(lo, hi) => {
            let lo = evaluate(s, lo, None, EvalMode::Normal)?;
            let hi = evaluate(s, hi, None, EvalMode::Normal)?;
            Ok((s.value_as_long(&lo)?, s.value_as_long(&hi)?))
        }
        Choice::Component(name) => match target {
            Target::Record { components } => {
                let Some(pos) = components.iter().position(|c| c.eq_ignore_ascii_case(name)) else {
                    eval_bail!("Unknown component name: {name}");
                };
                Ok((pos as i64, pos as i64))
            }
            Target::Array { .. } => {
                let block = s.frame.block;
                let Some(info) = lookup::lookup_name(s, name, block, Domain::Var)?.into_iter().next() else {
                    eval_bail!("No definition of \"{name}\" in current context.");
                };
                let v = lookup::symbol_value(s, info.symbol)?;
                let n = s.value_as_long(&v)?;
                Ok((n, n))
            }
        },
    }
}

/// Component `ind` of `container`, sharing its contents and offsets.
fn component_at(s: &mut Session, container: &Value, target: &Target, ind: i64) -> Result<Value> {
    match target {
        Target::Array { element, low, .. } => {
            if s.types.array_element_bitsize(container.ty) > 0 {
                return value_subscript_packed(s, container, &[ind]);
            }
            let stride = s.types.length(s.types.check_typedef(*element));
            Ok(container.component(&s.types, *element, (ind - low) as u64 * stride))
        }
        Target::Record { components } => {
            let name = &components[ind as usize];
            search_struct_field(s, name, container, container.ty)?
                .ok_or_else(|| Error::internal(format!("component {name} vanished from its record")))
        }
    }
}

fn assign_component(
    s: &mut Session,
    container: &mut Value,
    target: &Target,
    ind: i64,
    expr: &Expr,
    mode: EvalMode,
) -> Result<()> {
    let component = component_at(s, container, target, ind)?;
    let new_value = match expr {
        Expr::Aggregate(inner) => assign_aggregate(s, component.clone(), inner, mode)?,
        _ if mode != EvalMode::Normal => return Ok(()),
        _ => {
            let v = evaluate(s, expr, Some(component.ty), EvalMode::Normal)?;
            let v = ops::value_cast(s, component.ty, v)?;
            s.fetched(&v)?
        }
    };
    codec::assign_packed_component(&s.types, container, &component, &new_value, s.bits_big_endian())
}

/// Insert `lo .. hi` into the sorted, disjoint list of covered intervals.
fn add_interval(covered: &mut Vec<(i64, i64)>, lo: i64, hi: i64) {
    let mut merged = (lo, hi);
    covered.retain(|&(a, b)| {
        let overlaps = a <= merged.1.saturating_add(1) && merged.0 <= b.saturating_add(1);
        if overlaps {
            merged = (merged.0.min(a), merged.1.max(b));
        }
        !overlaps
    });
    let pos = covered.partition_point(|&(a, _)| a < merged.0);
    covered.insert(pos, merged);
}

/// Sub-ranges of `low .. high` not in `covered`.
fn gaps(covered: &[(i64, i64)], low: i64, high: i64) -> Vec<(i64, i64)> {
    let mut out = Vec::new();
    let mut from = low;
    for &(a, b) in covered {
        if a > from {
            out.push((from, (a - 1).min(high)));
        }
        from = from.max(b.saturating_add(1));
    }
    if from <= high {
        out.push((from, high));
    }
    out
}
