use crate::error::{Error, Result};
use crate::names::FixedPointInfo;
use crate::types::{TypeId, TypeTable};

fn info(types: &TypeTable, ty: TypeId) -> Result<&FixedPointInfo> {
    match types.fixed_point_info(ty) {
        Some(Some(info)) => Ok(info),
        Some(None) => Err(Error::DebugInfo(format!(
            "unreadable fixed-point scale in type {}",
            types.display_name(ty)
        ))),
        None => Err(Error::eval(format!("{} is not a fixed-point type", types.display_name(ty)))),
    }
}

/// The type's `'Small`: the value of one unit of its integer representation.
pub fn scaling_factor(types: &TypeTable, ty: TypeId) -> Result<f64> {
    Ok(info(types, ty)?.scaling_factor())
}

/// The type's `'Delta`.
pub fn delta(types: &TypeTable, ty: TypeId) -> Result<f64> {
    Ok(info(types, ty)?.delta())
}

pub fn fixed_to_float(types: &TypeTable, ty: TypeId, raw: i64) -> Result<f64> {
    Ok(raw as f64 * scaling_factor(types, ty)?)
}

/// Nearest representable integer, with halves rounded away from zero.
pub fn float_to_fixed(types: &TypeTable, ty: TypeId, x: f64) -> Result<i64> {
    Ok((x / scaling_factor(types, ty)?).round() as i64)
}
