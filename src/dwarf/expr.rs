use gimli::{AttributeValue, DebuggingInformationEntry, EvaluationResult, Expression, Operation, Unit};

use super::{attr, read_u64_from_attr};
use crate::error::Result;
use crate::loader::DwarfSlice;
use crate::symbols::SymbolClass;

/// Byte offset of a member within its record, from `DW_AT_data_member_location`.
pub fn member_location(
    unit: &Unit<DwarfSlice<'_>>,
    entry: &DebuggingInformationEntry<DwarfSlice<'_>>,
) -> Result<Option<u64>> {
    match attr(entry, gimli::DW_AT_data_member_location) {
        Some(AttributeValue::Exprloc(expr)) => {
            if let Some(offset) = try_simple_offset(expr.clone(), unit.encoding()) {
                return Ok(Some(offset));
            }
            Ok(evaluate_member_offset(expr, unit.encoding()))
        }
        other => Ok(read_u64_from_attr(other)),
    }
}

/// Evaluates simple DWARF expressions to compute member offsets.
fn evaluate_member_offset(expr: Expression<DwarfSlice<'_>>, encoding: gimli::Encoding) -> Option<u64> {
    let mut eval = expr.evaluation(encoding);
    eval.set_initial_value(0);

    loop {
        match eval.evaluate().ok()? {
            EvaluationResult::Complete => {
                let result = eval.result();
                return match result.first()?.location {
                    gimli::Location::Address { address } => Some(address),
                    gimli::Location::Value { value } => {
                        let addr_mask = match encoding.address_size {
                            8 => !0u64,
                            size @ 1..8 => (1u64 << (size * 8)) - 1,
                            _ => return None,
                        };
                        value.to_u64(addr_mask).ok()
                    }
                    _ => None,
                };
            }
            EvaluationResult::RequiresRelocatedAddress(addr) => {
                eval.resume_with_relocated_address(addr).ok()?;
            }
            _ => return None,
        }
    }
}

/// Try to extract a simple constant offset from an expression.
/// This handles common cases: DW_OP_plus_uconst N or DW_OP_constu N
fn try_simple_offset(expr: Expression<DwarfSlice<'_>>, encoding: gimli::Encoding) -> Option<u64> {
    let mut ops = expr.operations(encoding);

    let value = match ops.next().ok().flatten()? {
        Operation::PlusConstant { value } => value,
        Operation::UnsignedConstant { value } => value,
        _ => return None,
    };

    if ops.next().ok().flatten().is_some() {
        return None;
    }

    Some(value)
}

/// Storage class of a variable or parameter described by a single-operation
/// location: a static address, a frame-base offset or a register.
/// More complex locations are reported as `None`.
pub fn location_class(
    expr: Expression<DwarfSlice<'_>>,
    encoding: gimli::Encoding,
    is_parameter: bool,
) -> Option<SymbolClass> {
    let mut ops = expr.operations(encoding);
    let class = match ops.next().ok().flatten()? {
        Operation::Address { address } => SymbolClass::Static { address },
        Operation::FrameOffset { offset } if is_parameter => SymbolClass::Argument { frame_offset: offset },
        Operation::FrameOffset { offset } => SymbolClass::Computed { frame_offset: offset },
        Operation::Register { register } => SymbolClass::Register { regnum: register.0 as u32 },
        _ => return None,
    };
    if ops.next().ok().flatten().is_some() {
        return None;
    }
    Some(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gimli::{EndianSlice, RunTimeEndian};

    fn encoding() -> gimli::Encoding {
        gimli::Encoding { format: gimli::Format::Dwarf32, version: 4, address_size: 8 }
    }

    fn expression(bytes: &[u8]) -> Expression<DwarfSlice<'_>> {
        Expression(EndianSlice::new(bytes, RunTimeEndian::Little))
    }

    #[test]
    fn plus_uconst_is_a_simple_offset() {
        // DW_OP_plus_uconst 16
        assert_eq!(try_simple_offset(expression(&[0x23, 0x10]), encoding()), Some(16));
    }

    #[test]
    fn addr_is_a_static_location() {
        // DW_OP_addr 0x1000
        let bytes = [0x03, 0x00, 0x10, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            location_class(expression(&bytes), encoding(), false),
            Some(SymbolClass::Static { address: 0x1000 })
        );
    }

    #[test]
    fn fbreg_depends_on_parameter_role() {
        // DW_OP_fbreg -20
        let bytes = [0x91, 0x6c];
        assert_eq!(
            location_class(expression(&bytes), encoding(), true),
            Some(SymbolClass::Argument { frame_offset: -20 })
        );
        assert_eq!(
            location_class(expression(&bytes), encoding(), false),
            Some(SymbolClass::Computed { frame_offset: -20 })
        );
    }

    #[test]
    fn composite_locations_are_not_classified() {
        // DW_OP_fbreg 0; DW_OP_deref
        assert_eq!(location_class(expression(&[0x91, 0x00, 0x06]), encoding(), false), None);
    }
}
