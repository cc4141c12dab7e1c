//! Exception catchpoint support.
//!
//! Locates the runtime routines a breakpoint must be planted on to stop when
//! an exception is raised, and builds the condition that restricts the stop
//! to one named exception.

use crate::error::{Error, Result};
use crate::lookup;
use crate::session::Session;
use serde::Serialize;
use tracing::debug;

/// What a catchpoint stops on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CatchKind {
    /// Any exception raise, optionally filtered by name.
    #[value(alias = "all")]
    Exception,
    /// Exceptions with no handler.
    Unhandled,
    /// Failed `pragma Assert`.
    Assert,
}

impl CatchKind {
    fn description(self) -> &'static str {
        match self {
            CatchKind::Exception => "exception",
            CatchKind::Unhandled => "unhandled exception",
            CatchKind::Assert => "failed assertion",
        }
    }
}

/// Symbol names of one runtime generation.
struct RuntimeSymbols {
    exception: &'static str,
    unhandled: &'static str,
    assert: &'static str,
}

impl RuntimeSymbols {
    fn routine(&self, kind: CatchKind) -> &'static str {
        match kind {
            CatchKind::Exception => self.exception,
            CatchKind::Unhandled => self.unhandled,
            CatchKind::Assert => self.assert,
        }
    }
}

/// Hooks exported by current runtimes.
const CURRENT_RUNTIME: RuntimeSymbols = RuntimeSymbols {
    exception: "__gnat_debug_raise_exception",
    unhandled: "__gnat_unhandled_exception",
    assert: "__gnat_debug_raise_assert_failure",
};

/// Routines older runtimes raise through.
const LEGACY_RUNTIME: RuntimeSymbols = RuntimeSymbols {
    exception: "__gnat_raise_nodefer_with_msg",
    unhandled: "__gnat_unhandled_terminate",
    assert: "system__assertions__raise_assert_failure",
};

/// Predefined exceptions, always looked up in package Standard.
const STANDARD_EXCEPTIONS: &[&str] = &[
    "constraint_error",
    "program_error",
    "storage_error",
    "tasking_error",
    "numeric_error",
];

/// Where to stop and under which condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatchpointLocation {
    pub kind: CatchKind,
    pub routine: String,
    pub address: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Resolve the runtime routine for `kind` and, when `exception` names a
/// specific exception, the condition selecting it.
pub fn catchpoint_location(s: &Session, kind: CatchKind, exception: Option<&str>) -> Result<CatchpointLocation> {
    let (routine, address) = [CURRENT_RUNTIME, LEGACY_RUNTIME]
        .iter()
        .map(|runtime| runtime.routine(kind))
        .find_map(|name| lookup::lookup_minimal_symbol(s, name).map(|address| (name, address)))
        .ok_or_else(|| {
            Error::eval(format!(
                "Unable to insert catchpoint. Is this an Ada main program? (no {} support routine found)",
                kind.description()
            ))
        })?;
    debug!("{} catchpoint on {routine} at {address:#x}", kind.description());

    let condition = match (kind, exception) {
        (CatchKind::Exception, Some(name)) if !name.trim().is_empty() => Some(exception_condition(name.trim())),
        (_, Some(_)) if kind != CatchKind::Exception => {
            return Err(Error::eval(format!(
                "an exception name is only meaningful when catching raised exceptions, not a {}",
                kind.description()
            )));
        }
        _ => None,
    };

    Ok(CatchpointLocation {
        kind,
        routine: routine.to_string(),
        address,
        condition,
    })
}

/// Condition comparing the raised occurrence with exception `name`.
pub fn exception_condition(name: &str) -> String {
    format!("long_integer (e) = long_integer (&{})", qualified_exception_name(name))
}

fn qualified_exception_name(name: &str) -> String {
    if STANDARD_EXCEPTIONS.iter().any(|e| e.eq_ignore_ascii_case(name)) {
        format!("standard.{}", name.to_ascii_lowercase())
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::symbols::SymbolTable;
    use crate::types::TypeTable;

    fn session(minimal: &[(&str, u64)]) -> Session {
        let mut symbols = SymbolTable::new();
        for (name, address) in minimal {
            symbols.add_minimal_symbol(name, *address);
        }
        Session::new(TypeTable::new(), symbols, EngineConfig::default())
    }

    #[test]
    fn prefers_current_runtime_hooks() {
        let s = session(&[
            ("__gnat_debug_raise_exception", 0x1000),
            ("__gnat_raise_nodefer_with_msg", 0x2000),
        ]);
        let loc = catchpoint_location(&s, CatchKind::Exception, None).unwrap();
        assert_eq!(loc.routine, "__gnat_debug_raise_exception");
        assert_eq!(loc.address, 0x1000);
        assert_eq!(loc.condition, None);
    }

    #[test]
    fn falls_back_to_legacy_runtime() {
        let s = session(&[("__gnat_unhandled_terminate", 0x2400)]);
        let loc = catchpoint_location(&s, CatchKind::Unhandled, None).unwrap();
        assert_eq!(loc.routine, "__gnat_unhandled_terminate");
        assert_eq!(loc.address, 0x2400);
    }

    #[test]
    fn missing_runtime_is_an_error() {
        let s = session(&[("__gnat_debug_raise_exception", 0x1000)]);
        let err = catchpoint_location(&s, CatchKind::Assert, None).unwrap_err();
        assert!(err.to_string().contains("failed assertion"));
        assert!(!err.is_internal());
    }

    #[test]
    fn named_exception_builds_condition() {
        let s = session(&[("__gnat_debug_raise_exception", 0x1000)]);
        let loc = catchpoint_location(&s, CatchKind::Exception, Some("pck.my_error")).unwrap();
        assert_eq!(loc.condition.as_deref(), Some("long_integer (e) = long_integer (&pck.my_error)"));
    }

    #[test]
    fn standard_exceptions_are_qualified() {
        assert_eq!(
            exception_condition("Constraint_Error"),
            "long_integer (e) = long_integer (&standard.constraint_error)"
        );
        assert_eq!(qualified_exception_name("my_error"), "my_error");
    }

    #[test]
    fn exception_name_rejected_for_assertions() {
        let s = session(&[("__gnat_debug_raise_assert_failure", 0x3000)]);
        assert!(catchpoint_location(&s, CatchKind::Assert, Some("program_error")).is_err());
    }
}
