use super::{AdaSymbolInfo, describe_symbol};
use crate::config::OverloadPolicy;
use crate::descriptor;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::symbols::SymbolClass;
use crate::types::{TypeId, TypeKind, TypeTable};
use crate::value::Value;
use std::collections::VecDeque;
use std::mem::discriminant;
use tracing::debug;

/// Answer to an overload menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Cancel,
    /// Every listed candidate; only valid when the menu offers it.
    All,
    /// Zero-based indices into the listed candidates.
    Pick(Vec<usize>),
}

/// Interactive chooser consulted when overloads remain ambiguous.
pub trait OverloadSelector {
    fn select(&mut self, name: &str, choices: &[String], allow_all: bool) -> Result<Selection>;
}

/// Selector replaying canned answers. Runs out into `Cancel`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedSelector {
    answers: VecDeque<Selection>,
    /// Menus shown so far, one entry per prompt.
    pub shown: Vec<Vec<String>>,
}

impl ScriptedSelector {
    pub fn new(answers: impl IntoIterator<Item = Selection>) -> Self {
        Self { answers: answers.into_iter().collect(), shown: Vec::new() }
    }
}

impl OverloadSelector for ScriptedSelector {
    fn select(&mut self, _name: &str, choices: &[String], _allow_all: bool) -> Result<Selection> {
        self.shown.push(choices.to_vec());
        Ok(self.answers.pop_front().unwrap_or(Selection::Cancel))
    }
}

fn peel_reference(types: &TypeTable, ty: TypeId) -> TypeId {
    let ty = types.check_typedef(ty);
    match types.kind(ty) {
        TypeKind::Reference { target } => types.check_typedef(*target),
        _ => ty,
    }
}

fn is_discrete_kind(kind: &TypeKind) -> bool {
    matches!(
        kind,
        TypeKind::Int { .. } | TypeKind::Enum { .. } | TypeKind::Range { .. } | TypeKind::Modular { .. } | TypeKind::Bool
    )
}

/// Whether an actual of type `actual` may be passed for a formal of type
/// `formal`. With `may_deref`, an access formal also accepts the
/// designated object itself.
pub fn type_match(types: &TypeTable, formal: TypeId, actual: TypeId, may_deref: bool) -> bool {
    let formal = peel_reference(types, formal);
    let actual = peel_reference(types, actual);
    let fk = types.kind(formal);
    let ak = types.kind(actual);
    match fk {
        TypeKind::Pointer { target: ft } => match ak {
            TypeKind::Pointer { target: at } => type_match(types, *ft, *at, false),
            _ => may_deref && type_match(types, *ft, actual, false),
        },
        k if is_discrete_kind(k) => is_discrete_kind(ak),
        TypeKind::Array { .. } => types.is_array(actual) || descriptor::is_array_descriptor_type(types, actual),
        TypeKind::Struct { .. } => {
            if descriptor::is_array_descriptor_type(types, formal) {
                types.is_array(actual) || descriptor::is_array_descriptor_type(types, actual)
            } else {
                types.is_struct(actual) && !descriptor::is_array_descriptor_type(types, actual)
            }
        }
        _ => discriminant(fk) == discriminant(ak),
    }
}

/// Whether `candidate` can be called with `args`. Enumeration literals
/// behave as parameterless functions.
pub fn args_match(s: &Session, candidate: &AdaSymbolInfo, args: &[Value]) -> bool {
    let types = &s.types;
    let sym = s.symbols.symbol(candidate.symbol);
    let Some(ty) = sym.ty.map(|t| types.check_typedef(t)) else {
        return false;
    };
    match types.kind(ty) {
        TypeKind::Enum { .. } if matches!(sym.class, SymbolClass::Constant { .. }) => args.is_empty(),
        TypeKind::Function { params, .. } => {
            params.len() == args.len()
                && params.iter().zip(args).all(|(&formal, arg)| type_match(types, formal, arg.ty, true))
        }
        _ => false,
    }
}

/// Whether a subprogram of type `func_type` can deliver a result usable
/// where `context` is expected. Without a context any value-returning
/// subprogram fits; an enumeration result must match the context exactly.
pub fn return_match(types: &TypeTable, func_type: Option<TypeId>, context: Option<TypeId>) -> bool {
    let Some(func_type) = func_type.map(|t| types.check_typedef(t)) else {
        return true;
    };
    let return_type = match types.kind(func_type) {
        TypeKind::Function { ret: Some(ret), .. } => types.base_type(*ret),
        TypeKind::Function { ret: None, .. } => types.builtins().void,
        _ => types.base_type(func_type),
    };
    let return_type = types.check_typedef(return_type);
    let context = context.map(|c| types.check_typedef(types.base_type(c)));
    let rk = types.kind(return_type);
    if types.is_enum(return_type) {
        return context.is_none_or(|c| c == return_type);
    }
    match context {
        None => !matches!(rk, TypeKind::Void),
        Some(c) => discriminant(rk) == discriminant(types.kind(c)),
    }
}

/// The candidate `name` denotes in a call with `args`, or `None` when no
/// candidate accepts them. Candidates whose result suits `context` are
/// preferred; remaining ambiguity is settled by the overload policy.
pub fn resolve_function(
    s: &mut Session,
    candidates: &[AdaSymbolInfo],
    args: &[Value],
    context: Option<TypeId>,
    name: &str,
) -> Result<Option<AdaSymbolInfo>> {
    let mut matches = Vec::new();
    for fallback in [false, true] {
        matches = candidates
            .iter()
            .filter(|c| {
                args_match(s, c, args)
                    && (fallback || return_match(&s.types, s.symbols.symbol(c.symbol).ty, context))
            })
            .copied()
            .collect();
        if !matches.is_empty() {
            break;
        }
    }
    debug!("{name}: {} of {} candidates accept {} arguments", matches.len(), candidates.len(), args.len());
    Ok(user_select_syms(s, name, matches, 1)?.into_iter().next())
}

/// Narrow `candidates` to at most `max_results` entries according to the
/// configured overload policy, consulting the selector for menus.
pub fn user_select_syms(
    s: &mut Session,
    name: &str,
    mut candidates: Vec<AdaSymbolInfo>,
    max_results: usize,
) -> Result<Vec<AdaSymbolInfo>> {
    if candidates.len() <= 1 {
        return Ok(candidates);
    }
    candidates.sort_by(|a, b| {
        let na = &s.symbols.symbol(a.symbol).natural_name;
        let nb = &s.symbols.symbol(b.symbol).natural_name;
        na.cmp(nb).then(a.symbol.cmp(&b.symbol))
    });
    let ambiguous = || Error::eval(format!("Multiple matches for {name}"));
    match s.config.overload_policy {
        OverloadPolicy::First => {
            candidates.truncate(1);
            Ok(candidates)
        }
        OverloadPolicy::All => {
            candidates.truncate(max_results.max(1));
            Ok(candidates)
        }
        OverloadPolicy::Error => Err(ambiguous()),
        OverloadPolicy::Menu => {
            let choices: Vec<String> = candidates.iter().map(|c| describe_symbol(s, c)).collect();
            let allow_all = max_results > 1;
            let Some(selector) = s.selector_mut() else {
                return Err(ambiguous());
            };
            match selector.select(name, &choices, allow_all)? {
                Selection::Cancel => Err(Error::Cancelled),
                Selection::All if allow_all => {
                    candidates.truncate(max_results);
                    Ok(candidates)
                }
                Selection::All => Err(Error::eval("Invalid choice: \"all\" is not offered here.")),
                Selection::Pick(picks) if picks.is_empty() => Err(Error::Cancelled),
                Selection::Pick(mut picks) => {
                    picks.dedup();
                    if picks.len() > max_results {
                        return Err(Error::eval(format!("Select no more than {max_results} of the above")));
                    }
                    picks
                        .into_iter()
                        .map(|i| candidates.get(i).copied().ok_or_else(|| Error::eval("Index out of range")))
                        .collect()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::symbols::{Domain, Symbol, SymbolTable};
    use crate::types::TypeDesc;

    struct Overloads {
        session: Session,
        f_int: AdaSymbolInfo,
        f_float: AdaSymbolInfo,
    }

    fn overloads(policy: OverloadPolicy) -> Overloads {
        let mut types = TypeTable::new();
        let b = types.builtins();
        let by_int = types.add(TypeDesc::new(None, TypeKind::Function { ret: Some(b.integer), params: vec![b.integer] }, 1));
        let by_float =
            types.add(TypeDesc::new(None, TypeKind::Function { ret: Some(b.float), params: vec![b.float] }, 1));
        let mut symbols = SymbolTable::new();
        let g = symbols.global_block();
        let fi = symbols.add_symbol(g, Symbol::new("pck__f", Domain::Var, SymbolClass::Function { entry: 0x100 }, Some(by_int)));
        let ff =
            symbols.add_symbol(g, Symbol::new("pck__f__2", Domain::Var, SymbolClass::Function { entry: 0x200 }, Some(by_float)));
        let config = EngineConfig { overload_policy: policy, ..EngineConfig::default() };
        Overloads {
            session: Session::new(types, symbols, config),
            f_int: AdaSymbolInfo { symbol: fi, block: g },
            f_float: AdaSymbolInfo { symbol: ff, block: g },
        }
    }

    #[test]
    fn integer_argument_selects_integer_overload() {
        let Overloads { mut session, f_int, f_float } = overloads(OverloadPolicy::Error);
        let int = session.types.builtins().integer;
        let arg = session.value_from_long(int, 3);
        for order in [[f_int, f_float], [f_float, f_int]] {
            let chosen = resolve_function(&mut session, &order, std::slice::from_ref(&arg), None, "f").unwrap();
            assert_eq!(chosen, Some(f_int));
        }
    }

    #[test]
    fn no_candidate_accepts_a_record() {
        let Overloads { mut session, f_int, f_float } = overloads(OverloadPolicy::Error);
        let rec = session.types.add(TypeDesc::named("pck__r", TypeKind::Struct { fields: vec![] }, 0));
        let arg = Value::from_bytes(rec, vec![]);
        assert_eq!(resolve_function(&mut session, &[f_int, f_float], &[arg], None, "f").unwrap(), None);
    }

    #[test]
    fn context_type_prefers_matching_result() {
        let Overloads { mut session, .. } = overloads(OverloadPolicy::Error);
        let b = session.types.builtins();
        let to_float = session.types.add(TypeDesc::new(None, TypeKind::Function { ret: Some(b.float), params: vec![] }, 1));
        let to_int = session.types.add(TypeDesc::new(None, TypeKind::Function { ret: Some(b.integer), params: vec![] }, 1));
        let g = session.symbols.global_block();
        let z_float = session.symbols.add_symbol(
            g,
            Symbol::new("pck__z", Domain::Var, SymbolClass::Function { entry: 0x300 }, Some(to_float)),
        );
        let z_int = session.symbols.add_symbol(
            g,
            Symbol::new("pck__z__2", Domain::Var, SymbolClass::Function { entry: 0x400 }, Some(to_int)),
        );
        let cands = [AdaSymbolInfo { symbol: z_float, block: g }, AdaSymbolInfo { symbol: z_int, block: g }];
        let chosen = resolve_function(&mut session, &cands, &[], Some(b.integer), "z").unwrap();
        assert_eq!(chosen.map(|c| c.symbol), Some(z_int));
        assert!(resolve_function(&mut session, &cands, &[], None, "z").is_err());
    }

    #[test]
    fn menu_policy_consults_selector() {
        let Overloads { session, f_int, f_float } = overloads(OverloadPolicy::Menu);
        let mut session = session.with_selector(ScriptedSelector::new([Selection::Pick(vec![1]), Selection::Cancel]));
        let picked = user_select_syms(&mut session, "f", vec![f_float, f_int], 1).unwrap();
        assert_eq!(picked, vec![f_float]);
        let err = user_select_syms(&mut session, "f", vec![f_int, f_float], 1).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn menu_without_selector_is_an_error() {
        let Overloads { mut session, f_int, f_float } = overloads(OverloadPolicy::Menu);
        let err = user_select_syms(&mut session, "f", vec![f_int, f_float], 1).unwrap_err();
        assert_eq!(err.to_string(), "Multiple matches for f");
        session.config.overload_policy = OverloadPolicy::First;
        assert_eq!(user_select_syms(&mut session, "f", vec![f_float, f_int], 1).unwrap(), vec![f_int]);
    }

    #[test]
    fn discrete_types_are_interchangeable() {
        let mut types = TypeTable::new();
        let b = types.builtins();
        let small = types.create_range(b.integer, 0, 9);
        let ptr = types.create_pointer(b.integer);
        assert!(type_match(&types, b.integer, small, true));
        assert!(type_match(&types, b.boolean, b.integer, true));
        assert!(!type_match(&types, b.float, b.integer, true));
        assert!(type_match(&types, ptr, b.integer, true));
        assert!(!type_match(&types, ptr, b.integer, false));
        assert!(return_match(&types, None, Some(b.float)));
    }
}
