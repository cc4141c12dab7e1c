use super::*;
use crate::config::EngineConfig;
use crate::symbols::{Domain, Symbol, SymbolClass, SymbolTable};
use crate::target::MemoryTarget;
use crate::types::{Bound, EnumLiteral, Field, TypeDesc, TypeTable};

struct Fixture {
    s: Session,
    byte: TypeId,
    money: TypeId,
}

fn words(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn fixture() -> Fixture {
    let mut types = TypeTable::new();
    let int = types.builtins().integer;
    let index = types.add(TypeDesc::named(
        "pck__index",
        TypeKind::Range { base: int, low: Bound::Static(1), high: Bound::Static(4) },
        4,
    ));
    let arr = types.add(TypeDesc::named(
        "pck__arr_t",
        TypeKind::Array { element: int, index, element_bitsize: 0 },
        16,
    ));
    let rec = types.add(TypeDesc::named(
        "pck__rec",
        TypeKind::Struct { fields: vec![Field::new("a", 0, int), Field::new("b", 32, int), Field::new("c", 64, int)] },
        12,
    ));
    let color = types.add(TypeDesc::named(
        "pck__color",
        TypeKind::Enum {
            literals: vec![
                EnumLiteral { name: "pck__red".into(), value: 1 },
                EnumLiteral { name: "pck__green".into(), value: 2 },
                EnumLiteral { name: "pck__blue".into(), value: 4 },
            ],
        },
        1,
    ));
    let byte = types.add(TypeDesc::named("pck__byte", TypeKind::Modular { modulus: 256 }, 1));
    let money = types.add(TypeDesc::named("pck__money___XF_1_100", TypeKind::Int { signed: true }, 4));
    let int_ptr = types.create_pointer(int);
    let unary_fn = types.add(TypeDesc::new(None, TypeKind::Function { ret: Some(int), params: vec![int] }, 1));
    let rec_op = types.add(TypeDesc::new(None, TypeKind::Function { ret: Some(int), params: vec![rec, rec] }, 1));

    let mut symbols = SymbolTable::new();
    let g = symbols.global_block();
    let stat = |address| SymbolClass::Static { address };
    symbols.add_symbol(g, Symbol::new("pck__arr", Domain::Var, stat(0x1000), Some(arr)));
    symbols.add_symbol(g, Symbol::new("pck__rec_obj", Domain::Var, stat(0x2000), Some(rec)));
    symbols.add_symbol(g, Symbol::new("pck__x", Domain::Var, stat(0x3000), Some(int)));
    symbols.add_symbol(g, Symbol::new("pck__p", Domain::Var, stat(0x3100), Some(int_ptr)));
    symbols.add_symbol(g, Symbol::new("pck__ghost", Domain::Var, stat(0x9000), Some(int)));
    symbols.add_symbol(g, Symbol::new("pck__color", Domain::Var, SymbolClass::Typedef, Some(color)));
    symbols.add_symbol(g, Symbol::new("pck__byte", Domain::Var, SymbolClass::Typedef, Some(byte)));
    for (name, value) in [("pck__red", 1), ("pck__green", 2), ("pck__blue", 4)] {
        symbols.add_symbol(g, Symbol::new(name, Domain::Var, SymbolClass::Constant { value }, Some(color)));
    }
    symbols.add_symbol(g, Symbol::new("pck__double", Domain::Var, SymbolClass::Function { entry: 0x500 }, Some(unary_fn)));
    symbols.add_symbol(g, Symbol::new("pck__Oadd", Domain::Var, SymbolClass::Function { entry: 0x600 }, Some(rec_op)));
    symbols.add_symbol(
        g,
        Symbol::new("pck__alias___XR_pck__rec_obj___XEXRb", Domain::Var, stat(0), Some(int)),
    );

    let mut target = MemoryTarget::new();
    target.map(0x1000, words(&[10, 20, 30, 40]));
    target.map(0x2000, words(&[1, 2, 3]));
    target.map(0x3000, words(&[5]));
    target.map(0x3100, 0x3000u64.to_le_bytes().to_vec());
    target.set_call_result(0x500, 42i32.to_le_bytes().to_vec());
    target.set_call_result(0x600, 99i32.to_le_bytes().to_vec());

    let s = Session::new(types, symbols, EngineConfig::default()).with_target(target);
    Fixture { s, byte, money }
}

fn eval(s: &mut Session, expr: &Expr) -> Result<Value> {
    evaluate_expression(s, expr, None, EvalMode::Normal)
}

fn long(s: &mut Session, expr: &Expr) -> i64 {
    let v = eval(s, expr).unwrap();
    s.value_as_long(&v).unwrap()
}

fn err(s: &mut Session, expr: &Expr) -> String {
    eval(s, expr).unwrap_err().to_string()
}

fn int(n: i64) -> Expr {
    Expr::Int(n)
}

fn bin(op: BinaryOp, l: Expr, r: Expr) -> Expr {
    Expr::binary(op, l, r)
}

#[test]
fn integer_arithmetic_follows_ada_rules() {
    let mut f = fixture();
    let s = &mut f.s;
    assert_eq!(long(s, &bin(BinaryOp::Add, int(2), bin(BinaryOp::Mul, int(3), int(4)))), 14);
    assert_eq!(long(s, &bin(BinaryOp::Mod, int(-7), int(3))), 2);
    assert_eq!(long(s, &bin(BinaryOp::Rem, int(-7), int(3))), -1);
    assert_eq!(long(s, &bin(BinaryOp::Exp, int(2), int(10))), 1024);
    assert_eq!(long(s, &Expr::unary(UnaryOp::Abs, int(-9))), 9);
    assert_eq!(err(s, &bin(BinaryOp::Div, int(7), int(0))), "Division by zero");
    let sum = eval(s, &bin(BinaryOp::Add, Expr::Float(1.5), int(1))).unwrap();
    assert_eq!(s.value_as_double(&sum).unwrap(), 2.5);
}

#[test]
fn modular_arithmetic_wraps() {
    let mut f = fixture();
    let s = &mut f.s;
    let byte = |n| Expr::call(Expr::name("byte"), vec![int(n)]);
    assert_eq!(long(s, &bin(BinaryOp::Add, byte(250), byte(10))), 4);
    assert_eq!(long(s, &Expr::unary(UnaryOp::Not, byte(0))), 255);
    let v = eval(s, &byte(300)).unwrap();
    assert_eq!(v.ty, f.byte);
    assert_eq!(s.value_as_long(&v).unwrap(), 44);
}

#[test]
fn modular_operand_keeps_its_type_against_wider_integers() {
    let mut f = fixture();
    let s = &mut f.s;
    let byte = |n| Expr::call(Expr::name("byte"), vec![int(n)]);
    let sum = eval(s, &bin(BinaryOp::Add, byte(250), int(10))).unwrap();
    assert_eq!(sum.ty, f.byte);
    assert_eq!(s.value_as_long(&sum).unwrap(), 4);
    let sum = eval(s, &bin(BinaryOp::Add, int(10), byte(250))).unwrap();
    assert_eq!(sum.ty, f.byte);
    assert_eq!(s.value_as_long(&sum).unwrap(), 4);
    assert_eq!(long(s, &bin(BinaryOp::Sub, byte(3), int(5))), 254);
    assert_eq!(long(s, &bin(BinaryOp::Mul, byte(16), int(17))), 16);
}

#[test]
fn short_circuit_skips_the_right_operand() {
    let mut f = fixture();
    let s = &mut f.s;
    let boom = bin(BinaryOp::Eq, bin(BinaryOp::Div, int(1), int(0)), int(1));
    assert_eq!(long(s, &bin(BinaryOp::AndThen, Expr::Bool(false), boom.clone())), 0);
    assert_eq!(long(s, &bin(BinaryOp::OrElse, Expr::Bool(true), boom.clone())), 1);
    assert_eq!(err(s, &bin(BinaryOp::And, Expr::Bool(false), boom)), "Division by zero");
}

#[test]
fn arrays_index_slice_and_report_bounds() {
    let mut f = fixture();
    let s = &mut f.s;
    let arr = || Expr::name("arr");
    assert_eq!(long(s, &Expr::call(arr(), vec![int(3)])), 30);
    assert_eq!(err(s, &Expr::call(arr(), vec![int(5)])), "no such vector element");
    assert_eq!(long(s, &Expr::attr(Attribute::First, arr(), vec![])), 1);
    assert_eq!(long(s, &Expr::attr(Attribute::Last, arr(), vec![])), 4);
    assert_eq!(long(s, &Expr::attr(Attribute::Length, arr(), vec![])), 4);
    assert_eq!(
        err(s, &Expr::attr(Attribute::Length, arr(), vec![int(2)])),
        "invalid dimension number to 'length"
    );

    let slice = Expr::slice(arr(), int(2), int(3));
    assert_eq!(long(s, &Expr::attr(Attribute::Length, slice.clone(), vec![])), 2);
    assert_eq!(long(s, &Expr::attr(Attribute::First, slice.clone(), vec![])), 2);
    assert_eq!(long(s, &Expr::call(slice, vec![int(3)])), 30);
    assert_eq!(long(s, &Expr::attr(Attribute::Length, Expr::slice(arr(), int(3), int(2)), vec![])), 0);
    assert_eq!(err(s, &Expr::slice(arr(), int(0), int(2))), "slice out of range");
}

#[test]
fn repeated_evaluations_do_not_grow_the_type_table() {
    let mut f = fixture();
    let s = &mut f.s;
    let length = Expr::attr(Attribute::Length, Expr::slice(Expr::name("arr"), int(2), int(3)), vec![]);
    assert_eq!(long(s, &length), 2);
    assert_eq!(long(s, &length), 2);
    let settled = s.types.len();
    for _ in 0..10 {
        assert_eq!(long(s, &length), 2);
        assert_eq!(s.types.len(), settled);
    }
}

#[test]
fn strings_compare_by_contents() {
    let mut f = fixture();
    let s = &mut f.s;
    let text = |t: &str| Expr::Str(t.to_string());
    assert_eq!(long(s, &bin(BinaryOp::Eq, text("abc"), text("abc"))), 1);
    assert_eq!(long(s, &bin(BinaryOp::Ne, text("abc"), text("abd"))), 1);
    assert_eq!(long(s, &Expr::attr(Attribute::Length, text("hello"), vec![])), 5);
    assert_eq!(err(s, &bin(BinaryOp::Eq, text("ab"), int(1))), "Attempt to compare array with non-array");
}

#[test]
fn enumeration_positions_and_values() {
    let mut f = fixture();
    let s = &mut f.s;
    let color = || Expr::name("color");
    assert_eq!(long(s, &Expr::attr(Attribute::Pos, color(), vec![Expr::name("green")])), 1);
    assert_eq!(long(s, &Expr::attr(Attribute::Val, color(), vec![int(2)])), 4);
    assert_eq!(long(s, &Expr::attr(Attribute::First, color(), vec![])), 1);
    assert_eq!(err(s, &Expr::attr(Attribute::Val, color(), vec![int(3)])), "argument to 'VAL out of range");
    assert_eq!(
        err(s, &Expr::attr(Attribute::Length, color(), vec![])),
        "the 'length attribute applies only to array types"
    );
}

#[test]
fn assignment_writes_through_to_the_target() {
    let mut f = fixture();
    let s = &mut f.s;
    let x = || Expr::name("x");
    assert_eq!(long(s, &Expr::assign(x(), bin(BinaryOp::Add, x(), int(1)))), 6);
    assert_eq!(long(s, &x()), 6);
    assert_eq!(s.read_memory(0x3000, 4).unwrap(), 6i32.to_le_bytes());
    assert_eq!(err(s, &Expr::assign(int(1), int(2))), "Left operand of assignment is not a modifiable lvalue.");
}

#[test]
fn record_aggregates_fill_named_and_other_components() {
    let mut f = fixture();
    let s = &mut f.s;
    let obj = || Expr::name("rec_obj");
    let aggregate = Expr::Aggregate(vec![
        Association::Positional(int(7)),
        Association::Named { choices: vec![Choice::Component("c".into())], value: int(9) },
        Association::Others(int(0)),
    ]);
    eval(s, &Expr::assign(obj(), aggregate)).unwrap();
    assert_eq!(s.read_memory(0x2000, 12).unwrap(), words(&[7, 0, 9]));
    assert_eq!(long(s, &Expr::field(obj(), "c")), 9);

    let misplaced = Expr::Aggregate(vec![Association::Others(int(0)), Association::Positional(int(1))]);
    assert_eq!(err(s, &Expr::assign(obj(), misplaced)), "Misplaced 'others' clause");
    let unknown = Expr::Aggregate(vec![Association::Named { choices: vec![Choice::Component("zz".into())], value: int(1) }]);
    assert_eq!(err(s, &Expr::assign(obj(), unknown)), "Unknown component name: zz");
}

#[test]
fn array_aggregates_cover_ranges() {
    let mut f = fixture();
    let s = &mut f.s;
    let aggregate = Expr::Aggregate(vec![
        Association::Named { choices: vec![Choice::Range(int(2), int(3))], value: int(1) },
        Association::Others(int(5)),
    ]);
    eval(s, &Expr::assign(Expr::name("arr"), aggregate)).unwrap();
    assert_eq!(s.read_memory(0x1000, 16).unwrap(), words(&[5, 1, 1, 5]));

    let outside = Expr::Aggregate(vec![Association::Named { choices: vec![Choice::Index(int(7))], value: int(1) }]);
    assert_eq!(
        err(s, &Expr::assign(Expr::name("arr"), outside)),
        "Index in component association out of bounds."
    );

    let extra = Expr::Aggregate((0..5).map(|n| Association::Positional(int(n))).collect());
    eval(s, &Expr::assign(Expr::name("arr"), extra)).unwrap();
    assert_eq!(s.warnings.messages(), ["Extra components in aggregate ignored."]);
}

#[test]
fn calls_go_to_the_target_unless_side_effects_are_avoided() {
    let mut f = fixture();
    let s = &mut f.s;
    let call = Expr::call(Expr::name("double"), vec![int(21)]);
    assert_eq!(long(s, &call), 42);
    let typed = evaluate_expression(s, &call, None, EvalMode::AvoidSideEffects).unwrap();
    assert_eq!(typed.ty, s.types.builtins().integer);
    assert_eq!(s.value_as_long(&typed).unwrap(), 0);
}

#[test]
fn user_defined_operators_replace_builtin_ones() {
    let mut f = fixture();
    let s = &mut f.s;
    let obj = || Expr::name("rec_obj");
    assert_eq!(long(s, &bin(BinaryOp::Add, obj(), obj())), 99);
    // numeric operands keep the predefined meaning
    assert_eq!(long(s, &bin(BinaryOp::Add, int(1), int(1))), 2);
}

#[test]
fn object_renamings_expand_to_their_expression() {
    let mut f = fixture();
    let s = &mut f.s;
    assert_eq!(long(s, &Expr::name("alias")), 2);
}

#[test]
fn membership_tests() {
    let mut f = fixture();
    let s = &mut f.s;
    let in_range = |v, lo, hi| Expr::InRange { value: Box::new(int(v)), low: Box::new(int(lo)), high: Box::new(int(hi)) };
    assert_eq!(long(s, &in_range(3, 1, 4)), 1);
    assert_eq!(long(s, &in_range(5, 1, 4)), 0);
    assert_eq!(long(s, &Expr::InType { value: Box::new(int(300)), ty: f.byte }), 0);
    let long_float = s.types.builtins().long_float;
    assert_eq!(long(s, &Expr::InType { value: Box::new(Expr::Float(1.0)), ty: long_float }), 1);
    assert_eq!(s.warnings.messages(), ["Membership test incompletely implemented; always returns true"]);
    let in_bounds = Expr::InBounds { value: Box::new(int(4)), array: Box::new(Expr::name("arr")), dim: 1 };
    assert_eq!(long(s, &in_bounds), 1);
}

#[test]
fn fixed_point_values_scale_and_keep_their_type() {
    let mut f = fixture();
    let s = &mut f.s;
    let money = f.money;
    let amount = Expr::Convert { ty: money, expr: Box::new(Expr::Float(1.5)) };
    assert_eq!(long(s, &amount), 150);
    let small = eval(s, &Expr::attr(Attribute::Small, Expr::Type(money), vec![])).unwrap();
    assert_eq!(s.value_as_double(&small).unwrap(), 0.01);
    assert_eq!(long(s, &bin(BinaryOp::Add, amount.clone(), amount.clone())), 300);
    assert_eq!(
        err(s, &bin(BinaryOp::Sub, amount, int(1))),
        "Operands of fixed-point subtraction must have the same type"
    );
}

#[test]
fn dereference_and_addresses() {
    let mut f = fixture();
    let s = &mut f.s;
    assert_eq!(long(s, &Expr::Deref(Box::new(Expr::name("p")))), 5);
    assert_eq!(long(s, &Expr::attr(Attribute::Address, Expr::name("x"), vec![])), 0x3000);
    assert_eq!(
        err(s, &Expr::Deref(Box::new(Expr::Bool(true)))),
        "Attempt to take contents of a non-pointer value."
    );
    assert_eq!(
        err(s, &Expr::attr(Attribute::Address, int(3), vec![])),
        "Attempt to take address of value not located in memory."
    );
}

#[test]
fn avoiding_side_effects_reads_nothing() {
    let mut f = fixture();
    let s = &mut f.s;
    let v = evaluate_expression(s, &Expr::name("ghost"), None, EvalMode::AvoidSideEffects).unwrap();
    assert_eq!(v.ty, s.types.builtins().integer);
    assert!(eval(s, &Expr::name("ghost")).and_then(|v| s.value_as_long(&v)).is_err());
    assert_eq!(err(s, &Expr::name("nowhere")), "No definition of \"nowhere\" in current context.");
}
