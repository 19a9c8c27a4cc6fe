//! A bytecode interpreter, sign-abstract interpreter, syntactic hinter and
//! fuzz loop over decompiled-class method bodies (spec §1–§9). The concrete
//! and abstract interpreters share one opcode set (`bytecode::Instr`) and
//! differ only in which step function walks it.

pub mod bytecode;
pub mod error;
pub mod frame;
pub mod fuzz;
pub mod heap;
pub mod hinter;
pub mod interp;
pub mod method;
pub mod sign;
pub mod value;
pub mod worklist;

use std::collections::HashSet;
use std::rc::Rc;

use bytecode::MethodResolver;
use bytecode::cache::BytecodeCache;
use error::ImplementationBug;
use heap::Heap;
use interp::abstract_step::{AbstractState, AbstractValue};
use method::MethodId;
use sign::SignSet;
use value::InputValue;

/// Run `entry` concretely with `args` bound to its parameters, returning
/// the two-line stdout contract (spec §6): the terminal outcome's display
/// string, and the comma-joined instruction-offset trace.
pub fn run_and_report<R: MethodResolver>(
    cache: &mut BytecodeCache<R>,
    entry: MethodId,
    args: &[InputValue],
    budget: usize,
) -> Result<(String, String), ImplementationBug> {
    let mut heap = Heap::new();
    let (outcome, trace) = interp::concrete::run(cache, &mut heap, entry, args, budget)?;
    let trace_line = trace.iter().map(usize::to_string).collect::<Vec<_>>().join(",");
    Ok((outcome.to_string(), trace_line))
}

/// Abstract an already-parsed argument into the sign domain: primitives
/// abstract to their sign class, everything heap-allocated (strings,
/// arrays, objects) abstracts to an opaque reference (spec §4.F: string
/// and array contents are never modeled).
pub fn abstract_value_of(v: &InputValue) -> AbstractValue {
    match v {
        InputValue::Int(i) => AbstractValue::Sign(SignSet::from_int(*i)),
        InputValue::Float(f) => AbstractValue::Sign(SignSet::from_float(*f)),
        InputValue::Boolean(b) => AbstractValue::Sign(SignSet::from_bool(*b)),
        InputValue::Char(c) => AbstractValue::Sign(SignSet::from_int(*c as i32)),
        InputValue::Str(_) | InputValue::Array(_, _) | InputValue::Null => AbstractValue::Reference,
    }
}

/// Run the sign-abstract interpreter over `entry` to exhaustion, seeding
/// its parameters from parsed argument values (see [`abstract_value_of`]).
/// Returns every distinct terminal outcome reachable, `"*"` standing in
/// for budget exhaustion.
pub fn run_sign<R: MethodResolver>(
    cache: &mut BytecodeCache<R>,
    entry: MethodId,
    args: &[InputValue],
    budget: usize,
) -> Result<HashSet<String>, ImplementationBug> {
    let values: Vec<AbstractValue> = args.iter().map(abstract_value_of).collect();
    let initial = AbstractState::seed_values(Rc::new(entry), &values);
    worklist::run_all(cache, initial, budget)
}

/// End-to-end tests against the public API: the six concrete scenarios,
/// each built as a hand-written `Instr` vector run through an in-memory
/// resolver, and the soundness property (a concrete outcome is always
/// covered by the abstract outcome set seeded from the same inputs, or by
/// `"*"`).
#[cfg(test)]
mod tests {
    use super::*;
    use bytecode::{BinOp, Cond, InMemoryResolver, Instr, Kind};
    use error::RunOutcome;
    use fuzz::{FuzzCampaign, FuzzConfig};
    use value::Value;

    fn cache_with(method: &MethodId, code: Vec<Instr>) -> BytecodeCache<InMemoryResolver> {
        let mut resolver = InMemoryResolver::new();
        resolver.insert(method.clone(), code);
        BytecodeCache::new(resolver)
    }

    /// `C.assertPositive:(I)V` asserting `x > 0`.
    #[test]
    fn scenario_1_assert_positive() {
        let method = MethodId::parse("C.assertPositive:(I)V").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Ifz(Cond::Gt, 4),
            Instr::New("java.lang.AssertionError".to_string()),
            Instr::Throw,
            Instr::Return(Kind::Void),
        ];
        let mut cache = cache_with(&method, code);
        let mut heap = Heap::new();

        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method.clone(), &[InputValue::Int(1)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Ok);

        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method.clone(), &[InputValue::Int(0)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::AssertionError);

        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method, &[InputValue::Int(-3)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::AssertionError);
    }

    /// `C.safeDiv:(II)I` returning `a/b` with a `b == 0` precheck, and the
    /// same division with the precheck removed.
    #[test]
    fn scenario_2_safe_div() {
        let method = MethodId::parse("C.safeDiv:(II)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 1),
            Instr::Ifz(Cond::Ne, 4),
            Instr::Push(Value::Int(1)),
            Instr::Return(Kind::Int),
            Instr::Load(Kind::Int, 0),
            Instr::Load(Kind::Int, 1),
            Instr::Binary(Kind::Int, BinOp::Div),
            Instr::Return(Kind::Int),
        ];
        let mut cache = cache_with(&method, code);
        let mut heap = Heap::new();

        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method.clone(), &[InputValue::Int(6), InputValue::Int(2)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Ok);

        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method, &[InputValue::Int(6), InputValue::Int(0)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Ok);

        let unchecked = MethodId::parse("C.div:(II)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Load(Kind::Int, 1),
            Instr::Binary(Kind::Int, BinOp::Div),
            Instr::Return(Kind::Int),
        ];
        let mut cache = cache_with(&unchecked, code);
        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, unchecked, &[InputValue::Int(6), InputValue::Int(0)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::DivideByZero);
    }

    /// `C.testEqual:(I)Ljava/lang/String;` returning a string literal when
    /// `x == 7`; the returned string is the terminal outcome's display line.
    #[test]
    fn scenario_3_string_return() {
        let method = MethodId::parse("C.testEqual:(I)Ljava.lang.String;").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Push(Value::Int(7)),
            Instr::If(Cond::Eq, 5),
            Instr::Push(Value::Int(0)),
            Instr::Return(Kind::Int),
            Instr::PushString("seven".to_string()),
            Instr::Return(Kind::Reference),
        ];
        let mut cache = cache_with(&method, code);
        let mut heap = Heap::new();

        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method, &[InputValue::Int(7)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Returned("seven".to_string()));
        assert_eq!(outcome.to_string(), "seven");
    }

    /// `C.sumLoop:(I)I`, an infinite loop, with a 1000-instruction budget.
    #[test]
    fn scenario_4_budget_exhaustion() {
        let method = MethodId::parse("C.sumLoop:(I)I").unwrap();
        let code = vec![Instr::Goto(0)];
        let mut cache = cache_with(&method, code);
        let mut heap = Heap::new();

        let (outcome, trace) = interp::concrete::run(&mut cache, &mut heap, method, &[InputValue::Int(2000)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Budget);
        assert_eq!(outcome.to_string(), "*");
        assert_eq!(trace.len(), 1000);
    }

    /// A fuzz campaign against a single-int-parameter method with an
    /// `if (x == 42)` branch: the syntactic hinter's first seed is `42`, and
    /// coverage of the equal branch is reached within the seeded iterations.
    #[test]
    fn scenario_5_fuzz_seed_hits_equal_branch() {
        let method = MethodId::parse("C.checkAnswer:(I)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Push(Value::Int(42)),
            Instr::If(Cond::Eq, 5),
            Instr::Push(Value::Int(0)),
            Instr::Return(Kind::Int),
            Instr::Push(Value::Int(1)),
            Instr::Return(Kind::Int),
        ];
        let mut cache = cache_with(&method, code.clone());

        let seeds = hinter::hint(&method, &code);
        assert_eq!(seeds[0], vec![InputValue::Int(42)]);

        let total_offsets = code.len();
        let mut campaign = FuzzCampaign::new(Some(0), FuzzConfig::default());
        let report = campaign
            .run(&method.params, seeds.clone(), total_offsets, |input| {
                let mut heap = Heap::new();
                interp::concrete::run(&mut cache, &mut heap, method.clone(), input, 1000)
            })
            .unwrap();

        let equal_branch_offset = 5;
        let hit_by_seeding = report
            .logs
            .iter()
            .take(seeds.len())
            .any(|log| log.new_edges && log.input == vec![InputValue::Int(42)]);
        assert!(hit_by_seeding, "seed 0 should have driven the equal branch");
        assert!(equal_branch_offset < total_offsets);
    }

    /// `a[3]` on `a = [I: 1, 2]` is out of bounds; on `a = null` it's a
    /// null pointer.
    #[test]
    fn scenario_6_array_access() {
        let method = MethodId::parse("C.access:([I)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Reference, 0),
            Instr::Push(Value::Int(3)),
            Instr::ArrayLoad(Kind::Int),
            Instr::Return(Kind::Int),
        ];
        let mut cache = cache_with(&method, code);
        let mut heap = Heap::new();

        let array = InputValue::Array(method::Type::Int, vec![InputValue::Int(1), InputValue::Int(2)]);
        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method.clone(), &[array], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::OutOfBounds);

        let (outcome, _) = interp::concrete::run(&mut cache, &mut heap, method, &[InputValue::Null], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::NullPointer);
    }

    /// Soundness: a handful of hand-built, primitive-only methods replayed
    /// concretely over a grid of concrete inputs must have every outcome
    /// covered by one abstract run seeded from those inputs' sign
    /// abstractions (or `"*"`). Array accesses are excluded: the
    /// sign-abstract interpreter never models array bounds or null checks
    /// (`ArrayLoad`/`ArrayStore` always continue), so no soundness property
    /// holds for them.
    fn check_sound(method: &MethodId, code: Vec<Instr>, inputs: &[Vec<InputValue>]) {
        let mut cache = cache_with(method, code);
        for args in inputs {
            let mut heap = Heap::new();
            let (concrete_outcome, _) = interp::concrete::run(&mut cache, &mut heap, method.clone(), args, 1000).unwrap();
            let abstract_outcomes = run_sign(&mut cache, method.clone(), args, 1000).unwrap();
            let rendered = concrete_outcome.to_string();
            assert!(
                abstract_outcomes.contains(&rendered) || abstract_outcomes.contains("*"),
                "concrete outcome {:?} for {:?} not covered by abstract outcomes {:?}",
                rendered,
                args,
                abstract_outcomes
            );
        }
    }

    #[test]
    fn assert_positive_is_sound() {
        let method = MethodId::parse("C.assertPositive:(I)V").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Ifz(Cond::Gt, 4),
            Instr::New("java.lang.AssertionError".to_string()),
            Instr::Throw,
            Instr::Return(Kind::Void),
        ];
        let inputs: Vec<Vec<InputValue>> = (-3..=3).map(|i| vec![InputValue::Int(i)]).collect();
        check_sound(&method, code, &inputs);
    }

    #[test]
    fn safe_div_is_sound() {
        let method = MethodId::parse("C.safeDiv:(II)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 1),
            Instr::Ifz(Cond::Ne, 4),
            Instr::Push(Value::Int(1)),
            Instr::Return(Kind::Int),
            Instr::Load(Kind::Int, 0),
            Instr::Load(Kind::Int, 1),
            Instr::Binary(Kind::Int, BinOp::Div),
            Instr::Return(Kind::Int),
        ];
        let inputs = vec![
            vec![InputValue::Int(6), InputValue::Int(2)],
            vec![InputValue::Int(6), InputValue::Int(0)],
            vec![InputValue::Int(-4), InputValue::Int(-2)],
            vec![InputValue::Int(0), InputValue::Int(5)],
        ];
        check_sound(&method, code, &inputs);
    }

    #[test]
    fn unchecked_div_is_sound() {
        let method = MethodId::parse("C.div:(II)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Load(Kind::Int, 1),
            Instr::Binary(Kind::Int, BinOp::Div),
            Instr::Return(Kind::Int),
        ];
        let inputs = vec![
            vec![InputValue::Int(6), InputValue::Int(2)],
            vec![InputValue::Int(6), InputValue::Int(0)],
            vec![InputValue::Int(-6), InputValue::Int(3)],
        ];
        check_sound(&method, code, &inputs);
    }
}
