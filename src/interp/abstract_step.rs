//! # Abstract Step (spec §4.F)
//!
//! Same opcode repertoire as [`crate::interp::concrete`], stepped over
//! sign-abstract frames instead of concrete ones. A step produces zero or
//! more successor states plus zero or more terminal outcome strings —
//! mirrors `signInterpreter.py::step`'s generator, which `yield`s either an
//! `AState` or a terminal string, sometimes both for the same opcode (a
//! division whose divisor set contains zero yields "divide by zero" *and*
//! continues with the nonzero fragment).

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::{BinOp, Cond, Instr, Kind, MethodResolver};
use crate::bytecode::cache::BytecodeCache;
use crate::error::ImplementationBug;
use crate::interp::concrete::resolve;
use crate::method::MethodId;
use crate::sign::{Arithmetic, SignSet};
use crate::value::Value;

/// One abstract operand: a sign set for primitives, or an opaque reference
/// for anything heap-allocated. References carry no further information —
/// per §4.F, string (and array) contents are never modeled abstractly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AbstractValue {
    Sign(SignSet),
    Reference,
}

impl AbstractValue {
    fn sign(&self, method: &MethodId, pc: usize) -> Result<SignSet, ImplementationBug> {
        match self {
            AbstractValue::Sign(s) => Ok(*s),
            AbstractValue::Reference => Err(ImplementationBug::new(
                "expected a sign-abstract value, found a reference",
                method.to_string(),
                pc,
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AbstractFrame {
    pub method: Rc<MethodId>,
    pub locals: HashMap<u32, AbstractValue>,
    pub stack: Vec<AbstractValue>,
    pub pc: usize,
}

impl AbstractFrame {
    pub fn new(method: Rc<MethodId>) -> AbstractFrame {
        AbstractFrame {
            method,
            locals: HashMap::new(),
            stack: Vec::new(),
            pc: 0,
        }
    }

    fn push(&mut self, v: AbstractValue) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> Option<AbstractValue> {
        self.stack.pop()
    }
}

/// A worklist entry: a stack of call frames, innermost last.
#[derive(Clone, Debug)]
pub struct AbstractState {
    pub frames: Vec<AbstractFrame>,
}

impl AbstractState {
    pub fn seed(method: Rc<MethodId>, args: &[SignSet]) -> AbstractState {
        let mut frame = AbstractFrame::new(method);
        for (i, s) in args.iter().enumerate() {
            frame.locals.insert(i as u32, AbstractValue::Sign(*s));
        }
        AbstractState { frames: vec![frame] }
    }

    /// Like [`Self::seed`], but for entry methods whose parameters mix
    /// primitives with strings/arrays/objects — those bind to an opaque
    /// [`AbstractValue::Reference`] rather than a sign set.
    pub fn seed_values(method: Rc<MethodId>, args: &[AbstractValue]) -> AbstractState {
        let mut frame = AbstractFrame::new(method);
        for (i, v) in args.iter().enumerate() {
            frame.locals.insert(i as u32, *v);
        }
        AbstractState { frames: vec![frame] }
    }

    fn current(&self) -> &AbstractFrame {
        self.frames.last().expect("abstract state has no frames")
    }

    fn current_mut(&mut self) -> &mut AbstractFrame {
        self.frames.last_mut().expect("abstract state has no frames")
    }
}

/// What one abstract step produced: a successor state to keep exploring,
/// or a terminal outcome string. A single step may produce both kinds at
/// once (see module docs).
pub enum AbstractOutcome {
    Next(AbstractState),
    Terminal(String),
}

fn bug(method: &MethodId, pc: usize, msg: impl Into<String>) -> ImplementationBug {
    ImplementationBug::new(msg, method.to_string(), pc)
}

/// Apply one opcode to `state`, returning every successor/outcome it
/// produces. Consumes `state` since most opcodes return exactly one
/// successor built by mutating a single clone.
pub fn step<R: MethodResolver>(
    cache: &mut BytecodeCache<R>,
    state: AbstractState,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let method = Rc::clone(&state.current().method);
    let pc = state.current().pc;
    let code = resolve(cache, &method)?;
    if pc >= code.len() {
        return Err(bug(&method, pc, "program counter out of range"));
    }
    let instr = code[pc].clone();

    match instr {
        Instr::Push(v) => {
            let mut next = state;
            let value = match v {
                Value::Int(i) => AbstractValue::Sign(SignSet::from_int(i)),
                Value::Float(f) => AbstractValue::Sign(SignSet::from_float(f)),
                Value::Boolean(b) => AbstractValue::Sign(SignSet::from_bool(b)),
                Value::Char(c) => AbstractValue::Sign(SignSet::from_int(c as i32)),
                Value::Reference(_) => AbstractValue::Reference,
            };
            let frame = next.current_mut();
            frame.push(value);
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::PushString(_) => {
            let mut next = state;
            let frame = next.current_mut();
            frame.push(AbstractValue::Reference);
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Load(kind, i) => {
            let local = *state
                .current()
                .locals
                .get(&i)
                .ok_or_else(|| bug(&method, pc, format!("local {} not bound", i)))?;
            if kind == Kind::Reference || matches!(local, AbstractValue::Reference) {
                return Ok(vec![AbstractOutcome::Terminal("string detected".to_string())]);
            }
            let mut next = state;
            let frame = next.current_mut();
            frame.push(local);
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Store(_, i) => {
            let mut next = state;
            let frame = next.current_mut();
            let v = frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on store"))?;
            frame.locals.insert(i, v);
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Dup => {
            let mut next = state;
            let frame = next.current_mut();
            let v = *frame.stack.last().ok_or_else(|| bug(&method, pc, "stack underflow on dup"))?;
            frame.push(v);
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Binary(_, op) => binary(state, &method, pc, op),
        Instr::CompareFloating { .. } => compare_floating(state, &method, pc),
        Instr::Incr(i, c) => {
            let mut next = state;
            let frame = next.current_mut();
            let current = frame
                .locals
                .get(&i)
                .ok_or_else(|| bug(&method, pc, format!("local {} not bound", i)))?
                .sign(&method, pc)?;
            frame.locals.insert(i, AbstractValue::Sign(Arithmetic::add(current, SignSet::from_int(c))));
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::CastIntToShort => {
            // The sign-abstract domain cannot distinguish a truncated value
            // from its original; leave the stack untouched, same as
            // `signInterpreter.py`'s `Cast` case.
            let mut next = state;
            next.current_mut().pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Ifz(cond, target) => ifz(state, &method, pc, cond, target),
        Instr::If(cond, target) => if_(state, &method, pc, cond, target),
        Instr::Goto(target) => {
            let mut next = state;
            next.current_mut().pc = target;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Return(kind) => return_(state, &method, pc, kind),
        Instr::New(_) => {
            let mut next = state;
            let frame = next.current_mut();
            frame.push(AbstractValue::Reference);
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Get(_) => {
            let mut next = state;
            let frame = next.current_mut();
            frame.push(AbstractValue::Sign(SignSet::ZERO));
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::Throw => Ok(vec![AbstractOutcome::Terminal("assertion error".to_string())]),
        Instr::InvokeStatic(target) => invoke_static(state, &method, pc, &target),
        Instr::InvokeSpecial(target) => invoke_special(state, &method, pc, &target),
        Instr::InvokeVirtual(target) => {
            let mut next = state;
            let frame = next.current_mut();
            for _ in 0..target.params.len() + 1 {
                frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on invokevirtual"))?;
            }
            Ok(vec![AbstractOutcome::Terminal("string detected".to_string())])
        }
        Instr::InvokeDynamic { descriptor, .. } => {
            let n = crate::method::count_operands(&descriptor)
                .ok_or_else(|| bug(&method, pc, format!("malformed invokedynamic descriptor {}", descriptor)))?;
            let mut next = state;
            let frame = next.current_mut();
            for _ in 0..n {
                frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on invokedynamic"))?;
            }
            Ok(vec![AbstractOutcome::Terminal("string detected".to_string())])
        }
        Instr::NewArray(_, _) => new_array(state, &method, pc),
        Instr::ArrayStore(_) => {
            let mut next = state;
            let frame = next.current_mut();
            frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on arraystore value"))?;
            frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on arraystore index"))?;
            frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on arraystore receiver"))?;
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::ArrayLoad(kind) => {
            let mut next = state;
            let frame = next.current_mut();
            frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on arrayload index"))?;
            frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on arrayload receiver"))?;
            let value = if kind == Kind::Reference {
                AbstractValue::Reference
            } else {
                AbstractValue::Sign(SignSet::NEG | SignSet::ZERO | SignSet::POS)
            };
            frame.push(value);
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
        Instr::ArrayLength => {
            let mut next = state;
            let frame = next.current_mut();
            frame.pop().ok_or_else(|| bug(&method, pc, "stack underflow on arraylength"))?;
            frame.push(AbstractValue::Sign(SignSet::ZERO | SignSet::POS));
            frame.pc += 1;
            Ok(vec![AbstractOutcome::Next(next)])
        }
    }
}

fn binary(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
    op: BinOp,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let frame = state.current_mut();
    let v2 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on binary rhs"))?;
    let v1 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on binary lhs"))?;
    let s1 = v1.sign(method, pc)?;
    let s2 = v2.sign(method, pc)?;

    let mut outcomes = Vec::new();
    match op {
        BinOp::Add => push_and_continue(state, Arithmetic::add(s1, s2), &mut outcomes),
        BinOp::Sub => push_and_continue(state, Arithmetic::subtract(s1, s2), &mut outcomes),
        BinOp::Mul => push_and_continue(state, Arithmetic::multiply(s1, s2), &mut outcomes),
        BinOp::Div => {
            let result = Arithmetic::divide(s1, s2);
            if result.divide_by_zero {
                outcomes.push(AbstractOutcome::Terminal("divide by zero".to_string()));
            }
            if !result.result.is_empty() {
                push_and_continue(state, result.result, &mut outcomes);
            }
        }
        BinOp::Rem => {
            let result = Arithmetic::remainder(s1, s2);
            if result.divide_by_zero {
                outcomes.push(AbstractOutcome::Terminal("divide by zero".to_string()));
            }
            if !result.result.is_empty() {
                push_and_continue(state, result.result, &mut outcomes);
            }
        }
    }
    Ok(outcomes)
}

fn push_and_continue(mut state: AbstractState, result: SignSet, outcomes: &mut Vec<AbstractOutcome>) {
    let frame = state.current_mut();
    frame.push(AbstractValue::Sign(result));
    frame.pc += 1;
    outcomes.push(AbstractOutcome::Next(state));
}

fn compare_floating(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let frame = state.current_mut();
    let v2 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on compare rhs"))?;
    let v1 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on compare lhs"))?;
    let s1 = v1.sign(method, pc)?;
    let s2 = v2.sign(method, pc)?;

    let mut result = SignSet::empty();
    if Arithmetic::greater_than(s1, s2).contains(SignSet::TRUE) {
        result |= SignSet::POS;
    }
    if Arithmetic::less_than(s1, s2).contains(SignSet::TRUE) {
        result |= SignSet::NEG;
    }
    if Arithmetic::equal(s1, s2).contains(SignSet::TRUE) {
        result |= SignSet::ZERO;
    }
    let frame = state.current_mut();
    frame.push(AbstractValue::Sign(result));
    frame.pc += 1;
    Ok(vec![AbstractOutcome::Next(state)])
}

fn ifz(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
    cond: Cond,
    target: usize,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let frame = state.current_mut();
    let v = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on ifz"))?;

    if matches!(cond, Cond::Is | Cond::IsNot) {
        // Reference values carry no null/non-null information in the
        // abstract domain: both branches are always possible.
        let mut taken = state.clone();
        taken.current_mut().pc = target;
        let mut fallthrough = state;
        fallthrough.current_mut().pc = pc + 1;
        return Ok(vec![AbstractOutcome::Next(taken), AbstractOutcome::Next(fallthrough)]);
    }

    let s = v.sign(method, pc)?;
    let truth = match cond {
        Cond::Eq => Arithmetic::equal(s, SignSet::ZERO),
        Cond::Ne => Arithmetic::not_equal(s, SignSet::ZERO),
        Cond::Gt => Arithmetic::greater_than(s, SignSet::ZERO),
        Cond::Ge => Arithmetic::greater_equal(s, SignSet::ZERO),
        Cond::Lt => Arithmetic::less_than(s, SignSet::ZERO),
        Cond::Le => Arithmetic::less_equal(s, SignSet::ZERO),
        Cond::Is | Cond::IsNot => unreachable!(),
    };
    branch(state, pc, target, truth)
}

fn if_(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
    cond: Cond,
    target: usize,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let frame = state.current_mut();
    let v2 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on if rhs"))?;
    let v1 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on if lhs"))?;
    let s1 = v1.sign(method, pc)?;
    let s2 = v2.sign(method, pc)?;
    let truth = match cond {
        Cond::Eq => Arithmetic::equal(s1, s2),
        Cond::Ne => Arithmetic::not_equal(s1, s2),
        Cond::Gt => Arithmetic::greater_than(s1, s2),
        Cond::Ge => Arithmetic::greater_equal(s1, s2),
        Cond::Lt => Arithmetic::less_than(s1, s2),
        Cond::Le => Arithmetic::less_equal(s1, s2),
        Cond::Is | Cond::IsNot => return Err(bug(method, pc, "is/isnot is only valid on ifz")),
    };
    branch(state, pc, target, truth)
}

fn branch(
    state: AbstractState,
    pc: usize,
    target: usize,
    truth: SignSet,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let mut outcomes = Vec::new();
    if truth.contains(SignSet::TRUE) {
        let mut taken = state.clone();
        taken.current_mut().pc = target;
        outcomes.push(AbstractOutcome::Next(taken));
    }
    if truth.contains(SignSet::FALSE) {
        let mut fallthrough = state;
        fallthrough.current_mut().pc = pc + 1;
        outcomes.push(AbstractOutcome::Next(fallthrough));
    }
    Ok(outcomes)
}

fn return_(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
    kind: Kind,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let returned = if kind == Kind::Void {
        None
    } else {
        Some(
            state
                .current_mut()
                .pop()
                .ok_or_else(|| bug(method, pc, "stack underflow on return"))?,
        )
    };
    state.frames.pop();

    if state.frames.is_empty() {
        return Ok(vec![AbstractOutcome::Terminal(match returned {
            Some(AbstractValue::Reference) => "string detected".to_string(),
            _ => "ok".to_string(),
        })]);
    }
    if let Some(v) = returned {
        let frame = state.current_mut();
        frame.push(v);
    }
    state.current_mut().pc += 1;
    Ok(vec![AbstractOutcome::Next(state)])
}

fn invoke_static(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
    target: &MethodId,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let n = target.params.len();
    let frame = state.current_mut();
    let mut args = Vec::with_capacity(n);
    for _ in 0..n {
        args.push(frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on invokestatic"))?);
    }
    args.reverse();

    let mut callee = AbstractFrame::new(Rc::new(target.clone()));
    for (i, a) in args.into_iter().enumerate() {
        callee.locals.insert(i as u32, a);
    }
    state.frames.push(callee);
    Ok(vec![AbstractOutcome::Next(state)])
}

fn invoke_special(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
    target: &MethodId,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let frame = state.current_mut();
    for _ in 0..target.params.len() + 1 {
        frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on invokespecial"))?;
    }
    frame.pc += 1;
    Ok(vec![AbstractOutcome::Next(state)])
}

fn new_array(
    mut state: AbstractState,
    method: &MethodId,
    pc: usize,
) -> Result<Vec<AbstractOutcome>, ImplementationBug> {
    let frame = state.current_mut();
    let size = frame
        .pop()
        .ok_or_else(|| bug(method, pc, "stack underflow on newarray"))?
        .sign(method, pc)?;

    let mut outcomes = Vec::new();
    if size.contains(SignSet::NEG) {
        outcomes.push(AbstractOutcome::Terminal("negative array size".to_string()));
    }
    let nonneg = size.intersection(SignSet::ZERO | SignSet::POS);
    if !nonneg.is_empty() {
        let frame = state.current_mut();
        frame.push(AbstractValue::Reference);
        frame.pc += 1;
        outcomes.push(AbstractOutcome::Next(state));
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::InMemoryResolver;

    fn cache_with(method: &MethodId, code: Vec<Instr>) -> BytecodeCache<InMemoryResolver> {
        let mut resolver = InMemoryResolver::new();
        resolver.insert(method.clone(), code);
        BytecodeCache::new(resolver)
    }

    fn run_to_outcomes(
        cache: &mut BytecodeCache<InMemoryResolver>,
        initial: AbstractState,
        budget: usize,
    ) -> Vec<String> {
        let mut worklist = std::collections::VecDeque::new();
        worklist.push_back(initial);
        let mut outcomes = Vec::new();
        let mut steps = 0;
        while let Some(state) = worklist.pop_front() {
            if steps >= budget {
                outcomes.push("*".to_string());
                break;
            }
            steps += 1;
            for outcome in step(cache, state).unwrap() {
                match outcome {
                    AbstractOutcome::Next(s) => worklist.push_back(s),
                    AbstractOutcome::Terminal(s) => outcomes.push(s),
                }
            }
        }
        outcomes
    }

    #[test]
    fn assert_positive_is_sound_over_sign_abstraction() {
        let method = MethodId::parse("C.assertPositive:(I)V").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Ifz(Cond::Gt, 4),
            Instr::New("java.lang.AssertionError".to_string()),
            Instr::Throw,
            Instr::Return(Kind::Void),
        ];
        let mut cache = cache_with(&method, code);
        let initial = AbstractState::seed(Rc::new(method), &[SignSet::NEG | SignSet::ZERO | SignSet::POS]);
        let mut outcomes = run_to_outcomes(&mut cache, initial, 1000);
        outcomes.sort();
        assert_eq!(outcomes, vec!["assertion error".to_string(), "ok".to_string()]);
    }

    #[test]
    fn divide_by_zero_containing_set_yields_both_outcomes() {
        let method = MethodId::parse("C.div:(II)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Load(Kind::Int, 1),
            Instr::Binary(Kind::Int, BinOp::Div),
            Instr::Return(Kind::Int),
        ];
        let mut cache = cache_with(&method, code);
        let initial = AbstractState::seed(
            Rc::new(method),
            &[SignSet::POS, SignSet::ZERO | SignSet::POS],
        );
        let mut outcomes = run_to_outcomes(&mut cache, initial, 1000);
        outcomes.sort();
        assert_eq!(outcomes, vec!["divide by zero".to_string(), "ok".to_string()]);
    }

    #[test]
    fn negative_array_size_is_detected_from_sign_set() {
        let method = MethodId::parse("C.makeArray:(I)[I").unwrap();
        let code = vec![Instr::Load(Kind::Int, 0), Instr::NewArray(Kind::Int, 1)];
        let mut cache = cache_with(&method, code);
        let initial = AbstractState::seed(Rc::new(method), &[SignSet::NEG]);
        let outcomes = run_to_outcomes(&mut cache, initial, 1000);
        assert_eq!(outcomes, vec!["negative array size".to_string()]);
    }
}
