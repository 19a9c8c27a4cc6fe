//! # Concrete Step (spec §4.D)
//!
//! The fetch-decode-execute loop: read the opcode at the current frame's
//! PC, append the offset to the trace, apply its semantics. Mirrors the
//! teacher's `vm::run` shape exactly — an `advance_pc` flag, an inner
//! `loop { match { ... } break Ok(()) }` so control-flow opcodes can
//! `break` early, and per-instruction-family handlers in sibling modules.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::{Instr, MethodResolver, ResolverError};
use crate::bytecode::cache::BytecodeCache;
use crate::error::{ImplementationBug, RunOutcome};
use crate::frame::{Frame, FrameStack};
use crate::heap::{self, Heap};
use crate::interp::{ops_arith, ops_control, ops_struct};
use crate::method::MethodId;
use crate::value::{InputValue, Value};

/// What one opcode application did to control flow.
pub enum Step {
    /// Keep running; the PC has already been advanced or branched.
    Continue,
    /// The run is over.
    Terminal(RunOutcome),
}

/// Default per-run instruction budget (spec §5).
pub const DEFAULT_BUDGET: usize = 1000;

/// Bind argument values into a fresh frame's locals, allocating strings
/// and arrays onto the heap. Locals occupy slots `0..params.len()`.
pub fn bind_params(heap: &mut Heap, args: &[InputValue]) -> HashMap<u32, Value> {
    let mut locals = HashMap::new();
    for (i, arg) in args.iter().enumerate() {
        locals.insert(i as u32, heap::materialize(heap, arg));
    }
    locals
}

/// Run `entry` to completion (or budget exhaustion) with `args` bound to
/// its parameter locals. Returns the terminal outcome and the full
/// instruction trace.
pub fn run<R: MethodResolver>(
    cache: &mut BytecodeCache<R>,
    heap: &mut Heap,
    entry: MethodId,
    args: &[InputValue],
    budget: usize,
) -> Result<(RunOutcome, Vec<usize>), ImplementationBug> {
    let mut frames = FrameStack::new();
    let locals = bind_params(heap, args);
    let entry_rc = Rc::new(entry);
    let mut entry_frame = Frame::new(Rc::clone(&entry_rc));
    entry_frame.locals = locals;
    frames.push(entry_frame);

    let mut trace = Vec::new();
    let mut steps = 0usize;

    loop {
        if steps >= budget {
            return Ok((RunOutcome::Budget, trace));
        }
        steps += 1;

        let method = {
            let frame = frames
                .current()
                .ok_or_else(|| ImplementationBug::new("frame stack empty", "<none>", 0))?;
            Rc::clone(&frame.method)
        };
        let code = resolve(cache, &method)?;

        let pc = frames.current().unwrap().pc;
        if pc >= code.len() {
            return Err(ImplementationBug::new(
                "program counter out of range",
                method.to_string(),
                pc,
            ));
        }
        trace.push(pc);

        let instr = code[pc].clone();
        tracing::debug!(method = %method, pc, ?instr, "step");

        let step = dispatch(heap, &mut frames, &method, pc, &instr)?;
        match step {
            Step::Continue => continue,
            Step::Terminal(outcome) => return Ok((outcome, trace)),
        }
    }
}

pub(crate) fn resolve<R: MethodResolver>(
    cache: &mut BytecodeCache<R>,
    method: &MethodId,
) -> Result<Rc<[Instr]>, ImplementationBug> {
    cache.opcodes(method).map_err(|e: ResolverError| {
        ImplementationBug::new(format!("bytecode resolution failed: {}", e), method.to_string(), 0)
    })
}

/// Apply one opcode. Dispatches to the family handler; advances or
/// branches the current frame's PC as a side effect unless the opcode
/// produces a terminal outcome or pushes/pops a frame.
fn dispatch(
    heap: &mut Heap,
    frames: &mut FrameStack,
    method: &MethodId,
    pc: usize,
    instr: &Instr,
) -> Result<Step, ImplementationBug> {
    let bug = |msg: &str| ImplementationBug::new(msg.to_string(), method.to_string(), pc);

    match instr {
        Instr::Push(v) => {
            let frame = frames.current_mut().ok_or_else(|| bug("no current frame"))?;
            frame.push(*v);
            frame.pc += 1;
            Ok(Step::Continue)
        }
        Instr::PushString(s) => {
            let idx = heap.alloc(crate::heap::HeapObject::Str(s.clone()));
            let frame = frames.current_mut().ok_or_else(|| bug("no current frame"))?;
            frame.push(Value::Reference(Some(idx)));
            frame.pc += 1;
            Ok(Step::Continue)
        }
        Instr::Load(_, i) => {
            let frame = frames.current_mut().ok_or_else(|| bug("no current frame"))?;
            let v = *frame
                .locals
                .get(i)
                .ok_or_else(|| ImplementationBug::new(format!("local {} not bound", i), method.to_string(), pc))?;
            frame.push(v);
            frame.pc += 1;
            Ok(Step::Continue)
        }
        Instr::Store(_, i) => {
            let frame = frames.current_mut().ok_or_else(|| bug("no current frame"))?;
            let v = frame.pop().ok_or_else(|| bug("stack underflow on store"))?;
            frame.locals.insert(*i, v);
            frame.pc += 1;
            Ok(Step::Continue)
        }
        Instr::Dup => {
            let frame = frames.current_mut().ok_or_else(|| bug("no current frame"))?;
            let v = *frame.peek().ok_or_else(|| bug("stack underflow on dup"))?;
            frame.push(v);
            frame.pc += 1;
            Ok(Step::Continue)
        }
        Instr::Binary(kind, op) => ops_arith::binary(frames, method, pc, *kind, *op),
        Instr::CompareFloating { nan_value } => {
            ops_arith::compare_floating(frames, method, pc, *nan_value)
        }
        Instr::Incr(i, c) => ops_arith::incr(frames, method, pc, *i, *c),
        Instr::CastIntToShort => ops_arith::cast_int_to_short(frames, method, pc),
        Instr::Ifz(cond, target) => ops_control::ifz(frames, method, pc, *cond, *target),
        Instr::If(cond, target) => ops_control::if_(frames, method, pc, *cond, *target),
        Instr::Goto(target) => {
            let frame = frames.current_mut().ok_or_else(|| bug("no current frame"))?;
            frame.pc = *target;
            Ok(Step::Continue)
        }
        Instr::Return(kind) => ops_control::return_(frames, heap, method, pc, *kind),
        Instr::New(class_name) => ops_control::new_object(frames, heap, method, pc, class_name),
        Instr::Get(field) => ops_control::get_field(frames, method, pc, field),
        Instr::Throw => ops_control::throw(frames, method, pc),
        Instr::InvokeStatic(target) => ops_control::invoke_static(frames, method, pc, target),
        Instr::InvokeSpecial(target) => {
            ops_control::invoke_special(frames, method, pc, target)
        }
        Instr::InvokeVirtual(target) => {
            ops_control::invoke_virtual(frames, heap, method, pc, target)
        }
        Instr::InvokeDynamic { name, descriptor } => {
            ops_control::invoke_dynamic(frames, heap, method, pc, name, descriptor)
        }
        Instr::NewArray(kind, dim) => ops_struct::new_array(frames, heap, method, pc, *kind, *dim),
        Instr::ArrayStore(kind) => ops_struct::array_store(frames, heap, method, pc, *kind),
        Instr::ArrayLoad(kind) => ops_struct::array_load(frames, heap, method, pc, *kind),
        Instr::ArrayLength => ops_struct::array_length(frames, heap, method, pc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{BinOp, Cond, InMemoryResolver, Kind};

    fn cache_with(method: &MethodId, code: Vec<Instr>) -> BytecodeCache<InMemoryResolver> {
        let mut resolver = InMemoryResolver::new();
        resolver.insert(method.clone(), code);
        BytecodeCache::new(resolver)
    }

    #[test]
    fn assert_positive_scenario() {
        // if (x > 0) return; else assertion error.
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

        let (outcome, trace) = run(&mut cache, &mut heap, method.clone(), &[InputValue::Int(1)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Ok);
        assert!(trace.iter().all(|&pc| pc < 5));

        let (outcome, _) = run(&mut cache, &mut heap, method.clone(), &[InputValue::Int(0)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::AssertionError);

        let (outcome, _) = run(&mut cache, &mut heap, method, &[InputValue::Int(-3)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::AssertionError);
    }

    #[test]
    fn safe_div_precheck_avoids_divide_by_zero() {
        // if (b == 0) return 1; return a / b;
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

        let (outcome, _) = run(&mut cache, &mut heap, method.clone(), &[InputValue::Int(6), InputValue::Int(2)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Ok);

        let (outcome, _) = run(&mut cache, &mut heap, method, &[InputValue::Int(6), InputValue::Int(0)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Ok);
    }

    #[test]
    fn divide_by_zero_without_precheck() {
        let method = MethodId::parse("C.div:(II)I").unwrap();
        let code = vec![
            Instr::Load(Kind::Int, 0),
            Instr::Load(Kind::Int, 1),
            Instr::Binary(Kind::Int, BinOp::Div),
            Instr::Return(Kind::Int),
        ];
        let mut cache = cache_with(&method, code);
        let mut heap = Heap::new();
        let (outcome, _) = run(&mut cache, &mut heap, method, &[InputValue::Int(6), InputValue::Int(0)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::DivideByZero);
    }

    #[test]
    fn budget_exhaustion_yields_star() {
        // infinite loop: goto 0
        let method = MethodId::parse("C.sumLoop:(I)I").unwrap();
        let code = vec![Instr::Goto(0)];
        let mut cache = cache_with(&method, code);
        let mut heap = Heap::new();
        let (outcome, trace) = run(&mut cache, &mut heap, method, &[InputValue::Int(2000)], 1000).unwrap();
        assert_eq!(outcome, RunOutcome::Budget);
        assert_eq!(trace.len(), 1000);
    }

    #[test]
    fn trace_offsets_are_always_in_range() {
        let method = MethodId::parse("C.id:(I)I").unwrap();
        let code = vec![Instr::Load(Kind::Int, 0), Instr::Return(Kind::Int)];
        let mut cache = cache_with(&method, code.clone());
        let mut heap = Heap::new();
        let (_, trace) = run(&mut cache, &mut heap, method, &[InputValue::Int(1)], 1000).unwrap();
        assert!(trace.iter().all(|&pc| pc < code.len()));
    }
}
