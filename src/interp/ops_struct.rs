//! Array opcode handlers (spec §4.D): `NewArray`, `ArrayStore`,
//! `ArrayLoad`, `ArrayLength`.

use crate::bytecode::Kind;
use crate::error::{ImplementationBug, RunOutcome};
use crate::frame::FrameStack;
use crate::heap::{Heap, HeapObject};
use crate::interp::concrete::Step;
use crate::method::{MethodId, Type};
use crate::value::Value;

fn bug(method: &MethodId, pc: usize, msg: impl Into<String>) -> ImplementationBug {
    ImplementationBug::new(msg, method.to_string(), pc)
}

fn kind_to_element_type(kind: Kind) -> Type {
    match kind {
        Kind::Int => Type::Int,
        Kind::Float => Type::Float,
        Kind::Char => Type::Char,
        Kind::Reference => Type::Object("java.lang.String".to_string()),
        Kind::Void => Type::Void,
    }
}

fn zero_value(kind: Kind) -> Value {
    match kind {
        Kind::Int => Value::Int(0),
        Kind::Float => Value::Float(0.0),
        Kind::Char => Value::Char(0),
        Kind::Reference => Value::Reference(None),
        Kind::Void => Value::Int(0),
    }
}

pub fn new_array(
    frames: &mut FrameStack,
    heap: &mut Heap,
    method: &MethodId,
    pc: usize,
    kind: Kind,
    _dim: u32,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let size = frame
        .pop()
        .ok_or_else(|| bug(method, pc, "stack underflow on newarray size"))?
        .as_int()
        .ok_or_else(|| bug(method, pc, "newarray size not an int"))?;

    if size < 0 {
        return Ok(Step::Terminal(RunOutcome::NegativeArraySize));
    }

    let elements = vec![zero_value(kind); size as usize];
    let idx = heap.alloc(HeapObject::Array {
        element_type: kind_to_element_type(kind),
        elements,
    });
    let frame = frames.current_mut().unwrap();
    frame.push(Value::Reference(Some(idx)));
    frame.pc += 1;
    Ok(Step::Continue)
}

/// Pop value, index, array reference (in that order — LIFO of a push
/// sequence `arrayref, index, value`).
pub fn array_store(
    frames: &mut FrameStack,
    heap: &mut Heap,
    method: &MethodId,
    pc: usize,
    _kind: Kind,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let value = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on arraystore value"))?;
    let index = frame
        .pop()
        .ok_or_else(|| bug(method, pc, "stack underflow on arraystore index"))?
        .as_int()
        .ok_or_else(|| bug(method, pc, "arraystore index not an int"))?;
    let array_ref = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on arraystore receiver"))?;

    let idx = match array_ref.as_reference().ok_or_else(|| bug(method, pc, "arraystore receiver not a reference"))? {
        None => return Ok(Step::Terminal(RunOutcome::NullPointer)),
        Some(idx) => idx,
    };
    let elements = match heap.get_mut(idx) {
        Some(HeapObject::Array { elements, .. }) => elements,
        _ => return Err(bug(method, pc, "arraystore receiver is not an array")),
    };
    if index < 0 || index as usize >= elements.len() {
        return Ok(Step::Terminal(RunOutcome::OutOfBounds));
    }
    elements[index as usize] = value;

    let frame = frames.current_mut().unwrap();
    frame.pc += 1;
    Ok(Step::Continue)
}

pub fn array_load(
    frames: &mut FrameStack,
    heap: &mut Heap,
    method: &MethodId,
    pc: usize,
    _kind: Kind,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let index = frame
        .pop()
        .ok_or_else(|| bug(method, pc, "stack underflow on arrayload index"))?
        .as_int()
        .ok_or_else(|| bug(method, pc, "arrayload index not an int"))?;
    let array_ref = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on arrayload receiver"))?;

    let idx = match array_ref.as_reference().ok_or_else(|| bug(method, pc, "arrayload receiver not a reference"))? {
        None => return Ok(Step::Terminal(RunOutcome::NullPointer)),
        Some(idx) => idx,
    };
    let value = match heap.get(idx) {
        Some(HeapObject::Array { elements, .. }) => {
            if index < 0 || index as usize >= elements.len() {
                return Ok(Step::Terminal(RunOutcome::OutOfBounds));
            }
            elements[index as usize]
        }
        _ => return Err(bug(method, pc, "arrayload receiver is not an array")),
    };

    let frame = frames.current_mut().unwrap();
    frame.push(value);
    frame.pc += 1;
    Ok(Step::Continue)
}

/// `null` → `"null pointer"`; a string receiver → its char count; an
/// array receiver → its element count.
pub fn array_length(
    frames: &mut FrameStack,
    heap: &mut Heap,
    method: &MethodId,
    pc: usize,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let receiver = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on arraylength receiver"))?;
    let idx = match receiver.as_reference().ok_or_else(|| bug(method, pc, "arraylength receiver not a reference"))? {
        None => return Ok(Step::Terminal(RunOutcome::NullPointer)),
        Some(idx) => idx,
    };
    let len = heap
        .get(idx)
        .ok_or_else(|| bug(method, pc, "arraylength receiver out of heap range"))?
        .len();

    let frame = frames.current_mut().unwrap();
    frame.push(Value::Int(len as i32));
    frame.pc += 1;
    Ok(Step::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use std::rc::Rc;

    fn one_frame(stack: &[Value]) -> FrameStack {
        let method = Rc::new(MethodId::parse("a.b.C.m:()V").unwrap());
        let mut frame = Frame::new(method);
        for &v in stack {
            frame.push(v);
        }
        let mut frames = FrameStack::new();
        frames.push(frame);
        frames
    }

    #[test]
    fn negative_size_is_terminal() {
        let mut frames = one_frame(&[Value::Int(-1)]);
        let mut heap = Heap::new();
        let method = MethodId::parse("a.b.C.m:()V").unwrap();
        let step = new_array(&mut frames, &mut heap, &method, 0, Kind::Int, 1).unwrap();
        assert!(matches!(step, Step::Terminal(RunOutcome::NegativeArraySize)));
    }

    #[test]
    fn out_of_bounds_load() {
        let mut heap = Heap::new();
        let idx = heap.alloc(HeapObject::Array {
            element_type: Type::Int,
            elements: vec![Value::Int(1), Value::Int(2)],
        });
        let mut frames = one_frame(&[Value::Reference(Some(idx)), Value::Int(3)]);
        let method = MethodId::parse("a.b.C.m:()V").unwrap();
        let step = array_load(&mut frames, &mut heap, &method, 0, Kind::Int).unwrap();
        assert!(matches!(step, Step::Terminal(RunOutcome::OutOfBounds)));
    }

    #[test]
    fn null_receiver_is_null_pointer() {
        let mut heap = Heap::new();
        let mut frames = one_frame(&[Value::Reference(None), Value::Int(0)]);
        let method = MethodId::parse("a.b.C.m:()V").unwrap();
        let step = array_load(&mut frames, &mut heap, &method, 0, Kind::Int).unwrap();
        assert!(matches!(step, Step::Terminal(RunOutcome::NullPointer)));
    }
}
