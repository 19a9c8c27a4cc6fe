//! Arithmetic and comparison opcode handlers (spec §4.D), split out the
//! way the teacher splits `vm::ops_arith` from the main dispatch loop.

use crate::bytecode::{BinOp, Kind};
use crate::error::{ImplementationBug, RunOutcome};
use crate::frame::FrameStack;
use crate::interp::concrete::Step;
use crate::method::MethodId;
use crate::value::Value;

fn bug(method: &MethodId, pc: usize, msg: impl Into<String>) -> ImplementationBug {
    ImplementationBug::new(msg, method.to_string(), pc)
}

pub fn binary(
    frames: &mut FrameStack,
    method: &MethodId,
    pc: usize,
    kind: Kind,
    op: BinOp,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let v2 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on binary rhs"))?;
    let v1 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on binary lhs"))?;

    match kind {
        Kind::Int => {
            let a = v1.as_int().ok_or_else(|| bug(method, pc, "binary lhs not an int"))?;
            let b = v2.as_int().ok_or_else(|| bug(method, pc, "binary rhs not an int"))?;
            match op {
                BinOp::Add => frame.push(Value::Int(a.wrapping_add(b))),
                BinOp::Sub => frame.push(Value::Int(a.wrapping_sub(b))),
                BinOp::Mul => frame.push(Value::Int(a.wrapping_mul(b))),
                BinOp::Div => {
                    if b == 0 {
                        return Ok(Step::Terminal(RunOutcome::DivideByZero));
                    }
                    frame.push(Value::Int(a.wrapping_div(b)));
                }
                BinOp::Rem => {
                    if b == 0 {
                        return Ok(Step::Terminal(RunOutcome::DivideByZero));
                    }
                    frame.push(Value::Int(a.wrapping_rem(b)));
                }
            }
        }
        Kind::Float => {
            let a = v1.as_float().ok_or_else(|| bug(method, pc, "binary lhs not a float"))?;
            let b = v2.as_float().ok_or_else(|| bug(method, pc, "binary rhs not a float"))?;
            match op {
                BinOp::Add => frame.push(Value::Float(a + b)),
                BinOp::Sub => frame.push(Value::Float(a - b)),
                BinOp::Mul => frame.push(Value::Float(a * b)),
                BinOp::Div => {
                    if b == 0.0 {
                        return Ok(Step::Terminal(RunOutcome::DivideByZero));
                    }
                    frame.push(Value::Float(a / b));
                }
                BinOp::Rem => {
                    if b == 0.0 {
                        return Ok(Step::Terminal(RunOutcome::DivideByZero));
                    }
                    frame.push(Value::Float(a % b));
                }
            }
        }
        other => return Err(bug(method, pc, format!("binary over unsupported kind {:?}", other))),
    }

    let frame = frames.current_mut().unwrap();
    frame.pc += 1;
    Ok(Step::Continue)
}

pub fn compare_floating(
    frames: &mut FrameStack,
    method: &MethodId,
    pc: usize,
    nan_value: i32,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let v2 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on compare rhs"))?;
    let v1 = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on compare lhs"))?;
    let a = v1.as_float().ok_or_else(|| bug(method, pc, "compare lhs not a float"))?;
    let b = v2.as_float().ok_or_else(|| bug(method, pc, "compare rhs not a float"))?;

    let result = if a.is_nan() || b.is_nan() {
        nan_value
    } else if a > b {
        1
    } else if a < b {
        -1
    } else {
        0
    };
    frame.push(Value::Int(result));
    frame.pc += 1;
    Ok(Step::Continue)
}

pub fn incr(
    frames: &mut FrameStack,
    method: &MethodId,
    pc: usize,
    i: u32,
    c: i32,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let current = frame
        .locals
        .get(&i)
        .and_then(Value::as_int)
        .ok_or_else(|| bug(method, pc, format!("local {} is not a bound int", i)))?;
    frame.locals.insert(i, Value::Int(current.wrapping_add(c)));
    frame.pc += 1;
    Ok(Step::Continue)
}

pub fn cast_int_to_short(
    frames: &mut FrameStack,
    method: &MethodId,
    pc: usize,
) -> Result<Step, ImplementationBug> {
    let frame = frames.current_mut().ok_or_else(|| bug(method, pc, "no current frame"))?;
    let v = frame.pop().ok_or_else(|| bug(method, pc, "stack underflow on cast"))?;
    let i = v.as_int().ok_or_else(|| bug(method, pc, "cast operand not an int"))?;
    let truncated = ((i as i64 + 32768).rem_euclid(65536) - 32768) as i32;
    frame.push(Value::Int(truncated));
    frame.pc += 1;
    Ok(Step::Continue)
}
