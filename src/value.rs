//! # Value Representation
//!
//! This module defines two related types:
//!
//! - [`Value`]: the runtime payload that lives on the operand stack and in
//!   locals. Strings and arrays are never stored inline here — a string or
//!   array value is a [`Value::Reference`] into the [`crate::heap::Heap`].
//! - [`InputValue`]: the full surface-syntax tree used wherever a value
//!   needs to travel *outside* a running interpreter — CLI argument tuples,
//!   syntactic-hinter seeds, and fuzzer generation/mutation. An `InputValue`
//!   carries string and array contents directly; binding it into a running
//!   interpreter allocates the necessary heap cells.
//!
//! ## Coercion rules
//! None. Unlike a dynamically-typed VM, every opcode here declares the
//! `Kind` it expects (see `bytecode::instr::Kind`); a `Value` of the wrong
//! variant at that point is an implementation bug, not a coercion
//! opportunity.

use std::fmt;

use crate::method::Type;

/// Runtime operand: what actually lives on the stack and in locals.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// 32-bit signed integer (wraparound on add/sub/mul).
    Int(i32),
    /// Binary64 float.
    Float(f64),
    /// Stored as an integer 0/1 on the operand stack, but kept as a
    /// distinct variant here so opcodes can tell booleans from ints.
    Boolean(bool),
    /// Unicode scalar value, represented by its code point.
    Char(u32),
    /// Heap reference; `None` is null, distinct from index `0`.
    Reference(Option<usize>),
}

impl Value {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Option<usize>> {
        match self {
            Value::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "'{}'", char::from_u32(*c).unwrap_or('?')),
            Value::Reference(None) => write!(f, "null"),
            Value::Reference(Some(idx)) => write!(f, "ref#{}", idx),
        }
    }
}

/// Surface-syntax value tree: the domain of encode/parse (spec §4.A).
///
/// This is the shape a value has before it is bound into a run — constants
/// proposed by the syntactic hinter, values generated or mutated by the
/// fuzzer, and the parsed contents of a CLI argument tuple all live here.
#[derive(Clone, Debug, PartialEq)]
pub enum InputValue {
    Int(i32),
    Float(f64),
    Boolean(bool),
    Char(char),
    Str(String),
    Array(Type, Vec<InputValue>),
    Null,
}

/// An argument string did not match the grammar for its declared type.
#[derive(Clone, Debug, PartialEq)]
pub struct ParseValueError(pub String);

impl fmt::Display for ParseValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed value: {}", self.0)
    }
}

impl std::error::Error for ParseValueError {}

impl InputValue {
    /// Render in the grammar defined by spec §4.A. `parse` is this
    /// function's inverse on the grammar it defines.
    pub fn encode(&self) -> String {
        match self {
            InputValue::Int(i) => i.to_string(),
            InputValue::Float(x) => {
                if x.fract() == 0.0 {
                    format!("{:.1}", x)
                } else {
                    x.to_string()
                }
            }
            InputValue::Boolean(b) => b.to_string(),
            InputValue::Char(c) => format!("'{}'", escape_char(*c)),
            InputValue::Str(s) => format!("\"{}\"", escape_str(s)),
            InputValue::Array(elem_ty, items) => {
                let rendered: Vec<String> = items.iter().map(InputValue::encode).collect();
                format!("[{}: {}]", elem_ty, rendered.join(", "))
            }
            InputValue::Null => "null".to_string(),
        }
    }

    /// Parse a surface-syntax literal against its expected descriptor type.
    pub fn parse(s: &str, ty: &Type) -> Result<InputValue, ParseValueError> {
        let s = s.trim();
        match ty {
            Type::Int | Type::Short => s
                .parse::<i32>()
                .map(InputValue::Int)
                .map_err(|_| ParseValueError(s.to_string())),
            Type::Float => s
                .parse::<f64>()
                .map(InputValue::Float)
                .map_err(|_| ParseValueError(s.to_string())),
            Type::Boolean => match s {
                "true" => Ok(InputValue::Boolean(true)),
                "false" => Ok(InputValue::Boolean(false)),
                _ => Err(ParseValueError(s.to_string())),
            },
            Type::Char => {
                if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
                    let inner = unescape(&s[1..s.len() - 1]);
                    let mut chars = inner.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Ok(InputValue::Char(c)),
                        _ => Err(ParseValueError(s.to_string())),
                    }
                } else {
                    Err(ParseValueError(s.to_string()))
                }
            }
            Type::Object(name) if name == "java.lang.String" => {
                if s == "null" {
                    return Ok(InputValue::Null);
                }
                if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
                    Ok(InputValue::Str(unescape(&s[1..s.len() - 1])))
                } else {
                    Err(ParseValueError(s.to_string()))
                }
            }
            Type::Object(_) => {
                if s == "null" {
                    Ok(InputValue::Null)
                } else {
                    Err(ParseValueError(s.to_string()))
                }
            }
            Type::Array(elem_ty) => {
                if s == "null" {
                    return Ok(InputValue::Null);
                }
                if !(s.starts_with('[') && s.ends_with(']')) {
                    return Err(ParseValueError(s.to_string()));
                }
                let inner = &s[1..s.len() - 1];
                let colon = inner
                    .find(':')
                    .ok_or_else(|| ParseValueError(s.to_string()))?;
                let body = inner[colon + 1..].trim();
                let items = if body.is_empty() {
                    Vec::new()
                } else {
                    split_top_level(body)
                        .into_iter()
                        .map(|piece| InputValue::parse(piece.trim(), elem_ty))
                        .collect::<Result<Vec<_>, _>>()?
                };
                Ok(InputValue::Array((**elem_ty).clone(), items))
            }
            Type::Void => Err(ParseValueError("void has no values".to_string())),
        }
    }
}

fn escape_char(c: char) -> String {
    match c {
        '\'' => "\\'".to_string(),
        '\\' => "\\\\".to_string(),
        other => other.to_string(),
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split a comma-separated list, ignoring commas nested inside `[...]` or
/// inside a `"..."` string literal (including its escaped characters).
pub fn split_top_level(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut start = 0usize;
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => in_string = !in_string,
            '\\' if in_string => {
                chars.next();
            }
            '[' if !in_string => depth += 1,
            ']' if !in_string => depth = depth.saturating_sub(1),
            ',' if depth == 0 && !in_string => {
                out.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: InputValue, ty: &Type) {
        let encoded = v.encode();
        let parsed = InputValue::parse(&encoded, ty).expect("parse");
        assert_eq!(parsed, v, "encode({:?}) = {:?} did not parse back", v, encoded);
    }

    #[test]
    fn int_roundtrip() {
        roundtrip(InputValue::Int(-42), &Type::Int);
        roundtrip(InputValue::Int(0), &Type::Int);
    }

    #[test]
    fn float_roundtrip() {
        roundtrip(InputValue::Float(3.5), &Type::Float);
        roundtrip(InputValue::Float(-2.0), &Type::Float);
    }

    #[test]
    fn boolean_roundtrip() {
        roundtrip(InputValue::Boolean(true), &Type::Boolean);
        roundtrip(InputValue::Boolean(false), &Type::Boolean);
    }

    #[test]
    fn char_roundtrip() {
        roundtrip(InputValue::Char('a'), &Type::Char);
        roundtrip(InputValue::Char('\''), &Type::Char);
    }

    #[test]
    fn string_roundtrip_with_escapes() {
        let string_ty = Type::Object("java.lang.String".to_string());
        roundtrip(InputValue::Str("he said \"hi\"".to_string()), &string_ty);
        roundtrip(InputValue::Str("back\\slash".to_string()), &string_ty);
        roundtrip(InputValue::Str("".to_string()), &string_ty);
    }

    #[test]
    fn int_array_roundtrip() {
        let arr_ty = Type::Array(Box::new(Type::Int));
        roundtrip(
            InputValue::Array(Type::Int, vec![InputValue::Int(1), InputValue::Int(2)]),
            &arr_ty,
        );
        roundtrip(InputValue::Array(Type::Int, vec![]), &arr_ty);
    }

    #[test]
    fn char_array_roundtrip() {
        let arr_ty = Type::Array(Box::new(Type::Char));
        roundtrip(
            InputValue::Array(Type::Char, vec![InputValue::Char('a'), InputValue::Char('b')]),
            &arr_ty,
        );
    }

    #[test]
    fn null_parses_for_reference_types() {
        let string_ty = Type::Object("java.lang.String".to_string());
        assert_eq!(InputValue::parse("null", &string_ty), Ok(InputValue::Null));
        let arr_ty = Type::Array(Box::new(Type::Int));
        assert_eq!(InputValue::parse("null", &arr_ty), Ok(InputValue::Null));
    }
}
