//! # Heap
//!
//! A monotonically growing vector of heap objects. Indices are assigned by
//! insertion order and are never reused within one run — `alloc` always
//! appends, so "never reused" falls out of `Vec::push` for free rather than
//! needing an explicit freelist or generation counter.
//!
//! String and array values are never stored inline on the operand stack;
//! they live here and are referenced by index (see [`crate::value::Value::Reference`]).

use crate::method::Type;
use crate::value::{InputValue, Value};

/// One heap cell. A tagged union, per the design notes: `String`, `Array`,
/// or `Object`.
#[derive(Clone, Debug)]
pub enum HeapObject {
    Str(String),
    Array {
        element_type: Type,
        elements: Vec<Value>,
    },
    Object {
        class_name: String,
    },
}

impl HeapObject {
    pub fn len(&self) -> usize {
        match self {
            HeapObject::Str(s) => s.chars().count(),
            HeapObject::Array { elements, .. } => elements.len(),
            HeapObject::Object { .. } => 0,
        }
    }
}

#[derive(Default)]
pub struct Heap {
    cells: Vec<HeapObject>,
}

impl Heap {
    pub fn new() -> Heap {
        Heap { cells: Vec::new() }
    }

    /// Append a new object, returning its (never-reused) index.
    pub fn alloc(&mut self, obj: HeapObject) -> usize {
        let idx = self.cells.len();
        self.cells.push(obj);
        idx
    }

    pub fn get(&self, idx: usize) -> Option<&HeapObject> {
        self.cells.get(idx)
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut HeapObject> {
        self.cells.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Bind a surface-syntax value into a running interpreter: primitives
/// convert directly, strings and arrays are allocated onto `heap` and
/// returned as a reference. Recursive for array elements.
pub fn materialize(heap: &mut Heap, v: &InputValue) -> Value {
    match v {
        InputValue::Int(i) => Value::Int(*i),
        InputValue::Float(f) => Value::Float(*f),
        InputValue::Boolean(b) => Value::Boolean(*b),
        InputValue::Char(c) => Value::Char(*c as u32),
        InputValue::Null => Value::Reference(None),
        InputValue::Str(s) => Value::Reference(Some(heap.alloc(HeapObject::Str(s.clone())))),
        InputValue::Array(element_type, items) => {
            let elements: Vec<Value> = items.iter().map(|item| materialize(heap, item)).collect();
            Value::Reference(Some(heap.alloc(HeapObject::Array {
                element_type: element_type.clone(),
                elements,
            })))
        }
    }
}
