//! # Bytecode Cache (spec §4.B)
//!
//! A lazy, per-method opcode vector, populated on miss via an external
//! [`MethodResolver`]. Grounded on `original_source/interpreter.py`'s own
//! `Bytecode.__getitem__`, which is exactly this: a dict keyed by method
//! identity, filled in on the first lookup and never mutated after.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::instr::Instr;
use crate::bytecode::resolver::{MethodResolver, ResolverError};
use crate::method::MethodId;

pub struct BytecodeCache<R: MethodResolver> {
    resolver: R,
    methods: HashMap<MethodId, Rc<[Instr]>>,
}

impl<R: MethodResolver> BytecodeCache<R> {
    pub fn new(resolver: R) -> Self {
        BytecodeCache {
            resolver,
            methods: HashMap::new(),
        }
    }

    /// Fetch the opcode vector for `method`, resolving and caching on miss.
    /// Insert is idempotent: a second resolve of the same key (e.g. under
    /// future concurrent use) just overwrites with an equivalent vector.
    pub fn opcodes(&mut self, method: &MethodId) -> Result<Rc<[Instr]>, ResolverError> {
        if let Some(code) = self.methods.get(method) {
            return Ok(Rc::clone(code));
        }
        let code: Rc<[Instr]> = Rc::from(self.resolver.resolve(method)?);
        self.methods.insert(method.clone(), Rc::clone(&code));
        Ok(code)
    }
}
