//! Shared opcode set, lazy per-method cache, and the method-resolver
//! boundary that fills the cache on miss.

pub mod cache;
pub mod instr;
pub mod resolver;

pub use cache::BytecodeCache;
pub use instr::{BinOp, Cond, Instr, Kind};
pub use resolver::{InMemoryResolver, JsonResolver, MethodResolver, ResolverError, default_class_root};
