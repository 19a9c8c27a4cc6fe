//! # Interpreters (spec §4.D–§4.F)
//!
//! `concrete` is the fetch-decode-execute loop over typed `Value`s;
//! `abstract_step` is its sign-abstracted sibling. Both consume the same
//! `bytecode::Instr` stream (§9: "concrete and abstract interpreters share
//! opcode definitions but have separate step functions"). Per-instruction
//! families are split into `ops_arith`/`ops_control`/`ops_struct`, mirroring
//! how the teacher splits its own VM's instruction families.

pub mod abstract_step;
pub mod concrete;
pub mod ops_arith;
pub mod ops_control;
pub mod ops_struct;
