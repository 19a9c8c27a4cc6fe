//! # Error Handling
//!
//! Three error classes, kept as three distinct types so that one can never
//! be silently converted into another:
//!
//! - [`RunOutcome`]: a program terminal outcome. Not a failure — a result,
//!   part of the contract, returned by `Ok(_)` from the concrete step loop.
//! - [`ImplementationBug`]: an internal invariant violation (stack
//!   underflow, unhandled opcode, out-of-range heap index or bytecode
//!   offset). Fails fast; carries enough state to debug without rerunning.
//! - [`CliError`]: an input error (malformed method ID, unparseable
//!   argument tuple). Aborts the current run with a usage exit code; a
//!   fuzz campaign over several methods skips the offending method and
//!   continues.

use std::fmt;

/// How one run of the concrete interpreter ended.
#[derive(Clone, Debug, PartialEq)]
pub enum RunOutcome {
    Ok,
    AssertionError,
    DivideByZero,
    NullPointer,
    OutOfBounds,
    NegativeArraySize,
    /// Step budget exhausted (`"*"`).
    Budget,
    /// A reference-returning entrypoint's string payload, presented verbatim.
    Returned(String),
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Ok => write!(f, "ok"),
            RunOutcome::AssertionError => write!(f, "assertion error"),
            RunOutcome::DivideByZero => write!(f, "divide by zero"),
            RunOutcome::NullPointer => write!(f, "null pointer"),
            RunOutcome::OutOfBounds => write!(f, "out of bounds"),
            RunOutcome::NegativeArraySize => write!(f, "negative array size"),
            RunOutcome::Budget => write!(f, "*"),
            RunOutcome::Returned(s) => write!(f, "{}", s),
        }
    }
}

/// An internal invariant was violated. Never converted to a [`RunOutcome`];
/// the driver logs the opcode, PC, and state, then propagates as fatal.
#[derive(Debug)]
pub struct ImplementationBug {
    pub message: String,
    pub method: String,
    pub pc: usize,
}

impl ImplementationBug {
    pub fn new(message: impl Into<String>, method: impl Into<String>, pc: usize) -> Self {
        let bug = ImplementationBug {
            message: message.into(),
            method: method.into(),
            pc,
        };
        tracing::error!(method = %bug.method, pc = bug.pc, "{}", bug.message);
        bug
    }
}

impl fmt::Display for ImplementationBug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "implementation bug at {}:{}: {}",
            self.method, self.pc, self.message
        )
    }
}

impl std::error::Error for ImplementationBug {}

/// Malformed input from the outside world: a method identifier or argument
/// tuple that doesn't parse.
#[derive(Debug)]
pub enum CliError {
    MalformedMethodId(String),
    MalformedInput(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::MalformedMethodId(s) => write!(f, "malformed method identifier: {}", s),
            CliError::MalformedInput(s) => write!(f, "malformed input argument: {}", s),
        }
    }
}

impl std::error::Error for CliError {}
