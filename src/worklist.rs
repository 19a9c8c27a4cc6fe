//! # Worklist Driver (spec §4.G)
//!
//! FIFO exploration of the abstract state space, grounded on
//! `signInterpreter.py::run_all`: dequeue a state, step it, enqueue every
//! successor, collect every terminal string into a set. `"*"` is added if
//! the global step budget is exhausted before the queue drains.

use std::collections::{HashSet, VecDeque};

use crate::bytecode::MethodResolver;
use crate::bytecode::cache::BytecodeCache;
use crate::error::ImplementationBug;
use crate::interp::abstract_step::{self, AbstractOutcome, AbstractState};

/// Default global step budget for one worklist run (spec §4.G / §4.I:
/// same order of magnitude as the concrete per-run budget).
pub const DEFAULT_BUDGET: usize = 1000;

/// Run the abstract interpreter to exhaustion (or budget exhaustion),
/// collecting every distinct terminal outcome reached from `initial`.
pub fn run_all<R: MethodResolver>(
    cache: &mut BytecodeCache<R>,
    initial: AbstractState,
    budget: usize,
) -> Result<HashSet<String>, ImplementationBug> {
    let mut results = HashSet::new();
    let mut worklist = VecDeque::new();
    worklist.push_back(initial);
    let mut steps = 0usize;

    while let Some(state) = worklist.pop_front() {
        if steps >= budget {
            results.insert("*".to_string());
            break;
        }
        steps += 1;

        for outcome in abstract_step::step(cache, state)? {
            match outcome {
                AbstractOutcome::Next(next) => worklist.push_back(next),
                AbstractOutcome::Terminal(s) => {
                    results.insert(s);
                }
            }
        }
    }

    Ok(results)
}
