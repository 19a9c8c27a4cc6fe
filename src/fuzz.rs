//! # Fuzz loop (spec §4.I)
//!
//! `FuzzCampaign` drives a seed-then-generate-or-mutate loop against any
//! interpretation function: seeded RNG, a global covered-offset set, a
//! dedup'd corpus of parent inputs that produced new coverage, and a
//! consecutive-no-new-coverage stall counter. Grounded on
//! `original_source/solutions/coverage_fuzzer.py`'s offset-set coverage
//! idea; the corpus/mutation/stall-counter machinery has no counterpart
//! there and is built directly from spec §4.I.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{ImplementationBug, RunOutcome};
use crate::method::Type;
use crate::sign::SignSet;
use crate::value::InputValue;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const STRING_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 _-";

#[derive(Clone, Debug)]
pub struct FuzzConfig {
    pub iterations: usize,
    pub stall_limit: usize,
    pub mutation_rate: f64,
    pub int_range: i32,
    pub max_str: usize,
    pub max_arr: usize,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        FuzzConfig {
            iterations: 1000,
            stall_limit: 40,
            mutation_rate: 0.5,
            int_range: 1000,
            max_str: 20,
            max_arr: 20,
        }
    }
}

/// One fuzz iteration's log entry (spec §6 log-line contract).
#[derive(Clone, Debug)]
pub struct IterationLog {
    pub new_edges: bool,
    pub input: Vec<InputValue>,
    pub outcome: RunOutcome,
}

impl IterationLog {
    /// `[+]`/`[-]` prefix, the input tuple encoding, then the outcome.
    pub fn format_line(&self) -> String {
        let prefix = if self.new_edges { "[+]" } else { "[-]" };
        format!("{} {} -> {}", prefix, encode_tuple(&self.input), self.outcome)
    }
}

#[derive(Clone, Debug)]
pub struct FuzzReport {
    pub logs: Vec<IterationLog>,
    pub covered: usize,
    pub total_offsets: usize,
    pub success: bool,
}

impl FuzzReport {
    /// Coverage, total offsets, iterations, wall-clock summary line.
    pub fn summary_line(&self, elapsed: std::time::Duration) -> String {
        format!(
            "covered {}/{} offsets in {} iterations ({:.3}s)",
            self.covered,
            self.total_offsets,
            self.logs.len(),
            elapsed.as_secs_f64()
        )
    }
}

/// `(v1, v2, ..., vn)`; the outer parens are dropped for a single value.
fn encode_tuple(values: &[InputValue]) -> String {
    if values.len() == 1 {
        values[0].encode()
    } else {
        let parts: Vec<String> = values.iter().map(InputValue::encode).collect();
        format!("({})", parts.join(", "))
    }
}

pub struct FuzzCampaign {
    rng: StdRng,
    config: FuzzConfig,
    /// Sign classes a prior worklist run (spec §4.G) proved can never reach
    /// `"ok"` for the entry method's lone int parameter — `generate`'s int
    /// range is narrowed away from them (spec §2: "G drives F for a
    /// secondary analysis path that narrows numeric generation ranges in
    /// I").
    sign_bias: SignSet,
}

impl FuzzCampaign {
    pub fn new(seed: Option<u64>, config: FuzzConfig) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        FuzzCampaign {
            rng,
            config,
            sign_bias: SignSet::empty(),
        }
    }

    /// Bias int generation away from `bias` (any of `POS`/`NEG`/`ZERO`):
    /// sign analysis showed that sign class of the lone int parameter never
    /// reaches `"ok"`, so there is little value in spending iterations deep
    /// in that half of the range.
    pub fn with_sign_bias(mut self, bias: SignSet) -> Self {
        self.sign_bias = bias;
        self
    }

    /// Run the campaign. `seeds` come from the syntactic hinter; `interpret`
    /// runs the concrete interpreter on one argument tuple, returning the
    /// terminal outcome and its visited-offset trace; `total_offsets` is
    /// the size of the entry method's own instruction stream (spec §5:
    /// coverage is scoped to the offsets known from the bytecode source).
    pub fn run(
        &mut self,
        params: &[Type],
        seeds: Vec<Vec<InputValue>>,
        total_offsets: usize,
        mut interpret: impl FnMut(&[InputValue]) -> Result<(RunOutcome, Vec<usize>), ImplementationBug>,
    ) -> Result<FuzzReport, ImplementationBug> {
        let mut covered = HashSet::new();
        let mut corpus: Vec<Vec<InputValue>> = Vec::new();
        let mut stall = 0usize;
        let mut logs = Vec::new();
        let mut success = false;

        for iteration in 0..self.config.iterations {
            let input = if iteration < seeds.len() {
                seeds[iteration].clone()
            } else if params.len() == 1 && !corpus.is_empty() && self.rng.gen_bool(self.config.mutation_rate.clamp(0.0, 1.0)) {
                let parent = &corpus[self.rng.gen_range(0..corpus.len())];
                vec![self.mutate(&parent[0], &params[0])]
            } else {
                params.iter().map(|t| self.generate(t)).collect()
            };

            let (outcome, trace) = interpret(&input)?;
            let new_edges: Vec<usize> = trace.iter().copied().filter(|o| !covered.contains(o)).collect();
            let had_new = !new_edges.is_empty();

            if had_new {
                covered.extend(new_edges);
                if !corpus.contains(&input) {
                    corpus.push(input.clone());
                }
                stall = 0;
            } else {
                stall += 1;
            }

            logs.push(IterationLog {
                new_edges: had_new,
                input,
                outcome,
            });

            if covered.len() >= total_offsets {
                success = true;
                break;
            }
            if stall >= self.config.stall_limit {
                break;
            }
        }

        Ok(FuzzReport {
            logs,
            covered: covered.len(),
            total_offsets,
            success,
        })
    }

    fn generate(&mut self, ty: &Type) -> InputValue {
        match ty {
            Type::Int | Type::Short => InputValue::Int(self.generate_biased_int()),
            Type::Float => InputValue::Float(self.rng.gen_range(-(self.config.int_range as f64)..=(self.config.int_range as f64))),
            Type::Boolean => InputValue::Boolean(self.rng.gen_bool(0.5)),
            Type::Char => InputValue::Char(self.random_letter()),
            Type::Void => InputValue::Null,
            Type::Object(name) if name == "java.lang.String" => InputValue::Str(self.random_string()),
            Type::Object(_) => InputValue::Null,
            Type::Array(elem) => {
                let len = self.rng.gen_range(0..=self.config.max_arr);
                let items = match elem.as_ref() {
                    Type::Int => (0..len).map(|_| InputValue::Int(self.rng.gen_range(-100..=100))).collect(),
                    Type::Char => (0..len).map(|_| InputValue::Char(self.random_letter())).collect(),
                    other => (0..len).map(|_| self.generate(other)).collect(),
                };
                InputValue::Array((**elem).clone(), items)
            }
        }
    }

    fn mutate(&mut self, v: &InputValue, ty: &Type) -> InputValue {
        match v {
            InputValue::Int(i) => InputValue::Int(i.wrapping_add(self.rng.gen_range(-10..=10))),
            InputValue::Float(f) => InputValue::Float(f + self.rng.gen_range(-1.0..=1.0)),
            InputValue::Boolean(b) => InputValue::Boolean(!b),
            InputValue::Char(_) => InputValue::Char(self.random_letter()),
            InputValue::Str(s) => InputValue::Str(self.mutate_string(s)),
            InputValue::Array(elem_ty, items) => {
                if items.is_empty() {
                    InputValue::Array(elem_ty.clone(), items.clone())
                } else {
                    let idx = self.rng.gen_range(0..items.len());
                    let mut mutated = items.clone();
                    mutated[idx] = self.mutate(&mutated[idx], elem_ty);
                    InputValue::Array(elem_ty.clone(), mutated)
                }
            }
            InputValue::Null => {
                // Unknown/unmodeled shape: regenerate from the declared type
                // rather than leave a sentinel null forever unmutated.
                if matches!(ty, Type::Object(name) if name != "java.lang.String") {
                    InputValue::Null
                } else {
                    self.generate(ty)
                }
            }
        }
    }

    fn mutate_string(&mut self, s: &str) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        if chars.is_empty() {
            chars.push(self.random_string_char());
            return chars.into_iter().collect();
        }
        match self.rng.gen_range(0..3) {
            0 if chars.len() < 100 => {
                let idx = self.rng.gen_range(0..=chars.len());
                chars.insert(idx, self.random_string_char());
            }
            1 => {
                let idx = self.rng.gen_range(0..chars.len());
                chars.remove(idx);
            }
            _ => {
                let idx = self.rng.gen_range(0..chars.len());
                chars[idx] = self.random_string_char();
            }
        }
        chars.into_iter().collect()
    }

    /// Uniform in `[-int_range, int_range]`, halved toward zero on whichever
    /// side `sign_bias` marks as unproductive.
    fn generate_biased_int(&mut self) -> i32 {
        let mut lo = -self.config.int_range;
        let mut hi = self.config.int_range;
        if self.sign_bias.contains(SignSet::POS) {
            hi /= 2;
        }
        if self.sign_bias.contains(SignSet::NEG) {
            lo /= 2;
        }
        self.rng.gen_range(lo..=hi)
    }

    fn random_letter(&mut self) -> char {
        LETTERS[self.rng.gen_range(0..LETTERS.len())] as char
    }

    fn random_string_char(&mut self) -> char {
        STRING_ALPHABET[self.rng.gen_range(0..STRING_ALPHABET.len())] as char
    }

    fn random_string(&mut self) -> String {
        let len = self.rng.gen_range(0..=self.config.max_str);
        (0..len).map(|_| self.random_string_char()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_offsets_covering_interpret(
        trace: Vec<usize>,
    ) -> impl FnMut(&[InputValue]) -> Result<(RunOutcome, Vec<usize>), ImplementationBug> {
        move |_| Ok((RunOutcome::Ok, trace.clone()))
    }

    #[test]
    fn seeds_are_tried_before_generation() {
        let mut campaign = FuzzCampaign::new(Some(1), FuzzConfig::default());
        let seeds = vec![vec![InputValue::Int(42)]];
        let mut seen_first = None;
        let report = campaign
            .run(&[Type::Int], seeds, 1, |input| {
                if seen_first.is_none() {
                    seen_first = Some(input.to_vec());
                }
                Ok((RunOutcome::Ok, vec![0]))
            })
            .unwrap();
        assert_eq!(seen_first, Some(vec![InputValue::Int(42)]));
        assert!(report.success);
    }

    #[test]
    fn stalls_after_no_new_coverage() {
        let mut campaign = FuzzCampaign::new(
            Some(7),
            FuzzConfig {
                iterations: 10_000,
                stall_limit: 5,
                ..FuzzConfig::default()
            },
        );
        let report = campaign
            .run(&[Type::Int], Vec::new(), 1000, total_offsets_covering_interpret(vec![0]))
            .unwrap();
        assert!(!report.success);
        // The first iteration always reports new coverage (nothing was
        // covered yet), then 5 consecutive stalls trip the limit.
        assert_eq!(report.logs.len(), 6);
    }

    #[test]
    fn reaching_total_offsets_stops_early_with_success() {
        let mut campaign = FuzzCampaign::new(Some(3), FuzzConfig::default());
        let report = campaign
            .run(&[Type::Int], Vec::new(), 2, total_offsets_covering_interpret(vec![0, 1]))
            .unwrap();
        assert!(report.success);
        assert_eq!(report.logs.len(), 1);
    }

    #[test]
    fn sign_bias_narrows_generation_toward_zero() {
        let mut campaign = FuzzCampaign::new(Some(2), FuzzConfig::default()).with_sign_bias(SignSet::POS);
        for _ in 0..50 {
            let v = campaign.generate_biased_int();
            assert!(v <= FuzzConfig::default().int_range / 2, "biased-away positive half should be halved, got {}", v);
        }
    }

    #[test]
    fn mutation_keeps_int_within_a_bounded_delta() {
        let mut campaign = FuzzCampaign::new(Some(5), FuzzConfig::default());
        let mutated = campaign.mutate(&InputValue::Int(100), &Type::Int);
        match mutated {
            InputValue::Int(i) => assert!((90..=110).contains(&i)),
            other => panic!("expected int, got {:?}", other),
        }
    }
}
