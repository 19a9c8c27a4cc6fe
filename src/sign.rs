//! # Sign Lattice and Operators (spec §4.E)
//!
//! `SignSet` is a non-empty subset of `{-, 0, +, true, false}`, stored as a
//! `bitflags` bitset (five flags, union/intersection are bitwise or/and).
//! Arithmetic and comparison tables are a direct translation of
//! `original_source/solutions/signInterpreter.py`'s `Arithmetic` class,
//! member for member.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct SignSet: u8 {
        const NEG   = 0b00001;
        const ZERO  = 0b00010;
        const POS   = 0b00100;
        const TRUE  = 0b01000;
        const FALSE = 0b10000;
    }
}

impl SignSet {
    /// Abstract a concrete set of integers into the sign classes present.
    pub fn abstract_ints<I: IntoIterator<Item = i32>>(items: I) -> SignSet {
        let mut out = SignSet::empty();
        for x in items {
            match x.cmp(&0) {
                std::cmp::Ordering::Equal => out |= SignSet::ZERO,
                std::cmp::Ordering::Greater => out |= SignSet::POS,
                std::cmp::Ordering::Less => out |= SignSet::NEG,
            }
        }
        out
    }

    pub fn from_int(x: i32) -> SignSet {
        SignSet::abstract_ints([x])
    }

    pub fn from_bool(b: bool) -> SignSet {
        if b {
            SignSet::TRUE
        } else {
            SignSet::FALSE
        }
    }

    /// Abstract a float into its sign class.
    pub fn from_float(f: f64) -> SignSet {
        if f > 0.0 {
            SignSet::POS
        } else if f < 0.0 {
            SignSet::NEG
        } else {
            SignSet::ZERO
        }
    }

    pub fn booleans() -> SignSet {
        SignSet::TRUE | SignSet::FALSE
    }
}

impl fmt::Display for SignSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(SignSet::NEG) {
            parts.push("-");
        }
        if self.contains(SignSet::ZERO) {
            parts.push("0");
        }
        if self.contains(SignSet::POS) {
            parts.push("+");
        }
        if self.contains(SignSet::TRUE) {
            parts.push("true");
        }
        if self.contains(SignSet::FALSE) {
            parts.push("false");
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Sign-algebra arithmetic and comparisons, mirroring
/// `signInterpreter.py::Arithmetic` member for member.
pub struct Arithmetic;

/// Division/remainder additionally signal divide-by-zero when the divisor
/// set contains zero; the non-zero fragment (if any) is still returned.
pub struct DivResult {
    pub divide_by_zero: bool,
    pub result: SignSet,
}

impl Arithmetic {
    pub fn add(s1: SignSet, s2: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if s1.contains(SignSet::POS) || s2.contains(SignSet::POS) {
            out |= SignSet::POS;
        }
        if s1.contains(SignSet::NEG) || s2.contains(SignSet::NEG) {
            out |= SignSet::NEG;
        }
        if s1.contains(SignSet::ZERO) && s2.contains(SignSet::ZERO) {
            out |= SignSet::ZERO;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::POS))
        {
            out |= SignSet::ZERO;
        }
        out
    }

    pub fn subtract(s1: SignSet, s2: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if s1.contains(SignSet::POS) || s2.contains(SignSet::NEG) {
            out |= SignSet::POS;
        }
        if s1.contains(SignSet::NEG) || s2.contains(SignSet::POS) {
            out |= SignSet::NEG;
        }
        if s1.contains(SignSet::ZERO) && s2.contains(SignSet::ZERO) {
            out |= SignSet::ZERO;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::ZERO;
        }
        out
    }

    pub fn multiply(s1: SignSet, s2: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::POS;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::POS))
        {
            out |= SignSet::NEG;
        }
        if s1.contains(SignSet::ZERO) || s2.contains(SignSet::ZERO) {
            out |= SignSet::ZERO;
        }
        out
    }

    pub fn divide(s1: SignSet, s2: SignSet) -> DivResult {
        let mut out = SignSet::empty();
        let divide_by_zero = s2.contains(SignSet::ZERO);
        if s1.contains(SignSet::ZERO) {
            out |= SignSet::ZERO;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::POS;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::POS))
        {
            out |= SignSet::NEG;
        }
        DivResult {
            divide_by_zero,
            result: out,
        }
    }

    pub fn remainder(s1: SignSet, s2: SignSet) -> DivResult {
        let mut out = SignSet::empty();
        let divide_by_zero = s2.contains(SignSet::ZERO);
        if s1.contains(SignSet::ZERO) {
            out |= SignSet::ZERO;
        }
        if s1.contains(SignSet::POS) {
            out |= SignSet::POS;
        }
        if s1.contains(SignSet::NEG) {
            out |= SignSet::NEG;
        }
        DivResult {
            divide_by_zero,
            result: out,
        }
    }

    pub fn negate(s: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if s.contains(SignSet::POS) {
            out |= SignSet::NEG;
        }
        if s.contains(SignSet::NEG) {
            out |= SignSet::POS;
        }
        if s.contains(SignSet::ZERO) {
            out |= SignSet::ZERO;
        }
        out
    }

    pub fn less_than(s1: SignSet, s2: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if (s1.contains(SignSet::NEG) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::ZERO))
            || (s1.contains(SignSet::ZERO) && s2.contains(SignSet::POS))
        {
            out |= SignSet::TRUE;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::POS) && s2.contains(SignSet::ZERO))
            || (s1.contains(SignSet::ZERO) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::ZERO) && s2.contains(SignSet::ZERO))
        {
            out |= SignSet::FALSE;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::booleans();
        }
        out
    }

    pub fn less_equal(s1: SignSet, s2: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if (s1.contains(SignSet::NEG) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::ZERO))
            || (s1.contains(SignSet::ZERO) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::ZERO) && s2.contains(SignSet::ZERO))
        {
            out |= SignSet::TRUE;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::POS) && s2.contains(SignSet::ZERO))
            || (s1.contains(SignSet::ZERO) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::FALSE;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::booleans();
        }
        out
    }

    pub fn greater_than(s1: SignSet, s2: SignSet) -> SignSet {
        Arithmetic::less_than(s2, s1)
    }

    pub fn greater_equal(s1: SignSet, s2: SignSet) -> SignSet {
        Arithmetic::less_equal(s2, s1)
    }

    pub fn equal(s1: SignSet, s2: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if s1.contains(SignSet::ZERO) && s2.contains(SignSet::ZERO) {
            out |= SignSet::TRUE;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::booleans();
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::ZERO) && (s2.contains(SignSet::POS) || s2.contains(SignSet::NEG)))
            || ((s1.contains(SignSet::POS) || s1.contains(SignSet::NEG)) && s2.contains(SignSet::ZERO))
        {
            out |= SignSet::FALSE;
        }
        out
    }

    pub fn not_equal(s1: SignSet, s2: SignSet) -> SignSet {
        let mut out = SignSet::empty();
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::NEG))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::ZERO) && (s2.contains(SignSet::POS) || s2.contains(SignSet::NEG)))
            || ((s1.contains(SignSet::POS) || s1.contains(SignSet::NEG)) && s2.contains(SignSet::ZERO))
        {
            out |= SignSet::TRUE;
        }
        if s1.contains(SignSet::ZERO) && s2.contains(SignSet::ZERO) {
            out |= SignSet::FALSE;
        }
        if (s1.contains(SignSet::POS) && s2.contains(SignSet::POS))
            || (s1.contains(SignSet::NEG) && s2.contains(SignSet::NEG))
        {
            out |= SignSet::booleans();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `(superset, subset)` pairs, both non-empty, generated via submask
    /// enumeration rather than a full 31x31 scan.
    fn subset_pairs() -> Vec<(SignSet, SignSet)> {
        let mut pairs = Vec::new();
        for sup_bits in 1u8..32 {
            let mut sub_bits = sup_bits;
            loop {
                if sub_bits != 0 {
                    pairs.push((
                        SignSet::from_bits_truncate(sup_bits),
                        SignSet::from_bits_truncate(sub_bits),
                    ));
                }
                if sub_bits == 0 {
                    break;
                }
                sub_bits = (sub_bits - 1) & sup_bits;
            }
        }
        pairs
    }

    #[test]
    fn abstraction_of_mixed_signs() {
        let s = SignSet::abstract_ints([-3, 0, 5]);
        assert_eq!(s, SignSet::NEG | SignSet::ZERO | SignSet::POS);
    }

    #[test]
    fn opposite_signs_add_to_any_sign() {
        let plus = SignSet::POS;
        let minus = SignSet::NEG;
        let sum = Arithmetic::add(plus, minus);
        assert_eq!(sum, SignSet::POS | SignSet::NEG | SignSet::ZERO);
    }

    #[test]
    fn divide_by_set_containing_zero_flags_divide_by_zero() {
        let result = Arithmetic::divide(SignSet::POS, SignSet::ZERO | SignSet::POS);
        assert!(result.divide_by_zero);
        assert_eq!(result.result, SignSet::POS);
    }

    #[test]
    fn equal_same_concrete_sign_is_nondeterministic() {
        let eq = Arithmetic::equal(SignSet::POS, SignSet::POS);
        assert_eq!(eq, SignSet::booleans());
    }

    #[test]
    fn not_equal_zero_against_nonzero_is_always_true() {
        assert_eq!(Arithmetic::not_equal(SignSet::POS, SignSet::ZERO), SignSet::TRUE);
        assert_eq!(Arithmetic::not_equal(SignSet::ZERO, SignSet::NEG), SignSet::TRUE);
    }

    /// Monotonicity under set inclusion, brute-forced over every subset
    /// pair rather than a property-testing crate (none is in this corpus).
    #[test]
    fn arithmetic_is_monotone_under_inclusion() {
        let pairs = subset_pairs();
        let ops: Vec<fn(SignSet, SignSet) -> SignSet> = vec![
            Arithmetic::add,
            Arithmetic::subtract,
            Arithmetic::multiply,
            |a, b| Arithmetic::divide(a, b).result,
            |a, b| Arithmetic::remainder(a, b).result,
            Arithmetic::less_than,
            Arithmetic::less_equal,
            Arithmetic::greater_than,
            Arithmetic::greater_equal,
            Arithmetic::equal,
            Arithmetic::not_equal,
        ];
        for &op in &ops {
            for &(a1, a2) in &pairs {
                for &(b1, b2) in &pairs {
                    let small = op(a2, b2);
                    let big = op(a1, b1);
                    assert!(
                        big.contains(small),
                        "monotonicity violated: op({:?},{:?})={:?} not subset of op({:?},{:?})={:?}",
                        a2, b2, small, a1, b1, big
                    );
                }
            }
        }
    }
}
