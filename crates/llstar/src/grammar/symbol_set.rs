//! Sets of input symbols stored as sorted, non-overlapping inclusive ranges.
//!
//! Characters (as `u32` code points) and token types share the same
//! representation, so the automaton builder does not care which kind of
//! grammar it is analyzing.

use smallvec::SmallVec;
use std::fmt;

/// Highest Unicode scalar value, the upper bound of `.` in lexer rules.
pub const MAX_CHAR: u32 = 0x0010_FFFF;

/// A set of symbols made of sorted, merged inclusive ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolSet {
    ranges: SmallVec<[(u32, u32); 2]>,
}

impl SymbolSet {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(symbol: u32) -> Self {
        Self::range(symbol, symbol)
    }

    /// Inclusive range `lo..=hi`. Reversed bounds are swapped.
    #[must_use]
    pub fn range(lo: u32, hi: u32) -> Self {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let mut ranges = SmallVec::new();
        ranges.push((lo, hi));
        Self { ranges }
    }

    /// Builds a set from arbitrary (possibly overlapping) ranges.
    pub fn from_ranges(iter: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut ranges: SmallVec<[(u32, u32); 2]> = iter
            .into_iter()
            .map(|(lo, hi)| if lo <= hi { (lo, hi) } else { (hi, lo) })
            .collect();
        ranges.sort_unstable();
        Self {
            ranges: merge_sorted(ranges),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    #[must_use]
    pub fn ranges(&self) -> &[(u32, u32)] {
        &self.ranges
    }

    /// Number of symbols in the set.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|&(lo, hi)| u64::from(hi - lo) + 1)
            .sum()
    }

    #[must_use]
    pub fn contains(&self, symbol: u32) -> bool {
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if symbol < lo {
                    std::cmp::Ordering::Greater
                } else if symbol > hi {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// True when the whole range `lo..=hi` lies inside this set.
    #[must_use]
    pub fn covers(&self, lo: u32, hi: u32) -> bool {
        self.ranges.iter().any(|&(a, b)| a <= lo && hi <= b)
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self::from_ranges(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let (a_lo, a_hi) = self.ranges[i];
            let (b_lo, b_hi) = other.ranges[j];
            if a_hi < b_lo {
                i += 1;
            } else if b_hi < a_lo {
                j += 1;
            } else {
                return true;
            }
        }
        false
    }
}

fn merge_sorted(ranges: SmallVec<[(u32, u32); 2]>) -> SmallVec<[(u32, u32); 2]> {
    let mut merged: SmallVec<[(u32, u32); 2]> = SmallVec::with_capacity(ranges.len());
    for (lo, hi) in ranges {
        match merged.last_mut() {
            Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
            _ => merged.push((lo, hi)),
        }
    }
    merged
}

/// Splits the union of `sets` into disjoint elementary ranges such that every
/// returned range is either fully inside or fully outside each input set.
///
/// The result is sorted by lower bound.
pub fn partition<'a>(sets: impl IntoIterator<Item = &'a SymbolSet>) -> Vec<(u32, u32)> {
    let sets: Vec<&SymbolSet> = sets.into_iter().collect();
    // Boundaries are kept as u64 so that `hi + 1` never overflows.
    let mut bounds: Vec<u64> = sets
        .iter()
        .flat_map(|set| set.ranges.iter())
        .flat_map(|&(lo, hi)| [u64::from(lo), u64::from(hi) + 1])
        .collect();
    bounds.sort_unstable();
    bounds.dedup();

    let mut atoms = Vec::with_capacity(bounds.len());
    for pair in bounds.windows(2) {
        let lo = pair[0] as u32;
        let hi = (pair[1] - 1) as u32;
        if sets.iter().any(|set| set.covers(lo, hi)) {
            atoms.push((lo, hi));
        }
    }
    atoms
}

/// Renders a symbol for messages: printable characters are quoted, anything
/// else is shown as a number.
#[must_use]
pub fn display_symbol(symbol: u32) -> String {
    match char::from_u32(symbol) {
        Some(c) if !c.is_control() && symbol < 0x7f => format!("'{c}'"),
        _ => symbol.to_string(),
    }
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ranges.len() != 1 {
            f.write_str("{")?;
        }
        for (i, &(lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            if lo == hi {
                f.write_str(&display_symbol(lo))?;
            } else {
                write!(f, "{}..{}", display_symbol(lo), display_symbol(hi))?;
            }
        }
        if self.ranges.len() != 1 {
            f.write_str("}")?;
        }
        Ok(())
    }
}
