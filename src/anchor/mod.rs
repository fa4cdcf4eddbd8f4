use crate::{HunkHeader, LineRange};

/// How a single hunk relates to a comment's line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The hunk lies entirely before the range; the range shifts by the delta.
    Precedes(i64),
    /// The hunk lies entirely after the range and does not affect it.
    Follows,
    /// The hunk touches at least one line of the range.
    Overlaps,
}

impl Resolution {
    pub fn outdated(self) -> bool {
        matches!(self, Resolution::Overlaps)
    }

    pub fn delta(self) -> i64 {
        match self {
            Resolution::Precedes(delta) => delta,
            Resolution::Follows | Resolution::Overlaps => 0,
        }
    }
}

/// Classify `hunk` against `range`.
///
/// A deletion or replacement that touches a boundary line of the range
/// overlaps it. An insertion directly after the range's last line does not,
/// and an insertion after a line before the range only pushes it down.
pub fn resolve(range: LineRange, hunk: &HunkHeader) -> Resolution {
    let cc_start = range.start;
    let cc_end = range.end();

    if hunk.old_span > 0 {
        let r_start = hunk.old_start;
        let r_end = hunk.old_start + hunk.old_span - 1;
        if r_end < cc_start {
            Resolution::Precedes(hunk.new_span - hunk.old_span)
        } else if r_start > cc_end {
            Resolution::Follows
        } else {
            Resolution::Overlaps
        }
    } else if hunk.old_start < cc_start {
        // pure insertion after old line `old_start`
        Resolution::Precedes(hunk.new_span)
    } else if hunk.old_start >= cc_end {
        Resolution::Follows
    } else {
        Resolution::Overlaps
    }
}

/// Fold [`resolve`] over one file's hunks and return `(outdated, delta)`.
///
/// Every hunk is compared against the original, unshifted range: all old-side
/// coordinates refer to the same old file. The first overlapping hunk makes
/// the result `(true, 0)`. Hunks must be sorted by `old_start`.
pub fn reposition(range: LineRange, hunks: &[HunkHeader]) -> (bool, i64) {
    let mut delta = 0;
    for hunk in hunks {
        match resolve(range, hunk) {
            Resolution::Precedes(d) => delta += d,
            Resolution::Follows => break,
            Resolution::Overlaps => return (true, 0),
        }
    }
    (false, delta)
}
