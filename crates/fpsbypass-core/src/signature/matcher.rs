use memchr::memmem::Finder;

/// Scanner compiled from a signature.
///
/// Scanning seeds on the longest run of constant bytes with a substring
/// search, then checks the remaining pattern bytes only at candidate hits.
#[derive(Clone)]
pub struct CompiledMatcher {
    pattern: Vec<Option<u8>>,
    /// Offset of the seed run within the pattern.
    anchor_offset: usize,
    /// `None` when the pattern is all wildcards.
    finder: Option<Finder<'static>>,
    /// Pattern has no wildcards; a seed hit is a full match.
    exact: bool,
}

impl CompiledMatcher {
    pub fn new(pattern: &[Option<u8>]) -> Self {
        let (anchor_offset, anchor_len) = longest_constant_run(pattern);
        let finder = (anchor_len > 0).then(|| {
            let needle: Vec<u8> = pattern[anchor_offset..anchor_offset + anchor_len]
                .iter()
                .flatten()
                .copied()
                .collect();
            Finder::new(&needle).into_owned()
        });

        Self {
            pattern: pattern.to_vec(),
            anchor_offset,
            finder,
            exact: anchor_len == pattern.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Offset and length of the constant run used to seed the search.
    pub fn anchor(&self) -> (usize, usize) {
        let len = self.finder.as_ref().map_or(0, |f| f.needle().len());
        (self.anchor_offset, len)
    }

    /// Lowest offset in `buffer` where the whole pattern matches.
    pub fn scan(&self, buffer: &[u8]) -> Option<usize> {
        if self.pattern.is_empty() || buffer.len() < self.pattern.len() {
            return None;
        }

        let Some(finder) = &self.finder else {
            return Some(0);
        };

        if self.exact {
            return finder.find(buffer);
        }

        // Seed hits may overlap, so resume one byte past each candidate.
        let last = buffer.len() - self.pattern.len();
        let mut from = self.anchor_offset;
        while let Some(found) = buffer.get(from..).and_then(|rest| finder.find(rest)) {
            let hit = from + found;
            let start = hit - self.anchor_offset;
            if start > last {
                break;
            }
            if self.matches_at(buffer, start) {
                return Some(start);
            }
            from = hit + 1;
        }

        None
    }

    /// Check the pattern against `buffer` at `offset`.
    pub fn matches_at(&self, buffer: &[u8], offset: usize) -> bool {
        let Some(window) = offset
            .checked_add(self.pattern.len())
            .and_then(|end| buffer.get(offset..end))
        else {
            return false;
        };

        self.pattern
            .iter()
            .zip(window)
            .all(|(expected, actual)| expected.is_none_or(|b| b == *actual))
    }
}

/// Find the longest run of non-wildcard bytes, preferring the earliest on ties.
fn longest_constant_run(pattern: &[Option<u8>]) -> (usize, usize) {
    let mut best = (0, 0);
    let mut run_start = 0;
    let mut run_len = 0;

    for (i, byte) in pattern.iter().enumerate() {
        if byte.is_some() {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
            if run_len > best.1 {
                best = (run_start, run_len);
            }
        } else {
            run_len = 0;
        }
    }

    best
}
