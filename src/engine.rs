use crate::blocking::{same_block, BlockingKeyFunction, CachedBlocking};
use crate::matching::{InvocationCounter, Matcher};
use crate::model::{AttributedRecord, PairKey, RecordCollection};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

/// What one comparison run produced.
#[derive(Clone, Debug, Default)]
pub struct MatchOutcome {
    /// Canonical keys of every accepted pair
    pub pairs: FxHashSet<PairKey>,
    pub invocations: InvocationCounter,
    pub elapsed: Duration,
    /// Set when the deadline cut the run short; `pairs` is then partial.
    pub truncated: bool,
}

///
/// Compares two record collections pair by pair, skipping pairs that fall
/// into different blocks.
///
pub struct MatchEngine<'a> {
    blocking: &'a dyn BlockingKeyFunction,
    matcher: &'a dyn Matcher,
    deadline: Option<Duration>,
}

impl<'a> MatchEngine<'a> {
    ///
    /// ## Arguments
    ///
    /// * `blocking` - Key function deciding which pairs are worth comparing.
    /// * `matcher` - Decides whether a compared pair is a match.
    ///
    pub fn new(blocking: &'a dyn BlockingKeyFunction, matcher: &'a dyn Matcher) -> Self {
        Self {
            blocking,
            matcher,
            deadline: None,
        }
    }

    /// Stops starting new outer-loop records once `deadline` has elapsed.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    ///
    /// Runs the comparison. Every unordered pair is looked at once, in the
    /// orientation `id1 <= id2`. Passing the same collection twice resolves
    /// duplicates within it; a record is never compared with itself, also
    /// when the second collection is a separately loaded copy of the first.
    ///
    pub fn run(&self, left: &RecordCollection, right: &RecordCollection) -> MatchOutcome {
        let start = Instant::now();
        let same_collection = std::ptr::eq(left, right);

        let left_keys = block_keys(self.blocking, left);
        let right_owned;
        let right_keys = if same_collection {
            &left_keys
        } else {
            right_owned = block_keys(self.blocking, right);
            &right_owned
        };

        let outer: Vec<&AttributedRecord> = left.records().collect();
        let inner: Vec<&AttributedRecord> = right.records().collect();
        let truncated = AtomicBool::new(false);

        let (pairs, invocations) = outer
            .par_iter()
            .fold(
                || (FxHashSet::default(), InvocationCounter::new()),
                |(mut pairs, mut counter), &r1| {
                    if self.deadline.is_some_and(|d| start.elapsed() >= d) {
                        truncated.store(true, Ordering::Relaxed);
                        return (pairs, counter);
                    }
                    let id1 = r1.id();
                    let key1 = left_keys.cached_key(id1);
                    for &r2 in &inner {
                        let id2 = r2.id();
                        // the same record, whether or not both sides share storage
                        if id1 > id2 || (id1 == id2 && (same_collection || r1 == r2)) {
                            continue;
                        }
                        if !same_block(key1, right_keys.cached_key(id2)) {
                            continue;
                        }
                        if self.matcher.matches(r1, r2, &mut counter) {
                            pairs.insert(PairKey::new(id1, id2));
                        }
                    }
                    (pairs, counter)
                },
            )
            .reduce(
                || (FxHashSet::default(), InvocationCounter::new()),
                |(mut pairs, counter), (other_pairs, other_counter)| {
                    pairs.extend(other_pairs);
                    (pairs, counter.merge(other_counter))
                },
            );

        let outcome = MatchOutcome {
            pairs,
            invocations,
            elapsed: start.elapsed(),
            truncated: truncated.into_inner(),
        };
        info!(
            matcher = self.matcher.name(),
            blocking = self.blocking.name(),
            matched = outcome.pairs.len(),
            invocations = outcome.invocations.count(),
            truncated = outcome.truncated,
            "Matching completed in {:.4} secs",
            outcome.elapsed.as_secs_f64()
        );
        outcome
    }
}

/// Blocking keys of a whole collection, computed before the comparison fans out.
fn block_keys<'b>(
    blocking: &'b dyn BlockingKeyFunction,
    collection: &RecordCollection,
) -> CachedBlocking<&'b dyn BlockingKeyFunction> {
    let mut cache = CachedBlocking::new(blocking);
    for record in collection.records() {
        cache.blocking_key(record);
    }
    cache
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocking::{DecadeBlocking, NoBlocking, TitleInitialBlocking};
    use crate::matching::{title_matcher, SimpleMatcher};
    use crate::similarity::LevenshteinSimilarity;

    fn catalogs() -> (RecordCollection, RecordCollection) {
        let left = [
            AttributedRecord::new("a1")
                .with("title", ["Half Life"])
                .with("release", ["1998-11-08"]),
            AttributedRecord::new("a2")
                .with("title", ["Myst"])
                .with("release", ["1993-09-24"]),
            AttributedRecord::new("a3").with("title", ["Portal"]),
            AttributedRecord::new("c9")
                .with("title", ["Thief"])
                .with("release", ["1998-11-30"]),
        ]
        .into_iter()
        .collect();
        let right = [
            AttributedRecord::new("b1")
                .with("title", ["Half-Life"])
                .with("release", ["1998-11-19"]),
            AttributedRecord::new("b2")
                .with("title", ["Myst"])
                .with("release", ["2001-01-01"]),
            AttributedRecord::new("b3")
                .with("title", ["Portal"])
                .with("release", ["2007-10-10"]),
            AttributedRecord::new("b4")
                .with("title", ["Thief: The Dark Project"])
                .with("release", ["1998-11-30"]),
        ]
        .into_iter()
        .collect();
        (left, right)
    }

    fn key(a: &str, b: &str) -> PairKey {
        PairKey::new(a, b)
    }

    #[test]
    fn matches_across_collections_without_blocking() {
        let (left, right) = catalogs();
        let matcher = title_matcher();
        let outcome = MatchEngine::new(&NoBlocking, &matcher).run(&left, &right);
        let expected: FxHashSet<PairKey> =
            [key("a1", "b1"), key("a2", "b2"), key("a3", "b3")].into_iter().collect();
        assert_eq!(outcome.pairs, expected);
        assert!(!outcome.truncated);
        // c9 sorts after every id in `right`, so it is never the first element
        assert_eq!(outcome.invocations.count(), 12);
    }

    #[test]
    fn unordered_pair_is_evaluated_once() {
        let (left, right) = catalogs();
        let mut union = left.clone();
        union.extend(right.clone());
        let matcher = SimpleMatcher::new("title", LevenshteinSimilarity, 0.0);
        let outcome = MatchEngine::new(&NoBlocking, &matcher).run(&union, &union);
        let n = union.len() as u64;
        assert_eq!(outcome.invocations.count(), n * (n - 1) / 2);
        assert_eq!(outcome.pairs.len() as u64, n * (n - 1) / 2);
    }

    #[test]
    fn self_resolution_never_pairs_a_record_with_itself() {
        let (left, _) = catalogs();
        let matcher = SimpleMatcher::new("title", LevenshteinSimilarity, 0.0);
        let outcome = MatchEngine::new(&NoBlocking, &matcher).run(&left, &left);
        assert!(outcome.pairs.iter().all(|pair| pair.left != pair.right));
        assert_eq!(outcome.pairs.len(), 6);
    }

    #[test]
    fn copied_collection_never_pairs_a_record_with_itself() {
        let (left, _) = catalogs();
        let copy = left.clone();
        let matcher = SimpleMatcher::new("title", LevenshteinSimilarity, 0.0);
        let outcome = MatchEngine::new(&NoBlocking, &matcher).run(&left, &copy);
        assert!(outcome.pairs.iter().all(|pair| pair.left != pair.right));
        assert_eq!(outcome.pairs.len(), 6);
        assert_eq!(outcome.invocations.count(), 6);
    }

    #[test]
    fn equal_ids_with_different_records_are_compared() {
        let left: RecordCollection = [AttributedRecord::new("x")
            .with("title", ["Doom"])
            .with("release", ["1993-12-10"])]
        .into_iter()
        .collect();
        let right: RecordCollection = [AttributedRecord::new("x")
            .with("title", ["Doom"])
            .with("release", ["1993-12-12"])]
        .into_iter()
        .collect();
        let matcher = title_matcher();
        let outcome = MatchEngine::new(&NoBlocking, &matcher).run(&left, &right);
        assert!(outcome.pairs.contains(&key("x", "x")));
    }

    #[test]
    fn blocking_only_removes_pairs() {
        let (left, right) = catalogs();
        let matcher = title_matcher();
        let full = MatchEngine::new(&NoBlocking, &matcher).run(&left, &right);
        let by_title = TitleInitialBlocking::default();
        let by_decade = DecadeBlocking::default();
        for blocking in [&by_title as &dyn BlockingKeyFunction, &by_decade] {
            let blocked = MatchEngine::new(blocking, &matcher).run(&left, &right);
            assert!(blocked.pairs.is_subset(&full.pairs));
            assert!(blocked.invocations.count() <= full.invocations.count());
        }
        let blocked = MatchEngine::new(&by_decade, &matcher).run(&left, &right);
        // Myst moved decades and a3 has no release date
        let expected: FxHashSet<PairKey> = [key("a1", "b1")].into_iter().collect();
        assert_eq!(blocked.pairs, expected);
    }

    #[test]
    fn elapsed_deadline_truncates_the_run() {
        let (left, right) = catalogs();
        let matcher = title_matcher();
        let outcome = MatchEngine::new(&NoBlocking, &matcher)
            .with_deadline(Duration::ZERO)
            .run(&left, &right);
        assert!(outcome.truncated);
        assert!(outcome.pairs.is_empty());
        assert_eq!(outcome.invocations.count(), 0);
    }
}
