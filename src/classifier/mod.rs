mod class;
mod field;
mod method;
pub(crate) mod util;
mod var;

use serde::{Deserialize, Serialize};

use crate::config::Thresholds;
use crate::env::ClassEnvironment;
use crate::model::{ClassId, FieldId, MethodId, VarId};

/// Cost tier of a classifier, cheapest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClassifierLevel {
    Initial,
    Intermediate,
    Full,
    Extra,
}

impl ClassifierLevel {
    pub const ALL: [ClassifierLevel; 4] = [
        ClassifierLevel::Initial,
        ClassifierLevel::Intermediate,
        ClassifierLevel::Full,
        ClassifierLevel::Extra,
    ];
}

/// Metadata describing a classifier.
#[derive(Clone, Copy, Debug)]
pub struct ClassifierMetadata {
    pub name: &'static str,
    pub weight: f64,
    /// Cheapest level the classifier takes part in; it stays active above it.
    pub level: ClassifierLevel,
}

/// Scores how alike two entities of opposite sides are.
pub trait Classifier<I>: Send + Sync {
    fn metadata(&self) -> ClassifierMetadata;
    /// Similarity in `[0, 1]`; values outside are clamped by the ranker.
    fn score(&self, a: I, b: I, env: &ClassEnvironment) -> f64;
}

/// One scored candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RankResult<I> {
    pub candidate: I,
    /// Weighted sum of classifier scores, at most the level's max score.
    pub score: f64,
}

/// Classifiers for one entity kind.
pub struct ClassifierTable<I> {
    classifiers: Vec<Box<dyn Classifier<I>>>,
}

impl<I> Default for ClassifierTable<I> {
    fn default() -> Self {
        Self {
            classifiers: Vec::new(),
        }
    }
}

impl<I: Copy + Send + Sync> ClassifierTable<I> {
    pub fn add(&mut self, classifier: Box<dyn Classifier<I>>) {
        self.classifiers.push(classifier);
    }

    pub fn active(&self, level: ClassifierLevel) -> impl Iterator<Item = &dyn Classifier<I>> {
        self.classifiers
            .iter()
            .map(|classifier| classifier.as_ref())
            .filter(move |classifier| classifier.metadata().level <= level)
    }

    /// Sum of the weights active at `level`.
    pub fn max_score(&self, level: ClassifierLevel) -> f64 {
        self.active(level)
            .map(|classifier| classifier.metadata().weight)
            .sum()
    }

    /// Score `subject` against every candidate, best first.
    ///
    /// A candidate is dropped as soon as its accumulated weighted mismatch
    /// exceeds `max_mismatch`.
    pub fn rank(
        &self,
        subject: I,
        candidates: &[I],
        level: ClassifierLevel,
        env: &ClassEnvironment,
        max_mismatch: f64,
    ) -> Vec<RankResult<I>> {
        let active: Vec<(&dyn Classifier<I>, f64)> = self
            .active(level)
            .map(|classifier| (classifier, classifier.metadata().weight))
            .collect();
        let mut results: Vec<RankResult<I>> = candidates
            .iter()
            .filter_map(|&candidate| {
                let (mut score, mut mismatch) = (0.0, 0.0);
                for &(classifier, weight) in &active {
                    let value = classifier.score(subject, candidate, env).clamp(0.0, 1.0);
                    score += value * weight;
                    mismatch += (1.0 - value) * weight;
                    if mismatch > max_mismatch {
                        return None;
                    }
                }
                Some(RankResult { candidate, score })
            })
            .collect();
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }
}

/// The classifiers of every entity kind, built once and handed to the matcher.
pub struct ClassifierSet {
    pub classes: ClassifierTable<ClassId>,
    pub methods: ClassifierTable<MethodId>,
    pub fields: ClassifierTable<FieldId>,
    pub vars: ClassifierTable<VarId>,
}

impl ClassifierSet {
    /// A set without classifiers, to be filled by the caller.
    pub fn empty() -> Self {
        Self {
            classes: ClassifierTable::default(),
            methods: ClassifierTable::default(),
            fields: ClassifierTable::default(),
            vars: ClassifierTable::default(),
        }
    }

    /// The built-in feature set.
    pub fn standard() -> Self {
        let mut set = Self::empty();
        class::register(&mut set.classes);
        method::register(&mut set.methods);
        field::register(&mut set.fields);
        var::register(&mut set.vars);
        set
    }
}

impl Default for ClassifierSet {
    fn default() -> Self {
        Self::standard()
    }
}

/// Map a raw score onto `[0, 1]`, favoring confident scores.
pub fn normalized_score(score: f64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    let ratio = (score / max_score).clamp(0.0, 1.0);
    ratio * ratio
}

/// Largest weighted mismatch a candidate may accumulate and still be accepted.
///
/// Anything pruned at this bound normalizes below `absolute * (1 - relative)`,
/// so it can neither win nor make an accepted winner ambiguous.
pub fn max_mismatch(max_score: f64, thresholds: Thresholds) -> f64 {
    max_score - (thresholds.absolute * (1.0 - thresholds.relative)).sqrt() * max_score
}

/// Accept the top candidate if it is confident and clearly ahead of the next one.
pub fn check_rank<I>(ranking: &[RankResult<I>], max_score: f64, thresholds: Thresholds) -> bool {
    let Some(top) = ranking.first() else {
        return false;
    };
    let score = normalized_score(top.score, max_score);
    if score < thresholds.absolute {
        return false;
    }
    match ranking.get(1) {
        None => true,
        Some(next) => normalized_score(next.score, max_score) < score * (1.0 - thresholds.relative),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranking(scores: &[f64]) -> Vec<RankResult<u32>> {
        scores
            .iter()
            .enumerate()
            .map(|(index, &score)| RankResult {
                candidate: index as u32,
                score,
            })
            .collect()
    }

    #[test]
    fn check_rank_accepts_a_clear_winner() {
        let thresholds = Thresholds::new(0.8, 0.1);
        assert!(check_rank(&ranking(&[10.0, 9.0]), 10.0, thresholds));
        assert!(check_rank(&ranking(&[9.5]), 10.0, thresholds));
    }

    #[test]
    fn check_rank_rejects_ambiguous_or_weak_rankings() {
        let thresholds = Thresholds::new(0.8, 0.1);
        assert!(!check_rank(&ranking(&[10.0, 9.5]), 10.0, thresholds));
        assert!(!check_rank(&ranking(&[8.5]), 10.0, thresholds));
        assert!(!check_rank(&ranking(&[]), 10.0, thresholds));
    }

    #[test]
    fn normalized_score_squares_the_ratio() {
        assert_eq!(1.0, normalized_score(10.0, 10.0));
        assert!((normalized_score(9.0, 10.0) - 0.81).abs() < 1e-12);
        assert_eq!(0.0, normalized_score(3.0, 0.0));
    }

    #[test]
    fn pruning_bound_never_hides_a_disqualifying_candidate() {
        let thresholds = Thresholds::new(0.8, 0.08);
        let max = 50.0;
        let bound = max_mismatch(max, thresholds);
        let pruned = max - bound - 1e-9;
        assert!(normalized_score(pruned, max) < thresholds.absolute * (1.0 - thresholds.relative));
    }

    struct Constant(f64, f64, ClassifierLevel);

    impl Classifier<u32> for Constant {
        fn metadata(&self) -> ClassifierMetadata {
            ClassifierMetadata {
                name: "constant",
                weight: self.1,
                level: self.2,
            }
        }

        fn score(&self, _a: u32, b: u32, _env: &ClassEnvironment) -> f64 {
            self.0 * f64::from(b)
        }
    }

    #[test]
    fn rank_sorts_by_weighted_score_and_respects_levels() {
        let mut table = ClassifierTable::default();
        table.add(Box::new(Constant(0.25, 4.0, ClassifierLevel::Initial)));
        table.add(Box::new(Constant(0.25, 6.0, ClassifierLevel::Full)));
        let env = ClassEnvironment::default();

        assert_eq!(4.0, table.max_score(ClassifierLevel::Initial));
        assert_eq!(10.0, table.max_score(ClassifierLevel::Extra));

        let results = table.rank(0, &[1, 4, 2], ClassifierLevel::Full, &env, f64::INFINITY);
        let order: Vec<u32> = results.iter().map(|result| result.candidate).collect();
        assert_eq!(vec![4, 2, 1], order);
        assert_eq!(10.0, results[0].score);

        let pruned = table.rank(0, &[1, 4], ClassifierLevel::Full, &env, 5.0);
        assert_eq!(1, pruned.len());
    }
}
