use std::collections::HashMap;
use std::hash::Hash;
use std::time::Instant;

use dashmap::DashMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{Matcher, UnobfuscatedSummary};
use crate::classifier::util::{
    is_potentially_equal_class, is_potentially_equal_field, is_potentially_equal_method,
    is_potentially_equal_var,
};
use crate::classifier::{ClassifierLevel, ClassifierTable, check_rank, max_mismatch};
use crate::config::Thresholds;
use crate::env::{ClassEnvironment, MatchingStatus};
use crate::model::{ClassId, ClassOrigin, FieldId, MethodId, Side, VarId};
use crate::progress::{ProgressSink, ProgressTracker};

/// Outcome of [`Matcher::auto_match_all`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AutoMatchSummary {
    pub unobfuscated: UnobfuscatedSummary,
    pub classes: usize,
    pub methods: usize,
    pub fields: usize,
    pub args: usize,
    pub vars: usize,
    pub status: MatchingStatus,
}

impl Matcher {
    /// Run every automatic stage until no stage finds anything new.
    pub fn auto_match_all(&mut self, progress: &dyn ProgressSink) -> AutoMatchSummary {
        let started_at = Instant::now();
        let config = self.config;
        let mut summary = AutoMatchSummary {
            unobfuscated: self.match_unobfuscated(),
            ..AutoMatchSummary::default()
        };

        loop {
            let matched = self.auto_match_classes(ClassifierLevel::Initial, config.classes, progress);
            summary.classes += matched;
            if matched == 0 {
                break;
            }
        }

        for level in [
            ClassifierLevel::Intermediate,
            ClassifierLevel::Full,
            ClassifierLevel::Extra,
        ] {
            loop {
                let methods = self.auto_match_methods(level, config.methods, progress);
                let fields = self.auto_match_fields(level, config.fields, progress);
                let classes = self.auto_match_classes(level, config.classes, progress);
                summary.methods += methods;
                summary.fields += fields;
                summary.classes += classes;
                if methods + fields + classes == 0 {
                    break;
                }
            }
        }

        loop {
            let matched = self.auto_match_method_args(ClassifierLevel::Full, config.args, progress);
            summary.args += matched;
            if matched == 0 {
                break;
            }
        }
        loop {
            let matched =
                self.auto_match_method_vars(false, ClassifierLevel::Full, config.vars, progress);
            summary.vars += matched;
            if matched == 0 {
                break;
            }
        }

        summary.status = self.status();
        info!(
            classes = summary.classes,
            methods = summary.methods,
            fields = summary.fields,
            args = summary.args,
            vars = summary.vars,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "auto matching finished"
        );
        summary
    }

    /// Match obfuscated input classes of side A against side B's.
    pub fn auto_match_classes(
        &mut self,
        level: ClassifierLevel,
        thresholds: Thresholds,
        progress: &dyn ProgressSink,
    ) -> usize {
        let env = &self.env;
        let eligible = |id: ClassId| {
            let class = env.class(id);
            class.origin == ClassOrigin::Input
                && class.matchable
                && class.name_obfuscated
                && !class.is_synthetic()
                && env.class_match(id).is_none()
        };
        let subjects: Vec<ClassId> = env
            .input_classes(Side::A)
            .iter()
            .copied()
            .filter(|&id| eligible(id))
            .collect();
        let candidates: Vec<ClassId> = env
            .input_classes(Side::B)
            .iter()
            .copied()
            .filter(|&id| eligible(id))
            .collect();

        let table = &self.classifiers.classes;
        let tracker = ProgressTracker::new(progress, subjects.len());
        let proposals = DashMap::new();
        subjects.par_iter().for_each(|&subject| {
            let pool: Vec<ClassId> = candidates
                .iter()
                .copied()
                .filter(|&candidate| is_potentially_equal_class(env, subject, candidate))
                .collect();
            if let Some(winner) = pick(table, subject, &pool, level, thresholds, env) {
                proposals.insert(subject, winner);
            }
            tracker.item_done();
        });

        let pairs = sanitize(proposals);
        let mut matched = 0;
        for (a, b) in pairs {
            if self.env.class_match(a).is_some() || self.env.class_match(b).is_some() {
                continue;
            }
            match self.env.match_classes(a, b) {
                Ok(()) => matched += 1,
                Err(error) => warn!(%error, "skipping proposed class match"),
            }
        }
        info!(?level, subjects = subjects.len(), matched, "auto matched classes");
        matched
    }

    /// Match methods inside every matched class pair.
    pub fn auto_match_methods(
        &mut self,
        level: ClassifierLevel,
        thresholds: Thresholds,
        progress: &dyn ProgressSink,
    ) -> usize {
        let env = &self.env;
        let units = matched_class_pairs(env);
        let eligible = |id: MethodId| {
            let method = env.method(id);
            method.real && method.matchable && env.method_match(id).is_none()
        };

        let table = &self.classifiers.methods;
        let tracker = ProgressTracker::new(progress, units.len());
        let proposals = DashMap::new();
        units.par_iter().for_each(|&(class_a, class_b)| {
            let candidates: Vec<MethodId> = env
                .class(class_b)
                .methods
                .iter()
                .copied()
                .filter(|&id| eligible(id))
                .collect();
            for &subject in env.class(class_a).methods.iter().filter(|&&id| eligible(id)) {
                let pool: Vec<MethodId> = candidates
                    .iter()
                    .copied()
                    .filter(|&candidate| is_potentially_equal_method(env, subject, candidate))
                    .collect();
                if let Some(winner) = pick(table, subject, &pool, level, thresholds, env) {
                    proposals.insert(subject, winner);
                }
            }
            tracker.item_done();
        });

        let pairs = sanitize(proposals);
        let mut matched = 0;
        for (a, b) in pairs {
            // Hierarchy cascades of earlier pairs may already have covered these.
            if self.env.method_match(a).is_some() || self.env.method_match(b).is_some() {
                continue;
            }
            match self.env.match_methods(a, b) {
                Ok(()) => matched += 1,
                Err(error) => warn!(%error, "skipping proposed method match"),
            }
        }
        info!(?level, classes = units.len(), matched, "auto matched methods");
        matched
    }

    /// Match fields inside every matched class pair.
    pub fn auto_match_fields(
        &mut self,
        level: ClassifierLevel,
        thresholds: Thresholds,
        progress: &dyn ProgressSink,
    ) -> usize {
        let env = &self.env;
        let units = matched_class_pairs(env);
        let eligible = |id: FieldId| {
            let field = env.field(id);
            field.real && field.matchable && env.field_match(id).is_none()
        };

        let table = &self.classifiers.fields;
        let tracker = ProgressTracker::new(progress, units.len());
        let proposals = DashMap::new();
        units.par_iter().for_each(|&(class_a, class_b)| {
            let candidates: Vec<FieldId> = env
                .class(class_b)
                .fields
                .iter()
                .copied()
                .filter(|&id| eligible(id))
                .collect();
            for &subject in env.class(class_a).fields.iter().filter(|&&id| eligible(id)) {
                let pool: Vec<FieldId> = candidates
                    .iter()
                    .copied()
                    .filter(|&candidate| is_potentially_equal_field(env, subject, candidate))
                    .collect();
                if let Some(winner) = pick(table, subject, &pool, level, thresholds, env) {
                    proposals.insert(subject, winner);
                }
            }
            tracker.item_done();
        });

        let pairs = sanitize(proposals);
        let mut matched = 0;
        for (a, b) in pairs {
            if self.env.field_match(a).is_some() || self.env.field_match(b).is_some() {
                continue;
            }
            match self.env.match_fields(a, b) {
                Ok(()) => matched += 1,
                Err(error) => warn!(%error, "skipping proposed field match"),
            }
        }
        info!(?level, classes = units.len(), matched, "auto matched fields");
        matched
    }

    pub fn auto_match_method_args(
        &mut self,
        level: ClassifierLevel,
        thresholds: Thresholds,
        progress: &dyn ProgressSink,
    ) -> usize {
        self.auto_match_method_vars(true, level, thresholds, progress)
    }

    /// Match arguments (`is_arg`) or local variables inside every matched method pair.
    pub fn auto_match_method_vars(
        &mut self,
        is_arg: bool,
        level: ClassifierLevel,
        thresholds: Thresholds,
        progress: &dyn ProgressSink,
    ) -> usize {
        let env = &self.env;
        let units: Vec<(MethodId, MethodId)> = matched_class_pairs(env)
            .into_iter()
            .flat_map(|(class_a, _)| env.class(class_a).methods.iter().copied())
            .filter_map(|method_a| {
                let method_b = env.method_match(method_a)?;
                (method_a != method_b).then_some((method_a, method_b))
            })
            .collect();
        let eligible = |id: VarId| env.var(id).matchable && env.var_match(id).is_none();

        let table = &self.classifiers.vars;
        let tracker = ProgressTracker::new(progress, units.len());
        let proposals = DashMap::new();
        units.par_iter().for_each(|&(method_a, method_b)| {
            let candidates: Vec<VarId> = method_vars(env, method_b, is_arg)
                .iter()
                .copied()
                .filter(|&id| eligible(id))
                .collect();
            for &subject in method_vars(env, method_a, is_arg).iter().filter(|&&id| eligible(id)) {
                let pool: Vec<VarId> = candidates
                    .iter()
                    .copied()
                    .filter(|&candidate| is_potentially_equal_var(env, subject, candidate))
                    .collect();
                if let Some(winner) = pick(table, subject, &pool, level, thresholds, env) {
                    proposals.insert(subject, winner);
                }
            }
            tracker.item_done();
        });

        let pairs = sanitize(proposals);
        let mut matched = 0;
        for (a, b) in pairs {
            if self.env.var_match(a).is_some() || self.env.var_match(b).is_some() {
                continue;
            }
            match self.env.match_vars(a, b) {
                Ok(()) => matched += 1,
                Err(error) => warn!(%error, "skipping proposed variable match"),
            }
        }
        info!(?level, is_arg, methods = units.len(), matched, "auto matched method variables");
        matched
    }
}

/// Matched pairs of side A input classes with side B input classes.
fn matched_class_pairs(env: &ClassEnvironment) -> Vec<(ClassId, ClassId)> {
    env.input_classes(Side::A)
        .iter()
        .filter_map(|&a| {
            let b = env.class_match(a)?;
            (env.class(b).side == Some(Side::B)).then_some((a, b))
        })
        .collect()
}

fn method_vars(env: &ClassEnvironment, method: MethodId, is_arg: bool) -> &[VarId] {
    let method = env.method(method);
    if is_arg { &method.args } else { &method.vars }
}

/// Rank a subject and return the winner if the ranking passes the acceptance test.
fn pick<I: Copy + Send + Sync>(
    table: &ClassifierTable<I>,
    subject: I,
    pool: &[I],
    level: ClassifierLevel,
    thresholds: Thresholds,
    env: &ClassEnvironment,
) -> Option<I> {
    if pool.is_empty() {
        return None;
    }
    let max_score = table.max_score(level);
    let ranking = table.rank(
        subject,
        pool,
        level,
        env,
        max_mismatch(max_score, thresholds),
    );
    check_rank(&ranking, max_score, thresholds).then(|| ranking[0].candidate)
}

/// Drop every proposal whose destination was proposed more than once.
///
/// The surviving pairs are returned sorted by subject.
fn sanitize<I: Copy + Ord + Hash + Eq>(proposals: DashMap<I, I>) -> Vec<(I, I)> {
    let mut pairs: Vec<(I, I)> = proposals.into_iter().collect();
    let mut hits: HashMap<I, usize> = HashMap::with_capacity(pairs.len());
    for &(_, destination) in &pairs {
        *hits.entry(destination).or_default() += 1;
    }
    let proposed = pairs.len();
    pairs.retain(|(_, destination)| hits[destination] == 1);
    if pairs.len() < proposed {
        debug!(dropped = proposed - pairs.len(), "dropped conflicting proposals");
    }
    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::{Constant, InstructionKind};
    use crate::env::testing::*;
    use crate::matcher::tests::matcher_for;
    use crate::progress::NoProgress;

    #[test]
    fn sanitize_drops_every_conflicting_destination() {
        let proposals = DashMap::new();
        proposals.insert(1u32, 10u32);
        proposals.insert(2, 10);
        proposals.insert(3, 11);
        proposals.insert(4, 12);
        proposals.insert(5, 12);
        proposals.insert(6, 12);

        assert_eq!(vec![(3, 11)], sanitize(proposals));
    }

    fn tagged(name: &str, tag: &str, count: i32) -> crate::classfile::RawClass {
        let mut class = class(name, Some("java/lang/Object"));
        let body = (0..count)
            .map(|index| InstructionKind::Constant(Constant::String(format!("{tag}-{index}"))))
            .collect();
        class.methods.push(method("a", "()V", body));
        class.fields.push(field("b", "I"));
        class
    }

    #[test]
    fn distinct_classes_converge_to_the_right_pairs() {
        let mut matcher = matcher_for(
            vec![tagged("a", "alpha", 3), tagged("b", "beta", 4)],
            vec![tagged("x", "beta", 4), tagged("y", "alpha", 3)],
            None,
        );

        let summary = matcher.auto_match_all(&NoProgress);

        let env = matcher.env();
        assert_eq!(
            Some(class_id(env, Side::B, "y")),
            env.class_match(class_id(env, Side::A, "a"))
        );
        assert_eq!(
            Some(class_id(env, Side::B, "x")),
            env.class_match(class_id(env, Side::A, "b"))
        );
        assert_eq!(2, summary.classes);
        assert_eq!(2, summary.status.matched_methods);
        assert_eq!(2, summary.status.matched_fields);
    }

    #[test]
    fn indistinguishable_classes_stay_unmatched() {
        let mut matcher = matcher_for(
            vec![tagged("a", "same", 2), tagged("b", "same", 2)],
            vec![tagged("x", "same", 2), tagged("y", "same", 2)],
            None,
        );

        let matched = matcher.auto_match_classes(
            ClassifierLevel::Initial,
            Thresholds::new(0.8, 0.08),
            &NoProgress,
        );

        assert_eq!(0, matched);
        assert_eq!(0, matcher.status().matched_classes);
    }

    #[test]
    fn auto_matches_are_injective() {
        let mut matcher = matcher_for(
            vec![tagged("a", "alpha", 3), tagged("b", "beta", 4), tagged("c", "gamma", 5)],
            vec![tagged("x", "beta", 4), tagged("y", "alpha", 3)],
            None,
        );
        matcher.auto_match_all(&NoProgress);

        let env = matcher.env();
        let mut targets: Vec<ClassId> = env
            .input_classes(Side::A)
            .iter()
            .filter_map(|&id| env.class_match(id))
            .collect();
        let count = targets.len();
        targets.sort();
        targets.dedup();
        assert_eq!(count, targets.len());
    }
}
