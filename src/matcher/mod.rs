mod auto;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

pub use auto::AutoMatchSummary;

use crate::classifier::ClassifierSet;
use crate::config::{MatcherConfig, ProjectConfig};
use crate::descriptor::MethodDescriptor;
use crate::env::{ClassEnvironment, EnvInputs, MatchingStatus};
use crate::error::MatchError;
use crate::mapping::{self, MappingAcceptor, MappingImportSummary, MappingSource, PropagationSummary};
use crate::model::{ClassId, ClassOrigin, EntityRef, FieldId, MethodId, Side, VarId};
use crate::progress::ProgressSink;

/// Pairs found by name equality before any scoring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UnobfuscatedSummary {
    pub classes: usize,
    pub methods: usize,
    pub fields: usize,
}

/// Matching session over one pair of inputs.
pub struct Matcher {
    env: ClassEnvironment,
    classifiers: ClassifierSet,
    config: MatcherConfig,
}

impl Matcher {
    pub fn new(classifiers: ClassifierSet, config: MatcherConfig) -> Self {
        let mut env = ClassEnvironment::default();
        env.set_assume_both_or_none_obfuscated(config.assume_both_or_none_obfuscated);
        Self {
            env,
            classifiers,
            config,
        }
    }

    /// Scan, decode and extract a project, replacing any previous state.
    pub fn init(&mut self, project: &ProjectConfig, progress: &dyn ProgressSink) -> Result<()> {
        project.validate()?;
        let inputs = EnvInputs::load(project)?;
        self.init_from_inputs(inputs, progress);
        Ok(())
    }

    /// Build the environment from already decoded inputs.
    pub fn init_from_inputs(&mut self, inputs: EnvInputs, progress: &dyn ProgressSink) {
        let mut env = ClassEnvironment::build(inputs, progress);
        env.set_assume_both_or_none_obfuscated(self.config.assume_both_or_none_obfuscated);
        self.env = env;
    }

    /// Discard the entity graph and every match.
    pub fn reset(&mut self) {
        self.env = ClassEnvironment::default();
        self.env
            .set_assume_both_or_none_obfuscated(self.config.assume_both_or_none_obfuscated);
    }

    pub fn env(&self) -> &ClassEnvironment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut ClassEnvironment {
        &mut self.env
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn classifiers(&self) -> &ClassifierSet {
        &self.classifiers
    }

    pub fn status(&self) -> MatchingStatus {
        self.env.status()
    }

    pub fn match_classes(&mut self, a: ClassId, b: ClassId) -> Result<(), MatchError> {
        self.env.match_classes(a, b)
    }

    pub fn match_methods(&mut self, a: MethodId, b: MethodId) -> Result<(), MatchError> {
        self.env.match_methods(a, b)
    }

    pub fn match_fields(&mut self, a: FieldId, b: FieldId) -> Result<(), MatchError> {
        self.env.match_fields(a, b)
    }

    pub fn match_vars(&mut self, a: VarId, b: VarId) -> Result<(), MatchError> {
        self.env.match_vars(a, b)
    }

    pub fn unmatch(&mut self, entity: EntityRef) {
        self.env.unmatch(entity);
    }

    pub fn set_matchable(&mut self, entity: EntityRef, matchable: bool) {
        self.env.set_matchable(entity, matchable);
    }

    /// Apply external names to one side; see [`mapping::read_mappings`].
    pub fn read_mappings(
        &mut self,
        side: Side,
        source: &dyn MappingSource,
    ) -> Result<MappingImportSummary> {
        mapping::read_mappings(&mut self.env, side, source)
    }

    /// Export one side's names; see [`mapping::save_mappings`].
    pub fn save_mappings(&self, side: Side, acceptor: &mut dyn MappingAcceptor) -> Result<()> {
        mapping::save_mappings(&self.env, side, acceptor)
    }

    pub fn propagate_names(&mut self) -> PropagationSummary {
        mapping::propagate_names(&mut self.env)
    }

    /// Pair classes and members whose names are meaningful and equal on both sides.
    pub fn match_unobfuscated(&mut self) -> UnobfuscatedSummary {
        let mut summary = UnobfuscatedSummary::default();

        let pairs: Vec<(ClassId, ClassId)> = self
            .env
            .input_classes(Side::A)
            .iter()
            .filter_map(|&a| {
                let class = self.env.class(a);
                if class.name_obfuscated || !class.matchable || self.env.class_match(a).is_some() {
                    return None;
                }
                let b = self.env.get_class(Side::B, &class.name)?;
                let other = self.env.class(b);
                let eligible = other.side == Some(Side::B)
                    && other.origin == ClassOrigin::Input
                    && !other.name_obfuscated
                    && other.matchable
                    && self.env.class_match(b).is_none();
                eligible.then_some((a, b))
            })
            .collect();
        for (a, b) in pairs {
            if self.env.match_classes(a, b).is_ok() {
                summary.classes += 1;
            }
        }

        let class_pairs: Vec<(ClassId, ClassId)> = self
            .env
            .input_classes(Side::A)
            .iter()
            .filter_map(|&a| self.env.class_match(a).map(|b| (a, b)))
            .filter(|&(a, b)| a != b)
            .collect();
        for (a, b) in class_pairs {
            for (method_a, method_b) in self.unobfuscated_method_pairs(a, b) {
                if self.env.method_match(method_a).is_none()
                    && self.env.method_match(method_b).is_none()
                    && self.env.match_methods(method_a, method_b).is_ok()
                {
                    summary.methods += 1;
                }
            }
            for (field_a, field_b) in self.unobfuscated_field_pairs(a, b) {
                if self.env.field_match(field_b).is_none()
                    && self.env.match_fields(field_a, field_b).is_ok()
                {
                    summary.fields += 1;
                }
            }
        }

        info!(
            classes = summary.classes,
            methods = summary.methods,
            fields = summary.fields,
            "matched unobfuscated names"
        );
        summary
    }

    /// Same name and descriptor, or a single same-named candidate with the same arity.
    fn unobfuscated_method_pairs(&self, a: ClassId, b: ClassId) -> Vec<(MethodId, MethodId)> {
        let env = &self.env;
        let eligible = |id: MethodId| {
            let method = env.method(id);
            method.real && method.matchable && !method.name_obfuscated && env.method_match(id).is_none()
        };
        let candidates_b: Vec<MethodId> = env
            .class(b)
            .methods
            .iter()
            .copied()
            .filter(|&id| eligible(id))
            .collect();

        let mut pairs = Vec::new();
        for &method_a in env.class(a).methods.iter().filter(|&&id| eligible(id)) {
            let (name, desc) = (&env.method(method_a).name, &env.method(method_a).desc);
            if let Some(exact) = env.class(b).method(name, desc).filter(|&id| eligible(id)) {
                pairs.push((method_a, exact));
                continue;
            }
            let same_name: Vec<MethodId> = candidates_b
                .iter()
                .copied()
                .filter(|&id| env.method(id).name == *name)
                .collect();
            let [single] = same_name.as_slice() else {
                continue;
            };
            let siblings_a = env
                .class(a)
                .methods
                .iter()
                .filter(|&&id| env.method(id).name == *name)
                .count();
            if siblings_a == 1 && same_arity(desc, &env.method(*single).desc) {
                debug!(method = %env.label(method_a.into()), "paired by name with a changed descriptor");
                pairs.push((method_a, *single));
            }
        }
        pairs
    }

    fn unobfuscated_field_pairs(&self, a: ClassId, b: ClassId) -> Vec<(FieldId, FieldId)> {
        let env = &self.env;
        let eligible = |id: FieldId| {
            let field = env.field(id);
            field.real && field.matchable && !field.name_obfuscated && env.field_match(id).is_none()
        };
        let mut pairs = Vec::new();
        for &field_a in env.class(a).fields.iter().filter(|&&id| eligible(id)) {
            let name = &env.field(field_a).name;
            let same_name: Vec<FieldId> = env
                .class(b)
                .fields
                .iter()
                .copied()
                .filter(|&id| eligible(id) && env.field(id).name == *name)
                .collect();
            let exact = same_name
                .iter()
                .copied()
                .find(|&id| env.field(id).desc == env.field(field_a).desc);
            let single = match same_name.as_slice() {
                [only] => Some(*only),
                _ => None,
            };
            if let Some(field_b) = exact.or(single) {
                pairs.push((field_a, field_b));
            }
        }
        pairs
    }
}

fn same_arity(a: &str, b: &str) -> bool {
    match (MethodDescriptor::parse(a), MethodDescriptor::parse(b)) {
        (Ok(a), Ok(b)) => a.args.len() == b.args.len(),
        _ => false,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::NamePatterns;
    use crate::env::testing::*;
    use crate::env::{ClassIndex, SideInputs};
    use crate::progress::NoProgress;

    pub(crate) fn matcher_for(
        a: Vec<crate::classfile::RawClass>,
        b: Vec<crate::classfile::RawClass>,
        readable: Option<&str>,
    ) -> Matcher {
        let patterns = NamePatterns {
            classes: readable.map(str::to_string),
            members: readable.map(str::to_string),
        }
        .compile()
        .expect("patterns");
        let inputs = EnvInputs {
            a: SideInputs {
                classes: a,
                patterns: patterns.clone(),
                ..SideInputs::default()
            },
            b: SideInputs {
                classes: b,
                patterns,
                ..SideInputs::default()
            },
            shared: ClassIndex::from_classes(vec![
                object(),
                class("java/lang/String", Some("java/lang/Object")),
            ]),
        };
        let mut matcher = Matcher::new(ClassifierSet::standard(), MatcherConfig::default());
        matcher.init_from_inputs(inputs, &NoProgress);
        matcher
    }

    #[test]
    fn unobfuscated_names_pair_classes_and_members() {
        let build = |extra: &str| {
            let mut main = class("app/Main", Some("java/lang/Object"));
            main.methods.push(method("run", "()V", Vec::new()));
            main.methods.push(method("helper", extra, Vec::new()));
            main.fields.push(field("count", "I"));
            main
        };
        let mut matcher = matcher_for(
            vec![build("(I)V")],
            vec![build("(J)V")],
            Some("app/.*|run|helper|count"),
        );

        let summary = matcher.match_unobfuscated();

        assert_eq!(1, summary.classes);
        assert_eq!(2, summary.methods);
        assert_eq!(1, summary.fields);
        let env = matcher.env();
        let main_a = class_id(env, Side::A, "app/Main");
        let helper_b = method_id(env, Side::B, "app/Main", "helper", "(J)V");
        assert_eq!(Some(class_id(env, Side::B, "app/Main")), env.class_match(main_a));
        assert_eq!(
            Some(helper_b),
            env.method_match(method_id(env, Side::A, "app/Main", "helper", "(I)V"))
        );
    }

    #[test]
    fn obfuscated_names_are_left_to_scoring() {
        let mut matcher = matcher_for(
            vec![class("a", Some("java/lang/Object"))],
            vec![class("a", Some("java/lang/Object"))],
            None,
        );
        assert_eq!(0, matcher.match_unobfuscated().classes);
        assert_eq!(0, matcher.status().matched_classes);
    }

    #[test]
    fn reset_drops_the_environment() {
        let mut matcher = matcher_for(
            vec![class("a", Some("java/lang/Object"))],
            vec![class("b", Some("java/lang/Object"))],
            None,
        );
        assert_eq!(1, matcher.status().total_classes);
        matcher.reset();
        assert_eq!(0, matcher.status().total_classes);
        assert_eq!(0, matcher.env().class_count());
    }
}
