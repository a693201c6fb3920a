use serde::Serialize;
use tracing::info;

use crate::env::ClassEnvironment;
use crate::model::{EntityRef, MethodId, NameType};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PropagationSummary {
    pub methods: usize,
    pub args: usize,
    pub record_members: usize,
}

/// Copy mapped method and argument names to every hierarchy member lacking one.
///
/// The first name found in hierarchy order wins and is never overwritten.
pub fn propagate_names(env: &mut ClassEnvironment) -> PropagationSummary {
    let mut summary = PropagationSummary::default();
    for hierarchy in 0..env.hierarchies.len() {
        if env.hierarchies[hierarchy].len() < 2 {
            continue;
        }
        let members = env.hierarchies[hierarchy].clone();
        if fully_mapped(env, &members) {
            continue;
        }

        let name = members
            .iter()
            .find_map(|&member| env.method(member).mapped_name.clone());
        let arg_count = members
            .iter()
            .map(|&member| env.method(member).args.len())
            .max()
            .unwrap_or(0);
        let arg_names: Vec<Option<String>> = (0..arg_count)
            .map(|position| {
                members.iter().find_map(|&member| {
                    let arg = *env.method(member).args.get(position)?;
                    env.var(arg).mapped_name.clone()
                })
            })
            .collect();

        for &member in &members {
            if let Some(name) = &name
                && env.method(member).mapped_name.is_none()
            {
                env.set_mapped_name(member.into(), Some(name.clone()));
                summary.methods += 1;
            }
            let args = env.method(member).args.clone();
            for (arg, arg_name) in args.into_iter().zip(&arg_names) {
                if let Some(arg_name) = arg_name
                    && env.var(arg).mapped_name.is_none()
                {
                    env.set_mapped_name(arg.into(), Some(arg_name.clone()));
                    summary.args += 1;
                }
            }
        }
    }

    summary.record_members = propagate_record_names(env);
    info!(
        methods = summary.methods,
        args = summary.args,
        record_members = summary.record_members,
        "propagated names"
    );
    summary
}

fn fully_mapped(env: &ClassEnvironment, members: &[MethodId]) -> bool {
    members.iter().all(|&member| {
        let method = env.method(member);
        method.mapped_name.is_some()
            && method
                .args
                .iter()
                .all(|&arg| env.var(arg).mapped_name.is_some())
    })
}

/// Give a record's backing field and accessor the same name when one of them is obfuscated.
fn propagate_record_names(env: &mut ClassEnvironment) -> usize {
    let links: Vec<_> = env
        .classes
        .iter()
        .filter(|class| !class.is_shared())
        .flat_map(|class| class.record_components.iter().copied())
        .collect();
    let mut renamed = 0;
    for link in links {
        let Some(accessor) = link.accessor else {
            continue;
        };
        let field: EntityRef = link.field.into();
        let method: EntityRef = accessor.into();
        for (target, source) in [(field, method), (method, field)] {
            if env.is_name_obfuscated(target)
                && mapped(env, target).is_none()
                && let Some(name) = known_name(env, source)
            {
                env.set_mapped_name(target, Some(name));
                renamed += 1;
            }
        }
    }
    renamed
}

fn mapped(env: &ClassEnvironment, entity: EntityRef) -> Option<String> {
    env.display_name(entity, NameType::Mapped)
}

/// A mapped name, or the plain name when it is meaningful.
fn known_name(env: &ClassEnvironment, entity: EntityRef) -> Option<String> {
    mapped(env, entity).or_else(|| {
        (!env.is_name_obfuscated(entity))
            .then(|| env.display_name(entity, NameType::Plain))
            .flatten()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::access;
    use crate::env::testing::*;
    use crate::model::Side;

    fn three_level_hierarchy() -> ClassEnvironment {
        let mut base = class("p", Some("java/lang/Object"));
        base.methods.push(method("m", "(I)V", Vec::new()));
        let mut middle = class("q", Some("p"));
        middle.methods.push(method("m", "(I)V", Vec::new()));
        let mut leaf = class("r", Some("q"));
        leaf.methods.push(method("m", "(I)V", Vec::new()));
        build_env(vec![base, middle, leaf], Vec::new())
    }

    #[test]
    fn first_mapped_name_reaches_every_member() {
        let mut env = three_level_hierarchy();
        let m1 = method_id(&env, Side::A, "p", "m", "(I)V");
        let m2 = method_id(&env, Side::A, "q", "m", "(I)V");
        let m3 = method_id(&env, Side::A, "r", "m", "(I)V");
        env.set_mapped_name(m1.into(), Some("foo".to_string()));
        let arg = env.method(m3).args()[0];
        env.set_mapped_name(arg.into(), Some("amount".to_string()));

        let first = propagate_names(&mut env);

        assert_eq!(2, first.methods);
        assert_eq!(2, first.args);
        for member in [m1, m2, m3] {
            assert_eq!(Some("foo"), env.method(member).mapped_name());
            let arg = env.method(member).args()[0];
            assert_eq!(Some("amount"), env.var(arg).mapped_name());
        }

        let second = propagate_names(&mut env);
        assert_eq!(PropagationSummary::default(), second);
        assert_eq!(Some("foo"), env.method(m2).mapped_name());
    }

    #[test]
    fn existing_names_are_never_overwritten() {
        let mut env = three_level_hierarchy();
        let m1 = method_id(&env, Side::A, "p", "m", "(I)V");
        let m3 = method_id(&env, Side::A, "r", "m", "(I)V");
        env.set_mapped_name(m1.into(), Some("foo".to_string()));
        env.set_mapped_name(m3.into(), Some("bar".to_string()));

        propagate_names(&mut env);

        assert_eq!(Some("bar"), env.method(m3).mapped_name());
    }

    #[test]
    fn static_methods_stay_alone() {
        let mut base = class("p", Some("java/lang/Object"));
        base.methods.push(with_access(
            method("m", "()V", Vec::new()),
            access::PUBLIC | access::STATIC,
        ));
        let mut leaf = class("r", Some("p"));
        leaf.methods.push(with_access(
            method("m", "()V", Vec::new()),
            access::PUBLIC | access::STATIC,
        ));
        let mut env = build_env(vec![base, leaf], Vec::new());
        let m1 = method_id(&env, Side::A, "p", "m", "()V");
        let m2 = method_id(&env, Side::A, "r", "m", "()V");
        env.set_mapped_name(m1.into(), Some("foo".to_string()));

        propagate_names(&mut env);

        assert_eq!(None, env.method(m2).mapped_name());
    }

    #[test]
    fn mapped_record_field_names_its_accessor() {
        let mut env = build_env(vec![record("p", &[("a", "I")])], Vec::new());
        let field = field_id(&env, Side::A, "p", "a", "I");
        let accessor = method_id(&env, Side::A, "p", "a", "()I");
        env.set_mapped_name(field.into(), Some("width".to_string()));

        let summary = propagate_names(&mut env);

        assert_eq!(1, summary.record_members);
        assert_eq!(Some("width"), env.method(accessor).mapped_name());
        assert_eq!(Some("width"), env.field(field).mapped_name());
    }

    #[test]
    fn mapped_record_accessor_names_its_field() {
        let mut env = build_env(vec![record("p", &[("a", "I"), ("b", "J")])], Vec::new());
        let accessor = method_id(&env, Side::A, "p", "b", "()J");
        env.set_mapped_name(accessor.into(), Some("height".to_string()));

        let summary = propagate_names(&mut env);

        assert_eq!(1, summary.record_members);
        let field = field_id(&env, Side::A, "p", "b", "J");
        assert_eq!(Some("height"), env.field(field).mapped_name());
        let other = field_id(&env, Side::A, "p", "a", "I");
        assert_eq!(None, env.field(other).mapped_name());
    }

    #[test]
    fn unnamed_record_components_stay_unnamed() {
        let mut env = build_env(vec![record("p", &[("a", "I")])], Vec::new());

        let summary = propagate_names(&mut env);

        assert_eq!(0, summary.record_members);
        let field = field_id(&env, Side::A, "p", "a", "I");
        let accessor = method_id(&env, Side::A, "p", "a", "()I");
        assert_eq!(None, env.field(field).mapped_name());
        assert_eq!(None, env.method(accessor).mapped_name());
    }
}
