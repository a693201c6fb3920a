mod json;
mod propagator;

use std::collections::HashSet;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

pub use json::{ClassMapping, FieldMapping, JsonMappings, MethodMapping, VarMapping};
pub use propagator::{PropagationSummary, propagate_names};

use crate::env::ClassEnvironment;
use crate::model::{ClassId, EntityRef, MethodId, NameType, Side, VarId};

/// A method or field addressed by owner, name and descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberKey<'a> {
    pub owner: &'a str,
    pub name: &'a str,
    pub desc: &'a str,
}

/// A method argument or local variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VarKey<'a> {
    pub method: MemberKey<'a>,
    /// Position among the arguments, or among the locals.
    pub index: usize,
    pub lv_index: u16,
}

/// Receives names, one entity at a time.
pub trait MappingAcceptor {
    fn accept_class(&mut self, name: &str, mapped: &str) -> Result<()>;
    fn accept_class_comment(&mut self, name: &str, comment: &str) -> Result<()>;
    fn accept_method(&mut self, method: MemberKey<'_>, mapped: &str) -> Result<()>;
    fn accept_method_comment(&mut self, method: MemberKey<'_>, comment: &str) -> Result<()>;
    fn accept_method_arg(&mut self, arg: VarKey<'_>, mapped: &str) -> Result<()>;
    fn accept_method_arg_comment(&mut self, arg: VarKey<'_>, comment: &str) -> Result<()>;
    fn accept_method_var(&mut self, var: VarKey<'_>, mapped: &str) -> Result<()>;
    fn accept_field(&mut self, field: MemberKey<'_>, mapped: &str) -> Result<()>;
    fn accept_field_comment(&mut self, field: MemberKey<'_>, comment: &str) -> Result<()>;
}

/// Produces names by pushing them into an acceptor.
pub trait MappingSource {
    fn visit(&self, acceptor: &mut dyn MappingAcceptor) -> Result<()>;
}

/// Entities named by an import, and references that could not be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MappingImportSummary {
    pub classes: usize,
    pub methods: usize,
    pub fields: usize,
    pub args: usize,
    pub vars: usize,
    pub comments: usize,
    pub missing_classes: usize,
    pub missing_members: usize,
}

/// Apply names from `source` to the input classes of `side`.
///
/// Unknown classes are reported once each and skipped together with their
/// members. When the source fails, every mapped name of the side is cleared
/// before the error is returned.
pub fn read_mappings(
    env: &mut ClassEnvironment,
    side: Side,
    source: &dyn MappingSource,
) -> Result<MappingImportSummary> {
    let mut importer = Importer {
        env,
        side,
        warned: HashSet::new(),
        summary: MappingImportSummary::default(),
    };
    if let Err(error) = source.visit(&mut importer) {
        importer.env.clear_mappings(side);
        return Err(error)
            .with_context(|| format!("failed to import mappings for side {}", side.tag()));
    }
    let summary = importer.summary;
    info!(
        side = %side.tag(),
        classes = summary.classes,
        methods = summary.methods,
        fields = summary.fields,
        args = summary.args,
        vars = summary.vars,
        missing_classes = summary.missing_classes,
        missing_members = summary.missing_members,
        "imported mappings"
    );
    Ok(summary)
}

struct Importer<'e> {
    env: &'e mut ClassEnvironment,
    side: Side,
    warned: HashSet<String>,
    summary: MappingImportSummary,
}

impl Importer<'_> {
    fn class(&mut self, name: &str) -> Option<ClassId> {
        let found = self
            .env
            .get_class(self.side, name)
            .filter(|&id| self.env.class(id).side == Some(self.side));
        if found.is_none() {
            if self.warned.insert(name.to_string()) {
                self.summary.missing_classes += 1;
                warn!(side = %self.side.tag(), class = name, "mapping refers to an unknown class");
            }
        }
        found
    }

    fn method(&mut self, key: MemberKey<'_>) -> Option<MethodId> {
        let cls = self.class(key.owner)?;
        let found = self.env.class(cls).method(key.name, key.desc);
        if found.is_none() {
            self.summary.missing_members += 1;
        }
        found
    }

    fn field(&mut self, key: MemberKey<'_>) -> Option<EntityRef> {
        let cls = self.class(key.owner)?;
        let found = self.env.class(cls).field(key.name, key.desc);
        if found.is_none() {
            self.summary.missing_members += 1;
        }
        found.map(EntityRef::Field)
    }

    /// Match by local slot first, then by position.
    fn var(&mut self, key: VarKey<'_>, is_arg: bool) -> Option<VarId> {
        let method = self.method(key.method)?;
        let method = self.env.method(method);
        let vars = if is_arg { &method.args } else { &method.vars };
        let found = vars
            .iter()
            .copied()
            .find(|&id| {
                let var = self.env.var(id);
                var.lv_index == key.lv_index && (is_arg || var.index == key.index)
            })
            .or_else(|| vars.get(key.index).copied());
        if found.is_none() {
            self.summary.missing_members += 1;
        }
        found
    }
}

impl MappingAcceptor for Importer<'_> {
    fn accept_class(&mut self, name: &str, mapped: &str) -> Result<()> {
        if let Some(id) = self.class(name) {
            self.env.set_mapped_name(id.into(), Some(mapped.to_string()));
            self.summary.classes += 1;
        }
        Ok(())
    }

    fn accept_class_comment(&mut self, name: &str, comment: &str) -> Result<()> {
        if let Some(id) = self.class(name) {
            self.env.set_mapped_comment(id.into(), Some(comment.to_string()));
            self.summary.comments += 1;
        }
        Ok(())
    }

    fn accept_method(&mut self, method: MemberKey<'_>, mapped: &str) -> Result<()> {
        if let Some(id) = self.method(method) {
            self.env.set_mapped_name(id.into(), Some(mapped.to_string()));
            self.summary.methods += 1;
        }
        Ok(())
    }

    fn accept_method_comment(&mut self, method: MemberKey<'_>, comment: &str) -> Result<()> {
        if let Some(id) = self.method(method) {
            self.env.set_mapped_comment(id.into(), Some(comment.to_string()));
            self.summary.comments += 1;
        }
        Ok(())
    }

    fn accept_method_arg(&mut self, arg: VarKey<'_>, mapped: &str) -> Result<()> {
        if let Some(id) = self.var(arg, true) {
            self.env.set_mapped_name(id.into(), Some(mapped.to_string()));
            self.summary.args += 1;
        }
        Ok(())
    }

    fn accept_method_arg_comment(&mut self, arg: VarKey<'_>, comment: &str) -> Result<()> {
        if let Some(id) = self.var(arg, true) {
            self.env.set_mapped_comment(id.into(), Some(comment.to_string()));
            self.summary.comments += 1;
        }
        Ok(())
    }

    fn accept_method_var(&mut self, var: VarKey<'_>, mapped: &str) -> Result<()> {
        if let Some(id) = self.var(var, false) {
            self.env.set_mapped_name(id.into(), Some(mapped.to_string()));
            self.summary.vars += 1;
        }
        Ok(())
    }

    fn accept_field(&mut self, field: MemberKey<'_>, mapped: &str) -> Result<()> {
        if let Some(entity) = self.field(field) {
            self.env.set_mapped_name(entity, Some(mapped.to_string()));
            self.summary.fields += 1;
        }
        Ok(())
    }

    fn accept_field_comment(&mut self, field: MemberKey<'_>, comment: &str) -> Result<()> {
        if let Some(entity) = self.field(field) {
            self.env.set_mapped_comment(entity, Some(comment.to_string()));
            self.summary.comments += 1;
        }
        Ok(())
    }
}

/// Name to export for an entity: its own mapped name, else what its match is called.
///
/// A match contributes its plain name when that is meaningful, otherwise its
/// mapped name.
pub fn export_name(env: &ClassEnvironment, entity: EntityRef) -> Option<String> {
    if let Some(mapped) = env.display_name(entity, NameType::Mapped) {
        return Some(mapped);
    }
    let partner = env.match_of(entity).filter(|&partner| partner != entity)?;
    if env.is_name_obfuscated(partner) {
        env.display_name(partner, NameType::Mapped)
    } else {
        env.display_name(partner, NameType::Plain)
    }
}

/// Push the export names of every input entity of `side` into `acceptor`.
pub fn save_mappings(
    env: &ClassEnvironment,
    side: Side,
    acceptor: &mut dyn MappingAcceptor,
) -> Result<()> {
    let renamed = |entity: EntityRef| {
        let plain = env.display_name(entity, NameType::Plain);
        export_name(env, entity).filter(|name| Some(name) != plain.as_ref())
    };
    for &cls in env.input_classes(side) {
        let class = env.class(cls);
        if let Some(name) = renamed(cls.into()) {
            acceptor.accept_class(&class.name, &name)?;
        }
        if let Some(comment) = &class.mapped_comment {
            acceptor.accept_class_comment(&class.name, comment)?;
        }

        for &id in &class.methods {
            let method = env.method(id);
            if !method.real {
                continue;
            }
            let key = MemberKey {
                owner: &class.name,
                name: &method.name,
                desc: &method.desc,
            };
            if let Some(name) = renamed(id.into()) {
                acceptor.accept_method(key, &name)?;
            }
            if let Some(comment) = &method.mapped_comment {
                acceptor.accept_method_comment(key, comment)?;
            }
            for &arg in &method.args {
                let var = env.var(arg);
                let arg_key = VarKey {
                    method: key,
                    index: var.index,
                    lv_index: var.lv_index,
                };
                if let Some(name) = renamed(arg.into()) {
                    acceptor.accept_method_arg(arg_key, &name)?;
                }
                if let Some(comment) = &var.mapped_comment {
                    acceptor.accept_method_arg_comment(arg_key, comment)?;
                }
            }
            for &local in &method.vars {
                let var = env.var(local);
                if let Some(name) = renamed(local.into()) {
                    let var_key = VarKey {
                        method: key,
                        index: var.index,
                        lv_index: var.lv_index,
                    };
                    acceptor.accept_method_var(var_key, &name)?;
                }
            }
        }

        for &id in &class.fields {
            let field = env.field(id);
            if !field.real {
                continue;
            }
            let key = MemberKey {
                owner: &class.name,
                name: &field.name,
                desc: &field.desc,
            };
            if let Some(name) = renamed(id.into()) {
                acceptor.accept_field(key, &name)?;
            }
            if let Some(comment) = &field.mapped_comment {
                acceptor.accept_field_comment(key, comment)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::*;

    struct Failing;

    impl MappingSource for Failing {
        fn visit(&self, acceptor: &mut dyn MappingAcceptor) -> Result<()> {
            acceptor.accept_class("a", "Renamed")?;
            anyhow::bail!("truncated mapping file")
        }
    }

    fn sample() -> ClassEnvironment {
        let build = |name: &str| {
            let mut class = class(name, Some("java/lang/Object"));
            class.methods.push(method("m", "(I)V", Vec::new()));
            class.fields.push(field("f", "I"));
            class
        };
        build_env(vec![build("a")], vec![build("b")])
    }

    #[test]
    fn import_names_entities_and_counts_misses() {
        let mut env = sample();
        let mut mappings = JsonMappings::default();
        mappings.accept_class("a", "Account").expect("class");
        let key = MemberKey {
            owner: "a",
            name: "m",
            desc: "(I)V",
        };
        mappings.accept_method(key, "deposit").expect("method");
        mappings.accept_method_arg(VarKey { method: key, index: 0, lv_index: 1 }, "amount").expect("arg");
        mappings
            .accept_field(MemberKey { owner: "a", name: "f", desc: "I" }, "balance")
            .expect("field");
        mappings.accept_class("missing/Type", "Ghost").expect("class");
        mappings
            .accept_method(MemberKey { owner: "missing/Type", name: "x", desc: "()V" }, "y")
            .expect("method");
        mappings
            .accept_field(MemberKey { owner: "missing/Type", name: "q", desc: "J" }, "w")
            .expect("field");
        mappings
            .accept_method(MemberKey { owner: "a", name: "gone", desc: "()V" }, "z")
            .expect("method");

        let summary = read_mappings(&mut env, Side::A, &mappings).expect("import");

        assert_eq!(1, summary.classes);
        assert_eq!(1, summary.methods);
        assert_eq!(1, summary.args);
        assert_eq!(1, summary.fields);
        assert_eq!(1, summary.missing_classes);
        assert_eq!(1, summary.missing_members);
        let m = method_id(&env, Side::A, "a", "m", "(I)V");
        assert_eq!(Some("deposit"), env.method(m).mapped_name());
        let arg = env.method(m).args()[0];
        assert_eq!(Some("amount"), env.var(arg).mapped_name());
    }

    #[test]
    fn failed_import_rolls_back_every_name() {
        let mut env = sample();
        let a = class_id(&env, Side::A, "a");
        env.set_mapped_name(a.into(), Some("Before".to_string()));

        let error = read_mappings(&mut env, Side::A, &Failing).expect_err("must fail");

        assert!(format!("{error:#}").contains("truncated mapping file"));
        assert_eq!(None, env.class(a).mapped_name());
    }

    #[test]
    fn export_prefers_own_name_then_the_match() {
        let mut env = sample();
        let (a, b) = (class_id(&env, Side::A, "a"), class_id(&env, Side::B, "b"));
        env.match_classes(a, b).expect("match");
        let (m_a, m_b) = (
            method_id(&env, Side::A, "a", "m", "(I)V"),
            method_id(&env, Side::B, "b", "m", "(I)V"),
        );
        env.match_methods(m_a, m_b).expect("match methods");
        env.set_mapped_name(b.into(), Some("Account".to_string()));
        env.set_mapped_name(m_a.into(), Some("deposit".to_string()));
        env.set_mapped_name(m_b.into(), Some("withdraw".to_string()));

        assert_eq!(Some("Account".to_string()), export_name(&env, a.into()));
        assert_eq!(Some("deposit".to_string()), export_name(&env, m_a.into()));

        let mut exported = JsonMappings::default();
        save_mappings(&env, Side::A, &mut exported).expect("save");
        let class = &exported.classes["a"];
        assert_eq!(Some("Account".to_string()), class.mapped);
        assert_eq!(Some("deposit".to_string()), class.methods[0].mapped);
    }
}
