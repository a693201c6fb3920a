mod extract;
mod hierarchy;
mod inputs;
mod matching;
mod naming;

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use tracing::info;

pub use inputs::{ClassIndex, EnvInputs, SideInputs};

use crate::cache::MatchingCache;
use crate::descriptor::class_name_to_descriptor;
use crate::model::{
    ClassId, ClassInstance, EntityRef, FieldId, FieldInstance, MatchTable, MethodId,
    MethodInstance, MethodVarInstance, NameType, Side, VarId,
};
use crate::progress::ProgressSink;

/// Patterns selecting names that are known to be meaningful on one side.
///
/// Names matching a pattern are treated as not obfuscated; without a
/// pattern every input name is presumed obfuscated.
#[derive(Clone, Debug, Default)]
pub struct ObfuscationPatterns {
    pub class: Option<Regex>,
    pub member: Option<Regex>,
}

impl ObfuscationPatterns {
    pub fn is_class_obfuscated(&self, name: &str) -> bool {
        !self.class.as_ref().is_some_and(|pattern| pattern.is_match(name))
    }

    pub fn is_member_obfuscated(&self, name: &str) -> bool {
        if name == "<init>" || name == "<clinit>" {
            return false;
        }
        !self.member.as_ref().is_some_and(|pattern| pattern.is_match(name))
    }
}

/// Classes of one side, keyed by descriptor.
#[derive(Debug, Default)]
pub(crate) struct LocalEnv {
    pub(crate) classes: HashMap<String, ClassId>,
    /// Classes decoded from the side's inputs, sorted by name.
    pub(crate) inputs: Vec<ClassId>,
    pub(crate) patterns: ObfuscationPatterns,
}

/// Owner of the entity arena and the bidirectional match table.
#[derive(Debug, Default)]
pub struct ClassEnvironment {
    pub(crate) classes: Vec<ClassInstance>,
    pub(crate) methods: Vec<MethodInstance>,
    pub(crate) fields: Vec<FieldInstance>,
    pub(crate) vars: Vec<MethodVarInstance>,
    pub(crate) hierarchies: Vec<Vec<MethodId>>,
    pub(crate) local: [LocalEnv; 2],
    pub(crate) shared: HashMap<String, ClassId>,
    pub(crate) matches: MatchTable,
    pub(crate) cache: MatchingCache,
    pub(crate) assume_both_or_none_obfuscated: bool,
}

/// Matched and total entity counts over side A's input classes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MatchingStatus {
    pub total_classes: usize,
    pub matched_classes: usize,
    pub total_methods: usize,
    pub matched_methods: usize,
    pub total_fields: usize,
    pub matched_fields: usize,
    pub total_method_args: usize,
    pub matched_method_args: usize,
    pub total_method_vars: usize,
    pub matched_method_vars: usize,
}

impl ClassEnvironment {
    /// Run every extraction pass over the given inputs.
    pub fn build(inputs: EnvInputs, progress: &dyn ProgressSink) -> Self {
        let env = extract::build(inputs, progress);
        info!(
            classes = env.classes.len(),
            methods = env.methods.len(),
            fields = env.fields.len(),
            inputs_a = env.local[0].inputs.len(),
            inputs_b = env.local[1].inputs.len(),
            "class environment ready"
        );
        env
    }

    pub fn class(&self, id: ClassId) -> &ClassInstance {
        &self.classes[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodInstance {
        &self.methods[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldInstance {
        &self.fields[id.index()]
    }

    pub fn var(&self, id: VarId) -> &MethodVarInstance {
        &self.vars[id.index()]
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.classes.len()).map(ClassId::from_index)
    }

    /// Input classes of one side, ordered by name.
    pub fn input_classes(&self, side: Side) -> &[ClassId] {
        &self.local[side.slot()].inputs
    }

    /// Look up a class by internal name or descriptor, side-local first.
    pub fn get_class(&self, side: Side, name: &str) -> Option<ClassId> {
        let key = if name.starts_with('L') && name.ends_with(';') || name.starts_with('[') {
            name.to_string()
        } else {
            class_name_to_descriptor(name)
        };
        self.local[side.slot()]
            .classes
            .get(&key)
            .or_else(|| self.shared.get(&key))
            .copied()
    }

    /// Methods sharing `id`'s override identity, `id` included.
    pub fn hierarchy_members(&self, id: MethodId) -> &[MethodId] {
        &self.hierarchies[self.method(id).hierarchy]
    }

    pub fn cache(&self) -> &MatchingCache {
        &self.cache
    }

    pub fn assumes_both_or_none_obfuscated(&self) -> bool {
        self.assume_both_or_none_obfuscated
    }

    pub fn set_assume_both_or_none_obfuscated(&mut self, value: bool) {
        self.assume_both_or_none_obfuscated = value;
    }

    pub fn class_match(&self, id: ClassId) -> Option<ClassId> {
        if self.class(id).is_shared() {
            Some(id)
        } else {
            self.matches.classes.get(id)
        }
    }

    pub fn method_match(&self, id: MethodId) -> Option<MethodId> {
        if self.class(self.method(id).cls).is_shared() {
            Some(id)
        } else {
            self.matches.methods.get(id)
        }
    }

    pub fn field_match(&self, id: FieldId) -> Option<FieldId> {
        if self.class(self.field(id).cls).is_shared() {
            Some(id)
        } else {
            self.matches.fields.get(id)
        }
    }

    pub fn var_match(&self, id: VarId) -> Option<VarId> {
        let method = self.var(id).method;
        if self.class(self.method(method).cls).is_shared() {
            Some(id)
        } else {
            self.matches.vars.get(id)
        }
    }

    pub fn match_of(&self, entity: EntityRef) -> Option<EntityRef> {
        match entity {
            EntityRef::Class(id) => self.class_match(id).map(EntityRef::Class),
            EntityRef::Method(id) => self.method_match(id).map(EntityRef::Method),
            EntityRef::Field(id) => self.field_match(id).map(EntityRef::Field),
            EntityRef::Var(id) => self.var_match(id).map(EntityRef::Var),
        }
    }

    pub fn has_match(&self, entity: EntityRef) -> bool {
        self.match_of(entity).is_some()
    }

    /// Owning class of any entity.
    pub fn owner_class(&self, entity: EntityRef) -> ClassId {
        match entity {
            EntityRef::Class(id) => id,
            EntityRef::Method(id) => self.method(id).cls,
            EntityRef::Field(id) => self.field(id).cls,
            EntityRef::Var(id) => self.method(self.var(id).method).cls,
        }
    }

    /// Side an entity belongs to, `None` when shared.
    pub fn side_of(&self, entity: EntityRef) -> Option<Side> {
        self.class(self.owner_class(entity)).side
    }

    pub fn is_matchable(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Class(id) => self.class(id).matchable,
            EntityRef::Method(id) => self.method(id).matchable,
            EntityRef::Field(id) => self.field(id).matchable,
            EntityRef::Var(id) => self.var(id).matchable,
        }
    }

    pub fn is_name_obfuscated(&self, entity: EntityRef) -> bool {
        match entity {
            EntityRef::Class(id) => self.class(id).name_obfuscated,
            EntityRef::Method(id) => self.method(id).name_obfuscated,
            EntityRef::Field(id) => self.field(id).name_obfuscated,
            EntityRef::Var(id) => self.var(id).name_obfuscated,
        }
    }

    /// Human-readable identity used in logs and errors.
    pub fn label(&self, entity: EntityRef) -> String {
        match entity {
            EntityRef::Class(id) => self.class(id).name.clone(),
            EntityRef::Method(id) => {
                let method = self.method(id);
                format!("{}.{}{}", self.class(method.cls).name, method.name, method.desc)
            }
            EntityRef::Field(id) => {
                let field = self.field(id);
                format!("{}.{}:{}", self.class(field.cls).name, field.name, field.desc)
            }
            EntityRef::Var(id) => {
                let var = self.var(id);
                format!(
                    "{}#{}",
                    self.label(EntityRef::Method(var.method)),
                    var.plain_name()
                )
            }
        }
    }

    pub fn set_mapped_name(&mut self, entity: EntityRef, name: Option<String>) {
        match entity {
            EntityRef::Class(id) => self.classes[id.index()].mapped_name = name,
            EntityRef::Method(id) => self.methods[id.index()].mapped_name = name,
            EntityRef::Field(id) => self.fields[id.index()].mapped_name = name,
            EntityRef::Var(id) => self.vars[id.index()].mapped_name = name,
        }
    }

    pub fn set_mapped_comment(&mut self, entity: EntityRef, comment: Option<String>) {
        match entity {
            EntityRef::Class(id) => self.classes[id.index()].mapped_comment = comment,
            EntityRef::Method(id) => self.methods[id.index()].mapped_comment = comment,
            EntityRef::Field(id) => self.fields[id.index()].mapped_comment = comment,
            EntityRef::Var(id) => self.vars[id.index()].mapped_comment = comment,
        }
    }

    /// Drop every mapped name and comment of one side.
    pub fn clear_mappings(&mut self, side: Side) {
        let owned: Vec<bool> = self
            .classes
            .iter()
            .map(|class| class.side == Some(side))
            .collect();
        for class in &mut self.classes {
            if class.side == Some(side) {
                class.mapped_name = None;
                class.mapped_comment = None;
            }
        }
        for method in &mut self.methods {
            if owned[method.cls.index()] {
                method.mapped_name = None;
                method.mapped_comment = None;
            }
        }
        for field in &mut self.fields {
            if owned[field.cls.index()] {
                field.mapped_name = None;
                field.mapped_comment = None;
            }
        }
        for index in 0..self.vars.len() {
            let method = self.vars[index].method;
            if owned[self.methods[method.index()].cls.index()] {
                self.vars[index].mapped_name = None;
                self.vars[index].mapped_comment = None;
            }
        }
    }

    /// Count matched and total entities over side A's inputs.
    pub fn status(&self) -> MatchingStatus {
        let mut status = MatchingStatus::default();
        for &cls in self.input_classes(Side::A) {
            let class = self.class(cls);
            status.total_classes += 1;
            if self.class_match(cls).is_some() {
                status.matched_classes += 1;
            }
            for &method in &class.methods {
                if !self.method(method).real {
                    continue;
                }
                status.total_methods += 1;
                if self.method_match(method).is_some() {
                    status.matched_methods += 1;
                }
                for &arg in &self.method(method).args {
                    status.total_method_args += 1;
                    if self.var_match(arg).is_some() {
                        status.matched_method_args += 1;
                    }
                }
                for &var in &self.method(method).vars {
                    status.total_method_vars += 1;
                    if self.var_match(var).is_some() {
                        status.matched_method_vars += 1;
                    }
                }
            }
            for &field in &class.fields {
                if !self.field(field).real {
                    continue;
                }
                status.total_fields += 1;
                if self.field_match(field).is_some() {
                    status.matched_fields += 1;
                }
            }
        }
        status
    }

    /// Resolve the display name of any entity.
    pub fn display_name(&self, entity: EntityRef, names: NameType) -> Option<String> {
        match entity {
            EntityRef::Class(id) => self.class_display_name(id, names),
            EntityRef::Method(id) => self.method(id).display_name(names).map(str::to_string),
            EntityRef::Field(id) => self.field(id).display_name(names).map(str::to_string),
            EntityRef::Var(id) => {
                let var = self.var(id);
                match names {
                    NameType::Plain => Some(var.plain_name()),
                    NameType::Mapped => var.mapped_name.clone(),
                    NameType::Tmp => None,
                    NameType::MappedPlain | NameType::MappedTmpPlain => {
                        Some(var.mapped_name.clone().unwrap_or_else(|| var.plain_name()))
                    }
                }
            }
        }
    }
}
