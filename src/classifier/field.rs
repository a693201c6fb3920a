use super::util::{compare_flags, compare_method_sets, compare_positions, compare_types};
use super::{Classifier, ClassifierLevel, ClassifierMetadata, ClassifierTable};
use crate::classfile::access;
use crate::env::ClassEnvironment;
use crate::model::FieldId;

pub(super) fn register(table: &mut ClassifierTable<FieldId>) {
    table.add(Box::new(FieldTypeCheck));
    table.add(Box::new(AccessFlags));
    table.add(Box::new(FieldType));
    table.add(Box::new(InitialValue));
    table.add(Box::new(Position));
    table.add(Box::new(Readers));
    table.add(Box::new(Writers));
}

/// Static, final, volatile, transient and synthetic flags.
struct FieldTypeCheck;

impl Classifier<FieldId> for FieldTypeCheck {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "field type check",
            weight: 10.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: FieldId, b: FieldId, env: &ClassEnvironment) -> f64 {
        let mask = access::STATIC
            | access::FINAL
            | access::VOLATILE
            | access::TRANSIENT
            | access::SYNTHETIC
            | access::ENUM;
        compare_flags(env.field(a).access, env.field(b).access, mask)
    }
}

struct AccessFlags;

impl Classifier<FieldId> for AccessFlags {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "access flags",
            weight: 4.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: FieldId, b: FieldId, env: &ClassEnvironment) -> f64 {
        let mask = access::PUBLIC | access::PRIVATE | access::PROTECTED;
        compare_flags(env.field(a).access, env.field(b).access, mask)
    }
}

struct FieldType;

impl Classifier<FieldId> for FieldType {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "type",
            weight: 10.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: FieldId, b: FieldId, env: &ClassEnvironment) -> f64 {
        compare_types(env, env.field(a).ty, env.field(b).ty)
    }
}

/// `ConstantValue` initializers.
struct InitialValue;

impl Classifier<FieldId> for InitialValue {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "initial value",
            weight: 7.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: FieldId, b: FieldId, env: &ClassEnvironment) -> f64 {
        if env.field(a).initial_value == env.field(b).initial_value {
            1.0
        } else {
            0.0
        }
    }
}

struct Position;

impl Classifier<FieldId> for Position {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "position",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: FieldId, b: FieldId, env: &ClassEnvironment) -> f64 {
        let (field_a, field_b) = (env.field(a), env.field(b));
        compare_positions(
            field_a.position,
            env.class(field_a.cls).fields.len(),
            field_b.position,
            env.class(field_b.cls).fields.len(),
        )
    }
}

struct Readers;

impl Classifier<FieldId> for Readers {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "readers",
            weight: 6.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: FieldId, b: FieldId, env: &ClassEnvironment) -> f64 {
        compare_method_sets(env, &env.field(a).readers, &env.field(b).readers)
    }
}

struct Writers;

impl Classifier<FieldId> for Writers {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "writers",
            weight: 6.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: FieldId, b: FieldId, env: &ClassEnvironment) -> f64 {
        compare_method_sets(env, &env.field(a).writers, &env.field(b).writers)
    }
}
