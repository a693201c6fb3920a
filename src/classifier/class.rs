use std::collections::{BTreeMap, BTreeSet};

use super::util::{
    compare_class_sets, compare_counts, compare_flags, compare_matched_sets, compare_method_sets,
    compare_field_sets, compare_opcodes, compare_optional_types, compare_sets,
};
use super::{Classifier, ClassifierLevel, ClassifierMetadata, ClassifierTable};
use crate::cache::CacheToken;
use crate::classfile::access;
use crate::env::ClassEnvironment;
use crate::model::{ClassId, EntityRef, Side};

pub(super) fn register(table: &mut ClassifierTable<ClassId>) {
    table.add(Box::new(ClassTypeCheck));
    table.add(Box::new(HierarchyDepth));
    table.add(Box::new(ParentClass));
    table.add(Box::new(ChildClasses));
    table.add(Box::new(Interfaces));
    table.add(Box::new(Implementers));
    table.add(Box::new(OuterClass));
    table.add(Box::new(MethodCount));
    table.add(Box::new(FieldCount));
    table.add(Box::new(Strings));
    table.add(Box::new(MethodTypeRefs));
    table.add(Box::new(FieldTypeRefs));
    table.add(Box::new(SimilarMethods));
    table.add(Box::new(OutRefs));
    table.add(Box::new(InRefs));
    table.add(Box::new(MethodCode));
    table.add(Box::new(MemberRefs));
}

fn cache_key(a: ClassId, b: ClassId) -> (u32, u32) {
    (a.index() as u32, b.index() as u32)
}

/// Interface, abstract, enum, annotation and record flags.
struct ClassTypeCheck;

impl Classifier<ClassId> for ClassTypeCheck {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "class type check",
            weight: 20.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        let (class_a, class_b) = (env.class(a), env.class(b));
        let mask = access::INTERFACE | access::ABSTRACT | access::ENUM | access::ANNOTATION;
        let flags = compare_flags(class_a.access, class_b.access, mask);
        let record = if class_a.is_record() == class_b.is_record() { 1.0 } else { 0.0 };
        (flags * 4.0 + record) / 5.0
    }
}

struct HierarchyDepth;

impl Classifier<ClassId> for HierarchyDepth {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "hierarchy depth",
            weight: 1.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_counts(depth(env, a), depth(env, b))
    }
}

fn depth(env: &ClassEnvironment, cls: ClassId) -> usize {
    let mut depth = 0;
    let mut current = env.class(cls).super_class;
    while let Some(next) = current {
        depth += 1;
        current = env.class(next).super_class;
    }
    depth
}

struct ParentClass;

impl Classifier<ClassId> for ParentClass {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "parent class",
            weight: 4.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_optional_types(env, env.class(a).super_class, env.class(b).super_class)
    }
}

struct ChildClasses;

impl Classifier<ClassId> for ChildClasses {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "child classes",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_class_sets(env, &env.class(a).children, &env.class(b).children)
    }
}

struct Interfaces;

impl Classifier<ClassId> for Interfaces {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "interfaces",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_class_sets(env, &env.class(a).interfaces, &env.class(b).interfaces)
    }
}

struct Implementers;

impl Classifier<ClassId> for Implementers {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "implementers",
            weight: 2.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_class_sets(env, &env.class(a).implementers, &env.class(b).implementers)
    }
}

struct OuterClass;

impl Classifier<ClassId> for OuterClass {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "outer class",
            weight: 6.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_optional_types(env, env.class(a).outer_class, env.class(b).outer_class)
    }
}

struct MethodCount;

impl Classifier<ClassId> for MethodCount {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "method count",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        let count = |cls: ClassId| {
            env.class(cls)
                .methods
                .iter()
                .filter(|&&method| env.method(method).real)
                .count()
        };
        compare_counts(count(a), count(b))
    }
}

struct FieldCount;

impl Classifier<ClassId> for FieldCount {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "field count",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        let count = |cls: ClassId| {
            env.class(cls)
                .fields
                .iter()
                .filter(|&&field| env.field(field).real)
                .count()
        };
        compare_counts(count(a), count(b))
    }
}

struct Strings;

impl Classifier<ClassId> for Strings {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "string constants",
            weight: 8.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_sets(&env.class(a).strings, &env.class(b).strings)
    }
}

struct MethodTypeRefs;

impl Classifier<ClassId> for MethodTypeRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "method type references",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_method_sets(env, &env.class(a).method_type_refs, &env.class(b).method_type_refs)
    }
}

struct FieldTypeRefs;

impl Classifier<ClassId> for FieldTypeRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "field type references",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_field_sets(env, &env.class(a).field_type_refs, &env.class(b).field_type_refs)
    }
}

/// Method descriptors with every type replaced by what it is known to be on both sides.
struct SimilarMethods;

impl Classifier<ClassId> for SimilarMethods {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "similar methods",
            weight: 10.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        let (key_a, key_b) = cache_key(a, b);
        env.cache()
            .get_or_compute(CacheToken::ClassMethodSignatures, key_a, key_b, || {
                compare_multisets(&signature_shapes(env, a), &signature_shapes(env, b))
            })
    }
}

fn signature_shapes(env: &ClassEnvironment, cls: ClassId) -> BTreeMap<String, usize> {
    let mut shapes = BTreeMap::new();
    for &method in &env.class(cls).methods {
        let instance = env.method(method);
        if !instance.real {
            continue;
        }
        let mut shape = String::from("(");
        for &arg in &instance.args {
            shape.push_str(&type_shape(env, env.var(arg).ty));
            shape.push(',');
        }
        shape.push(')');
        shape.push_str(&type_shape(env, instance.ret_type));
        *shapes.entry(shape).or_insert(0) += 1;
    }
    shapes
}

/// Side independent spelling of a type: its own name when shared, the side A
/// name of a matched pair, `?` otherwise.
fn type_shape(env: &ClassEnvironment, ty: ClassId) -> String {
    let class = env.class(ty);
    if class.is_shared() {
        return class.name.clone();
    }
    match env.class_match(ty) {
        Some(partner) if class.side == Some(Side::B) => env.class(partner).name.clone(),
        Some(_) => class.name.clone(),
        None => format!("?{}", "[".repeat(class.dims)),
    }
}

fn compare_multisets(a: &BTreeMap<String, usize>, b: &BTreeMap<String, usize>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    let (mut shared, mut total) = (0usize, 0usize);
    for key in keys {
        let (count_a, count_b) = (
            a.get(key).copied().unwrap_or(0),
            b.get(key).copied().unwrap_or(0),
        );
        shared += count_a.min(count_b);
        total += count_a.max(count_b);
    }
    shared as f64 / total as f64
}

struct OutRefs;

impl Classifier<ClassId> for OutRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "outgoing references",
            weight: 6.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_class_sets(env, &env.class(a).refs_out, &env.class(b).refs_out)
    }
}

struct InRefs;

impl Classifier<ClassId> for InRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "incoming references",
            weight: 6.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        compare_class_sets(env, &env.class(a).refs_in, &env.class(b).refs_in)
    }
}

/// Opcode histogram over all method bodies of the class.
struct MethodCode;

impl Classifier<ClassId> for MethodCode {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "method code",
            weight: 12.0,
            level: ClassifierLevel::Full,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        let (key_a, key_b) = cache_key(a, b);
        env.cache()
            .get_or_compute(CacheToken::ClassMethodCode, key_a, key_b, || {
                compare_opcodes(&class_opcodes(env, a), &class_opcodes(env, b))
            })
    }
}

fn class_opcodes(env: &ClassEnvironment, cls: ClassId) -> Vec<u8> {
    env.class(cls)
        .methods
        .iter()
        .flat_map(|&method| env.method(method).opcodes.iter().copied())
        .collect()
}

/// Members referenced from the class's methods.
struct MemberRefs;

impl Classifier<ClassId> for MemberRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "member references",
            weight: 6.0,
            level: ClassifierLevel::Extra,
        }
    }

    fn score(&self, a: ClassId, b: ClassId, env: &ClassEnvironment) -> f64 {
        let (key_a, key_b) = cache_key(a, b);
        env.cache()
            .get_or_compute(CacheToken::ClassMemberRefs, key_a, key_b, || {
                compare_matched_sets(&member_refs(env, a), &member_refs(env, b), |entity| {
                    env.match_of(entity)
                })
            })
    }
}

fn member_refs(env: &ClassEnvironment, cls: ClassId) -> BTreeSet<EntityRef> {
    let mut refs = BTreeSet::new();
    for &method in &env.class(cls).methods {
        let instance = env.method(method);
        refs.extend(instance.refs_out.iter().map(|&callee| EntityRef::Method(callee)));
        refs.extend(
            instance
                .field_reads
                .iter()
                .chain(&instance.field_writes)
                .map(|&field| EntityRef::Field(field)),
        );
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierSet, check_rank, max_mismatch};
    use crate::config::Thresholds;
    use crate::env::testing::*;
    use crate::model::Side;

    #[test]
    fn identical_classes_outscore_different_ones() {
        let shape = |name: &str, constant: &str| {
            let mut class = class(name, Some("java/lang/Object"));
            class.methods.push(method(
                "a",
                "(I)I",
                vec![crate::classfile::InstructionKind::Constant(
                    crate::classfile::Constant::String(constant.to_string()),
                )],
            ));
            class.fields.push(field("b", "J"));
            class
        };
        let mut other = class("q", Some("java/lang/Object"));
        other.access |= access::INTERFACE | access::ABSTRACT;
        let env = build_env(vec![shape("x", "hello")], vec![shape("y", "hello"), other]);

        let set = ClassifierSet::standard();
        let x = class_id(&env, Side::A, "x");
        let y = class_id(&env, Side::B, "y");
        let q = class_id(&env, Side::B, "q");
        let level = ClassifierLevel::Initial;
        let max = set.classes.max_score(level);
        let ranking = set.classes.rank(x, &[q, y], level, &env, f64::INFINITY);

        assert_eq!(y, ranking[0].candidate);
        assert!(ranking[0].score > ranking[1].score);
        let thresholds = Thresholds::new(0.8, 0.08);
        let pruned = set.classes.rank(x, &[q, y], level, &env, max_mismatch(max, thresholds));
        assert!(check_rank(&pruned, max, thresholds));
    }

    #[test]
    fn multisets_compare_counts_per_key() {
        let a = BTreeMap::from([("(I)V".to_string(), 2), ("()V".to_string(), 1)]);
        let b = BTreeMap::from([("(I)V".to_string(), 1)]);
        assert!((compare_multisets(&a, &b) - 1.0 / 3.0).abs() < 1e-12);
    }
}
