use super::util::{
    compare_class_sets, compare_counts, compare_field_sets, compare_flags, compare_method_sets,
    compare_opcodes, compare_positions, compare_sets, compare_types,
};
use super::{Classifier, ClassifierLevel, ClassifierMetadata, ClassifierTable};
use crate::classfile::access;
use crate::env::ClassEnvironment;
use crate::model::MethodId;

pub(super) fn register(table: &mut ClassifierTable<MethodId>) {
    table.add(Box::new(MethodTypeCheck));
    table.add(Box::new(AccessFlags));
    table.add(Box::new(ArgTypes));
    table.add(Box::new(ReturnType));
    table.add(Box::new(ClassRefs));
    table.add(Box::new(Strings));
    table.add(Box::new(Numbers));
    table.add(Box::new(Position));
    table.add(Box::new(ParentMethod));
    table.add(Box::new(ChildMethods));
    table.add(Box::new(HierarchySize));
    table.add(Box::new(OutRefs));
    table.add(Box::new(InRefs));
    table.add(Box::new(FieldReads));
    table.add(Box::new(FieldWrites));
    table.add(Box::new(Code));
    table.add(Box::new(ControlFlow));
}

/// Static, abstract, native, synthetic and bridge flags plus constructor-ness.
struct MethodTypeCheck;

impl Classifier<MethodId> for MethodTypeCheck {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "method type check",
            weight: 10.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        let (method_a, method_b) = (env.method(a), env.method(b));
        let mask =
            access::STATIC | access::ABSTRACT | access::NATIVE | access::SYNTHETIC | access::BRIDGE;
        let flags = compare_flags(method_a.access, method_b.access, mask);
        let special = method_a.is_constructor() == method_b.is_constructor()
            && method_a.is_initializer() == method_b.is_initializer();
        (flags * 5.0 + if special { 1.0 } else { 0.0 }) / 6.0
    }
}

struct AccessFlags;

impl Classifier<MethodId> for AccessFlags {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "access flags",
            weight: 4.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        let mask = access::PUBLIC
            | access::PRIVATE
            | access::PROTECTED
            | access::FINAL
            | access::SYNCHRONIZED
            | access::VARARGS
            | access::STRICT;
        compare_flags(env.method(a).access, env.method(b).access, mask)
    }
}

struct ArgTypes;

impl Classifier<MethodId> for ArgTypes {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "argument types",
            weight: 10.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        let (args_a, args_b) = (&env.method(a).args, &env.method(b).args);
        if args_a.is_empty() && args_b.is_empty() {
            return 1.0;
        }
        let total: f64 = args_a
            .iter()
            .zip(args_b)
            .map(|(&arg_a, &arg_b)| compare_types(env, env.var(arg_a).ty, env.var(arg_b).ty))
            .sum();
        total / args_a.len().max(args_b.len()) as f64
    }
}

struct ReturnType;

impl Classifier<MethodId> for ReturnType {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "return type",
            weight: 5.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_types(env, env.method(a).ret_type, env.method(b).ret_type)
    }
}

/// Types instantiated, cast to or checked against.
struct ClassRefs;

impl Classifier<MethodId> for ClassRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "class references",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_class_sets(env, &env.method(a).class_refs, &env.method(b).class_refs)
    }
}

struct Strings;

impl Classifier<MethodId> for Strings {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "string constants",
            weight: 5.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_sets(&env.method(a).strings, &env.method(b).strings)
    }
}

struct Numbers;

impl Classifier<MethodId> for Numbers {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "numeric constants",
            weight: 5.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_sets(&env.method(a).numbers, &env.method(b).numbers)
    }
}

struct Position;

impl Classifier<MethodId> for Position {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "position",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        let (method_a, method_b) = (env.method(a), env.method(b));
        compare_positions(
            method_a.position,
            env.class(method_a.cls).methods.len(),
            method_b.position,
            env.class(method_b.cls).methods.len(),
        )
    }
}

struct ParentMethod;

impl Classifier<MethodId> for ParentMethod {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "parent method",
            weight: 10.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        match (env.method(a).parent, env.method(b).parent) {
            (None, None) => 1.0,
            (Some(parent_a), Some(parent_b)) => match env.method_match(parent_a) {
                Some(partner) if partner == parent_b => 1.0,
                Some(_) => 0.0,
                None if env.method_match(parent_b).is_none() => 0.5,
                None => 0.0,
            },
            _ => 0.0,
        }
    }
}

struct ChildMethods;

impl Classifier<MethodId> for ChildMethods {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "child methods",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_method_sets(env, &env.method(a).children, &env.method(b).children)
    }
}

struct HierarchySize;

impl Classifier<MethodId> for HierarchySize {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "hierarchy size",
            weight: 2.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_counts(env.hierarchy_members(a).len(), env.hierarchy_members(b).len())
    }
}

struct OutRefs;

impl Classifier<MethodId> for OutRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "outgoing calls",
            weight: 6.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_method_sets(env, &env.method(a).refs_out, &env.method(b).refs_out)
    }
}

struct InRefs;

impl Classifier<MethodId> for InRefs {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "incoming calls",
            weight: 6.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_method_sets(env, &env.method(a).refs_in, &env.method(b).refs_in)
    }
}

struct FieldReads;

impl Classifier<MethodId> for FieldReads {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "field reads",
            weight: 5.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_field_sets(env, &env.method(a).field_reads, &env.method(b).field_reads)
    }
}

struct FieldWrites;

impl Classifier<MethodId> for FieldWrites {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "field writes",
            weight: 5.0,
            level: ClassifierLevel::Intermediate,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_field_sets(env, &env.method(a).field_writes, &env.method(b).field_writes)
    }
}

struct Code;

impl Classifier<MethodId> for Code {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "code",
            weight: 12.0,
            level: ClassifierLevel::Full,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        compare_opcodes(&env.method(a).opcodes, &env.method(b).opcodes)
    }
}

struct ControlFlow;

impl Classifier<MethodId> for ControlFlow {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "control flow",
            weight: 5.0,
            level: ClassifierLevel::Full,
        }
    }

    fn score(&self, a: MethodId, b: MethodId, env: &ClassEnvironment) -> f64 {
        env.method(a).flow.similarity(&env.method(b).flow)
    }
}

#[cfg(test)]
mod tests {
    use crate::classfile::{Constant, InstructionKind};
    use crate::classifier::{ClassifierLevel, ClassifierSet};
    use crate::env::testing::*;
    use crate::model::Side;

    #[test]
    fn methods_with_matching_bodies_rank_first() {
        let with_methods = |name: &str| {
            let mut class = class(name, Some("java/lang/Object"));
            class.methods.push(method(
                "a",
                "(I)I",
                vec![
                    InstructionKind::Constant(Constant::Int(1234)),
                    InstructionKind::Constant(Constant::String("first".to_string())),
                ],
            ));
            class.methods.push(method(
                "b",
                "(I)I",
                vec![InstructionKind::Constant(Constant::String("second".to_string()))],
            ));
            class
        };
        let mut env = build_env(vec![with_methods("x")], vec![with_methods("y")]);
        let x = class_id(&env, Side::A, "x");
        let y = class_id(&env, Side::B, "y");
        env.match_classes(x, y).expect("match classes");

        let set = ClassifierSet::standard();
        let subject = method_id(&env, Side::A, "x", "b", "(I)I");
        let first = method_id(&env, Side::B, "y", "a", "(I)I");
        let second = method_id(&env, Side::B, "y", "b", "(I)I");
        let ranking = set
            .methods
            .rank(subject, &[first, second], ClassifierLevel::Full, &env, f64::INFINITY);

        assert_eq!(second, ranking[0].candidate);
        assert!(ranking[0].score > ranking[1].score);
    }
}
