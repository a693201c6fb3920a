use super::util::{compare_positions, compare_types};
use super::{Classifier, ClassifierLevel, ClassifierMetadata, ClassifierTable};
use crate::env::ClassEnvironment;
use crate::model::VarId;

pub(super) fn register(table: &mut ClassifierTable<VarId>) {
    table.add(Box::new(VarType));
    table.add(Box::new(Position));
    table.add(Box::new(Slot));
    table.add(Box::new(LiveRange));
}

struct VarType;

impl Classifier<VarId> for VarType {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "type",
            weight: 10.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: VarId, b: VarId, env: &ClassEnvironment) -> f64 {
        compare_types(env, env.var(a).ty, env.var(b).ty)
    }
}

/// Position among the method's arguments or locals.
struct Position;

impl Classifier<VarId> for Position {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "position",
            weight: 3.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: VarId, b: VarId, env: &ClassEnvironment) -> f64 {
        let count = |var: VarId| {
            let instance = env.var(var);
            let method = env.method(instance.method);
            if instance.is_arg { method.args.len() } else { method.vars.len() }
        };
        compare_positions(env.var(a).index, count(a), env.var(b).index, count(b))
    }
}

struct Slot;

impl Classifier<VarId> for Slot {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "local slot",
            weight: 2.0,
            level: ClassifierLevel::Initial,
        }
    }

    fn score(&self, a: VarId, b: VarId, env: &ClassEnvironment) -> f64 {
        if env.var(a).lv_index == env.var(b).lv_index { 1.0 } else { 0.0 }
    }
}

/// Overlap of the relative live ranges within the method body.
struct LiveRange;

impl Classifier<VarId> for LiveRange {
    fn metadata(&self) -> ClassifierMetadata {
        ClassifierMetadata {
            name: "live range",
            weight: 3.0,
            level: ClassifierLevel::Full,
        }
    }

    fn score(&self, a: VarId, b: VarId, env: &ClassEnvironment) -> f64 {
        let range = |var: VarId| {
            let instance = env.var(var);
            let length = env.method(instance.method).opcodes.len().max(1) as f64;
            (
                f64::from(instance.start_insn) / length,
                f64::from(instance.end_insn) / length,
            )
        };
        let ((start_a, end_a), (start_b, end_b)) = (range(a), range(b));
        let overlap = (end_a.min(end_b) - start_a.max(start_b)).max(0.0);
        let span = end_a.max(end_b) - start_a.min(start_b);
        if span <= 0.0 { 1.0 } else { overlap / span }
    }
}
