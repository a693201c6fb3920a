use std::collections::BTreeSet;

use crate::env::ClassEnvironment;
use crate::model::{ClassId, FieldId, MethodId, VarId};

/// Whether two names may belong to the same entity given their obfuscation flags.
fn names_compatible(
    env: &ClassEnvironment,
    name_a: &str,
    obfuscated_a: bool,
    name_b: &str,
    obfuscated_b: bool,
) -> bool {
    if !obfuscated_a && !obfuscated_b {
        return name_a == name_b;
    }
    !(env.assumes_both_or_none_obfuscated() && obfuscated_a != obfuscated_b)
}

pub(crate) fn is_potentially_equal_class(env: &ClassEnvironment, a: ClassId, b: ClassId) -> bool {
    if a == b {
        return true;
    }
    let (class_a, class_b) = (env.class(a), env.class(b));
    if class_a.is_shared() || class_b.is_shared() || class_a.side == class_b.side {
        return false;
    }
    if !class_a.matchable || !class_b.matchable || class_a.dims != class_b.dims {
        return false;
    }
    if let Some(partner) = env.class_match(a) {
        return partner == b;
    }
    if env.class_match(b).is_some() {
        return false;
    }
    names_compatible(
        env,
        &class_a.name,
        class_a.name_obfuscated,
        &class_b.name,
        class_b.name_obfuscated,
    )
}

pub(crate) fn is_potentially_equal_method(env: &ClassEnvironment, a: MethodId, b: MethodId) -> bool {
    if a == b {
        return true;
    }
    let (method_a, method_b) = (env.method(a), env.method(b));
    if !method_a.matchable || !method_b.matchable || method_a.real != method_b.real {
        return false;
    }
    if let Some(partner) = env.method_match(a) {
        return partner == b;
    }
    if env.method_match(b).is_some() {
        return false;
    }
    if !is_potentially_equal_class(env, method_a.cls, method_b.cls) {
        return false;
    }
    if method_a.is_static() != method_b.is_static() {
        return false;
    }
    names_compatible(
        env,
        &method_a.name,
        method_a.name_obfuscated,
        &method_b.name,
        method_b.name_obfuscated,
    )
}

pub(crate) fn is_potentially_equal_field(env: &ClassEnvironment, a: FieldId, b: FieldId) -> bool {
    if a == b {
        return true;
    }
    let (field_a, field_b) = (env.field(a), env.field(b));
    if !field_a.matchable || !field_b.matchable || field_a.real != field_b.real {
        return false;
    }
    if let Some(partner) = env.field_match(a) {
        return partner == b;
    }
    if env.field_match(b).is_some() {
        return false;
    }
    if !is_potentially_equal_class(env, field_a.cls, field_b.cls) {
        return false;
    }
    if field_a.is_static() != field_b.is_static() {
        return false;
    }
    names_compatible(
        env,
        &field_a.name,
        field_a.name_obfuscated,
        &field_b.name,
        field_b.name_obfuscated,
    )
}

pub(crate) fn is_potentially_equal_var(env: &ClassEnvironment, a: VarId, b: VarId) -> bool {
    if a == b {
        return true;
    }
    let (var_a, var_b) = (env.var(a), env.var(b));
    if !var_a.matchable || !var_b.matchable || var_a.is_arg != var_b.is_arg {
        return false;
    }
    if let Some(partner) = env.var_match(a) {
        return partner == b;
    }
    if env.var_match(b).is_some() {
        return false;
    }
    match (&var_a.name, &var_b.name) {
        (Some(name_a), Some(name_b)) => {
            names_compatible(env, name_a, var_a.name_obfuscated, name_b, var_b.name_obfuscated)
        }
        _ => true,
    }
}

/// 1 for equal counts, falling linearly with the relative difference.
pub(crate) fn compare_counts(a: usize, b: usize) -> f64 {
    if a == b {
        return 1.0;
    }
    1.0 - a.abs_diff(b) as f64 / a.max(b) as f64
}

/// Jaccard similarity of two sets; two empty sets are equal.
pub(crate) fn compare_sets<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    shared as f64 / (a.len() + b.len() - shared) as f64
}

/// Similarity of two entity sets from opposite sides, counting matched pairs.
///
/// Unmatched elements that could still pair up count half.
pub(crate) fn compare_matched_sets<I: Copy + Ord>(
    a: &BTreeSet<I>,
    b: &BTreeSet<I>,
    partner: impl Fn(I) -> Option<I>,
) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let matched = a
        .iter()
        .filter(|&&item| partner(item).is_some_and(|other| b.contains(&other)))
        .count();
    let free_a = a.iter().filter(|&&item| partner(item).is_none()).count();
    let free_b = b.iter().filter(|&&item| partner(item).is_none()).count();
    let potential = free_a.min(free_b) as f64 * 0.5;
    (matched as f64 + potential) / a.len().max(b.len()) as f64
}

pub(crate) fn compare_class_sets(
    env: &ClassEnvironment,
    a: &BTreeSet<ClassId>,
    b: &BTreeSet<ClassId>,
) -> f64 {
    compare_matched_sets(a, b, |id| env.class_match(id))
}

pub(crate) fn compare_method_sets(
    env: &ClassEnvironment,
    a: &BTreeSet<MethodId>,
    b: &BTreeSet<MethodId>,
) -> f64 {
    compare_matched_sets(a, b, |id| env.method_match(id))
}

pub(crate) fn compare_field_sets(
    env: &ClassEnvironment,
    a: &BTreeSet<FieldId>,
    b: &BTreeSet<FieldId>,
) -> f64 {
    compare_matched_sets(a, b, |id| env.field_match(id))
}

/// Type identity: 1 when matched to each other, 0.5 when still free to pair.
pub(crate) fn compare_types(env: &ClassEnvironment, a: ClassId, b: ClassId) -> f64 {
    match env.class_match(a) {
        Some(partner) if partner == b => 1.0,
        Some(_) => 0.0,
        None if is_potentially_equal_class(env, a, b) => 0.5,
        None => 0.0,
    }
}

pub(crate) fn compare_optional_types(
    env: &ClassEnvironment,
    a: Option<ClassId>,
    b: Option<ClassId>,
) -> f64 {
    match (a, b) {
        (None, None) => 1.0,
        (Some(a), Some(b)) => compare_types(env, a, b),
        _ => 0.0,
    }
}

/// Histogram overlap of two opcode streams.
pub(crate) fn compare_opcodes(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let (histogram_a, histogram_b) = (opcode_histogram(a), opcode_histogram(b));
    let (mut shared, mut total) = (0u32, 0u32);
    for (count_a, count_b) in histogram_a.iter().zip(&histogram_b) {
        shared += count_a.min(count_b);
        total += count_a.max(count_b);
    }
    shared as f64 / total as f64
}

fn opcode_histogram(opcodes: &[u8]) -> [u32; 256] {
    let mut histogram = [0u32; 256];
    for &opcode in opcodes {
        histogram[opcode as usize] += 1;
    }
    histogram
}

/// Fraction of equal bits among the masked flags.
pub(crate) fn compare_flags(a: u16, b: u16, mask: u16) -> f64 {
    let relevant = mask.count_ones();
    if relevant == 0 {
        return 1.0;
    }
    let differing = ((a ^ b) & mask).count_ones();
    1.0 - f64::from(differing) / f64::from(relevant)
}

/// Relative position similarity within two sequences.
pub(crate) fn compare_positions(pos_a: usize, len_a: usize, pos_b: usize, len_b: usize) -> f64 {
    if len_a <= 1 && len_b <= 1 {
        return 1.0;
    }
    let relative = |pos: usize, len: usize| {
        if len <= 1 { 0.0 } else { pos as f64 / (len - 1) as f64 }
    };
    1.0 - (relative(pos_a, len_a) - relative(pos_b, len_b)).abs()
}
