use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::env::ClassEnvironment;
use crate::model::{MethodId, Side, VarId};

/// Matched class pairs with their matched members, by side A / side B name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchesFile {
    pub classes: Vec<ClassPair>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassPair {
    pub a: String,
    pub b: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodPair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<MemberPair>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodPair {
    pub a: MemberName,
    pub b: MemberName,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<VarPair>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vars: Vec<VarPair>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberPair {
    pub a: MemberName,
    pub b: MemberName,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberName {
    pub name: String,
    pub desc: String,
}

/// Positions of a matched argument or local variable pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarPair {
    pub a: usize,
    pub b: usize,
}

/// Pairs applied by [`load_matches`] and entries that could not be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MatchesLoadSummary {
    pub classes: usize,
    pub methods: usize,
    pub fields: usize,
    pub vars: usize,
    pub skipped: usize,
}

impl MatchesFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self).context("failed to serialize matches")?;
        fs::write(path, text + "\n").with_context(|| format!("failed to write {}", path.display()))
    }
}

/// Capture every match between input classes of both sides.
pub fn save_matches(env: &ClassEnvironment) -> MatchesFile {
    let mut file = MatchesFile::default();
    for &a in env.input_classes(Side::A) {
        let Some(b) = env.class_match(a).filter(|&b| b != a) else {
            continue;
        };
        let (class_a, class_b) = (env.class(a), env.class(b));
        let mut pair = ClassPair {
            a: class_a.name.clone(),
            b: class_b.name.clone(),
            ..ClassPair::default()
        };
        for &method_a in &class_a.methods {
            let Some(method_b) = env.method_match(method_a) else {
                continue;
            };
            pair.methods.push(MethodPair {
                a: member_name(&env.method(method_a).name, &env.method(method_a).desc),
                b: member_name(&env.method(method_b).name, &env.method(method_b).desc),
                args: var_pairs(env, &env.method(method_a).args),
                vars: var_pairs(env, &env.method(method_a).vars),
            });
        }
        for &field_a in &class_a.fields {
            let Some(field_b) = env.field_match(field_a) else {
                continue;
            };
            pair.fields.push(MemberPair {
                a: member_name(&env.field(field_a).name, &env.field(field_a).desc),
                b: member_name(&env.field(field_b).name, &env.field(field_b).desc),
            });
        }
        file.classes.push(pair);
    }
    file
}

fn member_name(name: &str, desc: &str) -> MemberName {
    MemberName {
        name: name.to_string(),
        desc: desc.to_string(),
    }
}

fn var_pairs(env: &ClassEnvironment, vars: &[VarId]) -> Vec<VarPair> {
    vars.iter()
        .filter_map(|&var| {
            let partner = env.var_match(var)?;
            Some(VarPair {
                a: env.var(var).index,
                b: env.var(partner).index,
            })
        })
        .collect()
}

/// Apply a matches file through the regular match operations.
///
/// Entries naming unknown classes or members, or rejected by the match
/// operations, are skipped and counted.
pub fn load_matches(env: &mut ClassEnvironment, file: &MatchesFile) -> MatchesLoadSummary {
    let mut summary = MatchesLoadSummary::default();
    let mut warned = HashSet::new();
    for pair in &file.classes {
        let lookup = |side: Side, name: &str| {
            env.get_class(side, name)
                .filter(|&id| env.class(id).side == Some(side))
        };
        let (Some(a), Some(b)) = (lookup(Side::A, &pair.a), lookup(Side::B, &pair.b)) else {
            if warned.insert((pair.a.clone(), pair.b.clone())) {
                warn!(a = %pair.a, b = %pair.b, "matches file refers to an unknown class");
            }
            summary.skipped += 1;
            continue;
        };
        if let Err(error) = env.match_classes(a, b) {
            warn!(%error, "skipping class pair");
            summary.skipped += 1;
            continue;
        }
        summary.classes += 1;

        for method in &pair.methods {
            let found = (
                env.class(a).method(&method.a.name, &method.a.desc),
                env.class(b).method(&method.b.name, &method.b.desc),
            );
            let (Some(method_a), Some(method_b)) = found else {
                summary.skipped += 1;
                continue;
            };
            match env.match_methods(method_a, method_b) {
                Ok(()) => summary.methods += 1,
                Err(error) => {
                    warn!(%error, "skipping method pair");
                    summary.skipped += 1;
                    continue;
                }
            }
            load_vars(env, (method_a, method_b), &method.args, true, &mut summary);
            load_vars(env, (method_a, method_b), &method.vars, false, &mut summary);
        }

        for field in &pair.fields {
            let found = (
                env.class(a).field(&field.a.name, &field.a.desc),
                env.class(b).field(&field.b.name, &field.b.desc),
            );
            let (Some(field_a), Some(field_b)) = found else {
                summary.skipped += 1;
                continue;
            };
            match env.match_fields(field_a, field_b) {
                Ok(()) => summary.fields += 1,
                Err(error) => {
                    warn!(%error, "skipping field pair");
                    summary.skipped += 1;
                }
            }
        }
    }
    info!(
        classes = summary.classes,
        methods = summary.methods,
        fields = summary.fields,
        vars = summary.vars,
        skipped = summary.skipped,
        "loaded matches"
    );
    summary
}

fn load_vars(
    env: &mut ClassEnvironment,
    (method_a, method_b): (MethodId, MethodId),
    pairs: &[VarPair],
    is_arg: bool,
    summary: &mut MatchesLoadSummary,
) {
    let vars = |env: &ClassEnvironment, method: MethodId| {
        let method = env.method(method);
        if is_arg { method.args.clone() } else { method.vars.clone() }
    };
    let (vars_a, vars_b) = (vars(env, method_a), vars(env, method_b));
    for pair in pairs {
        let (Some(&var_a), Some(&var_b)) = (vars_a.get(pair.a), vars_b.get(pair.b)) else {
            summary.skipped += 1;
            continue;
        };
        match env.match_vars(var_a, var_b) {
            Ok(()) => summary.vars += 1,
            Err(error) => {
                warn!(%error, "skipping variable pair");
                summary.skipped += 1;
            }
        }
    }
}

/// Save the current matches of `env` to `path`.
pub fn write_matches(env: &ClassEnvironment, path: &Path) -> Result<usize> {
    let file = save_matches(env);
    file.write(path)?;
    Ok(file.classes.len())
}

/// Read `path` and apply it to `env`.
pub fn read_matches(env: &mut ClassEnvironment, path: &Path) -> Result<MatchesLoadSummary> {
    let file = MatchesFile::read(path)?;
    Ok(load_matches(env, &file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing::*;

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
    fn saved_matches_restore_on_a_fresh_environment() {
        let mut env = sample();
        let (a, b) = (class_id(&env, Side::A, "a"), class_id(&env, Side::B, "b"));
        env.match_classes(a, b).expect("classes");
        let (m_a, m_b) = (
            method_id(&env, Side::A, "a", "m", "(I)V"),
            method_id(&env, Side::B, "b", "m", "(I)V"),
        );
        env.match_methods(m_a, m_b).expect("methods");
        let (arg_a, arg_b) = (env.method(m_a).args()[0], env.method(m_b).args()[0]);
        env.match_vars(arg_a, arg_b).expect("args");
        let (f_a, f_b) = (
            field_id(&env, Side::A, "a", "f", "I"),
            field_id(&env, Side::B, "b", "f", "I"),
        );
        env.match_fields(f_a, f_b).expect("fields");

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("matches.json");
        assert_eq!(1, write_matches(&env, &path).expect("write"));

        let mut fresh = sample();
        let summary = read_matches(&mut fresh, &path).expect("read");

        assert_eq!(
            MatchesLoadSummary {
                classes: 1,
                methods: 1,
                fields: 1,
                vars: 1,
                skipped: 0,
            },
            summary
        );
        assert_eq!(env.status(), fresh.status());
    }

    #[test]
    fn unknown_entries_are_skipped_and_counted() {
        let mut env = sample();
        let file = MatchesFile {
            classes: vec![
                ClassPair {
                    a: "missing".to_string(),
                    b: "b".to_string(),
                    ..ClassPair::default()
                },
                ClassPair {
                    a: "a".to_string(),
                    b: "b".to_string(),
                    methods: vec![MethodPair {
                        a: member_name("gone", "()V"),
                        b: member_name("m", "(I)V"),
                        ..MethodPair::default()
                    }],
                    ..ClassPair::default()
                },
            ],
        };

        let summary = load_matches(&mut env, &file);

        assert_eq!(1, summary.classes);
        assert_eq!(2, summary.skipped);
        assert_eq!(1, env.status().matched_classes);
    }
}
