use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::env::ObfuscationPatterns;
use crate::model::Side;

/// Regular expressions selecting names known to be meaningful on one side.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamePatterns {
    pub classes: Option<String>,
    pub members: Option<String>,
}

impl NamePatterns {
    /// Compile the patterns; each must match a whole name.
    pub fn compile(&self) -> Result<ObfuscationPatterns> {
        Ok(ObfuscationPatterns {
            class: compile_whole(self.classes.as_deref())?,
            member: compile_whole(self.members.as_deref())?,
        })
    }
}

fn compile_whole(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$"))
                .with_context(|| format!("invalid name pattern {pattern:?}"))
        })
        .transpose()
}

/// Inputs of a matching project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub inputs_a: Vec<PathBuf>,
    pub inputs_b: Vec<PathBuf>,
    pub classpath_a: Vec<PathBuf>,
    pub classpath_b: Vec<PathBuf>,
    pub shared_classpath: Vec<PathBuf>,
    pub non_obfuscated_a: NamePatterns,
    pub non_obfuscated_b: NamePatterns,
}

impl ProjectConfig {
    /// Load a project file; relative paths resolve against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: ProjectConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        for list in [
            &mut self.inputs_a,
            &mut self.inputs_b,
            &mut self.classpath_a,
            &mut self.classpath_b,
            &mut self.shared_classpath,
        ] {
            for entry in list.iter_mut() {
                if entry.is_relative() {
                    *entry = base.join(&*entry);
                }
            }
        }
    }

    pub fn inputs(&self, side: Side) -> &[PathBuf] {
        match side {
            Side::A => &self.inputs_a,
            Side::B => &self.inputs_b,
        }
    }

    pub fn classpath(&self, side: Side) -> &[PathBuf] {
        match side {
            Side::A => &self.classpath_a,
            Side::B => &self.classpath_b,
        }
    }

    pub fn name_patterns(&self, side: Side) -> &NamePatterns {
        match side {
            Side::A => &self.non_obfuscated_a,
            Side::B => &self.non_obfuscated_b,
        }
    }

    /// Fail fast on missing paths or empty sides.
    pub fn validate(&self) -> Result<()> {
        for side in Side::BOTH {
            if self.inputs(side).is_empty() {
                anyhow::bail!("no inputs configured for side {}", side.tag());
            }
            for entry in self.inputs(side).iter().chain(self.classpath(side)) {
                if !entry.exists() {
                    anyhow::bail!("input not found: {}", entry.display());
                }
            }
            self.name_patterns(side).compile()?;
        }
        for entry in &self.shared_classpath {
            if !entry.exists() {
                anyhow::bail!("classpath entry not found: {}", entry.display());
            }
        }
        Ok(())
    }
}

/// Absolute and relative acceptance thresholds for one entity kind.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub absolute: f64,
    pub relative: f64,
}

impl Thresholds {
    pub const fn new(absolute: f64, relative: f64) -> Self {
        Self { absolute, relative }
    }
}

/// Tunables of the automatic matcher.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatcherConfig {
    pub classes: Thresholds,
    pub methods: Thresholds,
    pub fields: Thresholds,
    pub args: Thresholds,
    pub vars: Thresholds,
    /// Never pair an obfuscated name with a non-obfuscated one.
    pub assume_both_or_none_obfuscated: bool,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            classes: Thresholds::new(0.8, 0.08),
            methods: Thresholds::new(0.8, 0.08),
            fields: Thresholds::new(0.8, 0.08),
            args: Thresholds::new(0.85, 0.08),
            vars: Thresholds::new(0.85, 0.08),
            assume_both_or_none_obfuscated: false,
        }
    }
}

impl MatcherConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_match_whole_names_only() {
        let patterns = NamePatterns {
            classes: Some("net/example/.*".to_string()),
            members: Some("get[A-Z].*|run".to_string()),
        }
        .compile()
        .expect("compile");

        assert!(!patterns.is_class_obfuscated("net/example/Main"));
        assert!(patterns.is_class_obfuscated("a"));
        assert!(!patterns.is_member_obfuscated("getName"));
        assert!(patterns.is_member_obfuscated("rerun"));
        assert!(!patterns.is_member_obfuscated("<init>"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let patterns = NamePatterns {
            classes: Some("(".to_string()),
            members: None,
        };
        let error = patterns.compile().expect_err("invalid regex");
        assert!(error.to_string().contains("invalid name pattern"));
    }

    #[test]
    fn project_paths_resolve_against_the_project_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("project.json");
        fs::write(
            &path,
            r#"{"inputs_a": ["a.jar"], "inputs_b": ["/abs/b.jar"], "non_obfuscated_a": {"classes": "x/.*"}}"#,
        )
        .expect("write project");

        let config = ProjectConfig::load(&path).expect("load");

        assert_eq!(vec![dir.path().join("a.jar")], config.inputs_a);
        assert_eq!(vec![PathBuf::from("/abs/b.jar")], config.inputs_b);
        assert_eq!(Some("x/.*".to_string()), config.non_obfuscated_a.classes);
    }

    #[test]
    fn matcher_config_fills_missing_fields_with_defaults() {
        let config: MatcherConfig =
            serde_json::from_str(r#"{"classes": {"absolute": 0.5, "relative": 0.1}}"#)
                .expect("parse");
        assert_eq!(Thresholds::new(0.5, 0.1), config.classes);
        assert_eq!(Thresholds::new(0.85, 0.08), config.args);
        assert!(!config.assume_both_or_none_obfuscated);
    }
}
