use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::{Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use super::ObfuscationPatterns;
use jclassfile::class_file::ClassFile;

use crate::classfile::{RawClass, decode_class};
use crate::config::ProjectConfig;
use crate::model::Side;
use crate::scan::{ClassEntry, ScanMode, scan_paths};

/// Classpath classes by internal name, decoded on first use.
#[derive(Debug, Default)]
pub struct ClassIndex {
    entries: HashMap<String, IndexedClass>,
}

#[derive(Debug)]
enum IndexedClass {
    Parsed { uri: String, class_file: ClassFile },
    Decoded(RawClass),
}

impl ClassIndex {
    /// Index scanned entries; the first entry wins for a repeated name.
    pub fn from_entries(entries: Vec<ClassEntry>) -> Self {
        let mut index = HashMap::with_capacity(entries.len());
        for entry in entries {
            index.entry(entry.name).or_insert(IndexedClass::Parsed {
                uri: entry.uri,
                class_file: entry.class_file,
            });
        }
        Self { entries: index }
    }

    /// Index classes that are already decoded.
    pub fn from_classes(classes: Vec<RawClass>) -> Self {
        let mut index = HashMap::with_capacity(classes.len());
        for class in classes {
            index
                .entry(class.name.clone())
                .or_insert(IndexedClass::Decoded(class));
        }
        Self { entries: index }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and decode a class; each class is handed out once.
    pub(crate) fn take(&mut self, name: &str) -> Option<Result<RawClass>> {
        match self.entries.remove(name)? {
            IndexedClass::Decoded(class) => Some(Ok(class)),
            IndexedClass::Parsed { uri, class_file } => {
                Some(decode_class(&class_file).with_context(|| format!("failed to decode {uri}")))
            }
        }
    }
}

/// Decoded inputs and classpath of one side.
#[derive(Debug, Default)]
pub struct SideInputs {
    pub classes: Vec<RawClass>,
    pub classpath: ClassIndex,
    pub patterns: ObfuscationPatterns,
}

impl SideInputs {
    pub fn load(
        inputs: &[PathBuf],
        classpath: &[PathBuf],
        patterns: ObfuscationPatterns,
    ) -> Result<Self> {
        let entries = scan_paths(inputs, ScanMode::Input)?;
        let classes = entries
            .par_iter()
            .map(|entry| {
                decode_class(&entry.class_file)
                    .with_context(|| format!("failed to decode {}", entry.uri))
            })
            .collect::<Result<Vec<_>>>()?;
        let classpath = ClassIndex::from_entries(scan_paths(classpath, ScanMode::Classpath)?);
        Ok(Self {
            classes: merge_duplicates(classes),
            classpath,
            patterns,
        })
    }
}

/// Everything the extraction passes consume.
#[derive(Debug, Default)]
pub struct EnvInputs {
    pub a: SideInputs,
    pub b: SideInputs,
    pub shared: ClassIndex,
}

impl EnvInputs {
    /// Scan and decode both sides and the shared classpath concurrently.
    pub fn load(config: &ProjectConfig) -> Result<Self> {
        let patterns_a = config.name_patterns(Side::A).compile()?;
        let patterns_b = config.name_patterns(Side::B).compile()?;
        let ((a, b), shared) = rayon::join(
            || {
                rayon::join(
                    || {
                        SideInputs::load(config.inputs(Side::A), config.classpath(Side::A), patterns_a)
                            .context("failed to load side a")
                    },
                    || {
                        SideInputs::load(config.inputs(Side::B), config.classpath(Side::B), patterns_b)
                            .context("failed to load side b")
                    },
                )
            },
            || scan_paths(&config.shared_classpath, ScanMode::Classpath),
        );
        let inputs = Self {
            a: a?,
            b: b?,
            shared: ClassIndex::from_entries(shared?),
        };
        info!(
            inputs_a = inputs.a.classes.len(),
            inputs_b = inputs.b.classes.len(),
            classpath_a = inputs.a.classpath.len(),
            classpath_b = inputs.b.classpath.len(),
            shared = inputs.shared.len(),
            "indexed inputs"
        );
        Ok(inputs)
    }

    pub(crate) fn side_mut(&mut self, side: Side) -> &mut SideInputs {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }
}

/// Merge classes decoded more than once under the same name.
///
/// The first body wins for members present in several copies; members only
/// found in later copies are appended.
pub(crate) fn merge_duplicates(classes: Vec<RawClass>) -> Vec<RawClass> {
    let mut merged: Vec<RawClass> = Vec::with_capacity(classes.len());
    let mut positions: HashMap<String, usize> = HashMap::new();
    for class in classes {
        let Some(&position) = positions.get(&class.name) else {
            positions.insert(class.name.clone(), merged.len());
            merged.push(class);
            continue;
        };
        debug!(class = %class.name, "merging duplicate input class");
        let target = &mut merged[position];
        let methods: HashSet<(String, String)> = target
            .methods
            .iter()
            .map(|method| (method.name.clone(), method.descriptor.clone()))
            .collect();
        let fields: HashSet<(String, String)> = target
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.descriptor.clone()))
            .collect();
        target.methods.extend(
            class
                .methods
                .into_iter()
                .filter(|method| !methods.contains(&(method.name.clone(), method.descriptor.clone()))),
        );
        target.fields.extend(
            class
                .fields
                .into_iter()
                .filter(|field| !fields.contains(&(field.name.clone(), field.descriptor.clone()))),
        );
        for interface in class.interfaces {
            if !target.interfaces.contains(&interface) {
                target.interfaces.push(interface);
            }
        }
    }
    merged
}
