use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jclassfile::class_file::{self, ClassFile};
use rayon::prelude::*;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::classfile::class_name;

/// One parsed class file found while scanning.
#[derive(Debug)]
pub struct ClassEntry {
    /// Internal class name from the class file header.
    pub name: String,
    /// File path, or `jar:<path>!/<entry>` for archive members.
    pub uri: String,
    pub class_file: ClassFile,
}

/// How strictly scanned class files are checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ScanMode {
    /// Input classes: every file must parse, failures abort the scan.
    Input,
    /// Classpath classes: unreadable entries are skipped with a warning.
    Classpath,
}

/// Class file bytes before parsing.
struct RawEntry {
    uri: String,
    data: Vec<u8>,
}

/// Collect class entries from `.class` files, `.jar` archives and directories.
pub(crate) fn scan_paths(paths: &[PathBuf], mode: ScanMode) -> Result<Vec<ClassEntry>> {
    let mut raw = Vec::new();

    // Keep deterministic ordering within each group of paths.
    let mut sorted = paths.to_vec();
    if mode == ScanMode::Classpath {
        sorted.sort_by(|a, b| path_key(a).cmp(&path_key(b)));
    }

    for path in sorted {
        scan_path(&path, true, &mut raw)?;
    }

    let parsed: Vec<Option<ClassEntry>> = raw
        .into_par_iter()
        .map(|entry| parse_entry(entry, mode))
        .collect::<Result<_>>()?;
    let entries: Vec<ClassEntry> = parsed.into_iter().flatten().collect();
    debug!(count = entries.len(), ?mode, "scanned class entries");

    Ok(entries)
}

fn scan_path(path: &Path, strict: bool, raw: &mut Vec<RawEntry>) -> Result<()> {
    if path.is_dir() {
        scan_dir(path, raw)?;
        return Ok(());
    }

    let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");
    match extension {
        "class" => scan_class_file(path, raw),
        "jar" | "zip" => scan_jar_file(path, raw),
        _ => {
            if strict {
                anyhow::bail!("unsupported input file: {}", path.display())
            } else {
                Ok(())
            }
        }
    }
}

fn scan_dir(path: &Path, raw: &mut Vec<RawEntry>) -> Result<()> {
    let mut children = Vec::new();
    for entry in fs::read_dir(path)
        .with_context(|| format!("failed to read directory {}", path.display()))?
    {
        let entry = entry.with_context(|| format!("failed to read entry under {}", path.display()))?;
        children.push(entry.path());
    }

    children.sort_by(|a, b| path_key(a).cmp(&path_key(b)));

    for child in children {
        if child.is_dir() {
            scan_dir(&child, raw)?;
        } else {
            scan_path(&child, false, raw)?;
        }
    }

    Ok(())
}

fn scan_class_file(path: &Path, raw: &mut Vec<RawEntry>) -> Result<()> {
    if path.file_name().is_some_and(|name| name == "module-info.class") {
        return Ok(());
    }
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    raw.push(RawEntry {
        uri: path_to_uri(path),
        data,
    });
    Ok(())
}

fn scan_jar_file(path: &Path, raw: &mut Vec<RawEntry>) -> Result<()> {
    let file = fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("failed to read {}", path.display()))?;

    let mut entry_names = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.ends_with(".class") && !name.ends_with("module-info.class") {
            entry_names.push(name);
        }
    }

    entry_names.sort();

    for name in entry_names {
        let mut entry = archive
            .by_name(&name)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read {}:{}", path.display(), name))?;
        raw.push(RawEntry {
            uri: jar_entry_uri(path, &name),
            data,
        });
    }

    Ok(())
}

fn parse_entry(entry: RawEntry, mode: ScanMode) -> Result<Option<ClassEntry>> {
    let parsed = class_file::parse(&entry.data)
        .context("invalid class file")
        .and_then(|class_file| Ok((class_name(&class_file)?, class_file)));
    match (parsed, mode) {
        (Ok((name, class_file)), _) => Ok(Some(ClassEntry {
            name,
            uri: entry.uri,
            class_file,
        })),
        (Err(error), ScanMode::Input) => {
            Err(error).with_context(|| format!("failed to parse {}", entry.uri))
        }
        (Err(error), ScanMode::Classpath) => {
            warn!(uri = %entry.uri, error = format!("{error:#}"), "skipping unreadable classpath entry");
            Ok(None)
        }
    }
}

fn path_to_uri(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn jar_entry_uri(jar_path: &Path, entry_name: &str) -> String {
    format!("jar:{}!/{}", jar_path.to_string_lossy(), entry_name)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
