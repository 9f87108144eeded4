//! Structure scanner
//!
//! Discovers agents, companion tests, core modules and documentation from
//! the project's directory convention. Missing directories produce empty
//! maps; nothing here fails the scan.

use crate::config::{Language, LayoutConfig};
use crate::models::{EntityDescriptor, EntityKind, FileDescriptor, ScanResult};
use chrono::{DateTime, Utc};
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct StructureScanner {
    root: PathBuf,
    layout: LayoutConfig,
}

impl StructureScanner {
    pub fn new(root: impl Into<PathBuf>, layout: LayoutConfig) -> Self {
        Self {
            root: root.into(),
            layout,
        }
    }

    fn language(&self) -> Language {
        self.layout.language
    }

    /// Run a full scan
    pub fn scan(&self) -> ScanResult {
        let tests = self.scan_tests();
        let agents = self.scan_agents(&tests);
        let core_modules = self.scan_core_modules();
        let documentation = self.scan_documentation();

        info!(
            "Scanned {}: {} agents, {} tests, {} core modules, {} docs",
            self.root.display(),
            agents.len(),
            tests.len(),
            core_modules.len(),
            documentation.len()
        );

        ScanResult {
            root: self.root.clone(),
            agents,
            tests,
            core_modules,
            documentation,
            timestamp: Utc::now(),
        }
    }

    fn scan_agents(&self, tests: &BTreeMap<String, FileDescriptor>) -> BTreeMap<String, EntityDescriptor> {
        let agents_dir = self.root.join(&self.layout.agents_dir);
        let language = self.language();
        let mut agents = BTreeMap::new();

        for path in walk(&agents_dir, Some(1)) {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if language.is_private_file(file_name) {
                continue;
            }

            let descriptor = if path.is_dir() {
                self.describe_directory(file_name, &path, tests)
            } else if language.is_source_file(&path) {
                let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                self.describe_file(stem, &path, tests)
            } else {
                continue;
            };

            if !descriptor.exists {
                debug!("Agent {} has no main file", descriptor.name);
            }
            agents.insert(descriptor.name.clone(), descriptor);
        }

        agents
    }

    fn describe_directory(
        &self,
        name: &str,
        dir: &Path,
        tests: &BTreeMap<String, FileDescriptor>,
    ) -> EntityDescriptor {
        let language = self.language();
        let main_file_path = resolve_main_file(dir, name, language);
        let (_, last_modified) = main_file_path
            .as_deref()
            .map(file_metadata)
            .unwrap_or((0, None));

        let size_bytes = walk(dir, None)
            .iter()
            .filter(|p| language.is_source_file(p))
            .map(|p| file_metadata(p).0)
            .sum();

        let sub_dir = dir.join(&self.layout.sub_component_dir);
        let sub_component_files: Vec<String> = walk(&sub_dir, Some(1))
            .into_iter()
            .filter(|p| p.is_file() && language.is_source_file(p))
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .filter(|n| !language.is_private_file(n))
            .collect();

        EntityDescriptor {
            name: name.to_string(),
            kind: EntityKind::Directory,
            path: dir.to_path_buf(),
            exists: main_file_path.is_some(),
            main_file_path,
            has_companion_test: has_companion_test(name, tests),
            has_package_init: dir.join(language.package_init()).is_file(),
            has_sub_components: !sub_component_files.is_empty(),
            sub_component_count: sub_component_files.len(),
            has_sub_component_index: sub_dir.join(language.package_init()).is_file(),
            sub_component_files,
            size_bytes,
            last_modified,
            has_documentation: dir.join("README.md").is_file() || self.has_named_doc(name),
        }
    }

    fn describe_file(
        &self,
        name: &str,
        path: &Path,
        tests: &BTreeMap<String, FileDescriptor>,
    ) -> EntityDescriptor {
        let (size_bytes, last_modified) = file_metadata(path);

        EntityDescriptor {
            name: name.to_string(),
            kind: EntityKind::File,
            path: path.to_path_buf(),
            main_file_path: Some(path.to_path_buf()),
            exists: true,
            has_companion_test: has_companion_test(name, tests),
            has_package_init: false,
            has_sub_components: false,
            sub_component_count: 0,
            has_sub_component_index: false,
            sub_component_files: Vec::new(),
            size_bytes,
            last_modified,
            has_documentation: self.has_named_doc(name),
        }
    }

    /// `<name>.md` in the project root or any docs location
    fn has_named_doc(&self, name: &str) -> bool {
        let file_name = format!("{name}.md");
        std::iter::once(self.root.clone())
            .chain(self.layout.docs_dirs.iter().map(|d| self.root.join(d)))
            .any(|dir| dir.join(&file_name).is_file())
    }

    /// `test_*` source files anywhere under the tests dir, keyed by stem
    fn scan_tests(&self) -> BTreeMap<String, FileDescriptor> {
        let tests_dir = self.root.join(&self.layout.tests_dir);
        let language = self.language();
        let mut tests = BTreeMap::new();

        for path in walk(&tests_dir, None) {
            if !path.is_file() || !language.is_source_file(&path) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with("test_") {
                tests
                    .entry(stem.to_string())
                    .or_insert_with(|| file_descriptor(stem, &path));
            }
        }

        tests
    }

    fn scan_core_modules(&self) -> BTreeMap<String, FileDescriptor> {
        let core_dir = self.root.join(&self.layout.core_dir);
        let language = self.language();
        let mut modules = BTreeMap::new();

        for path in walk(&core_dir, Some(1)) {
            if !path.is_file() || !language.is_source_file(&path) {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if language.is_private_file(file_name) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                modules.insert(stem.to_string(), file_descriptor(stem, &path));
            }
        }

        modules
    }

    /// Root-level markdown plus everything under the docs locations
    fn scan_documentation(&self) -> Vec<PathBuf> {
        let is_markdown = |p: &PathBuf| {
            p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("md")
        };

        let mut docs: Vec<PathBuf> = walk(&self.root, Some(1))
            .into_iter()
            .filter(is_markdown)
            .collect();
        for dir in &self.layout.docs_dirs {
            docs.extend(walk(&self.root.join(dir), None).into_iter().filter(is_markdown));
        }
        docs.sort();
        docs.dedup();
        docs
    }
}

/// Resolve an entity directory's main file
///
/// 1. `<dir>/<name>.<ext>`
/// 2. the alphabetically first non-private source file directly in `<dir>`
/// 3. none
pub fn resolve_main_file(dir: &Path, name: &str, language: Language) -> Option<PathBuf> {
    let preferred = dir.join(format!("{name}.{}", language.extension()));
    if preferred.is_file() {
        return Some(preferred);
    }

    walk(dir, Some(1)).into_iter().find(|p| {
        p.is_file()
            && language.is_source_file(p)
            && p
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !language.is_private_file(n))
    })
}

fn has_companion_test(name: &str, tests: &BTreeMap<String, FileDescriptor>) -> bool {
    tests.contains_key(&format!("test_{name}"))
}

/// Paths under `dir` (excluding `dir` itself), sorted, respecting ignore files
fn walk(dir: &Path, max_depth: Option<usize>) -> Vec<PathBuf> {
    if !dir.is_dir() {
        debug!("Directory {} not found, skipping", dir.display());
        return Vec::new();
    }

    let mut builder = WalkBuilder::new(dir);
    builder
        .hidden(true)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(true)
        .require_git(false)
        .max_depth(max_depth)
        .sort_by_file_name(|a, b| a.cmp(b));

    builder
        .build()
        .flatten()
        .filter(|entry| entry.depth() > 0)
        .map(|entry| entry.into_path())
        .collect()
}

fn file_descriptor(name: &str, path: &Path) -> FileDescriptor {
    let (size_bytes, last_modified) = file_metadata(path);
    FileDescriptor {
        name: name.to_string(),
        path: path.to_path_buf(),
        size_bytes,
        last_modified,
    }
}

fn file_metadata(path: &Path) -> (u64, Option<DateTime<Utc>>) {
    match std::fs::metadata(path) {
        Ok(meta) => (
            meta.len(),
            meta.modified().ok().map(DateTime::<Utc>::from),
        ),
        Err(_) => (0, None),
    }
}
