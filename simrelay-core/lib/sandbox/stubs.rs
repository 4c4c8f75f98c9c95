//! Detection of imported-but-missing support modules and the stubs that stand in for them.

use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;

use super::SourceBundle;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static IMPORT_STATEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*import\s+([^#]+)").unwrap());

static FROM_STATEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*from\s+([A-Za-z_]\w*)(?:\.[\w.]+)?\s+import\b").unwrap());

const CONSTANTS_STUB: &str = include_str!("assets/stubs/constants.py");
const SNAKE_CLASS_STUB: &str = include_str!("assets/stubs/snake_class.py");
const FOOD_STUB: &str = include_str!("assets/stubs/food.py");
const GAME_UTILS_STUB: &str = include_str!("assets/stubs/game_utils.py");
const UTILS_STUB: &str = include_str!("assets/stubs/utils.py");

/// Support modules that can be synthesized, with the modules each stub itself depends on.
const STUB_CATALOG: &[(&str, &str, &[&str])] = &[
    ("constants", CONSTANTS_STUB, &[]),
    ("snake_class", SNAKE_CLASS_STUB, &[]),
    ("food", FOOD_STUB, &[]),
    ("food_class", FOOD_STUB, &[]),
    ("game_utils", GAME_UTILS_STUB, &[]),
    ("utils", UTILS_STUB, &["game_utils"]),
];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A synthesized module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubModule {
    /// File name inside the run scope
    pub filename: String,

    /// Python source
    pub content: &'static str,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Returns the top-level module names imported anywhere in `source`.
///
/// Covers `import m`, `import m as x`, `import a, m`, `from m import ...` and
/// `from m.sub import ...`. Relative imports are ignored.
pub fn imported_modules(source: &str) -> BTreeSet<String> {
    let mut modules = BTreeSet::new();

    for line in source.lines() {
        if let Some(captures) = FROM_STATEMENT.captures(line) {
            modules.insert(captures[1].to_string());
            continue;
        }

        if let Some(captures) = IMPORT_STATEMENT.captures(line) {
            for item in captures[1].split(',') {
                let Some(path) = item.split_whitespace().next() else {
                    continue;
                };

                if let Some(top) = path.split('.').next().filter(|top| is_identifier(top)) {
                    modules.insert(top.to_string());
                }
            }
        }
    }

    modules
}

/// Returns the module names a bundle provides itself, as files or packages.
pub fn provided_modules(bundle: &SourceBundle) -> BTreeSet<String> {
    bundle
        .files()
        .keys()
        .filter_map(|name| match name.split_once('/') {
            Some((package, _)) => Some(package.to_string()),
            None => name.strip_suffix(".py").map(str::to_string),
        })
        .collect()
}

/// Synthesizes stubs for every support module the bundle imports but does not provide.
///
/// Stubs are purely additive: a module the bundle provides is never replaced.
pub fn synthesize_stubs(bundle: &SourceBundle) -> Vec<StubModule> {
    let provided = provided_modules(bundle);
    let imported: BTreeSet<String> = bundle
        .python_sources()
        .flat_map(|(_, source)| imported_modules(source))
        .collect();

    let mut needed: BTreeSet<&str> = BTreeSet::new();
    for module in imported.iter().filter(|module| !provided.contains(*module)) {
        if let Some((name, _, depends_on)) = catalog_entry(module) {
            needed.insert(*name);
            needed.extend(
                depends_on
                    .iter()
                    .copied()
                    .filter(|dependency| !provided.contains(*dependency)),
            );
        }
    }

    STUB_CATALOG
        .iter()
        .filter(|(name, _, _)| needed.contains(name))
        .map(|(name, content, _)| StubModule {
            filename: format!("{name}.py"),
            content: *content,
        })
        .collect()
}

fn catalog_entry(module: &str) -> Option<&'static (&'static str, &'static str, &'static [&'static str])> {
    STUB_CATALOG.iter().find(|(name, _, _)| *name == module)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic())
        && chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
