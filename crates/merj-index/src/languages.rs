//! Language detection and tree-sitter grammar registry.

use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

/// Directory names whose contents are never chunked.
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    "venv",
    "env",
    ".env",
    ".venv",
    "build",
    "dist",
    "out",
    "target",
    ".idea",
    ".vscode",
    ".vs",
    "vendor",
    "packages",
];

/// Extensions (lowercase, without dot) of binary, media, data and prose files.
pub const IGNORED_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "ico", "svg", "mp3", "mp4", "avi", "mov", "pdf", "doc", "docx",
    "xls", "xlsx", "zip", "tar", "gz", "rar", "exe", "dll", "so", "dylib", "json", "xml", "yaml",
    "yml", "toml", "lock", "log", "csv", "md", "rst", "txt",
];

/// Supported language with its tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Python,
    JavaScript,
    Jsx,
    TypeScript,
    Tsx,
    Go,
    Rust,
    Java,
    Cpp,
    C,
    Ruby,
    Php,
}

impl Lang {
    pub const ALL: [Lang; 12] = [
        Lang::Python,
        Lang::JavaScript,
        Lang::Jsx,
        Lang::TypeScript,
        Lang::Tsx,
        Lang::Go,
        Lang::Rust,
        Lang::Java,
        Lang::Cpp,
        Lang::C,
        Lang::Ruby,
        Lang::Php,
    ];

    /// Identifier stored in chunk records and vector payloads.
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Cpp => "cpp",
            Self::C => "c",
            Self::Ruby => "ruby",
            Self::Php => "php",
        }
    }

    /// Get the tree-sitter grammar. Returns `None` if the
    /// corresponding feature is not enabled.
    #[must_use]
    pub fn grammar(self) -> Option<tree_sitter::Language> {
        match self {
            #[cfg(feature = "lang-python")]
            Self::Python => Some(tree_sitter_python::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::JavaScript | Self::Jsx => Some(tree_sitter_javascript::LANGUAGE.into()),
            #[cfg(feature = "lang-js")]
            Self::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            #[cfg(feature = "lang-js")]
            Self::Tsx => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
            #[cfg(feature = "lang-go")]
            Self::Go => Some(tree_sitter_go::LANGUAGE.into()),
            #[cfg(feature = "lang-rust")]
            Self::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            #[cfg(feature = "lang-java")]
            Self::Java => Some(tree_sitter_java::LANGUAGE.into()),
            #[cfg(feature = "lang-c")]
            Self::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            #[cfg(feature = "lang-c")]
            Self::C => Some(tree_sitter_c::LANGUAGE.into()),
            #[cfg(feature = "lang-ruby")]
            Self::Ruby => Some(tree_sitter_ruby::LANGUAGE.into()),
            #[cfg(feature = "lang-php")]
            Self::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Node kinds treated as declared units: they become their own chunk
    /// and are the targets of line lookups.
    #[must_use]
    pub fn unit_node_kinds(self) -> &'static [&'static str] {
        match self {
            Self::Python => &[
                "function_definition",
                "class_definition",
                "decorated_definition",
            ],
            Self::JavaScript => &[
                "function_declaration",
                "class_declaration",
                "function_expression",
                "lexical_declaration",
                "export_statement",
            ],
            Self::Jsx => &[
                "function_declaration",
                "class_declaration",
                "lexical_declaration",
            ],
            Self::TypeScript => &[
                "function_declaration",
                "class_declaration",
                "interface_declaration",
                "type_alias_declaration",
                "enum_declaration",
            ],
            Self::Tsx => &[
                "function_declaration",
                "class_declaration",
                "interface_declaration",
                "lexical_declaration",
            ],
            Self::Go => &[
                "function_declaration",
                "method_declaration",
                "type_declaration",
            ],
            Self::Rust => &[
                "function_item",
                "impl_item",
                "struct_item",
                "enum_item",
                "trait_item",
            ],
            Self::Java => &[
                "class_declaration",
                "interface_declaration",
                "method_declaration",
                "constructor_declaration",
            ],
            Self::Cpp => &[
                "function_definition",
                "class_specifier",
                "struct_specifier",
                "namespace_definition",
            ],
            Self::C => &[
                "function_definition",
                "struct_specifier",
                "union_specifier",
            ],
            Self::Ruby => &["method", "class", "module"],
            Self::Php => &[
                "function_definition",
                "class_declaration",
                "method_declaration",
            ],
        }
    }

    #[must_use]
    pub fn is_unit_kind(self, kind: &str) -> bool {
        self.unit_node_kinds().contains(&kind)
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Detect language from file extension, without consulting ignore rules.
#[must_use]
pub fn detect_language(path: &Path) -> Option<Lang> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "py" | "pyw" | "pyi" => Some(Lang::Python),
        "js" | "mjs" | "cjs" => Some(Lang::JavaScript),
        "jsx" => Some(Lang::Jsx),
        "ts" => Some(Lang::TypeScript),
        "tsx" => Some(Lang::Tsx),
        "go" => Some(Lang::Go),
        "rs" => Some(Lang::Rust),
        "java" => Some(Lang::Java),
        "cpp" | "cc" | "cxx" | "hpp" => Some(Lang::Cpp),
        "c" | "h" => Some(Lang::C),
        "rb" => Some(Lang::Ruby),
        "php" => Some(Lang::Php),
        _ => None,
    }
}

#[must_use]
pub fn is_ignored_dir_name(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

/// True when any parent directory of `path` is ignored or the extension is
/// on the denylist. Pure predicate over the path.
#[must_use]
pub fn is_ignored(path: &Path) -> bool {
    let in_ignored_dir = path.parent().is_some_and(|parent| {
        parent.components().any(|c| match c {
            Component::Normal(name) => name.to_str().is_some_and(is_ignored_dir_name),
            _ => false,
        })
    });
    if in_ignored_dir {
        return true;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IGNORED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Resolve a path to a chunkable language: ignore rules first, then the
/// extension table, then grammar availability.
#[must_use]
pub fn resolve(path: &Path) -> Option<Lang> {
    if is_ignored(path) {
        return None;
    }
    detect_language(path).filter(|lang| lang.grammar().is_some())
}

/// Check that every compiled-in grammar knows each of its unit node kinds.
///
/// Languages whose grammar feature is disabled are skipped.
///
/// # Errors
///
/// Returns [`IndexError::Parse`] naming every unknown kind.
pub fn validate_registry() -> Result<()> {
    let mut unknown = Vec::new();
    for lang in Lang::ALL {
        let Some(grammar) = lang.grammar() else {
            tracing::debug!(%lang, "grammar not compiled in");
            continue;
        };
        for kind in lang.unit_node_kinds() {
            if grammar.id_for_node_kind(kind, true) == 0 {
                unknown.push(format!("{lang}:{kind}"));
            }
        }
    }
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(IndexError::Parse(format!(
            "unknown unit node kinds: {}",
            unknown.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_py_aliases() {
        for ext in &["py", "pyw", "pyi", "PY"] {
            let path = format!("file.{ext}");
            assert_eq!(
                detect_language(Path::new(&path)),
                Some(Lang::Python),
                "failed for .{ext}"
            );
        }
    }

    #[test]
    fn detect_language_js_variants() {
        for ext in &["js", "mjs", "cjs"] {
            let path = format!("file.{ext}");
            assert_eq!(detect_language(Path::new(&path)), Some(Lang::JavaScript));
        }
        assert_eq!(detect_language(Path::new("a.jsx")), Some(Lang::Jsx));
        assert_eq!(detect_language(Path::new("a.ts")), Some(Lang::TypeScript));
        assert_eq!(detect_language(Path::new("a.tsx")), Some(Lang::Tsx));
    }

    #[test]
    fn detect_language_c_family() {
        for ext in &["cpp", "cc", "cxx", "hpp"] {
            let path = format!("file.{ext}");
            assert_eq!(detect_language(Path::new(&path)), Some(Lang::Cpp));
        }
        assert_eq!(detect_language(Path::new("a.c")), Some(Lang::C));
        assert_eq!(detect_language(Path::new("a.h")), Some(Lang::C));
    }

    #[test]
    fn detect_language_unknown_ext_returns_none() {
        assert_eq!(detect_language(Path::new("file.xyz")), None);
        assert_eq!(detect_language(Path::new("Makefile")), None);
    }

    #[test]
    fn ignored_directories() {
        assert!(is_ignored(Path::new("node_modules/lib/index.js")));
        assert!(is_ignored(Path::new("src/__pycache__/mod.py")));
        assert!(is_ignored(Path::new("/repo/target/debug/build.rs")));
        assert!(!is_ignored(Path::new("src/build.rs")));
        assert!(!is_ignored(Path::new("src/app/main.py")));
    }

    #[test]
    fn ignored_extensions() {
        assert!(is_ignored(Path::new("Cargo.toml")));
        assert!(is_ignored(Path::new("docs/README.MD")));
        assert!(is_ignored(Path::new("logo.png")));
        assert!(!is_ignored(Path::new("main.go")));
    }

    #[test]
    fn resolve_applies_ignore_first() {
        assert_eq!(resolve(Path::new("vendor/pkg/a.go")), None);
        #[cfg(feature = "lang-go")]
        assert_eq!(resolve(Path::new("pkg/a.go")), Some(Lang::Go));
    }

    #[test]
    fn unit_kinds_python() {
        let kinds = Lang::Python.unit_node_kinds();
        assert!(kinds.contains(&"function_definition"));
        assert!(kinds.contains(&"class_definition"));
        assert!(Lang::Python.is_unit_kind("decorated_definition"));
        assert!(!Lang::Python.is_unit_kind("if_statement"));
    }

    #[test]
    fn every_language_has_units() {
        for lang in Lang::ALL {
            assert!(!lang.unit_node_kinds().is_empty(), "{lang}");
        }
    }

    #[test]
    fn grammar_returns_some_for_enabled_features() {
        #[cfg(feature = "lang-rust")]
        assert!(Lang::Rust.grammar().is_some());
        #[cfg(feature = "lang-python")]
        assert!(Lang::Python.grammar().is_some());
        #[cfg(feature = "lang-js")]
        {
            assert!(Lang::JavaScript.grammar().is_some());
            assert!(Lang::Jsx.grammar().is_some());
            assert!(Lang::TypeScript.grammar().is_some());
            assert!(Lang::Tsx.grammar().is_some());
        }
        #[cfg(feature = "lang-php")]
        assert!(Lang::Php.grammar().is_some());
    }

    #[test]
    fn registry_is_valid() {
        validate_registry().unwrap();
    }

    #[test]
    fn lang_id_matches_serde_and_display() {
        for lang in Lang::ALL {
            assert_eq!(lang.to_string(), lang.id());
            assert_eq!(
                serde_json::to_value(lang).unwrap(),
                serde_json::json!(lang.id())
            );
        }
    }
}
