// ABOUTME: Maps file extensions to the extraction dialect and its Tree-sitter grammar
// ABOUTME: Unknown extensions map to no dialect and are reported as unsupported

use serde::{Deserialize, Serialize};
use std::fmt;
use tree_sitter::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// JavaScript and TypeScript, including JSX/TSX.
    Script,
    Rust,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Script => write!(f, "script"),
            Dialect::Rust => write!(f, "rust"),
        }
    }
}

const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "mts", "cts"];
const RUST_EXTENSIONS: &[&str] = &["rs"];

fn extension(path: &str) -> Option<String> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

impl Dialect {
    pub fn from_path(path: &str) -> Option<Dialect> {
        let ext = extension(path)?;
        if SCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            Some(Dialect::Script)
        } else if RUST_EXTENSIONS.contains(&ext.as_str()) {
            Some(Dialect::Rust)
        } else {
            None
        }
    }

    pub fn file_extensions(&self) -> &'static [&'static str] {
        match self {
            Dialect::Script => SCRIPT_EXTENSIONS,
            Dialect::Rust => RUST_EXTENSIONS,
        }
    }
}

/// Grammar used to parse `path`. Plain TypeScript files get the grammar
/// without JSX so `<T>expr` casts parse; JavaScript files always accept JSX.
pub fn grammar_for(path: &str) -> Option<tree_sitter::Language> {
    let language = match extension(path)?.as_str() {
        "ts" | "mts" | "cts" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "tsx" => tree_sitter_typescript::LANGUAGE_TSX.into(),
        "js" | "jsx" | "mjs" | "cjs" => tree_sitter_javascript::LANGUAGE.into(),
        "rs" => tree_sitter_rust::LANGUAGE.into(),
        _ => return None,
    };
    Some(language)
}

/// A parser configured for `path`, or `None` for unsupported files.
pub fn create_parser(path: &str) -> Option<Parser> {
    let language = grammar_for(path)?;
    let mut parser = Parser::new();
    parser.set_language(&language).ok()?;
    Some(parser)
}
