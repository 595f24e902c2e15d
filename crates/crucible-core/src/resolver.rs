//! Entry-class resolution for single-file submissions
//!
//! Determines which class owns `public static void main` so the source can be
//! written as `<Class>.java` and invoked by name. This is a textual heuristic,
//! not a parse: exactly one entry-point signature is required, and the owning
//! class is taken to be the last class declaration preceding it. A signature
//! inside a string literal or unusually nested declarations can fool it; the
//! single-file submission format keeps that acceptable in practice.

use regex::Regex;

use crate::errors::ResolutionError;

const ENTRY_POINT_PATTERN: &str = r"public\s+static\s+void\s+main\s*\(";
const CLASS_DECL_PATTERN: &str = r"(?:public\s+)?class\s+(\w+)";

/// Resolves the name of the class containing the single `main` method.
pub fn resolve_entry_class(source: &str) -> Result<String, ResolutionError> {
    let entry_re = Regex::new(ENTRY_POINT_PATTERN).unwrap();

    let mut matches = entry_re.find_iter(source);
    let entry = matches.next().ok_or(ResolutionError::NoEntryPoint)?;
    if matches.next().is_some() {
        return Err(ResolutionError::AmbiguousEntryPoint);
    }

    // The entry point belongs to the innermost enclosing class, i.e. the last
    // declaration that appears before it in the text.
    let before_entry = &source[..entry.start()];
    let class_re = Regex::new(CLASS_DECL_PATTERN).unwrap();
    class_re
        .captures_iter(before_entry)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|name| name.as_str().to_string())
        .ok_or(ResolutionError::NoOwningClass)
}
