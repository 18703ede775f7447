//! Import resolution.
//!
//! Scoped down to local/project-relative imports only: no embedded
//! standard library and no FFI manifest reading, both out of scope here.
//! An `import "path"` is resolved relative to the importing file's
//! directory; `import std:name` is recorded but never resolves to a real
//! module, since there is no embedded stdlib to resolve it against.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::ast::{ImportSpec, StmtKind};
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::source::SourceBuffer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    NotFound { path: PathBuf },
    Io { path: PathBuf, message: String },
    UnresolvableStdImport { name: String },
    CyclicImport { path: PathBuf },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { path } => write!(f, "import not found: {}", path.display()),
            ResolveError::Io { path, message } => {
                write!(f, "failed to read import {}: {}", path.display(), message)
            }
            ResolveError::UnresolvableStdImport { name } => {
                write!(f, "no embedded standard library entry for `std:{}`", name)
            }
            ResolveError::CyclicImport { path } => {
                write!(f, "import cycle detected at {}", path.display())
            }
        }
    }
}

impl std::error::Error for ResolveError {}

pub struct ResolvedModule {
    pub path: PathBuf,
    pub buffer: SourceBuffer,
    pub source_hash: [u8; 32],
}

/// Resolves a single `ImportSpec` relative to `from_dir`, reading the file
/// and hashing its bytes for the cache's transitive import closure.
pub fn resolve_import(spec: &ImportSpec, from_dir: &Path) -> Result<ResolvedModule, ResolveError> {
    match spec {
        ImportSpec::Std(name) => Err(ResolveError::UnresolvableStdImport { name: name.clone() }),
        ImportSpec::Path(rel) => {
            let path = from_dir.join(rel);
            let text = std::fs::read_to_string(&path).map_err(|e| ResolveError::Io {
                path: path.clone(),
                message: e.to_string(),
            })?;
            let hash = hash_bytes(text.as_bytes());
            let buffer = SourceBuffer::new(path.clone(), text);
            Ok(ResolvedModule {
                path,
                buffer,
                source_hash: hash,
            })
        }
    }
}

fn hash_bytes(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Walks the import graph starting from `root`, returning the sorted,
/// deduplicated set of hex-encoded hashes of every transitively imported
/// module. Used by the cache to build its composite key.
pub fn transitive_import_hashes(
    root_dir: &Path,
    root_imports: &[ImportSpec],
) -> Result<Vec<String>, ResolveError> {
    let mut visited_paths: HashSet<PathBuf> = HashSet::new();
    let mut hashes = Vec::new();
    let mut stack: Vec<(PathBuf, ImportSpec)> = root_imports
        .iter()
        .map(|spec| (root_dir.to_path_buf(), spec.clone()))
        .collect();

    while let Some((dir, spec)) = stack.pop() {
        let module = match resolve_import(&spec, &dir) {
            Ok(m) => m,
            Err(ResolveError::UnresolvableStdImport { .. }) => continue,
            Err(e) => return Err(e),
        };
        if !visited_paths.insert(module.path.clone()) {
            continue;
        }
        hashes.push(hex_encode(module.source_hash));

        let module_dir = module.path.parent().unwrap_or(Path::new(".")).to_path_buf();
        for nested in module_imports(&module.buffer) {
            stack.push((module_dir.clone(), nested));
        }
    }

    hashes.sort();
    hashes.dedup();
    Ok(hashes)
}

/// Lexes and parses a resolved module just far enough to collect its own
/// top-level `import` declarations, so the closure walk can descend into
/// them.
fn module_imports(buffer: &SourceBuffer) -> Vec<ImportSpec> {
    let (tokens, _) = Lexer::new(buffer).tokenize();
    let arena = bumpalo::Bump::new();
    let parser = Parser::new(&arena, tokens);
    let (program, _) = parser.parse_program(buffer.path().to_path_buf());
    program
        .top_level
        .iter()
        .filter_map(|stmt| match &stmt.kind {
            StmtKind::ImportDecl(decl) => Some(decl.spec.clone()),
            _ => None,
        })
        .collect()
}

fn hex_encode(bytes: [u8; 32]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_relative_path_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("util.home")).unwrap();
        writeln!(file, "fn helper() {{ return }}").unwrap();

        let spec = ImportSpec::Path("util.home".to_string());
        let resolved = resolve_import(&spec, dir.path()).unwrap();
        assert_eq!(resolved.path, dir.path().join("util.home"));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ImportSpec::Path("missing.home".to_string());
        let err = resolve_import(&spec, dir.path()).unwrap_err();
        assert!(matches!(err, ResolveError::Io { .. }));
    }

    #[test]
    fn std_import_is_unresolvable() {
        let dir = tempfile::tempdir().unwrap();
        let spec = ImportSpec::Std("collections".to_string());
        let err = resolve_import(&spec, dir.path()).unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvableStdImport { .. }));
    }

    #[test]
    fn transitive_hashes_are_sorted_and_deduped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.home"), "let x = 1;").unwrap();
        std::fs::write(dir.path().join("b.home"), "let y = 2;").unwrap();
        let imports = vec![
            ImportSpec::Path("a.home".to_string()),
            ImportSpec::Path("b.home".to_string()),
            ImportSpec::Path("a.home".to_string()),
        ];
        let hashes = transitive_import_hashes(dir.path(), &imports).unwrap();
        assert_eq!(hashes.len(), 2);
        let mut sorted = hashes.clone();
        sorted.sort();
        assert_eq!(hashes, sorted);
    }

    #[test]
    fn transitive_hashes_include_nested_imports() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.home"), "import \"b.home\"\nlet x = 1;").unwrap();
        std::fs::write(dir.path().join("b.home"), "import \"c.home\"\nlet y = 2;").unwrap();
        std::fs::write(dir.path().join("c.home"), "let z = 3;").unwrap();

        let root_imports = vec![ImportSpec::Path("a.home".to_string())];
        let hashes = transitive_import_hashes(dir.path(), &root_imports).unwrap();
        assert_eq!(hashes.len(), 3, "expected a, b, and c all hashed: {:?}", hashes);

        // Changing only the deepest import (c.home) must change the closure's
        // hash set, proving the walk actually descended into it rather than
        // stopping at the direct import (a.home).
        std::fs::write(dir.path().join("c.home"), "let z = 999;").unwrap();
        let hashes_after_change = transitive_import_hashes(dir.path(), &root_imports).unwrap();
        assert_ne!(hashes, hashes_after_change);
    }
}
