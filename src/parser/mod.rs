pub mod typescript;

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structural summary of one class or enum, as produced by a symbol source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolDescriptor {
    pub name: String,
    pub kind: DescriptorKind,
    pub members: Vec<MemberDescriptor>,
}

/// Kind of declaration a descriptor was extracted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    Class,
    Enum,
}

/// A property (`name: type`) or an enum member (`Name = value`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDescriptor {
    pub name: String,
    pub display_label: String,
}

/// A named import found in a document, with the file it resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedName {
    /// Name as exported by the defining module
    pub name: String,
    pub specifier: String,
    pub resolved_path: Option<PathBuf>,
}

/// Everything a source extracts from one document in a single pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSymbols {
    pub declared: Vec<SymbolDescriptor>,
    pub imports: Vec<ImportedName>,
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported language for {0}")]
    UnsupportedLanguage(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to load grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
    #[error("parser produced no tree for {0}")]
    Parse(PathBuf),
}

/// Supplies symbol descriptors on demand
pub trait SymbolSource: Send + Sync {
    /// Extract symbols from in-memory document text
    fn symbols_of_document(&self, path: &Path, text: &str) -> Result<DocumentSymbols, SourceError>;

    /// Extract symbols from a file on disk
    fn symbols_of_file(&self, path: &Path) -> Result<DocumentSymbols, SourceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.symbols_of_document(path, &text)
    }

    /// Resolve `name` to its declaration in the defining file `path`
    fn symbols_of_imported_name(
        &self,
        path: &Path,
        name: &str,
    ) -> Result<Option<SymbolDescriptor>, SourceError> {
        Ok(self
            .symbols_of_file(path)?
            .declared
            .into_iter()
            .find(|symbol| symbol.name == name))
    }
}
