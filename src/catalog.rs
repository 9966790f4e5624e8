//! Joke catalog loaded once at startup.
//!
//! The catalog is an immutable, ordered list of (setup, punchline) pairs
//! shared read-only by every session. It is loaded from a TOML file of
//! `[[jokes]]` tables:
//!
//! ```toml
//! [[jokes]]
//! setup = "Lettuce"
//! punchline = "Lettuce in, it's cold out here!"
//! ```
//!
//! An empty or invalid catalog is a startup failure; the server never
//! accepts a connection without at least one joke.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// A single joke. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Joke {
    pub setup: String,
    pub punchline: String,
}

/// Immutable collection of jokes, indexable by position.
#[derive(Debug)]
pub struct Catalog {
    jokes: Vec<Joke>,
}

/// On-disk catalog file structure.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    jokes: Vec<Joke>,
}

impl Catalog {
    /// Build a catalog from already-parsed jokes, validating every entry.
    pub fn new(jokes: Vec<Joke>) -> Result<Self, CatalogError> {
        for (index, joke) in jokes.iter().enumerate() {
            if joke.setup.trim().is_empty() || joke.punchline.trim().is_empty() {
                return Err(CatalogError::BlankJoke { index });
            }
        }
        if jokes.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Catalog { jokes })
    }

    /// Load the catalog from a TOML file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::FileRead(path.to_path_buf(), e))?;
        let file: CatalogFile = toml::from_str(&contents)
            .map_err(|e| CatalogError::TomlParse(path.to_path_buf(), e))?;

        let catalog = Self::new(file.jokes)?;
        info!(path = %path.display(), jokes = catalog.len(), "Loaded joke catalog");
        Ok(catalog)
    }

    /// Number of jokes in the catalog.
    pub fn len(&self) -> usize {
        self.jokes.len()
    }

    /// True when the catalog holds no jokes. `Catalog::new` rejects this
    /// state, so a constructed catalog is never empty.
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.jokes.is_empty()
    }

    /// Joke at `index`. Panics on an out-of-range index; callers only use
    /// indices in `0..len()`.
    pub fn get(&self, index: usize) -> &Joke {
        &self.jokes[index]
    }
}

/// Catalog loading errors
#[derive(Debug)]
pub enum CatalogError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    BlankJoke { index: usize },
    Empty,
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogError::FileRead(path, e) => {
                write!(f, "Failed to read joke catalog '{}': {}", path.display(), e)
            }
            CatalogError::TomlParse(path, e) => {
                write!(f, "Failed to parse joke catalog '{}': {}", path.display(), e)
            }
            CatalogError::BlankJoke { index } => {
                write!(f, "Joke {} has an empty setup or punchline", index + 1)
            }
            CatalogError::Empty => write!(f, "Joke catalog is empty"),
        }
    }
}

impl std::error::Error for CatalogError {}
