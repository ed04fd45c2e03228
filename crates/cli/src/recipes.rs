//! Recipe reference resolution
//!
//! A recipe reference is either an id (`invoice` -> `<dir>/invoice.json`) or
//! a path. References containing `/` or `\`, or ending in `.json`, are
//! paths; those must stay inside the recipes directory or one of the allowed
//! bases once symlinks are followed.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("recipe path not allowed: {}", .0.display())]
    NotAllowed(PathBuf),

    #[error("recipe '{reference}' not found at {}", path.display())]
    NotFound { reference: String, path: PathBuf },

    #[error("failed to determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("failed to read recipe {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid recipe JSON in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, RecipeError>;

#[derive(Debug, Clone)]
pub struct RecipeResolver {
    dir: PathBuf,
    allowed_bases: Vec<PathBuf>,
}

impl RecipeResolver {
    /// Relative directories are taken against the current directory
    pub fn new(dir: impl AsRef<Path>, allowed_bases: &[PathBuf]) -> Result<Self> {
        let cwd = std::env::current_dir().map_err(RecipeError::CurrentDir)?;
        Ok(Self {
            dir: absolutize(&cwd, dir.as_ref()),
            allowed_bases: allowed_bases.iter().map(|b| absolutize(&cwd, b)).collect(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Map a reference to the recipe file it names
    pub fn resolve(&self, recipe_ref: &str) -> Result<PathBuf> {
        if !looks_like_path(recipe_ref) {
            return Ok(self.dir.join(format!("{recipe_ref}.json")));
        }

        let cwd = std::env::current_dir().map_err(RecipeError::CurrentDir)?;
        let path = physical(&absolutize(&cwd, Path::new(recipe_ref)));
        if self.is_allowed(&path) {
            Ok(path)
        } else {
            Err(RecipeError::NotAllowed(path))
        }
    }

    /// Load a recipe as JSON; `None` if the file does not exist
    pub fn load(&self, recipe_ref: &str) -> Result<Option<serde_json::Value>> {
        read_recipe(self.resolve(recipe_ref)?)
    }

    /// Resolve a reference that must name an existing, valid recipe
    pub fn require(&self, recipe_ref: &str) -> Result<PathBuf> {
        let path = self.resolve(recipe_ref)?;
        match read_recipe(path.clone())? {
            Some(_) => Ok(path),
            None => Err(RecipeError::NotFound {
                reference: recipe_ref.to_string(),
                path,
            }),
        }
    }

    fn is_allowed(&self, path: &Path) -> bool {
        std::iter::once(&self.dir)
            .chain(&self.allowed_bases)
            .any(|base| path.starts_with(physical(base)))
    }
}

fn read_recipe(path: PathBuf) -> Result<Option<serde_json::Value>> {
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(RecipeError::Read { path, source }),
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| RecipeError::Parse { path, source })
}

fn looks_like_path(recipe_ref: &str) -> bool {
    recipe_ref.contains('/')
        || recipe_ref.contains('\\')
        || Path::new(recipe_ref)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Join onto `base` if relative and fold `.`/`..` lexically
///
/// Recipe files need not exist yet, so this cannot rely on `canonicalize`.
fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Follow symlinks through the longest existing ancestor of `path`
///
/// Components below that ancestor are re-appended unchanged. `path` must
/// already be absolute and free of `.`/`..`.
fn physical(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing: Vec<&OsStr> = Vec::new();
    loop {
        if let Ok(real) = existing.canonicalize() {
            return missing.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver(temp_dir: &TempDir) -> RecipeResolver {
        RecipeResolver::new(temp_dir.path().join("recipes"), &[temp_dir.path().join("shared")])
            .unwrap()
    }

    #[test]
    fn test_id_resolves_under_recipes_dir() {
        let temp_dir = TempDir::new().unwrap();
        let r = resolver(&temp_dir);
        assert_eq!(
            r.resolve("invoice").unwrap(),
            temp_dir.path().join("recipes/invoice.json")
        );
    }

    #[test]
    fn test_path_reference_detection() {
        assert!(looks_like_path("recipes/invoice.json"));
        assert!(looks_like_path(r"C:\recipes\invoice"));
        assert!(looks_like_path("invoice.JSON"));
        assert!(!looks_like_path("invoice"));
        assert!(!looks_like_path("invoice.v2"));
    }

    #[test]
    fn test_path_inside_allowed_base() {
        let temp_dir = TempDir::new().unwrap();
        let r = resolver(&temp_dir);

        let root = temp_dir.path().canonicalize().unwrap();

        let in_dir = temp_dir.path().join("recipes/sub/a.json");
        assert_eq!(
            r.resolve(in_dir.to_str().unwrap()).unwrap(),
            root.join("recipes/sub/a.json")
        );

        let in_shared = temp_dir.path().join("shared/b.json");
        assert_eq!(
            r.resolve(in_shared.to_str().unwrap()).unwrap(),
            root.join("shared/b.json")
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_out_of_recipes_dir_rejected() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let r = resolver(&temp_dir);
        std::fs::create_dir_all(r.dir())?;
        std::fs::create_dir_all(temp_dir.path().join("secret"))?;
        std::fs::write(temp_dir.path().join("secret/x.json"), "{}")?;
        std::os::unix::fs::symlink("../secret", r.dir().join("link"))?;

        let through_link = r.dir().join("link/x.json");
        assert!(matches!(
            r.resolve(through_link.to_str().unwrap()),
            Err(RecipeError::NotAllowed(_))
        ));

        // Not-yet-existing files below the link are caught too
        let missing = r.dir().join("link/new/y.json");
        assert!(matches!(
            r.resolve(missing.to_str().unwrap()),
            Err(RecipeError::NotAllowed(_))
        ));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_into_shared_base_allowed() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let r = resolver(&temp_dir);
        std::fs::create_dir_all(r.dir())?;
        std::fs::create_dir_all(temp_dir.path().join("shared"))?;
        std::os::unix::fs::symlink("../shared", r.dir().join("common"))?;

        let resolved = r.resolve(r.dir().join("common/z.json").to_str().unwrap())?;
        assert_eq!(resolved, temp_dir.path().canonicalize()?.join("shared/z.json"));
        Ok(())
    }

    #[test]
    fn test_require_missing_recipe() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let r = resolver(&temp_dir);
        std::fs::create_dir_all(r.dir())?;
        std::fs::write(r.dir().join("invoice.json"), "{}")?;

        assert_eq!(r.require("invoice")?, r.dir().join("invoice.json"));

        let err = r.require("receipt").unwrap_err();
        assert!(matches!(err, RecipeError::NotFound { .. }));
        assert!(err.to_string().contains("recipe 'receipt' not found"));
        Ok(())
    }

    #[test]
    fn test_path_outside_bases_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let r = resolver(&temp_dir);

        let outside = temp_dir.path().join("elsewhere/c.json");
        assert!(matches!(
            r.resolve(outside.to_str().unwrap()),
            Err(RecipeError::NotAllowed(_))
        ));

        // Traversal out of the recipes dir
        let escape = format!("{}/recipes/../secrets.json", temp_dir.path().display());
        assert!(matches!(r.resolve(&escape), Err(RecipeError::NotAllowed(_))));
    }

    #[test]
    fn test_load_present_and_absent() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let r = resolver(&temp_dir);
        std::fs::create_dir_all(r.dir())?;
        std::fs::write(r.dir().join("invoice.json"), r#"{"fields": ["total"]}"#)?;

        let recipe = r.load("invoice")?.expect("recipe should exist");
        assert_eq!(recipe["fields"][0], "total");
        assert!(r.load("missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_load_invalid_json() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let r = resolver(&temp_dir);
        std::fs::create_dir_all(r.dir())?;
        std::fs::write(r.dir().join("broken.json"), "{not json")?;
        assert!(matches!(r.load("broken"), Err(RecipeError::Parse { .. })));
        Ok(())
    }

    #[test]
    fn test_absolutize_folds_dots() {
        assert_eq!(
            absolutize(Path::new("/srv"), Path::new("./recipes/../shared/x.json")),
            PathBuf::from("/srv/shared/x.json")
        );
    }
}
