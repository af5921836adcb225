// ABOUTME: Named template store loaded once from a template directory
// ABOUTME: Serves parsed script templates by step name, with override hooks for tests

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::error::TemplateLoadError;
use super::script::ScriptTemplate;

const TEMPLATE_SUFFIX: &str = ".tpl";
const SCRIPT_SUFFIX: &str = ".sh";

/// Process-wide mapping from step name to parsed template.
///
/// `init` parses everything up front so a malformed template stops startup
/// instead of failing halfway through provisioning a host.
#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: RwLock<HashMap<String, ScriptTemplate>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.tpl` file found under `location`.
    ///
    /// `prometheus.sh.tpl` is stored as `prometheus`. Nothing is added to the
    /// store unless every template under the location parses. Returns the
    /// number of templates loaded.
    pub fn init(&self, location: impl AsRef<Path>) -> Result<usize, TemplateLoadError> {
        let location = location.as_ref();
        let metadata =
            std::fs::metadata(location).map_err(|source| TemplateLoadError::Unreadable {
                path: location.to_path_buf(),
                source,
            })?;

        if !metadata.is_dir() {
            return Err(TemplateLoadError::NotADirectory(location.to_path_buf()));
        }

        let mut loaded = HashMap::new();
        for entry in WalkDir::new(location).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy();
            let Some(name) = template_name(&file_name) else {
                continue;
            };

            let path = entry.path();
            let template = load_file(name, path)?;
            debug!("Loaded template '{}' from {}", name, path.display());

            if loaded.insert(name.to_string(), template).is_some() {
                warn!("Template '{}' defined more than once, keeping {}", name, path.display());
            }
        }

        let count = loaded.len();
        self.write().extend(loaded);

        info!("Loaded {} templates from {}", count, location.display());
        Ok(count)
    }

    /// Look up the parsed template for a step name
    pub fn get_template(&self, name: &str) -> Option<ScriptTemplate> {
        self.read().get(name).cloned()
    }

    /// Override a template. Intended for tests.
    pub fn set_template(&self, name: impl Into<String>, template: ScriptTemplate) {
        self.write().insert(name.into(), template);
    }

    /// Remove a template. Intended for tests.
    pub fn delete_template(&self, name: &str) {
        self.write().remove(name);
    }

    /// Names of all loaded templates, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, ScriptTemplate>> {
        self.templates.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, ScriptTemplate>> {
        self.templates.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn load_file(name: &str, path: &Path) -> Result<ScriptTemplate, TemplateLoadError> {
    let source = std::fs::read_to_string(path).map_err(|source| TemplateLoadError::Read {
        path: PathBuf::from(path),
        source,
    })?;

    ScriptTemplate::parse(name, &source).map_err(|source| TemplateLoadError::Parse {
        path: PathBuf::from(path),
        source,
    })
}

/// Derive the lookup name from a template file name
fn template_name(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(TEMPLATE_SUFFIX)?;
    let name = stem.strip_suffix(SCRIPT_SUFFIX).unwrap_or(stem);
    (!name.is_empty()).then_some(name)
}
