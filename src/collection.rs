//! Template Collections and Registry
//!
//! A [`ModuleCollection`] is the set of templates read from one collection
//! description. The [`TemplateRegistry`] owns every installed collection and
//! resolves `"collection/template"` ids. It is an explicitly owned value,
//! built before the [`Host`](crate::host::Host) and shared through it.

use crate::engine::SynthEngine;
use crate::error::{CollectionError, FailureKind};
use crate::late::{join_all, Late};
use crate::template::ModuleTemplate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;
use std::rc::Rc;

/// Only collection description version understood by this crate
pub const COLLECTION_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct CollectionDef {
    version: u32,
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    modules: Vec<serde_json::Value>,
}

/// Templates loaded from a single collection description
#[derive(Debug, Clone)]
pub struct ModuleCollection {
    pub id: String,
    pub name: String,
    templates_by_id: BTreeMap<String, Rc<ModuleTemplate>>,
}

impl ModuleCollection {
    /// Create an empty collection
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            templates_by_id: BTreeMap::new(),
        }
    }

    /// Add a template, taking ownership of its collection id
    pub fn with_template(mut self, mut template: ModuleTemplate) -> Result<Self, CollectionError> {
        template.collection = self.id.clone();
        if self.templates_by_id.contains_key(&template.id) {
            return Err(CollectionError::Parse {
                id: self.id.clone(),
                reason: format!("collection has duplicate module ids: '{}'", template.id),
            });
        }
        self.templates_by_id
            .insert(template.id.clone(), Rc::new(template));
        Ok(self)
    }

    /// Parse a JSON collection description.
    ///
    /// Invalid individual templates are skipped with a warning; structural
    /// problems of the collection itself are errors.
    pub fn from_json(json: &str) -> Result<Self, CollectionError> {
        let def: CollectionDef = serde_json::from_str(json)?;
        if def.version != COLLECTION_VERSION {
            return Err(CollectionError::Parse {
                id: def.id,
                reason: format!("unsupported version {}", def.version),
            });
        }
        if def.id.is_empty() {
            return Err(CollectionError::Parse {
                id: String::new(),
                reason: "collection id is empty".into(),
            });
        }
        if def.name.is_empty() {
            return Err(CollectionError::Parse {
                id: def.id,
                reason: "collection name is empty".into(),
            });
        }

        let mut collection = ModuleCollection::new(def.id, def.name);
        for raw in def.modules {
            let template: ModuleTemplate = match serde_json::from_value(raw) {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!("ignoring an invalid module in collection {}: {e}", collection.id);
                    continue;
                }
            };
            if template.id.is_empty() {
                tracing::warn!("ignoring a module without id in collection {}", collection.id);
                continue;
            }
            collection = collection.with_template(template)?;
        }
        Ok(collection)
    }

    pub fn template(&self, id: &str) -> Option<Rc<ModuleTemplate>> {
        self.templates_by_id.get(id).cloned()
    }

    pub fn templates(&self) -> impl Iterator<Item = &Rc<ModuleTemplate>> {
        self.templates_by_id.values()
    }

    pub fn len(&self) -> usize {
        self.templates_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates_by_id.is_empty()
    }

    /// Install every template into the engine, one request per template.
    ///
    /// Templates the engine refuses are logged and skipped; the returned value
    /// completes once every request has been answered.
    pub fn install_all_into(&self, engine: &dyn SynthEngine) -> Late<()> {
        let installs = self
            .templates()
            .map(|template| {
                let id = template.full_id();
                engine
                    .install_template(template)
                    .catch_kind(FailureKind::TemplateInstallFailed, move |failure| {
                        tracing::warn!("template {id} not installed: {failure}");
                    })
            })
            .collect();
        join_all(installs).map(|_| ())
    }
}

/// Registry of all installed collections
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    collections_by_id: BTreeMap<String, ModuleCollection>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a collection; collection ids must be unique
    pub fn install(&mut self, collection: ModuleCollection) -> Result<(), CollectionError> {
        if self.collections_by_id.contains_key(&collection.id) {
            return Err(CollectionError::DuplicateCollection(collection.id));
        }
        tracing::info!(
            "installed collection '{}' with {} templates",
            collection.id,
            collection.len()
        );
        self.collections_by_id
            .insert(collection.id.clone(), collection);
        Ok(())
    }

    /// Read and install a collection description file
    pub fn install_file(&mut self, path: impl AsRef<Path>) -> Result<(), CollectionError> {
        let path = path.as_ref();
        tracing::info!("loading collection from file '{}'", path.display());
        let loading = |reason: String| CollectionError::Loading {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| loading(format!("file is not readable: {e}")))?;
        let collection = ModuleCollection::from_json(&text)
            .map_err(|e| loading(format!("collection file parsing failed: {e}")))?;
        self.install(collection)
            .map_err(|_| loading("the collection has a duplicate id".into()))
    }

    /// Install every `*.json` collection file found in a directory.
    ///
    /// Files are installed in name order; the first failure stops the scan.
    pub fn install_dir(&mut self, path: impl AsRef<Path>) -> Result<usize, CollectionError> {
        let path = path.as_ref();
        tracing::info!("loading all collections from '{}' directory", path.display());
        let entries = std::fs::read_dir(path).map_err(|e| CollectionError::Loading {
            path: path.display().to_string(),
            reason: format!("directory is not readable: {e}"),
        })?;

        let mut files: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        for file in &files {
            self.install_file(file)?;
        }
        Ok(files.len())
    }

    pub fn collection(&self, id: &str) -> Option<&ModuleCollection> {
        self.collections_by_id.get(id)
    }

    pub fn collections(&self) -> impl Iterator<Item = &ModuleCollection> {
        self.collections_by_id.values()
    }

    /// Resolve a `"collection/template"` id
    pub fn template(&self, full_id: &str) -> Option<Rc<ModuleTemplate>> {
        let (collection, template) = full_id.split_once('/')?;
        self.collection(collection)?.template(template)
    }

    /// Human-readable listing of every installed template
    pub fn list_installed_templates(&self) -> String {
        let mut out = String::from("Installed module templates list:\n");
        for collection in self.collections() {
            let _ = writeln!(out, "{} \t :{}", collection.id, collection.name);
            if collection.is_empty() {
                out.push_str("  (collection is empty)\n");
            }
            for template in collection.templates() {
                let _ = writeln!(out, "  {} \t |{}", template.id, template.name);
            }
        }
        out
    }

    /// Install every template of every collection into the engine
    pub fn install_all_into(&self, engine: &dyn SynthEngine) -> Late<()> {
        let all = self
            .collections()
            .map(|c| c.install_all_into(engine))
            .collect();
        join_all(all).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LocalEngine;
    use crate::event_loop::EventLoop;
    use std::cell::Cell;
    use tempfile::TempDir;

    const CORE: &str = r#"{
        "version": 1,
        "id": "core",
        "name": "Core modules",
        "modules": [
            { "id": "sine", "name": "Sine", "outlets": ["out"],
              "params": [{ "id": "freq", "min": 20.0, "max": 2000.0, "default": 440.0 }] },
            { "id": "out", "name": "Output", "inlets": ["in"] },
            { "name": "missing id" },
            { "id": "broken", "name": 42 }
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let collection = ModuleCollection::from_json(CORE).unwrap();
        assert_eq!(collection.id, "core");
        assert_eq!(collection.len(), 2);
        let sine = collection.template("sine").unwrap();
        assert_eq!(sine.collection, "core");
        assert_eq!(sine.full_id(), "core/sine");
    }

    #[test]
    fn test_parse_rejects_bad_headers() {
        let wrong_version = r#"{ "version": 2, "id": "x", "name": "X" }"#;
        assert!(matches!(
            ModuleCollection::from_json(wrong_version),
            Err(CollectionError::Parse { .. })
        ));
        let empty_name = r#"{ "version": 1, "id": "x", "name": "" }"#;
        assert!(ModuleCollection::from_json(empty_name).is_err());
        let duplicate = r#"{ "version": 1, "id": "x", "name": "X",
            "modules": [{ "id": "a", "name": "A" }, { "id": "a", "name": "A2" }] }"#;
        assert!(ModuleCollection::from_json(duplicate).is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = TemplateRegistry::new();
        registry
            .install(ModuleCollection::from_json(CORE).unwrap())
            .unwrap();

        assert!(registry.template("core/sine").is_some());
        assert!(registry.template("core/nothing").is_none());
        assert!(registry.template("sine").is_none());
        assert!(matches!(
            registry.install(ModuleCollection::new("core", "Again")),
            Err(CollectionError::DuplicateCollection(_))
        ));

        let listing = registry.list_installed_templates();
        assert!(listing.contains("core \t :Core modules"));
        assert!(listing.contains("  sine \t |Sine"));
    }

    #[test]
    fn test_missing_file() {
        let mut registry = TemplateRegistry::new();
        assert!(matches!(
            registry.install_file("/no/such/collection.json"),
            Err(CollectionError::Loading { .. })
        ));
    }

    #[test]
    fn test_install_dir_picks_json_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("core.json"), CORE).unwrap();
        std::fs::write(
            dir.path().join("extra.json"),
            r#"{ "version": 1, "id": "extra", "name": "Extra", "modules": [{ "id": "noise", "name": "Noise" }] }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a collection").unwrap();

        let mut registry = TemplateRegistry::new();
        assert_eq!(registry.install_dir(dir.path()).unwrap(), 2);
        assert!(registry.template("core/sine").is_some());
        assert!(registry.template("extra/noise").is_some());
        assert_eq!(registry.collections().count(), 2);
    }

    #[test]
    fn test_install_dir_propagates_failures() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ not json").unwrap();

        let mut registry = TemplateRegistry::new();
        assert!(matches!(
            registry.install_dir(dir.path()),
            Err(CollectionError::Loading { .. })
        ));
        assert!(matches!(
            registry.install_dir(dir.path().join("missing")),
            Err(CollectionError::Loading { .. })
        ));
    }

    #[test]
    fn test_install_all_waits_for_every_template() {
        let events = EventLoop::new();
        let engine = LocalEngine::new(events.clone());
        engine.reject_template("core/out");

        let mut registry = TemplateRegistry::new();
        registry
            .install(ModuleCollection::from_json(CORE).unwrap())
            .unwrap();
        registry
            .install(ModuleCollection::new("empty", "Nothing here"))
            .unwrap();

        let done = Rc::new(Cell::new(false));
        let d = Rc::clone(&done);
        registry
            .install_all_into(&engine)
            .on_complete(move |r| d.set(r.is_ok()));

        assert!(!done.get());
        events.run_until_idle();
        assert!(done.get());
        assert!(engine.is_installed("core/sine"));
        assert!(!engine.is_installed("core/out"));
    }
}
