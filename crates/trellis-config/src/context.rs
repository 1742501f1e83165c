//! JSON configuration documents with environment-selected overlays.
//!
//! A [`ConfigurationContext`] points at a base JSON file. When a target
//! context is active, a sibling overlay file named
//! `<stem>.<context>.<ext>` is merged on top of it:
//!
//! ```text
//! settings.json            (base)
//! settings.target1.json    (overlay for context "target1")
//! ```
//!
//! The merge is overlay-wins-on-leaf: objects present on both sides are
//! merged key by key, every other pairing is replaced by the overlay value.
//! Keys the overlay does not mention keep their base values.
//!
//! # Selecting the context
//!
//! 1. An explicit [`ConfigurationContext::target_context`] call.
//! 2. Otherwise the environment variable named by
//!    [`ConfigurationContext::env_var`], defaulting to
//!    [`DEFAULT_CONTEXT_ENV_VAR`].
//!
//! An unset or empty value disables the overlay.
//!
//! # Custom loaders
//!
//! Files are parsed as strict JSON by default. [`ConfigurationContext::loader`]
//! swaps in another parser (JSON with comments, JSON5, ...) for both the base
//! and the overlay file; the parsed documents are merged with
//! [`merge_documents`].
//!
//! # Example
//!
//! ```rust,ignore
//! use trellis_config::ConfigurationContext;
//!
//! let context = ConfigurationContext::new("settings.json").target_context("production");
//! let database = context.get_section("database:primary")?;
//! ```

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use figment::Figment;
use figment::providers::{Format, Json, Serialized};
use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::section::{self, ConfigurationSection};

/// Environment variable consulted for the target context when none is given.
pub const DEFAULT_CONTEXT_ENV_VAR: &str = "SERVICE_COLLECTION_ENV";

/// Parses the text of one configuration file into a document.
pub type JsonLoader = Arc<dyn Fn(&str) -> ConfigResult<Value> + Send + Sync>;

/// A lazily loaded JSON configuration document.
pub struct ConfigurationContext {
    base_path: PathBuf,
    env_var: String,
    explicit_target: bool,
    target: Option<String>,
    loader: Option<JsonLoader>,
    document: OnceCell<Value>,
}

impl fmt::Debug for ConfigurationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationContext")
            .field("base_path", &self.base_path)
            .field("env_var", &self.env_var)
            .field("target", &self.target)
            .field("custom_loader", &self.loader.is_some())
            .field("loaded", &self.document.get().is_some())
            .finish()
    }
}

impl ConfigurationContext {
    /// Creates a context over `base_path`, reading the target context from
    /// [`DEFAULT_CONTEXT_ENV_VAR`].
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
            env_var: DEFAULT_CONTEXT_ENV_VAR.to_string(),
            explicit_target: false,
            target: read_context_var(DEFAULT_CONTEXT_ENV_VAR),
            loader: None,
            document: OnceCell::new(),
        }
    }

    /// Sets the target context explicitly; environment variables are ignored.
    pub fn target_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        self.target = (!context.is_empty()).then_some(context);
        self.explicit_target = true;
        self
    }

    /// Reads the target context from `name` instead of the default variable.
    ///
    /// Has no effect on the selected context when one was set explicitly.
    pub fn env_var(mut self, name: impl Into<String>) -> Self {
        self.env_var = name.into();
        if !self.explicit_target {
            self.target = read_context_var(&self.env_var);
        }
        self
    }

    /// Parses every file with `loader` instead of the built-in JSON parser.
    ///
    /// Must be set before the document is first accessed.
    pub fn loader<F>(mut self, loader: F) -> Self
    where
        F: Fn(&str) -> ConfigResult<Value> + Send + Sync + 'static,
    {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Path of the base document.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Name of the environment variable that selects the context.
    pub fn env_var_name(&self) -> &str {
        &self.env_var
    }

    /// The active target context, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Path of the overlay document for the active context.
    pub fn overlay_path(&self) -> Option<PathBuf> {
        let context = self.target.as_deref()?;
        let stem = self.base_path.file_stem()?.to_string_lossy();
        let file_name = match self.base_path.extension() {
            Some(ext) => format!("{}.{}.{}", stem, context, ext.to_string_lossy()),
            None => format!("{}.{}", stem, context),
        };
        Some(self.base_path.with_file_name(file_name))
    }

    /// The merged document, loading it on first access.
    pub fn document(&self) -> ConfigResult<&Value> {
        self.document.get_or_try_init(|| self.load())
    }

    /// Top-level keys of the document.
    pub fn keys(&self) -> ConfigResult<Vec<String>> {
        Ok(self.iter()?.map(|(key, _)| key.clone()).collect())
    }

    /// Iterates over the top-level entries of the document.
    pub fn iter(&self) -> ConfigResult<impl Iterator<Item = (&String, &Value)>> {
        Ok(self.document()?.as_object().into_iter().flatten())
    }

    /// Number of top-level entries.
    pub fn len(&self) -> ConfigResult<usize> {
        Ok(self.document()?.as_object().map_or(0, |map| map.len()))
    }

    /// Whether the document has no top-level entries.
    pub fn is_empty(&self) -> ConfigResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Looks up a value by key or colon-delimited path, e.g.
    /// `"database:primary:host"`.
    ///
    /// Borrowing counterpart of [`ConfigurationContext::get_section`].
    pub fn get(&self, path: &str) -> ConfigResult<Option<&Value>> {
        Ok(section::walk(self.document()?, path))
    }

    /// Addresses a subtree by colon-delimited path, e.g. `"database:primary"`.
    ///
    /// A path that does not resolve yields an absent section; only a failure
    /// to load the document is reported as an error.
    pub fn get_section(&self, path: &str) -> ConfigResult<ConfigurationSection> {
        let found = section::walk(self.document()?, path).cloned();
        debug!(path, found = found.is_some(), "Resolved configuration section");
        Ok(ConfigurationSection::new(found))
    }

    fn load(&self) -> ConfigResult<Value> {
        let document = match &self.loader {
            Some(loader) => self.load_with(loader)?,
            None => self.load_json()?,
        };
        info!(
            path = %self.base_path.display(),
            context = self.target.as_deref().unwrap_or("none"),
            "Configuration loaded"
        );
        Ok(document)
    }

    fn load_json(&self) -> ConfigResult<Value> {
        let mut figment = Figment::from(json_file(&self.base_path)?);

        if let Some(overlay) = self.overlay_path() {
            self.log_overlay(&overlay);
            figment = figment.merge(json_file(&overlay)?);
        }

        Ok(figment.extract()?)
    }

    fn load_with(&self, loader: &JsonLoader) -> ConfigResult<Value> {
        let mut document = loader(&read_file(&self.base_path)?)?;

        if let Some(overlay) = self.overlay_path() {
            self.log_overlay(&overlay);
            document = merge_documents(document, loader(&read_file(&overlay)?)?)?;
        }

        Ok(document)
    }

    fn log_overlay(&self, overlay: &Path) {
        debug!(
            context = self.target.as_deref().unwrap_or_default(),
            path = %overlay.display(),
            "Merging configuration overlay"
        );
    }
}

fn read_file(path: &Path) -> ConfigResult<String> {
    std::fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn json_file(path: &Path) -> ConfigResult<figment::providers::Data<Json>> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    Ok(Json::file(path))
}

fn read_context_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Merges `overlay` on top of `base` with the same rules used for overlay
/// files.
pub fn merge_documents(base: Value, overlay: Value) -> ConfigResult<Value> {
    Ok(Figment::from(Serialized::defaults(base))
        .merge(Serialized::defaults(overlay))
        .extract()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn fixture() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/settings.json")
    }

    #[test]
    fn test_merge_recurses_into_objects() {
        let merged = merge_documents(
            json!({ "a": { "x": 1, "y": 2 } }),
            json!({ "a": { "x": 9 } }),
        )
        .unwrap();
        assert_eq!(merged, json!({ "a": { "x": 9, "y": 2 } }));
    }

    #[test]
    fn test_merge_scalar_replaces_object() {
        let merged =
            merge_documents(json!({ "a": { "x": 1, "y": 2 } }), json!({ "a": 9 })).unwrap();
        assert_eq!(merged, json!({ "a": 9 }));
    }

    #[test]
    fn test_merge_object_replaces_scalar_and_keeps_siblings() {
        let merged = merge_documents(
            json!({ "a": 1, "b": [1, 2] }),
            json!({ "a": { "x": 1 }, "b": [3] }),
        )
        .unwrap();
        assert_eq!(merged, json!({ "a": { "x": 1 }, "b": [3] }));
    }

    #[test]
    fn test_overlay_path_inserts_context() {
        let context = ConfigurationContext::new("conf/settings.json").target_context("target1");
        assert_eq!(
            context.overlay_path(),
            Some(PathBuf::from("conf/settings.target1.json"))
        );

        let bare = ConfigurationContext::new("settings").target_context("dev");
        assert_eq!(bare.overlay_path(), Some(PathBuf::from("settings.dev")));
    }

    #[test]
    fn test_empty_target_disables_overlay() {
        let context = ConfigurationContext::new(fixture()).target_context("");
        assert_eq!(context.target(), None);
        assert_eq!(context.overlay_path(), None);
    }

    #[test]
    fn test_base_document_without_overlay() {
        let context = ConfigurationContext::new(fixture()).target_context("");
        let doc = context.document().unwrap();
        assert_eq!(doc["name"], json!("hello"));
        assert_eq!(doc["complex_object"]["value1"], json!(true));
        assert_eq!(doc["complex_object"]["value3"], json!([1, 2, 3, 4]));
    }

    #[test]
    fn test_overlay_document_merges() {
        let context = ConfigurationContext::new(fixture()).target_context("target1");
        let doc = context.document().unwrap();
        assert_eq!(doc["complex_object"]["value1"], json!(false));
        assert_eq!(doc["complex_object"]["value2"], json!(1));
        assert_eq!(doc["complex_object"]["value3"], json!([6, 7, 8, 9, 10]));
        assert_eq!(doc["complex_object"]["complex1"]["term1"], json!("one"));
    }

    #[test]
    fn test_missing_base_file() {
        let context = ConfigurationContext::new("does/not/exist.json").target_context("");
        assert!(matches!(
            context.document(),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_missing_overlay_file() {
        let context = ConfigurationContext::new(fixture()).target_context("nowhere");
        match context.document() {
            Err(ConfigError::FileNotFound(path)) => {
                assert!(path.ends_with("settings.nowhere.json"));
            }
            other => panic!("expected missing overlay, got {other:?}"),
        }
    }

    #[test]
    fn test_keys_and_iteration() {
        let context = ConfigurationContext::new(fixture()).target_context("");
        let mut keys = context.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["complex", "complex_object", "name"]);
        assert_eq!(context.len().unwrap(), 3);
        assert!(!context.is_empty().unwrap());
        assert_eq!(context.get("name").unwrap(), Some(&json!("hello")));
        assert_eq!(context.get("missing").unwrap(), None);
        assert_eq!(context.iter().unwrap().count(), 3);
    }

    #[test]
    fn test_get_section() {
        let context = ConfigurationContext::new(fixture()).target_context("");
        let section = context.get_section("complex_object:complex1").unwrap();
        assert_eq!(
            section.settings(),
            Some(&json!({ "term1": "one", "term2": "two" }))
        );

        let missing = context.get_section("complex_object:nope:deeper").unwrap();
        assert!(!missing.is_present());
    }

    #[test]
    fn test_get_walks_colon_paths() {
        let context = ConfigurationContext::new(fixture()).target_context("target1");
        assert_eq!(
            context.get("complex_object:value1").unwrap(),
            Some(&json!(false))
        );
        assert_eq!(
            context.get("complex_object:complex1:term2").unwrap(),
            Some(&json!("two"))
        );
        assert_eq!(context.get("complex_object:value3:0").unwrap(), None);
        assert_eq!(context.get("name:deeper").unwrap(), None);
    }

    fn commented() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/commented.jsonc")
    }

    fn strip_line_comments(text: &str) -> ConfigResult<Value> {
        let json: String = text
            .lines()
            .filter(|line| !line.trim_start().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&json).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    #[test]
    fn test_default_loader_rejects_comments() {
        let context = ConfigurationContext::new(commented()).target_context("");
        assert!(matches!(context.document(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_custom_loader_parses_base_and_overlay() {
        let context = ConfigurationContext::new(commented())
            .target_context("dev")
            .loader(strip_line_comments);
        assert_eq!(
            context.document().unwrap(),
            &json!({ "name": "hello", "complex": { "name": "hello2", "level": 2 } })
        );
        assert_eq!(context.get("complex:level").unwrap(), Some(&json!(2)));
    }

    #[test]
    fn test_custom_loader_sees_missing_files_and_errors() {
        let missing = ConfigurationContext::new(commented())
            .target_context("nowhere")
            .loader(strip_line_comments);
        match missing.document() {
            Err(ConfigError::FileNotFound(path)) => {
                assert!(path.ends_with("commented.nowhere.jsonc"));
            }
            other => panic!("expected missing overlay, got {other:?}"),
        }

        let failing = ConfigurationContext::new(fixture())
            .target_context("")
            .loader(|_: &str| Err(ConfigError::Parse("refused".to_string())));
        match failing.document() {
            Err(ConfigError::Parse(message)) => assert_eq!(message, "refused"),
            other => panic!("expected loader error, got {other:?}"),
        }
        assert!(format!("{failing:?}").contains("custom_loader: true"));
    }

    #[test]
    #[serial]
    fn test_default_env_var_selects_overlay() {
        // SAFETY: serialized with every other test touching this variable.
        unsafe {
            std::env::set_var(DEFAULT_CONTEXT_ENV_VAR, "target1");
        }
        let context = ConfigurationContext::new(fixture());
        unsafe {
            std::env::remove_var(DEFAULT_CONTEXT_ENV_VAR);
        }

        assert_eq!(context.target(), Some("target1"));
        let doc = context.document().unwrap();
        assert_eq!(doc["complex_object"]["value1"], json!(false));
    }

    #[test]
    #[serial]
    fn test_custom_env_var_selects_overlay() {
        // SAFETY: serialized with every other test touching process env.
        unsafe {
            std::env::set_var("CUSTOM_ENV_NAME", "target1");
        }
        let context = ConfigurationContext::new(fixture()).env_var("CUSTOM_ENV_NAME");
        unsafe {
            std::env::remove_var("CUSTOM_ENV_NAME");
        }

        assert_eq!(context.env_var_name(), "CUSTOM_ENV_NAME");
        assert_eq!(context.target(), Some("target1"));
        let doc = context.document().unwrap();
        assert_eq!(doc["complex_object"]["value3"], json!([6, 7, 8, 9, 10]));
    }

    #[test]
    #[serial]
    fn test_explicit_target_wins_over_env_var() {
        // SAFETY: serialized with every other test touching process env.
        unsafe {
            std::env::set_var("TRELLIS_TEST_CONTEXT", "target1");
        }
        let context = ConfigurationContext::new(fixture())
            .target_context("")
            .env_var("TRELLIS_TEST_CONTEXT");
        unsafe {
            std::env::remove_var("TRELLIS_TEST_CONTEXT");
        }

        assert_eq!(context.target(), None);
    }

    #[test]
    #[serial]
    fn test_unset_env_var_means_no_overlay() {
        // SAFETY: serialized with every other test touching process env.
        unsafe {
            std::env::remove_var(DEFAULT_CONTEXT_ENV_VAR);
        }
        let context = ConfigurationContext::new(fixture());
        assert_eq!(context.target(), None);
        assert_eq!(
            context.document().unwrap()["complex_object"]["value1"],
            json!(true)
        );
    }
}
