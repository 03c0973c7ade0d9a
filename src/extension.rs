//! Extension ("cog") lifecycle.
//!
//! Every extension the bot can run is compiled in and listed in a catalog.  Loading an extension
//! builds a fresh plugin instance from its factory and starts dispatching events to it; unloading
//! drops the instance.  Reloading is an unload followed by a load, so any state an extension
//! keeps (such as a cached Reddit token) starts over.

use crate::{config::Config, log_internal, plugin::Plugin};
use anyhow::Result;
use std::{fmt, sync::Arc};
use tokio::sync::RwLock;

/// Namespace prepended to extension names that do not already mention it.
pub const EXTENSION_ROOT: &str = "mawabot.cogs.";

/// Builds a new instance of an extension.  May fail if the configuration cannot support it.
pub type Factory = fn(&Config) -> Result<Arc<dyn Plugin>>;

pub struct CatalogEntry {
    pub name: &'static str,
    pub factory: Factory,
}

struct LoadedExtension {
    name: String,
    plugin: Arc<dyn Plugin>,
}

/// Tracks which extensions are active, in the order they were loaded.
pub struct ExtensionRegistry {
    root: String,
    catalog: Vec<CatalogEntry>,
    // Lifecycle operations hold the write guard for their whole duration, so two commands naming
    // the same extension cannot interleave.
    loaded: RwLock<Vec<LoadedExtension>>,
}

/// Why a lifecycle operation failed.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionFault {
    #[error("no such extension")]
    NotFound,
    #[error("extension is already loaded")]
    AlreadyLoaded,
    #[error("extension is not loaded")]
    NotLoaded,
    #[error("extension failed to initialize: {0:#}")]
    Setup(anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("Extension '{name}' could not be loaded: {cause}")]
pub struct LoadError {
    pub name: String,
    #[source]
    pub cause: ExtensionFault,
}

#[derive(Debug, thiserror::Error)]
#[error("Extension '{name}' could not be unloaded: {cause}")]
pub struct UnloadError {
    pub name: String,
    #[source]
    pub cause: ExtensionFault,
}

/// A reload that failed at its unload step left the extension as it was.  One that failed at its
/// load step left it unloaded.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Unload(#[from] UnloadError),
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Snapshot of the loaded extension names, in load order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedExtensions(Vec<String>);

impl LoadedExtensions {
    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for LoadedExtensions {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Extensions Loaded:")?;
        if self.0.is_empty() {
            return write!(f, " - None");
        }

        let lines: Vec<String> = self.0.iter().map(|name| format!(" - {}", name)).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl ExtensionRegistry {
    pub fn new(root: impl Into<String>, catalog: Vec<CatalogEntry>) -> Self {
        Self {
            root: root.into(),
            catalog,
            loaded: RwLock::new(Vec::new()),
        }
    }

    /// Registry over every extension compiled into the bot.
    pub fn builtin() -> Self {
        Self::new(EXTENSION_ROOT, crate::plugin::catalog())
    }

    /// `text.meme` -> `mawabot.cogs.text.meme`.  Names already mentioning the root are kept.
    pub fn normalize(&self, name: &str) -> String {
        if name.contains(&self.root) {
            name.to_owned()
        } else {
            format!("{}{}", self.root, name)
        }
    }

    fn load_locked(
        &self,
        loaded: &mut Vec<LoadedExtension>,
        name: String,
        cfg: &Config,
    ) -> Result<String, LoadError> {
        let fail = |name, cause| Err(LoadError { name, cause });

        if loaded.iter().any(|ext| ext.name == name) {
            return fail(name, ExtensionFault::AlreadyLoaded);
        }

        let Some(entry) = self.catalog.iter().find(|entry| entry.name == name) else {
            return fail(name, ExtensionFault::NotFound);
        };

        let plugin = match (entry.factory)(cfg) {
            Ok(plugin) => plugin,
            Err(e) => return fail(name, ExtensionFault::Setup(e)),
        };

        loaded.push(LoadedExtension {
            name: name.clone(),
            plugin,
        });
        Ok(name)
    }

    fn unload_locked(
        &self,
        loaded: &mut Vec<LoadedExtension>,
        name: String,
    ) -> Result<String, UnloadError> {
        match loaded.iter().position(|ext| ext.name == name) {
            Some(index) => {
                loaded.remove(index);
                Ok(name)
            }
            None => Err(UnloadError {
                name,
                cause: ExtensionFault::NotLoaded,
            }),
        }
    }

    /// Activate an extension.  Returns its normalized name.
    pub async fn load(&self, name: &str, cfg: &Config) -> Result<String, LoadError> {
        let name = self.normalize(name);
        log_internal!("Extension load requested: {}", name);

        let mut loaded = self.loaded.write().await;
        let name = self.load_locked(&mut loaded, name, cfg)?;
        log_internal!("Loaded extension: {}", name);
        Ok(name)
    }

    /// Deactivate an extension.  Returns its normalized name.
    pub async fn unload(&self, name: &str) -> Result<String, UnloadError> {
        let name = self.normalize(name);
        log_internal!("Extension unload requested: {}", name);

        let mut loaded = self.loaded.write().await;
        let name = self.unload_locked(&mut loaded, name)?;
        log_internal!("Unloaded extension: {}", name);
        Ok(name)
    }

    /// Unload, then load, under one guard.  There is no rollback: if the load step fails the
    /// extension stays unloaded.
    pub async fn reload(&self, name: &str, cfg: &Config) -> Result<String, ReloadError> {
        let name = self.normalize(name);
        log_internal!("Extension reload requested: {}", name);

        let mut loaded = self.loaded.write().await;
        let name = self.unload_locked(&mut loaded, name)?;
        let name = self.load_locked(&mut loaded, name, cfg)?;
        log_internal!("Reloaded extension: {}", name);
        Ok(name)
    }

    pub async fn list_loaded(&self) -> LoadedExtensions {
        let loaded = self.loaded.read().await;
        LoadedExtensions(loaded.iter().map(|ext| ext.name.clone()).collect())
    }

    /// Active plugin instances, in load order.
    pub async fn active(&self) -> Vec<Arc<dyn Plugin>> {
        let loaded = self.loaded.read().await;
        loaded.iter().map(|ext| Arc::clone(&ext.plugin)).collect()
    }

    /// Startup loading.  A broken extension should not keep the rest of the bot offline, so
    /// failures are only reported.
    pub async fn load_all(&self, names: &[String], cfg: &Config) -> Vec<LoadError> {
        let mut errors = Vec::new();
        for name in names {
            if let Err(e) = self.load(name, cfg).await {
                errors.push(e);
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::Context,
        event::{Event, EventHandled},
    };
    use anyhow::bail;

    struct Fake(&'static str);

    #[serenity::async_trait]
    impl Plugin for Fake {
        fn name(&self) -> &'static str {
            self.0
        }

        async fn usage(&self, _ctx: &Context) -> Option<String> {
            None
        }

        async fn handle(&self, _ctx: &Context, _event: &Event) -> Result<EventHandled> {
            Ok(EventHandled::No)
        }
    }

    fn alpha(_cfg: &Config) -> Result<Arc<dyn Plugin>> {
        Ok(Arc::new(Fake("alpha")))
    }

    fn beta(_cfg: &Config) -> Result<Arc<dyn Plugin>> {
        Ok(Arc::new(Fake("beta")))
    }

    // Refuses to start under a `!` prefix, so a reload can be made to fail by changing config
    fn picky(cfg: &Config) -> Result<Arc<dyn Plugin>> {
        if cfg.general.command_prefix == "!" {
            bail!("prefix `!` is not supported");
        }
        Ok(Arc::new(Fake("picky")))
    }

    fn registry() -> ExtensionRegistry {
        ExtensionRegistry::new(
            "test.cogs.",
            vec![
                CatalogEntry {
                    name: "test.cogs.alpha",
                    factory: alpha,
                },
                CatalogEntry {
                    name: "test.cogs.beta",
                    factory: beta,
                },
                CatalogEntry {
                    name: "test.cogs.picky",
                    factory: picky,
                },
            ],
        )
    }

    fn config(prefix: &str) -> Config {
        Config::parse(&format!(
            "[general]\ndiscord_token = \"t\"\ncommand_prefix = \"{}\"\n",
            prefix
        ))
        .unwrap()
    }

    #[test]
    fn names_are_normalized_under_the_root() {
        let registry = registry();
        assert_eq!(registry.normalize("alpha"), "test.cogs.alpha");
        assert_eq!(registry.normalize("test.cogs.alpha"), "test.cogs.alpha");
        assert_eq!(registry.normalize("x.test.cogs.alpha"), "x.test.cogs.alpha");
    }

    #[tokio::test]
    async fn load_and_unload_track_registration_order() {
        let registry = registry();
        let cfg = config(";");

        assert!(registry.list_loaded().await.names().is_empty());
        assert_eq!(registry.load("beta", &cfg).await.unwrap(), "test.cogs.beta");
        assert_eq!(
            registry.load("test.cogs.alpha", &cfg).await.unwrap(),
            "test.cogs.alpha"
        );
        assert_eq!(
            registry.list_loaded().await.names(),
            ["test.cogs.beta", "test.cogs.alpha"]
        );
        let active: Vec<&str> = registry.active().await.iter().map(|p| p.name()).collect();
        assert_eq!(active, ["beta", "alpha"]);

        registry.unload("beta").await.unwrap();
        assert_eq!(registry.list_loaded().await.names(), ["test.cogs.alpha"]);
    }

    #[tokio::test]
    async fn double_load_is_rejected() {
        let registry = registry();
        let cfg = config(";");

        registry.load("alpha", &cfg).await.unwrap();
        let err = registry.load("alpha", &cfg).await.unwrap_err();
        assert_eq!(err.name, "test.cogs.alpha");
        assert!(matches!(err.cause, ExtensionFault::AlreadyLoaded));
        assert_eq!(registry.list_loaded().await.names(), ["test.cogs.alpha"]);
    }

    #[tokio::test]
    async fn unknown_and_failing_extensions_do_not_load() {
        let registry = registry();

        let err = registry.load("gamma", &config(";")).await.unwrap_err();
        assert!(matches!(err.cause, ExtensionFault::NotFound));

        let err = registry.load("picky", &config("!")).await.unwrap_err();
        assert!(matches!(err.cause, ExtensionFault::Setup(_)));
        assert!(err.to_string().contains("prefix `!` is not supported"));

        assert!(registry.list_loaded().await.names().is_empty());
    }

    #[tokio::test]
    async fn unloading_an_absent_extension_fails() {
        let registry = registry();
        let err = registry.unload("alpha").await.unwrap_err();
        assert_eq!(err.name, "test.cogs.alpha");
        assert!(matches!(err.cause, ExtensionFault::NotLoaded));
    }

    #[tokio::test]
    async fn reload_replaces_the_instance() {
        let registry = registry();
        let cfg = config(";");

        registry.load("alpha", &cfg).await.unwrap();
        registry.load("beta", &cfg).await.unwrap();
        let before = registry.active().await;

        registry.reload("alpha", &cfg).await.unwrap();
        let after = registry.active().await;

        // Reloaded extensions move to the end of the dispatch order
        assert_eq!(
            registry.list_loaded().await.names(),
            ["test.cogs.beta", "test.cogs.alpha"]
        );
        assert!(!Arc::ptr_eq(&before[0], &after[1]));
        assert!(Arc::ptr_eq(&before[1], &after[0]));
    }

    #[tokio::test]
    async fn reload_of_unloaded_extension_keeps_state() {
        let registry = registry();
        let err = registry.reload("alpha", &config(";")).await.unwrap_err();
        assert!(matches!(err, ReloadError::Unload(_)));
        assert!(registry.list_loaded().await.names().is_empty());
    }

    #[tokio::test]
    async fn reload_with_failing_load_leaves_extension_unloaded() {
        let registry = registry();
        registry.load("picky", &config(";")).await.unwrap();
        registry.load("alpha", &config(";")).await.unwrap();

        let err = registry.reload("picky", &config("!")).await.unwrap_err();
        match err {
            ReloadError::Load(LoadError { name, cause }) => {
                assert_eq!(name, "test.cogs.picky");
                assert!(matches!(cause, ExtensionFault::Setup(_)));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(registry.list_loaded().await.names(), ["test.cogs.alpha"]);
    }

    #[tokio::test]
    async fn load_all_reports_failures_and_continues() {
        let registry = registry();
        let names = vec!["alpha".to_owned(), "gamma".to_owned(), "beta".to_owned()];
        let errors = registry.load_all(&names, &config(";")).await;

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].name, "test.cogs.gamma");
        assert_eq!(
            registry.list_loaded().await.names(),
            ["test.cogs.alpha", "test.cogs.beta"]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_loads_of_one_name_admit_exactly_one() {
        let registry = Arc::new(registry());
        let cfg = Arc::new(config(";"));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let cfg = Arc::clone(&cfg);
                tokio::spawn(async move { registry.load("alpha", &cfg).await.is_ok() })
            })
            .collect();

        let mut successes = 0;
        for task in tasks {
            if task.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(registry.list_loaded().await.names(), ["test.cogs.alpha"]);
    }

    #[test]
    fn empty_listing_says_none() {
        assert_eq!(
            LoadedExtensions(Vec::new()).to_string(),
            "Extensions Loaded:\n - None"
        );
        assert_eq!(
            LoadedExtensions(vec!["a".to_owned(), "b".to_owned()]).to_string(),
            "Extensions Loaded:\n - a\n - b"
        );
    }
}
