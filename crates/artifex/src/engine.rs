use std::rc::Rc;

use artifex_scene::Node;

use crate::cache::{CacheStats, ExecutionCache};
use crate::capability::CapabilityRegistry;
use crate::config::EngineConfig;
use crate::error::{ConfigError, ExecutionError};
use crate::loader::{LoadedModule, ModuleLoader, ModuleState};
use crate::sandbox;
use crate::source::{SourceId, SourceUnit};

/// Outcome of one render.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// Empty or absent source.
    Nothing,
    Tree(Vec<Node>),
    Failed(ExecutionError),
}

impl Rendered {
    /// The scene to show: the tree, or the error placeholder.
    pub fn to_scene(&self) -> Vec<Node> {
        match self {
            Rendered::Nothing => Vec::new(),
            Rendered::Tree(nodes) => nodes.clone(),
            Rendered::Failed(error) => vec![sandbox::error_display(error)],
        }
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        match self {
            Rendered::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Rendered::Failed(_))
    }

    pub fn to_html(&self) -> String {
        artifex_scene::to_html(&self.to_scene())
    }
}

/// The single entry point hosts call on every edit.
///
/// Transform and load run at most once per distinct source text, render at
/// most once per distinct data argument; failures of any phase come back as
/// [`Rendered::Failed`], never as panics.
pub struct Engine {
    config: EngineConfig,
    loader: ModuleLoader,
    cache: ExecutionCache,
    current: Option<SourceId>,
    nothing: Rc<Rendered>,
}

impl Engine {
    pub fn new(registry: Rc<CapabilityRegistry>, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::debug!(
            target: "artifex::loader",
            "engine with {} capabilities, step budget {}, cache capacity {:?}",
            registry.len(),
            config.step_budget,
            config.cache_capacity
        );
        Ok(Self {
            loader: ModuleLoader::new(registry, config.transform.clone(), config.limits()),
            cache: ExecutionCache::new(config.cache_capacity),
            config,
            current: None,
            nothing: Rc::new(Rendered::Nothing),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Rc<CapabilityRegistry> {
        self.loader.registry()
    }

    /// Renders `source` with `data` as the factory's argument.
    ///
    /// Identical text and data return the same `Rc` as the previous call.
    pub fn render(&mut self, source: Option<&str>, data: Option<&serde_json::Value>) -> Rc<Rendered> {
        match source {
            Some(text) => self.render_unit(&SourceUnit::new(text), data),
            None => self.nothing.clone(),
        }
    }

    /// Like [`Engine::render`], for a source carrying its own diagnostic name.
    pub fn render_unit(&mut self, source: &SourceUnit, data: Option<&serde_json::Value>) -> Rc<Rendered> {
        if source.is_blank() {
            return self.nothing.clone();
        }
        let id = source.id();
        if let Some(previous) = self.current.replace(id).filter(|previous| *previous != id) {
            self.cache.forget_render(previous);
        }
        if let Some(rendered) = self.cache.rendered(source, data) {
            return rendered;
        }

        let rendered = match self.cache.get_or_load(source, &self.loader) {
            Ok(module) => {
                self.cache.count_render();
                match sandbox::render(&module, data, self.loader.limits()) {
                    Ok(nodes) => Rendered::Tree(nodes),
                    Err(error) => Rendered::Failed(error),
                }
            }
            Err(error) => Rendered::Failed(error),
        };
        if let Rendered::Failed(error) = &rendered {
            log::info!(
                target: "artifex::sandbox",
                "{} in {}: {error}",
                error.title(),
                source.name()
            );
        }
        let rendered = Rc::new(rendered);
        self.cache.remember(source, data, rendered.clone());
        rendered
    }

    /// Transforms and loads `source` without rendering it.
    pub fn load(&mut self, source: &str) -> Result<Rc<LoadedModule>, ExecutionError> {
        self.cache.get_or_load(&SourceUnit::new(source), &self.loader)
    }

    pub fn state(&self, source: &str) -> ModuleState {
        self.cache.state(&SourceUnit::new(source))
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime;

    fn engine() -> Engine {
        let registry = CapabilityRegistry::builder()
            .register("react", runtime::namespace())
            .build()
            .unwrap();
        Engine::new(Rc::new(registry), EngineConfig::default()).unwrap()
    }

    const GREETING: &str = "export default ({ name = 'world' } = {}) => <h1>Hello {name}</h1>;";

    #[test]
    fn repeated_renders_share_output() {
        let mut engine = engine();
        let first = engine.render(Some(GREETING), None);
        let second = engine.render(Some(GREETING), None);
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(first.to_html(), "<h1>Hello world</h1>");
        assert_eq!(engine.stats().renders, 1);
    }

    #[test]
    fn new_data_renders_again_without_reloading() {
        let mut engine = engine();
        let ada = serde_json::json!({ "name": "Ada" });
        let first = engine.render(Some(GREETING), Some(&ada));
        let second = engine.render(Some(GREETING), None);
        assert_eq!(first.to_html(), "<h1>Hello Ada</h1>");
        assert_eq!(second.to_html(), "<h1>Hello world</h1>");
        let stats = engine.stats();
        assert_eq!((stats.transforms, stats.loads, stats.renders), (1, 1, 2));
    }

    #[test]
    fn switching_sources_drops_the_previous_render() {
        let mut engine = engine();
        let first = engine.render(Some(GREETING), None);
        engine.render(Some("export default () => <p />;"), None);
        let again = engine.render(Some(GREETING), None);
        assert!(!Rc::ptr_eq(&first, &again));
        assert_eq!(first, again);
        assert_eq!(engine.stats().transforms, 2);
    }

    #[test]
    fn blank_source_renders_nothing() {
        let mut engine = engine();
        assert_eq!(*engine.render(None, None), Rendered::Nothing);
        assert_eq!(*engine.render(Some("  \n\t"), None), Rendered::Nothing);
        assert_eq!(engine.stats(), CacheStats::default());
    }

    #[test]
    fn failures_render_placeholders() {
        let mut engine = engine();
        let rendered = engine.render(Some("export default () => { throw new Error('boom'); };"), None);
        assert_eq!(rendered.error().map(ExecutionError::kind), Some(ErrorKind::Render));
        let html = rendered.to_html();
        assert!(html.contains("Render Error"));
        assert!(html.contains("boom"));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = EngineConfig {
            step_budget: 0,
            ..EngineConfig::default()
        };
        assert!(Engine::new(Rc::new(CapabilityRegistry::empty()), config).is_err());
    }

    #[test]
    fn clearing_the_cache_forgets_states() {
        let mut engine = engine();
        engine.load(GREETING).unwrap();
        assert_eq!(engine.state(GREETING), ModuleState::Loaded);
        engine.clear_cache();
        assert_eq!(engine.state(GREETING), ModuleState::Unloaded);
    }
}
