//! Memoises transform + load per source identity, plus the last render of
//! each identity.

use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::engine::Rendered;
use crate::error::ExecutionError;
use crate::loader::{LoadedModule, ModuleLoader, ModuleState};
use crate::source::{SourceId, SourceUnit};

/// Counters for observing the cache from hosts and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Source texts handed to the transformer.
    pub transforms: u64,
    /// Units executed.
    pub loads: u64,
    /// Lookups answered without transforming.
    pub hits: u64,
    pub evictions: u64,
    /// Factory invocations by the render sandbox.
    pub renders: u64,
}

struct RenderMemo {
    data: Option<serde_json::Value>,
    output: Rc<Rendered>,
}

struct CacheEntry {
    text: Arc<str>,
    state: ModuleState,
    outcome: Result<Rc<LoadedModule>, ExecutionError>,
    memo: Option<RenderMemo>,
}

/// LRU map from source identity to load outcome.
///
/// Failed outcomes are cached too: every terminal state is final for its
/// identity.
pub struct ExecutionCache {
    entries: IndexMap<SourceId, CacheEntry>,
    capacity: Option<usize>,
    stats: CacheStats,
}

impl ExecutionCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity,
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        log::debug!(target: "artifex::cache", "cleared {} entries", self.entries.len());
        self.entries.clear();
    }

    /// State of the identity of `source`; `Unloaded` when not cached.
    pub fn state(&self, source: &SourceUnit) -> ModuleState {
        self.find(source)
            .map(|entry| entry.state)
            .unwrap_or(ModuleState::Unloaded)
    }

    pub fn get_or_load(
        &mut self,
        source: &SourceUnit,
        loader: &ModuleLoader,
    ) -> Result<Rc<LoadedModule>, ExecutionError> {
        if let Some(outcome) = self.touch(source).map(|entry| entry.outcome.clone()) {
            self.stats.hits += 1;
            log::trace!(target: "artifex::cache", "hit {}", source.id());
            return outcome;
        }

        let mut state = ModuleState::Unloaded;
        let mut stats = self.stats;
        let outcome = loader
            .load_with(source, |next| {
                match next {
                    ModuleState::Transforming => stats.transforms += 1,
                    ModuleState::Executing => stats.loads += 1,
                    _ => {}
                }
                state = next;
            })
            .map(Rc::new);
        self.stats = stats;
        log::debug!(target: "artifex::cache", "{} is {state}", source.id());
        self.insert(
            source,
            CacheEntry {
                text: source.shared_text(),
                state,
                outcome: outcome.clone(),
                memo: None,
            },
        );
        outcome
    }

    /// The memoised render for `source` if it was produced from equal data.
    pub(crate) fn rendered(
        &mut self,
        source: &SourceUnit,
        data: Option<&serde_json::Value>,
    ) -> Option<Rc<Rendered>> {
        let output = self
            .touch(source)?
            .memo
            .as_ref()
            .filter(|memo| memo.data.as_ref() == data)
            .map(|memo| memo.output.clone())?;
        self.stats.hits += 1;
        Some(output)
    }

    pub(crate) fn remember(
        &mut self,
        source: &SourceUnit,
        data: Option<&serde_json::Value>,
        output: Rc<Rendered>,
    ) {
        if let Some(entry) = self.find_mut(source) {
            entry.memo = Some(RenderMemo {
                data: data.cloned(),
                output,
            });
        }
    }

    pub(crate) fn count_render(&mut self) {
        self.stats.renders += 1;
    }

    /// Drops the memoised render of an identity the host moved away from.
    pub(crate) fn forget_render(&mut self, id: SourceId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.memo = None;
        }
    }

    fn find(&self, source: &SourceUnit) -> Option<&CacheEntry> {
        self.entries
            .get(&source.id())
            .filter(|entry| *entry.text == *source.as_str())
    }

    fn find_mut(&mut self, source: &SourceUnit) -> Option<&mut CacheEntry> {
        self.entries
            .get_mut(&source.id())
            .filter(|entry| *entry.text == *source.as_str())
    }

    /// Looks up `source` and marks it most recently used.
    fn touch(&mut self, source: &SourceUnit) -> Option<&CacheEntry> {
        let id = source.id();
        self.find(source)?;
        let entry = self.entries.shift_remove(&id)?;
        self.entries.insert(id, entry);
        self.entries.get(&id)
    }

    fn insert(&mut self, source: &SourceUnit, entry: CacheEntry) {
        self.entries.shift_remove(&source.id());
        self.entries.insert(source.id(), entry);
        if let Some(capacity) = self.capacity {
            while self.entries.len() > capacity {
                if let Some((id, _)) = self.entries.shift_remove_index(0) {
                    self.stats.evictions += 1;
                    log::debug!(target: "artifex::cache", "evicted {id}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityRegistry;
    use crate::interpreter::Limits;
    use crate::transform::TransformOptions;

    fn loader() -> ModuleLoader {
        ModuleLoader::new(
            Rc::new(CapabilityRegistry::empty()),
            TransformOptions::default(),
            Limits::default(),
        )
    }

    #[test]
    fn identical_text_is_loaded_once() {
        let loader = loader();
        let mut cache = ExecutionCache::new(Some(4));
        let source = SourceUnit::new("export default () => null;");
        let first = cache.get_or_load(&source, &loader).unwrap();
        let second = cache
            .get_or_load(&SourceUnit::new("export default () => null;"), &loader)
            .unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                transforms: 1,
                loads: 1,
                hits: 1,
                ..CacheStats::default()
            }
        );
        assert_eq!(cache.state(&source), ModuleState::Loaded);
    }

    #[test]
    fn whitespace_changes_are_new_identities() {
        let loader = loader();
        let mut cache = ExecutionCache::new(None);
        cache.get_or_load(&SourceUnit::new("export default 1;"), &loader).unwrap();
        cache.get_or_load(&SourceUnit::new("export default 1; "), &loader).unwrap();
        assert_eq!(cache.stats().transforms, 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_cached() {
        let loader = loader();
        let mut cache = ExecutionCache::new(None);
        let broken = SourceUnit::new("export default (");
        assert!(cache.get_or_load(&broken, &loader).is_err());
        assert!(cache.get_or_load(&broken, &loader).is_err());
        assert_eq!(cache.stats().transforms, 1);
        assert_eq!(cache.stats().loads, 0);
        assert_eq!(cache.state(&broken), ModuleState::TransformFailed);
    }

    #[test]
    fn least_recently_used_entries_are_evicted() {
        let loader = loader();
        let mut cache = ExecutionCache::new(Some(2));
        let a = SourceUnit::new("export default 'a';");
        let b = SourceUnit::new("export default 'b';");
        let c = SourceUnit::new("export default 'c';");
        cache.get_or_load(&a, &loader).unwrap();
        cache.get_or_load(&b, &loader).unwrap();
        cache.get_or_load(&a, &loader).unwrap();
        cache.get_or_load(&c, &loader).unwrap();
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.state(&a), ModuleState::Loaded);
        assert_eq!(cache.state(&b), ModuleState::Unloaded);
        cache.clear();
        assert!(cache.is_empty());
    }
}
