//! Model list and the user's model choice.

use crate::api::{BackendApi, ModelList};
use crate::error::Result;
use crate::prefs::{self, PreferenceStore};

use super::StatusLog;

#[derive(Debug, Clone, Default)]
pub struct ModelSelector {
    models: Vec<String>,
    default_model: Option<String>,
    selected: Option<String>,
}

impl ModelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Fetch the model list and select the default. A remembered choice that
    /// is still offered is re-applied, which notifies the backend.
    pub async fn load_models<B: BackendApi + ?Sized>(
        &mut self,
        api: &B,
        prefs: &mut dyn PreferenceStore,
        log: &mut StatusLog,
    ) -> bool {
        let result = api.models().await;
        if !self.finish_load(result, log) {
            return false;
        }
        if let Some(saved) = self.saved_choice(prefs) {
            self.on_change(&saved, api, prefs, log).await;
        }
        true
    }

    /// Take a fetched model list and select the backend's default, or the
    /// first model when it names none.
    pub fn finish_load(&mut self, result: Result<ModelList>, log: &mut StatusLog) -> bool {
        let list = match result {
            Ok(list) => list,
            Err(e) => {
                log.error(format!("Could not load models: {e}"));
                return false;
            }
        };
        tracing::info!(count = list.models.len(), "Loaded models");
        self.models = list.models;
        self.default_model = list.default_model;
        self.selected = self
            .default_model
            .clone()
            .or_else(|| self.models.first().cloned());
        true
    }

    /// The remembered model, when the backend still offers it. It is
    /// re-applied even when it is also the default.
    pub fn saved_choice(&self, prefs: &dyn PreferenceStore) -> Option<String> {
        let saved = prefs.get(prefs::SELECTED_MODEL)?;
        if self.models.contains(&saved) {
            Some(saved)
        } else {
            tracing::debug!(model = %saved, "Saved model is no longer offered");
            None
        }
    }

    /// Select `model`, remember it, and tell the backend. The selection
    /// stands even when the backend refuses.
    pub async fn on_change<B: BackendApi + ?Sized>(
        &mut self,
        model: &str,
        api: &B,
        prefs: &mut dyn PreferenceStore,
        log: &mut StatusLog,
    ) -> bool {
        self.select(model, prefs);
        let result = api.switch_model(model).await;
        self.finish_switch(model, result, log)
    }

    /// Record the choice locally before the backend is asked.
    pub fn select(&mut self, model: &str, prefs: &mut dyn PreferenceStore) {
        self.selected = Some(model.to_string());
        if let Err(e) = prefs.set(prefs::SELECTED_MODEL, model, prefs::default_ttl()) {
            tracing::warn!("Failed to save selected model: {e}");
        }
    }

    pub fn finish_switch(&self, model: &str, result: Result<()>, log: &mut StatusLog) -> bool {
        match result {
            Ok(()) => {
                log.info(format!("Switched model to {model}"));
                true
            }
            Err(e) => {
                log.error(format!("Failed to switch model to {model}: {e}"));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::fake::FakeBackend;
    use crate::prefs::MemoryPreferenceStore;

    #[tokio::test]
    async fn test_load_selects_default() {
        let api = FakeBackend::default().with_models(&["(Default)", "gpt-4o"], Some("(Default)"));
        let mut prefs = MemoryPreferenceStore::new();
        let mut selector = ModelSelector::new();
        let mut log = StatusLog::new();

        assert!(selector.load_models(&api, &mut prefs, &mut log).await);

        assert_eq!(selector.models().len(), 2);
        assert_eq!(selector.selected(), Some("(Default)"));
        assert_eq!(api.calls("switch model"), 0);
    }

    #[tokio::test]
    async fn test_load_restores_saved_model() {
        let api = FakeBackend::default().with_models(&["(Default)", "gpt-4o"], Some("(Default)"));
        let mut prefs = MemoryPreferenceStore::new();
        prefs.set(prefs::SELECTED_MODEL, "gpt-4o", prefs::default_ttl()).unwrap();
        let mut selector = ModelSelector::new();
        let mut log = StatusLog::new();

        selector.load_models(&api, &mut prefs, &mut log).await;

        assert_eq!(selector.selected(), Some("gpt-4o"));
        assert_eq!(*api.switched.lock().unwrap(), vec!["gpt-4o".to_string()]);
    }

    #[tokio::test]
    async fn test_saved_default_is_still_sent_to_backend() {
        let api = FakeBackend::default().with_models(&["(Default)", "gpt-4o"], Some("(Default)"));
        let mut prefs = MemoryPreferenceStore::new();
        prefs.set(prefs::SELECTED_MODEL, "(Default)", prefs::default_ttl()).unwrap();
        let mut selector = ModelSelector::new();
        let mut log = StatusLog::new();

        selector.load_models(&api, &mut prefs, &mut log).await;

        assert_eq!(selector.selected(), Some("(Default)"));
        assert_eq!(api.calls("switch model"), 1);
        assert_eq!(*api.switched.lock().unwrap(), vec!["(Default)".to_string()]);
    }

    #[tokio::test]
    async fn test_load_ignores_stale_saved_model() {
        let api = FakeBackend::default().with_models(&["a", "b"], None);
        let mut prefs = MemoryPreferenceStore::new();
        prefs.set(prefs::SELECTED_MODEL, "gone", prefs::default_ttl()).unwrap();
        let mut selector = ModelSelector::new();
        let mut log = StatusLog::new();

        selector.load_models(&api, &mut prefs, &mut log).await;

        assert_eq!(selector.selected(), Some("a"));
        assert_eq!(api.calls("switch model"), 0);
    }

    #[tokio::test]
    async fn test_change_persists_before_backend_answers() {
        let api = FakeBackend::default().rejecting("switch model");
        let mut prefs = MemoryPreferenceStore::new();
        let mut selector = ModelSelector::new();
        let mut log = StatusLog::new();

        let switched = selector.on_change("gpt-4o", &api, &mut prefs, &mut log).await;

        assert!(!switched);
        assert_eq!(selector.selected(), Some("gpt-4o"));
        assert_eq!(prefs.get(prefs::SELECTED_MODEL).as_deref(), Some("gpt-4o"));
        assert!(log.latest().unwrap().text.contains("Failed to switch"));
    }

    #[tokio::test]
    async fn test_load_failure_is_reported() {
        let api = FakeBackend::default().failing("models");
        let mut prefs = MemoryPreferenceStore::new();
        let mut selector = ModelSelector::new();
        let mut log = StatusLog::new();

        assert!(!selector.load_models(&api, &mut prefs, &mut log).await);
        assert!(selector.models().is_empty());
        assert_eq!(log.len(), 1);
    }
}
