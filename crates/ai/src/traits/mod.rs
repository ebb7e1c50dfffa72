mod image_caption;
mod text_to_image;

use crate::{
    loader::{LoadStatus, ModelLoader},
    AiError,
};
pub use image_caption::*;
use operation_layer::{Blank, CacheKey, Pipeline, ResultCache};
use serde::Serialize;
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
pub use text_to_image::*;

/// An inference backend. Implementations are created lazily by [`AIModel`].
pub trait Model {
    type Item;
    type Output;

    fn process(&mut self, item: Self::Item) -> anyhow::Result<Self::Output>;

    /// Device the backend actually runs on, once created.
    fn device_name(&self) -> Option<&'static str> {
        None
    }
}

/// Static facts about a model, known before it is loaded. `device` is the preferred device
/// until the model reports where it really landed.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescription {
    pub model_type: String,
    pub device: String,
    pub input_type: String,
    pub output_type: String,
    pub description: String,
    /// logged together with the failure detail when processing fails
    pub failure_message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub loaded: bool,
    /// seconds
    pub load_time: Option<f64>,
    #[serde(flatten)]
    pub description: ModelDescription,
}

/// Lazily loaded model behind the validate → log → error handler layers.
///
/// `process` returns `Ok(None)` when loading or inference failed; the failure itself is
/// logged. Only blank input is reported as an error.
pub struct AIModel<TItem, TOutput> {
    model_id: String, // for better logging
    description: ModelDescription,
    status: Arc<dyn LoadStatus>,
    active_device: Arc<Mutex<Option<&'static str>>>,
    process_fn: Pipeline<TItem, Option<TOutput>, AiError>,
    cached_process_fn: Pipeline<TItem, Option<TOutput>, AiError>,
}

impl<TItem, TOutput> AIModel<TItem, TOutput>
where
    TItem: Blank + CacheKey + Send + 'static,
    TOutput: Clone + Send + Sync + 'static,
{
    pub fn new<T, TFn>(
        model_id: impl Into<String>,
        description: ModelDescription,
        cache: &ResultCache,
        create_model: TFn,
    ) -> Self
    where
        T: Model<Item = TItem, Output = TOutput> + Send + 'static,
        TFn: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let model_id = model_id.into();
        let active_device = Arc::new(Mutex::new(None));

        let create = {
            let active_device = active_device.clone();
            move || -> anyhow::Result<T> {
                let model = create_model()?;
                *active_device.lock().unwrap_or_else(PoisonError::into_inner) =
                    model.device_name();
                Ok(model)
            }
        };
        let loader = Arc::new(ModelLoader::new(model_id.clone(), create));

        let op = {
            let loader = loader.clone();
            move |item: TItem| loader.with_model(|model| model.process(item))
        };
        let operation_name = format!("{}::process", model_id);

        let process_fn = Pipeline::new(operation_name.clone(), op.clone())
            .error_handler(&description.failure_message)
            .log()
            .validate();

        let cached_process_fn = Pipeline::new(operation_name, op)
            .cache(cache)
            .error_handler(&description.failure_message)
            .log()
            .validate();

        Self {
            model_id,
            description,
            status: loader,
            active_device,
            process_fn,
            cached_process_fn,
        }
    }
}

impl<TItem, TOutput> AIModel<TItem, TOutput> {
    #[tracing::instrument(name = "AIModel::process", skip_all, fields(model_id=%self.model_id))]
    pub fn process(&self, item: TItem) -> Result<Option<TOutput>, AiError> {
        self.process_fn.call(item)
    }

    /// Same as [`AIModel::process`], returning earlier results for equal input.
    #[tracing::instrument(name = "AIModel::process_cached", skip_all, fields(model_id=%self.model_id))]
    pub fn process_cached(&self, item: TItem) -> Result<Option<TOutput>, AiError> {
        self.cached_process_fn.call(item)
    }

    pub fn ensure_loaded(&self) -> Result<(), AiError> {
        self.status.load()
    }

    pub fn offload(&self) {
        self.status.offload()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_loaded(&self) -> bool {
        self.status.is_loaded()
    }

    pub fn load_duration(&self) -> Option<Duration> {
        self.status.load_duration()
    }

    pub fn layers(&self) -> &[&'static str] {
        self.process_fn.layers()
    }

    pub fn info(&self) -> ModelInfo {
        let loaded = self.is_loaded();
        let mut description = self.description.clone();
        if loaded {
            let active = *self
                .active_device
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(device) = active {
                description.device = device.to_string();
            }
        }

        ModelInfo {
            name: self.model_id.clone(),
            loaded,
            load_time: self.load_duration().map(|d| d.as_secs_f64()),
            description,
        }
    }
}

impl<TItem, TOutput> fmt::Debug for AIModel<TItem, TOutput> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AIModel")
            .field("model_id", &self.model_id)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        calls: Arc<AtomicUsize>,
    }

    impl Model for Echo {
        type Item = String;
        type Output = String;

        fn process(&mut self, item: String) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if item == "explode" {
                anyhow::bail!("inference blew up");
            }
            Ok(item.to_uppercase())
        }
    }

    fn description() -> ModelDescription {
        ModelDescription {
            model_type: "Echo".to_string(),
            device: "cpu".to_string(),
            input_type: "Text".to_string(),
            output_type: "Text".to_string(),
            description: "Repeats its input".to_string(),
            failure_message: "Echo failed".to_string(),
        }
    }

    fn echo_model(
        loads: Arc<AtomicUsize>,
        calls: Arc<AtomicUsize>,
        cache: &ResultCache,
    ) -> AIModel<String, String> {
        AIModel::new("test/echo", description(), cache, move || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Echo {
                calls: calls.clone(),
            })
        })
    }

    #[test_log::test]
    fn loads_lazily_on_first_process() {
        let loads = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(AtomicUsize::new(0));
        let model = echo_model(loads.clone(), calls.clone(), &ResultCache::new());

        assert!(!model.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        assert_eq!(model.process("cat".into()).unwrap(), Some("CAT".into()));
        assert_eq!(model.process("dog".into()).unwrap(), Some("DOG".into()));

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let info = model.info();
        assert_eq!(info.name, "test/echo");
        assert!(info.loaded);
        assert!(info.load_time.is_some());
    }

    #[test_log::test]
    fn blank_input_is_rejected_without_loading() {
        let loads = Arc::new(AtomicUsize::new(0));
        let model = echo_model(
            loads.clone(),
            Arc::new(AtomicUsize::new(0)),
            &ResultCache::new(),
        );

        let err = model.process("   ".into()).unwrap_err();
        assert!(matches!(err, AiError::InvalidInput(_)));
        assert_eq!(loads.load(Ordering::SeqCst), 0);
    }

    #[test_log::test]
    fn failures_become_none() {
        let model = echo_model(
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            &ResultCache::new(),
        );
        assert!(model.process("explode".into()).unwrap().is_none());
    }

    #[test_log::test]
    fn load_failure_becomes_none() {
        let model: AIModel<String, String> =
            AIModel::new("test/broken", description(), &ResultCache::new(), || {
                Err::<Echo, _>(anyhow::anyhow!("no such repository"))
            });

        assert!(model.process("cat".into()).unwrap().is_none());
        assert!(!model.is_loaded());
        assert!(matches!(
            model.ensure_loaded(),
            Err(AiError::ModelLoad { .. })
        ));
    }

    #[test_log::test]
    fn cached_process_skips_the_backend() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResultCache::new();
        let model = echo_model(Arc::new(AtomicUsize::new(0)), calls.clone(), &cache);

        let first = model.process_cached("cat".into()).unwrap();
        let second = model.process_cached("cat".into()).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // the uncached path still reaches the backend
        model.process("cat".into()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    struct OnCpu;

    impl Model for OnCpu {
        type Item = String;
        type Output = String;

        fn process(&mut self, item: String) -> anyhow::Result<String> {
            Ok(item)
        }

        fn device_name(&self) -> Option<&'static str> {
            Some("cpu")
        }
    }

    #[test_log::test]
    fn info_reports_the_device_actually_used() {
        let mut preferred = description();
        preferred.device = "cuda".to_string();
        let model: AIModel<String, String> =
            AIModel::new("test/fallback", preferred, &ResultCache::new(), || Ok(OnCpu));

        assert_eq!(model.info().description.device, "cuda");

        model.ensure_loaded().unwrap();
        assert_eq!(model.info().description.device, "cpu");

        model.offload();
        assert_eq!(model.info().description.device, "cuda");
    }

    #[test_log::test]
    fn info_keeps_described_device_when_unreported() {
        let loads = Arc::new(AtomicUsize::new(0));
        let model = echo_model(loads, Arc::new(AtomicUsize::new(0)), &ResultCache::new());

        model.ensure_loaded().unwrap();
        assert_eq!(model.info().description.device, "cpu");
    }

    #[test]
    fn layers_are_declared_outer_to_inner() {
        let model = echo_model(
            Arc::new(AtomicUsize::new(0)),
            Arc::new(AtomicUsize::new(0)),
            &ResultCache::new(),
        );
        assert_eq!(model.layers(), &["validate", "log", "error_handler"]);
    }
}
