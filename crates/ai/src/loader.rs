use crate::AiError;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};
use tracing::{debug, info};

/// Load state of a model, independent of its concrete type.
pub(crate) trait LoadStatus: Send + Sync {
    fn load(&self) -> Result<(), AiError>;
    fn offload(&self);
    fn is_loaded(&self) -> bool;
    fn load_duration(&self) -> Option<Duration>;
}

/// Creates the model on first use and keeps it for the rest of the process.
///
/// The check-then-load runs under the model mutex, so concurrent callers never load
/// twice. The loaded flag and load duration live outside that mutex and can be read
/// while an inference holds it.
pub(crate) struct ModelLoader<T> {
    model_id: String,
    model: Mutex<Option<T>>,
    loaded: AtomicBool,
    load_duration: Mutex<Option<Duration>>,
    create_model_fn: Box<dyn Fn() -> anyhow::Result<T> + Send + Sync>,
}

impl<T> ModelLoader<T> {
    pub fn new<F>(model_id: impl Into<String>, create_model: F) -> Self
    where
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            model_id: model_id.into(),
            model: Mutex::new(None),
            loaded: AtomicBool::new(false),
            load_duration: Mutex::new(None),
            create_model_fn: Box::new(create_model),
        }
    }

    fn lock_model(&self) -> MutexGuard<'_, Option<T>> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_locked(&self, current_model: &mut Option<T>) -> Result<(), AiError> {
        if current_model.is_none() {
            debug!("loading model {}", self.model_id);
            let start = Instant::now();

            let model = (self.create_model_fn)().map_err(|source| AiError::ModelLoad {
                model: self.model_id.clone(),
                source,
            })?;
            let elapsed = start.elapsed();

            *current_model = Some(model);
            *self
                .load_duration
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(elapsed);
            self.loaded.store(true, Ordering::SeqCst);

            info!(
                "model {} loaded in {:.2}s",
                self.model_id,
                elapsed.as_secs_f64()
            );
        }

        Ok(())
    }

    /// Runs `f` against the loaded model, loading it first if needed.
    pub fn with_model<R>(
        &self,
        f: impl FnOnce(&mut T) -> anyhow::Result<R>,
    ) -> Result<R, AiError> {
        let mut current_model = self.lock_model();
        self.load_locked(&mut current_model)?;

        match current_model.as_mut() {
            Some(model) => f(model).map_err(|source| AiError::Processing {
                model: self.model_id.clone(),
                source,
            }),
            None => Err(AiError::ModelLoad {
                model: self.model_id.clone(),
                source: anyhow::anyhow!("no valid model"),
            }),
        }
    }
}

impl<T: Send> LoadStatus for ModelLoader<T> {
    fn load(&self) -> Result<(), AiError> {
        let mut current_model = self.lock_model();
        self.load_locked(&mut current_model)
    }

    fn offload(&self) {
        let mut current_model = self.lock_model();
        *current_model = None;
        self.loaded.store(false, Ordering::SeqCst);
        debug!("model {} offloaded", self.model_id);
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn load_duration(&self) -> Option<Duration> {
        *self
            .load_duration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{atomic::AtomicUsize, Arc};

    #[test_log::test]
    fn loads_once_and_records_duration() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let loader = ModelLoader::new("counter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(0u32)
        });

        assert!(!loader.is_loaded());
        assert!(loader.load_duration().is_none());

        loader.load().unwrap();
        loader.load().unwrap();
        let value = loader
            .with_model(|m| {
                *m += 1;
                Ok(*m)
            })
            .unwrap();

        assert_eq!(value, 1);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(loader.is_loaded());
        assert!(loader.load_duration().is_some());
    }

    #[test_log::test]
    fn failed_load_is_retried_on_next_use() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let loader = ModelLoader::new("flaky", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("weights missing");
            }
            Ok(())
        });

        let err = loader.load().unwrap_err();
        assert!(matches!(err, AiError::ModelLoad { .. }));
        assert!(err.to_string().contains("weights missing"));
        assert!(!loader.is_loaded());

        loader.load().unwrap();
        assert!(loader.is_loaded());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_callers_share_one_load() {
        let loads = Arc::new(AtomicUsize::new(0));
        let counter = loads.clone();
        let loader = Arc::new(ModelLoader::new("shared", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            Ok(())
        }));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let loader = loader.clone();
                std::thread::spawn(move || loader.with_model(|_| Ok(())))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn offload_drops_the_model() {
        let loader = ModelLoader::new("offload", || Ok(String::from("weights")));
        loader.load().unwrap();
        loader.offload();
        assert!(!loader.is_loaded());
        // the last load time stays visible
        assert!(loader.load_duration().is_some());
    }
}
