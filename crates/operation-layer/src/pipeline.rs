use crate::{
    cache_result, error_handler, log_operation, validate, Blank, CacheKey, InvalidInput,
    Operation, ResultCache,
};
use std::{fmt, fmt::Display, sync::Arc};

/// An operation plus the layers wrapped around it.
///
/// Each builder call wraps the current operation, so layers are declared innermost
/// first and [`Pipeline::layers`] reports them outermost first.
pub struct Pipeline<I, O, E> {
    name: String,
    layers: Vec<&'static str>,
    op: Operation<I, O, E>,
}

impl<I, O, E> Pipeline<I, O, E>
where
    I: 'static,
    O: 'static,
    E: 'static,
{
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            layers: vec![],
            op: Arc::new(f),
        }
    }

    pub fn validate(self) -> Self
    where
        I: Blank,
        E: From<InvalidInput>,
    {
        let op = validate(&self.name, self.op);
        wrap(self.name, self.layers, "validate", op)
    }

    pub fn log(self) -> Self
    where
        E: Display,
    {
        let op = log_operation(&self.name, self.op);
        wrap(self.name, self.layers, "log", op)
    }

    pub fn cache(self, cache: &ResultCache) -> Self
    where
        I: CacheKey,
        O: Clone + Send + Sync,
    {
        let op = cache_result(&self.name, cache.clone(), self.op);
        wrap(self.name, self.layers, "cache", op)
    }

    pub fn error_handler(self, message: &str) -> Pipeline<I, Option<O>, E>
    where
        E: Display,
    {
        let op = error_handler(message, self.op);
        wrap(self.name, self.layers, "error_handler", op)
    }
}

fn wrap<I, O, E>(
    name: String,
    mut layers: Vec<&'static str>,
    layer: &'static str,
    op: Operation<I, O, E>,
) -> Pipeline<I, O, E> {
    layers.insert(0, layer);
    Pipeline { name, layers, op }
}

impl<I, O, E> Pipeline<I, O, E> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layers(&self) -> &[&'static str] {
        &self.layers
    }

    pub fn call(&self, input: I) -> Result<O, E> {
        (self.op)(input)
    }
}

impl<I, O, E> Clone for Pipeline<I, O, E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            layers: self.layers.clone(),
            op: self.op.clone(),
        }
    }
}

impl<I, O, E> fmt::Debug for Pipeline<I, O, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("layers", &self.layers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, thiserror::Error)]
    enum TestError {
        #[error(transparent)]
        Invalid(#[from] InvalidInput),
        #[error("backend exploded")]
        Backend,
    }

    fn counted(
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(String) -> Result<String, TestError> + Send + Sync + 'static {
        move |prompt: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            if prompt == "explode" {
                return Err(TestError::Backend);
            }
            Ok(format!("image of {}", prompt))
        }
    }

    #[test_log::test]
    fn blank_input_never_reaches_operation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = Pipeline::new("generate", counted(calls.clone()))
            .error_handler("generation failed")
            .log()
            .validate();

        for input in ["", " ", "\n\t  "] {
            let result = op.call(input.to_string());
            assert!(matches!(result, Err(TestError::Invalid(_))));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(
            op.call("a red bicycle".to_string()).unwrap(),
            Some("image of a red bicycle".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn error_handler_suppresses_backend_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let op = Pipeline::new("generate", counted(calls.clone()))
            .error_handler("generation failed")
            .log()
            .validate();

        assert!(matches!(op.call("explode".to_string()), Ok(None)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test_log::test]
    fn log_returns_errors_unchanged() {
        let op = Pipeline::new("generate", counted(Arc::new(AtomicUsize::new(0)))).log();
        assert!(matches!(
            op.call("explode".to_string()),
            Err(TestError::Backend)
        ));
    }

    #[test_log::test]
    fn repeated_arguments_hit_the_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResultCache::new();
        let op = Pipeline::new("generate", counted(calls.clone())).cache(&cache);

        let first = op.call("cat".to_string()).unwrap();
        let second = op.call("cat".to_string()).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        op.call("dog".to_string()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test_log::test]
    fn failures_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResultCache::new();
        let op = Pipeline::new("generate", counted(calls.clone()))
            .cache(&cache)
            .error_handler("generation failed");

        assert!(matches!(op.call("explode".to_string()), Ok(None)));
        assert!(matches!(op.call("explode".to_string()), Ok(None)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_is_scoped_by_operation_name() {
        let cache = ResultCache::new();
        let upper = Pipeline::new("upper", |s: String| Ok::<_, TestError>(s.to_uppercase()))
            .cache(&cache);
        let lower = Pipeline::new("lower", |s: String| Ok::<_, TestError>(s.to_lowercase()))
            .cache(&cache);

        assert_eq!(upper.call("Cat".to_string()).unwrap(), "CAT");
        assert_eq!(lower.call("Cat".to_string()).unwrap(), "cat");
    }

    #[test]
    fn layers_report_declared_order() {
        let cache = ResultCache::new();
        let op = Pipeline::new("caption", |s: String| Ok::<_, TestError>(s))
            .cache(&cache)
            .error_handler("captioning failed")
            .log()
            .validate();

        assert_eq!(op.name(), "caption");
        assert_eq!(op.layers(), &["validate", "log", "error_handler", "cache"]);
    }
}
