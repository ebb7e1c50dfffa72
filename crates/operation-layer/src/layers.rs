use crate::{Blank, CacheKey, InvalidInput, ResultCache};
use std::{fmt::Display, sync::Arc, time::Instant};
use tracing::{debug, error, info};

/// A shareable operation taking its argument list by value.
pub type Operation<I, O, E> = Arc<dyn Fn(I) -> Result<O, E> + Send + Sync>;

/// Rejects blank primary arguments with [`InvalidInput`] before `op` runs.
pub fn validate<I, O, E>(name: &str, op: Operation<I, O, E>) -> Operation<I, O, E>
where
    I: Blank + 'static,
    O: 'static,
    E: From<InvalidInput> + 'static,
{
    let name = name.to_string();
    Arc::new(move |input: I| {
        if input.is_blank() {
            debug!("{} rejected blank input", name);
            return Err(InvalidInput::new(name.as_str()).into());
        }
        op(input)
    })
}

/// Logs start, elapsed time and outcome of `op`. Errors are returned unchanged.
pub fn log_operation<I, O, E>(name: &str, op: Operation<I, O, E>) -> Operation<I, O, E>
where
    I: 'static,
    O: 'static,
    E: Display + 'static,
{
    let name = name.to_string();
    Arc::new(move |input: I| {
        let start = Instant::now();
        info!("starting {}", name);

        match op(input) {
            Ok(v) => {
                info!(
                    "{} completed in {:.2}s",
                    name,
                    start.elapsed().as_secs_f64()
                );
                Ok(v)
            }
            Err(e) => {
                error!(
                    "{} failed after {:.2}s: {}",
                    name,
                    start.elapsed().as_secs_f64(),
                    e
                );
                Err(e)
            }
        }
    })
}

/// Returns the stored result when `op` already succeeded with equal arguments.
/// Failures are not stored.
pub fn cache_result<I, O, E>(
    name: &str,
    cache: ResultCache,
    op: Operation<I, O, E>,
) -> Operation<I, O, E>
where
    I: CacheKey + 'static,
    O: Clone + Send + Sync + 'static,
    E: 'static,
{
    let name = name.to_string();
    Arc::new(move |input: I| {
        let key = ResultCache::key(&name, &input.cache_key());

        if let Some(v) = cache.get::<O>(&key) {
            debug!("returning cached result for {}", name);
            return Ok(v);
        }

        let result = op(input)?;
        cache.insert(key, result.clone());
        debug!("cached result for {}", name);

        Ok(result)
    })
}

/// Logs failures of `op` together with `message` and turns them into `None`.
pub fn error_handler<I, O, E>(message: &str, op: Operation<I, O, E>) -> Operation<I, Option<O>, E>
where
    I: 'static,
    O: 'static,
    E: Display + 'static,
{
    let message = message.to_string();
    Arc::new(move |input: I| match op(input) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            error!("{}: {}", message, e);
            Ok(None)
        }
    })
}
