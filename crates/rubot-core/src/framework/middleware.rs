//! Onion-style middleware composition.
//!
//! A middleware receives the context and a [`Next`] handle. Awaiting
//! `next.run()` runs the rest of the chain (and finally the terminal) before
//! control returns to the caller, so code after the await observes the work
//! done downstream. Not calling `next` short-circuits everything after it.
//!
//! ```rust,ignore
//! let chain = compose(vec![
//!     from_fn(|ctx: Arc<Context>, next| async move {
//!         let started = Instant::now();
//!         next.run().await?;
//!         tracing::debug!(elapsed = ?started.elapsed(), "update handled");
//!         Ok(())
//!     }),
//! ]);
//!
//! chain.run(ctx, noop_terminal()).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use parking_lot::Mutex;

use crate::foundation::{BoxError, MiddlewareError};

/// A composable request-processing stage.
pub type Middleware<C> =
    Arc<dyn Fn(Arc<C>, Next<C>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Innermost step run when the last middleware calls `next`.
pub type Terminal<C> = Arc<dyn Fn(Arc<C>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Wraps an async closure as a [`Middleware`].
pub fn from_fn<C, F, Fut>(f: F) -> Middleware<C>
where
    C: Send + Sync + 'static,
    F: Fn(Arc<C>, Next<C>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx: Arc<C>, next: Next<C>| f(ctx, next).boxed())
}

/// Terminal that does nothing.
pub fn noop_terminal<C: Send + Sync + 'static>() -> Terminal<C> {
    Arc::new(|_| future::ready(Ok(())).boxed())
}

/// Composes `middlewares` into one callable chain, outermost first.
pub fn compose<C: Send + Sync + 'static>(middlewares: Vec<Middleware<C>>) -> Composed<C> {
    Composed {
        middlewares: middlewares.into(),
    }
}

/// A composed middleware chain.
pub struct Composed<C> {
    middlewares: Arc<[Middleware<C>]>,
}

impl<C> Clone for Composed<C> {
    fn clone(&self) -> Self {
        Self {
            middlewares: Arc::clone(&self.middlewares),
        }
    }
}

impl<C> fmt::Debug for Composed<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composed")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

impl<C: Send + Sync + 'static> Composed<C> {
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Runs the chain for `ctx`, ending in `terminal`.
    ///
    /// Each invocation tracks its own `next` calls, so the same chain can run
    /// concurrently for different contexts.
    pub fn run(&self, ctx: Arc<C>, terminal: Terminal<C>) -> BoxFuture<'static, Result<(), BoxError>> {
        let state = Arc::new(ChainState {
            middlewares: Arc::clone(&self.middlewares),
            terminal,
            ctx,
            last: Mutex::new(None),
        });
        dispatch(state, 0)
    }
}

struct ChainState<C> {
    middlewares: Arc<[Middleware<C>]>,
    terminal: Terminal<C>,
    ctx: Arc<C>,
    last: Mutex<Option<usize>>,
}

/// Handle to the remainder of a middleware chain.
pub struct Next<C> {
    state: Arc<ChainState<C>>,
    index: usize,
}

impl<C> Clone for Next<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            index: self.index,
        }
    }
}

impl<C> fmt::Debug for Next<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}

impl<C: Send + Sync + 'static> Next<C> {
    /// Runs the downstream middlewares and the terminal.
    ///
    /// Calling this a second time within the same middleware fails with
    /// [`MiddlewareError::NextCalledMultipleTimes`].
    pub fn run(&self) -> BoxFuture<'static, Result<(), BoxError>> {
        dispatch(Arc::clone(&self.state), self.index)
    }
}

fn dispatch<C: Send + Sync + 'static>(
    state: Arc<ChainState<C>>,
    index: usize,
) -> BoxFuture<'static, Result<(), BoxError>> {
    {
        let mut last = state.last.lock();
        if last.is_some_and(|l| index <= l) {
            return future::ready(Err(MiddlewareError::NextCalledMultipleTimes.into())).boxed();
        }
        *last = Some(index);
    }

    match state.middlewares.get(index) {
        Some(middleware) => {
            let next = Next {
                state: Arc::clone(&state),
                index: index + 1,
            };
            middleware(Arc::clone(&state.ctx), next)
        }
        None => (state.terminal)(Arc::clone(&state.ctx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    fn tracer(log: &Log, name: &'static str) -> Middleware<String> {
        let log = Arc::clone(log);
        from_fn(move |_ctx: Arc<String>, next: Next<String>| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(format!("{name}:in"));
                next.run().await?;
                log.lock().push(format!("{name}:out"));
                Ok(())
            }
        })
    }

    fn recording_terminal(log: &Log) -> Terminal<String> {
        let log = Arc::clone(log);
        Arc::new(move |ctx: Arc<String>| {
            log.lock().push(format!("terminal:{ctx}"));
            future::ready(Ok(())).boxed()
        })
    }

    #[tokio::test]
    async fn test_onion_order() {
        let log: Log = Arc::default();
        let chain = compose(vec![tracer(&log, "a"), tracer(&log, "b")]);

        chain
            .run(Arc::new("x".into()), recording_terminal(&log))
            .await
            .unwrap();

        assert_eq!(
            *log.lock(),
            vec!["a:in", "b:in", "terminal:x", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn test_empty_chain_runs_terminal() {
        let log: Log = Arc::default();
        let chain = compose::<String>(Vec::new());
        assert!(chain.is_empty());

        chain
            .run(Arc::new("y".into()), recording_terminal(&log))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["terminal:y"]);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_rest() {
        let log: Log = Arc::default();
        let gate = from_fn(|_ctx: Arc<String>, _next: Next<String>| async { Ok(()) });
        let chain = compose(vec![tracer(&log, "a"), gate, tracer(&log, "c")]);

        chain
            .run(Arc::new("z".into()), recording_terminal(&log))
            .await
            .unwrap();

        assert_eq!(*log.lock(), vec!["a:in", "a:out"]);
    }

    #[tokio::test]
    async fn test_next_called_twice_fails() {
        let twice = from_fn(|_ctx: Arc<String>, next: Next<String>| async move {
            next.run().await?;
            next.run().await
        });
        let chain = compose(vec![twice]);

        let err = chain
            .run(Arc::new("ctx".into()), noop_terminal())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "next() called multiple times");
        assert!(err.downcast_ref::<MiddlewareError>().is_some());
    }

    #[tokio::test]
    async fn test_next_called_twice_mid_chain_fails() {
        let log: Log = Arc::default();
        let outer = {
            let log = Arc::clone(&log);
            from_fn(move |_ctx: Arc<String>, next: Next<String>| {
                let log = Arc::clone(&log);
                async move {
                    let result = next.run().await;
                    if let Err(err) = &result {
                        log.lock().push(format!("outer saw: {err}"));
                    }
                    result
                }
            })
        };
        let twice = from_fn(|_ctx: Arc<String>, next: Next<String>| async move {
            next.run().await?;
            next.run().await
        });
        let chain = compose(vec![outer, twice, tracer(&log, "inner")]);

        let err = chain
            .run(Arc::new("ctx".into()), recording_terminal(&log))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MiddlewareError>(),
            Some(MiddlewareError::NextCalledMultipleTimes)
        ));
        assert_eq!(
            *log.lock(),
            vec![
                "inner:in",
                "terminal:ctx",
                "inner:out",
                "outer saw: next() called multiple times",
            ]
        );
    }

    #[tokio::test]
    async fn test_error_propagates_to_outer() {
        let log: Log = Arc::default();
        let failing = from_fn(|_ctx: Arc<String>, _next: Next<String>| async {
            Err::<(), BoxError>("downstream".into())
        });
        let chain = compose(vec![tracer(&log, "a"), failing]);

        let err = chain
            .run(Arc::new("ctx".into()), noop_terminal())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "downstream");
        assert_eq!(*log.lock(), vec!["a:in"]);
    }

    #[tokio::test]
    async fn test_appending_equals_nesting() {
        let flat_log: Log = Arc::default();
        compose(vec![tracer(&flat_log, "a"), tracer(&flat_log, "b")])
            .run(Arc::new("n".into()), recording_terminal(&flat_log))
            .await
            .unwrap();

        let nested_log: Log = Arc::default();
        let inner = compose(vec![tracer(&nested_log, "b")]);
        let inner_terminal = recording_terminal(&nested_log);
        let terminal: Terminal<String> = Arc::new(move |ctx: Arc<String>| {
            inner.run(ctx, Arc::clone(&inner_terminal))
        });
        compose(vec![tracer(&nested_log, "a")])
            .run(Arc::new("n".into()), terminal)
            .await
            .unwrap();

        assert_eq!(*flat_log.lock(), *nested_log.lock());
    }

    #[tokio::test]
    async fn test_chain_reusable_across_runs() {
        let log: Log = Arc::default();
        let chain = compose(vec![tracer(&log, "a")]);

        chain
            .run(Arc::new("1".into()), recording_terminal(&log))
            .await
            .unwrap();
        chain
            .clone()
            .run(Arc::new("2".into()), recording_terminal(&log))
            .await
            .unwrap();

        assert_eq!(log.lock().len(), 6);
    }
}
