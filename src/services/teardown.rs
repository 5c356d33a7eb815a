use crate::{BoxError, DynSvc, Service, ServiceKey, Svc, TeardownFailure};
use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;
use tracing::{debug, warn};

/// Output of a release hook. Hooks may return nothing or a [`Result`].
pub trait TeardownOutput {
    /// Converts the hook's output into a uniform result.
    fn into_result(self) -> Result<(), BoxError>;
}

impl TeardownOutput for () {
    fn into_result(self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<E: Into<BoxError>> TeardownOutput for Result<(), E> {
    fn into_result(self) -> Result<(), BoxError> {
        self.map_err(Into::into)
    }
}

type BlockingHook = dyn Fn(DynSvc) -> Result<(), BoxError> + Send + Sync;
type SuspendingHook =
    dyn Fn(DynSvc) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// A type-erased release hook.
#[derive(Clone)]
pub(crate) enum Teardown {
    Blocking(Svc<BlockingHook>),
    Suspending(Svc<SuspendingHook>),
}

impl Teardown {
    pub(crate) fn blocking<R, F, O>(hook: F) -> Self
    where
        R: Service,
        F: Fn(Svc<R>) -> O + Send + Sync + 'static,
        O: TeardownOutput,
    {
        Teardown::Blocking(Svc::new(move |service: DynSvc| {
            match service.downcast_arc::<R>() {
                Ok(service) => hook(service).into_result(),
                Err(_) => Err(wrong_type::<R>()),
            }
        }))
    }

    pub(crate) fn suspending<R, F, Fut>(hook: F) -> Self
    where
        R: Service,
        F: Fn(Svc<R>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: TeardownOutput,
    {
        Teardown::Suspending(Svc::new(move |service: DynSvc| {
            match service.downcast_arc::<R>() {
                Ok(service) => {
                    hook(service).map(TeardownOutput::into_result).boxed()
                }
                Err(_) => futures_util::future::err(wrong_type::<R>()).boxed(),
            }
        }))
    }
}

fn wrong_type<R: Service>() -> BoxError {
    format!(
        "release hook for {} received a value of another type",
        std::any::type_name::<R>()
    )
    .into()
}

/// A created value together with the hook that releases it.
pub(crate) struct TeardownEntry {
    pub key: ServiceKey,
    pub service: DynSvc,
    pub hook: Teardown,
}

impl TeardownEntry {
    async fn run(self) -> Result<(), TeardownFailure> {
        debug!(key = %self.key, "running release hook");
        let result = match &self.hook {
            Teardown::Blocking(hook) => hook(self.service),
            Teardown::Suspending(hook) => hook(self.service).await,
        };
        result.map_err(|error| TeardownFailure {
            key: self.key,
            error: Svc::from(error),
        })
    }
}

/// Release hooks recorded in creation order.
#[derive(Default)]
pub(crate) struct TeardownList {
    entries: Vec<TeardownEntry>,
}

impl TeardownList {
    pub fn push(&mut self, entry: TeardownEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Runs every hook, last created first. A failing hook does not stop the
    /// remaining ones.
    pub async fn run(self) -> Vec<TeardownFailure> {
        let mut failures = Vec::new();
        for entry in self.entries.into_iter().rev() {
            if let Err(failure) = entry.run().await {
                warn!(
                    key = %failure.key,
                    error = %failure.error,
                    "release hook failed"
                );
                failures.push(failure);
            }
        }
        failures
    }

    /// Runs the hooks without an awaiting caller. On a tokio runtime the hooks
    /// run in order on a spawned task. Without one, only blocking hooks run.
    pub fn run_detached(self) {
        if self.entries.is_empty() {
            return;
        }

        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            drop(runtime.spawn(async move {
                drop(self.run().await);
            }));
            return;
        }

        for entry in self.entries.into_iter().rev() {
            match entry.hook {
                Teardown::Blocking(hook) => {
                    if let Err(error) = hook(entry.service) {
                        warn!(key = %entry.key, %error, "release hook failed");
                    }
                }
                Teardown::Suspending(_) => {
                    warn!(
                        key = %entry.key,
                        "no runtime is available to run an async release hook"
                    );
                }
            }
        }
    }
}
