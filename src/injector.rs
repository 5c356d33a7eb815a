use crate::{
    current_scope, ensure, fork, with_state, InjectError, InjectResult,
    Injected, InjectorBuilder, InjectorConfig, MisuseReason, Registry,
    RegistryChain, Request, RequestInfo, Scope, ScopeHandle, Svc,
    TeardownEntry, TeardownList, Tier,
};
use parking_lot::{Mutex, RwLock};
use std::{collections::HashMap, future::Future};
use tracing::{debug, info};

/// A runtime dependency injection container. This holds the registry chain
/// of every tier, and manages the scopes entered against those tiers.
///
/// # Injecting the injector
///
/// Cloning the injector does not clone the registries inside of it. Instead,
/// both injectors will use the same registries, meaning that an injector can
/// be passed to a service as a dependency. The injector can be requested as
/// itself without using a service pointer. It does not need to be registered
/// as a dependency in the builder beforehand.
///
/// Note that requesting the injector inside of your services is generally bad
/// practice, and is known as the service locator antipattern. This is mostly
/// useful for service factories where you can create instances of your
/// services on demand.
///
/// ```
/// use scoped_injector::{
///     constant, InjectResult, Injector, IntoProvider, Svc, Tier,
/// };
/// use std::sync::Mutex;
///
/// struct FloatFactory(Injector);
///
/// impl FloatFactory {
///     pub fn new(injector: Injector) -> Self {
///         FloatFactory(injector)
///     }
///
///     pub async fn get(&self) -> InjectResult<f32> {
///         let int: Svc<i32> = self.0.get().await?;
///         Ok(*int as f32)
///     }
/// }
///
/// fn count(counter: Svc<Mutex<i32>>) -> i32 {
///     let mut counter = counter.lock().unwrap();
///     *counter += 1;
///     *counter
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let mut builder = Injector::builder();
///     let registry = builder.registry_for(Tier::ROOT);
///     registry.provide(constant(Mutex::new(0i32)));
///     registry.provide(count.transient());
///     registry.provide(FloatFactory::new.scoped());
///
///     let injector = builder.build();
///     injector
///         .contextual(Tier::ROOT, async {
///             let float_factory: Svc<FloatFactory> =
///                 injector.get().await.unwrap();
///             assert_eq!(1.0, float_factory.get().await.unwrap());
///             assert_eq!(2.0, float_factory.get().await.unwrap());
///         })
///         .await
///         .unwrap();
/// }
/// ```
#[derive(Clone)]
pub struct Injector {
    inner: Svc<InjectorInner>,
}

struct InjectorInner {
    chains: RwLock<HashMap<Tier, RegistryChain>>,
    config: InjectorConfig,
    teardown: Mutex<TeardownList>,
}

impl Injector {
    /// Creates a builder for this injector. This is the preferred way of
    /// creating an injector.
    #[must_use]
    pub fn builder() -> InjectorBuilder {
        InjectorBuilder::default()
    }

    pub(crate) fn new_from_parts(
        chains: HashMap<Tier, RegistryChain>,
        config: InjectorConfig,
    ) -> Self {
        Injector {
            inner: Svc::new(InjectorInner {
                chains: RwLock::new(chains),
                config,
                teardown: Mutex::default(),
            }),
        }
    }

    /// The configuration this injector was built with.
    #[must_use]
    pub fn config(&self) -> &InjectorConfig {
        &self.inner.config
    }

    /// The registry chain of a tier, if any registry was added for it.
    #[must_use]
    pub fn chain(&self, tier: &Tier) -> Option<RegistryChain> {
        self.inner.chains.read().get(tier).cloned()
    }

    /// The primary registry of a tier, creating an empty chain for the tier
    /// if it has none. Providers added to it are visible to later requests,
    /// but values that were already created are not replaced.
    #[must_use]
    pub fn registry_for(&self, tier: Tier) -> Svc<Registry> {
        if let Some(primary) = self
            .chain(&tier)
            .and_then(|chain| chain.registries().first().cloned())
        {
            return primary;
        }

        let mut chains = self.inner.chains.write();
        let chain = chains.entry(tier.clone()).or_insert_with(|| {
            RegistryChain::new(tier.clone(), Vec::new())
        });
        if let Some(primary) = chain.registries().first() {
            return primary.clone();
        }

        let primary = Svc::new(Registry::new());
        *chain = RegistryChain::new(tier, vec![primary.clone()]);
        primary
    }

    /// Enters a new scope of the given tier in the current flow. The new scope
    /// becomes the innermost scope of the flow, and its parent is the scope
    /// that was innermost before.
    ///
    /// Scopes can only be entered from inside a flow, such as one started by
    /// [`flow`](crate::flow), [`Injector::fork`] or [`Injector::contextual`].
    pub fn enter_scope(&self, tier: Tier) -> InjectResult<ScopeHandle> {
        let scope = with_state(|state| {
            let scope =
                Scope::new(self.clone(), tier, state.innermost().cloned());
            state.stack.push(scope.clone());
            scope
        })
        .ok_or_else(|| InjectError::misuse(MisuseReason::NoFlow))?;

        debug!(tier = %scope.tier(), scope = scope.id(), "scope entered");
        Ok(ScopeHandle::new(scope))
    }

    /// Exits a scope entered by [`Injector::enter_scope`], running the release
    /// hooks of every value the scope owns, last created first.
    ///
    /// The scope must be the innermost scope entered by the current flow.
    /// Otherwise, a [`InjectError::ScopeMisuse`] is returned and the handle is
    /// dropped. A scope rejected that way stays active until every scope
    /// entered after it has exited, and is released right after them.
    ///
    /// If any hook fails, every other hook still runs and the failures are
    /// returned together.
    pub async fn exit_scope(&self, mut handle: ScopeHandle) -> InjectResult<()> {
        let scope = handle.scope().clone();
        let released = with_state(|state| {
            match state.stack.last().cloned() {
                Some(innermost) if innermost == scope => {
                    Ok(state.release(&scope))
                }
                Some(innermost) => Err(MisuseReason::OutOfOrder {
                    exiting: scope.label(),
                    innermost: innermost.label(),
                }),
                None => Err(MisuseReason::NotInFlow {
                    exiting: scope.label(),
                }),
            }
        })
        .unwrap_or(Err(MisuseReason::NoFlow))
        .map_err(InjectError::misuse)?;
        handle.mark_exited();

        let mut failures = Vec::new();
        for exited in &released {
            if let Some(teardown) = exited.close() {
                failures.extend(teardown.run().await);
                debug!(tier = %exited.tier(), scope = exited.id(), "scope exited");
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(InjectError::TeardownFailed {
                tier: (released.len() == 1).then(|| scope.tier().clone()),
                failures,
            })
        }
    }

    /// Runs a future inside a new scope of the given tier, exiting the scope
    /// once the future completes. A flow is started if the current task is
    /// not running in one yet.
    ///
    /// The scope is also released if the returned future is dropped before
    /// completing.
    pub async fn contextual<F: Future>(
        &self,
        tier: Tier,
        future: F,
    ) -> InjectResult<F::Output> {
        self.contextual_all([tier], future).await
    }

    /// Runs a future inside several nested scopes, entered in the given order
    /// and exited in reverse.
    pub async fn contextual_all<I, F>(
        &self,
        tiers: I,
        future: F,
    ) -> InjectResult<F::Output>
    where
        I: IntoIterator<Item = Tier>,
        F: Future,
    {
        let tiers: Vec<Tier> = tiers.into_iter().collect();
        ensure(async move {
            let mut handles = ScopeStack::default();
            for tier in tiers {
                handles.0.push(self.enter_scope(tier)?);
            }

            let output = future.await;

            let mut failures = Vec::new();
            let mut exit_error = None;
            while let Some(handle) = handles.0.pop() {
                match self.exit_scope(handle).await {
                    Ok(()) => {}
                    Err(InjectError::TeardownFailed {
                        failures: scope_failures,
                        ..
                    }) => failures.extend(scope_failures),
                    Err(error) => exit_error = exit_error.or(Some(error)),
                }
            }

            if let Some(error) = exit_error {
                return Err(error);
            }
            if !failures.is_empty() {
                return Err(InjectError::TeardownFailed {
                    tier: None,
                    failures,
                });
            }
            Ok(output)
        })
        .await
    }

    /// Runs a future as a new flow which starts out with the current flow's
    /// innermost scope. The forked flow may enter and exit its own scopes,
    /// which its parent never sees, but it cannot exit the scope it started
    /// with.
    pub fn fork<F: Future>(&self, future: F) -> impl Future<Output = F::Output> {
        fork(current_scope(), future)
    }

    /// Performs a request against the innermost scope of the current flow.
    /// There are several types of requests that can be made by default:
    ///
    /// - [`Svc<T>`](crate::Svc): Requests a service pointer to the given
    ///   service and creates an instance of it if needed.
    /// - `Option<Svc<T>>`: Like `Svc<T>`, but returns `Ok(None)` if no
    ///   provider is reachable from the current scope.
    /// - `InjectResult<Svc<T>>`: Like `Svc<T>`, but any failure is returned
    ///   inside the request's value instead.
    /// - [`Qualified<T, Q>`](crate::Qualified): Requests the provider
    ///   registered under a qualifier.
    /// - [`Injector`], [`Scope`] and [`RequestInfo`]: Requests a clone of the
    ///   injector, the scope being resolved against, or the request itself.
    /// - Tuples of up to 12 requests.
    ///
    /// Outside of any scope, only singletons and constants registered for
    /// [`Tier::ROOT`] can be requested.
    pub async fn get<R: Request>(&self) -> InjectResult<R> {
        self.get_with(RequestInfo::in_scope(current_scope())).await
    }

    /// Performs a request against a specific scope.
    pub async fn get_in<R: Request>(&self, scope: &Scope) -> InjectResult<R> {
        self.get_with(RequestInfo::in_scope(Some(scope.clone())))
            .await
    }

    /// Performs a request using custom request information.
    pub async fn get_with<R: Request>(
        &self,
        info: RequestInfo,
    ) -> InjectResult<R> {
        R::request(self, &info).await
    }

    /// Binds a callable to this injector. See [`inject`](crate::inject).
    pub fn inject<F>(&self, func: F) -> Injected<F> {
        Injected::new(func, Some(self.clone()))
    }

    /// Runs the release hooks of every singleton created so far, last created
    /// first. Singletons requested afterwards are not created again.
    pub async fn shutdown(&self) -> InjectResult<()> {
        let teardown = std::mem::take(&mut *self.inner.teardown.lock());
        info!(hooks = teardown.len(), "shutting down injector");
        let failures = teardown.run().await;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(InjectError::TeardownFailed {
                tier: None,
                failures,
            })
        }
    }

    pub(crate) fn push_teardown(&self, entry: TeardownEntry) {
        self.inner.teardown.lock().push(entry);
    }
}

impl Default for Injector {
    fn default() -> Self {
        Injector::builder().build()
    }
}

/// Handles entered by [`Injector::contextual_all`]. Dropping it releases any
/// scopes still held, innermost first.
#[derive(Default)]
struct ScopeStack(Vec<ScopeHandle>);

impl Drop for ScopeStack {
    fn drop(&mut self) {
        while let Some(handle) = self.0.pop() {
            drop(handle);
        }
    }
}
