use crate::{
    AsyncServiceFactory, DynSvc, InjectError, InjectResult, Injector,
    Lifetime, Request, RequestInfo, Requirement, Service, ServiceFactory,
    ServiceKey, Signature, Slot, Svc, Teardown, TeardownOutput,
};
use futures_util::future::{BoxFuture, FutureExt};
use std::{
    borrow::Cow,
    fmt::{Debug, Formatter},
    future::Future,
    marker::PhantomData,
};

type FactoryFn = dyn Fn(Injector, RequestInfo) -> BoxFuture<'static, InjectResult<DynSvc>>
    + Send
    + Sync;

/// A provider for values of type `R`, before it is added to a registry.
///
/// Typed providers are created from service factories through
/// [`IntoProvider`](crate::IntoProvider),
/// [`IntoAsyncProvider`](crate::IntoAsyncProvider) or [`constant`](crate::constant),
/// and can then be decorated with a qualifier or a release hook.
///
/// ```
/// use scoped_injector::{Injector, IntoProvider, Svc, Tier};
///
/// #[derive(Default)]
/// struct Pool;
///
/// let provider = Pool::default
///     .singleton()
///     .qualified("replica")
///     .with_teardown(|_pool: Svc<Pool>| println!("pool closed"));
///
/// let mut builder = Injector::builder();
/// builder.registry_for(Tier::ROOT).provide(provider);
/// ```
pub struct TypedProvider<R: Service> {
    key: ServiceKey,
    lifetime: Lifetime,
    requirements: Vec<Requirement>,
    factory: Box<FactoryFn>,
    teardown: Option<Teardown>,
    marker: PhantomData<fn() -> R>,
}

impl<R: Service> TypedProvider<R> {
    /// Creates a provider from a synchronous service factory.
    pub fn from_factory<D, F>(factory: F, lifetime: Lifetime) -> Self
    where
        D: Request + Signature,
        F: ServiceFactory<D, Result = R>,
    {
        let factory = Svc::new(factory);
        Self::from_parts(
            lifetime,
            D::signature(),
            Box::new(move |injector: Injector, info: RequestInfo| {
                let factory = factory.clone();
                async move {
                    let dependencies = D::request(&injector, &info).await?;
                    let service = factory.invoke(dependencies)?;
                    Ok::<DynSvc, InjectError>(Svc::new(service))
                }
                .boxed()
            }),
        )
    }

    /// Creates a provider from a service factory whose production suspends.
    pub fn from_async_factory<D, F>(factory: F, lifetime: Lifetime) -> Self
    where
        D: Request + Signature,
        F: AsyncServiceFactory<D, Result = R>,
    {
        let factory = Svc::new(factory);
        Self::from_parts(
            lifetime,
            D::signature(),
            Box::new(move |injector: Injector, info: RequestInfo| {
                let factory = factory.clone();
                async move {
                    let dependencies = D::request(&injector, &info).await?;
                    let service = factory.invoke(dependencies).await?;
                    Ok::<DynSvc, InjectError>(Svc::new(service))
                }
                .boxed()
            }),
        )
    }

    pub(crate) fn from_value(value: R, lifetime: Lifetime) -> Self {
        let value: DynSvc = Svc::new(value);
        Self::from_parts(
            lifetime,
            Vec::new(),
            Box::new(move |_: Injector, _: RequestInfo| {
                futures_util::future::ok::<_, InjectError>(value.clone()).boxed()
            }),
        )
    }

    fn from_parts(
        lifetime: Lifetime,
        requirements: Vec<Requirement>,
        factory: Box<FactoryFn>,
    ) -> Self {
        TypedProvider {
            key: ServiceKey::of::<R>(),
            lifetime,
            requirements,
            factory,
            teardown: None,
            marker: PhantomData,
        }
    }

    /// Registers this provider under a qualifier, so it only satisfies
    /// requests for [`Qualified`](crate::Qualified) values with the same
    /// label.
    #[must_use]
    pub fn qualified(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.key = self.key.with_qualifier(label);
        self
    }

    /// Overrides the lifetime of this provider.
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Attaches a release hook which runs when the owning scope exits. For
    /// singletons, the hook runs during [`Injector::shutdown`].
    #[must_use]
    pub fn with_teardown<F, O>(mut self, hook: F) -> Self
    where
        F: Fn(Svc<R>) -> O + Send + Sync + 'static,
        O: TeardownOutput,
    {
        self.teardown = Some(Teardown::blocking(hook));
        self
    }

    /// Attaches a release hook which may suspend, such as closing a
    /// connection gracefully.
    #[must_use]
    pub fn with_async_teardown<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Svc<R>) -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: TeardownOutput,
    {
        self.teardown = Some(Teardown::suspending(hook));
        self
    }

    /// The key this provider will be registered under.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }
}

/// A type-erased provider stored in a [`Registry`](crate::Registry).
pub struct Provider {
    key: ServiceKey,
    lifetime: Lifetime,
    requirements: Vec<Requirement>,
    factory: Box<FactoryFn>,
    teardown: Option<Teardown>,
    instance: Slot,
}

impl Provider {
    /// The key this provider satisfies.
    #[must_use]
    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    /// The lifetime of values created by this provider.
    #[must_use]
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// The parameters the factory asks for, in declaration order.
    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Whether values from this provider have a release hook.
    #[must_use]
    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    pub(crate) fn create(
        &self,
        injector: Injector,
        info: RequestInfo,
    ) -> BoxFuture<'static, InjectResult<DynSvc>> {
        (self.factory)(injector, info)
    }

    pub(crate) fn teardown(&self) -> Option<&Teardown> {
        self.teardown.as_ref()
    }

    /// The process-wide value of a singleton provider.
    pub(crate) fn instance(&self) -> &Slot {
        &self.instance
    }

    /// Narrows a singleton to one value per activation, for providers that
    /// are added to a single scope.
    pub(crate) fn into_local(mut self) -> Self {
        if self.lifetime == Lifetime::Singleton {
            self.lifetime = Lifetime::Scoped;
        }
        self
    }
}

impl<R: Service> From<TypedProvider<R>> for Provider {
    fn from(provider: TypedProvider<R>) -> Self {
        Provider {
            key: provider.key,
            lifetime: provider.lifetime,
            requirements: provider.requirements,
            factory: provider.factory,
            teardown: provider.teardown,
            instance: Slot::default(),
        }
    }
}

impl Debug for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("requirements", &self.requirements)
            .field("has_teardown", &self.teardown.is_some())
            .finish_non_exhaustive()
    }
}
