use crate::{
    AsyncServiceFactory, Request, Service, ServiceFactory, Signature,
    TypedProvider,
};
use derive_more::Display;

/// How long a provided value lives, and therefore how often its factory runs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Display)]
pub enum Lifetime {
    /// One value per activation of a scope of the provider's tier, shared by
    /// every request made while that activation is active.
    #[display(fmt = "scoped")]
    Scoped,

    /// A new value for every request.
    #[display(fmt = "transient")]
    Transient,

    /// One value for the whole process, created on first use and released
    /// when the injector shuts down.
    #[display(fmt = "singleton")]
    Singleton,
}

/// Defines a conversion into a provider. This trait is automatically
/// implemented for all service factories.
///
/// ```
/// use scoped_injector::{Injector, IntoProvider, Tier};
///
/// #[derive(Default)]
/// struct Foo;
///
/// let mut builder = Injector::builder();
/// builder.registry_for(Tier::ROOT).provide(Foo::default.singleton());
/// builder.registry_for(Tier::REQUEST).provide(Foo::default.scoped());
/// ```
pub trait IntoProvider<D, R, F>
where
    R: Service,
    F: ServiceFactory<D, Result = R>,
{
    /// Creates a provider which caches one value per scope activation.
    #[must_use]
    fn scoped(self) -> TypedProvider<R>;

    /// Creates a provider which creates a new value for every request.
    #[must_use]
    fn transient(self) -> TypedProvider<R>;

    /// Creates a provider which creates its value once for the process.
    #[must_use]
    fn singleton(self) -> TypedProvider<R>;
}

impl<D, R, F> IntoProvider<D, R, F> for F
where
    D: Request + Signature,
    R: Service,
    F: ServiceFactory<D, Result = R>,
{
    fn scoped(self) -> TypedProvider<R> {
        TypedProvider::from_factory(self, Lifetime::Scoped)
    }

    fn transient(self) -> TypedProvider<R> {
        TypedProvider::from_factory(self, Lifetime::Transient)
    }

    fn singleton(self) -> TypedProvider<R> {
        TypedProvider::from_factory(self, Lifetime::Singleton)
    }
}

/// Defines a conversion from an async factory into a provider.
///
/// ```
/// use scoped_injector::{Injector, IntoAsyncProvider, Tier};
///
/// struct Connection;
///
/// async fn connect() -> Connection {
///     Connection
/// }
///
/// let mut builder = Injector::builder();
/// builder.registry_for(Tier::REQUEST).provide(connect.scoped_async());
/// ```
pub trait IntoAsyncProvider<D, R, F>
where
    R: Service,
    F: AsyncServiceFactory<D, Result = R>,
{
    /// Creates a provider which caches one value per scope activation.
    #[must_use]
    fn scoped_async(self) -> TypedProvider<R>;

    /// Creates a provider which creates a new value for every request.
    #[must_use]
    fn transient_async(self) -> TypedProvider<R>;

    /// Creates a provider which creates its value once for the process.
    #[must_use]
    fn singleton_async(self) -> TypedProvider<R>;
}

impl<D, R, F> IntoAsyncProvider<D, R, F> for F
where
    D: Request + Signature,
    R: Service,
    F: AsyncServiceFactory<D, Result = R>,
{
    fn scoped_async(self) -> TypedProvider<R> {
        TypedProvider::from_async_factory(self, Lifetime::Scoped)
    }

    fn transient_async(self) -> TypedProvider<R> {
        TypedProvider::from_async_factory(self, Lifetime::Transient)
    }

    fn singleton_async(self) -> TypedProvider<R> {
        TypedProvider::from_async_factory(self, Lifetime::Singleton)
    }
}
