use crate::{InjectError, InjectResult, Provider, ServiceKey, Svc, Tier};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
};
use tracing::debug;

/// A mutable collection of providers, keyed by the service they produce.
///
/// Registries use interior mutability so providers can still be added after
/// the injector has been built. Adding a provider for a key that is already
/// registered replaces the earlier provider.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<HashMap<ServiceKey, Svc<Provider>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Registry::default()
    }

    /// Assigns the provider for a service key, returning the provider it
    /// replaced, if any.
    pub fn provide<P: Into<Provider>>(
        &self,
        provider: P,
    ) -> Option<Svc<Provider>> {
        self.add_provider(provider.into())
    }

    /// Adds an already type-erased provider.
    pub fn add_provider(&self, provider: Provider) -> Option<Svc<Provider>> {
        let key = provider.key().clone();
        debug!(key = %key, lifetime = %provider.lifetime(), "provider registered");
        self.providers.write().insert(key, Svc::new(provider))
    }

    /// Removes the provider for a key.
    pub fn remove(&self, key: &ServiceKey) -> Option<Svc<Provider>> {
        self.providers.write().remove(key)
    }

    /// Gets the provider for a key.
    #[must_use]
    pub fn get(&self, key: &ServiceKey) -> Option<Svc<Provider>> {
        self.providers.read().get(key).cloned()
    }

    /// Whether a provider is registered for a key.
    #[must_use]
    pub fn contains(&self, key: &ServiceKey) -> bool {
        self.providers.read().contains_key(key)
    }

    /// The number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// Whether no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let providers = self.providers.read();
        f.debug_map()
            .entries(
                providers
                    .iter()
                    .map(|(key, provider)| (key.to_string(), provider.lifetime())),
            )
            .finish()
    }
}

/// The ordered registries consulted for one tier. Earlier registries take
/// precedence: the first registry with a provider for a key wins.
#[derive(Clone, Debug)]
pub struct RegistryChain {
    tier: Tier,
    registries: Svc<[Svc<Registry>]>,
}

impl RegistryChain {
    /// Creates a chain from registries in priority order.
    #[must_use]
    pub fn new(tier: Tier, registries: Vec<Svc<Registry>>) -> Self {
        RegistryChain {
            tier,
            registries: registries.into(),
        }
    }

    /// The tier this chain serves.
    #[must_use]
    pub fn tier(&self) -> &Tier {
        &self.tier
    }

    /// The registries of this chain, highest priority first.
    #[must_use]
    pub fn registries(&self) -> &[Svc<Registry>] {
        &self.registries
    }

    /// Finds the provider for a key in the first registry that has one.
    #[must_use]
    pub fn find(&self, key: &ServiceKey) -> Option<Svc<Provider>> {
        self.registries.iter().find_map(|registry| registry.get(key))
    }

    /// Like [`find`](RegistryChain::find), but fails with
    /// [`InjectError::NotRegistered`] when no registry has a provider.
    pub fn lookup(&self, key: &ServiceKey) -> InjectResult<Svc<Provider>> {
        self.find(key).ok_or_else(|| InjectError::NotRegistered {
            key: key.clone(),
            required_by: None,
        })
    }
}

/// Defines a new registry using a domain specific language.
///
/// ## Example
///
/// ```
/// use scoped_injector::{
///     constant, define_registry, Injector, IntoProvider, Svc, Tier,
/// };
///
/// #[derive(Default)]
/// struct Foo;
/// struct Bar(Svc<Foo>);
/// #[cfg(test)]
/// struct Quux;
///
/// let registry = define_registry! {
///     services = [
///         Foo::default.scoped(),
///         Bar.transient(),
///     ],
///     qualified = {
///         "answer" = [constant(42i32)],
///     },
///
///     // Definitions are merged together, so providers can be registered
///     // only in certain environments.
///     #[cfg(test)]
///     services = [
///         (|| Quux).scoped(),
///     ],
/// };
///
/// let mut builder = Injector::builder();
/// builder.add_registry(Tier::REQUEST, registry);
/// let _injector = builder.build();
/// ```
#[macro_export]
macro_rules! define_registry {
    {
        $(
            $(#[$($attr:meta),*])*
            $key:ident = $value:tt
        ),*
        $(,)?
    } => {
        {
            let registry = $crate::Registry::new();
            $(
                $(#[$($attr),*])*
                $crate::define_registry!(@provide &registry, $key = $value);
            )*
            registry
        }
    };
    (
        @provide $registry:expr,
        services = [
            $($service:expr),*
            $(,)?
        ]
    ) => {
        $(drop($registry.provide($service));)*
    };
    (
        @provide $registry:expr,
        qualified = {
            $($label:literal = [
                $($service:expr),*
                $(,)?
            ]),*
            $(,)?
        }
    ) => {
        $(
            $(drop($registry.provide($crate::TypedProvider::qualified($service, $label)));)*
        )*
    };
}
