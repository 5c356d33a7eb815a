use crate::{Injector, InjectorConfig, Provider, Registry, RegistryChain, Svc, Tier};
use std::collections::HashMap;

/// A builder for an [`Injector`].
///
/// Each tier gets a primary registry on first use. Further registries can be
/// appended to a tier's chain with [`InjectorBuilder::add_registry`], and are
/// only consulted for keys the registries before them do not provide.
#[derive(Default)]
pub struct InjectorBuilder {
    chains: HashMap<Tier, Vec<Svc<Registry>>>,
    config: InjectorConfig,
}

impl InjectorBuilder {
    fn chain_mut(&mut self, tier: Tier) -> &mut Vec<Svc<Registry>> {
        let chain = self.chains.entry(tier).or_default();
        if chain.is_empty() {
            chain.push(Svc::new(Registry::new()));
        }
        chain
    }

    /// Borrows the primary registry of a tier.
    #[allow(clippy::missing_panics_doc)]
    pub fn registry_for(&mut self, tier: Tier) -> &Registry {
        // Should never panic
        &self.chain_mut(tier)[0]
    }

    /// Assigns the provider for a service in the primary registry of a tier.
    /// Returns the provider it replaced, if any.
    pub fn provide<P: Into<Provider>>(
        &mut self,
        tier: Tier,
        provider: P,
    ) -> Option<Svc<Provider>> {
        self.registry_for(tier).provide(provider)
    }

    /// Appends a registry to the chain of a tier. It has lower priority than
    /// every registry added before it.
    pub fn add_registry(&mut self, tier: Tier, registry: Registry) {
        self.chain_mut(tier).push(Svc::new(registry));
    }

    /// Borrows the configuration the injector will be built with.
    #[must_use]
    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Mutably borrows the configuration the injector will be built with.
    #[must_use]
    pub fn config_mut(&mut self) -> &mut InjectorConfig {
        &mut self.config
    }

    /// Replaces the configuration the injector will be built with.
    pub fn with_config(&mut self, config: InjectorConfig) -> &mut Self {
        self.config = config;
        self
    }

    /// Builds the injector.
    #[must_use]
    pub fn build(self) -> Injector {
        let chains = self
            .chains
            .into_iter()
            .map(|(tier, registries)| {
                (tier.clone(), RegistryChain::new(tier, registries))
            })
            .collect();
        Injector::new_from_parts(chains, self.config)
    }
}

#[cfg(test)]
mod tests {
    use crate::{constant, Injector, Lifetime, Registry, ServiceKey, Tier};

    #[test]
    fn added_registries_have_lower_priority() {
        let fallback = Registry::new();
        fallback.provide(constant(1u8));
        fallback.provide(constant(1u16).with_lifetime(Lifetime::Transient));

        let mut builder = Injector::builder();
        builder.add_registry(Tier::REQUEST, fallback);
        builder.provide(Tier::REQUEST, constant(2u16));

        let injector = builder.build();
        let chain = injector.chain(&Tier::REQUEST).unwrap();
        assert_eq!(2, chain.registries().len());
        assert_eq!(
            Lifetime::Singleton,
            chain.find(&ServiceKey::of::<u16>()).unwrap().lifetime()
        );
        assert!(chain.find(&ServiceKey::of::<u8>()).is_some());
    }

    #[test]
    fn registries_accept_providers_after_build() {
        let injector = Injector::builder().build();
        assert!(injector.chain(&Tier::ROOT).is_none());

        injector.registry_for(Tier::ROOT).provide(constant(3i32));
        let chain = injector.chain(&Tier::ROOT).unwrap();
        assert!(chain.find(&ServiceKey::of::<i32>()).is_some());
    }
}
