use crate::{
    DynSvc, InjectError, InjectResult, Injector, Lifetime, Provider,
    RequestInfo, Scope, ServiceKey, Svc, TeardownEntry, Tier,
};
use futures_util::future::{BoxFuture, FutureExt};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Where the release hook of a newly created value is recorded.
enum Owner {
    Scope(Scope),
    Injector,
}

impl Injector {
    /// Resolves a key against the scope of the request.
    ///
    /// The provider comes from the innermost scope whose tier's registry
    /// chain has one, so a more specific tier shadows the tiers around it.
    /// Scoped values are cached in that scope and their dependencies are
    /// resolved from it. Singletons are cached in their provider. Transients
    /// are created fresh and released with the scope they were requested
    /// from.
    ///
    /// Requests arriving while a value is being created wait for that
    /// creation and share its outcome. Failed creations are not cached: the
    /// next request tries again.
    pub(crate) fn resolve(
        &self,
        key: ServiceKey,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<DynSvc>> {
        let injector = self.clone();
        let info = info.clone();
        async move {
            if !injector.config().enabled {
                return Err(InjectError::Disabled);
            }

            let info = info.with_request(&key)?;
            let (provider, owner) = injector.find_provider(&key, info.scope())?;
            trace!(
                key = %key,
                lifetime = %provider.lifetime(),
                owner = ?owner.as_ref().map(Scope::id),
                "provider found"
            );

            match provider.lifetime() {
                Lifetime::Singleton => {
                    injector.resolve_singleton(key, provider, owner, info).await
                }
                Lifetime::Scoped => {
                    let owner = owner.ok_or_else(|| InjectError::NoActiveScope {
                        key: key.clone(),
                    })?;
                    injector.resolve_scoped(key, provider, owner, info).await
                }
                Lifetime::Transient => {
                    let scope = info.scope().cloned().ok_or_else(|| {
                        InjectError::NoActiveScope { key: key.clone() }
                    })?;
                    injector
                        .activate(&key, &provider, info, Owner::Scope(scope))
                        .await
                }
            }
        }
        .boxed()
    }

    /// Finds the provider for a key, and the scope which owns values created
    /// by it. Each scope is searched for providers added to it directly, then
    /// its tier's chain. Root singletons and constants stay reachable when no
    /// root scope is active.
    fn find_provider(
        &self,
        key: &ServiceKey,
        scope: Option<&Scope>,
    ) -> InjectResult<(Svc<Provider>, Option<Scope>)> {
        for candidate in scope.into_iter().flat_map(Scope::ancestors) {
            let found = candidate.local_provider(key).or_else(|| {
                self.chain(candidate.tier())
                    .and_then(|chain| chain.find(key))
            });
            if let Some(provider) = found {
                candidate.ensure_open()?;
                return Ok((provider, Some(candidate.clone())));
            }
        }

        match self.chain(&Tier::ROOT).and_then(|chain| chain.find(key)) {
            Some(provider) if provider.lifetime() == Lifetime::Singleton => {
                Ok((provider, None))
            }
            _ if scope.is_none() => {
                Err(InjectError::NoActiveScope { key: key.clone() })
            }
            _ => Err(InjectError::NotRegistered {
                key: key.clone(),
                required_by: None,
            }),
        }
    }

    async fn resolve_singleton(
        &self,
        key: ServiceKey,
        provider: Svc<Provider>,
        owner: Option<Scope>,
        info: RequestInfo,
    ) -> InjectResult<DynSvc> {
        if let Some(service) = provider.instance().get() {
            return Ok(service);
        }

        self.check_acyclic(&key, owner.as_ref())?;
        let injector = self.clone();
        let creator = provider.clone();
        provider
            .instance()
            .get_or_try_init(move || {
                async move {
                    let info = info.with_scope(owner);
                    injector
                        .activate(&key, &creator, info, Owner::Injector)
                        .await
                }
                .boxed()
            })
            .await
    }

    async fn resolve_scoped(
        &self,
        key: ServiceKey,
        provider: Svc<Provider>,
        owner: Scope,
        info: RequestInfo,
    ) -> InjectResult<DynSvc> {
        let slot = owner.slot(&key)?;
        if let Some(service) = slot.get() {
            return Ok(service);
        }

        self.check_acyclic(&key, Some(&owner))?;
        let injector = self.clone();
        slot.get_or_try_init(move || {
            async move {
                let info = info.with_scope(Some(owner.clone()));
                injector
                    .activate(&key, &provider, info, Owner::Scope(owner))
                    .await
            }
            .boxed()
        })
        .await
    }

    /// Runs the provider's factory and records the release hook of the new
    /// value with its owner.
    async fn activate(
        &self,
        key: &ServiceKey,
        provider: &Provider,
        info: RequestInfo,
        owner: Owner,
    ) -> InjectResult<DynSvc> {
        debug!(key = %key, lifetime = %provider.lifetime(), "activating service");
        let service = provider
            .create(self.clone(), info)
            .await
            .map_err(|error| error.required_by(key))?;

        if let Some(hook) = provider.teardown() {
            let entry = TeardownEntry {
                key: key.clone(),
                service: service.clone(),
                hook: hook.clone(),
            };
            match owner {
                Owner::Scope(scope) => scope.push_teardown(entry)?,
                Owner::Injector => self.push_teardown(entry),
            }
        }

        Ok(service)
    }

    /// Walks the declared requirements of a key before anything is created,
    /// so a cycle is reported instead of waiting on a value that is still
    /// being created further up the chain. Keys that cannot be resolved are
    /// skipped here and reported by the resolution itself.
    fn check_acyclic(
        &self,
        key: &ServiceKey,
        scope: Option<&Scope>,
    ) -> InjectResult<()> {
        let mut path = Vec::new();
        let mut explored = HashSet::new();
        self.visit(key, scope, &mut path, &mut explored)
    }

    fn visit(
        &self,
        key: &ServiceKey,
        scope: Option<&Scope>,
        path: &mut Vec<ServiceKey>,
        explored: &mut HashSet<ServiceKey>,
    ) -> InjectResult<()> {
        if let Some(start) = path.iter().position(|visited| visited == key) {
            let mut cycle = path[start..].to_vec();
            cycle.push(key.clone());
            return Err(InjectError::CyclicDependency {
                key: key.clone(),
                cycle,
            });
        }
        if explored.contains(key) {
            return Ok(());
        }

        let Ok((provider, owner)) = self.find_provider(key, scope) else {
            return Ok(());
        };
        let next = match provider.lifetime() {
            Lifetime::Transient => scope.cloned(),
            Lifetime::Scoped | Lifetime::Singleton => owner,
        };

        path.push(key.clone());
        for requirement in provider.requirements() {
            self.visit(&requirement.key, next.as_ref(), path, explored)?;
        }
        path.pop();
        explored.insert(key.clone());
        Ok(())
    }
}
