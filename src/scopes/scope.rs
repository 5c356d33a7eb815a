use crate::{
    constant, InjectError, InjectResult, Injector, MisuseReason, Provider,
    Service, ServiceKey, Slot, Svc, TeardownEntry, TeardownList, Tier,
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fmt::{Debug, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};
use tracing::{debug, warn};

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

/// One activation of a tier. Scoped values created while it is active are
/// cached here and released, last created first, when it exits.
///
/// Cloning a [`Scope`] creates another reference to the same activation.
#[derive(Clone)]
pub struct Scope {
    inner: Svc<ScopeInner>,
}

struct ScopeInner {
    id: u64,
    tier: Tier,
    injector: Injector,
    parent: Option<Scope>,
    state: Mutex<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    closed: bool,
    cache: HashMap<ServiceKey, Svc<Slot>>,
    local: HashMap<ServiceKey, Svc<Provider>>,
    teardown: TeardownList,
}

impl Scope {
    pub(crate) fn new(
        injector: Injector,
        tier: Tier,
        parent: Option<Scope>,
    ) -> Self {
        Scope {
            inner: Svc::new(ScopeInner {
                id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
                tier,
                injector,
                parent,
                state: Mutex::default(),
            }),
        }
    }

    /// A process-unique number identifying this activation.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The tier this scope is an activation of.
    #[must_use]
    pub fn tier(&self) -> &Tier {
        &self.inner.tier
    }

    /// The scope that was innermost when this one was entered.
    #[must_use]
    pub fn parent(&self) -> Option<&Scope> {
        self.inner.parent.as_ref()
    }

    /// The injector this scope belongs to.
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.inner.injector
    }

    /// This scope followed by each of its parents, innermost first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Scope> {
        std::iter::successors(Some(self), |scope| scope.parent())
    }

    /// Whether this scope has exited.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Whether a value for the key has been created in this scope.
    #[must_use]
    pub fn is_cached(&self, key: &ServiceKey) -> bool {
        self.inner
            .state
            .lock()
            .cache
            .get(key)
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Adds a provider which is only visible from this activation and the
    /// scopes entered inside it. It shadows the registries of every tier for
    /// those scopes, and is dropped when this scope exits.
    ///
    /// Singleton providers added this way create one value per activation.
    /// Values that were already created from another provider are not
    /// replaced.
    ///
    /// ```
    /// use scoped_injector::{Injector, Svc, Tier};
    ///
    /// struct Request(&'static str);
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() {
    ///     let injector = Injector::default();
    ///     scoped_injector::flow(async {
    ///         let handle = injector.enter_scope(Tier::REQUEST).unwrap();
    ///         handle.scope().add_value(Request("/users")).unwrap();
    ///
    ///         let request: Svc<Request> = injector.get().await.unwrap();
    ///         assert_eq!("/users", request.0);
    ///         injector.exit_scope(handle).await.unwrap();
    ///     })
    ///     .await;
    /// }
    /// ```
    pub fn provide(&self, provider: impl Into<Provider>) -> InjectResult<()> {
        let provider: Provider = provider.into();
        let provider = provider.into_local();
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }

        debug!(
            key = %provider.key(),
            tier = %self.tier(),
            scope = self.id(),
            "provider added to scope"
        );
        state.local.insert(provider.key().clone(), Svc::new(provider));
        Ok(())
    }

    /// Adds a value which is only visible from this activation and the scopes
    /// entered inside it, such as the inbound request a framework adapter
    /// opened the scope for. Use [`Scope::provide`] with a
    /// [`constant`](crate::constant) to attach a release hook.
    pub fn add_value<R: Service>(&self, value: R) -> InjectResult<()> {
        self.provide(constant(value))
    }

    pub(crate) fn local_provider(&self, key: &ServiceKey) -> Option<Svc<Provider>> {
        self.inner.state.lock().local.get(key).cloned()
    }

    pub(crate) fn label(&self) -> (Tier, u64) {
        (self.inner.tier.clone(), self.inner.id)
    }

    fn closed_error(&self) -> InjectError {
        InjectError::misuse(MisuseReason::ScopeClosed {
            scope: self.label(),
        })
    }

    pub(crate) fn ensure_open(&self) -> InjectResult<()> {
        if self.is_closed() {
            Err(self.closed_error())
        } else {
            Ok(())
        }
    }

    /// The cache slot for a scoped value. Concurrent requests for the same
    /// key share one slot, so the value is created at most once.
    pub(crate) fn slot(
        &self,
        key: &ServiceKey,
    ) -> InjectResult<Svc<Slot>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(self.closed_error());
        }

        Ok(state.cache.entry(key.clone()).or_default().clone())
    }

    /// Records a release hook. If the scope exited while the value was being
    /// created, the hook runs right away and the request fails.
    pub(crate) fn push_teardown(&self, entry: TeardownEntry) -> InjectResult<()> {
        let mut state = self.inner.state.lock();
        if state.closed {
            drop(state);
            warn!(
                key = %entry.key,
                tier = %self.tier(),
                scope = self.id(),
                "value finished after its scope exited, releasing it now"
            );
            let mut orphan = TeardownList::default();
            orphan.push(entry);
            orphan.run_detached();
            return Err(self.closed_error());
        }

        state.teardown.push(entry);
        Ok(())
    }

    /// Marks this scope exited and hands back its release hooks. Cached
    /// values are dropped. Returns `None` if the scope was already closed.
    pub(crate) fn close(&self) -> Option<TeardownList> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return None;
        }

        state.closed = true;
        state.cache.clear();
        state.local.clear();
        let teardown = std::mem::take(&mut state.teardown);
        debug!(
            tier = %self.tier(),
            scope = self.id(),
            hooks = teardown.len(),
            "scope closed"
        );
        Some(teardown)
    }
}

impl PartialEq for Scope {
    fn eq(&self, other: &Self) -> bool {
        Svc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Scope {}

impl Debug for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("tier", &self.inner.tier)
            .field("parent", &self.parent().map(Scope::id))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_start_with_self() {
        let injector = Injector::default();
        let root = Scope::new(injector.clone(), Tier::ROOT, None);
        let request = Scope::new(injector, Tier::REQUEST, Some(root.clone()));

        let tiers: Vec<_> = request.ancestors().map(Scope::tier).collect();
        assert_eq!(vec![&Tier::REQUEST, &Tier::ROOT], tiers);
        assert_ne!(root.id(), request.id());
    }

    #[test]
    fn closed_scope_rejects_new_slots() {
        let scope = Scope::new(Injector::default(), Tier::ROOT, None);
        let key = ServiceKey::of::<u8>();
        assert!(scope.slot(&key).is_ok());
        assert!(scope.close().is_some());
        assert!(scope.close().is_none());
        assert!(matches!(
            scope.slot(&key),
            Err(InjectError::ScopeMisuse {
                reason: MisuseReason::ScopeClosed { .. }
            })
        ));
    }
}
