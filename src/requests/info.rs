use crate::{InjectError, InjectResult, Scope, ServiceKey};

/// Information about an active request.
///
/// Each request carries the chain of services currently being created on its
/// behalf, and the scope those services are created in. The chain is used to
/// detect cycles: a key may appear at most once.
#[derive(Clone, Debug, Default)]
pub struct RequestInfo {
    service_path: Vec<ServiceKey>,
    scope: Option<Scope>,
}

impl RequestInfo {
    /// Creates a new, empty instance of [`RequestInfo`] outside of any scope.
    #[must_use]
    pub fn new() -> Self {
        RequestInfo::default()
    }

    /// Creates a new, empty instance of [`RequestInfo`] resolving against the
    /// given scope.
    #[must_use]
    pub fn in_scope(scope: Option<Scope>) -> Self {
        RequestInfo {
            service_path: Vec::new(),
            scope,
        }
    }

    /// Gets the current request path. This can be used to configure a service
    /// based on what it's being injected into.
    ///
    /// # Example
    ///
    /// ```
    /// use scoped_injector::{
    ///     Injector, IntoProvider, RequestInfo, ServiceKey, Svc, Tier,
    /// };
    ///
    /// struct Foo(pub Svc<Baz>);
    /// struct Bar(pub Svc<Baz>);
    /// struct Baz(pub i32);
    ///
    /// #[tokio::main(flavor = "current_thread")]
    /// async fn main() {
    ///     let mut builder = Injector::builder();
    ///     let registry = builder.registry_for(Tier::ROOT);
    ///     registry.provide(Foo.transient());
    ///     registry.provide(Bar.transient());
    ///     registry.provide(
    ///         (|info: RequestInfo| {
    ///             let path = info.service_path();
    ///             if path.first() == Some(&ServiceKey::of::<Foo>()) {
    ///                 Baz(1)
    ///             } else {
    ///                 Baz(0)
    ///             }
    ///         })
    ///         .transient(),
    ///     );
    ///
    ///     let injector = builder.build();
    ///     let (foo, bar) = injector
    ///         .contextual(Tier::ROOT, async {
    ///             injector.get::<(Svc<Foo>, Svc<Bar>)>().await
    ///         })
    ///         .await
    ///         .unwrap()
    ///         .unwrap();
    ///     assert_eq!(1, foo.0.0);
    ///     assert_eq!(0, bar.0.0);
    /// }
    /// ```
    #[must_use]
    pub fn service_path(&self) -> &[ServiceKey] {
        &self.service_path
    }

    /// The scope values are resolved against, if any.
    #[must_use]
    pub fn scope(&self) -> Option<&Scope> {
        self.scope.as_ref()
    }

    /// Creates a new child instance of [`RequestInfo`] with the given service
    /// appended to the end of the request path. Fails if the service is
    /// already being created further up the path.
    pub(crate) fn with_request(&self, key: &ServiceKey) -> InjectResult<Self> {
        if let Some(start) = self.service_path.iter().position(|k| k == key) {
            let mut cycle = self.service_path[start..].to_vec();
            cycle.push(key.clone());
            return Err(InjectError::CyclicDependency {
                key: key.clone(),
                cycle,
            });
        }

        let mut child = self.clone();
        child.service_path.push(key.clone());
        Ok(child)
    }

    /// Moves the request to another scope, keeping its path.
    #[must_use]
    pub(crate) fn with_scope(mut self, scope: Option<Scope>) -> Self {
        self.scope = scope;
        self
    }
}
