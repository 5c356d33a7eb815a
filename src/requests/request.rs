use crate::{
    current_scope, DynSvc, InjectError, InjectResult, Injector, Qualified,
    Qualifier, RequestInfo, Requirement, Scope, Service, ServiceKey,
    Signature, Svc,
};
use futures_util::future::{BoxFuture, FutureExt};

/// A single value a request asks the injector for.
#[derive(Clone, PartialEq, Eq, Debug, Hash)]
pub struct Dependency {
    /// The key of the requested service.
    pub key: ServiceKey,

    /// Whether the request still succeeds when no provider is reachable.
    pub optional: bool,
}

impl Dependency {
    /// A dependency that must be satisfied.
    #[must_use]
    pub fn required(key: ServiceKey) -> Self {
        Dependency {
            key,
            optional: false,
        }
    }

    /// A dependency that falls back to nothing.
    #[must_use]
    pub fn optional(key: ServiceKey) -> Self {
        Dependency {
            key,
            optional: true,
        }
    }
}

/// A request to an injector.
///
/// # Grouping requests
///
/// Requests can be grouped together by using tuples to make multiple requests
/// at once. Since there is a limit of 12 supported parameters/dependencies for
/// factories, tuples can also be used to get around that limitation. The
/// members of a tuple are requested one after another, in order.
///
/// ```
/// use scoped_injector::{Injector, IntoProvider, Svc, Tier};
///
/// struct Bar;
/// struct Baz;
/// struct Foo(Svc<Bar>, Svc<Baz>);
///
/// impl Foo {
///     pub fn new((bar, baz): (Svc<Bar>, Svc<Baz>)) -> Self {
///         Foo(bar, baz)
///     }
/// }
///
/// let mut builder = Injector::builder();
/// builder.registry_for(Tier::ROOT).provide(Foo::new.singleton());
///
/// let _injector = builder.build();
/// ```
pub trait Request: Sized + Send + 'static {
    /// The services this request resolves through the injector. Requests
    /// which are satisfied by the injector itself have none.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    /// Performs the request to the injector.
    fn request(
        injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>>;
}

fn downcast<S: Service>(key: ServiceKey, service: DynSvc) -> InjectResult<Svc<S>> {
    service
        .downcast_arc::<S>()
        .map_err(|_| InjectError::InvalidProvider { key })
}

fn request_key<S: Service>(
    injector: &Injector,
    info: &RequestInfo,
    key: ServiceKey,
) -> BoxFuture<'static, InjectResult<Svc<S>>> {
    injector
        .resolve(key.clone(), info)
        .map(move |service| downcast(key, service?))
        .boxed()
}

fn request_optional<S: Service>(
    injector: &Injector,
    info: &RequestInfo,
    key: ServiceKey,
) -> BoxFuture<'static, InjectResult<Option<Svc<S>>>> {
    request_key::<S>(injector, info, key.clone())
        .map(move |result| match result {
            Ok(service) => Ok(Some(service)),
            Err(InjectError::NotRegistered {
                key: ref missing,
                required_by: None,
            })
            | Err(InjectError::NoActiveScope { key: ref missing })
                if *missing == key =>
            {
                Ok(None)
            }
            Err(error) => Err(error),
        })
        .boxed()
}

/// Requests the injector used to resolve services.
impl Request for Injector {
    fn request(
        injector: &Injector,
        _info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        futures_util::future::ok(injector.clone()).boxed()
    }
}

/// Requests the information about the current request.
impl Request for RequestInfo {
    fn request(
        _injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        futures_util::future::ok(info.clone()).boxed()
    }
}

/// Requests the scope the requesting service is being created in. Fails
/// with [`InjectError::NoActiveScope`] when resolving outside of any scope.
impl Request for Scope {
    fn request(
        _injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        let scope = info
            .scope()
            .cloned()
            .or_else(current_scope)
            .ok_or(InjectError::NoActiveScope {
                key: ServiceKey::of::<Scope>(),
            });
        futures_util::future::ready(scope).boxed()
    }
}

/// Requests a service pointer to a service.
impl<S: Service> Request for Svc<S> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::required(ServiceKey::of::<S>())]
    }

    fn request(
        injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        request_key(injector, info, ServiceKey::of::<S>())
    }
}

/// Tries to request a service pointer for a service. If no provider is
/// reachable from the current scope, then returns `None`. Failures of the
/// provider itself, or of its own dependencies, are still returned.
impl<S: Service> Request for Option<Svc<S>> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::optional(ServiceKey::of::<S>())]
    }

    fn request(
        injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        request_optional(injector, info, ServiceKey::of::<S>())
    }
}

/// Requests a service and hands any failure to the requester instead of
/// failing the whole request. The result is an error when no provider is
/// reachable, when the provider or one of its dependencies fails, or when
/// injection is refused altogether.
///
/// ```
/// use scoped_injector::{
///     InjectError, InjectResult, Injector, IntoFallible, IntoProvider, Svc,
///     Tier,
/// };
///
/// struct User;
///
/// fn load_user() -> Result<User, std::io::Error> {
///     Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such user"))
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let mut builder = Injector::builder();
///     builder.provide(Tier::REQUEST, load_user.fallible().scoped());
///     let injector = builder.build();
///
///     let user = injector
///         .contextual(Tier::REQUEST, injector.get::<InjectResult<Svc<User>>>())
///         .await
///         .unwrap()
///         .unwrap();
///     assert!(matches!(user, Err(InjectError::ActivationFailed { .. })));
/// }
/// ```
impl<S: Service> Request for InjectResult<Svc<S>> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::optional(ServiceKey::of::<S>())]
    }

    fn request(
        injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        request_key(injector, info, ServiceKey::of::<S>())
            .map(Ok)
            .boxed()
    }
}

/// Requests a service registered under the qualifier `Q`.
impl<S: Service, Q: Qualifier> Request for Qualified<S, Q> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::required(Qualified::<S, Q>::key())]
    }

    fn request(
        injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        request_key(injector, info, Qualified::<S, Q>::key())
            .map(|service| service.map(Qualified::new))
            .boxed()
    }
}

/// Tries to request a qualified service, returning `None` if no provider
/// with that qualifier is reachable.
impl<S: Service, Q: Qualifier> Request for Option<Qualified<S, Q>> {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::optional(Qualified::<S, Q>::key())]
    }

    fn request(
        injector: &Injector,
        info: &RequestInfo,
    ) -> BoxFuture<'static, InjectResult<Self>> {
        request_optional(injector, info, Qualified::<S, Q>::key())
            .map(|service| service.map(|service| service.map(Qualified::new)))
            .boxed()
    }
}

macro_rules! impl_tuple_request {
    () => {
        impl_tuple_request!(@impl ());
    };
    ($first:ident $(, $rest:ident)*) => {
        impl_tuple_request!(@impl ($first $(, $rest)*));
        impl_tuple_request!($($rest),*);
    };
    (@impl ($($type_name:ident),*)) => {
        /// Performs multiple requests at once. This is useful for grouping
        /// together related requests.
        impl <$($type_name),*> Request for ($($type_name,)*)
        where
            $($type_name: Request,)*
        {
            #[allow(unused_mut)]
            fn dependencies() -> Vec<Dependency> {
                let mut dependencies = Vec::new();
                $(dependencies.extend(<$type_name as Request>::dependencies());)*
                dependencies
            }

            #[allow(unused_variables, clippy::unused_unit)]
            fn request(
                injector: &Injector,
                info: &RequestInfo,
            ) -> BoxFuture<'static, InjectResult<Self>> {
                let injector = injector.clone();
                let info = info.clone();
                async move {
                    let result = ($(
                        <$type_name as Request>::request(&injector, &info).await?,
                    )*);
                    Ok(result)
                }
                .boxed()
            }
        }

        /// Each member of the tuple is one parameter of a factory.
        impl <$($type_name),*> Signature for ($($type_name,)*)
        where
            $($type_name: Request,)*
        {
            #[allow(unused_mut, unused_assignments, unused_variables)]
            fn signature() -> Vec<Requirement> {
                let mut requirements = Vec::new();
                let mut position = 0;
                $(
                    requirements.extend(
                        <$type_name as Request>::dependencies()
                            .into_iter()
                            .map(|dependency| Requirement::new(position, dependency)),
                    );
                    position += 1;
                )*
                requirements
            }
        }
    };
}

impl_tuple_request!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
