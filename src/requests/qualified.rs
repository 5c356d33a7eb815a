use crate::{Service, ServiceKey, Svc};
use std::{
    fmt::{Debug, Formatter},
    marker::PhantomData,
    ops::Deref,
};

/// A label that distinguishes several providers of the same service type.
/// Usually declared with the [`qualifier!`](crate::qualifier) macro.
pub trait Qualifier: Send + Sync + 'static {
    /// The label providers are registered under.
    const LABEL: &'static str;
}

/// Declares marker types implementing [`Qualifier`].
///
/// ```
/// use scoped_injector::{qualifier, Qualifier};
///
/// qualifier! {
///     /// The primary database.
///     pub Primary = "primary";
///     Replica = "replica";
/// }
///
/// assert_eq!("primary", Primary::LABEL);
/// assert_eq!("replica", Replica::LABEL);
/// ```
#[macro_export]
macro_rules! qualifier {
    ($($(#[$attr:meta])* $vis:vis $name:ident = $label:literal;)*) => {
        $(
            $(#[$attr])*
            #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
            $vis struct $name;

            impl $crate::Qualifier for $name {
                const LABEL: &'static str = $label;
            }
        )*
    };
}

/// A service requested under a qualifier.
///
/// ```
/// use scoped_injector::{
///     constant, qualifier, Injector, Qualified, Svc, Tier,
/// };
///
/// qualifier! {
///     Left = "left";
///     Right = "right";
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let mut builder = Injector::builder();
///     let registry = builder.registry_for(Tier::ROOT);
///     registry.provide(constant(1i32).qualified("left"));
///     registry.provide(constant(2i32).qualified("right"));
///
///     let injector = builder.build();
///     let (left, right) = injector
///         .contextual(Tier::ROOT, async {
///             injector
///                 .get::<(Qualified<i32, Left>, Qualified<i32, Right>)>()
///                 .await
///         })
///         .await
///         .unwrap()
///         .unwrap();
///     assert_eq!(1, *left);
///     assert_eq!(2, *right);
/// }
/// ```
pub struct Qualified<S: Service, Q: Qualifier> {
    service: Svc<S>,
    marker: PhantomData<fn() -> Q>,
}

impl<S: Service, Q: Qualifier> Qualified<S, Q> {
    pub(crate) fn new(service: Svc<S>) -> Self {
        Qualified {
            service,
            marker: PhantomData,
        }
    }

    pub(crate) fn key() -> ServiceKey {
        ServiceKey::of::<S>().with_qualifier(Q::LABEL)
    }

    /// Unwraps the service pointer.
    #[must_use]
    pub fn into_inner(qualified: Self) -> Svc<S> {
        qualified.service
    }
}

impl<S: Service, Q: Qualifier> Deref for Qualified<S, Q> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.service
    }
}

impl<S: Service, Q: Qualifier> Clone for Qualified<S, Q> {
    fn clone(&self) -> Self {
        Qualified::new(self.service.clone())
    }
}

impl<S: Service, Q: Qualifier> Debug for Qualified<S, Q> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Qualified").field(&Q::LABEL).finish()
    }
}
