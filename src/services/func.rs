use crate::{InjectResult, Request, Service};
use futures_util::future::{BoxFuture, FutureExt};
use std::future::Future;

/// A factory for creating instances of a service. All functions of arity 12 or
/// less are automatically service factories if the arguments to that function
/// are valid service requests and the return value is a valid service type.
///
/// Dependencies are requested before the factory is invoked, one argument at
/// a time in declaration order.
///
/// ## Type parameters
/// * `D` - Tuple of this service's dependencies.
pub trait ServiceFactory<D>: Send + Sync + 'static {
    /// The resulting service from invoking this service factory.
    type Result: Service;

    /// Invokes this service factory with its resolved dependencies.
    fn invoke(&self, dependencies: D) -> InjectResult<Self::Result>;
}

/// A factory whose production may suspend, such as opening a connection.
/// All functions of arity 12 or less returning a [`Future`] are automatically
/// async service factories if their arguments are valid service requests.
pub trait AsyncServiceFactory<D>: Send + Sync + 'static {
    /// The resulting service once the returned future completes.
    type Result: Service;

    /// Invokes this service factory with its resolved dependencies.
    fn invoke(
        &self,
        dependencies: D,
    ) -> BoxFuture<'static, InjectResult<Self::Result>>;
}

macro_rules! impl_provider_function {
    () => {
        impl_provider_function!(@impl ());
    };
    ($first:ident $(, $rest:ident)*) => {
        impl_provider_function!(@impl ($first $(, $rest)*));
        impl_provider_function!($($rest),*);
    };
    (@impl ($($type_name:ident),*)) => {
        impl<F, R $(, $type_name)*> ServiceFactory<($($type_name,)*)> for F
        where
            F: Fn($($type_name),*) -> R + Send + Sync + 'static,
            R: Service,
            $($type_name: Request,)*
        {
            type Result = R;

            #[allow(non_snake_case, clippy::unused_unit)]
            fn invoke(
                &self,
                dependencies: ($($type_name,)*),
            ) -> InjectResult<Self::Result> {
                let ($($type_name,)*) = dependencies;
                Ok(self($($type_name),*))
            }
        }

        impl<F, Fut, R $(, $type_name)*> AsyncServiceFactory<($($type_name,)*)> for F
        where
            F: Fn($($type_name),*) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: Service,
            $($type_name: Request,)*
        {
            type Result = R;

            #[allow(non_snake_case, clippy::unused_unit)]
            fn invoke(
                &self,
                dependencies: ($($type_name,)*),
            ) -> BoxFuture<'static, InjectResult<Self::Result>> {
                let ($($type_name,)*) = dependencies;
                self($($type_name),*).map(Ok).boxed()
            }
        }
    };
}

impl_provider_function!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
