use crate::{
    current_scope, InjectResult, Injector, Request, RequestInfo, Requirement,
    Scope, Signature,
};
use std::future::Future;
use tracing::trace;

/// A callable whose parameters are all resolved by the injector.
///
/// Implemented for every function or closure of up to 12 parameters whose
/// parameters are requests and which returns a future.
pub trait InjectableFn<D>: Send + Sync {
    /// The value the callable's future resolves to.
    type Output;

    /// The future returned by the callable.
    type Future: Future<Output = Self::Output>;

    /// Invokes the callable with its resolved parameters.
    fn invoke(&self, dependencies: D) -> Self::Future;
}

/// A callable whose first parameter is supplied by the caller, and whose
/// remaining parameters are resolved by the injector.
pub trait InjectableFnWith<A, D>: Send + Sync {
    /// The value the callable's future resolves to.
    type Output;

    /// The future returned by the callable.
    type Future: Future<Output = Self::Output>;

    /// Invokes the callable with the caller's argument and the resolved
    /// parameters.
    fn invoke(&self, argument: A, dependencies: D) -> Self::Future;
}

macro_rules! impl_injectable_fn {
    () => {
        impl_injectable_fn!(@impl ());
    };
    ($first:ident $(, $rest:ident)*) => {
        impl_injectable_fn!(@impl ($first $(, $rest)*));
        impl_injectable_fn!($($rest),*);
    };
    (@impl ($($type_name:ident),*)) => {
        impl<F, Fut $(, $type_name)*> InjectableFn<($($type_name,)*)> for F
        where
            F: Fn($($type_name),*) -> Fut + Send + Sync,
            Fut: Future,
            $($type_name: Request,)*
        {
            type Output = Fut::Output;
            type Future = Fut;

            #[allow(non_snake_case, clippy::unused_unit)]
            fn invoke(&self, dependencies: ($($type_name,)*)) -> Fut {
                let ($($type_name,)*) = dependencies;
                self($($type_name),*)
            }
        }

        impl<F, Fut, A $(, $type_name)*> InjectableFnWith<A, ($($type_name,)*)> for F
        where
            F: Fn(A $(, $type_name)*) -> Fut + Send + Sync,
            Fut: Future,
            $($type_name: Request,)*
        {
            type Output = Fut::Output;
            type Future = Fut;

            #[allow(non_snake_case, clippy::unused_unit)]
            fn invoke(&self, argument: A, dependencies: ($($type_name,)*)) -> Fut {
                let ($($type_name,)*) = dependencies;
                self(argument $(, $type_name)*)
            }
        }
    };
}

impl_injectable_fn!(T0, T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);

/// Wraps a callable so its parameters are resolved from the innermost scope
/// of the current flow each time it is called.
///
/// A missing dependency fails the call with the resolution error and the
/// callable is not run. Outside of any scope, required parameters fail with
/// [`InjectError::NoActiveScope`](crate::InjectError::NoActiveScope) and
/// optional ones are `None`, unless the callable was bound to an injector
/// with [`Injector::inject`] and the parameter is a root singleton or
/// constant.
///
/// ```
/// use scoped_injector::{inject, Injector, IntoProvider, Svc, Tier};
///
/// struct Name(&'static str);
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let mut builder = Injector::builder();
///     builder.provide(Tier::REQUEST, (|| Name("world")).scoped());
///     let injector = builder.build();
///
///     let greet = inject(|name: Svc<Name>| async move {
///         format!("hello {}", name.0)
///     });
///
///     let greeting = injector
///         .contextual(Tier::REQUEST, greet.call())
///         .await
///         .unwrap()
///         .unwrap();
///     assert_eq!("hello world", greeting);
/// }
/// ```
pub fn inject<F>(func: F) -> Injected<F> {
    Injected::new(func, None)
}

/// A callable wrapped by [`inject`] or [`Injector::inject`].
#[derive(Clone)]
pub struct Injected<F> {
    func: F,
    injector: Option<Injector>,
}

impl<F> Injected<F> {
    pub(crate) fn new(func: F, injector: Option<Injector>) -> Self {
        Injected { func, injector }
    }

    /// Lists the parameters the callable asks the injector for.
    #[must_use]
    pub fn requirements<D>(&self) -> Vec<Requirement>
    where
        F: InjectableFn<D>,
        D: Signature,
    {
        D::signature()
    }

    /// Resolves every parameter and calls the wrapped callable.
    pub async fn call<D>(
        &self,
    ) -> InjectResult<<F as InjectableFn<D>>::Output>
    where
        F: InjectableFn<D>,
        D: Request,
    {
        let dependencies = self.dependencies::<D>().await?;
        Ok(self.func.invoke(dependencies).await)
    }

    /// Calls the wrapped callable with `argument` as its first parameter,
    /// resolving the rest.
    pub async fn call_with<A, D>(
        &self,
        argument: A,
    ) -> InjectResult<<F as InjectableFnWith<A, D>>::Output>
    where
        F: InjectableFnWith<A, D>,
        D: Request,
    {
        let dependencies = self.dependencies::<D>().await?;
        Ok(self.func.invoke(argument, dependencies).await)
    }

    async fn dependencies<D: Request>(&self) -> InjectResult<D> {
        let scope = current_scope();
        let injector = match (&self.injector, &scope) {
            (Some(injector), _) => injector.clone(),
            (None, Some(scope)) => scope.injector().clone(),
            (None, None) => Injector::default(),
        };
        trace!(
            scope = ?scope.as_ref().map(Scope::id),
            "resolving callable parameters"
        );
        D::request(&injector, &RequestInfo::in_scope(scope)).await
    }
}
