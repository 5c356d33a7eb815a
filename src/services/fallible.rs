use crate::{
    AsyncServiceFactory, InjectError, InjectResult, Service, ServiceFactory,
    ServiceKey, Svc,
};
use futures_util::future::{BoxFuture, FutureExt};
use std::{error::Error, marker::PhantomData};

/// A service factory that may fail during service creation with a custom error
/// type. During activation failure, an instance of
/// [`InjectError::ActivationFailed`] is returned as an error. Failed
/// activations are never retried on behalf of the caller.
pub struct FallibleServiceFactory<D, R, E, F> {
    inner: F,
    marker: PhantomData<fn(D) -> Result<R, E>>,
}

fn activation_failed<R: Service, E>(error: E) -> InjectError
where
    E: Error + Send + Sync + 'static,
{
    InjectError::ActivationFailed {
        key: ServiceKey::of::<R>(),
        source: Svc::new(error),
    }
}

impl<D, R, E, F> ServiceFactory<D> for FallibleServiceFactory<D, R, E, F>
where
    D: 'static,
    R: Service,
    E: Error + Send + Sync + 'static,
    F: ServiceFactory<D, Result = Result<R, E>>,
{
    type Result = R;

    fn invoke(&self, dependencies: D) -> InjectResult<Self::Result> {
        self.inner
            .invoke(dependencies)?
            .map_err(activation_failed::<R, E>)
    }
}

impl<D, R, E, F> AsyncServiceFactory<D> for FallibleServiceFactory<D, R, E, F>
where
    D: 'static,
    R: Service,
    E: Error + Send + Sync + 'static,
    F: AsyncServiceFactory<D, Result = Result<R, E>>,
{
    type Result = R;

    fn invoke(
        &self,
        dependencies: D,
    ) -> BoxFuture<'static, InjectResult<Self::Result>> {
        self.inner
            .invoke(dependencies)
            .map(|result| result?.map_err(activation_failed::<R, E>))
            .boxed()
    }
}

/// Defines a conversion into a fallible service factory. This trait is
/// automatically implemented for all service factories that return a
/// [`Result<T, E>`] with an error type that implements [`Error`].
pub trait IntoFallible<D, R, E, F>
where
    R: Service,
    E: Error + Send + Sync + 'static,
    F: ServiceFactory<D, Result = Result<R, E>>,
{
    /// Marks a service factory as being able to fail. On failure, an injection
    /// error is returned during activation. On success, the service is
    /// injected unwrapped from the result. In other words, a [`Result<T, E>`]
    /// can be requested as a [`Svc<T>`](crate::Svc), however if the
    /// constructor fails, an injection error is returned from the request.
    #[must_use]
    fn fallible(self) -> FallibleServiceFactory<D, R, E, F>;
}

impl<D, R, E, F> IntoFallible<D, R, E, F> for F
where
    R: Service,
    E: Error + Send + Sync + 'static,
    F: ServiceFactory<D, Result = Result<R, E>>,
{
    fn fallible(self) -> FallibleServiceFactory<D, R, E, F> {
        FallibleServiceFactory {
            inner: self,
            marker: PhantomData,
        }
    }
}

/// The asynchronous counterpart of [`IntoFallible`], for factories whose
/// future resolves to a [`Result<T, E>`].
pub trait IntoFallibleAsync<D, R, E, F>
where
    R: Service,
    E: Error + Send + Sync + 'static,
    F: AsyncServiceFactory<D, Result = Result<R, E>>,
{
    /// Marks an async service factory as being able to fail.
    #[must_use]
    fn fallible_async(self) -> FallibleServiceFactory<D, R, E, F>;
}

impl<D, R, E, F> IntoFallibleAsync<D, R, E, F> for F
where
    R: Service,
    E: Error + Send + Sync + 'static,
    F: AsyncServiceFactory<D, Result = Result<R, E>>,
{
    fn fallible_async(self) -> FallibleServiceFactory<D, R, E, F> {
        FallibleServiceFactory {
            inner: self,
            marker: PhantomData,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        flow, InjectError, Injector, IntoFallible, IntoFallibleAsync,
        IntoProvider, IntoAsyncProvider, Svc, Tier,
    };
    use std::{
        error::Error,
        fmt::{Display, Formatter},
    };

    #[derive(Debug)]
    struct FooError;

    impl Error for FooError {}
    impl Display for FooError {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "an error occurred while creating a Foo")
        }
    }

    struct Foo;

    fn make_foo() -> Result<Foo, FooError> {
        Err(FooError)
    }

    #[tokio::test]
    async fn failed_activation_surfaces_source() {
        let mut builder = Injector::builder();
        builder.registry_for(Tier::ROOT).provide(make_foo.fallible().scoped());
        let injector = builder.build();

        let result = flow(injector.contextual(Tier::ROOT, async {
            injector.get::<Svc<Foo>>().await
        }))
        .await
        .unwrap();

        match result {
            Err(InjectError::ActivationFailed { source, .. }) => {
                assert!(source.downcast_ref::<FooError>().is_some());
            }
            Err(error) => panic!("unexpected error: {error}"),
            Ok(_) => panic!("activation should have failed"),
        }
    }

    #[tokio::test]
    async fn async_fallible_factory_succeeds() {
        let mut builder = Injector::builder();
        builder.registry_for(Tier::ROOT).provide(
            (|| async { Ok::<_, FooError>(Foo) })
                .fallible_async()
                .scoped_async(),
        );
        let injector = builder.build();

        let result = injector
            .contextual(Tier::ROOT, async {
                injector.get::<Svc<Foo>>().await.is_ok()
            })
            .await
            .unwrap();
        assert!(result);
    }
}
