use crate::{
    constant, current_scope, flow, inject, qualifier, InjectError,
    InjectResult, Injector, InjectorConfig, IntoAsyncProvider, IntoFallible,
    IntoFallibleAsync, IntoProvider, MisuseReason, Qualified, Scope,
    ServiceKey, Svc, Tier,
};
use parking_lot::Mutex;
use std::{
    io,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

struct Name(String);

struct Greeting(String);

impl Greeting {
    fn new(name: Svc<Name>) -> Self {
        Greeting(format!("hello {}", name.0))
    }
}

fn counted<T>(calls: &Svc<AtomicUsize>, make: impl Fn(usize) -> T) -> impl Fn() -> T {
    let calls = calls.clone();
    move || make(calls.fetch_add(1, Ordering::SeqCst))
}

#[tokio::test]
async fn scoped_value_is_shared_within_one_activation() {
    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(
        Tier::REQUEST,
        counted(&calls, |n| Name(format!("user{n}"))).scoped(),
    );
    builder.provide(Tier::REQUEST, Greeting::new.transient());
    let injector = builder.build();

    let (first, second) = injector
        .contextual(Tier::REQUEST, async {
            let greeting: Svc<Greeting> = injector.get().await.unwrap();
            let name: Svc<Name> = injector.get().await.unwrap();
            (greeting.0.clone(), name.0.clone())
        })
        .await
        .unwrap();
    assert_eq!("hello user0", first);
    assert_eq!("user0", second);

    let again: String = injector
        .contextual(Tier::REQUEST, async {
            injector.get::<Svc<Name>>().await.unwrap().0.clone()
        })
        .await
        .unwrap();
    assert_eq!("user1", again);
    assert_eq!(2, calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn transient_is_created_for_every_request() {
    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, counted(&calls, |n| n).transient());
    let injector = builder.build();

    let values = injector
        .contextual(Tier::ROOT, async {
            let mut values = Vec::new();
            for _ in 0..3 {
                values.push(*injector.get::<Svc<usize>>().await.unwrap());
            }
            values
        })
        .await
        .unwrap();
    assert_eq!(vec![0, 1, 2], values);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn singleton_is_created_once_across_flows() {
    struct Pool;

    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, {
        let calls = calls.clone();
        (move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Pool
            }
        })
        .singleton_async()
    });
    let injector = builder.build();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let injector = injector.clone();
            tokio::spawn(async move {
                injector
                    .contextual(Tier::ROOT, async {
                        injector.get::<Svc<Pool>>().await.map(|pool| {
                            Svc::as_ptr(&pool) as usize
                        })
                    })
                    .await
            })
        })
        .collect();

    let mut pointers = Vec::new();
    for task in tasks {
        pointers.push(task.await.unwrap().unwrap().unwrap());
    }
    pointers.dedup();
    assert_eq!(1, pointers.len());
    assert_eq!(1, calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn sibling_activations_get_separate_values() {
    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, counted(&calls, |n| n).scoped());
    let injector = builder.build();

    flow(async {
        let root = injector.enter_scope(Tier::ROOT).unwrap();

        let left = injector.fork(async {
            injector
                .contextual(Tier::REQUEST, async {
                    *injector.get::<Svc<usize>>().await.unwrap()
                })
                .await
                .unwrap()
        });
        let right = injector.fork(async {
            injector
                .contextual(Tier::REQUEST, async {
                    *injector.get::<Svc<usize>>().await.unwrap()
                })
                .await
                .unwrap()
        });
        let (mut left, mut right) = tokio::join!(left, right);
        if left > right {
            std::mem::swap(&mut left, &mut right);
        }
        assert_eq!((0, 1), (left, right));

        injector.exit_scope(root).await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn release_hooks_run_in_reverse_creation_order() {
    struct X;
    struct Y(Svc<X>);

    let log = Svc::new(Mutex::new(Vec::new()));
    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, {
        let log = log.clone();
        (|| X).scoped().with_teardown(move |_: Svc<X>| log.lock().push("x"))
    });
    builder.provide(Tier::REQUEST, {
        let log = log.clone();
        Y.scoped().with_teardown(move |_: Svc<Y>| log.lock().push("y"))
    });
    let injector = builder.build();

    injector
        .contextual(Tier::REQUEST, async {
            let _y: Svc<Y> = injector.get().await.unwrap();
        })
        .await
        .unwrap();
    assert_eq!(vec!["y", "x"], *log.lock());
}

#[tokio::test]
async fn release_hook_runs_once_when_callable_fails() {
    struct Conn;
    struct Missing;

    let released = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, {
        let released = released.clone();
        (|| async { Conn })
            .scoped_async()
            .with_async_teardown(move |_: Svc<Conn>| {
                let released = released.clone();
                async move {
                    released.fetch_add(1, Ordering::SeqCst);
                }
            })
    });
    let injector = builder.build();

    let handler = inject(|_: Svc<Conn>, _: Svc<Missing>| async {});
    let handler_conn = inject(|conn: Svc<Conn>| async move {
        drop(conn);
        Err::<(), _>("handler failed")
    });

    let result = injector
        .contextual(Tier::REQUEST, async {
            assert!(handler_conn.call().await.unwrap().is_err());
            handler.call().await
        })
        .await
        .unwrap();
    match result {
        Err(InjectError::NotRegistered { key, required_by }) => {
            assert_eq!(ServiceKey::of::<Missing>(), key);
            assert_eq!(None, required_by);
        }
        other => panic!("unexpected result: {:?}", other.err()),
    }
    assert_eq!(1, released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failing_hook_does_not_stop_the_others() {
    struct A;
    struct B(Svc<A>);

    let log = Svc::new(Mutex::new(Vec::new()));
    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, {
        let log = log.clone();
        (|| A).scoped().with_teardown(move |_: Svc<A>| log.lock().push("a"))
    });
    builder.provide(
        Tier::REQUEST,
        B.scoped()
            .with_teardown(|_: Svc<B>| Err::<(), _>("b refused to close")),
    );
    let injector = builder.build();

    let result = injector
        .contextual(Tier::REQUEST, async {
            let _b: Svc<B> = injector.get().await.unwrap();
        })
        .await;
    match result {
        Err(InjectError::TeardownFailed { failures, .. }) => {
            assert_eq!(1, failures.len());
            assert_eq!(ServiceKey::of::<B>(), failures[0].key);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(vec!["a"], *log.lock());
}

#[tokio::test]
async fn cycle_is_reported_with_its_path() {
    struct A;
    struct B;

    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, (|_: Svc<B>| A).scoped());
    builder.provide(Tier::ROOT, (|_: Svc<A>| B).scoped());
    let injector = builder.build();

    let result: InjectResult<Svc<A>> = injector
        .contextual(Tier::ROOT, injector.get())
        .await
        .unwrap();
    match result {
        Err(InjectError::CyclicDependency { cycle, .. }) => {
            let a = ServiceKey::of::<A>();
            let b = ServiceKey::of::<B>();
            assert_eq!(vec![a.clone(), b, a], cycle);
        }
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[tokio::test]
async fn transient_cycle_is_reported() {
    struct A;
    struct B;

    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, (|_: Svc<B>| A).transient());
    builder.provide(Tier::ROOT, (|_: Svc<A>| B).transient());
    let injector = builder.build();

    let result = injector
        .contextual(Tier::ROOT, injector.get::<Svc<B>>())
        .await
        .unwrap();
    assert!(matches!(result, Err(InjectError::CyclicDependency { .. })));
}

#[tokio::test]
async fn rejected_exit_keeps_the_flow_working() {
    struct Settings(usize);

    let calls = Svc::new(AtomicUsize::new(0));
    let log = Svc::new(Mutex::new(Vec::new()));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, {
        let log = log.clone();
        counted(&calls, Settings)
            .scoped()
            .with_teardown(move |_: Svc<Settings>| log.lock().push("settings"))
    });
    let injector = builder.build();

    flow(async {
        let outer = injector.enter_scope(Tier::ROOT).unwrap();
        let inner = injector.enter_scope(Tier::REQUEST).unwrap();
        let outer_scope = outer.scope().clone();
        let inner_scope = inner.scope().clone();

        let result = injector.exit_scope(outer).await;
        assert!(matches!(
            result,
            Err(InjectError::ScopeMisuse {
                reason: MisuseReason::OutOfOrder { .. }
            })
        ));
        assert!(!outer_scope.is_closed());
        assert_eq!(Some(inner_scope), current_scope());

        let settings: Svc<Settings> = injector.get().await.unwrap();
        assert_eq!(0, settings.0);
        assert!(outer_scope.is_cached(&ServiceKey::of::<Settings>()));
        assert!(log.lock().is_empty());

        injector.exit_scope(inner).await.unwrap();
        assert!(outer_scope.is_closed());
        assert_eq!(vec!["settings"], *log.lock());
        assert_eq!(None, current_scope());
    })
    .await;
}

#[tokio::test]
async fn dropped_handle_releases_its_scope() {
    let released = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, {
        let released = released.clone();
        (|| 7u32).scoped().with_teardown(move |_: Svc<u32>| {
            released.fetch_add(1, Ordering::SeqCst);
        })
    });
    let injector = builder.build();

    flow(async {
        let handle = injector.enter_scope(Tier::REQUEST).unwrap();
        let scope = handle.scope().clone();
        let _: Svc<u32> = injector.get().await.unwrap();

        drop(handle);
        assert!(scope.is_closed());
        assert_eq!(None, crate::current_scope());
        tokio::task::yield_now().await;
    })
    .await;
    assert_eq!(1, released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn closed_scope_cannot_resolve() {
    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, constant(1u8));
    let injector = builder.build();

    let scope: Scope = injector
        .contextual(Tier::REQUEST, injector.get::<Scope>())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        injector.get_in::<Svc<u8>>(&scope).await,
        Err(InjectError::ScopeMisuse {
            reason: MisuseReason::ScopeClosed { .. }
        })
    ));
}

#[tokio::test]
async fn inner_tier_shadows_outer_tier() {
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, constant(Name("root".to_owned())));
    builder.provide(Tier::REQUEST, constant(Name("request".to_owned())));
    builder.provide(Tier::ROOT, Greeting::new.transient());
    let injector = builder.build();

    let (outer, inner) = injector
        .contextual(Tier::ROOT, async {
            let outer = injector.get::<Svc<Greeting>>().await.unwrap();
            let inner = injector
                .contextual(Tier::REQUEST, injector.get::<Svc<Greeting>>())
                .await
                .unwrap()
                .unwrap();
            (outer.0.clone(), inner.0.clone())
        })
        .await
        .unwrap();
    assert_eq!("hello root", outer);
    assert_eq!("hello request", inner);
}

#[tokio::test]
async fn outside_any_scope_singletons_and_constants_resolve() {
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, (|| 5u64).singleton());
    builder.provide(Tier::ROOT, constant(6u32));
    builder.provide(Tier::ROOT, (|| 7u16).scoped());
    let injector = builder.build();

    assert_eq!(5, *injector.get::<Svc<u64>>().await.unwrap());
    assert_eq!(6, *injector.get::<Svc<u32>>().await.unwrap());
    assert!(matches!(
        injector.get::<Svc<u16>>().await,
        Err(InjectError::NoActiveScope { .. })
    ));
    assert!(injector.get::<Option<Svc<u16>>>().await.unwrap().is_none());

    let greet = injector.inject(|value: Svc<u32>| async move { *value });
    assert_eq!(6, greet.call().await.unwrap());
}

#[tokio::test]
async fn request_scope_alone_sees_root_constants() {
    struct Welcome(&'static str);
    struct Visitor(usize);

    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, constant(Welcome("hello")));
    builder.provide(Tier::REQUEST, counted(&calls, Visitor).scoped());
    let injector = builder.build();

    let handler = inject(|welcome: Svc<Welcome>, visitor: Svc<Visitor>| async move {
        format!("{} visitor{}", welcome.0, visitor.0)
    });

    let greeting = injector
        .contextual(Tier::REQUEST, handler.call())
        .await
        .unwrap()
        .unwrap();
    assert_eq!("hello visitor0", greeting);
}

#[tokio::test]
async fn optional_dependency_falls_back_to_none() {
    struct Cache;
    struct Handler(Option<Svc<Cache>>);

    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, Handler.scoped());
    let injector = builder.build();

    let handler: Svc<Handler> = injector
        .contextual(Tier::REQUEST, injector.get())
        .await
        .unwrap()
        .unwrap();
    assert!(handler.0.is_none());
}

#[tokio::test]
async fn missing_dependency_names_its_dependent() {
    struct Missing;
    struct Needy;

    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, (|_: Svc<Missing>| Needy).scoped());
    let injector = builder.build();

    let result = injector
        .contextual(Tier::ROOT, injector.get::<Svc<Needy>>())
        .await
        .unwrap();
    match result {
        Err(InjectError::NotRegistered { key, required_by }) => {
            assert_eq!(ServiceKey::of::<Missing>(), key);
            assert_eq!(Some(ServiceKey::of::<Needy>()), required_by);
        }
        other => panic!("unexpected result: {:?}", other.err()),
    }
}

#[tokio::test]
async fn qualified_providers_are_separate() {
    qualifier! {
        Primary = "primary";
        Replica = "replica";
    }

    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, constant("primary-db").qualified("primary"));
    builder.provide(Tier::ROOT, constant("replica-db").qualified("replica"));
    let injector = builder.build();

    let (primary, replica, plain) = injector
        .contextual(Tier::ROOT, async {
            injector
                .get::<(
                    Qualified<&'static str, Primary>,
                    Qualified<&'static str, Replica>,
                    Option<Svc<&'static str>>,
                )>()
                .await
                .unwrap()
        })
        .await
        .unwrap();
    assert_eq!("primary-db", *primary);
    assert_eq!("replica-db", *replica);
    assert!(plain.is_none());
}

#[tokio::test]
async fn disabled_injector_refuses_requests() {
    let mut builder = Injector::builder();
    builder.with_config(InjectorConfig { enabled: false });
    builder.provide(Tier::ROOT, constant(1u8));
    let injector = builder.build();

    let result = injector
        .contextual(Tier::ROOT, injector.get::<Svc<u8>>())
        .await
        .unwrap();
    assert!(matches!(result, Err(InjectError::Disabled)));
}

#[tokio::test]
async fn singleton_hooks_run_at_shutdown() {
    let released = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, {
        let released = released.clone();
        (|| 1i64).singleton().with_teardown(move |_: Svc<i64>| {
            released.fetch_add(1, Ordering::SeqCst);
        })
    });
    let injector = builder.build();

    injector
        .contextual(Tier::ROOT, injector.get::<Svc<i64>>())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(0, released.load(Ordering::SeqCst));

    injector.shutdown().await.unwrap();
    assert_eq!(1, released.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failing_shutdown_hook_does_not_stop_the_others() {
    struct Pool;

    let log = Svc::new(Mutex::new(Vec::new()));
    let mut builder = Injector::builder();
    builder.provide(
        Tier::ROOT,
        constant(Pool)
            .with_teardown(|_: Svc<Pool>| Err::<(), _>("pool refused to close")),
    );
    builder.provide(Tier::ROOT, {
        let log = log.clone();
        (|| 1i64)
            .singleton()
            .with_teardown(move |_: Svc<i64>| log.lock().push("counter"))
    });
    let injector = builder.build();

    injector.get::<Svc<i64>>().await.unwrap();
    injector.get::<Svc<Pool>>().await.unwrap();

    match injector.shutdown().await {
        Err(InjectError::TeardownFailed { tier, failures }) => {
            assert_eq!(None, tier);
            assert_eq!(1, failures.len());
            assert_eq!(ServiceKey::of::<Pool>(), failures[0].key);
            assert_eq!("pool refused to close", failures[0].error.to_string());
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(vec!["counter"], *log.lock());
}

#[tokio::test]
async fn constant_hook_runs_once_at_shutdown() {
    let released = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, {
        let released = released.clone();
        constant(3u8).with_teardown(move |_: Svc<u8>| {
            released.fetch_add(1, Ordering::SeqCst);
        })
    });
    let injector = builder.build();

    for _ in 0..3 {
        injector
            .contextual_all([Tier::ROOT, Tier::REQUEST], injector.get::<Svc<u8>>())
            .await
            .unwrap()
            .unwrap();
    }
    assert_eq!(0, released.load(Ordering::SeqCst));

    injector.shutdown().await.unwrap();
    assert_eq!(1, released.load(Ordering::SeqCst));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_singleton_is_shared_by_waiting_flows() {
    struct Pool;

    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, {
        let calls = calls.clone();
        (move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err::<Pool, _>(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "database is down",
                ))
            }
        })
        .fallible_async()
        .singleton_async()
    });
    let injector = builder.build();

    let tasks: Vec<_> = (0..4)
        .map(|_| {
            let injector = injector.clone();
            tokio::spawn(async move { injector.get::<Svc<Pool>>().await.is_err() })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap());
    }
    assert_eq!(1, calls.load(Ordering::SeqCst));

    assert!(matches!(
        injector.get::<Svc<Pool>>().await,
        Err(InjectError::ActivationFailed { .. })
    ));
    assert_eq!(2, calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failing_scoped_value_is_shared_within_a_scope() {
    struct Conn;

    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::REQUEST, {
        let calls = calls.clone();
        (move || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                Err::<Conn, _>(io::Error::new(io::ErrorKind::TimedOut, "no reply"))
            }
        })
        .fallible_async()
        .scoped_async()
    });
    let injector = builder.build();

    let (first, second) = injector
        .contextual(Tier::REQUEST, async {
            tokio::join!(injector.get::<Svc<Conn>>(), injector.get::<Svc<Conn>>())
        })
        .await
        .unwrap();
    assert!(matches!(first, Err(InjectError::ActivationFailed { .. })));
    assert!(matches!(second, Err(InjectError::ActivationFailed { .. })));
    assert_eq!(1, calls.load(Ordering::SeqCst));
}

#[tokio::test]
async fn failed_dependency_is_handed_to_the_callable() {
    struct User;
    struct Session;

    let mut builder = Injector::builder();
    builder.provide(
        Tier::REQUEST,
        (|| Err::<User, _>(io::Error::new(io::ErrorKind::NotFound, "no such user")))
            .fallible()
            .scoped(),
    );
    let injector = builder.build();

    let handler = inject(
        |user: InjectResult<Svc<User>>, session: InjectResult<Svc<Session>>| async move {
            (user.err(), session.is_err())
        },
    );
    assert!(handler.requirements().iter().all(|requirement| requirement.optional));

    let (user, session_missing) = injector
        .contextual(Tier::REQUEST, handler.call())
        .await
        .unwrap()
        .unwrap();
    match user {
        Some(InjectError::ActivationFailed { key, .. }) => {
            assert_eq!(ServiceKey::of::<User>(), key);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(session_missing);
}

#[tokio::test]
async fn values_added_to_a_scope_stay_in_it() {
    struct Inbound(&'static str);
    struct Route(String);

    let released = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(
        Tier::REQUEST,
        (|inbound: Svc<Inbound>| Route(format!("GET {}", inbound.0))).scoped(),
    );
    let injector = builder.build();

    flow(async {
        let handle = injector.enter_scope(Tier::REQUEST).unwrap();
        let scope = handle.scope().clone();
        scope
            .provide(constant(Inbound("/users")).with_teardown({
                let released = released.clone();
                move |_: Svc<Inbound>| {
                    released.fetch_add(1, Ordering::SeqCst);
                }
            }))
            .unwrap();

        let route: Svc<Route> = injector.get().await.unwrap();
        assert_eq!("GET /users", route.0);

        injector.exit_scope(handle).await.unwrap();
        assert_eq!(1, released.load(Ordering::SeqCst));
        assert!(matches!(
            scope.add_value(Inbound("/late")),
            Err(InjectError::ScopeMisuse {
                reason: MisuseReason::ScopeClosed { .. }
            })
        ));

        let next = injector.enter_scope(Tier::REQUEST).unwrap();
        assert!(injector.get::<Option<Svc<Inbound>>>().await.unwrap().is_none());
        injector.exit_scope(next).await.unwrap();
    })
    .await;
}

#[tokio::test]
async fn scopes_need_a_flow() {
    let injector = Injector::default();
    assert!(matches!(
        injector.enter_scope(Tier::ROOT),
        Err(InjectError::ScopeMisuse {
            reason: MisuseReason::NoFlow
        })
    ));
}

#[tokio::test]
async fn transient_is_released_with_requesting_scope() {
    struct Audit;

    let log = Svc::new(Mutex::new(Vec::new()));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, {
        let log = log.clone();
        (|| Audit)
            .transient()
            .with_teardown(move |_: Svc<Audit>| log.lock().push("audit"))
    });
    let injector = builder.build();

    injector
        .contextual(Tier::ROOT, async {
            injector
                .contextual(Tier::REQUEST, injector.get::<Svc<Audit>>())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(1, log.lock().len());
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn handler_sees_one_name_per_request() {
    struct Welcome(&'static str);
    struct Visitor(usize);

    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, constant(Welcome("hello")));
    builder.provide(Tier::REQUEST, counted(&calls, Visitor).scoped());
    let injector = builder.build();

    let handler = inject(|welcome: Svc<Welcome>, visitor: Svc<Visitor>| async move {
        (welcome.0, visitor.0)
    });

    let (first, second) = injector
        .contextual_all([Tier::ROOT, Tier::REQUEST], async {
            (handler.call().await.unwrap(), handler.call().await.unwrap())
        })
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!("hello", first.0);

    let third = injector
        .contextual_all([Tier::ROOT, Tier::REQUEST], handler.call())
        .await
        .unwrap()
        .unwrap();
    assert_eq!("hello", third.0);
    assert_ne!(first.1, third.1);
}

#[tokio::test]
async fn cancelled_activation_is_retried() {
    struct Slow;

    let calls = Svc::new(AtomicUsize::new(0));
    let mut builder = Injector::builder();
    builder.provide(Tier::ROOT, {
        let calls = calls.clone();
        (move || {
            let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
            async move {
                if first {
                    std::future::pending::<()>().await;
                }
                Slow
            }
        })
        .scoped_async()
    });
    let injector = builder.build();

    injector
        .contextual(Tier::ROOT, async {
            let attempt = tokio::time::timeout(
                Duration::from_millis(10),
                injector.get::<Svc<Slow>>(),
            )
            .await;
            assert!(attempt.is_err());

            assert!(injector.get::<Svc<Slow>>().await.is_ok());
        })
        .await
        .unwrap();
    assert_eq!(2, calls.load(Ordering::SeqCst));
}
