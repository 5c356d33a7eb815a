use crate::{DynSvc, InjectResult};
use futures_util::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;

type Attempt = BoxFuture<'static, InjectResult<DynSvc>>;

/// Holds a cached value, or the creation of it that is still running.
///
/// Every request arriving while a value is being created awaits the same
/// attempt, so a factory never runs twice for one slot at the same time and
/// all of those requests see the same outcome. A failed attempt is forgotten
/// once it settles. An attempt whose requests were all cancelled is dropped,
/// so the next request starts over.
#[derive(Default)]
pub(crate) struct Slot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
enum SlotState {
    #[default]
    Empty,
    Pending {
        id: u64,
        attempt: WeakShared<Attempt>,
    },
    Ready(DynSvc),
}

impl Slot {
    /// The value, if one has been created.
    pub fn get(&self) -> Option<DynSvc> {
        match &*self.state.lock() {
            SlotState::Ready(service) => Some(service.clone()),
            _ => None,
        }
    }

    /// Returns the cached value, joins the running attempt, or starts a new
    /// attempt with `init`.
    pub async fn get_or_try_init<F>(&self, init: F) -> InjectResult<DynSvc>
    where
        F: FnOnce() -> Attempt,
    {
        let (id, attempt) = {
            let mut state = self.state.lock();
            let (running, last_id) = match &*state {
                SlotState::Ready(service) => return Ok(service.clone()),
                SlotState::Pending { id, attempt } => (attempt.upgrade(), *id),
                SlotState::Empty => (None, 0),
            };

            match running {
                Some(attempt) => (last_id, attempt),
                None => {
                    let id = last_id.wrapping_add(1);
                    let attempt = init().shared();
                    if let Some(weak) = attempt.downgrade() {
                        *state = SlotState::Pending {
                            id,
                            attempt: weak,
                        };
                    }
                    (id, attempt)
                }
            }
        };

        let result = attempt.await;

        let mut state = self.state.lock();
        if matches!(&*state, SlotState::Pending { id: current, .. } if *current == id)
        {
            *state = match &result {
                Ok(service) => SlotState::Ready(service.clone()),
                Err(_) => SlotState::Empty,
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InjectError, ServiceKey, Svc};
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    fn failing(calls: &Svc<AtomicUsize>) -> Attempt {
        let calls = calls.clone();
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(InjectError::InvalidProvider {
                key: ServiceKey::of::<u8>(),
            })
        }
        .boxed()
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_failure() {
        let slot = Slot::default();
        let calls = Svc::new(AtomicUsize::new(0));

        let (first, second) = tokio::join!(
            slot.get_or_try_init(|| failing(&calls)),
            slot.get_or_try_init(|| failing(&calls)),
        );
        assert!(first.is_err());
        assert!(second.is_err());
        assert_eq!(1, calls.load(Ordering::SeqCst));

        assert!(slot.get_or_try_init(|| failing(&calls)).await.is_err());
        assert_eq!(2, calls.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn created_value_is_kept() {
        let slot = Slot::default();
        let value = slot
            .get_or_try_init(|| {
                futures_util::future::ok::<DynSvc, InjectError>(Svc::new(3u8))
                    .boxed()
            })
            .await
            .unwrap();
        let cached = slot.get().unwrap();
        assert!(Svc::ptr_eq(&value, &cached));
    }
}
