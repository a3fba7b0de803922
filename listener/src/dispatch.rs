use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use converge3a_common::frame::{FrameMetadata, RequestNumber};
use tracing::debug;

use crate::listener::Result3AStateListener;

/// Routes capture callbacks to every active [`Result3AStateListener`].
///
/// Listeners are dropped as soon as they report a terminal state. On session
/// teardown `cancel_all` cancels whatever is still waiting.
#[derive(Debug, Default)]
pub struct Listener3A {
    listeners: Mutex<Vec<Arc<Result3AStateListener>>>,
}

impl Listener3A {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&self, listener: Arc<Result3AStateListener>) {
        self.lock().push(listener);
    }

    pub fn on_request_sequence_created(&self, request: RequestNumber) {
        for listener in self.lock().iter() {
            listener.on_request_sequence_created(request);
        }
    }

    /// Feed one frame to every active listener. Updates run on a snapshot
    /// of the list, so concurrent callbacks evaluate in parallel; the lock is
    /// only taken to copy the list and to drop finished listeners.
    pub fn on_frame(&self, request: RequestNumber, metadata: &dyn FrameMetadata) {
        let snapshot: Vec<_> = self.lock().clone();
        let finished: Vec<_> = snapshot
            .into_iter()
            .filter(|listener| listener.update(request, metadata))
            .collect();
        if finished.is_empty() {
            return;
        }

        let mut listeners = self.lock();
        listeners.retain(|listener| !finished.iter().any(|done| Arc::ptr_eq(listener, done)));
        debug!(
            frame = %metadata.frame_number(),
            finished = finished.len(),
            remaining = listeners.len(),
            "removed finished 3A listeners"
        );
    }

    /// Cancel and drop every listener that is still active.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.lock().drain(..).collect();
        for listener in &drained {
            listener.get_result().cancel();
        }
        if !drained.is_empty() {
            debug!(cancelled = drained.len(), "cancelled pending 3A listeners");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Result3AStateListener>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Result3A, Status3A};
    use std::sync::Barrier;
    use crate::WaitError;
    use converge3a_common::frame::{
        AeState, AwbState, CapturedMetadata, FrameNumber, MetadataKey, MetadataValue,
    };

    fn listener(key: MetadataKey, value: impl Into<MetadataValue>) -> Arc<Result3AStateListener> {
        let listener =
            Result3AStateListener::from_entries([(key, vec![value.into()])], None, None).unwrap();
        Arc::new(listener)
    }

    #[test]
    fn finished_listeners_are_removed() {
        let dispatch = Listener3A::new();
        let ae = listener(MetadataKey::AeState, AeState::Converged);
        let awb = listener(MetadataKey::AwbState, AwbState::Converged);
        dispatch.add_listener(Arc::clone(&ae));
        dispatch.add_listener(Arc::clone(&awb));
        dispatch.on_request_sequence_created(RequestNumber(1));
        assert_eq!(dispatch.len(), 2);

        let frame = CapturedMetadata::new(10)
            .with(MetadataKey::AeState, AeState::Converged)
            .with(MetadataKey::AwbState, AwbState::Searching);
        dispatch.on_frame(RequestNumber(1), &frame);

        assert_eq!(dispatch.len(), 1);
        assert_eq!(
            ae.get_result().try_get(),
            Some(Result3A::new(FrameNumber(10), Status3A::Ok))
        );
        assert!(!awb.get_result().is_terminal());
    }

    #[test]
    fn stale_frames_keep_listeners() {
        let dispatch = Listener3A::new();
        dispatch.add_listener(listener(MetadataKey::AeState, AeState::Converged));
        dispatch.on_request_sequence_created(RequestNumber(4));

        let frame = CapturedMetadata::new(3).with(MetadataKey::AeState, AeState::Converged);
        dispatch.on_frame(RequestNumber(3), &frame);
        assert_eq!(dispatch.len(), 1);
    }

    #[tokio::test]
    async fn cancel_all_cancels_pending_waits() {
        let dispatch = Listener3A::new();
        let ae = listener(MetadataKey::AeState, AeState::Converged);
        dispatch.add_listener(Arc::clone(&ae));

        dispatch.cancel_all();
        assert!(dispatch.is_empty());
        assert_eq!(ae.get_result().wait().await, Err(WaitError::Cancelled));
    }

    #[test]
    fn concurrent_frames_resolve_each_listener_once() {
        let dispatch = Listener3A::new();
        let ae = listener(MetadataKey::AeState, AeState::Converged);
        let awb = listener(MetadataKey::AwbState, AwbState::Converged);
        dispatch.add_listener(Arc::clone(&ae));
        dispatch.add_listener(Arc::clone(&awb));
        dispatch.on_request_sequence_created(RequestNumber(1));
        let barrier = Barrier::new(4);

        std::thread::scope(|s| {
            for frame in 20..24u64 {
                let dispatch = &dispatch;
                let barrier = &barrier;
                s.spawn(move || {
                    let metadata = CapturedMetadata::new(frame)
                        .with(MetadataKey::AeState, AeState::Converged)
                        .with(MetadataKey::AwbState, AwbState::Converged);
                    barrier.wait();
                    dispatch.on_frame(RequestNumber(1), &metadata);
                });
            }
        });

        assert!(dispatch.is_empty());
        for done in [&ae, &awb] {
            let result = done.get_result().try_get().unwrap();
            assert_eq!(result.status, Status3A::Ok);
            assert!((20..24).contains(&result.frame_number.0));
        }
    }

    #[test]
    fn unregistered_listener_survives_dispatch() {
        let dispatch = Listener3A::new();
        let ae = listener(MetadataKey::AeState, AeState::Converged);
        dispatch.add_listener(Arc::clone(&ae));
        dispatch.on_request_sequence_created(RequestNumber(1));

        let frame = CapturedMetadata::new(5).with(MetadataKey::AeState, AeState::Converged);
        dispatch.on_frame(RequestNumber(1), &frame);
        // Added after the request was created, so its frames are all filtered.
        let late = listener(MetadataKey::AeState, AeState::Converged);
        dispatch.add_listener(Arc::clone(&late));
        dispatch.on_frame(RequestNumber(1), &frame);

        assert_eq!(dispatch.len(), 1);
        assert!(ae.get_result().is_completed());
        assert!(!late.get_result().is_terminal());
    }
}
