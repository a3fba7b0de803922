use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

use converge3a_common::frame::{
    FrameMetadata, FrameNumber, MetadataKey, MetadataValue, RequestNumber,
};
use tracing::{debug, trace};

use crate::condition::ExitCondition;
use crate::deferred::Deferred;
use crate::result::{Result3A, Status3A};
use crate::ListenerError;

/// Watches per-frame metadata until the 3A state matches an exit condition,
/// or until a frame or sensor-time limit runs out.
///
/// `update` may be called from several result callbacks at once. The outcome
/// is published through a [`Deferred`] that is resolved exactly once.
#[derive(Debug)]
pub struct Result3AStateListener {
    exit_condition: ExitCondition,
    frame_limit: Option<u64>,
    time_limit: Option<Duration>,
    result: Deferred<Result3A>,
    initial_request: Mutex<Option<RequestNumber>>,
    first_frame_number: OnceLock<FrameNumber>,
    first_timestamp_ns: OnceLock<i64>,
}

impl Result3AStateListener {
    pub fn new(
        exit_condition: ExitCondition,
        frame_limit: Option<u64>,
        time_limit: Option<Duration>,
    ) -> Self {
        Self {
            exit_condition,
            frame_limit,
            time_limit,
            result: Deferred::new(),
            initial_request: Mutex::new(None),
            first_frame_number: OnceLock::new(),
            first_timestamp_ns: OnceLock::new(),
        }
    }

    /// Build directly from `(key, acceptable values)` pairs.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (MetadataKey, Vec<MetadataValue>)>,
        frame_limit: Option<u64>,
        time_limit: Option<Duration>,
    ) -> Result<Self, ListenerError> {
        Ok(Self::new(
            ExitCondition::new(entries)?,
            frame_limit,
            time_limit,
        ))
    }

    /// Record the first request whose frames should be considered. Only the
    /// first call has any effect.
    pub fn on_request_sequence_created(&self, request: RequestNumber) {
        let mut initial = self
            .initial_request
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if initial.is_none() {
            debug!(request = %request, "registered initial request");
            *initial = Some(request);
        }
    }

    /// Feed one frame's metadata. Returns `true` once the listener has
    /// reached a terminal state (including when it already had), `false`
    /// while it is still waiting.
    pub fn update<M: FrameMetadata + ?Sized>(&self, request: RequestNumber, metadata: &M) -> bool {
        if self.result.is_terminal() {
            return true;
        }

        // Frames from requests submitted before ours say nothing about the
        // state we are waiting for.
        {
            let initial = self
                .initial_request
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match *initial {
                Some(initial) if request >= initial => {}
                _ => {
                    trace!(request = %request, initial = ?*initial, "ignoring stale update");
                    return false;
                }
            }
        }

        let frame_number = metadata.frame_number();
        let timestamp_ns = metadata.timestamp_ns();

        if let Some(ts) = timestamp_ns {
            let _ = self.first_timestamp_ns.set(ts);
        }

        if let (Some(limit), Some(&first_ns), Some(current_ns)) =
            (self.time_limit, self.first_timestamp_ns.get(), timestamp_ns)
        {
            if time_limit_exceeded(first_ns, current_ns, limit) {
                self.resolve(frame_number, Status3A::TimeLimitReached);
                return true;
            }
        }

        let first_frame = *self.first_frame_number.get_or_init(|| frame_number);
        if let Some(limit) = self.frame_limit {
            // Out-of-order arrival can put the current frame before the first
            // one; that never counts towards the limit.
            if frame_number.0.saturating_sub(first_frame.0) > limit {
                self.resolve(frame_number, Status3A::FrameLimitReached);
                return true;
            }
        }

        if !self.exit_condition.is_satisfied_by(metadata) {
            trace!(frame = %frame_number, "exit condition not met");
            return false;
        }

        self.resolve(frame_number, Status3A::Ok);
        true
    }

    /// Handle to the outcome. Cancelling it ends the wait; later updates
    /// are then ignored.
    pub fn get_result(&self) -> Deferred<Result3A> {
        self.result.clone()
    }

    fn resolve(&self, frame_number: FrameNumber, status: Status3A) {
        if self.result.complete(Result3A::new(frame_number, status)) {
            debug!(frame = %frame_number, %status, "3A wait resolved");
        } else {
            trace!(frame = %frame_number, %status, "3A wait already resolved by another update");
        }
    }
}

fn time_limit_exceeded(first_ns: i64, current_ns: i64, limit: Duration) -> bool {
    u64::try_from(current_ns.saturating_sub(first_ns))
        .is_ok_and(|elapsed| Duration::from_nanos(elapsed) > limit)
}
