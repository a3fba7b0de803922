use std::sync::Arc;
use std::time::Duration;

use converge3a_common::config::SimulationConfig;
use converge3a_common::frame::{
    AeState, AfState, AwbState, CapturedMetadata, MetadataKey, RequestNumber,
};
use converge3a_listener::Listener3A;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// One frame as delivered by a result callback.
#[derive(Debug, Clone)]
pub struct SimulatedFrame {
    pub request: RequestNumber,
    pub metadata: CapturedMetadata,
}

/// A fake camera whose 3A routines settle after a configured number of frames.
pub struct SimulatedCamera {
    config: SimulationConfig,
}

impl SimulatedCamera {
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Frames in delivery order. Leftover frames from the previous request
    /// come first, then one frame per request starting at `first_request`.
    ///
    /// Request 0 has no predecessor, so it gets no leftover frames. Leftovers
    /// are also capped so their frame numbers stay below `first_frame`.
    pub fn frames(&self) -> Vec<SimulatedFrame> {
        let c = &self.config;
        let stale_count = if c.first_request == 0 {
            0
        } else {
            c.stale_frames.min(c.first_frame)
        };
        let stale_request = RequestNumber(c.first_request.saturating_sub(1));
        let stale = (0..stale_count).map(|i| SimulatedFrame {
            request: stale_request,
            // Stale frames already report converged 3A for the old settings.
            metadata: self.metadata(c.first_frame - stale_count + i, u64::MAX),
        });
        let fresh = (0..c.frames).map(|i| SimulatedFrame {
            request: RequestNumber(c.first_request + i),
            metadata: self.metadata(c.first_frame + i, i),
        });
        stale.chain(fresh).collect()
    }

    fn metadata(&self, frame_number: u64, offset: u64) -> CapturedMetadata {
        let c = &self.config;
        let timestamp_ns = frame_number
            .saturating_mul(c.frame_interval_ms)
            .saturating_mul(1_000_000);
        let ae = if offset >= c.ae_converges_after {
            AeState::Converged
        } else {
            AeState::Searching
        };
        let af = if offset >= c.af_converges_after {
            AfState::FocusedLocked
        } else {
            AfState::ActiveScan
        };
        let awb = if offset >= c.awb_converges_after {
            AwbState::Converged
        } else {
            AwbState::Searching
        };
        CapturedMetadata::new(frame_number)
            .with_timestamp_ns(i64::try_from(timestamp_ns).unwrap_or(i64::MAX))
            .with(MetadataKey::AeState, ae)
            .with(MetadataKey::AfState, af)
            .with(MetadataKey::AwbState, awb)
    }

    /// Spawn `callback_tasks` lanes that deliver frames round-robin, the way
    /// result callbacks arrive on several threads. A lane stops early once no
    /// listener is left to feed.
    pub fn spawn_callbacks(&self, dispatch: Arc<Listener3A>) -> Vec<JoinHandle<u64>> {
        let lanes = self.config.callback_tasks.max(1);
        let interval = Duration::from_millis(self.config.frame_interval_ms);
        let frames = self.frames();

        info!(
            lanes,
            frames = frames.len(),
            interval_ms = self.config.frame_interval_ms,
            "starting simulated result callbacks"
        );

        (0..lanes)
            .map(|lane| {
                let lane_frames: Vec<_> = frames
                    .iter()
                    .skip(lane)
                    .step_by(lanes)
                    .cloned()
                    .collect();
                let dispatch = Arc::clone(&dispatch);
                tokio::spawn(async move {
                    tokio::time::sleep(interval * lane as u32).await;
                    let mut delivered = 0u64;
                    for frame in lane_frames {
                        if dispatch.is_empty() {
                            break;
                        }
                        dispatch.on_frame(frame.request, &frame.metadata);
                        delivered += 1;
                        tokio::time::sleep(interval * lanes as u32).await;
                    }
                    debug!(lane, delivered, "callback lane finished");
                    delivered
                })
            })
            .collect()
    }
}
