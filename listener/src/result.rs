use converge3a_common::frame::FrameNumber;
use std::fmt;

/// Why a 3A wait finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status3A {
    /// The exit condition was met.
    Ok,
    FrameLimitReached,
    TimeLimitReached,
}

/// Outcome of a 3A wait: the frame it settled on and why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Result3A {
    pub frame_number: FrameNumber,
    pub status: Status3A,
}

impl Result3A {
    pub fn new(frame_number: FrameNumber, status: Status3A) -> Self {
        Self {
            frame_number,
            status,
        }
    }
}

impl fmt::Display for Status3A {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status3A::Ok => "ok",
            Status3A::FrameLimitReached => "frame_limit_reached",
            Status3A::TimeLimitReached => "time_limit_reached",
        };
        f.write_str(s)
    }
}
