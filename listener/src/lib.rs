//! Detects when camera 3A (auto-exposure, auto-focus, auto-white-balance)
//! reaches a desired state by watching per-frame result metadata.

pub mod condition;
pub mod deferred;
pub mod dispatch;
pub mod listener;
pub mod result;

pub use condition::ExitCondition;
pub use deferred::{Deferred, WaitError};
pub use dispatch::Listener3A;
pub use listener::Result3AStateListener;
pub use result::{Result3A, Status3A};

#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("exit condition map for keys is empty")]
    EmptyExitCondition,
}
