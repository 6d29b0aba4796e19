//! Frame lifecycle states.

/// Where the render system is in its lifecycle.
///
/// ```text
/// Uninitialized -> Initialized -> FrameActive <-> FramePaused
///                       ^              |
///                       +-- FrameEnded <+
/// any initialised state -> ShutDown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameState {
    Uninitialized,
    Initialized,
    FrameActive,
    FramePaused,
    FrameEnded,
    ShutDown,
}

impl FrameState {
    /// States from which a new frame may begin.
    pub fn can_begin_frame(self) -> bool {
        matches!(self, FrameState::Initialized | FrameState::FrameEnded)
    }

    /// Initialised and not yet shut down.
    pub fn is_running(self) -> bool {
        !matches!(self, FrameState::Uninitialized | FrameState::ShutDown)
    }
}

/// Opaque token returned by `pause_frame` and consumed by `resume_frame`.
#[derive(Debug)]
#[must_use = "a paused frame must be resumed"]
pub struct FrameContext {
    pub(crate) frame_number: u64,
}
