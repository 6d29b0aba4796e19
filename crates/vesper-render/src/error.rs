//! Error types for the render system layer.

use std::fmt;

use crate::frame::FrameState;

/// Failure reported by a concrete backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// The backend has no implementation for this operation.
    Unsupported,
    /// A native resource could not be created.
    CreationFailed,
    /// The device was lost or reset.
    DeviceLost,
    Other,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Unsupported, message)
    }

    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::CreationFailed, message)
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            BackendErrorKind::Unsupported => "unsupported",
            BackendErrorKind::CreationFailed => "creation failed",
            BackendErrorKind::DeviceLost => "device lost",
            BackendErrorKind::Other => "error",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl std::error::Error for BackendError {}

pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by [`RenderSystem`](crate::RenderSystem) operations.
///
/// Every variant is a precondition the caller violated or a backend failure.
/// Recoverable gaps (unsupported programs, a depth buffer that could not be
/// created) are reported through return values and logs instead.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderSystemError {
    /// Custom capabilities were supplied after the backend initialised.
    CustomCapabilitiesAfterInit,

    /// Custom capabilities describe a different render system.
    CapabilitiesMismatch {
        /// Name of the active backend.
        expected: String,
        /// Name recorded in the custom capabilities.
        found: String,
    },

    /// A render target priority outside the fixed group count.
    PriorityOutOfRange { name: String, priority: u8, max: u8 },

    /// A render target with this name is already attached.
    DuplicateRenderTarget { name: String },

    /// No render target with this name.
    RenderTargetNotFound { name: String },

    /// An id that no longer refers to a live object.
    InvalidHandle { reason: String },

    /// `begin_frame` without an active viewport.
    NoActiveViewport,

    /// Operation not legal in the current frame state.
    InvalidFrameState {
        operation: &'static str,
        state: FrameState,
    },

    /// The backend created a depth buffer that the target then refused.
    DepthBufferIncompatibleAfterCreation { target: String },

    /// Depth buffer copy between mismatched or identical buffers.
    DepthBufferCopyMismatch { reason: String },

    /// Config option rejected.
    InvalidConfigOption { name: String, message: String },

    Backend(BackendError),
}

impl fmt::Display for RenderSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderSystemError::CustomCapabilitiesAfterInit => write!(
                f,
                "Custom render capabilities must be set before the render system is initialised"
            ),
            RenderSystemError::CapabilitiesMismatch { expected, found } => write!(
                f,
                "Custom capabilities were created for '{}', not for the active render system '{}'",
                found, expected
            ),
            RenderSystemError::PriorityOutOfRange {
                name,
                priority,
                max,
            } => write!(
                f,
                "Render target '{}' has priority {} (must be below {})",
                name, priority, max
            ),
            RenderSystemError::DuplicateRenderTarget { name } => {
                write!(f, "A render target named '{}' is already attached", name)
            }
            RenderSystemError::RenderTargetNotFound { name } => {
                write!(f, "Render target not found: {}", name)
            }
            RenderSystemError::InvalidHandle { reason } => {
                write!(f, "Invalid handle: {}", reason)
            }
            RenderSystemError::NoActiveViewport => {
                write!(f, "Cannot begin frame - no viewport selected")
            }
            RenderSystemError::InvalidFrameState { operation, state } => {
                write!(f, "Cannot {} while the render system is {:?}", operation, state)
            }
            RenderSystemError::DepthBufferIncompatibleAfterCreation { target } => write!(
                f,
                "A freshly created depth buffer could not be attached to '{}'",
                target
            ),
            RenderSystemError::DepthBufferCopyMismatch { reason } => {
                write!(f, "Cannot copy depth buffer: {}", reason)
            }
            RenderSystemError::InvalidConfigOption { name, message } => {
                write!(f, "Invalid config option '{}': {}", name, message)
            }
            RenderSystemError::Backend(err) => write!(f, "Backend error: {}", err),
        }
    }
}

impl std::error::Error for RenderSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderSystemError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for RenderSystemError {
    fn from(err: BackendError) -> Self {
        RenderSystemError::Backend(err)
    }
}

pub type RenderSystemResult<T> = Result<T, RenderSystemError>;
