//! Error taxonomy shared by the pipeline and its subsystem backends.
//!
//! Each subsystem reports its own error enum. The pipeline wraps them in a
//! [`PipelineError`] that remembers which [`Step`] failed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{PixelFormat, Rect, Step};

/// Broad classification of a failure, independent of the subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Display, device or GPU not present.
    EnvironmentUnavailable,
    /// Allocation failure in any subsystem.
    ResourceExhaustion,
    /// No matching graphics configuration, unsupported codec.
    NegotiationFailure,
    /// A call made out of the required order. A programming defect.
    SequencingViolation,
    /// Decoder needs more input. The only retryable kind.
    TransientNotReady,
    /// Read or open failure on the decode source.
    TerminalIoFailure,
}

/// Errors from the display compositor.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompositorError {
    #[error("could not get display size for display \"{display}\"")]
    DisplaySize { display: u32 },

    #[error("could not open display \"{display}\"")]
    DisplayUnavailable { display: u32 },

    #[error("could not start update")]
    TransactionStart,

    #[error("could not add element to display update")]
    ElementAdd,

    #[error("source rectangle {0} does not fit in fixed-point space")]
    SourceRectOverflow(Rect),

    #[error("could not submit display update")]
    TransactionSubmit,

    #[error("could not remove element from display")]
    ElementRemove,

    #[error("could not close display \"{display}\"")]
    DisplayClose { display: u32 },
}

impl CompositorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TransactionStart | Self::ElementAdd => ErrorKind::ResourceExhaustion,
            _ => ErrorKind::EnvironmentUnavailable,
        }
    }
}

/// Errors from the GPU context layer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphicsError {
    #[error("could not get display: {0}")]
    DisplayBind(String),

    #[error("failed to initialize display: {0}")]
    Initialize(String),

    #[error("could not bind API: {0}")]
    ApiBind(String),

    #[error("no configuration matches the requested attributes")]
    NoMatchingConfig,

    #[error("wanted 1 matching config, got {count}")]
    AmbiguousConfig { count: usize },

    #[error("failed creating window surface: {0}")]
    SurfaceCreate(String),

    #[error("failed to create context: {0}")]
    ContextCreate(String),

    #[error("failed to make context current: {0}")]
    MakeCurrentFailed(String),

    #[error("failed to swap buffers: {0}")]
    SwapFailed(String),

    #[error("failed to release resource: {0}")]
    Release(String),

    #[error("failed to terminate display: {0}")]
    Terminate(String),
}

impl GraphicsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ApiBind(_) | Self::NoMatchingConfig | Self::AmbiguousConfig { .. } => {
                ErrorKind::NegotiationFailure
            }
            Self::SurfaceCreate(_) | Self::ContextCreate(_) => ErrorKind::ResourceExhaustion,
            _ => ErrorKind::EnvironmentUnavailable,
        }
    }
}

/// Errors from the demux/decode layer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodeError {
    #[error("unknown input format \"{0}\"")]
    UnknownFormat(String),

    #[error("failed to open {path}: {reason}")]
    SourceOpen { path: String, reason: String },

    #[error("end of stream")]
    EndOfStream,

    #[error("failed to read frame: {0}")]
    ReadFailed(String),

    #[error("no stream with index {0}")]
    NoSuchStream(usize),

    #[error("could not find decoder for {0}")]
    UnsupportedCodec(String),

    #[error("failed to open codec context: {0}")]
    DecoderOpenFailed(String),

    #[error("failed to send packet: {0}")]
    SendRejected(String),

    #[error("decoder needs more input")]
    NotReady,

    #[error("failed receiving frame: {0}")]
    DecodeFailed(String),

    #[error("no frame after {attempts} attempts")]
    RetryExhausted { attempts: u32 },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownFormat(_) | Self::UnsupportedCodec(_) => ErrorKind::NegotiationFailure,
            Self::DecoderOpenFailed(_) => ErrorKind::ResourceExhaustion,
            Self::NotReady => ErrorKind::TransientNotReady,
            _ => ErrorKind::TerminalIoFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientNotReady
    }
}

/// Errors from the image/drawing layer.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawError {
    #[error("failed to create image: {0}")]
    ImageCreateFailed(String),

    #[error("failed to destroy image: {0}")]
    ImageDestroyFailed(String),

    #[error("image is {image} but frame is {frame}")]
    FormatMismatch { image: PixelFormat, frame: PixelFormat },

    #[error("image is {image:?} but frame is {frame:?}")]
    DimensionMismatch { image: (u32, u32), frame: (u32, u32) },

    #[error("pixel buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
}

impl DrawError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ImageCreateFailed(_) => ErrorKind::ResourceExhaustion,
            Self::ImageDestroyFailed(_) => ErrorKind::EnvironmentUnavailable,
            Self::FormatMismatch { .. } => ErrorKind::NegotiationFailure,
            Self::DimensionMismatch { .. } | Self::BufferTooSmall { .. } => {
                ErrorKind::SequencingViolation
            }
        }
    }
}

/// Failure of any subsystem call made by the pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubsystemError {
    #[error("compositor: {0}")]
    Compositor(#[from] CompositorError),

    #[error("egl: {0}")]
    Graphics(#[from] GraphicsError),

    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("draw: {0}")]
    Draw(#[from] DrawError),

    #[error("sequencing violation: {0}")]
    Sequencing(String),
}

impl SubsystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Compositor(e) => e.kind(),
            Self::Graphics(e) => e.kind(),
            Self::Decode(e) => e.kind(),
            Self::Draw(e) => e.kind(),
            Self::Sequencing(_) => ErrorKind::SequencingViolation,
        }
    }
}

/// A pipeline failure, tagged with the step that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{step} failed: {source}")]
pub struct PipelineError {
    pub step: Step,
    #[source]
    pub source: SubsystemError,
}

impl PipelineError {
    pub fn new(step: Step, source: impl Into<SubsystemError>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }

    pub fn sequencing(step: Step, detail: impl Into<String>) -> Self {
        Self::new(step, SubsystemError::Sequencing(detail.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

/// Tag a subsystem result with the pipeline step that produced it.
pub trait StepExt<T> {
    fn at(self, step: Step) -> Result<T, PipelineError>;
}

impl<T, E: Into<SubsystemError>> StepExt<T> for Result<T, E> {
    fn at(self, step: Step) -> Result<T, PipelineError> {
        self.map_err(|e| PipelineError::new(step, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_ready_is_retryable() {
        assert!(DecodeError::NotReady.is_retryable());
        assert!(!DecodeError::EndOfStream.is_retryable());
        assert!(!DecodeError::DecodeFailed("x".to_string()).is_retryable());
        assert!(!DecodeError::RetryExhausted { attempts: 3 }.is_retryable());
    }

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            CompositorError::DisplayUnavailable { display: 0 }.kind(),
            ErrorKind::EnvironmentUnavailable
        );
        assert_eq!(
            GraphicsError::NoMatchingConfig.kind(),
            ErrorKind::NegotiationFailure
        );
        assert_eq!(
            DecodeError::UnsupportedCodec("h264".to_string()).kind(),
            ErrorKind::NegotiationFailure
        );
        assert_eq!(
            DecodeError::SourceOpen {
                path: "/dev/video9".to_string(),
                reason: "No such file or directory".to_string(),
            }
            .kind(),
            ErrorKind::TerminalIoFailure
        );
        assert_eq!(
            DrawError::DimensionMismatch {
                image: (640, 480),
                frame: (320, 240)
            }
            .kind(),
            ErrorKind::SequencingViolation
        );
    }

    #[test]
    fn test_step_ext_tags_step() {
        let result: Result<(), GraphicsError> = Err(GraphicsError::AmbiguousConfig { count: 2 });
        let err = result.at(Step::ConfigSelect).unwrap_err();
        assert_eq!(err.step, Step::ConfigSelect);
        assert_eq!(err.kind(), ErrorKind::NegotiationFailure);
        assert_eq!(
            err.to_string(),
            "config-select failed: egl: wanted 1 matching config, got 2"
        );
    }

    #[test]
    fn test_pipeline_error_serialization() {
        let err = PipelineError::new(Step::SourceOpen, DecodeError::EndOfStream);
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
