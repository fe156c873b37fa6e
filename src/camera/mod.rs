pub mod source;
pub mod synthetic;

pub use source::{CameraProvider, FrameReader, FrameSource, SharedFrameSource, VideoFrame};
pub use synthetic::{SyntheticCamera, SyntheticCameraProvider};
