pub mod capture;
pub mod dispatcher;
pub mod encode;
pub mod merge;

pub use capture::{CaptureDevice, CaptureHandle, CapturedFrame, FrameSource, SyntheticCamera};
pub use dispatcher::LocalInferenceDispatcher;
pub use encode::encode_jpeg;
pub use merge::{merge_detections, DetectResponse};
