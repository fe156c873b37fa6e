pub mod capture;
pub mod overlay;

pub use capture::{capture_filename, CaptureService, CapturedImage, NoShareTarget, ShareOutcome, ShareTarget};
pub use overlay::{composite, OverlayState, ShoeSprite};
