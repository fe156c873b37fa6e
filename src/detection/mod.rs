pub mod detector;
pub mod foot;
pub mod simulated;

pub use detector::{sanitize_detections, FootDetector};
pub use foot::{FootDetection, FootSide};
pub use simulated::SimulatedFootDetector;
