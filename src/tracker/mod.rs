pub mod mapper;
pub mod smooth;
pub mod transform;
pub mod view;

pub use mapper::{PositionMapper, SHOE_Y_OFFSET};
pub use smooth::TransformSmoother;
pub use transform::{wrap_degrees, ShoeTransform, MIN_SCALE};
pub use view::{ViewMode, ViewModeTransformer};
