pub mod orchestrator;
pub mod state;
pub mod tick;

pub use orchestrator::{ArSession, ArSessionBuilder, RenderTransform, TickFrame};
pub use state::ArState;
pub use tick::TickHandle;
