//! Application Services
//!
//! - `session`: drives one server-side stream session end to end
//! - `broadcast`: the cancellable per-tick sweep used by `session`
//! - `render`: client-side routing of samples into windows and the sink

pub mod broadcast;
pub mod render;
pub mod session;

pub use broadcast::BroadcastLoop;
pub use render::{DispatchOutcome, DispatchStats, RenderDispatcher, UnknownLocationPolicy};
pub use session::SessionRunner;
