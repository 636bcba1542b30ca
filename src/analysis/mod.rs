pub mod aggregate;
pub mod scenes;

pub use aggregate::{aggregate, StatsTracker, RECENT_FORM_LEN};
pub use scenes::{compute_scene, Highlight, SceneReport};
