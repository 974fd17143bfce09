//! Labjob core: pure job lifecycle state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod status;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::{JobRequest, Msg};
pub use state::{Attempt, CoordinatorState, JobId, JobState, ResultToken};
pub use status::{ProgressUpdate, Status};
pub use update::update;
pub use view_model::JobView;
