mod job;
mod state;

pub use job::{INPUT_DIR, INPUT_FILE, Job, JobConfig, JobId, MIN_INPUT_VALUE, OUTPUT_DIR};
pub use state::{JobState, StateMachine, Transition};
