//! Stretching and pitch correction
//!
//! - [`scheduler`]: control-domain planning of delay ramps and branch crossfades
//! - [`node`]: audio-domain delay line and pitch branches that play them out

pub mod automation;
pub mod delay_line;
pub mod node;
pub mod pitch_shift;
pub mod scheduler;

pub use node::StretcherNode;
pub use scheduler::{
    map_input_time_to_output_time, optimal_lookahead_delay, stretcher_sounded_delay, PitchBranch,
    StretchCommand, StretchSchedule, StretchScheduler,
};
