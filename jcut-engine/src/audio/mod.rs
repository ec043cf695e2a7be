//! Audio-domain building blocks
//!
//! Everything here except the decoder and the sink may run on the real-time
//! audio domain and therefore never blocks or allocates once constructed.

pub mod analysis;
pub mod classifier;
pub mod clock;
pub mod decoder;
pub mod event_channel;
pub mod sink;
pub mod types;
pub mod volume;

pub use analysis::{AnalysisControls, AnalysisProcessor};
pub use classifier::SilenceClassifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use sink::AudioSink;
pub use types::{AudioBlock, PcmBuffer};
pub use volume::VolumeSmoother;
