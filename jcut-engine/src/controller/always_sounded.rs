use crate::controller::core::ControlCore;
use tracing::info;

/// Constant sounded speed, no skipping
///
/// The universal fallback: needs nothing from the element but its rate.
#[derive(Debug, Default)]
pub struct AlwaysSounded;

impl AlwaysSounded {
    pub fn new(core: &mut ControlCore) -> Self {
        core.reset_to_sounded();
        info!("Always-sounded strategy at {}x", core.settings.sounded_speed);
        Self
    }

    pub fn update_settings(&mut self, core: &mut ControlCore) {
        core.reset_to_sounded();
    }
}
