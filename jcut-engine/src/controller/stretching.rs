//! Stretching strategy
//!
//! Rate follows the classifier running on the element's own output: silence
//! speed on SILENCE_START, sounded speed on SILENCE_END. Because the end of a
//! silence is only known once sound is back, the margin before it is restored
//! retroactively by the stretcher (delay line plus pitch correction), which is
//! only built when a margin before is configured.

use crate::audio::analysis::{AnalysisControls, AnalysisProcessor};
use crate::audio::event_channel::{EventChannel, EventConsumer};
use crate::audio::types::AudioBlock;
use crate::audio::volume::STRETCHING_SMOOTHING_WINDOW;
use crate::controller::core::ControlCore;
use crate::controller::teardown::TeardownList;
use crate::controller::SettingsOutcome;
use crate::element::BlockProcessor;
use crate::error::Result;
use crate::stretch::{optimal_lookahead_delay, stretcher_sounded_delay, StretchScheduler, StretcherNode};
use jcut_common::events::{PlaybackState, SilenceEvent, SilenceEventKind, SpeedName, TelemetryRecord};
use jcut_common::{Settings, TimeDelta};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Position nudge applied by desync correction (s)
const DESYNC_NUDGE: f64 = 1e-9;

/// Automation older than this is pruned from the control-side timeline (s)
const PRUNE_AGE: f64 = 1.0;

/// Delay the stretcher must be able to hold for `settings`
pub fn required_delay_capacity(settings: &Settings) -> TimeDelta {
    let (mb, sounded, silence) = (settings.margin_before, settings.sounded_speed, settings.silence_speed);
    optimal_lookahead_delay(mb, sounded, silence) + stretcher_sounded_delay(mb, sounded, silence)
}

/// Analysis first so it sees the undelayed input, then the stretcher
struct StretchingPipeline {
    analysis: AnalysisProcessor,
    stretcher: Option<StretcherNode>,
}

impl BlockProcessor for StretchingPipeline {
    fn process(&mut self, block: &mut AudioBlock<'_>) {
        self.analysis.analyse(block);
        if let Some(stretcher) = self.stretcher.as_mut() {
            stretcher.process(block);
        }
    }
}

pub struct StretchingStrategy {
    controls: Arc<AnalysisControls>,
    events: EventConsumer<SilenceEvent>,
    scratch: Vec<SilenceEvent>,
    scheduler: Option<StretchScheduler>,
    capacity: TimeDelta,
    teardown: TeardownList,
    silence_starts: u32,
}

impl StretchingStrategy {
    pub fn new(core: &mut ControlCore) -> Result<Self> {
        let element = Arc::clone(&core.element);
        let settings = &core.settings;
        let sample_rate = element.sample_rate();

        let controls = AnalysisControls::new(
            settings.volume_threshold,
            settings.silence_duration_threshold(settings.sounded_speed),
        );
        let (producer, events) = EventChannel::new(None).split();
        let analysis =
            AnalysisProcessor::classifying(STRETCHING_SMOOTHING_WINDOW, sample_rate, Arc::clone(&controls), producer);

        let mut capacity = 0.0;
        let mut scheduler = None;
        let mut stretcher = None;
        if settings.margin_before > 0.0 {
            let (mb, sounded, silence) = (settings.margin_before, settings.sounded_speed, settings.silence_speed);
            let lookahead = optimal_lookahead_delay(mb, sounded, silence);
            let sounded_delay = stretcher_sounded_delay(mb, sounded, silence);
            capacity = required_delay_capacity(settings) * 1.5 + 0.1;

            let (tx, rx) = EventChannel::new(None).split();
            scheduler = Some(StretchScheduler::new(settings, lookahead, tx));
            stretcher = Some(StretcherNode::new(
                capacity,
                sounded_delay,
                lookahead,
                sample_rate,
                element.channel_count(),
                rx,
            ));
            debug!("Stretcher built: lookahead {:.3}s, capacity {:.3}s", lookahead, capacity);
        }

        let mut teardown = TeardownList::new();
        teardown.push(element.connect_processor(Box::new(StretchingPipeline { analysis, stretcher }))?);

        core.reset_to_sounded();
        info!(
            "Stretching strategy: {}x sounded, {}x silence, stretcher {}",
            core.settings.sounded_speed,
            core.settings.silence_speed,
            if scheduler.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            controls,
            events,
            scratch: Vec::with_capacity(16),
            scheduler,
            capacity,
            teardown,
            silence_starts: 0,
        })
    }

    pub fn has_stretcher(&self) -> bool {
        self.scheduler.is_some()
    }

    pub fn tick(&mut self, core: &mut ControlCore) -> Result<()> {
        let mut drained = std::mem::take(&mut self.scratch);
        self.events.drain_into(|event| drained.push(event));
        for event in drained.drain(..) {
            self.on_silence_event(core, event);
        }
        self.scratch = drained;

        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.prune(core.now() - PRUNE_AGE);
        }
        Ok(())
    }

    fn on_silence_event(&mut self, core: &mut ControlCore, event: SilenceEvent) {
        match event.kind {
            SilenceEventKind::SilenceStart => {
                debug_assert_eq!(core.state(), PlaybackState::Sounded, "silence start while silent");
                let switched_at = core.apply_speed(SpeedName::Silence);
                core.transition(PlaybackState::Silence);
                if let Some(scheduler) = self.scheduler.as_mut() {
                    scheduler.on_silence_start(switched_at);
                }
                self.silence_starts += 1;
                self.maybe_correct_desync(core);
            }
            SilenceEventKind::SilenceEnd => {
                debug_assert_eq!(core.state(), PlaybackState::Silence, "silence end while sounded");
                if core.state() != PlaybackState::Silence {
                    core.reset_to_sounded();
                    return;
                }
                let switched_at = core.apply_speed(SpeedName::Sounded);
                core.transition(PlaybackState::Sounded);
                if let Some(scheduler) = self.scheduler.as_mut() {
                    scheduler.on_silence_end(switched_at);
                }
            }
        }
    }

    fn maybe_correct_desync(&mut self, core: &mut ControlCore) {
        if !core.settings.enable_desync_correction
            || self.silence_starts < core.settings.tuning.stretching_desync_period
        {
            return;
        }
        self.silence_starts = 0;
        if core.element.ended() {
            return;
        }
        let position = core.element.position();
        match core.element.set_position((position - DESYNC_NUDGE).max(0.0)) {
            Ok(()) => debug!("Desync correction at {:.3}s", position),
            Err(e) => warn!("Desync correction failed: {}", e),
        }
    }

    /// Apply new settings in place, or ask for a rebuild when the stretcher must change shape
    pub fn update_settings(&mut self, core: &mut ControlCore, previous: &Settings) -> Result<SettingsOutcome> {
        let settings = core.settings.clone();
        if (previous.margin_before > 0.0) != (settings.margin_before > 0.0) {
            return Ok(SettingsOutcome::Rebuild);
        }
        if self.scheduler.is_some() && required_delay_capacity(&settings) > self.capacity {
            return Ok(SettingsOutcome::Rebuild);
        }

        self.controls.set_volume_threshold(settings.volume_threshold);
        self.controls
            .set_duration_threshold(settings.silence_duration_threshold(settings.sounded_speed));
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.on_settings_update(&settings, core.now());
        }
        let name = match core.state() {
            PlaybackState::Sounded => SpeedName::Sounded,
            PlaybackState::Silence => SpeedName::Silence,
        };
        core.apply_speed(name);
        Ok(SettingsOutcome::Applied)
    }

    pub fn fill_telemetry(&self, core: &ControlCore, record: &mut TelemetryRecord) {
        record.input_volume = self.controls.volume();
        let Some(scheduler) = self.scheduler.as_ref() else {
            return;
        };
        let now = core.now();
        record.stretcher_delay = scheduler.stretcher_delay_at(now);
        record.delay_from_input_to_stretcher_output = scheduler.delay_from_input_to_stretcher_output(now);
        record.total_output_delay = scheduler.total_output_delay(now);
        record.last_scheduled_stretch_input_time = scheduler.last_scheduled_input_times();
    }

    pub fn destroy(mut self) {
        self.teardown.release_all();
        debug!("Stretching strategy destroyed");
    }
}
