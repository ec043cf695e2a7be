//! Decision / scheduling controller
//!
//! One [`ElementController`] per attached playback element. It owns the shared
//! [`ControlCore`] and exactly one strategy from the closed set in
//! [`ActiveStrategy`]. Changing strategy destroys the old one before the new one
//! is constructed; strategies are never mutated into each other.
//!
//! The controller is synchronous and single-threaded: element events, ticks and
//! settings updates are fed to it by one driver, either the async task behind
//! [`attach`] or a [`SimulationRun`](crate::sim::SimulationRun).
//!
//! Nothing in here fails outward. A strategy that cannot run (no shadow, no
//! audio pipeline) is replaced by [`AlwaysSounded`] with a warning.

pub mod always_sounded;
pub mod cloning;
pub mod core;
pub mod decision;
pub mod handle;
pub mod ready;
pub mod stretching;
pub mod teardown;
pub mod timers;

pub use always_sounded::AlwaysSounded;
pub use cloning::CloningStrategy;
pub use decision::{decide, DecisionInput, SkipDecision};
pub use handle::{attach, AttachHandle};
pub use ready::{ReadyGate, ReadyState};
pub use stretching::StretchingStrategy;

use self::core::ControlCore;
use crate::context::EngineContext;
use crate::element::{ElementEvent, PlaybackElement};
use crate::error::{Error, Result};
use jcut_common::events::{PlaybackState, TelemetryRecord, TimeSavedTotals};
use jcut_common::time::unix_time_secs;
use jcut_common::{Settings, StrategyKind};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of handing new settings to a running strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOutcome {
    Applied,
    /// The strategy cannot absorb the change and must be destroyed and rebuilt
    Rebuild,
}

pub enum ActiveStrategy {
    AlwaysSounded(AlwaysSounded),
    Stretching(StretchingStrategy),
    Cloning(CloningStrategy),
}

impl ActiveStrategy {
    /// Build the strategy the settings ask for, falling back to always-sounded
    fn construct(core: &mut ControlCore) -> Self {
        let requested = core.settings.strategy;
        let kind = if requested == StrategyKind::Stretching && core.element.source_restricted() {
            info!("Source is restricted, stretching unavailable");
            StrategyKind::AlwaysSounded
        } else {
            requested
        };

        let built = match kind {
            StrategyKind::AlwaysSounded => Ok(ActiveStrategy::AlwaysSounded(AlwaysSounded::new(core))),
            StrategyKind::Stretching => StretchingStrategy::new(core).map(ActiveStrategy::Stretching),
            StrategyKind::Cloning => CloningStrategy::new(core).map(ActiveStrategy::Cloning),
        };
        built.unwrap_or_else(|e| {
            warn!("{} strategy unavailable ({}), falling back to always_sounded", kind, e);
            ActiveStrategy::AlwaysSounded(AlwaysSounded::new(core))
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            ActiveStrategy::AlwaysSounded(_) => StrategyKind::AlwaysSounded,
            ActiveStrategy::Stretching(_) => StrategyKind::Stretching,
            ActiveStrategy::Cloning(_) => StrategyKind::Cloning,
        }
    }

    fn is_ready(&self) -> bool {
        match self {
            ActiveStrategy::Cloning(s) => s.is_ready(),
            _ => true,
        }
    }

    fn on_element_event(&mut self, core: &mut ControlCore, event: &ElementEvent) -> Result<()> {
        match self {
            ActiveStrategy::Cloning(s) => s.on_element_event(core, event),
            _ => Ok(()),
        }
    }

    fn tick(&mut self, core: &mut ControlCore) -> Result<()> {
        match self {
            ActiveStrategy::AlwaysSounded(_) => Ok(()),
            ActiveStrategy::Stretching(s) => s.tick(core),
            ActiveStrategy::Cloning(s) => s.tick(core),
        }
    }

    fn update_settings(&mut self, core: &mut ControlCore, previous: &Settings) -> Result<SettingsOutcome> {
        match self {
            ActiveStrategy::AlwaysSounded(s) => {
                s.update_settings(core);
                Ok(SettingsOutcome::Applied)
            }
            ActiveStrategy::Stretching(s) => s.update_settings(core, previous),
            ActiveStrategy::Cloning(s) => s.update_settings(core, previous),
        }
    }

    fn fill_telemetry(&self, core: &ControlCore, record: &mut TelemetryRecord) {
        match self {
            ActiveStrategy::AlwaysSounded(_) => {}
            ActiveStrategy::Stretching(s) => s.fill_telemetry(core, record),
            ActiveStrategy::Cloning(s) => s.fill_telemetry(core, record),
        }
    }

    fn destroy(self, core: &mut ControlCore) {
        match self {
            ActiveStrategy::AlwaysSounded(_) => {}
            ActiveStrategy::Stretching(s) => s.destroy(),
            ActiveStrategy::Cloning(s) => s.destroy(core),
        }
    }
}

/// Controller of one attached element
pub struct ElementController {
    id: Uuid,
    core: ControlCore,
    strategy: Option<ActiveStrategy>,
    gate: ReadyGate<Settings>,
    original_rate: f64,
    detached: bool,
}

impl ElementController {
    /// Attach to `element`; never fails
    ///
    /// Invalid settings are replaced by defaults, an unavailable strategy by
    /// always-sounded.
    pub fn new(element: Arc<dyn PlaybackElement>, settings: Settings, ctx: EngineContext) -> Self {
        let settings = match settings.validate() {
            Ok(()) => settings,
            Err(e) => {
                warn!("Invalid settings ({}), attaching with defaults", e);
                Settings::default()
            }
        };

        let id = Uuid::new_v4();
        let original_rate = element.rate();
        ctx.sink.connect(id);
        let mut core = ControlCore::new(element, settings, ctx);

        let mut gate = ReadyGate::new();
        gate.begin();
        let strategy = ActiveStrategy::construct(&mut core);
        if strategy.is_ready() {
            gate.mark_ready();
        }
        info!("Attached {} with {} strategy", id, strategy.kind());

        Self {
            id,
            core,
            strategy: Some(strategy),
            gate,
            original_rate,
            detached: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Strategy actually running, after any fallback
    pub fn active_strategy(&self) -> StrategyKind {
        self.strategy
            .as_ref()
            .map_or(StrategyKind::AlwaysSounded, ActiveStrategy::kind)
    }

    pub fn strategy(&self) -> Option<&ActiveStrategy> {
        self.strategy.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.core.settings
    }

    pub fn state(&self) -> PlaybackState {
        self.core.state()
    }

    pub fn ready_state(&self) -> ReadyState {
        self.gate.state()
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn estimated_seek_latency(&self) -> f64 {
        self.core.seek_estimator.next_estimate()
    }

    pub fn handle_event(&mut self, event: ElementEvent) {
        if self.detached {
            return;
        }
        let now = self.core.now();
        match event {
            ElementEvent::Paused => self.core.time_saved.on_paused(now),
            ElementEvent::Resumed => self.core.time_saved.on_resumed(now),
            ElementEvent::SeekStarted => self.core.seek_estimator.on_seek_started(now),
            ElementEvent::SeekCompleted => self.core.seek_estimator.on_seek_completed(now),
            _ => {}
        }

        let result = match self.strategy.as_mut() {
            Some(strategy) => strategy.on_element_event(&mut self.core, &event),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.downgrade(e);
        }
    }

    /// Drain audio-domain events, fire due timers, advance initialisation
    pub fn tick(&mut self) {
        if self.detached {
            return;
        }
        let result = match self.strategy.as_mut() {
            Some(strategy) => strategy.tick(&mut self.core),
            None => Ok(()),
        };
        if let Err(e) = result {
            self.downgrade(e);
            return;
        }

        let ready = self.strategy.as_ref().map_or(true, ActiveStrategy::is_ready);
        if !self.gate.is_ready() && ready {
            info!("{} strategy ready", self.active_strategy());
            if let Some(pending) = self.gate.mark_ready() {
                self.apply_settings(pending);
            }
        }
    }

    /// Replace the settings as a whole
    ///
    /// Invalid settings are rejected. While the strategy is still initialising
    /// the update is parked and applied once it is ready; a later update
    /// replaces a parked one.
    pub fn update_settings(&mut self, settings: Settings) -> Result<()> {
        if self.detached {
            return Err(Error::Detached);
        }
        settings.validate()?;
        if let Some(settings) = self.gate.offer(settings) {
            self.apply_settings(settings);
        }
        Ok(())
    }

    fn apply_settings(&mut self, settings: Settings) {
        let swap = settings.strategy != self.core.settings.strategy;
        let previous = self.core.replace_settings(settings);
        if swap {
            info!("Strategy change {} -> {}", previous.strategy, self.core.settings.strategy);
            self.rebuild();
            return;
        }

        let outcome = match self.strategy.as_mut() {
            Some(strategy) => strategy.update_settings(&mut self.core, &previous),
            None => Ok(SettingsOutcome::Rebuild),
        };
        match outcome {
            Ok(SettingsOutcome::Applied) => {}
            Ok(SettingsOutcome::Rebuild) => {
                info!("{} strategy rebuilt for new settings", self.active_strategy());
                self.rebuild();
            }
            Err(e) => self.downgrade(e),
        }
    }

    fn rebuild(&mut self) {
        if let Some(old) = self.strategy.take() {
            old.destroy(&mut self.core);
        }
        let strategy = ActiveStrategy::construct(&mut self.core);
        if !strategy.is_ready() {
            self.gate.begin();
        }
        self.strategy = Some(strategy);
    }

    fn downgrade(&mut self, error: Error) {
        warn!(
            "{} strategy failed ({}), downgrading to always_sounded",
            self.active_strategy(),
            error
        );
        if let Some(old) = self.strategy.take() {
            old.destroy(&mut self.core);
        }
        self.strategy = Some(ActiveStrategy::AlwaysSounded(AlwaysSounded::new(&mut self.core)));
        if let Some(pending) = self.gate.mark_ready() {
            self.apply_settings(pending);
        }
    }

    /// Tear everything down and restore the element's original rate
    ///
    /// Safe to call more than once.
    pub fn detach(&mut self) {
        if self.detached {
            return;
        }
        self.detached = true;
        if let Some(strategy) = self.strategy.take() {
            strategy.destroy(&mut self.core);
        }
        if let Err(e) = self.core.element.set_rate(self.original_rate) {
            warn!("Could not restore rate {}: {}", self.original_rate, e);
        }
        self.core.ctx.sink.disconnect(self.id);
        info!("Detached {}", self.id);
    }

    pub fn time_saved(&self) -> TimeSavedTotals {
        self.core.time_saved.totals(self.core.now())
    }

    pub fn telemetry(&self) -> TelemetryRecord {
        let now = self.core.now();
        let element = &self.core.element;
        let mut record = TelemetryRecord {
            unix_time: unix_time_secs(),
            strategy: self.active_strategy(),
            state: self.core.state(),
            intrinsic_time: element.position(),
            element_playback_active: !element.paused() && !element.ended(),
            context_time: now,
            input_volume: 0.0,
            element_rate: element.rate(),
            last_rate_change: self.core.last_rate_change(),
            last_silence_skipping_jump: None,
            pending_jump: None,
            total_output_delay: 0.0,
            delay_from_input_to_stretcher_output: 0.0,
            stretcher_delay: 0.0,
            last_scheduled_stretch_input_time: None,
            estimated_seek_latency: self.core.seek_estimator.next_estimate(),
            time_saved: self.core.time_saved.totals(now),
        };
        if let Some(strategy) = self.strategy.as_ref() {
            strategy.fill_telemetry(&self.core, &mut record);
        }
        record
    }
}

impl Drop for ElementController {
    fn drop(&mut self) {
        self.detach();
    }
}
