//! Deterministic driver for a controller attached to a simulated element
//!
//! Plays the part of the host's event loop: render a block, forward the events
//! the element published, tick the controller. Time only moves when a block is
//! rendered, so runs are reproducible.

use crate::audio::clock::Clock;
use crate::context::EngineContext;
use crate::controller::ElementController;
use crate::element::{ElementEvent, PlaybackElement};
use crate::sim::element::SimulatedElement;
use jcut_common::events::TimeSavedTotals;
use jcut_common::{RealTime, Settings};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, warn};

pub struct SimulationRun {
    element: Arc<SimulatedElement>,
    controller: ElementController,
    events: broadcast::Receiver<ElementEvent>,
}

impl SimulationRun {
    /// Attach a controller to `element` with a context of its own
    pub fn attach(element: Arc<SimulatedElement>, settings: Settings) -> Self {
        let ctx = element.context();
        Self::with_context(element, settings, ctx)
    }

    /// Attach within an existing context, sharing its sink
    pub fn with_context(element: Arc<SimulatedElement>, settings: Settings, ctx: EngineContext) -> Self {
        let events = element.subscribe();
        let shared: Arc<dyn PlaybackElement> = element.clone();
        let controller = ElementController::new(shared, settings, ctx);
        Self {
            element,
            controller,
            events,
        }
    }

    pub fn element(&self) -> &Arc<SimulatedElement> {
        &self.element
    }

    pub fn controller(&self) -> &ElementController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ElementController {
        &mut self.controller
    }

    pub fn now(&self) -> RealTime {
        self.element.clock().now()
    }

    /// Render one block and let the controller react to it
    pub fn step(&mut self) {
        self.element.render_block();
        loop {
            match self.events.try_recv() {
                Ok(event) => self.controller.handle_event(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Simulation dropped {} element events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        self.controller.tick();
    }

    /// Step until `seconds` of pipeline time have passed
    pub fn run_for(&mut self, seconds: f64) {
        let until = self.now() + seconds;
        while self.now() < until {
            self.step();
        }
    }

    /// Step until the element reaches the end of its media
    ///
    /// Gives up after `limit` seconds of pipeline time; returns whether the end
    /// was reached.
    pub fn run_until_ended(&mut self, limit: f64) -> bool {
        let until = self.now() + limit;
        while !self.element.ended() {
            if self.now() >= until {
                debug!("Simulation stopped at limit {:.1}s before the end", limit);
                return false;
            }
            self.step();
        }
        true
    }

    pub fn detach(&mut self) {
        self.controller.detach();
    }

    /// Detach and return the final time-saved totals
    pub fn finish(mut self) -> TimeSavedTotals {
        let totals = self.controller.time_saved();
        self.controller.detach();
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::element::SimOptions;
    use crate::sim::media::{Segment, SimulatedMedia};
    use jcut_common::{AveragingMethod, StrategyKind};

    #[test]
    fn test_run_until_ended_always_sounded() {
        let media = SimulatedMedia::from_segments(8000, 1, &[Segment::sounded(1.0), Segment::silence(1.0)]);
        let element = SimulatedElement::new(media, SimOptions::default());
        let settings = Settings {
            strategy: StrategyKind::AlwaysSounded,
            time_saved_averaging: AveragingMethod::AllTime,
            ..Settings::default()
        };
        let mut run = SimulationRun::attach(element, settings);
        assert!(run.run_until_ended(10.0));

        let totals = run.finish();
        // Whole file at the default sounded speed
        assert!((totals.would_have_lasted_if_intrinsic - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_limit_stops_run() {
        let media = SimulatedMedia::from_segments(8000, 1, &[Segment::sounded(10.0)]);
        let element = SimulatedElement::new(media, SimOptions::default());
        let mut run = SimulationRun::attach(element, Settings::default());
        assert!(!run.run_until_ended(1.0));
        assert!(run.now() >= 1.0);
    }
}
