//! Simulated playback element
//!
//! Plays [`SimulatedMedia`] against a [`ManualClock`]: every call to
//! [`SimulatedElement::render_block`] advances the clock by one block, renders
//! that block through the connected processors, and publishes element events
//! the way a media element would (position updates, seek start / completion,
//! pause, end).
//!
//! Shadows created from the element share its media and clock and are rendered
//! in the same call, muted.

use crate::audio::clock::{Clock, ManualClock};
use crate::audio::sink::AudioSink;
use crate::audio::types::AudioBlock;
use crate::context::EngineContext;
use crate::element::{BlockProcessor, ElementEvent, PlaybackElement, ShadowPlayback, Subscription};
use crate::error::{Error, Result};
use crate::sim::media::SimulatedMedia;
use jcut_common::{MediaTime, RealTime};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 1024;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Frames per rendered block
    pub block_frames: usize,
    /// Time a seek takes before playback continues (s)
    pub seek_latency: f64,
    /// Audio of the source cannot be tapped by processors
    pub restricted: bool,
    pub shadow_support: bool,
    /// Time a new shadow needs before it is ready (s)
    pub shadow_load_delay: f64,
    /// Spacing of position updates (s)
    pub position_event_interval: f64,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            block_frames: 128,
            seek_latency: 0.0,
            restricted: false,
            shadow_support: true,
            shadow_load_delay: 0.05,
            position_event_interval: 1.0 / 60.0,
        }
    }
}

/// Processors connected to one playback, run in connection order
#[derive(Default)]
struct ProcessorChain {
    next_id: AtomicU64,
    processors: Mutex<Vec<(u64, Box<dyn BlockProcessor>)>>,
}

impl ProcessorChain {
    fn connect(self: &Arc<Self>, label: &'static str, processor: Box<dyn BlockProcessor>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.processors).push((id, processor));
        let chain: Weak<ProcessorChain> = Arc::downgrade(self);
        Subscription::new(label, move || {
            if let Some(chain) = chain.upgrade() {
                lock(&chain.processors).retain(|(existing, _)| *existing != id);
            }
        })
    }

    fn run(&self, block: &mut AudioBlock<'_>) {
        for (_, processor) in lock(&self.processors).iter_mut() {
            processor.process(block);
        }
    }

    fn len(&self) -> usize {
        lock(&self.processors).len()
    }
}

/// Position and transport state of one playback
#[derive(Debug, Clone)]
struct Playhead {
    position: MediaTime,
    rate: f64,
    paused: bool,
    ended: bool,
    seeking_until: Option<RealTime>,
    /// Intervals of media time rendered so far
    played: Vec<(MediaTime, MediaTime)>,
}

impl Playhead {
    fn new(position: MediaTime, paused: bool) -> Self {
        Self {
            position,
            rate: 1.0,
            paused,
            ended: false,
            seeking_until: None,
            played: vec![(position, position)],
        }
    }

    fn seek(&mut self, position: MediaTime, duration: MediaTime) {
        self.position = position.clamp(0.0, duration);
        self.ended = self.position >= duration;
        self.played.push((self.position, self.position));
    }

    fn played_contains(&self, time: MediaTime) -> bool {
        self.played.iter().any(|(start, end)| *start <= time && time <= *end)
    }

    fn can_render(&self) -> bool {
        !self.paused && !self.ended && self.seeking_until.is_none()
    }

    /// Fill `scratch` with the next block and advance; returns false if nothing played
    fn render(&mut self, media: &SimulatedMedia, frames: usize, scratch: &mut Vec<f32>) -> bool {
        if !self.can_render() {
            return false;
        }
        let channels = media.channels().max(1) as usize;
        let step = self.rate / f64::from(media.sample_rate());
        scratch.clear();
        for i in 0..frames {
            let frame = media.frame_at(self.position + i as f64 * step);
            scratch.extend_from_slice(&frame[..channels.min(frame.len())]);
        }

        self.position += frames as f64 * step;
        if self.position >= media.duration() {
            self.position = media.duration();
            self.ended = true;
            self.paused = true;
        }
        if let Some(current) = self.played.last_mut() {
            current.1 = current.1.max(self.position);
        }
        true
    }
}

struct ShadowInner {
    media: Arc<SimulatedMedia>,
    clock: Arc<ManualClock>,
    playhead: Mutex<Playhead>,
    chain: Arc<ProcessorChain>,
    ready_at: RealTime,
}

pub struct SimulatedElement {
    media: Mutex<Arc<SimulatedMedia>>,
    clock: Arc<ManualClock>,
    options: SimOptions,
    playhead: Mutex<Playhead>,
    chain: Arc<ProcessorChain>,
    events: broadcast::Sender<ElementEvent>,
    shadows: Mutex<Vec<Weak<ShadowInner>>>,
    scratch: Mutex<Vec<f32>>,
    last_position_event: Mutex<RealTime>,
}

impl SimulatedElement {
    /// Element playing `media` from the start
    pub fn new(media: SimulatedMedia, options: SimOptions) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let capacity = options.block_frames * media.channels().max(1) as usize;
        Arc::new(Self {
            media: Mutex::new(Arc::new(media)),
            clock: Arc::new(ManualClock::new(0.0)),
            options,
            playhead: Mutex::new(Playhead::new(0.0, false)),
            chain: Arc::new(ProcessorChain::default()),
            events,
            shadows: Mutex::new(Vec::new()),
            scratch: Mutex::new(Vec::with_capacity(capacity)),
            last_position_event: Mutex::new(0.0),
        })
    }

    /// Context sharing this element's clock and a fresh sink
    pub fn context(&self) -> EngineContext {
        EngineContext::new(self.clock.clone(), Arc::new(AudioSink::new()))
    }

    pub fn clock(&self) -> Arc<ManualClock> {
        Arc::clone(&self.clock)
    }

    pub fn options(&self) -> &SimOptions {
        &self.options
    }

    fn media(&self) -> Arc<SimulatedMedia> {
        Arc::clone(&lock(&self.media))
    }

    pub fn block_duration(&self) -> f64 {
        self.options.block_frames as f64 / f64::from(self.media().sample_rate())
    }

    pub fn processor_count(&self) -> usize {
        self.chain.len()
    }

    pub fn live_shadows(&self) -> usize {
        lock(&self.shadows).iter().filter(|s| s.strong_count() > 0).count()
    }

    fn emit(&self, event: ElementEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }

    pub fn play(&self) {
        let mut playhead = lock(&self.playhead);
        if playhead.paused && !playhead.ended {
            playhead.paused = false;
            drop(playhead);
            self.emit(ElementEvent::Resumed);
        }
    }

    pub fn pause(&self) {
        let mut playhead = lock(&self.playhead);
        if !playhead.paused {
            playhead.paused = true;
            drop(playhead);
            self.emit(ElementEvent::Paused);
        }
    }

    /// Swap the source; playback restarts at zero
    pub fn load(&self, media: SimulatedMedia) {
        *lock(&self.media) = Arc::new(media);
        {
            let mut playhead = lock(&self.playhead);
            let paused = playhead.paused;
            let rate = playhead.rate;
            *playhead = Playhead::new(0.0, paused);
            playhead.rate = rate;
        }
        debug!("Simulated source changed");
        self.emit(ElementEvent::SourceChanged);
    }

    /// Render one block of primary and shadow audio and advance the clock
    pub fn render_block(&self) {
        let start = self.clock.now();
        let duration = self.block_duration();
        let media = self.media();
        let channels = media.channels().max(1);
        let mut scratch = lock(&self.scratch);

        let mut events = Vec::new();
        let (rendered, position) = {
            let mut playhead = lock(&self.playhead);
            if playhead.seeking_until.map_or(false, |until| until <= start) {
                playhead.seeking_until = None;
                events.push(ElementEvent::SeekCompleted);
            }
            let was_ended = playhead.ended;
            let rendered = playhead.render(&media, self.options.block_frames, &mut scratch);
            if playhead.ended && !was_ended {
                events.push(ElementEvent::Paused);
                events.push(ElementEvent::Ended);
            }
            (rendered, playhead.position)
        };

        if rendered && !self.options.restricted {
            let mut block = AudioBlock::new(start, media.sample_rate(), channels, &mut scratch[..]);
            self.chain.run(&mut block);
        }

        lock(&self.shadows).retain(|weak| match weak.upgrade() {
            Some(shadow) => {
                render_shadow(&shadow, start, self.options.block_frames, &mut scratch);
                true
            }
            None => false,
        });
        drop(scratch);

        let end = start + duration;
        self.clock.set(end);

        if rendered {
            let mut last = lock(&self.last_position_event);
            if end - *last >= self.options.position_event_interval {
                *last = end;
                events.push(ElementEvent::PositionAdvanced { position });
            }
        }
        for event in events {
            self.emit(event);
        }
    }
}

fn render_shadow(shadow: &ShadowInner, start: RealTime, frames: usize, scratch: &mut Vec<f32>) {
    if start < shadow.ready_at {
        return;
    }
    let rendered = lock(&shadow.playhead).render(&shadow.media, frames, scratch);
    if rendered {
        let channels = shadow.media.channels().max(1);
        let mut block = AudioBlock::new(start, shadow.media.sample_rate(), channels, &mut scratch[..]);
        shadow.chain.run(&mut block);
    }
}

impl PlaybackElement for SimulatedElement {
    fn position(&self) -> MediaTime {
        lock(&self.playhead).position
    }

    fn set_position(&self, position: MediaTime) -> Result<()> {
        if !position.is_finite() {
            return Err(Error::Element(format!("invalid position {}", position)));
        }
        let duration = self.media().duration();
        let now = self.clock.now();
        let completed = {
            let mut playhead = lock(&self.playhead);
            playhead.seek(position, duration);
            if self.options.seek_latency > 0.0 {
                playhead.seeking_until = Some(now + self.options.seek_latency);
                false
            } else {
                true
            }
        };
        self.emit(ElementEvent::SeekStarted);
        if completed {
            self.emit(ElementEvent::SeekCompleted);
        }
        Ok(())
    }

    fn rate(&self) -> f64 {
        lock(&self.playhead).rate
    }

    fn set_rate(&self, rate: f64) -> Result<()> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(Error::Element(format!("invalid rate {}", rate)));
        }
        lock(&self.playhead).rate = rate;
        Ok(())
    }

    fn paused(&self) -> bool {
        lock(&self.playhead).paused
    }

    fn ended(&self) -> bool {
        lock(&self.playhead).ended
    }

    fn duration(&self) -> Option<MediaTime> {
        Some(self.media().duration())
    }

    fn sample_rate(&self) -> u32 {
        self.media().sample_rate()
    }

    fn channel_count(&self) -> u16 {
        self.media().channels()
    }

    fn source_restricted(&self) -> bool {
        self.options.restricted
    }

    fn subscribe(&self) -> broadcast::Receiver<ElementEvent> {
        self.events.subscribe()
    }

    fn connect_processor(&self, processor: Box<dyn BlockProcessor>) -> Result<Subscription> {
        if self.options.restricted {
            return Err(Error::AudioPipeline("source is restricted, audio cannot be tapped".to_string()));
        }
        Ok(self.chain.connect("primary processor", processor))
    }

    fn create_shadow(&self) -> Result<Box<dyn ShadowPlayback>> {
        if !self.options.shadow_support {
            return Err(Error::ShadowUnavailable("element cannot create shadow playback".to_string()));
        }
        let inner = Arc::new(ShadowInner {
            media: self.media(),
            clock: Arc::clone(&self.clock),
            playhead: Mutex::new(Playhead::new(0.0, true)),
            chain: Arc::new(ProcessorChain::default()),
            ready_at: self.clock.now() + self.options.shadow_load_delay,
        });
        lock(&self.shadows).push(Arc::downgrade(&inner));
        Ok(Box::new(SimulatedShadow { inner }))
    }
}

/// Muted shadow of a [`SimulatedElement`]
pub struct SimulatedShadow {
    inner: Arc<ShadowInner>,
}

impl ShadowPlayback for SimulatedShadow {
    fn position(&self) -> MediaTime {
        lock(&self.inner.playhead).position
    }

    fn set_position(&self, position: MediaTime) -> Result<()> {
        if !position.is_finite() {
            return Err(Error::ShadowUnavailable(format!("invalid position {}", position)));
        }
        lock(&self.inner.playhead).seek(position, self.inner.media.duration());
        Ok(())
    }

    fn rate(&self) -> f64 {
        lock(&self.inner.playhead).rate
    }

    fn set_rate(&self, rate: f64) -> Result<()> {
        if !(rate > 0.0 && rate.is_finite()) {
            return Err(Error::ShadowUnavailable(format!("invalid rate {}", rate)));
        }
        lock(&self.inner.playhead).rate = rate;
        Ok(())
    }

    fn play(&self) -> Result<()> {
        let mut playhead = lock(&self.inner.playhead);
        if !playhead.ended {
            playhead.paused = false;
        }
        Ok(())
    }

    fn pause(&self) {
        lock(&self.inner.playhead).paused = true;
    }

    fn paused(&self) -> bool {
        lock(&self.inner.playhead).paused
    }

    fn ended(&self) -> bool {
        lock(&self.inner.playhead).ended
    }

    fn duration(&self) -> Option<MediaTime> {
        Some(self.inner.media.duration())
    }

    fn ready(&self) -> bool {
        self.inner.clock.now() >= self.inner.ready_at
    }

    fn played_contains(&self, time: MediaTime) -> bool {
        lock(&self.inner.playhead).played_contains(time)
    }

    fn sample_rate(&self) -> u32 {
        self.inner.media.sample_rate()
    }

    fn connect_processor(&self, processor: Box<dyn BlockProcessor>) -> Result<Subscription> {
        Ok(self.inner.chain.connect("shadow processor", processor))
    }
}
