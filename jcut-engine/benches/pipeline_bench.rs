//! Real-time Hot Path Benchmark
//!
//! Measures one audio block through the processors that run on the audio
//! domain: volume smoother + silence classifier, and the stretcher node.
//!
//! **Target:** well above 100x realtime per processor at 48 kHz stereo

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jcut_common::events::SilenceEvent;
use jcut_engine::audio::analysis::{AnalysisControls, AnalysisProcessor};
use jcut_engine::audio::event_channel::EventChannel;
use jcut_engine::audio::types::AudioBlock;
use jcut_engine::audio::volume::STRETCHING_SMOOTHING_WINDOW;
use jcut_engine::stretch::{PitchBranch, StretchCommand, StretchSchedule, StretcherNode};
use jcut_engine::BlockProcessor;

const SAMPLE_RATE: u32 = 48_000;
const CHANNELS: u16 = 2;

/// Alternating loud / quiet stereo signal, one second long
fn test_signal() -> Vec<f32> {
    let frames = SAMPLE_RATE as usize;
    let mut samples = Vec::with_capacity(frames * CHANNELS as usize);
    for i in 0..frames {
        let t = i as f32 / SAMPLE_RATE as f32;
        let amplitude = if (i / 4800) % 2 == 0 { 0.5 } else { 0.0 };
        let value = amplitude * (std::f32::consts::TAU * 220.0 * t).sin();
        samples.push(value);
        samples.push(value);
    }
    samples
}

fn bench_block_processors(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_processors");
    let signal = test_signal();

    for block_frames in [128usize, 1024] {
        let block_len = block_frames * CHANNELS as usize;
        let block_secs = block_frames as f64 / f64::from(SAMPLE_RATE);

        group.bench_with_input(BenchmarkId::new("analysis", block_frames), &block_len, |b, &len| {
            let controls = AnalysisControls::new(0.005, 0.1);
            let (producer, mut consumer) = EventChannel::<SilenceEvent>::new(Some(256)).split();
            let mut processor =
                AnalysisProcessor::classifying(STRETCHING_SMOOTHING_WINDOW, SAMPLE_RATE, controls, producer);
            let mut buffer = vec![0.0f32; len];
            let mut offset = 0;
            let mut time = 0.0;
            b.iter(|| {
                buffer.copy_from_slice(&signal[offset..offset + len]);
                offset = (offset + len) % (signal.len() - len);
                let mut block = AudioBlock::new(time, SAMPLE_RATE, CHANNELS, &mut buffer);
                processor.process(&mut block);
                time += block_secs;
                while let Some(event) = consumer.pop() {
                    black_box(event);
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("stretcher", block_frames), &block_len, |b, &len| {
            let (mut commands, consumer) = EventChannel::<StretchCommand>::new(Some(64)).split();
            let mut node = StretcherNode::new(0.5, 0.05, 0.01, SAMPLE_RATE, CHANNELS, consumer);
            commands.push(StretchCommand::Stretch {
                schedule: StretchSchedule {
                    start_time: 0.0,
                    end_time: 1e6,
                    start_delay: 0.05,
                    end_delay: 0.0,
                    branch: PitchBranch::SpeedUp,
                },
                semitones: 3.0,
            });
            let mut buffer = vec![0.0f32; len];
            let mut offset = 0;
            let mut time = 0.0;
            b.iter(|| {
                buffer.copy_from_slice(&signal[offset..offset + len]);
                offset = (offset + len) % (signal.len() - len);
                let mut block = AudioBlock::new(time, SAMPLE_RATE, CHANNELS, &mut buffer);
                node.process(&mut block);
                time += block_secs;
                black_box(&buffer);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_block_processors);
criterion_main!(benches);
