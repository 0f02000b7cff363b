//! Audio device adapter: drives the engine's processor from a cpal output
//! stream.
//!
//! The adapter owns the sample-rate / block-size lifecycle: it negotiates a
//! device configuration, prepares nothing itself (the engine must already
//! be prepared for the agreed rate and block size), chunks the device's
//! callback buffers into engine-sized blocks, and interleaves the engine's
//! deinterleaved output into the device layout. Callback duration is
//! measured against the buffer deadline; overruns increment the xrun
//! telemetry counter and processing continues — a late buffer is still a
//! finished buffer.

use crate::engine::AudioProcessor;
use crate::telemetry::Telemetry;
use crate::Error;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Extract a human-readable device name.
fn device_name(device: &Device) -> String {
    device
        .description()
        .map(|d| d.name().to_string())
        .unwrap_or_else(|_| "<unknown>".to_string())
}

/// A running output stream wrapping an [`AudioProcessor`].
///
/// Dropping the driver stops the stream; the processor is consumed by the
/// callback and lives as long as the stream does.
pub struct AudioDriver {
    stream: Stream,
    device_label: String,
    sample_rate: u32,
}

impl AudioDriver {
    /// Open the default output device and start processing.
    ///
    /// `block_size` must match what the engine was prepared with; device
    /// buffers are processed in chunks of exactly this many frames, with a
    /// ragged tail allowed at the end of each device callback.
    pub fn start(
        mut processor: AudioProcessor,
        sample_rate: u32,
        block_size: usize,
        telemetry: Arc<Telemetry>,
    ) -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(Error::NoDevice)?;
        let device_label = device_name(&device);

        let config = device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        let channels = config.channels() as usize;

        // Deadline for one engine block at the configured rate.
        let block_budget =
            Duration::from_secs_f64(block_size as f64 / f64::from(sample_rate));

        let mut block_l = vec![0.0_f32; block_size];
        let mut block_r = vec![0.0_f32; block_size];

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let frames = data.len() / channels.max(1);
                    let mut frame = 0;
                    while frame < frames {
                        let n = block_size.min(frames - frame);
                        let started = Instant::now();

                        processor.process(&mut block_l[..n], &mut block_r[..n]);

                        if started.elapsed() > block_budget {
                            telemetry.count_xrun();
                        }

                        interleave_into(
                            &block_l[..n],
                            &block_r[..n],
                            &mut data[frame * channels..(frame + n) * channels],
                            channels,
                        );
                        frame += n;
                    }
                },
                |err| tracing::error!("output stream error: {err}"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(device = %device_label, sample_rate, block_size, "audio stream started");

        Ok(Self {
            stream,
            device_label,
            sample_rate,
        })
    }

    /// Pause the stream (the device callback stops firing).
    pub fn pause(&self) -> Result<(), Error> {
        self.stream
            .pause()
            .map_err(|e| Error::Stream(e.to_string()))
    }

    /// Resume a paused stream.
    pub fn resume(&self) -> Result<(), Error> {
        self.stream.play().map_err(|e| Error::Stream(e.to_string()))
    }

    /// Name of the output device in use.
    pub fn device_label(&self) -> &str {
        &self.device_label
    }

    /// Stream sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Interleave deinterleaved L/R into a device buffer with any channel
/// count: mono mixes down, stereo maps directly, extra channels stay
/// silent.
fn interleave_into(left: &[f32], right: &[f32], output: &mut [f32], channels: usize) {
    match channels {
        0 => {}
        1 => {
            for (i, (l, r)) in left.iter().zip(right.iter()).enumerate() {
                output[i] = (l + r) * 0.5;
            }
        }
        _ => {
            for i in 0..left.len() {
                let idx = i * channels;
                output[idx] = left[i];
                output[idx + 1] = right[i];
                for c in 2..channels {
                    output[idx + c] = 0.0;
                }
            }
        }
    }
}
