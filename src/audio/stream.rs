use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, StreamConfig};
use crossbeam::channel;
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::tone::{SilentTones, Tone, ToneSink, VoiceBank};

/// Pending tone requests between the game and the output callback.
const REQUEST_QUEUE_CAPACITY: usize = 64;

/// How long to wait for the output thread to open the device.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct VoiceRequest {
    tone: Tone,
    peak: f32,
}

/// Process-wide output device. The cpal stream itself lives on a
/// keep-alive thread; only the request queue is shared.
struct ToneDevice {
    requests: Mutex<Producer<VoiceRequest>>,
    device_name: String,
    sample_rate: u32,
}

static DEVICE: OnceLock<Option<ToneDevice>> = OnceLock::new();

fn shared_device() -> Option<&'static ToneDevice> {
    DEVICE
        .get_or_init(|| match open_device() {
            Ok(device) => {
                info!(
                    device = %device.device_name,
                    sample_rate = device.sample_rate,
                    "audio output ready"
                );
                Some(device)
            }
            Err(e) => {
                warn!(error = %e, "audio output unavailable, tones disabled");
                None
            }
        })
        .as_ref()
}

fn open_device() -> Result<ToneDevice> {
    let (producer, consumer) = RingBuffer::<VoiceRequest>::new(REQUEST_QUEUE_CAPACITY);
    let (ready_sender, ready_receiver) = channel::bounded::<Result<(String, u32)>>(1);

    thread::Builder::new()
        .name("tone-output".to_string())
        .spawn(move || match build_output_stream(consumer) {
            Ok((stream, device_name, sample_rate)) => {
                let _ = ready_sender.send(Ok((device_name, sample_rate)));
                // Keep the stream alive for the rest of the process
                let _stream = stream;
                loop {
                    thread::park();
                }
            }
            Err(e) => {
                let _ = ready_sender.send(Err(e));
            }
        })
        .context("spawning audio output thread")?;

    let (device_name, sample_rate) = ready_receiver
        .recv_timeout(OPEN_TIMEOUT)
        .context("audio output thread did not report back")??;

    Ok(ToneDevice {
        requests: Mutex::new(producer),
        device_name,
        sample_rate,
    })
}

fn build_output_stream(
    mut requests: Consumer<VoiceRequest>,
) -> Result<(cpal::Stream, String, u32)> {
    let host = cpal::default_host();

    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow!("No output device available"))?;
    let output_default = device.default_output_config()?;

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let config = StreamConfig {
        channels: output_default.channels(),
        sample_rate: output_default.sample_rate(),
        buffer_size: BufferSize::Default,
    };
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    debug!(
        device = %device_name,
        sample_rate,
        channels,
        format = ?output_default.sample_format(),
        "opening output stream"
    );

    let mut bank = VoiceBank::new(sample_rate);

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            while let Ok(request) = requests.pop() {
                bank.start(request.tone, request.peak);
            }
            bank.render(data, channels);
        },
        move |err| {
            warn!(error = %err, "output stream error");
        },
        None,
    )?;

    stream.play()?;

    Ok((stream, device_name, sample_rate))
}

/// Tones played on the default output device.
pub struct AudioTones {
    device: &'static ToneDevice,
    volume: f32,
}

impl AudioTones {
    /// Attach to the shared output device, opening it on first use.
    pub fn open(volume: f32) -> Result<Self> {
        let device = shared_device().ok_or_else(|| anyhow!("No audio output available"))?;
        Ok(Self {
            device,
            volume: volume.clamp(0.0, 1.0),
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.device.sample_rate
    }
}

impl ToneSink for AudioTones {
    fn emit(&self, tone: Tone) {
        if !tone.is_audible() {
            return;
        }
        // Never wait on the lock or a full queue; drop the tone instead
        if let Ok(mut requests) = self.device.requests.try_lock() {
            let _ = requests.push(VoiceRequest {
                tone,
                peak: self.volume,
            });
        }
    }
}

/// Pick the tone sink for this run: real output when enabled and available,
/// silence otherwise. Also returns a device label with its rate for display.
pub fn open_tone_sink(enabled: bool, volume: f32) -> (Box<dyn ToneSink>, Option<String>) {
    if !enabled {
        debug!("audio disabled, using silent tones");
        return (Box::new(SilentTones), None);
    }

    match AudioTones::open(volume) {
        Ok(tones) => {
            let name = format!("{} @ {} Hz", tones.device_name(), tones.sample_rate());
            (Box::new(tones), Some(name))
        }
        Err(e) => {
            warn!(error = %e, "falling back to silent tones");
            (Box::new(SilentTones), None)
        }
    }
}
