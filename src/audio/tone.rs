// src/audio/tone.rs
// Short decaying sine tones used for beat playback and tap feedback

use std::f32::consts::TAU;

/// Level a voice has decayed to when its duration runs out.
pub const SILENCE_FLOOR: f32 = 0.01;

/// Most voices mixed at once; extra requests are dropped.
pub const MAX_VOICES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub duration_secs: f32,
}

impl Tone {
    pub const DEFAULT_DURATION_SECS: f32 = 0.2;

    pub fn new(frequency_hz: f32) -> Self {
        Self::with_duration(frequency_hz, Self::DEFAULT_DURATION_SECS)
    }

    pub fn with_duration(frequency_hz: f32, duration_secs: f32) -> Self {
        Self {
            frequency_hz,
            duration_secs,
        }
    }

    /// Both pitch and length must be positive to produce sound.
    pub fn is_audible(&self) -> bool {
        self.frequency_hz > 0.0 && self.duration_secs > 0.0
    }
}

/// Anything that can sound a tone right now.
///
/// Implementations must return immediately and must not fail; a tone that
/// cannot be played is simply dropped.
pub trait ToneSink {
    fn emit(&self, tone: Tone);
}

/// Sink used when there is no audio output.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentTones;

impl ToneSink for SilentTones {
    fn emit(&self, _tone: Tone) {}
}

/// One sounding tone: full volume at onset, exponential decay to
/// [`SILENCE_FLOOR`] at the end of its duration.
#[derive(Debug, Clone)]
pub struct ToneVoice {
    phase: f32,
    phase_step: f32,
    gain: f32,
    decay: f32,
    remaining: u32,
}

impl ToneVoice {
    pub fn new(tone: Tone, peak: f32, sample_rate: u32) -> Self {
        let total = ((tone.duration_secs * sample_rate as f32).round() as u32).max(1);
        let peak = peak.max(0.0);
        let floor = SILENCE_FLOOR.min(peak);
        let decay = if peak > 0.0 {
            (floor / peak).powf(1.0 / total as f32)
        } else {
            0.0
        };

        Self {
            phase: 0.0,
            phase_step: tone.frequency_hz / sample_rate as f32,
            gain: peak,
            decay,
            remaining: total,
        }
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.remaining == 0 {
            return 0.0;
        }

        let sample = (self.phase * TAU).sin() * self.gain;

        self.phase += self.phase_step;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.gain *= self.decay;
        self.remaining -= 1;

        sample
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0
    }
}

/// Fixed-capacity set of voices rendered by the output callback.
pub struct VoiceBank {
    voices: Vec<ToneVoice>,
    sample_rate: u32,
}

impl VoiceBank {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            sample_rate,
        }
    }

    /// Start a voice; returns false when the tone is inaudible or the bank is full.
    pub fn start(&mut self, tone: Tone, peak: f32) -> bool {
        if !tone.is_audible() || self.voices.len() >= MAX_VOICES {
            return false;
        }
        self.voices
            .push(ToneVoice::new(tone, peak, self.sample_rate));
        true
    }

    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Mix all voices into an interleaved buffer, same sample on every channel.
    pub fn render(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);

        for frame in data.chunks_mut(channels) {
            let mixed: f32 = self.voices.iter_mut().map(ToneVoice::next_sample).sum();
            frame.fill(mixed.clamp(-1.0, 1.0));
        }

        self.voices.retain(|voice| !voice.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_starts_at_peak_and_decays_to_floor() {
        let sample_rate = 48_000;
        let mut voice = ToneVoice::new(Tone::with_duration(800.0, 0.15), 0.3, sample_rate);
        assert!((voice.gain() - 0.3).abs() < 1e-6);

        let total = (0.15 * sample_rate as f32).round() as usize;
        for _ in 0..total {
            voice.next_sample();
        }

        assert!(voice.is_finished());
        assert!((voice.gain() - SILENCE_FLOOR).abs() < 1e-3);
        assert_eq!(voice.next_sample(), 0.0);
    }

    #[test]
    fn test_voice_gain_never_increases() {
        let mut voice = ToneVoice::new(Tone::new(200.0), 0.3, 44_100);
        let mut last = voice.gain();
        while !voice.is_finished() {
            voice.next_sample();
            assert!(voice.gain() <= last);
            last = voice.gain();
        }
    }

    #[test]
    fn test_default_duration() {
        let tone = Tone::new(440.0);
        assert_eq!(tone.duration_secs, Tone::DEFAULT_DURATION_SECS);
        assert!(tone.is_audible());
        assert!(!Tone::with_duration(440.0, 0.0).is_audible());
        assert!(!Tone::with_duration(-1.0, 0.2).is_audible());
    }

    #[test]
    fn test_bank_renders_and_retires_voices() {
        let mut bank = VoiceBank::new(1_000);
        assert!(bank.start(Tone::with_duration(100.0, 0.01), 0.3));
        assert_eq!(bank.active(), 1);

        // 10 frames of stereo covers the whole 10-sample voice.
        let mut data = vec![0.0f32; 20];
        bank.render(&mut data, 2);

        assert_eq!(bank.active(), 0);
        for frame in data.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
        assert!(data.iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn test_bank_rejects_when_full() {
        let mut bank = VoiceBank::new(44_100);
        for _ in 0..MAX_VOICES {
            assert!(bank.start(Tone::new(800.0), 0.3));
        }
        assert!(!bank.start(Tone::new(800.0), 0.3));
        assert!(!VoiceBank::new(44_100).start(Tone::with_duration(800.0, 0.0), 0.3));
    }

    #[test]
    fn test_silent_sink_is_noop() {
        SilentTones.emit(Tone::new(800.0));
    }
}
