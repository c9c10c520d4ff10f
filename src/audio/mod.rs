pub mod stream;
pub mod tone;

pub use stream::{AudioTones, open_tone_sink};
pub use tone::{SilentTones, Tone, ToneSink, ToneVoice, VoiceBank};
