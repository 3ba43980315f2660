//! Minimal WAV (RIFF/PCM) container writing.

/// Wrap raw 16-bit PCM in a WAV container.
pub fn pcm_to_wav(pcm: &[i16], sample_rate: u32, channels: u16, bits_per_sample: u16) -> Vec<u8> {
    let data_len = pcm.len() * 2; // 2 bytes per i16 sample
    let byte_rate = sample_rate * channels as u32 * bits_per_sample as u32 / 8;
    let block_align = channels * bits_per_sample / 8;
    let file_size = 36 + data_len as u32;

    let mut wav = Vec::with_capacity(44 + data_len);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&file_size.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_len as u32).to_le_bytes());
    for &sample in pcm {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

/// A mono 16 kHz tone of the given length, handy as a stand-in recording.
pub fn tone_wav(duration_secs: f32, frequency_hz: f32) -> Vec<u8> {
    const SAMPLE_RATE: u32 = 16_000;
    let samples = (duration_secs * SAMPLE_RATE as f32) as usize;
    let pcm: Vec<i16> = (0..samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            ((t * frequency_hz * std::f32::consts::TAU).sin() * 8_000.0) as i16
        })
        .collect();
    pcm_to_wav(&pcm, SAMPLE_RATE, 1, 16)
}

/// True if `bytes` start with a RIFF/WAVE header.
pub fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}
