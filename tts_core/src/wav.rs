use std::io::Cursor;

use base64::{engine::general_purpose, Engine as _};

use crate::backend::Waveform;
use crate::error::{Result, SynthesisError};
use crate::tokens::CodecConfig;

/// A finished 16-bit mono PCM WAV file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub bytes: Vec<u8>,
    pub sample_rate: u32,
    pub num_samples: usize,
}

impl AudioArtifact {
    pub fn duration_ms(&self) -> u64 {
        (self.num_samples as u64 * 1000) / u64::from(self.sample_rate.max(1))
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Turns raw decoder output into a deliverable WAV file.
#[derive(Debug, Clone)]
pub struct AudioPostProcessor {
    warmup_samples: usize,
    sample_rate: u32,
}

impl AudioPostProcessor {
    pub fn new(codec: &CodecConfig) -> Self {
        Self {
            warmup_samples: codec.warmup_samples,
            sample_rate: codec.sample_rate,
        }
    }

    pub fn finalize(&self, waveform: Waveform) -> Result<AudioArtifact> {
        if waveform.sample_rate != self.sample_rate {
            return Err(SynthesisError::Decoder(anyhow::anyhow!(
                "decoder returned {} Hz audio, expected {} Hz",
                waveform.sample_rate,
                self.sample_rate
            )));
        }
        if waveform.samples.iter().any(|s| !s.is_finite()) {
            return Err(SynthesisError::Decoder(anyhow::anyhow!(
                "decoder returned non-finite samples"
            )));
        }

        let mut samples = waveform.samples;
        trim_warmup(&mut samples, self.warmup_samples);
        peak_normalize(&mut samples);
        let pcm = quantize(&samples);
        let bytes = encode_wav(&pcm, self.sample_rate)?;

        Ok(AudioArtifact {
            bytes,
            sample_rate: self.sample_rate,
            num_samples: pcm.len(),
        })
    }
}

/// Drops the decoder's warmup samples, unless that would leave nothing.
pub fn trim_warmup(samples: &mut Vec<f32>, warmup: usize) {
    if samples.len() > warmup {
        samples.drain(..warmup);
    }
}

/// Scales so the loudest sample hits full scale; silence is left alone.
pub fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak > 0.0 {
        for s in samples.iter_mut() {
            *s /= peak;
        }
    }
}

/// `round(x * 32767)`, clamped to the i16 range.
pub fn quantize(samples: &[f32]) -> Vec<i16> {
    const I16_MAX_F32: f32 = i16::MAX as f32;
    samples
        .iter()
        .map(|&s| (s * I16_MAX_F32).round().clamp(i16::MIN as f32, I16_MAX_F32) as i16)
        .collect()
}

/// Serialize 16-bit mono PCM as a RIFF/WAVE file.
pub fn encode_wav(pcm: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // 44-byte header plus two bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + pcm.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in pcm {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
