//! WAV file reading and writing for offline processing

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;

/// Interleaved samples in the engine format that best matches the file
pub enum WavBuffer {
    I16(Vec<i16>),
    /// 24-bit files are widened to full-scale 32-bit
    I32(Vec<i32>),
    F32(Vec<f32>),
}

impl WavBuffer {
    pub fn len(&self) -> usize {
        match self {
            WavBuffer::I16(s) => s.len(),
            WavBuffer::I32(s) => s.len(),
            WavBuffer::F32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read a stereo WAV file
pub fn read(path: &Path) -> Result<(WavSpec, WavBuffer)> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("Failed to open '{}'", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 2 {
        bail!(
            "'{}' has {} channels; only stereo input is supported",
            path.display(),
            spec.channels
        );
    }

    let buffer = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => WavBuffer::I16(
            reader
                .samples::<i16>()
                .collect::<Result<_, _>>()
                .context("Failed to decode 16-bit samples")?,
        ),
        (SampleFormat::Int, 24) => WavBuffer::I32(
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v << 8))
                .collect::<Result<_, _>>()
                .context("Failed to decode 24-bit samples")?,
        ),
        (SampleFormat::Int, 32) => WavBuffer::I32(
            reader
                .samples::<i32>()
                .collect::<Result<_, _>>()
                .context("Failed to decode 32-bit samples")?,
        ),
        (SampleFormat::Float, 32) => WavBuffer::F32(
            reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .context("Failed to decode float samples")?,
        ),
        (format, bits) => bail!("Unsupported sample format {:?} with {} bits", format, bits),
    };
    Ok((spec, buffer))
}

/// Write `buffer` with the layout described by `spec`
pub fn write(path: &Path, spec: WavSpec, buffer: &WavBuffer) -> Result<()> {
    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create '{}'", path.display()))?;

    match buffer {
        WavBuffer::I16(samples) => {
            for s in samples {
                writer.write_sample(*s)?;
            }
        }
        WavBuffer::I32(samples) => {
            let shift = if spec.bits_per_sample == 24 { 8 } else { 0 };
            for s in samples {
                writer.write_sample(*s >> shift)?;
            }
        }
        WavBuffer::F32(samples) => {
            for s in samples {
                writer.write_sample(*s)?;
            }
        }
    }

    writer
        .finalize()
        .with_context(|| format!("Failed to finalize '{}'", path.display()))
}
