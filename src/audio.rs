use std::fs::File;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use hound::WavWriter;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, codecs::CODEC_TYPE_NULL,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};

use crate::types::{AudioBuffer, OutputFormat};

/// Decodes a whole audio file into an interleaved f32 buffer.
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioBuffer> {
    let path: &Path = path.as_ref();

    let file: File =
        File::open(path).with_context(|| format!("failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("failed to probe audio format: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("no audio tracks found")?;

    let track_id = track.id;
    let channels = track
        .codec_params
        .channels
        .map_or(1, |c| c.count())
        .max(1) as u16;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("unknown sample rate")?;
    let bits_per_sample = track.codec_params.bits_per_sample.unwrap_or(16) as u16;

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create audio decoder")?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            // A corrupt packet is skipped, not fatal
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if samples.is_empty() {
        anyhow::bail!("no decodable audio in {}", path.display());
    }

    log::debug!(
        "decoded {}: {} Hz, {} ch, {} bit, {} frames",
        path.display(),
        sample_rate,
        channels,
        bits_per_sample,
        samples.len() / channels as usize
    );

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
        bits_per_sample,
    })
}

/// Writes a buffer as WAV at the width recorded in the buffer (16/24-bit
/// integer or 32-bit float).
pub fn write_wav<P: AsRef<Path>>(path: P, audio: &AudioBuffer) -> Result<()> {
    let path = path.as_ref();
    let (bits, format) = match audio.bits_per_sample {
        32 => (32, hound::SampleFormat::Float),
        24 => (24, hound::SampleFormat::Int),
        _ => (16, hound::SampleFormat::Int),
    };
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: bits,
        sample_format: format,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("failed to create wav file: {}", path.display()))?;
    match (bits, format) {
        (32, hound::SampleFormat::Float) => {
            for sample in &audio.samples {
                writer.write_sample(sample.clamp(-1.0, 1.0))?;
            }
        }
        (24, _) => {
            const MAX_24: f32 = 8_388_607.0;
            for sample in &audio.samples {
                let s = (sample * MAX_24).clamp(-MAX_24 - 1.0, MAX_24) as i32;
                writer.write_sample(s)?;
            }
        }
        _ => {
            for sample in &audio.samples {
                let s = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
                writer.write_sample(s)?;
            }
        }
    }

    writer.finalize()?;
    Ok(())
}

/// Writes the final artifact in the requested container format.
///
/// WAV is written directly; FLAC and MP3 go through an `ffmpeg` conversion of
/// a scratch WAV placed in `scratch_dir`.
pub fn export_audio(
    audio: &AudioBuffer,
    dest: &Path,
    format: OutputFormat,
    scratch_dir: &Path,
) -> Result<()> {
    if format == OutputFormat::Wav {
        return write_wav(dest, audio);
    }

    let scratch = scratch_dir.join("export.wav");
    write_wav(&scratch, audio)?;
    let result = encode_with_ffmpeg(&scratch, dest);
    let _ = std::fs::remove_file(&scratch);
    result
}

fn encode_with_ffmpeg(src: &Path, dest: &Path) -> Result<()> {
    let output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(src)
        .arg(dest)
        .output()
        .context("failed to spawn ffmpeg. Is ffmpeg installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!(
            "ffmpeg exited with {} while encoding {}:\n{}",
            output.status,
            dest.display(),
            stderr
        );
    }

    log::debug!("encoded {} via ffmpeg", dest.display());
    Ok(())
}
