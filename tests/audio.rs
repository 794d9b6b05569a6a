use approx::assert_abs_diff_eq;
use voxlift_core::{read_audio, write_wav, AudioBuffer};

fn sine(frames: usize, sample_rate: u32, channels: u16, bits: u16) -> AudioBuffer {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let v = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
        for _ in 0..channels {
            samples.push(v);
        }
    }
    AudioBuffer::new(samples, sample_rate, channels, bits)
}

#[test]
fn wav_roundtrip_16bit_stereo() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("test.wav");

    let original = sine(44_100, 44_100, 2, 16);
    write_wav(&path, &original).unwrap();
    let decoded = read_audio(&path).unwrap();

    assert_eq!(decoded.sample_rate, 44_100);
    assert_eq!(decoded.channels, 2);
    assert_eq!(decoded.bits_per_sample, 16);
    assert_eq!(decoded.frames(), original.frames());
    for (a, b) in original.samples.iter().zip(&decoded.samples) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-3);
    }
}

#[test]
fn wav_roundtrip_float32_preserves_width() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("test32.wav");

    let original = sine(8_000, 8_000, 1, 32);
    write_wav(&path, &original).unwrap();
    let decoded = read_audio(&path).unwrap();

    assert_eq!(decoded.bits_per_sample, 32);
    assert_eq!(decoded.frames(), original.frames());
    for (a, b) in original.samples.iter().zip(&decoded.samples) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-6);
    }
}

#[test]
fn read_missing_file_fails() {
    assert!(read_audio("definitely/not/here.wav").is_err());
}

#[test]
fn read_garbage_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("garbage.wav");
    std::fs::write(&path, b"this is not audio data at all").unwrap();
    assert!(read_audio(&path).is_err());
}
