use voxlift_core::pipeline::chunks::{partition, stitch};
use voxlift_core::AudioBuffer;

fn ramp(frames: usize, channels: u16) -> AudioBuffer {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        for c in 0..channels {
            samples.push(((i * channels as usize + c as usize) as f32 * 0.001).sin());
        }
    }
    AudioBuffer::new(samples, 44_100, channels, 16)
}

#[test]
fn partition_then_stitch_reproduces_original_exactly() {
    // Round-trip law for the stitching mechanism, independent of how the
    // chunks were processed in between.
    let input = ramp(100_000, 2);
    for parts in [1, 3, 8] {
        let chunks = partition(&input, parts);
        let rebuilt = stitch(&chunks).unwrap();
        assert_eq!(rebuilt.samples, input.samples, "parts = {parts}");
        assert_eq!(rebuilt.sample_rate, input.sample_rate);
        assert_eq!(rebuilt.channels, input.channels);
    }
}

#[test]
fn partition_produces_equal_chunks_with_short_tail() {
    let input = ramp(10, 1);
    let chunks = partition(&input, 4);
    let sizes: Vec<usize> = chunks.iter().map(|c| c.frames()).collect();
    assert_eq!(sizes, vec![3, 3, 3, 1]);
}

#[test]
fn partition_respects_frame_alignment_for_stereo() {
    let input = ramp(44_101, 2);
    for chunk in partition(&input, 8) {
        assert_eq!(chunk.samples.len() % 2, 0);
        assert_eq!(chunk.channels, 2);
    }
}

#[test]
fn partition_is_ordered_and_contiguous() {
    let input = ramp(5000, 1);
    let chunks = partition(&input, 3);
    let mut cursor = 0;
    for chunk in &chunks {
        let end = cursor + chunk.frames();
        assert_eq!(chunk.samples[..], input.samples[cursor..end]);
        cursor = end;
    }
    assert_eq!(cursor, input.frames());
}

#[test]
fn stitch_rejects_mismatched_layouts() {
    let a = AudioBuffer::new(vec![0.0; 100], 44_100, 1, 16);
    let b = AudioBuffer::new(vec![0.0; 100], 48_000, 1, 16);
    assert!(stitch(&[a, b]).is_err());
}

#[test]
fn stitch_of_nothing_is_an_error() {
    assert!(stitch(&[]).is_err());
}
