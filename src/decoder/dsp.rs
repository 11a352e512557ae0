// src/decoder/dsp.rs

/// Remap interleaved audio from `in_ch` to `out_ch` channels.
///
/// Mono is duplicated to stereo, stereo is averaged down to mono; wider
/// layouts fold groups of inputs together (downmix) or repeat inputs
/// round-robin (upmix).
pub fn remix_channels(input: &[f32], in_ch: usize, out_ch: usize) -> Vec<f32> {
    if in_ch == out_ch || in_ch == 0 || out_ch == 0 {
        return input.to_vec();
    }
    let frames = input.len() / in_ch;
    let mut out = vec![0.0f32; frames * out_ch];

    match (in_ch, out_ch) {
        (1, 2) => {
            for f in 0..frames {
                let m = input[f];
                out[f * 2] = m;
                out[f * 2 + 1] = m;
            }
        }
        (2, 1) => {
            for f in 0..frames {
                out[f] = 0.5 * (input[f * 2] + input[f * 2 + 1]);
            }
        }
        _ if out_ch < in_ch => {
            // Fold adjacent input channels into each output channel.
            let per = in_ch as f32 / out_ch as f32;
            for f in 0..frames {
                for oc in 0..out_ch {
                    let start = (oc as f32 * per).floor() as usize;
                    let end = (((oc + 1) as f32 * per).ceil() as usize).min(in_ch);
                    let span = &input[f * in_ch + start..f * in_ch + end];
                    out[f * out_ch + oc] = span.iter().sum::<f32>() / span.len() as f32;
                }
            }
        }
        _ => {
            for f in 0..frames {
                for oc in 0..out_ch {
                    out[f * out_ch + oc] = input[f * in_ch + oc % in_ch];
                }
            }
        }
    }

    out
}

/// Append interleaved samples to per-channel staging buffers.
pub fn append_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>], channels: usize) {
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            planar[ch].push(s);
        }
    }
}

/// Frames currently available across all staging channels.
pub fn planar_frames(planar: &[Vec<f32>]) -> usize {
    planar.iter().map(|v| v.len()).min().unwrap_or(0)
}

/// Remove the first `frames` frames from the staging buffers.
pub fn split_planar(planar: &mut [Vec<f32>], frames: usize) -> Vec<Vec<f32>> {
    let mut out = Vec::with_capacity(planar.len());
    for ch in planar.iter_mut() {
        let n = frames.min(ch.len());
        let tail = ch.split_off(n);
        out.push(std::mem::replace(ch, tail));
    }
    out
}

/// Interleave planar channel buffers back into one frame-ordered slice.
pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let channels = planar.len();
    if channels == 0 || planar[0].is_empty() {
        return Vec::new();
    }
    let frames = planar[0].len();
    let mut out = vec![0.0f32; frames * channels];
    for f in 0..frames {
        for ch in 0..channels {
            out[f * channels + ch] = planar[ch][f];
        }
    }
    out
}

#[inline]
pub fn fade_samples(sample_rate: u32, ms: u32) -> usize {
    ((sample_rate as u64 * ms as u64) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remix_mono_to_stereo_duplicates() {
        let out = remix_channels(&[0.5, -0.5], 1, 2);
        assert_eq!(out, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn remix_stereo_to_mono_averages() {
        let out = remix_channels(&[1.0, 0.0, 0.0, 1.0], 2, 1);
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn remix_same_layout_is_passthrough() {
        let input = [0.1, 0.2, 0.3, 0.4];
        assert_eq!(remix_channels(&input, 2, 2), input.to_vec());
    }

    #[test]
    fn planar_round_trip() {
        let interleaved = [1.0, 10.0, 2.0, 20.0, 3.0, 30.0];
        let mut planar = vec![Vec::new(), Vec::new()];
        append_to_planar(&interleaved, &mut planar, 2);
        assert_eq!(planar_frames(&planar), 3);

        let head = split_planar(&mut planar, 2);
        assert_eq!(interleave(&head), vec![1.0, 10.0, 2.0, 20.0]);
        assert_eq!(planar_frames(&planar), 1);
    }
}
