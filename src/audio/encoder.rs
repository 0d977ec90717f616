use crate::error::DeviceError;

/// Block-averaging PCM16 encoder for the live streaming path.
///
/// Consumes normalized float samples at the device rate and produces
/// fixed-size int16 frames at the target rate. Each output sample is the
/// mean of its input window, clamped to [-1, 1] and scaled to int16.
/// Negative values scale by 0x8000 and positive values by 0x7fff so both
/// ends of the range map onto the exact int16 bounds without overflow; the
/// asymmetry is part of the wire format and must not be "fixed".
pub struct FrameEncoder {
    window: usize,
    frame_samples: usize,
    input: Vec<f32>,
    output: Vec<i16>,
}

impl FrameEncoder {
    /// The device rate must be an integer multiple of the target rate; the
    /// averaging window is that ratio.
    pub fn new(
        input_rate: u32,
        target_rate: u32,
        frame_samples: usize,
    ) -> Result<Self, DeviceError> {
        if input_rate == 0 || target_rate == 0 || frame_samples == 0 {
            return Err(DeviceError::UnsupportedFormat(
                "sample rates and frame size must be non-zero".to_string(),
            ));
        }
        if input_rate % target_rate != 0 {
            return Err(DeviceError::UnsupportedFormat(format!(
                "device rate {} is not an integer multiple of target rate {}",
                input_rate, target_rate
            )));
        }

        Ok(Self {
            window: (input_rate / target_rate) as usize,
            frame_samples,
            input: Vec::new(),
            output: Vec::new(),
        })
    }

    /// Feed captured samples, returning every frame completed by this batch.
    /// Pure function of the input stream: identical input always yields
    /// byte-identical frames.
    pub fn push(&mut self, samples: &[f32]) -> Vec<Vec<i16>> {
        let mut frames = Vec::new();

        for &sample in samples {
            self.input.push(sample);
            if self.input.len() == self.window {
                let mean = self.input.iter().sum::<f32>() / self.window as f32;
                self.input.clear();
                self.output.push(encode_sample(mean));

                if self.output.len() == self.frame_samples {
                    frames.push(std::mem::take(&mut self.output));
                }
            }
        }

        frames
    }

    /// Discard buffered partial input and any incomplete frame. Called when
    /// capture stops; a trailing partial frame is not worth flushing.
    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
    }

    /// Output samples per frame.
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }
}

/// Scale one normalized sample to int16 with asymmetric bounds.
pub fn encode_sample(value: f32) -> i16 {
    let v = value.clamp(-1.0, 1.0);
    if v < 0.0 {
        (v * 0x8000 as f32) as i16
    } else {
        (v * 0x7fff as f32) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_is_asymmetric_at_the_bounds() {
        assert_eq!(encode_sample(-1.0), i16::MIN);
        assert_eq!(encode_sample(1.0), i16::MAX);
        assert_eq!(encode_sample(0.0), 0);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        assert_eq!(encode_sample(-2.5), i16::MIN);
        assert_eq!(encode_sample(1.7), i16::MAX);
    }

    #[test]
    fn window_of_three_averages_blocks() {
        let mut encoder = FrameEncoder::new(48_000, 16_000, 2).unwrap();
        let frames = encoder.push(&[0.3, 0.3, 0.3, -0.6, -0.6, -0.6]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0][0], encode_sample(0.3));
        assert_eq!(frames[0][1], encode_sample(-0.6));
    }

    #[test]
    fn non_integer_ratio_is_rejected() {
        assert!(FrameEncoder::new(44_100, 16_000, 320).is_err());
    }
}
