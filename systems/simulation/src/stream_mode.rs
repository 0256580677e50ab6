use matrix_code_core::{HslStyle, StreamTuning};
use rand::Rng;

use crate::Stream;

/// Per-stream colouring strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Inherits the ambient palette.
    #[default]
    Standard,
    /// Bright saturated hue, optionally travelling or cycling over time.
    StarPower,
    /// Persistent random hue at full saturation.
    Rainbow,
}

impl StreamMode {
    /// Assigns the stream's persistent hue. Only the first call has an effect.
    pub fn spawn<R: Rng + ?Sized>(self, stream: &mut Stream, rng: &mut R) {
        match self {
            Self::Standard => {}
            Self::StarPower | Self::Rainbow => {
                if stream.base_hue.is_none() {
                    stream.base_hue = Some(f32::from(rng.gen_range(0_u16..360)));
                }
            }
        }
    }

    /// Colour for a glyph written by `stream` on `frame`.
    ///
    /// Pure: the result depends only on the stream's persistent fields, the
    /// frame and the tuning. `None` means the ambient palette applies.
    #[must_use]
    pub fn style(self, stream: &Stream, frame: u64, tuning: &StreamTuning) -> Option<HslStyle> {
        match self {
            Self::Standard => None,
            Self::StarPower => {
                let star = &tuning.star_power;
                let hue = if star.glyph_rainbow {
                    let column = u64::try_from(stream.column).unwrap_or(u64::MAX);
                    (frame.wrapping_add(column.wrapping_mul(10)) % 360) as f32
                } else {
                    let base = stream.base_hue.unwrap_or(0.0);
                    if star.color_cycle {
                        let travelled = (frame as f64 * f64::from(star.cycle_speed)) % 360.0;
                        (base + travelled as f32).rem_euclid(360.0)
                    } else {
                        base
                    }
                };
                Some(HslStyle {
                    hue,
                    saturation: star.saturation,
                    lightness: star.lightness,
                    color_cycle: star.color_cycle,
                    cycle_speed: star.cycle_speed,
                })
            }
            Self::Rainbow => Some(HslStyle::fixed(
                stream.base_hue.unwrap_or(0.0),
                100.0,
                tuning.rainbow.lightness,
            )),
        }
    }
}
