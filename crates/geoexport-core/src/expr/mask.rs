use serde::{Deserialize, Serialize};

/// Per-pixel quality mask read from a packed bit-field band.
/// A pixel is kept only when every listed bit is clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityMask {
    pub band: String,
    pub bits: Vec<u8>,
}

impl QualityMask {
    /// Sentinel-2 `QA60`: bit 10 = opaque cloud, bit 11 = cirrus.
    pub fn qa60() -> Self {
        Self { band: "QA60".into(), bits: vec![10, 11] }
    }

    fn bitmask(&self) -> u32 {
        self.bits.iter().fold(0u32, |m, &b| m | (1u32 << b))
    }

    pub fn is_clear(&self, qa: u32) -> bool {
        qa & self.bitmask() == 0
    }

    /// QA samples come out of rasters as f32; NaN (already masked) is never clear.
    pub fn is_clear_sample(&self, qa: f32) -> bool {
        !qa.is_nan() && self.is_clear(qa as u32)
    }
}
