//! User-facing transport configuration and its validation.

use super::driver::{DriverConfig, Mode, PinConfig};
use crate::error::{Error, Result};

/// Number of GPIO pins on the target.
pub const GPIO_COUNT: u32 = 40;

const DMA_BUF_COUNT: usize = 4;

/// Transport configuration as supplied by managed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2sConfig {
    pub sck_pin: Option<u32>,
    pub ws_pin: Option<u32>,
    pub tx_pin: Option<u32>,
    pub rx_pin: Option<u32>,
    pub mclk_pin: Option<u32>,
    pub sample_rate: u32,
    /// 8, 16, 24 or 32.
    pub bits_per_sample: u32,
    /// Frames buffered by the driver, spread over the DMA buffers.
    pub buffer_size: usize,
    pub is_master: bool,
    /// MCLK as a multiple of the sample rate: 128, 256 or 384.
    pub mclk_multiplier: u32,
    pub use_apll: bool,
}

impl Default for I2sConfig {
    fn default() -> Self {
        Self {
            sck_pin: None,
            ws_pin: None,
            tx_pin: None,
            rx_pin: None,
            mclk_pin: None,
            sample_rate: 44_100,
            bits_per_sample: 16,
            buffer_size: 32,
            is_master: true,
            mclk_multiplier: 256,
            use_apll: false,
        }
    }
}

/// Geometry derived from a validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    pub(crate) driver: DriverConfig,
    pub(crate) word_size: usize,
    pub(crate) max_frames_per_read: usize,
}

impl I2sConfig {
    /// Checks every field and derives the driver settings. Touches nothing.
    pub(crate) fn layout(&self) -> Result<Layout> {
        if !matches!(self.bits_per_sample, 8 | 16 | 24 | 32) {
            return Err(Error::InvalidArgument("bits per sample"));
        }
        if self.sample_rate == 0 {
            return Err(Error::InvalidArgument("sample rate"));
        }
        if self.buffer_size == 0 {
            return Err(Error::InvalidArgument("buffer size"));
        }

        let pins = [
            self.mclk_pin,
            self.sck_pin,
            self.ws_pin,
            self.tx_pin,
            self.rx_pin,
        ];
        let used: Vec<u32> = pins.into_iter().flatten().collect();
        if used.iter().any(|&pin| pin >= GPIO_COUNT) {
            return Err(Error::InvalidArgument("pin out of range"));
        }
        if used
            .iter()
            .enumerate()
            .any(|(i, pin)| used[i + 1..].contains(pin))
        {
            return Err(Error::InvalidArgument("pin used twice"));
        }

        let fixed_mclk = match self.mclk_pin {
            Some(_) => {
                if !matches!(self.mclk_multiplier, 128 | 256 | 384) {
                    return Err(Error::InvalidArgument("mclk multiplier"));
                }
                self.mclk_multiplier
                    .checked_mul(self.sample_rate)
                    .ok_or(Error::InvalidArgument("mclk frequency"))?
            }
            None => 0,
        };

        let word_size = (self.bits_per_sample / 8) as usize;
        let frames_per_dma_buffer = self.buffer_size.div_ceil(DMA_BUF_COUNT);

        Ok(Layout {
            driver: DriverConfig {
                mode: Mode {
                    master: self.is_master,
                    tx: self.tx_pin.is_some(),
                    rx: self.rx_pin.is_some(),
                },
                sample_rate: self.sample_rate,
                bits_per_sample: self.bits_per_sample,
                dma_buf_count: DMA_BUF_COUNT,
                dma_buf_len: frames_per_dma_buffer * word_size,
                use_apll: self.use_apll,
                fixed_mclk,
                pins: PinConfig {
                    mclk: self.mclk_pin,
                    sck: self.sck_pin,
                    ws: self.ws_pin,
                    tx: self.tx_pin,
                    rx: self.rx_pin,
                },
            },
            word_size,
            max_frames_per_read: frames_per_dma_buffer * DMA_BUF_COUNT,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid(config: I2sConfig) -> &'static str {
        match config.layout() {
            Err(Error::InvalidArgument(what)) => what,
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    #[test]
    fn derives_driver_settings() {
        let config = I2sConfig {
            tx_pin: Some(25),
            sck_pin: Some(26),
            ws_pin: Some(27),
            mclk_pin: Some(0),
            sample_rate: 48_000,
            bits_per_sample: 24,
            buffer_size: 30,
            mclk_multiplier: 384,
            ..I2sConfig::default()
        };

        let layout = config.layout().unwrap();
        assert_eq!(layout.word_size, 3);
        assert_eq!(layout.max_frames_per_read, 32);
        assert_eq!(layout.driver.dma_buf_len, 24);
        assert_eq!(layout.driver.fixed_mclk, 384 * 48_000);
        assert_eq!(
            layout.driver.mode,
            Mode {
                master: true,
                tx: true,
                rx: false
            }
        );
    }

    #[test]
    fn mclk_multiplier_only_checked_with_mclk_pin() {
        let config = I2sConfig {
            mclk_multiplier: 100,
            ..I2sConfig::default()
        };
        assert_eq!(config.layout().unwrap().driver.fixed_mclk, 0);

        let config = I2sConfig {
            mclk_pin: Some(0),
            mclk_multiplier: 100,
            ..I2sConfig::default()
        };
        assert_eq!(invalid(config), "mclk multiplier");
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            invalid(I2sConfig {
                bits_per_sample: 12,
                ..I2sConfig::default()
            }),
            "bits per sample"
        );
        assert_eq!(
            invalid(I2sConfig {
                sample_rate: 0,
                ..I2sConfig::default()
            }),
            "sample rate"
        );
        assert_eq!(
            invalid(I2sConfig {
                buffer_size: 0,
                ..I2sConfig::default()
            }),
            "buffer size"
        );
        assert_eq!(
            invalid(I2sConfig {
                rx_pin: Some(GPIO_COUNT),
                ..I2sConfig::default()
            }),
            "pin out of range"
        );
        assert_eq!(
            invalid(I2sConfig {
                tx_pin: Some(4),
                rx_pin: Some(4),
                ..I2sConfig::default()
            }),
            "pin used twice"
        );
    }
}
