//! Polled LSM6DS3 gyro on a blocking SPI bus.

use defmt::{error, warn};
use embassy_time::{Duration, Instant};
use esp_hal::{
    Blocking,
    gpio::{Level, Output, OutputConfig, OutputPin},
    gpio::interconnect::{PeripheralInput, PeripheralOutput},
    spi::master::{Config, Instance, Spi},
    time::Rate,
};
use flight_core::{Rates, RawSampleSource};

const READ: u8 = 0x80;
const WRITE: u8 = 0x7f;

pub const WHO_AM_I: u8 = 0x0f;
pub const WHO_AM_I_VALUE: u8 = 0x69;

pub const CTRL1_XL: u8 = 0x10;
pub const CTRL2_G: u8 = 0x11;
pub const CTRL3_C: u8 = 0x12;
pub const CTRL4_C: u8 = 0x13;
pub const CTRL6_C: u8 = 0x15;
pub const CTRL7_G: u8 = 0x16;
pub const CTRL10_C: u8 = 0x19;

pub const STATUS: u8 = 0x1e;
pub const OUT_TEMP_L: u8 = 0x20;
pub const OUTX_L_G: u8 = 0x22;

/// Output data rate programmed into CTRL2_G.
pub const SAMPLE_RATE_HZ: u16 = 1666;
/// Full scale programmed into CTRL2_G.
pub const RANGE_DPS: u16 = 2000;
const DPS_PER_LSB: f32 = 0.070;
const LSB_PER_CELSIUS: f32 = 16.0;
/// Die temperature at a zero reading.
const TEMP_OFFSET_CELSIUS: f32 = 25.0;

const STATUS_GDA: u8 = 1 << 1;

/// Report every n-th consecutive read failure.
const ERROR_LOG_INTERVAL: u32 = 1000;

struct ChipSelect<'d>(Output<'d>);
struct Selected<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for Selected<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f()
        }
    }
}

impl ChipSelect<'_> {
    fn select(&mut self) -> Selected<impl FnOnce()> {
        self.0.set_low();
        Selected(Some(|| self.0.set_high()))
    }
}

pub struct Lsm6ds3 {
    spi: Spi<'static, Blocking>,
    cs: ChipSelect<'static>,
    failed_reads: u32,
}

impl Lsm6ds3 {
    pub fn new(
        spi: impl Instance + 'static,
        sck: impl OutputPin + 'static,
        pico: impl PeripheralOutput<'static>,
        poci: impl PeripheralInput<'static>,
        cs: impl OutputPin + 'static,
    ) -> Result<Self, ImuError> {
        let cs = ChipSelect(Output::new(
            cs,
            Level::High,
            OutputConfig::default().with_drive_mode(esp_hal::gpio::DriveMode::PushPull),
        ));

        let spi = Spi::new(
            spi,
            Config::default()
                .with_frequency(Rate::from_mhz(10))
                .with_mode(esp_hal::spi::Mode::_0)
                .with_read_bit_order(esp_hal::spi::BitOrder::MsbFirst)
                .with_write_bit_order(esp_hal::spi::BitOrder::MsbFirst),
        )
        .map_err(ImuError::SpiConfig)?
        .with_sck(sck)
        .with_mosi(pico)
        .with_miso(poci);

        Ok(Self {
            spi,
            cs,
            failed_reads: 0,
        })
    }

    /// Resets the chip and starts the gyro at [`SAMPLE_RATE_HZ`], ±[`RANGE_DPS`].
    pub fn configure(&mut self) -> Result<(), ImuError> {
        if self.read_register(WHO_AM_I)? != WHO_AM_I_VALUE {
            return Err(ImuError::InvalidChip);
        }

        const BDU: u8 = 1 << 6;
        const IF_INC: u8 = 1 << 2;
        const SW_RESET: u8 = 1;

        // Gyro and accelerometer in power-down before the reset
        self.write_register(CTRL2_G, 0)?;
        self.write_register(CTRL1_XL, 0)?;
        self.write_register(CTRL6_C, 0)?;
        self.write_register(CTRL3_C, SW_RESET)?;

        esp_hal::delay::Delay::new().delay_micros(50);

        let reset_start = Instant::now();
        while self.read_register(CTRL3_C)? != IF_INC {
            if reset_start.elapsed() >= Duration::from_secs(1) {
                return Err(ImuError::Timeout);
            }
        }

        self.write_verify_register(CTRL3_C, BDU | IF_INC)?;

        const I2C_DISABLE: u8 = 1 << 2;
        self.write_verify_register(CTRL4_C, I2C_DISABLE)?;

        // High-performance mode, no gyro high-pass: calibration owns the offset
        self.write_verify_register(CTRL7_G, 0)?;

        const ODR_G: u8 = 0b1000 << 4;
        const FS_G: u8 = 0b11 << 2;
        self.write_verify_register(CTRL2_G, ODR_G | FS_G)?;

        const GYRO_AXES_ENABLE: u8 = 0b111 << 3;
        self.write_verify_register(CTRL10_C, GYRO_AXES_ENABLE)?;

        Ok(())
    }

    /// Latest angular rate in dps, `None` when no new sample is ready.
    pub fn read_gyro(&mut self) -> Result<Option<Rates>, ImuError> {
        if self.read_register(STATUS)? & STATUS_GDA == 0 {
            return Ok(None);
        }

        let mut buf = [0u8; 6];
        {
            let _selected = self.cs.select();
            self.spi.write(&[READ | OUTX_L_G]).map_err(ImuError::Spi)?;
            self.spi.read(&mut buf).map_err(ImuError::Spi)?;
        }

        let (words, _) = buf.as_chunks::<2>();
        let mut rates = [0.0; 3];
        for (rate, word) in rates.iter_mut().zip(words) {
            *rate = i16::from_le_bytes(*word) as f32 * DPS_PER_LSB;
        }
        Ok(Some(rates))
    }

    pub fn read_die_temperature(&mut self) -> Result<f32, ImuError> {
        let mut buf = [0u8; 2];
        {
            let _selected = self.cs.select();
            self.spi.write(&[READ | OUT_TEMP_L]).map_err(ImuError::Spi)?;
            self.spi.read(&mut buf).map_err(ImuError::Spi)?;
        }

        Ok(i16::from_le_bytes(buf) as f32 / LSB_PER_CELSIUS + TEMP_OFFSET_CELSIUS)
    }

    fn read_register(&mut self, reg: u8) -> Result<u8, ImuError> {
        let _selected = self.cs.select();

        self.spi.write(&[READ | reg]).map_err(ImuError::Spi)?;
        let mut buf = [0];
        self.spi.read(&mut buf).map_err(ImuError::Spi)?;

        Ok(buf[0])
    }

    fn write_register(&mut self, reg: u8, val: u8) -> Result<(), ImuError> {
        let _selected = self.cs.select();

        self.spi.write(&[WRITE & reg, val]).map_err(ImuError::Spi)
    }

    fn write_verify_register(&mut self, reg: u8, val: u8) -> Result<(), ImuError> {
        self.write_register(reg, val)?;
        let read = self.read_register(reg)?;

        if val != read {
            error!("register {:02x}: wrote {:08b}, read {:08b}", reg, val, read);
            return Err(ImuError::Verification { register: reg });
        }

        Ok(())
    }
}

impl RawSampleSource for Lsm6ds3 {
    fn read_sample(&mut self, device: usize) -> Option<Rates> {
        if device != 0 {
            return None;
        }

        match self.read_gyro() {
            Ok(sample) => {
                self.failed_reads = 0;
                sample
            }
            Err(e) => {
                if self.failed_reads % ERROR_LOG_INTERVAL == 0 {
                    warn!("gyro read failed ({} in a row): {}", self.failed_reads + 1, e);
                }
                self.failed_reads = self.failed_reads.saturating_add(1);
                None
            }
        }
    }

    fn read_temperature(&mut self, device: usize) -> Option<f32> {
        if device != 0 {
            return None;
        }

        self.read_die_temperature()
            .inspect_err(|e| warn!("gyro temperature read failed: {}", e))
            .ok()
    }
}

#[derive(thiserror::Error, Debug, defmt::Format)]
pub enum ImuError {
    #[error("Spi error: {0:?}")]
    Spi(esp_hal::spi::Error),

    #[error("Spi configuration rejected: {0:?}")]
    SpiConfig(esp_hal::spi::master::ConfigError),

    #[error("Unable to verify write to register {register:#04x}")]
    Verification { register: u8 },

    #[error("Unable to verify chip")]
    InvalidChip,

    #[error("Chip timed out")]
    Timeout,
}
