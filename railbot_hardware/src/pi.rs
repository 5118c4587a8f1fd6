//! Raspberry Pi backend.
//!
//! Motors are driven by the two hardware PWM channels plus one direction GPIO
//! each. Encoders are single-channel; edges are counted in an interrupt and
//! signed by the last commanded direction. IR sensors sit on an MCP3008 ADC on
//! SPI0, channels 0..=5 in `IrChannel::ALL` order.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use rppal::pwm::{Channel, Polarity, Pwm};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::{debug, trace};

use railbot_traits::{
    BoxError, Direction, IrChannel, IrSensors, MotorPair, StopSignal, StopState, Wheel,
};

use crate::error::{HwError, Result};

const PWM_FREQUENCY_HZ: f64 = 1_000.0;
const SPI_CLOCK_HZ: u32 = 1_350_000;

fn pwm_channel(n: u8) -> Result<Channel> {
    match n {
        0 => Ok(Channel::Pwm0),
        1 => Ok(Channel::Pwm1),
        other => Err(HwError::Pwm(format!("no hardware PWM channel {other}"))),
    }
}

struct PiWheel {
    pwm: Pwm,
    dir: OutputPin,
    sign: Arc<AtomicI64>,
    count: Arc<AtomicI64>,
    // Held so the interrupt stays registered.
    _encoder: InputPin,
}

pub struct PiMotors {
    wheels: [PiWheel; 2],
    max_power: u16,
}

impl PiMotors {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        left_pwm: u8,
        right_pwm: u8,
        left_dir: u8,
        right_dir: u8,
        left_encoder: u8,
        right_encoder: u8,
        max_power: u16,
    ) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let make = |pwm: u8, dir: u8, enc: u8| -> Result<PiWheel> {
            let pwm = Pwm::with_frequency(
                pwm_channel(pwm)?,
                PWM_FREQUENCY_HZ,
                0.0,
                Polarity::Normal,
                true,
            )
            .map_err(|e| HwError::Pwm(e.to_string()))?;
            let dir = gpio
                .get(dir)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_output_low();
            let mut encoder = gpio
                .get(enc)
                .map_err(|e| HwError::Gpio(e.to_string()))?
                .into_input_pullup();
            let sign = Arc::new(AtomicI64::new(1));
            let count = Arc::new(AtomicI64::new(0));
            let (s, c) = (sign.clone(), count.clone());
            encoder
                .set_async_interrupt(Trigger::RisingEdge, move |_level: Level| {
                    c.fetch_add(s.load(Ordering::Relaxed), Ordering::Relaxed);
                })
                .map_err(|e| HwError::Gpio(e.to_string()))?;
            Ok(PiWheel {
                pwm,
                dir,
                sign,
                count,
                _encoder: encoder,
            })
        };
        let left = make(left_pwm, left_dir, left_encoder)?;
        let right = make(right_pwm, right_dir, right_encoder)?;
        debug!(left_pwm, right_pwm, "pi motors ready");
        Ok(Self {
            wheels: [left, right],
            max_power: max_power.max(1),
        })
    }
}

impl MotorPair for PiMotors {
    fn set_power(
        &mut self,
        wheel: Wheel,
        power: u16,
        direction: Direction,
    ) -> std::result::Result<(), BoxError> {
        let w = &mut self.wheels[wheel.index()];
        match direction {
            Direction::Forward => w.dir.set_low(),
            Direction::Reverse => w.dir.set_high(),
        }
        w.sign.store(direction.sign(), Ordering::Relaxed);
        let duty = (f64::from(power) / f64::from(self.max_power)).clamp(0.0, 1.0);
        w.pwm
            .set_duty_cycle(duty)
            .map_err(|e| Box::new(HwError::Pwm(e.to_string())) as BoxError)?;
        trace!(?wheel, power, duty, "pwm duty");
        Ok(())
    }

    fn read_encoder(&mut self, wheel: Wheel) -> std::result::Result<i64, BoxError> {
        Ok(self.wheels[wheel.index()].count.load(Ordering::Relaxed))
    }
}

/// MCP3008 10-bit ADC carrying the six IR channels.
pub struct Mcp3008Ir {
    spi: Spi,
}

impl Mcp3008Ir {
    pub fn new(chip_select: u8) -> Result<Self> {
        let ss = match chip_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            other => return Err(HwError::Spi(format!("unsupported chip select {other}"))),
        };
        let spi = Spi::new(Bus::Spi0, ss, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi })
    }

    fn adc_channel(channel: IrChannel) -> u8 {
        match channel {
            IrChannel::LeftFrontA => 0,
            IrChannel::LeftFrontB => 1,
            IrChannel::RightFrontA => 2,
            IrChannel::RightFrontB => 3,
            IrChannel::BackLeft => 4,
            IrChannel::BackRight => 5,
        }
    }
}

impl IrSensors for Mcp3008Ir {
    fn read_raw(&mut self, channel: IrChannel) -> std::result::Result<u16, BoxError> {
        let ch = Self::adc_channel(channel);
        // start bit, single-ended + channel, padding
        let tx = [0x01, (0x08 | ch) << 4, 0x00];
        let mut rx = [0u8; 3];
        let n = self
            .spi
            .transfer(&mut rx, &tx)
            .map_err(|e| Box::new(HwError::Spi(e.to_string())) as BoxError)?;
        if n != rx.len() {
            return Err(Box::new(HwError::Adc(channel.name())));
        }
        Ok((u16::from(rx[1] & 0x03) << 8) | u16::from(rx[2]))
    }
}

/// Operator stop button on a GPIO input.
pub struct PiStopButton {
    pin: InputPin,
    active_low: bool,
}

impl PiStopButton {
    pub fn new(pin: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = gpio.get(pin).map_err(|e| HwError::Gpio(e.to_string()))?;
        let pin = if active_low {
            pin.into_input_pullup()
        } else {
            pin.into_input_pulldown()
        };
        Ok(Self { pin, active_low })
    }
}

impl StopSignal for PiStopButton {
    fn stop_state(&self) -> StopState {
        let pressed = if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        };
        if pressed {
            StopState::StopRequested
        } else {
            StopState::Running
        }
    }
}
