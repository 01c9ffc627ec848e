//! Blocking driver using the `embedded-hal` traits.
//!
//! Settle delays block on the `Delay` provider. The 50 ms conversion time does not have to:
//! hosts with a timer call [`Shtcx::begin_update`], schedule [`Shtcx::complete_update`]
//! after [`MeasurementTicket::delay_ms`], and keep doing other work meanwhile.
//! [`Shtcx::update`] blocks through the whole cycle instead.

use crate::hw_def::*;
use crate::types::*;

use embedded_hal::{delay::DelayNs, i2c::I2c};

/// SHTCx device driver using the blocking `embedded-hal` traits
#[derive(Debug)]
pub struct Shtcx<I2C, Delay> {
    i2c: I2C,
    delay: Delay,
    i2c_addr: u8,
    state: DriverState,
}

impl<I2C, Delay, E> Shtcx<I2C, Delay>
where
    I2C: I2c<Error = E>,
    Delay: DelayNs,
{
    /// Create a new SHTCx driver instance at the default address
    pub fn new(i2c: I2C, delay: Delay) -> Self {
        Self::new_with_address(i2c, delay, I2C_ADDR)
    }

    /// Create a new SHTCx driver instance behind an address translator
    pub fn new_with_address(i2c: I2C, delay: Delay, i2c_addr: u8) -> Self {
        Self { i2c, delay, i2c_addr, state: DriverState::new() }
    }

    /// Give back the bus and delay
    pub fn release(self) -> (I2C, Delay) {
        (self.i2c, self.delay)
    }

    /// Lifecycle state
    pub fn state(&self) -> ComponentState {
        self.state.lifecycle()
    }

    /// Whether the last update cycle failed
    pub fn has_warning(&self) -> bool {
        self.state.has_warning()
    }

    /// ID register contents, once `setup()` succeeded
    pub fn device_id(&self) -> Option<DeviceId> {
        self.state.device_id()
    }

    /// Chip variant, `Unknown` until identified
    pub fn sensor_type(&self) -> SensorType {
        self.state.sensor_type()
    }

    /// Log model, address and health
    pub fn log_config(&self) {
        self.state.log_config(self.i2c_addr);
    }

    fn send_command(&mut self, cmd: Command) -> Result<(), Error<E>> {
        trace!("shtcx::blocking::send_command(): {:#x}", cmd.code());
        self.i2c.write(self.i2c_addr, &cmd.to_be_bytes()).map_err(Error::I2c)
    }

    fn read_words(&mut self, words: &mut [u16]) -> Result<(), Error<E>> {
        assert!(words.len() <= MAX_WORDS);

        let mut read_buf = [0u8; WORD_GROUP_LEN * MAX_WORDS];
        let read_buf_slice = &mut read_buf[..WORD_GROUP_LEN * words.len()];
        self.i2c.read(self.i2c_addr, read_buf_slice).map_err(Error::I2c)?;
        trace!("shtcx::blocking::read_words(): {:?}", read_buf_slice);
        decode_words(read_buf_slice, words)
    }

    /// Wake the device and wait for it to settle. SHTC1 does not acknowledge this.
    pub fn wake_up(&mut self) -> Result<(), Error<E>> {
        let result = self.send_command(Command::Wakeup);
        self.delay.delay_us(WAKEUP_SETTLE_US);
        result
    }

    /// Software reset, followed by the settle time
    pub fn soft_reset(&mut self) -> Result<(), Error<E>> {
        let result = self.send_command(Command::SoftReset);
        self.delay.delay_us(SOFT_RESET_SETTLE_US);
        result
    }

    /// Put the device into sleep mode. SHTC1 does not acknowledge this.
    pub fn sleep(&mut self) -> Result<(), Error<E>> {
        self.send_command(Command::Sleep)
    }

    /// Read the raw ID register
    pub fn read_id(&mut self) -> Result<u16, Error<E>> {
        self.send_command(Command::ReadIdRegister)?;
        let mut id = [0u16; 1];
        self.read_words(&mut id)?;
        Ok(id[0])
    }

    /// Wake, reset and identify the device; a failure is terminal until the next `setup()`
    pub fn setup(&mut self) -> Result<DeviceId, Error<E>> {
        self.state.begin_setup();
        let _ = self.wake_up();
        let _ = self.soft_reset();

        let id = self.read_id();
        self.state.finish_setup(id)
    }

    /// Start a measurement cycle; see the module docs
    pub fn begin_update(&mut self, sinks: &mut Sinks<'_>) -> Result<MeasurementTicket, Error<E>> {
        let plan = self.state.plan_cycle()?;
        if plan.soft_reset {
            let _ = self.soft_reset();
        }
        if plan.wake_up {
            let _ = self.wake_up();
        }
        let polled = self.send_command(Command::PollingHighPrecision);
        self.state.finish_poll(polled, sinks)
    }

    /// Finish a measurement cycle: read, publish, and put the device back to sleep
    pub fn complete_update(
        &mut self,
        ticket: MeasurementTicket,
        sinks: &mut Sinks<'_>,
    ) -> Result<TempAndRelHumid, Error<E>> {
        self.state.redeem(ticket)?;
        let mut raw = [0u16; 2];
        let result = self
            .read_words(&mut raw)
            .map(|()| RawTempAndRelHumid { temperature: raw[0], humidity: raw[1] });
        let reading = self.state.finish_readout(result, sinks);
        if self.state.has_sleep_mode() {
            let _ = self.sleep();
        }
        reading
    }

    /// Run a whole update cycle, blocking for the conversion time
    pub fn update(&mut self, sinks: &mut Sinks<'_>) -> Result<TempAndRelHumid, Error<E>> {
        let ticket = self.begin_update(sinks)?;
        self.delay.delay_ms(ticket.delay_ms());
        self.complete_update(ticket, sinks)
    }

    /// Run a whole update cycle and return the reading without publishing it
    pub fn measure(&mut self) -> Result<TempAndRelHumid, Error<E>> {
        self.update(&mut Sinks::new())
    }
}
