use crate::hw_def::*;
use crate::types::*;

use embedded_hal_async::{delay::DelayNs, i2c::I2c};

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

    async fn send_command(&mut self, cmd: Command) -> Result<(), Error<E>> {
        trace!("shtcx::send_command(): {:#x}", cmd.code());
        self.i2c.write(self.i2c_addr, &cmd.to_be_bytes()).await.map_err(Error::I2c)
    }

    async fn read_words(&mut self, words: &mut [u16]) -> Result<(), Error<E>> {
        // We are heapless, so have to have an upper bound
        assert!(words.len() <= MAX_WORDS);

        let mut read_buf = [0u8; WORD_GROUP_LEN * MAX_WORDS];
        let read_buf_slice = &mut read_buf[..WORD_GROUP_LEN * words.len()];
        self.i2c.read(self.i2c_addr, read_buf_slice).await.map_err(Error::I2c)?;
        trace!("shtcx::read_words(): {:?}", read_buf_slice);
        decode_words(read_buf_slice, words)
    }

    /// Wake the device and wait for it to settle. SHTC1 does not acknowledge this.
    pub async fn wake_up(&mut self) -> Result<(), Error<E>> {
        let result = self.send_command(Command::Wakeup).await;
        self.delay.delay_us(WAKEUP_SETTLE_US).await;
        result
    }

    /// Software reset, followed by the settle time
    pub async fn soft_reset(&mut self) -> Result<(), Error<E>> {
        let result = self.send_command(Command::SoftReset).await;
        self.delay.delay_us(SOFT_RESET_SETTLE_US).await;
        result
    }

    /// Put the device into sleep mode. SHTC1 does not acknowledge this.
    pub async fn sleep(&mut self) -> Result<(), Error<E>> {
        self.send_command(Command::Sleep).await
    }

    /// Read the raw ID register
    pub async fn read_id(&mut self) -> Result<u16, Error<E>> {
        self.send_command(Command::ReadIdRegister).await?;
        let mut id = [0u16; 1];
        self.read_words(&mut id).await?;
        Ok(id[0])
    }

    /// Wake, reset and identify the device.
    ///
    /// On failure the driver is marked failed and refuses update cycles until `setup()`
    /// succeeds again.
    pub async fn setup(&mut self) -> Result<DeviceId, Error<E>> {
        self.state.begin_setup();
        // results ignored: an SHTC1 NACKs the wakeup and the ID read below tells us if the
        // device is there at all
        let _ = self.wake_up().await;
        let _ = self.soft_reset().await;

        let id = self.read_id().await;
        self.state.finish_setup(id)
    }

    /// Start a measurement cycle.
    ///
    /// Runs the recovery reset if the previous cycle failed, wakes the device and starts a
    /// high precision measurement. If the measurement command fails both sinks get `None`
    /// and the cycle ends here. Otherwise call [`Self::complete_update`] with the ticket
    /// once [`MeasurementTicket::delay_ms`] has elapsed.
    pub async fn begin_update(&mut self, sinks: &mut Sinks<'_>) -> Result<MeasurementTicket, Error<E>> {
        let plan = self.state.plan_cycle()?;
        if plan.soft_reset {
            let _ = self.soft_reset().await;
        }
        if plan.wake_up {
            let _ = self.wake_up().await;
        }
        let polled = self.send_command(Command::PollingHighPrecision).await;
        self.state.finish_poll(polled, sinks)
    }

    /// Finish a measurement cycle: read, publish, and put the device back to sleep.
    ///
    /// A stale ticket is rejected without touching the bus or the sinks.
    pub async fn complete_update(
        &mut self,
        ticket: MeasurementTicket,
        sinks: &mut Sinks<'_>,
    ) -> Result<TempAndRelHumid, Error<E>> {
        self.state.redeem(ticket)?;
        let mut raw = [0u16; 2];
        let result = self
            .read_words(&mut raw)
            .await
            .map(|()| RawTempAndRelHumid { temperature: raw[0], humidity: raw[1] });
        let reading = self.state.finish_readout(result, sinks);
        if self.state.has_sleep_mode() {
            let _ = self.sleep().await;
        }
        reading
    }

    /// Run a whole update cycle, awaiting the conversion time in between
    pub async fn update(&mut self, sinks: &mut Sinks<'_>) -> Result<TempAndRelHumid, Error<E>> {
        let ticket = self.begin_update(sinks).await?;
        self.delay.delay_ms(ticket.delay_ms()).await;
        self.complete_update(ticket, sinks).await
    }

    /// Run a whole update cycle and return the reading without publishing it
    pub async fn measure(&mut self) -> Result<TempAndRelHumid, Error<E>> {
        self.update(&mut Sinks::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use embassy_futures::block_on;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

    fn cmd(cmd: Command) -> Transaction {
        Transaction::write(I2C_ADDR, cmd.to_be_bytes().to_vec())
    }

    fn setup_expectations(id: [u8; 3]) -> Vec<Transaction> {
        vec![
            cmd(Command::Wakeup),
            cmd(Command::SoftReset),
            cmd(Command::ReadIdRegister),
            Transaction::read(I2C_ADDR, id.to_vec()),
        ]
    }

    fn driver(expectations: &[Transaction]) -> Shtcx<I2cMock, NoopDelay> {
        Shtcx::new(I2cMock::new(expectations), NoopDelay::new())
    }

    fn finish(sht: Shtcx<I2cMock, NoopDelay>) {
        let (mut i2c, _) = sht.release();
        i2c.done();
    }

    #[test]
    fn settle_and_conversion_delays() {
        use embedded_hal_mock::eh1::delay::{CheckedDelay, Transaction as DelayTransaction};

        let mut expectations = setup_expectations([0x08, 0x07, 0x21]);
        expectations.extend([
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision),
            Transaction::read(I2C_ADDR, vec![0x80, 0x00, 0xA2, 0x80, 0x00, 0xA2]),
            cmd(Command::Sleep),
        ]);
        let delays = [
            // setup: wakeup, soft reset
            DelayTransaction::async_delay_us(200),
            DelayTransaction::async_delay_us(200),
            // cycle: wakeup, then the conversion time between poll and readout
            DelayTransaction::async_delay_us(200),
            DelayTransaction::async_delay_ms(50),
        ];
        let mut sht = Shtcx::new(I2cMock::new(&expectations), CheckedDelay::new(&delays));
        block_on(sht.setup()).unwrap();
        block_on(sht.measure()).unwrap();

        let (mut i2c, mut delay) = sht.release();
        i2c.done();
        delay.done();
    }

    #[test]
    fn setup_identifies_shtc3() {
        let mut sht = driver(&setup_expectations([0x08, 0x07, 0x21]));
        let id = block_on(sht.setup()).unwrap();
        assert_eq!(id, DeviceId { raw: 0x0807, sensor_type: SensorType::Shtc3 });
        assert_eq!(sht.state(), ComponentState::Ready);
        assert_eq!(sht.sensor_type(), SensorType::Shtc3);
        finish(sht);
    }

    #[test]
    fn setup_tolerates_nacked_wakeup() {
        let mut expectations = setup_expectations([0x00, 0x07, 0x16]);
        expectations[0] = cmd(Command::Wakeup).with_error(ErrorKind::Other);
        let mut sht = driver(&expectations);
        let id = block_on(sht.setup()).unwrap();
        assert_eq!(id.sensor_type, SensorType::Shtc1);
        finish(sht);
    }

    #[test]
    fn setup_failure_is_terminal() {
        let expectations = [
            cmd(Command::Wakeup),
            cmd(Command::SoftReset),
            cmd(Command::ReadIdRegister).with_error(ErrorKind::Other),
        ];
        let mut sht = driver(&expectations);
        assert_eq!(block_on(sht.setup()), Err(Error::I2c(ErrorKind::Other)));
        assert_eq!(sht.state(), ComponentState::Failed);

        let mut published = Vec::new();
        let mut sink = |r: Option<f32>| published.push(r);
        let mut sinks = Sinks::new().with_temperature(&mut sink);
        assert_eq!(block_on(sht.update(&mut sinks)), Err(Error::Failed));
        drop(sinks);
        assert!(published.is_empty());
        finish(sht);
    }

    #[test]
    fn setup_fails_on_id_checksum() {
        let mut sht = driver(&setup_expectations([0x08, 0x07, 0x22]));
        assert_eq!(block_on(sht.setup()), Err(Error::CrcMismatch));
        assert_eq!(sht.state(), ComponentState::Failed);
        assert_eq!(sht.device_id(), None);
        finish(sht);
    }

    #[test]
    fn update_before_setup_does_not_touch_the_bus() {
        let mut sht = driver(&[]);
        assert_eq!(block_on(sht.measure()), Err(Error::NotInitialized));
        finish(sht);
    }

    #[test]
    fn shtc3_cycle_wakes_measures_and_sleeps() {
        let mut expectations = setup_expectations([0x08, 0x07, 0x21]);
        expectations.extend([
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision),
            Transaction::read(I2C_ADDR, vec![0x66, 0x66, 0x93, 0x80, 0x00, 0xA2]),
            cmd(Command::Sleep),
        ]);
        let mut sht = driver(&expectations);
        block_on(sht.setup()).unwrap();

        let mut temps = Vec::new();
        let mut humids = Vec::new();
        let mut temp_sink = |r: Option<f32>| temps.push(r);
        let mut humid_sink = |r: Option<f32>| humids.push(r);
        let mut sinks = Sinks::new()
            .with_temperature(&mut temp_sink)
            .with_humidity(&mut humid_sink);
        let reading = block_on(sht.update(&mut sinks)).unwrap();
        drop(sinks);

        assert!((reading.centigrade - 24.9989).abs() < 0.001);
        assert_eq!(reading.humidity_percent, 50.0);
        assert_eq!(temps, [Some(reading.centigrade)]);
        assert_eq!(humids, [Some(50.0)]);
        assert!(!sht.has_warning());
        finish(sht);
    }

    #[test]
    fn shtc1_cycle_skips_wakeup_and_sleep() {
        let mut expectations = setup_expectations([0x00, 0x07, 0x16]);
        expectations.extend([
            cmd(Command::PollingHighPrecision),
            Transaction::read(I2C_ADDR, vec![0x00, 0x00, 0x81, 0xFF, 0xFF, 0xAC]),
        ]);
        let mut sht = driver(&expectations);
        block_on(sht.setup()).unwrap();

        let reading = block_on(sht.measure()).unwrap();
        assert_eq!(reading.centigrade, -45.0);
        assert!((reading.humidity_percent - 99.998).abs() < 0.001);
        finish(sht);
    }

    #[test]
    fn failed_poll_publishes_sentinels_without_sleeping() {
        let mut expectations = setup_expectations([0x08, 0x07, 0x21]);
        expectations.extend([
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision).with_error(ErrorKind::Other),
        ]);
        let mut sht = driver(&expectations);
        block_on(sht.setup()).unwrap();

        let mut published = Vec::new();
        let mut sink = |r: Option<f32>| published.push(r);
        let mut sinks = Sinks::new().with_humidity(&mut sink);
        assert_eq!(block_on(sht.update(&mut sinks)), Err(Error::I2c(ErrorKind::Other)));
        drop(sinks);

        assert_eq!(published, [None]);
        assert!(sht.has_warning());
        finish(sht);
    }

    #[test]
    fn read_failure_warns_and_next_cycle_resets_first() {
        let mut expectations = setup_expectations([0x08, 0x07, 0x21]);
        expectations.extend([
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision),
            Transaction::read(I2C_ADDR, vec![0; 6]).with_error(ErrorKind::Other),
            cmd(Command::Sleep),
            // recovery
            cmd(Command::SoftReset),
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision),
            Transaction::read(I2C_ADDR, vec![0x80, 0x00, 0xA2, 0x80, 0x00, 0xA2]),
            cmd(Command::Sleep),
        ]);
        let mut sht = driver(&expectations);
        block_on(sht.setup()).unwrap();

        let mut temps = Vec::new();
        let mut humids = Vec::new();
        let mut temp_sink = |r: Option<f32>| temps.push(r);
        let mut humid_sink = |r: Option<f32>| humids.push(r);
        let mut sinks = Sinks::new()
            .with_temperature(&mut temp_sink)
            .with_humidity(&mut humid_sink);

        assert_eq!(block_on(sht.update(&mut sinks)), Err(Error::I2c(ErrorKind::Other)));
        assert!(sht.has_warning());
        let reading = block_on(sht.update(&mut sinks)).unwrap();
        assert_eq!(reading.centigrade, 42.5);
        assert!(!sht.has_warning());
        drop(sinks);

        assert_eq!(temps, [None, Some(42.5)]);
        assert_eq!(humids, [None, Some(50.0)]);
        finish(sht);
    }

    #[test]
    fn checksum_mismatch_rejects_whole_readout() {
        let mut expectations = setup_expectations([0x08, 0x07, 0x21]);
        expectations.extend([
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision),
            Transaction::read(I2C_ADDR, vec![0x66, 0x66, 0x93, 0x80, 0x00, 0x00]),
            cmd(Command::Sleep),
        ]);
        let mut sht = driver(&expectations);
        block_on(sht.setup()).unwrap();

        let mut temps = Vec::new();
        let mut temp_sink = |r: Option<f32>| temps.push(r);
        let mut sinks = Sinks::new().with_temperature(&mut temp_sink);
        assert_eq!(block_on(sht.update(&mut sinks)), Err(Error::CrcMismatch));
        drop(sinks);

        assert_eq!(temps, [None]);
        assert!(sht.has_warning());
        finish(sht);
    }

    #[test]
    fn split_cycle_with_host_timer() {
        let mut expectations = setup_expectations([0x08, 0x07, 0x21]);
        expectations.extend([
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision),
            cmd(Command::Wakeup),
            cmd(Command::PollingHighPrecision),
            Transaction::read(I2C_ADDR, vec![0x80, 0x00, 0xA2, 0x80, 0x00, 0xA2]),
            cmd(Command::Sleep),
        ]);
        let mut sht = driver(&expectations);
        block_on(sht.setup()).unwrap();

        let mut sinks = Sinks::new();
        let abandoned = block_on(sht.begin_update(&mut sinks)).unwrap();
        let current = block_on(sht.begin_update(&mut sinks)).unwrap();
        assert_eq!(current.delay_ms(), MEASUREMENT_DURATION_MS);

        assert_eq!(block_on(sht.complete_update(abandoned, &mut sinks)), Err(Error::StaleTicket));
        let reading = block_on(sht.complete_update(current, &mut sinks)).unwrap();
        assert_eq!(reading.humidity_percent, 50.0);
        finish(sht);
    }
}
