use crate::hw_def::*;

use core::fmt;

#[cfg(feature="defmt")]
use defmt::Format;

/// SHTCx device driver using the async `embedded-hal-async` traits
#[cfg(feature = "async")]
#[derive(Debug)]
pub struct Shtcx<I2C, Delay> {
    pub(crate) i2c: I2C,
    pub(crate) delay: Delay,
    pub(crate) i2c_addr: u8,
    pub(crate) state: DriverState,
}

/// All possible errors in this crate
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// I²C communication error
    I2c(E),
    /// Failure of a checksum from the device was detected
    CrcMismatch,
    /// `setup()` has not completed yet
    NotInitialized,
    /// Setup failed; the driver will not talk to the device again until the next `setup()`
    Failed,
    /// The measurement ticket was superseded by a newer cycle or by `setup()`
    StaleTicket,
}

/// Lifecycle of the driver
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComponentState {
    /// `setup()` has not run yet
    Uninitialized,
    /// device identified, update cycles allowed
    Ready,
    /// setup failed
    Failed,
}

/// Chip variant decoded from the ID register
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SensorType {
    /// SHTC1: no sleep mode
    Shtc1,
    /// SHTC3
    Shtc3,
    /// ID register did not match the SHTCx family
    Unknown,
}
impl SensorType {
    /// Classify an ID register value
    pub fn from_id(id: u16) -> Self {
        if id & ID_FAMILY_MASK != ID_FAMILY_SHTCX {
            SensorType::Unknown
        } else if id & ID_SHTC3_BIT != 0 {
            SensorType::Shtc3
        } else {
            SensorType::Shtc1
        }
    }

    /// Whether the chip understands the sleep and wakeup commands
    pub fn has_sleep_mode(&self) -> bool {
        *self != SensorType::Shtc1
    }
}
impl fmt::Display for SensorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorType::Shtc1 => write!(f, "SHTC1"),
            SensorType::Shtc3 => write!(f, "SHTC3"),
            SensorType::Unknown => write!(f, "[Unknown model]"),
        }
    }
}

/// Contents of the ID register, read once during setup
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeviceId {
    /// raw register value
    pub raw: u16,
    /// decoded chip variant
    pub sensor_type: SensorType,
}
impl From<u16> for DeviceId {
    fn from(raw: u16) -> Self {
        Self {
            raw,
            sensor_type: SensorType::from_id(raw),
        }
    }
}
impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:04x})", self.sensor_type, self.raw)
    }
}

/// Raw (still in u16 format) temperature and relative humidity from the device
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawTempAndRelHumid {
    /// unprocessed temperature
    pub temperature: u16,
    /// unprocessed relative humidity
    pub humidity: u16,
}
impl RawTempAndRelHumid {
    /// Get temperature in Fahrenheit
    pub fn fahrenheit(&self) -> f32 {
        raw_temp_to_fahrenheit(self.temperature)
    }
    /// Get temperature in Centigrade
    pub fn centigrade(&self) -> f32 {
        raw_temp_to_centigrade(self.temperature)
    }
    /// Get relative humidity in percent
    pub fn humidity_percent(&self) -> f32 {
        raw_rel_humid_to_percent(self.humidity)
    }
}

/// Temp and relative humidity from the device after conversion
#[cfg_attr(feature = "defmt", derive(Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempAndRelHumid {
    /// degrees centigrade
    pub centigrade: f32,
    /// degrees fahrenheit
    pub fahrenheit: f32,
    /// relative humidity in percent
    pub humidity_percent: f32,
}
impl From<&RawTempAndRelHumid> for TempAndRelHumid {
    fn from(raw: &RawTempAndRelHumid) -> Self {
        Self {
            centigrade: raw.centigrade(),
            fahrenheit: raw.fahrenheit(),
            humidity_percent: raw.humidity_percent(),
        }
    }
}

/// Receiver for one measured quantity
pub trait Sink {
    /// Publish a new value; `None` means no valid reading this cycle
    fn publish(&mut self, reading: Option<f32>);
}
impl<F> Sink for F
where
    F: FnMut(Option<f32>),
{
    fn publish(&mut self, reading: Option<f32>) {
        self(reading)
    }
}

/// Optional temperature and humidity receivers for an update cycle
#[derive(Default)]
pub struct Sinks<'a> {
    temperature: Option<&'a mut dyn Sink>,
    humidity: Option<&'a mut dyn Sink>,
}
impl<'a> Sinks<'a> {
    /// No receivers
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive temperatures in degrees centigrade
    pub fn with_temperature(mut self, sink: &'a mut dyn Sink) -> Self {
        self.temperature = Some(sink);
        self
    }

    /// Receive relative humidity in percent
    pub fn with_humidity(mut self, sink: &'a mut dyn Sink) -> Self {
        self.humidity = Some(sink);
        self
    }

    pub(crate) fn publish(&mut self, reading: Option<&TempAndRelHumid>) {
        if let Some(sink) = self.temperature.as_deref_mut() {
            sink.publish(reading.map(|r| r.centigrade));
        }
        if let Some(sink) = self.humidity.as_deref_mut() {
            sink.publish(reading.map(|r| r.humidity_percent));
        }
    }
}

/// A started measurement waiting for the conversion to finish.
///
/// Hand it back to `complete_update()` after [`MeasurementTicket::delay_ms`] milliseconds.
/// Dropping it abandons the cycle; starting a new cycle or re-running setup invalidates it.
#[must_use = "dropping the ticket abandons the measurement"]
#[derive(Debug, Eq, PartialEq)]
pub struct MeasurementTicket {
    generation: u32,
}
impl MeasurementTicket {
    /// How long to wait before reading the result
    pub const fn delay_ms(&self) -> u32 {
        MEASUREMENT_DURATION_MS
    }
}

/// Steps before the measurement command of one cycle
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct CyclePlan {
    /// recovery reset after a failed cycle
    pub(crate) soft_reset: bool,
    /// everything but an SHTC1 sleeps between cycles
    pub(crate) wake_up: bool,
}

/// Bus-independent half of the driver: lifecycle, identity, warning flag and the pending cycle
#[derive(Debug)]
pub(crate) struct DriverState {
    lifecycle: ComponentState,
    device_id: Option<DeviceId>,
    warning: bool,
    generation: u32,
    pending: Option<u32>,
}
impl DriverState {
    pub(crate) const fn new() -> Self {
        Self {
            lifecycle: ComponentState::Uninitialized,
            device_id: None,
            warning: false,
            generation: 0,
            pending: None,
        }
    }

    pub(crate) fn lifecycle(&self) -> ComponentState {
        self.lifecycle
    }

    pub(crate) fn device_id(&self) -> Option<DeviceId> {
        self.device_id
    }

    pub(crate) fn sensor_type(&self) -> SensorType {
        self.device_id.map_or(SensorType::Unknown, |id| id.sensor_type)
    }

    pub(crate) fn has_warning(&self) -> bool {
        self.warning
    }

    pub(crate) fn has_sleep_mode(&self) -> bool {
        self.sensor_type().has_sleep_mode()
    }

    pub(crate) fn ensure_ready<E>(&self) -> Result<(), Error<E>> {
        match self.lifecycle {
            ComponentState::Ready => Ok(()),
            ComponentState::Uninitialized => Err(Error::NotInitialized),
            ComponentState::Failed => Err(Error::Failed),
        }
    }

    pub(crate) fn begin_setup(&mut self) {
        info!("Setting up SHTCx...");
        self.lifecycle = ComponentState::Uninitialized;
        self.device_id = None;
        self.warning = false;
        self.pending = None;
    }

    /// Record the outcome of the ID register read that ends `setup()`
    pub(crate) fn finish_setup<E>(&mut self, id: Result<u16, Error<E>>) -> Result<DeviceId, Error<E>> {
        match id {
            Ok(raw) => {
                let id = DeviceId::from(raw);
                info!("Device identified: {} ({:#x})", id.sensor_type, id.raw);
                self.device_id = Some(id);
                self.lifecycle = ComponentState::Ready;
                Ok(id)
            }
            Err(err) => {
                error!("Error reading Device ID");
                self.lifecycle = ComponentState::Failed;
                Err(err)
            }
        }
    }

    /// Decide the steps that precede the measurement command
    pub(crate) fn plan_cycle<E>(&self) -> Result<CyclePlan, Error<E>> {
        self.ensure_ready()?;
        if self.warning {
            warn!("Retrying to reconnect the sensor");
        }
        Ok(CyclePlan {
            soft_reset: self.warning,
            wake_up: self.has_sleep_mode(),
        })
    }

    /// Record the outcome of the measurement command
    pub(crate) fn finish_poll<E>(
        &mut self,
        polled: Result<(), Error<E>>,
        sinks: &mut Sinks<'_>,
    ) -> Result<MeasurementTicket, Error<E>> {
        match polled {
            Ok(()) => Ok(self.issue_ticket()),
            Err(err) => {
                error!("sensor polling failed");
                self.pending = None;
                self.warning = true;
                sinks.publish(None);
                Err(err)
            }
        }
    }

    fn issue_ticket(&mut self) -> MeasurementTicket {
        self.generation = self.generation.wrapping_add(1);
        self.pending = Some(self.generation);
        MeasurementTicket {
            generation: self.generation,
        }
    }

    pub(crate) fn redeem<E>(&mut self, ticket: MeasurementTicket) -> Result<(), Error<E>> {
        self.ensure_ready()?;
        if self.pending != Some(ticket.generation) {
            warn!("ignoring stale measurement ticket {}", ticket.generation);
            return Err(Error::StaleTicket);
        }
        self.pending = None;
        Ok(())
    }

    pub(crate) fn finish_readout<E>(
        &mut self,
        raw: Result<RawTempAndRelHumid, Error<E>>,
        sinks: &mut Sinks<'_>,
    ) -> Result<TempAndRelHumid, Error<E>> {
        match raw {
            Ok(raw) => {
                let reading = TempAndRelHumid::from(&raw);
                debug!(
                    "Got temperature={} C humidity={} %",
                    reading.centigrade, reading.humidity_percent
                );
                sinks.publish(Some(&reading));
                self.warning = false;
                Ok(reading)
            }
            Err(err) => {
                error!("sensor read failed");
                self.warning = true;
                sinks.publish(None);
                Err(err)
            }
        }
    }

    pub(crate) fn log_config(&self, i2c_addr: u8) {
        info!("SHTCx:");
        match self.device_id {
            Some(id) => info!("  Model: {} ({:#x})", id.sensor_type, id.raw),
            None => info!("  Model: not identified"),
        }
        info!("  Address: {:#x}", i2c_addr);
        if self.lifecycle == ComponentState::Failed {
            error!("Communication with SHTCx failed!");
        }
    }
}

/// Validate every 3-byte group of `buf` and only then unpack the words.
///
/// Nothing is written to `words` unless all checksums match.
pub(crate) fn decode_words<E>(buf: &[u8], words: &mut [u16]) -> Result<(), Error<E>> {
    debug_assert_eq!(buf.len(), words.len() * WORD_GROUP_LEN);
    for group in buf.chunks_exact(WORD_GROUP_LEN) {
        let expected = crc8(&[group[0], group[1]]);
        if group[2] != expected {
            warn!("CRC8 checksum invalid! {:#x} != {:#x}", group[2], expected);
            return Err(Error::CrcMismatch);
        }
    }
    for (group, word) in buf.chunks_exact(WORD_GROUP_LEN).zip(words.iter_mut()) {
        *word = u16::from_be_bytes([group[0], group[1]]);
    }
    Ok(())
}
