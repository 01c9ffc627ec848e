//! This is a platform-agnostic Rust driver for the Sensirion SHTC1 and SHTC3 humidity and
//! temperature sensors using the [`embedded-hal`] or [`embedded-hal-async`] traits.
//!
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal
//! [`embedded-hal-async`]: https://github.com/rust-embedded/embedded-hal/tree/master/embedded-hal-async
//!
//! This driver allows you to:
//! - Identify the chip variant from its ID register.
//! - Run periodic update cycles: wake, high precision measurement, CRC-checked readout,
//!   conversion, publishing to optional temperature/humidity sinks, and sleep again.
//! - Split a cycle around the 50 ms conversion time so a host timer can run the second half.
//! - Recover from a failed cycle with a soft reset at the start of the next one.
//! - Trigger a software reset, wakeup, or sleep directly.
//! - blocking API support.
//! - async API support.
//!
//! This driver does not support the low power measurement modes, clock stretching, or
//! humidity-first readout.
//!
//! ## Features
//!
//! - `async`: Enables async API.
//! - `blocking`: Enables blocking API in [`blocking`].
//! - `defmt`: Enables logging using the `defmt` framework.
//! - `log`: Enables logging using the `log` framework.
//!
//! ## Supported devices: SHTC1, SHTC3
//!
//! Both share the I2C address 0x70 and the same measurement protocol. The SHTC3 adds a sleep
//! mode that the driver enters between cycles to limit self-heating; the SHTC1 is always awake
//! and does not acknowledge the sleep and wakeup commands.
//!
//! Datasheets:
//!   [SHTC1](https://sensirion.com/media/documents/7F9BB7D0/61645FB9/Sensirion_Humidity_Sensors_SHTC1_Datasheet.pdf)
//!   [SHTC3](https://sensirion.com/media/documents/643F9C8E/63A5A436/Datasheet_SHTC3.pdf)
//!
//! ## Async Example:
//!
//! ```ignore
//! use shtcx::{Shtcx, Sinks};
//!
//! // Platform-specific
//! let i2c = /* embedded_hal_async::i2c::I2c instance */;
//! let delay = /* embedded_hal_async::delay::DelayNs instance */;
//!
//! let mut shtcx = Shtcx::new(i2c, delay);
//! let id = shtcx.setup().await.unwrap();
//! println!("found {}", id);
//!
//! let mut temperature = |t: Option<f32>| println!("{:?} °C", t);
//! let mut humidity = |h: Option<f32>| println!("{:?} %RH", h);
//! let mut sinks = Sinks::new()
//!     .with_temperature(&mut temperature)
//!     .with_humidity(&mut humidity);
//! loop {
//!     // errors are already published as `None` and retried on the next cycle
//!     let _ = shtcx.update(&mut sinks).await;
//!
//!     // Platform-specific: sleep a while
//!     sleep_secs(60);
//! }
//! ```
//!
//! ## Blocking Example:
//!
//! ```ignore
//! use shtcx::{blocking::Shtcx, Sinks};
//!
//! // Platform-specific
//! let i2c = /* embedded_hal::i2c::I2c instance */;
//! let delay = /* embedded_hal::delay::DelayNs instance */;
//!
//! let mut shtcx = Shtcx::new(i2c, delay);
//! shtcx.setup().unwrap();
//! shtcx.log_config();
//!
//! // Start a measurement and let the host timer finish it
//! let mut sinks = Sinks::new();
//! if let Ok(ticket) = shtcx.begin_update(&mut sinks) {
//!     host_timer_wait_ms(ticket.delay_ms());
//!     let reading = shtcx.complete_update(ticket, &mut sinks).unwrap();
//!     println!("{:0.1} %RH, {:0.1} °C", reading.humidity_percent, reading.centigrade);
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![cfg_attr(not(test), no_std)]

#[cfg(not(any(feature = "async", feature = "blocking")))]
compile_error!("At least one of \"async\" and \"blocking\" features must be enabled");

#[cfg(all(feature = "defmt", feature = "log"))]
compile_error!("Features \"defmt\" and \"log\" are mutually exclusive and cannot be enabled together");

#[macro_use]
mod fmt; // must be first, the logging macros are textually scoped

#[cfg(feature = "blocking")]
pub mod blocking;
#[cfg(feature = "async")]
mod device_impl;
mod hw_def;
mod types;

pub use crate::{hw_def::*, types::*};
