#![no_std]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

// This must go first so the logging macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod console;
pub mod registers;
pub mod ring;
#[cfg(test)]
mod sim;
pub mod timer;
pub mod uart;

pub use console::{Console, ConsoleError};
pub use registers::{
    Counter, LineStatus, MmioCounter, MmioUart, ModemControl, ModemStatus, UartRegisters,
};
pub use ring::{RX_CAPACITY, RxRecord, RxRing};
pub use timer::{DEFAULT_TIMER_HZ, Deadline, Timer};
pub use uart::{Config, FlowControl, RTS_RESUME, RTS_STOP, Uart, Watermarks};

/// Error returned when a driver or timer is constructed with settings it can not honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// The timer frequency is zero.
    ZeroFrequency,
    /// The RTS resume watermark is not below the stop watermark.
    ResumeNotBelowStop,
    /// The RTS stop watermark can never be reached with this ring capacity.
    StopBeyondCapacity,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ZeroFrequency => f.write_str("timer frequency must be non-zero"),
            Self::ResumeNotBelowStop => {
                f.write_str("RTS resume watermark must be below the stop watermark")
            }
            Self::StopBeyondCapacity => {
                f.write_str("RTS stop watermark exceeds the usable ring capacity")
            }
        }
    }
}

impl core::error::Error for ConfigError {}
