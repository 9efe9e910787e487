//! A shared console that can live in a `static`.
//!
//! Formatted output from anywhere in the bootloader (panic handlers included)
//! needs somewhere global to find the UART. [`Console`] holds an installed
//! [`Uart`] behind a critical section.

use core::cell::RefCell;
use core::fmt::{self, Write as _};

use critical_section::Mutex;

use crate::registers::UartRegisters;
use crate::ring::RX_CAPACITY;
use crate::uart::Uart;

/// Error returned by [`Console::install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleError {
    /// A UART is already installed.
    AlreadyInstalled,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyInstalled => f.write_str("console already has a UART installed"),
        }
    }
}

impl core::error::Error for ConsoleError {}

/// Global slot for the console UART.
///
/// ```ignore
/// static CONSOLE: Console<MmioUart> = Console::new();
///
/// CONSOLE.install(uart)?;
/// CONSOLE.write_fmt(format_args!("booting {}\n", version))?;
/// ```
pub struct Console<R, const N: usize = RX_CAPACITY> {
    uart: Mutex<RefCell<Option<Uart<R, N>>>>,
}

impl<R, const N: usize> Default for Console<R, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, const N: usize> Console<R, N> {
    /// Creates an empty console.
    pub const fn new() -> Self {
        Self {
            uart: Mutex::new(RefCell::new(None)),
        }
    }
}

impl<R: UartRegisters, const N: usize> Console<R, N> {
    /// Installs `uart` as the console.
    ///
    /// # Errors
    ///
    /// [`ConsoleError::AlreadyInstalled`] if a UART is already installed; the
    /// new one is dropped.
    pub fn install(&self, uart: Uart<R, N>) -> Result<(), ConsoleError> {
        critical_section::with(|cs| {
            // Busy means someone is inside `with`, so a UART is installed.
            let Ok(mut slot) = self.uart.borrow(cs).try_borrow_mut() else {
                return Err(ConsoleError::AlreadyInstalled);
            };
            if slot.is_some() {
                return Err(ConsoleError::AlreadyInstalled);
            }
            *slot = Some(uart);
            info!("console installed");
            Ok(())
        })
    }

    /// Removes and returns the installed UART.
    ///
    /// Returns `None` while the console is in use.
    pub fn take(&self) -> Option<Uart<R, N>> {
        critical_section::with(|cs| self.uart.borrow(cs).try_borrow_mut().ok()?.take())
    }

    /// Returns `true` if a UART is installed.
    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| {
            self.uart
                .borrow(cs)
                .try_borrow()
                .map_or(true, |slot| slot.is_some())
        })
    }

    /// Runs `f` on the installed UART inside a critical section.
    ///
    /// Returns `None` without calling `f` if nothing is installed, or if the
    /// console is already in use further up the stack (a panic raised inside
    /// `f` and reported through this console, for example).
    pub fn with<T>(&self, f: impl FnOnce(&mut Uart<R, N>) -> T) -> Option<T> {
        critical_section::with(|cs| {
            let mut slot = self.uart.borrow(cs).try_borrow_mut().ok()?;
            slot.as_mut().map(f)
        })
    }

    /// Writes `s`, expanding newlines. Dropped if nothing is installed or the
    /// console is busy.
    pub fn write_str(&self, s: &str) -> fmt::Result {
        self.with(|uart| uart.write_str(s)).unwrap_or(Ok(()))
    }

    /// Writes formatted output, expanding newlines. Dropped if nothing is
    /// installed or the console is busy.
    pub fn write_fmt(&self, args: fmt::Arguments<'_>) -> fmt::Result {
        self.with(|uart| uart.write_fmt(args)).unwrap_or(Ok(()))
    }
}
