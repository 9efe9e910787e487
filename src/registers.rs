//! Hardware register access.
//!
//! The driver only ever talks to the UART and the free-running counter through
//! [`UartRegisters`] and [`Counter`], so it can run against real memory-mapped
//! registers ([`MmioUart`], [`MmioCounter`]) or a simulated register bank.

use bitflags::bitflags;
use core::ptr::{with_exposed_provenance, with_exposed_provenance_mut};

bitflags! {
    /// Line status register (LSR).
    ///
    /// Reading the register clears the error bits (`OVERRUN`, `PARITY`,
    /// `FRAMING`, `BREAK`), so a value must be captured once and reused.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LineStatus: u8 {
        /// Data ready: at least one received byte is waiting in RBR.
        const DATA_READY = 1 << 0;
        /// Overrun error.
        const OVERRUN = 1 << 1;
        /// Parity error.
        const PARITY = 1 << 2;
        /// Framing error.
        const FRAMING = 1 << 3;
        /// Break interrupt.
        const BREAK = 1 << 4;
        /// Transmit holding register empty.
        const THR_EMPTY = 1 << 5;
        /// Transmitter empty, shift register included.
        const TX_EMPTY = 1 << 6;
        /// Error in the receive FIFO.
        const FIFO_ERROR = 1 << 7;
    }
}

impl LineStatus {
    /// Line errors latched for the byte this status was captured with.
    pub const ERRORS: Self = Self::OVERRUN
        .union(Self::PARITY)
        .union(Self::FRAMING)
        .union(Self::BREAK);

    /// Returns `true` if any receive error bit is set.
    #[inline]
    pub const fn has_errors(self) -> bool {
        self.intersects(Self::ERRORS)
    }
}

bitflags! {
    /// Modem control register (MCR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModemControl: u8 {
        /// Data terminal ready.
        const DTR = 1 << 0;
        /// Request to send. Asserted means "ready to receive".
        const RTS = 1 << 1;
        /// Auxiliary output 1.
        const OUT1 = 1 << 2;
        /// Auxiliary output 2.
        const OUT2 = 1 << 3;
        /// Loopback mode.
        const LOOP = 1 << 4;
    }
}

bitflags! {
    /// Modem status register (MSR).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ModemStatus: u8 {
        /// CTS changed since last read.
        const DELTA_CTS = 1 << 0;
        /// DSR changed since last read.
        const DELTA_DSR = 1 << 1;
        /// Trailing edge of RI.
        const TRAILING_RI = 1 << 2;
        /// DCD changed since last read.
        const DELTA_DCD = 1 << 3;
        /// Clear to send. Asserted means the peer accepts data.
        const CTS = 1 << 4;
        /// Data set ready.
        const DSR = 1 << 5;
        /// Ring indicator.
        const RI = 1 << 6;
        /// Data carrier detect.
        const DCD = 1 << 7;
    }
}

/// Typed access to a single UART's registers.
pub trait UartRegisters {
    /// Reads LSR. Clears the latched error bits as a side effect.
    fn line_status(&mut self) -> LineStatus;
    /// Reads one received byte from RBR.
    fn read_data(&mut self) -> u8;
    /// Queues one byte for transmission in THR.
    fn write_data(&mut self, byte: u8);
    /// Reads MCR.
    fn modem_control(&mut self) -> ModemControl;
    /// Writes MCR.
    fn set_modem_control(&mut self, mcr: ModemControl);
    /// Reads MSR.
    fn modem_status(&mut self) -> ModemStatus;
}

/// A free-running 32-bit up-counter that wraps silently.
pub trait Counter {
    /// Starts the counter. Must be harmless when it is already running.
    fn start(&mut self);
    /// Reads the current counter value.
    fn value(&mut self) -> u32;
}

/// Register offsets of an 8250-style UART with 32-bit registers.
mod offsets {
    /// Receive buffer (read) / transmit holding (write).
    pub const RBR_THR: usize = 0x00;
    /// Modem control.
    pub const MCR: usize = 0x10;
    /// Line status.
    pub const LSR: usize = 0x14;
    /// Modem status.
    pub const MSR: usize = 0x18;
}

/// Counter control bit that starts the counter.
pub const COUNTER_ENABLE: u32 = 1 << 31;

/// Memory-mapped 8250-style UART.
pub struct MmioUart {
    base: usize,
}

impl MmioUart {
    /// Creates a register block at `base`.
    ///
    /// # Safety
    ///
    /// - `base` must be the address of an 8250-compatible UART whose registers
    ///   are 32 bits wide at a 4-byte stride, mapped and valid for volatile
    ///   reads and writes.
    /// - No other code may access this UART while the returned value is live.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    #[inline]
    fn read(&self, offset: usize) -> u32 {
        let reg = with_exposed_provenance::<u32>(self.base + offset);
        // SAFETY: The constructor contract guarantees `base + offset` is a mapped UART register.
        unsafe { reg.read_volatile() }
    }

    #[inline]
    fn write(&mut self, offset: usize, value: u32) {
        let reg = with_exposed_provenance_mut::<u32>(self.base + offset);
        // SAFETY: The constructor contract guarantees `base + offset` is a mapped UART register.
        unsafe { reg.write_volatile(value) }
    }
}

impl UartRegisters for MmioUart {
    #[inline]
    fn line_status(&mut self) -> LineStatus {
        LineStatus::from_bits_retain(self.read(offsets::LSR) as u8)
    }

    #[inline]
    fn read_data(&mut self) -> u8 {
        (self.read(offsets::RBR_THR) & 0xff) as u8
    }

    #[inline]
    fn write_data(&mut self, byte: u8) {
        self.write(offsets::RBR_THR, u32::from(byte));
    }

    #[inline]
    fn modem_control(&mut self) -> ModemControl {
        ModemControl::from_bits_retain(self.read(offsets::MCR) as u8)
    }

    #[inline]
    fn set_modem_control(&mut self, mcr: ModemControl) {
        self.write(offsets::MCR, u32::from(mcr.bits()));
    }

    #[inline]
    fn modem_status(&mut self) -> ModemStatus {
        ModemStatus::from_bits_retain(self.read(offsets::MSR) as u8)
    }
}

/// Memory-mapped free-running counter with separate control and value registers.
pub struct MmioCounter {
    control: usize,
    value: usize,
}

impl MmioCounter {
    /// Creates a counter from its control and value register addresses.
    ///
    /// # Safety
    ///
    /// - Both addresses must be mapped 32-bit registers valid for volatile access.
    /// - Setting bit 31 of `control` must start the counter without resetting it.
    /// - No other code may reconfigure this counter while the returned value is live.
    pub const unsafe fn new(control: usize, value: usize) -> Self {
        Self { control, value }
    }
}

impl Counter for MmioCounter {
    #[inline]
    fn start(&mut self) {
        let reg = with_exposed_provenance_mut::<u32>(self.control);
        // SAFETY: The constructor contract guarantees `control` is a mapped counter register.
        unsafe { reg.write_volatile(COUNTER_ENABLE) }
    }

    #[inline]
    fn value(&mut self) -> u32 {
        let reg = with_exposed_provenance::<u32>(self.value);
        // SAFETY: The constructor contract guarantees `value` is a mapped counter register.
        unsafe { reg.read_volatile() }
    }
}
