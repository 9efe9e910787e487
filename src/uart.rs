//! Polling UART driver.
//!
//! Everything is driven by [`Uart::poll`], which moves every byte the receiver
//! holds into the [`RxRing`] without blocking. Reads and writes call it on
//! each iteration, so received data keeps flowing into the ring even while a
//! write is waiting for the transmitter.

use core::fmt;
use core::hint::spin_loop;
use core::time::Duration;

use crate::ConfigError;
use crate::registers::{Counter, LineStatus, ModemControl, ModemStatus, UartRegisters};
use crate::ring::{RX_CAPACITY, RxRecord, RxRing};
use crate::timer::Timer;

/// Buffered records at which RTS is dropped.
pub const RTS_STOP: usize = 64;
/// Buffered records at or below which RTS is raised again.
pub const RTS_RESUME: usize = 32;

/// Hardware handshake mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlowControl {
    /// No handshake. A full receive ring drops its oldest bytes.
    #[default]
    None,
    /// RTS is dropped when the receive ring backs up, and bytes are only
    /// sent while the peer asserts CTS.
    RtsCts,
}

/// RTS hysteresis band, in buffered records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Watermarks {
    /// Drop RTS once this many records are buffered.
    pub stop: usize,
    /// Raise RTS again once the backlog is down to this many records.
    pub resume: usize,
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            stop: RTS_STOP,
            resume: RTS_RESUME,
        }
    }
}

/// Driver configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Handshake mode.
    pub flow_control: FlowControl,
    /// RTS watermarks, only used with [`FlowControl::RtsCts`].
    pub watermarks: Watermarks,
}

impl Config {
    /// No flow control, default watermarks.
    pub const fn new() -> Self {
        Self {
            flow_control: FlowControl::None,
            watermarks: Watermarks {
                stop: RTS_STOP,
                resume: RTS_RESUME,
            },
        }
    }

    /// Sets the handshake mode.
    #[must_use]
    pub const fn flow_control(mut self, flow_control: FlowControl) -> Self {
        self.flow_control = flow_control;
        self
    }

    /// Sets the RTS watermarks.
    #[must_use]
    pub const fn watermarks(mut self, stop: usize, resume: usize) -> Self {
        self.watermarks = Watermarks { stop, resume };
        self
    }

    /// Checks the configuration against a ring with `capacity` slots.
    pub fn validate(&self, capacity: usize) -> Result<(), ConfigError> {
        if self.flow_control == FlowControl::None {
            return Ok(());
        }
        let Watermarks { stop, resume } = self.watermarks;
        if resume >= stop {
            return Err(ConfigError::ResumeNotBelowStop);
        }
        // One slot is always kept free.
        if stop > capacity.saturating_sub(1) {
            return Err(ConfigError::StopBeyondCapacity);
        }
        Ok(())
    }
}

/// A single polled UART with its receive ring.
///
/// There is no locking: the driver expects to be the only code touching the
/// UART and is never re-entered from an interrupt handler.
pub struct Uart<R, const N: usize = RX_CAPACITY> {
    regs: R,
    rx: RxRing<N>,
    config: Config,
    /// RTS is currently dropped because the ring backed up.
    rx_paused: bool,
}

impl<R: UartRegisters, const N: usize> Uart<R, N> {
    /// Creates a driver over `regs`.
    ///
    /// With [`FlowControl::RtsCts`], RTS is raised so the peer may start sending.
    pub fn new(mut regs: R, config: Config) -> Result<Self, ConfigError> {
        config.validate(N)?;

        if config.flow_control == FlowControl::RtsCts {
            let mcr = regs.modem_control();
            regs.set_modem_control(mcr | ModemControl::RTS);
        }
        info!("uart ready, {} rx slots", N - 1);

        Ok(Self {
            regs,
            rx: RxRing::new(),
            config,
            rx_paused: false,
        })
    }

    /// The configuration this driver was built with.
    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The receive ring.
    #[inline]
    pub fn rx(&self) -> &RxRing<N> {
        &self.rx
    }

    /// Returns `true` while RTS is dropped to hold off the peer.
    #[inline]
    pub fn rx_paused(&self) -> bool {
        self.rx_paused
    }

    /// Gives back the register block.
    pub fn release(self) -> R {
        self.regs
    }

    /// Moves every byte the receiver holds into the ring.
    ///
    /// Never blocks. Each byte is stored with the LSR value read just before
    /// it. Returns the last LSR value, the one that showed no more data; its
    /// transmitter bits are current.
    pub fn poll(&mut self) -> LineStatus {
        let mut lsr = self.regs.line_status();
        while lsr.contains(LineStatus::DATA_READY) {
            let data = self.regs.read_data();
            self.rx.push(lsr.bits(), data);
            if self.config.flow_control == FlowControl::RtsCts
                && !self.rx_paused
                && self.rx.is_nearly_full(self.config.watermarks.stop)
            {
                self.pause_rx();
            }
            lsr = self.regs.line_status();
        }
        lsr
    }

    fn pause_rx(&mut self) {
        let mcr = self.regs.modem_control();
        self.regs.set_modem_control(mcr - ModemControl::RTS);
        self.rx_paused = true;
        debug!("rx backlog {}, RTS off", self.rx.len());
    }

    fn resume_rx(&mut self) {
        let mcr = self.regs.modem_control();
        self.regs.set_modem_control(mcr | ModemControl::RTS);
        self.rx_paused = false;
        debug!("rx backlog {}, RTS on", self.rx.len());
    }

    fn clear_to_send(&mut self) -> bool {
        match self.config.flow_control {
            FlowControl::None => true,
            FlowControl::RtsCts => self.regs.modem_status().contains(ModemStatus::CTS),
        }
    }

    /// Sends one byte.
    ///
    /// Spins until the transmit holding register is empty and, with
    /// [`FlowControl::RtsCts`], the peer asserts CTS. There is no timeout: if
    /// the transmitter never drains this never returns. Incoming bytes are
    /// still collected while waiting.
    pub fn write_byte(&mut self, byte: u8) {
        loop {
            let lsr = self.poll();
            if lsr.contains(LineStatus::THR_EMPTY) && self.clear_to_send() {
                break;
            }
            spin_loop();
        }
        self.regs.write_data(byte);
    }

    /// Sends every byte of `bytes` as is.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.write_byte(b);
        }
    }

    /// Sends one console character, expanding `\n` to `\r\n`.
    pub fn putc(&mut self, byte: u8) {
        if byte == b'\n' {
            self.write_byte(b'\r');
        }
        self.write_byte(byte);
    }

    /// Spins until the transmitter, shift register included, is idle.
    pub fn flush(&mut self) {
        while !self.poll().contains(LineStatus::TX_EMPTY) {
            spin_loop();
        }
    }

    /// Takes the oldest received record, polling the hardware first.
    ///
    /// Never blocks. With [`FlowControl::RtsCts`], RTS is raised again once
    /// the backlog drains to the resume watermark.
    pub fn read_record(&mut self) -> Option<RxRecord> {
        self.poll();
        let record = self.rx.pop()?;
        if self.rx_paused && self.rx.is_below(self.config.watermarks.resume) {
            self.resume_rx();
        }
        Some(record)
    }

    /// Takes the oldest received byte, if any. Never blocks.
    #[inline]
    pub fn read(&mut self) -> Option<u8> {
        self.read_record().map(RxRecord::data)
    }

    /// Waits for a byte for at most `timeout`, or forever with `None`.
    ///
    /// The deadline is taken once on entry. Returns `None` when it passes
    /// without data; a zero timeout still polls once.
    pub fn read_timeout<C: Counter>(
        &mut self,
        timer: &mut Timer<C>,
        timeout: Option<Duration>,
    ) -> Option<u8> {
        let deadline = timeout.map(|t| timer.deadline_after(timer.ticks_from_duration(t)));
        loop {
            if let Some(b) = self.read() {
                return Some(b);
            }
            if let Some(deadline) = &deadline {
                if timer.reached(deadline) {
                    return None;
                }
            }
            spin_loop();
        }
    }
}

impl<R: UartRegisters, const N: usize> fmt::Write for Uart<R, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.putc(b);
        }
        Ok(())
    }
}
