//! Simulated register bank for host tests.

extern crate std;

use std::collections::VecDeque;
use std::vec::Vec;

use crate::registers::{Counter, LineStatus, ModemControl, ModemStatus, UartRegisters};

/// UART model: an RX FIFO fed by the test, a TX log, and modem lines.
pub(crate) struct SimUart {
    /// Pending received bytes with the error bits latched for each.
    pub rx: VecDeque<(u8, LineStatus)>,
    /// Everything written to THR, in order.
    pub tx: Vec<u8>,
    /// Number of LSR reads that report THR busy before it turns empty.
    pub tx_busy_polls: usize,
    pub mcr: ModemControl,
    pub msr: ModemStatus,
    /// Number of LSR reads so far.
    pub lsr_reads: usize,
    /// Number of MSR reads so far.
    pub msr_reads: usize,
    /// Every value written to MCR.
    pub mcr_writes: Vec<ModemControl>,
    /// Raises CTS once more than this many MSR reads have happened.
    pub cts_after: Option<usize>,
    /// Hides queued RX bytes until more than this many LSR reads have happened.
    pub rx_after: Option<usize>,
}

impl SimUart {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            tx_busy_polls: 0,
            mcr: ModemControl::DTR,
            msr: ModemStatus::CTS,
            lsr_reads: 0,
            msr_reads: 0,
            mcr_writes: Vec::new(),
            cts_after: None,
            rx_after: None,
        }
    }

    /// Queues bytes as if they arrived on the wire without errors.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx
            .extend(bytes.iter().map(|&b| (b, LineStatus::empty())));
    }
}

impl UartRegisters for SimUart {
    fn line_status(&mut self) -> LineStatus {
        self.lsr_reads += 1;
        let mut lsr = LineStatus::empty();
        let arrived = self.rx_after.map_or(true, |n| self.lsr_reads > n);
        if let (true, Some(&(_, errors))) = (arrived, self.rx.front()) {
            lsr |= LineStatus::DATA_READY | errors;
        }
        if self.tx_busy_polls == 0 {
            lsr |= LineStatus::THR_EMPTY | LineStatus::TX_EMPTY;
        } else {
            self.tx_busy_polls -= 1;
        }
        lsr
    }

    fn read_data(&mut self) -> u8 {
        self.rx.pop_front().map_or(0, |(b, _)| b)
    }

    fn write_data(&mut self, byte: u8) {
        self.tx.push(byte);
    }

    fn modem_control(&mut self) -> ModemControl {
        self.mcr
    }

    fn set_modem_control(&mut self, mcr: ModemControl) {
        self.mcr = mcr;
        self.mcr_writes.push(mcr);
    }

    fn modem_status(&mut self) -> ModemStatus {
        self.msr_reads += 1;
        if let Some(n) = self.cts_after {
            if self.msr_reads > n {
                self.msr |= ModemStatus::CTS;
            }
        }
        self.msr
    }
}

/// Free-running counter that advances by `step` on every read.
pub(crate) struct SimCounter {
    /// Value returned by the most recent read.
    pub last: u32,
    next: u32,
    step: u32,
    /// Number of `start` calls.
    pub starts: usize,
    pub running: bool,
}

impl SimCounter {
    pub fn new(start: u32, step: u32) -> Self {
        Self {
            last: start,
            next: start,
            step,
            starts: 0,
            running: false,
        }
    }
}

impl Counter for SimCounter {
    fn start(&mut self) {
        self.starts += 1;
        self.running = true;
    }

    fn value(&mut self) -> u32 {
        self.last = self.next;
        self.next = self.next.wrapping_add(self.step);
        self.last
    }
}
