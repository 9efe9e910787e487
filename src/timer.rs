//! Overflow-safe timer deadlines and busy-wait delays.
//!
//! The hardware counter is 32 bits wide and wraps silently; at 27 MHz that
//! happens roughly every 159 seconds. A [`Deadline`] remembers where it
//! started so that "reached" can still be decided after the counter wraps.

use core::time::Duration;

use crate::ConfigError;
use crate::registers::Counter;

/// Timer clock of the platform counter, in Hz.
pub const DEFAULT_TIMER_HZ: u32 = 27_000_000;

/// A target counter value, `ticks` after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Deadline {
    start: u32,
    end: u32,
}

impl Deadline {
    /// Longest wait a single deadline can express: one counter lap minus a tick.
    pub const MAX_TICKS: u32 = u32::MAX;

    /// Creates a deadline `ticks` after `start`.
    ///
    /// A tick count beyond one full counter lap is clamped to
    /// [`Deadline::MAX_TICKS`], giving `end == start - 1`. A longer request
    /// can not be told apart from a shorter one on a wrapping counter.
    ///
    /// A deadline that does not wrap is only reached while the counter sits in
    /// `[end, u32::MAX]`. When `end` lies just below `u32::MAX` that window is
    /// a few ticks wide; a poll loop that misses it sees the counter wrap back
    /// into the wait window and overshoots by a full lap (about 159 s at
    /// 27 MHz).
    #[inline]
    pub const fn after(start: u32, ticks: u64) -> Self {
        let ticks = if ticks > Self::MAX_TICKS as u64 {
            Self::MAX_TICKS
        } else {
            ticks as u32
        };
        Self {
            start,
            end: start.wrapping_add(ticks),
        }
    }

    /// Counter value the deadline was computed from.
    #[inline]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// Counter value at which the deadline expires.
    #[inline]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Returns `true` if the end lies past the counter's wrap point.
    #[inline]
    pub const fn wraps(&self) -> bool {
        self.end < self.start
    }

    /// Decides whether `current` is at or past the deadline.
    ///
    /// Still waiting while `current < end`, or, for a deadline that wraps,
    /// while `current >= start` (the counter has not wrapped yet). So a
    /// wrapping deadline is reached on `[end, start)` and a plain one on
    /// `[end, u32::MAX]`. A counter that laps all the way round to `start`
    /// reads as not reached again.
    #[inline]
    pub const fn is_reached(&self, current: u32) -> bool {
        let waiting = current < self.end || (self.wraps() && current >= self.start);
        !waiting
    }
}

/// Reads a [`Counter`] and turns durations into ticks.
pub struct Timer<C> {
    counter: C,
    hz: u32,
    started: bool,
}

impl<C: Counter> Timer<C> {
    /// Creates a timer running at `hz` ticks per second.
    ///
    /// The counter is started lazily on the first read.
    pub fn new(counter: C, hz: u32) -> Result<Self, ConfigError> {
        if hz == 0 {
            return Err(ConfigError::ZeroFrequency);
        }
        Ok(Self {
            counter,
            hz,
            started: false,
        })
    }

    /// Tick rate in Hz.
    #[inline]
    pub fn hz(&self) -> u32 {
        self.hz
    }

    /// Gives back the counter.
    pub fn release(self) -> C {
        self.counter
    }

    /// Reads the counter, starting it first if this timer has not yet done so.
    #[inline]
    pub fn now(&mut self) -> u32 {
        if !self.started {
            self.counter.start();
            self.started = true;
        }
        self.counter.value()
    }

    /// Ticks in `ms` milliseconds, saturating at `u64::MAX`.
    pub fn ticks_from_millis(&self, ms: u64) -> u64 {
        let ticks = u128::from(ms) * u128::from(self.hz) / 1000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Ticks in `duration`, saturating at `u64::MAX`.
    pub fn ticks_from_duration(&self, duration: Duration) -> u64 {
        let ticks = duration.as_nanos() * u128::from(self.hz) / 1_000_000_000;
        u64::try_from(ticks).unwrap_or(u64::MAX)
    }

    /// Deadline `ticks` from now. See [`Deadline::after`] for clamping.
    pub fn deadline_after(&mut self, ticks: u64) -> Deadline {
        let deadline = Deadline::after(self.now(), ticks);
        if ticks > u64::from(Deadline::MAX_TICKS) {
            warn!(
                "requested {} ticks exceeds one counter lap, clamping",
                ticks
            );
        }
        deadline
    }

    /// Samples the counter and checks it against `deadline`.
    #[inline]
    pub fn reached(&mut self, deadline: &Deadline) -> bool {
        let current = self.now();
        deadline.is_reached(current)
    }

    /// Spins until `deadline` is reached.
    pub fn wait_until(&mut self, deadline: &Deadline) {
        while !self.reached(deadline) {
            core::hint::spin_loop();
        }
    }

    /// Busy-waits for `ms` milliseconds.
    ///
    /// Waits longer than one counter lap are cut to one lap.
    pub fn sleep_ms(&mut self, ms: u32) {
        self.sleep_millis(u64::from(ms));
    }

    /// Busy-waits for `seconds` seconds.
    pub fn sleep_s(&mut self, seconds: u32) {
        self.sleep_millis(u64::from(seconds) * 1000);
    }

    /// Busy-waits for `duration`.
    pub fn sleep(&mut self, duration: Duration) {
        let deadline = self.deadline_after(self.ticks_from_duration(duration));
        self.wait_until(&deadline);
    }

    fn sleep_millis(&mut self, ms: u64) {
        let deadline = self.deadline_after(self.ticks_from_millis(ms));
        self.wait_until(&deadline);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimCounter;

    #[test]
    fn non_wrapping_window() {
        let d = Deadline::after(1000, 500);
        assert_eq!(d.end(), 1500);
        assert!(!d.wraps());
        for current in [1000, 1001, 1250, 1499] {
            assert!(!d.is_reached(current), "{current}");
        }
        for current in [1500, 1501, 100_000, u32::MAX] {
            assert!(d.is_reached(current), "{current}");
        }
    }

    #[test]
    fn wrapping_window() {
        let d = Deadline::after(0xFFFF_FFF0, 0x20);
        assert_eq!(d.end(), 0x10);
        assert!(d.wraps());
        assert!(!d.is_reached(0xFFFF_FFF0));
        assert!(!d.is_reached(0xFFFF_FFF5));
        assert!(!d.is_reached(0xFFFF_FFFF));
        assert!(!d.is_reached(0x0000_0000));
        assert!(!d.is_reached(0x0000_0005));
        assert!(!d.is_reached(0x0000_000F));
        assert!(d.is_reached(0x0000_0010));
        assert!(d.is_reached(0x0000_0011));
        assert!(d.is_reached(0x8000_0000));
        assert!(d.is_reached(0xFFFF_FFEF));
        // A full second lap brings the counter back into the wait window.
        assert!(!d.is_reached(0xFFFF_FFF0));
    }

    #[test]
    fn lap_back_to_start_is_not_reached() {
        // Non-wrapping deadline seen again after the counter came all the way round.
        let d = Deadline::after(0x100, 0x10);
        assert!(d.is_reached(0xFFFF_FFFF));
        assert!(!d.is_reached(0x100));
        assert!(!d.is_reached(0x0));
    }

    #[test]
    fn narrow_window_near_max_is_missed_after_wrap() {
        let d = Deadline::after(0xFFFF_FF00, 0xFC);
        assert_eq!(d.end(), 0xFFFF_FFFC);
        assert!(!d.wraps());
        assert!(d.is_reached(0xFFFF_FFFC));
        assert!(d.is_reached(u32::MAX));
        // Sampled only after the counter wrapped: waiting again for a full lap.
        assert!(!d.is_reached(0x5));
        assert!(!d.is_reached(0xFFFF_FF00));
    }

    #[test]
    fn zero_ticks_is_reached_immediately() {
        let d = Deadline::after(42, 0);
        assert!(d.is_reached(42));
        assert!(d.is_reached(43));
    }

    #[test]
    fn end_exactly_at_max() {
        let d = Deadline::after(0xFFFF_FF00, 0xFF);
        assert_eq!(d.end(), u32::MAX);
        assert!(!d.wraps());
        assert!(!d.is_reached(0xFFFF_FFFE));
        assert!(d.is_reached(u32::MAX));
    }

    #[test]
    fn overflow_clamps_to_start_minus_one() {
        for start in [0, 1, 0x1234_5678, u32::MAX] {
            for ticks in [1 << 32, (1 << 32) + 1, u64::MAX] {
                let d = Deadline::after(start, ticks);
                assert_eq!(d.end(), start.wrapping_sub(1), "{start:#x} {ticks:#x}");
            }
        }
        // One lap minus one tick is still representable as is.
        assert_eq!(Deadline::after(10, u64::from(u32::MAX)).end(), 9);
    }

    #[test]
    fn clamped_deadline_waits_almost_a_lap() {
        let d = Deadline::after(0x8000_0000, u64::MAX);
        assert!(!d.is_reached(0x8000_0000));
        assert!(!d.is_reached(0xFFFF_FFFF));
        assert!(!d.is_reached(0x7FFF_FFFE));
        assert!(d.is_reached(0x7FFF_FFFF));
    }

    #[test]
    fn zero_frequency_rejected() {
        assert_eq!(
            Timer::new(SimCounter::new(0, 1), 0).err(),
            Some(ConfigError::ZeroFrequency)
        );
    }

    #[test]
    fn counter_started_on_first_read() {
        let mut timer = Timer::new(SimCounter::new(0, 1), 1000).unwrap();
        assert_eq!(timer.counter.starts, 0);
        timer.now();
        timer.now();
        assert_eq!(timer.counter.starts, 1);
        assert!(timer.counter.running);
    }

    #[test]
    fn tick_conversion() {
        let timer = Timer::new(SimCounter::new(0, 1), DEFAULT_TIMER_HZ).unwrap();
        assert_eq!(timer.ticks_from_millis(1), 27_000);
        assert_eq!(timer.ticks_from_millis(1000), 27_000_000);
        assert_eq!(timer.ticks_from_duration(Duration::from_secs(2)), 54_000_000);
        assert_eq!(timer.ticks_from_duration(Duration::from_micros(10)), 270);
        // 200 s at 27 MHz is more than one lap of a 32-bit counter.
        assert!(timer.ticks_from_millis(200_000) > u64::from(u32::MAX));
        assert_eq!(timer.ticks_from_duration(Duration::MAX), u64::MAX);
    }

    #[test]
    fn sleep_ms_waits_for_the_ticks() {
        let mut timer = Timer::new(SimCounter::new(5000, 7), 1000).unwrap();
        timer.sleep_ms(100);
        let now = timer.counter.last;
        assert!((5100..5100 + 7).contains(&now), "{now}");
    }

    #[test]
    fn sleep_s_across_wrap() {
        let start = u32::MAX - 1500;
        let mut timer = Timer::new(SimCounter::new(start, 13), 1000).unwrap();
        timer.sleep_s(3);
        let now = timer.counter.last;
        let expected = start.wrapping_add(3000);
        assert!(now >= expected && now < expected + 13, "{now}");
    }

    #[test]
    fn sleep_duration() {
        let mut timer = Timer::new(SimCounter::new(0, 1), 1_000_000).unwrap();
        timer.sleep(Duration::from_micros(250));
        assert_eq!(timer.counter.last, 250);
    }
}
