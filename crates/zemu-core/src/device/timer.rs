//! Down-counting interval timer that pulses NMI when it reaches zero.

use log::debug;

use super::Device;
use crate::config::TimerConfig;

/// 8-bit interval timer.
///
/// While running, each cycle decrements a non-zero count. A running timer
/// whose count is already zero requests NMI for that cycle and stays at zero;
/// software re-arms it by writing `count_port` again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    name: String,
    count_port: u8,
    control_port: u8,
    count: u8,
    running: bool,
    nmi: bool,
}

impl Timer {
    /// Creates a stopped timer from a configuration record.
    #[must_use]
    pub fn from_config(config: &TimerConfig) -> Self {
        Self {
            name: config.name.clone(),
            count_port: config.count_port,
            control_port: config.control_port,
            count: 0,
            running: false,
            nmi: false,
        }
    }

    /// Current count register.
    #[must_use]
    pub const fn count(&self) -> u8 {
        self.count
    }

    /// Whether the timer is counting.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }
}

impl Device for Timer {
    fn name(&self) -> &str {
        &self.name
    }

    fn io_read(&mut self, port: u8) -> Option<u8> {
        if port == self.count_port {
            Some(self.count)
        } else if port == self.control_port {
            Some(u8::from(self.running))
        } else {
            None
        }
    }

    fn io_write(&mut self, port: u8, value: u8) -> bool {
        let mut recognized = false;
        if port == self.count_port {
            debug!("{}: count <- {value:#04X}", self.name);
            self.count = value;
            recognized = true;
        }
        if port == self.control_port {
            debug!("{}: control <- {value:#04X}", self.name);
            self.running = value != 0;
            recognized = true;
        }
        recognized
    }

    fn clock(&mut self) {
        self.nmi = false;
        if !self.running {
            return;
        }
        if self.count > 0 {
            self.count -= 1;
        } else {
            self.nmi = true;
        }
    }

    fn nmi(&self) -> bool {
        self.nmi
    }

    fn reset(&mut self) {
        self.count = 0;
        self.running = false;
        self.nmi = false;
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Timer;
    use crate::config::TimerConfig;
    use crate::device::Device;

    const COUNT: u8 = 0x10;
    const CONTROL: u8 = 0x11;

    fn timer() -> Timer {
        Timer::from_config(&TimerConfig::new("timer", COUNT, CONTROL))
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(5)]
    #[case(255)]
    fn nmi_fires_on_cycle_n_plus_one(#[case] count: u8) {
        let mut timer = timer();
        timer.io_write(COUNT, count);
        timer.io_write(CONTROL, 1);

        for cycle in 1..=u32::from(count) {
            timer.clock();
            assert!(!timer.nmi(), "nmi asserted early on cycle {cycle}");
        }
        timer.clock();
        assert!(timer.nmi());
        assert_eq!(timer.count(), 0);
    }

    #[test]
    fn stopped_timer_holds_count() {
        let mut timer = timer();
        timer.io_write(COUNT, 3);
        for _ in 0..10 {
            timer.clock();
        }
        assert_eq!(timer.count(), 3);
        assert!(!timer.nmi());
    }

    #[test]
    fn count_does_not_underflow_or_reload() {
        let mut timer = timer();
        timer.io_write(COUNT, 1);
        timer.io_write(CONTROL, 1);
        for _ in 0..5 {
            timer.clock();
        }
        assert_eq!(timer.count(), 0);
        assert!(timer.nmi());
    }

    #[test]
    fn stopping_the_timer_drops_nmi_on_next_cycle() {
        let mut timer = timer();
        timer.io_write(CONTROL, 1);
        timer.clock();
        assert!(timer.nmi());

        timer.io_write(CONTROL, 0);
        timer.clock();
        assert!(!timer.nmi());
    }

    #[test]
    fn count_can_be_rewritten_while_running() {
        let mut timer = timer();
        timer.io_write(COUNT, 2);
        timer.io_write(CONTROL, 0xFF);
        timer.clock();
        timer.io_write(COUNT, 9);
        assert_eq!(timer.count(), 9);
        assert_eq!(timer.io_read(COUNT), Some(9));
        assert_eq!(timer.io_read(CONTROL), Some(1));
    }

    #[test]
    fn foreign_ports_are_declined() {
        let mut timer = timer();
        assert_eq!(timer.io_read(0x12), None);
        assert!(!timer.io_write(0x12, 1));
    }
}
