//! Two-channel buffered serial port.
//!
//! The host side pushes bytes with [`SerialPort::puts`] and drains CPU output
//! with [`SerialPort::gets`]. The CPU side sees three ports:
//!
//! - `in_port` (read): pops the oldest host byte, or 0 when none is pending
//! - `out_port` (write): queues a byte for the host
//! - `ready_port` (read): 1 when host input is pending, else 0
//!
//! Both buffers have a fixed capacity. Pushing into a full buffer overwrites
//! the oldest unread byte.

use std::fmt;

use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;

use super::Device;
use crate::config::SerialConfig;
use crate::error::ConfigError;

/// Serial port device with host-facing and CPU-facing ends.
pub struct SerialPort {
    name: String,
    in_port: u8,
    out_port: u8,
    ready_port: u8,
    to_device: HeapRb<u8>,
    from_device: HeapRb<u8>,
}

impl SerialPort {
    /// Creates a serial port from a configuration record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroCapacity`] when the buffer capacity is zero.
    pub fn from_config(config: &SerialConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            name: config.name.clone(),
            in_port: config.in_port,
            out_port: config.out_port,
            ready_port: config.ready_port,
            to_device: HeapRb::new(config.capacity),
            from_device: HeapRb::new(config.capacity),
        })
    }

    /// Queues host bytes for the CPU to read from `in_port`.
    pub fn puts(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.to_device.push_overwrite(byte);
        }
    }

    /// Drains up to `count` bytes the CPU wrote to `out_port`, oldest first.
    ///
    /// `None` drains everything pending. Never blocks: when fewer bytes are
    /// pending than requested, only those are returned.
    pub fn gets(&mut self, count: Option<usize>) -> Vec<u8> {
        let limit = count.unwrap_or(usize::MAX);
        let mut bytes = Vec::with_capacity(limit.min(self.from_device.occupied_len()));
        while bytes.len() < limit {
            let Some(byte) = self.from_device.try_pop() else {
                break;
            };
            bytes.push(byte);
        }
        bytes
    }

    /// Number of host bytes not yet read by the CPU.
    #[must_use]
    pub fn pending_input(&self) -> usize {
        self.to_device.occupied_len()
    }

    /// Number of CPU bytes not yet drained by the host.
    #[must_use]
    pub fn pending_output(&self) -> usize {
        self.from_device.occupied_len()
    }

    /// Per-direction buffer capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.to_device.capacity().get()
    }
}

impl fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialPort")
            .field("name", &self.name)
            .field("in_port", &self.in_port)
            .field("out_port", &self.out_port)
            .field("ready_port", &self.ready_port)
            .field("pending_input", &self.pending_input())
            .field("pending_output", &self.pending_output())
            .finish_non_exhaustive()
    }
}

impl Device for SerialPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn io_read(&mut self, port: u8) -> Option<u8> {
        if port == self.in_port {
            Some(self.to_device.try_pop().unwrap_or(0))
        } else if port == self.ready_port {
            Some(u8::from(!self.to_device.is_empty()))
        } else {
            None
        }
    }

    fn io_write(&mut self, port: u8, value: u8) -> bool {
        if port != self.out_port {
            return false;
        }
        self.from_device.push_overwrite(value);
        true
    }

    fn reset(&mut self) {
        while self.to_device.try_pop().is_some() {}
        while self.from_device.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::SerialPort;
    use crate::config::SerialConfig;
    use crate::device::Device;

    const IN: u8 = 0x00;
    const OUT: u8 = 0x01;
    const READY: u8 = 0x02;

    fn port(capacity: usize) -> SerialPort {
        SerialPort::from_config(&SerialConfig::new("serial", IN, OUT, READY).with_capacity(capacity))
            .expect("valid serial port")
    }

    #[test]
    fn ready_port_tracks_pending_host_input() {
        let mut serial = port(16);
        assert_eq!(serial.io_read(READY), Some(0));

        serial.puts(b"A");
        assert_eq!(serial.io_read(READY), Some(1));
        assert_eq!(serial.io_read(IN), Some(b'A'));
        assert_eq!(serial.io_read(READY), Some(0));
    }

    #[test]
    fn empty_input_reads_zero() {
        let mut serial = port(16);
        assert_eq!(serial.io_read(IN), Some(0));
    }

    #[test]
    fn unrelated_ports_are_declined() {
        let mut serial = port(16);
        assert_eq!(serial.io_read(OUT), None);
        assert_eq!(serial.io_read(0x7F), None);
        assert!(!serial.io_write(IN, 1));
        assert!(!serial.io_write(READY, 1));
    }

    #[test]
    fn cpu_output_reaches_host_in_order() {
        let mut serial = port(16);
        for byte in b"Hello" {
            assert!(serial.io_write(OUT, *byte));
        }
        assert_eq!(serial.pending_output(), 5);
        assert_eq!(serial.gets(Some(2)), b"He");
        assert_eq!(serial.gets(None), b"llo");
        assert!(serial.gets(None).is_empty());
    }

    #[test]
    fn gets_returns_only_what_is_available() {
        let mut serial = port(16);
        serial.io_write(OUT, b'x');
        assert_eq!(serial.gets(Some(10)), b"x");
    }

    #[test]
    fn full_buffer_overwrites_oldest_unread_byte() {
        let mut serial = port(4);
        serial.puts(b"abcdef");
        assert_eq!(serial.pending_input(), 4);

        let drained: Vec<u8> = (0..4).filter_map(|_| serial.io_read(IN)).collect();
        assert_eq!(drained, b"cdef");
    }

    #[test]
    fn reset_discards_buffered_bytes() {
        let mut serial = port(4);
        serial.puts(b"ab");
        serial.io_write(OUT, b'c');
        serial.reset();
        assert_eq!(serial.pending_input(), 0);
        assert_eq!(serial.pending_output(), 0);
    }

    proptest! {
        #[test]
        fn buffered_bytes_never_exceed_capacity(
            capacity in 1usize..64,
            input in prop::collection::vec(any::<u8>(), 0..200),
        ) {
            let mut serial = port(capacity);
            serial.puts(&input);
            prop_assert_eq!(serial.pending_input(), input.len().min(capacity));

            let kept: Vec<u8> = (0..serial.pending_input())
                .filter_map(|_| serial.io_read(IN))
                .collect();
            prop_assert_eq!(&kept[..], &input[input.len() - kept.len()..]);
        }
    }
}
