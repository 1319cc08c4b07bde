//! Transport plugin interface consumed by the protocol engine
//!
//! The engine never blocks: it hands encoded APDUs to the plugin and asks it
//! to schedule timers. Received bytes and timer expiries are pushed back into
//! the connection context by whoever owns the plugin.

use phd_core::PhdResult;
use std::fmt;

/// Opaque handle of a scheduled timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Raw byte delivery and timer scheduling for one connection
pub trait TransportPlugin: Send {
    /// Prepare the plugin before the first APDU is sent
    fn init(&mut self) -> PhdResult<()> {
        Ok(())
    }

    /// Deliver one encoded APDU to the peer
    ///
    /// # Arguments
    ///
    /// * `apdu` - A complete APDU frame, header included
    fn send_apdu(&mut self, apdu: &[u8]) -> PhdResult<()>;

    /// Tear down the underlying connection
    fn disconnect(&mut self) -> PhdResult<()>;

    /// Schedule a timeout
    ///
    /// # Arguments
    ///
    /// * `seconds` - Delay before the timer fires
    ///
    /// # Returns
    ///
    /// Handle identifying the timer when it fires or when it is cancelled
    fn count_timeout(&mut self, seconds: u64) -> TimerHandle;

    /// Cancel a timeout scheduled with [`count_timeout`](Self::count_timeout)
    ///
    /// Cancelling a timer that already fired is a no-op.
    fn reset_timeout(&mut self, handle: TimerHandle);
}

impl<T: TransportPlugin + ?Sized> TransportPlugin for Box<T> {
    fn init(&mut self) -> PhdResult<()> {
        (**self).init()
    }

    fn send_apdu(&mut self, apdu: &[u8]) -> PhdResult<()> {
        (**self).send_apdu(apdu)
    }

    fn disconnect(&mut self) -> PhdResult<()> {
        (**self).disconnect()
    }

    fn count_timeout(&mut self, seconds: u64) -> TimerHandle {
        (**self).count_timeout(seconds)
    }

    fn reset_timeout(&mut self, handle: TimerHandle) {
        (**self).reset_timeout(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<Vec<u8>>,
        next_timer: u64,
        cancelled: Vec<TimerHandle>,
    }

    impl TransportPlugin for Recorder {
        fn send_apdu(&mut self, apdu: &[u8]) -> PhdResult<()> {
            self.sent.push(apdu.to_vec());
            Ok(())
        }

        fn disconnect(&mut self) -> PhdResult<()> {
            Ok(())
        }

        fn count_timeout(&mut self, _seconds: u64) -> TimerHandle {
            self.next_timer += 1;
            TimerHandle(self.next_timer)
        }

        fn reset_timeout(&mut self, handle: TimerHandle) {
            self.cancelled.push(handle);
        }
    }

    #[test]
    fn test_boxed_plugin_forwards() {
        let mut plugin: Box<Recorder> = Box::default();
        plugin.init().unwrap();
        plugin.send_apdu(&[0xE5, 0x00, 0x00, 0x02, 0x00, 0x00]).unwrap();
        let handle = TransportPlugin::count_timeout(&mut plugin, 10);
        TransportPlugin::reset_timeout(&mut plugin, handle);
        assert_eq!(plugin.sent.len(), 1);
        assert_eq!(plugin.cancelled, vec![TimerHandle(1)]);
        assert_eq!(handle.to_string(), "timer#1");
    }
}
