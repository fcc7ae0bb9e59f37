/// 32-bit sliding-window anti-replay filter for one receiving direction
/// of one keypair.
///
/// The wire counter is 0-based; the window algorithm (RFC 2401 appendix
/// C) is 1-based, so every sequence is shifted up by one before it is
/// compared against `counter`.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct ReplayWindow {
    counter: u64,
    bitmap: u32,
}

const WINDOW_SIZE: u64 = u32::BITS as u64;

impl ReplayWindow {
    pub const fn new() -> Self {
        Self { counter: 0, bitmap: 0 }
    }

    /// Returns `true` if `seq` has not been seen before and should be
    /// accepted, updating the window as a side effect. Returns `false`
    /// for replays, for sequences more than 32 behind the current
    /// maximum, and for the wraparound case `seq == u64::MAX`.
    pub fn check(&mut self, seq: u64) -> bool {
        let seq = match seq.checked_add(1) {
            Some(0) | None => return false,
            Some(seq) => seq,
        };

        if seq > self.counter {
            let diff = seq - self.counter;
            self.bitmap = if diff < WINDOW_SIZE {
                (self.bitmap << diff) | 1
            } else {
                1
            };
            self.counter = seq;
            true
        } else {
            let diff = self.counter - seq;
            if diff >= WINDOW_SIZE {
                return false;
            }
            let bit = 1u32 << diff;
            if self.bitmap & bit != 0 {
                false
            } else {
                self.bitmap |= bit;
                true
            }
        }
    }
}
