//! wraparound-safe arithmetic for sequence numbers and timestamps
//!
//! Both counters on the wire are fixed width and wrap.  Every "is this newer" or
//! "how far ahead" decision in the receiver goes through [`WrappingCounter::delta`]
//! so a wrap never looks like a huge jump backwards.
use std::fmt;

/// RTP sequence number
pub type Seqnum = u16;
/// RTP sample clock
pub type Timestamp = u32;

/// fixed width unsigned counter that wraps
pub trait WrappingCounter: Copy + PartialEq + fmt::Display {
    /// signed distance `self - other` modulo 2^W, in the range [-2^(W-1), 2^(W-1))
    fn delta(self, other: Self) -> i64;
    /// move the counter by a signed amount (wrapping)
    fn offset(self, n: i64) -> Self;
}

macro_rules! wrapping_counter {
    ($unsigned:ty, $signed:ty) => {
        impl WrappingCounter for $unsigned {
            fn delta(self, other: Self) -> i64 {
                self.wrapping_sub(other) as $signed as i64
            }
            fn offset(self, n: i64) -> Self {
                self.wrapping_add(n as $unsigned)
            }
        }
    };
}

wrapping_counter!(u8, i8);
wrapping_counter!(u16, i16);
wrapping_counter!(u32, i32);
wrapping_counter!(u64, i64);

/// Keeps a reference value for one counter and judges new values against it.
///
/// The session owns one of these for the sequence number (reference is the next
/// expected seq) and one for the timestamp (reference is the playback cursor).
pub struct Tracker<T: WrappingCounter> {
    reference: Option<T>,
    max_jump: u64,
}

impl<T: WrappingCounter> Tracker<T> {
    pub fn new(max_jump: u64) -> Tracker<T> {
        Tracker {
            reference: None,
            max_jump,
        }
    }
    pub fn reference(&self) -> Option<T> {
        self.reference
    }
    pub fn reset(&mut self, value: T) -> () {
        self.reference = Some(value);
    }
    /// advance the reference by n ticks
    pub fn advance(&mut self, n: i64) -> () {
        if let Some(r) = self.reference {
            self.reference = Some(r.offset(n));
        }
    }
    /// distance from the reference, None until there is a reference
    pub fn delta(&self, value: T) -> Option<i64> {
        self.reference.map(|r| value.delta(r))
    }
    /// tell if the value is too far (either direction) from the reference
    pub fn is_jump(&self, value: T) -> bool {
        match self.delta(value) {
            Some(d) => d.unsigned_abs() > self.max_jump,
            None => false,
        }
    }
}

impl<T: WrappingCounter> fmt::Display for Tracker<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.reference {
            Some(r) => write!(f, "{{ ref: {}, max_jump: {} }}", r, self.max_jump),
            None => write!(f, "{{ ref: none, max_jump: {} }}", self.max_jump),
        }
    }
}

#[cfg(test)]
mod test_seq_tracker {
    use super::*;

    #[test]
    fn delta_simple() {
        assert_eq!(101u16.delta(100), 1);
        assert_eq!(99u16.delta(100), -1);
        assert_eq!(100u32.delta(100), 0);
    }
    #[test]
    fn delta_wraps() {
        // crossing the top of the counter is a small forward step
        assert_eq!(0u16.delta(65535), 1);
        assert_eq!(65535u16.delta(0), -1);
        assert_eq!(5u32.delta(u32::MAX - 4), 10);
        assert_eq!(3u8.delta(250), 9);
    }
    #[test]
    fn delta_half_range() {
        // exactly half way is read as the most negative value
        assert_eq!(32768u16.delta(0), -32768);
        assert_eq!(32767u16.delta(0), 32767);
    }
    #[test]
    fn offset_wraps() {
        assert_eq!(65534u16.offset(3), 1);
        assert_eq!(1u16.offset(-3), 65534);
        assert_eq!((u32::MAX - 33).offset(40), 6);
    }
    #[test]
    fn tracker_without_reference() {
        let t: Tracker<Seqnum> = Tracker::new(10);
        assert_eq!(t.delta(5), None);
        assert!(!t.is_jump(40000));
    }
    #[test]
    fn tracker_jump() {
        let mut t: Tracker<Seqnum> = Tracker::new(100);
        t.reset(65500);
        assert!(!t.is_jump(64));
        assert!(t.is_jump(65500u16.offset(101)));
        assert!(t.is_jump(65500u16.offset(-101)));
        assert!(!t.is_jump(65500u16.offset(-100)));
    }
    #[test]
    fn tracker_advance() {
        let mut t: Tracker<Timestamp> = Tracker::new(48000);
        t.reset(u32::MAX - 10);
        t.advance(20);
        assert_eq!(t.reference(), Some(9));
        println!("tracker: {}", t);
    }
}
