//! shared output window that every session's render is summed into
use crate::common::packet::{num_channels, ChannelMask};

pub struct Mixer {
    frame: Vec<f32>,
    channels: usize,
    sources: usize,
}

impl Mixer {
    pub fn new(channel_mask: ChannelMask) -> Mixer {
        Mixer {
            frame: vec![],
            channels: num_channels(channel_mask),
            sources: 0,
        }
    }
    /// zero the window for a new round.  The allocation is kept between rounds
    pub fn begin(&mut self, read_bufsz: usize) -> () {
        self.frame.clear();
        self.frame.resize(read_bufsz * self.channels, 0.0);
        self.sources = 0;
    }
    /// sum one session's round into the window (no clipping)
    pub fn add(&mut self, audio: &[f32]) -> () {
        for (out, v) in self.frame.iter_mut().zip(audio) {
            *out += v;
        }
        self.sources += 1;
    }
    pub fn frame(&self) -> &[f32] {
        &self.frame
    }
    /// number of sessions mixed into this round
    pub fn sources(&self) -> usize {
        self.sources
    }
}

#[cfg(test)]
mod test_mixer {
    use super::*;

    #[test]
    fn begin_zeros() {
        let mut m = Mixer::new(0x3);
        m.begin(4);
        assert_eq!(m.frame(), &[0.0; 8]);
        m.add(&[1.0; 8]);
        m.begin(2);
        assert_eq!(m.frame(), &[0.0; 4]);
        assert_eq!(m.sources(), 0);
    }
    #[test]
    fn sums_without_clipping() {
        let mut m = Mixer::new(0x1);
        m.begin(3);
        m.add(&[0.75, 0.5, -1.0]);
        m.add(&[0.75, -0.5, -1.0]);
        assert_eq!(m.frame(), &[1.5, 0.0, -2.0]);
        assert_eq!(m.sources(), 2);
    }
}
