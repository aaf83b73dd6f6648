//! WAV file sink so a receive session can be listened to afterwards
use hound::{SampleFormat, WavReader, WavSpec};
use simple_error::bail;
use std::{fs::File, io::BufWriter, path::Path};

use super::SampleWriter;
use crate::common::box_error::BoxError;

pub struct WavWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    frames: u64,
    channels: u16,
}

impl WavWriter {
    /// 16 bit PCM file with the given layout
    pub fn create<P: AsRef<Path>>(path: P, channels: u16, sample_rate: u32) -> Result<WavWriter, BoxError> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        Ok(WavWriter {
            writer: Some(hound::WavWriter::create(path, spec)?),
            frames: 0,
            channels,
        })
    }
    /// frames written so far
    pub fn frames(&self) -> u64 {
        self.frames
    }
    /// patch up the header.  Writes after this fail
    pub fn finalize(&mut self) -> Result<(), BoxError> {
        if let Some(w) = self.writer.take() {
            w.finalize()?;
        }
        Ok(())
    }
}

impl SampleWriter for WavWriter {
    fn write(&mut self, frame: &[f32]) -> Result<(), BoxError> {
        let w = match self.writer.as_mut() {
            Some(w) => w,
            None => bail!("wav file already finalized"),
        };
        for v in frame {
            w.write_sample((v * 32768.0).round().clamp(-32768.0, 32767.0) as i16)?;
        }
        self.frames += (frame.len() / self.channels.max(1) as usize) as u64;
        Ok(())
    }
}

/// read a whole wav file as interleaved f32.  Returns (samples, sample_rate, channels)
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32, u16), BoxError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<_, _>>()?
        }
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };
    Ok((samples, spec.sample_rate, spec.channels))
}

#[cfg(test)]
mod test_wav_writer {
    use super::*;

    #[test]
    fn write_and_read_back() {
        let path = std::env::temp_dir().join("rtjam_receiver_wav_writer.wav");
        let mut wav = WavWriter::create(&path, 2, 48000).unwrap();
        wav.write(&[0.5, -0.5, 0.25, -0.25]).unwrap();
        wav.write(&[0.0, 1.0 / 32768.0]).unwrap();
        assert_eq!(wav.frames(), 3);
        wav.finalize().unwrap();
        // It should refuse to write after finalize
        assert!(wav.write(&[0.0, 0.0]).is_err());
        let (samples, rate, channels) = read_wav(&path).unwrap();
        assert_eq!(rate, 48000);
        assert_eq!(channels, 2);
        assert_eq!(samples, vec![0.5, -0.5, 0.25, -0.25, 0.0, 1.0 / 32768.0]);
    }
}
