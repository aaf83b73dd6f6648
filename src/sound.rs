//! where rendered audio goes once the server has mixed a round
use simple_error::bail;
use std::sync::mpsc;

#[cfg(test)]
use mockall::automock;

use crate::common::box_error::BoxError;

pub mod jitter_buffer;
pub mod wav_writer;

/// Sink for one mixed window (read_bufsz frames, interleaved).
///
/// An error here is the one thing that makes a server tick fail.
#[cfg_attr(test, automock)]
pub trait SampleWriter {
    fn write(&mut self, frame: &[f32]) -> Result<(), BoxError>;
}

/// bounded queue to a playback thread.  A full queue means the consumer fell behind
impl SampleWriter for mpsc::SyncSender<Vec<f32>> {
    fn write(&mut self, frame: &[f32]) -> Result<(), BoxError> {
        match self.try_send(frame.to_vec()) {
            Ok(()) => Ok(()),
            Err(mpsc::TrySendError::Full(_)) => bail!("output queue is full"),
            Err(mpsc::TrySendError::Disconnected(_)) => bail!("output queue is disconnected"),
        }
    }
}

impl SampleWriter for mpsc::Sender<Vec<f32>> {
    fn write(&mut self, frame: &[f32]) -> Result<(), BoxError> {
        if self.send(frame.to_vec()).is_err() {
            bail!("output queue is disconnected");
        }
        Ok(())
    }
}

#[cfg(test)]
mod test_sound {
    use super::*;

    #[test]
    fn sync_sender_full_is_an_error() {
        let (mut tx, rx) = mpsc::sync_channel::<Vec<f32>>(1);
        assert!(tx.write(&[1.0, 2.0]).is_ok());
        assert!(tx.write(&[3.0]).is_err());
        assert_eq!(rx.recv().unwrap(), vec![1.0, 2.0]);
        drop(rx);
        assert!(tx.write(&[3.0]).is_err());
    }
    #[test]
    fn sender_disconnect_is_an_error() {
        let (mut tx, rx) = mpsc::channel::<Vec<f32>>();
        assert!(tx.write(&[0.5]).is_ok());
        assert_eq!(rx.try_recv().unwrap(), vec![0.5]);
        drop(rx);
        assert!(tx.write(&[0.5]).is_err());
    }
}
