use crate::capture::{FrameSnapshot, MotionCapture};
use crate::{MocapError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Handle to a background acquisition loop.
///
/// A worker thread owns the capture, waits for each frame and publishes a
/// [`FrameSnapshot`]. The stop flag is checked between frame waits, so the
/// capture should use a bounded frame retry policy if the server may go
/// quiet.
pub struct CaptureStream<M> {
    receiver: Receiver<FrameSnapshot>,
    stop_flag: Arc<AtomicBool>,
    thread: Option<JoinHandle<M>>,
}

impl<M> CaptureStream<M>
where
    M: MotionCapture + Send + 'static,
{
    /// Move `capture` to a worker thread. Up to `capacity` snapshots are
    /// buffered; newer ones are dropped while the buffer is full.
    pub fn start(capture: M, capacity: usize) -> Result<CaptureStream<M>> {
        let (sender, receiver) = crossbeam_channel::bounded(capacity.max(1));
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_clone = stop_flag.clone();

        let thread = std::thread::Builder::new()
            .name("mocap-capture".into())
            .spawn(move || capture_loop(capture, sender, stop_clone))?;

        Ok(CaptureStream {
            receiver,
            stop_flag,
            thread: Some(thread),
        })
    }

    /// Receive the next snapshot (blocks until available).
    pub fn recv(&self) -> Result<FrameSnapshot> {
        self.receiver.recv().map_err(|_| MocapError::StreamStopped)
    }

    pub fn try_recv(&self) -> Option<FrameSnapshot> {
        self.receiver.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<FrameSnapshot> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => MocapError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => MocapError::StreamStopped,
        })
    }

    pub fn is_active(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
            && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop the worker and hand back the capture.
    ///
    /// Returns `None` if the worker panicked.
    pub fn stop(mut self) -> Option<M> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<M> {
        self.stop_flag.store(true, Ordering::Relaxed);
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(capture) => Some(capture),
            Err(_) => {
                log::error!("Capture thread panicked");
                None
            }
        }
    }
}

impl<M> Drop for CaptureStream<M> {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn capture_loop<M: MotionCapture>(
    mut capture: M,
    sender: Sender<FrameSnapshot>,
    stop_flag: Arc<AtomicBool>,
) -> M {
    log::info!("Capture loop started (version {})", capture.version());

    loop {
        if stop_flag.load(Ordering::Relaxed) {
            log::info!("Capture loop stopping (stop flag set)");
            break;
        }

        match capture.wait_for_next_frame() {
            Ok(()) => {}
            Err(MocapError::FrameUnavailable { attempts, last }) => {
                log::trace!("No frame after {} attempt(s) ({:?})", attempts, last);
                continue;
            }
            Err(e) => {
                log::warn!("Capture loop stopping: {}", e);
                break;
            }
        }

        if let Err(e) = sender.try_send(capture.snapshot()) {
            match e {
                crossbeam_channel::TrySendError::Full(_) => {
                    log::trace!("Snapshot channel full, dropping frame");
                }
                crossbeam_channel::TrySendError::Disconnected(_) => {
                    log::info!("Snapshot channel disconnected, stopping capture loop");
                    break;
                }
            }
        }
    }

    capture
}
