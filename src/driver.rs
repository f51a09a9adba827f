//! The per-frame detection loop.
//!
//! [`start`] spawns a thread that waits for [`Ticks`], and on every tick pulls the current frame
//! from a [`FrameSource`], runs the [`DetectorHandle`] on it, and hands the detected faces to a
//! callback. The presentation layer calls [`Ticker::tick`] once per presented frame, so detection
//! runs at most at the display refresh rate. Ticks arriving while a cycle is still running are
//! merged into a single pending tick.
//!
//! The returned [`LoopHandle`] stops the loop when cancelled or dropped.

use std::{
    io,
    panic::resume_unwind,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle, ThreadId},
};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use once_cell::sync::OnceCell;

use crate::{
    detection::DetectedFace,
    detector::DetectorHandle,
    drop::defer,
    resolution::Resolution,
    timer::FpsCounter,
    video::FrameSource,
};

/// Creates a connected [`Ticker`] and [`Ticks`] pair.
pub fn ticker() -> (Ticker, Ticks) {
    // Capacity 1: at most one tick is pending, further ticks are merged into it.
    let (sender, recv) = channel::bounded(1);
    (Ticker { sender }, Ticks { recv })
}

/// Sending half of a tick channel, driven by the presentation layer.
#[derive(Clone)]
pub struct Ticker {
    sender: Sender<()>,
}

impl Ticker {
    /// Signals that a new frame has been presented.
    ///
    /// Never blocks. Returns `false` once the receiving loop has exited.
    pub fn tick(&self) -> bool {
        match self.sender.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => true,
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// Receiving half of a tick channel, consumed by the detection loop.
pub struct Ticks {
    recv: Receiver<()>,
}

/// A shared flag that suppresses publication of detection results while set.
///
/// Detection keeps running while paused, so results are available immediately after resuming.
#[derive(Debug, Clone, Default)]
pub struct PauseFlag(Arc<AtomicBool>);

impl PauseFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, paused: bool) {
        self.0.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct Shared {
    active: AtomicBool,
    /// Held while the callback runs. Cancellation acquires it once so that it can't return while
    /// a publication is in progress.
    publish: Mutex<()>,
    loop_thread: OnceCell<ThreadId>,
}

/// Cancels a detection loop. Can be cloned and sent to other threads, or moved into the
/// loop's own callback.
#[derive(Clone)]
pub struct Canceller {
    shared: Arc<Shared>,
    wake: Sender<()>,
}

impl Canceller {
    /// Stops the loop.
    ///
    /// When called from any thread but the loop's own, the callback is guaranteed not to be
    /// running or invoked anymore once this returns. When called from inside the callback, no
    /// further invocations will happen after the current one.
    ///
    /// Calling this more than once has no further effect.
    pub fn cancel(&self) {
        if self.shared.active.swap(false, Ordering::AcqRel) {
            log::debug!("cancelling detection loop");
            // Wakes the loop if it's waiting for a tick. Full means a wakeup is already pending.
            self.wake.try_send(()).ok();
        }

        if !self.is_loop_thread() {
            drop(
                self.shared
                    .publish
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
        }
    }

    /// Returns whether the loop has not been cancelled yet.
    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::Acquire)
    }

    fn is_loop_thread(&self) -> bool {
        self.shared.loop_thread.get() == Some(&thread::current().id())
    }
}

/// A builder object that can be used to configure and start a detection loop.
#[derive(Clone)]
pub struct LoopBuilder {
    name: String,
}

/// Returns a builder for a detection loop.
pub fn builder() -> LoopBuilder {
    LoopBuilder {
        name: "detection".into(),
    }
}

/// Starts a detection loop with default settings. See [`LoopBuilder::start`].
pub fn start<S, F>(
    detector: DetectorHandle,
    source: S,
    on_faces: F,
    pause: PauseFlag,
    ticks: Ticks,
) -> io::Result<LoopHandle>
where
    S: FrameSource + 'static,
    F: FnMut(&[DetectedFace], Resolution) + Send + 'static,
{
    builder().start(detector, source, on_faces, pause, ticks)
}

impl LoopBuilder {
    /// Sets the name of the loop thread. It is also used for log output.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self { name: name.into() }
    }

    /// Spawns the loop thread.
    ///
    /// `on_faces` is invoked with every batch of detected faces (possibly empty) together with
    /// the resolution of the frame they were detected in, unless `pause` is set.
    pub fn start<S, F>(
        self,
        mut detector: DetectorHandle,
        mut source: S,
        mut on_faces: F,
        pause: PauseFlag,
        ticks: Ticks,
    ) -> io::Result<LoopHandle>
    where
        S: FrameSource + 'static,
        F: FnMut(&[DetectedFace], Resolution) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            active: AtomicBool::new(true),
            publish: Mutex::new(()),
            loop_thread: OnceCell::new(),
        });
        let (wake, woken) = channel::bounded(1);

        let name = self.name;
        let thread_shared = shared.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let shared = thread_shared;
            shared.loop_thread.set(thread::current().id()).ok();
            log::trace!("detection loop '{name}' starting");
            let _guard = defer(|| log::trace!("detection loop '{name}' exiting"));

            let mut fps = FpsCounter::new(format!("{name} loop"));
            loop {
                let ticked = channel::select! {
                    recv(ticks.recv) -> tick => tick.is_ok(),
                    recv(woken) -> _ => true,
                };
                if !ticked {
                    log::debug!("ticker of '{name}' disconnected");
                    break;
                }
                if !shared.active.load(Ordering::Acquire) {
                    break;
                }

                let frame = match source.current_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        log::trace!("no frame available, skipping cycle");
                        continue;
                    }
                    Err(e) => {
                        log::warn!("failed to retrieve video frame: {e}");
                        continue;
                    }
                };

                let faces = detector.detect(&frame);
                if pause.is_paused() {
                    log::trace!("paused, not publishing {} face(s)", faces.len());
                } else {
                    let _lock = shared
                        .publish
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if !shared.active.load(Ordering::Acquire) {
                        break;
                    }
                    on_faces(faces, frame.resolution());
                }

                fps.tick_with(detector.timers());
            }
        })?;

        Ok(LoopHandle {
            canceller: Canceller { shared, wake },
            handle: Some(handle),
        })
    }
}

/// Owns a running detection loop.
///
/// Dropping the handle cancels the loop and waits for its thread to exit. If the thread panicked,
/// the panic is propagated to the thread dropping the handle.
pub struct LoopHandle {
    canceller: Canceller,
    handle: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Stops the loop. See [`Canceller::cancel`].
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Returns a [`Canceller`] that can stop this loop from elsewhere.
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    pub fn is_active(&self) -> bool {
        self.canceller.is_active()
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        self.cancel();

        // Joining from the loop thread itself would never finish.
        if self.canceller.is_loop_thread() {
            return;
        }
        if let Some(handle) = self.handle.take() {
            if let Err(payload) = handle.join() {
                if !thread::panicking() {
                    resume_unwind(payload);
                }
            }
        }
    }
}
