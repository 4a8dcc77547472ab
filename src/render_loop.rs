use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::Clock;
use crate::frame::FrameInfo;
use crate::session::SceneSession;
use crate::traits::RenderBackend;

/// Updates controls and draws one frame per tick until stopped
#[derive(Debug, Default)]
pub struct RenderLoop {
    clock: Clock,
    stopped: bool,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame; returns `None` once the loop is stopped.
    ///
    /// Draw failures are logged and never end the loop.
    pub fn tick<B: RenderBackend>(&mut self, session: &mut SceneSession<B>) -> Option<FrameInfo> {
        if self.stopped {
            return None;
        }

        let frame = self.clock.tick();
        if let Err(err) = session.render_frame(&frame) {
            log::warn!("frame {} not drawn: {}", frame.number, err);
        }
        Some(frame)
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            log::debug!("render loop stopped after {} frames", self.clock.frames());
        }
        self.stopped = true;
    }

    pub fn is_running(&self) -> bool {
        !self.stopped
    }

    pub fn frames(&self) -> u64 {
        self.clock.frames()
    }
}

/// A render loop running as a repeating task on the current `LocalSet`
pub struct RenderLoopHandle {
    task: JoinHandle<()>,
    frames: Rc<Cell<u64>>,
}

impl RenderLoopHandle {
    /// Cancel the repeating task; no frame is drawn afterwards
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RenderLoopHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Drive `session` every `interval` on the current `LocalSet`.
///
/// The task ends by itself once the session is disposed.
pub fn spawn_local<B>(session: Rc<RefCell<SceneSession<B>>>, interval: Duration) -> RenderLoopHandle
where
    B: RenderBackend + 'static,
{
    let frames = Rc::new(Cell::new(0));
    let counter = frames.clone();

    let task = tokio::task::spawn_local(async move {
        let mut render_loop = RenderLoop::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let Ok(mut session) = session.try_borrow_mut() else {
                log::trace!("session busy, skipping frame");
                continue;
            };
            if session.is_disposed() {
                render_loop.stop();
                break;
            }
            if render_loop.tick(&mut session).is_some() {
                counter.set(counter.get() + 1);
            }
        }
    });

    RenderLoopHandle { task, frames }
}
