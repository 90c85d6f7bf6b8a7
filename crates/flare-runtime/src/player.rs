//! The player: one interpreter thread plus a shared worker pool
//!
//! [`Player`] owns the [`VmContext`], registers the runtime classes into it
//! and drains the event queue that timers and other background work post to.
//! Everything script-visible stays on the thread that owns the player.

use crate::config::PlayerOptions;
use crate::dispatcher;
use crate::error::RuntimeError;
use crate::events::{target_table, CancellationToken, Event, EventQueue, TargetId, TargetTable};
use crate::media::{self, FrameSource, MediaClasses, RenderOutcome};
use crate::pool::ThreadPool;
use crate::timer::{self, TimerServices};
use flare_core::{ClassRef, ObjectRef, VmContext};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Classes the runtime adds on top of the object model
pub struct RuntimeClasses {
    /// `flash.events::Event`
    pub event: ClassRef,
    /// `flash.events::EventDispatcher`
    pub event_dispatcher: ClassRef,
    /// `flash.utils::Timer`
    pub timer: ClassRef,
    /// Media classes
    pub media: MediaClasses,
}

/// A running player instance
pub struct Player {
    cx: VmContext,
    classes: RuntimeClasses,
    options: PlayerOptions,
    targets: TargetTable,
    queue: EventQueue,
    shutdown: CancellationToken,
    pool: Arc<ThreadPool>,
}

impl Player {
    /// Create a player with its own context and worker pool
    pub fn new(options: PlayerOptions) -> Result<Self, RuntimeError> {
        options.validate()?;
        let pool = Arc::new(ThreadPool::new(options.effective_worker_threads())?);
        let queue = EventQueue::new();
        let targets = target_table();

        let mut cx = VmContext::new();
        let object = cx.object_class().clone();
        let event = dispatcher::register_event(&mut cx, &object);
        let event_dispatcher = dispatcher::register_dispatcher(&mut cx, &object, &event);
        let timer = timer::register(
            &mut cx,
            &event_dispatcher,
            TimerServices {
                pool: Arc::clone(&pool),
                events: queue.sender(),
                targets: Rc::clone(&targets),
                min_delay: options.min_timer_delay(),
            },
        );
        let media = media::register(&mut cx, &object, options.video.fallback_frame_rate);

        info!(
            context = cx.id().as_u64(),
            workers = pool.threads(),
            classes = cx.classes().len(),
            "player created"
        );
        Ok(Self {
            cx,
            classes: RuntimeClasses {
                event,
                event_dispatcher,
                timer,
                media,
            },
            options,
            targets,
            queue,
            shutdown: CancellationToken::new(),
            pool,
        })
    }

    /// The object-model context
    pub fn context(&mut self) -> &mut VmContext {
        &mut self.cx
    }

    /// Runtime classes
    pub fn classes(&self) -> &RuntimeClasses {
        &self.classes
    }

    /// Options the player was created with
    pub fn options(&self) -> &PlayerOptions {
        &self.options
    }

    /// Shared worker pool
    pub fn pool(&self) -> &Arc<ThreadPool> {
        &self.pool
    }

    /// Objects currently held for background workers
    pub fn live_targets(&self) -> usize {
        self.targets.borrow().len()
    }

    /// Events waiting to be pumped
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// Process every queued event without blocking
    ///
    /// Returns the number of events processed.
    pub fn pump(&mut self) -> usize {
        let mut processed = 0;
        while let Some(event) = self.queue.try_next() {
            self.handle(event);
            processed += 1;
        }
        processed
    }

    /// Wait up to `timeout` for an event, then process everything queued
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        match self.queue.next_timeout(timeout) {
            Some(event) => {
                self.handle(event);
                1 + self.pump()
            }
            None => 0,
        }
    }

    /// Pump until `done` holds or `timeout` elapses; returns whether it held
    pub fn pump_until(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&mut Self) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if done(self) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.pump_timeout((deadline - now).min(Duration::from_millis(10)));
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Dispatch { target, kind } => self.dispatch(target, &kind),
            Event::Sync(rendezvous) => rendezvous.signal(),
            Event::Retire(target) => {
                let released = self.targets.borrow_mut().remove(&target);
                trace!(target_id = target.as_u64(), live = released.is_some(), "target retired");
                drop(released);
            }
        }
    }

    fn dispatch(&mut self, target: TargetId, kind: &str) {
        let object = self.targets.borrow().get(&target).cloned();
        let Some(object) = object else {
            trace!(target_id = target.as_u64(), event = kind, "event for retired target");
            return;
        };
        if let Err(err) = dispatcher::dispatch(&mut self.cx, &self.classes.event, &object, kind) {
            warn!(target_id = target.as_u64(), event = kind, %err, "event dispatch failed");
        }
    }

    /// Create a NetStream around an external frame source
    pub fn new_net_stream(
        &mut self,
        source: Arc<dyn FrameSource>,
    ) -> Result<ObjectRef, RuntimeError> {
        let class = self.classes.media.net_stream.clone();
        Ok(media::new_net_stream(&mut self.cx, &class, source)?)
    }

    /// Render one frame of `video`
    ///
    /// The render that locks the frame geometry also starts the decode-side
    /// ticker on the pool. It runs until the Video or the player goes away.
    pub fn render_video(&mut self, video: &ObjectRef) -> RenderOutcome {
        let outcome = media::render(video);
        if let RenderOutcome::Started { tick_interval } = outcome {
            if let Some(ticker) = media::video_state(video).frame_ticker() {
                let shutdown = self.shutdown.clone();
                debug!(interval_us = tick_interval.as_micros() as u64, "starting frame ticker");
                self.pool.submit(move || {
                    while !ticker.is_cancelled() && !shutdown.is_cancelled() {
                        thread::sleep(tick_interval);
                        ticker.tick();
                    }
                    trace!("frame ticker exiting");
                });
            }
        }
        outcome
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shutdown.cancel();
        // Timer methods hold the target table, and the table holds timers.
        let released = std::mem::take(&mut *self.targets.borrow_mut());
        let dropped = self.queue.clear();
        debug!(targets = released.len(), dropped, "player shutting down");
        drop(released);
    }
}
