//! `flash.utils::Timer`
//!
//! Each started timer runs one job on the shared pool:
//!
//! 1. sleep for the delay;
//! 2. stop if the run's token was cancelled meanwhile;
//! 3. post a `"timer"` dispatch, then block on a sync point until the
//!    interpreter has delivered it;
//! 4. repeat, until `repeatCount` fires have happened (0 = forever).
//!
//! On exit the job retires its target id, which releases the handle the
//! player's target table held on the timer object. `stop` drops that handle
//! right away, so nothing is delivered for a stopped run. Every `start` uses a
//! new token and a new target id, so a stopped run that is still finishing
//! its last sleep can never post to a later run.

use crate::dispatcher::{target_state, EventTarget};
use crate::events::{CancellationToken, EventSender, TargetId, TargetTable};
use crate::pool::ThreadPool;
use flare_core::function::{arg, require_args};
use flare_core::{
    Backing, ClassBuilder, ClassRef, FunctionRef, ObjectRef, QName, Value, VmContext, VmError,
    VmResult,
};
use std::cell::RefMut;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// Event type posted on every fire
pub const TIMER: &str = "timer";

/// Event type posted once a repeat count is exhausted
pub const TIMER_COMPLETE: &str = "timerComplete";

/// Services a timer needs from the player
#[derive(Clone)]
pub(crate) struct TimerServices {
    pub pool: Arc<ThreadPool>,
    pub events: EventSender,
    pub targets: TargetTable,
    pub min_delay: Duration,
}

/// One started run
struct TimerRun {
    token: CancellationToken,
    target: TargetId,
    finished: Arc<AtomicBool>,
}

/// Native state of a Timer instance
#[derive(Default)]
pub struct TimerState {
    delay_ms: f64,
    repeat_count: u32,
    current_count: Arc<AtomicU32>,
    run: Option<TimerRun>,
}

impl TimerState {
    /// Configured delay in milliseconds
    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    /// Configured number of fires (0 = unlimited)
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }

    /// Fires since construction or the last reset
    pub fn current_count(&self) -> u32 {
        self.current_count.load(Ordering::Acquire)
    }

    /// Whether a run is live and not asked to stop
    pub fn running(&self) -> bool {
        self.run.as_ref().map_or(false, |run| {
            !run.token.is_cancelled() && !run.finished.load(Ordering::Acquire)
        })
    }

    /// Target id of the current run
    pub fn target(&self) -> Option<TargetId> {
        self.run.as_ref().map(|run| run.target)
    }

    fn stop(&mut self) -> Option<TargetId> {
        let run = self.run.take()?;
        run.token.cancel();
        debug!(target_id = run.target.as_u64(), "timer stopped");
        Some(run.target)
    }
}

struct Worker {
    delay: Duration,
    repeat_count: u32,
    current_count: Arc<AtomicU32>,
    token: CancellationToken,
    target: TargetId,
    finished: Arc<AtomicBool>,
    events: EventSender,
}

impl Worker {
    fn run(self) {
        loop {
            thread::sleep(self.delay);
            if self.token.is_cancelled() {
                break;
            }

            let fired = self.current_count.fetch_add(1, Ordering::AcqRel) + 1;
            if !self.events.dispatch(self.target, TIMER) || !self.events.sync() {
                break;
            }

            if self.repeat_count != 0 && fired >= self.repeat_count {
                self.finished.store(true, Ordering::Release);
                self.events.dispatch(self.target, TIMER_COMPLETE);
                break;
            }
        }
        self.finished.store(true, Ordering::Release);
        self.events.retire(self.target);
        trace!(target_id = self.target.as_u64(), "timer worker exiting");
    }
}

/// Native state of a Timer object
///
/// # Panics
///
/// Panics if `obj` is not a Timer.
pub fn state(obj: &ObjectRef) -> RefMut<'_, TimerState> {
    target_state::<TimerState>(obj)
}

fn parse_delay(value: &Value) -> VmResult<f64> {
    let delay = value.to_number();
    if !delay.is_finite() || delay < 0.0 {
        return Err(VmError::InvalidArgument(format!(
            "Timer delay must be a finite non-negative number, got {}",
            value
        )));
    }
    Ok(delay)
}

/// Cancel the current run and forget its target
///
/// Events the worker already posted for that run are dropped by the player.
fn stop(targets: &TargetTable, this: &ObjectRef) {
    let stopped = state(this).stop();
    if let Some(target) = stopped {
        let released = targets.borrow_mut().remove(&target);
        drop(released);
    }
}

fn start(services: &TimerServices, this: &ObjectRef) {
    if state(this).running() {
        return;
    }
    stop(&services.targets, this);

    let mut state = state(this);
    let delay = Duration::from_secs_f64(state.delay_ms / 1000.0).max(services.min_delay);
    let run = TimerRun {
        token: CancellationToken::new(),
        target: TargetId::new(),
        finished: Arc::new(AtomicBool::new(false)),
    };
    let worker = Worker {
        delay,
        repeat_count: state.repeat_count,
        current_count: Arc::clone(&state.current_count),
        token: run.token.clone(),
        target: run.target,
        finished: Arc::clone(&run.finished),
        events: services.events.clone(),
    };
    debug!(
        target_id = run.target.as_u64(),
        delay_ms = delay.as_millis() as u64,
        repeat = state.repeat_count,
        "timer started"
    );
    let target = run.target;
    state.run = Some(run);
    drop(state);

    let replaced = services.targets.borrow_mut().insert(target, this.clone());
    drop(replaced);
    services.pool.submit(move || worker.run());
}

/// Register `flash.utils::Timer`
pub(crate) fn register(
    cx: &mut VmContext,
    dispatcher_class: &ClassRef,
    services: TimerServices,
) -> ClassRef {
    let stop_targets = Rc::clone(&services.targets);
    let reset_targets = Rc::clone(&services.targets);
    cx.register_class(
        ClassBuilder::new("Timer", "flash.utils")
            .extends(dispatcher_class)
            .backing(|| Backing::Host(Box::new(EventTarget::with_state(TimerState::default()))))
            .constructor(FunctionRef::native("Timer", |_, this, args| {
                require_args("Timer", args, 1);
                let delay = parse_delay(&args[0])?;
                let repeat = arg(args, 1).to_int();
                let repeat = u32::try_from(repeat).map_err(|_| {
                    VmError::InvalidArgument(format!("negative repeatCount {}", repeat))
                })?;
                let mut state = state(this);
                state.delay_ms = delay;
                state.repeat_count = repeat;
                Ok(Value::Undefined)
            }))
            .method(
                QName::public("start"),
                FunctionRef::native("start", move |_, this, _| {
                    start(&services, this);
                    Ok(Value::Undefined)
                }),
            )
            .method(
                QName::public("stop"),
                FunctionRef::native("stop", move |_, this, _| {
                    stop(&stop_targets, this);
                    Ok(Value::Undefined)
                }),
            )
            .method(
                QName::public("reset"),
                FunctionRef::native("reset", move |_, this, _| {
                    stop(&reset_targets, this);
                    state(this).current_count.store(0, Ordering::Release);
                    Ok(Value::Undefined)
                }),
            )
            .getter(
                QName::public("delay"),
                FunctionRef::native("delay", |_, this, _| {
                    Ok(Value::Number(state(this).delay_ms))
                }),
            )
            .setter(
                QName::public("delay"),
                FunctionRef::native("delay", |_, this, args| {
                    require_args("Timer.delay", args, 1);
                    let delay = parse_delay(&args[0])?;
                    state(this).delay_ms = delay;
                    Ok(Value::Undefined)
                }),
            )
            .getter(
                QName::public("repeatCount"),
                FunctionRef::native("repeatCount", |_, this, _| {
                    Ok(Value::Int(state(this).repeat_count as i32))
                }),
            )
            .getter(
                QName::public("running"),
                FunctionRef::native("running", |_, this, _| {
                    Ok(Value::Bool(state(this).running()))
                }),
            )
            .getter(
                QName::public("currentCount"),
                FunctionRef::native("currentCount", |_, this, _| {
                    Ok(Value::Int(state(this).current_count() as i32))
                }),
            ),
    )
}
