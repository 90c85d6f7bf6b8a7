//! Flare player runtime
//!
//! Builds the player on top of the `flare-core` object model:
//! - [`Player`], which owns the VM context and pumps the event queue
//! - A shared [`ThreadPool`] for timers and video decode ticks
//! - The cross-thread [`EventQueue`] with its sync rendezvous
//! - `flash.events`, `flash.utils::Timer` and the media classes
//! - [`PlayerOptions`] loaded from TOML
//!
//! Background work never touches objects. It posts events naming a
//! [`TargetId`] and the player resolves them on the interpreter thread.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod media;
pub mod player;
pub mod pool;
pub mod timer;

pub use config::{PlayerOptions, TimerOptions, VideoOptions};
pub use dispatcher::{dispatch, event_target, EventTarget};
pub use error::RuntimeError;
pub use events::{CancellationToken, Event, EventQueue, EventSender, TargetId};
pub use media::{FrameSource, FrameTicker, MediaClasses, RenderOutcome, VideoState};
pub use player::{Player, RuntimeClasses};
pub use pool::ThreadPool;
pub use timer::TimerState;
