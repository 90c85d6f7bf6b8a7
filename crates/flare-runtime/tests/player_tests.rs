//! Player setup and the video frame handoff
//!
//! Tests cover:
//! - Runtime classes are reachable by name after construction
//! - Options validation at construction
//! - Decode ticks on the pool reaching the presented frame

use flare_core::utils::definition_by_name;
use flare_core::{ClassRef, QName, Value};
use flare_runtime::media::video_state;
use flare_runtime::{FrameSource, Player, PlayerOptions, RenderOutcome, RuntimeError};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn player() -> Player {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Player::new(PlayerOptions {
        worker_threads: 2,
        ..PlayerOptions::default()
    })
    .unwrap()
}

struct Camera {
    fill: AtomicU8,
}

impl FrameSource for Camera {
    fn video_width(&self) -> u32 {
        8
    }

    fn video_height(&self) -> u32 {
        6
    }

    fn frame_rate(&self) -> f64 {
        200.0
    }

    fn copy_frame(&self, dest: &mut [u8]) {
        dest.fill(self.fill.load(Ordering::SeqCst));
    }
}

#[test]
fn test_runtime_classes_resolve_by_name() {
    let mut player = player();
    for (name, expected) in [
        ("flash.utils.Timer", player.classes().timer.clone()),
        ("flash.events::EventDispatcher", player.classes().event_dispatcher.clone()),
        ("flash.media.Video", player.classes().media.video.clone()),
        ("flash.net.NetStream", player.classes().media.net_stream.clone()),
    ] {
        let found = definition_by_name(player.context(), &Value::string(name)).unwrap();
        assert!(ClassRef::ptr_eq(found.as_class().unwrap(), &expected), "{}", name);
    }
    assert!(player
        .context()
        .global(&QName::new("SoundTransform", "flash.media"))
        .is_some());
}

#[test]
fn test_options_are_validated() {
    let mut options = PlayerOptions::default();
    options.video.fallback_frame_rate = f64::INFINITY;
    assert!(matches!(
        Player::new(options),
        Err(RuntimeError::InvalidOptions(_))
    ));

    let options = PlayerOptions::from_toml_str("worker_threads = 1\n").unwrap();
    let player = Player::new(options).unwrap();
    assert_eq!(player.pool().threads(), 1);
}

#[test]
fn test_decode_ticks_reach_presented_frame() {
    let mut player = player();
    let camera = Arc::new(Camera {
        fill: AtomicU8::new(1),
    });
    let stream = player.new_net_stream(camera.clone()).unwrap();
    let class = player.classes().media.video.clone();
    let video = player.context().construct(&class, &[]).unwrap();
    video
        .call_method(
            player.context(),
            &QName::public("attachNetStream"),
            &[Value::Object(stream)],
        )
        .unwrap();

    assert_eq!(
        player.render_video(&video),
        RenderOutcome::Started {
            tick_interval: Duration::from_millis(5)
        }
    );
    assert!(video_state(&video).front_buffer().iter().all(|&b| b == 1));

    camera.fill.store(9, Ordering::SeqCst);
    let presented = player.pump_until(Duration::from_secs(5), |p| {
        p.render_video(&video);
        video_state(&video).front_buffer().iter().all(|&b| b == 9)
    });
    assert!(presented);
    assert_eq!(video_state(&video).video_width(), 8);
}
