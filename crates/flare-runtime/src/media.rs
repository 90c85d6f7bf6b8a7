//! Media built-ins: `Video`, `NetStream`, `SoundTransform`, `DisplayObject`
//!
//! A video frame crosses threads once. The decode side ([`FrameTicker`])
//! copies the stream's current frame into an intermediate buffer; the render
//! side ([`render`]) copies that buffer into one of two presentation buffers,
//! alternating between them. Both copies hold the same mutex and nothing
//! else does.
//!
//! The frame geometry is locked by the first render that sees a non-zero
//! size. A stream that later reports another size is a fatal inconsistency.

use crate::events::CancellationToken;
use flare_core::function::{arg, require_args};
use flare_core::{
    Backing, ClassBuilder, ClassRef, FunctionRef, Key, ObjectRef, QName, Value, VmContext,
    VmResult,
};
use parking_lot::Mutex;
use std::cell::RefMut;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Default display size of a Video
pub const DEFAULT_WIDTH: i32 = 320;
/// Default display height of a Video
pub const DEFAULT_HEIGHT: i32 = 240;
/// Frame rate assumed when a stream reports none
pub const DEFAULT_FRAME_RATE: f64 = 24.0;

/// Decoded video collaborator behind a NetStream
///
/// Decoding is external; the player only asks for geometry, rate and the
/// latest frame as 32-bit BGRA pixels.
pub trait FrameSource: Send + Sync {
    /// Frame width in pixels, 0 while unknown
    fn video_width(&self) -> u32;

    /// Frame height in pixels, 0 while unknown
    fn video_height(&self) -> u32;

    /// Frames per second, non-positive while unknown
    fn frame_rate(&self) -> f64;

    /// Copy the latest frame into `dest` (`width * height * 4` bytes)
    fn copy_frame(&self, dest: &mut [u8]);
}

/// Host payload of a NetStream object
pub struct NetStreamSource(pub Arc<dyn FrameSource>);

/// State shared between the decode and render sides
struct FrameShared {
    /// Intermediate frame, empty until geometry is locked
    pixels: Vec<u8>,
    /// Display size
    width: i32,
    height: i32,
}

/// Decode-side handle of a Video
///
/// `Send`; moved onto whichever thread drives decoding.
pub struct FrameTicker {
    source: Arc<dyn FrameSource>,
    shared: Arc<Mutex<FrameShared>>,
    token: CancellationToken,
}

impl FrameTicker {
    /// Copy the stream's current frame into the intermediate buffer
    ///
    /// Returns `false` until the render side has locked the geometry.
    pub fn tick(&self) -> bool {
        let mut shared = self.shared.lock();
        if shared.pixels.is_empty() {
            return false;
        }
        self.source.copy_frame(&mut shared.pixels);
        true
    }

    /// Whether the owning Video is gone
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Native state of a Video object
pub struct VideoState {
    shared: Arc<Mutex<FrameShared>>,
    stream: Option<Arc<dyn FrameSource>>,
    video_width: u32,
    video_height: u32,
    buffers: [Vec<u8>; 2],
    current: usize,
    frame_ready: bool,
    fallback_frame_rate: f64,
    token: CancellationToken,
}

impl VideoState {
    fn new(fallback_frame_rate: f64) -> Self {
        Self {
            shared: Arc::new(Mutex::new(FrameShared {
                pixels: Vec::new(),
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
            })),
            stream: None,
            video_width: 0,
            video_height: 0,
            buffers: [Vec::new(), Vec::new()],
            current: 0,
            frame_ready: false,
            fallback_frame_rate,
            token: CancellationToken::new(),
        }
    }

    /// Locked frame width, 0 before the first valid render
    pub fn video_width(&self) -> u32 {
        self.video_width
    }

    /// Locked frame height, 0 before the first valid render
    pub fn video_height(&self) -> u32 {
        self.video_height
    }

    /// Display size
    pub fn display_size(&self) -> (i32, i32) {
        let shared = self.shared.lock();
        (shared.width, shared.height)
    }

    /// Most recently presented frame
    pub fn front_buffer(&self) -> &[u8] {
        &self.buffers[self.current]
    }

    /// Decode-side handle, once a stream is attached
    pub fn frame_ticker(&self) -> Option<FrameTicker> {
        self.stream.as_ref().map(|source| FrameTicker {
            source: Arc::clone(source),
            shared: Arc::clone(&self.shared),
            token: self.token.clone(),
        })
    }
}

impl Drop for VideoState {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Result of one render pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderOutcome {
    /// No stream attached, or its geometry is still unknown
    NotReady,
    /// Geometry just locked; decode ticks should run every `tick_interval`
    Started {
        /// Period of one frame
        tick_interval: Duration,
    },
    /// A frame was copied into the next presentation buffer
    Presented,
}

/// Native state of a Video object
///
/// # Panics
///
/// Panics if `obj` is not a Video.
pub fn video_state(obj: &ObjectRef) -> RefMut<'_, VideoState> {
    obj.host::<VideoState>()
}

/// Render one frame of `video`
///
/// # Panics
///
/// Panics if the stream's frame size differs from the size locked by an
/// earlier render.
pub fn render(video: &ObjectRef) -> RenderOutcome {
    let mut state = video_state(video);
    let source = match &state.stream {
        Some(source) => Arc::clone(source),
        None => return RenderOutcome::NotReady,
    };

    let (new_width, new_height) = (source.video_width(), source.video_height());
    if state.video_width == 0 || state.video_height == 0 {
        state.video_width = new_width;
        state.video_height = new_height;
    } else if state.video_width != new_width || state.video_height != new_height {
        panic!(
            "video frame size changed from {}x{} to {}x{}",
            state.video_width, state.video_height, new_width, new_height
        );
    }
    if state.video_width == 0 || state.video_height == 0 {
        return RenderOutcome::NotReady;
    }

    let len = state.video_width as usize * state.video_height as usize * 4;
    let mut outcome = RenderOutcome::Presented;
    if !state.frame_ready {
        state.buffers = [vec![0; len], vec![0; len]];
        let mut pixels = vec![0; len];
        source.copy_frame(&mut pixels);
        state.shared.lock().pixels = pixels;

        let mut rate = source.frame_rate();
        if !(rate.is_finite() && rate > 0.0) {
            rate = state.fallback_frame_rate;
        }
        let tick_interval = Duration::from_secs_f64(1.0 / rate);
        debug!(
            width = state.video_width,
            height = state.video_height,
            rate,
            "video geometry locked"
        );
        outcome = RenderOutcome::Started { tick_interval };
    }

    let next = (state.current + 1) % 2;
    let VideoState {
        shared, buffers, ..
    } = &mut *state;
    {
        let shared = shared.lock();
        buffers[next].copy_from_slice(&shared.pixels);
    }
    state.current = next;
    state.frame_ready = true;
    trace!(buffer = next, "video frame presented");
    outcome
}

fn display_getter(name: &'static str, pick: fn(&FrameShared) -> i32) -> FunctionRef {
    FunctionRef::native(name, move |_, this, _| {
        let state = video_state(this);
        let shared = state.shared.lock();
        Ok(Value::Int(pick(&shared)))
    })
}

fn display_setter(name: &'static str, put: fn(&mut FrameShared, i32)) -> FunctionRef {
    FunctionRef::native(name, move |_, this, args| {
        require_args(name, args, 1);
        let size = args[0].to_int();
        let state = video_state(this);
        put(&mut state.shared.lock(), size);
        Ok(Value::Undefined)
    })
}

fn build_video_traits(obj: &ObjectRef) {
    obj.bind_getter(
        QName::public("videoWidth"),
        FunctionRef::native("videoWidth", |_, this, _| {
            Ok(Value::Int(video_state(this).video_width as i32))
        }),
    );
    obj.bind_getter(
        QName::public("videoHeight"),
        FunctionRef::native("videoHeight", |_, this, _| {
            Ok(Value::Int(video_state(this).video_height as i32))
        }),
    );
    obj.bind_getter(QName::public("width"), display_getter("width", |s| s.width));
    obj.bind_setter(
        QName::public("width"),
        display_setter("width", |s, v| s.width = v),
    );
    obj.bind_getter(QName::public("height"), display_getter("height", |s| s.height));
    obj.bind_setter(
        QName::public("height"),
        display_setter("height", |s, v| s.height = v),
    );
}

/// Classes registered by [`register`]
pub struct MediaClasses {
    /// `flash.display::DisplayObject`
    pub display_object: ClassRef,
    /// `flash.media::Video`
    pub video: ClassRef,
    /// `flash.net::NetStream`
    pub net_stream: ClassRef,
    /// `flash.media::SoundTransform`
    pub sound_transform: ClassRef,
}

/// Register the media classes
pub(crate) fn register(
    cx: &mut VmContext,
    object_class: &ClassRef,
    fallback_frame_rate: f64,
) -> MediaClasses {
    let display_object = cx.register_class(
        ClassBuilder::new("DisplayObject", "flash.display").extends(object_class),
    );
    let net_stream =
        cx.register_class(ClassBuilder::new("NetStream", "flash.net").extends(object_class));
    let sound_transform = cx.register_class(
        ClassBuilder::new("SoundTransform", "flash.media")
            .extends(object_class)
            .constructor(FunctionRef::native("SoundTransform", |cx, this, args| {
                trace!("SoundTransform constructor");
                let volume = match arg(args, 0) {
                    Value::Undefined => 1.0,
                    v => v.to_number(),
                };
                let pan = arg(args, 1).to_number();
                this.set(cx, Key::public("volume"), Value::Number(volume))?;
                let pan = if pan.is_nan() { 0.0 } else { pan };
                this.set(cx, Key::public("pan"), Value::Number(pan))?;
                Ok(Value::Undefined)
            })),
    );

    let expected_stream = net_stream.clone();
    let video = cx.register_class(
        ClassBuilder::new("Video", "flash.media")
            .extends(&display_object)
            .build_traits(build_video_traits)
            .constructor(FunctionRef::native("Video", move |_, this, args| {
                let mut state = video_state(this);
                state.fallback_frame_rate = fallback_frame_rate;
                let mut shared = state.shared.lock();
                if let Some(w) = args.first() {
                    shared.width = w.to_int();
                }
                if let Some(h) = args.get(1) {
                    shared.height = h.to_int();
                }
                Ok(Value::Undefined)
            }))
            .method(
                QName::public("attachNetStream"),
                FunctionRef::native("attachNetStream", move |_, this, args| {
                    attach_net_stream(&expected_stream, this, args)
                }),
            )
            .backing(|| Backing::Host(Box::new(VideoState::new(DEFAULT_FRAME_RATE)))),
    );

    MediaClasses {
        display_object,
        video,
        net_stream,
        sound_transform,
    }
}

fn attach_net_stream(expected: &ClassRef, this: &ObjectRef, args: &[Value]) -> VmResult<Value> {
    require_args("attachNetStream", args, 1);
    let stream = match &args[0] {
        Value::Object(obj) if ClassRef::ptr_eq(obj.class(), expected) => obj,
        other => panic!("attachNetStream expects a NetStream, got {:?}", other),
    };
    let source = match stream.try_host::<NetStreamSource>() {
        Some(source) => Arc::clone(&source.0),
        None => panic!("NetStream has no frame source"),
    };
    video_state(this).stream = Some(source);
    debug!("net stream attached");
    Ok(Value::Undefined)
}

/// Create a NetStream object around `source`
pub fn new_net_stream(
    cx: &mut VmContext,
    net_stream_class: &ClassRef,
    source: Arc<dyn FrameSource>,
) -> VmResult<ObjectRef> {
    cx.construct_with(
        net_stream_class,
        Backing::Host(Box::new(NetStreamSource(source))),
        &[],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

    struct TestSource {
        width: AtomicU32,
        height: AtomicU32,
        rate: f64,
        fill: AtomicU8,
    }

    impl TestSource {
        fn new(width: u32, height: u32, rate: f64) -> Arc<Self> {
            Arc::new(Self {
                width: AtomicU32::new(width),
                height: AtomicU32::new(height),
                rate,
                fill: AtomicU8::new(1),
            })
        }
    }

    impl FrameSource for TestSource {
        fn video_width(&self) -> u32 {
            self.width.load(Ordering::SeqCst)
        }

        fn video_height(&self) -> u32 {
            self.height.load(Ordering::SeqCst)
        }

        fn frame_rate(&self) -> f64 {
            self.rate
        }

        fn copy_frame(&self, dest: &mut [u8]) {
            dest.fill(self.fill.load(Ordering::SeqCst));
        }
    }

    struct Fixture {
        cx: VmContext,
        classes: MediaClasses,
    }

    fn fixture() -> Fixture {
        let mut cx = VmContext::new();
        let object = cx.object_class().clone();
        let classes = register(&mut cx, &object, 30.0);
        Fixture { cx, classes }
    }

    fn attached_video(fx: &mut Fixture, source: Arc<TestSource>) -> ObjectRef {
        let stream = new_net_stream(&mut fx.cx, &fx.classes.net_stream, source).unwrap();
        let video = fx.cx.construct(&fx.classes.video, &[]).unwrap();
        video
            .call_method(
                &mut fx.cx,
                &QName::public("attachNetStream"),
                &[Value::Object(stream)],
            )
            .unwrap();
        video
    }

    #[test]
    fn test_render_without_stream_is_not_ready() {
        let mut fx = fixture();
        let video = fx.cx.construct(&fx.classes.video, &[]).unwrap();
        assert_eq!(render(&video), RenderOutcome::NotReady);
        assert!(video_state(&video).frame_ticker().is_none());
    }

    #[test]
    fn test_unknown_geometry_is_not_ready() {
        let mut fx = fixture();
        let source = TestSource::new(0, 0, 25.0);
        let video = attached_video(&mut fx, Arc::clone(&source));
        assert_eq!(render(&video), RenderOutcome::NotReady);
        assert_eq!(video_state(&video).video_width(), 0);

        source.width.store(4, Ordering::SeqCst);
        source.height.store(2, Ordering::SeqCst);
        assert!(matches!(render(&video), RenderOutcome::Started { .. }));
        assert_eq!(video_state(&video).video_width(), 4);
    }

    #[test]
    fn test_first_render_reports_frame_period() {
        let mut fx = fixture();
        let video = attached_video(&mut fx, TestSource::new(4, 2, 25.0));
        assert_eq!(
            render(&video),
            RenderOutcome::Started {
                tick_interval: Duration::from_millis(40)
            }
        );
        assert_eq!(render(&video), RenderOutcome::Presented);
    }

    #[test]
    fn test_missing_rate_uses_fallback() {
        let mut fx = fixture();
        let video = attached_video(&mut fx, TestSource::new(4, 2, 0.0));
        assert_eq!(
            render(&video),
            RenderOutcome::Started {
                tick_interval: Duration::from_secs_f64(1.0 / 30.0)
            }
        );
    }

    #[test]
    fn test_ticks_reach_the_front_buffer_on_next_render() {
        let mut fx = fixture();
        let source = TestSource::new(4, 2, 25.0);
        let video = attached_video(&mut fx, Arc::clone(&source));
        let ticker = video_state(&video).frame_ticker().unwrap();
        assert!(!ticker.tick());

        render(&video);
        assert_eq!(video_state(&video).front_buffer().len(), 4 * 2 * 4);
        assert!(video_state(&video).front_buffer().iter().all(|&b| b == 1));

        source.fill.store(7, Ordering::SeqCst);
        render(&video);
        assert!(video_state(&video).front_buffer().iter().all(|&b| b == 1));

        assert!(ticker.tick());
        render(&video);
        assert!(video_state(&video).front_buffer().iter().all(|&b| b == 7));
    }

    #[test]
    fn test_dropping_video_cancels_ticker() {
        let mut fx = fixture();
        let video = attached_video(&mut fx, TestSource::new(4, 2, 25.0));
        let ticker = video_state(&video).frame_ticker().unwrap();
        assert!(!ticker.is_cancelled());
        drop(video);
        assert!(ticker.is_cancelled());
    }

    #[test]
    #[should_panic(expected = "video frame size changed")]
    fn test_geometry_change_is_fatal() {
        let mut fx = fixture();
        let source = TestSource::new(4, 2, 25.0);
        let video = attached_video(&mut fx, Arc::clone(&source));
        render(&video);
        source.width.store(8, Ordering::SeqCst);
        render(&video);
    }

    #[test]
    #[should_panic(expected = "expects a NetStream")]
    fn test_attach_non_stream_is_fatal() {
        let mut fx = fixture();
        let video = fx.cx.construct(&fx.classes.video, &[]).unwrap();
        let other = fx.cx.new_object();
        let _ = video.call_method(
            &mut fx.cx,
            &QName::public("attachNetStream"),
            &[Value::Object(other)],
        );
    }

    #[test]
    fn test_display_size_accessors() {
        let mut fx = fixture();
        let video = fx
            .cx
            .construct(&fx.classes.video, &[Value::Int(640), Value::Int(480)])
            .unwrap();
        assert_eq!(
            video.get(&mut fx.cx, Key::public("width")).unwrap(),
            Some(Value::Int(640))
        );
        video
            .set(&mut fx.cx, Key::public("height"), Value::Int(360))
            .unwrap();
        assert_eq!(video_state(&video).display_size(), (640, 360));

        let plain = fx.cx.construct(&fx.classes.video, &[]).unwrap();
        assert_eq!(
            video_state(&plain).display_size(),
            (DEFAULT_WIDTH, DEFAULT_HEIGHT)
        );
    }

    #[test]
    fn test_sound_transform_defaults() {
        let mut fx = fixture();
        let st = fx.cx.construct(&fx.classes.sound_transform, &[]).unwrap();
        assert_eq!(
            st.get(&mut fx.cx, Key::public("volume")).unwrap(),
            Some(Value::Number(1.0))
        );
        assert_eq!(
            st.get(&mut fx.cx, Key::public("pan")).unwrap(),
            Some(Value::Number(0.0))
        );
    }
}
