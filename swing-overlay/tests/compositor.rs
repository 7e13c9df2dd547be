//! End-to-end compositor runs against fake probe and transform collaborators

use image::{ImageBuffer, Rgba, RgbaImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use swing_core::{OverlayConfig, OverlayRequest, Placement, VideoInfo};
use swing_overlay::{CancelToken, Error, OverlayCompositor};
use swing_raster::{text, CaptionRasterizer, FontSet};
use swing_transform::{
    ActiveTransform, LayerKind, Prober, TransformJob, TransformReport, TransformRunner, Transformer,
};

const FULL_HD: VideoInfo = VideoInfo {
    width: 1920,
    height: 1080,
    bitrate: 8_000_000,
};

/// Reports `input` for the source video and `output` for anything else
struct FakeProbe {
    input: VideoInfo,
    output: Option<VideoInfo>,
}

impl Prober for FakeProbe {
    fn probe(&self, path: &Path) -> swing_transform::Result<VideoInfo> {
        let is_source = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("in"));
        if is_source {
            Ok(self.input)
        } else {
            self.output
                .ok_or_else(|| swing_transform::Error::Failed("moov atom not found".into()))
        }
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Write(&'static [u8]),
    RejectStart,
    /// Writes a partial file, then fails
    FailMidway,
    /// Writes a partial file, then waits for cancellation
    Hang,
}

#[derive(Clone, Debug)]
struct SeenLayer {
    kind: LayerKind,
    size: (u32, u32),
    placement: Placement,
}

struct FakeTransformer {
    behavior: Behavior,
    starts: AtomicUsize,
    seen: Mutex<Vec<SeenLayer>>,
    bitrate: Mutex<Option<Option<u64>>>,
}

impl FakeTransformer {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            starts: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            bitrate: Mutex::new(None),
        })
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn seen(&self) -> Vec<SeenLayer> {
        self.seen.lock().unwrap().clone()
    }
}

struct FakeRun {
    behavior: Behavior,
    output: PathBuf,
}

impl Transformer for FakeTransformer {
    fn start(&self, job: TransformJob) -> swing_transform::Result<Box<dyn ActiveTransform>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.bitrate.lock().unwrap() = Some(job.settings.target_bitrate);
        self.seen.lock().unwrap().extend(job.overlays.iter().map(|layer| SeenLayer {
            kind: layer.kind,
            size: layer.image.dimensions(),
            placement: layer.placement,
        }));
        if let Behavior::RejectStart = self.behavior {
            return Err(swing_transform::Error::Failed("encoder rejected configuration".into()));
        }
        Ok(Box::new(FakeRun {
            behavior: self.behavior,
            output: job.output,
        }))
    }
}

impl ActiveTransform for FakeRun {
    fn run(self: Box<Self>, cancel: &CancelToken) -> swing_transform::Result<TransformReport> {
        match self.behavior {
            Behavior::Write(bytes) => {
                fs::write(&self.output, bytes)?;
                Ok(TransformReport { frames: 30 })
            }
            Behavior::RejectStart => unreachable!(),
            Behavior::FailMidway => {
                fs::write(&self.output, b"partial")?;
                Err(swing_transform::Error::Failed("muxer crashed".into()))
            }
            Behavior::Hang => {
                fs::write(&self.output, b"partial")?;
                while !cancel.is_cancelled() {
                    thread::sleep(Duration::from_millis(5));
                }
                Err(swing_transform::Error::Cancelled)
            }
        }
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    transformer: Arc<FakeTransformer>,
    compositor: OverlayCompositor,
}

impl Fixture {
    fn new(behavior: Behavior, output: Option<VideoInfo>) -> Self {
        Self::with_config(behavior, output, OverlayConfig::default())
    }

    fn with_config(behavior: Behavior, output: Option<VideoInfo>, config: OverlayConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("input.mp4"), b"source video bytes").unwrap();
        let avatar: RgbaImage = ImageBuffer::from_pixel(600, 600, Rgba([40, 120, 200, 255]));
        avatar.save(dir.path().join("avatar.png")).unwrap();

        let transformer = FakeTransformer::new(behavior);
        let prober = Arc::new(FakeProbe {
            input: FULL_HD,
            output,
        });
        let shared: Arc<dyn Transformer> = transformer.clone();
        let compositor = OverlayCompositor::new(config, prober, Arc::clone(&shared))
            .unwrap()
            .with_runner(TransformRunner::new(shared).with_tick(Duration::from_millis(5)));

        Self {
            dir,
            transformer,
            compositor,
        }
    }

    fn with_caption_rasterizer(self, caption: CaptionRasterizer) -> Self {
        Self {
            compositor: self.compositor.with_caption_rasterizer(caption),
            dir: self.dir,
            transformer: self.transformer,
        }
    }

    fn input(&self) -> PathBuf {
        self.dir.path().join("input.mp4")
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("exports").join("out.mp4")
    }

    fn avatar_request(&self) -> OverlayRequest {
        OverlayRequest::new(self.input(), self.output()).with_avatar(self.dir.path().join("avatar.png"))
    }

    fn process(&self, request: &OverlayRequest) -> swing_overlay::Result<PathBuf> {
        self.compositor.process(request, &CancelToken::new())
    }
}

#[test]
fn passthrough_copies_input_byte_for_byte() {
    let fixture = Fixture::new(Behavior::Write(b"encoded"), None);
    let request = OverlayRequest::new(fixture.input(), fixture.output());

    let written = fixture.process(&request).unwrap();
    assert_eq!(written, fixture.output());
    assert_eq!(fs::read(&written).unwrap(), b"source video bytes");
    assert_eq!(fixture.transformer.starts(), 0);
}

#[test]
fn blank_caption_is_passthrough() {
    let fixture = Fixture::new(Behavior::Write(b"encoded"), None);
    let request = OverlayRequest::new(fixture.input(), fixture.output()).with_caption("   ");

    fixture.process(&request).unwrap();
    assert_eq!(fs::read(fixture.output()).unwrap(), b"source video bytes");
    assert_eq!(fixture.transformer.starts(), 0);
}

#[test]
fn missing_input_fails_before_transform() {
    let fixture = Fixture::new(Behavior::Write(b"encoded"), Some(FULL_HD));
    let request = OverlayRequest::new(fixture.dir.path().join("input-gone.mp4"), fixture.output())
        .with_avatar(fixture.dir.path().join("avatar.png"));

    let err = fixture.process(&request).unwrap_err();
    assert!(matches!(err, Error::InputMissing(_)));
    assert_eq!(err.code(), "file_not_found");
    assert_eq!(fixture.transformer.starts(), 0);
}

#[test]
fn avatar_run_succeeds_and_validates_output() {
    let fixture = Fixture::new(Behavior::Write(b"encoded"), Some(FULL_HD));

    let written = fixture.process(&fixture.avatar_request()).unwrap();
    assert_eq!(fs::read(&written).unwrap(), b"encoded");
    assert_eq!(fixture.transformer.starts(), 1);
    assert_eq!(*fixture.transformer.bitrate.lock().unwrap(), Some(Some(8_000_000)));
}

#[test]
fn full_hd_avatar_is_placed_top_right() {
    let fixture = Fixture::new(Behavior::Write(b"encoded"), Some(FULL_HD));
    fixture.process(&fixture.avatar_request()).unwrap();

    let seen = fixture.transformer.seen();
    assert_eq!(seen.len(), 1);
    let avatar = &seen[0];
    assert_eq!(avatar.kind, LayerKind::Avatar);
    // 0.52 of the 1080 shorter side
    assert_eq!(avatar.size, (561, 561));

    // 5% of the longer side
    let margin = 96.0_f32;
    let anchor = avatar.placement.background_anchor;
    assert!((anchor.x - (1.0 - 2.0 * margin / 1920.0)).abs() < 1e-5);
    assert!((anchor.y - (1.0 - 2.0 * margin / 1080.0)).abs() < 1e-5);
    assert_eq!(avatar.placement.top_left(1920, 1080), (1263, 96));
}

#[test]
fn transform_failure_leaves_no_output() {
    let fixture = Fixture::new(Behavior::FailMidway, Some(FULL_HD));

    let err = fixture.process(&fixture.avatar_request()).unwrap_err();
    assert!(matches!(err, Error::TransformFailure(_)));
    assert_eq!(err.code(), "overlay_failed");
    assert!(!fixture.output().exists());
}

#[test]
fn start_failure_does_not_hang() {
    let fixture = Fixture::new(Behavior::RejectStart, Some(FULL_HD));

    let begun = Instant::now();
    let err = fixture.process(&fixture.avatar_request()).unwrap_err();
    assert!(matches!(err, Error::TransformFailure(_)));
    assert!(begun.elapsed() < Duration::from_secs(5));
    assert!(!fixture.output().exists());
}

#[test]
fn avatar_over_decode_budget_still_succeeds() {
    let mut config = OverlayConfig::default();
    config.avatar.decode_budget_bytes = 1024;
    let fixture = Fixture::with_config(Behavior::Write(b"encoded"), Some(FULL_HD), config);

    let written = fixture.process(&fixture.avatar_request()).unwrap();
    // no layer could be built, so the input is copied
    assert_eq!(fs::read(&written).unwrap(), b"source video bytes");
    assert_eq!(fixture.transformer.starts(), 0);
}

#[test]
fn missing_avatar_image_falls_back_to_copy() {
    let fixture = Fixture::new(Behavior::Write(b"encoded"), Some(FULL_HD));
    let request = OverlayRequest::new(fixture.input(), fixture.output())
        .with_avatar(fixture.dir.path().join("nobody.png"));

    fixture.process(&request).unwrap();
    assert_eq!(fs::read(fixture.output()).unwrap(), b"source video bytes");
    assert_eq!(fixture.transformer.starts(), 0);
}

#[test]
fn unknown_geometry_fails() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("input.mp4"), b"source").unwrap();
    let transformer: Arc<dyn Transformer> = FakeTransformer::new(Behavior::Write(b"encoded"));
    let prober = Arc::new(FakeProbe {
        input: VideoInfo::new(0, 1080, 0),
        output: None,
    });
    let compositor = OverlayCompositor::new(OverlayConfig::default(), prober, transformer).unwrap();
    let request = OverlayRequest::new(dir.path().join("input.mp4"), dir.path().join("out.mp4"))
        .with_caption("Hello");

    let err = compositor.process(&request, &CancelToken::new()).unwrap_err();
    assert!(matches!(err, Error::GeometryUnknown { .. }));
}

#[test]
fn timeout_cancels_and_removes_output() {
    let mut config = OverlayConfig::default();
    config.transform.timeout_secs = 1;
    config.transform.shutdown_grace_ms = 2_000;
    let fixture = Fixture::with_config(Behavior::Hang, Some(FULL_HD), config);

    let err = fixture.process(&fixture.avatar_request()).unwrap_err();
    assert!(matches!(err, Error::TransformTimeout(d) if d == Duration::from_secs(1)));
    assert!(!fixture.output().exists());
}

#[test]
fn caller_cancellation_interrupts_and_stays_cancelled() {
    let fixture = Fixture::new(Behavior::Hang, Some(FULL_HD));
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        remote.cancel();
    });

    let err = fixture
        .compositor
        .process(&fixture.avatar_request(), &cancel)
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, Error::InterruptedWait));
    assert!(cancel.is_cancelled());
    assert!(!fixture.output().exists());
}

#[test]
fn empty_output_is_rejected_and_deleted() {
    let fixture = Fixture::new(Behavior::Write(b""), Some(FULL_HD));

    let err = fixture.process(&fixture.avatar_request()).unwrap_err();
    assert!(matches!(err, Error::OutputEmpty(_)));
    assert!(!fixture.output().exists());
}

#[test]
fn unreadable_output_is_rejected_and_deleted() {
    let fixture = Fixture::new(Behavior::Write(b"not really a video"), None);

    let err = fixture.process(&fixture.avatar_request()).unwrap_err();
    assert!(matches!(err, Error::OutputUnreadable { .. }));
    assert!(!fixture.output().exists());
}

#[test]
fn stale_output_is_removed_before_transform() {
    let fixture = Fixture::new(Behavior::RejectStart, Some(FULL_HD));
    fs::create_dir_all(fixture.output().parent().unwrap()).unwrap();
    fs::write(fixture.output(), b"yesterday's export").unwrap();

    fixture.process(&fixture.avatar_request()).unwrap_err();
    assert!(!fixture.output().exists());
}

#[test]
fn overlay_onto_the_input_keeps_the_source() {
    let fixture = Fixture::new(Behavior::Write(b"encoded"), Some(FULL_HD));
    let request = OverlayRequest::new(fixture.input(), fixture.dir.path().join(".").join("input.mp4"))
        .with_avatar(fixture.dir.path().join("avatar.png"));

    let err = fixture.process(&request).unwrap_err();
    assert!(matches!(err, Error::OutputIsInput(_)));
    assert_eq!(err.code(), "overlay_failed");
    assert_eq!(fixture.transformer.starts(), 0);
    assert_eq!(fs::read(fixture.input()).unwrap(), b"source video bytes");
}

#[test]
fn full_hd_avatar_and_caption_end_to_end() {
    // Only meaningful where a system font is installed
    let Some((regular, bold)) = text::find_system_fonts() else {
        return;
    };
    let fonts = FontSet::new(
        FontSet::load_font(&regular).unwrap(),
        bold.and_then(|path| FontSet::load_font(&path).ok()),
    );
    let fixture = Fixture::new(Behavior::Write(b"encoded"), Some(FULL_HD))
        .with_caption_rasterizer(CaptionRasterizer::with_fonts(OverlayConfig::default(), fonts));
    let request = fixture.avatar_request().with_caption("Great swing!");

    let written = fixture.process(&request).unwrap();
    assert_eq!(fs::read(&written).unwrap(), b"encoded");

    let seen = fixture.transformer.seen();
    assert_eq!(seen.len(), 2);
    let (avatar, caption) = (&seen[0], &seen[1]);
    assert_eq!(avatar.kind, LayerKind::Avatar);
    assert_eq!(avatar.size, (561, 561));
    assert_eq!(avatar.placement.top_left(1920, 1080), (1263, 96));

    assert_eq!(caption.kind, LayerKind::Caption);
    let (width, height) = caption.size;
    assert!(width > 0 && width <= 1920);
    assert!(height > 0 && height < 1080);
    assert_eq!(caption.placement.rendered_size(1920, 1080), (width, height));
    let (x, y) = caption.placement.top_left(1920, 1080);
    // bottom center, lifted by 8.4% of the height
    assert!((x - (1920 - width as i32) / 2).abs() <= 1, "x was {x}");
    assert_eq!(y, 1080 - 91 - height as i32);
}
