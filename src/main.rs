use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use gamelens_lib::config::{self, AppConfig};
use gamelens_lib::{AnalysisSession, DetectedBox, GameLensError, GameLensResult, PixelBuffer, SaliencyResult};

const USAGE: &str = "usage: gamelens <image> [--screen WxH] [--heatmap out.png]";

#[derive(Debug, PartialEq)]
struct CliArgs {
    image: PathBuf,
    /// Target screen size; defaults to the image's own size.
    screen: Option<(u32, u32)>,
    heatmap: Option<PathBuf>,
}

fn parse_screen(value: &str) -> GameLensResult<(u32, u32)> {
    let bad = || GameLensError::InvalidParameter(format!("--screen expects WxH, got {value:?}"));
    let (w, h) = value.split_once(|c: char| c == 'x' || c == 'X').ok_or_else(bad)?;
    let w: u32 = w.trim().parse().map_err(|_| bad())?;
    let h: u32 = h.trim().parse().map_err(|_| bad())?;
    Ok((w, h))
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> GameLensResult<CliArgs> {
    let mut image = None;
    let mut screen = None;
    let mut heatmap = None;
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--screen" => {
                let v = it
                    .next()
                    .ok_or_else(|| GameLensError::InvalidParameter("--screen needs a value".into()))?;
                screen = Some(parse_screen(&v)?);
            }
            "--heatmap" => {
                let v = it
                    .next()
                    .ok_or_else(|| GameLensError::InvalidParameter("--heatmap needs a path".into()))?;
                heatmap = Some(PathBuf::from(v));
            }
            flag if flag.starts_with("--") => {
                return Err(GameLensError::InvalidParameter(format!("unknown option {flag}\n{USAGE}")));
            }
            _ if image.is_none() => image = Some(PathBuf::from(&arg)),
            _ => return Err(GameLensError::InvalidParameter(format!("unexpected argument {arg:?}\n{USAGE}"))),
        }
    }
    let image = image.ok_or_else(|| GameLensError::InvalidParameter(USAGE.into()))?;
    Ok(CliArgs { image, screen, heatmap })
}

#[derive(Serialize)]
struct SaliencySummary {
    width: u32,
    height: u32,
    mean: f32,
    peak: [u32; 2],
    peak_value: f32,
}

impl From<&SaliencyResult> for SaliencySummary {
    fn from(s: &SaliencyResult) -> Self {
        let (px, py, v) = s.peak();
        Self {
            width: s.width,
            height: s.height,
            mean: s.mean(),
            peak: [px, py],
            peak_value: v,
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    image: String,
    image_size: [u32; 2],
    screen_size: [u32; 2],
    executor: &'a str,
    boxes: Vec<DetectedBox>,
    saliency: SaliencySummary,
}

fn write_heatmap(result: &SaliencyResult, path: &std::path::Path) -> GameLensResult<()> {
    let bytes: Vec<u8> = result
        .saliency_map
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
        .collect();
    let img = image::GrayImage::from_raw(result.width, result.height, bytes)
        .ok_or_else(|| GameLensError::Saliency("saliency map does not match its dimensions".into()))?;
    img.save(path)?;
    tracing::info!(path = %path.display(), "heatmap written");
    Ok(())
}

fn load_or_default_config() -> AppConfig {
    match config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "no usable config; using defaults");
            AppConfig::default()
        }
    }
}

async fn run() -> GameLensResult<()> {
    let args = parse_args(std::env::args().skip(1))?;
    let cfg = load_or_default_config();

    let image = Arc::new(PixelBuffer::open(&args.image)?);
    let (screen_w, screen_h) = args.screen.unwrap_or((image.width(), image.height()));
    tracing::info!(
        path = %args.image.display(),
        width = image.width(),
        height = image.height(),
        screen_w,
        screen_h,
        "analysing image"
    );

    let session = AnalysisSession::new(&cfg);
    let boxes = session.detect(&image, screen_w, screen_h)?;
    let saliency = session.saliency(image.clone()).await?;

    if let Some(path) = &args.heatmap {
        write_heatmap(&saliency, path)?;
    }

    let report = Report {
        image: args.image.display().to_string(),
        image_size: [image.width(), image.height()],
        screen_size: [screen_w, screen_h],
        executor: session.executor_name(),
        boxes,
        saliency: SaliencySummary::from(&saliency),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    session.shutdown();
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
    gamelens_lib::init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "gamelens failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
