//! rsfish CLI: command-line interface for sub-pixel spot detection.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use rsfish::{BackgroundMode, DetectConfig, RansacMode, ScalarField, SpotDetector};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

const IMAGE_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "pgm", "bmp", "jpg", "jpeg"];

#[derive(Parser)]
#[command(name = "rsfish")]
#[command(about = "Detect diffraction-limited spots in 2D/3D fluorescence images")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and localize spots; writes one JSON file per threshold.
    Detect(CliDetectArgs),

    /// Count DoG candidates per threshold (no refinement).
    Peaks(CliPeaksArgs),
}

#[derive(Debug, Clone, Args)]
struct CliDetectArgs {
    #[command(flatten)]
    input: CliInputArgs,

    /// Output prefix; files are named `<prefix>_t<threshold>.json`.
    #[arg(long)]
    out: PathBuf,

    /// Support radius in voxels for gradient sampling.
    #[arg(long)]
    support_radius: Option<usize>,

    /// Refinement mode.
    #[arg(long, value_enum)]
    ransac: Option<RansacModeArg>,

    /// Minimum RANSAC inlier ratio in (0, 1].
    #[arg(long)]
    inlier_ratio: Option<f64>,

    /// RANSAC inlier distance in voxels.
    #[arg(long)]
    max_error: Option<f64>,

    /// RANSAC iterations per consensus search.
    #[arg(long)]
    iterations: Option<usize>,

    /// RANSAC sampling seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Multiconsensus: minimum inliers per spot.
    #[arg(long)]
    min_inliers: Option<usize>,

    /// Multiconsensus: initial standard-deviation factor.
    #[arg(long)]
    n_std_initial: Option<f64>,

    /// Multiconsensus: final standard-deviation factor.
    #[arg(long)]
    n_std_final: Option<f64>,

    /// Local background estimate subtracted from spot intensities.
    #[arg(long, value_enum)]
    background: Option<BackgroundModeArg>,

    /// Background RANSAC tolerance in normalized intensity units.
    #[arg(long)]
    bg_max_error: Option<f64>,

    /// Background RANSAC minimum inlier ratio.
    #[arg(long)]
    bg_inlier_ratio: Option<f64>,

    /// Drop spots whose intensity is below this value.
    #[arg(long)]
    intensity_threshold: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct CliPeaksArgs {
    #[command(flatten)]
    input: CliInputArgs,
}

/// Options shared by every subcommand.
#[derive(Debug, Clone, Args)]
struct CliInputArgs {
    /// Input image, or a directory of z-slices (read in file-name order).
    #[arg(long)]
    image: PathBuf,

    /// JSON configuration file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Single DoG threshold.
    #[arg(long, conflicts_with = "multi_threshold")]
    threshold: Option<f64>,

    /// Several DoG thresholds evaluated from one DoG pass (comma separated).
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    multi_threshold: Option<Vec<f64>>,

    /// DoG sigma in xy voxels.
    #[arg(long)]
    sigma: Option<f64>,

    /// z/xy voxel spacing ratio.
    #[arg(long)]
    anisotropy: Option<f64>,

    /// Do not apply the anisotropy factor to the DoG z sigma.
    #[arg(long)]
    no_anisotropy_dog: bool,

    /// Fixed normalization minimum (requires --max-intensity).
    #[arg(long, requires = "max_intensity")]
    min_intensity: Option<f64>,

    /// Fixed normalization maximum (requires --min-intensity).
    #[arg(long, requires = "min_intensity")]
    max_intensity: Option<f64>,

    /// Worker threads.
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RansacModeArg {
    Off,
    Single,
    Multi,
}

impl RansacModeArg {
    fn to_core(self) -> RansacMode {
        match self {
            Self::Off => RansacMode::Off,
            Self::Single => RansacMode::Single,
            Self::Multi => RansacMode::MultiConsensus,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackgroundModeArg {
    None,
    Mean,
    Median,
    RansacMean,
    RansacMedian,
}

impl BackgroundModeArg {
    fn to_core(self) -> BackgroundMode {
        match self {
            Self::None => BackgroundMode::None,
            Self::Mean => BackgroundMode::Mean,
            Self::Median => BackgroundMode::Median,
            Self::RansacMean => BackgroundMode::RansacMean,
            Self::RansacMedian => BackgroundMode::RansacMedian,
        }
    }
}

impl CliInputArgs {
    fn base_config(&self) -> CliResult<DetectConfig> {
        match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| -> CliError {
                    format!("Failed to read config {}: {}", path.display(), e).into()
                })?;
                Ok(serde_json::from_str(&text)?)
            }
            None => Ok(DetectConfig::default()),
        }
    }

    fn apply(&self, config: &mut DetectConfig) {
        if let Some(t) = self.threshold {
            config.thresholds = vec![t];
        }
        if let Some(ts) = &self.multi_threshold {
            config.thresholds = ts.clone();
        }
        if let Some(s) = self.sigma {
            config.dog.sigma = s;
        }
        if let Some(a) = self.anisotropy {
            config.anisotropy = a;
        }
        if self.no_anisotropy_dog {
            config.dog.use_anisotropy = false;
        }
        if let (Some(lo), Some(hi)) = (self.min_intensity, self.max_intensity) {
            config.intensity_range = Some([lo, hi]);
        }
        if let Some(n) = self.threads {
            config.num_threads = n;
        }
    }
}

impl CliDetectArgs {
    fn to_config(&self) -> CliResult<DetectConfig> {
        let mut config = self.input.base_config()?;
        self.input.apply(&mut config);

        if let Some(r) = self.support_radius {
            config.support_radius = r;
        }
        if let Some(mode) = self.ransac {
            config.ransac.mode = mode.to_core();
        }
        if let Some(v) = self.inlier_ratio {
            config.ransac.inlier_ratio = v;
        }
        if let Some(v) = self.max_error {
            config.ransac.max_error = v;
        }
        if let Some(v) = self.iterations {
            config.ransac.num_iterations = v;
        }
        if self.seed.is_some() {
            config.ransac.seed = self.seed;
        }
        if let Some(v) = self.min_inliers {
            config.ransac.multi.min_num_inliers = v;
        }
        if let Some(v) = self.n_std_initial {
            config.ransac.multi.n_times_stdev_initial = v;
        }
        if let Some(v) = self.n_std_final {
            config.ransac.multi.n_times_stdev_final = v;
        }
        if let Some(mode) = self.background {
            config.background.mode = mode.to_core();
        }
        if let Some(v) = self.bg_max_error {
            config.background.max_error = v;
        }
        if let Some(v) = self.bg_inlier_ratio {
            config.background.inlier_ratio = v;
        }
        if let Some(v) = self.intensity_threshold {
            config.intensity_threshold = v;
        }
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Peaks(args) => run_peaks(&args),
    }
}

// ── image loading ──────────────────────────────────────────────────────

fn load_field(path: &Path) -> CliResult<ScalarField> {
    if path.is_dir() {
        load_stack(path)
    } else {
        let (w, h, data) = load_slice(path)?;
        Ok(ScalarField::new_2d(w, h, data)?)
    }
}

fn load_slice(path: &Path) -> CliResult<(usize, usize, Vec<f32>)> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let data = gray.into_raw().into_iter().map(f32::from).collect();
    Ok((w as usize, h as usize, data))
}

fn slice_paths(dir: &Path) -> CliResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn load_stack(dir: &Path) -> CliResult<ScalarField> {
    let paths = slice_paths(dir)?;
    if paths.is_empty() {
        return Err(format!("No image slices found in {}", dir.display()).into());
    }

    let mut dims: Option<(usize, usize)> = None;
    let mut data = Vec::new();
    for path in &paths {
        let (w, h, slice) = load_slice(path)?;
        match dims {
            None => dims = Some((w, h)),
            Some(d) if d != (w, h) => {
                return Err(format!(
                    "Slice {} is {}x{}, expected {}x{}",
                    path.display(),
                    w,
                    h,
                    d.0,
                    d.1
                )
                .into());
            }
            Some(_) => {}
        }
        data.extend(slice);
    }
    let (w, h) = dims.ok_or("no slices loaded")?;
    Ok(ScalarField::new_3d(w, h, paths.len(), data)?)
}

fn output_path(prefix: &Path, threshold: f64) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("_t{}.json", threshold));
    PathBuf::from(name)
}

// ── detect ─────────────────────────────────────────────────────────────

fn run_detect(args: &CliDetectArgs) -> CliResult<()> {
    tracing::info!("Loading image: {}", args.input.image.display());
    let field = load_field(&args.input.image)?;
    tracing::info!("Field size: {:?}", field.dims());

    let config = args.to_config()?;
    let detector = SpotDetector::with_config(config);
    let results = detector.detect(&field)?;

    for result in &results {
        if let Some(msg) = &result.failure {
            tracing::warn!("Threshold {} failed: {}", result.threshold, msg);
            continue;
        }
        tracing::info!(
            "Threshold {}: {} spots",
            result.threshold,
            result.spots.len()
        );
        let path = output_path(&args.out, result.threshold);
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(&path, &json)?;
        tracing::info!("Results written to {}", path.display());
    }

    Ok(())
}

// ── peaks ──────────────────────────────────────────────────────────────

fn run_peaks(args: &CliPeaksArgs) -> CliResult<()> {
    let field = load_field(&args.input.image)?;
    let mut config = args.input.base_config()?;
    args.input.apply(&mut config);

    let detector = SpotDetector::with_config(config);
    let peaks = detector.detect_peaks(&field)?;

    println!("threshold\tpeaks");
    for &t in &detector.config().thresholds {
        println!("{}\t{}", t, peaks.filter(t).len());
    }
    Ok(())
}
