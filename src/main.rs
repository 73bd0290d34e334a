use clap::{Parser, Subcommand};
use image_depot::config::{self, Settings};
use image_depot::imaging::{
    DecodeLimits, MAX_TARGET_DIMENSION, RustBackend, TargetSize, TransformRequest, transform,
};
use image_depot::output;
use image_depot::store::{FsStore, ImageStore};
use image_depot::upload::{ImageService, RequestContext, UploadForm};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "image-depot")]
#[command(about = "Normalize images to bounded-size progressive JPEG and store them by id")]
#[command(long_about = "\
Normalize images to bounded-size progressive JPEG and store them by id

Every image is decoded under a pixel ceiling, turned upright according to its
EXIF orientation, scaled to fit the requested width and/or height (aspect
ratio preserved), converted to 8-bit RGB and re-encoded as a progressive JPEG
with quality clamped to 1-95.

Settings come from stock defaults, an optional config.toml (--config) and
IMAGE_DEPOT_* environment variables, in that order.

Run 'image-depot gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Path to a config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transform an image file without storing it
    Convert {
        input: PathBuf,
        /// Output path (defaults to <input>.out.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JPEG quality, clamped to 1-95
        #[arg(long)]
        quality: Option<i64>,
        /// Target width in pixels
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_TARGET_DIMENSION as i64))]
        width: Option<u32>,
        /// Target height in pixels
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=MAX_TARGET_DIMENSION as i64))]
        height: Option<u32>,
    },
    /// Upload an image into the store and print the JSON result
    Upload {
        file: PathBuf,
        /// JPEG quality (1-95)
        #[arg(long)]
        quality: Option<String>,
        /// Target width (1-20000)
        #[arg(short = 'x', long = "width")]
        x: Option<String>,
        /// Target height (1-20000)
        #[arg(short = 'y', long = "height")]
        y: Option<String>,
    },
    /// Write a stored image to a file, byte for byte
    Get {
        id: String,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print a stored image's metadata
    Show { id: String },
    /// List every stored image
    List,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Convert {
            input,
            output,
            quality,
            width,
            height,
        } => {
            let settings = setup(config_path)?;
            let source = std::fs::read(&input)?;
            let request = TransformRequest::new(&source)
                .with_quality(quality.unwrap_or(settings.default_quality.into()))
                .with_target(TargetSize::new(width, height))
                .with_limits(DecodeLimits::new(settings.max_pixels));
            let result = transform(&RustBackend::new(), &request)?;
            let out_path = output.unwrap_or_else(|| default_output_path(&input));
            std::fs::write(&out_path, &result.encoded)?;
            output::print_convert_output(&input, &out_path, &result);
        }
        Command::Upload {
            file,
            quality,
            x,
            y,
        } => {
            let service = open_service(setup(config_path)?)?;
            let ctx = RequestContext::new("upload");
            let body = service.read_body(File::open(&file)?)?;
            let form = UploadForm {
                file: body,
                filename: file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned()),
                quality,
                x,
                y,
            };
            match service.upload(&ctx, form) {
                Ok(response) => println!("{}", serde_json::to_string_pretty(&response)?),
                Err(e) => return Err(format!("{} {}", e.status(), e.body()).into()),
            }
        }
        Command::Get { id, output } => {
            let service = open_service(setup(config_path)?)?;
            let ctx = RequestContext::new("get");
            match service.fetch(&ctx, &id) {
                Ok(image) => std::fs::write(&output, &image.data)?,
                Err(e) => return Err(format!("{} {}", e.status(), e.body()).into()),
            }
        }
        Command::Show { id } => {
            let store = FsStore::open(&setup(config_path)?.store_dir)?;
            let id = uuid::Uuid::parse_str(&id)?;
            match store.metadata(id)? {
                Some(meta) => output::print_image_meta(&meta),
                None => return Err(format!("image {id} not found").into()),
            }
        }
        Command::List => {
            let store = FsStore::open(&setup(config_path)?.store_dir)?;
            output::print_image_list(&store.list()?);
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

/// Resolve settings and start logging. Every command but `gen-config` runs this.
fn setup(config_path: Option<&Path>) -> Result<Settings, Box<dyn std::error::Error>> {
    let settings = config::load_settings(config_path)?;
    init_tracing(&settings);
    debug!(?settings, "settings loaded");
    Ok(settings)
}

fn open_service(
    settings: Settings,
) -> Result<ImageService<RustBackend, FsStore>, Box<dyn std::error::Error>> {
    let store = FsStore::open(&settings.store_dir)?;
    Ok(ImageService::new(RustBackend::new(), store, settings))
}

/// Log to stderr. `RUST_LOG` wins over the configured filter.
fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// `photos/beach.png` → `photos/beach.out.jpg`
fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("out.jpg")
}
