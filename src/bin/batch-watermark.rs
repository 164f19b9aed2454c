use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use batch_watermark::{
    spawn, Anchor, BatchEvent, ProcessOptions, WatermarkJob, WatermarkKind,
};

#[derive(Parser)]
#[command(
    name = "batch-watermark",
    about = "Batch-apply a text or image watermark to every image in a folder",
    version,
    after_help = "Outputs are written to <INPUT_DIR>/watermarked_output with the original file names.\n\
                  Supported inputs: .jpg, .jpeg, .png, .bmp (any case)."
)]
struct Cli {
    /// Folder containing the images to watermark
    input_dir: PathBuf,

    /// Text watermark (rendered white at 50% opacity)
    #[arg(short, long, conflicts_with = "image", required_unless_present = "image")]
    text: Option<String>,

    /// Image watermark, ideally a PNG with transparency
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Size in percent: text scale (default 100) or watermark width as % of image width (default 15)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    size: Option<u32>,

    /// Where to place the watermark
    #[arg(short, long, value_enum, default_value = "bottom-right")]
    position: Anchor,

    /// Convert the image watermark to grayscale at 50% opacity
    #[arg(short, long, requires = "image")]
    filter: bool,

    /// TrueType font for text watermarks (falls back to a built-in face)
    #[arg(long, default_value = "fonts/arial.ttf")]
    font: PathBuf,

    /// JPEG output quality (1-100)
    #[arg(long, default_value_t = 75, value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_logging(cli: &Cli) {
    let default = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let kind = match (&cli.text, &cli.image) {
        (Some(text), None) => WatermarkKind::Text(text.clone()),
        (None, Some(path)) => WatermarkKind::Image {
            path: path.clone(),
            filter: cli.filter,
        },
        // clap enforces exactly one of --text / --image.
        _ => {
            eprintln!("Error: Specify exactly one of --text or --image");
            process::exit(2);
        }
    };
    let size = cli.size.unwrap_or_else(|| kind.default_size_percent());

    let job = match WatermarkJob::new(&cli.input_dir, kind, size, cli.position) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("Input Error: {e}");
            process::exit(1);
        }
    };

    let opts = ProcessOptions {
        font_path: cli.font.clone(),
        jpeg_quality: cli.jpeg_quality,
    };

    let handle = match spawn(job, opts) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("Fatal: Failed to start worker: {e}");
            process::exit(1);
        }
    };

    let mut failed = false;
    for event in handle.events() {
        match event {
            BatchEvent::Progress(pct) => {
                if !cli.quiet {
                    eprint!("\r[{:<20}] {pct:>3}%", "#".repeat(usize::from(pct / 5)));
                    let _ = std::io::stderr().flush();
                }
            }
            BatchEvent::Finished(summary) => {
                if !cli.quiet {
                    eprintln!();
                    eprintln!("DONE! {summary}");
                }
            }
            BatchEvent::Failed(message) => {
                if !cli.quiet {
                    eprintln!();
                }
                eprintln!("ERROR: {message}");
                failed = true;
            }
        }
    }

    match handle.join() {
        Err(e) if !failed => {
            eprintln!("ERROR: {e}");
            process::exit(1);
        }
        Err(_) => process::exit(1),
        Ok(_) if failed => process::exit(1),
        Ok(_) => {}
    }
}
