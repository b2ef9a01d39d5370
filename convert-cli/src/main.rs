use std::cell::RefCell;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use convert_lib::{api, HttpConvertService, LocalUpload};
use soundshift_core::category::CATEGORIES;
use soundshift_core::progress::clamp_percent;
use soundshift_core::{
    ApiBase, Category, Outcome, TickFlow, UploadPipeline, ZoneSurface, DEFAULT_API_BASE,
    POLL_INTERVAL_MS,
};

#[derive(Parser)]
#[command(
    name = "snd-convert",
    about = "Convert a local track through the SoundShift service"
)]
struct Cli {
    /// Audio file to convert (MP3, WAV, M4A, FLAC)
    file: PathBuf,

    /// Conversion category: phonk, melody, lofi, 8d
    #[arg(long, default_value = "phonk")]
    category: String,

    /// Origin of the conversion service
    #[arg(long, default_value = DEFAULT_API_BASE)]
    api_base: String,

    /// Where to write the converted file (default: the server-suggested
    /// name, in the current directory)
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Renders pipeline progress to stderr and records the terminal outcome.
#[derive(Default)]
struct TermSurface {
    outcome: RefCell<Option<Outcome>>,
}

impl ZoneSurface for TermSurface {
    fn highlight(&self) {}
    fn unhighlight(&self) {}
    fn ensure_progress_surface(&self) {}

    fn set_progress(&self, percent: f64, text: &str) {
        eprint!("\r{:>3.0}% {text}            ", clamp_percent(percent));
        let _ = std::io::stderr().flush();
    }

    fn show_terminal(&self, outcome: &Outcome) {
        eprintln!();
        match outcome {
            Outcome::Rejected { message } => eprintln!("{message}"),
            Outcome::UploadFailed { message } => eprintln!("Upload failed: {message}"),
            Outcome::ConversionFailed { message } => eprintln!("Conversion failed: {message}"),
            Outcome::Completed { .. } => eprintln!("Conversion complete."),
        }
        *self.outcome.borrow_mut() = Some(outcome.clone());
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let Some(category) = Category::from_name(&cli.category) else {
        eprintln!(
            "Unknown category '{}'. Available: {}",
            cli.category,
            CATEGORIES
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        std::process::exit(1);
    };

    let filename = cli
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = mime_for(&filename);

    let bytes = std::fs::read(&cli.file).unwrap_or_else(|e| {
        eprintln!("Can't read {}: {e}", cli.file.display());
        std::process::exit(1);
    });
    let upload = LocalUpload {
        filename,
        mime: mime.to_string(),
        bytes,
    };

    let base = ApiBase::new(cli.api_base);
    let client = reqwest::Client::new();
    let service = HttpConvertService::new(client.clone(), base.clone());
    let pipeline = UploadPipeline::new(service, TermSurface::default(), base, category);

    eprintln!(
        "Uploading {} for {} conversion...",
        cli.file.display(),
        category
    );
    let Some(generation) = pipeline
        .begin(&upload.filename, &upload.mime, &upload)
        .await
    else {
        std::process::exit(1);
    };

    // Same fixed-period schedule as the web client's timer.
    let mut ticks = tokio::time::interval(Duration::from_millis(POLL_INTERVAL_MS as u64));
    ticks.tick().await; // the first tick completes immediately
    loop {
        ticks.tick().await;
        if pipeline.poll_tick(generation).await == TickFlow::Done {
            break;
        }
    }

    let outcome = pipeline.surface().outcome.borrow().clone();
    match outcome {
        Some(Outcome::Completed { href, filename }) => {
            eprintln!("Downloading converted file...");
            let audio = api::download(&client, &href).await.unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(1);
            });
            let out_path = cli.output.unwrap_or_else(|| PathBuf::from(&filename));
            std::fs::write(&out_path, &audio).unwrap_or_else(|e| {
                eprintln!("Can't write {}: {e}", out_path.display());
                std::process::exit(1);
            });
            println!(
                "Wrote {} ({:.1} MB)",
                out_path.display(),
                audio.len() as f64 / 1_048_576.0
            );
        }
        _ => std::process::exit(1),
    }
}

/// Declared MIME type for a filename, by extension. Unknown extensions are
/// still submitted; the validator falls back to the extension list anyway.
fn mime_for(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.ends_with(".mp3") {
        "audio/mpeg"
    } else if lower.ends_with(".wav") {
        "audio/wav"
    } else if lower.ends_with(".m4a") {
        "audio/mp4"
    } else if lower.ends_with(".flac") {
        "audio/flac"
    } else {
        "application/octet-stream"
    }
}
