use clap::Parser;
use npsync::NowPlaying;
use npsync::dimming::DimmingScheduler;
use npsync::refresh::{ColorScheme, DisplayLoop, RefreshSettings};
use npsync::ui::pipe::PipeScreen;
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

/// Application configuration from CLI
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Latitude used for dusk/dawn dimming (dimming is off without both coordinates)
    #[arg(long, env = "NPSYNC_LATITUDE", allow_hyphen_values = true)]
    latitude: Option<f64>,
    /// Longitude used for dusk/dawn dimming
    #[arg(long, env = "NPSYNC_LONGITUDE", allow_hyphen_values = true)]
    longitude: Option<f64>,
    /// Minutes over which the display dims after dusk
    #[arg(long, default_value_t = 60)]
    dimming_minutes: u32,
    /// Maximum number of cached artwork files
    #[arg(long, default_value_t = 10_000)]
    max_art_files: usize,
    /// Artwork cache directory
    #[arg(long, default_value = "album_images")]
    art_dir: PathBuf,
    /// Seconds between refresh ticks while updates are flowing
    #[arg(long, default_value_t = 0.05)]
    fast_interval: f64,
    /// Seconds per refresh tick when nothing changed
    #[arg(long, default_value_t = 1.0)]
    slow_interval: f64,
    /// Daytime text colour
    #[arg(long, default_value = "#DCDCDC")]
    active_text: String,
    /// Fully dimmed night text colour
    #[arg(long, default_value = "#686868")]
    night_text: String,
    /// Daytime progress bar colour
    #[arg(long, default_value = "#424242")]
    active_bar: String,
    /// Fully dimmed night progress bar colour
    #[arg(long, default_value = "#424242")]
    night_bar: String,
    /// Artwork mask at full night dimming (0-255)
    #[arg(long, default_value_t = 105)]
    max_art_mask: u8,
    /// Artwork mask while nothing is playing (0-255)
    #[arg(long, default_value_t = 200)]
    inactive_art_mask: u8,
    /// Text brightness multiplier while nothing is playing
    #[arg(long, default_value_t = 0.35)]
    inactive_dimming: f64,
    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug_log: bool,
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl Config {
    fn dimming(&self) -> DimmingScheduler {
        let location = self.latitude.zip(self.longitude);
        DimmingScheduler::new(location, self.dimming_minutes)
    }

    fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            fast: secs(self.fast_interval),
            slow: secs(self.slow_interval),
            art_dir: self.art_dir.clone(),
            max_art_files: self.max_art_files,
            colors: ColorScheme {
                active_text: self.active_text.clone(),
                night_text: self.night_text.clone(),
                active_bar: self.active_bar.clone(),
                night_bar: self.night_bar.clone(),
                max_art_mask: self.max_art_mask,
                inactive_art_mask: self.inactive_art_mask,
                inactive_dimming: self.inactive_dimming,
            },
        }
        .normalized()
    }
}

fn init_tracing(debug_log: bool) {
    let default = if debug_log { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Feed newline-delimited JSON payloads from stdin into the display.
async fn feed_stdin(np: NowPlaying) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => {
                let (status, body) = np.submit_json(&line).await;
                tracing::info!(status, message = %body["message"], "Payload submitted");
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read payload from stdin");
                break;
            }
        }
    }
    tracing::debug!("Payload input closed");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cfg = Config::parse();
    init_tracing(cfg.debug_log);

    let settings = cfg.refresh_settings();
    if let Err(e) = tokio::fs::create_dir_all(&settings.art_dir).await {
        tracing::warn!(path = %settings.art_dir.display(), error = %e, "Cannot create artwork directory");
    }

    let np = NowPlaying::new(cfg.dimming());
    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let display = tokio::spawn(DisplayLoop::new(np.clone(), PipeScreen::stdout(), settings).run(shutdown_rx));
    tokio::spawn(feed_stdin(np));

    tracing::info!("Now playing display started");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(()).await;
    display.await?;
    Ok(())
}
