use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use aivi_studio::api::{BackendClient, ProfileUpdate, Recommendation, RegisterResult};
use aivi_studio::config::{AppConfig, CliConfig, FileConfig};
use aivi_studio::error::AiviError;
use aivi_studio::generation::{PollerSettings, ProgressHandle};
use aivi_studio::media_cache::{CacheFirstLoader, MediaCacheStore, MediaSource, SqliteMediaCacheStore};
use aivi_studio::state::SqliteStateStore;
use aivi_studio::studio::StudioSession;

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[command(
    name = "aivi",
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH")),
    about = "Mood-driven music discovery from the terminal"
)]
struct CliArgs {
    /// Base URL of the Aivi backend.
    #[clap(long, default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Directory for the local databases (state and media cache).
    #[clap(long, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Path to a TOML config file; its values override CLI flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Request timeout in seconds.
    #[clap(long, default_value_t = 30)]
    pub timeout_sec: u64,

    /// Language for analysis and recommendation responses.
    #[clap(long)]
    pub language: Option<String>,

    /// Seconds between generation status polls.
    #[clap(long)]
    pub poll_interval_sec: Option<u64>,

    /// Minutes to wait for a generation job before giving up.
    #[clap(long)]
    pub max_poll_minutes: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Register {
        email: String,
        username: String,
        password: String,
    },

    /// Confirm the emailed verification code.
    VerifyEmail { email: String, code: String },

    /// Ask for a fresh verification code.
    ResendVerification { email: String },

    /// Sign in and store the session locally.
    Login { email: String, password: String },

    /// Drop the stored session.
    Logout,

    /// Show the signed-in profile, including today's remaining analyses.
    Profile {
        /// Set a new display name.
        #[clap(long)]
        name: Option<String>,
        /// Set a new avatar URL.
        #[clap(long)]
        avatar_url: Option<String>,
    },

    /// Upload a photo or video for mood analysis.
    Analyze {
        #[clap(value_parser = parse_path)]
        file: PathBuf,
    },

    /// Fetch mood-matched recommendations for the last analysis.
    Recommend {
        /// Which list to print: "personal", "global", or "all".
        #[clap(long, default_value = "all")]
        tab: String,
    },

    /// Generate an AI beat from the last analysis.
    Generate,

    /// Search the video catalog.
    Search {
        query: String,
        #[clap(long, default_value_t = 5)]
        max_results: usize,
    },

    /// Download a track's audio, cache-first.
    Audio {
        video_id: String,
        /// Output file; defaults to the video id plus the sniffed extension.
        #[clap(short, long, value_parser = parse_path)]
        output: Option<PathBuf>,
    },

    /// Manage saved songs.
    Favorites {
        #[command(subcommand)]
        action: FavoritesAction,
    },

    /// Inspect or clear the local media cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Clear the session's working state, keeping the login.
    Reset,
}

#[derive(Subcommand, Debug)]
enum FavoritesAction {
    /// List saved songs, newest first.
    List,

    /// Save a recommendation from the last fetch, by its printed index.
    Add {
        index: usize,
        /// Which recommendation list the index refers to.
        #[clap(long, default_value = "personal")]
        tab: String,
    },

    /// Remove a saved song by its video id.
    Remove { video_id: String },
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show entry count and total size.
    Stats,

    /// Delete every cached blob.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };

    let data_dir = cli_args.data_dir.clone().or_else(default_data_dir);
    let cli_config = CliConfig {
        backend_url: Some(cli_args.backend_url.clone()),
        data_dir,
        timeout_sec: cli_args.timeout_sec,
        language: cli_args.language.clone(),
        poll_interval_sec: cli_args.poll_interval_sec,
        max_poll_minutes: cli_args.max_poll_minutes,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    let client = BackendClient::new(&config.backend_url, config.timeout_sec)?;
    let state_store = Arc::new(SqliteStateStore::new(&config.state_db_path())?);
    let session = StudioSession::new(
        client.clone(),
        state_store,
        config.language.clone(),
        PollerSettings {
            poll_interval: config.generation.poll_interval,
            max_duration: config.generation.max_poll_duration,
        },
    );

    match cli_args.command {
        Command::Register {
            email,
            username,
            password,
        } => match client.register(&email, &username, &password).await? {
            RegisterResult::VerificationRequired(outcome) => {
                println!("{}", outcome.message);
                println!("Run `aivi verify-email {} <code>` once it arrives.", email);
            }
            RegisterResult::LoggedIn(token) => {
                session.store_session(&token)?;
                println!("Registered and signed in as {}.", token.user.username);
            }
        },

        Command::VerifyEmail { email, code } => {
            let token = client.verify_email(&email, &code).await?;
            session.store_session(&token)?;
            println!("Email verified, signed in as {}.", token.user.username);
        }

        Command::ResendVerification { email } => {
            client.resend_verification(&email).await?;
            println!("Verification code sent to {}.", email);
        }

        Command::Login { email, password } => {
            let token = session.login(&email, &password).await?;
            println!("Signed in as {}.", token.user.username);
        }

        Command::Logout => {
            session.logout()?;
            println!("Signed out.");
        }

        Command::Profile { name, avatar_url } => {
            let profile = if name.is_some() || avatar_url.is_some() {
                let token = session
                    .session()?
                    .ok_or(AiviError::AuthRequired)?
                    .access_token;
                client
                    .update_profile(&token, &ProfileUpdate { name, avatar_url })
                    .await?
            } else {
                session.profile().await?
            };
            println!("{} <{}>", profile.username, profile.email);
            if let Some(name) = &profile.name {
                println!("Name:      {}", name);
            }
            println!("Account:   {}", profile.account_type);
            if profile.remaining_analyses < 0 {
                println!("Analyses:  unlimited");
            } else {
                println!("Analyses:  {} left today", profile.remaining_analyses);
            }
        }

        Command::Analyze { file } => {
            let analysis = session.analyze(&file).await?;
            println!("Mood:   {}", analysis.mood);
            println!("\n{}", analysis.description);
            if !analysis.emotions.is_empty() {
                println!("\nEmotions: {}", analysis.emotions.join(", "));
            }
            if !analysis.genres.is_empty() {
                println!("Genres:   {}", analysis.genres.join(", "));
            }
            println!(
                "\nenergy {:.2}  valence {:.2}  danceability {:.2}  tempo {:.2}",
                analysis.energy_level, analysis.valence, analysis.danceability, analysis.tempo
            );
        }

        Command::Recommend { tab } => {
            // Reject a bad tab before touching the network.
            if !valid_tab(&tab) {
                anyhow::bail!("Unknown tab {:?}, expected \"personal\", \"global\" or \"all\"", tab);
            }
            let bundle = session.recommendations().await?;
            if tab == "personal" || tab == "all" {
                println!("For you:");
                print_recommendations(&bundle.personal.recommended_tracks);
                if !bundle.personal.explanation.is_empty() {
                    println!("  ({})", bundle.personal.explanation);
                }
            }
            if tab == "global" || tab == "all" {
                println!("\nTrending worldwide:");
                print_recommendations(&bundle.global.recommended_tracks);
            }
        }

        Command::Generate => {
            let audio_url = run_generation(&session).await?;
            println!("Beat ready: {}", audio_url);
        }

        Command::Search { query, max_results } => {
            let response = client.youtube_search(&query, max_results).await?;
            if let Some(error) = response.error {
                return Err(AiviError::Server(error).into());
            }
            for result in response.results {
                println!("{}  {} ({})", result.video_id, result.title, result.channel);
            }
        }

        Command::Audio { video_id, output } => {
            let cache = Arc::new(SqliteMediaCacheStore::new(&config.cache_db_path())?);
            let loader = CacheFirstLoader::new(cache, client.http());
            let media = loader.load(&client.youtube_audio_url(&video_id)).await?;

            let path = output
                .unwrap_or_else(|| PathBuf::from(format!("{}.{}", video_id, media.extension())));
            tokio::fs::write(&path, &media.data)
                .await
                .with_context(|| format!("Failed to write {:?}", path))?;
            let source = match media.source {
                MediaSource::Cache => "cache",
                MediaSource::Network => "network",
            };
            println!("Wrote {} bytes to {:?} (from {})", media.data.len(), path, source);
        }

        Command::Favorites { action } => match action {
            FavoritesAction::List => {
                for song in session.favorites().await? {
                    let artist = song.artist.as_deref().unwrap_or("?");
                    println!("{}  {} - {}", song.youtube_video_id, song.title, artist);
                }
            }
            FavoritesAction::Add { index, tab } => {
                let recommendation = pick_recommendation(&session, index, &tab)?;
                match session.like(&recommendation).await {
                    Ok(song) => println!("Saved {} ({})", song.title, song.youtube_video_id),
                    Err(AiviError::AlreadySaved) => {
                        println!("{} is already in your favorites.", recommendation.name)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            FavoritesAction::Remove { video_id } => {
                session.unlike(&video_id).await?;
                println!("Removed {}.", video_id);
            }
        },

        Command::Cache { action } => {
            let cache = SqliteMediaCacheStore::new(&config.cache_db_path())?;
            match action {
                CacheAction::Stats => {
                    let stats = cache.stats()?;
                    println!("{} entries, {} bytes", stats.entries, stats.total_bytes);
                }
                CacheAction::Clear => {
                    cache.clear()?;
                    println!("Cache cleared.");
                }
            }
        }

        Command::Reset => {
            session.reset()?;
            println!("Session state cleared.");
        }
    }

    Ok(())
}

/// Default data directory under the user's home, when none is given.
fn default_data_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".aivi"))
}

fn valid_tab(tab: &str) -> bool {
    matches!(tab, "personal" | "global" | "all")
}

fn print_recommendations(tracks: &[Recommendation]) {
    for (i, track) in tracks.iter().enumerate() {
        println!("{:>3}. {} - {}", i + 1, track.name, track.artist);
        if !track.reason.is_empty() {
            println!("     {}", track.reason);
        }
    }
}

/// Look up a recommendation from the persisted bundle by 1-based index.
fn pick_recommendation(
    session: &StudioSession,
    index: usize,
    tab: &str,
) -> Result<Recommendation> {
    let state = session.state()?;
    let bundle = state
        .recommendations
        .context("No recommendations yet, run `aivi recommend` first")?;
    let set = match tab {
        "personal" => bundle.personal,
        "global" => bundle.global,
        other => anyhow::bail!("Unknown tab {:?}, expected \"personal\" or \"global\"", other),
    };
    set.recommended_tracks
        .into_iter()
        .nth(index.saturating_sub(1))
        .with_context(|| format!("No recommendation at index {}", index))
}

/// Run the generation flow with a progress bar and Ctrl-C cancellation.
async fn run_generation(session: &StudioSession) -> Result<String> {
    let cancel = CancellationToken::new();
    let progress = ProgressHandle::new();

    let ctrlc_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("cancellation requested");
            ctrlc_cancel.cancel();
        }
    });

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let render_progress = progress.clone();
    let render_cancel = cancel.child_token();
    let render_bar = bar.clone();
    let renderer = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = render_progress.snapshot();
                    render_bar.set_position(snapshot.percent as u64);
                    render_bar.set_message(snapshot.message.to_string());
                }
                _ = render_cancel.cancelled() => break,
            }
        }
    });

    let result = session.generate_beat(&cancel, &progress).await;
    cancel.cancel();
    let _ = renderer.await;

    match &result {
        Ok(_) => bar.finish_with_message("done"),
        Err(_) => bar.abandon(),
    }
    info!("generation finished");
    Ok(result?)
}
