use std::fmt;
use std::time::Duration;

use lms_core::model::{CourseId, UserId, VideoId};
use services::{AppServices, Clock, TrackerConfig, TrackerEvent, WatchContext};
use storage::repository::{CourseRepository, ViewingSessionRepository};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    InvalidDuration { raw: String },
    InvalidPositions { raw: String },
    InvalidStep { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration value: {raw}"),
            ArgsError::InvalidPositions { raw } => {
                write!(f, "invalid --positions value (expected a,b,c seconds): {raw}")
            }
            ArgsError::InvalidStep { raw } => write!(f, "invalid --step-ms value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(flag: &'static str, raw: String) -> Result<u64, ArgsError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

/// One simulated page view: samples are fed at `step` intervals, then the
/// page is optionally hidden and the player torn down.
struct Args {
    db_url: String,
    user_id: UserId,
    video_id: VideoId,
    course_id: Option<CourseId>,
    duration_seconds: Option<f64>,
    positions: Vec<f64>,
    step: Duration,
    hide: bool,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- track --video <id> --positions <a,b,c> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>       SQLite URL (default: sqlite://dev.sqlite3)");
    eprintln!("  --user <id>             Learner id (default: 1)");
    eprintln!("  --video <id>            Video id, looked up in the catalog");
    eprintln!("  --course <id>           Course id (default: the video's course)");
    eprintln!("  --duration <seconds>    Video duration (default: the video's duration)");
    eprintln!("  --positions <a,b,c>     Player positions in seconds, in playback order");
    eprintln!("  --step-ms <ms>          Delay between samples (default: 250)");
    eprintln!("  --hide                  Hide the page after the last sample");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_USER_ID, LEARN_TRACKER_*, RUST_LOG");
    eprintln!("  LEARN_BEACON_URL        External endpoint for page-hide/unload beacons.");
    eprintln!("                          Unset: beacons are written to --db directly.");
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);
        let mut user_id = std::env::var("LEARN_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| UserId::new(1), UserId::new);
        let mut video_id = None;
        let mut course_id = None;
        let mut duration_seconds = None;
        let mut positions = Vec::new();
        let mut step = Duration::from_millis(250);
        let mut hide = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    user_id = UserId::new(parse_id("--user", require_value(args, "--user")?)?);
                }
                "--video" => {
                    video_id = Some(VideoId::new(parse_id(
                        "--video",
                        require_value(args, "--video")?,
                    )?));
                }
                "--course" => {
                    course_id = Some(CourseId::new(parse_id(
                        "--course",
                        require_value(args, "--course")?,
                    )?));
                }
                "--duration" => {
                    let value = require_value(args, "--duration")?;
                    let parsed = value
                        .parse::<f64>()
                        .ok()
                        .filter(|d| d.is_finite() && *d > 0.0)
                        .ok_or_else(|| ArgsError::InvalidDuration { raw: value.clone() })?;
                    duration_seconds = Some(parsed);
                }
                "--positions" => {
                    let value = require_value(args, "--positions")?;
                    positions = value
                        .split(',')
                        .map(|p| p.trim().parse::<f64>())
                        .collect::<Result<Vec<_>, _>>()
                        .map_err(|_| ArgsError::InvalidPositions { raw: value.clone() })?;
                }
                "--step-ms" => {
                    let value = require_value(args, "--step-ms")?;
                    let ms = value
                        .parse::<u64>()
                        .map_err(|_| ArgsError::InvalidStep { raw: value.clone() })?;
                    step = Duration::from_millis(ms);
                }
                "--hide" => hide = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let video_id = video_id.ok_or(ArgsError::MissingValue { flag: "--video" })?;
        if positions.is_empty() {
            return Err(ArgsError::MissingValue {
                flag: "--positions",
            });
        }

        Ok(Self {
            db_url,
            user_id,
            video_id,
            course_id,
            duration_seconds,
            positions,
            step,
            hide,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

async fn track(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    prepare_sqlite_file(&args.db_url)?;
    let config = TrackerConfig::from_env()?;
    let services = AppServices::new_sqlite(&args.db_url, Clock::system(), config).await?;

    let video = services.storage().courses.get_video(args.video_id).await?;
    let course_id = args
        .course_id
        .or_else(|| video.as_ref().map(|v| v.course_id()))
        .ok_or_else(|| format!("video {} is not in the catalog; pass --course", args.video_id))?;
    let duration = args
        .duration_seconds
        .or_else(|| video.as_ref().map(|v| v.duration_seconds()))
        .ok_or_else(|| format!("video {} has no known duration; pass --duration", args.video_id))?;

    let context = WatchContext {
        user_id: args.user_id,
        video_id: args.video_id,
        course_id,
    };
    let (tracker, opened) = services.open_tracker(context).await?;
    let mut events = tracker.subscribe();
    println!(
        "session {} opened ({opened:?}); resume at {}s",
        opened.session_id(),
        opened.resume_position()
    );

    tracker.on_play_started().await;
    for position in &args.positions {
        let decision = tracker.record_progress(*position, duration);
        info!(position, ?decision, "sample");
        tokio::time::sleep(args.step).await;
    }

    if args.hide {
        let outcome = tracker.on_page_hidden();
        info!(?outcome, "page hidden");
    }
    let outcome = tracker.teardown().await;
    println!("teardown: {outcome:?}");

    // Let a scheduled course check finish before exiting.
    let grace = services.tracker_deps().config.completion_check_delay + Duration::from_millis(500);
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        match tokio::time::timeout_at(deadline, events.recv()).await {
            Ok(Ok(TrackerEvent::CourseCompleted(completion))) => {
                println!(
                    "course {} completed; certificate {}",
                    completion.course_id(),
                    completion.certificate_code()
                );
                break;
            }
            Ok(Ok(event)) => info!(?event, "tracker event"),
            Ok(Err(err)) => {
                warn!(error = %err, "event stream ended");
                break;
            }
            Err(_) => break,
        }
    }

    if let Some(session) = services
        .storage()
        .sessions
        .get_session(opened.session_id())
        .await?
    {
        println!(
            "stored: status={} position={}s progress={:.2}% watched={}s",
            session.status(),
            session.current_position_seconds(),
            session.progress_percent(),
            session.total_watched_seconds()
        );
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1).peekable();
    let first = argv.peek().cloned();
    match first.as_deref() {
        None | Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some("track") => {
            argv.next();
        }
        Some(first) if first.starts_with("--") => {}
        Some(first) => {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            return Err(ArgsError::UnknownArg(first.to_owned()).into());
        }
    }

    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    track(args).await
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
