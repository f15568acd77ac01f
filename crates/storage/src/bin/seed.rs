use std::fmt;

use lms_core::model::{CompletionThreshold, Course, CourseId, Video, VideoId};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_id: CourseId,
    title: String,
    videos: u32,
    duration_seconds: f64,
    threshold: CompletionThreshold,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCourseId { raw: String },
    InvalidVideos { raw: String },
    InvalidDuration { raw: String },
    InvalidThreshold { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course-id value: {raw}"),
            ArgsError::InvalidVideos { raw } => write!(f, "invalid --videos value: {raw}"),
            ArgsError::InvalidDuration { raw } => write!(f, "invalid --duration value: {raw}"),
            ArgsError::InvalidThreshold { raw } => {
                write!(f, "invalid --threshold value (expected 1..=100): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LEARN_DB_URL").unwrap_or_else(|_| "sqlite://dev.sqlite3?mode=rwc".into());
        let mut course_id = std::env::var("LEARN_COURSE_ID")
            .ok()
            .and_then(|value| value.parse::<CourseId>().ok())
            .unwrap_or_else(|| CourseId::new(1));
        let mut title =
            std::env::var("LEARN_COURSE_TITLE").unwrap_or_else(|_| "Getting Started".into());
        let mut videos = 3_u32;
        let mut duration_seconds = 600.0_f64;
        let mut threshold = CompletionThreshold::default();

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--course-id" => {
                    let value = require_value(&mut args, "--course-id")?;
                    course_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value.clone() })?;
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--videos" => {
                    let value = require_value(&mut args, "--videos")?;
                    videos = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidVideos { raw: value.clone() })?;
                }
                "--duration" => {
                    let value = require_value(&mut args, "--duration")?;
                    duration_seconds = value
                        .parse::<f64>()
                        .map_err(|_| ArgsError::InvalidDuration { raw: value.clone() })?;
                }
                "--threshold" => {
                    let value = require_value(&mut args, "--threshold")?;
                    threshold = value
                        .parse::<f64>()
                        .ok()
                        .and_then(|v| CompletionThreshold::new(v).ok())
                        .ok_or_else(|| ArgsError::InvalidThreshold { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            course_id,
            title,
            videos,
            duration_seconds,
            threshold,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://dev.sqlite3?mode=rwc)");
    eprintln!("  --course-id <id>          Course id to upsert (default: 1)");
    eprintln!("  --title <text>            Course title (default: Getting Started)");
    eprintln!("  --videos <n>              Number of videos to upsert (default: 3)");
    eprintln!("  --duration <seconds>      Duration of each video (default: 600)");
    eprintln!("  --threshold <percent>     Course completion threshold (default: 98)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_COURSE_ID, LEARN_COURSE_TITLE");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;

    let course = Course::new(args.course_id, args.title.clone(), args.threshold)?;
    storage.courses.upsert_course(&course).await?;

    // Video ids are namespaced by course so reseeding another course does not collide.
    let base = course.id().value() * 1_000;
    for i in 0..args.videos {
        let video = Video::new(
            VideoId::new(base + u64::from(i) + 1),
            course.id(),
            format!("Lesson {}", i + 1),
            args.duration_seconds,
            i,
        )?;
        storage.courses.upsert_video(&video).await?;
    }

    println!(
        "Seeded course {} ({} videos, threshold {}%) into {}",
        course.id(),
        args.videos,
        course.completion_threshold().percent(),
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
