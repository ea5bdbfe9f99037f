use std::fmt;
use std::path::PathBuf;

use curriculum_core::model::{
    Curriculum, LessonCoordinates, UserId, validate_progress_data,
};
use curriculum_core::settings::{
    AverageAttempts, EngineSettingsDraft, EngineSettingsError, SurveyAnswer,
};
use curriculum_core::time::format_time_spent;
use services::progress::{DEFAULT_FREE_TRIES, find_current_lesson, last_unlocked_level};
use services::{Clock, Entitlement, LearnerContext, LessonUpdate, ProgressService, ProgressView};
use storage::repository::Storage;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidSurvey { raw: String },
    InvalidTarget(curriculum_core::Error),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { flag } => write!(f, "{flag} is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidSurvey { raw } => write!(f, "invalid --survey value: {raw}"),
            ArgsError::InvalidTarget(err) => write!(f, "invalid lesson target: {err}"),
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

fn require_number<T: std::str::FromStr>(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<T, ArgsError> {
    let value = require_value(args, flag)?;
    value
        .trim()
        .parse()
        .map_err(|_| ArgsError::InvalidNumber { flag, raw: value })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- view     [common] [--json]");
    eprintln!("  cargo run -p app -- complete [common] --level <id> --unit <id> --lesson <id>");
    eprintln!("                               [--seconds <n>] [--failed]");
    eprintln!("  cargo run -p app -- validate <progress.json>");
    eprintln!("  cargo run -p app -- import   [--db <sqlite_url>] [--learning-type <name>] <curriculum.json>");
    eprintln!();
    eprintln!("Common options:");
    eprintln!("  --db <sqlite_url>        default sqlite:dev.sqlite3");
    eprintln!("  --user <id>              default 1");
    eprintln!("  --learning-type <name>   default student");
    eprintln!("  --plan                   learner has an active plan");
    eprintln!("  --survey <answer>        unit-1-6 | unit-7-12 | unit-13-17 | unit-18-25");
    eprintln!("  --max-levels <n>         levels next-lesson navigation may cross into");
    eprintln!("  --running-average        report the historical running average of attempts");
    eprintln!("  --free-tries <n>         free tries for a learner without a record (default 3)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  CURRICULUM_DB_URL, CURRICULUM_USER_ID, CURRICULUM_LEARNING_TYPE, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    View,
    Complete,
    Validate,
    Import,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "view" => Some(Self::View),
            "complete" => Some(Self::Complete),
            "validate" => Some(Self::Validate),
            "import" => Some(Self::Import),
            _ => None,
        }
    }
}

//
// ─── ARGS ──────────────────────────────────────────────────────────────────────
//

struct Args {
    db_url: String,
    user: UserId,
    learning_type: String,
    entitlement: Entitlement,
    survey: Option<SurveyAnswer>,
    settings: EngineSettingsDraft,
    free_tries: u32,
    json: bool,
    level: Option<String>,
    unit: Option<String>,
    lesson: Option<String>,
    seconds: u64,
    failed: bool,
    file: Option<PathBuf>,
}

impl Args {
    fn from_env() -> Self {
        Self {
            db_url: std::env::var("CURRICULUM_DB_URL")
                .ok()
                .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url),
            user: std::env::var("CURRICULUM_USER_ID")
                .ok()
                .and_then(|value| value.parse::<u64>().ok())
                .map_or_else(|| UserId::new(1), UserId::new),
            learning_type: std::env::var("CURRICULUM_LEARNING_TYPE")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "student".into()),
            entitlement: Entitlement::trial(),
            survey: None,
            settings: EngineSettingsDraft::new(),
            free_tries: DEFAULT_FREE_TRIES,
            json: false,
            level: None,
            unit: None,
            lesson: None,
            seconds: 0,
            failed: false,
            file: None,
        }
    }

    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut parsed = Self::from_env();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    parsed.db_url = normalize_sqlite_url(value);
                }
                "--user" => parsed.user = UserId::new(require_number(args, "--user")?),
                "--learning-type" => parsed.learning_type = require_value(args, "--learning-type")?,
                "--plan" => parsed.entitlement = Entitlement::active_plan(),
                "--survey" => {
                    let value = require_value(args, "--survey")?;
                    let answer = value
                        .parse::<SurveyAnswer>()
                        .map_err(|_| ArgsError::InvalidSurvey { raw: value.clone() })?;
                    parsed.survey = Some(answer);
                }
                "--max-levels" => {
                    parsed.settings.max_levels = Some(require_number(args, "--max-levels")?);
                }
                "--running-average" => {
                    parsed.settings.average_attempts = Some(AverageAttempts::Running);
                }
                "--free-tries" => parsed.free_tries = require_number(args, "--free-tries")?,
                "--json" => parsed.json = true,
                "--level" => parsed.level = Some(require_value(args, "--level")?),
                "--unit" => parsed.unit = Some(require_value(args, "--unit")?),
                "--lesson" => parsed.lesson = Some(require_value(args, "--lesson")?),
                "--seconds" => parsed.seconds = require_number(args, "--seconds")?,
                "--failed" => parsed.failed = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ if !arg.starts_with("--") && parsed.file.is_none() => {
                    parsed.file = Some(PathBuf::from(arg));
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(parsed)
    }

    fn learner(&self) -> LearnerContext {
        LearnerContext::new(self.learning_type.clone(), self.entitlement).with_survey(self.survey)
    }

    fn target(&self) -> Result<LessonCoordinates, ArgsError> {
        let level = self.level.as_deref().ok_or(ArgsError::MissingFlag { flag: "--level" })?;
        let unit = self.unit.as_deref().ok_or(ArgsError::MissingFlag { flag: "--unit" })?;
        let lesson = self
            .lesson
            .as_deref()
            .ok_or(ArgsError::MissingFlag { flag: "--lesson" })?;
        LessonCoordinates::parse(level, unit, lesson).map_err(ArgsError::InvalidTarget)
    }

    fn service(&self, storage: &Storage) -> Result<ProgressService, EngineSettingsError> {
        let settings = self.settings.clone().validate()?;
        Ok(ProgressService::from_storage(Clock::default_clock(), settings, storage)
            .with_initial_free_tries(self.free_tries))
    }

    fn file(&self) -> Result<&PathBuf, ArgsError> {
        self.file.as_ref().ok_or(ArgsError::MissingFlag { flag: "<file>" })
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
            .unwrap_or_else(|_| PathBuf::from("."))
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

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn open_storage(db_url: &str) -> Result<Storage, Box<dyn std::error::Error>> {
    prepare_sqlite_file(db_url)?;
    let storage = Storage::sqlite(db_url).await?;
    debug!(db_url, "storage ready");
    Ok(storage)
}

async fn view(parsed: Args) -> Result<(), Box<dyn std::error::Error>> {
    let storage = open_storage(&parsed.db_url).await?;
    let service = parsed.service(&storage)?;

    let view = service.load_view(parsed.user, &parsed.learner()).await?;
    if parsed.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_summary(&view);
    }
    Ok(())
}

async fn complete(parsed: Args) -> Result<(), Box<dyn std::error::Error>> {
    let target = parsed.target()?;
    let storage = open_storage(&parsed.db_url).await?;
    let service = parsed.service(&storage)?;

    let update = if parsed.failed {
        LessonUpdate::attempted(parsed.seconds)
    } else {
        LessonUpdate::completed(parsed.seconds)
    };
    let record = service.record_lesson(parsed.user, &target, update).await?;
    println!(
        "recorded {}/{}/{}: free tries left {}",
        target.level_id, target.unit_id, target.lesson_id, record.free_tries
    );

    match service.next_lesson(parsed.user, &parsed.learner(), &target).await? {
        Some(next) => println!("next: {}/{}/{}", next.level_id, next.unit_id, next.lesson_id),
        None => println!("next: nothing left to open"),
    }
    Ok(())
}

fn validate(parsed: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(parsed.file()?)?;
    let document: serde_json::Value = serde_json::from_str(&raw)?;
    let report = validate_progress_data(&document);
    if report.is_valid {
        println!("valid");
    } else {
        for error in &report.errors {
            println!("{error}");
        }
    }
    Ok(report.is_valid)
}

async fn import(parsed: Args) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(parsed.file()?)?;
    let curriculum: Curriculum = serde_json::from_str(&raw)?;
    let storage = open_storage(&parsed.db_url).await?;
    storage
        .curricula
        .upsert_curriculum(&parsed.learning_type, &curriculum)
        .await?;
    info!(
        learning_type = %parsed.learning_type,
        levels = curriculum.levels.len(),
        lessons = curriculum.lesson_count(),
        "imported curriculum"
    );
    Ok(())
}

fn print_summary(view: &ProgressView) {
    for level in &view.levels {
        println!(
            "Level {} {}{} {}/{} ({}%)",
            level.level_id,
            level.title,
            lock_marker(level.locked),
            level.stats.completed_lessons,
            level.stats.total_lessons,
            level.stats.completed_percentage
        );
        for unit in &level.units {
            println!(
                "  Unit {} {}{} {}/{} accuracy {}%",
                unit.unit_id,
                unit.title,
                lock_marker(unit.locked),
                unit.stats.completed_lessons,
                unit.stats.total_lessons,
                unit.stats.accuracy
            );
            for lesson in &unit.lessons {
                let state = match (lesson.complete, lesson.current, lesson.locked) {
                    (true, _, _) => "x",
                    (false, true, _) => ">",
                    (false, false, false) => " ",
                    (false, false, true) => "-",
                };
                println!("    [{state}] {} {}", lesson.id, lesson.title);
            }
        }
    }

    if let Some(current) = last_unlocked_level(&view.levels).and_then(find_current_lesson) {
        println!("Resume at: {}", current.lesson.title);
    }

    let stats = &view.overall_stats;
    println!(
        "Completed {}/{} lessons ({}%), {}/{} units, accuracy {}%, average attempts {:.2}",
        stats.total_completed_lessons,
        stats.total_lessons,
        stats.completion_percentage,
        stats.completed_units,
        stats.total_units,
        stats.accuracy,
        stats.average_attempts
    );
    println!(
        "Time spent: {}  Free tries: {}  Active days: {}",
        format_time_spent(view.total_time_spent),
        view.free_tries,
        view.active_days.len()
    );
}

fn lock_marker(locked: bool) -> &'static str {
    if locked { " (locked)" } else { "" }
}

async fn run() -> Result<bool, Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(false);
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(true);
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    match cmd {
        Command::View => view(parsed).await.map(|()| true),
        Command::Complete => complete(parsed).await.map(|()| true),
        Command::Validate => validate(&parsed),
        Command::Import => import(parsed).await.map(|()| true),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            // At this layer (binary glue), printing once is fine.
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}
