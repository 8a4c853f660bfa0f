use std::fmt;

use assess_core::model::TestId;
use services::{AssessmentLoopService, Clock, SessionConfig};
use storage::repository::{ResumeTokenRepository, Storage};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidTestId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTestId { raw } => write!(f, "invalid --test-id value: {raw}"),
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

#[derive(Debug)]
struct Args {
    db_url: String,
    test_id: TestId,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  assess status [--db <sqlite_url>] [--test-id <id>]");
    eprintln!("  assess reset  [--db <sqlite_url>] [--test-id <id>]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  status   Show the locally tracked attempt for a test");
    eprintln!("  reset    Forget the tracked attempt so the next start opens a new one");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://assess.sqlite3");
    eprintln!("  --test-id 1");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  ASSESS_DB_URL, ASSESS_TEST_ID, ASSESS_ERROR_NOTICE_MS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Status,
    Reset,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "status" => Some(Self::Status),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("ASSESS_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://assess.sqlite3".into(), normalize_sqlite_url);
        let mut test_id = std::env::var("ASSESS_TEST_ID")
            .ok()
            .and_then(|value| value.parse::<TestId>().ok())
            .unwrap_or(TestId::new(1));

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--test-id" => {
                    let value = require_value(args, "--test-id")?;
                    test_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidTestId { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, test_id })
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

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn render_bar(segments: &[bool]) -> String {
    segments.iter().map(|lit| if *lit { '#' } else { '-' }).collect()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
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

    // Open + migrate SQLite at startup; the file is created on first use.
    prepare_sqlite_file(&parsed.db_url)?;
    let storage = Storage::sqlite(&parsed.db_url).await?;
    tracing::debug!(db = %parsed.db_url, test_id = %parsed.test_id, ?cmd, "storage ready");

    match cmd {
        Command::Status => {
            let Some(attempt_id) = storage.resume_tokens.get_token(parsed.test_id).await? else {
                println!("test {}: no attempt in progress", parsed.test_id);
                return Ok(());
            };

            let loop_svc = AssessmentLoopService::from_storage(Clock::default_clock(), &storage)
                .with_config(SessionConfig::from_env());
            let session = loop_svc.resume_session(parsed.test_id, attempt_id).await?;
            let progress = session.progress();
            let bar = session.progress_bar();

            println!("test {}: attempt {}", parsed.test_id, attempt_id);
            println!(
                "  question {}/{}  answered {}  remaining {}",
                progress.position + 1,
                progress.total,
                progress.answered,
                progress.remaining
            );
            println!("  [{}]", render_bar(&bar.segments));
            if progress.is_complete {
                println!("  all questions answered; ready to submit");
            }
            Ok(())
        }
        Command::Reset => {
            storage.resume_tokens.clear_token(parsed.test_id).await?;
            println!("test {}: tracked attempt cleared", parsed.test_id);
            Ok(())
        }
    }
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

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_by_name() {
        assert_eq!(Command::from_arg("status"), Some(Command::Status));
        assert_eq!(Command::from_arg("reset"), Some(Command::Reset));
        assert_eq!(Command::from_arg("ui"), None);
    }

    #[test]
    fn flags_override_defaults() {
        let mut args = ["--db", "sqlite://tmp/a.sqlite3", "--test-id", "7"]
            .into_iter()
            .map(String::from);
        let parsed = Args::parse(&mut args).unwrap();
        assert_eq!(parsed.db_url, "sqlite://tmp/a.sqlite3");
        assert_eq!(parsed.test_id, TestId::new(7));
    }

    #[test]
    fn bad_flags_are_reported() {
        let mut args = ["--test-id", "seven"].into_iter().map(String::from);
        assert!(matches!(
            Args::parse(&mut args),
            Err(ArgsError::InvalidTestId { .. })
        ));
        let mut args = ["--db"].into_iter().map(String::from);
        assert!(matches!(
            Args::parse(&mut args),
            Err(ArgsError::MissingValue { flag: "--db" })
        ));
    }

    #[test]
    fn relative_paths_become_absolute_urls() {
        let url = normalize_sqlite_url("sqlite:data/assess.sqlite3".into());
        assert!(url.starts_with("sqlite:///"));
        assert!(url.ends_with("data/assess.sqlite3"));
        assert_eq!(normalize_sqlite_url("sqlite::memory:".into()), "sqlite::memory:");
    }

    #[test]
    fn progress_bar_renders_lit_segments() {
        assert_eq!(render_bar(&[true, true, false]), "##-");
    }
}
