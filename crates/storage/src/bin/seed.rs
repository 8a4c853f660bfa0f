use std::fmt;

use assess_core::Clock;
use assess_core::model::{OptionId, Question, QuestionId, QuestionOption, QuestionType, TestId};
use chrono::{DateTime, Utc};
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    test_id: TestId,
    test_name: String,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidTestId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidTestId { raw } => write!(f, "invalid --test-id value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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
        let mut db_url = std::env::var("ASSESS_DB_URL")
            .unwrap_or_else(|_| "sqlite://assess.sqlite3?mode=rwc".into());
        let mut test_id = std::env::var("ASSESS_TEST_ID")
            .ok()
            .and_then(|value| value.parse::<TestId>().ok())
            .unwrap_or(TestId::new(1));
        let mut test_name =
            std::env::var("ASSESS_TEST_NAME").unwrap_or_else(|_| "Personality sampler".into());
        let mut now: Option<DateTime<Utc>> = None;

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
                "--test-id" => {
                    let value = require_value(&mut args, "--test-id")?;
                    test_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidTestId { raw: value.clone() })?;
                }
                "--test-name" => {
                    test_name = require_value(&mut args, "--test-name")?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
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
            test_id,
            test_name,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://assess.sqlite3?mode=rwc)");
    eprintln!("  --test-id <id>            Test id to upsert (default: 1)");
    eprintln!("  --test-name <name>        Test name (default: Personality sampler)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  ASSESS_DB_URL, ASSESS_TEST_ID, ASSESS_TEST_NAME");
}

fn options(base: u64, labels: &[&str]) -> Vec<QuestionOption> {
    labels
        .iter()
        .zip(1..)
        .map(|(label, offset)| QuestionOption::new(OptionId::new(base + offset), *label))
        .collect()
}

/// One question of every supported type, in code order.
fn sample_questions() -> Result<Vec<Question>, Box<dyn std::error::Error>> {
    let mut questions = vec![
        Question::new(
            QuestionId::new(1),
            QuestionType::SingleChoice,
            "How do you usually recharge?",
            options(100, &["Alone", "With friends", "Outdoors"]),
        )?,
        Question::new(
            QuestionId::new(2),
            QuestionType::MultiChoice,
            "Which of these describe you?",
            options(200, &["Curious", "Organised", "Calm", "Bold"]),
        )?
        .with_max_select(2),
        Question::new(
            QuestionId::new(3),
            QuestionType::Slider,
            "How much do you enjoy planning ahead?",
            options(300, &["Scale"]),
        )?,
        Question::new(
            QuestionId::new(4),
            QuestionType::Ranking,
            "Rank what matters most at work.",
            options(400, &["Pay", "Growth", "Team", "Flexibility"]),
        )?,
        Question::new(
            QuestionId::new(5),
            QuestionType::SingleEmotion,
            "How did this week feel?",
            options(500, &["Happy", "Tired", "Anxious"]),
        )?,
        Question::new(
            QuestionId::new(6),
            QuestionType::Emotion,
            "Which face matches a crowded room?",
            options(600, &["Excited", "Neutral", "Overwhelmed"]),
        )?,
        Question::new(
            QuestionId::new(7),
            QuestionType::Percentage,
            "Split your free time.",
            options(700, &["Rest", "Social", "Hobbies"]),
        )?,
        Question::new(
            QuestionId::new(8),
            QuestionType::Color,
            "Pick up to two colours you like.",
            options(800, &["Palette"]),
        )?,
        Question::new(
            QuestionId::new(9),
            QuestionType::ImageChoice,
            "Choose a place to live.",
            options(900, &["Coast", "Mountains", "City"]),
        )?,
        Question::new(
            QuestionId::new(10),
            QuestionType::ImageCaptionChoice,
            "Which caption fits the picture?",
            options(1000, &["A fresh start", "A long road"]),
        )?,
    ];
    for question in &mut questions {
        if matches!(
            question.question_type,
            QuestionType::ImageChoice | QuestionType::ImageCaptionChoice
        ) {
            for option in &mut question.options {
                option.image = Some(format!("images/{}.png", option.id));
            }
        }
    }
    Ok(questions)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = args.now.map_or_else(Clock::default_clock, Clock::fixed);
    let repo = SqliteRepository::connect(&args.db_url).await?.with_clock(clock);
    repo.migrate().await?;

    let questions = sample_questions()?;
    repo.upsert_test(args.test_id, &args.test_name, &questions)
        .await?;

    println!(
        "Seeded test {} ({}) with {} questions into {}",
        args.test_id,
        args.test_name,
        questions.len(),
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
