use std::fmt;

use chrono::{DateTime, Duration, Utc};
use quote_core::model::{
    AnalysisResult, BatchId, CertificationType, CertificationTypeId, Complexity, EntryMethod,
    Money, ProcessingStatus, SubDocument,
};
use storage::repository::AnalysisRepository;
use storage::sqlite::SqliteRepository;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    batch_id: BatchId,
    files: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidBatchId { raw: String },
    InvalidFiles { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidBatchId { raw } => write!(f, "invalid --batch-id value: {raw}"),
            ArgsError::InvalidFiles { raw } => write!(f, "invalid --files value: {raw}"),
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
        let mut db_url =
            std::env::var("QUOTE_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut batch_id = None;
        let mut files = 4_u32;
        let mut now = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => db_url = require_value(&mut args, "--db")?,
                "--batch-id" => {
                    let raw = require_value(&mut args, "--batch-id")?;
                    batch_id = Some(
                        raw.parse::<BatchId>()
                            .map_err(|_| ArgsError::InvalidBatchId { raw })?,
                    );
                }
                "--files" => {
                    let raw = require_value(&mut args, "--files")?;
                    files = raw
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidFiles { raw })?;
                }
                "--now" => {
                    let raw = require_value(&mut args, "--now")?;
                    now = Some(
                        DateTime::parse_from_rfc3339(&raw)
                            .map_err(|_| ArgsError::InvalidNow { raw })?
                            .with_timezone(&Utc),
                    );
                }
                "-h" | "--help" => {
                    print_usage();
                    std::process::exit(0);
                }
                other => return Err(ArgsError::UnknownArg(other.to_string())),
            }
        }

        Ok(Self {
            db_url,
            batch_id: batch_id.unwrap_or_else(BatchId::generate),
            files,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Seed a development database with billing settings, certification");
    eprintln!("types, and a demo batch of analysis results.");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>     SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --batch-id <uuid>     Batch id to seed (default: random)");
    eprintln!("  --files <n>           Number of demo files (default: 4)");
    eprintln!("  --now <rfc3339>       Fixed current time for deterministic seeding");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Environment (same as flags): QUOTE_DB_URL");
}

const DEMO_FILES: [(&str, u32, Complexity, &str); 4] = [
    ("birth-certificate.pdf", 180, Complexity::Easy, "es"),
    ("marriage-certificate.pdf", 450, Complexity::Medium, "es"),
    ("court-judgment.pdf", 2_250, Complexity::Hard, "de"),
    ("diploma.pdf", 320, Complexity::Medium, "ja"),
];

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let repo = SqliteRepository::connect(&args.db_url).await?;
    repo.migrate().await?;
    let now = args.now.unwrap_or_else(Utc::now);

    // Settings and certification types are externally-owned reference data,
    // so the repository traits are read-only; the seeder writes them with
    // plain SQL against the same schema.
    let settings = [
        ("base_rate_cents", "6500"),
        ("words_per_page", "225"),
        ("complexity_multiplier_easy", "100"),
        ("complexity_multiplier_medium", "115"),
        ("complexity_multiplier_hard", "125"),
        ("min_billable_page_tenths", "5"),
        ("language_multiplier_ja", "140"),
    ];
    for (key, value) in settings {
        sqlx::query(
            "INSERT INTO app_settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(repo.pool())
        .await?;
    }

    let certifications = [
        CertificationType {
            id: CertificationTypeId::generate(),
            name: "Notarization".to_string(),
            code: "notarization".to_string(),
            unit_price: Money::from_cents(3_000),
            active: true,
            sort_order: 0,
        },
        CertificationType {
            id: CertificationTypeId::generate(),
            name: "Apostille".to_string(),
            code: "apostille".to_string(),
            unit_price: Money::from_cents(5_000),
            active: true,
            sort_order: 1,
        },
        CertificationType {
            id: CertificationTypeId::generate(),
            name: "Sworn Statement".to_string(),
            code: "sworn".to_string(),
            unit_price: Money::from_cents(4_500),
            active: true,
            sort_order: 2,
        },
    ];
    for cert in &certifications {
        sqlx::query(
            "INSERT INTO certification_types
                 (id, name, code, unit_price_cents, active, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(code) DO UPDATE SET
                 name = excluded.name,
                 unit_price_cents = excluded.unit_price_cents,
                 active = excluded.active,
                 sort_order = excluded.sort_order",
        )
        .bind(cert.id.value().to_string())
        .bind(cert.name.clone())
        .bind(cert.code.clone())
        .bind(cert.unit_price.cents())
        .bind(cert.active)
        .bind(i64::from(cert.sort_order))
        .execute(repo.pool())
        .await?;
    }

    for i in 0..args.files {
        let idx = (i as usize) % DEMO_FILES.len();
        let (file_name, word_count, complexity, language) = DEMO_FILES[idx];
        let mut result =
            AnalysisResult::manual(args.batch_id, file_name, now + Duration::seconds(i64::from(i)));
        result.word_count = word_count;
        result.page_count = word_count.div_ceil(300).max(1);
        result.complexity = complexity;
        result.document_type = Some("certificate".to_string());
        result.processing_status = ProcessingStatus::Completed;
        result.entry_method = EntryMethod::Ocr;
        result.sub_documents = vec![SubDocument {
            doc_type: Some("certificate".to_string()),
            holder_name: None,
            page_range: None,
            language: Some(language.to_string()),
        }];
        repo.insert(&result).await?;
    }

    println!(
        "Seeded batch {} with {} analysis results into {}",
        args.batch_id, args.files, args.db_url
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
