use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use prettytable::{Cell, Row, Table};
use serde::Deserialize;

fn api_url() -> String {
    std::env::var("EXAMPREP_API").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[derive(Parser)]
#[command(name = "examprep")]
#[command(about = "A CLI for browsing the exam-prep service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List every generated test")]
    Tests,

    #[command(about = "Show one generated test by code")]
    Test {
        #[arg(short, long, help = "Test code, e.g. AB12CD34")]
        code: String,
    },

    #[command(about = "List referral offers")]
    Offers {
        #[arg(long, help = "Only offers live right now")]
        active: bool,
    },

    #[command(about = "Show today's practice questions for a lesson")]
    Practice {
        #[arg(short, long, help = "Subject name")]
        subject: String,

        #[arg(short, long, help = "Lesson name")]
        lesson: String,
    },

    #[command(about = "Check that the service is up")]
    Health,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestSummary {
    code: String,
    test_type: Option<String>,
    subject: Option<String>,
    lesson: Option<String>,
    stream: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Offer {
    code: String,
    title: String,
    bonus_days: i64,
    discount_percent: u8,
    active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PracticeQuestion {
    id: String,
    options: Vec<String>,
    correct_option: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tests => list_tests().await,
        Commands::Test { code } => show_test(code).await,
        Commands::Offers { active } => list_offers(active).await,
        Commands::Practice { subject, lesson } => daily_practice(subject, lesson).await,
        Commands::Health => health().await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn fetch<T: serde::de::DeserializeOwned>(
    path: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}{}", api_url(), path))
        .send()
        .await?;

    let envelope: Envelope<T> = response.json().await?;
    if !envelope.success {
        let message = envelope
            .message
            .unwrap_or_else(|| "Request failed".to_string());
        return Err(message.into());
    }
    envelope.data.ok_or_else(|| "Empty response".into())
}

async fn list_tests() -> Result<(), Box<dyn std::error::Error>> {
    let tests: Vec<TestSummary> = fetch("/tests").await?;

    if tests.is_empty() {
        println!("📭 No generated tests found.");
        return Ok(());
    }

    println!("\n📋 Generated Tests ({})\n", tests.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Code"),
        Cell::new("Type"),
        Cell::new("Scope"),
        Cell::new("Created"),
    ]));

    for test in tests {
        let scope = match test.test_type.as_deref() {
            Some("full_length") => test.stream.unwrap_or_else(|| "-".to_string()),
            _ => format!(
                "{} / {}",
                test.subject.unwrap_or_else(|| "-".to_string()),
                test.lesson.unwrap_or_else(|| "-".to_string())
            ),
        };
        let local_time = test.created_at.with_timezone(&Local);

        table.add_row(Row::new(vec![
            Cell::new(&test.code),
            Cell::new(test.test_type.as_deref().unwrap_or("-")),
            Cell::new(&scope),
            Cell::new(&local_time.format("%Y-%m-%d %H:%M").to_string()),
        ]));
    }

    table.printstd();
    println!();

    Ok(())
}

async fn show_test(code: String) -> Result<(), Box<dyn std::error::Error>> {
    let test: serde_json::Value = fetch(&format!("/tests/{}", code)).await?;
    println!("{}", serde_json::to_string_pretty(&test)?);
    Ok(())
}

async fn list_offers(active: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = if active { "/offers/active" } else { "/offers" };
    let offers: Vec<Offer> = fetch(path).await?;

    if offers.is_empty() {
        println!("📭 No offers found.");
        return Ok(());
    }

    println!("\n🎁 Referral Offers ({})\n", offers.len());

    let mut table = Table::new();
    table.add_row(Row::new(vec![
        Cell::new("Code"),
        Cell::new("Title"),
        Cell::new("Bonus Days"),
        Cell::new("Discount"),
        Cell::new("Active"),
    ]));

    for offer in offers {
        table.add_row(Row::new(vec![
            Cell::new(&offer.code),
            Cell::new(&offer.title),
            Cell::new(&offer.bonus_days.to_string()),
            Cell::new(&format!("{}%", offer.discount_percent)),
            Cell::new(if offer.active { "yes" } else { "no" }),
        ]));
    }

    table.printstd();
    println!();

    Ok(())
}

async fn daily_practice(
    subject: String,
    lesson: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions: Vec<PracticeQuestion> = fetch(&format!(
        "/practice/daily?subject={}&lesson={}",
        subject, lesson
    ))
    .await?;

    if questions.is_empty() {
        println!("📭 No practice questions for {} / {}.", subject, lesson);
        return Ok(());
    }

    println!(
        "\n📚 Daily practice for {} / {} ({} questions)\n",
        subject,
        lesson,
        questions.len()
    );
    for question in &questions {
        println!(
            "   {} ({} options, answer #{})",
            question.id,
            question.options.len(),
            question.correct_option + 1
        );
    }
    println!();

    Ok(())
}

async fn health() -> Result<(), Box<dyn std::error::Error>> {
    let status: String = fetch("/health").await?;
    println!("✅ Service is {}", status);
    Ok(())
}
