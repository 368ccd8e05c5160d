use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use wayfare_core::forms::{CategoryForm, RegistrationForm, TourForm};
use wayfare_core::responder::DEFAULT_AUTO_REPLY_THRESHOLD;
use wayfare_core::AutoResponder;
use wayfare_desk::{DeskSettings, Mailer, TravelDesk};
use wayfare_observability::{init_tracing, AppMetrics};
use wayfare_storage::Store;

#[derive(Debug, Parser)]
#[command(name = "wayfare")]
#[command(about = "Wayfare operator CLI")]
struct Cli {
    /// SQLite URL; the in-memory store is used when unset.
    #[arg(long, env = "WAYFARE_DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "WAYFARE_AUTO_REPLY_THRESHOLD", default_value_t = DEFAULT_AUTO_REPLY_THRESHOLD)]
    auto_reply_threshold: f32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Creates an administrator, or promotes an existing account.
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "WAYFARE_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "Site")]
        first_name: String,
        #[arg(long, default_value = "Admin")]
        last_name: String,
    },
    /// Loads sample categories and tours into an empty catalogue and installs
    /// the standard reply templates.
    Seed,
    /// Marks confirmed bookings whose tour has ended as completed.
    CompleteDue,
    PurgeSessions,
    /// Runs the auto-responder and stored templates on a message without
    /// storing anything.
    Classify {
        #[arg(long, default_value = "")]
        subject: String,
        #[arg(long, default_value = "Customer")]
        name: String,
        message: String,
    },
    Report {
        #[arg(long, default_value_t = 5)]
        popular: usize,
        /// Print the bookings CSV instead of statistics.
        #[arg(long)]
        csv: bool,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wayfare_cli");
    let cli = Cli::parse();

    let desk = build_desk(cli.database_url.as_deref(), cli.auto_reply_threshold).await?;

    match cli.command {
        Command::CreateAdmin {
            username,
            email,
            password,
            first_name,
            last_name,
        } => {
            let user = desk
                .ensure_admin(RegistrationForm {
                    first_name,
                    last_name,
                    username,
                    email,
                    phone: None,
                    password_confirm: password.clone(),
                    password,
                    terms_accepted: true,
                })
                .await
                .context("failed creating administrator")?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Seed => {
            let created = seed(&desk).await?;
            let templates = desk.install_default_templates().await?;
            println!("seeded {created} tours and {templates} reply templates");
        }
        Command::CompleteDue => {
            let completed = desk.complete_due_bookings().await?;
            println!("completed {completed} bookings");
        }
        Command::PurgeSessions => {
            let purged = desk.purge_sessions().await?;
            println!("purged {purged} expired sessions");
        }
        Command::Classify {
            subject,
            name,
            message,
        } => {
            let decision = desk.preview_reply(&name, &subject, &message).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Report {
            popular,
            csv,
            from,
            to,
        } => {
            if csv {
                print!("{}", desk.bookings_csv(from, to).await?);
            } else {
                let report = serde_json::json!({
                    "statistics": desk.booking_statistics().await?,
                    "popular_tours": desk.popular_tours(popular).await?,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }

    Ok(())
}

async fn build_desk(database_url: Option<&str>, threshold: f32) -> Result<TravelDesk<Store>> {
    let store = match database_url {
        Some(database_url) => Store::sqlite(database_url)
            .await
            .with_context(|| format!("failed opening {database_url}"))?,
        None => {
            tracing::warn!("no database configured; changes will not persist");
            Store::memory()
        }
    };
    Ok(TravelDesk::new(
        Arc::new(store),
        Mailer::Log,
        AutoResponder::new(threshold),
        AppMetrics::shared(),
        DeskSettings::default(),
    ))
}

struct SampleTour {
    category: &'static str,
    title: &'static str,
    destination: &'static str,
    description: &'static str,
    price_cents: i64,
    duration_days: u32,
    max_participants: u32,
    difficulty: &'static str,
    featured: bool,
}

const SAMPLE_CATEGORIES: [(&str, &str); 3] = [
    ("Adventure", "Treks, climbs and paddles for active travellers."),
    ("Cultural", "Cities, food and history with local guides."),
    ("Coast & Islands", "Slow days by the sea."),
];

const SAMPLE_TOURS: [SampleTour; 4] = [
    SampleTour {
        category: "Adventure",
        title: "High Atlas Trek",
        destination: "Imlil, Morocco",
        description: "Four days on mule trails between Berber villages, ending on the Toubkal plateau.",
        price_cents: 64_000,
        duration_days: 4,
        max_participants: 12,
        difficulty: "hard",
        featured: true,
    },
    SampleTour {
        category: "Adventure",
        title: "Fjord Kayak Weekend",
        destination: "Bergen, Norway",
        description: "Two days paddling sheltered fjords with a night in a lakeside cabin.",
        price_cents: 45_000,
        duration_days: 2,
        max_participants: 8,
        difficulty: "medium",
        featured: false,
    },
    SampleTour {
        category: "Cultural",
        title: "Lisbon Food Walk",
        destination: "Lisbon, Portugal",
        description: "A full day through Alfama and Mouraria tasting petiscos and pastries.",
        price_cents: 9_500,
        duration_days: 1,
        max_participants: 15,
        difficulty: "easy",
        featured: true,
    },
    SampleTour {
        category: "Coast & Islands",
        title: "Cyclades Island Hop",
        destination: "Naxos, Greece",
        description: "A week of ferries, beaches and village tavernas across three islands.",
        price_cents: 129_000,
        duration_days: 7,
        max_participants: 16,
        difficulty: "easy",
        featured: true,
    },
];

/// Only touches an empty catalogue, so running it twice is harmless.
async fn seed(desk: &TravelDesk<Store>) -> Result<usize> {
    if !desk.list_all_tours().await?.is_empty() {
        tracing::info!("catalogue already has tours; seed skipped");
        return Ok(0);
    }

    let mut categories = Vec::new();
    for (name, description) in SAMPLE_CATEGORIES {
        let category = desk
            .create_category(CategoryForm {
                name: name.to_string(),
                description: Some(description.to_string()),
            })
            .await?;
        categories.push(category);
    }

    let today = Utc::now().date_naive();
    let mut created = 0;
    for sample in SAMPLE_TOURS {
        let category = categories
            .iter()
            .find(|category| category.name == sample.category)
            .with_context(|| format!("sample category {} missing", sample.category))?;
        desk.create_tour(TourForm {
            category_id: category.category_id.clone(),
            title: sample.title.to_string(),
            description: sample.description.to_string(),
            destination: sample.destination.to_string(),
            price_cents: sample.price_cents,
            currency: None,
            duration_days: sample.duration_days,
            max_participants: sample.max_participants,
            available_from: today + Duration::days(7),
            available_to: today + Duration::days(365),
            difficulty: Some(sample.difficulty.to_string()),
            featured: sample.featured,
            is_active: true,
        })
        .await?;
        created += 1;
    }
    Ok(created)
}
