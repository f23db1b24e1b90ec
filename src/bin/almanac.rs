//! Almanac Command Line Interface
//!
//! A CLI for resolving birth instants, inspecting natal charts, listing
//! personal-year events and assembling fully interpreted books.
//!
//! # Usage
//!
//! ```bash
//! # Resolve a birth instant against the historical timezone record
//! almanac resolve --date 1974-02-10 --time 07:30 --lat 40.4168 --lon -3.7038 --zone Europe/Madrid
//!
//! # Natal chart (synthetic when no ephemeris service is configured)
//! almanac chart --date 1974-02-10 --lat 40.4168 --lon -3.7038 --zone Europe/Madrid
//!
//! # The personal year's events
//! almanac events --date 1974-02-10 --lat 40.4168 --lon -3.7038 --zone Europe/Madrid
//!
//! # Full interpreted book as JSON
//! almanac book --date 1974-02-10 --lat 40.4168 --lon -3.7038 --zone Europe/Madrid -o json
//! ```

use std::sync::Arc;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use astro_almanac::{
    event_fingerprint, generate_events, personal_year, resolve_birth_instant, AlmanacConfig,
    AlmanacService, BirthProfile, BirthTime, BookAssembler, BookPayload, EphemerisClient,
    EventKind, GenerationMethod, JsonAssembler, MemoryRecordStore, RecordStore, TimePrecision,
    SCAN_BODIES,
};

#[derive(Parser)]
#[command(name = "almanac")]
#[command(version = "0.1.0")]
#[command(about = "Personalized astrological almanac: charts, events and interpreted books")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: json, text, or pretty (default)
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
    Pretty,
}

#[derive(Args, Clone)]
struct ProfileArgs {
    /// Birth date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,

    /// Birth wall-clock time (HH:MM); omit when unknown
    #[arg(long)]
    time: Option<String>,

    /// Birth latitude in degrees, north positive
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Birth longitude in degrees, east positive
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,

    /// IANA timezone id; omit to derive a fixed offset from longitude
    #[arg(long, default_value = "")]
    zone: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the birth instant against the historical timezone record
    Resolve {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// Show the natal chart (service-computed or synthetic)
    Chart {
        #[command(flatten)]
        profile: ProfileArgs,
    },

    /// List the personal year's events without interpretations
    Events {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Anchor date for the personal year (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Assemble the fully interpreted book
    Book {
        #[command(flatten)]
        profile: ProfileArgs,

        /// Anchor date for the personal year (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,

        /// Owner id; a fresh one is generated when omitted
        #[arg(long)]
        owner: Option<Uuid>,

        /// Regenerate interpretations even when live records exist
        #[arg(long)]
        regenerate: bool,
    },
}

// =============================================================================
// MAIN
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Resolve { profile } => cmd_resolve(profile, cli.format),
        Commands::Chart { profile } => cmd_chart(profile, cli.format).await,
        Commands::Events { profile, today } => cmd_events(profile, today, cli.format).await,
        Commands::Book {
            profile,
            today,
            owner,
            regenerate,
        } => cmd_book(profile, today, owner, regenerate, cli.format).await,
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_resolve(args: ProfileArgs, format: OutputFormat) -> anyhow::Result<()> {
    let profile = build_profile(args)?;
    let resolved = resolve_birth_instant(&profile)?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "instant": resolved.instant.to_rfc3339(),
                "utc": resolved.utc().to_rfc3339(),
                "zone": resolved.zone,
                "noon_default": resolved.precision == TimePrecision::NoonDefault,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text | OutputFormat::Pretty => {
            println!("{} {}", "instant:".bold(), resolved.instant.to_rfc3339());
            println!("{} {}", "utc:    ".bold(), resolved.utc().to_rfc3339());
            println!("{} {}", "zone:   ".bold(), resolved.zone);
            if resolved.precision == TimePrecision::NoonDefault {
                println!("{}", "time unknown, resolved to local noon".yellow());
            }
        }
    }
    Ok(())
}

async fn cmd_chart(args: ProfileArgs, format: OutputFormat) -> anyhow::Result<()> {
    let profile = build_profile(args)?;
    let resolved = resolve_birth_instant(&profile)?;
    let config = AlmanacConfig::from_env()?;
    let client = EphemerisClient::new(config.ephemeris)?;
    let chart = client
        .natal_chart(profile.date, &resolved, profile.latitude, profile.longitude)
        .await;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&chart)?);
        return Ok(());
    }

    let data = chart.data();
    let basis = if chart.is_synthetic() {
        "synthetic".yellow()
    } else {
        "service".green()
    };
    println!("{} {} chart for {}", "chart:".bold(), basis, profile.date);
    println!(
        "{} {:.2} ({})  {} {:.2}",
        "ascendant:".bold(),
        data.ascendant,
        data.ascendant_sign(),
        "midheaven:".bold(),
        data.midheaven
    );
    for position in &data.positions {
        let retro = if position.retrograde { " R" } else { "" };
        let house = position
            .house
            .map(|h| format!(" house {h}"))
            .unwrap_or_default();
        println!(
            "  {:<10} {:>7.2}  {}{}{}",
            position.body.name(),
            position.longitude,
            position.sign,
            house,
            retro.red()
        );
    }
    println!(
        "{} fire {}% earth {}% air {}% water {}%",
        "elements:".bold(),
        data.elements.fire,
        data.elements.earth,
        data.elements.air,
        data.elements.water
    );
    println!(
        "{} cardinal {}% fixed {}% mutable {}%",
        "modality:".bold(),
        data.modalities.cardinal,
        data.modalities.fixed,
        data.modalities.mutable
    );
    Ok(())
}

async fn cmd_events(
    args: ProfileArgs,
    today: Option<NaiveDate>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let profile = build_profile(args)?;
    let resolved = resolve_birth_instant(&profile)?;
    let today = today.unwrap_or_else(|| Utc::now().date_naive());

    let config = AlmanacConfig::from_env()?;
    let client = EphemerisClient::new(config.ephemeris)?;
    let chart = client
        .natal_chart(profile.date, &resolved, profile.latitude, profile.longitude)
        .await;
    let window = personal_year(profile.date, today);
    let series = client
        .daily_positions(window.start.date_naive(), window.scan_days(), &SCAN_BODIES)
        .await;
    let calendar = generate_events(&chart, &series, &window);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&calendar)?);
        return Ok(());
    }

    println!(
        "{} {} events from {} to {}",
        "calendar:".bold(),
        calendar.events.len(),
        window.start.date_naive(),
        window.end.date_naive()
    );
    if calendar.meta.retrogrades_omitted {
        println!("{}", "station events omitted: no velocity data".yellow());
    }
    for event in &calendar.events {
        println!(
            "  {}  {} {:<11} {}",
            event.timestamp.format("%Y-%m-%d %H:%M"),
            kind_tag(event.kind),
            event.sign.name(),
            event
                .bodies
                .iter()
                .map(|b| b.name())
                .collect::<Vec<_>>()
                .join(", ")
                .dimmed()
        );
    }
    Ok(())
}

async fn cmd_book(
    args: ProfileArgs,
    today: Option<NaiveDate>,
    owner: Option<Uuid>,
    regenerate: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let profile = build_profile(args)?;
    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let owner = owner.unwrap_or_else(Uuid::new_v4);

    let config = AlmanacConfig::from_env()?;
    let store = record_store().await?;
    let service = AlmanacService::from_config(&config, store)?;
    let payload = service
        .build_book_payload(owner, &profile, today, regenerate)
        .await?;

    if format == OutputFormat::Json {
        println!("{}", JsonAssembler.assemble(&payload)?);
        return Ok(());
    }

    print_book(&payload);
    Ok(())
}

fn print_book(payload: &BookPayload) {
    println!(
        "{} owner {} born {} ({})",
        "book:".bold(),
        payload.owner,
        payload.profile.date,
        payload.birth.zone
    );
    if payload.birth.precision == TimePrecision::NoonDefault {
        println!("{}", "birth time unknown, houses are approximate".yellow());
    }
    if payload.chart.is_synthetic() {
        println!("{}", "chart basis: synthetic positions".yellow());
    }

    if let Some(overview) = payload.interpretations.get(&payload.overview_fingerprint) {
        println!();
        println!("{}", "Your chart".bold().underline());
        println!("  {}", overview.interpretation.meaning);
        println!("  {}", overview.interpretation.guidance.dimmed());
    }

    for month in &payload.months {
        println!();
        println!("{}", month.label.bold().underline());
        if month.events.is_empty() {
            println!("  {}", "a quiet month".dimmed());
            continue;
        }
        for event in &month.events {
            println!(
                "  {}  {} {}",
                event.timestamp.format("%b %d %H:%M"),
                kind_tag(event.kind),
                event.sign.name()
            );
            if let Some(record) = payload.interpretations.get(&event_fingerprint(event)) {
                println!("      {}", record.interpretation.meaning);
                println!(
                    "      {}",
                    format!("\"{}\"", record.interpretation.mantra).dimmed()
                );
            }
        }
    }

    let (template, remote) = payload.interpretations.values().fold((0, 0), |acc, r| {
        if r.method == GenerationMethod::DeterministicTemplate {
            (acc.0 + 1, acc.1)
        } else {
            (acc.0, acc.1 + 1)
        }
    });
    println!();
    println!(
        "{} {} interpretations ({} generated, {} template)",
        "done:".bold(),
        payload.interpretations.len(),
        remote,
        template
    );
}

// =============================================================================
// HELPERS
// =============================================================================

fn build_profile(args: ProfileArgs) -> anyhow::Result<BirthProfile> {
    let time = match &args.time {
        Some(raw) => BirthTime::Known(parse_time(raw)?),
        None => BirthTime::Unknown,
    };
    BirthProfile::new(args.date, time, args.lat, args.lon, &args.zone)
        .context("invalid birth profile")
}

fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .with_context(|| format!("unparseable time of day: {raw}"))
}

async fn record_store() -> anyhow::Result<Arc<dyn RecordStore>> {
    #[cfg(feature = "database")]
    {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                let store = astro_almanac::PgRecordStore::connect(&url).await?;
                return Ok(Arc::new(store));
            }
        }
    }
    Ok(Arc::new(MemoryRecordStore::new()))
}

// Pad before coloring so the ANSI escapes do not skew column widths.
fn kind_tag(kind: EventKind) -> colored::ColoredString {
    let label = format!("{:<22}", kind.label());
    match kind {
        EventKind::SolarEclipse | EventKind::LunarEclipse => label.red().bold(),
        EventKind::LunarNew
        | EventKind::LunarFirstQuarter
        | EventKind::LunarFull
        | EventKind::LunarLastQuarter => label.yellow(),
        EventKind::RetrogradeStation | EventKind::DirectStation => label.magenta(),
        EventKind::Ingress => label.cyan(),
        EventKind::Aspect => label.normal(),
    }
}
