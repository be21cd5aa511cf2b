use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use djlog::catalog;
use djlog::db::models::SetListing;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "djlog", version, about = "DJ set logbook")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON HTTP API
    Serve {
        /// Address to listen on (defaults to config `[server] bind`)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Interactive menu for entering and browsing sets
    Menu,

    /// List sets, newest first
    Sets {
        /// Filter by artist name (substring match)
        #[arg(long, conflicts_with = "venue")]
        artist: Option<String>,

        /// Filter by venue name (substring match)
        #[arg(long)]
        venue: Option<String>,

        /// Only sets on or after this date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Only sets on or before this date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },

    /// Search songs
    Songs(SongQuery),

    /// Show a set with its tracklist
    Show {
        /// DJ set ID
        id: i64,
    },

    /// Show the analytics recorded for a set
    Analytics {
        /// DJ set ID
        id: i64,
    },

    /// Delete a set with its tracklist and analytics
    DeleteSet {
        /// DJ set ID
        id: i64,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SongQuery {
    /// Title contains
    #[arg(long)]
    title: Option<String>,

    /// Any credited artist's name contains
    #[arg(long)]
    artist: Option<String>,

    /// Genre contains
    #[arg(long)]
    genre: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = djlog::config::AppConfig::load();

    // Resolve database path: CLI > config > XDG default
    let db_path = cli
        .db_path
        .or(config.db_path.clone())
        .unwrap_or_else(djlog::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = djlog::db::Database::open(&db_path).context("Failed to open database")?;

    match cli.command {
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or(config.server.bind);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            println!("Serving on http://{bind}");
            runtime
                .block_on(djlog::server::run_server(db, &bind))
                .context("HTTP server failed")?;
        }

        Commands::Menu => {
            let stdin = io::stdin();
            let mut console = djlog::console::Console::new(&db, stdin.lock(), io::stdout());
            console.run().context("Console session failed")?;
        }

        Commands::Sets { artist, venue, from, to } => {
            let start = from.as_deref().map(catalog::parse_set_datetime).transpose()?;
            let end = to.as_deref().map(catalog::parse_range_end).transpose()?;

            let by_name = if let Some(term) = artist.as_deref() {
                Some(db.sets_by_artist_name(term))
            } else {
                venue.as_deref().map(|term| db.sets_by_venue_name(term))
            };
            let listings: Vec<SetListing> = match by_name {
                // Date bounds still apply after a name filter
                Some(found) => found
                    .context("Query failed")?
                    .into_iter()
                    .filter(|l| match l.set.set_datetime {
                        Some(dt) => start.is_none_or(|s| dt >= s) && end.is_none_or(|e| dt <= e),
                        None => start.is_none() && end.is_none(),
                    })
                    .collect(),
                None => db.sets_in_range(start, end).context("Query failed")?,
            };

            if listings.is_empty() {
                println!("No sets found.");
                return Ok(());
            }
            print_set_table(&listings);
        }

        Commands::Songs(query) => {
            let songs = if let Some(title) = &query.title {
                db.songs_by_title(title)
            } else if let Some(artist) = &query.artist {
                db.songs_by_artist_name(artist)
            } else {
                db.songs_by_genre(query.genre.as_deref().unwrap_or_default())
            }
            .context("Query failed")?;

            if songs.is_empty() {
                println!("No songs found.");
                return Ok(());
            }

            println!(
                "{:>5}  {:<30} {:<25} {:<12} {:>4} {:>6}",
                "ID", "Title", "Artist(s)", "Genre", "BPM", "Length"
            );
            println!("{}", "-".repeat(89));
            for s in &songs {
                let length = s
                    .song
                    .duration_seconds
                    .map(|d| d.max(0))
                    .map(|d| format!("{}:{:02}", d / 60, d % 60))
                    .unwrap_or_default();
                println!(
                    "{:>5}  {:<30} {:<25} {:<12} {:>4} {:>6}",
                    s.song.song_id,
                    truncate(&s.song.title, 30),
                    truncate(&s.artist_names(), 25),
                    truncate(s.song.genre.as_deref().unwrap_or(""), 12),
                    s.song.bpm.map(|b| b.to_string()).unwrap_or_default(),
                    length,
                );
            }
        }

        Commands::Show { id } => {
            let details = catalog::set_details(&db, id)?;
            let mut out = io::stdout().lock();
            djlog::console::write_set_details(&mut out, &details)?;
            out.flush()?;
        }

        Commands::Analytics { id } => {
            let listing = db
                .set_listing(id)
                .context("Query failed")?
                .ok_or(catalog::CatalogError::NotFound { entity: "set", id })?;
            let mut out = io::stdout().lock();
            djlog::console::write_analytics(&mut out, &listing)?;
            out.flush()?;
        }

        Commands::DeleteSet { id } => {
            catalog::delete_set(&db, id).context("Delete failed")?;
            println!("Deleted set {id}.");
        }
    }

    Ok(())
}

/// Truncate long display strings to `width` characters.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width - 3).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Print a table of sets, one row per set.
fn print_set_table(sets: &[SetListing]) {
    println!(
        "{:>5}  {:<16} {:<28} {:<20} {:<20} {:>7}",
        "ID", "Date", "Title", "Artist", "Venue", "Tickets"
    );
    println!("{}", "-".repeat(101));

    for l in sets {
        let date = l
            .set
            .set_datetime
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let tickets = l
            .analytics
            .as_ref()
            .and_then(|a| a.tickets_sold)
            .map(|t| t.to_string())
            .unwrap_or_default();

        println!(
            "{:>5}  {:<16} {:<28} {:<20} {:<20} {:>7}",
            l.set.dj_set_id,
            date,
            truncate(l.set.title.as_deref().unwrap_or("Untitled"), 28),
            truncate(&l.artist.display_name, 20),
            truncate(l.venue.as_ref().and_then(|v| v.name.as_deref()).unwrap_or(""), 20),
            tickets,
        );
    }

    println!();
    println!("{} set(s)", sets.len());
}
