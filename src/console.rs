//! Interactive console front end.
//!
//! Menu-driven data entry and queries over a line-based reader and writer.
//! Artists, venues and songs are chosen by substring search; choosing `0`
//! (or finding nothing) creates a new row from prompted fields. Workflow
//! errors are printed and the menu carries on; only I/O errors end the session.

use std::io::{self, BufRead, Write};

use chrono::NaiveDate;
use thiserror::Error;

use crate::catalog::{self, CatalogError, SetDraft, SetEdit, VenueInput};
use crate::db::models::{
    Artist, DjSet, NewDjSet, NewSong, SetAnalytics, SetDetails, SetListing, Song,
    SongWithArtists, Venue,
};
use crate::db::resolve::{self, Resolvable};
use crate::db::{Database, DbError, store};

#[derive(Error, Debug)]
enum ConsoleError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("input closed")]
    Eof,
}

impl From<DbError> for ConsoleError {
    fn from(err: DbError) -> Self {
        ConsoleError::Catalog(err.into())
    }
}

type Result<T> = std::result::Result<T, ConsoleError>;

pub struct Console<'a, R, W> {
    db: &'a Database,
    input: R,
    out: W,
}

impl<'a, R: BufRead, W: Write> Console<'a, R, W> {
    pub fn new(db: &'a Database, input: R, out: W) -> Self {
        Self { db, input, out }
    }

    /// Run the main menu until the user exits or input runs out.
    pub fn run(&mut self) -> io::Result<()> {
        writeln!(self.out, "=== DJ Set Management System ===")?;
        loop {
            writeln!(self.out, "\n--- Main Menu ---")?;
            writeln!(self.out, "1. Add new DJ set")?;
            writeln!(self.out, "2. Update DJ set")?;
            writeln!(self.out, "3. Delete DJ set")?;
            writeln!(self.out, "4. Query database")?;
            writeln!(self.out, "5. Exit")?;

            let outcome = match self.prompt("\nSelect an option: ") {
                Ok(choice) => match choice.as_str() {
                    "1" => self.add_set(),
                    "2" => self.update_set(),
                    "3" => self.delete_set(),
                    "4" => self.query_menu(),
                    "5" => {
                        writeln!(self.out, "\nGoodbye!")?;
                        return Ok(());
                    }
                    _ => {
                        writeln!(self.out, "\nInvalid option. Please try again.")?;
                        Ok(())
                    }
                },
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => {}
                Err(ConsoleError::Catalog(e)) => writeln!(self.out, "\nError: {e}")?,
                Err(ConsoleError::Io(e)) => return Err(e),
                Err(ConsoleError::Eof) => return Ok(()),
            }
        }
    }

    fn query_menu(&mut self) -> Result<()> {
        loop {
            writeln!(self.out, "\n--- Query Database ---")?;
            writeln!(self.out, "1. Search DJ sets by artist")?;
            writeln!(self.out, "2. Search DJ sets by venue")?;
            writeln!(self.out, "3. Search DJ sets by date range")?;
            writeln!(self.out, "4. View all DJ sets")?;
            writeln!(self.out, "5. Search songs by title")?;
            writeln!(self.out, "6. Search songs by artist")?;
            writeln!(self.out, "7. Search songs by genre")?;
            writeln!(self.out, "8. View DJ set details (with songs)")?;
            writeln!(self.out, "9. View set analytics")?;
            writeln!(self.out, "10. Back to main menu")?;

            let choice = self.prompt("\nSelect query option: ")?;
            match choice.as_str() {
                "1" => self.sets_by_artist()?,
                "2" => self.sets_by_venue()?,
                "3" => self.sets_by_date_range()?,
                "4" => {
                    let sets = self.db.all_sets()?;
                    if sets.is_empty() {
                        writeln!(self.out, "\nNo DJ sets found in the database.")?;
                    } else {
                        writeln!(self.out, "\n--- All DJ Sets ({} total) ---", sets.len())?;
                        self.list_sets(&sets)?;
                    }
                }
                "5" => self.songs_by(SongFilter::Title)?,
                "6" => self.songs_by(SongFilter::Artist)?,
                "7" => self.songs_by(SongFilter::Genre)?,
                "8" => self.show_details()?,
                "9" => self.show_analytics()?,
                "10" => return Ok(()),
                _ => writeln!(self.out, "\nInvalid option. Please try again.")?,
            }
        }
    }

    // Prompt helpers

    /// Print `message`, read one line and return it trimmed.
    fn prompt(&mut self, message: &str) -> Result<String> {
        write!(self.out, "{message}")?;
        self.out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(ConsoleError::Eof);
        }
        Ok(line.trim().to_string())
    }

    fn prompt_text(&mut self, message: &str) -> Result<Option<String>> {
        let line = self.prompt(message)?;
        Ok((!line.is_empty()).then_some(line))
    }

    /// Blank input reads as absent. Anything else must be a whole number of
    /// zero or more, and is asked for again until it is.
    fn prompt_number(&mut self, message: &str) -> Result<Option<i32>> {
        loop {
            let line = self.prompt(message)?;
            if line.is_empty() {
                return Ok(None);
            }
            match line.parse::<i32>() {
                Ok(n) if n >= 0 => return Ok(Some(n)),
                _ => writeln!(self.out, "Invalid number.")?,
            }
        }
    }

    fn confirm(&mut self, message: &str) -> Result<bool> {
        Ok(self.prompt(message)?.eq_ignore_ascii_case("y"))
    }

    fn prompt_set_id(&mut self) -> Result<Option<i64>> {
        match self.prompt("\nEnter DJ set ID: ")?.parse() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                writeln!(self.out, "Invalid DJ set ID.")?;
                Ok(None)
            }
        }
    }

    fn prompt_search_term(&mut self, message: &str) -> Result<Option<String>> {
        let term = self.prompt_text(message)?;
        if term.is_none() {
            writeln!(self.out, "Search term cannot be empty.")?;
        }
        Ok(term)
    }

    // Selection

    /// Substring search for an existing row. `None` means "create a new one".
    fn choose<T: Resolvable>(
        &mut self,
        noun: &str,
        label: fn(&Database, &T) -> Result<String>,
    ) -> Result<Option<T>> {
        let Some(term) = self.prompt_text(&format!(
            "Search for existing {noun} by name (or press Enter to create new): "
        ))?
        else {
            return Ok(None);
        };

        let candidates: Vec<T> = resolve::search(&self.db.conn, &term)?;
        if candidates.is_empty() {
            writeln!(self.out, "No {noun} matching '{term}'.")?;
            return Ok(None);
        }

        writeln!(self.out, "\nFound {noun}s:")?;
        for (i, candidate) in candidates.iter().enumerate() {
            let line = label(self.db, candidate)?;
            writeln!(self.out, "{}. {}", i + 1, line)?;
        }

        let pick = self.prompt(&format!("Select {noun} (number) or 0 to create new: "))?;
        Ok(match pick.parse::<usize>() {
            Ok(n) if n > 0 => candidates.into_iter().nth(n - 1),
            _ => None,
        })
    }

    fn select_artist(&mut self) -> Result<Artist> {
        let label = |_: &Database, a: &Artist| -> Result<String> {
            Ok(format!("{} ({})", a.display_name, a.country.as_deref().unwrap_or("N/A")))
        };
        if let Some(artist) = self.choose::<Artist>("artist", label)? {
            return Ok(artist);
        }

        writeln!(self.out, "\n--- Create New Artist ---")?;
        let name = self.prompt("Enter artist display name: ")?;
        let country = self.prompt_text("Enter country (or press Enter to skip): ")?;
        Ok(catalog::create_artist(self.db, &name, country.as_deref())?)
    }

    fn select_venue(&mut self) -> Result<Venue> {
        let label = |_: &Database, v: &Venue| -> Result<String> {
            Ok(format!(
                "{} - Capacity: {}",
                v.name.as_deref().unwrap_or("N/A"),
                v.capacity.unwrap_or(0)
            ))
        };
        if let Some(venue) = self.choose::<Venue>("venue", label)? {
            return Ok(venue);
        }

        writeln!(self.out, "\n--- Create New Venue ---")?;
        let input = VenueInput {
            name: self.prompt("Enter venue name: ")?,
            capacity: self.prompt_number("Enter capacity: ")?,
            address: self.prompt_text("Enter address: ")?,
            ..Default::default()
        };
        Ok(catalog::create_venue(self.db, &input)?)
    }

    fn select_song(&mut self) -> Result<Song> {
        let label = |db: &Database, s: &Song| -> Result<String> {
            let artists = store::artists_for_song(&db.conn, s.song_id)?;
            let names: Vec<&str> = artists.iter().map(|a| a.display_name.as_str()).collect();
            Ok(format!("{} by {}", s.title, names.join(", ")))
        };
        if let Some(song) = self.choose::<Song>("song", label)? {
            return Ok(song);
        }

        writeln!(self.out, "\n--- Create New Song ---")?;
        let title = self.prompt("Enter song title: ")?;
        let release_date = self
            .prompt("Enter release date (yyyy-MM-dd) or press Enter to skip: ")?
            .parse::<NaiveDate>()
            .ok();
        let song = NewSong {
            title,
            release_date,
            duration_seconds: self.prompt_number("Enter duration in seconds: ")?,
            genre: self.prompt_text("Enter genre: ")?,
            bpm: self.prompt_number("Enter BPM: ")?,
        };

        writeln!(self.out, "\n--- Add Artists to Song ---")?;
        let mut artist_ids = Vec::new();
        while self.confirm("Add an artist to this song? (y/n): ")? {
            let artist = self.select_artist()?;
            writeln!(self.out, "Added artist '{}' to song!", artist.display_name)?;
            artist_ids.push(artist.artist_id);
        }

        Ok(catalog::create_song(self.db, &song, &artist_ids)?)
    }

    /// Prompt for songs until the user stops; returns `(song_id, timestamp)` pairs.
    fn collect_tracks(&mut self) -> Result<Vec<(i64, Option<i32>)>> {
        let mut tracks = Vec::new();
        while self.confirm("\nAdd a song to the set? (y/n): ")? {
            let song = self.select_song()?;
            let ts =
                self.prompt_number("Enter timestamp in set (seconds) or press Enter to skip: ")?;
            writeln!(self.out, "Added '{}' to the set!", song.title)?;
            tracks.push((song.song_id, ts));
        }
        Ok(tracks)
    }

    fn prompt_analytics(&mut self) -> Result<SetAnalytics> {
        Ok(SetAnalytics {
            dj_set_id: 0,
            tickets_sold: self.prompt_number("Enter tickets sold: ")?,
            attendance_count: self.prompt_number("Enter attendance count: ")?,
            gross_revenue: self.prompt_number("Enter gross revenue: ")?,
            stream_count: self.prompt_number("Enter stream count: ")?,
            like_count: self.prompt_number("Enter like count: ")?,
        })
    }

    // Write workflows

    fn add_set(&mut self) -> Result<()> {
        writeln!(self.out, "--- DJ Set Artist ---")?;
        let artist = self.select_artist()?;

        writeln!(self.out, "\n--- DJ Set Information ---")?;
        let title = self.prompt_text("Enter DJ set title: ")?;
        let when = self
            .prompt_text("Enter set date and time (yyyy-MM-dd HH:mm) or press Enter to skip: ")?;
        let set_datetime = match when {
            Some(input) => match catalog::parse_set_datetime(&input) {
                Ok(dt) => Some(dt),
                Err(e) => {
                    writeln!(self.out, "{e}; leaving the date empty.")?;
                    None
                }
            },
            None => None,
        };
        let duration_minutes = self.prompt_number("Enter duration in minutes: ")?;
        let source_url = self.prompt_text("Enter source URL (or press Enter to skip): ")?;

        writeln!(self.out, "\n--- Venue Information ---")?;
        let venue = if self.confirm("Add venue? (y/n): ")? {
            Some(self.select_venue()?)
        } else {
            None
        };

        writeln!(self.out, "\n--- Add Songs to Set ---")?;
        let tracks = self.collect_tracks()?;

        writeln!(self.out, "\n--- Analytics (Optional) ---")?;
        let analytics = if self.confirm("Add analytics data? (y/n): ")? {
            Some(self.prompt_analytics()?)
        } else {
            None
        };

        let draft = SetDraft {
            set: NewDjSet {
                artist_id: artist.artist_id,
                title,
                set_datetime,
                duration_minutes,
                source_url,
                venue_id: venue.map(|v| v.venue_id),
            },
            tracks,
            analytics,
        };
        let set = catalog::create_set_from_draft(self.db, &draft)?;
        writeln!(self.out, "\nDJ set {} added successfully!", set.dj_set_id)?;
        Ok(())
    }

    fn update_set(&mut self) -> Result<()> {
        let Some(id) = self.prompt_set_id()? else {
            return Ok(());
        };
        let details = catalog::set_details(self.db, id)?;
        let current = &details.set;
        let tickets = details.analytics.as_ref().and_then(|a| a.tickets_sold);

        writeln!(self.out, "\nPress Enter to keep the current value.")?;
        let title = self.prompt_text(&format!("Title [{}]: ", or_na(current.title.as_deref())))?;
        let set_datetime = match self.prompt_text(&format!(
            "Date/time (yyyy-MM-dd HH:mm) [{}]: ",
            format_datetime(current)
        ))? {
            Some(input) => Some(catalog::parse_set_datetime(&input)?),
            None => None,
        };
        let duration_minutes = self.prompt_number(&format!(
            "Duration in minutes [{}]: ",
            or_na(current.duration_minutes.map(|m| m.to_string()).as_deref())
        ))?;
        let source_url =
            self.prompt_text(&format!("Source URL [{}]: ", or_na(current.source_url.as_deref())))?;

        let artist_id = if self.confirm(&format!(
            "Change artist (currently {})? (y/n): ",
            details.artist.display_name
        ))? {
            Some(self.select_artist()?.artist_id)
        } else {
            None
        };
        let venue_id = if self.confirm(&format!(
            "Change venue (currently {})? (y/n): ",
            or_na(details.venue.as_ref().and_then(|v| v.name.as_deref()))
        ))? {
            Some(self.select_venue()?.venue_id)
        } else {
            None
        };
        let tickets_sold = self.prompt_number(&format!(
            "Tickets sold [{}]: ",
            or_na(tickets.map(|t| t.to_string()).as_deref())
        ))?;

        let tracks = if self.confirm(&format!(
            "Replace tracklist ({} songs)? (y/n): ",
            details.tracklist.len()
        ))? {
            Some(self.collect_tracks()?)
        } else {
            None
        };

        let edit = SetEdit {
            title,
            set_datetime,
            duration_minutes,
            source_url,
            artist_id,
            venue_id,
            tickets_sold,
            tracks,
        };
        catalog::edit_set(self.db, id, &edit)?;
        writeln!(self.out, "\nDJ set {id} updated.")?;
        Ok(())
    }

    fn delete_set(&mut self) -> Result<()> {
        let Some(id) = self.prompt_set_id()? else {
            return Ok(());
        };
        let summary = catalog::set_summary(self.db, id)?;
        let tracks = self.db.count_set_songs(id)?;
        let question = format!(
            "Delete DJ set {} ({} by {}, {} tracks)? (y/n): ",
            id,
            summary.title.as_deref().unwrap_or("Untitled"),
            summary.artist_name,
            tracks
        );
        if self.confirm(&question)? {
            catalog::delete_set(self.db, id)?;
            writeln!(self.out, "\nDJ set {id} deleted.")?;
        } else {
            writeln!(self.out, "\nCancelled.")?;
        }
        Ok(())
    }

    // Queries

    fn list_sets(&mut self, sets: &[SetListing]) -> Result<()> {
        for listing in sets {
            write_set_listing(&mut self.out, listing)?;
        }
        Ok(())
    }

    fn sets_by_artist(&mut self) -> Result<()> {
        let Some(term) = self.prompt_search_term("\nEnter artist name to search: ")? else {
            return Ok(());
        };
        let sets = self.db.sets_by_artist_name(&term)?;
        if sets.is_empty() {
            writeln!(self.out, "\nNo DJ sets found for artist containing '{term}'.")?;
            return Ok(());
        }
        writeln!(self.out, "\n--- Found {} DJ Set(s) ---", sets.len())?;
        self.list_sets(&sets)
    }

    fn sets_by_venue(&mut self) -> Result<()> {
        let Some(term) = self.prompt_search_term("\nEnter venue name to search: ")? else {
            return Ok(());
        };
        let sets = self.db.sets_by_venue_name(&term)?;
        if sets.is_empty() {
            writeln!(self.out, "\nNo DJ sets found for venue containing '{term}'.")?;
            return Ok(());
        }
        writeln!(self.out, "\n--- Found {} DJ Set(s) ---", sets.len())?;
        self.list_sets(&sets)
    }

    fn sets_by_date_range(&mut self) -> Result<()> {
        let start = self.prompt_text("\nEnter start date (yyyy-MM-dd) or press Enter to skip: ")?;
        let start = match start {
            Some(input) => Some(catalog::parse_set_datetime(&input)?),
            None => None,
        };
        let end = self.prompt_text("Enter end date (yyyy-MM-dd) or press Enter to skip: ")?;
        let end = match end {
            Some(input) => Some(catalog::parse_range_end(&input)?),
            None => None,
        };

        let sets = self.db.sets_in_range(start, end)?;
        if sets.is_empty() {
            writeln!(self.out, "\nNo DJ sets found in the specified date range.")?;
            return Ok(());
        }
        writeln!(self.out, "\n--- Found {} DJ Set(s) ---", sets.len())?;
        self.list_sets(&sets)
    }

    fn songs_by(&mut self, filter: SongFilter) -> Result<()> {
        let Some(term) = self.prompt_search_term(filter.prompt())? else {
            return Ok(());
        };
        let songs = match filter {
            SongFilter::Title => self.db.songs_by_title(&term)?,
            SongFilter::Artist => self.db.songs_by_artist_name(&term)?,
            SongFilter::Genre => self.db.songs_by_genre(&term)?,
        };
        if songs.is_empty() {
            writeln!(self.out, "\nNo songs found {} '{term}'.", filter.describe())?;
            return Ok(());
        }
        writeln!(self.out, "\n--- Found {} Song(s) ---", songs.len())?;
        for song in &songs {
            write_song(&mut self.out, song)?;
        }
        Ok(())
    }

    fn show_details(&mut self) -> Result<()> {
        let Some(id) = self.prompt_set_id()? else {
            return Ok(());
        };
        match self.db.set_details(id)? {
            Some(details) => write_set_details(&mut self.out, &details)?,
            None => writeln!(self.out, "\nDJ set with ID {id} not found.")?,
        }
        Ok(())
    }

    fn show_analytics(&mut self) -> Result<()> {
        let Some(id) = self.prompt_set_id()? else {
            return Ok(());
        };
        match self.db.set_listing(id)? {
            Some(listing) => write_analytics(&mut self.out, &listing)?,
            None => writeln!(self.out, "\nDJ set with ID {id} not found.")?,
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum SongFilter {
    Title,
    Artist,
    Genre,
}

impl SongFilter {
    fn prompt(self) -> &'static str {
        match self {
            SongFilter::Title => "\nEnter song title to search: ",
            SongFilter::Artist => "\nEnter artist name to search: ",
            SongFilter::Genre => "\nEnter genre to search: ",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            SongFilter::Title => "with title containing",
            SongFilter::Artist => "for artist containing",
            SongFilter::Genre => "with genre containing",
        }
    }
}

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn format_datetime(set: &DjSet) -> String {
    set.set_datetime
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// `[mm:ss] ` prefix for a timed tracklist entry, empty when untimed.
fn format_timestamp(seconds: Option<i32>) -> String {
    match seconds {
        Some(s) => {
            let s = s.max(0);
            format!("[{:02}:{:02}] ", s / 60, s % 60)
        }
        None => String::new(),
    }
}

pub fn write_set_listing(out: &mut impl Write, listing: &SetListing) -> io::Result<()> {
    let set = &listing.set;
    writeln!(out, "\nID: {} | {}", set.dj_set_id, set.title.as_deref().unwrap_or("Untitled"))?;
    writeln!(out, "  Artist: {}", listing.artist.display_name)?;
    writeln!(out, "  Date: {}", format_datetime(set))?;
    writeln!(out, "  Venue: {}", or_na(listing.venue.as_ref().and_then(|v| v.name.as_deref())))?;
    match set.duration_minutes {
        Some(m) => writeln!(out, "  Duration: {m} min"),
        None => writeln!(out, "  Duration: N/A"),
    }
}

pub fn write_song(out: &mut impl Write, song: &SongWithArtists) -> io::Result<()> {
    let s = &song.song;
    writeln!(out, "\nID: {} | {}", s.song_id, s.title)?;
    writeln!(out, "  Artist(s): {}", song.artist_names())?;
    writeln!(
        out,
        "  Genre: {} | BPM: {}",
        or_na(s.genre.as_deref()),
        or_na(s.bpm.map(|b| b.to_string()).as_deref())
    )?;
    let duration = s
        .duration_seconds
        .map(|d| format!("{:02}:{:02}", d / 60, d % 60));
    writeln!(out, "  Duration: {}", or_na(duration.as_deref()))?;
    let released = s.release_date.map(|d| d.format("%Y-%m-%d").to_string());
    writeln!(out, "  Release Date: {}", or_na(released.as_deref()))
}

pub fn write_set_details(out: &mut impl Write, details: &SetDetails) -> io::Result<()> {
    let set = &details.set;
    writeln!(out, "\n=== DJ Set Details ===")?;
    writeln!(out, "ID: {}", set.dj_set_id)?;
    writeln!(out, "Title: {}", or_na(set.title.as_deref()))?;
    writeln!(out, "Artist: {}", details.artist.display_name)?;
    writeln!(out, "Date/Time: {}", format_datetime(set))?;
    match set.duration_minutes {
        Some(m) => writeln!(out, "Duration: {m} minutes")?,
        None => writeln!(out, "Duration: N/A")?,
    }
    writeln!(out, "Venue: {}", or_na(details.venue.as_ref().and_then(|v| v.name.as_deref())))?;
    writeln!(out, "Source URL: {}", or_na(set.source_url.as_deref()))?;

    if details.tracklist.is_empty() {
        return writeln!(out, "\nNo songs in this set.");
    }
    writeln!(out, "\n--- Tracklist ({} songs) ---", details.tracklist.len())?;
    for item in &details.tracklist {
        writeln!(
            out,
            "{}{} - {}",
            format_timestamp(item.timestamp_in_set_seconds),
            item.song.song.title,
            item.song.artist_names()
        )?;
    }
    Ok(())
}

pub fn write_analytics(out: &mut impl Write, listing: &SetListing) -> io::Result<()> {
    writeln!(out, "\n=== DJ Set Analytics ===")?;
    writeln!(
        out,
        "Set: {} by {}",
        or_na(listing.set.title.as_deref()),
        listing.artist.display_name
    )?;

    let Some(a) = &listing.analytics else {
        return writeln!(out, "\nNo analytics data available for this set.");
    };
    let show = |v: Option<i32>| v.map(|n| n.to_string()).unwrap_or_else(|| "N/A".to_string());
    writeln!(out, "\nTickets Sold: {}", show(a.tickets_sold))?;
    writeln!(out, "Attendance: {}", show(a.attendance_count))?;
    let revenue = a
        .gross_revenue
        .map(|r| format!("${r}"))
        .unwrap_or_else(|| "N/A".to_string());
    writeln!(out, "Gross Revenue: {revenue}")?;
    writeln!(out, "Stream Count: {}", show(a.stream_count))?;
    writeln!(out, "Like Count: {}", show(a.like_count))
}
