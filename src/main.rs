use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use learnlog::config::{Config, DEFAULT_LOG_FILTER};
use learnlog::playlist::{PlaylistError, PlaylistInfo};
use learnlog::utils::{
    ensure_course_folder, ensure_database_directory, format_duration, format_total_duration,
    parse_tags, sanitize_folder_name,
};
use learnlog::{
    CourseId, CourseOrder, Database, ListCoursesOptions, Snapshot, SnapshotError, Tracker,
    VideoStatus,
};
use tracing_subscriber::EnvFilter;

/// learnlog - track progress through video courses
#[derive(Parser)]
#[command(name = "learnlog")]
#[command(about = "Track progress through YouTube playlists studied as courses")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Answer JSON commands from stdin, one per line
    Serve,
    /// Add a course from playlist metadata (yt-dlp --dump-single-json output)
    Add(AddCommand),
    /// List courses with their progress
    List(ListCommand),
    /// Show dashboard counts or one course's progress
    Stats(StatsCommand),
    /// Export courses to a snapshot file
    Export(ExportCommand),
    /// Merge a snapshot file into the database
    Import(ImportCommand),
}

/// Add a course
#[derive(Parser)]
struct AddCommand {
    /// Playlist metadata JSON; read from stdin when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Parent directory for the course's working folder
    #[arg(short, long, value_name = "DIR")]
    folder: Option<PathBuf>,

    /// Comma-separated tags to apply to the course
    #[arg(short, long, value_name = "TAGS")]
    tags: Option<String>,
}

/// List courses
#[derive(Parser)]
struct ListCommand {
    /// Only courses whose title or channel contains this text
    #[arg(short, long)]
    search: Option<String>,

    /// Only courses with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Order by group and position instead of recent activity
    #[arg(long)]
    by_group: bool,
}

/// Show statistics
#[derive(Parser)]
struct StatsCommand {
    /// Course id; dashboard totals when omitted
    #[arg(short, long, value_name = "ID")]
    course: Option<i64>,
}

/// Export courses
#[derive(Parser)]
struct ExportCommand {
    /// Course id to export (repeatable); every course when omitted
    #[arg(short, long = "course", value_name = "ID")]
    courses: Vec<i64>,

    /// Output file; stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

/// Import a snapshot
#[derive(Parser)]
struct ImportCommand {
    /// Snapshot JSON; read from stdin when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let result = Config::load().and_then(|config| {
        init_tracing(&config.log_filter);
        run(&cli.command, &config)
    });

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Logs go to stderr so `serve` keeps stdout for replies.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(command: &Commands, config: &Config) -> Result<()> {
    let tracker = open_tracker(&config.database_path)?;
    match command {
        Commands::Serve => {
            learnlog::commands::serve(&tracker, io::stdin().lock(), io::stdout().lock())
        }
        Commands::Add(cmd) => {
            let input = read_input(cmd.file.as_deref())?;
            execute_add(&tracker, &input, cmd.folder.as_deref(), cmd.tags.as_deref()).map(|_| ())
        }
        Commands::List(cmd) => execute_list(&tracker, cmd),
        Commands::Stats(cmd) => execute_stats(&tracker, cmd.course.map(CourseId::new)),
        Commands::Export(cmd) => execute_export(&tracker, cmd),
        Commands::Import(cmd) => {
            let input = read_input(cmd.file.as_deref())?;
            execute_import(&tracker, &input)
        }
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad input files and empty values. Internal errors
/// include database failures and I/O errors.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.downcast_ref::<PlaylistError>().is_some()
        || error.downcast_ref::<SnapshotError>().is_some()
        || error.to_string().contains("cannot be empty")
}

fn open_tracker(db_path: &Path) -> Result<Tracker> {
    ensure_database_directory(db_path)?;
    let db = Database::open(db_path).context("Failed to open database")?;
    Ok(Tracker::new(db))
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

/// Creates a course from playlist metadata and applies the given tags.
///
/// With `folder`, the course's working folder is created beneath it.
fn execute_add(
    tracker: &Tracker,
    playlist_json: &str,
    folder: Option<&Path>,
    tags: Option<&str>,
) -> Result<CourseId> {
    let info = PlaylistInfo::from_json(playlist_json)?;
    if info.title.trim().is_empty() {
        anyhow::bail!("Course title cannot be empty");
    }

    let local_folder_path = folder
        .map(|dir| {
            dir.join(sanitize_folder_name(&info.title))
                .display()
                .to_string()
        })
        .unwrap_or_default();
    ensure_course_folder(&local_folder_path)?;
    let new_course = info.into_new_course(local_folder_path);
    let video_count = new_course.videos.len();

    let id = tracker
        .courses()
        .create(&new_course)
        .context("Failed to create course")?;

    let parsed_tags = tags.map(parse_tags).unwrap_or_default();
    if !parsed_tags.is_empty() {
        tracker.tags().replace_for_course(id, &parsed_tags)?;
    }

    print!("Course created (id: {id}) with {video_count} videos");
    if !parsed_tags.is_empty() {
        print!(" and tags: {}", parsed_tags.join(", "));
    }
    println!();

    Ok(id)
}

fn execute_list(tracker: &Tracker, cmd: &ListCommand) -> Result<()> {
    let options = ListCoursesOptions {
        search: cmd.search.clone(),
        tag: cmd.tag.clone(),
        order: if cmd.by_group {
            CourseOrder::GroupPosition
        } else {
            CourseOrder::RecentlyUpdated
        },
    };
    let courses = tracker.courses().list(options)?;

    if courses.is_empty() {
        println!("No courses found");
        return Ok(());
    }

    for entry in &courses {
        let stats = entry.stats;
        print!(
            "[{}] {} ({}/{} videos, {}%)",
            entry.course.id,
            entry.course.title,
            stats.completed_videos,
            stats.total_videos,
            stats.completion_percent()
        );
        if let Some(channel) = &entry.course.channel {
            print!(" - {channel}");
        }
        println!();
    }

    Ok(())
}

fn execute_stats(tracker: &Tracker, course: Option<CourseId>) -> Result<()> {
    match course {
        None => {
            let stats = tracker.stats().dashboard()?;
            println!("Courses:     {}", stats.total_courses);
            println!("Videos:      {}", stats.total_videos);
            println!("Completed:   {}", stats.completed_videos);
            println!("In progress: {}", stats.in_progress_videos);
            println!("Not started: {}", stats.not_started_videos);
        }
        Some(id) => {
            let Some(course) = tracker.courses().get(id)? else {
                anyhow::bail!("Course {id} not found");
            };
            let progress = tracker.stats().course_progress(id)?;
            println!("{}", course.course.title);
            println!(
                "Completed:   {}/{} ({}%)",
                progress.completed_videos,
                progress.total_videos,
                course.stats.completion_percent()
            );
            println!("In progress: {}", progress.in_progress_videos);
            println!(
                "Remaining:   {} of {}",
                format_total_duration(progress.remaining_seconds),
                format_total_duration(progress.total_duration_seconds)
            );
            println!();
            for video in tracker.videos().list_for_course(id)? {
                println!(
                    "{:>3}. [{}] {} ({})",
                    video.position,
                    status_marker(video.status),
                    video.title,
                    format_duration(video.duration_seconds)
                );
            }
        }
    }
    Ok(())
}

fn status_marker(status: VideoStatus) -> char {
    match status {
        VideoStatus::NotStarted => ' ',
        VideoStatus::InProgress => '~',
        VideoStatus::Completed => 'x',
    }
}

fn execute_export(tracker: &Tracker, cmd: &ExportCommand) -> Result<()> {
    let ids: Vec<CourseId> = if cmd.courses.is_empty() {
        tracker
            .courses()
            .list_all()?
            .into_iter()
            .map(|entry| entry.course.id)
            .collect()
    } else {
        cmd.courses.iter().copied().map(CourseId::new).collect()
    };

    let json = tracker.snapshots().export(&ids)?.to_json_pretty()?;
    match &cmd.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Exported {} course(s) to {}", ids.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn execute_import(tracker: &Tracker, snapshot_json: &str) -> Result<()> {
    let snapshot = Snapshot::from_json(snapshot_json)?;
    let summary = tracker.snapshots().import(&snapshot)?;

    println!(
        "Imported courses: {} new, {} updated; videos: {} new, {} updated, {} skipped; {} tag link(s)",
        summary.courses_created,
        summary.courses_updated,
        summary.videos_created,
        summary.videos_updated,
        summary.videos_skipped,
        summary.tags_linked
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYLIST: &str = r#"{
        "_type": "playlist",
        "id": "PLabc",
        "title": "Async Rust",
        "channel": "Crab Talks",
        "entries": [
            {"id": "a1", "title": "Futures", "duration": 600},
            {"id": "a2", "title": "Executors", "duration": 900}
        ]
    }"#;

    fn tracker() -> Tracker {
        Tracker::new(Database::in_memory().unwrap())
    }

    #[test]
    fn add_creates_course_with_folder_and_tags() {
        let tracker = tracker();
        let dir = tempfile::tempdir().unwrap();

        let id = execute_add(&tracker, PLAYLIST, Some(dir.path()), Some("rust, async,")).unwrap();

        let course = tracker.courses().get(id).unwrap().unwrap();
        let expected = dir.path().join("Async_Rust");
        assert_eq!(course.course.local_folder_path, expected.display().to_string());
        assert!(expected.is_dir());
        assert_eq!(course.stats.total_videos, 2);

        let tags: Vec<String> = tracker
            .tags()
            .list_for_course(id)
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(tags.len(), 2);
        assert!(tags.contains(&"rust".to_string()));
    }

    #[test]
    fn add_rejects_malformed_metadata_as_user_error() {
        let err = execute_add(&tracker(), "{}", None, None).unwrap_err();
        assert!(is_user_error(&err));
    }

    #[test]
    fn import_rejects_malformed_snapshot_as_user_error() {
        let err = execute_import(&tracker(), r#"{"courses": []}"#).unwrap_err();
        assert!(is_user_error(&err));
    }

    #[test]
    fn stats_for_existing_course_lists_videos() {
        let tracker = tracker();
        let id = execute_add(&tracker, PLAYLIST, None, None).unwrap();
        assert!(execute_stats(&tracker, Some(id)).is_ok());
        assert_eq!(status_marker(VideoStatus::Completed), 'x');
    }

    #[test]
    fn stats_for_missing_course_fails() {
        let result = execute_stats(&tracker(), Some(CourseId::new(7)));
        assert!(result.is_err());
    }

    #[test]
    fn database_errors_are_internal() {
        let err = anyhow::anyhow!("disk I/O error");
        assert!(!is_user_error(&err));
    }

    #[test]
    fn cli_parses_repeated_export_courses() {
        let cli = Cli::parse_from(["learnlog", "export", "--course", "1", "-c", "3"]);
        match cli.command {
            Commands::Export(cmd) => assert_eq!(cmd.courses, vec![1, 3]),
            _ => panic!("expected export"),
        }
    }
}
