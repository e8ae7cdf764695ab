//! Request/response surface over the tracker.
//!
//! Each request names one operation and carries its arguments:
//!
//! ```json
//! {"command": "videos:update-status", "args": {"id": 4, "status": "completed"}}
//! ```
//!
//! Replies are either `{"ok": <value>}` or
//! `{"error": {"kind": "...", "message": "..."}}`. [`serve`] speaks this
//! protocol over newline-delimited JSON.

use std::fmt;
use std::io::{BufRead, Write};

use anyhow::Result;
use rusqlite::ErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::utils::ensure_course_folder;
use crate::{
    CourseGroup, CourseId, CourseProgress, CourseWithStats, DashboardStats, GroupId,
    ImportSummary, NewCourse, Snapshot, SnapshotError, Tag, Tracker, Video, VideoId, VideoStatus,
};

/// One named operation with its arguments.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", content = "args")]
pub enum Command {
    #[serde(rename = "courses:get-all")]
    GetAllCourses,
    #[serde(rename = "courses:get-by-id")]
    GetCourse { id: CourseId },
    #[serde(rename = "courses:create")]
    CreateCourse { course: NewCourse },
    #[serde(rename = "courses:delete")]
    DeleteCourse { id: CourseId },
    #[serde(rename = "courses:update-folder")]
    UpdateCourseFolder { id: CourseId, folder_path: String },
    #[serde(rename = "courses:update-title")]
    UpdateCourseTitle { id: CourseId, title: String },
    #[serde(rename = "courses:set-group")]
    SetCourseGroup {
        id: CourseId,
        #[serde(default)]
        group_id: Option<GroupId>,
    },
    #[serde(rename = "courses:reorder")]
    ReorderCourses { ordered_ids: Vec<CourseId> },

    #[serde(rename = "videos:get-by-course")]
    GetVideosForCourse { course_id: CourseId },
    #[serde(rename = "videos:update-status")]
    UpdateVideoStatus { id: VideoId, status: String },
    #[serde(rename = "videos:update-notes")]
    UpdateVideoNotes { id: VideoId, notes: String },
    #[serde(rename = "videos:update-progress")]
    UpdateVideoProgress { id: VideoId, progress_seconds: i64 },

    #[serde(rename = "tags:get-all")]
    GetAllTags,
    #[serde(rename = "tags:get-for-course")]
    GetTagsForCourse { course_id: CourseId },
    #[serde(rename = "tags:set-for-course")]
    SetTagsForCourse { course_id: CourseId, tags: Vec<String> },

    #[serde(rename = "groups:get-all")]
    GetAllGroups,
    #[serde(rename = "groups:create")]
    CreateGroup { name: String },
    #[serde(rename = "groups:rename")]
    RenameGroup { id: GroupId, name: String },
    #[serde(rename = "groups:delete")]
    DeleteGroup { id: GroupId },
    #[serde(rename = "groups:reorder")]
    ReorderGroups { ordered_ids: Vec<GroupId> },
    /// Sets the flag when `collapsed` is given, flips it otherwise.
    #[serde(rename = "groups:toggle-collapsed")]
    ToggleGroupCollapsed {
        id: GroupId,
        #[serde(default)]
        collapsed: Option<bool>,
    },

    #[serde(rename = "data:export")]
    Export { course_ids: Vec<CourseId> },
    /// The snapshot stays raw JSON so shape problems surface as format errors.
    #[serde(rename = "data:import")]
    Import { snapshot: Value },

    #[serde(rename = "stats:get-dashboard")]
    GetDashboard,
    #[serde(rename = "stats:get-course-progress")]
    GetCourseProgress { course_id: CourseId },
}

impl Command {
    /// The wire name, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::GetAllCourses => "courses:get-all",
            Self::GetCourse { .. } => "courses:get-by-id",
            Self::CreateCourse { .. } => "courses:create",
            Self::DeleteCourse { .. } => "courses:delete",
            Self::UpdateCourseFolder { .. } => "courses:update-folder",
            Self::UpdateCourseTitle { .. } => "courses:update-title",
            Self::SetCourseGroup { .. } => "courses:set-group",
            Self::ReorderCourses { .. } => "courses:reorder",
            Self::GetVideosForCourse { .. } => "videos:get-by-course",
            Self::UpdateVideoStatus { .. } => "videos:update-status",
            Self::UpdateVideoNotes { .. } => "videos:update-notes",
            Self::UpdateVideoProgress { .. } => "videos:update-progress",
            Self::GetAllTags => "tags:get-all",
            Self::GetTagsForCourse { .. } => "tags:get-for-course",
            Self::SetTagsForCourse { .. } => "tags:set-for-course",
            Self::GetAllGroups => "groups:get-all",
            Self::CreateGroup { .. } => "groups:create",
            Self::RenameGroup { .. } => "groups:rename",
            Self::DeleteGroup { .. } => "groups:delete",
            Self::ReorderGroups { .. } => "groups:reorder",
            Self::ToggleGroupCollapsed { .. } => "groups:toggle-collapsed",
            Self::Export { .. } => "data:export",
            Self::Import { .. } => "data:import",
            Self::GetDashboard => "stats:get-dashboard",
            Self::GetCourseProgress { .. } => "stats:get-course-progress",
        }
    }
}

/// Successful result of a command. Serializes as the bare value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Mutations with nothing to report; serializes as `null`.
    Done,
    Course(Option<CourseWithStats>),
    Courses(Vec<CourseWithStats>),
    CourseCreated(CourseId),
    Videos(Vec<Video>),
    Tags(Vec<Tag>),
    Groups(Vec<CourseGroup>),
    GroupCreated(GroupId),
    /// New collapsed state, `null` for an unknown group.
    Collapsed(Option<bool>),
    Snapshot(Snapshot),
    Imported(ImportSummary),
    Dashboard(DashboardStats),
    CourseProgress(CourseProgress),
}

/// Failure category reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request or snapshot could not be understood. Nothing was written.
    Format,
    /// Storage rejected the write, e.g. a reference to a missing row.
    Constraint,
    /// The request was well-formed but an argument is not acceptable.
    InvalidArgument,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Constraint => "constraint",
            Self::InvalidArgument => "invalid_argument",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure returned by [`dispatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{kind}: {message}")]
pub struct CommandError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CommandError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }
}

impl From<SnapshotError> for CommandError {
    fn from(error: SnapshotError) -> Self {
        Self::new(ErrorKind::Format, error.to_string())
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorKind::Format, format!("invalid request: {error}"))
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(error: anyhow::Error) -> Self {
        let kind = if error.downcast_ref::<SnapshotError>().is_some() {
            ErrorKind::Format
        } else if let Some(rusqlite::Error::SqliteFailure(failure, _)) =
            error.downcast_ref::<rusqlite::Error>()
            && failure.code == ErrorCode::ConstraintViolation
        {
            ErrorKind::Constraint
        } else {
            ErrorKind::Storage
        };
        Self::new(kind, format!("{error:#}"))
    }
}

/// One line of output from [`serve`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reply {
    Ok(Response),
    Error(CommandError),
}

impl From<Result<Response, CommandError>> for Reply {
    fn from(result: Result<Response, CommandError>) -> Self {
        match result {
            Ok(response) => Self::Ok(response),
            Err(error) => Self::Error(error),
        }
    }
}

/// Runs one command against the tracker.
pub fn dispatch(tracker: &Tracker, command: Command) -> Result<Response, CommandError> {
    let name = command.name();
    tracing::debug!(command = name, "dispatching");

    let result = run(tracker, command);
    if let Err(error) = &result {
        tracing::warn!(command = name, kind = %error.kind, "{}", error.message);
    }
    result
}

fn run(tracker: &Tracker, command: Command) -> Result<Response, CommandError> {
    let response = match command {
        Command::GetAllCourses => Response::Courses(tracker.courses().list_all()?),
        Command::GetCourse { id } => Response::Course(tracker.courses().get(id)?),
        Command::CreateCourse { course } => {
            require_non_empty("title", &course.title)?;
            require_non_empty("source_url", &course.source_url)?;
            ensure_course_folder(&course.local_folder_path)?;
            Response::CourseCreated(tracker.courses().create(&course)?)
        }
        Command::DeleteCourse { id } => {
            tracker.courses().delete(id)?;
            Response::Done
        }
        Command::UpdateCourseFolder { id, folder_path } => {
            tracker.courses().update_folder_path(id, &folder_path)?;
            Response::Done
        }
        Command::UpdateCourseTitle { id, title } => {
            require_non_empty("title", &title)?;
            tracker.courses().update_title(id, title.trim())?;
            Response::Done
        }
        Command::SetCourseGroup { id, group_id } => {
            tracker.courses().set_group(id, group_id)?;
            Response::Done
        }
        Command::ReorderCourses { ordered_ids } => {
            tracker.courses().reorder_within_group(&ordered_ids)?;
            Response::Done
        }

        Command::GetVideosForCourse { course_id } => {
            Response::Videos(tracker.videos().list_for_course(course_id)?)
        }
        Command::UpdateVideoStatus { id, status } => {
            let status: VideoStatus = status
                .parse()
                .map_err(|e: crate::ParseStatusError| CommandError::invalid_argument(e.to_string()))?;
            tracker.videos().update_status(id, status)?;
            Response::Done
        }
        Command::UpdateVideoNotes { id, notes } => {
            tracker.videos().update_notes(id, &notes)?;
            Response::Done
        }
        Command::UpdateVideoProgress {
            id,
            progress_seconds,
        } => {
            tracker.videos().update_progress(id, progress_seconds)?;
            Response::Done
        }

        Command::GetAllTags => Response::Tags(tracker.tags().list_all()?),
        Command::GetTagsForCourse { course_id } => {
            Response::Tags(tracker.tags().list_for_course(course_id)?)
        }
        Command::SetTagsForCourse { course_id, tags } => {
            tracker.tags().replace_for_course(course_id, &tags)?;
            Response::Done
        }

        Command::GetAllGroups => Response::Groups(tracker.groups().list_all()?),
        Command::CreateGroup { name } => {
            require_non_empty("name", &name)?;
            Response::GroupCreated(tracker.groups().create(name.trim())?)
        }
        Command::RenameGroup { id, name } => {
            require_non_empty("name", &name)?;
            tracker.groups().rename(id, name.trim())?;
            Response::Done
        }
        Command::DeleteGroup { id } => {
            tracker.groups().delete(id)?;
            Response::Done
        }
        Command::ReorderGroups { ordered_ids } => {
            tracker.groups().reorder(&ordered_ids)?;
            Response::Done
        }
        Command::ToggleGroupCollapsed { id, collapsed } => match collapsed {
            Some(collapsed) => {
                let exists = tracker.groups().get(id)?.is_some();
                tracker.groups().set_collapsed(id, collapsed)?;
                Response::Collapsed(exists.then_some(collapsed))
            }
            None => Response::Collapsed(tracker.groups().toggle_collapsed(id)?),
        },

        Command::Export { course_ids } => {
            Response::Snapshot(tracker.snapshots().export(&course_ids)?)
        }
        Command::Import { snapshot } => {
            let snapshot = Snapshot::from_value(snapshot)?;
            Response::Imported(tracker.snapshots().import(&snapshot)?)
        }

        Command::GetDashboard => Response::Dashboard(tracker.stats().dashboard()?),
        Command::GetCourseProgress { course_id } => {
            Response::CourseProgress(tracker.stats().course_progress(course_id)?)
        }
    };
    Ok(response)
}

fn require_non_empty(field: &str, value: &str) -> Result<(), CommandError> {
    if value.trim().is_empty() {
        return Err(CommandError::invalid_argument(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(())
}

/// Parses one request line and runs it.
pub fn handle_line(tracker: &Tracker, line: &str) -> Reply {
    let result = serde_json::from_str::<Command>(line)
        .map_err(CommandError::from)
        .and_then(|command| dispatch(tracker, command));
    Reply::from(result)
}

/// Answers newline-delimited JSON requests until `reader` is exhausted.
///
/// Blank lines are ignored. Every other line gets exactly one reply line,
/// including lines that are not valid requests or not valid UTF-8.
pub fn serve<R: BufRead, W: Write>(tracker: &Tracker, mut reader: R, mut writer: W) -> Result<()> {
    let mut handled = 0usize;
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let reply = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => handle_line(tracker, line),
            Err(e) => Reply::Error(CommandError::new(
                ErrorKind::Format,
                format!("request is not valid UTF-8: {e}"),
            )),
        };
        serde_json::to_writer(&mut writer, &reply)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        handled += 1;
    }

    tracing::info!(handled, "input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use serde_json::json;

    fn tracker() -> Tracker {
        Tracker::new(Database::in_memory().unwrap())
    }

    fn parse(value: Value) -> Command {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn commands_parse_with_and_without_args() {
        assert_eq!(
            parse(json!({"command": "courses:get-all"})),
            Command::GetAllCourses
        );
        assert_eq!(
            parse(json!({"command": "videos:update-progress", "args": {"id": 3, "progress_seconds": 90}})),
            Command::UpdateVideoProgress {
                id: VideoId::new(3),
                progress_seconds: 90
            }
        );
        assert_eq!(
            parse(json!({"command": "courses:set-group", "args": {"id": 1}})),
            Command::SetCourseGroup {
                id: CourseId::new(1),
                group_id: None
            }
        );
    }

    #[test]
    fn unknown_command_is_a_format_error() {
        let reply = handle_line(&tracker(), r#"{"command": "courses:explode"}"#);
        match reply {
            Reply::Error(error) => assert_eq!(error.kind, ErrorKind::Format),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_status_is_an_invalid_argument() {
        let err = dispatch(
            &tracker(),
            Command::UpdateVideoStatus {
                id: VideoId::new(1),
                status: "done".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert!(err.message.contains("done"));
    }

    #[test]
    fn blank_group_name_is_rejected() {
        let err = dispatch(
            &tracker(),
            Command::CreateGroup {
                name: "  ".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn missing_group_reference_is_a_constraint_error() {
        let tracker = tracker();
        let course_id = tracker
            .courses()
            .create(&NewCourse::new("Course", "https://example.com/c"))
            .unwrap();

        let err = dispatch(
            &tracker,
            Command::SetCourseGroup {
                id: course_id,
                group_id: Some(GroupId::new(999)),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Constraint);
    }

    #[test]
    fn toggle_collapsed_flips_or_sets() {
        let tracker = tracker();
        let id = tracker.groups().create("Backend").unwrap();

        let toggled = dispatch(&tracker, Command::ToggleGroupCollapsed { id, collapsed: None });
        assert_eq!(toggled, Ok(Response::Collapsed(Some(true))));

        let set = dispatch(
            &tracker,
            Command::ToggleGroupCollapsed {
                id,
                collapsed: Some(true),
            },
        );
        assert_eq!(set, Ok(Response::Collapsed(Some(true))));

        let missing = dispatch(
            &tracker,
            Command::ToggleGroupCollapsed {
                id: GroupId::new(42),
                collapsed: None,
            },
        );
        assert_eq!(missing, Ok(Response::Collapsed(None)));
    }

    #[test]
    fn replies_serialize_as_ok_or_error_objects() {
        let ok = serde_json::to_value(Reply::Ok(Response::Done)).unwrap();
        assert_eq!(ok, json!({"ok": null}));

        let error = serde_json::to_value(Reply::Error(CommandError::invalid_argument("bad"))).unwrap();
        assert_eq!(
            error,
            json!({"error": {"kind": "invalid_argument", "message": "bad"}})
        );
    }

    #[test]
    fn import_with_missing_videos_is_a_format_error() {
        let err = dispatch(
            &tracker(),
            Command::Import {
                snapshot: json!({"version": 2, "courses": []}),
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Format);
    }

    #[test]
    fn serve_answers_each_non_blank_line() {
        let tracker = tracker();
        let input = concat!(
            r#"{"command": "groups:create", "args": {"name": "Systems"}}"#,
            "\n\n",
            "not json\n",
            r#"{"command": "groups:get-all"}"#,
            "\n",
        );
        let mut output = Vec::new();

        serve(&tracker, input.as_bytes(), &mut output).unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], json!({"ok": 1}));
        assert_eq!(lines[1]["error"]["kind"], "format");
        assert_eq!(lines[2]["ok"][0]["name"], "Systems");
    }

    #[test]
    fn serve_keeps_going_after_undecodable_line() {
        let tracker = tracker();
        let mut input = b"\xff\xfe bad\n".to_vec();
        input.extend_from_slice(br#"{"command": "groups:get-all"}"#);
        let mut output = Vec::new();

        serve(&tracker, input.as_slice(), &mut output).unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["error"]["kind"], "format");
        assert_eq!(lines[1], json!({"ok": []}));
    }
}
