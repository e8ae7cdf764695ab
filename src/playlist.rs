//! Playlist metadata produced by the external fetch tool.
//!
//! The tool is run outside this crate as
//! `yt-dlp --flat-playlist --dump-single-json <url>`; this module only
//! turns its JSON output into a course payload.

use serde::Deserialize;
use thiserror::Error;

use crate::{NewCourse, NewVideo};

/// Errors that can occur while reading playlist metadata.
#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("invalid playlist metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("playlist metadata has no entries")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    #[serde(rename = "_type")]
    kind: Option<String>,
    id: String,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    webpage_url: Option<String>,
    entries: Option<Vec<RawEntry>>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: String,
    title: Option<String>,
    duration: Option<f64>,
    url: Option<String>,
}

/// One video listed in the playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub id: String,
    pub title: String,
    pub duration_seconds: Option<i64>,
    pub url: String,
}

/// A fetched playlist, or a single video presented as a one-entry playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub id: String,
    pub title: String,
    pub channel: Option<String>,
    pub url: String,
    /// False when the input described a single video.
    pub is_playlist: bool,
    pub entries: Vec<PlaylistEntry>,
}

impl PlaylistInfo {
    /// Parses the tool's JSON dump.
    ///
    /// # Examples
    ///
    /// ```
    /// use learnlog::playlist::PlaylistInfo;
    ///
    /// let info = PlaylistInfo::from_json(
    ///     r#"{"_type": "video", "id": "abc", "title": "Talk", "uploader": "Conf", "duration": 61.4}"#,
    /// ).unwrap();
    /// assert_eq!(info.entries.len(), 1);
    /// assert_eq!(info.channel.as_deref(), Some("Conf"));
    /// assert_eq!(info.entries[0].duration_seconds, Some(61));
    /// ```
    pub fn from_json(input: &str) -> Result<Self, PlaylistError> {
        let raw: RawInfo = serde_json::from_str(input)?;
        let channel = non_empty(raw.channel).or_else(|| non_empty(raw.uploader));
        let title = non_empty(raw.title).unwrap_or_else(|| raw.id.clone());

        let is_single_video = raw.entries.is_none() || raw.kind.as_deref() == Some("video");
        if is_single_video {
            let url = non_empty(raw.webpage_url).unwrap_or_else(|| watch_url(&raw.id));
            return Ok(Self {
                entries: vec![PlaylistEntry {
                    id: raw.id.clone(),
                    title: title.clone(),
                    duration_seconds: whole_seconds(raw.duration),
                    url: url.clone(),
                }],
                id: raw.id,
                title,
                channel,
                url,
                is_playlist: false,
            });
        }

        let entries: Vec<PlaylistEntry> = raw
            .entries
            .unwrap_or_default()
            .into_iter()
            .map(|entry| PlaylistEntry {
                title: non_empty(entry.title).unwrap_or_else(|| entry.id.clone()),
                duration_seconds: whole_seconds(entry.duration),
                url: non_empty(entry.url).unwrap_or_else(|| watch_url(&entry.id)),
                id: entry.id,
            })
            .collect();

        if entries.is_empty() {
            return Err(PlaylistError::Empty);
        }

        let url = non_empty(raw.webpage_url)
            .unwrap_or_else(|| format!("https://www.youtube.com/playlist?list={}", raw.id));

        Ok(Self {
            id: raw.id,
            title,
            channel,
            url,
            is_playlist: true,
            entries,
        })
    }

    /// Builds the course payload: videos numbered from 1 in playlist
    /// order, thumbnails derived from video ids, and the playlist id kept
    /// whenever the input was a playlist, even one with a single entry.
    pub fn into_new_course(self, local_folder_path: impl Into<String>) -> NewCourse {
        let source_playlist_id = self.is_playlist.then(|| self.id.clone());
        let course_thumbnail = self.entries.first().map(|entry| thumbnail_url(&entry.id));

        let videos = self
            .entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| NewVideo {
                thumbnail_url: Some(thumbnail_url(&entry.id)),
                source_video_id: entry.id,
                title: entry.title,
                duration_seconds: entry.duration_seconds,
                position: index as i64 + 1,
            })
            .collect();

        NewCourse {
            title: self.title,
            channel: self.channel,
            source_playlist_id,
            source_url: self.url,
            thumbnail_url: course_thumbnail,
            local_folder_path: local_folder_path.into(),
            videos,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Rounds a duration; zero or missing durations are unknown.
fn whole_seconds(duration: Option<f64>) -> Option<i64> {
    duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d.round() as i64)
}

fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

fn thumbnail_url(video_id: &str) -> String {
    format!("https://i.ytimg.com/vi/{video_id}/hqdefault.jpg")
}
