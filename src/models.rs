mod course;
mod group;
mod ids;
mod stats;
mod tag;
mod video;

pub use course::{Course, CourseStats, CourseWithStats, NewCourse};
pub use group::CourseGroup;
pub use ids::{CourseId, GroupId, TagId, VideoId};
pub use stats::{CourseProgress, DashboardStats};
pub use tag::{CourseTag, Tag};
pub use video::{NewVideo, ParseStatusError, Video, VideoStatus};
