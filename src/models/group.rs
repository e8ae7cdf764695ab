use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::GroupId;

/// A user-defined, ordered folder of courses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseGroup {
    pub id: GroupId,
    pub name: String,
    /// Zero-based, dense ordering among all groups.
    pub position: i64,
    pub collapsed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
