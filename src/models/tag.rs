use serde::{Deserialize, Serialize};

use super::{CourseId, TagId};

/// A free-form label attached to courses.
///
/// Names are unique without regard to case; the first spelling stored wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

impl Tag {
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One row of the course/tag association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseTag {
    pub course_id: CourseId,
    pub tag_id: TagId,
}
