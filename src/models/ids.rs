use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw database id.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the underlying ID value.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a course.
    ///
    /// Meaningful only inside the database that assigned it; snapshots
    /// remap these on import.
    CourseId
);

define_id!(
    /// Unique identifier for a video.
    VideoId
);

define_id!(
    /// Unique identifier for a tag.
    TagId
);

define_id!(
    /// Unique identifier for a course group.
    GroupId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_id_serializes_as_raw_integer() {
        let id = CourseId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");

        let deserialized: CourseId = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, id);
    }

    #[test]
    fn optional_group_id_serializes_as_null() {
        let none: Option<GroupId> = None;
        assert_eq!(serde_json::to_string(&none).unwrap(), "null");
        assert_eq!(
            serde_json::from_str::<Option<GroupId>>("7").unwrap(),
            Some(GroupId::new(7))
        );
    }

    #[test]
    fn ids_are_not_interchangeable() {
        // let video_id: VideoId = CourseId::new(1); // would not compile
        let course_id = CourseId::new(1);
        let video_id = VideoId::new(1);

        assert_eq!(course_id.get(), video_id.get());
        assert_eq!(format!("{course_id}"), "1");
    }
}
