use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a Lesson (e.g. `genesis-1`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LessonId(String);

/// Identifier of the section a lesson belongs to (e.g. `genesis-creation`)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionId(String);

/// Identifier of a dialogue step, unique within its lesson
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

/// Identifier of a dialogue option, unique within its step
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

/// Identifier of the learner owning a progress record
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Creates a new id from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the underlying string value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(ParseIdError {
                        kind: stringify!($name).to_string(),
                    });
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

string_id!(LessonId);
string_id!(SectionId);
string_id!(StepId);
string_id!(OptionId);
string_id!(UserId);

// ─── FromStr Error ─────────────────────────────────────────────────────────────

/// Error type for parsing ID from string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lesson_id_display() {
        let id = LessonId::new("genesis-1");
        assert_eq!(id.to_string(), "genesis-1");
    }

    #[test]
    fn test_step_id_from_str_trims() {
        let id: StepId = "  teach-2-perfected ".parse().unwrap();
        assert_eq!(id, StepId::new("teach-2-perfected"));
    }

    #[test]
    fn test_user_id_from_str_rejects_blank() {
        let err = "   ".parse::<UserId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse UserId from string");
    }

    #[test]
    fn test_option_id_compares_with_str() {
        let id = OptionId::new("opt-1");
        assert_eq!(id, "opt-1");
        assert_eq!(format!("{id:?}"), "OptionId(\"opt-1\")");
    }

    #[test]
    fn test_ids_serialize_as_plain_strings() {
        let id = SectionId::new("genesis-creation");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"genesis-creation\"");
        let back: SectionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
