//! Conversation data model.
//!
//! Entries in the conversation log, tool call lifecycle types and the
//! schema-derived elicitation field set. These are plain data; all
//! mutation goes through the controllers in [`crate::state`].

mod elicitation;
mod entry;
mod tools;

pub use elicitation::{
    ElicitationAction, ElicitationField, ElicitationOutcome, ElicitationRequest, FieldKind,
};
pub use entry::{
    ApprovalEntry, AssistantEntry, Attachment, AttachmentContent, ConversationEntry,
    ElicitationEntry, SendState, SystemEntry, ToolCallEntry, UserEntry,
};
pub use tools::{ApprovalStatus, Progress, ToolCallStatus};

use serde::Deserializer;

/// Helper to deserialize an id sent as either a string or an integer
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or integer")
        }

        fn visit_str<E>(self, value: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_string<E>(self, value: String) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }

        fn visit_u64<E>(self, value: u64) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(value.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

/// Same as [`deserialize_id`] for optional ids
pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_id")] String);

    Option::<Wrapper>::deserialize(deserializer).map(|opt| opt.map(|w| w.0))
}
