//! Message content variants and their normalization into persisted text
//!
//! Content is a closed union. Kinds listed in [`IgnoredContent`] are
//! dropped without a persisted message or an error; kinds the client could
//! not classify at all arrive as [`MessageContent::Unsupported`] and are
//! persisted with a placeholder text.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

pub mod links;

/// Placeholder text stored for unsupported content kinds
pub const NOT_IMPLEMENTED_TEXT: &str = "Not Implemented";

/// Text with formatting entities. Entity offsets count UTF-16 code units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedText {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<TextEntity>,
}

impl FormattedText {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntity {
    pub offset: i32,
    pub length: i32,
    pub kind: TextEntityKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextEntityKind {
    Url,
    /// Link hidden behind display text
    TextUrl { url: String },
    Mention,
    Other { name: String },
}

/// A file stored on the network side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: i32,
    pub remote_id: String,
    pub remote_unique_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: FormattedText,
    },
    Animation {
        caption: FormattedText,
    },
    Photo {
        caption: FormattedText,
        width: i32,
        height: i32,
        file: RemoteFile,
    },
    Video {
        caption: FormattedText,
        width: i32,
        height: i32,
        duration: i32,
        file_name: Option<String>,
        file: RemoteFile,
    },
    VideoNote {
        duration: i32,
        file: RemoteFile,
    },
    Document {
        caption: FormattedText,
        file_name: Option<String>,
        file: RemoteFile,
    },
    Audio {
        caption: FormattedText,
        file_name: Option<String>,
        duration: i32,
        file: RemoteFile,
    },
    VoiceNote {
        caption: FormattedText,
        duration: i32,
        file: RemoteFile,
    },
    Poll {
        question: String,
        options: Vec<String>,
        total_voter_count: i32,
        is_anonymous: bool,
    },
    Ignored(IgnoredContent),
    Unsupported {
        kind: String,
    },
}

/// Service messages and media kinds that carry nothing worth crawling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum IgnoredContent {
    Sticker,
    AnimatedEmoji,
    Dice,
    Location,
    Venue,
    CustomServiceAction,
    ChatJoinByLink,
    ChatAddMembers,
    ChatDeleteMember,
    ChatChangeTitle,
    ChatChangePhoto,
    ChatDeletePhoto,
    ChatSetTtl,
    ChatUpgradeFrom,
    PinMessage,
    SupergroupChatCreate,
    VideoChatScheduled,
    VideoChatStarted,
    VideoChatEnded,
    InviteVideoChatParticipants,
    Unsupported,
}

/// Media metadata persisted alongside the text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    pub file_id: Option<i32>,
    pub remote_file_id: Option<String>,
    pub remote_unique_id: Option<String>,
    pub file_name: Option<String>,
    pub duration: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl MediaInfo {
    fn from_file(file: &RemoteFile) -> Self {
        Self {
            file_id: Some(file.id),
            remote_file_id: Some(file.remote_id.clone()),
            remote_unique_id: Some(file.remote_unique_id.clone()),
            ..Default::default()
        }
    }
}

/// Content flattened into what gets persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedContent {
    pub message_type: &'static str,
    pub text: String,
    pub entities: Vec<TextEntity>,
    pub media: MediaInfo,
    pub supported: bool,
}

impl MessageContent {
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// `None` for ignored kinds
    pub fn normalize(&self) -> Option<NormalizedContent> {
        let message_type = self.kind();
        let (formatted, media) = match self {
            MessageContent::Text { text } => (text.clone(), MediaInfo::default()),
            MessageContent::Animation { caption } => (caption.clone(), MediaInfo::default()),
            MessageContent::Photo {
                caption,
                width,
                height,
                file,
            } => (
                caption.clone(),
                MediaInfo {
                    width: Some(*width),
                    height: Some(*height),
                    ..MediaInfo::from_file(file)
                },
            ),
            MessageContent::Video {
                caption,
                width,
                height,
                duration,
                file_name,
                file,
            } => (
                caption.clone(),
                MediaInfo {
                    width: Some(*width),
                    height: Some(*height),
                    duration: Some(*duration),
                    file_name: file_name.clone(),
                    ..MediaInfo::from_file(file)
                },
            ),
            MessageContent::VideoNote { duration, file } => (
                FormattedText::plain("<video note without caption>"),
                MediaInfo {
                    duration: Some(*duration),
                    ..MediaInfo::from_file(file)
                },
            ),
            MessageContent::Document {
                caption,
                file_name,
                file,
            } => (
                caption.clone(),
                MediaInfo {
                    file_name: file_name.clone(),
                    ..MediaInfo::from_file(file)
                },
            ),
            MessageContent::Audio {
                caption,
                file_name,
                duration,
                file,
            } => (
                caption.clone(),
                MediaInfo {
                    file_name: file_name.clone(),
                    duration: Some(*duration),
                    ..MediaInfo::from_file(file)
                },
            ),
            MessageContent::VoiceNote {
                caption,
                duration,
                file,
            } => (
                caption.clone(),
                MediaInfo {
                    duration: Some(*duration),
                    ..MediaInfo::from_file(file)
                },
            ),
            MessageContent::Poll {
                question,
                options,
                total_voter_count,
                is_anonymous,
            } => {
                let options: String = options.iter().map(|o| format!("\n- {o}")).collect();
                let visibility = if *is_anonymous { "anonymous" } else { "public" };
                (
                    FormattedText::plain(format!(
                        "{question}\n{options}\n\n{total_voter_count} votes ({visibility})"
                    )),
                    MediaInfo::default(),
                )
            }
            MessageContent::Ignored(_) => return None,
            MessageContent::Unsupported { .. } => {
                return Some(NormalizedContent {
                    message_type,
                    text: NOT_IMPLEMENTED_TEXT.to_string(),
                    entities: Vec::new(),
                    media: MediaInfo::default(),
                    supported: false,
                });
            }
        };

        Some(NormalizedContent {
            message_type,
            text: formatted.text,
            entities: formatted.entities,
            media,
            supported: true,
        })
    }
}

/// Substring by UTF-16 offsets; `None` when out of range or splitting a
/// surrogate pair
pub fn utf16_slice(text: &str, offset: i32, length: i32) -> Option<String> {
    let start = usize::try_from(offset).ok()?;
    let len = usize::try_from(length).ok()?;
    let units: Vec<u16> = text.encode_utf16().collect();
    let slice = units.get(start..start.checked_add(len)?)?;
    String::from_utf16(slice).ok()
}

/// Truncate to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
