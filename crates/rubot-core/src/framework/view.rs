//! Derived views over a message: parsed commands and attached files.

use crate::foundation::{File, Message};
use crate::integration::FileType;

/// A `/command arg1 "arg two"` message, split into name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandView {
    /// Command name without the leading slash.
    pub name: String,
    pub args: Vec<String>,
}

impl CommandView {
    /// Parses `text` as a command. Returns `None` unless it starts with `/`
    /// followed by a name.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim_start();
        if !text.starts_with('/') {
            return None;
        }

        let mut tokens = split_args(text).into_iter();
        let name = tokens.next()?.strip_prefix('/')?.to_string();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name,
            args: tokens.collect(),
        })
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        message.text.as_deref().and_then(Self::parse)
    }

    /// Argument at `index`, if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Splits on whitespace, keeping quoted runs together.
///
/// Double quotes allow `\` escapes; single quotes are literal.
pub fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut single = false;
    let mut double = false;
    let mut escape = false;

    for ch in input.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }

        match ch {
            '\\' if double => escape = true,
            '\'' if !double => {
                single = !single;
                quoted = true;
            }
            '"' if !single => {
                double = !double;
                quoted = true;
            }
            c if c.is_whitespace() && !single && !double => {
                if !current.is_empty() || quoted {
                    args.push(std::mem::take(&mut current));
                }
                quoted = false;
            }
            c => current.push(c),
        }
    }

    if !current.is_empty() || quoted {
        args.push(current);
    }
    args
}

/// A file attached to a message, with its type inferred from the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileView {
    pub file_id: String,
    pub file_name: Option<String>,
    /// Size in bytes, when the server reported a parseable value.
    pub size: Option<u64>,
    /// Lowercased extension without the dot.
    pub extension: Option<String>,
    pub file_type: FileType,
}

impl FileView {
    pub fn from_file(file: &File) -> Self {
        let extension = file
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty());

        let file_type = extension
            .as_deref()
            .and_then(mime_for_extension)
            .map_or(FileType::File, FileType::from_mime);

        Self {
            file_id: file.file_id.clone(),
            file_name: file.file_name.clone(),
            size: file.size.as_deref().and_then(|s| s.trim().parse().ok()),
            extension,
            file_type,
        }
    }

    /// Attached file of `message`; stickers count as their image file.
    pub fn from_message(message: &Message) -> Option<Self> {
        message
            .file
            .as_ref()
            .or_else(|| message.sticker.as_ref().map(|s| &s.file))
            .map(Self::from_file)
    }

    /// Guessed mime type, if the extension is known.
    pub fn mime(&self) -> Option<&'static str> {
        self.extension.as_deref().and_then(mime_for_extension)
    }
}

/// Maps a lowercase file extension to its mime type.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "mp4" => "video/mp4",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "opus" => "audio/opus",
        "ogg" | "oga" => "audio/ogg",
        "m4a" => "audio/mp4",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "txt" => "text/plain",
        "json" => "application/json",
        _ => return None,
    })
}
