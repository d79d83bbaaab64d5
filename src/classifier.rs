//! Media detection for posted chat text.
//!
//! Pure and deterministic. At most one attachment is derived per message;
//! the first rule that matches wins.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static YOUTUBE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([^&?#/\s]+)")
        .expect("static regex")
});

static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("static regex"));

static WHOLE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://([^/?#\s]+)\S*$").expect("static regex"));

static IMAGE_EXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(jpg|jpeg|png|gif|webp|svg|bmp)$").expect("static regex")
});

static VIDEO_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mp4|webm|ogg|mov|avi|mkv)$").expect("static regex"));

const GIF_HOSTS: &[&str] = &["giphy.com"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Video id on the video platform, not a URL.
    Youtube(String),
    Gif(String),
    Image(String),
    Video(String),
}

/// Column-shaped view of an optional attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFields {
    pub youtube_id: Option<String>,
    pub giphy_url: Option<String>,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
}

impl From<Option<Attachment>> for MediaFields {
    fn from(attachment: Option<Attachment>) -> Self {
        let mut fields = MediaFields::default();
        match attachment {
            Some(Attachment::Youtube(id)) => fields.youtube_id = Some(id),
            Some(Attachment::Gif(url)) => fields.giphy_url = Some(url),
            Some(Attachment::Image(url)) => fields.image_url = Some(url),
            Some(Attachment::Video(url)) => fields.video_url = Some(url),
            None => {}
        }
        fields
    }
}

pub fn classify(text: &str) -> Option<Attachment> {
    if let Some(id) = youtube_id(text) {
        return Some(Attachment::Youtube(id));
    }

    let trimmed = text.trim();
    if is_gif_host_url(trimmed) {
        return Some(Attachment::Gif(trimmed.to_string()));
    }

    URL.find_iter(text).find_map(|m| {
        let url = m.as_str();
        if IMAGE_EXT.is_match(url) {
            Some(Attachment::Image(url.to_string()))
        } else if VIDEO_EXT.is_match(url) {
            Some(Attachment::Video(url.to_string()))
        } else {
            None
        }
    })
}

pub fn youtube_id(text: &str) -> Option<String> {
    YOUTUBE_ID
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_gif_host_url(text: &str) -> bool {
    let Some(host) = WHOLE_URL.captures(text).and_then(|caps| caps.get(1)) else {
        return false;
    };
    let host = host.as_str().to_ascii_lowercase();
    GIF_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
}
