//! Source normalization for answer citations
//!
//! Converts the heterogeneous result items returned by the answer service
//! (video results and bare web URLs) into uniform [`Citation`] records, and
//! derives video identifiers and thumbnail URLs for video-hosted links.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use url::Url;

/// Hosts whose links are treated as video citations
const VIDEO_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
    "youtu.be",
];

/// Length of a valid video identifier token
const VIDEO_ID_LEN: usize = 11;

const THUMBNAIL_PRIMARY: &str = "https://img.youtube.com/vi/{id}/maxresdefault.jpg";
const THUMBNAIL_FALLBACK: &str = "https://img.youtube.com/vi/{id}/hqdefault.jpg";

fn video_id_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^.*(youtu\.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*")
            .expect("video id pattern is valid")
    })
}

/// Kind of a citation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    /// A regular web page
    Web,
    /// A video result
    Video,
}

/// A normalized reference attached to an assistant turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Display title
    pub title: String,
    /// Target URL
    pub url: String,
    /// Short description (empty for web citations)
    #[serde(default)]
    pub description: String,
    /// Web page or video
    pub kind: CitationKind,
}

impl Citation {
    /// Video identifier and thumbnails for a video citation
    ///
    /// Returns `None` for web citations and for video citations whose URL
    /// does not yield a recognizable identifier.
    pub fn video_ref(&self) -> Option<VideoRef> {
        if self.kind != CitationKind::Video {
            return None;
        }
        let video_id = classify(&self.url).video_id?;
        let thumbnails = to_thumbnail(&video_id);
        Some(VideoRef {
            video_id,
            thumbnails,
        })
    }
}

/// Video identity derived from a citation URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRef {
    /// The 11-character video identifier
    pub video_id: String,
    /// Candidate thumbnail URLs
    pub thumbnails: ThumbnailUrls,
}

/// Thumbnail candidates for a video: the renderer tries `primary` first
/// and falls back to the lower-resolution `fallback` on fetch failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailUrls {
    /// High-resolution thumbnail
    pub primary: String,
    /// Lower-resolution thumbnail that always exists
    pub fallback: String,
}

/// Result of classifying a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Web or video
    pub kind: CitationKind,
    /// Present exactly when `kind` is [`CitationKind::Video`]
    pub video_id: Option<String>,
}

impl Classification {
    fn web() -> Self {
        Self {
            kind: CitationKind::Web,
            video_id: None,
        }
    }
}

/// A video result as returned by the answer service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawVideoResult {
    /// Video title
    #[serde(default)]
    pub title: String,
    /// Watch URL
    pub url: String,
    /// Video description
    #[serde(default)]
    pub description: String,
}

/// Validated answer-service payload
///
/// Missing or `null` result lists are both read as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnswer {
    /// Generated answer text
    pub answer: String,
    /// Video results, in service order
    #[serde(default, alias = "youtube_videos", deserialize_with = "null_as_empty")]
    pub video_results: Vec<RawVideoResult>,
    /// Web result URLs, in service order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source_urls: Vec<String>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Classify a URL as web page or video
///
/// A URL is a video only when its host is a known video host and the
/// identifier pattern captures exactly 11 characters.
///
/// # Examples
///
/// ```
/// use askgenie::sources::{classify, CitationKind};
///
/// let c = classify("https://youtu.be/dQw4w9WgXcQ");
/// assert_eq!(c.kind, CitationKind::Video);
/// assert_eq!(c.video_id.as_deref(), Some("dQw4w9WgXcQ"));
///
/// assert_eq!(classify("https://example.com/a").kind, CitationKind::Web);
/// ```
pub fn classify(url: &str) -> Classification {
    let Ok(parsed) = Url::parse(url) else {
        return Classification::web();
    };
    let Some(host) = parsed.host_str() else {
        return Classification::web();
    };
    let host = host.to_ascii_lowercase();
    if !VIDEO_HOSTS.contains(&host.as_str()) {
        return Classification::web();
    }

    match extract_video_id(url) {
        Some(video_id) => Classification {
            kind: CitationKind::Video,
            video_id: Some(video_id),
        },
        None => Classification::web(),
    }
}

fn extract_video_id(url: &str) -> Option<String> {
    let captures = video_id_pattern().captures(url)?;
    let id = captures.get(2)?.as_str();
    (id.chars().count() == VIDEO_ID_LEN).then(|| id.to_string())
}

/// Thumbnail URLs for a video id
pub fn to_thumbnail(video_id: &str) -> ThumbnailUrls {
    ThumbnailUrls {
        primary: THUMBNAIL_PRIMARY.replace("{id}", video_id),
        fallback: THUMBNAIL_FALLBACK.replace("{id}", video_id),
    }
}

/// Map an answer payload to citations
///
/// Video results come first in service order, followed by web URLs in
/// service order. A web citation is titled with its hostname.
pub fn normalize(raw: &RawAnswer) -> Vec<Citation> {
    let videos = raw.video_results.iter().map(|video| Citation {
        title: video.title.clone(),
        url: video.url.clone(),
        description: video.description.clone(),
        kind: CitationKind::Video,
    });

    let pages = raw.source_urls.iter().map(|url| Citation {
        title: hostname_or_url(url),
        url: url.clone(),
        description: String::new(),
        kind: CitationKind::Web,
    });

    videos.chain(pages).collect()
}

fn hostname_or_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}
