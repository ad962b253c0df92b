//! Request boundary for publish and schedule calls.
//!
//! Everything a worker needs is checked here, before any process starts.
//! A `PublishRequest` only exists once the body is complete and well formed.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub const MIN_CAROUSEL_ITEMS: usize = 2;
pub const MAX_CAROUSEL_ITEMS: usize = 10;

/// Content kinds addressable from the route path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Image,
    Video,
    Story,
    Carousel,
    MixedCarousel,
}

impl ContentKind {
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "image" | "post" => Some(ContentKind::Image),
            "video" => Some(ContentKind::Video),
            "story" => Some(ContentKind::Story),
            "carousel" => Some(ContentKind::Carousel),
            "mixed-carousel" => Some(ContentKind::MixedCarousel),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Image => "image",
            ContentKind::Video => "video",
            ContentKind::Story => "story",
            ContentKind::Carousel => "carousel",
            ContentKind::MixedCarousel => "mixed-carousel",
        }
    }

    /// Stories are published without a caption.
    pub fn shows_caption(self) -> bool {
        !matches!(self, ContentKind::Story)
    }

    pub fn is_carousel(self) -> bool {
        matches!(self, ContentKind::Carousel | ContentKind::MixedCarousel)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Immediate,
    Scheduled,
}

/// Raw JSON body as the dashboard sends it. Field aliases cover the names
/// individual dashboard forms use.
#[derive(Default, Deserialize)]
pub struct PublishBody {
    #[serde(default, alias = "access_token", alias = "token")]
    pub credential: Option<String>,
    #[serde(default, alias = "image_url", alias = "video_url")]
    pub media_url: Option<String>,
    #[serde(default, alias = "image_urls")]
    pub media_urls: Option<Vec<String>>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Image { url: String, caption: String },
    Video { url: String, caption: String },
    Story { url: String },
    Carousel { urls: Vec<String>, caption: String },
    MixedCarousel { urls: Vec<String>, caption: String },
}

impl Content {
    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Image { .. } => ContentKind::Image,
            Content::Video { .. } => ContentKind::Video,
            Content::Story { .. } => ContentKind::Story,
            Content::Carousel { .. } => ContentKind::Carousel,
            Content::MixedCarousel { .. } => ContentKind::MixedCarousel,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub content: Content,
    pub credential: String,
    /// Epoch seconds; `None` publishes immediately.
    pub scheduled_at: Option<i64>,
}

impl fmt::Debug for PublishRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishRequest")
            .field("content", &self.content)
            .field("credential", &"<redacted>")
            .field("scheduled_at", &self.scheduled_at)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    fn missing(field: &'static str) -> Self {
        Self::new(field, format!("{field} is required"))
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ValidationError::missing(field))
}

/// Credential check shared by every endpoint that launches a worker.
pub fn require_credential(value: Option<String>) -> Result<String, ValidationError> {
    required(value, "credential")
}

fn carousel_urls(urls: Option<Vec<String>>) -> Result<Vec<String>, ValidationError> {
    let urls = urls.ok_or_else(|| ValidationError::missing("media_urls"))?;
    if urls.iter().any(|u| u.trim().is_empty()) {
        return Err(ValidationError::new(
            "media_urls",
            "media_urls must not contain empty entries",
        ));
    }
    if !(MIN_CAROUSEL_ITEMS..=MAX_CAROUSEL_ITEMS).contains(&urls.len()) {
        return Err(ValidationError::new(
            "media_urls",
            format!(
                "a carousel needs between {MIN_CAROUSEL_ITEMS} and {MAX_CAROUSEL_ITEMS} items, got {}",
                urls.len()
            ),
        ));
    }
    Ok(urls.into_iter().map(|u| u.trim().to_string()).collect())
}

fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::new("date", "date must be formatted as YYYY-MM-DD"))
}

fn parse_time(raw: &str) -> Result<NaiveTime, ValidationError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ValidationError::new("time", "time must be formatted as HH:MM"))
}

/// Combines a calendar date and time of day in `tz` into epoch seconds.
pub fn schedule_timestamp_in<Tz: TimeZone>(
    tz: &Tz,
    date: &str,
    time: &str,
) -> Result<i64, ValidationError> {
    let local = NaiveDateTime::new(parse_date(date)?, parse_time(time)?);
    tz.from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| {
            ValidationError::new("time", "that time does not exist in the server's time zone")
        })
}

impl PublishBody {
    /// Validates against the server's local time zone and clock.
    pub fn validate(
        self,
        kind: ContentKind,
        mode: Mode,
    ) -> Result<PublishRequest, ValidationError> {
        self.validate_in(kind, mode, &Local, Utc::now())
    }

    /// Checks run in a fixed order so the first missing field is the one
    /// reported: credential, media, caption, schedule.
    pub fn validate_in<Tz: TimeZone>(
        self,
        kind: ContentKind,
        mode: Mode,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> Result<PublishRequest, ValidationError> {
        let credential = require_credential(self.credential)?;

        let content = if kind.is_carousel() {
            let urls = carousel_urls(self.media_urls)?;
            let caption = required(self.caption, "caption")?;
            match kind {
                ContentKind::MixedCarousel => Content::MixedCarousel { urls, caption },
                _ => Content::Carousel { urls, caption },
            }
        } else {
            let url = required(self.media_url, "media_url")?;
            if !kind.shows_caption() {
                Content::Story { url }
            } else {
                let caption = required(self.caption, "caption")?;
                match kind {
                    ContentKind::Video => Content::Video { url, caption },
                    _ => Content::Image { url, caption },
                }
            }
        };

        let scheduled_at = match mode {
            Mode::Immediate => None,
            Mode::Scheduled => {
                let date = required(self.date, "date")?;
                let time = required(self.time, "time")?;
                let at = schedule_timestamp_in(tz, &date, &time)?;
                if at <= now.timestamp() {
                    return Err(ValidationError::new(
                        "time",
                        "the scheduled time must be in the future",
                    ));
                }
                Some(at)
            }
        };

        Ok(PublishRequest {
            content,
            credential,
            scheduled_at,
        })
    }
}
