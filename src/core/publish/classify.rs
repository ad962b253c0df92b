//! Maps a validated request onto exactly one worker and its arguments.

use regex::Regex;
use std::sync::LazyLock;

use super::request::{Content, PublishRequest};
use crate::core::worker::WorkerId;

static VIDEO_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(mp4|mov|m4v|avi|mkv|webm|3gp)([?#].*)?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    ImageOnly,
    Mixed,
}

pub fn looks_like_video(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    VIDEO_EXTENSION.is_match(&lower) || lower.contains("video") || lower.contains("reel")
}

/// Any video-like entry makes the whole set mixed.
pub fn media_kind<S: AsRef<str>>(urls: &[S]) -> MediaKind {
    if urls.iter().any(|u| looks_like_video(u.as_ref())) {
        MediaKind::Mixed
    } else {
        MediaKind::ImageOnly
    }
}

/// A worker selection plus its flags. The credential is appended by the
/// invocation, not stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub worker: WorkerId,
    pub args: Vec<String>,
}

fn flag(args: &mut Vec<String>, name: &str, value: &str) {
    args.push(name.to_string());
    args.push(value.to_string());
}

fn list_flag(args: &mut Vec<String>, name: &str, values: &[String]) {
    args.push(name.to_string());
    args.extend(values.iter().cloned());
}

pub fn classify(request: &PublishRequest) -> Job {
    let scheduled = request.scheduled_at.is_some();
    let pick = |now: WorkerId, later: WorkerId| if scheduled { later } else { now };
    let mut args = Vec::new();

    let worker = match &request.content {
        Content::Image { url, caption } => {
            flag(&mut args, "--image_url", url);
            flag(&mut args, "--caption", caption);
            pick(WorkerId::PublishImage, WorkerId::PublishImageScheduled)
        }
        Content::Video { url, caption } => {
            flag(&mut args, "--video_url", url);
            flag(&mut args, "--caption", caption);
            pick(WorkerId::PublishVideo, WorkerId::PublishVideoScheduled)
        }
        Content::Story { url } => {
            flag(&mut args, "--media_url", url);
            pick(WorkerId::PublishStory, WorkerId::PublishStoryScheduled)
        }
        Content::Carousel { urls, caption } => {
            let mixed = scheduled && media_kind(urls.as_slice()) == MediaKind::Mixed;
            if mixed {
                list_flag(&mut args, "--media_urls", urls);
            } else {
                list_flag(&mut args, "--image_urls", urls);
            }
            flag(&mut args, "--caption", caption);
            match (scheduled, mixed) {
                (false, _) => WorkerId::PublishCarousel,
                (true, true) => WorkerId::PublishMixedCarouselScheduled,
                (true, false) => WorkerId::PublishCarouselScheduled,
            }
        }
        Content::MixedCarousel { urls, caption } => {
            list_flag(&mut args, "--media_urls", urls);
            flag(&mut args, "--caption", caption);
            pick(
                WorkerId::PublishMixedCarousel,
                WorkerId::PublishMixedCarouselScheduled,
            )
        }
    };

    if let Some(at) = request.scheduled_at {
        flag(&mut args, "--scheduled_time", &at.to_string());
    }

    Job { worker, args }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: Content, scheduled_at: Option<i64>) -> PublishRequest {
        PublishRequest {
            content,
            credential: "tok".to_string(),
            scheduled_at,
        }
    }

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn media_kind_detects_video_entries() {
        assert_eq!(media_kind(&["a.jpg", "b.jpg"]), MediaKind::ImageOnly);
        assert_eq!(media_kind(&["a.jpg", "b.mp4"]), MediaKind::Mixed);
        assert_eq!(media_kind(&["a.jpg", "reel123"]), MediaKind::Mixed);
        assert_eq!(
            media_kind(&["https://cdn.example/a.png", "https://cdn.example/clip.MOV?sig=1"]),
            MediaKind::Mixed
        );
        assert_eq!(
            media_kind(&["https://cdn.example/videos/123"]),
            MediaKind::Mixed
        );
        assert_eq!(
            media_kind(&["https://cdn.example/mp4-thumbs/a.jpg"]),
            MediaKind::ImageOnly
        );
    }

    #[test]
    fn image_post_immediate_and_scheduled() {
        let content = Content::Image {
            url: "https://x/a.jpg".into(),
            caption: "hello".into(),
        };
        let now = classify(&request(content.clone(), None));
        assert_eq!(now.worker, WorkerId::PublishImage);
        assert_eq!(now.args, urls(&["--image_url", "https://x/a.jpg", "--caption", "hello"]));

        let later = classify(&request(content, Some(1_750_000_000)));
        assert_eq!(later.worker, WorkerId::PublishImageScheduled);
        assert_eq!(
            later.args,
            urls(&[
                "--image_url",
                "https://x/a.jpg",
                "--caption",
                "hello",
                "--scheduled_time",
                "1750000000"
            ])
        );
    }

    #[test]
    fn story_has_no_caption_flag() {
        let job = classify(&request(Content::Story { url: "s.jpg".into() }, None));
        assert_eq!(job.worker, WorkerId::PublishStory);
        assert_eq!(job.args, urls(&["--media_url", "s.jpg"]));
    }

    #[test]
    fn immediate_carousel_keeps_order() {
        let job = classify(&request(
            Content::Carousel {
                urls: urls(&["b.jpg", "a.jpg", "c.mp4"]),
                caption: "c".into(),
            },
            None,
        ));
        assert_eq!(job.worker, WorkerId::PublishCarousel);
        assert_eq!(
            job.args,
            urls(&["--image_urls", "b.jpg", "a.jpg", "c.mp4", "--caption", "c"])
        );
    }

    #[test]
    fn scheduled_carousel_picks_worker_by_media_kind() {
        let images = classify(&request(
            Content::Carousel {
                urls: urls(&["a.jpg", "b.jpg"]),
                caption: "c".into(),
            },
            Some(10),
        ));
        assert_eq!(images.worker, WorkerId::PublishCarouselScheduled);
        assert_eq!(images.args[0], "--image_urls");

        let mixed = classify(&request(
            Content::Carousel {
                urls: urls(&["a.jpg", "b.mp4"]),
                caption: "c".into(),
            },
            Some(10),
        ));
        assert_eq!(mixed.worker, WorkerId::PublishMixedCarouselScheduled);
        assert_eq!(mixed.args[0], "--media_urls");
        assert_eq!(mixed.args.last().map(String::as_str), Some("10"));
    }

    #[test]
    fn mixed_carousel_route_forces_mixed_worker() {
        let job = classify(&request(
            Content::MixedCarousel {
                urls: urls(&["a.jpg", "b.jpg"]),
                caption: "c".into(),
            },
            Some(10),
        ));
        assert_eq!(job.worker, WorkerId::PublishMixedCarouselScheduled);
    }
}
