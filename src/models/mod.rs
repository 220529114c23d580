//! Core data types: forum submissions, mirror services, and the mirrored
//! record that is rendered into the summary comment.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Warning prepended to comments when the source link carries audio.
/// Gfycat strips audio tracks during transcode; the other mirrors keep them.
pub const AUDIO_WARNING: &str = "*NOTE: The original url was a Vine, which has audio. \
Gfycat removes audio, but the others should be fine*\n\n";

/// The mirror services the bot re-hosts videos on, in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorService {
    Gfycat,
    Offsided,
    Mediacrush,
    Imgur,
    Streamable,
}

impl MirrorService {
    /// All services in the fixed order mirrors appear in comments.
    pub const ALL: [MirrorService; 5] = [
        MirrorService::Gfycat,
        MirrorService::Offsided,
        MirrorService::Mediacrush,
        MirrorService::Imgur,
        MirrorService::Streamable,
    ];

    /// Stable identifier used in logs and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            MirrorService::Gfycat => "gfycat",
            MirrorService::Offsided => "offsided",
            MirrorService::Mediacrush => "mediacrush",
            MirrorService::Imgur => "imgur",
            MirrorService::Streamable => "streamable",
        }
    }

    /// Human-readable name used in rendered comments.
    pub fn display_name(&self) -> &'static str {
        match self {
            MirrorService::Gfycat => "Gfycat",
            MirrorService::Offsided => "Offsided",
            MirrorService::Mediacrush => "Mediacrush",
            MirrorService::Imgur => "Imgur",
            MirrorService::Streamable => "Streamable",
        }
    }

    /// Map a submission's source domain to the service it is already
    /// canonical on, if any. Direct-file subdomains that still need a
    /// transcode (e.g. zippy/fat gfycat hosts) intentionally map to `None`.
    pub fn from_domain(domain: &str) -> Option<MirrorService> {
        match domain {
            "gfycat.com" | "giant.gfycat.com" => Some(MirrorService::Gfycat),
            "offsided.com" => Some(MirrorService::Offsided),
            "mediacru.sh" => Some(MirrorService::Mediacrush),
            "imgur.com" | "i.imgur.com" => Some(MirrorService::Imgur),
            "streamable.com" => Some(MirrorService::Streamable),
            _ => None,
        }
    }
}

impl std::fmt::Display for MirrorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A forum post as returned by the channel listing.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Short post identifier (e.g. `2k4ha1`).
    pub id: String,
    /// Fully-qualified thing name used when commenting (e.g. `t3_2k4ha1`).
    pub fullname: String,
    /// Channel the post was found in.
    pub channel: String,
    pub title: String,
    pub url: String,
    /// Source domain as reported by the forum (e.g. `streamable.com`).
    pub domain: String,
    pub created_utc: DateTime<Utc>,
}

/// One existing comment on a post. Deleted accounts have no author;
/// that is a normal case, not an error.
#[derive(Debug, Clone)]
pub struct CommentEntry {
    pub author: Option<String>,
    pub body: String,
}

/// One playable format of a mirror (e.g. `mp4` → direct file URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFormat {
    pub label: String,
    pub url: String,
}

impl MediaFormat {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Format metadata collected per service during mirroring, consumed by
/// rendering. Rendering itself performs no network calls.
#[derive(Debug, Clone, Default)]
pub struct MirrorFormats {
    formats: HashMap<MirrorService, Vec<MediaFormat>>,
}

impl MirrorFormats {
    pub fn insert(&mut self, service: MirrorService, formats: Vec<MediaFormat>) {
        self.formats.insert(service, formats);
    }

    pub fn get(&self, service: MirrorService) -> &[MediaFormat] {
        self.formats.get(&service).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Aggregate of one post's original link and its mirrors. Serializes to a
/// flat key-value object; absent mirrors are omitted and default on parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirroredRecord {
    pub post_id: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gfycat_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsided_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mediacrush_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imgur_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streamable_url: Option<String>,
}

impl MirroredRecord {
    /// Create a record for a post before any mirrors exist.
    pub fn new(post_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            original_url: original_url.into(),
            ..Default::default()
        }
    }

    /// Canonical mirror URL for a service, if one was recorded.
    pub fn url_for(&self, service: MirrorService) -> Option<&str> {
        match service {
            MirrorService::Gfycat => self.gfycat_url.as_deref(),
            MirrorService::Offsided => self.offsided_url.as_deref(),
            MirrorService::Mediacrush => self.mediacrush_url.as_deref(),
            MirrorService::Imgur => self.imgur_url.as_deref(),
            MirrorService::Streamable => self.streamable_url.as_deref(),
        }
    }

    /// Record the canonical mirror URL for a service.
    pub fn set_url(&mut self, service: MirrorService, url: impl Into<String>) {
        let slot = match service {
            MirrorService::Gfycat => &mut self.gfycat_url,
            MirrorService::Offsided => &mut self.offsided_url,
            MirrorService::Mediacrush => &mut self.mediacrush_url,
            MirrorService::Imgur => &mut self.imgur_url,
            MirrorService::Streamable => &mut self.streamable_url,
        };
        *slot = Some(url.into());
    }

    /// Recorded mirrors in rendering order.
    pub fn mirrors(&self) -> impl Iterator<Item = (MirrorService, &str)> {
        MirrorService::ALL
            .iter()
            .filter_map(|s| self.url_for(*s).map(|url| (*s, url)))
    }

    /// Serialize to the flat key-value form used for persistence.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse from the flat key-value form, defaulting absent fields.
    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }

    /// Render the comment body for this record.
    ///
    /// Layout: audio warning (vine sources only), the original link tagged
    /// with its source domain, then one bullet per recorded mirror in fixed
    /// service order. A mirror with no usable formats still gets its bullet
    /// so the link is documented even when metadata fetch failed.
    pub fn render(&self, source_domain: &str, formats: &MirrorFormats) -> String {
        let mut s = String::from("\n");

        if !self.original_url.is_empty() {
            if self.original_url.contains("vine.co") {
                s.push_str(AUDIO_WARNING);
            }
            s.push_str(&format!(
                "* [Original ({})]({})",
                source_domain, self.original_url
            ));
        }

        for (service, url) in self.mirrors() {
            s.push_str("\n\n");
            s.push_str(&format!("* [{}]({})", service.display_name(), url));

            let media = formats.get(service);
            if !media.is_empty() {
                let parts: Vec<String> = media
                    .iter()
                    .map(|f| format!("[{}]({})", f.label, f.url))
                    .collect();
                s.push_str(" | ");
                s.push_str(&parts.join(" - "));
            }
        }

        s.push('\n');
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats_with(service: MirrorService, media: Vec<MediaFormat>) -> MirrorFormats {
        let mut formats = MirrorFormats::default();
        formats.insert(service, media);
        formats
    }

    #[test]
    fn test_render_bullet_only_for_recorded_mirrors() {
        let mut record = MirroredRecord::new("abc", "https://streamable.com/abc123");
        record.set_url(MirrorService::Streamable, "https://streamable.com/abc123");

        let out = record.render("streamable.com", &MirrorFormats::default());
        assert!(out.contains("* [Streamable](https://streamable.com/abc123)"));
        assert!(!out.contains("[Gfycat]"));
        assert!(!out.contains("[Offsided]"));
        assert!(!out.contains("[Mediacrush]"));
        assert!(!out.contains("[Imgur]"));
    }

    #[test]
    fn test_render_bullets_in_fixed_order() {
        let mut record = MirroredRecord::new("abc", "https://vine.co/v/xyz");
        record.set_url(MirrorService::Streamable, "https://streamable.com/s1");
        record.set_url(MirrorService::Gfycat, "https://gfycat.com/G1");
        record.set_url(MirrorService::Imgur, "https://imgur.com/i1");

        let out = record.render("vine.co", &MirrorFormats::default());
        let gfycat = out.find("[Gfycat]").unwrap();
        let imgur = out.find("[Imgur]").unwrap();
        let streamable = out.find("[Streamable]").unwrap();
        assert!(gfycat < imgur);
        assert!(imgur < streamable);
    }

    #[test]
    fn test_render_vine_warning_comes_first() {
        let record = MirroredRecord::new("abc", "https://vine.co/v/xyz");
        let out = record.render("vine.co", &MirrorFormats::default());
        assert!(out.trim_start().starts_with(AUDIO_WARNING.trim_start()));

        let record = MirroredRecord::new("abc", "https://gfycat.com/Tame");
        let out = record.render("gfycat.com", &MirrorFormats::default());
        assert!(!out.contains("which has audio"));
    }

    #[test]
    fn test_render_format_list_separators() {
        let mut record = MirroredRecord::new("abc", "https://example.com/a.mp4");
        record.set_url(MirrorService::Gfycat, "https://gfycat.com/G1");
        let formats = formats_with(
            MirrorService::Gfycat,
            vec![
                MediaFormat::new("mp4", "https://giant.gfycat.com/G1.mp4"),
                MediaFormat::new("webm", "https://giant.gfycat.com/G1.webm"),
                MediaFormat::new("gif", "https://giant.gfycat.com/G1.gif"),
            ],
        );

        let out = record.render("example.com", &formats);
        assert!(out.contains(
            "* [Gfycat](https://gfycat.com/G1) | \
             [mp4](https://giant.gfycat.com/G1.mp4) - \
             [webm](https://giant.gfycat.com/G1.webm) - \
             [gif](https://giant.gfycat.com/G1.gif)"
        ));
        assert!(!out.contains("gif) - \n"));
    }

    #[test]
    fn test_render_zero_formats_keeps_bare_bullet() {
        let mut record = MirroredRecord::new("abc", "https://example.com/a.mp4");
        record.set_url(MirrorService::Offsided, "https://offsided.com/v/O1");

        let out = record.render("example.com", &MirrorFormats::default());
        assert!(out.contains("* [Offsided](https://offsided.com/v/O1)"));
        assert!(!out.contains("Offsided](https://offsided.com/v/O1) |"));
    }

    #[test]
    fn test_record_round_trip() {
        let mut record = MirroredRecord::new("2k4ha1", "https://vine.co/v/xyz");
        record.set_url(MirrorService::Gfycat, "https://gfycat.com/G1");
        record.set_url(MirrorService::Streamable, "https://streamable.com/s1");

        let json = record.to_json().unwrap();
        let parsed = MirroredRecord::from_json(&json).unwrap();
        assert_eq!(record, parsed);
    }

    #[test]
    fn test_record_parse_defaults_absent_fields() {
        let parsed = MirroredRecord::from_json(
            r#"{"post_id":"abc","original_url":"https://example.com/a.gif"}"#,
        )
        .unwrap();
        assert_eq!(parsed.post_id, "abc");
        assert!(parsed.mirrors().next().is_none());
    }

    #[test]
    fn test_from_domain() {
        assert_eq!(
            MirrorService::from_domain("giant.gfycat.com"),
            Some(MirrorService::Gfycat)
        );
        assert_eq!(
            MirrorService::from_domain("i.imgur.com"),
            Some(MirrorService::Imgur)
        );
        assert_eq!(MirrorService::from_domain("zippy.gfycat.com"), None);
        assert_eq!(MirrorService::from_domain("vine.co"), None);
    }
}
