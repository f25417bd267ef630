//! Link extraction from formatted text and `t.me` target classification

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use super::{TextEntity, TextEntityKind, utf16_slice};

const TELEGRAM_BASE_URL: &str = "https://t.me/";

/// A URL found in a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    pub url: String,
    /// Target of a text link, not visible in the message text itself
    pub hidden: bool,
}

/// Collect URLs, hidden text-link targets and mentions (as `t.me` links)
pub fn extract_links(text: &str, entities: &[TextEntity]) -> Vec<ExtractedLink> {
    entities
        .iter()
        .filter_map(|entity| match &entity.kind {
            TextEntityKind::Url => {
                utf16_slice(text, entity.offset, entity.length).map(|url| ExtractedLink {
                    url,
                    hidden: false,
                })
            }
            TextEntityKind::TextUrl { url } => Some(ExtractedLink {
                url: url.clone(),
                hidden: true,
            }),
            TextEntityKind::Mention => {
                utf16_slice(text, entity.offset, entity.length).map(|mention| ExtractedLink {
                    url: format!("{TELEGRAM_BASE_URL}{mention}"),
                    hidden: false,
                })
            }
            TextEntityKind::Other { .. } => None,
        })
        .collect()
}

/// What a `t.me` link points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramTarget {
    /// Public handle, leading `@` stripped
    Handle(String),
    /// Invite link, kept in full
    InviteLink(String),
}

fn telegram_link_regex() -> Option<&'static Regex> {
    static TELEGRAM_LINK: OnceLock<Option<Regex>> = OnceLock::new();
    TELEGRAM_LINK
        .get_or_init(|| Regex::new(r"^https?://t\.me/(?:joinchat/|\+|([^?/\s]*)/?)([^?]*)$").ok())
        .as_ref()
}

/// Classify a `t.me` link; `None` for anything else, including instant-view
/// previews (`t.me/iv?url=`)
pub fn classify_telegram_link(url: &str) -> Option<TelegramTarget> {
    let captures = telegram_link_regex()?.captures(url)?;
    let full = captures.get(0)?.as_str();

    let path = full.split_once("t.me/").map(|(_, rest)| rest).unwrap_or("");
    if path.starts_with("iv?url") {
        return None;
    }

    let handle = captures
        .get(1)
        .map(|m| m.as_str().replacen('@', "", 1))
        .unwrap_or_default();

    if handle.trim().is_empty() {
        Some(TelegramTarget::InviteLink(full.to_string()))
    } else {
        Some(TelegramTarget::Handle(handle))
    }
}

/// Normalize a URL for storage: lowercase, one trailing `/` removed, PayPal
/// short forms rewritten to `https://paypal.me/...`
pub fn clean_url(raw: &str) -> String {
    let url = raw.to_lowercase();
    let url = url.strip_suffix('/').unwrap_or(&url);

    const PAYPAL_PREFIXES: [&str; 6] = [
        "http://www.paypal.me",
        "https://www.paypal.me",
        "http://paypal.me",
        "www.paypal.me",
        ".paypal.me",
        "paypal.me",
    ];

    for prefix in PAYPAL_PREFIXES {
        if let Some(rest) = url.strip_prefix(prefix) {
            return format!("https://paypal.me{rest}");
        }
    }

    url.to_string()
}

/// Registrable display domain of a URL, with mirror and mobile hosts folded
/// onto their canonical names
pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{url}")).ok())?;
    let host = parsed.host_str()?.to_lowercase();

    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("ww2."))
        .unwrap_or(&host);

    let canonical = match host {
        "youtu.be" => "youtube.com",
        "fb.watch" | "fb.com" | "fb.me" => "facebook.com",
        "de.m.wikipedia.org" => "de.wikipedia.org",
        "en.m.wikipedia.org" => "en.wikipedia.org",
        "deutsch.rt.com" => "de.rt.com",
        other => other,
    };

    let domain = canonical.strip_prefix("m.").unwrap_or(canonical);
    if domain.contains('.') {
        Some(domain.to_string())
    } else {
        None
    }
}
