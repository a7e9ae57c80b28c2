//! Text normalization for speakable chat messages.
//!
//! Chat text carries markup that sounds terrible when read aloud: custom
//! emoji tags and full URLs. This module rewrites both into short spoken
//! tokens. All functions are pure string transforms with no state; the
//! pipeline is idempotent, so re-normalizing already-normalized text is a
//! no-op.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `http(s)://...`, `www....` and bare `domain.tld...` forms.
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://\S+|www\.\S+|[A-Za-z0-9-]+\.[A-Za-z]{2,}\S*")
        .expect("URL pattern must compile")
});

/// Custom emoji markup: `<:name:id>` or `<a:name:id>` for animated ones.
static EMOJI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<a?:(\w+):\d+>").expect("emoji pattern must compile"));

/// At least one letter, including Spanish accented letters.
static LETTERS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-zÁÉÍÓÚÑáéíóúñ]").expect("letters pattern must compile"));

/// Registrable suffixes that keep three labels instead of two.
const TWO_LEVEL_TLDS: &[&str] = &["co.uk", "com.ar", "com.br", "co.jp", "co.za"];

/// Reduce a URL to its registrable base domain.
///
/// `https://www.google.com/search?q=test` becomes `google.com`,
/// `https://sub.domain.com/path` becomes `domain.com`, and two-level TLDs
/// such as `shop.example.co.uk` keep three labels (`example.co.uk`).
fn base_domain(url: &str) -> String {
    let rest = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let rest = rest.strip_prefix("www.").unwrap_or(rest);
    // Cut path, query, fragment and port.
    let rest = rest.split(&['/', '?', '#'][..]).next().unwrap_or(rest);
    let host = rest.split(':').next().unwrap_or(rest);

    let parts: Vec<&str> = host.split('.').collect();
    if parts.len() >= 3 {
        let last_two = format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);
        if TWO_LEVEL_TLDS.contains(&last_two.as_str()) {
            return parts[parts.len() - 3..].join(".");
        }
        return parts[parts.len() - 2..].join(".");
    }
    host.to_string()
}

/// Replace custom emoji markup with a spoken `emoji <name>` token.
pub fn strip_custom_emoji(text: &str) -> String {
    EMOJI_RE.replace_all(text, "emoji $1").into_owned()
}

/// Replace every URL with a spoken `<domain> enlace` token.
pub fn collapse_links(text: &str) -> String {
    URL_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let domain = base_domain(&caps[0]);
            let name = domain.split('.').next().unwrap_or(&domain);
            format!("{name} enlace")
        })
        .into_owned()
}

/// Whether the text contains anything that looks like a URL.
pub fn contains_link(text: &str) -> bool {
    URL_RE.is_match(text)
}

/// Full normalization pipeline: trim, strip emoji markup, collapse links.
///
/// Returns an empty string for input that has nothing speakable left; the
/// caller drops those silently.
pub fn normalize(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let without_emoji = strip_custom_emoji(trimmed);
    collapse_links(&without_emoji).trim().to_string()
}

/// Whether the text is worth sending to the synthesizer at all: non-empty
/// and containing at least one letter (numbers and bare symbols read badly).
pub fn is_speakable(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && LETTERS_RE.is_match(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_full_url_to_domain_token() {
        assert_eq!(
            normalize("check https://www.example.com/page now"),
            "check example enlace now"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "check https://www.example.com/page now",
            "mira www.youtube.com/watch?v=123",
            "<a:party:4455> vamos discord.gg/test",
            "plain text with no markup",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not stable for {input:?}");
        }
    }

    #[test]
    fn strips_static_and_animated_emoji() {
        assert_eq!(strip_custom_emoji("hola <:wave:12345>"), "hola emoji wave");
        assert_eq!(strip_custom_emoji("<a:party:987> ya"), "emoji party ya");
    }

    #[test]
    fn base_domain_drops_subdomains() {
        assert_eq!(base_domain("https://sub.domain.com/path"), "domain.com");
        assert_eq!(base_domain("www.youtube.com/watch?v=1"), "youtube.com");
        assert_eq!(base_domain("discord.gg/test"), "discord.gg");
        assert_eq!(base_domain("https://host.example.com:8443/x?y#z"), "example.com");
    }

    #[test]
    fn base_domain_keeps_two_level_tlds() {
        assert_eq!(base_domain("https://shop.example.co.uk/item"), "example.co.uk");
        assert_eq!(base_domain("www.tienda.com.ar"), "tienda.com.ar");
    }

    #[test]
    fn two_level_tld_collapses_to_first_label() {
        assert_eq!(
            normalize("oferta en https://shop.example.co.uk/item"),
            "oferta en example enlace"
        );
    }

    #[test]
    fn empty_and_whitespace_normalize_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t  "), "");
    }

    #[test]
    fn detects_links() {
        assert!(contains_link("ve a google.com"));
        assert!(!contains_link("no hay enlaces por aca"));
    }

    #[test]
    fn speakable_requires_letters() {
        assert!(is_speakable("hola mundo"));
        assert!(is_speakable("año nuevo"));
        assert!(!is_speakable("12345"));
        assert!(!is_speakable("!!! ???"));
        assert!(!is_speakable("   "));
    }
}
