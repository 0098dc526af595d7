//! Deterministic contact extraction
//!
//! Supports extraction of:
//! - Email addresses (mailto links, plain text, common obfuscations)
//! - Phone numbers (tel links, plain text)

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

// Obfuscation decoders, applied in order
static OBFUSCATED_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{]\s*at\s*[\]\)\}]\s*").unwrap()
});

static OBFUSCATED_DOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{]\s*dot\s*[\]\)\}]\s*").unwrap()
});

static ENTITY_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&#0*64;|&#x0*40;|&commat;").unwrap()
});

static ENTITY_DOT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&#0*46;|&#x0*2e;|&period;").unwrap()
});

static SPACED_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z0-9._%+-])[ \t]+@[ \t]+([A-Za-z0-9-])").unwrap()
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.([a-z]{2,24})\b").unwrap()
});

static EMAIL_EXACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9-]+(?:\.[a-z0-9-]+)*\.[a-z]{2,10}$").unwrap()
});

static MAILTO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)mailto:([^"'?<>\s]+)"#).unwrap()
});

static HASHED_LOCAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-f0-9]{16,}$").unwrap()
});

static TEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["']tel:([^"']+)["']"#).unwrap()
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?\(?\d[\d \t().\-]{5,20}\d").unwrap()
});

static DATE_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}[-/.]\d{1,2}[-/.]\d{1,2}|\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4})$").unwrap()
});

/// Inclusive digit-count range for a phone candidate
pub const PHONE_DIGITS: std::ops::RangeInclusive<usize> = 7..=15;

const NOREPLY_PREFIXES: &[&str] = &["noreply", "no-reply", "no_reply", "donotreply", "do-not-reply", "mailer-daemon"];

const PLACEHOLDER_DOMAINS: &[&str] = &[
    "domain.com", "yourdomain.com", "yoursite.com", "mysite.com", "email.com",
    "sentry.io", "wixpress.com", "sentry-next.wixpress.com", "example.invalid",
];

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico", ".bmp"];

/// Undo the usual anti-scraper spellings of `@` and `.`
pub fn decode_obfuscations(input: &str) -> String {
    let decoded = ENTITY_AT.replace_all(input, "@");
    let decoded = ENTITY_DOT.replace_all(&decoded, ".");
    let decoded = OBFUSCATED_AT.replace_all(&decoded, "@");
    let decoded = OBFUSCATED_DOT.replace_all(&decoded, ".");
    SPACED_AT.replace_all(&decoded, "$1@$2").into_owned()
}

/// Whether an address looks like tracking noise or a template placeholder
pub fn is_junk_email(email: &str) -> bool {
    let lower = email.to_lowercase();
    let Some((local, domain)) = lower.split_once('@') else {
        return true;
    };

    if HASHED_LOCAL.is_match(local) {
        return true;
    }
    if NOREPLY_PREFIXES.iter().any(|p| local.starts_with(p)) {
        return true;
    }
    if PLACEHOLDER_DOMAINS.iter().any(|d| domain == *d) {
        return true;
    }
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| local.contains(ext) || domain.ends_with(ext))
}

fn push_email(found: &mut Vec<String>, seen: &mut HashSet<String>, candidate: &str) {
    let email = candidate.trim().trim_end_matches('.').to_lowercase();
    if !EMAIL_EXACT.is_match(&email) || is_junk_email(&email) {
        return;
    }
    if seen.insert(email.clone()) {
        found.push(email);
    }
}

/// Extract email addresses from markup and visible text
///
/// `mailto:` links come first as the highest-confidence source. Results
/// are lowercased and deduplicated in discovery order.
pub fn extract_emails(html: &str, text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for cap in MAILTO_REGEX.captures_iter(html) {
        let raw = cap[1].replace("%40", "@");
        push_email(&mut found, &mut seen, &raw);
    }

    for source in [html, text] {
        let decoded = decode_obfuscations(source);
        for cap in EMAIL_REGEX.captures_iter(&decoded) {
            let tld_len = cap[1].len();
            if !(2..=10).contains(&tld_len) {
                continue;
            }
            push_email(&mut found, &mut seen, &cap[0]);
        }
    }

    found
}

/// Count the digits of a phone candidate
pub fn phone_digit_count(candidate: &str) -> usize {
    candidate.chars().filter(|c| c.is_ascii_digit()).count()
}

fn push_phone(found: &mut Vec<String>, seen: &mut HashSet<String>, candidate: &str) {
    let trimmed = candidate.trim();
    if DATE_LIKE.is_match(trimmed) {
        return;
    }
    if !PHONE_DIGITS.contains(&phone_digit_count(trimmed)) {
        return;
    }
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if seen.insert(digits) {
        found.push(trimmed.to_string());
    }
}

/// Extract phone numbers from `tel:` links and visible text
///
/// Candidates keep their original formatting; dedup is on the digits.
pub fn extract_phones(html: &str, text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for cap in TEL_REGEX.captures_iter(html) {
        push_phone(&mut found, &mut seen, &cap[1].replace("%20", " "));
    }

    for m in PHONE_REGEX.find_iter(text) {
        // A window cut out of a longer digit run is an ID, not a phone
        let digit_before = text[..m.start()].chars().next_back().is_some_and(|c| c.is_ascii_digit());
        let digit_after = text[m.end()..].chars().next().is_some_and(|c| c.is_ascii_digit());
        if digit_before || digit_after {
            continue;
        }
        push_phone(&mut found, &mut seen, m.as_str());
    }

    found
}
