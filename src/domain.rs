/// URL normalization, validation and favicon domain resolution for NovaTab
use crate::constants::{FALLBACK_FAVICON, FAVICON_SERVICE, FAVICON_SIZE, HOSTNAME_SENTINEL};
use crate::site_data::Site;
use log::warn;
use url::{Host, Url};

/// Second-level labels that, in front of a two-letter country code, form a
/// public suffix (`example.co.uk`, `example.com.au`, `example.org.nz`)
const SECOND_LEVEL_LABELS: [&str; 7] = ["co", "com", "org", "gov", "net", "edu", "ac"];

fn has_http_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Trim and make sure the URL carries a scheme
///
/// URLs already starting with `http://` or `https://` are returned as-is,
/// everything else gets `https://` in front. Blank input gives an empty string.
/// Idempotent.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if has_http_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Check whether a user-entered URL is a usable http(s) URL
///
/// The same `https://` prefixing as [`normalize_url`] is applied first, so an
/// input such as `ftp://example.com` becomes `https://ftp://example.com`,
/// which parses as an https URL with host `ftp` and is accepted.
pub fn is_valid_url(url: &str) -> bool {
    let normalized = normalize_url(url);
    if normalized.is_empty() {
        return false;
    }

    match Url::parse(&normalized) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Check whether a URL is safe to use as an image source
///
/// Only http, https and `data:image/*` URLs pass. Everything else
/// (`javascript:`, `vbscript:`, `data:text/html`, `file:`, `blob:`, ...) is
/// rejected. Anything stored as a custom icon must pass this check first.
pub fn is_valid_image_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "http" | "https" => true,
            "data" => url
                .get(..11)
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:image/")),
            _ => false,
        },
        Err(_) => false,
    }
}

/// Resolve the registrable domain used for favicon lookup
///
/// Algorithm:
/// 1. Normalize and parse the URL; on failure return `"example.com"`
/// 2. `localhost`, IP addresses and single-label hosts are returned as-is
///    (a bare word typed without a scheme is not treated as a host)
/// 3. Two-label hosts are returned as-is
/// 4. If the last label has two letters and the one before it is a known
///    second-level label (`co`, `com`, `org`, ...), keep the last three labels
/// 5. Otherwise keep the last two labels
///
/// Examples:
/// - https://www.example.com/path → example.com
/// - https://blog.example.co.uk → example.co.uk
/// - http://localhost:3000 → localhost
/// - not a url → example.com
pub fn effective_hostname(url: &str) -> String {
    let normalized = normalize_url(url);
    if normalized.is_empty() {
        return HOSTNAME_SENTINEL.to_string();
    }

    let parsed = match Url::parse(&normalized) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("NovaTab: Error parsing URL \"{}\": {}", url, e);
            return HOSTNAME_SENTINEL.to_string();
        }
    };

    let hostname = match parsed.host() {
        Some(Host::Domain(domain)) => domain.to_string(),
        Some(ip) => return ip.to_string(),
        None => return HOSTNAME_SENTINEL.to_string(),
    };

    if hostname == "localhost" {
        return hostname;
    }

    let parts: Vec<&str> = hostname.split('.').collect();

    if parts.len() == 1 {
        // "bad" on its own is a typo, not an intranet host
        if !has_http_scheme(url.trim()) {
            return HOSTNAME_SENTINEL.to_string();
        }
        return hostname;
    }

    if parts.len() == 2 {
        return hostname;
    }

    let last = parts[parts.len() - 1];
    let num_parts = if last.len() == 2 && SECOND_LEVEL_LABELS.contains(&parts[parts.len() - 2]) {
        3
    } else {
        2
    };

    parts[parts.len() - num_parts..].join(".")
}

/// Pick the icon to show for a site
///
/// Priority:
/// 1. The site's custom icon, if it is a safe image URL
/// 2. The favicon service for the site's effective hostname
/// 3. The bundled fallback icon (no URL, or no usable hostname)
pub fn favicon_url(site: &Site) -> String {
    if !site.custom_icon_url.is_empty() && is_valid_image_url(&site.custom_icon_url) {
        return site.custom_icon_url.clone();
    }

    if site.url.is_empty() {
        return FALLBACK_FAVICON.to_string();
    }

    let hostname = effective_hostname(&site.url);
    if hostname == HOSTNAME_SENTINEL {
        return FALLBACK_FAVICON.to_string();
    }

    let domain: String = url::form_urlencoded::byte_serialize(hostname.as_bytes()).collect();
    format!("{}?domain={}&sz={}", FAVICON_SERVICE, domain, FAVICON_SIZE)
}
