use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Query parameters stripped when URL cleaning is enabled.
///
/// This is a hand-maintained table of known tracking parameters. Entries are
/// added as platforms are encountered; nothing here is derived.
pub const TRACKING_PARAMS: &[&str] = &[
    // UTM
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "utm_id",
    "utm_source_platform",
    "utm_creative_format",
    "utm_marketing_tactic",
    // Google Ads & Analytics
    "gclid",
    "gclsrc",
    "dclid",
    "gbraid",
    "wbraid",
    "_ga",
    "_gl",
    // Facebook/Meta
    "fbclid",
    "fb_action_ids",
    "fb_action_types",
    "fb_source",
    "fb_ref",
    // Microsoft/Bing
    "msclkid",
    "mscrid",
    // TikTok
    "ttclid",
    // Twitter/X
    "twclid",
    // LinkedIn
    "li_fat_id",
    "li_source_id",
    // Instagram
    "igshid",
    "igsh",
    // HubSpot
    "_hsenc",
    "_hsmi",
    "__hssc",
    "__hstc",
    "__hsfp",
    "hsCtaTracking",
    // Marketo
    "mkt_tok",
    // Adobe
    "s_cid",
    // Mailchimp
    "mc_cid",
    "mc_eid",
    // Campaign Monitor
    "vero_id",
    "vero_conv",
    // Drip
    "__s",
    // Klaviyo
    "_kx",
    // Omnisend
    "omnisendContactID",
    // General
    "ref",
    "referer",
    "referrer",
    "source",
    "campaign",
    // Email
    "oly_anon_id",
    "oly_enc_id",
    "wickedid",
    // Other ad platforms
    "zanpid",
    "spm",
    "scm",
    "scm_id",
    // Affiliate
    "aff_id",
    "affiliate_id",
    "click_id",
    "clickid",
    // Session ids
    "sid",
    "ssid",
    "iesrc",
];

static TRACKING_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| TRACKING_PARAMS.iter().copied().collect());

/// Returns true if `name` is a known tracking parameter.
pub fn is_tracking_param(name: &str) -> bool {
    TRACKING_SET.contains(name)
}

/// Canonicalizes an absolute URL.
///
/// With `clean_urls` set, known tracking parameters are removed. Trailing
/// slashes are always dropped from non-root paths. Unparseable input is
/// returned unchanged.
pub fn normalize(raw: &str, clean_urls: bool) -> String {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(e) => {
            ::log::trace!("Leaving unparseable URL as-is ({}): {}", e, raw);
            return raw.to_string();
        }
    };

    if clean_urls {
        strip_tracking_params(&mut url);
    }

    if !url.cannot_be_a_base() && url.path().ends_with('/') {
        let trimmed = url.path().trim_end_matches('/');
        let path = if trimmed.is_empty() { "/" } else { trimmed }.to_string();
        url.set_path(&path);
    }

    url.to_string()
}

/// Removes tracking parameters in place, leaving the query untouched when
/// none are present.
fn strip_tracking_params(url: &mut Url) {
    if url.query().is_none() {
        return;
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let kept: Vec<&(String, String)> = pairs
        .iter()
        .filter(|(k, _)| !is_tracking_param(k))
        .collect();

    if kept.len() == pairs.len() {
        return;
    }

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }
}

/// Hostname of a URL, or `None` if it cannot be parsed or has no host.
pub fn host_of(raw: &str) -> Option<String> {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
}

/// Builds a readable label from a URL, e.g. `"Example - Products"`.
///
/// Falls back to `"Link"` when the URL does not parse or has no host.
pub fn label_from_url(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        return "Link".to_string();
    };
    let Some(host) = url.host_str() else {
        return "Link".to_string();
    };

    let host = host.strip_prefix("www.").unwrap_or(host);
    let parts: Vec<&str> = host.split('.').collect();
    let main = if parts.len() > 1 {
        parts[parts.len() - 2]
    } else {
        parts[0]
    };
    let domain = capitalize(main);

    match url.path_segments().and_then(|mut s| s.find(|p| !p.is_empty())) {
        Some(first) => format!("{} - {}", domain, capitalize(first)),
        None => domain,
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
