//! Tracking parameters appended to build log links in outbound messages.

use url::Url;

const UTM_CAMPAIGN: &str = "google-cloud-build-notifiers";
const UTM_MEDIUM: &str = "http";
const UTM_SOURCE: &str = "google-cloud-build";

/// Appends `utm_campaign`, `utm_medium` and `utm_source` to `log_url`.
///
/// Existing query parameters are preserved and existing `utm_*` values are
/// replaced. An empty URL stays empty; builds without logs have nothing to tag.
pub fn add_utm_params(log_url: &str) -> Result<String, url::ParseError> {
    if log_url.is_empty() {
        return Ok(String::new());
    }
    let mut url = Url::parse(log_url)?;
    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !key.starts_with("utm_"))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("utm_campaign", UTM_CAMPAIGN)
        .append_pair("utm_medium", UTM_MEDIUM)
        .append_pair("utm_source", UTM_SOURCE);
    Ok(url.into())
}
