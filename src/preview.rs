//! Best-effort link titles for the bookmark/link preview panel.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; LinkPreview/1.0)";

static OG_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*property=["']og:title["'][^>]*content=["']([^"']*)["']"#)
        .expect("static regex")
});

static TWITTER_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]*name=["']twitter:title["'][^>]*content=["']([^"']*)["']"#)
        .expect("static regex")
});

static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<title[^>]*>([^<]*)</title>").expect("static regex"));

pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Pick the page title from `og:title`, `twitter:title` or `<title>`,
/// in that order. Empty matches fall through to the next source.
pub fn extract_title(html: &str) -> Option<String> {
    [&*OG_TITLE, &*TWITTER_TITLE, &*TITLE_TAG]
        .iter()
        .filter_map(|re| re.captures(html).and_then(|caps| caps.get(1)))
        .map(|m| m.as_str().trim())
        .find(|title| !title.is_empty())
        .map(str::to_string)
}

/// Fetch `url` and return its title. Any failure yields the URL itself.
pub async fn fetch_title(client: &reqwest::Client, url: &str) -> String {
    let response = match client.get(url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::debug!(url, status = %response.status(), "Title fetch got non-success status");
            return url.to_string();
        }
        Err(e) => {
            tracing::debug!(url, error = %e, "Title fetch failed");
            return url.to_string();
        }
    };

    match response.text().await {
        Ok(html) => extract_title(&html).unwrap_or_else(|| url.to_string()),
        Err(e) => {
            tracing::debug!(url, error = %e, "Title body read failed");
            url.to_string()
        }
    }
}
