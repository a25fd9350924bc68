//! Google Scholar profile fetching.
//!
//! Reads an author's publication list from the public profile pages
//! (`/citations?user=...`) and reports one [`ItemOutcome`] per listed row, so
//! a malformed row is skipped with a reason instead of failing the run.

use crate::error::{Result, TrackerError};
use crate::title::normalize_title;
use rand::Rng;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Profile tracked when none is configured
pub const DEFAULT_PROFILE_URL: &str = "https://scholar.google.com/citations?user=NvBZp6MAAAAJ&hl=en";

/// Largest page size the profile listing accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Longest pause allowed between profile pages, in seconds
pub const MAX_DELAY_SECS: f64 = 600.0;

/// User agent string for requests
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Scholar user id, the `user=` parameter of a profile URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the profile id from a profile URL or accept a bare id.
pub fn resolve_profile_id(input: &str) -> Result<ProfileId> {
    let input = input.trim();

    if let Ok(url) = Url::parse(input) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "user")
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(ProfileId)
            .ok_or_else(|| {
                TrackerError::ProfileResolution(format!("No user id in URL '{}'", input))
            });
    }

    // Scheme-less URLs such as `scholar.google.com/citations?user=X`
    let user_param = Regex::new(r"[?&]user=([^&#\s]+)")
        .map_err(|e| TrackerError::Parse(e.to_string()))?;
    if let Some(id) = user_param.captures(input).and_then(|caps| caps.get(1)) {
        return Ok(ProfileId(id.as_str().to_string()));
    }

    let bare_id = Regex::new(r"^[A-Za-z0-9_-]{6,}$")
        .map_err(|e| TrackerError::Parse(e.to_string()))?;
    if bare_id.is_match(input) {
        Ok(ProfileId(input.to_string()))
    } else {
        Err(TrackerError::ProfileResolution(format!(
            "'{}' is neither a profile URL nor a user id",
            input
        )))
    }
}

/// A publication row that was read successfully
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPublication {
    pub title: String,
    pub citations: u64,
}

/// Result of reading one publication row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Fetched(FetchedPublication),
    Skipped { reason: String },
}

/// Everything fetched for one author
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorPublications {
    pub author_name: String,
    pub items: Vec<ItemOutcome>,
}

impl AuthorPublications {
    /// Display title -> citation count for every fetched row.
    ///
    /// Rows are folded by normalized title in fetch order: the first spelling
    /// is kept as the display title and the last count wins.
    pub fn citations(&self) -> BTreeMap<String, u64> {
        let mut folded: HashMap<String, usize> = HashMap::new();
        let mut ordered: Vec<(String, u64)> = Vec::new();
        for item in &self.items {
            let ItemOutcome::Fetched(p) = item else {
                continue;
            };
            match folded.get(&normalize_title(&p.title)) {
                Some(&index) => ordered[index].1 = p.citations,
                None => {
                    folded.insert(normalize_title(&p.title), ordered.len());
                    ordered.push((p.title.clone(), p.citations));
                }
            }
        }
        ordered.into_iter().collect()
    }

    pub fn fetched_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, ItemOutcome::Fetched(_)))
            .count()
    }

    pub fn skip_reasons(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ItemOutcome::Skipped { reason } => Some(reason.clone()),
                ItemOutcome::Fetched(_) => None,
            })
            .collect()
    }
}

/// Source of an author's current citation counts.
pub trait PublicationSource {
    /// Fetch every publication listed for `profile`.
    ///
    /// Errors mean the author could not be located at all; per-row problems
    /// are reported as [`ItemOutcome::Skipped`].
    fn fetch_author_publications(
        &self,
        profile: &ProfileId,
    ) -> impl Future<Output = Result<AuthorPublications>>;
}

/// Options for profile fetching
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Custom base URL for mirror sites
    pub base_url: Option<String>,
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
    /// Rows requested per profile page
    pub page_size: u32,
    /// Upper bound on profile pages fetched
    pub max_pages: u32,
    /// Lower bound of the pause between page requests, in seconds
    pub delay_min_secs: f64,
    /// Upper bound of the pause between page requests, in seconds
    pub delay_max_secs: f64,
    /// `Cookie` header sent with every request, empty for none
    pub cookie_header: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            base_url: None,
            proxy: None,
            page_size: MAX_PAGE_SIZE,
            max_pages: 50,
            delay_min_secs: 2.0,
            delay_max_secs: 5.0,
            cookie_header: String::new(),
        }
    }
}

/// HTTP client for Google Scholar profile pages
pub struct ScholarClient {
    client: reqwest::Client,
    base_url: String,
    options: FetchOptions,
}

impl ScholarClient {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let base_url = options
            .base_url
            .as_ref()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_SCHOLAR_URL.to_string());

        if options.cookie_header.is_empty() {
            warn!("No cookies loaded. Run 'scholar-citations cookies import <file>' if Scholar asks for a CAPTCHA.");
        }

        Ok(Self {
            client: build_http_client(options.proxy.as_deref())?,
            base_url,
            options,
        })
    }

    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let mut request = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache");

        if !self.options.cookie_header.is_empty() {
            request = request.header("Cookie", &self.options.cookie_header);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TrackerError::RateLimited(60));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TrackerError::ProfileNotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(TrackerError::Api {
                code: status.as_u16() as i32,
                message: format!("HTTP error: {}", status),
            });
        }

        let html = response.text().await?;
        if html.contains("Solving the above CAPTCHA") || html.contains("unusual traffic") {
            return Err(TrackerError::Captcha);
        }
        Ok(html)
    }
}

impl PublicationSource for ScholarClient {
    async fn fetch_author_publications(&self, profile: &ProfileId) -> Result<AuthorPublications> {
        let page_size = self.options.page_size.clamp(1, MAX_PAGE_SIZE);
        info!(profile = %profile, url = %self.base_url, page_size, "Fetching Scholar profile");

        let this = self;
        collect_profile_pages(profile, &self.options, move |start| {
            let url = build_profile_url(&this.base_url, profile, start, page_size);
            async move {
                let url = url?;
                debug!(url = %url, "Fetching profile page");
                this.fetch_page(&url).await
            }
        })
        .await
    }
}

/// Page through a profile listing.
///
/// `fetch_page` receives the first row index of the page and returns its HTML.
/// A failed first page or a page without an author header is an error; a
/// failed later page ends paging and is recorded as a skipped item. Paging
/// stops on a short page or after `max_pages`.
async fn collect_profile_pages<F, Fut>(
    profile: &ProfileId,
    options: &FetchOptions,
    mut fetch_page: F,
) -> Result<AuthorPublications>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let page_size = options.page_size.clamp(1, MAX_PAGE_SIZE);
    let max_pages = options.max_pages.max(1);

    let mut author_name: Option<String> = None;
    let mut items = Vec::new();

    for page_index in 0..max_pages {
        if page_index > 0 {
            let delay = fetch_delay(options.delay_min_secs, options.delay_max_secs);
            debug!(delay_ms = delay.as_millis() as u64, "Waiting before next page");
            tokio::time::sleep(delay).await;
        }

        let start = page_index * page_size;
        let html = match fetch_page(start).await {
            Ok(html) => html,
            // Without the first page there is no author to report on.
            Err(e) if page_index == 0 => return Err(e),
            Err(e) => {
                error!(page = page_index + 1, error = %e, "Failed to fetch profile page");
                items.push(ItemOutcome::Skipped {
                    reason: format!("profile page {} (rows from {}): {}", page_index + 1, start, e),
                });
                break;
            }
        };

        let page = parse_profile_page(&html)?;
        if author_name.is_none() {
            match page.author_name {
                Some(name) => author_name = Some(name),
                None => return Err(TrackerError::ProfileNotFound(profile.to_string())),
            }
        }

        let row_count = page.items.len();
        info!(page = page_index + 1, rows = row_count, "Parsed profile page");
        items.extend(page.items);

        if row_count < page_size as usize {
            break;
        }
        if page_index + 1 == max_pages {
            warn!(max_pages, "Stopped at page limit");
        }
    }

    let author_name = author_name.ok_or_else(|| TrackerError::ProfileNotFound(profile.to_string()))?;
    let publications = AuthorPublications { author_name, items };
    info!(
        author = %publications.author_name,
        fetched = publications.fetched_count(),
        skipped = publications.items.len() - publications.fetched_count(),
        "Profile fetch complete"
    );
    Ok(publications)
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            TrackerError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| TrackerError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Random pause in `[min_secs, max_secs]`
fn fetch_delay(min_secs: f64, max_secs: f64) -> Duration {
    let low = if min_secs.is_finite() { min_secs.clamp(0.0, MAX_DELAY_SECS) } else { 0.0 };
    let high = if max_secs.is_finite() { max_secs.clamp(low, MAX_DELAY_SECS) } else { low };
    Duration::from_secs_f64(rand::thread_rng().gen_range(low..=high))
}

/// Build a profile listing URL
fn build_profile_url(base_url: &str, profile: &ProfileId, start: u32, page_size: u32) -> Result<Url> {
    let mut url = Url::parse(&format!("{}/citations", base_url))
        .map_err(|e| TrackerError::Config(format!("Invalid base URL: {}", e)))?;

    url.query_pairs_mut()
        .append_pair("user", profile.as_str())
        .append_pair("hl", "en") // Force English locale for consistent parsing
        .append_pair("cstart", &start.to_string())
        .append_pair("pagesize", &page_size.to_string());

    Ok(url)
}

/// One parsed profile listing page
#[derive(Debug, Clone)]
pub struct ProfilePage {
    /// Author name from the profile header, `None` if the page has no profile
    pub author_name: Option<String>,
    pub items: Vec<ItemOutcome>,
}

/// Parse a profile listing page.
pub fn parse_profile_page(html: &str) -> Result<ProfilePage> {
    let document = Html::parse_document(html);

    let name_selector =
        Selector::parse("#gsc_prf_in").map_err(|e| TrackerError::Parse(e.to_string()))?;
    let row_selector =
        Selector::parse("tr.gsc_a_tr").map_err(|e| TrackerError::Parse(e.to_string()))?;
    let title_selector =
        Selector::parse("a.gsc_a_at").map_err(|e| TrackerError::Parse(e.to_string()))?;
    let cite_selector =
        Selector::parse("a.gsc_a_ac").map_err(|e| TrackerError::Parse(e.to_string()))?;

    let author_name = document
        .select(&name_selector)
        .next()
        .map(|e| collapse(&e.text().collect::<String>()))
        .filter(|name| !name.is_empty());

    let mut items = Vec::new();
    for (index, row) in document.select(&row_selector).enumerate() {
        let title = row
            .select(&title_selector)
            .next()
            .map(|e| collapse(&e.text().collect::<String>()))
            .unwrap_or_default();

        if title.is_empty() {
            items.push(ItemOutcome::Skipped {
                reason: format!("row {}: missing title", index + 1),
            });
            continue;
        }

        let cite_text = row
            .select(&cite_selector)
            .next()
            .map(|e| e.text().collect::<String>())
            .unwrap_or_default();

        match parse_citation_count(&cite_text) {
            Some(citations) => items.push(ItemOutcome::Fetched(FetchedPublication { title, citations })),
            None => {
                warn!(title = %title, text = %cite_text.trim(), "Unreadable citation count");
                items.push(ItemOutcome::Skipped {
                    reason: format!("'{}': unreadable citation count '{}'", title, cite_text.trim()),
                });
            }
        }
    }

    Ok(ProfilePage { author_name, items })
}

/// Empty cell means no citations yet.
fn parse_citation_count(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0);
    }
    let digits: String = text.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_HTML: &str = r##"
        <html><body>
          <div id="gsc_prf_in">Ada   Lovelace</div>
          <table id="gsc_a_t"><tbody id="gsc_a_b">
            <tr class="gsc_a_tr">
              <td class="gsc_a_t"><a class="gsc_a_at" href="/citations?view_op=x">Notes on the
                Analytical Engine</a></td>
              <td class="gsc_a_c"><a class="gsc_a_ac gs_ibl" href="#">42</a></td>
            </tr>
            <tr class="gsc_a_tr">
              <td class="gsc_a_t"><a class="gsc_a_at" href="#">Uncited Letter</a></td>
              <td class="gsc_a_c"><a class="gsc_a_ac gs_ibl gsc_a_acm"></a></td>
            </tr>
            <tr class="gsc_a_tr">
              <td class="gsc_a_t"><a class="gsc_a_at" href="#">   </a></td>
              <td class="gsc_a_c"><a class="gsc_a_ac gs_ibl">7</a></td>
            </tr>
            <tr class="gsc_a_tr">
              <td class="gsc_a_t"><a class="gsc_a_at" href="#">Garbled</a></td>
              <td class="gsc_a_c"><a class="gsc_a_ac gs_ibl">n/a</a></td>
            </tr>
          </tbody></table>
        </body></html>
    "##;

    #[test]
    fn test_resolve_profile_id_from_url() {
        let id = resolve_profile_id(DEFAULT_PROFILE_URL).expect("id from URL");
        assert_eq!(id.as_str(), "NvBZp6MAAAAJ");
    }

    #[test]
    fn test_resolve_bare_profile_id() {
        let id = resolve_profile_id("  NvBZp6MAAAAJ ").expect("bare id");
        assert_eq!(id.as_str(), "NvBZp6MAAAAJ");
    }

    #[test]
    fn test_resolve_profile_id_failures() {
        assert!(matches!(
            resolve_profile_id("https://scholar.google.com/citations?hl=en"),
            Err(TrackerError::ProfileResolution(_))
        ));
        assert!(matches!(
            resolve_profile_id("not a profile"),
            Err(TrackerError::ProfileResolution(_))
        ));
    }

    #[test]
    fn test_build_profile_url() {
        let id = resolve_profile_id("NvBZp6MAAAAJ").expect("bare id");
        let url = build_profile_url("https://scholar.google.com", &id, 100, 100).expect("Failed to build URL");
        assert!(url.as_str().starts_with("https://scholar.google.com/citations?"));
        assert!(url.as_str().contains("user=NvBZp6MAAAAJ"));
        assert!(url.as_str().contains("cstart=100"));
        assert!(url.as_str().contains("pagesize=100"));
    }

    #[test]
    fn test_parse_profile_page() {
        let page = parse_profile_page(PROFILE_HTML).expect("Parse failed");
        assert_eq!(page.author_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(page.items.len(), 4);
        assert_eq!(
            page.items[0],
            ItemOutcome::Fetched(FetchedPublication {
                title: "Notes on the Analytical Engine".to_string(),
                citations: 42,
            })
        );
        assert_eq!(
            page.items[1],
            ItemOutcome::Fetched(FetchedPublication {
                title: "Uncited Letter".to_string(),
                citations: 0,
            })
        );
        assert!(matches!(page.items[2], ItemOutcome::Skipped { .. }));
        assert!(matches!(page.items[3], ItemOutcome::Skipped { .. }));
    }

    #[test]
    fn test_parse_page_without_profile() {
        let page = parse_profile_page("<html><body></body></html>").expect("Parse failed");
        assert!(page.author_name.is_none());
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_author_publications_aggregation() {
        let page = parse_profile_page(PROFILE_HTML).expect("Parse failed");
        let publications = AuthorPublications {
            author_name: "Ada Lovelace".to_string(),
            items: page.items,
        };
        assert_eq!(publications.fetched_count(), 2);
        assert_eq!(publications.skip_reasons().len(), 2);
        assert_eq!(publications.citations().get("Uncited Letter"), Some(&0));
    }

    #[test]
    fn test_fetch_delay_within_bounds() {
        for _ in 0..20 {
            let delay = fetch_delay(0.01, 0.02);
            assert!(delay >= Duration::from_secs_f64(0.01));
            assert!(delay <= Duration::from_secs_f64(0.02));
        }
        assert_eq!(fetch_delay(3.0, 1.0), Duration::from_secs(3));
        assert_eq!(fetch_delay(1.0, f64::INFINITY), Duration::from_secs(1));
        assert_eq!(fetch_delay(f64::NAN, f64::NAN), Duration::ZERO);
        assert!(fetch_delay(0.0, 1e12) <= Duration::from_secs_f64(MAX_DELAY_SECS));
    }

    #[test]
    fn test_resolve_scheme_less_profile_url() {
        let id = resolve_profile_id("scholar.google.com/citations?hl=en&user=NvBZp6MAAAAJ").expect("id from URL");
        assert_eq!(id.as_str(), "NvBZp6MAAAAJ");
    }

    #[test]
    fn test_citations_fold_in_fetch_order() {
        let fetched = |title: &str, citations: u64| {
            ItemOutcome::Fetched(FetchedPublication {
                title: title.to_string(),
                citations,
            })
        };
        let publications = AuthorPublications {
            author_name: "Ada".to_string(),
            // "ZETA paper" sorts first bytewise, but it was fetched second.
            items: vec![fetched("zeta  Paper", 1), fetched("Other", 3), fetched("ZETA paper", 2)],
        };
        let citations = publications.citations();
        assert_eq!(citations.len(), 2);
        assert_eq!(citations.get("zeta  Paper"), Some(&2));
        assert_eq!(citations.get("Other"), Some(&3));
    }

    fn listing_page(author: Option<&str>, titles: &[&str]) -> String {
        let header = author
            .map(|name| format!(r#"<div id="gsc_prf_in">{}</div>"#, name))
            .unwrap_or_default();
        let rows: String = titles
            .iter()
            .map(|t| {
                format!(
                    r#"<tr class="gsc_a_tr"><td><a class="gsc_a_at">{}</a></td><td><a class="gsc_a_ac">5</a></td></tr>"#,
                    t
                )
            })
            .collect();
        format!("<html><body>{}<table>{}</table></body></html>", header, rows)
    }

    fn paging_options(max_pages: u32) -> FetchOptions {
        FetchOptions {
            page_size: 2,
            max_pages,
            delay_min_secs: 0.0,
            delay_max_secs: 0.0,
            ..FetchOptions::default()
        }
    }

    fn profile() -> ProfileId {
        ProfileId("NvBZp6MAAAAJ".to_string())
    }

    #[tokio::test]
    async fn test_paging_stops_on_short_page() {
        let mut starts = Vec::new();
        let result = collect_profile_pages(&profile(), &paging_options(10), |start| {
            starts.push(start);
            let html = match start {
                0 => listing_page(Some("Ada"), &["A", "B"]),
                _ => listing_page(Some("Ada"), &["C"]),
            };
            std::future::ready(Ok(html))
        })
        .await
        .expect("profile fetched");

        assert_eq!(starts, vec![0, 2]);
        assert_eq!(result.author_name, "Ada");
        assert_eq!(result.fetched_count(), 3);
    }

    #[tokio::test]
    async fn test_paging_stops_at_page_limit() {
        let mut calls = 0;
        let result = collect_profile_pages(&profile(), &paging_options(3), |_| {
            calls += 1;
            std::future::ready(Ok(listing_page(Some("Ada"), &["A", "B"])))
        })
        .await
        .expect("profile fetched");

        assert_eq!(calls, 3);
        assert_eq!(result.items.len(), 6);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_fatal() {
        let result = collect_profile_pages(&profile(), &paging_options(3), |_| {
            std::future::ready(Err(TrackerError::Captcha))
        })
        .await;
        assert!(matches!(result, Err(TrackerError::Captcha)));
    }

    #[tokio::test]
    async fn test_later_page_failure_is_skipped() {
        let result = collect_profile_pages(&profile(), &paging_options(5), |start| {
            std::future::ready(match start {
                0 => Ok(listing_page(Some("Ada"), &["A", "B"])),
                _ => Err(TrackerError::RateLimited(60)),
            })
        })
        .await
        .expect("partial result");

        assert_eq!(result.fetched_count(), 2);
        let reasons = result.skip_reasons();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].starts_with("profile page 2 (rows from 2)"));
    }

    #[tokio::test]
    async fn test_missing_author_header_is_not_found() {
        let result = collect_profile_pages(&profile(), &paging_options(3), |_| {
            std::future::ready(Ok(listing_page(None, &["A"])))
        })
        .await;
        assert!(matches!(result, Err(TrackerError::ProfileNotFound(_))));
    }
}
