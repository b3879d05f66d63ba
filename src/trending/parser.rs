use super::RepositoryRecord;
use crate::util::collapse_whitespace;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Language used when neither the row nor the request names one.
const UNKNOWN_LANGUAGE: &str = "Unknown";

/// Outcome of parsing one listing page.
///
/// Rows that cannot be turned into a record are counted in `skipped`
/// rather than failing the page; repeated names are counted in `duplicates`.
#[derive(Debug, Default)]
pub struct ParseResult {
    pub repositories: Vec<RepositoryRecord>,
    pub skipped: usize,
    pub duplicates: usize,
}

struct Selectors {
    entry: Selector,
    link: Selector,
    description: Selector,
    language: Selector,
    stars: Selector,
    forks: Selector,
    period_stars: Selector,
}

fn selectors() -> &'static Selectors {
    static SELECTORS: OnceLock<Selectors> = OnceLock::new();
    SELECTORS.get_or_init(|| {
        // Constant selectors; a parse failure here is a programming error.
        let parse = |s: &str| Selector::parse(s).expect("static CSS selector");
        Selectors {
            entry: parse("article.Box-row"),
            link: parse("h2 a"),
            description: parse("p"),
            language: parse(r#"span[itemprop="programmingLanguage"]"#),
            stars: parse(r#"a[href$="/stargazers"]"#),
            forks: parse(r#"a[href$="/forks"]"#),
            period_stars: parse("span.d-inline-block.float-sm-right"),
        }
    })
}

/// Parses a star/fork counter such as `"1,234"` or `" 56 "`.
///
/// Returns `None` for anything that is not a plain non-negative integer
/// once thousands separators and whitespace are removed (e.g. `"--"`).
///
/// ```
/// use trendpress::trending::parse_count;
///
/// assert_eq!(parse_count("1,234"), Some(1234));
/// assert_eq!(parse_count("--"), None);
/// ```
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Parses the HTML of a trending listing page.
///
/// `requested_language` is the language filter of the request; it becomes
/// the record language when a row carries none.
///
/// Never fails: an unrecognisable page yields an empty result, which the
/// caller treats as a soft failure (most likely an upstream markup change).
pub fn parse_trending(html: &str, requested_language: &str) -> ParseResult {
    let document = Html::parse_document(html);
    let sel = selectors();

    let mut result = ParseResult::default();
    let mut seen = HashSet::new();

    for entry in document.select(&sel.entry) {
        let Some(name) = repo_name(&entry, sel) else {
            result.skipped += 1;
            continue;
        };

        // First occurrence wins
        if !seen.insert(name.clone()) {
            tracing::debug!(repo = %name, "Duplicate trending entry ignored");
            result.duplicates += 1;
            continue;
        }

        let description = first_text(&entry, &sel.description).unwrap_or_default();

        let language = first_text(&entry, &sel.language)
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| {
                if requested_language.is_empty() {
                    UNKNOWN_LANGUAGE.to_string()
                } else {
                    requested_language.to_string()
                }
            });

        let stars = count_field(&entry, &sel.stars, &name, "stars");
        let forks = count_field(&entry, &sel.forks, &name, "forks");
        let period_stars = first_text(&entry, &sel.period_stars)
            .and_then(|t| t.split_whitespace().next().and_then(parse_count))
            .unwrap_or(0);

        result.repositories.push(RepositoryRecord {
            url: format!("https://github.com/{name}"),
            name,
            description,
            stars,
            forks,
            period_stars,
            language,
            details: None,
        });
    }

    if result.repositories.is_empty() {
        tracing::warn!(
            skipped = result.skipped,
            "No repository entries found on trending page (markup may have changed)"
        );
    } else if result.skipped > 0 {
        tracing::warn!(skipped = result.skipped, "Trending entries without a valid repository link skipped");
    }

    result
}

/// Extracts `owner/repo` from the entry heading link.
fn repo_name(entry: &ElementRef<'_>, sel: &Selectors) -> Option<String> {
    let Some(href) = entry
        .select(&sel.link)
        .next()
        .and_then(|a| a.value().attr("href"))
    else {
        tracing::warn!("Trending entry has no repository link");
        return None;
    };

    let name = href.trim().trim_matches('/');
    match name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Some(name.to_string())
        }
        _ => {
            tracing::warn!(href = %href, "Invalid repository name format");
            None
        }
    }
}

fn first_text(entry: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    entry
        .select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
}

/// Reads a counter link; malformed or missing values degrade to 0.
fn count_field(entry: &ElementRef<'_>, selector: &Selector, repo: &str, field: &str) -> u64 {
    let Some(text) = first_text(entry, selector) else {
        tracing::debug!(repo = %repo, field = field, "Counter not present, using 0");
        return 0;
    };
    match parse_count(&text) {
        Some(n) => n,
        None => {
            tracing::warn!(repo = %repo, field = field, raw = %text, "Unparseable counter, using 0");
            0
        }
    }
}
