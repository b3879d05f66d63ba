use super::translate::Translate;
use super::ReportLabels;
use crate::trending::RepositoryRecord;
use crate::util::collapse_whitespace;
use std::fmt::Write;

/// Renders the fixed Markdown report.
///
/// Layout: title, intro paragraph, ordered summary list (one item per
/// repository), per-repository detail sections, footer. Detail bullets for
/// enrichment fields are only emitted when the field is present.
pub async fn render_markdown(
    records: &[RepositoryRecord],
    labels: &ReportLabels,
    title: &str,
    translator: Option<&dyn Translate>,
) -> String {
    let mut md = String::new();

    // write! into a String cannot fail
    let _ = writeln!(md, "# {title}\n");
    let _ = writeln!(
        md,
        "This {} brings you the most popular {}: the repositories that gained the most stars {}.\n",
        labels.report_type, labels.language, labels.time_range
    );

    md.push_str("## Trending Projects\n\n");
    for (i, repo) in records.iter().enumerate() {
        let desc = with_translation(&repo.description, translator, 3).await;
        let _ = write!(md, "{}. [{}]({})", i + 1, repo.name, repo.url);
        if !desc.is_empty() {
            let _ = write!(md, " - {desc}");
        }
        md.push('\n');
    }
    md.push('\n');

    md.push_str("## Project Details\n\n");
    for (i, repo) in records.iter().enumerate() {
        let _ = writeln!(md, "### {}. {}\n", i + 1, repo.name);

        let desc = with_translation(&repo.description, translator, 2).await;
        if !desc.is_empty() {
            let _ = writeln!(md, "- **Description**: {desc}");
        }
        let _ = writeln!(md, "- **Stars**: {}", repo.stars);
        if repo.period_stars > 0 {
            let _ = writeln!(md, "- **Stars gained**: {}", repo.period_stars);
        }
        let _ = writeln!(md, "- **Forks**: {}", repo.forks);
        let _ = writeln!(md, "- **Language**: {}", repo.language);
        let _ = writeln!(md, "- **Repository**: <{}>", repo.url);

        if let Some(d) = &repo.details {
            if !d.readme.is_empty() {
                let readme = with_translation(&collapse_whitespace(&d.readme), translator, 2).await;
                let _ = writeln!(md, "- **README**: {readme}");
            }
            if !d.contributors.is_empty() {
                let people: Vec<String> = d
                    .contributors
                    .iter()
                    .map(|c| format!("[{c}](https://github.com/{c})"))
                    .collect();
                let _ = writeln!(md, "- **Top contributors**: {}", people.join(", "));
            }
            if let Some(ts) = d.last_updated {
                let _ = writeln!(md, "- **Last updated**: {}", ts.format("%Y-%m-%d %H:%M:%S UTC"));
            }
            if let Some(license) = &d.license {
                let _ = writeln!(md, "- **License**: {license}");
            }
            if !d.topics.is_empty() {
                let _ = writeln!(md, "- **Topics**: {}", d.topics.join(", "));
            }
            if let Some(home) = &d.homepage {
                let _ = writeln!(md, "- **Homepage**: [{home}]({home})");
            }
            if d.open_issues > 0 {
                let _ = writeln!(md, "- **Open issues**: {}", d.open_issues);
            }
            if d.watchers > 0 {
                let _ = writeln!(md, "- **Watchers**: {}", d.watchers);
            }
        }
        md.push('\n');
    }

    let _ = writeln!(md, "---\n\nStatistics window: {}", labels.time_range);
    md
}

/// Returns `text`, followed by an indented quote line with its translation
/// when one is available and differs from the original.
///
/// Translation failures fall back to the original text.
async fn with_translation(text: &str, translator: Option<&dyn Translate>, indent: usize) -> String {
    let Some(translator) = translator else {
        return text.to_string();
    };
    if text.trim().is_empty() {
        return text.to_string();
    }
    match translator.translate(text).await {
        Ok(translated) if translated.trim() != text.trim() => {
            format!("{text}\n{:indent$}> {}", "", collapse_whitespace(&translated))
        }
        Ok(_) => text.to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Translation failed, keeping original text");
            text.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::translate::TranslateError;
    use crate::enrich::DetailRecord;
    use crate::trending::{TimeRange, TrendingQuery};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn repo(name: &str, desc: &str, stars: u64, forks: u64) -> RepositoryRecord {
        RepositoryRecord {
            name: name.to_string(),
            description: desc.to_string(),
            stars,
            forks,
            period_stars: 0,
            language: "Rust".to_string(),
            url: format!("https://github.com/{name}"),
            details: None,
        }
    }

    fn labels() -> ReportLabels {
        ReportLabels::from_query(&TrendingQuery::new("Rust", TimeRange::Weekly))
    }

    fn section<'a>(md: &'a str, start: &str, end: &str) -> &'a str {
        let from = md.find(start).unwrap();
        let to = md[from..].find(end).map(|i| from + i).unwrap_or(md.len());
        &md[from..to]
    }

    struct Upper;

    #[async_trait]
    impl Translate for Upper {
        async fn translate(&self, text: &str) -> Result<String, TranslateError> {
            Ok(text.to_uppercase())
        }
    }

    struct Broken;

    #[async_trait]
    impl Translate for Broken {
        async fn translate(&self, _text: &str) -> Result<String, TranslateError> {
            Err(TranslateError::Empty)
        }
    }

    #[tokio::test]
    async fn test_render_exact_layout() {
        let records = vec![repo("octo/foo", "Foo tool", 1500, 20)];
        let md = render_markdown(&records, &labels(), "Weekly", None).await;

        let expected = "# Weekly\n\n\
This weekly report brings you the most popular GitHub Rust projects: the repositories that gained the most stars in the past 7 days.\n\n\
## Trending Projects\n\n\
1. [octo/foo](https://github.com/octo/foo) - Foo tool\n\n\
## Project Details\n\n\
### 1. octo/foo\n\n\
- **Description**: Foo tool\n\
- **Stars**: 1500\n\
- **Forks**: 20\n\
- **Language**: Rust\n\
- **Repository**: <https://github.com/octo/foo>\n\n\
---\n\nStatistics window: in the past 7 days\n";
        assert_eq!(md, expected);
    }

    #[tokio::test]
    async fn test_each_repo_listed_once_per_section() {
        let records = vec![
            repo("alpha/one", "first", 10, 1),
            repo("beta/two", "", 20, 2),
            repo("gamma/three", "third", 30, 3),
        ];
        let md = render_markdown(&records, &labels(), "T", None).await;
        let summary = section(&md, "## Trending Projects", "## Project Details");
        let details = section(&md, "## Project Details", "---");

        for (i, r) in records.iter().enumerate() {
            assert_eq!(summary.matches(&format!("[{}]({})", r.name, r.url)).count(), 1);
            assert_eq!(summary.matches(r.url.as_str()).count(), 1);
            assert_eq!(details.matches(&format!("### {}. {}\n", i + 1, r.name)).count(), 1);
            assert_eq!(details.matches(r.url.as_str()).count(), 1);
        }
        // Ordered list items in input order
        assert!(summary.find("1. [alpha/one]").unwrap() < summary.find("2. [beta/two]").unwrap());
        assert!(summary.find("2. [beta/two]").unwrap() < summary.find("3. [gamma/three]").unwrap());
    }

    #[tokio::test]
    async fn test_enrichment_fields_rendered() {
        let mut r = repo("octo/foo", "", 1, 1);
        r.period_stars = 77;
        r.details = Some(DetailRecord {
            readme: "# Foo\n\nDoes   things".to_string(),
            contributors: vec!["alice".to_string(), "bob".to_string()],
            license: Some("MIT License".to_string()),
            topics: vec!["cli".to_string(), "rust".to_string()],
            homepage: Some("https://foo.dev".to_string()),
            open_issues: 3,
            watchers: 9,
            last_updated: Some(Utc.with_ymd_and_hms(2026, 10, 17, 8, 30, 0).unwrap()),
            ..DetailRecord::default()
        });
        let md = render_markdown(&[r], &labels(), "T", None).await;

        assert!(md.contains("- **Stars gained**: 77\n"));
        assert!(md.contains("- **README**: # Foo Does things\n"));
        assert!(md.contains(
            "- **Top contributors**: [alice](https://github.com/alice), [bob](https://github.com/bob)\n"
        ));
        assert!(md.contains("- **Last updated**: 2026-10-17 08:30:00 UTC\n"));
        assert!(md.contains("- **License**: MIT License\n"));
        assert!(md.contains("- **Topics**: cli, rust\n"));
        assert!(md.contains("- **Homepage**: [https://foo.dev](https://foo.dev)\n"));
        assert!(md.contains("- **Open issues**: 3\n"));
        assert!(md.contains("- **Watchers**: 9\n"));
        assert!(!md.contains("**Description**"));
    }

    #[tokio::test]
    async fn test_translation_appended() {
        let records = vec![repo("octo/foo", "fast tool", 1, 1)];
        let md = render_markdown(&records, &labels(), "T", Some(&Upper)).await;
        assert!(md.contains("1. [octo/foo](https://github.com/octo/foo) - fast tool\n   > FAST TOOL\n"));
        assert!(md.contains("- **Description**: fast tool\n  > FAST TOOL\n"));
    }

    #[tokio::test]
    async fn test_translation_failure_keeps_original() {
        let records = vec![repo("octo/foo", "fast tool", 1, 1)];
        let with_broken = render_markdown(&records, &labels(), "T", Some(&Broken)).await;
        let without = render_markdown(&records, &labels(), "T", None).await;
        assert_eq!(with_broken, without);
    }
}
