// src/digest.rs
//! Digest assembly. A pure function of its inputs: the caller supplies the
//! date string, so identical inputs produce byte-identical documents.

use regex::Regex;

use crate::summarize::AnalyzedItem;

/// Pull one `**Title:** ...` section out of an analysis block. Content runs
/// until the next bold label, a trailing `---`, or end of input.
pub fn extract_section(md: &str, section_title: &str) -> Option<String> {
    let label = format!("**{section_title}:**");
    let start = md.find(&label)? + label.len();
    let rest = &md[start..];
    let end = ["\n**", "\n---"]
        .iter()
        .filter_map(|delim| rest.find(*delim))
        .min()
        .unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

/// Title from the leading `### ` heading, link from `**Source:** ...`.
pub fn extract_title_link(md: &str) -> (Option<String>, Option<String>) {
    static TITLE_RE: once_cell::sync::OnceCell<Regex> = once_cell::sync::OnceCell::new();
    let title_re = TITLE_RE.get_or_init(|| Regex::new(r"(?m)^###\s*(.+?)\s*$").unwrap());
    let title = title_re
        .captures(md)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let link = extract_section(md, "Source").map(|s| {
        s.trim_start_matches('<')
            .trim_end_matches('>')
            .trim()
            .to_string()
    });
    (title, link)
}

/// Models asked to "state none" do so in a handful of spellings.
fn is_substantive(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    !(t.is_empty()
        || t == "n/a"
        || t.starts_with("none")
        || t.starts_with("no clear")
        || t.starts_with("not clear"))
}

pub fn assemble_digest(
    news: &[AnalyzedItem],
    feed_tutorials: &[AnalyzedItem],
    generated_tutorial: Option<&str>,
    date_str: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("# AI Daily Digest - {date_str}"));
    parts.push("A curated selection of news, tutorials, and insights from your feeds.".into());
    parts.push("---".into());

    parts.push("## Top Headlines & Insights".into());
    if news.is_empty() {
        parts.push("*No relevant news items found today.*".into());
    } else {
        parts.extend(news.iter().map(|a| a.analysis_md.clone()));
    }
    parts.push("---".into());

    match generated_tutorial {
        // the generated tutorial carries its own `## Skill-Up Tutorial` header
        Some(md) => parts.push(md.to_string()),
        None => {
            parts.push("## Skill-Up Tutorial".into());
            parts.push("*Tutorial generation failed or no topic was available today.*".into());
        }
    }
    parts.push("---".into());

    parts.push("## Tutorials From Your Feeds".into());
    if feed_tutorials.is_empty() {
        parts.push("*No tutorial items found in your feeds today.*".into());
    } else {
        parts.extend(feed_tutorials.iter().map(|a| a.analysis_md.clone()));
    }
    parts.push("---".into());

    parts.push("## Market Pulse".into());
    let market: Vec<&AnalyzedItem> = news
        .iter()
        .filter(|a| {
            extract_section(&a.analysis_md, "Market/Competitive Relevance")
                .is_some_and(|s| is_substantive(&s))
        })
        .collect();
    if market.is_empty() {
        parts.push("*No market analysis in today's items.*".into());
    } else {
        for a in market {
            let (title, link) = extract_title_link(&a.analysis_md);
            let relevance = extract_section(&a.analysis_md, "Market/Competitive Relevance")
                .unwrap_or_default();
            let title = title.unwrap_or_else(|| a.ranked.item.title.clone());
            let link = link.unwrap_or_else(|| a.ranked.item.link.clone());
            parts.push(format!("- **{title}**: {relevance} ([source]({link}))"));
        }
    }
    parts.push("---".into());

    parts.push("## Actionable Ideas".into());
    let mut ideas = Vec::new();
    for a in news.iter().chain(feed_tutorials.iter()) {
        if let Some(idea) = extract_section(&a.analysis_md, "Actionable Idea") {
            if is_substantive(&idea) {
                let (title, link) = extract_title_link(&a.analysis_md);
                let attribution = match (title, link) {
                    (Some(t), Some(l)) => format!(" (from *{t}*, [source]({l}))"),
                    (Some(t), None) => format!(" (from *{t}*)"),
                    _ => String::new(),
                };
                ideas.push(format!("- {idea}{attribution}"));
            }
        }
    }
    if ideas.is_empty() {
        parts.push("*No specific actionable ideas identified today.*".into());
    } else {
        parts.extend(ideas);
    }
    parts.push("---".into());

    parts.join("\n\n")
}
