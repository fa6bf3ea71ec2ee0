//! Discord message layout for merged pull requests

use prwatch_core::PullRequestRecord;
use serde::Serialize;

/// GitHub's merged-PR green
pub const MERGED_COLOR: u32 = 0x28a745;
pub const MAX_TITLE_CHARS: usize = 256;
pub const MAX_DESCRIPTION_CHARS: usize = 400;

const NO_DESCRIPTION: &str = "No description provided.";

/// Body of a webhook POST
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    pub username: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub url: String,
    pub color: u32,
    /// RFC3339
    pub timestamp: String,
    pub author: EmbedAuthor,
    pub fields: Vec<EmbedField>,
    pub footer: EmbedFooter,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EmbedFooter {
    pub text: String,
    pub icon_url: String,
}

/// Cut `text` to `max` characters, marking the cut with "..."
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Build the embed announcing `pr`
pub fn pr_embed(pr: &PullRequestRecord, icon_url: &str) -> Embed {
    let title = truncate(&pr.title, MAX_TITLE_CHARS);
    let body = pr
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or(NO_DESCRIPTION);
    let description = truncate(body, MAX_DESCRIPTION_CHARS);

    Embed {
        title: format!("🎉 PR #{} merged to {}", pr.number, pr.base_branch),
        description: format!("**{title}**\n\n{description}"),
        url: pr.url.clone(),
        color: MERGED_COLOR,
        timestamp: pr.merged_at.to_rfc3339(),
        author: EmbedAuthor {
            name: pr.author.login.clone(),
            icon_url: pr.author.avatar_url.clone(),
            url: format!("https://github.com/{}", pr.author.login),
        },
        fields: vec![
            EmbedField {
                name: "📊 Changes".to_string(),
                value: format!(
                    "**+{}** / **-{}** lines\n**{}** files changed",
                    pr.additions, pr.deletions, pr.changed_files
                ),
                inline: true,
            },
            EmbedField {
                name: "🔀 Branches".to_string(),
                value: format!(
                    "**From:** `{}`\n**To:** `{}`",
                    pr.head_branch, pr.base_branch
                ),
                inline: true,
            },
            EmbedField {
                name: "⏰ Merged".to_string(),
                value: format!("<t:{}:R>", pr.merged_at.timestamp()),
                inline: true,
            },
        ],
        footer: EmbedFooter {
            text: format!("GitHub • {} commit(s)", pr.commits),
            icon_url: icon_url.to_string(),
        },
    }
}
