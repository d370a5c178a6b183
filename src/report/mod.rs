pub mod types;

pub use types::{Layout, Message};

use crate::config::NotifyConfig;
use crate::pr::diff::UpdateReason;
use crate::pr::PullRequestRecord;

impl From<&NotifyConfig> for Layout {
    fn from(config: &NotifyConfig) -> Self {
        Self {
            title: config.title.clone(),
            new_header: config.new_header.clone(),
            updated_header: config.updated_header.clone(),
            label_sections: config
                .label_sections
                .iter()
                .map(|s| (s.label.clone(), s.header.clone()))
                .collect(),
        }
    }
}

/// One line per PR: `* From <author> #<number> <url> :: <title>`.
pub fn format_pr(pr: &PullRequestRecord) -> String {
    format!("* From {} #{} {} :: {}", pr.author, pr.number, pr.url, pr.title)
}

/// Like format_pr, followed by the reasons, comma separated and
/// terminated by a period.
pub fn format_updated(update: &UpdateReason<'_>) -> String {
    let line = format_pr(update.pr);
    if update.reasons.is_empty() {
        line
    } else {
        format!("{} {}.", line, update.reasons.join(", "))
    }
}

/// Header plus one line per PR; nothing at all when `prs` is empty.
pub fn pr_section(header: &str, prs: &[&PullRequestRecord]) -> Vec<String> {
    if prs.is_empty() {
        return Vec::new();
    }
    std::iter::once(header.to_string())
        .chain(prs.iter().map(|pr| format_pr(pr)))
        .collect()
}

pub fn updated_section(header: &str, updates: &[UpdateReason<'_>]) -> Vec<String> {
    if updates.is_empty() {
        return Vec::new();
    }
    std::iter::once(header.to_string())
        .chain(updates.iter().map(format_updated))
        .collect()
}

pub fn filter_by_label<'a>(
    prs: &'a [PullRequestRecord],
    label: &str,
) -> Vec<&'a PullRequestRecord> {
    prs.iter().filter(|pr| pr.has_label(label)).collect()
}

/// Assemble the full message for one run. Returns None when there is
/// nothing to report, so the caller can skip delivery entirely.
pub fn compose(
    layout: &Layout,
    current: &[PullRequestRecord],
    new: &[&PullRequestRecord],
    updated: &[UpdateReason<'_>],
) -> Option<String> {
    let mut message = Message::new(layout.title.as_str());
    message.extend(pr_section(&layout.new_header, new));
    message.extend(updated_section(&layout.updated_header, updated));
    for (label, header) in &layout.label_sections {
        message.extend(pr_section(header, &filter_by_label(current, label)));
    }

    if message.is_empty() {
        None
    } else {
        Some(message.into_text())
    }
}
