//! Failure-alert and keepalive message composition.

use super::blocks::{Block, Inline, RichTextElement};
use super::{Message, NotifyError};
use crate::ci::results::FailedRun;

const DATE_FORMAT: &str = "{date_short}, {time}";

/// One failure segment for a tracked version.
pub fn failure_segment(failed: &FailedRun) -> Block {
    let fallback = failed.finished_at.format("%Y-%m-%d %H:%M UTC").to_string();
    Block::rich_text(
        format!("result-{}", failed.version),
        vec![RichTextElement::section(vec![
            Inline::emoji("failed", 3),
            Inline::text(" "),
            Inline::text(format!("CNV informing job of {} has ", failed.version)),
            Inline::bold_link(&failed.run.url, "failed"),
            Inline::text(". Job finished at: "),
            Inline::date(failed.finished_at.timestamp(), DATE_FORMAT, fallback),
        ])],
    )
}

/// "cc: @group" segment appended to every failure alert.
pub fn mention_segment(group_id: Option<&str>) -> Result<Block, NotifyError> {
    let group_id = group_id.ok_or(NotifyError::MissingGroup)?;
    Ok(Block::rich_text(
        "mention",
        vec![RichTextElement::section(vec![
            Inline::text("cc: "),
            Inline::usergroup(group_id),
        ])],
    ))
}

/// Failure alert covering every failed version, or an empty message when
/// nothing failed.
pub fn failure_alert(failed: &[FailedRun], group_id: Option<&str>) -> Result<Message, NotifyError> {
    if failed.is_empty() {
        return Ok(Message::default());
    }
    let mut blocks: Vec<Block> = failed.iter().map(failure_segment).collect();
    blocks.push(mention_segment(group_id)?);

    let versions: Vec<&str> = failed.iter().map(|f| f.version.as_str()).collect();
    Ok(Message {
        text: format!("CNV informing jobs failed: {}", versions.join(", ")),
        blocks,
    })
}

/// Keepalive message linking each version's job-history page.
///
/// `history` holds `(version, history page URL)` pairs in tracking order.
pub fn keepalive(history: &[(String, String)], period: usize) -> Message {
    let items = history
        .iter()
        .map(|(version, url)| RichTextElement::section(vec![Inline::bold_link(url, version)]))
        .collect();
    let headline = format!(" All CNV informing jobs ran in the last {period} days have passed:");

    Message {
        text: headline.trim().to_string(),
        blocks: vec![
            Block::rich_text(
                "keepalive-message",
                vec![RichTextElement::section(vec![
                    Inline::emoji("solid-success", 2),
                    Inline::emoji("tada", 2),
                    Inline::text(headline),
                ])],
            ),
            Block::rich_text("keepalive_block", vec![RichTextElement::bullets(items)]),
        ],
    }
}
