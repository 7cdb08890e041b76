use anyhow::Result;

use lia::config::LiaConfig;
use lia::review::ReviewGroup;

use super::review::{open_knowledge, open_scheduler, today};

/// Print every topic name, one per line.
pub fn topics(config: &LiaConfig) -> Result<()> {
    for topic in open_knowledge(config)?.topics()? {
        println!("{topic}");
    }
    Ok(())
}

/// Print every review group, most urgent first. With `due_only`, only the
/// groups due today.
pub fn review_groups(config: &LiaConfig, due_only: bool) -> Result<()> {
    let mut knowledge = open_knowledge(config)?;
    let mut scheduler = open_scheduler(config)?;
    let today = today();

    let statuses = scheduler.overview(&mut knowledge, today)?;
    let mut shown = 0;
    for status in statuses.iter().filter(|s| s.due || !due_only) {
        shown += 1;
        println!(
            "{:>3}. {}{}",
            shown,
            describe(&status.group),
            if status.due { "  [due]" } else { "" }
        );
    }

    if shown == 0 {
        println!("{}", if due_only { "Nothing to review today." } else { "No review groups." });
    }
    Ok(())
}

pub(crate) fn describe(group: &ReviewGroup) -> String {
    format!(
        "{} #{} - last review ({}) - next review ({}) - {} review(s)",
        group.topic,
        group.group_index + 1,
        group
            .last_review_date
            .map_or_else(|| "never".to_string(), |d| d.to_string()),
        group
            .next_review_date
            .map_or_else(|| "now".to_string(), |d| d.to_string()),
        group.reviews_count,
    )
}
