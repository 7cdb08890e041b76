use anyhow::{Context, Result};
use chrono::NaiveDate;

use lia::config::LiaConfig;
use lia::knowledge::KnowledgeStore;
use lia::review::{ReviewScheduler, ScheduleStore};

use super::list::describe;
use super::prompt_line;

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub(crate) fn open_knowledge(config: &LiaConfig) -> Result<KnowledgeStore> {
    let data_dir = config.resolved_data_dir();
    KnowledgeStore::open(&data_dir, &config.storage.catch_all_topic)
        .with_context(|| format!("failed to open knowledge base at {}", data_dir.display()))
}

pub(crate) fn open_scheduler(config: &LiaConfig) -> Result<ReviewScheduler> {
    let conn = lia::db::open_database(config.resolved_db_path())?;
    Ok(ReviewScheduler::new(ScheduleStore::new(conn)))
}

/// Interactive review of one group of `topic`.
///
/// Each card shows its question first; Enter reveals the answer, `q` quits
/// without recording anything.
pub fn review(config: &LiaConfig, topic: &str) -> Result<()> {
    let mut knowledge = open_knowledge(config)?;
    let mut scheduler = open_scheduler(config)?;

    let groups = scheduler.groups_for_topic(&mut knowledge, topic)?;
    if groups.is_empty() {
        println!("Topic '{topic}' has no records to review.");
        return Ok(());
    }

    println!("Review groups for {topic}:");
    for (i, group) in groups.iter().enumerate() {
        println!("  [{}] {}", i + 1, describe(group));
    }

    let group = loop {
        let Some(choice) = prompt_line(&format!("Your choice [1-{}] (q to quit): ", groups.len()))?
        else {
            return Ok(());
        };
        if matches!(choice.as_str(), "q" | "quit" | "exit") {
            return Ok(());
        }
        match choice.parse::<usize>() {
            Ok(n) if (1..=groups.len()).contains(&n) => break &groups[n - 1],
            _ => println!("Invalid choice, try again."),
        }
    };

    let mut session = scheduler.start_session(&mut knowledge, group.id)?;
    let total = session.len();
    while let Some(card) = session.next_card() {
        println!();
        println!("{}", "-".repeat(40));
        println!("{}", card.heading);

        let Some(answer) = prompt_line("(Enter to reveal, q to quit) ")? else {
            println!("Quit.");
            return Ok(());
        };
        if answer == "q" {
            println!("Quit.");
            return Ok(());
        }
        println!("{}", "-".repeat(40));
        println!("{}", card.body);
    }

    let Some(outcome) = scheduler.finish(session, today()) else {
        return Ok(());
    };
    println!();
    println!("Reviewed {total} card(s).");
    if let Some(next) = outcome.group.next_review_date {
        println!("Next review of this group: {next}");
    }
    if let Some(e) = outcome.write_error {
        eprintln!("warning: {e}");
    }
    Ok(())
}
