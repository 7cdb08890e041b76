use anyhow::Result;

use lia::config::LiaConfig;
use lia::knowledge::Tag;
use lia::search::{Relevance, SearchHit};
use lia::service::ServiceClient;

use super::prompt_line;

/// Ask the matching service and print the answer.
///
/// Without a query on the command line the question is read from stdin.
pub async fn search(config: &LiaConfig, query: Option<String>, topic: Option<&str>) -> Result<()> {
    let query = match query {
        Some(q) => q,
        None => match prompt_line("? ")? {
            Some(q) => q,
            None => return Ok(()),
        },
    };
    if query.is_empty() || query == "quit" || query == "exit" {
        return Ok(());
    }

    let client = ServiceClient::from_config(config);
    let hits = client.search(&query, topic).await?;

    let Some(best) = hits.first() else {
        println!("No results found.");
        return Ok(());
    };

    let threshold = config
        .retrieval
        .relevance_threshold
        .max(Relevance::MEDIUM_LOWER_BOUND);
    if best.score >= threshold {
        print_answer(best);
        print_suggestions("Similar questions:", &hits[1..]);
    } else {
        println!("No relevant match found.");
        println!();
        print_suggestions("Closest questions:", &hits);
    }
    Ok(())
}

fn print_answer(hit: &SearchHit) {
    let record = &hit.record;
    println!(
        "{} [{}] (score: {:.2}, {:?})",
        record.heading,
        record.topic,
        hit.score,
        Relevance::from_score(hit.score)
    );
    println!("{}", "=".repeat(40));
    println!("{}", record.body);
    println!();

    if record.has_tag(&Tag::Command) {
        let commands = record.commands();
        if !commands.is_empty() {
            println!("Commands:");
            for command in commands {
                println!("  {command}");
            }
            println!();
        }
    } else if record.has_tag(&Tag::Script) {
        for (i, script) in record.scripts().iter().enumerate() {
            println!("Script {}:", i + 1);
            println!("{script}");
            println!();
        }
    }
}

fn print_suggestions(title: &str, hits: &[SearchHit]) {
    if hits.is_empty() {
        return;
    }
    println!("{title}");
    for (i, hit) in hits.iter().enumerate() {
        println!(
            "  {}. {} [{}] ({:.2})",
            i + 1,
            hit.record.heading,
            hit.record.topic,
            hit.score
        );
    }
}
