use anyhow::Result;

use lia::config::LiaConfig;

use super::review::open_knowledge;

/// Print the headings of `topic` in file order.
pub fn show(config: &LiaConfig, topic: &str) -> Result<()> {
    let mut knowledge = open_knowledge(config)?;
    let load = knowledge.load_topic(topic)?;

    if load.records.is_empty() {
        println!("Topic '{topic}' has no records.");
        return Ok(());
    }
    for record in load.records.iter() {
        let tags: Vec<String> = record.tags.iter().map(ToString::to_string).collect();
        if tags.is_empty() {
            println!("{}", record.heading);
        } else {
            println!("{} {}", record.heading, tags.join(" "));
        }
    }
    Ok(())
}
