mod helpers;

use helpers::{corpus, memory_cache, write_topic, FakeEmbeddingProvider, BASH_MD, CURL_MD};
use lia::error::LiaError;
use lia::knowledge::Tag;
use lia::search::{candidate_topics, QueryPipeline, TOP_N_RESULTS};

#[test]
fn bash_question_finds_bash_record() {
    let (_dir, mut store) = corpus(&[("bash", BASH_MD), ("curl", CURL_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let topics = store.topics().unwrap();
    let candidates =
        candidate_topics("extract lines from file bash", &topics, None, "undefined").unwrap();
    assert_eq!(candidates, vec!["bash", "undefined"]);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("extract lines from file bash", None)
        .unwrap();
    let best = &hits[0];
    assert_eq!(best.record.topic, "bash");
    assert_eq!(
        best.record.heading,
        "How to extract a range of lines from a file in bash?"
    );
    assert!(best.record.has_tag(&Tag::Command));
    assert_eq!(best.record.commands(), vec!["sed -n '10,20p' file.txt"]);
    assert!(hits.iter().all(|h| h.record.topic != "curl"));
}

#[test]
fn repeated_query_is_deterministic() {
    let (_dir, mut store) = corpus(&[("bash", BASH_MD), ("curl", CURL_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);
    let mut pipeline = QueryPipeline::new(&mut store, &cache, &provider);

    let first = pipeline.search("how to send json with curl", None).unwrap();
    let second = pipeline.search("how to send json with curl", None).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].record.heading, "How to send a POST request with JSON?");
}

#[test]
fn results_are_capped_and_sorted() {
    let (_dir, mut store) = corpus(&[("bash", BASH_MD), ("curl", CURL_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("how to do things in bash and curl", None)
        .unwrap();
    assert_eq!(hits.len(), TOP_N_RESULTS);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hits.iter().all(|h| (-1.0..=1.0).contains(&h.score)));
}

#[test]
fn equal_scores_prefer_earlier_topic_then_position() {
    let (_dir, mut store) = corpus(&[
        ("beta", "# Same question\n\nb0\n\n# Same question\n\nb1\n"),
        ("alpha", "# Same question\n\na0\n"),
    ]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("alpha beta same question", None)
        .unwrap();
    let order: Vec<(&str, usize)> = hits
        .iter()
        .map(|h| (h.record.topic.as_str(), h.record.position))
        .collect();
    assert_eq!(order, vec![("alpha", 0), ("beta", 0), ("beta", 1)]);
    assert_eq!(hits[0].score, hits[2].score);
}

#[test]
fn no_keyword_and_empty_catch_all_yields_nothing() {
    let (_dir, mut store) = corpus(&[("bash", BASH_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("how do I extract lines", None)
        .unwrap();
    assert!(hits.is_empty());
    assert_eq!(provider.calls(), 0, "nothing to compare, nothing embedded");
}

#[test]
fn catch_all_is_searched_for_every_query() {
    let (dir, mut store) = corpus(&[("bash", BASH_MD)]);
    write_topic(dir.path(), "undefined", "# How to exit vim?\n\n`:q!`\n");
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("exit vim", None)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.topic, "undefined");
}

#[test]
fn topic_filter_adds_topic_without_keyword() {
    let (_dir, mut store) = corpus(&[("bash", BASH_MD), ("curl", CURL_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("follow redirects", Some("curl"))
        .unwrap();
    assert_eq!(hits[0].record.heading, "How to follow redirects?");
}

#[test]
fn unknown_topic_filter_is_rejected() {
    let (_dir, mut store) = corpus(&[("bash", BASH_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let err = QueryPipeline::new(&mut store, &cache, &provider)
        .search("anything", Some("python"))
        .unwrap_err();
    assert!(matches!(err, LiaError::UnknownTopic(t) if t == "python"));
}

#[test]
fn malformed_topic_is_skipped() {
    let (_dir, mut store) = corpus(&[
        ("bash", BASH_MD),
        ("broken", "# Broken question\n\n```bash\necho never closed\n"),
    ]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("broken bash extract lines from file", None)
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.record.topic != "broken"));
    assert_eq!(hits[0].record.topic, "bash");
}

#[test]
fn non_utf8_candidate_topic_is_skipped() {
    let (dir, mut store) = corpus(&[("bash", BASH_MD)]);
    std::fs::write(
        dir.path().join("notes.md"),
        b"# Caf\xe9 question\n\nLatin-1 answer.\n",
    )
    .unwrap();
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("bash notes extract lines from file", None)
        .unwrap();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|h| h.record.topic != "notes"));
    assert_eq!(hits[0].record.topic, "bash");

    let (loaded, skipped) = store.load_all().unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(skipped.len(), 1);
    assert!(matches!(
        &skipped[0].error,
        LiaError::Parse { topic, line: 0, .. } if topic == "notes"
    ));
}

#[test]
fn non_utf8_catch_all_does_not_fail_queries() {
    let (dir, mut store) = corpus(&[("bash", BASH_MD)]);
    std::fs::write(dir.path().join("undefined.md"), b"# Na\xefve\n\nanswer\n").unwrap();
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("bash extract lines from file", None)
        .unwrap();
    assert_eq!(hits[0].record.topic, "bash");
    assert!(hits.iter().all(|h| h.record.topic != "undefined"));
}

#[test]
fn record_embedding_failure_excludes_only_that_record() {
    let (_dir, mut store) = corpus(&[(
        "plants",
        "# Is poison ivy dangerous?\n\nYes.\n\n# How often to water plants?\n\nWeekly.\n",
    )]);
    let provider = FakeEmbeddingProvider::new().failing_on("poison");
    let cache = memory_cache(&provider);

    let hits = QueryPipeline::new(&mut store, &cache, &provider)
        .search("plants dangerous", None)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.heading, "How often to water plants?");
}

#[test]
fn query_embedding_failure_aborts_query() {
    let (_dir, mut store) = corpus(&[("bash", BASH_MD)]);
    let provider = FakeEmbeddingProvider::new().failing_on("poison");
    let cache = memory_cache(&provider);

    let err = QueryPipeline::new(&mut store, &cache, &provider)
        .search("bash poison", None)
        .unwrap_err();
    assert!(matches!(err, LiaError::EmbeddingCompute(_)));
}

#[test]
fn edited_topic_is_searched_with_fresh_content() {
    let (dir, mut store) = corpus(&[("curl", CURL_MD)]);
    let provider = FakeEmbeddingProvider::new();
    let cache = memory_cache(&provider);

    let before = QueryPipeline::new(&mut store, &cache, &provider)
        .search("curl upload file", None)
        .unwrap();
    assert!(before.iter().all(|h| !h.record.heading.contains("upload")));

    write_topic(
        dir.path(),
        "curl",
        &format!("{CURL_MD}\n# How to upload a file with curl?\n\n`curl -F file=@x`\n"),
    );
    let after = QueryPipeline::new(&mut store, &cache, &provider)
        .search("curl upload file", None)
        .unwrap();
    assert_eq!(after[0].record.heading, "How to upload a file with curl?");
}
