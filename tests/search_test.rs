use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use quarry::{
    Document, IndexBuilder, QuarryError, ScoreHit, Searcher, SearcherConfig, Similarity,
};
use tempfile::tempdir;

fn write_corpus(root: &Path) {
    let mut builder = IndexBuilder::new();
    let docs = [
        ("red fox", "fast animals"),
        ("red dog", "loyal animals"),
        ("blue fox", "rare colours"),
    ];
    for (body, title) in docs {
        builder
            .add_document(
                Document::new()
                    .add_tokens("body", body.split_whitespace())
                    .add_tokens("title", title.split_whitespace()),
            )
            .unwrap();
    }
    builder.write(root).unwrap();
}

fn open(root: &Path) -> Searcher {
    Searcher::open(SearcherConfig::new(root)).unwrap()
}

fn doc_ids(hits: &[ScoreHit]) -> Vec<u32> {
    hits.iter().map(|h| h.doc_id).collect()
}

#[test]
fn test_and_query_returns_shared_document() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let searcher = open(dir.path());

    let results = searcher.search(&["body"], "red AND fox");
    assert!(results.is_ok());
    assert_eq!(doc_ids(results.hits("body").unwrap()), vec![0]);
}

#[test]
fn test_term_hits_ranked_by_score_then_doc_id() {
    let dir = tempdir().unwrap();
    let mut builder = IndexBuilder::new();
    for text in ["fox", "a fox", "fox fox", "fox"] {
        builder
            .add_document(Document::new().add_tokens("body", text.split_whitespace()))
            .unwrap();
    }
    builder.write(dir.path()).unwrap();
    let searcher = open(dir.path());

    let results = searcher.search(&["body"], "fox");
    let hits = results.hits("body").unwrap();
    // 2/3, then 1/2 twice (tie on doc id), then 1/3.
    assert_eq!(doc_ids(hits), vec![2, 0, 3, 1]);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
}

#[test]
fn test_multiple_fields_and_missing_field() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let searcher = open(dir.path());

    let results = searcher.search(&["body", "title", "author"], "animals OR fox");
    assert_eq!(doc_ids(results.hits("body").unwrap()), vec![0, 2]);
    assert_eq!(doc_ids(results.hits("title").unwrap()), vec![0, 1]);
    assert_eq!(results.hits("author"), Some(&[][..]));
    assert!(results.get("unrequested").is_none());
}

#[test]
fn test_unterminated_quote_only_fails_its_field_slot() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let searcher = open(dir.path());

    let results = searcher.search(&["body", "title"], "fox \"red dog");
    for field in ["body", "title"] {
        match results.error(field) {
            Some(QuarryError::QuerySyntax {
                offset, fragment, ..
            }) => {
                assert_eq!(*offset, 4);
                assert_eq!(fragment, "\"red");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    // The handle is still usable.
    let results = searcher.search(&["body"], "\"red dog\"");
    assert_eq!(doc_ids(results.hits("body").unwrap()), vec![1]);
}

#[test]
fn test_top_n_limits() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let searcher = open(dir.path());

    let query = "red OR blue OR fox";
    assert!(
        searcher
            .search_with_limit(&["body"], query, 0)
            .hits("body")
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        searcher.search_with_limit(&["body"], query, 2).hits("body").unwrap().len(),
        2
    );
    assert_eq!(
        searcher.search_with_limit(&["body"], query, 50).hits("body").unwrap().len(),
        3
    );

    let config = SearcherConfig::builder(dir.path()).top_n(1).build().unwrap();
    let searcher = Searcher::open(config).unwrap();
    assert_eq!(searcher.search(&["body"], query).hits("body").unwrap().len(), 1);
}

#[test]
fn test_search_after_close() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let searcher = open(dir.path());
    searcher.close().unwrap();

    let results = searcher.search(&["body", "title", "author"], "fox");
    assert_eq!(results.len(), 3);
    for (field, result) in results.iter() {
        assert!(
            matches!(result, Err(QuarryError::ClosedHandle)),
            "{field}: {result:?}"
        );
    }
    assert!(matches!(searcher.close(), Err(QuarryError::ClosedHandle)));
    assert!(searcher.reader().stats().is_err());
}

#[test]
fn test_concurrent_searches_share_one_handle() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let config = SearcherConfig::builder(dir.path())
        .parallel_fields(true)
        .build()
        .unwrap();
    let searcher = Arc::new(Searcher::open(config).unwrap());
    let expected = searcher.search(&["body", "title"], "fox OR animals");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let searcher = Arc::clone(&searcher);
            thread::spawn(move || {
                let mut seen = Vec::new();
                for _ in 0..50 {
                    let results = searcher.search(&["body", "title"], "fox OR animals");
                    seen.push(doc_ids(results.hits("body").unwrap()));
                }
                seen
            })
        })
        .collect();

    let expected_body = doc_ids(expected.hits("body").unwrap());
    for handle in handles {
        for ids in handle.join().unwrap() {
            assert_eq!(ids, expected_body);
        }
    }
}

#[test]
fn test_close_while_other_threads_search() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let searcher = Arc::new(open(dir.path()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let searcher = Arc::clone(&searcher);
            thread::spawn(move || {
                for _ in 0..100 {
                    let results = searcher.search(&["body"], "red OR fox");
                    match results.get("body").unwrap() {
                        Ok(hits) => assert_eq!(hits.len(), 3),
                        Err(e) => assert!(matches!(e, QuarryError::ClosedHandle)),
                    }
                }
            })
        })
        .collect();

    searcher.close().unwrap();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_bm25_from_json_config() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path());
    let config_path = dir.path().join("searcher.json");
    let json = serde_json::json!({
        "index_root": dir.path(),
        "similarity": {"type": "bm25", "k1": 1.2, "b": 0.75},
    });
    fs::write(&config_path, serde_json::to_vec(&json).unwrap()).unwrap();

    let config = SearcherConfig::from_json_file(&config_path).unwrap();
    assert_eq!(config.similarity, Similarity::bm25());

    let searcher = Searcher::open(config).unwrap();
    let results = searcher.search(&["body"], "red OR blue");
    // "blue" is the rarer term.
    assert_eq!(results.hits("body").unwrap()[0].doc_id, 2);
}
