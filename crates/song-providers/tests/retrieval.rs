use std::sync::Arc;

use song_providers::{Capability, CitationRetriever, InMemoryCitationSource, ResolutionError};

fn corpus() -> InMemoryCitationSource {
    InMemoryCitationSource::new("lore").with_chunks(["The harbor lights went out at nine.",
                                                     "Every sailor knows the northern star.",
                                                     "Salt on the window, salt on the page.",
                                                     "Her letters came on Tuesdays.",
                                                     "The bridge was built from river stone.",
                                                     "Lanterns swing above the quay.",
                                                     "Nobody sings the second verse."])
}

#[tokio::test]
async fn pinned_hashes_come_first_in_order() {
    let source = corpus();
    let hashes = source.hashes();
    // Pin two chunks out of hash order to make the ordering observable.
    let pinned = vec![hashes[5].clone(), hashes[2].clone()];
    let retriever = CitationRetriever::new().with_backend(Arc::new(source));

    let result = retriever.retrieve(&["lore".to_string()], "sea", &pinned, 5, 42).await.unwrap();

    assert_eq!(result.len(), 5);
    assert_eq!(result[0].chunk_hash, pinned[0]);
    assert_eq!(result[1].chunk_hash, pinned[1]);
    let rest: Vec<&str> = result[2..].iter().map(|c| c.chunk_hash.as_str()).collect();
    assert!(rest.iter().all(|h| !pinned.iter().any(|p| p == h)));
}

#[tokio::test]
async fn retrieval_is_reproducible() {
    let retriever = CitationRetriever::new().with_backend(Arc::new(corpus()));
    let a = retriever.retrieve(&[], "anything", &[], 3, 1).await.unwrap();
    let b = retriever.retrieve(&[], "anything else", &[], 3, 2).await.unwrap();
    assert_eq!(a, b);

    let pinned: Vec<String> = a.iter().map(|c| c.chunk_hash.clone()).collect();
    let again = retriever.retrieve(&[], "new query", &pinned, 3, 7).await.unwrap();
    assert_eq!(again, a);
}

#[tokio::test]
async fn pins_beyond_top_k_are_kept() {
    let source = corpus();
    let hashes = source.hashes();
    let retriever = CitationRetriever::new().with_backend(Arc::new(source));
    let result = retriever.retrieve(&[], "q", &hashes[..3], 2, 0).await.unwrap();
    assert_eq!(result.len(), 3);
}

#[tokio::test]
async fn failures_are_typed() {
    let retriever = CitationRetriever::new().with_backend(Arc::new(corpus()))
                                            .with_backend(Arc::new(InMemoryCitationSource::new("notes").with_chunk("x")
                                                                                                      .with_capabilities(&[Capability::Search])));

    let missing_source = retriever.retrieve(&["wiki".to_string()], "q", &[], 3, 0).await.unwrap_err();
    assert_eq!(missing_source, ResolutionError::ServerNotFound("wiki".into()));

    let unknown = "0".repeat(64);
    let missing_hash = retriever.retrieve(&["lore".to_string()], "q", &[unknown.clone()], 3, 0).await.unwrap_err();
    assert_eq!(missing_hash, ResolutionError::HashNotFound(unknown.clone()));

    let no_lookup = retriever.retrieve(&["notes".to_string()], "q", &[unknown], 3, 0).await.unwrap_err();
    assert!(matches!(no_lookup, ResolutionError::CapabilityNotSupported { capability: Capability::Lookup, .. }));
}
