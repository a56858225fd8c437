use super::*;

fn document(text: &str) -> Document {
    Document {
        source_url: "https://news.example/business".to_string(),
        title: None,
        text: text.to_string(),
    }
}

fn small_config() -> ChunkingConfig {
    ChunkingConfig {
        chunk_size: 20,
        chunk_overlap: 5,
        separator: ' ',
    }
}

#[test]
fn empty_document_has_no_chunks() {
    let chunks =
        split_document(&document(""), &ChunkingConfig::default()).expect("split should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn short_document_is_a_single_chunk() {
    let text = "Shilling steadies against the dollar as exports rise.";
    let chunks =
        split_document(&document(text), &ChunkingConfig::default()).expect("split should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
    assert_eq!(chunks[0].metadata.chunk_index, 0);
    assert_eq!(chunks[0].metadata.start, 0);
    assert_eq!(chunks[0].metadata.end, text.chars().count());
    assert_eq!(chunks[0].metadata.source_url, "https://news.example/business");
}

#[test]
fn document_of_exactly_chunk_size_is_one_chunk() {
    let text = "x".repeat(20);
    let chunks = split_document(&document(&text), &small_config()).expect("split should succeed");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, text);
}

#[test]
fn long_document_chunks_overlap_exactly_and_cover_text() {
    let text = "Nairobi bourse gains as banking stocks rally on strong half year earnings \
                while tea exporters report lower auction prices in Mombasa this week"
        .repeat(4);
    let config = small_config();
    let chunks = split_document(&document(&text), &config).expect("split should succeed");
    let chars: Vec<char> = text.chars().collect();

    assert!(chunks.len() > 1);
    assert_eq!(chunks.first().map(|c| c.metadata.start), Some(0));
    assert_eq!(chunks.last().map(|c| c.metadata.end), Some(chars.len()));

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata.chunk_index, i);
        assert!(chunk.text.chars().count() <= config.chunk_size);
        let expected: String = chars[chunk.metadata.start..chunk.metadata.end]
            .iter()
            .collect();
        assert_eq!(chunk.text, expected);
    }

    for pair in chunks.windows(2) {
        assert_eq!(
            pair[0].metadata.end - pair[1].metadata.start,
            config.chunk_overlap,
            "consecutive chunks must share exactly the overlap"
        );
        let tail: String = pair[0]
            .text
            .chars()
            .skip(pair[0].text.chars().count() - config.chunk_overlap)
            .collect();
        let head: String = pair[1].text.chars().take(config.chunk_overlap).collect();
        assert_eq!(tail, head);
    }
}

#[test]
fn chunks_end_before_a_separator_when_possible() {
    let text = "aaaa bbbb cccc dddd eeee ffff gggg";
    let chunks = split_document(&document(text), &small_config()).expect("split should succeed");

    // First window may hold 20 chars; the last space inside it sits at offset 19
    assert_eq!(chunks[0].text, "aaaa bbbb cccc dddd");
    assert_eq!(chunks[1].metadata.start, 14);
}

#[test]
fn text_without_separators_is_cut_hard() {
    let text = "k".repeat(50);
    let chunks = split_document(&document(&text), &small_config()).expect("split should succeed");

    let bounds: Vec<(usize, usize)> = chunks
        .iter()
        .map(|c| (c.metadata.start, c.metadata.end))
        .collect();
    assert_eq!(bounds, vec![(0, 20), (15, 35), (30, 50)]);
}

#[test]
fn multibyte_text_is_split_on_characters() {
    let text = "é".repeat(45);
    let chunks = split_document(&document(&text), &small_config()).expect("split should succeed");

    assert!(chunks.iter().all(|c| c.text.chars().count() <= 20));
    assert_eq!(chunks.last().map(|c| c.metadata.end), Some(45));
}

#[test]
fn invalid_config_is_rejected() {
    let config = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 10,
        separator: ' ',
    };
    assert!(split_document(&document("some text"), &config).is_err());

    let config = ChunkingConfig {
        chunk_size: 0,
        chunk_overlap: 0,
        separator: ' ',
    };
    assert!(config.validate().is_err());
}

#[test]
fn split_documents_keeps_order() {
    let docs = vec![
        Document {
            source_url: "https://a.example".to_string(),
            title: None,
            text: "first".to_string(),
        },
        Document {
            source_url: "https://b.example".to_string(),
            title: None,
            text: String::new(),
        },
        Document {
            source_url: "https://c.example".to_string(),
            title: None,
            text: "third".to_string(),
        },
    ];

    let chunks = split_documents(&docs, &ChunkingConfig::default()).expect("split should succeed");
    let urls: Vec<&str> = chunks
        .iter()
        .map(|c| c.metadata.source_url.as_str())
        .collect();
    assert_eq!(urls, vec!["https://a.example", "https://c.example"]);
}

#[test]
fn clean_text_replaces_paragraph_breaks_and_trims() {
    assert_eq!(clean_text("  Markets\n\nopen higher  "), "Markets open higher");
    assert_eq!(clean_text("one\ntwo"), "one\ntwo");
    assert_eq!(clean_text("\n\n"), "");
}

#[test]
fn clean_text_is_idempotent() {
    let samples = [
        "a\n\n\nb",
        "\n\n\n\nheadline\n\n\n",
        "  plain  ",
        "x\n\n\n\n\ny",
        "",
    ];
    for sample in samples {
        let once = clean_text(sample);
        assert_eq!(clean_text(&once), once, "cleaning {:?} twice", sample);
    }
}

#[test]
fn clean_chunks_preserves_metadata_and_drops_empty() {
    let chunk = |text: &str, index: usize| Chunk {
        text: text.to_string(),
        metadata: ChunkMetadata {
            source_url: "https://news.example".to_string(),
            chunk_index: index,
            start: 0,
            end: text.chars().count(),
        },
    };

    let cleaned = clean_chunks(vec![chunk(" rates\n\nhold ", 0), chunk("\n\n  ", 1)]);

    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned[0].text, "rates hold");
    assert_eq!(cleaned[0].metadata.chunk_index, 0);
    assert_eq!(cleaned[0].metadata.end, 13);
}
