//! End-to-end decoding scenarios, from raw score arrays to offsets
//! without the leading `[CLS]` token.

use gplink_core::{AppConfig, DecodeConfig};
use gplink_extractor::{
    ChunkF1, ClassificationDecoder, LabelVocab, Metric, MetricsReport, ScoreGrid,
    SequenceTagDecoder, Span, SpanDecoder, SpanF1, SubjectEnd, TaggedEntity, Triple,
    TripleDecoder, TripleF1,
};
use ndarray::{array, Array3, Array4};

#[test]
fn test_single_cell_span() {
    let scores = array![[[0.0f32, 0.9], [0.0, 0.0]]];
    let grid = ScoreGrid::new(scores.view()).unwrap();
    let decoder = SpanDecoder::new(LabelVocab::new(["label0"]).unwrap(), 0.5);

    assert_eq!(decoder.decode(&grid).unwrap(), vec![Span::new(0, 1, "label0")]);
}

#[test]
fn test_bio_organisation() {
    let vocab = LabelVocab::new(["O", "B-ORG", "I-ORG"]).unwrap();
    let decoder = SequenceTagDecoder::new(vocab);

    let entities = decoder.decode(["O", "B-ORG", "I-ORG", "O"]).unwrap();
    assert_eq!(entities, vec![TaggedEntity::new("ORG", 1, 2)]);
    assert_eq!(decoder.decode_ids(&[0, 1, 2, 0]).unwrap(), entities);
}

#[test]
fn test_spans_with_prefix_removed() {
    // [CLS] Alice works at Acme [SEP] [PAD]
    let mut scores = Array3::<f32>::from_elem((2, 7, 7), -5.0);
    scores[[0, 1, 1]] = 3.0; // Alice
    scores[[1, 4, 4]] = 2.0; // Acme
    scores[[1, 0, 0]] = 4.0; // [CLS], dropped by the prefix
    scores[[0, 6, 6]] = 4.0; // padding

    let grid = ScoreGrid::new(scores.view())
        .unwrap()
        .with_attention_mask(&[1i64, 1, 1, 1, 1, 1, 0])
        .unwrap();

    let config = DecodeConfig::default();
    let decoder = SpanDecoder::from_config(LabelVocab::new(["PER", "ORG"]).unwrap(), &config);

    let spans: Vec<Span> = decoder
        .decode(&grid)
        .unwrap()
        .iter()
        .filter_map(|span| span.without_prefix(config.prefix_tokens))
        .collect();

    assert_eq!(spans, vec![Span::new(0, 0, "PER"), Span::new(3, 3, "ORG")]);

    let mut metric = SpanF1::new();
    metric
        .accumulate(&spans, &[Span::new(0, 0, "PER"), Span::new(3, 3, "ORG")])
        .unwrap();
    assert!((metric.compute() - 1.0).abs() < 0.001);
}

#[test]
fn test_triples_in_both_subject_modes() {
    // Subject (1, 2), object (4, 5), predicate "founded"
    let mut spans = Array4::<f32>::from_elem((1, 2, 6, 6), -1.0);
    spans[[0, 0, 1, 2]] = 1.0;
    spans[[0, 1, 4, 5]] = 1.0;

    let mut heads = Array4::<f32>::from_elem((1, 2, 6, 6), -1.0);
    let mut tails = Array4::<f32>::from_elem((1, 2, 6, 6), -1.0);
    heads[[0, 1, 1, 4]] = 1.0;
    tails[[0, 1, 2, 5]] = 1.0;

    let predicates = LabelVocab::new(["leads", "founded"]).unwrap();
    let mut config = AppConfig::default().decode;

    let head_mode = TripleDecoder::from_config(predicates.clone(), &config)
        .decode_batch(spans.view(), heads.view(), tails.view(), None)
        .unwrap();
    assert_eq!(head_mode.len(), 1);
    assert!(head_mode[0].contains(&Triple::new((1, 1), "founded", (4, 5))));

    config.subject_end = SubjectEnd::Tail;
    let corrected = TripleDecoder::from_config(predicates, &config)
        .decode_batch(spans.view(), heads.view(), tails.view(), None)
        .unwrap();

    let expected = Triple::new((1, 2), "founded", (4, 5));
    assert_eq!(corrected[0].len(), 1);
    assert!(corrected[0].contains(&expected));
    assert_eq!(
        expected.without_prefix(1),
        Some(Triple::new((0, 1), "founded", (3, 4)))
    );

    let mut metric = TripleF1::new();
    metric.accumulate_iter(corrected[0].iter().cloned(), [expected]);
    assert_eq!(metric.counts().true_positives, 1);
}

#[test]
fn test_classification_and_chunk_report() {
    let decoder = ClassificationDecoder::new(LabelVocab::new(["sports", "politics"]).unwrap());
    let ranked = decoder.decode(array![-1.0f32, 1.0].view()).unwrap();
    assert_eq!(ranked[0].label, "politics");

    let mut chunks = ChunkF1::new();
    chunks
        .accumulate_tags(&["B-PER", "I-PER", "O"], &["B-PER", "I-PER", "O"])
        .unwrap();

    let mut report = MetricsReport::new(chunks.examples());
    report.add("Chunks", chunks.counts());
    assert!(report.meets(1.0));
    assert!(report.report().contains("Chunks:"));
}
