use tagmill_core::{BackendKind, ParseConfig, ParseContext, ParserBackend, RawContent};
use tagmill_html::accumulate::{accumulate, AccumulationEnd};
use tagmill_html::dom::DomFragmentBackend;
use tagmill_html::sax::LenientSaxBackend;
use tagmill_html::ParsePipeline;

fn many_siblings(n: usize) -> String {
    (0..n).map(|i| format!("<p>para {i}</p>")).collect()
}

#[test]
fn concatenated_batches_equal_a_single_pass_parse() {
    let input = many_siblings(300);
    let backend = LenientSaxBackend;

    // Collect the raw batches by hand, in call order.
    let mut source = backend.begin(&input, ParseContext::Fragment);
    let mut concatenated = Vec::new();
    loop {
        let batch = source.next_fragment().unwrap();
        if batch.is_empty() {
            break;
        }
        concatenated.extend(batch);
    }

    // The accumulator over the same input must assemble the same sequence.
    let acc = accumulate(&backend, &input, ParseContext::Fragment, 512);
    assert_eq!(acc.end, AccumulationEnd::Exhausted);
    assert_eq!(acc.fragment.children, concatenated);

    // And the two variants agree structurally on this well-formed input.
    let dom = DomFragmentBackend {
        report_errors: false,
    };
    let dom_acc = accumulate(&dom, &input, ParseContext::Fragment, 512);
    assert_eq!(dom_acc.fragment, acc.fragment);
}

#[test]
fn pass_count_is_proportional_to_input_size() {
    for (n, max_expected_passes) in [(0usize, 0usize), (1, 1), (64, 1), (65, 2), (300, 5)] {
        let input = many_siblings(n);
        let backend = LenientSaxBackend;
        let acc = accumulate(&backend, &input, ParseContext::Fragment, 512);
        assert_eq!(acc.end, AccumulationEnd::Exhausted, "n={n}");
        assert_eq!(acc.fragment.children.len(), n, "n={n}");
        assert!(acc.passes <= max_expected_passes, "n={n}");
    }
}

#[test]
fn multi_pass_assembly_is_invisible_at_the_pipeline_level() {
    let raw = RawContent::new("https://example.com/long", many_siblings(200).into_bytes());
    let pipeline = ParsePipeline::new(ParseConfig {
        default_encoding: "utf-8".to_string(),
        ..ParseConfig::default()
    });
    let doc = pipeline.parse(&raw).unwrap();

    assert_eq!(doc.fragment.children.len(), 200);
    assert!(doc.metadata["parse_passes"].parse::<usize>().unwrap() > 1);
    assert!(doc.text.contains("para 0"));
    assert!(doc.text.contains("para 199"));
}

#[test]
fn sax_mid_stream_failure_is_packaged_as_partial_success() {
    let mut bytes = b"<div><p>kept content</p></div>".to_vec();
    bytes.extend_from_slice(b"<p>tail<<<");
    let raw = RawContent::new("https://example.com/broken", bytes);

    let pipeline = ParsePipeline::new(ParseConfig {
        backend: BackendKind::LenientSax,
        default_encoding: "utf-8".to_string(),
        ..ParseConfig::default()
    });
    let doc = pipeline.parse(&raw).expect("partial parse is still success");

    assert!(doc.warnings.contains(&"parse_partial"));
    assert_eq!(doc.metadata["parse_partial"], "true");
    assert!(doc.text.contains("kept content"));
}

#[test]
fn pass_cap_is_recorded_when_it_fires() {
    let input = many_siblings(300);
    let backend = LenientSaxBackend;
    // 300 siblings need 5 batches; a cap of 2 must stop the run early.
    let acc = accumulate(&backend, &input, ParseContext::Fragment, 2);
    assert_eq!(acc.end, AccumulationEnd::PassCapReached);
    assert_eq!(acc.fragment.children.len(), 128);
}
