//! Whole-pipeline test over a generated PDF with a real text layer.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use unresume::{CancelToken, DocumentInput, FileKind, JsonFormat, Orchestrator, ParseOptions};

/// Build a small single-column resume PDF.
fn resume_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut ops: Vec<Operation> = vec![Operation::new("BT", vec![])];
    let mut put = |ops: &mut Vec<Operation>, font: &str, size: i64, dy: i64, text: &str| {
        ops.push(Operation::new("Tf", vec![font.into(), size.into()]));
        ops.push(Operation::new("Td", vec![0.into(), (-dy).into()]));
        ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
    };
    ops.push(Operation::new("Td", vec![72.into(), 700.into()]));
    ops.push(Operation::new("Tf", vec!["F2".into(), 16.into()]));
    ops.push(Operation::new("Tj", vec![Object::string_literal("John Doe")]));
    put(&mut ops, "F1", 11, 22, "john@x.com");
    put(&mut ops, "F2", 14, 40, "EXPERIENCE");
    put(&mut ops, "F1", 11, 22, "Senior platform engineer at Acme Corporation since early twenty twenty");
    put(&mut ops, "F1", 11, 16, "Owned the billing rewrite from the first sketch to the final launch");
    put(&mut ops, "F1", 11, 16, "Kept the settlement pipeline green across four peak seasons in a row");
    put(&mut ops, "F1", 11, 16, "Reviewed designs and mentored five colleagues through their promotions");
    put(&mut ops, "F1", 11, 16, "Cut infrastructure spending by a third without touching latency budgets");
    put(&mut ops, "F1", 11, 16, "Ran the weekly operational review and owned the incident rotation");
    put(&mut ops, "F2", 14, 40, "EDUCATION");
    put(&mut ops, "F1", 11, 22, "Bachelor of Science in Computer Science with a minor in statistics");
    put(&mut ops, "F1", 11, 16, "State University class of twenty twenty with first class honours");
    put(&mut ops, "F1", 11, 16, "Undergraduate thesis on fast document layout analysis at scale");
    ops.push(Operation::new("ET", vec![]));

    let content = Content { operations: ops };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content encodes"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf serializes");
    bytes
}

#[test]
fn text_layer_pdf_parses_end_to_end() {
    let input = DocumentInput::from_bytes("john_doe.pdf", resume_pdf()).unwrap();
    assert_eq!(input.kind(), FileKind::PdfText);

    let orchestrator = Orchestrator::new(ParseOptions::default().without_persistence()).unwrap();
    let output = orchestrator
        .parse_input(input, &CancelToken::new())
        .unwrap();

    assert_eq!(output.file.file_type, "pdf");
    assert_eq!(output.file.pages, 1);
    assert!(!output.file.scanned);
    assert_eq!(output.metadata.strategy_used, "text-layer");
    assert!(output.metadata.fallbacks_tried.is_empty());

    let names = output.section_names();
    assert_eq!(names, vec!["Contact", "Experience", "Education"]);

    let experience = output.section("Experience").unwrap();
    assert_eq!(experience.lines.len(), 6);
    assert!(experience.lines[0].contains("Acme Corporation"));

    assert!(output.quality.score >= 0.6, "score {}", output.quality.score);
}

#[test]
fn output_record_shape_is_stable() {
    let input = DocumentInput::from_bytes("john_doe.pdf", resume_pdf()).unwrap();
    let orchestrator = Orchestrator::new(ParseOptions::default().without_persistence()).unwrap();
    let output = orchestrator
        .parse_input(input, &CancelToken::new())
        .unwrap();

    let json = output.to_json(JsonFormat::Pretty).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["file"]["type"], "pdf");
    assert_eq!(value["file"]["scanned"], false);
    assert_eq!(value["layouts"][0]["type"], "single");
    assert_eq!(value["sections"][0]["name"], "Contact");
    assert!(value["sections"][0]["page_span"].is_array());
    assert!(value["quality"]["score"].is_number());
    assert!(value["quality"]["rung"].is_string());
    assert_eq!(value["metadata"]["strategy_used"], "text-layer");
}

#[test]
fn parse_output_survives_json_roundtrip() {
    let input = DocumentInput::from_bytes("john_doe.pdf", resume_pdf()).unwrap();
    let orchestrator = Orchestrator::new(ParseOptions::default().without_persistence()).unwrap();
    let output = orchestrator
        .parse_input(input, &CancelToken::new())
        .unwrap();

    let json = output.to_json(JsonFormat::Compact).unwrap();
    let back: unresume::ParseOutput = serde_json::from_str(&json).unwrap();
    assert_eq!(back.section_names(), output.section_names());
    assert_eq!(back.metadata.strategy_used, output.metadata.strategy_used);
}
