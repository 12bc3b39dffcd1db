//! Self-learning behavior: variant acquisition, idempotence, and
//! persistence across runs.

use unresume::section::normalize_heading;
use unresume::{
    analyze_pages, BBox, CancelToken, FontFlags, LearnedBatch, MatchKind, Page, ParseOptions,
    SectionDb, Token,
};

fn letter_spaced_header(page: &mut Page, text: &str, y: f32) {
    let mut x = 72.0;
    for letter in text.chars() {
        let token = Token::new(
            letter.to_string(),
            page.index,
            BBox::new(x, y, x + 9.0, y + 14.0),
            14.0,
        )
        .with_flags(FontFlags {
            bold: true,
            ..Default::default()
        });
        page.push(token);
        x += 14.0;
    }
}

fn put_row(page: &mut Page, text: &str, y: f32) {
    let mut x = 72.0;
    for word in text.split_whitespace() {
        let width = word.chars().count() as f32 * 6.0;
        page.push(Token::new(
            word,
            page.index,
            BBox::new(x, y, x + width, y + 11.0),
            11.0,
        ));
        x += width + 6.0;
    }
}

fn stylized_page() -> Page {
    let mut page = Page::new(0, 612.0, 792.0);
    put_row(&mut page, "Jane Roe", 72.0);
    put_row(&mut page, "jane@x.com", 90.0);
    letter_spaced_header(&mut page, "EXPERIENCE", 130.0);
    put_row(&mut page, "built distributed ledgers at a bank", 156.0);
    page.finish();
    page
}

/// Scenario: a letter-spaced header normalizes to a known section, gets
/// matched as `normalized`, and its surface form is learned. Parsing the
/// same document again changes nothing.
#[test]
fn stylized_header_learned_once() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("sections_database");
    let opts = ParseOptions::default().with_db_path(&db_path);

    // First pass: normalized match, variant learned.
    let db = SectionDb::open(&db_path).unwrap();
    let before = db.variant_count();
    let snapshot = db.snapshot();

    let matched = snapshot.resolve("E X P E R I E N C E");
    assert_eq!(matched.kind, MatchKind::Normalized);

    let mut batch = LearnedBatch::default();
    let first = analyze_pages(
        &[stylized_page()],
        &snapshot,
        &opts,
        &mut batch,
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(
        first
            .sections
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>(),
        vec!["Contact", "Experience"]
    );
    assert!(!batch.is_empty());
    db.commit(&batch).unwrap();
    assert_eq!(db.variant_count(), before + 1);
    assert!(db_path.exists());

    // Second pass against the reloaded database: exact match now, and
    // nothing new to learn.
    let db = SectionDb::open(&db_path).unwrap();
    let snapshot = db.snapshot();
    let matched = snapshot.resolve("E X P E R I E N C E");
    assert_eq!(matched.kind, MatchKind::Exact);

    let mut batch = LearnedBatch::default();
    let second = analyze_pages(
        &[stylized_page()],
        &snapshot,
        &opts,
        &mut batch,
        &CancelToken::new(),
    )
    .unwrap();
    assert!(batch.is_empty());
    db.commit(&batch).unwrap();
    assert_eq!(db.variant_count(), before + 1);

    // Identical output on both passes.
    let summarize = |a: &unresume::Analysis| {
        a.sections
            .iter()
            .map(|s| (s.name, s.body_texts()))
            .collect::<Vec<_>>()
    };
    assert_eq!(summarize(&first), summarize(&second));
}

/// Normalization is idempotent over arbitrary heading shapes.
#[test]
fn normalization_is_stable() {
    for s in [
        "E X P E R I E N C E",
        "Work Experience:",
        "  SKILLS & TOOLS  ",
        "Éducation",
        "p r o f i l e",
        "Certifications — 2024 edition",
        "",
        "a",
    ] {
        let once = normalize_heading(s);
        assert_eq!(normalize_heading(&once), once, "not stable for {s:?}");
    }
}

/// The learner never stores obvious non-headings.
#[test]
fn garbage_headings_are_not_learned() {
    let db = SectionDb::in_memory();
    let snapshot = db.snapshot();
    let mut batch = LearnedBatch::default();

    // Pattern rules match these, but the guard rejects the surfaces.
    snapshot.resolve_learning("Senior Developer 2020 - Present", &mut batch);
    snapshot.resolve_learning("Acme Engineering Ltd.", &mut batch);
    assert!(batch.is_empty());

    // A clean pattern match above the floor is learned.
    let matched = snapshot.resolve_learning("Engineering Journey", &mut batch);
    assert_eq!(matched.kind, MatchKind::Pattern);
    assert!(!batch.is_empty());
}
