mod common;

use std::collections::HashMap;

use common::{fixture_source, item, ROOT};
use docsync_core::contract::{ItemKind, MockContentSource, ReferenceDoc};
use docsync_core::reference::load_references;

#[tokio::test]
async fn test_root_documents_become_references_and_failures_are_skipped() {
    let items = HashMap::from([(
        ROOT.to_string(),
        vec![
            item("g1", "Glossary", ItemKind::Document, "2025-01-01T00:00:00Z"),
            item("broken", "Style guide", ItemKind::Document, "2025-01-01T00:00:00Z"),
            item("p1", "Pricing", ItemKind::Spreadsheet, "2025-01-01T00:00:00Z"),
            item("logo", "logo.png", ItemKind::Image, "2025-01-01T00:00:00Z"),
        ],
    )]);
    let source = fixture_source(vec![], items, vec!["broken".to_string()]);

    let references = load_references(&source, ROOT).await.expect("root lists");

    assert_eq!(
        references,
        vec![
            ReferenceDoc {
                name: "Glossary".into(),
                content: "text of g1".into(),
            },
            ReferenceDoc {
                name: "Pricing".into(),
                content: "col_a,col_b\np1,1".into(),
            },
        ]
    );
}

#[tokio::test]
async fn test_root_listing_failure_is_returned() {
    let mut source = MockContentSource::new();
    source
        .expect_list_items()
        .returning(|_| Err("403 forbidden".into()));
    assert!(load_references(&source, ROOT).await.is_err());
}
