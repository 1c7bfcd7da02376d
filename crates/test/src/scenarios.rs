use std::sync::Arc;
use std::time::Duration;

use bunko_application::{Library, ReadOutcome, ResolveError, StaticMappings, Sources};
use bunko_core::{BodyNode, FetchError, ResolutionOutcome, SearchField, Strategy};
use bunko_engine::{Engine, render};
use bunko_storage::Storage;
use tokio_util::sync::CancellationToken;

use crate::*;

fn kinds(nodes: &[BodyNode]) -> Vec<&'static str> {
    nodes.iter().map(BodyNode::kind).collect()
}

fn library(
    listing: StaticListing,
    documents: ScriptedDocuments,
) -> (Library, Arc<StaticListing>, Arc<ScriptedDocuments>) {
    let listing = Arc::new(listing);
    let documents = Arc::new(documents);
    let library = make_library(
        &make_settings(10),
        Arc::new(StaticCatalog::new(SAMPLE_CATALOG)),
        listing.clone(),
        documents.clone(),
    );
    (library, listing, documents)
}

#[tokio::test(start_paused = true)]
async fn catalog_row_yields_collection_and_file_ids() {
    let (library, _, _) = library(StaticListing::new(), ScriptedDocuments::new());
    let record = library
        .get_catalog_record("456")
        .await
        .expect("rashomon is listed");
    assert_eq!(record.title, "羅生門");
    assert_eq!(record.author(), "芥川龍之介");
    assert_eq!(record.collection_id, "000879");
    assert_eq!(record.nominal_file_id, "127_ruby_150");
}

#[tokio::test(start_paused = true)]
async fn stale_file_id_resolves_by_numeric_proximity() {
    let (library, _, documents) = library(
        StaticListing::new().with_collection("000064", &["386_ruby_15290", "392_ruby_4448"]),
        ScriptedDocuments::new().with_document("392_ruby_4448", shift_jis("たけくらべ")),
    );

    let outcome = library.resolver().resolve("000064", "394_x").await;
    let resolved = outcome.resolved().expect("resolved");
    assert_eq!(resolved.resource_name, "392_ruby_4448");
    assert_eq!(resolved.strategy, Strategy::NumericProximity);
    assert_eq!(
        documents.fetched(),
        vec!["394_x", "386_ruby_15290", "392_ruby_4448"]
    );
}

#[test]
fn ideograph_ruby_parses_to_annotation() {
    let doc = Engine::new().parse("漢字《かんじ》");
    assert_eq!(
        doc.body,
        vec![BodyNode::RubyAnnotation {
            base: "漢字".to_string(),
            reading: "かんじ".to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn exhaustion_reports_every_strategy_and_listing() {
    let listing = Arc::new(
        StaticListing::new().with_collection("000064", &["394_ruby_2", "a394b", "390_ruby_3"]),
    );
    let documents = Arc::new(ScriptedDocuments::new());
    let mut mappings = StaticMappings::empty();
    mappings.insert("000064", "394", "500_static");
    let library = Library::with_mappings(
        &make_settings(10),
        Sources {
            catalog: Arc::new(StaticCatalog::new(SAMPLE_CATALOG)),
            listing,
            documents: documents.clone(),
        },
        mappings,
    );

    let ResolutionOutcome::Exhausted(exhausted) =
        library.resolver().resolve("000064", "394_ruby_1").await
    else {
        panic!("expected exhaustion");
    };
    assert_eq!(
        exhausted.tried_strategies(),
        vec![
            Strategy::Exact,
            Strategy::StaticMapping,
            Strategy::DirectoryPrefix,
            Strategy::DirectoryContains,
            Strategy::NumericProximity,
        ]
    );
    assert_eq!(
        exhausted.tried_resource_names(),
        vec!["394_ruby_1", "500_static", "394_ruby_2", "a394b", "390_ruby_3"]
    );
    assert_eq!(exhausted.available_resource_names.len(), 3);
    assert!(exhausted.attempts.iter().all(|a| a.failure.is_not_found()));
    assert_eq!(documents.fetched().len(), exhausted.attempts.len());
}

#[tokio::test(start_paused = true)]
async fn first_success_stops_the_sequence() {
    let (library, _, documents) = library(
        StaticListing::new().with_collection("000064", &["394_a", "394_b", "394_c"]),
        ScriptedDocuments::new()
            .with_document("394_b", b"b".to_vec())
            .with_document("394_c", b"c".to_vec()),
    );

    let candidates = library.resolver().candidates("000064", "394_x").await;
    assert_eq!(candidates.len(), 5);

    let resolved = library.resolver().resolve("000064", "394_x").await.resolved();
    assert_eq!(resolved.map(|r| r.resource_name), Some("394_b".to_string()));
    assert_eq!(
        documents.fetched(),
        vec!["394_x", "386_ruby_15290", "394_a", "394_b"]
    );
}

#[tokio::test(start_paused = true)]
async fn non_numeric_work_id_has_no_proximity_candidates() {
    let (library, _, _) = library(
        StaticListing::new().with_collection("000064", &["390_a", "card_1"]),
        ScriptedDocuments::new(),
    );
    let candidates = library.resolver().candidates("000064", "card_x").await;
    assert!(
        candidates
            .iter()
            .all(|candidate| candidate.strategy != Strategy::NumericProximity)
    );
    assert_eq!(candidates.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn slow_and_failing_candidates_do_not_abort() {
    let (library, _, documents) = library(
        StaticListing::new().with_collection("000879", &["127_ruby_150", "128_ruby_9"]),
        ScriptedDocuments::new()
            .with_delay("127_ruby_150", Duration::from_secs(60))
            .with_document("127_ruby_150", b"late".to_vec())
            .with_failure("128_ruby_9", FetchError::Transport("reset".to_string()))
            .with_document("130_ruby_1", b"never listed".to_vec()),
    );

    let ResolutionOutcome::Exhausted(exhausted) =
        library.resolver().resolve("000879", "127_ruby_150").await
    else {
        panic!("expected exhaustion");
    };
    let failures: Vec<&FetchError> = exhausted.attempts.iter().map(|a| &a.failure).collect();
    assert_eq!(
        failures,
        vec![
            &FetchError::Timeout(Duration::from_secs(5)),
            &FetchError::Transport("reset".to_string()),
        ]
    );
    assert_eq!(documents.fetched(), vec!["127_ruby_150", "128_ruby_9"]);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_before_next_candidate() {
    let (library, listing, documents) = library(
        StaticListing::new().with_collection("000064", &["392_ruby_4448"]),
        ScriptedDocuments::new()
            .with_delay("394_x", Duration::from_secs(3))
            .with_document("392_ruby_4448", b"ok".to_vec()),
    );
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let result = library
        .resolver()
        .resolve_cancellable("000064", "394_x", &cancel)
        .await;
    assert_eq!(result, Err(ResolveError::Cancelled));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(documents.fetched(), vec!["394_x"]);
    assert_eq!(listing.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_resolutions_share_one_listing_fetch() {
    let (library, listing, _) = library(
        StaticListing::new()
            .with_collection("000064", &["392_ruby_4448"])
            .with_delay(Duration::from_millis(200)),
        ScriptedDocuments::new().with_document("392_ruby_4448", b"ok".to_vec()),
    );

    let (a, b) = tokio::join!(
        library.resolver().resolve("000064", "394_x"),
        library.resolver().resolve("000064", "390_y"),
    );
    assert!(a.is_resolved());
    assert!(b.is_resolved());
    assert_eq!(listing.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn catalog_loads_once_and_falls_back_when_unreachable() {
    let catalog = Arc::new(StaticCatalog::new(SAMPLE_CATALOG));
    let library = make_library(
        &make_settings(10),
        catalog.clone(),
        Arc::new(StaticListing::new()),
        Arc::new(ScriptedDocuments::new()),
    );
    let (found, record) = tokio::join!(
        library.search_catalog("芥川", SearchField::Author, 10),
        library.get_catalog_record("394"),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(record.map(|r| r.title), Some("たけくらべ".to_string()));
    assert_eq!(catalog.calls(), 1);

    let offline = make_library(
        &make_settings(10),
        Arc::new(StaticCatalog::failing(FetchError::Status(503))),
        Arc::new(StaticListing::new()),
        Arc::new(ScriptedDocuments::new()),
    );
    let first = offline.search_catalog("", SearchField::All, 5).await;
    assert_eq!(first.len(), 5);
    assert!(offline.get_catalog_record("1567").await.is_some());
}

#[test]
fn each_markup_construct_appears_once_in_order() {
    let text = "題\n作者\n\n前書き雨《あめ》［＃「静か」に傍点］\n［＃ここから２字下げ］\n内側\n［＃ここで字下げ終わり］\n［＃改ページ］\n後書き";
    let doc = Engine::new().parse(text);
    assert_eq!(doc.title, "題");
    assert_eq!(doc.author, "作者");
    assert_eq!(
        kinds(&doc.body),
        vec![
            "plain_text",
            "ruby_annotation",
            "emphasis_span",
            "plain_text",
            "indent_block",
            "plain_text",
            "page_break",
            "plain_text",
        ]
    );
    let BodyNode::IndentBlock { level, children } = &doc.body[4] else {
        panic!("expected indent block");
    };
    assert_eq!(*level, 2);
    assert_eq!(children, &vec![BodyNode::PlainText("\n内側\n".to_string())]);
    assert_eq!(doc.anomalies, 0);
}

#[test]
fn unclosed_indent_runs_to_end_of_document() {
    let doc = Engine::new().parse("題\n作者\n\n序［＃ここから１字下げ］\n一\n二\n");
    assert_eq!(kinds(&doc.body), vec!["plain_text", "indent_block"]);
    let BodyNode::IndentBlock { level, children } = &doc.body[1] else {
        panic!("expected indent block");
    };
    assert_eq!(*level, 1);
    assert_eq!(children, &vec![BodyNode::PlainText("\n一\n二\n".to_string())]);
    assert_eq!(doc.anomalies, 1);
}

#[tokio::test(start_paused = true)]
async fn sample_work_reads_end_to_end() -> anyhow::Result<()> {
    let (library, _, _) = library(
        StaticListing::new(),
        ScriptedDocuments::new().with_document("127_ruby_150", shift_jis(SAMPLE_TEXT)),
    );
    let library = library.with_cache(Box::new(Storage::open_in_memory()?));

    let (_, outcome) = library.open_work("456").await.expect("listed work");
    let ReadOutcome::Document(reading) = outcome else {
        panic!("expected a document");
    };
    assert_eq!(reading.strategy, Strategy::Exact);
    assert!(!reading.had_replacements);
    assert_eq!(reading.document.title, "羅生門");
    assert_eq!(reading.document.author, "芥川龍之介");

    let html = render::to_html(&reading.document);
    assert!(html.contains("<ruby>下人<rt>げにん</rt></ruby>"));
    assert!(html.contains("<em class=\"boten\">雨やみ</em>"));
    assert!(html.contains("<div class=\"indent-2\">"));
    assert!(html.contains("<div class=\"page-break\"></div>"));

    let (_, again) = library.open_work("456").await.expect("listed work");
    assert!(matches!(again, ReadOutcome::Document(ref r) if r.from_cache));
    assert_eq!(again.document(), Some(&reading.document));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn missing_work_becomes_placeholder() {
    let (library, _, _) = library(
        StaticListing::new().with_collection("000999", &[]),
        ScriptedDocuments::new(),
    );
    let (record, outcome) = library.open_work("9999").await.expect("listed work");
    let ReadOutcome::Exhausted(exhausted) = outcome else {
        panic!("expected exhaustion");
    };
    let placeholder = bunko_application::placeholder_document(&record, &exhausted);
    assert_eq!(placeholder.title, "行方不明");
    let text = render::to_plain_text(&placeholder);
    assert!(text.contains("9999_ruby_1"));
}
