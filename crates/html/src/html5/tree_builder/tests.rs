use super::{Html5TreeBuilder, InsertionMode, PendingScript, TreeBuilderConfig, TreeBuilderStep};
use crate::Document;
use crate::dom_snapshot::{DomSnapshot, DomSnapshotOptions};
use crate::html5::compact::{CompactAttr, CompactToken, compact_batch};
use crate::html5::shared::{DocumentParseContext, InputStream, ParseErrorCode, SourcePos};
use crate::html5::tokenizer::{Html5Tokenizer, TokenizerConfig};
use core_types::ResourceKind;

fn tokens(html: &str) -> Vec<CompactToken> {
    let mut ctx = DocumentParseContext::new();
    let mut input = InputStream::from_text(html);
    let mut tok = Html5Tokenizer::new(TokenizerConfig::default());
    tok.finish(&mut input, &mut ctx);
    let batch = tok.next_batch(&mut input);
    compact_batch(&batch, &ctx.atoms)
}

/// Build a document, collecting every suspension.
fn build(html: &str) -> (Document, Html5TreeBuilder, Vec<PendingScript>) {
    let mut doc = Document::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default());
    let mut scripts = Vec::new();
    for token in tokens(html) {
        if let TreeBuilderStep::Suspend(script) = builder.process(&token, &mut doc) {
            scripts.push(script);
        }
    }
    (doc, builder, scripts)
}

fn snapshot(html: &str) -> Vec<String> {
    let (doc, _, _) = build(html);
    DomSnapshot::new(&doc.to_node(), DomSnapshotOptions::default())
        .as_lines()
        .to_vec()
}

#[test]
fn empty_input_gets_implied_skeleton() {
    assert_eq!(
        snapshot(""),
        vec!["#document", "  <html>", "    <head>", "    <body>"]
    );
}

#[test]
fn head_content_goes_to_head_and_text_starts_body() {
    assert_eq!(
        snapshot("<!DOCTYPE html><title>T</title> <meta charset=utf-8>hello"),
        vec![
            "#document",
            "  <!DOCTYPE html>",
            "  <html>",
            "    <head>",
            "      <title>",
            "        \"T\"",
            "      \" \"",
            "      <meta charset=\"utf-8\">",
            "    <body>",
            "      \"hello\"",
        ]
    );
}

#[test]
fn p_closes_on_block_start_and_end_p_without_open_p_inserts_one() {
    assert_eq!(
        snapshot("<p>a<div>b</div></p>"),
        vec![
            "#document",
            "  <html>",
            "    <head>",
            "    <body>",
            "      <p>",
            "        \"a\"",
            "      <div>",
            "        \"b\"",
            "      <p>",
        ]
    );
}

#[test]
fn list_items_close_each_other() {
    assert_eq!(
        snapshot("<ul><li>a<li>b</ul><dl><dt>x<dd>y</dl>"),
        vec![
            "#document",
            "  <html>",
            "    <head>",
            "    <body>",
            "      <ul>",
            "        <li>",
            "          \"a\"",
            "        <li>",
            "          \"b\"",
            "      <dl>",
            "        <dt>",
            "          \"x\"",
            "        <dd>",
            "          \"y\"",
        ]
    );
}

#[test]
fn void_elements_and_br_end_tag() {
    assert_eq!(
        snapshot("a<br>b</br>c<img src=x>"),
        vec![
            "#document",
            "  <html>",
            "    <head>",
            "    <body>",
            "      \"a\"",
            "      <br>",
            "      \"b\"",
            "      <br>",
            "      \"c\"",
            "      <img src=\"x\">",
        ]
    );
}

#[test]
fn unmatched_end_tag_stops_at_special_element() {
    let (doc, mut builder, _) = build("<div><span>x</b>y</div>");
    let lines = DomSnapshot::new(&doc.to_node(), DomSnapshotOptions::default())
        .as_lines()
        .to_vec();
    assert_eq!(
        &lines[4..],
        &[
            "      <div>",
            "        <span>",
            "          \"xy\"",
        ]
    );
    assert!(
        builder
            .take_errors()
            .iter()
            .any(|e| e.code == ParseErrorCode::UnexpectedEndTag)
    );
}

#[test]
fn heading_start_closes_open_heading() {
    assert_eq!(
        &snapshot("<h1>a<h2>b</h1>c")[4..],
        &["      <h1>", "        \"a\"", "      <h2>", "        \"b\"", "      \"c\""]
    );
}

#[test]
fn pre_drops_leading_newline() {
    assert_eq!(
        &snapshot("<pre>\nx</pre>")[4..],
        &["      <pre>", "        \"x\""]
    );
}

#[test]
fn comments_after_body_attach_to_html_and_document() {
    assert_eq!(
        snapshot("<body></body><!--a--></html><!--b-->"),
        vec![
            "#document",
            "  <html>",
            "    <head>",
            "    <body>",
            "    <!-- a -->",
            "  <!-- b -->",
        ]
    );
}

#[test]
fn blocking_script_suspends_with_its_text() {
    let (_, builder, scripts) = build("<p>a<script>document.write('b')</script>c</p>");
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].text, "document.write('b')");
    assert_eq!(scripts[0].src, None);
    assert_eq!(scripts[0].pos, SourcePos { line: 1, column: 5 });
    assert_eq!(builder.stats().scripts_suspended, 1);
}

#[test]
fn async_defer_module_and_data_scripts_do_not_suspend() {
    let (_, _, scripts) = build(
        "<script async src=a.js></script>\
         <script defer src=b.js></script>\
         <script type=module>m</script>\
         <script type=text/template>t</script>\
         <script defer>inline defer still blocks</script>",
    );
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0].text, "inline defer still blocks");
}

#[test]
fn scripting_disabled_never_suspends() {
    let mut doc = Document::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig { scripting: false });
    for token in tokens("<script>x</script>") {
        assert!(!matches!(
            builder.process(&token, &mut doc),
            TreeBuilderStep::Suspend(_)
        ));
    }
}

#[test]
fn script_cut_off_by_eof_is_dropped() {
    let (doc, mut builder, scripts) = build("<script>never");
    assert!(scripts.is_empty());
    assert_eq!(doc.elements_by_name("script").len(), 1);
    assert!(
        builder
            .take_errors()
            .iter()
            .any(|e| e.code == ParseErrorCode::EofInText)
    );
}

#[test]
fn blocked_tokens_are_neutralized() {
    let mut doc = Document::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default());
    let toks = tokens("<script src=evil.js>x</script><p>t</p>");
    for (i, token) in toks.iter().enumerate() {
        // Block the script start tag and its text.
        let step = if i < 2 {
            builder.process_blocked(token, &mut doc)
        } else {
            builder.process(token, &mut doc)
        };
        assert!(!matches!(step, TreeBuilderStep::Suspend(_)));
    }
    let scripts = doc.elements_by_name("script");
    assert_eq!(scripts.len(), 1);
    assert!(doc.is_inert(scripts[0]));
    assert_eq!(doc.attribute(scripts[0], "src"), None);
    assert_eq!(doc.text_content(scripts[0]), "");
    assert!(builder.drain_fetches().is_empty());
    assert_eq!(builder.stats().neutralized, 2);
}

#[test]
fn inserted_elements_queue_fetches() {
    let (_, mut builder, _) =
        build("<link rel=stylesheet href=s.css><script src=a.js></script><img src=i.png>");
    let kinds: Vec<_> = builder.drain_fetches().into_iter().map(|f| f.kind).collect();
    assert_eq!(
        kinds,
        vec![ResourceKind::Style, ResourceKind::Script, ResourceKind::Image]
    );
    assert!(builder.drain_fetches().is_empty());
}

#[test]
fn finish_is_idempotent() {
    let mut doc = Document::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default());
    builder.process(&CompactToken::text("x", SourcePos::START), &mut doc);
    builder.finish(SourcePos::START, &mut doc);
    let first = doc.to_node();
    let mutations = doc.mutation_count();
    builder.finish(SourcePos::START, &mut doc);
    assert_eq!(
        builder.process(&CompactToken::text("late", SourcePos::START), &mut doc),
        TreeBuilderStep::Finished
    );
    assert_eq!(doc.to_node(), first);
    assert_eq!(doc.mutation_count(), mutations);
    assert!(builder.is_finished());
}

#[test]
fn text_split_anywhere_builds_one_node() {
    let mut doc = Document::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default());
    for piece in ["  ", " a", "b", " "] {
        builder.process(&CompactToken::text(piece, SourcePos::START), &mut doc);
    }
    builder.finish(SourcePos::START, &mut doc);
    let body = doc.elements_by_name("body")[0];
    assert_eq!(doc.children(body).len(), 1);
    assert_eq!(doc.text_content(body), "ab ");
}

#[test]
fn head_elements_after_head_go_back_into_head() {
    let mut doc = Document::new();
    let mut builder = Html5TreeBuilder::new(TreeBuilderConfig::default());
    let pos = SourcePos::START;
    builder.process(&CompactToken::start_tag("head", Vec::new(), pos), &mut doc);
    builder.process(&CompactToken::end_tag("head", pos), &mut doc);
    assert_eq!(builder.mode(), InsertionMode::AfterHead);
    builder.process(
        &CompactToken::start_tag("meta", vec![CompactAttr::new("charset", Some("x"))], pos),
        &mut doc,
    );
    assert_eq!(builder.mode(), InsertionMode::AfterHead);
    assert_eq!(builder.simulator_state().open_elements, vec!["html"]);
    let head = doc.elements_by_name("head")[0];
    assert_eq!(doc.children(head).len(), 1);
}
