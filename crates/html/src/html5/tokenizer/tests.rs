use super::{Html5Tokenizer, TokenBatch, TokenizeResult, TokenizerConfig};
use crate::html5::compact::{CompactKind, CompactToken, compact_batch};
use crate::html5::shared::{DocumentParseContext, InputStream, ParseErrorCode, SourcePos};
use crate::html5::tokenizer::{RawTextKind, TokenizerState};

fn drain_all_fmt(
    tokenizer: &mut Html5Tokenizer,
    input: &mut InputStream,
    ctx: &DocumentParseContext,
) -> Vec<String> {
    let batch = tokenizer.next_batch(input);
    compact_batch(&batch, &ctx.atoms).iter().map(describe).collect()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch < ' ' || ch == '\u{7f}' => out.push_str(&format!("\\u{{{:02X}}}", ch as u32)),
            ch => out.push(ch),
        }
    }
    out
}

/// One line per token, stable across runs.
fn describe(token: &CompactToken) -> String {
    let quoted = |text: &str| format!("\"{}\"", escape(text));
    let optional = |text: &Option<String>| text.as_deref().map_or("null".to_string(), quoted);
    match &token.kind {
        CompactKind::Doctype {
            name,
            public_id,
            system_id,
            force_quirks,
        } => format!(
            "DOCTYPE name={} public_id={} system_id={} force_quirks={force_quirks}",
            name.as_deref().unwrap_or("null"),
            optional(public_id),
            optional(system_id),
        ),
        CompactKind::StartTag {
            name,
            attrs,
            self_closing,
        } => {
            let attrs: Vec<String> = attrs
                .iter()
                .map(|a| match &a.value {
                    Some(value) => format!("{}={}", a.name, quoted(value)),
                    None => a.name.clone(),
                })
                .collect();
            format!(
                "START name={name} attrs=[{}] self_closing={self_closing}",
                attrs.join(" ")
            )
        }
        CompactKind::EndTag { name } => format!("END name={name}"),
        CompactKind::Comment(text) => format!("COMMENT text={}", quoted(text)),
        CompactKind::Character(text) => format!("CHAR text={}", quoted(text)),
        CompactKind::EndOfFile => "EOF".to_string(),
    }
}

fn pump_until_blocked(
    tokenizer: &mut Html5Tokenizer,
    input: &mut InputStream,
    ctx: &mut DocumentParseContext,
) -> Vec<String> {
    let mut out = Vec::new();
    loop {
        let res = tokenizer.push_input(input, ctx);
        out.extend(drain_all_fmt(tokenizer, input, ctx));
        if res == TokenizeResult::NeedMoreInput {
            return out;
        }
    }
}

/// Merge adjacent character tokens; run boundaries depend on how input
/// arrived and are not part of the chunk-equivalence contract.
fn coalesce_text(lines: Vec<String>) -> Vec<String> {
    const PREFIX: &str = "CHAR text=\"";
    let mut out: Vec<String> = Vec::new();
    for line in lines {
        if let (Some(body), Some(last)) = (line.strip_prefix(PREFIX), out.last_mut())
            && last.starts_with(PREFIX)
        {
            last.pop();
            last.push_str(body);
            continue;
        }
        out.push(line);
    }
    out
}

fn run(chunks: &[&str]) -> Vec<String> {
    run_with_ctx(chunks).0
}

fn run_with_ctx(chunks: &[&str]) -> (Vec<String>, DocumentParseContext) {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::new();
    let mut out = Vec::new();
    for chunk in chunks {
        input.append(chunk);
        out.extend(pump_until_blocked(&mut tokenizer, &mut input, &mut ctx));
    }
    assert_eq!(
        tokenizer.finish(&mut input, &mut ctx),
        TokenizeResult::EmittedEof
    );
    out.extend(drain_all_fmt(&mut tokenizer, &mut input, &ctx));
    (coalesce_text(out), ctx)
}

const CORPUS: &[&str] = &[
    "<!DOCTYPE html><p class=x>a &amp; b</p>",
    "<script>if (a</b) { x = '</scr' + 'ipt>'; }</script>tail",
    "<title>&lt;T&gt;</title><textarea>a<b</textarea>",
    "<!-- c -- d --><!---->x<!-->y<!--x-->",
    "a &am b &#x41; &#65",
    "<?pi?><br/></>x</ y>",
    "<style>p{}</StyLe >after",
    "<div a=\"1\" b='2' c=3 d>é\u{1F600}</div>",
];

#[test]
fn tokenizer_api_compiles() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<div>Hello</div>");

    let res = tokenizer.push_input(&mut input, &mut ctx);
    assert_eq!(res, TokenizeResult::Progress);
    let _ = drain_all_fmt(&mut tokenizer, &mut input, &ctx);
    assert_eq!(
        tokenizer.finish(&mut input, &mut ctx),
        TokenizeResult::EmittedEof
    );
    let _ = drain_all_fmt(&mut tokenizer, &mut input, &ctx);

    let batch: TokenBatch<'_> = tokenizer.next_batch(&mut input);
    assert!(batch.is_empty());
    let _ = batch.resolver();
}

#[test]
fn basic_tag_states_emit_expected_tokens() {
    assert_eq!(
        run(&["<div class=\"a\" id=b>Hi</div>"]),
        vec![
            "START name=div attrs=[class=\"a\" id=\"b\"] self_closing=false",
            "CHAR text=\"Hi\"",
            "END name=div",
            "EOF",
        ]
    );
}

#[test]
fn duplicate_attributes_keep_first_occurrence() {
    assert_eq!(
        run(&["<a href=1 HREF=2 title>"]),
        vec![
            "START name=a attrs=[href=\"1\" title] self_closing=false",
            "EOF"
        ]
    );
}

#[test]
fn doctype_identifiers_are_parsed() {
    let out = run(&[
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD HTML 4.01//EN\" \"http://www.w3.org/TR/html4/strict.dtd\">",
    ]);
    assert_eq!(
        out[0],
        "DOCTYPE name=html public_id=\"-//W3C//DTD HTML 4.01//EN\" system_id=\"http://www.w3.org/TR/html4/strict.dtd\" force_quirks=false"
    );
}

#[test]
fn raw_text_states_follow_start_tags() {
    assert_eq!(
        run(&["<script><b>&amp;</script><title>&lt;x&gt;</title>"]),
        vec![
            "START name=script attrs=[] self_closing=false",
            "CHAR text=\"<b>&amp;\"",
            "END name=script",
            "START name=title attrs=[] self_closing=false",
            "CHAR text=\"<x>\"",
            "END name=title",
            "EOF",
        ]
    );
}

#[test]
fn comments_and_bogus_comments() {
    assert_eq!(
        run(&["<!--a-->", "<!-->", "<?x?>", "</ y>"]),
        vec![
            "COMMENT text=\"a\"",
            "COMMENT text=\"\"",
            "COMMENT text=\"?x?\"",
            "COMMENT text=\" y\"",
            "EOF",
        ]
    );
}

#[test]
fn abrupt_comment_close_does_not_reach_a_later_terminator() {
    assert_eq!(
        run(&["<!-->y<!--x-->"]),
        vec!["COMMENT text=\"\"", "CHAR text=\"y\"", "COMMENT text=\"x\"", "EOF"]
    );
    assert_eq!(
        run(&["<!--->a-->"]),
        vec!["COMMENT text=\"\"", "CHAR text=\"a-->\"", "EOF"]
    );
    assert_eq!(run(&["<!-->y<!--x-->"]), run(&["<!-->", "y<!--x-->"]));
    assert_eq!(run(&["<!--->a-->"]), run(&["<!--", "-", ">a-->"]));
}

#[test]
fn corpus_is_chunk_invariant_at_every_split_point() {
    for text in CORPUS {
        let whole = run(&[text]);
        for (idx, _) in text.char_indices().skip(1) {
            let split = run(&[&text[..idx], &text[idx..]]);
            assert_eq!(whole, split, "split at byte {idx} of {text:?}");
        }
        let chars: Vec<String> = text.chars().map(String::from).collect();
        let refs: Vec<&str> = chars.iter().map(String::as_str).collect();
        assert_eq!(whole, run(&refs), "char-by-char feed of {text:?}");
    }
}

#[test]
fn push_input_pauses_after_script_end_tag() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<script>a</script><p>b");

    assert_eq!(
        tokenizer.push_input(&mut input, &mut ctx),
        TokenizeResult::Progress
    );
    assert_eq!(
        drain_all_fmt(&mut tokenizer, &mut input, &ctx),
        vec![
            "START name=script attrs=[] self_closing=false",
            "CHAR text=\"a\"",
            "END name=script",
        ]
    );
    assert_eq!(tokenizer.cursor(), "<script>a</script>".len());
    assert_eq!(tokenizer.state(), TokenizerState::Data);
    assert_eq!(tokenizer.stats().script_pauses, 1);

    tokenizer.push_input(&mut input, &mut ctx);
    assert_eq!(
        drain_all_fmt(&mut tokenizer, &mut input, &ctx),
        vec!["START name=p attrs=[] self_closing=false", "CHAR text=\"b\""]
    );
    assert_eq!(
        tokenizer.push_input(&mut input, &mut ctx),
        TokenizeResult::NeedMoreInput
    );
}

#[test]
fn style_end_tag_does_not_pause() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<style>a</style><p>");
    tokenizer.push_input(&mut input, &mut ctx);
    assert_eq!(drain_all_fmt(&mut tokenizer, &mut input, &ctx).len(), 4);
    assert_eq!(tokenizer.stats().script_pauses, 0);
}

#[test]
fn undecided_reference_pins_the_cursor() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("a &am");
    let out = pump_until_blocked(&mut tokenizer, &mut input, &mut ctx);
    assert_eq!(out, vec!["CHAR text=\"a \""]);
    assert_eq!(tokenizer.cursor(), 2);

    input.append("p; b");
    let out = pump_until_blocked(&mut tokenizer, &mut input, &mut ctx);
    assert_eq!(out, vec!["CHAR text=\"& b\""]);
}

#[test]
fn undecided_markup_prefix_pins_the_cursor() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("x<!-");
    let out = pump_until_blocked(&mut tokenizer, &mut input, &mut ctx);
    assert_eq!(out, vec!["CHAR text=\"x\""]);
    assert_eq!(tokenizer.state(), TokenizerState::MarkupDeclarationOpen);
    assert_eq!(tokenizer.cursor(), 3);
}

#[test]
fn snapshot_restores_inside_a_partial_tag() {
    let mut ctx = DocumentParseContext::new();
    let mut first = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<div a=\"x");
    assert!(pump_until_blocked(&mut first, &mut input, &mut ctx).is_empty());

    let snapshot = first.snapshot();
    assert!(snapshot.has_pending_token());
    assert_eq!(
        snapshot.state(),
        TokenizerState::AttributeValueDoubleQuoted
    );

    let mut resumed = Html5Tokenizer::from_snapshot(TokenizerConfig::default(), snapshot);
    let mut rest = InputStream::from_text("y\">t");
    assert_eq!(
        pump_until_blocked(&mut resumed, &mut rest, &mut ctx),
        vec![
            "START name=div attrs=[a=\"xy\"] self_closing=false",
            "CHAR text=\"t\""
        ]
    );
}

#[test]
fn snapshot_inside_script_data_remembers_the_element() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<script>var a");
    let _ = pump_until_blocked(&mut tokenizer, &mut input, &mut ctx);
    let snapshot = tokenizer.snapshot();
    assert_eq!(snapshot.state(), TokenizerState::ScriptData);
    assert_eq!(snapshot.raw_kind(), Some(RawTextKind::Script));
    assert!(!snapshot.has_pending_token());

    let mut resumed = Html5Tokenizer::from_snapshot(TokenizerConfig::default(), snapshot.clone());
    let mut rest = InputStream::from_text(" = 1;</script>");
    assert_eq!(
        pump_until_blocked(&mut resumed, &mut rest, &mut ctx),
        vec!["CHAR text=\" = 1;\"", "END name=script"]
    );
    assert!(snapshot.continues_like(&snapshot.clone()));
    assert!(!snapshot.continues_like(&resumed.snapshot()));
}

#[test]
fn token_positions_track_lines_and_columns() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<p>\n<b>x");
    tokenizer.push_input(&mut input, &mut ctx);
    let batch = tokenizer.next_batch(&mut input);
    let positions: Vec<SourcePos> = batch.iter_with_pos().map(|(_, pos)| pos).collect();
    assert_eq!(
        positions,
        vec![
            SourcePos { line: 1, column: 1 },
            SourcePos { line: 1, column: 4 },
            SourcePos { line: 2, column: 1 },
            SourcePos { line: 2, column: 4 },
        ]
    );
}

#[test]
fn max_tokens_per_pump_stops_at_a_token_boundary() {
    let mut ctx = DocumentParseContext::new();
    let config = TokenizerConfig {
        max_tokens_per_pump: Some(2),
        ..TokenizerConfig::default()
    };
    let mut tokenizer = Html5Tokenizer::new(config);
    let mut input = InputStream::from_text("<a><b><c>");
    tokenizer.push_input(&mut input, &mut ctx);
    assert_eq!(drain_all_fmt(&mut tokenizer, &mut input, &ctx).len(), 2);
    assert_eq!(tokenizer.cursor(), 6);
    assert!(!tokenizer.snapshot().has_pending_token());
}

#[test]
fn compact_input_rebases_the_cursor() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<p>abc");
    let _ = pump_until_blocked(&mut tokenizer, &mut input, &mut ctx);
    assert_eq!(tokenizer.compact_input(&mut input), 6);
    assert_eq!(tokenizer.cursor(), 0);
    input.append("<i>");
    assert_eq!(
        pump_until_blocked(&mut tokenizer, &mut input, &mut ctx),
        vec!["START name=i attrs=[] self_closing=false"]
    );
}

#[test]
fn null_characters_are_replaced_and_reported() {
    let (out, ctx) = run_with_ctx(&["a\0b"]);
    assert_eq!(out, vec!["CHAR text=\"a\u{FFFD}b\"", "EOF"]);
    assert_eq!(ctx.errors.len(), 1);
    assert_eq!(ctx.errors[0].code, ParseErrorCode::UnexpectedNullCharacter);
}

#[test]
fn eof_inside_tag_drops_it() {
    let (out, ctx) = run_with_ctx(&["x<div"]);
    assert_eq!(out, vec!["CHAR text=\"x\"", "EOF"]);
    assert_eq!(ctx.errors[0].code, ParseErrorCode::EofInTag);
    assert_eq!(run(&["<"]), vec!["CHAR text=\"<\"", "EOF"]);
}

#[test]
fn eof_inside_raw_text_end_tag_prefix_is_text() {
    assert_eq!(
        run(&["<script>a</scr"]),
        vec![
            "START name=script attrs=[] self_closing=false",
            "CHAR text=\"a</scr\"",
            "EOF"
        ]
    );
}

#[test]
fn finish_is_idempotent() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::from_text("<p>");
    let _ = pump_until_blocked(&mut tokenizer, &mut input, &mut ctx);
    assert_eq!(
        tokenizer.finish(&mut input, &mut ctx),
        TokenizeResult::EmittedEof
    );
    assert_eq!(
        tokenizer.finish(&mut input, &mut ctx),
        TokenizeResult::EmittedEof
    );
    assert_eq!(drain_all_fmt(&mut tokenizer, &mut input, &ctx), vec!["EOF"]);
    assert!(tokenizer.is_finished());
}

#[test]
#[should_panic(expected = "push_input called after finish")]
fn push_input_after_finish_panics() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut input = InputStream::new();
    tokenizer.finish(&mut input, &mut ctx);
    tokenizer.push_input(&mut input, &mut ctx);
}

#[test]
#[should_panic(expected = "tokenizer is bound to a single InputStream instance")]
fn tokenizer_rejects_a_second_input() {
    let mut ctx = DocumentParseContext::new();
    let mut tokenizer = Html5Tokenizer::new(TokenizerConfig::default());
    let mut a = InputStream::from_text("a");
    let mut b = InputStream::from_text("b");
    tokenizer.push_input(&mut a, &mut ctx);
    let _ = tokenizer.next_batch(&mut a);
    tokenizer.push_input(&mut b, &mut ctx);
}
