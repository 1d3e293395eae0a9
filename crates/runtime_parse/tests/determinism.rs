//! The tree never depends on how the network splits the input, on chunk
//! sizes, or on whether the worker speculated.

use html::dom_snapshot::{DomSnapshotOptions, compare_dom};
use html::{Node, parse_document};
use proptest::prelude::*;
use runtime_parse::{
    Collaborators, Coordinator, DocumentWriteHost, Driver, ParserConfig, PumpStatus,
};

const MARKUP: &[&str] = &[
    "<p>",
    "</p>",
    "text ",
    "<div class=a>",
    "</div>",
    "<b>",
    "</b>",
    "<i>",
    "</i>",
    "<ul><li>one<li>two</ul>",
    "<table><tr><td>c</td></tr></table>",
    "<!-- note -->",
    "<!-->a-->",
    "<!--->a-->",
    "<textarea>a<b>c</textarea>",
    "<title>t&amp;t</title>",
    "<br/>",
    "&lt;&#65;",
    "<img src=x.png>",
];

const WRITES: &[&str] = &["", "b", "<div>", "<!--", "<i>x</i>", "<b", "</p>", "-->"];

fn markup_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(MARKUP), 1..24).prop_map(|parts| parts.concat())
}

/// Markup with some inline scripts that write one of `WRITES`.
fn scripted_strategy() -> impl Strategy<Value = String> {
    let part = prop_oneof![
        3 => prop::sample::select(MARKUP).prop_map(str::to_string),
        1 => prop::sample::select(WRITES)
            .prop_map(|w| format!("<script>document.write('{w}')</script>")),
    ];
    prop::collection::vec(part, 1..16).prop_map(|parts| parts.concat())
}

/// Byte sizes of the network reads. Cuts are moved to char boundaries.
fn split(html: &str, sizes: &[usize]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut sizes = sizes.iter().cycle();
    while start < html.len() {
        let mut end = (start + sizes.next().copied().unwrap_or(1)).min(html.len());
        while !html.is_char_boundary(end) {
            end += 1;
        }
        chunks.push(html[start..end].to_string());
        start = end;
    }
    chunks
}

fn parse(html: &str, sizes: &[usize], config: ParserConfig) -> Node {
    let driver = Driver::new();
    let collaborators = Collaborators {
        script_host: Box::new(DocumentWriteHost::new()),
        wake: Some(driver.wake_hook()),
        ..Collaborators::default()
    };
    let mut coordinator = Coordinator::new(config, collaborators).unwrap();
    let chunks = split(html, sizes);
    let status = driver.parse_chunks(&mut coordinator, chunks.iter().map(String::as_str));
    assert_eq!(status, PumpStatus::Finished);
    coordinator.dom()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn speculative_parse_matches_one_shot_parse(
        html in markup_strategy(),
        sizes in prop::collection::vec(1usize..12, 1..6),
        chunk_token_limit in 1usize..6,
    ) {
        let config = ParserConfig {
            chunk_token_limit,
            scripting: false,
            ..ParserConfig::default()
        };
        let actual = parse(&html, &sizes, config);
        let expected = parse_document(&html).to_node();
        let result = compare_dom(&expected, &actual, DomSnapshotOptions::default());
        prop_assert!(result.is_ok(), "{html:?} split {sizes:?}: {}", result.unwrap_err());
    }

    #[test]
    fn speculation_never_changes_what_scripts_produce(
        html in scripted_strategy(),
        sizes in prop::collection::vec(1usize..12, 1..6),
        chunk_token_limit in 1usize..6,
    ) {
        let synchronous = parse(&html, &[html.len().max(1)], ParserConfig {
            speculative: false,
            ..ParserConfig::default()
        });
        let speculative = parse(&html, &sizes, ParserConfig {
            chunk_token_limit,
            ..ParserConfig::default()
        });
        let result = compare_dom(&synchronous, &speculative, DomSnapshotOptions::default());
        prop_assert!(result.is_ok(), "{html:?} split {sizes:?}: {}", result.unwrap_err());
    }
}

#[test]
fn split_moves_cuts_to_char_boundaries() {
    let chunks = split("a\u{e9}b", &[2]);
    assert_eq!(chunks, ["a\u{e9}", "b"]);
}
