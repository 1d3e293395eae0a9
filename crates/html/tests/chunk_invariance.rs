use html::dom_snapshot::{DomSnapshotOptions, compare_dom};
use html::test_harness::{
    ChunkPlan, FuzzMode, default_chunk_plans, deterministic_chunk_plans, random_chunk_plan,
    run_chunked, run_full, shrink_chunk_plan,
};

const CORPUS: &[&str] = &[
    "",
    "plain text only",
    "<!DOCTYPE html><html><head><title>T &amp; U</title></head><body><p>x</p></body></html>",
    "<div class=\"a b\" data-x='1' hidden>text<span>inner</span>tail</div>",
    "<ul><li>one<li>two<li>three</ul><p>para<p>next",
    "<p>café &lt;crème&gt; &#233;&#x41; &nbsp;ünïcødé</p>",
    "<!--comment--><!----><!-- - -- --><p>after</p>",
    "<script>if (a < b && c > d) { x = '</scr' + 'ipt>'; }</script><p>done</p>",
    "<style>p { color: red }</style><textarea>\n<b>raw</b></textarea>",
    "<pre>\n\nkept newline</pre><br/><img src=a.png alt=\"\">",
    "<h1>a<h2>b</h1>c</h2><dl><dt>t<dd>d</dl>",
    "text &amp no semicolon &unknown; &#0; done",
    "<body></body><!--a--></html><!--b-->",
    "<div><span>x</b>y</div>",
    "<p>a\u{0}b</p><title>x</title",
];

fn failing_plan(input: &str, plan: &ChunkPlan) -> Option<String> {
    let full = run_full(input);
    let chunked = run_chunked(input, plan);
    compare_dom(&full, &chunked, DomSnapshotOptions::default()).err()
}

fn check(input: &str, plan: &ChunkPlan) {
    if let Some(err) = failing_plan(input, plan) {
        let minimized = shrink_chunk_plan(input, plan, |p| failing_plan(input, p).is_some());
        panic!("chunked parse diverged for {input:?}\nplan: {plan}\nminimized: {minimized}\n{err}");
    }
}

#[test]
fn default_plans_match_one_shot_parse() {
    for input in CORPUS {
        for plan in default_chunk_plans() {
            check(input, plan);
        }
    }
}

#[test]
fn deterministic_plans_match_one_shot_parse() {
    for input in CORPUS {
        for plan in deterministic_chunk_plans(input) {
            check(input, &plan);
        }
    }
}

#[test]
fn seeded_random_plans_match_one_shot_parse() {
    let seeds = 0..64u64;
    for input in CORPUS {
        for seed in seeds.clone() {
            let fuzz = random_chunk_plan(input, seed, FuzzMode::Mixed);
            if let Some(err) = failing_plan(input, &fuzz.plan) {
                panic!("{}: {err}", fuzz.summary);
            }
        }
    }
}

#[test]
fn tag_split_across_two_appends() {
    let input = "<div>x</div>";
    check(input, &ChunkPlan::boundaries(vec!["<di".len()]));
}
