use super::*;
use crate::dom::{Dom, SelectionRect, Snapshot};
use url::Url;

fn snapshot(body: &str) -> Snapshot {
    let html = format!("<html><head></head><body>{}</body></html>", body);
    Snapshot::parse(&html).with_base_url(Url::parse("https://example.com/list").unwrap())
}

fn urls(links: &[crate::results::ExtractedLink]) -> Vec<&str> {
    links.iter().map(|l| l.url.as_str()).collect()
}

#[test]
fn test_region_extracts_only_intersecting_links() {
    let dom = snapshot(
        r#"
        <a href="/a" data-rl-box="10,10,10,10">A</a>
        <a href="/b" data-rl-box="100,100,10,10">B</a>
        <a href="/c" data-rl-box="15,15,20,5">C</a>
        "#,
    );
    let rect = SelectionRect::new(0.0, 0.0, 50.0, 50.0);
    let links = extract_links(&dom, &rect, &ExtractOptions::default());

    assert_eq!(
        urls(&links),
        vec!["https://example.com/a", "https://example.com/c"]
    );
    assert_eq!(links[0].text, "A");
    assert_eq!(links[0].index, 0);
    assert_eq!(links[1].index, 2);
    assert_eq!(links[1].top, 15.0);
}

#[test]
fn test_region_skips_zero_sized_and_empty_href() {
    let dom = snapshot(
        r#"
        <a href="/hidden" data-rl-box="10,10,0,0">Hidden</a>
        <a href="" data-rl-box="10,10,10,10">Empty</a>
        <a href="/shown" data-rl-box="12,12,10,10">Shown</a>
        "#,
    );
    let rect = SelectionRect::new(0.0, 0.0, 50.0, 50.0);
    let links = extract_links(&dom, &rect, &ExtractOptions::default());
    assert_eq!(urls(&links), vec!["https://example.com/shown"]);
}

#[test]
fn test_region_dedupes_by_normalized_url() {
    let dom = snapshot(
        r#"
        <a href="/p?utm_source=x&id=1" data-rl-box="0,0,10,10">First</a>
        <a href="/p?id=1" data-rl-box="0,20,10,10">Second</a>
        <a href="/q/" data-rl-box="0,40,10,10">Third</a>
        "#,
    );
    let rect = SelectionRect::new(0.0, 0.0, 100.0, 100.0);
    let options = ExtractOptions {
        clean_urls: true,
        ..ExtractOptions::default()
    };
    let links = extract_links(&dom, &rect, &options);

    assert_eq!(
        urls(&links),
        vec!["https://example.com/p?id=1", "https://example.com/q"]
    );
    assert_eq!(links[0].text, "First");
}

#[test]
fn test_region_nested_anchor_handling() {
    let dom = snapshot(
        r#"
        <a href="/outer" data-rl-box="0,0,50,50">Outer</a>
        <a href="/inner" data-rl-nested="" data-rl-box="5,5,10,10">Inner</a>
        "#,
    );
    let rect = SelectionRect::new(0.0, 0.0, 100.0, 100.0);

    let ignoring = extract_links(&dom, &rect, &ExtractOptions::default());
    assert_eq!(urls(&ignoring), vec!["https://example.com/outer"]);

    let keeping = extract_links(
        &dom,
        &rect,
        &ExtractOptions {
            ignore_nested_anchors: false,
            ..ExtractOptions::default()
        },
    );
    assert_eq!(keeping.len(), 2);
}

#[test]
fn test_link_text_precedence() {
    let dom = snapshot(
        r#"
        <a id="t" href="/t">  Plain   text </a>
        <a id="aria" href="/aria" aria-label="Aria label"></a>
        <a id="img" href="/img"><img alt="Picture"></a>
        <a id="svg" href="/svg"><svg><title>Icon title</title></svg></a>
        <a id="url" href="https://www.shop.example.com/products/42"></a>
        "#,
    );
    let text = |id: &str| {
        let node = dom.query(&format!("#{}", id)).unwrap();
        let href = absolute_href(&dom, node).unwrap();
        link_text(&dom, node, &href)
    };

    assert_eq!(text("t"), "Plain   text");
    assert_eq!(text("aria"), "Aria label");
    assert_eq!(text("img"), "Picture");
    assert_eq!(text("svg"), "Icon title");
    assert_eq!(text("url"), "Example - Products");
}

#[test]
fn test_absolute_href_prefers_host_resolution() {
    let dom = snapshot(r#"<a href="rel" data-rl-href="https://cdn.example.com/rel">x</a>"#);
    let node = dom.query("a").unwrap();
    assert_eq!(
        absolute_href(&dom, node).as_deref(),
        Some("https://cdn.example.com/rel")
    );
}

#[test]
fn test_container_extraction_skips_hidden() {
    let dom = snapshot(
        r#"
        <ul class="results">
          <li><a href="/1" data-rl-box="0,0,10,10">One</a></li>
          <li data-rl-hidden=""><a href="/2" data-rl-box="0,0,10,10">Two</a></li>
          <li><a href="/3" data-rl-box="0,0,10,10">Three</a></li>
          <li><a href="/1" data-rl-box="0,0,10,10">Dup</a></li>
        </ul>
        <a href="/outside" data-rl-box="0,0,10,10">Outside</a>
        "#,
    );
    let links = extract_from_container(&dom, "ul.results", &ExtractOptions::default());
    assert_eq!(
        urls(&links),
        vec!["https://example.com/1", "https://example.com/3"]
    );
}

#[test]
fn test_container_extraction_missing_or_invalid_selector() {
    let dom = snapshot(r#"<a href="/1" data-rl-box="0,0,10,10">One</a>"#);
    assert!(extract_from_container(&dom, "#missing", &ExtractOptions::default()).is_empty());
    assert!(extract_from_container(&dom, "[[[", &ExtractOptions::default()).is_empty());
}

#[test]
fn test_detect_container_repeating_list() {
    let dom = snapshot(
        r#"
        <div>
          <ul>
            <li><a href="/1">1</a></li>
            <li><a href="/2">2</a></li>
            <li><a href="/3">3</a></li>
            <li><a href="/4">4</a></li>
            <li><a href="/5">5</a></li>
          </ul>
          <ul><li><a href="/other">other</a></li></ul>
        </div>
        "#,
    );
    let first_list = dom.query("ul").unwrap();
    let anchors = dom.query_all_within(first_list, "a");

    let selector = detect_container(&dom, &anchors).unwrap();
    let resolved = dom.query_all(&selector);
    assert_eq!(resolved, vec![first_list], "selector {} resolved wrongly", selector);
    assert_eq!(dom.query_all_within(resolved[0], "a").len(), 5);
}

#[test]
fn test_detect_container_prefers_unique_id_and_classes() {
    let dom = snapshot(
        r#"
        <section id="feed">
          <article class="card rl-highlight"><h2><a href="/a">A</a></h2></article>
          <article class="card"><h2><a href="/b">B</a></h2></article>
        </section>
        <div class="grid"><div class="cell"><a href="/c">C</a></div><div class="cell"><a href="/d">D</a></div></div>
        "#,
    );
    let feed = dom.query("#feed").unwrap();
    let anchors = dom.query_all_within(feed, "a");
    assert_eq!(detect_container(&dom, &anchors).as_deref(), Some("#feed"));

    let grid = dom.query("div.grid").unwrap();
    let anchors = dom.query_all_within(grid, "a");
    assert_eq!(detect_container(&dom, &anchors).as_deref(), Some("div.grid"));
}

#[test]
fn test_detect_container_single_link_climbs_three_levels() {
    let dom = snapshot(
        r#"<main class="page"><div><p><span><a href="/x">x</a></span></p></div></main>"#,
    );
    let anchor = dom.query("a").unwrap();
    let selector = detect_container(&dom, &[anchor]).unwrap();
    let resolved = dom.query(&selector).unwrap();
    assert_eq!(dom.tag_name(resolved), "div");
}

#[test]
fn test_detect_container_empty_input() {
    let dom = snapshot("<p>nothing</p>");
    assert_eq!(detect_container(&dom, &[]), None);
}

#[test]
fn test_generate_selector_uses_nth_of_type_path() {
    let dom = snapshot(
        r#"<div><p>a</p><p>b</p></div><div><p>c</p><p>d</p></div>"#,
    );
    let target = dom.query_all("p")[3];
    let selector = detector::generate_selector(&dom, target);
    assert_eq!(selector, "body > div:nth-of-type(2) > p:nth-of-type(2)");
    assert_eq!(dom.query_all(&selector), vec![target]);
}

#[test]
fn test_anchors_in_rect() {
    let dom = snapshot(
        r#"
        <a href="/in" data-rl-box="5,5,10,10">in</a>
        <a href="/out" data-rl-box="500,500,10,10">out</a>
        "#,
    );
    let found = anchors_in_rect(&dom, &SelectionRect::new(0.0, 0.0, 50.0, 50.0));
    assert_eq!(found.len(), 1);
    assert_eq!(dom.attr(found[0], "href"), Some("/in"));
}
