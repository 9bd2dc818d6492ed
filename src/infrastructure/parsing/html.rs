//! Extraction helpers shared by the page-scraping parsers.
//!
//! Everything here is synchronous: `scraper::Html` is not `Send`, so parsers
//! fetch the page first and hand the text to these helpers afterwards.

use scraper::{ElementRef, Html, Selector};

use crate::domain::errors::{ParseError, ParseResult};
use crate::domain::vendor::VendorType;

const MAX_ENTITY_LEN: usize = 10;

pub fn selector(vendor: VendorType, css: &str) -> ParseResult<Selector> {
    Selector::parse(css)
        .map_err(|e| ParseError::extraction(vendor, format!("invalid selector '{css}': {e}")))
}

/// Concatenated, trimmed text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Content of the first element matching `css` whose text satisfies `predicate`.
pub fn find_text<P>(doc: &Html, css: &Selector, predicate: P) -> Option<String>
where
    P: Fn(&str) -> bool,
{
    doc.select(css)
        .map(element_text)
        .find(|content| predicate(content))
}

/// First `<script>` whose body satisfies `predicate`.
pub fn find_script<P>(doc: &Html, vendor: VendorType, predicate: P) -> ParseResult<Option<String>>
where
    P: Fn(&str) -> bool,
{
    let scripts = selector(vendor, "script")?;
    Ok(find_text(doc, &scripts, predicate))
}

/// Text after the first occurrence of `marker`.
pub fn cut_after<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    content.split_once(marker).map(|(_, after)| after)
}

/// Text before the first occurrence of `marker`.
pub fn cut_before<'a>(content: &'a str, marker: &str) -> Option<&'a str> {
    content.split_once(marker).map(|(before, _)| before)
}

/// Replace runs of whitespace with single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop markup and decode entities, keeping only text nodes.
pub fn strip_tags(markup: &str) -> String {
    let fragment = Html::parse_fragment(markup);
    let text = fragment.root_element().text().collect::<String>();
    collapse_whitespace(&text)
}

/// Decode named and numeric character references.
///
/// Script bodies are raw text for the HTML parser, so embedded JSON may
/// still carry `&quot;` and friends.
pub fn unescape_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let decoded = tail
            .find(';')
            .filter(|end| *end <= MAX_ENTITY_LEN)
            .and_then(|end| decode_entity(&tail[1..end]).map(|ch| (ch, end)));

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Whole-unit price from vendor text such as `"12990"` or `"12990.00"`.
pub fn parse_price(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }

    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn finds_script_by_content() {
        let doc = Html::parse_document(
            "<html><head><script>var a = 1;</script><script>window.__NUXT__ = {}</script></head></html>",
        );

        let found = find_script(&doc, VendorType::Lamoda, |body| body.contains("__NUXT__")).unwrap();
        let missing = find_script(&doc, VendorType::Lamoda, |body| body.contains("nothing")).unwrap();

        assert_eq!(found.as_deref(), Some("window.__NUXT__ = {}"));
        assert!(missing.is_none());
    }

    #[test]
    fn cuts_around_markers() {
        assert_eq!(cut_after("a payload: b", "payload"), Some(": b"));
        assert_eq!(cut_before("a settings b", "settings"), Some("a "));
        assert_eq!(cut_after("abc", "x"), None);
    }

    #[rstest]
    #[case("Tom &amp; Jerry", "Tom & Jerry")]
    #[case("{&quot;a&quot;: 1}", "{\"a\": 1}")]
    #[case("&#39;x&#39; &#x41;", "'x' A")]
    #[case("fish & chips", "fish & chips")]
    #[case("&unknown; &", "&unknown; &")]
    fn unescapes_entities(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(unescape_entities(input), expected);
    }

    #[test]
    fn strips_tags_and_collapses_spaces() {
        let text = strip_tags("<p>Водоотталкивающая   ткань</p>\n<ul><li>Карман &amp; <b>молния</b></li></ul>");
        assert_eq!(text, "Водоотталкивающая ткань Карман & молния");
    }

    #[rstest]
    #[case("12990", Some(12990))]
    #[case(" 12990.90 ", Some(12990))]
    #[case("0", Some(0))]
    #[case("n/a", None)]
    #[case("", None)]
    fn parses_prices(#[case] raw: &str, #[case] expected: Option<i64>) {
        assert_eq!(parse_price(raw), expected);
    }
}
