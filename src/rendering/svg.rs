//! SVG artifact checks and cleanup.
//!
//! Backend output is untrusted until it passes [`validate`]. Before it is
//! rasterized it goes through [`sanitize`], which removes sub-documents and
//! attributes that can execute code or that the rasterizer cannot decode.

use crate::core::error::{RenderError, RenderResult};
use base64::{Engine as _, engine::general_purpose};
use regex::Regex;
use std::sync::OnceLock;

/// Prefix of the data URLs produced by [`to_data_url`].
pub const SVG_DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

/// Elements removed together with their content.
const STRIPPED_ELEMENTS: &[&str] = &["script", "foreignObject", "iframe", "object", "embed", "style"];

fn regex(pattern: &str, desc: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid {desc} regex: {err}"))
}

/// Checks that `svg` is non-empty and carries an `<svg` root marker.
pub fn validate(svg: &str) -> RenderResult<()> {
    let trimmed = svg.trim();
    if trimmed.is_empty() {
        return Err(RenderError::MalformedOutput("empty SVG output".into()));
    }
    if !trimmed.contains("<svg") {
        let preview: String = trimmed.chars().take(40).collect();
        return Err(RenderError::MalformedOutput(format!(
            "missing <svg> root marker in output starting with {:?}",
            preview
        )));
    }
    Ok(())
}

/// Reads the intrinsic size of an SVG document.
///
/// Uses the root `width`/`height` attributes (`pt`, `px` or unitless) and
/// falls back to the `viewBox` size.
pub fn dimensions(svg: &str) -> RenderResult<(f32, f32)> {
    let doc = roxmltree::Document::parse(svg)
        .map_err(|e| RenderError::MalformedOutput(format!("unparseable SVG: {}", e)))?;
    let root = doc.root_element();
    if root.tag_name().name() != "svg" {
        return Err(RenderError::MalformedOutput(format!(
            "root element is <{}>, expected <svg>",
            root.tag_name().name()
        )));
    }

    let view_box = root.attribute("viewBox").and_then(parse_view_box);
    let width = root
        .attribute("width")
        .and_then(parse_length)
        .or(view_box.map(|(w, _)| w));
    let height = root
        .attribute("height")
        .and_then(parse_length)
        .or(view_box.map(|(_, h)| h));

    match (width, height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Ok((w, h)),
        _ => Err(RenderError::MalformedOutput(
            "SVG has no usable width/height or viewBox".into(),
        )),
    }
}

fn parse_length(value: &str) -> Option<f32> {
    let value = value.trim();
    let number = value
        .strip_suffix("pt")
        .or_else(|| value.strip_suffix("px"))
        .unwrap_or(value);
    number.trim().parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_view_box(value: &str) -> Option<(f32, f32)> {
    let parts: Vec<f32> = value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::parse::<f32>)
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [_, _, w, h] => Some((*w, *h)),
        _ => None,
    }
}

/// Removes executable content, embedded documents, style noise and the
/// XHTML namespace from an SVG document.
pub fn sanitize(svg: &str) -> String {
    static ELEMENTS: OnceLock<Vec<(Regex, Regex)>> = OnceLock::new();
    static XHTML_PAIRED: OnceLock<Regex> = OnceLock::new();
    static XHTML_TAG: OnceLock<Regex> = OnceLock::new();
    static EVENT_ATTR: OnceLock<Regex> = OnceLock::new();
    static STYLE_ATTR: OnceLock<Regex> = OnceLock::new();
    static SCRIPT_HREF: OnceLock<Regex> = OnceLock::new();
    static XHTML_NS: OnceLock<Regex> = OnceLock::new();

    let elements = ELEMENTS.get_or_init(|| {
        STRIPPED_ELEMENTS
            .iter()
            .map(|tag| {
                (
                    regex(&format!(r"(?is)<{tag}\b[^>]*?/>"), tag),
                    regex(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"), tag),
                )
            })
            .collect()
    });
    let xhtml_paired = XHTML_PAIRED.get_or_init(|| {
        regex(r"(?is)<h5:([a-z0-9]+)\b[^>]*>.*?</h5:[a-z0-9]+\s*>", "xhtml element")
    });
    let xhtml_tag = XHTML_TAG.get_or_init(|| regex(r"(?is)</?h5:[^>]*>", "xhtml tag"));
    let event_attr = EVENT_ATTR.get_or_init(|| {
        regex(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*')"#, "event attribute")
    });
    let style_attr = STYLE_ATTR.get_or_init(|| {
        regex(r#"(?i)\s+style\s*=\s*(?:"[^"]*"|'[^']*')"#, "style attribute")
    });
    let script_href = SCRIPT_HREF.get_or_init(|| {
        regex(
            r#"(?i)\s+(?:xlink:)?href\s*=\s*(?:"\s*javascript:[^"]*"|'\s*javascript:[^']*')"#,
            "script href",
        )
    });
    let xhtml_ns = XHTML_NS.get_or_init(|| {
        regex(r#"(?i)\s+xmlns:h5\s*=\s*(?:"[^"]*"|'[^']*')"#, "xhtml namespace")
    });

    let mut out = svg.to_string();
    for (self_closing, paired) in elements {
        out = self_closing.replace_all(&out, "").into_owned();
        out = paired.replace_all(&out, "").into_owned();
    }
    out = xhtml_paired.replace_all(&out, "").into_owned();
    out = xhtml_tag.replace_all(&out, "").into_owned();
    for attr in [event_attr, style_attr, script_href, xhtml_ns] {
        out = attr.replace_all(&out, "").into_owned();
    }
    out
}

/// Encodes an SVG document as a base64 data URL.
pub fn to_data_url(svg: &str) -> String {
    format!(
        "{}{}",
        SVG_DATA_URL_PREFIX,
        general_purpose::STANDARD.encode(svg.as_bytes())
    )
}

/// Decodes a data URL produced by [`to_data_url`].
pub fn decode_data_url(url: &str) -> RenderResult<Vec<u8>> {
    let payload = url.strip_prefix(SVG_DATA_URL_PREFIX).ok_or_else(|| {
        RenderError::Materialize("not a base64 SVG data URL".to_string())
    })?;
    general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| RenderError::Materialize(format!("invalid base64 payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPST_LIKE: &str = r#"<svg class="typst-doc" viewBox="0 0 42.5 12" width="42.5pt" height="12pt" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" xmlns:h5="http://www.w3.org/1999/xhtml"><path d="M0 0h10v10H0z"/></svg>"#;

    #[test]
    fn test_validate_rejects_empty_and_foreign_output() {
        assert!(matches!(validate("  "), Err(RenderError::MalformedOutput(_))));
        assert!(matches!(
            validate("error: unknown variable"),
            Err(RenderError::MalformedOutput(_))
        ));
        assert!(validate(TYPST_LIKE).is_ok());
    }

    #[test]
    fn test_dimensions_from_attributes() {
        assert_eq!(dimensions(TYPST_LIKE).unwrap(), (42.5, 12.0));
    }

    #[test]
    fn test_dimensions_fall_back_to_view_box() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0,0,30,20"/>"#;
        assert_eq!(dimensions(svg).unwrap(), (30.0, 20.0));
    }

    #[test]
    fn test_dimensions_reject_missing_size() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect/></svg>"#;
        assert!(matches!(dimensions(svg), Err(RenderError::MalformedOutput(_))));
        assert!(dimensions("<svg").is_err());
    }

    #[test]
    fn test_sanitize_strips_executable_content() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" onload="alert(1)" width="10" height="10"><script>alert(2)</script><script src="x.js"/><a href="javascript:alert(3)"><rect style="fill:red" width="10" height="10"/></a></svg>"#;
        let clean = sanitize(svg);

        assert!(!clean.contains("script"));
        assert!(!clean.contains("alert"));
        assert!(!clean.contains("style="));
        assert!(clean.contains(r#"<rect width="10" height="10"/>"#));
        assert!(roxmltree::Document::parse(&clean).is_ok());
    }

    #[test]
    fn test_sanitize_strips_embedded_documents() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:h5="http://www.w3.org/1999/xhtml" width="10" height="10"><style>.t{fill:red}</style><foreignObject width="10" height="10"><h5:div><h5:span>text</h5:span></h5:div></foreignObject><h5:div class="layer"><h5:p>a</h5:p></h5:div><g/></svg>"#;
        let clean = sanitize(svg);

        assert!(!clean.contains("foreignObject"));
        assert!(!clean.contains("h5"));
        assert!(!clean.contains("<style"));
        assert!(clean.contains("<g/>"));
        assert!(roxmltree::Document::parse(&clean).is_ok());
    }

    #[test]
    fn test_data_url_round_trip() {
        let url = to_data_url(TYPST_LIKE);
        assert!(url.starts_with(SVG_DATA_URL_PREFIX));
        assert_eq!(decode_data_url(&url).unwrap(), TYPST_LIKE.as_bytes());
        assert!(decode_data_url("data:image/png;base64,AAAA").is_err());
    }
}
