//! The markup backend contract.

use crate::core::error::RenderResult;
use crate::core::key::FragmentElement;
use std::future::Future;

/// Binary assets fetched once and handed to [`MarkupBackend::initialize`].
#[derive(Debug, Clone, Default)]
pub struct BackendAssets {
    pub compiler_module: Option<Vec<u8>>,
    pub renderer_module: Option<Vec<u8>>,
    pub fonts: Vec<Vec<u8>>,
}

/// A stateful engine that turns markup into SVG.
///
/// `initialize` is called at most once per successful setup; `render_svg`
/// is only called after it succeeded.
pub trait MarkupBackend: Send + Sync + 'static {
    /// Registers modules and fonts with the engine.
    fn initialize(&self, assets: BackendAssets) -> impl Future<Output = RenderResult<()>> + Send;

    /// Compiles a complete source document to SVG markup.
    fn render_svg(&self, source: String) -> impl Future<Output = RenderResult<String>> + Send;

    /// Wraps the element's content in the preamble that applies its size,
    /// colour and font.
    fn compose_source(&self, element: &FragmentElement, font_family: &str) -> String {
        typst_source(element, font_family)
    }
}

/// Builds a Typst document that sizes the page to the content.
pub fn typst_source(element: &FragmentElement, font_family: &str) -> String {
    format!(
        "#set page(width: auto, height: auto, margin: 0pt, fill: none)\n\
         #set text(size: {size}pt, fill: rgb({color}), font: {family})\n\
         {content}\n",
        size = element.font_size,
        color = typst_string(&element.color),
        family = typst_string(font_family),
        content = element.content,
    )
}

/// Quotes `value` as a Typst string literal.
fn typst_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typst_source_applies_style() {
        let element = FragmentElement::new("$sum_(n=1)^oo 1/n^s$", 24.0, "math", "#1e1e1e");
        let source = typst_source(&element, "New Computer Modern Math");

        assert!(source.starts_with("#set page(width: auto, height: auto, margin: 0pt, fill: none)\n"));
        assert!(source.contains(
            r##"#set text(size: 24pt, fill: rgb("#1e1e1e"), font: "New Computer Modern Math")"##
        ));
        assert!(source.ends_with("$sum_(n=1)^oo 1/n^s$\n"));
    }

    #[test]
    fn test_typst_string_escapes_quotes() {
        assert_eq!(typst_string(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
