//! Renderable documentation content
//!
//! Hover text and property descriptions are built from small combinators and
//! rendered to markdown in one place.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Renderable {
    #[default]
    Empty,
    Text(String),
    Code(String),
    Bold(Box<Renderable>),
    Italic(Box<Renderable>),
    Link { text: String, url: String },
    Paragraph(Box<Renderable>),
    LineBreak,
    Concat(Vec<Renderable>),
}

impl Renderable {
    pub fn text(text: impl Into<String>) -> Self {
        Renderable::Text(text.into())
    }

    pub fn code(code: impl Into<String>) -> Self {
        Renderable::Code(code.into())
    }

    pub fn bold(inner: Renderable) -> Self {
        Renderable::Bold(Box::new(inner))
    }

    pub fn italic(inner: Renderable) -> Self {
        Renderable::Italic(Box::new(inner))
    }

    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Renderable::Link {
            text: text.into(),
            url: url.into(),
        }
    }

    pub fn paragraph(inner: Renderable) -> Self {
        Renderable::Paragraph(Box::new(inner))
    }

    /// Concatenation that drops empty parts and flattens single elements.
    pub fn concat(parts: impl IntoIterator<Item = Renderable>) -> Self {
        let mut parts: Vec<Renderable> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        match parts.len() {
            0 => Renderable::Empty,
            1 => parts.remove(0),
            _ => Renderable::Concat(parts),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Renderable::Empty => true,
            Renderable::Text(s) | Renderable::Code(s) => s.is_empty(),
            Renderable::Bold(inner) | Renderable::Italic(inner) | Renderable::Paragraph(inner) => {
                inner.is_empty()
            }
            Renderable::Link { text, .. } => text.is_empty(),
            Renderable::LineBreak => false,
            Renderable::Concat(parts) => parts.iter().all(Renderable::is_empty),
        }
    }

    pub fn render_as_markdown(&self) -> String {
        let mut out = String::new();
        self.write_markdown(&mut out);
        out.trim_end().to_string()
    }

    fn write_markdown(&self, out: &mut String) {
        match self {
            Renderable::Empty => {}
            Renderable::Text(s) => out.push_str(s),
            Renderable::Code(s) => {
                out.push('`');
                out.push_str(s);
                out.push('`');
            }
            Renderable::Bold(inner) => {
                out.push_str("**");
                inner.write_markdown(out);
                out.push_str("**");
            }
            Renderable::Italic(inner) => {
                out.push('*');
                inner.write_markdown(out);
                out.push('*');
            }
            Renderable::Link { text, url } => {
                out.push_str(&format!("[{text}]({url})"));
            }
            Renderable::Paragraph(inner) => {
                if !out.is_empty() && !out.ends_with("\n\n") {
                    out.push_str(if out.ends_with('\n') { "\n" } else { "\n\n" });
                }
                inner.write_markdown(out);
                out.push_str("\n\n");
            }
            Renderable::LineBreak => out.push_str("  \n"),
            Renderable::Concat(parts) => {
                for part in parts {
                    part.write_markdown(out);
                }
            }
        }
    }
}

impl From<&str> for Renderable {
    fn from(text: &str) -> Self {
        Renderable::text(text)
    }
}

impl From<String> for Renderable {
    fn from(text: String) -> Self {
        Renderable::Text(text)
    }
}

impl fmt::Display for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_as_markdown())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_markdown() {
        let doc = Renderable::concat([
            Renderable::bold(Renderable::code("server.port")),
            Renderable::paragraph(Renderable::text("Server HTTP port.")),
            Renderable::paragraph(Renderable::link("docs", "https://example.com")),
        ]);
        assert_eq!(
            doc.render_as_markdown(),
            "**`server.port`**\n\nServer HTTP port.\n\n[docs](https://example.com)"
        );
    }

    #[test]
    fn test_concat_drops_empty_parts() {
        assert_eq!(
            Renderable::concat([Renderable::Empty, Renderable::text("x")]),
            Renderable::text("x")
        );
        assert!(Renderable::concat([Renderable::text("")]).is_empty());
    }
}
