//! Markdown to sanitized HTML for bot replies.
//!
//! Parsing uses pulldown-cmark (GFM tables, strikethrough, task lists; soft breaks become `<br />`).
//! The HTML is then cleaned against a fixed tag allow-list. If the engine fails the original text is returned.

use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};

use pulldown_cmark::{html, Event, Options, Parser};

/// Tags that survive sanitization.
pub const ALLOWED_TAGS: [&str; 12] = [
    "p", "br", "b", "i", "em", "strong", "a", "ul", "ol", "li", "code", "pre",
];

const ALLOWED_URL_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("markdown engine failed: {0}")]
    Engine(String),
}

/// Converts markdown to (unsanitized) HTML.
pub trait MarkdownEngine: Send + Sync {
    fn to_html(&self, text: &str) -> Result<String, RenderError>;
}

/// pulldown-cmark engine with GFM extensions and hard line breaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark;

impl CommonMark {
    fn options() -> Options {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_GFM);
        options
    }
}

impl MarkdownEngine for CommonMark {
    fn to_html(&self, text: &str) -> Result<String, RenderError> {
        catch_engine_panic(|| {
            let parser = Parser::new_ext(text, Self::options()).map(|event| match event {
                Event::SoftBreak => Event::HardBreak,
                other => other,
            });
            let mut out = String::with_capacity(text.len() * 3 / 2);
            html::push_html(&mut out, parser);
            out
        })
    }
}

/// Run an engine call, turning a panic into [`RenderError`].
fn catch_engine_panic(f: impl FnOnce() -> String) -> Result<String, RenderError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic while parsing".to_string());
        RenderError::Engine(msg)
    })
}

/// Renders bot replies to HTML that is safe to insert into the page.
#[derive(Debug, Clone, Default)]
pub struct MarkdownRenderer<E = CommonMark> {
    engine: E,
}

impl MarkdownRenderer<CommonMark> {
    pub fn new() -> Self {
        Self { engine: CommonMark }
    }
}

impl<E: MarkdownEngine> MarkdownRenderer<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    /// Render `text` to sanitized HTML. Empty input gives an empty string; engine failure gives `text` unchanged.
    pub fn render(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        match self.engine.to_html(text) {
            Ok(raw) => sanitizer().clean(&raw).to_string(),
            Err(e) => {
                log::error!("error parsing markdown: {}", e);
                text.to_string()
            }
        }
    }
}

/// Render with the default engine.
pub fn render_markdown(text: &str) -> String {
    MarkdownRenderer::new().render(text)
}

/// Allow-list policy: listed tags only, `href`/`title` on links only, safe schemes only.
fn sanitizer() -> ammonia::Builder<'static> {
    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("a", HashSet::from(["href", "title"]));
    let mut builder = ammonia::Builder::default();
    builder
        .tags(HashSet::from(ALLOWED_TAGS))
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .url_schemes(HashSet::from(ALLOWED_URL_SCHEMES))
        .link_rel(Some("noopener noreferrer"));
    builder
}
