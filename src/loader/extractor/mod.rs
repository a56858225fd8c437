#[cfg(test)]
mod tests;

use anyhow::{Result, anyhow};
use itertools::Itertools;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use tracing::debug;

/// Elements removed before text is collected
const UNWANTED_SELECTOR: &str = "script, style, noscript, template, nav, header, footer, aside, \
     form, iframe, svg, button, select, .advertisement, .ads, .ad, .sidebar, .menu, .navigation, \
     .share, .social, .cookie-banner";

/// Containers that usually hold the article body
const MAIN_CONTENT_SELECTOR: &str = "main, article, .content, .main-content, #content, #main";

/// Elements whose text forms its own block
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "blockquote", "dd", "div", "dl", "dt", "figcaption", "figure", "h1",
    "h2", "h3", "h4", "h5", "h6", "hr", "li", "main", "ol", "p", "pre", "section", "table",
    "tbody", "td", "th", "thead", "tr", "ul",
];

/// Plain text pulled out of an HTML page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: Option<String>,
    /// Text blocks joined by blank lines
    pub text: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {:?}: {}", css, e))
}

/// Extract readable text from an HTML document
#[inline]
pub fn extract_text(html: &str) -> Result<ExtractedPage> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|title| title.text().join(" ").split_whitespace().join(" "))
        .filter(|title| !title.is_empty());

    let cleaned = clean_content(&document)?;

    let mut blocks = Vec::new();
    let mut current = String::new();
    collect_blocks(cleaned.root_element(), &mut blocks, &mut current);
    flush_block(&mut current, &mut blocks);

    let text = blocks.join("\n\n");

    debug!(
        "Extracted {} text blocks ({} chars) from page {:?}",
        blocks.len(),
        text.len(),
        title
    );

    Ok(ExtractedPage { title, text })
}

/// Narrow the document to its main content area and strip page chrome
fn clean_content(document: &Html) -> Result<Html> {
    let unwanted_selector = selector(UNWANTED_SELECTOR)?;
    let main_content_selector = selector(MAIN_CONTENT_SELECTOR)?;
    let body_selector = selector("body")?;

    let candidates: Vec<ElementRef<'_>> = document.select(&main_content_selector).collect();
    let candidate_ids: HashSet<_> = candidates.iter().map(|element| element.id()).collect();
    let outermost: Vec<ElementRef<'_>> = candidates
        .into_iter()
        .filter(|element| {
            !element
                .ancestors()
                .any(|ancestor| candidate_ids.contains(&ancestor.id()))
        })
        .collect();

    // Several separate content containers (a front page of teasers) means the whole body matters
    let root_html = match outermost.as_slice() {
        [only] => only.html(),
        _ => document
            .select(&body_selector)
            .next()
            .map_or_else(|| document.html(), |body| body.html()),
    };

    let mut cleaned_doc = Html::parse_fragment(&root_html);
    remove_unwanted_elements(&mut cleaned_doc, &unwanted_selector);
    Ok(cleaned_doc)
}

fn remove_unwanted_elements(document: &mut Html, unwanted_selector: &Selector) {
    let unwanted_node_ids: Vec<_> = document
        .select(unwanted_selector)
        .map(|element| element.id())
        .collect();

    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}

fn collect_blocks(element: ElementRef<'_>, blocks: &mut Vec<String>, current: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(child_element) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child_element.name();
                if name == "br" {
                    current.push(' ');
                    continue;
                }

                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    flush_block(current, blocks);
                }
                collect_blocks(child_ref, blocks, current);
                if is_block {
                    flush_block(current, blocks);
                }
            }
            _ => {}
        }
    }
}

fn flush_block(current: &mut String, blocks: &mut Vec<String>) {
    let collapsed = current.split_whitespace().join(" ");
    if !collapsed.is_empty() {
        blocks.push(collapsed);
    }
    current.clear();
}
