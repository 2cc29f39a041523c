use crate::tokenizer::{Token, tokenize};
use crate::types::DomError;
use crate::{Document, NodeId};

/// Parse `markup` and append the resulting nodes under `parent`.
///
/// Returns the top-level nodes created. Unmatched end tags are ignored;
/// unclosed elements are closed at the end of input.
pub fn parse_html_into(
    doc: &mut Document,
    parent: NodeId,
    markup: &str,
) -> Result<Vec<NodeId>, DomError> {
    let mut stack = vec![parent];
    let mut top_level = Vec::new();

    for token in tokenize(markup) {
        let current = *stack.last().unwrap_or(&parent);
        let created = match token {
            Token::Doctype(_) => None,
            Token::Text(text) => {
                if text.is_empty() {
                    None
                } else {
                    Some(doc.create_text(&text))
                }
            }
            Token::Comment(text) => Some(doc.create_comment(&text)),
            Token::StartTag {
                name,
                attributes,
                self_closing,
            } => {
                let el = doc.create_element(&name);
                for (k, v) in &attributes {
                    doc.set_attribute(el, k, v)?;
                }
                doc.append_child(current, el)?;
                if stack.len() == 1 {
                    top_level.push(el);
                }
                if !self_closing {
                    stack.push(el);
                }
                continue;
            }
            Token::EndTag(name) => {
                if let Some(pos) = stack
                    .iter()
                    .skip(1)
                    .rposition(|n| doc.tag_name(*n) == Some(name.as_str()))
                {
                    stack.truncate(pos + 1);
                } else {
                    log::trace!(target: "html.parser", "ignoring stray end tag </{name}>");
                }
                continue;
            }
        };
        if let Some(node) = created {
            doc.append_child(current, node)?;
            if stack.len() == 1 {
                top_level.push(node);
            }
        }
    }
    Ok(top_level)
}
