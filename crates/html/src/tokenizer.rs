//! Simplified HTML tokenizer for annotated fragments.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]`, lowercased. Comments
//! and doctypes are recognised; `<script>`/`<style>` bodies are raw text.
//! Not an HTML5 state machine and not meant to be one.

use crate::entities::decode_entities;
use memchr::memchr;

#[derive(Debug, PartialEq, Eq)]
pub enum Token {
    Doctype(String),
    StartTag {
        name: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag(String),
    Comment(String),
    Text(String),
}

pub(crate) fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut out = Vec::new();
    let mut i = 0;

    // Slices are only cut at ASCII structural bytes, so they stay on char boundaries.
    while i < len {
        if bytes[i] != b'<' {
            let end = memchr(b'<', &bytes[i..]).map(|r| i + r).unwrap_or(len);
            out.push(Token::Text(decode_entities(&input[i..end])));
            i = end;
            continue;
        }

        if input[i..].starts_with("<!--") {
            let body = i + 4;
            match input[body..].find("-->") {
                Some(rel) => {
                    out.push(Token::Comment(input[body..body + rel].to_string()));
                    i = body + rel + 3;
                }
                None => {
                    out.push(Token::Comment(input[body..].to_string()));
                    i = len;
                }
            }
            continue;
        }

        if input[i..].len() >= 2 && bytes[i + 1] == b'!' {
            let end = memchr(b'>', &bytes[i..]).map(|r| i + r).unwrap_or(len);
            out.push(Token::Doctype(input[i + 2..end].trim().to_string()));
            i = (end + 1).min(len);
            continue;
        }

        if i + 1 < len && bytes[i + 1] == b'/' {
            let start = i + 2;
            let mut j = start;
            while j < len && is_name_char(bytes[j]) {
                j += 1;
            }
            let name = input[start..j].to_ascii_lowercase();
            let close = memchr(b'>', &bytes[j..]).map(|r| j + r + 1).unwrap_or(len);
            if !name.is_empty() {
                out.push(Token::EndTag(name));
            }
            i = close;
            continue;
        }

        let start = i + 1;
        let mut j = start;
        while j < len && is_name_char(bytes[j]) {
            j += 1;
        }
        if j == start {
            // a lone '<' is text
            out.push(Token::Text("<".to_string()));
            i += 1;
            continue;
        }
        let name = input[start..j].to_ascii_lowercase();
        let (attributes, self_closing, next) = scan_attributes(input, j);
        let self_closing = self_closing || is_void_element(&name);
        i = next;

        let raw = (name == "script" || name == "style") && !self_closing;
        out.push(Token::StartTag {
            name: name.clone(),
            attributes,
            self_closing,
        });
        if raw {
            let close = format!("</{name}");
            let body_end = input[i..]
                .to_ascii_lowercase()
                .find(&close)
                .map(|r| i + r)
                .unwrap_or(len);
            if body_end > i {
                out.push(Token::Text(input[i..body_end].to_string()));
            }
            out.push(Token::EndTag(name));
            i = memchr(b'>', &bytes[body_end..])
                .map(|r| body_end + r + 1)
                .unwrap_or(len);
        }
    }
    out
}

fn scan_attributes(input: &str, mut k: usize) -> (Vec<(String, String)>, bool, usize) {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut attributes = Vec::new();
    let mut self_closing = false;
    let skip_ws = |k: &mut usize| {
        while *k < len && bytes[*k].is_ascii_whitespace() {
            *k += 1;
        }
    };

    loop {
        skip_ws(&mut k);
        if k >= len {
            break;
        }
        match bytes[k] {
            b'>' => {
                k += 1;
                break;
            }
            b'/' => {
                if k + 1 < len && bytes[k + 1] == b'>' {
                    self_closing = true;
                    k += 2;
                    break;
                }
                k += 1;
                continue;
            }
            _ => {}
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            k += 1;
            continue;
        }
        let attr_name = input[name_start..k].to_ascii_lowercase();
        skip_ws(&mut k);
        let mut value = String::new();
        if k < len && bytes[k] == b'=' {
            k += 1;
            skip_ws(&mut k);
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                let vstart = k + 1;
                let vend = memchr(quote, &bytes[vstart..])
                    .map(|r| vstart + r)
                    .unwrap_or(len);
                value = decode_entities(&input[vstart..vend]);
                k = (vend + 1).min(len);
            } else {
                let vstart = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    k += 1;
                }
                value = decode_entities(&input[vstart..k]);
            }
        }
        attributes.push((attr_name, value));
    }
    (attributes, self_closing, k)
}
