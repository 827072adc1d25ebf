use std::fmt::Write;

use super::geometry::GeometryKind;
use crate::{Result, VectorizeError};

/// The deepest parenthesis nesting accepted.
///
/// A multi polygon needs 3 levels and every enclosing collection adds one.
pub const MAX_NESTING: usize = 32;

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    /// An upper cased word.
    Word(String),
    Number(f64),
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    /// Byte offset of the token in the source text.
    position: usize,
}

/// Checks WKT text and rewrites it into the form handed to the `wkt` reader.
///
/// The checks reject, with the byte position of the culprit, unknown characters and keywords,
/// coordinates out of the `f64` range, nesting deeper than `MAX_NESTING`, unbalanced parentheses
/// and trailing content. The rewrite drops an `SRID=n;` prefix, upper cases keywords, splits
/// glued dimension tags (`POINTZ` becomes `POINT Z`), tags untagged 3D and 4D geometries
/// explicitly and wraps bare multi point members in parentheses.
///
/// # Returns
/// The rewritten text and the byte offset of the geometry inside `input`.
pub fn canonicalize(input: &str) -> Result<(String, usize)> {
    let (body, offset) = strip_srid(input)?;
    let tokens = tokenize(body, offset)?;
    check_structure(&tokens, input.len())?;
    Ok((emit(&tokens)?, offset))
}

fn strip_srid(input: &str) -> Result<(&str, usize)> {
    let trimmed = input.trim_start();
    let leading = input.len() - trimmed.len();

    let has_srid = trimmed
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("SRID="));

    if !has_srid {
        return Ok((input, 0));
    }

    match trimmed.find(';') {
        Some(split) => Ok((&trimmed[split + 1..], leading + split + 1)),
        None => Err(VectorizeError::parse(leading, "SRID prefix without ';'")),
    }
}

fn tokenize(input: &str, offset: usize) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let position = offset + i;

        let (kind, end) = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'(' => (TokenKind::LParen, i + 1),
            b')' => (TokenKind::RParen, i + 1),
            b',' => (TokenKind::Comma, i + 1),
            c if c.is_ascii_alphabetic() => {
                let end = scan(bytes, i, |c| c.is_ascii_alphanumeric() || c == b'_');
                (TokenKind::Word(input[i..end].to_ascii_uppercase()), end)
            }
            c if c.is_ascii_digit() || matches!(c, b'-' | b'+' | b'.') => {
                let end = scan_number(bytes, i);
                let text = &input[i..end];
                let value = text.parse::<f64>().map_err(|_| {
                    VectorizeError::parse(position, format!("malformed number '{text}'"))
                })?;
                if !value.is_finite() {
                    return Err(VectorizeError::parse(position, "coordinate out of range"));
                }
                (TokenKind::Number(value), end)
            }
            _ => {
                let ch = input[i..].chars().next().unwrap_or_default();
                return Err(VectorizeError::parse(
                    position,
                    format!("unexpected character '{ch}'"),
                ));
            }
        };

        tokens.push(Token { kind, position });
        i = end;
    }

    Ok(tokens)
}

fn scan(bytes: &[u8], start: usize, accept: impl Fn(u8) -> bool) -> usize {
    bytes[start..]
        .iter()
        .position(|&c| !accept(c))
        .map_or(bytes.len(), |len| start + len)
}

// Signs are only valid at the start or right after an exponent marker.
fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut end = start + 1;

    while end < bytes.len() {
        let c = bytes[end];
        let prev = bytes[end - 1];

        let accepted = c.is_ascii_digit()
            || matches!(c, b'.' | b'e' | b'E')
            || (matches!(c, b'-' | b'+') && matches!(prev, b'e' | b'E'));

        if !accepted {
            break;
        }

        end += 1;
    }

    end
}

/// A dimension tag, either standalone or glued to a keyword.
fn dim_tag(word: &str) -> Option<&'static str> {
    ["ZM", "Z", "M"].into_iter().find(|&tag| tag == word)
}

/// Resolves a keyword into its kind and glued tag, e.g. `POINTZM` into `(Point, Some("ZM"))`.
fn keyword(word: &str) -> Option<(GeometryKind, Option<&'static str>)> {
    if let Some(kind) = GeometryKind::from_keyword(word) {
        return Some((kind, None));
    }

    ["ZM", "Z", "M"].into_iter().find_map(|tag| {
        let kind = word.strip_suffix(tag).and_then(GeometryKind::from_keyword)?;
        Some((kind, Some(tag)))
    })
}

fn check_structure(tokens: &[Token], end: usize) -> Result<()> {
    match tokens.first() {
        Some(Token {
            kind: TokenKind::Word(_),
            ..
        }) => {}
        Some(token) => {
            return Err(VectorizeError::parse(
                token.position,
                "expected a geometry keyword",
            ));
        }
        None => return Err(VectorizeError::parse(end, "expected a geometry keyword")),
    }

    let mut depth = 0usize;
    let mut finished = false;
    let mut run: Option<(usize, usize)> = None;

    for token in tokens {
        if finished {
            return Err(VectorizeError::parse(
                token.position,
                "unexpected trailing content",
            ));
        }

        if let TokenKind::Number(_) = token.kind {
            let (start, count) = run.get_or_insert((token.position, 0));
            *count += 1;
            if *count > 4 {
                return Err(VectorizeError::parse(
                    *start,
                    "coordinate with more than 4 ordinates",
                ));
            }
            continue;
        }

        if let Some((start, 1)) = run.take() {
            return Err(VectorizeError::parse(start, "coordinate with a single ordinate"));
        }

        match &token.kind {
            TokenKind::Word(word) => {
                let known = word == "EMPTY" || dim_tag(word).is_some() || keyword(word).is_some();
                if !known {
                    return Err(VectorizeError::UnsupportedKind(word.clone()));
                }
                finished = depth == 0 && word == "EMPTY";
            }
            TokenKind::LParen => {
                depth += 1;
                if depth > MAX_NESTING {
                    return Err(VectorizeError::parse(token.position, "nesting too deep"));
                }
            }
            TokenKind::RParen => {
                if depth == 0 {
                    return Err(VectorizeError::parse(token.position, "unbalanced ')'"));
                }
                depth -= 1;
                finished = depth == 0;
            }
            TokenKind::Comma | TokenKind::Number(_) => {}
        }
    }

    if depth > 0 {
        return Err(VectorizeError::parse(end, "expected ')'"));
    }

    Ok(())
}

// Untagged geometries take their dimension from the ordinate count of their first coordinate.
fn inferred_tag(rest: &[Token]) -> Option<&'static str> {
    let start = rest
        .iter()
        .position(|token| matches!(token.kind, TokenKind::Number(_)))?;
    let count = rest[start..]
        .iter()
        .take_while(|token| matches!(token.kind, TokenKind::Number(_)))
        .count();

    match count {
        3 => Some("Z"),
        4 => Some("ZM"),
        _ => None,
    }
}

fn emit(tokens: &[Token]) -> Result<String> {
    let mut out = String::new();
    // one entry per open parenthesis: whether it opened the member list of a multi point
    let mut frames: Vec<bool> = Vec::new();
    let mut pending_multi_point = false;
    let mut wrapping = false;

    for (i, token) in tokens.iter().enumerate() {
        match &token.kind {
            TokenKind::Word(word) => match keyword(word) {
                Some((kind, glued)) => {
                    pending_multi_point = kind == GeometryKind::MultiPoint;

                    let explicit = matches!(
                        tokens.get(i + 1).map(|next| &next.kind),
                        Some(TokenKind::Word(next)) if next == "EMPTY" || dim_tag(next).is_some()
                    );
                    let tag = match glued {
                        Some(tag) => Some(tag),
                        None if explicit || kind == GeometryKind::GeometryCollection => None,
                        None => inferred_tag(&tokens[i + 1..]),
                    };

                    out.push_str(kind.keyword());
                    if let Some(tag) = tag {
                        out.push(' ');
                        out.push_str(tag);
                    }
                }
                None => {
                    if word == "EMPTY" {
                        pending_multi_point = false;
                    }
                    out.push_str(word);
                }
            },
            TokenKind::LParen => {
                frames.push(pending_multi_point);
                pending_multi_point = false;
                out.push('(');
            }
            TokenKind::Number(value) => {
                if frames.last() == Some(&true) && !wrapping {
                    out.push_str("( ");
                    wrapping = true;
                }
                // Display never writes an exponent
                write!(out, "{value}")
                    .map_err(|e| VectorizeError::parse(token.position, e.to_string()))?;
            }
            TokenKind::Comma | TokenKind::RParen => {
                if wrapping {
                    out.push_str(") ");
                    wrapping = false;
                }
                if token.kind == TokenKind::RParen {
                    frames.pop();
                    out.push(')');
                } else {
                    out.push(',');
                }
            }
        }
        out.push(' ');
    }

    Ok(out)
}
