//! Deterministic, human-friendly permalink keys.
//!
//! Entry titles and category names are turned into compressed, URL-safe keys
//! by bridging ASCII slugification (`slug` crate) with Chinese
//! transliteration (`pinyin` crate), so a title like “基线对齐” compresses
//! to `ji-xian-dui-qi`.

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

/// Separator between levels of a hierarchical category name.
pub const CATEGORY_HIERARCHY_SEPARATOR: char = '|';

/// Errors that can occur while generating a slug.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
}

/// Derive a slug from the provided human-readable text.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let transliterated = transliterate_to_ascii(input);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(candidate)
}

/// Compressed form of an entry title, used as the secondary lookup key.
///
/// Returns `None` for titles that produce no slug (blank or made only of
/// punctuation); such entries are reachable by id only.
pub fn compressed_title(title: &str) -> Option<String> {
    derive_slug(title).ok()
}

/// URL-safe name for a category. Hierarchy levels are joined with `-`.
///
/// Names that cannot be slugified fall back to their lowercased, trimmed form
/// so every category still has a stable key.
pub fn url_safe_category(name: &str) -> String {
    let flattened = name.replace(CATEGORY_HIERARCHY_SEPARATOR, " ");
    derive_slug(&flattened).unwrap_or_else(|_| name.trim().to_lowercase())
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => {
                // Leave it for slugify to filter.
                output.push(ch);
            }
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}
