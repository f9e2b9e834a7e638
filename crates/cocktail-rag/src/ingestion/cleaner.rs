//! Text cleanup applied to every extracted document before chunking

/// Typographic characters PDFs commonly emit, mapped to plain text
const REPLACEMENTS: &[(char, &str)] = &[
    ('\u{00A0}', " "),   // non-breaking space
    ('\u{2010}', "-"),   // hyphen
    ('\u{2011}', "-"),   // non-breaking hyphen
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2022}', "* "),  // bullet
    ('\u{2026}', "..."),
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\u{FEFF}', ""),    // BOM
    ('\0', ""),
];

/// Normalize extracted text: map ligatures and typographic punctuation,
/// collapse whitespace runs inside a line to one space, trim every line and
/// drop the empty ones.
pub fn clean_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for c in text.chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => normalized.push_str(to),
            None => normalized.push(c),
        }
    }

    normalized
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
