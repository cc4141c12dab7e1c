//! Translation between GNAT-encoded identifiers and their Ada spelling.
//!
//! The encoding folds Ada names to lower case, replaces `.` with `__`,
//! spells operator functions as `Oadd`/`Osubtract`/..., and appends
//! structural suffixes (`___XVE`, `___XR_...`, numeric disambiguators) that
//! the rest of the engine reads through [`suffix`].

mod suffix;

pub use suffix::{
    FixedPointInfo, LayoutHint, RenamingInfo, RenamingKind, field_alignment_bits,
    field_name_match, full_match, in_variant_choices, is_dynamic_field_name, is_name_suffix,
    is_others_choice, layout_hint, packed_array_bitsize, parse_renaming, scan_number,
    variant_discriminant_name, wild_match,
};

use crate::error::{Error, Result};
use std::borrow::Cow;

/// Encoded operator token and its quoted Ada spelling.
///
/// Unary `+` and `-` share the binary encodings, so the table only lists
/// each encoding once.
pub const OPERATOR_NAMES: &[(&str, &str)] = &[
    ("Oadd", "\"+\""),
    ("Osubtract", "\"-\""),
    ("Omultiply", "\"*\""),
    ("Odivide", "\"/\""),
    ("Omod", "\"mod\""),
    ("Orem", "\"rem\""),
    ("Oexpon", "\"**\""),
    ("Olt", "\"<\""),
    ("Ole", "\"<=\""),
    ("Ogt", "\">\""),
    ("Oge", "\">=\""),
    ("Oeq", "\"=\""),
    ("One", "\"/=\""),
    ("Oand", "\"and\""),
    ("Oor", "\"or\""),
    ("Oxor", "\"xor\""),
    ("Oconcat", "\"&\""),
    ("Oabs", "\"abs\""),
    ("Onot", "\"not\""),
];

/// Decode a GNAT-encoded name.
///
/// Names that do not follow the encoding come back wrapped in `<...>`.
/// A name that decodes to itself is returned borrowed.
pub fn decode(encoded: &str) -> Cow<'_, str> {
    match try_decode(encoded) {
        Some(decoded) if decoded == encoded => Cow::Borrowed(encoded),
        Some(decoded) => Cow::Owned(decoded),
        None => suppressed(encoded),
    }
}

fn suppressed(encoded: &str) -> Cow<'_, str> {
    if encoded.starts_with('<') {
        Cow::Borrowed(encoded)
    } else {
        Cow::Owned(format!("<{}>", encoded))
    }
}

/// Copy the character starting at byte `i` of `text`; returns its width.
fn push_char_at(out: &mut String, text: &str, i: usize) -> usize {
    match text.get(i..).and_then(|rest| rest.chars().next()) {
        Some(c) => {
            out.push(c);
            c.len_utf8()
        }
        None => 1,
    }
}

fn try_decode(encoded: &str) -> Option<String> {
    let encoded = encoded.strip_prefix("_ada_").unwrap_or(encoded);
    let bytes = encoded.as_bytes();

    if bytes.first().is_some_and(|&c| c == b'_' || c == b'<') {
        return None;
    }

    let mut len0 = bytes.len();
    remove_trailing_digits(bytes, &mut len0);
    remove_protected_suffix(bytes, &mut len0);

    // Everything after a "___X" marker is structural metadata.
    if let Some(p) = encoded.find("___")
        && len0 > 3
        && p < len0 - 3
    {
        if bytes[p + 3] == b'X' {
            len0 = p;
        } else {
            return None;
        }
    }

    if len0 > 3 && &bytes[len0 - 3..len0] == b"TKB" {
        len0 -= 3;
    }
    if len0 > 2 && &bytes[len0 - 2..len0] == b"TB" {
        len0 -= 2;
    }
    if len0 > 1 && bytes[len0 - 1] == b'B' {
        len0 -= 1;
    }

    // Trailing __{digit}+ or ${digit}+.
    if len0 > 1 && bytes[len0 - 1].is_ascii_digit() {
        let mut i = len0 as isize - 2;
        while (i >= 0 && bytes[i as usize].is_ascii_digit())
            || (i >= 1 && bytes[i as usize] == b'_' && bytes[i as usize - 1].is_ascii_digit())
        {
            i -= 1;
        }
        if i > 1 && bytes[i as usize] == b'_' && bytes[i as usize - 1] == b'_' {
            len0 = i as usize - 1;
        } else if i >= 0 && bytes[i as usize] == b'$' {
            len0 = i as usize;
        }
    }

    let mut decoded = String::with_capacity(2 * len0 + 1);
    let mut i = 0;
    while i < len0 && !bytes[i].is_ascii_alphabetic() {
        i += push_char_at(&mut decoded, encoded, i);
    }

    let mut at_start_name = true;
    while i < len0 {
        if at_start_name && bytes[i] == b'O' {
            if let Some((op_len, symbol)) = match_operator(&bytes[i..len0]) {
                decoded.push_str(symbol);
                at_start_name = false;
                i += op_len;
                continue;
            }
        }
        at_start_name = false;

        // "TK__" becomes "__", later turned into '.'.
        if len0 >= 4 && i < len0 - 4 && &bytes[i..i + 4] == b"TK__" {
            i += 2;
        }

        // "__B_{DIGITS}+__" names an anonymous block; keep only the "__".
        if len0 - i > 5
            && &bytes[i..i + 4] == b"__B_"
            && bytes[i + 4].is_ascii_digit()
        {
            let mut k = i + 5;
            while k < len0 && bytes[k].is_ascii_digit() {
                k += 1;
            }
            if len0 - k > 2 && bytes[k] == b'_' && bytes[k + 1] == b'_' {
                i = k;
            }
        }

        // Entry bodies and barriers: _E{DIGITS}+[bs]
        if len0 - i > 3 && bytes[i] == b'_' && bytes[i + 1] == b'E' && bytes[i + 2].is_ascii_digit()
        {
            let mut k = i + 3;
            while k < len0 && bytes[k].is_ascii_digit() {
                k += 1;
            }
            if k < len0 && (bytes[k] == b'b' || bytes[k] == b's') {
                k += 1;
                if k == len0 || bytes[k] == b'_' {
                    i = k;
                }
            }
        }

        // Trailing 'N' in [a-z0-9]+N__ marks a protected subprogram.
        if i > 0
            && i + 2 < len0
            && bytes[i] == b'N'
            && bytes[i - 1] != b'_'
            && bytes[i + 1] == b'_'
            && bytes[i + 2] == b'_'
        {
            let mut ptr = i as isize - 1;
            while ptr >= 0 && is_lower_alphanum(bytes[ptr as usize]) {
                ptr -= 1;
            }
            if ptr < 0 || (ptr > 0 && bytes[ptr as usize] == b'_' && bytes[ptr as usize - 1] == b'_')
            {
                i += 1;
            }
        }

        if i >= len0 {
            break;
        }

        if bytes[i] == b'X' && i != 0 && bytes[i - 1].is_ascii_alphanumeric() {
            // X[bn]* must close the name.
            i += 1;
            while i < len0 && (bytes[i] == b'b' || bytes[i] == b'n') {
                i += 1;
            }
            if i < len0 {
                return None;
            }
        } else if len0 >= 2 && i < len0 - 2 && bytes[i] == b'_' && bytes[i + 1] == b'_' {
            decoded.push('.');
            at_start_name = true;
            i += 2;
        } else {
            i += push_char_at(&mut decoded, encoded, i);
        }
    }

    if decoded.chars().any(|c| c.is_ascii_uppercase() || c == ' ') {
        return None;
    }
    Some(decoded)
}

fn is_lower_alphanum(c: u8) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn match_operator(rest: &[u8]) -> Option<(usize, &'static str)> {
    OPERATOR_NAMES.iter().find_map(|&(enc, dec)| {
        let enc = enc.as_bytes();
        let fits = rest.len() >= enc.len() && &rest[1..enc.len()] == &enc[1..];
        let delimited = rest.get(enc.len()).is_none_or(|c| !c.is_ascii_alphanumeric());
        (fits && delimited).then_some((enc.len(), dec))
    })
}

/// Strip `.NNN`, `$NNN`, `___NNN` and `__NNN` disambiguators.
fn remove_trailing_digits(bytes: &[u8], len: &mut usize) {
    if *len > 1 && bytes[*len - 1].is_ascii_digit() {
        let mut i = *len - 2;
        while i > 0 && bytes[i].is_ascii_digit() {
            i -= 1;
        }
        if bytes[i] == b'.' || bytes[i] == b'$' {
            *len = i;
        } else if i >= 2 && &bytes[i - 2..=i] == b"___" {
            *len = i - 2;
        } else if i >= 1 && &bytes[i - 1..=i] == b"__" {
            *len = i - 1;
        }
    }
}

/// Unprotected halves of protected subprograms end in `N`.
fn remove_protected_suffix(bytes: &[u8], len: &mut usize) {
    if *len > 1
        && bytes[*len - 1] == b'N'
        && (bytes[*len - 2].is_ascii_digit() || bytes[*len - 2].is_ascii_lowercase())
    {
        *len -= 1;
    }
}

/// Encode a decoded (already folded) Ada name.
///
/// Encoding stops after an operator symbol, which always closes a name.
pub fn encode(decoded: &str) -> Result<String> {
    let mut out = String::with_capacity(2 * decoded.len() + 1);
    let mut rest = decoded;
    while let Some(c) = rest.chars().next() {
        match c {
            '.' => {
                out.push_str("__");
                rest = &rest[1..];
            }
            '"' => {
                let (enc, _) = OPERATOR_NAMES
                    .iter()
                    .find(|(_, dec)| rest.starts_with(dec))
                    .ok_or_else(|| Error::eval(format!("invalid Ada operator name: {}", rest)))?;
                out.push_str(enc);
                break;
            }
            _ => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    Ok(out)
}

/// Fold a user-typed name to the case the compiler uses.
///
/// A name written in quotes is taken verbatim.
pub fn fold_name(name: &str) -> String {
    match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        Some(verbatim) if !verbatim.is_empty() && !is_operator_spelling(name) => {
            verbatim.to_string()
        }
        _ => name.to_lowercase(),
    }
}

fn is_operator_spelling(name: &str) -> bool {
    OPERATOR_NAMES.iter().any(|(_, dec)| dec.eq_ignore_ascii_case(name))
}

/// Decoded form of a linkage name, with the `<...>` wrapper removed.
pub fn natural_name(linkage: &str) -> String {
    let decoded = decode(linkage);
    match decoded.strip_prefix('<').and_then(|d| d.strip_suffix('>')) {
        Some(inner) => inner.to_string(),
        None => decoded.into_owned(),
    }
}

/// Last component of a decoded dotted name.
pub fn simple_name(decoded: &str) -> &str {
    decoded.rsplit('.').next().unwrap_or(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_qualified_names() {
        assert_eq!(decode("pck__foo__bar"), "pck.foo.bar");
        assert_eq!(decode("_ada_main"), "main");
    }

    #[test]
    fn strips_numeric_disambiguators() {
        assert_eq!(decode("pck__proc.3"), "pck.proc");
        assert_eq!(decode("pck__proc__2"), "pck.proc");
        assert_eq!(decode("pck__proc___12"), "pck.proc");
        assert_eq!(decode("pck__proc$4"), "pck.proc");
    }

    #[test]
    fn keeps_wide_characters_intact() {
        assert_eq!(decode("pck__größe"), "pck.größe");
        assert_eq!(decode("pck__ñame__x"), "pck.ñame.x");
    }

    #[test]
    fn strips_structural_suffixes() {
        assert_eq!(decode("pck__rec___XVE"), "pck.rec");
        assert_eq!(decode("pck__t___XP3"), "pck.t");
        assert_eq!(decode("pck__taskTKB"), "pck.task");
    }

    #[test]
    fn non_x_triple_underscore_is_not_decoded() {
        assert_eq!(decode("pck__rec___ZZZ"), "<pck__rec___ZZZ>");
    }

    #[test]
    fn translates_operators() {
        assert_eq!(decode("pck__Oadd"), "pck.\"+\"");
        assert_eq!(decode("pck__Oexpon"), "pck.\"**\"");
        assert_eq!(decode("Oeq"), "\"=\"");
    }

    #[test]
    fn protected_and_entry_suffixes() {
        assert_eq!(decode("pck__objN"), "pck.obj");
        assert_eq!(decode("pck__obj__procN__2"), "pck.obj.proc");
        assert_eq!(decode("pck__t__e_E1s"), "pck.t.e");
        assert_eq!(decode("pck__x__B_12__y"), "pck.x.y");
    }

    #[test]
    fn rejects_unencoded_names() {
        assert_eq!(decode("_internal"), "<_internal>");
        assert_eq!(decode("MixedCase"), "<MixedCase>");
        assert_eq!(decode("<already>"), "<already>");
    }

    #[test]
    fn body_nested_package_marker() {
        assert_eq!(decode("pck__innerXb"), "pck.inner");
        assert_eq!(decode("pck__innerXbz"), "<pck__innerXbz>");
    }

    #[test]
    fn decoding_is_idempotent_and_borrows() {
        let once = decode("pck__foo").into_owned();
        assert!(matches!(decode(&once), Cow::Borrowed(_)));
        assert_eq!(decode(&once), once);
        assert!(matches!(decode("simple"), Cow::Borrowed("simple")));
    }

    #[test]
    fn encodes_dots_and_operators() {
        assert_eq!(encode("pck.foo").unwrap(), "pck__foo");
        assert_eq!(encode("pck.\"+\"").unwrap(), "pck__Oadd");
        assert_eq!(encode("\"<=\"").unwrap(), "Ole");
        assert!(encode("pck.\"@\"").is_err());
    }

    #[test]
    fn fold_respects_quoting() {
        assert_eq!(fold_name("Pck.Foo"), "pck.foo");
        assert_eq!(fold_name("\"MyName\""), "MyName");
        assert_eq!(fold_name("\"and\""), "\"and\"");
    }

    #[test]
    fn natural_name_unwraps_brackets() {
        assert_eq!(natural_name("_init"), "_init");
        assert_eq!(natural_name("pck__x"), "pck.x");
        assert_eq!(simple_name("pck.inner.x"), "x");
    }
}
