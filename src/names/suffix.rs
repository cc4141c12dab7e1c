//! Recognition of the structural suffixes GNAT appends to encoded names.

use super::decode;

/// Whether `s` is one of the informational tails that may follow a name
/// without changing which entity it denotes.
pub fn is_name_suffix(s: &str) -> bool {
    let b = s.as_bytes();
    let len = b.len();
    let mut p = 0usize;
    let at = |i: usize| b.get(i).copied().unwrap_or(0);

    // Optional leading __[0-9]+
    if len > 3 && at(0) == b'_' && at(1) == b'_' && at(2).is_ascii_digit() {
        p = 3;
        while at(p).is_ascii_digit() {
            p += 1;
        }
    }

    // [.$][0-9]+
    if at(p) == b'.' || at(p) == b'$' {
        let mut m = p + 1;
        while at(m).is_ascii_digit() {
            m += 1;
        }
        if m >= len {
            return true;
        }
    }

    // ___[0-9]+
    if len > 3 && at(p) == b'_' && at(p + 1) == b'_' && at(p + 2) == b'_' {
        let mut m = p + 3;
        while at(m).is_ascii_digit() {
            m += 1;
        }
        if m >= len {
            return true;
        }
    }

    if &s[p.min(len)..] == "TKB" {
        return true;
    }

    // _E[0-9]+[bs]$
    if len > 3 && at(p) == b'_' && at(p + 1) == b'E' && at(p + 2).is_ascii_digit() {
        let mut m = p + 3;
        while at(m).is_ascii_digit() {
            m += 1;
        }
        if (at(m) == b'b' || at(m) == b's') && m + 1 >= len {
            return true;
        }
    }

    // X[nb]*
    if at(p) == b'X' {
        p += 1;
        while at(p) != b'_' && p < len {
            if at(p) != b'n' && at(p) != b'b' {
                return false;
            }
            p += 1;
        }
    }

    if p >= len {
        return true;
    }

    if at(p) == b'_' {
        if at(p + 1) != b'_' || p + 2 >= len {
            return false;
        }
        if at(p + 2) == b'_' {
            let tail = &s[p + 3..];
            if tail == "JM" || tail == "LJM" {
                return true;
            }
            if at(p + 3) != b'X' {
                return false;
            }
            return match at(p + 4) {
                b'F' | b'D' | b'B' | b'L' | b'U' | b'P' => true,
                b'R' => at(p + 5) != b'T',
                _ => false,
            };
        }
        if !at(p + 2).is_ascii_digit() {
            return false;
        }
        return b[p + 3..].iter().all(|&c| c.is_ascii_digit() || c == b'_');
    }

    if at(p) == b'$' && at(p + 1).is_ascii_digit() {
        return b[p + 2..].iter().all(|&c| c.is_ascii_digit() || c == b'_');
    }

    false
}

/// Exact match: `sym_name` is `name` (optionally behind `_ada_`) followed
/// by a recognized suffix.
pub fn full_match(sym_name: &str, name: &str) -> bool {
    let matches_at = |candidate: &str| {
        candidate.starts_with(name) && is_name_suffix(&candidate[name.len()..])
    };
    matches_at(sym_name) || sym_name.strip_prefix("_ada_").is_some_and(matches_at)
}

/// Wildcard match: `sym_name` encodes `prefix.patn` for some (possibly
/// empty) prefix. `patn` must be a lower-cased encoded simple name.
pub fn wild_match(sym_name: &str, patn: &str) -> bool {
    let name = sym_name.as_bytes();
    let pat = patn.as_bytes();
    let Some(&target0) = pat.first() else {
        return false;
    };
    let mut pos = 0usize;

    loop {
        let start = pos;
        if name.get(pos) == Some(&target0) {
            let mut n = pos + 1;
            let mut p = 1;
            while p < pat.len() && name.get(n) == Some(&pat[p]) {
                n += 1;
                p += 1;
            }
            if p == pat.len() && is_name_suffix(&sym_name[n.min(name.len())..]) {
                return start == 0 || is_valid_name_for_wild_match(sym_name);
            }
            pos = n;
            if pos > 0 && name[pos - 1] == b'_' {
                pos -= 1;
            }
        }
        match advance_wild_match(name, pos, target0) {
            Some(next) => pos = next,
            None => return false,
        }
    }
}

fn is_valid_name_for_wild_match(name0: &str) -> bool {
    let decoded = decode(name0);
    !decoded.starts_with('<') && !decoded.chars().any(|c| c.is_ascii_uppercase())
}

/// Advance to the next position in `name` that could begin a simple name
/// starting with `target0`.
fn advance_wild_match(name: &[u8], mut pos: usize, target0: u8) -> Option<usize> {
    let at = |i: usize| name.get(i).copied().unwrap_or(0);
    loop {
        let t0 = at(pos);
        if t0 == b'_' {
            let t1 = at(pos + 1);
            if t1.is_ascii_lowercase() || t1.is_ascii_digit() {
                pos += 1;
                if pos == 5 && name.starts_with(b"_ada") {
                    break;
                }
                pos += 1;
            } else if t1 == b'_' && (at(pos + 2).is_ascii_lowercase() || at(pos + 2) == target0) {
                pos += 2;
                break;
            } else {
                return None;
            }
        } else if t0.is_ascii_lowercase() || t0.is_ascii_digit() {
            pos += 1;
        } else {
            return None;
        }
    }
    Some(pos)
}

/// Scan a decimal number at `k`; a trailing `m` negates it.
///
/// Returns the value and the index just past it.
pub fn scan_number(s: &str, k: usize) -> Option<(i64, usize)> {
    let b = s.as_bytes();
    if !b.get(k).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut end = k;
    let mut ru: u64 = 0;
    while let Some(&c) = b.get(end).filter(|c| c.is_ascii_digit()) {
        ru = ru.wrapping_mul(10).wrapping_add(u64::from(c - b'0'));
        end += 1;
    }
    if b.get(end) == Some(&b'm') {
        Some(((ru as i64).wrapping_sub(1).wrapping_neg().wrapping_sub(1), end + 1))
    } else {
        Some((ru as i64, end))
    }
}

/// Scale information from a `___XF_<num>_<den>[_<num>_<den>]` tail.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedPointInfo {
    pub delta_num: f64,
    pub delta_den: f64,
    /// Explicit `'Small` when it differs from the delta.
    pub small: Option<(f64, f64)>,
}

impl FixedPointInfo {
    fn parse(tail: &str) -> Option<Self> {
        let numbers: Vec<f64> = tail
            .split('_')
            .skip(1)
            .map_while(|part| part.parse::<f64>().ok())
            .take(4)
            .collect();
        match numbers.as_slice() {
            [n0, d0, n1, d1] => Some(Self { delta_num: *n0, delta_den: *d0, small: Some((*n1, *d1)) }),
            [n0, d0, ..] => Some(Self { delta_num: *n0, delta_den: *d0, small: None }),
            _ => None,
        }
    }

    pub fn delta(&self) -> f64 {
        self.delta_num / self.delta_den
    }

    pub fn scaling_factor(&self) -> f64 {
        match self.small {
            Some((num, den)) => num / den,
            None => self.delta(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenamingKind {
    Object,
    Exception,
    Subprogram,
    Package,
}

/// A renaming decoded from `<name>___XR[_EPS]<entity>___XE<expr>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamingInfo {
    pub kind: RenamingKind,
    pub renamed_entity: String,
    /// Selector suffixes (`XA`, `XR<field>`, `XS<index>`, `XL<low>`) applied to the entity.
    pub expression: String,
}

/// Parse the renaming encoding of a symbol's linkage name.
pub fn parse_renaming(linkage_name: &str) -> Option<RenamingInfo> {
    let at = linkage_name.find("___XR")?;
    let info = &linkage_name[at + 5..];
    let (kind, rest) = match info.as_bytes().first()? {
        b'_' => (RenamingKind::Object, &info[1..]),
        b'E' => (RenamingKind::Exception, info.get(2..)?),
        b'P' => (RenamingKind::Subprogram, info.get(2..)?),
        b'S' => (RenamingKind::Package, info.get(2..)?),
        _ => return None,
    };
    let suffix = rest.find("___XE")?;
    if suffix == 0 {
        return None;
    }
    Some(RenamingInfo {
        kind,
        renamed_entity: rest[..suffix].to_string(),
        expression: rest[suffix + 5..].to_string(),
    })
}

/// Structural role of a type, read once from its encoded name.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutHint {
    Plain,
    /// `___XVE`: record template whose fields are laid out at run time.
    VariableTemplate,
    /// `___XVN`: discriminated union controlled by the named discriminant.
    VariantPart { discriminant: String },
    /// `___XVU`: template of an unchecked union.
    UncheckedUnion,
    /// `___XVS`: alternate (base) type description.
    AlternateBase,
    /// `___XVZ`: global holding a definitive object size.
    SizeVariable,
    /// `___XA`: parallel record whose fields give index types.
    IndexDescriptor,
    /// `___XD[LU]`: range subtype with encoded bounds.
    RangeSubtype,
    /// `___XP<bits>`: packed array with the given element size.
    Packed { bits: Option<u32> },
    /// `___XF_...`: fixed-point type; `None` when the numbers are unreadable.
    FixedPoint(Option<FixedPointInfo>),
    /// `___XR...`: renaming entity.
    Renaming(RenamingKind),
    /// `___XUT`: thin-pointer target template.
    ThinPointerTarget,
}

/// Classify an encoded type name.
pub fn layout_hint(name: Option<&str>) -> LayoutHint {
    let Some(name) = name else {
        return LayoutHint::Plain;
    };
    if name.ends_with("___XVE") {
        if name.ends_with("___XUT___XVE") {
            return LayoutHint::ThinPointerTarget;
        }
        return LayoutHint::VariableTemplate;
    }
    if name.ends_with("___XVN") {
        return LayoutHint::VariantPart {
            discriminant: variant_discriminant_name(name).unwrap_or_default(),
        };
    }
    if name.ends_with("___XVU") {
        return LayoutHint::UncheckedUnion;
    }
    if name.ends_with("___XVS") {
        return LayoutHint::AlternateBase;
    }
    if name.ends_with("___XVZ") {
        return LayoutHint::SizeVariable;
    }
    if name.ends_with("___XUT") {
        return LayoutHint::ThinPointerTarget;
    }
    if name.ends_with("___XA") {
        return LayoutHint::IndexDescriptor;
    }
    if let Some(at) = name.find("___XF_") {
        return LayoutHint::FixedPoint(FixedPointInfo::parse(&name[at + 5..]));
    }
    if name.contains("___XP") {
        return LayoutHint::Packed { bits: packed_array_bitsize(name) };
    }
    if name.contains("___XD") {
        return LayoutHint::RangeSubtype;
    }
    if let Some(info) = parse_renaming(name) {
        return LayoutHint::Renaming(info.kind);
    }
    LayoutHint::Plain
}

/// Name of the discriminant controlling a `___XVN` variant part.
///
/// The discriminant name precedes the marker and is delimited by `___` or
/// `.`; a name written after the marker is accepted as well.
pub fn variant_discriminant_name(type_name: &str) -> Option<String> {
    let end = type_name.rfind("___XVN")?;
    let after = &type_name[end + 6..];
    if !after.is_empty() && after.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'_') {
        return Some(after.to_string());
    }
    if end == 0 {
        return None;
    }
    let head = &type_name[..end];
    let start = match (head.rfind("___"), head.rfind('.')) {
        (Some(a), Some(b)) => (a + 3).max(b + 1),
        (Some(a), None) => a + 3,
        (None, Some(b)) => b + 1,
        (None, None) => return None,
    };
    (start < end).then(|| head[start..].to_string())
}

/// Element bit size encoded by `___XP<bits>`.
pub fn packed_array_bitsize(type_name: &str) -> Option<u32> {
    let at = type_name.find("___XP")?;
    let digits: String = type_name[at + 5..].chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Whether `field_name` names `target`, ignoring encoded tails other than
/// a variant-part marker.
pub fn field_name_match(field_name: &str, target: &str) -> bool {
    let Some(rest) = field_name.strip_prefix(target) else {
        return false;
    };
    rest.is_empty() || (rest.starts_with("___") && !field_name.ends_with("___XVN"))
}

/// Extra alignment (in bits) requested by an `___XV?<n>` field-name tail.
pub fn field_alignment_bits(field_name: &str) -> u64 {
    let b = field_name.as_bytes();
    let len = b.len();
    if len == 0 || !b[len - 1].is_ascii_digit() {
        return 1;
    }
    let align_offset = if len >= 2 && b[len - 2].is_ascii_digit() { len - 2 } else { len - 1 };
    if align_offset < 7 || &field_name[align_offset - 6..align_offset - 1] != "___XV" {
        return 8;
    }
    field_name[align_offset..].parse::<u64>().map(|n| n * 8).unwrap_or(8)
}

/// A field holding a pointer to a dynamically sized component.
pub fn is_dynamic_field_name(field_name: &str) -> bool {
    field_name.contains("___XVL")
}

/// Membership of `val` in the choice list encoded in a variant branch's
/// field name (`S<v>`, `R<lo>T<hi>`, `O` for others).
pub fn in_variant_choices(val: i64, field_name: &str) -> bool {
    let b = field_name.as_bytes();
    let mut p = 0usize;
    loop {
        match b.get(p) {
            None => return false,
            Some(b'S') => {
                let Some((w, next)) = scan_number(field_name, p + 1) else {
                    return false;
                };
                if val == w {
                    return true;
                }
                p = next;
            }
            Some(b'R') => {
                let Some((lo, next)) = scan_number(field_name, p + 1) else {
                    return false;
                };
                if b.get(next) != Some(&b'T') {
                    return false;
                }
                let Some((hi, next)) = scan_number(field_name, next + 1) else {
                    return false;
                };
                if lo <= val && val <= hi {
                    return true;
                }
                p = next;
            }
            Some(b'O') => return true,
            Some(_) => return false,
        }
    }
}

pub fn is_others_choice(field_name: &str) -> bool {
    field_name.starts_with('O')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_suffix_classification() {
        assert!(is_name_suffix(""));
        assert!(is_name_suffix(".12"));
        assert!(is_name_suffix("$3"));
        assert!(is_name_suffix("___42"));
        assert!(is_name_suffix("__2"));
        assert!(is_name_suffix("TKB"));
        assert!(is_name_suffix("_E12s"));
        assert!(is_name_suffix("Xbn"));
        assert!(is_name_suffix("___JM"));
        assert!(is_name_suffix("___LJM"));
        assert!(is_name_suffix("___XF_1_100"));
        assert!(is_name_suffix("___XR_foo"));
        assert!(!is_name_suffix("___XRT"));
        assert!(!is_name_suffix("___XVE"));
        assert!(!is_name_suffix("bar"));
        assert!(!is_name_suffix("__bar"));
    }

    #[test]
    fn exact_matching_accepts_noise_suffixes() {
        assert!(full_match("pck__bar", "pck__bar"));
        assert!(full_match("pck__bar.3", "pck__bar"));
        assert!(full_match("_ada_pck__bar", "pck__bar"));
        assert!(!full_match("pck__barx", "pck__bar"));
        assert!(!full_match("other__pck__bar", "pck__bar"));
    }

    #[test]
    fn wildcard_matching_anchors_on_scope_boundaries() {
        assert!(wild_match("bar", "bar"));
        assert!(wild_match("pck__bar", "bar"));
        assert!(wild_match("pck__inner__bar__2", "bar"));
        assert!(!wild_match("pck__foobar", "bar"));
        assert!(!wild_match("pck__bar_x", "bar"));
        assert!(wild_match("_ada_bar", "bar"));
    }

    #[test]
    fn scan_number_handles_negative_marker() {
        assert_eq!(scan_number("S12", 1), Some((12, 3)));
        assert_eq!(scan_number("S5m", 1), Some((-5, 3)));
        assert_eq!(scan_number("Sx", 1), None);
    }

    #[test]
    fn variant_choices() {
        assert!(in_variant_choices(3, "S3"));
        assert!(!in_variant_choices(4, "S3"));
        assert!(in_variant_choices(4, "S1S4"));
        assert!(in_variant_choices(7, "R5T9"));
        assert!(in_variant_choices(-2, "R3mT1"));
        assert!(in_variant_choices(99, "O"));
        assert!(!in_variant_choices(1, "Q1"));
    }

    #[test]
    fn fixed_point_info_parsing() {
        let LayoutHint::FixedPoint(Some(info)) = layout_hint(Some("pck__money___XF_1_100"))
        else {
            panic!("expected fixed point hint");
        };
        assert_eq!(info.scaling_factor(), 0.01);
        let LayoutHint::FixedPoint(Some(info)) = layout_hint(Some("t___XF_1_10_1_16")) else {
            panic!("expected fixed point hint");
        };
        assert_eq!(info.delta(), 0.1);
        assert_eq!(info.scaling_factor(), 1.0 / 16.0);
        assert_eq!(layout_hint(Some("t___XF_bad")), LayoutHint::FixedPoint(None));
    }

    #[test]
    fn discriminant_name_extraction() {
        assert_eq!(variant_discriminant_name("pck__rec___empty___XVN").as_deref(), Some("empty"));
        assert_eq!(variant_discriminant_name("pck.rec.kind___XVN").as_deref(), Some("kind"));
        assert_eq!(variant_discriminant_name("___XVNkind").as_deref(), Some("kind"));
        assert_eq!(variant_discriminant_name("novariant"), None);
    }

    #[test]
    fn packed_bits_and_hints() {
        assert_eq!(packed_array_bitsize("pck__arr___XP3"), Some(3));
        assert_eq!(packed_array_bitsize("pck__arr___XPx"), None);
        assert_eq!(layout_hint(Some("pck__rec___XVE")), LayoutHint::VariableTemplate);
        assert_eq!(layout_hint(Some("pck__rec___XVU")), LayoutHint::UncheckedUnion);
        assert_eq!(layout_hint(Some("pck__t___XDLU_1__10")), LayoutHint::RangeSubtype);
        assert_eq!(layout_hint(None), LayoutHint::Plain);
    }

    #[test]
    fn renaming_parsing() {
        let info = parse_renaming("pck__y___XR_pck__x___XEXA").unwrap();
        assert_eq!(info.kind, RenamingKind::Object);
        assert_eq!(info.renamed_entity, "pck__x");
        assert_eq!(info.expression, "XA");
        let info = parse_renaming("pck__p___XRP_pck__q___XE").unwrap();
        assert_eq!(info.kind, RenamingKind::Subprogram);
        assert_eq!(info.renamed_entity, "pck__q");
        assert!(parse_renaming("pck__y___XR____XE").is_none());
    }

    #[test]
    fn field_helpers() {
        assert!(field_name_match("value", "value"));
        assert!(field_name_match("value___XVL", "value"));
        assert!(!field_name_match("values", "value"));
        assert_eq!(field_alignment_bits("plain"), 1);
        assert_eq!(field_alignment_bits("data___XVA4"), 32);
        assert_eq!(field_alignment_bits("x1"), 8);
    }
}
