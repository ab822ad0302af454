//! Maven version ordering and version-range constraints.
//!
//! Ordering follows Maven's `ComparableVersion`: versions are split into numeric and
//! qualifier items at `.`, `-` and digit/letter transitions, trailing "null" items are
//! dropped, and well-known qualifiers sort as
//! `alpha < beta < milestone < rc = cr < snapshot < "" = ga = final = release < sp`.
//! Unknown qualifiers sort after `sp`, lexically among themselves.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::VersionError;

const QUALIFIERS: [&str; 7] = ["alpha", "beta", "milestone", "rc", "snapshot", "", "sp"];
const RELEASE_QUALIFIER_INDEX: &str = "5";

#[derive(Debug, Clone)]
enum Item {
    /// Digits with leading zeros stripped (`""` is zero).
    Int(String),
    Str(String),
    List(Vec<Item>),
}

impl Item {
    fn is_null(&self) -> bool {
        match self {
            Item::Int(digits) => digits.is_empty(),
            Item::Str(value) => comparable_qualifier(value) == RELEASE_QUALIFIER_INDEX,
            Item::List(items) => items.is_empty(),
        }
    }

    fn compare(&self, other: Option<&Item>) -> Ordering {
        match (self, other) {
            (Item::Int(digits), None) => {
                if digits.is_empty() {
                    Ordering::Equal
                } else {
                    Ordering::Greater
                }
            }
            (Item::Int(a), Some(Item::Int(b))) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Item::Int(_), Some(_)) => Ordering::Greater,

            (Item::Str(value), None) => {
                comparable_qualifier(value).as_str().cmp(RELEASE_QUALIFIER_INDEX)
            }
            (Item::Str(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::Str(a), Some(Item::Str(b))) => comparable_qualifier(a).cmp(&comparable_qualifier(b)),
            (Item::Str(_), Some(Item::List(_))) => Ordering::Less,

            (Item::List(items), None) => match items.first() {
                None => Ordering::Equal,
                Some(first) => first.compare(None),
            },
            (Item::List(_), Some(Item::Int(_))) => Ordering::Less,
            (Item::List(_), Some(Item::Str(_))) => Ordering::Greater,
            (Item::List(left), Some(Item::List(right))) => {
                let len = left.len().max(right.len());
                for idx in 0..len {
                    let result = match (left.get(idx), right.get(idx)) {
                        (None, None) => Ordering::Equal,
                        (None, Some(r)) => r.compare(None).reverse(),
                        (Some(l), r) => l.compare(r),
                    };
                    if result != Ordering::Equal {
                        return result;
                    }
                }
                Ordering::Equal
            }
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Item::Int(digits) if digits.is_empty() => out.push('0'),
            Item::Int(digits) => out.push_str(digits),
            Item::Str(value) => out.push_str(value),
            Item::List(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(if matches!(item, Item::List(_)) { '-' } else { '.' });
                    }
                    item.render(out);
                }
            }
        }
    }
}

fn comparable_qualifier(value: &str) -> String {
    match QUALIFIERS.iter().position(|q| *q == value) {
        Some(idx) => idx.to_string(),
        None => format!("{}-{value}", QUALIFIERS.len()),
    }
}

fn string_item(value: &str, followed_by_digit: bool) -> Item {
    let value = if followed_by_digit && value.len() == 1 {
        match value {
            "a" => "alpha",
            "b" => "beta",
            "m" => "milestone",
            other => other,
        }
    } else {
        value
    };
    let value = match value {
        "ga" | "final" | "release" => "",
        "cr" => "rc",
        other => other,
    };
    Item::Str(value.to_string())
}

fn int_item(digits: &str) -> Item {
    Item::Int(digits.trim_start_matches('0').to_string())
}

fn parse_item(is_digit: bool, text: &str) -> Item {
    if is_digit {
        int_item(text)
    } else {
        string_item(text, false)
    }
}

/// A list under construction; `path` addresses nested lists from the root.
fn parse_items(version: &str) -> Item {
    let lower = version.to_ascii_lowercase();
    let chars: Vec<char> = lower.chars().collect();

    // Stack of open lists; closed lists are folded into their parent on pop.
    let mut stack: Vec<Vec<Item>> = vec![Vec::new()];
    let mut is_digit = false;
    let mut start = 0usize;

    let slice = |from: usize, to: usize| chars[from..to].iter().collect::<String>();

    for (idx, &c) in chars.iter().enumerate() {
        if c == '.' {
            let item = if idx == start {
                Item::Int(String::new())
            } else {
                parse_item(is_digit, &slice(start, idx))
            };
            push_item(&mut stack, item);
            start = idx + 1;
        } else if c == '-' {
            let item = if idx == start {
                Item::Int(String::new())
            } else {
                parse_item(is_digit, &slice(start, idx))
            };
            push_item(&mut stack, item);
            start = idx + 1;
            stack.push(Vec::new());
        } else if c.is_ascii_digit() {
            if !is_digit && idx > start {
                push_item(&mut stack, string_item(&slice(start, idx), true));
                start = idx;
                stack.push(Vec::new());
            }
            is_digit = true;
        } else {
            if is_digit && idx > start {
                push_item(&mut stack, parse_item(true, &slice(start, idx)));
                start = idx;
                stack.push(Vec::new());
            }
            is_digit = false;
        }
    }
    if chars.len() > start {
        push_item(&mut stack, parse_item(is_digit, &slice(start, chars.len())));
    }

    while stack.len() > 1 {
        let mut list = stack.pop().unwrap_or_default();
        normalize(&mut list);
        push_item(&mut stack, Item::List(list));
    }
    let mut root = stack.pop().unwrap_or_default();
    normalize(&mut root);
    Item::List(root)
}

fn push_item(stack: &mut [Vec<Item>], item: Item) {
    if let Some(top) = stack.last_mut() {
        top.push(item);
    }
}

fn normalize(items: &mut Vec<Item>) {
    let mut idx = items.len();
    while idx > 0 {
        idx -= 1;
        if items[idx].is_null() {
            items.remove(idx);
        } else if !matches!(items[idx], Item::List(_)) {
            break;
        }
    }
}

/// A concrete, totally ordered Maven version.
#[derive(Clone)]
pub struct Version {
    text: String,
    items: Item,
    canonical: String,
}

impl Version {
    /// Any string is a version; ordering degrades gracefully for odd inputs.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let text = text.trim().to_string();
        let items = parse_items(&text);
        let mut canonical = String::new();
        items.render(&mut canonical);
        Self {
            text,
            items,
            canonical,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Normalized rendering; equal versions share the same canonical form.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        crate::coordinate::is_snapshot_version(&self.text)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({:?})", self.text)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.items.compare(Some(&other.items))
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_plain_version(s)?;
        Ok(Version::new(s))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

fn validate_plain_version(spec: &str) -> Result<(), VersionError> {
    let trimmed = spec.trim();
    if trimmed.is_empty() {
        return Err(VersionError::invalid(spec, "version must not be empty"));
    }
    if let Some(c) = trimmed
        .chars()
        .find(|c| matches!(c, '[' | ']' | '(' | ')' | ',') || c.is_whitespace())
    {
        return Err(VersionError::invalid(
            spec,
            format!("unexpected character {c:?} in version"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bound {
    pub version: Version,
    pub inclusive: bool,
}

/// One bracketed interval such as `[1.0,2.0)`; a missing bound is unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    pub lower: Option<Bound>,
    pub upper: Option<Bound>,
}

impl VersionRange {
    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        if let Some(lower) = &self.lower {
            match version.cmp(&lower.version) {
                Ordering::Less => return false,
                Ordering::Equal if !lower.inclusive => return false,
                _ => {}
            }
        }
        if let Some(upper) = &self.upper {
            match version.cmp(&upper.version) {
                Ordering::Greater => return false,
                Ordering::Equal if !upper.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    fn parse(spec: &str, text: &str) -> Result<Self, VersionError> {
        let lower_inclusive = text.starts_with('[');
        let upper_inclusive = text.ends_with(']');
        let inner = text[1..text.len() - 1].trim();

        let Some((lower, upper)) = inner.split_once(',') else {
            if !lower_inclusive || !upper_inclusive {
                return Err(VersionError::invalid(
                    spec,
                    format!("single version range {text} must be inclusive on both sides"),
                ));
            }
            let version: Version = inner.parse()?;
            let bound = Bound {
                version,
                inclusive: true,
            };
            return Ok(Self {
                lower: Some(bound.clone()),
                upper: Some(bound),
            });
        };
        if upper.contains(',') {
            return Err(VersionError::invalid(
                spec,
                format!("range {text} has more than two bounds"),
            ));
        }

        let lower = lower.trim();
        let upper = upper.trim();
        let lower = if lower.is_empty() {
            None
        } else {
            Some(Bound {
                version: lower.parse()?,
                inclusive: lower_inclusive,
            })
        };
        let upper = if upper.is_empty() {
            None
        } else {
            Some(Bound {
                version: upper.parse()?,
                inclusive: upper_inclusive,
            })
        };

        if let (Some(lower), Some(upper)) = (&lower, &upper) {
            match lower.version.cmp(&upper.version) {
                Ordering::Greater => {
                    return Err(VersionError::invalid(
                        spec,
                        format!("range {text} has a lower bound above its upper bound"),
                    ))
                }
                Ordering::Equal if !(lower.inclusive && upper.inclusive) => {
                    return Err(VersionError::invalid(spec, format!("range {text} is empty")))
                }
                _ => {}
            }
        }

        Ok(Self { lower, upper })
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(lower), Some(upper)) = (&self.lower, &self.upper) {
            if lower.inclusive && upper.inclusive && lower.version == upper.version {
                return write!(f, "[{}]", lower.version);
            }
        }
        match &self.lower {
            Some(bound) => write!(
                f,
                "{}{}",
                if bound.inclusive { '[' } else { '(' },
                bound.version
            )?,
            None => f.write_str("(")?,
        }
        f.write_str(",")?;
        match &self.upper {
            Some(bound) => write!(
                f,
                "{}{}",
                bound.version,
                if bound.inclusive { ']' } else { ')' }
            ),
            None => f.write_str(")"),
        }
    }
}

/// What a dependency declaration asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionConstraint {
    /// Empty version string: any version is acceptable.
    Unconstrained,
    /// A plain version, used as-is without consulting repository metadata.
    Exact(Version),
    /// A union of intervals; the highest available matching version wins.
    Ranges(Vec<VersionRange>),
}

impl VersionConstraint {
    /// Parse a constraint. Empty or blank input is [`VersionConstraint::Unconstrained`].
    pub fn parse(spec: &str) -> Result<Self, VersionError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Ok(VersionConstraint::Unconstrained);
        }
        if !(trimmed.starts_with('[') || trimmed.starts_with('(')) {
            return Ok(VersionConstraint::Exact(trimmed.parse()?));
        }

        let mut ranges = Vec::new();
        let mut rest = trimmed;
        while !rest.is_empty() {
            if !(rest.starts_with('[') || rest.starts_with('(')) {
                return Err(VersionError::invalid(
                    spec,
                    format!("expected [ or ( but got {rest:?}"),
                ));
            }
            let Some(end) = rest.find([']', ')']) else {
                return Err(VersionError::invalid(spec, "unbounded version range"));
            };
            let text = &rest[..=end];
            if text[1..].contains(['[', '(']) {
                return Err(VersionError::invalid(spec, format!("nested range in {text}")));
            }
            ranges.push(VersionRange::parse(spec, text)?);

            rest = rest[end + 1..].trim_start();
            if let Some(after_comma) = rest.strip_prefix(',') {
                rest = after_comma.trim_start();
                if rest.is_empty() {
                    return Err(VersionError::invalid(spec, "trailing comma after range"));
                }
            }
        }
        Ok(VersionConstraint::Ranges(ranges))
    }

    #[must_use]
    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionConstraint::Unconstrained => true,
            VersionConstraint::Exact(exact) => exact == version,
            VersionConstraint::Ranges(ranges) => ranges.iter().any(|r| r.contains(version)),
        }
    }

    /// Whether repository metadata is needed to pick a version.
    #[must_use]
    pub fn needs_metadata(&self) -> bool {
        !matches!(self, VersionConstraint::Exact(_))
    }
}

impl FromStr for VersionConstraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionConstraint::parse(s)
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionConstraint::Unconstrained => Ok(()),
            VersionConstraint::Exact(version) => write!(f, "{version}"),
            VersionConstraint::Ranges(ranges) => {
                for (idx, range) in ranges.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{range}")?;
                }
                Ok(())
            }
        }
    }
}
