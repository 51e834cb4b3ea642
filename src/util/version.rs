//! npm-style version range handling.
//!
//! Only what toolchain detection needs is implemented: computing the lowest
//! version a dependency range admits. Ranges are desugared into comparator
//! sets the way npm does it (`^1.2` becomes `>=1.2.0 <2.0.0`, `1.x` becomes
//! `>=1.0.0 <2.0.0`, and so on) and the minimum is taken across `||` unions.

use semver::{Prerelease, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    version: Version,
}

impl Comparator {
    fn new(op: Op, version: Version) -> Self {
        Comparator { op, version }
    }

    fn matches(&self, v: &Version) -> bool {
        match self.op {
            Op::Eq => *v == self.version,
            Op::Gt => *v > self.version,
            Op::Gte => *v >= self.version,
            Op::Lt => *v < self.version,
            Op::Lte => *v <= self.version,
        }
    }
}

/// A partially specified version such as `1`, `1.2`, `1.x` or `1.2.3-beta.1`.
#[derive(Debug, Clone, Default)]
struct Partial {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Prerelease,
}

impl Partial {
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('=').trim_start_matches('v');
        let s = s.split('+').next().unwrap_or("");

        let (core, pre) = match s.split_once('-') {
            Some((core, pre)) => (core, Prerelease::new(pre).ok()?),
            None => (s, Prerelease::EMPTY),
        };

        if core.is_empty() {
            return Some(Partial::default());
        }

        let mut numbers = [None; 3];
        let mut wildcard = false;
        for (i, part) in core.split('.').enumerate() {
            if i >= 3 {
                return None;
            }
            match part {
                "x" | "X" | "*" => wildcard = true,
                _ if wildcard => return None,
                _ => numbers[i] = Some(part.parse::<u64>().ok()?),
            }
        }

        Some(Partial {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            pre,
        })
    }

    fn is_any(&self) -> bool {
        self.major.is_none()
    }

    fn is_full(&self) -> bool {
        self.patch.is_some()
    }

    /// The version with missing components filled with zero.
    fn floor(&self) -> Version {
        let mut v = Version::new(
            self.major.unwrap_or(0),
            self.minor.unwrap_or(0),
            self.patch.unwrap_or(0),
        );
        v.pre = self.pre.clone();
        v
    }

    /// The first version past the range a partial covers (`1.2` -> `1.3.0`).
    ///
    /// `None` for a wildcard major, or when the next version is not
    /// representable.
    fn ceiling(&self) -> Option<Version> {
        match (self.major, self.minor, self.patch) {
            (Some(major), None, _) => Some(Version::new(major.checked_add(1)?, 0, 0)),
            (Some(major), Some(minor), None) => {
                Some(Version::new(major, minor.checked_add(1)?, 0))
            }
            (Some(major), Some(minor), Some(patch)) => {
                Some(Version::new(major, minor, patch.checked_add(1)?))
            }
            (None, _, _) => None,
        }
    }
}

/// Matches nothing a real release could satisfy.
fn impossible() -> Vec<Comparator> {
    vec![Comparator::new(Op::Lt, Version::new(0, 0, 0))]
}

fn caret(p: &Partial) -> Option<Vec<Comparator>> {
    let (Some(major), minor, patch) = (p.major, p.minor, p.patch) else {
        return Some(Vec::new());
    };
    let upper = match (minor, patch) {
        (None, _) => Version::new(major.checked_add(1)?, 0, 0),
        (Some(minor), None) if major == 0 => Version::new(0, minor.checked_add(1)?, 0),
        (Some(_), None) => Version::new(major.checked_add(1)?, 0, 0),
        (Some(minor), Some(patch)) => {
            if major > 0 {
                Version::new(major.checked_add(1)?, 0, 0)
            } else if minor > 0 {
                Version::new(0, minor.checked_add(1)?, 0)
            } else {
                Version::new(0, 0, patch.checked_add(1)?)
            }
        }
    };
    Some(vec![
        Comparator::new(Op::Gte, p.floor()),
        Comparator::new(Op::Lt, upper),
    ])
}

fn tilde(p: &Partial) -> Option<Vec<Comparator>> {
    let Some(major) = p.major else {
        return Some(Vec::new());
    };
    let upper = match p.minor {
        None => Version::new(major.checked_add(1)?, 0, 0),
        Some(minor) => Version::new(major, minor.checked_add(1)?, 0),
    };
    Some(vec![
        Comparator::new(Op::Gte, p.floor()),
        Comparator::new(Op::Lt, upper),
    ])
}

/// Expand one operator and partial version into comparators.
///
/// `None` when a bound does not fit in a version component.
fn desugar(op: &str, p: &Partial) -> Option<Vec<Comparator>> {
    let comparators = match op {
        "^" => caret(p)?,
        "~" | "~>" => tilde(p)?,
        ">" if p.is_any() => impossible(),
        ">" if p.is_full() => vec![Comparator::new(Op::Gt, p.floor())],
        ">" => vec![Comparator::new(Op::Gte, p.ceiling()?)],
        ">=" if p.is_any() => Vec::new(),
        ">=" => vec![Comparator::new(Op::Gte, p.floor())],
        "<" if p.is_any() => impossible(),
        "<" => vec![Comparator::new(Op::Lt, p.floor())],
        "<=" if p.is_any() => Vec::new(),
        "<=" if p.is_full() => vec![Comparator::new(Op::Lte, p.floor())],
        "<=" => vec![Comparator::new(Op::Lt, p.ceiling()?)],
        // bare or `=`
        _ if p.is_any() => Vec::new(),
        _ if p.is_full() => vec![Comparator::new(Op::Eq, p.floor())],
        _ => vec![
            Comparator::new(Op::Gte, p.floor()),
            Comparator::new(Op::Lt, p.ceiling()?),
        ],
    };
    Some(comparators)
}

const OPERATORS: &[&str] = &[">=", "<=", "~>", ">", "<", "=", "^", "~"];

fn split_operator(token: &str) -> (&str, &str) {
    for op in OPERATORS {
        if let Some(rest) = token.strip_prefix(op) {
            return (op, rest);
        }
    }
    ("", token)
}

fn hyphen(lower: &str, upper: &str) -> Option<Vec<Comparator>> {
    let lower = Partial::parse(lower)?;
    let upper = Partial::parse(upper)?;
    let mut set = Vec::new();
    if !lower.is_any() {
        set.push(Comparator::new(Op::Gte, lower.floor()));
    }
    if upper.is_full() {
        set.push(Comparator::new(Op::Lte, upper.floor()));
    } else if !upper.is_any() {
        set.push(Comparator::new(Op::Lt, upper.ceiling()?));
    }
    Some(set)
}

fn parse_set(set: &str) -> Option<Vec<Comparator>> {
    let raw: Vec<&str> = set.split_whitespace().collect();
    if raw.len() == 3 && raw[1] == "-" {
        return hyphen(raw[0], raw[2]);
    }

    // `>= 1.2.3` is written with a space as often as without one.
    let mut tokens = Vec::new();
    let mut pending: Option<&str> = None;
    for token in raw {
        if OPERATORS.contains(&token) {
            if pending.is_some() {
                return None;
            }
            pending = Some(token);
            continue;
        }
        match pending.take() {
            Some(op) => tokens.push(format!("{op}{token}")),
            None => tokens.push(token.to_string()),
        }
    }
    if pending.is_some() {
        return None;
    }

    let mut comparators = Vec::new();
    for token in &tokens {
        let (op, rest) = split_operator(token);
        let partial = Partial::parse(rest)?;
        comparators.extend(desugar(op, &partial)?);
    }
    Some(comparators)
}

/// The lowest version satisfying every comparator of one set.
fn set_minimum(set: &[Comparator]) -> Option<Version> {
    let zero = Version::new(0, 0, 0);
    if set.iter().all(|c| c.matches(&zero)) {
        return Some(zero);
    }

    let mut floor: Option<Version> = None;
    for comparator in set {
        let candidate = match comparator.op {
            Op::Gt => {
                let mut v = comparator.version.clone();
                if v.pre.is_empty() {
                    v.patch = v.patch.checked_add(1)?;
                } else {
                    v.pre = Prerelease::new(&format!("{}.0", v.pre)).ok()?;
                }
                v
            }
            Op::Gte | Op::Eq => comparator.version.clone(),
            Op::Lt | Op::Lte => continue,
        };
        if floor.as_ref().map_or(true, |f| candidate > *f) {
            floor = Some(candidate);
        }
    }

    let floor = floor?;
    set.iter().all(|c| c.matches(&floor)).then_some(floor)
}

/// Strip package-manager protocols down to the range they carry.
///
/// Returns `None` for specifiers that name a location rather than a range
/// (git URLs, tarballs, `file:` and `link:` paths).
fn strip_protocol(range: &str) -> Option<&str> {
    let range = range.trim();
    if let Some(alias) = range.strip_prefix("npm:") {
        let at = alias.rfind('@')?;
        if at == 0 {
            return Some("");
        }
        return Some(&alias[at + 1..]);
    }
    if let Some(rest) = range.strip_prefix("workspace:") {
        return Some(match rest {
            "^" | "~" => "*",
            other => other,
        });
    }
    if range.contains(':') || range.contains('/') {
        return None;
    }
    Some(range)
}

/// Compute the lowest version admitted by an npm dependency range.
///
/// Returns `None` when the range cannot be parsed (dist-tags such as `latest`,
/// URLs, malformed input) or admits no version at all.
pub fn min_version(range: &str) -> Option<Version> {
    let range = strip_protocol(range)?;

    let mut best: Option<Version> = None;
    for alternative in range.split("||") {
        let set = parse_set(alternative)?;
        if let Some(candidate) = set_minimum(&set) {
            best = match best {
                Some(current) if current <= candidate => Some(current),
                _ => Some(candidate),
            };
        }
    }
    best
}

/// Parse an exact version, tolerating a leading `v` and missing components.
pub fn parse_version_lenient(s: &str) -> Option<Version> {
    let s = s.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(s) {
        return Some(v);
    }
    let partial = Partial::parse(s)?;
    if partial.is_any() {
        return None;
    }
    Some(partial.floor())
}
