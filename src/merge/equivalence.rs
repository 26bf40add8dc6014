//! Engine-aware semantic equality used when both sides of a merge touched
//! the same attribute.

use crate::catalog::types::{DefaultValue, Engine};
use once_cell::sync::Lazy;
use regex::Regex;

static CURRENT_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*CURRENT_TIMESTAMP(\(\s*(?P<fsp>\d+)?\s*\))?\s*$").expect("valid regex")
});

static NOW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*NOW(\(\s*(?P<fsp>\d+)?\s*\))?\s*$").expect("valid regex")
});

static AUTO_RANDOM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*AUTO_RANDOM(\(\s*(?P<shard_bits>\d+)?\s*(,\s*(?P<allocation_range>\d+))?\s*\))?\s*$",
    )
    .expect("valid regex")
});

static QUALIFIED_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`]+`\.`").expect("valid regex"));

const DEFAULT_SHARD_BITS: u32 = 5;
const DEFAULT_ALLOCATION_RANGE: u32 = 64;

/// A `CURRENT_TIMESTAMP`/`NOW` default or on-update expression. Only the
/// fractional seconds precision matters for equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampDefault {
    CurrentTimestamp { fsp: u32 },
    Now { fsp: u32 },
}

impl TimestampDefault {
    pub fn parse(input: &str) -> Option<Self> {
        if let Some(caps) = CURRENT_TIMESTAMP_RE.captures(input) {
            let fsp = parse_optional_u32(caps.name("fsp").map(|m| m.as_str()))?;
            return Some(TimestampDefault::CurrentTimestamp { fsp });
        }
        if let Some(caps) = NOW_RE.captures(input) {
            let fsp = parse_optional_u32(caps.name("fsp").map(|m| m.as_str()))?;
            return Some(TimestampDefault::Now { fsp });
        }
        None
    }

    pub fn fsp(self) -> u32 {
        match self {
            TimestampDefault::CurrentTimestamp { fsp } | TimestampDefault::Now { fsp } => fsp,
        }
    }
}

/// TiDB `AUTO_RANDOM[(shard_bits[, allocation_range])]`. Zero means the
/// parameter was omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AutoRandomDefault {
    pub shard_bits: u32,
    pub allocation_range: u32,
}

impl AutoRandomDefault {
    pub fn parse(input: &str) -> Option<Self> {
        let caps = AUTO_RANDOM_RE.captures(input)?;
        Some(Self {
            shard_bits: parse_optional_u32(caps.name("shard_bits").map(|m| m.as_str()))?,
            allocation_range: parse_optional_u32(
                caps.name("allocation_range").map(|m| m.as_str()),
            )?,
        })
    }

    pub fn canonical(self) -> (u32, u32) {
        let shard_bits = if self.shard_bits == 0 {
            DEFAULT_SHARD_BITS
        } else {
            self.shard_bits
        };
        let allocation_range = if self.allocation_range == 0 {
            DEFAULT_ALLOCATION_RANGE
        } else {
            self.allocation_range
        };
        (shard_bits, allocation_range)
    }

    pub fn is_equivalent(self, other: AutoRandomDefault) -> bool {
        self.canonical() == other.canonical()
    }
}

fn parse_optional_u32(value: Option<&str>) -> Option<u32> {
    match value {
        None | Some("") => Some(0),
        Some(digits) => digits.parse().ok(),
    }
}

/// Compares two `AUTO_RANDOM` expressions after filling in the documented
/// defaults. Two inputs that are both not `AUTO_RANDOM` are equivalent; one
/// of each is not.
pub fn is_auto_random_equivalent(a: &str, b: &str) -> bool {
    match (AutoRandomDefault::parse(a), AutoRandomDefault::parse(b)) {
        (Some(a), Some(b)) => a.is_equivalent(b),
        (a, b) => a.is_none() == b.is_none(),
    }
}

pub fn default_value_equal(a: &DefaultValue, b: &DefaultValue) -> bool {
    if let (Some(a_expr), Some(b_expr)) = (a.as_expression(), b.as_expression()) {
        if a_expr.eq_ignore_ascii_case("AUTO_INCREMENT") {
            return b_expr.eq_ignore_ascii_case("AUTO_INCREMENT");
        }
        if let (Some(a_ts), Some(b_ts)) =
            (TimestampDefault::parse(a_expr), TimestampDefault::parse(b_expr))
        {
            return a_ts.fsp() == b_ts.fsp();
        }
        if let (Some(a_ar), Some(b_ar)) =
            (AutoRandomDefault::parse(a_expr), AutoRandomDefault::parse(b_expr))
        {
            return a_ar.is_equivalent(b_ar);
        }
    }
    a == b
}

pub fn on_update_equal(a: &str, b: &str) -> bool {
    if let (Some(a_ts), Some(b_ts)) = (TimestampDefault::parse(a), TimestampDefault::parse(b)) {
        return a_ts.fsp() == b_ts.fsp();
    }
    a == b
}

pub fn column_type_equal(a: &str, b: &str, engine: Engine) -> bool {
    if engine.is_mysql_family() {
        canonical_column_type(a) == canonical_column_type(b)
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

const MULTI_WORD_SYNONYMS: &[(&str, &str)] = &[
    ("NATIONAL CHARACTER VARYING", "VARCHAR"),
    ("NATIONAL CHARACTER", "CHAR"),
    ("NATIONAL VARCHAR", "VARCHAR"),
    ("NATIONAL CHAR", "CHAR"),
    ("CHARACTER VARYING", "VARCHAR"),
    ("DOUBLE PRECISION", "DOUBLE"),
    ("LONG VARBINARY", "MEDIUMBLOB"),
    ("LONG VARCHAR", "MEDIUMTEXT"),
];

fn single_word_synonym(name: &str) -> Option<&'static str> {
    let canonical = match name {
        "INTEGER" | "INT4" => "INT",
        "INT1" => "TINYINT",
        "INT2" => "SMALLINT",
        "INT3" | "MIDDLEINT" => "MEDIUMINT",
        "INT8" => "BIGINT",
        "BOOL" | "BOOLEAN" => "TINYINT(1)",
        "DEC" | "NUMERIC" | "FIXED" => "DECIMAL",
        "REAL" | "FLOAT8" => "DOUBLE",
        "FLOAT4" => "FLOAT",
        "CHARACTER" | "NCHAR" => "CHAR",
        "NVARCHAR" | "VARCHARACTER" => "VARCHAR",
        "LONG" => "MEDIUMTEXT",
        _ => return None,
    };
    Some(canonical)
}

fn at_word_boundary(rest: &str) -> bool {
    rest.is_empty() || rest.starts_with('(') || rest.starts_with(' ')
}

/// Canonical MySQL/TiDB spelling of a column type: upper-cased, single
/// spaced, with type aliases resolved to the name the server reports.
pub fn canonical_column_type(column_type: &str) -> String {
    let normalized = column_type
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    for (alias, canonical) in MULTI_WORD_SYNONYMS {
        if let Some(rest) = normalized.strip_prefix(*alias) {
            if at_word_boundary(rest) {
                return format!("{canonical}{rest}");
            }
        }
    }
    let split = normalized.find(['(', ' ']).unwrap_or(normalized.len());
    let (name, rest) = normalized.split_at(split);
    match single_word_synonym(name) {
        // `BOOL(1)` is not valid; the alias already carries its width.
        Some(canonical) if canonical.contains('(') => {
            format!("{canonical}{}", rest.trim_start_matches(|c: char| c != ' '))
        }
        Some(canonical) => format!("{canonical}{rest}"),
        None => normalized,
    }
}

fn strip_tokens(input: &str, tokens: &[char]) -> String {
    input.chars().filter(|c| !tokens.contains(c)).collect()
}

/// Rewrites MySQL's `SHOW CREATE VIEW` output into a comparable form:
/// removes ``AS `alias` `` clauses and collapses `` `schema`.` `` qualifiers.
pub fn normalize_mysql_view_definition(query: &str) -> String {
    let mut query = query.trim().to_string();
    if !query.ends_with(';') {
        query.push(';');
    }
    loop {
        let Some(as_idx) = query.find(" AS ") else {
            break;
        };
        let tail = &query[as_idx..];
        let end = ["` ", "`,", "`;"]
            .iter()
            .filter_map(|symbol| tail.find(symbol))
            .min();
        let Some(end) = end else {
            break;
        };
        query.replace_range(as_idx..as_idx + end + 1, "");
    }
    QUALIFIED_NAME_RE.replace_all(&query, "`").into_owned()
}

pub fn view_definition_equal(a: &str, b: &str) -> bool {
    const IGNORED: &[char] = &['`', ' ', '(', ')', '\t', '\n', '\r'];
    let a = strip_tokens(&normalize_mysql_view_definition(a), IGNORED);
    let b = strip_tokens(&normalize_mysql_view_definition(b), IGNORED);
    a.eq_ignore_ascii_case(&b)
}

/// Function and procedure bodies. Trailing semicolons are not significant.
pub fn routine_definition_equal(a: &str, b: &str) -> bool {
    const IGNORED: &[char] = &['`', ' ', '\t', '\n', '\r'];
    let a = strip_tokens(a.trim_end_matches(';'), IGNORED);
    let b = strip_tokens(b.trim_end_matches(';'), IGNORED);
    a.eq_ignore_ascii_case(&b)
}

pub fn partition_expression_equal(a: &str, b: &str) -> bool {
    const IGNORED: &[char] = &['`', ' ', '\t', '\n', '\r', '(', ')'];
    strip_tokens(a, IGNORED).eq_ignore_ascii_case(&strip_tokens(b, IGNORED))
}
