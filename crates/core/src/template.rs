use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Lower,
    Upper,
    Title,
    Strip,
    Pad(usize),
    Prefix(String),
    Suffix(String),
    Replace { from: String, to: String },
    Unknown(String),
}

impl Filter {
    fn parse(part: &str) -> Self {
        let (name, arg) = match part.split_once('=') {
            Some((name, arg)) => (name, Some(arg)),
            None => (part, None),
        };
        match (name, arg) {
            ("lower", None) => Filter::Lower,
            ("upper", None) => Filter::Upper,
            ("title", None) => Filter::Title,
            ("strip", None) => Filter::Strip,
            ("pad" | "zfill", Some(n)) => Filter::Pad(n.trim().parse().unwrap_or(0)),
            ("prefix", Some(s)) => Filter::Prefix(s.to_string()),
            ("suffix", Some(s)) => Filter::Suffix(s.to_string()),
            ("replace", Some(body)) => match body.split_once(':') {
                Some((from, to)) => Filter::Replace {
                    from: from.to_string(),
                    to: to.to_string(),
                },
                None => Filter::Unknown(part.to_string()),
            },
            _ => Filter::Unknown(part.to_string()),
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            Filter::Lower => value.to_lowercase(),
            Filter::Upper => value.to_uppercase(),
            Filter::Title => title_case(value),
            Filter::Strip => value.trim().to_string(),
            Filter::Pad(width) => {
                if *width > 0 && is_all_digits(value) {
                    zero_pad(value, *width)
                } else {
                    value.to_string()
                }
            }
            Filter::Prefix(prefix) => format!("{prefix}{value}"),
            Filter::Suffix(suffix) => format!("{value}{suffix}"),
            Filter::Replace { from, to } => value.replace(from.as_str(), to),
            Filter::Unknown(_) => value.to_string(),
        }
    }
}

pub fn parse_filters(chain: &str) -> Vec<Filter> {
    chain
        .split('|')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(Filter::parse)
        .collect()
}

pub fn apply_filters(value: &str, filters: &[Filter]) -> String {
    filters
        .iter()
        .fold(value.to_string(), |acc, filter| filter.apply(&acc))
}

/// How a placeholder key addresses the segment list when it is not a named
/// variable. Indices are 1-based; negative values count from the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Index(i64),
    From(i64),
    Range(i64, i64),
    Unresolved,
}

impl Selector {
    fn parse(key: &str) -> Self {
        if let Some(base) = key.strip_suffix('+') {
            return Selector::From(parse_int(base));
        }
        if let Some((start, end)) = key.split_once(':') {
            return Selector::Range(parse_int(start), parse_int(end));
        }
        match parse_int(key) {
            0 => Selector::Unresolved,
            idx => Selector::Index(idx),
        }
    }

    fn resolve(self, segments: &[String], joiner: &str, filters: &[Filter]) -> String {
        let len = segments.len() as i64;
        let absolute = |idx: i64| if idx < 0 { len + 1 + idx } else { idx };
        let join = |start: i64, end: i64| {
            segments[(start - 1) as usize..end as usize]
                .iter()
                .map(|segment| apply_filters(segment, filters))
                .collect::<Vec<_>>()
                .join(joiner)
        };

        match self {
            Selector::Index(idx) => {
                let idx = absolute(idx);
                if (1..=len).contains(&idx) {
                    apply_filters(&segments[(idx - 1) as usize], filters)
                } else {
                    String::new()
                }
            }
            Selector::From(0) => String::new(),
            Selector::From(idx) => {
                let start = absolute(idx).max(1);
                if start > len {
                    String::new()
                } else {
                    join(start, len)
                }
            }
            Selector::Range(0, _) | Selector::Range(_, 0) => String::new(),
            Selector::Range(start, end) => {
                let start = absolute(start).max(1);
                let end = absolute(end).min(len);
                if start > end {
                    String::new()
                } else {
                    join(start, end)
                }
            }
            Selector::Unresolved => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub key: String,
    pub selector: Selector,
    pub filters: Vec<Filter>,
}

impl Placeholder {
    fn new(key: &str, filters: Option<&str>) -> Self {
        let key = key.trim();
        Self {
            key: key.to_string(),
            selector: Selector::parse(key),
            filters: filters.map(parse_filters).unwrap_or_default(),
        }
    }

    pub fn resolve(
        &self,
        vars: &HashMap<String, String>,
        segments: &[String],
        joiner: &str,
    ) -> String {
        if let Some(value) = vars.get(&self.key) {
            return apply_filters(value, &self.filters);
        }
        self.selector.resolve(segments, joiner, &self.filters)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Placeholder(Placeholder),
}

/// A template parsed once and rendered per file. Parsing never fails: text
/// that is not a well-formed placeholder stays literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    pub fn parse(input: &str) -> Self {
        let mut parts = Vec::new();
        let mut cursor = 0usize;
        while let Some(token) = next_placeholder(input, cursor) {
            if token.start > cursor {
                parts.push(TemplatePart::Literal(input[cursor..token.start].to_string()));
            }
            parts.push(TemplatePart::Placeholder(Placeholder::new(
                token.key,
                token.filters,
            )));
            cursor = token.end;
        }
        if cursor < input.len() {
            parts.push(TemplatePart::Literal(input[cursor..].to_string()));
        }
        Self {
            source: input.to_string(),
            parts,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Whether the literal `{ext}` token appears anywhere in the template.
    pub fn mentions_extension(&self) -> bool {
        self.source.contains("{ext}")
    }

    pub fn render(
        &self,
        vars: &HashMap<String, String>,
        segments: &[String],
        joiner: &str,
    ) -> String {
        let mut output = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                TemplatePart::Literal(text) => output.push_str(text),
                TemplatePart::Placeholder(placeholder) => {
                    output.push_str(&placeholder.resolve(vars, segments, joiner))
                }
            }
        }
        output
    }
}

pub fn render_template(
    template: &str,
    vars: &HashMap<String, String>,
    segments: &[String],
    joiner: &str,
) -> String {
    Template::parse(template).render(vars, segments, joiner)
}

struct RawToken<'a> {
    start: usize,
    end: usize,
    key: &'a str,
    filters: Option<&'a str>,
}

/// Finds the leftmost `{key}` or `{key|filters}` at or after `from`. The key
/// runs up to the first `|` or `}` and must be non-empty; a filter chain must
/// be non-empty and is closed by the next `}`.
fn next_placeholder(input: &str, from: usize) -> Option<RawToken<'_>> {
    let mut search = from;
    while let Some(offset) = input[search..].find('{') {
        let start = search + offset;
        if let Some(token) = placeholder_at(input, start) {
            return Some(token);
        }
        search = start + 1;
    }
    None
}

fn placeholder_at(input: &str, start: usize) -> Option<RawToken<'_>> {
    let key_start = start + 1;
    let key_len = input[key_start..].find(['|', '}'])?;
    if key_len == 0 {
        return None;
    }
    let key_end = key_start + key_len;
    let key = &input[key_start..key_end];
    if input[key_end..].starts_with('}') {
        return Some(RawToken {
            start,
            end: key_end + 1,
            key,
            filters: None,
        });
    }

    let filters_start = key_end + 1;
    let filters_len = input[filters_start..].find('}')?;
    if filters_len == 0 {
        return None;
    }
    let filters_end = filters_start + filters_len;
    Some(RawToken {
        start,
        end: filters_end + 1,
        key,
        filters: Some(&input[filters_start..filters_end]),
    })
}

fn parse_int(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}

fn is_all_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|ch| ch.is_ascii_digit())
}

/// Left-pads with zeros to `width` characters, keeping a leading sign in
/// front of the padding.
pub(crate) fn zero_pad(value: &str, width: usize) -> String {
    let (sign, digits) = match value.strip_prefix(['-', '+']) {
        Some(rest) => (&value[..1], rest),
        None => ("", value),
    };
    let current = sign.len() + digits.chars().count();
    if current >= width {
        return value.to_string();
    }
    format!("{sign}{}{digits}", "0".repeat(width - current))
}

fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_cased = false;
    for ch in value.chars() {
        // Uncased letters such as CJK ideographs end a word like punctuation does.
        if ch.is_uppercase() || ch.is_lowercase() {
            if prev_cased {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(ch);
            prev_cased = false;
        }
    }
    out
}
