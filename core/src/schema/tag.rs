//! Field tag mini-language.
//!
//! `name,key:value,flag,key:'quoted, value'`
//!
//! The first token is the column name unless it contains `:`. Options are
//! `key` or `key:value`; `join` may repeat and accumulates.

use compact_str::CompactString;
use smallvec::SmallVec;

/// Parsed tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub name: CompactString,
    options: SmallVec<[(CompactString, CompactString); 4]>,
}

/// Relation kinds accepted by `rel:`.
pub(crate) const REL_KINDS: [&str; 3] = ["has-one", "belongs-to", "has-many"];

impl Tag {
    /// Parses and validates a tag string. The error is a human readable
    /// reason, wrapped by the caller into a `ConfigError`.
    pub fn parse(input: &str) -> Result<Tag, String> {
        let mut tag = Tag::default();
        for (i, token) in split_tokens(input)?.into_iter().enumerate() {
            let token = token.trim();
            if i == 0 && !token.contains(':') {
                tag.name = CompactString::from(token);
                continue;
            }
            if token.is_empty() {
                continue;
            }
            let (key, value) = match token.split_once(':') {
                Some((k, v)) => (k.trim(), unquote(v.trim())),
                None => (token, ""),
            };
            if key.is_empty() {
                return Err(format!("option {token:?} has no name"));
            }
            validate(key, value)?;
            tag.options
                .push((CompactString::from(key), CompactString::from(value)));
        }
        Ok(tag)
    }

    /// `true` if the option is present, with or without a value.
    pub fn has(&self, key: &str) -> bool {
        self.options.iter().any(|(k, _)| k == key)
    }

    /// Value of the first occurrence of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Values of every occurrence of `key`, in order.
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.options
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `join:<base>=<join>` pairs in declaration order.
    pub fn joins(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.get_all("join").filter_map(|v| v.split_once('='))
    }

    /// `true` for the `-` tag, which excludes the field.
    #[inline]
    pub fn is_ignored(&self) -> bool {
        self.name == "-"
    }
}

fn split_tokens(input: &str) -> Result<Vec<&str>, String> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in input.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            ',' if !quoted => {
                tokens.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if quoted {
        return Err("unterminated quote".to_owned());
    }
    tokens.push(&input[start..]);
    Ok(tokens)
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
        .unwrap_or(value)
}

fn validate(key: &str, value: &str) -> Result<(), String> {
    match key {
        "join" => match value.split_once('=') {
            Some((base, join)) if !base.trim().is_empty() && !join.trim().is_empty() => Ok(()),
            _ => Err(format!("join:{value} must be join:<base>=<join>")),
        },
        "rel" if !REL_KINDS.contains(&value) => Err(format!(
            "unknown relation kind {value:?} (expected has-one, belongs-to or has-many)"
        )),
        "embed" | "alt" | "m2m" | "table" | "alias" if value.is_empty() => {
            Err(format!("{key} needs an argument"))
        }
        _ => Ok(()),
    }
}
