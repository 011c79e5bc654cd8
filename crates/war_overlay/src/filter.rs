//! Resource filtering.
//!
//! Filtering replaces tokens such as `${app.title}` or `@app.title@` in text
//! resources with property values. The engine behind it is the [`FileFilter`]
//! trait; [`TokenFilter`] is the implementation used by the packaging context.

use crate::error::{Error, Result};
use camino::Utf8Path;
use std::collections::BTreeMap;

/// Extensions that are never filtered, whatever the configuration says.
pub const DEFAULT_NON_FILTERED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "gif", "bmp", "png", "ico", "class", "jar", "war", "ear", "zip", "gz",
];

/// Delimiters used when none are configured or `use_default_delimiters` is set.
pub const DEFAULT_DELIMITERS: &[&str] = &["${*}", "@"];

/// Substitutes tokens in text content.
pub trait FileFilter: Send + Sync {
    fn filter(&self, contents: &str) -> String;
}

/// A token delimiter pair, e.g. `${` / `}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiter {
    pub begin: String,
    pub end: String,
}

impl Delimiter {
    /// Parse a delimiter specification.
    ///
    /// `${*}` means begin `${` and end `}`; a specification without `*`, such
    /// as `@`, uses the same string on both sides.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (begin, end) = match spec.split_once('*') {
            Some((begin, end)) => (begin, end),
            None => (spec, spec),
        };
        if begin.is_empty() || end.is_empty() {
            return Err(Error::InvalidDelimiter(spec.to_string()));
        }
        Ok(Self {
            begin: begin.to_string(),
            end: end.to_string(),
        })
    }
}

/// Property based token substitution.
#[derive(Debug, Clone)]
pub struct TokenFilter {
    delimiters: Vec<Delimiter>,
    properties: BTreeMap<String, String>,
    escape_string: Option<String>,
}

impl TokenFilter {
    pub fn new(delimiters: Vec<Delimiter>, properties: BTreeMap<String, String>) -> Self {
        Self {
            delimiters,
            properties,
            escape_string: None,
        }
    }

    /// Tokens preceded by `escape` are emitted literally, without the escape.
    pub fn with_escape_string(mut self, escape: Option<String>) -> Self {
        self.escape_string = escape.filter(|e| !e.is_empty());
        self
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    fn interpolate(&self, text: &str, depth: usize) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some((start, delimiter)) = self.next_token(rest) {
            let (before, token) = rest.split_at(start);

            if let Some(escape) = self.escape_string.as_deref() {
                if let Some(literal) = before.strip_suffix(escape) {
                    out.push_str(literal);
                    out.push_str(&delimiter.begin);
                    rest = &token[delimiter.begin.len()..];
                    continue;
                }
            }
            out.push_str(before);

            let after_begin = &token[delimiter.begin.len()..];
            let resolved = after_begin.find(&delimiter.end).and_then(|end| {
                let key = &after_begin[..end];
                self.lookup(key, depth)
                    .map(|value| (value, end + delimiter.end.len()))
            });
            match resolved {
                Some((value, consumed)) => {
                    out.push_str(&value);
                    rest = &after_begin[consumed..];
                }
                None => {
                    out.push_str(&delimiter.begin);
                    rest = after_begin;
                }
            }
        }

        out.push_str(rest);
        out
    }

    fn next_token(&self, text: &str) -> Option<(usize, &Delimiter)> {
        self.delimiters
            .iter()
            .filter_map(|d| text.find(&d.begin).map(|pos| (pos, d)))
            .min_by_key(|(pos, _)| *pos)
    }

    fn lookup(&self, key: &str, depth: usize) -> Option<String> {
        if key.is_empty() || key.contains(['\n', '\r']) {
            return None;
        }
        let value = self.properties.get(key)?;
        // Values may reference other properties; stop at a fixed depth on cycles.
        if depth >= 8 {
            return Some(value.clone());
        }
        Some(self.interpolate(value, depth + 1))
    }
}

impl FileFilter for TokenFilter {
    fn filter(&self, contents: &str) -> String {
        self.interpolate(contents, 0)
    }
}

/// Whether `file_name` has one of the `extensions` (case insensitive).
pub fn has_extension(file_name: &str, extensions: &[String]) -> bool {
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    extensions.iter().any(|e| e.eq_ignore_ascii_case(extension))
}

/// Only UTF-8 is supported for filtered resources.
pub fn check_encoding(encoding: Option<&str>) -> Result<()> {
    match encoding.map(|e| e.trim().to_ascii_lowercase()) {
        None => Ok(()),
        Some(e) if e == "utf-8" || e == "utf8" => Ok(()),
        Some(_) => Err(Error::UnsupportedEncoding(
            encoding.unwrap_or_default().to_string(),
        )),
    }
}

/// Read a `.properties` file.
///
/// Supports `key=value`, `key: value` and `key value` entries, `#`/`!`
/// comments and lines continued with a trailing backslash.
pub fn load_properties(path: &Utf8Path) -> Result<BTreeMap<String, String>> {
    let contents = std::fs::read_to_string(path.as_std_path())?;
    Ok(parse_properties(&contents))
}

pub(crate) fn parse_properties(contents: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut pending = String::new();

    for line in contents.lines() {
        let line = line.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }

        match line.strip_suffix('\\') {
            Some(continued) => {
                pending.push_str(continued);
                continue;
            }
            None => pending.push_str(line),
        }

        let entry = std::mem::take(&mut pending);
        let split = entry.find(['=', ':', ' ', '\t']);
        let (key, value) = match split {
            Some(index) => {
                let value = entry[index + 1..].trim_start();
                let value = value
                    .strip_prefix(['=', ':'])
                    .map(str::trim_start)
                    .unwrap_or(value);
                (entry[..index].trim_end(), value)
            }
            None => (entry.as_str(), ""),
        };
        if !key.is_empty() {
            properties.insert(key.to_string(), value.to_string());
        }
    }

    properties
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(properties: &[(&str, &str)]) -> TokenFilter {
        let delimiters = DEFAULT_DELIMITERS
            .iter()
            .map(|d| Delimiter::parse(d).unwrap())
            .collect();
        let properties = properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        TokenFilter::new(delimiters, properties)
    }

    #[test]
    fn test_parse_delimiters() {
        assert_eq!(
            Delimiter::parse("${*}").unwrap(),
            Delimiter {
                begin: "${".to_string(),
                end: "}".to_string()
            }
        );
        assert_eq!(Delimiter::parse("@").unwrap().end, "@");
        assert!(Delimiter::parse("").is_err());
        assert!(Delimiter::parse("*").is_err());
    }

    #[test]
    fn test_substitution() {
        let filter = filter(&[("app.title", "Shop"), ("version", "1.0")]);
        assert_eq!(
            filter.filter("<title>${app.title}</title> v@version@"),
            "<title>Shop</title> v1.0"
        );
    }

    #[test]
    fn test_unknown_tokens_kept() {
        let filter = filter(&[("a", "1")]);
        assert_eq!(filter.filter("${missing} ${a} user@host"), "${missing} 1 user@host");
    }

    #[test]
    fn test_nested_properties() {
        let filter = filter(&[("name", "Shop"), ("title", "${name} online")]);
        assert_eq!(filter.filter("${title}"), "Shop online");
    }

    #[test]
    fn test_cyclic_properties_terminate() {
        let filter = filter(&[("a", "${b}"), ("b", "${a}")]);
        let result = filter.filter("${a}");
        assert!(result.starts_with("${"));
    }

    #[test]
    fn test_escape_string() {
        let filter = filter(&[("a", "1")]).with_escape_string(Some("\\".to_string()));
        assert_eq!(filter.filter("\\${a} ${a}"), "${a} 1");
    }

    #[test]
    fn test_has_extension() {
        let extensions = vec!["png".to_string(), "jpg".to_string()];
        assert!(has_extension("logo.PNG", &extensions));
        assert!(!has_extension("index.jsp", &extensions));
        assert!(!has_extension("README", &extensions));
    }

    #[test]
    fn test_check_encoding() {
        assert!(check_encoding(None).is_ok());
        assert!(check_encoding(Some("UTF-8")).is_ok());
        assert!(matches!(
            check_encoding(Some("ISO-8859-1")),
            Err(Error::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_parse_properties() {
        let properties = parse_properties(
            "# comment\n\
             ! other comment\n\
             a=1\n\
             b : two\n\
             c three\n\
             long = first \\\n\
             \x20   second\n\
             empty\n",
        );
        assert_eq!(properties["a"], "1");
        assert_eq!(properties["b"], "two");
        assert_eq!(properties["c"], "three");
        assert_eq!(properties["long"], "first second");
        assert_eq!(properties["empty"], "");
    }
}
