//! Path pattern compilation.
//!
//! Route paths are plain strings with bracketed placeholders:
//!
//! | Placeholder | Matches |
//! |---|---|
//! | `[i:id]` | integer |
//! | `[a:code]` | alphanumeric |
//! | `[h:hash]` | hexadecimal |
//! | `[s:slug]` | URL slug (alphanumeric and `-`) |
//! | `[*:rest]` | anything, lazily |
//! | `[**:rest]` | anything, greedily |
//! | `[:name]` | one segment: no `/`, no `.` |
//!
//! The name is optional (`[i]` matches without capturing a parameter). Any
//! other type text is used as a raw regex fragment. All built-in types except
//! `*` are possessive: once a run of their characters is matched it is never
//! shortened, so `/[s:slug]-[i:id]` does not match `/foo-12` (the slug takes
//! `foo-12` whole). A trailing `?` makes the
//! placeholder optional together with a `/` or `.` directly in front of it.
//! Everything outside placeholders matches literally.
//!
//! Two paths bypass the placeholder syntax: `*` matches every path, and a
//! path starting with `@` is a raw regular expression (unanchored, so anchor
//! it yourself).

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::params::Params;
use crate::error::{Error, Result};

/// `(/|.|)` separator, `[type:name]` block, optional `?`.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/|\.|)\[([^:\]]*)(?::([^:\]]*))?\](\?|)").expect("placeholder pattern compiles")
});

fn match_type(ty: &str) -> &str {
    match ty {
        "i" => "[0-9]+",
        "a" => "[0-9A-Za-z]+",
        "h" => "[0-9A-Fa-f]+",
        "s" => r"[0-9A-Za-z\-]+",
        "*" => ".+?",
        "**" => ".+",
        "" => r"[^/\.]+",
        custom => custom,
    }
}

/// Character class of a possessive placeholder type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Class {
    Integer,
    Alphanumeric,
    Hex,
    Slug,
    Segment,
    Rest,
}

impl Class {
    fn of(ty: &str) -> Option<Self> {
        Some(match ty {
            "i" => Self::Integer,
            "a" => Self::Alphanumeric,
            "h" => Self::Hex,
            "s" => Self::Slug,
            "" => Self::Segment,
            "**" => Self::Rest,
            _ => return None,
        })
    }

    fn contains(self, c: char) -> bool {
        match self {
            Self::Integer => c.is_ascii_digit(),
            Self::Alphanumeric => c.is_ascii_alphanumeric(),
            Self::Hex => c.is_ascii_hexdigit(),
            Self::Slug => c.is_ascii_alphanumeric() || c == '-',
            Self::Segment => c != '/' && c != '.',
            Self::Rest => c != '\n',
        }
    }

    /// `true` if a run of this class ending at `end` could not have been
    /// extended.
    fn ends_run(self, url: &str, end: usize) -> bool {
        url[end..].chars().next().is_none_or(|c| !self.contains(c))
    }
}

/// A placeholder path translated to a regular expression.
#[derive(Debug)]
pub(crate) struct Compiled {
    pub(crate) source: String,
    /// Capture group index of every possessive placeholder.
    pub(crate) possessive: Vec<(usize, Class)>,
}

/// Translates a placeholder path into an anchored regular expression.
pub(crate) fn compile_path(path: &str) -> Result<Compiled> {
    let mut out = String::with_capacity(path.len() * 2);
    let mut possessive = Vec::new();
    let mut group = 1;
    out.push('^');

    let mut literal_start = 0;
    for caps in PLACEHOLDER.captures_iter(path) {
        let Some(block) = caps.get(0) else { continue };
        let text = |i: usize| caps.get(i).map_or("", |m| m.as_str());

        out.push_str(&regex::escape(&path[literal_start..block.start()]));
        literal_start = block.end();

        let pre = match text(1) {
            "." => r"\.",
            other => other,
        };
        let ty = text(2);
        let name = text(3);
        let optional = if text(4).is_empty() { "" } else { "?" };

        out.push_str("(?:");
        out.push_str(pre);
        out.push('(');
        if !name.is_empty() {
            let _ = write!(out, "?P<{name}>");
        }
        out.push_str(match_type(ty));
        out.push(')');
        out.push_str(optional);
        out.push(')');
        out.push_str(optional);

        match Class::of(ty) {
            Some(class) => possessive.push((group, class)),
            // Groups inside a custom fragment shift the indices after it.
            None if ty != "*" => group += build(path, ty)?.captures_len() - 1,
            None => {}
        }
        group += 1;
    }

    out.push_str(&regex::escape(&path[literal_start..]));
    out.push('$');
    Ok(Compiled { source: out, possessive })
}

/// How one route decides whether a request path is its own.
#[derive(Debug)]
pub(crate) enum Matcher {
    /// `*`
    Any,
    /// `@…`, used verbatim.
    Raw(Regex),
    /// No placeholders: plain string equality.
    Literal(String),
    /// Placeholders, with the literal text before the first one kept for a
    /// cheap rejection before running the regex.
    Pattern {
        prefix: String,
        slash_before: bool,
        regex: Regex,
        possessive: Vec<(usize, Class)>,
    },
}

impl Matcher {
    pub(crate) fn compile(path: &str) -> Result<Self> {
        if path == "*" {
            return Ok(Self::Any);
        }

        if let Some(raw) = path.strip_prefix('@') {
            return build(path, raw).map(Self::Raw);
        }

        let Some(position) = path.find('[') else {
            return Ok(Self::Literal(path.to_owned()));
        };

        let compiled = compile_path(path)?;
        Ok(Self::Pattern {
            prefix: path[..position].to_owned(),
            slash_before: path[..position].ends_with('/'),
            regex: build(path, &compiled.source)?,
            possessive: compiled.possessive,
        })
    }

    /// Parameters of a successful match. `last_char` is the final byte of
    /// `url`, computed once per dispatch.
    pub(crate) fn captures(&self, url: &str, last_char: Option<u8>) -> Option<Params> {
        match self {
            Self::Any => Some(Params::new()),
            Self::Literal(path) => (url == path).then(Params::new),
            Self::Raw(regex) => regex.captures(url).map(|caps| named_captures(regex, &caps)),
            Self::Pattern { prefix, slash_before, regex, possessive } => {
                // A mismatching literal prefix can only still match when the
                // slash in front of an optional placeholder is absent.
                if !url.starts_with(prefix.as_str()) && (last_char == Some(b'/') || !slash_before) {
                    return None;
                }
                let caps = regex.captures(url)?;
                let maximal = possessive
                    .iter()
                    .all(|&(group, class)| caps.get(group).is_none_or(|m| class.ends_run(url, m.end())));
                maximal.then(|| named_captures(regex, &caps))
            }
        }
    }
}

fn build(pattern: &str, source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|source| Error::InvalidPattern { pattern: pattern.to_owned(), source })
}

fn named_captures(regex: &Regex, caps: &Captures<'_>) -> Params {
    let mut params = Params::new();
    for name in regex.capture_names().flatten() {
        if let Some(value) = caps.name(name) {
            params.insert(name, value.as_str());
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn matches(path: &str, url: &str) -> Option<Params> {
        let matcher = Matcher::compile(path).expect("pattern compiles");
        matcher.captures(url, url.as_bytes().last().copied())
    }

    fn source(path: &str) -> String {
        compile_path(path).expect("pattern compiles").source
    }

    #[test]
    fn compiles_typed_placeholders() {
        assert_eq!(source("/users/[i:id][/]?"), r"^/users(?:/(?P<id>[0-9]+))(?:(/)?)?$");
        assert_eq!(source("/files/[:name].[a:ext]?"), r"^/files(?:/(?P<name>[^/\.]+))(?:\.(?P<ext>[0-9A-Za-z]+)?)?$");
    }

    #[test]
    fn literal_text_is_escaped() {
        assert_eq!(source("/v1.0/[i]"), r"^/v1\.0(?:/([0-9]+))$");
    }

    #[rstest]
    #[case("/users/[i:id][/]?", "/users/42", Some(vec![("id", "42")]))]
    #[case("/users/[i:id][/]?", "/users/42/", Some(vec![("id", "42")]))]
    #[case("/users/[i:id][/]?", "/users/abc", None)]
    #[case("/users/[i:id][/]?", "/users/", None)]
    #[case("/posts/[i:id]?[/]?", "/posts", Some(vec![]))]
    #[case("/posts/[i:id]?[/]?", "/posts/7", Some(vec![("id", "7")]))]
    #[case("/hex/[h:color][/]?", "/hex/fF09", Some(vec![("color", "fF09")]))]
    #[case("/hex/[h:color][/]?", "/hex/fg", None)]
    #[case("/blog/[s:slug][/]?", "/blog/hello-world", Some(vec![("slug", "hello-world")]))]
    #[case("/code/[a:code][/]?", "/code/ab-1", None)]
    #[case("/assets/[**:rest]", "/assets/css/site.css", Some(vec![("rest", "css/site.css")]))]
    #[case("/tail/[*:rest]", "/tail/a/b", Some(vec![("rest", "a/b")]))]
    #[case("/[:section]/[:page][/]?", "/docs/intro", Some(vec![("section", "docs"), ("page", "intro")]))]
    #[case("/[:file][/]?", "/report.pdf", None)]
    #[case("/y/[:year]/[\\d{2}:month][/]?", "/y/2024/07", Some(vec![("year", "2024"), ("month", "07")]))]
    fn placeholder_matching(#[case] path: &str, #[case] url: &str, #[case] expected: Option<Vec<(&str, &str)>>) {
        let got = matches(path, url);
        let expected = expected.map(|pairs| pairs.into_iter().collect::<Params>());
        assert_eq!(got, expected, "{path} vs {url}");
    }

    #[rstest]
    #[case("/[s:slug]-[i:id]", "/foo-12", None)]
    #[case("/n/[i:a][i:b]", "/n/123", None)]
    #[case("/files/[**:path].[a:ext]", "/files/a/b.txt", None)]
    #[case("/[i:id]-[s:slug]", "/12-foo", Some(vec![("id", "12"), ("slug", "foo")]))]
    #[case("/files/[:name].[a:ext]", "/files/report.pdf", Some(vec![("name", "report"), ("ext", "pdf")]))]
    #[case("/tail/[*:head]/[i:n]", "/tail/a/b/3", Some(vec![("head", "a/b"), ("n", "3")]))]
    #[case("/c/[(\\d)(\\d):pair]/[i:n]", "/c/12/345", Some(vec![("pair", "12"), ("n", "345")]))]
    fn builtin_types_match_possessively(
        #[case] path: &str,
        #[case] url: &str,
        #[case] expected: Option<Vec<(&str, &str)>>,
    ) {
        let expected = expected.map(|pairs| pairs.into_iter().collect::<Params>());
        assert_eq!(matches(path, url), expected, "{path} vs {url}");
    }

    #[test]
    fn possessive_groups_skip_custom_fragment_groups() {
        let compiled = compile_path("/c/[(\\d)(\\d):pair]/[i:n]").unwrap();
        assert_eq!(compiled.possessive, [(4, Class::Integer)]);
    }

    #[rstest]
    #[case("/about[/]?", "/about", true)]
    #[case("/about[/]?", "/about/", true)]
    #[case("/about[/]?", "/abou", false)]
    #[case("/about[/]?", "/about/me", false)]
    #[case("/a.b[/]?", "/axb", false)]
    #[case("/a.b[/]?", "/a.b", true)]
    #[case("[/]?", "/", true)]
    #[case("[/]?", "", true)]
    #[case("/about", "/about", true)]
    #[case("/about", "/about/", false)]
    fn literal_paths_match_exactly(#[case] path: &str, #[case] url: &str, #[case] hit: bool) {
        assert_eq!(matches(path, url).is_some(), hit, "{path} vs {url}");
    }

    #[test]
    fn wildcard_matches_everything() {
        assert!(matches("*", "/anything/at/all").is_some());
        assert!(matches("*", "").is_some());
    }

    #[test]
    fn raw_regex_is_unanchored_and_captures() {
        let params = matches(r"@^/archive/(?P<year>\d{4})$", "/archive/2023").expect("matches");
        assert_eq!(params.get("year"), Some("2023"));
        assert!(matches(r"@\d{4}", "/x/1999/y").is_some());
        assert!(matches(r"@^/caf\x{e9}$", "/café").is_some());
        assert!(matches(r"@^/Case$", "/case").is_none());
    }

    #[test]
    fn prefix_mismatch_is_rejected_before_the_regex() {
        let matcher = Matcher::compile("/users/[i:id][/]?").unwrap();
        assert!(matcher.captures("/groups/1", Some(b'1')).is_none());
    }

    #[test]
    fn bad_custom_type_is_an_invalid_pattern() {
        let err = Matcher::compile("/x/[(:broken]").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { ref pattern, .. } if pattern == "/x/[(:broken]"));
    }
}
