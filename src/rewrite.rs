//! Import path rewriting for compiled output.
//!
//! Sibling packages are emitted as `<outDir>/<name>/...`, so the bundler links
//! them with relative specifiers such as `import "../chunks/x.js"`. Once each
//! directory becomes its own package those specifiers must point at the
//! package instead: `import "@scope/chunks/x.js"`.
//!
//! Matching is lexical. The patterns also fire inside string literals and
//! comments, and a specifier without a slash after the segment
//! (`"../chunks"`) is never rewritten. Running a rewrite twice over the same
//! code is not supported: once the prefix is inserted the `../` is gone, but
//! a prefix that itself starts with `../` would be rewritten again.

use std::convert::Infallible;
use std::sync::LazyLock;

use anyhow::Result;
use regex::{Captures, Regex};

static IMPORT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(import\s)(["'])\.\./([^/"'\r\n]+)/"#).unwrap());

static FROM_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(from\s)(["'])\.\./([^/"'\r\n]+)/"#).unwrap());

/// Rewrite side-effect imports: `import "../<segment>/rest"`.
pub fn replace_import_code<F>(code: &str, is_external: F, prefix: &str) -> String
where
    F: Fn(&str) -> bool,
{
    let Ok(code) = replace_with(
        &IMPORT_PATTERN,
        code,
        |s| Ok::<_, Infallible>(is_external(s)),
        prefix,
    );
    code
}

/// Rewrite binding imports and re-exports: `from "../<segment>/rest"`.
pub fn replace_import_from_code<F>(code: &str, is_external: F, prefix: &str) -> String
where
    F: Fn(&str) -> bool,
{
    let Ok(code) = replace_with(
        &FROM_PATTERN,
        code,
        |s| Ok::<_, Infallible>(is_external(s)),
        prefix,
    );
    code
}

/// Like [`replace_import_code`], but the predicate may abort the rewrite.
pub fn try_replace_import_code<F>(code: &str, is_external: F, prefix: &str) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    replace_with(&IMPORT_PATTERN, code, is_external, prefix)
}

/// Like [`replace_import_from_code`], but the predicate may abort the rewrite.
pub fn try_replace_import_from_code<F>(code: &str, is_external: F, prefix: &str) -> Result<String>
where
    F: FnMut(&str) -> Result<bool>,
{
    replace_with(&FROM_PATTERN, code, is_external, prefix)
}

fn replace_with<F, E>(
    pattern: &Regex,
    code: &str,
    mut is_external: F,
    prefix: &str,
) -> Result<String, E>
where
    F: FnMut(&str) -> Result<bool, E>,
{
    let mut out = String::with_capacity(code.len());
    let mut last = 0;

    for caps in pattern.captures_iter(code) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        out.push_str(&code[last..whole.start()]);
        let segment = &caps[3];
        // `../../x/` climbs further than a sibling package
        if segment != ".." && segment != "." && is_external(segment)? {
            out.push_str(&rewritten(&caps, prefix));
        } else {
            out.push_str(whole.as_str());
        }
        last = whole.end();
    }

    out.push_str(&code[last..]);
    Ok(out)
}

fn rewritten(caps: &Captures<'_>, prefix: &str) -> String {
    format!("{}{}{}{}/", &caps[1], &caps[2], prefix, &caps[3])
}

/// Matches import identifiers against a list of known package names.
///
/// An identifier matches `name` when it equals `name` or starts with
/// `name + "/"`. The first matching name in list order wins.
#[derive(Debug, Clone, Default)]
pub struct ExternalMatcher {
    names: Vec<String>,
}

impl ExternalMatcher {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Return the package name `id` refers to, if any.
    pub fn matches(&self, id: &str) -> Option<&str> {
        self.names
            .iter()
            .find(|name| match id.strip_prefix(name.as_str()) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            })
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;

    fn is_chunks(x: &str) -> bool {
        x == "chunks"
    }

    #[test]
    fn test_replace_import_code() {
        assert_eq!(
            replace_import_code(r#"import "../util/index.js""#, is_chunks, "@prefix/"),
            r#"import "../util/index.js""#
        );
        assert_eq!(
            replace_import_code(r#"import "../chunks/index.js""#, is_chunks, "@prefix/"),
            r#"import "@prefix/chunks/index.js""#
        );
        assert_eq!(
            replace_import_code(r#"import '../chunks/index.js'"#, is_chunks, "@prefix/"),
            r#"import '@prefix/chunks/index.js'"#
        );
    }

    #[test]
    fn test_bare_directory_import_is_not_rewritten() {
        assert_eq!(
            replace_import_code(r#"import "../chunks""#, is_chunks, "@prefix/"),
            r#"import "../chunks""#
        );
        assert_eq!(
            replace_import_from_code(r#"import x from "../chunks""#, |_| true, "@prefix"),
            r#"import x from "../chunks""#
        );
    }

    #[test]
    fn test_predicate_false_leaves_code_unchanged() {
        let code = r#"import "../chunks/index.js"; import a from "../chunks/a.js";"#;
        assert_eq!(replace_import_code(code, |_| false, "@prefix/"), code);
        assert_eq!(replace_import_from_code(code, |_| false, "@prefix/"), code);
    }

    #[test]
    fn test_replace_import_from_code() {
        assert_eq!(
            replace_import_from_code(r#"import x from "../util/index.js""#, is_chunks, "@prefix/"),
            r#"import x from "../util/index.js""#
        );
        assert_eq!(
            replace_import_from_code(
                r#"import x from "../chunks/index.js""#,
                is_chunks,
                "@prefix/"
            ),
            r#"import x from "@prefix/chunks/index.js""#
        );
        assert_eq!(
            replace_import_from_code(r#"export { a } from '../chunks/a.js';"#, is_chunks, ""),
            r#"export { a } from 'chunks/a.js';"#
        );
    }

    #[test]
    fn test_segment_stops_at_next_slash() {
        let mut seen = Vec::new();
        let out = try_replace_import_from_code(
            r#"import { b } from "../chunks/nested/b.js";"#,
            |segment| {
                seen.push(segment.to_string());
                Ok(true)
            },
            "@p/",
        )
        .unwrap();
        assert_eq!(seen, vec!["chunks"]);
        assert_eq!(out, r#"import { b } from "@p/chunks/nested/b.js";"#);
    }

    #[test]
    fn test_rewrites_every_match_on_multiple_lines() {
        let code = "import { a } from \"../chunks/a.js\";\nimport \"../style/x.js\";\nimport { b } from \"../b/index.js\";\n";
        let import_pass = replace_import_code(code, |_| true, "@s/");
        let out = replace_import_from_code(&import_pass, |s| s != "b", "@s/");
        assert_eq!(
            out,
            "import { a } from \"@s/chunks/a.js\";\nimport \"@s/style/x.js\";\nimport { b } from \"../b/index.js\";\n"
        );
    }

    #[test]
    fn test_deeper_relative_paths_are_not_candidates() {
        let code = r#"import "../../chunks/a.js"; import x from "./chunks/a.js";"#;
        assert_eq!(replace_import_code(code, |_| true, "@p/"), code);
        assert_eq!(replace_import_from_code(code, |_| true, "@p/"), code);
    }

    #[test]
    fn test_matches_inside_string_literals() {
        // Lexical matching rewrites text that only looks like an import.
        let code = r#"const s = 'import "../chunks/a.js"';"#;
        assert_eq!(
            replace_import_code(code, is_chunks, "@p/"),
            r#"const s = 'import "@p/chunks/a.js"';"#
        );
    }

    #[test]
    fn test_rewriting_twice_is_not_idempotent() {
        // A prefix that is itself relative gets rewritten again on a second pass.
        let once = replace_import_code(r#"import "../chunks/a.js""#, |_| true, "../");
        assert_eq!(once, r#"import "../chunks/a.js""#);
        let twice = replace_import_code(&once, |_| true, "../");
        assert_eq!(twice, once);

        let once = replace_import_code(r#"import "../chunks/a.js""#, |_| true, "../pkg-");
        let twice = replace_import_code(&once, |_| true, "../pkg-");
        assert_eq!(once, r#"import "../pkg-chunks/a.js""#);
        assert_ne!(twice, once);
        assert_eq!(twice, r#"import "../pkg-pkg-chunks/a.js""#);
    }

    #[test]
    fn test_failing_predicate_aborts() {
        let result = try_replace_import_code(
            r#"import "../missing/a.js""#,
            |segment| Err(BuildError::UnregisteredModule(segment.to_string()).into()),
            "@p/",
        );
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BuildError>(),
            Some(&BuildError::UnregisteredModule("missing".to_string()))
        );
    }

    #[test]
    fn test_external_matcher() {
        let matcher = ExternalMatcher::new(["react", "@scope/ui", "lodash"]);

        assert_eq!(matcher.matches("react"), Some("react"));
        assert_eq!(matcher.matches("react/jsx-runtime"), Some("react"));
        assert_eq!(matcher.matches("@scope/ui/button"), Some("@scope/ui"));
        assert_eq!(matcher.matches("react-dom"), None);
        assert_eq!(matcher.matches("./local.js"), None);
    }

    #[test]
    fn test_external_matcher_first_match_wins() {
        let matcher = ExternalMatcher::new(["@scope/ui", "@scope/ui/button"]);
        assert_eq!(matcher.matches("@scope/ui/button"), Some("@scope/ui"));
    }
}
