//! Dependency directives declared in a source file's comment header.
//!
//! ```text
//! //= require jquery
//! //= require_tree ./widgets
//! /*
//!  *= require reset
//!  */
//! ```
//!
//! Only the leading comment block is scanned. Directive lines are replaced
//! by blank lines so line numbers in the output still match the source.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::context::Context;
use crate::error::Error;
use crate::search::{clean_path, entries, stat};

use super::Processor;

/// Leading run of `//`, `#` and `/* */` comments, with whitespace between.
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:\s*(?:(?://[^\n]*\n?)+|(?:#[^\n]*\n?)+|/\*(?s:.*?)\*/))+")
        .expect("header pattern is valid")
});

/// `= name args`, optionally closing a block comment.
static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\W*=\s*(\w+.*?)(\*/)?$").expect("directive pattern is valid")
});

/// Directive names; other `= word` comment lines are left in the source.
const DIRECTIVES: &[&str] = &[
    "require",
    "require_self",
    "require_directory",
    "require_tree",
    "depend_on",
    "depend_on_asset",
    "stub",
];

/// Runs `require`, `depend_on` and friends found in the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveProcessor;

impl Processor for DirectiveProcessor {
    fn name(&self) -> &str {
        "directive"
    }

    fn render(&self, context: &mut Context<'_>, data: String) -> anyhow::Result<String> {
        let parsed = ParsedSource::parse(&data);
        for directive in &parsed.directives {
            run_directive(context, directive)?;
        }
        Ok(parsed.source)
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Directive {
    /// 1-based line in the original source
    line: usize,
    name: String,
    args: Vec<String>,
}

#[derive(Debug)]
struct ParsedSource {
    directives: Vec<Directive>,
    /// Header with directive lines blanked, followed by the body.
    source: String,
}

impl ParsedSource {
    fn parse(data: &str) -> Self {
        let header_len = HEADER.find(data).map_or(0, |m| m.end());
        let (header, body) = data.split_at(header_len);

        let mut directives = Vec::new();
        let mut source = String::with_capacity(data.len() + 1);

        for (index, line) in header.split_inclusive('\n').enumerate() {
            let text = line.trim_end_matches(['\n', '\r']);
            let words = DIRECTIVE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|content| shell_words(content.as_str()))
                .unwrap_or_default();

            match words.split_first() {
                Some((name, args)) if DIRECTIVES.contains(&name.as_str()) => {
                    directives.push(Directive {
                        line: index + 1,
                        name: name.clone(),
                        args: args.to_vec(),
                    });
                    if line.ends_with('\n') {
                        source.push('\n');
                    }
                }
                _ => source.push_str(line),
            }
        }

        source.push_str(body);
        if !source.is_empty() && !source.ends_with('\n') {
            source.push('\n');
        }

        Self { directives, source }
    }
}

/// Split directive arguments on whitespace, honoring single and double quotes.
fn shell_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

// ============================================================================
// Execution
// ============================================================================

fn run_directive(context: &mut Context<'_>, directive: &Directive) -> anyhow::Result<()> {
    let pathname = context.pathname().to_path_buf();
    let fail = |message: String| Error::Directive {
        path: pathname.clone(),
        line: directive.line,
        message,
    };

    let single_arg = || match directive.args.as_slice() {
        [arg] => Ok(arg.as_str()),
        _ => Err(fail(format!(
            "`{}` expects exactly one argument",
            directive.name
        ))),
    };

    match directive.name.as_str() {
        "require" => context.require_asset(single_arg()?)?,
        "require_self" => {
            if context.required_paths().contains(&pathname) {
                return Err(fail("`require_self` can only be used once".into()).into());
            }
            context.require_asset(&pathname)?;
        }
        "require_directory" => {
            let dir = relative_directory(context, single_arg()?).map_err(fail)?;
            require_directory(context, &dir)?;
        }
        "require_tree" => {
            let dir = relative_directory(context, single_arg()?).map_err(fail)?;
            require_tree(context, &dir)?;
        }
        "depend_on" => context.depend_on(single_arg()?)?,
        "depend_on_asset" => context.depend_on_asset(single_arg()?)?,
        "stub" => context.stub_asset(single_arg()?)?,
        other => return Err(fail(format!("unknown directive `{other}`")).into()),
    }

    Ok(())
}

/// Resolve a `./dir` argument against the requesting file's directory.
fn relative_directory(context: &Context<'_>, arg: &str) -> Result<PathBuf, String> {
    if !crate::search::is_relative(arg) && arg != "." {
        return Err(format!("`{arg}` must be a relative path"));
    }
    let base = context.pathname().parent().unwrap_or(Path::new(""));
    let dir = clean_path(&base.join(arg));
    if stat(&dir).is_some_and(|s| s.is_dir()) {
        Ok(dir)
    } else {
        Err(format!("`{arg}` is not a directory"))
    }
}

fn require_directory(context: &mut Context<'_>, dir: &Path) -> crate::Result<()> {
    context.depend_on_asset(dir)?;

    for name in entries(dir) {
        let path = dir.join(name);
        if path == context.pathname() {
            continue;
        }
        if context.is_asset_requirable(&path) {
            context.require_asset(&path)?;
        }
    }
    Ok(())
}

fn require_tree(context: &mut Context<'_>, dir: &Path) -> crate::Result<()> {
    context.depend_on_asset(dir)?;

    for name in entries(dir) {
        let path = dir.join(name);
        if path == context.pathname() {
            continue;
        }
        if stat(&path).is_some_and(|s| s.is_dir()) {
            require_tree(context, &path)?;
        } else if context.is_asset_requirable(&path) {
            context.require_asset(&path)?;
        }
    }
    Ok(())
}
