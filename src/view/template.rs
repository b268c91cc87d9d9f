//! Template body parser.
//!
//! A template is literal text interleaved with three kinds of tags:
//!
//! | Tag                       | Meaning                                         |
//! |---------------------------|-------------------------------------------------|
//! | `{{ name }}`              | view bag value, HTML-escaped                    |
//! | `{{ user.name \| raw }}`  | view bag value, written verbatim                |
//! | `{% inherits "path" %}`   | make this view inherit from a master view       |
//! | `{% block name %}`        | start capturing the content block `name`        |
//! | `{% endblock %}`          | stop capturing                                  |
//! | `{% declare name %}`      | placeholder for a block supplied by a child     |
//! | `{% include "path" %}`    | write another view's composed output here       |
//! | `{# comment #}`           | ignored                                         |
//!
//! Parsing only checks tag syntax. Block pairing is enforced while the template
//! executes, by the view's capture stack.

use std::path::Path;

use crate::error::{Error, Result};

/// One parsed piece of a template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Text(String),
    Value { path: String, raw: bool },
    Inherits(String),
    Block(String),
    EndBlock,
    Declare(String),
    Include(String),
}

/// Parse a template body into its nodes.
///
/// `path` is only used to label syntax errors.
pub(crate) fn parse(source: &str, path: &Path) -> Result<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut rest = source;
    let mut line = 1;

    while let Some(start) = find_tag(rest) {
        let (text, tail) = rest.split_at(start);
        if !text.is_empty() {
            nodes.push(Node::Text(text.to_owned()));
        }
        line += text.matches('\n').count();

        let close = match &tail[..2] {
            "{{" => "}}",
            "{%" => "%}",
            _ => "#}",
        };
        let Some(len) = tail[2..].find(close) else {
            return Err(syntax(path, line, format!("`{}` is never closed", &tail[..2])));
        };
        let inner = tail[2..2 + len].trim();

        match close {
            "}}" => nodes.push(value(inner, path, line)?),
            "%}" => nodes.push(directive(inner, path, line)?),
            _ => {}
        }

        let consumed = 2 + len + 2;
        line += tail[..consumed].matches('\n').count();
        rest = &tail[consumed..];
    }

    if !rest.is_empty() {
        nodes.push(Node::Text(rest.to_owned()));
    }

    Ok(nodes)
}

// Byte offset of the next `{{`, `{%` or `{#`.
fn find_tag(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    s.match_indices('{')
        .map(|(i, _)| i)
        .find(|&i| matches!(bytes.get(i + 1), Some(b'{' | b'%' | b'#')))
}

fn value(inner: &str, path: &Path, line: usize) -> Result<Node> {
    let (name, filter) = match inner.split_once('|') {
        Some((name, filter)) => (name.trim(), Some(filter.trim())),
        None => (inner, None),
    };

    if !is_value_path(name) {
        return Err(syntax(path, line, format!("`{name}` is not a valid variable name")));
    }

    let raw = match filter {
        None => false,
        Some("raw") => true,
        Some(other) => return Err(syntax(path, line, format!("unknown filter `{other}`"))),
    };

    Ok(Node::Value {
        path: name.to_owned(),
        raw,
    })
}

fn directive(inner: &str, path: &Path, line: usize) -> Result<Node> {
    let (keyword, argument) = match inner.split_once(char::is_whitespace) {
        Some((keyword, argument)) => (keyword, argument.trim()),
        None => (inner, ""),
    };

    match keyword {
        "inherits" => Ok(Node::Inherits(quoted(argument, path, line)?)),
        "include" => Ok(Node::Include(quoted(argument, path, line)?)),
        "block" => Ok(Node::Block(block_name(argument, path, line)?)),
        "declare" => Ok(Node::Declare(block_name(argument, path, line)?)),
        "endblock" if argument.is_empty() => Ok(Node::EndBlock),
        "endblock" => Err(syntax(path, line, "`endblock` takes no argument")),
        "" => Err(syntax(path, line, "empty directive")),
        other => Err(syntax(path, line, format!("unknown directive `{other}`"))),
    }
}

// A `"double"` or `'single'` quoted, non-empty string.
fn quoted(argument: &str, path: &Path, line: usize) -> Result<String> {
    let unquoted = argument
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| argument.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));

    match unquoted {
        Some(s) if !s.is_empty() => Ok(s.to_owned()),
        _ => Err(syntax(path, line, format!("expected a quoted path, found `{argument}`"))),
    }
}

fn block_name(argument: &str, path: &Path, line: usize) -> Result<String> {
    let name = quoted(argument, path, line).unwrap_or_else(|_| argument.to_owned());
    if name.is_empty() || name.contains(char::is_whitespace) || name.contains('}') {
        return Err(syntax(path, line, format!("`{argument}` is not a valid block name")));
    }
    Ok(name)
}

fn is_value_path(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        })
}

fn syntax(path: &Path, line: usize, message: impl Into<String>) -> Error {
    Error::TemplateSyntax {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Vec<Node> {
        parse(source, Path::new("test.html")).unwrap()
    }

    fn syntax_line(source: &str) -> usize {
        match parse(source, Path::new("test.html")) {
            Err(Error::TemplateSyntax { line, .. }) => line,
            other => panic!("expected a syntax error, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_is_one_node() {
        assert_eq!(parse_ok("hello"), vec![Node::Text("hello".into())]);
        assert!(parse_ok("").is_empty());
    }

    #[test]
    fn values_and_raw_filter() {
        assert_eq!(
            parse_ok("Hi {{ user.name }}! {{ body | raw }}"),
            vec![
                Node::Text("Hi ".into()),
                Node::Value { path: "user.name".into(), raw: false },
                Node::Text("! ".into()),
                Node::Value { path: "body".into(), raw: true },
            ]
        );
    }

    #[test]
    fn directives() {
        let nodes = parse_ok(
            r#"{% inherits "~/layout.html" %}{% block title %}T{% endblock %}{% declare 'footer' %}{% include '~/nav.html' %}"#,
        );
        assert_eq!(
            nodes,
            vec![
                Node::Inherits("~/layout.html".into()),
                Node::Block("title".into()),
                Node::Text("T".into()),
                Node::EndBlock,
                Node::Declare("footer".into()),
                Node::Include("~/nav.html".into()),
            ]
        );
    }

    #[test]
    fn comments_produce_nothing() {
        assert_eq!(parse_ok("a{# note #}b"), vec![Node::Text("a".into()), Node::Text("b".into())]);
    }

    #[test]
    fn lone_braces_and_placeholders_are_text() {
        let source = "fn() { x } ${FastTrack.ContentBlock:X}";
        assert_eq!(parse_ok(source), vec![Node::Text(source.into())]);
    }

    #[test]
    fn unclosed_tag_reports_its_line() {
        assert_eq!(syntax_line("one\ntwo\n{{ three"), 3);
    }

    #[test]
    fn line_counting_spans_multiline_tags() {
        assert_eq!(syntax_line("{#\n\n#}\n{% bogus %}"), 4);
    }

    #[test]
    fn rejects_bad_tags() {
        assert_eq!(syntax_line("{{ }}"), 1);
        assert_eq!(syntax_line("{{ a b }}"), 1);
        assert_eq!(syntax_line("{{ a | upper }}"), 1);
        assert_eq!(syntax_line("{% inherits layout.html %}"), 1);
        assert_eq!(syntax_line("{% endblock x %}"), 1);
        assert_eq!(syntax_line("{% %}"), 1);
    }
}
