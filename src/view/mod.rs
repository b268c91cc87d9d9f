//! Views: template execution, content blocks and master/child inheritance.
//!
//! A [`View`] is one template instantiation. Executing its body writes default
//! output into a primary buffer and named content blocks into a block map. A
//! view may inherit from a master view: composing the child composes the master
//! first, then replaces each `${FastTrack.ContentBlock:<name>}` placeholder the
//! master declared with the child's block of the same name.
//!
//! ```text
//!   master.html                      page.html
//!   ┌──────────────────────────┐     ┌────────────────────────────────┐
//!   │ <title>{% declare t %}   │ ◀── │ {% inherits "~/master.html" %} │
//!   │ <body>{% declare b %}    │     │ {% block t %}Home{% endblock %}│
//!   └──────────────────────────┘     │ {% block b %}Hi{% endblock %}  │
//!                                    └────────────────────────────────┘
//! ```
//!
//! Block capture is a small state machine: a view is either idle or capturing
//! exactly one block. Starting a second capture fails with
//! [`Error::NestedCaptureNotAllowed`], ending with none active fails with
//! [`Error::NoCaptureInProgress`].

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::trace;

use crate::config::Paths;
use crate::context::Parameters;
use crate::error::{Error, Result};

mod loader;
mod template;

pub use loader::{FileSystemLoader, MemoryLoader, TemplateLoader};

use template::Node;

/// Longest chain of inherits/includes a view may sit at the end of.
pub const MAX_VIEW_DEPTH: usize = 32;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{FastTrack\.ContentBlock:.+?\}").expect("placeholder pattern is valid"));

/// The token a master view leaves where block `name` must be substituted.
///
/// # Examples
///
/// ```
/// assert_eq!(fasttrack::view::placeholder("body"), "${FastTrack.ContentBlock:body}");
/// ```
pub fn placeholder(name: &str) -> String {
    format!("${{FastTrack.ContentBlock:{name}}}")
}

fn strip_placeholders(text: &str) -> String {
    PLACEHOLDER.replace_all(text, "").into_owned()
}

/// Named values visible to a template body.
///
/// Built from a JSON object, from [`Parameters`], or from `()` for an empty bag.
/// Any other JSON value is exposed under the single name `model`.
///
/// # Examples
///
/// ```
/// use fasttrack::view::ViewBag;
/// use serde_json::json;
///
/// let bag = ViewBag::from(json!({ "user": { "name": "Ada" }, "tags": ["a", "b"] }));
/// assert_eq!(bag.lookup("user.name"), Some(&json!("Ada")));
/// assert_eq!(bag.lookup("tags.1"), Some(&json!("b")));
/// assert_eq!(bag.lookup("user.email"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewBag(Map<String, Value>);

impl ViewBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a top-level value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Walk a dotted path; numeric segments index arrays.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(fields) => fields.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for ViewBag {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for ViewBag {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            Value::Null => Self::default(),
            other => Self::default().with("model", other),
        }
    }
}

impl From<&Parameters> for ViewBag {
    fn from(params: &Parameters) -> Self {
        Self(params.as_map().clone())
    }
}

impl From<()> for ViewBag {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

/// Builds views: resolves path aliases and reads template bodies.
///
/// Cheap to clone; every clone shares the same paths and loader.
#[derive(Clone)]
pub struct ViewEngine {
    paths: Arc<Paths>,
    loader: Arc<dyn TemplateLoader>,
}

impl ViewEngine {
    /// Create a view engine that reads templates through `loader`.
    pub fn new(paths: Paths, loader: Arc<dyn TemplateLoader>) -> Self {
        Self {
            paths: Arc::new(paths),
            loader,
        }
    }

    /// A view engine reading templates from disk.
    pub fn filesystem(paths: Paths) -> Self {
        Self::new(paths, Arc::new(FileSystemLoader))
    }

    /// Returns the path-alias roots.
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Instantiate the template at `path` (aliases allowed) with `bag`.
    ///
    /// # Errors
    ///
    /// - [`Error::ViewFileNotFound`] if the loader has no template at the resolved path.
    /// - [`Error::TemplateSyntax`] or [`Error::UndefinedVariable`] if the body is invalid.
    /// - Any capture or inheritance failure raised while the body executes.
    pub fn view(&self, path: &str, bag: impl Into<ViewBag>) -> Result<View> {
        View::load(self.clone(), path, bag.into(), Vec::new())
    }

    /// Instantiate a view and compose it.
    pub fn render(&self, path: &str, bag: impl Into<ViewBag>) -> Result<String> {
        Ok(self.view(path, bag)?.compose_to_string())
    }
}

impl fmt::Debug for ViewEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewEngine").field("paths", &self.paths).finish_non_exhaustive()
    }
}

// A block being captured: its name and the output written so far.
#[derive(Debug)]
struct Capture {
    name: String,
    buffer: String,
}

/// One executed template.
#[derive(Debug)]
pub struct View {
    engine: ViewEngine,
    path: PathBuf,
    bag: ViewBag,
    // Default (non-block) output.
    output: String,
    // Captured blocks in first-insertion order.
    blocks: Vec<(String, String)>,
    // Depth never exceeds one.
    captures: Vec<Capture>,
    master: Option<Box<View>>,
    // Set by `declare_block`.
    is_master: bool,
    // Resolved paths of the views that led here, outermost first.
    lineage: Vec<PathBuf>,
}

impl View {
    fn load(engine: ViewEngine, path: &str, bag: ViewBag, lineage: Vec<PathBuf>) -> Result<View> {
        let resolved = engine.paths.map_path(path);

        if lineage.contains(&resolved) || lineage.len() >= MAX_VIEW_DEPTH {
            let mut chain = lineage;
            chain.push(resolved);
            return Err(Error::ViewInheritanceCycle { chain });
        }

        let source = engine.loader.load(&resolved).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => Error::ViewFileNotFound {
                path: resolved.clone(),
            },
            _ => Error::ViewIo {
                path: resolved.clone(),
                source,
            },
        })?;
        let nodes = template::parse(&source, &resolved)?;

        let mut view = View {
            engine,
            path: resolved,
            bag,
            output: String::new(),
            blocks: Vec::new(),
            captures: Vec::new(),
            master: None,
            is_master: false,
            lineage,
        };
        view.execute(nodes)?;

        trace!(view = %view.path.display(), blocks = view.blocks.len(), "view executed");
        Ok(view)
    }

    fn execute(&mut self, nodes: Vec<Node>) -> Result<()> {
        for node in nodes {
            match node {
                Node::Text(text) => self.write(&text),
                Node::Value { path, raw } => {
                    let text = self.format_value(&path, raw)?;
                    self.write(&text);
                }
                Node::Inherits(master) => self.inherits(&master)?,
                Node::Block(name) => self.start_block(name)?,
                Node::EndBlock => self.end_block()?,
                Node::Declare(name) => self.declare_block(&name),
                Node::Include(path) => self.include(&path)?,
            }
        }

        match self.captures.pop() {
            Some(open) => Err(Error::UnterminatedBlock {
                name: open.name,
                path: self.path.clone(),
            }),
            None => Ok(()),
        }
    }

    fn format_value(&self, path: &str, raw: bool) -> Result<String> {
        let root = path.split('.').next().unwrap_or(path);
        if self.bag.get(root).is_none() {
            return Err(Error::UndefinedVariable {
                name: root.to_owned(),
                path: self.path.clone(),
            });
        }

        let text = self.bag.lookup(path).map(display_value).unwrap_or_default();
        Ok(if raw { text } else { escape_html(&text) })
    }

    /// Write text to the block being captured, or to the primary buffer.
    pub fn write(&mut self, text: &str) {
        match self.captures.last_mut() {
            Some(capture) => capture.buffer.push_str(text),
            None => self.output.push_str(text),
        }
    }

    /// Start capturing output into the block `name`.
    ///
    /// # Errors
    ///
    /// [`Error::NestedCaptureNotAllowed`] if a block is already being captured.
    pub fn start_block(&mut self, name: impl Into<String>) -> Result<()> {
        let requested = name.into();
        if let Some(active) = self.captures.last() {
            return Err(Error::NestedCaptureNotAllowed {
                active: active.name.clone(),
                requested,
            });
        }

        self.captures.push(Capture {
            name: requested,
            buffer: String::new(),
        });
        Ok(())
    }

    /// Stop capturing and store the block, replacing any earlier block of the same name.
    ///
    /// # Errors
    ///
    /// [`Error::NoCaptureInProgress`] if no block is being captured.
    pub fn end_block(&mut self) -> Result<()> {
        let capture = self.captures.pop().ok_or(Error::NoCaptureInProgress)?;
        match self.blocks.iter_mut().find(|(name, _)| *name == capture.name) {
            Some((_, content)) => *content = capture.buffer,
            None => self.blocks.push((capture.name, capture.buffer)),
        }
        Ok(())
    }

    /// Mark where a child's block `name` goes, and flag this view as a master.
    pub fn declare_block(&mut self, name: &str) {
        self.is_master = true;
        self.write(&placeholder(name));
    }

    /// Load `master_path` with this view's bag and make it this view's master.
    ///
    /// A later call replaces the earlier master.
    ///
    /// # Errors
    ///
    /// [`Error::ViewInheritanceCycle`] if the master is already one of this
    /// view's ancestors, plus any failure raised while loading the master.
    pub fn inherits(&mut self, master_path: &str) -> Result<()> {
        let master = View::load(
            self.engine.clone(),
            master_path,
            self.bag.clone(),
            self.child_lineage(),
        )?;
        self.master = Some(Box::new(master));
        Ok(())
    }

    /// Compose the view at `path` with this view's bag and write its output here.
    pub fn include(&mut self, path: &str) -> Result<()> {
        let nested = View::load(self.engine.clone(), path, self.bag.clone(), self.child_lineage())?;
        self.write(&nested.compose_to_string());
        Ok(())
    }

    fn child_lineage(&self) -> Vec<PathBuf> {
        let mut lineage = self.lineage.clone();
        lineage.push(self.path.clone());
        lineage
    }

    /// Compose the final output of this view.
    ///
    /// Placeholders left unfilled anywhere in the chain render as nothing.
    /// Composition never changes the view, so calling this twice yields the
    /// same string.
    pub fn compose_to_string(&self) -> String {
        strip_placeholders(&self.compose())
    }

    // Master output with this view's blocks substituted. Placeholders survive
    // only when this view declared blocks itself, so its own child can fill them.
    fn compose(&self) -> String {
        let mut out = match &self.master {
            Some(master) => {
                let mut out = master.compose();
                for (name, content) in &self.blocks {
                    out = out.replace(&placeholder(name), content);
                }
                out
            }
            None => self.output.clone(),
        };

        if !self.is_master {
            out = strip_placeholders(&out);
        }
        out
    }

    /// Resolved path of the template.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the view bag this view executed with.
    pub fn bag(&self) -> &ViewBag {
        &self.bag
    }

    /// Content captured for block `name`.
    pub fn block(&self, name: &str) -> Option<&str> {
        self.blocks
            .iter()
            .find(|(block, _)| block == name)
            .map(|(_, content)| content.as_str())
    }

    /// Captured blocks in the order they were first captured.
    pub fn blocks(&self) -> impl Iterator<Item = (&str, &str)> {
        self.blocks.iter().map(|(name, content)| (name.as_str(), content.as_str()))
    }

    /// Returns the master view, if this view inherits one.
    pub fn master(&self) -> Option<&View> {
        self.master.as_deref()
    }

    /// `true` once the template declared at least one block.
    pub fn is_master(&self) -> bool {
        self.is_master
    }

    /// Name of the block being captured, if any.
    pub fn capturing(&self) -> Option<&str> {
        self.captures.last().map(|capture| capture.name.as_str())
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.compose_to_string())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine(templates: &[(&str, &str)]) -> ViewEngine {
        let mut loader = MemoryLoader::new();
        for (path, source) in templates {
            loader.insert(format!("/app/{path}"), *source);
        }
        let paths = Paths {
            sources: PathBuf::from("/app"),
            web_root: PathBuf::from("/www"),
        };
        ViewEngine::new(paths, Arc::new(loader))
    }

    // ── Composition ───────────────────────────────────────────────────────────

    #[test]
    fn child_blocks_fill_master_placeholders() {
        let views = engine(&[
            ("master.html", "A{% declare X %}B"),
            ("child.html", "{% inherits \"~/master.html\" %}\n{% block X %}mid{% endblock %}\n"),
        ]);
        assert_eq!(views.render("~/child.html", ()).unwrap(), "AmidB");
    }

    #[test]
    fn orphaned_placeholder_renders_empty() {
        let views = engine(&[
            ("master.html", "A{% declare Y %}B"),
            ("child.html", "{% inherits '~/master.html' %}"),
        ]);
        assert_eq!(views.render("~/child.html", ()).unwrap(), "AB");
        // A master rendered on its own has nobody left to supply the block.
        assert_eq!(views.render("~/master.html", ()).unwrap(), "AB");
    }

    #[test]
    fn master_keeps_its_placeholders_until_the_outermost_compose() {
        let views = engine(&[("master.html", "A{% declare Y %}B")]);
        let master = views.view("~/master.html", ()).unwrap();
        assert!(master.is_master());
        assert_eq!(master.compose(), format!("A{}B", placeholder("Y")));
        assert_eq!(master.compose_to_string(), "AB");
    }

    #[test]
    fn compose_is_idempotent() {
        let views = engine(&[
            ("master.html", "<h1>{% declare title %}</h1>{% declare body %}"),
            ("page.html", "{% inherits '~/master.html' %}{% block title %}T{% endblock %}{% block body %}B{% endblock %}"),
        ]);
        let page = views.view("~/page.html", ()).unwrap();
        let first = page.compose_to_string();
        let second = page.compose_to_string();
        assert_eq!(first, "<h1>T</h1>B");
        assert_eq!(first, second);
        assert_eq!(page.to_string(), first);
    }

    #[test]
    fn child_default_output_is_replaced_by_the_master() {
        let views = engine(&[
            ("master.html", "[{% declare body %}]"),
            ("page.html", "ignored {% inherits '~/master.html' %} also ignored {% block body %}kept{% endblock %}"),
        ]);
        assert_eq!(views.render("~/page.html", ()).unwrap(), "[kept]");
    }

    #[test]
    fn three_level_inheritance_through_a_redeclaring_section() {
        let views = engine(&[
            ("layout.html", "L[{% declare content %}]"),
            ("section.html", "{% inherits '~/layout.html' %}{% block content %}<main>{% declare body %}</main>{% endblock %}"),
            ("page.html", "{% inherits '~/section.html' %}{% block body %}hi{% endblock %}"),
        ]);
        assert_eq!(views.render("~/page.html", ()).unwrap(), "L[<main>hi</main>]");
    }

    #[test]
    fn last_capture_of_a_block_wins() {
        let views = engine(&[
            ("master.html", "{% declare x %}"),
            ("page.html", "{% inherits '~/master.html' %}{% block x %}one{% endblock %}{% block x %}two{% endblock %}"),
        ]);
        let page = views.view("~/page.html", ()).unwrap();
        assert_eq!(page.blocks().count(), 1);
        assert_eq!(page.block("x"), Some("two"));
        assert_eq!(page.compose_to_string(), "two");
    }

    #[test]
    fn include_writes_composed_output_in_place() {
        let views = engine(&[
            ("nav.html", "<nav>{{ site }}</nav>"),
            ("page.html", "<body>{% include '~/nav.html' %}</body>"),
        ]);
        let html = views.render("~/page.html", json!({ "site": "Blog" })).unwrap();
        assert_eq!(html, "<body><nav>Blog</nav></body>");
    }

    // ── View bag ──────────────────────────────────────────────────────────────

    #[test]
    fn master_sees_the_child_bag() {
        let views = engine(&[
            ("master.html", "<title>{{ title }}</title>{% declare body %}"),
            ("page.html", "{% inherits '~/master.html' %}{% block body %}{{ user.name }}{% endblock %}"),
        ]);
        let html = views
            .render("~/page.html", json!({ "title": "Home", "user": { "name": "Ada" } }))
            .unwrap();
        assert_eq!(html, "<title>Home</title>Ada");
    }

    #[test]
    fn values_are_escaped_unless_raw() {
        let views = engine(&[("page.html", "{{ html }}|{{ html | raw }}|{{ n }}|{{ flag }}|{{ none }}|{{ list }}")]);
        let html = views
            .render(
                "~/page.html",
                json!({ "html": "<b>&'\"", "n": 42, "flag": true, "none": null, "list": [1, 2] }),
            )
            .unwrap();
        assert_eq!(html, "&lt;b&gt;&amp;&#39;&quot;|<b>&'\"|42|true||[1,2]");
    }

    #[test]
    fn missing_nested_field_renders_empty_but_missing_root_fails() {
        let views = engine(&[("a.html", "[{{ user.email }}]"), ("b.html", "{{ nobody }}")]);
        assert_eq!(views.render("~/a.html", json!({ "user": {} })).unwrap(), "[]");
        assert!(matches!(
            views.render("~/b.html", ()),
            Err(Error::UndefinedVariable { name, .. }) if name == "nobody"
        ));
    }

    #[test]
    fn parameters_become_a_bag() {
        let views = engine(&[("p.html", "{{ id }}")]);
        let params: Parameters = [("id", "42")].into_iter().collect();
        assert_eq!(views.render("~/p.html", &params).unwrap(), "42");
    }

    // ── Capture state machine ─────────────────────────────────────────────────

    #[test]
    fn nested_capture_is_rejected() {
        let views = engine(&[("empty.html", "")]);
        let mut view = views.view("~/empty.html", ()).unwrap();
        view.start_block("a").unwrap();
        assert_eq!(view.capturing(), Some("a"));
        assert!(matches!(
            view.start_block("b"),
            Err(Error::NestedCaptureNotAllowed { active, requested }) if active == "a" && requested == "b"
        ));
        view.write("content");
        view.end_block().unwrap();
        assert_eq!(view.capturing(), None);
        assert_eq!(view.block("a"), Some("content"));
    }

    #[test]
    fn ending_without_a_capture_is_rejected() {
        let views = engine(&[("empty.html", "")]);
        let mut view = views.view("~/empty.html", ()).unwrap();
        assert!(matches!(view.end_block(), Err(Error::NoCaptureInProgress)));
    }

    #[test]
    fn template_errors_surface_from_execution() {
        let views = engine(&[
            ("nested.html", "{% block a %}{% block b %}{% endblock %}{% endblock %}"),
            ("stray.html", "{% endblock %}"),
            ("open.html", "{% block a %}never closed"),
        ]);
        assert!(matches!(views.view("~/nested.html", ()), Err(Error::NestedCaptureNotAllowed { .. })));
        assert!(matches!(views.view("~/stray.html", ()), Err(Error::NoCaptureInProgress)));
        assert!(matches!(
            views.view("~/open.html", ()),
            Err(Error::UnterminatedBlock { name, .. }) if name == "a"
        ));
    }

    #[test]
    fn programmatic_inheritance() {
        let views = engine(&[("master.html", "<{% declare x %}>"), ("empty.html", "")]);
        let mut view = views.view("~/empty.html", ()).unwrap();
        view.inherits("~/master.html").unwrap();
        view.start_block("x").unwrap();
        view.write("y");
        view.end_block().unwrap();
        assert_eq!(view.master().map(View::path), Some(Path::new("/app/master.html")));
        assert_eq!(view.compose_to_string(), "<y>");
    }

    // ── Failures ──────────────────────────────────────────────────────────────

    #[test]
    fn missing_template_is_view_file_not_found() {
        let views = engine(&[]);
        assert!(matches!(
            views.view("~/missing.html", ()),
            Err(Error::ViewFileNotFound { path }) if path == Path::new("/app/missing.html")
        ));
    }

    #[test]
    fn inheritance_cycle_is_detected() {
        let views = engine(&[
            ("a.html", "{% inherits '~/b.html' %}"),
            ("b.html", "{% inherits '~/a.html' %}"),
        ]);
        match views.view("~/a.html", ()) {
            Err(Error::ViewInheritanceCycle { chain }) => {
                assert_eq!(
                    chain,
                    vec![
                        PathBuf::from("/app/a.html"),
                        PathBuf::from("/app/b.html"),
                        PathBuf::from("/app/a.html"),
                    ]
                );
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_inheritance_and_self_include_are_cycles() {
        let views = engine(&[
            ("self.html", "{% inherits '~/self.html' %}"),
            ("loop.html", "{% include '~/loop.html' %}"),
        ]);
        assert!(matches!(views.view("~/self.html", ()), Err(Error::ViewInheritanceCycle { .. })));
        assert!(matches!(views.view("~/loop.html", ()), Err(Error::ViewInheritanceCycle { .. })));
    }

    // `v0` includes `v1`, which includes `v2`, ... up to `v{len - 1}`.
    fn include_chain(len: usize) -> ViewEngine {
        let templates: Vec<(String, String)> = (0..len)
            .map(|i| {
                let body = if i + 1 < len {
                    format!("{i},{{% include '~/v{}.html' %}}", i + 1)
                } else {
                    format!("{i}")
                };
                (format!("v{i}.html"), body)
            })
            .collect();
        let refs: Vec<(&str, &str)> = templates.iter().map(|(p, b)| (p.as_str(), b.as_str())).collect();
        engine(&refs)
    }

    #[test]
    fn chain_at_the_depth_limit_renders() {
        let views = include_chain(MAX_VIEW_DEPTH);
        let expected: Vec<String> = (0..MAX_VIEW_DEPTH).map(|i| i.to_string()).collect();
        assert_eq!(views.render("~/v0.html", ()).unwrap(), expected.join(","));
    }

    #[test]
    fn chain_past_the_depth_limit_fails() {
        let views = include_chain(MAX_VIEW_DEPTH + 1);
        match views.view("~/v0.html", ()) {
            Err(Error::ViewInheritanceCycle { chain }) => {
                assert_eq!(chain.len(), MAX_VIEW_DEPTH + 1);
                assert_eq!(chain.first(), Some(&PathBuf::from("/app/v0.html")));
                assert_eq!(chain.last(), Some(&PathBuf::from(format!("/app/v{MAX_VIEW_DEPTH}.html"))));
            }
            other => panic!("expected a depth failure, got {other:?}"),
        }
    }

    #[test]
    fn including_the_same_partial_twice_is_not_a_cycle() {
        let views = engine(&[("hr.html", "<hr>"), ("page.html", "{% include '~/hr.html' %}{% include '~/hr.html' %}")]);
        assert_eq!(views.render("~/page.html", ()).unwrap(), "<hr><hr>");
    }
}
