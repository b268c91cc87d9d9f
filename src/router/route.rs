//! Route definitions: pattern, target action, method filter and defaults.

use std::fmt;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde_json::Value;

use crate::context::Parameters;
use crate::error::{Error, Result};
use crate::http::{Method, percent_decode};

/// HTTP methods a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Methods {
    /// `*`, every method.
    Any,
    /// Exact, case-sensitive method tokens.
    Only(Vec<String>),
}

impl Methods {
    /// Parse `*` or a comma-separated list such as `GET,POST`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fasttrack::router::Methods;
    ///
    /// assert_eq!(Methods::parse("*"), Methods::Any);
    /// assert_eq!(Methods::parse("GET, POST"), Methods::Only(vec!["GET".into(), "POST".into()]));
    /// ```
    pub fn parse(list: &str) -> Self {
        if list.trim() == "*" {
            return Methods::Any;
        }
        Methods::Only(
            list.split(',')
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// `true` if `method` is in the list, or the list is `*`.
    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Methods::Any => true,
            Methods::Only(tokens) => tokens.iter().any(|token| token == method.as_str()),
        }
    }
}

impl fmt::Display for Methods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Methods::Any => f.write_str("*"),
            Methods::Only(tokens) => f.write_str(&tokens.join(",")),
        }
    }
}

/// A named rule mapping a URL pattern and a method set to a controller action.
///
/// The pattern is a regular expression matched against the whole request path
/// (it is anchored as `^(?:pattern)$`). Named groups become action parameters.
/// The pattern is compiled on first use, so an invalid pattern only surfaces
/// when a request reaches the route.
///
/// # Examples
///
/// ```
/// use fasttrack::router::RouteDefinition;
///
/// let route = RouteDefinition::new(r"/articles/(?P<slug>[a-z-]+)", "Blog::Articles", "show")
///     .methods("GET,HEAD")
///     .default("lang", "en");
///
/// assert_eq!(route.action(), "show");
/// assert_eq!(route.defaults().get("lang"), Some("en"));
/// ```
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pattern: String,
    controller: String,
    action: String,
    methods: Methods,
    defaults: Parameters,
    compiled: OnceCell<Regex>,
}

impl RouteDefinition {
    /// Create a route for every method with no defaults.
    pub fn new(pattern: impl Into<String>, controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            controller: controller.into(),
            action: action.into(),
            methods: Methods::Any,
            defaults: Parameters::new(),
            compiled: OnceCell::new(),
        }
    }

    /// Restrict the route to `*` or a comma-separated method list.
    #[must_use]
    pub fn methods(mut self, list: &str) -> Self {
        self.set_methods(list);
        self
    }

    /// Replace the allowed methods with a comma separated list (`*` for any).
    pub fn set_methods(&mut self, list: &str) -> &mut Self {
        self.methods = Methods::parse(list);
        self
    }

    /// Add a default parameter, used when the request does not provide `key`.
    #[must_use]
    pub fn default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_default(key, value);
        self
    }

    /// Set the value `key` takes when the URL does not supply it.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.defaults.insert(key, value);
        self
    }

    /// Replace all default parameters.
    #[must_use]
    pub fn defaults_from(mut self, defaults: Parameters) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the pattern as registered, without anchors.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns the `Namespace::Controller` name.
    pub fn controller(&self) -> &str {
        &self.controller
    }

    /// Returns the action name.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the allowed methods.
    pub fn allowed_methods(&self) -> &Methods {
        &self.methods
    }

    /// Returns the default parameters.
    pub fn defaults(&self) -> &Parameters {
        &self.defaults
    }

    fn regex(&self, name: &str) -> Result<&Regex> {
        self.compiled.get_or_try_init(|| {
            Regex::new(&format!("^(?:{})$", self.pattern)).map_err(|source| Error::InvalidRoutePattern {
                name: name.to_owned(),
                source,
            })
        })
    }

    /// Match `path` against the pattern.
    ///
    /// Returns the named groups that took part in the match, percent-decoded,
    /// or `None` when the path does not match. `name` labels the error raised
    /// for an invalid pattern.
    pub(crate) fn captures(&self, name: &str, path: &str) -> Result<Option<Parameters>> {
        let regex = self.regex(name)?;
        let Some(caps) = regex.captures(path) else {
            return Ok(None);
        };

        let params = regex
            .capture_names()
            .flatten()
            .filter_map(|group| caps.name(group).map(|m| (group, percent_decode(m.as_str()))))
            .collect();
        Ok(Some(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_match_exact_tokens() {
        let methods = Methods::parse("GET,POST");
        assert!(methods.allows(&Method::Get));
        assert!(methods.allows(&Method::Post));
        assert!(!methods.allows(&Method::Delete));
        // Not a substring test.
        assert!(!Methods::parse("GETX").allows(&Method::Get));
        assert!(!Methods::parse("get").allows(&Method::Get));
        assert!(Methods::parse("PURGE").allows(&Method::Custom("PURGE".into())));
    }

    #[test]
    fn wildcard_allows_everything() {
        assert!(Methods::Any.allows(&Method::Delete));
        assert!(Methods::Any.allows(&Method::Custom("PURGE".into())));
        assert_eq!(Methods::parse(" * ").to_string(), "*");
        assert_eq!(Methods::parse("GET, PUT").to_string(), "GET,PUT");
    }

    #[test]
    fn captures_named_groups_only() {
        let route = RouteDefinition::new(r"/users/(?P<id>\d+)/(posts|comments)", "App::Users", "show");
        let params = route.captures("users", "/users/42/posts").unwrap().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("id"), Some("42"));
    }

    #[test]
    fn pattern_must_match_the_whole_path() {
        let route = RouteDefinition::new("/about", "App::Pages", "about");
        assert!(route.captures("about", "/about").unwrap().is_some());
        assert!(route.captures("about", "/about/team").unwrap().is_none());
        assert!(route.captures("about", "/en/about").unwrap().is_none());
    }

    #[test]
    fn alternation_is_anchored_as_a_whole() {
        let route = RouteDefinition::new("/a|/b", "App::Pages", "ab");
        assert!(route.captures("ab", "/b").unwrap().is_some());
        assert!(route.captures("ab", "/a/extra").unwrap().is_none());
    }

    #[test]
    fn optional_groups_that_did_not_participate_are_skipped() {
        let route = RouteDefinition::new(r"/list(?:/(?P<page>\d+))?", "App::List", "index");
        let params = route.captures("list", "/list").unwrap().unwrap();
        assert!(params.is_empty());
        let params = route.captures("list", "/list/3").unwrap().unwrap();
        assert_eq!(params.get("page"), Some("3"));
    }

    #[test]
    fn captured_values_are_percent_decoded() {
        let route = RouteDefinition::new(r"/tags/(?P<tag>[^/]+)", "App::Tags", "show");
        let params = route.captures("tags", "/tags/hello%20world").unwrap().unwrap();
        assert_eq!(params.get("tag"), Some("hello world"));
    }

    #[test]
    fn invalid_pattern_fails_lazily() {
        let route = RouteDefinition::new("/broken/(", "App::Broken", "index");
        assert!(matches!(
            route.captures("broken", "/broken/"),
            Err(Error::InvalidRoutePattern { name, .. }) if name == "broken"
        ));
    }
}
