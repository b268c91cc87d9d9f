//! Per-action context: parameters, view access and request extensions.
//!
//! A [`Context`] is built by the dispatcher for every controller action it runs.
//! It carries the merged [`Parameters`] (route captures, defaults or query
//! string), the [`ViewEngine`] used to build views, and type-erased
//! [`Extensions`] forwarded from the host layer.

use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use serde_json::{Map, Value};

use crate::error::Result;
use crate::view::{View, ViewBag, ViewEngine};

/// Type-erased request extensions. Lets the host layer hand per-request
/// state (a decoded form, the failure being reported) to an action.
#[derive(Default)]
pub struct Extensions {
    map: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Create a new empty extensions map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value of the same type
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.map.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a value by type
    pub fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Remove a value by type
    pub fn remove<T>(&mut self) -> Option<T>
    where
        T: Send + Sync + 'static,
    {
        self.map
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    /// Returns `true` if there are no extensions
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Parameters handed to a controller action.
///
/// Values are JSON values so that nested query strings (`filter[tag]=rust`,
/// `ids[]=1&ids[]=2`) keep their structure; route captures and query values
/// are plain strings.
///
/// # Examples
///
/// ```
/// use fasttrack::context::Parameters;
///
/// let mut params = Parameters::new();
/// params.insert("lang", "fr");
///
/// let mut defaults = Parameters::new();
/// defaults.insert("lang", "en");
/// defaults.insert("page", "1");
///
/// params.merge_defaults(&defaults);
/// assert_eq!(params.get("lang"), Some("fr"));
/// assert_eq!(params.get("page"), Some("1"));
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Parameters {
    map: Map<String, Value>,
}

impl Parameters {
    /// Create a new empty parameters map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value for `key`
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.map.insert(key.into(), value.into());
    }

    /// Get a string value; `None` when absent or not a string
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::as_str)
    }

    /// Get the raw value, whatever its shape
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Returns `true` if `key` is present, whatever its value
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Remove a value from the parameters map
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    /// Copy every entry of `defaults` whose key is missing here.
    ///
    /// Values already present always win.
    pub fn merge_defaults(&mut self, defaults: &Parameters) {
        for (key, value) in &defaults.map {
            if !self.map.contains_key(key) {
                self.map.insert(key.clone(), value.clone());
            }
        }
    }

    /// Iterate over `(key, value)` pairs, sorted by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// `true` if there are no parameters
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    /// Mutable access to the underlying map, used by the query string decoder.
    pub(crate) fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.map
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self { map }
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Everything a controller action gets to work with.
pub struct Context {
    params: Parameters,
    views: ViewEngine,
    extensions: Extensions,
}

impl Context {
    /// Create a context for one action call.
    pub fn new(params: Parameters, views: ViewEngine, extensions: Extensions) -> Self {
        Self {
            params,
            views,
            extensions,
        }
    }

    /// Returns the merged route parameters.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Mutable access to the parameters.
    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    /// Shorthand for `ctx.params().get(key)`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }

    /// Returns the request extensions.
    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to the request extensions.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Returns the view engine.
    pub fn views(&self) -> &ViewEngine {
        &self.views
    }

    /// Build a view; see [`ViewEngine::view`].
    pub fn view(&self, path: &str, bag: impl Into<ViewBag>) -> Result<View> {
        self.views.view(path, bag)
    }

    /// Build a view and compose it to its final string.
    pub fn render(&self, path: &str, bag: impl Into<ViewBag>) -> Result<String> {
        self.views.render(path, bag)
    }
}
