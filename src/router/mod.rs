//! Request routing: map URLs and HTTP methods to controller actions.
//!
//! This module provides the [`RouteTable`], the ordered set of named
//! [`RouteDefinition`]s, and the [`Dispatcher`] that walks it. A request is
//! resolved through four tiers, first hit wins:
//!
//! | Tier                 | Trigger                                     | Outcome                          |
//! |----------------------|---------------------------------------------|----------------------------------|
//! | static passthrough   | dev mode and a file exists under web root   | [`Dispatch::PassThrough`]        |
//! | direct action call   | path starts with the action prefix          | allow-listed action output       |
//! | route table          | first route whose pattern and method match  | action output                    |
//! | not found            | nothing matched                             | not-found route or [`Dispatch::NotFound`] |
//!
//! Routes are matched in registration order: with overlapping patterns the
//! route registered first wins, even if a later one is more specific.

use std::collections::HashMap;

use crate::config::RouteConfig;
use crate::context::Parameters;
use crate::error::{Error, Result};

mod dispatcher;
mod route;

pub use dispatcher::{Dispatch, DispatchSettings, Dispatcher};
pub use route::{Methods, RouteDefinition};

/// Named routes in registration order.
///
/// Re-registering a name replaces the definition in place: the route keeps
/// the position of its first registration.
///
/// # Examples
///
/// ```
/// use fasttrack::router::{RouteDefinition, RouteTable};
///
/// let mut routes = RouteTable::new();
/// routes.register("home", RouteDefinition::new("/", "App::Home", "index"));
/// routes.add("article", r"/articles/(?P<slug>[a-z-]+)", "App::Articles", "show");
///
/// assert_eq!(routes.len(), 2);
/// assert_eq!(routes.lookup("article").unwrap().action(), "show");
/// assert!(routes.lookup("missing").is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(String, RouteDefinition)>,
    index: HashMap<String, usize>,
}

impl RouteTable {
    /// Create a new, empty `RouteTable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the route `name`. The pattern is not checked here.
    pub fn register(&mut self, name: impl Into<String>, definition: RouteDefinition) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&position) => self.routes[position].1 = definition,
            None => {
                self.index.insert(name.clone(), self.routes.len());
                self.routes.push((name, definition));
            }
        }
    }

    /// Register a route answering every method and return it, so methods and
    /// defaults can be set in place.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        controller: impl Into<String>,
        action: impl Into<String>,
    ) -> &mut RouteDefinition {
        let name = name.into();
        self.register(name.clone(), RouteDefinition::new(pattern, controller, action));
        let position = self.index[&name];
        &mut self.routes[position].1
    }

    /// Look up a route by name.
    ///
    /// # Errors
    ///
    /// [`Error::RouteNotFound`] if no route is registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<&RouteDefinition> {
        self.index
            .get(name)
            .map(|&position| &self.routes[position].1)
            .ok_or_else(|| Error::RouteNotFound { name: name.to_owned() })
    }

    /// Returns `true` if a route named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Routes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteDefinition)> {
        self.routes.iter().map(|(name, route)| (name.as_str(), route))
    }

    /// Return the number of routes registered.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Register the routes of a configuration file, in file order.
    pub fn extend_from_config(&mut self, routes: &[RouteConfig]) {
        for route in routes {
            let definition = RouteDefinition::new(&route.pattern, &route.controller, &route.action)
                .methods(&route.methods)
                .defaults_from(Parameters::from(route.defaults.clone()));
            self.register(&route.name, definition);
        }
    }
}
