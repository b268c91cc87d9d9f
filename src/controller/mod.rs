//! Controllers: the targets of routes and direct action calls.
//!
//! A controller is a `Default` type that lists its actions in an [`Actions`]
//! table. Controllers are registered by name in a [`ControllerRegistry`]; the
//! dispatcher instantiates a fresh controller for every action it runs.
//!
//! ```rust
//! use fasttrack::controller::{Actions, Controller, ControllerRegistry};
//! use fasttrack::{Context, Result};
//!
//! #[derive(Default)]
//! struct Articles;
//!
//! impl Articles {
//!     fn show(&mut self, ctx: &mut Context) -> Result<String> {
//!         Ok(format!("article {}", ctx.param("slug").unwrap_or("?")))
//!     }
//!
//!     fn count(&mut self, _ctx: &mut Context) -> Result<String> {
//!         Ok("3".into())
//!     }
//! }
//!
//! impl Controller for Articles {
//!     fn actions() -> Actions<Self> {
//!         Actions::new()
//!             .action("show", Self::show)
//!             // reachable through /_fasttrack/action/Blog/Articles.count
//!             .action_url("count", Self::count)
//!     }
//! }
//!
//! let mut registry = ControllerRegistry::new();
//! registry.register::<Articles>("Blog::Articles");
//! assert!(registry.contains("Blog::Articles"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::error::{Error, Result};

/// Signature of a controller action.
pub type ActionFn<C> = fn(&mut C, &mut Context) -> Result<String>;

struct ActionEntry<C> {
    name: &'static str,
    handler: ActionFn<C>,
    // Allow-listed for direct action calls.
    action_url: bool,
}

/// The action table of a controller.
pub struct Actions<C> {
    entries: Vec<ActionEntry<C>>,
}

impl<C> Default for Actions<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Actions<C> {
    /// Creates an empty action table.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Register an action reachable through routes only.
    #[must_use]
    pub fn action(self, name: &'static str, handler: ActionFn<C>) -> Self {
        self.push(name, handler, false)
    }

    /// Register an action reachable through routes and direct action calls.
    #[must_use]
    pub fn action_url(self, name: &'static str, handler: ActionFn<C>) -> Self {
        self.push(name, handler, true)
    }

    // A later registration under the same name replaces the earlier one.
    fn push(mut self, name: &'static str, handler: ActionFn<C>, action_url: bool) -> Self {
        self.entries.retain(|entry| entry.name != name);
        self.entries.push(ActionEntry {
            name,
            handler,
            action_url,
        });
        self
    }

    fn find(&self, name: &str) -> Option<&ActionEntry<C>> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Registered action names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|entry| entry.name)
    }
}

/// The controller contract: a zero-argument constructor and an action table.
pub trait Controller: Default + 'static {
    /// Build the table of actions this controller exposes.
    fn actions() -> Actions<Self>;
}

/// A live controller, type-erased for the dispatcher.
pub trait ControllerInstance {
    /// Registered name of the controller.
    fn name(&self) -> &str;

    /// `true` if the action table has an entry named `action`.
    fn has_action(&self, action: &str) -> bool;

    /// `true` if `action` may be invoked through a direct action URL.
    fn is_action_url_allowed(&self, action: &str) -> bool;

    /// Run `action`.
    ///
    /// # Errors
    ///
    /// [`Error::ActionNotFound`] if the controller has no such action, otherwise
    /// whatever the action itself returns.
    fn invoke(&mut self, action: &str, ctx: &mut Context) -> Result<String>;
}

struct Instance<C: Controller> {
    name: Arc<str>,
    controller: C,
    actions: Actions<C>,
}

impl<C: Controller> ControllerInstance for Instance<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_action(&self, action: &str) -> bool {
        self.actions.find(action).is_some()
    }

    fn is_action_url_allowed(&self, action: &str) -> bool {
        self.actions.find(action).is_some_and(|entry| entry.action_url)
    }

    fn invoke(&mut self, action: &str, ctx: &mut Context) -> Result<String> {
        let handler = self
            .actions
            .find(action)
            .map(|entry| entry.handler)
            .ok_or_else(|| Error::ActionNotFound {
                controller: self.name.to_string(),
                action: action.to_owned(),
            })?;
        handler(&mut self.controller, ctx)
    }
}

type Factory = Arc<dyn Fn(Arc<str>) -> Box<dyn ControllerInstance> + Send + Sync>;

/// Maps controller names (`Namespace::Controller`) to constructors.
#[derive(Clone, Default)]
pub struct ControllerRegistry {
    factories: HashMap<Arc<str>, Factory>,
}

impl ControllerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `C` under `name`, replacing any previous registration.
    pub fn register<C: Controller>(&mut self, name: impl Into<String>) {
        let name: Arc<str> = Arc::from(name.into());
        let factory: Factory = Arc::new(|name: Arc<str>| -> Box<dyn ControllerInstance> {
            Box::new(Instance::<C> {
                name,
                controller: C::default(),
                actions: C::actions(),
            })
        });
        self.factories.insert(name, factory);
    }

    /// Returns `true` if a controller is registered as `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the number of registered controllers.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no controller is registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Construct a fresh instance of the controller registered as `name`.
    ///
    /// # Errors
    ///
    /// [`Error::NotAController`] if nothing is registered under `name`.
    pub fn instantiate(&self, name: &str) -> Result<Box<dyn ControllerInstance>> {
        let (key, factory) = self
            .factories
            .get_key_value(name)
            .ok_or_else(|| Error::NotAController { name: name.to_owned() })?;
        Ok(factory(Arc::clone(key)))
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(|name| &**name).collect();
        names.sort_unstable();
        f.debug_struct("ControllerRegistry").field("controllers", &names).finish()
    }
}
