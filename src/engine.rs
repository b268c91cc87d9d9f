//! The engine: the process-wide boundary between HTTP and dispatch.
//!
//! [`Engine::handle`] scans request input, dispatches, and turns the outcome
//! or the failure into a [`Reply`]. It is the only place where an [`Error`]
//! becomes an HTTP status.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error};

use crate::config::{Config, ConfigError};
use crate::context::{Context, Extensions, Parameters};
use crate::controller::{Controller, ControllerRegistry};
use crate::error::{Error, Result};
use crate::http::{Request, Response, StatusCode};
use crate::router::{Dispatch, DispatchSettings, Dispatcher, RouteDefinition, RouteTable};
use crate::security::check_parameters;
use crate::view::{FileSystemLoader, TemplateLoader, ViewEngine};

/// Body of a 404 when no not-found route is configured.
pub const NOT_FOUND_BODY: &str = "Not found";

/// The decoded `application/x-www-form-urlencoded` body of a request,
/// available to actions through [`Context::extensions`](crate::Context::extensions).
#[derive(Debug, Clone, PartialEq)]
pub struct FormData(pub Parameters);

/// What the host should send back.
#[derive(Debug)]
pub enum Reply {
    Response(Response),
    /// Serve this file from the web root as-is.
    StaticFile(PathBuf),
}

/// Builds an [`Engine`] from a [`Config`] plus the application's controllers
/// and routes.
///
/// Routes declared in the configuration are registered first, in file order,
/// followed by the routes added here.
pub struct EngineBuilder {
    config: Config,
    controllers: ControllerRegistry,
    routes: Vec<(String, RouteDefinition)>,
    loader: Arc<dyn TemplateLoader>,
}

impl EngineBuilder {
    /// Register controller `C` under `name` (`Namespace::Controller`).
    #[must_use]
    pub fn controller<C: Controller>(mut self, name: impl Into<String>) -> Self {
        self.controllers.register::<C>(name);
        self
    }

    #[must_use]
    pub fn route(mut self, name: impl Into<String>, definition: RouteDefinition) -> Self {
        self.routes.push((name.into(), definition));
        self
    }

    /// Read templates through `loader` instead of the filesystem.
    #[must_use]
    pub fn template_loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Arc::new(loader);
        self
    }

    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn build(self) -> std::result::Result<Engine, ConfigError> {
        self.config.validate()?;

        let mut routes = RouteTable::new();
        routes.extend_from_config(&self.config.routes);
        for (name, definition) in self.routes {
            routes.register(name, definition);
        }

        let settings = DispatchSettings {
            action_prefix: self.config.routing.action_prefix.clone(),
            not_found_route: self.config.routing.not_found_route.clone(),
            static_root: self
                .config
                .server
                .serve_static
                .then(|| self.config.paths.web_root.clone()),
        };
        let views = ViewEngine::new(self.config.paths.clone(), self.loader);

        debug!(routes = routes.len(), controllers = self.controllers.len(), "engine built");
        Ok(Engine {
            dispatcher: Dispatcher::new(routes, self.controllers, views, settings),
            config: self.config,
        })
    }
}

/// A configured application, shared across connections behind an `Arc`.
#[derive(Debug)]
pub struct Engine {
    config: Config,
    dispatcher: Dispatcher,
}

impl Engine {
    /// Start building an engine from `config`.
    pub fn builder(config: Config) -> EngineBuilder {
        EngineBuilder {
            config,
            controllers: ControllerRegistry::new(),
            routes: Vec::new(),
            loader: Arc::new(FileSystemLoader),
        }
    }

    /// Returns the configuration the engine was built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the dispatcher that routes requests.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Answer one request. Never fails: errors become the error route or a 500.
    pub fn handle(&self, request: &Request) -> Reply {
        match self.process(request) {
            Ok(Dispatch::Rendered(body)) => Reply::Response(Response::html(StatusCode::Ok, body)),
            Ok(Dispatch::PassThrough(file)) => Reply::StaticFile(file),
            Ok(Dispatch::NotFound) => Reply::Response(Response::text(StatusCode::NotFound, NOT_FOUND_BODY)),
            Err(err) => Reply::Response(self.failure(err)),
        }
    }

    fn process(&self, request: &Request) -> Result<Dispatch> {
        let query = request.query_params();
        check_parameters(&query, "GET")?;

        let mut extensions = Extensions::new();
        if let Some(form) = request.form_params() {
            check_parameters(&form, "POST")?;
            extensions.insert(FormData(form));
        }

        self.dispatcher
            .dispatch_with(request.target(), request.method(), &query, extensions)
    }

    fn failure(&self, err: Error) -> Response {
        error!(error = %err, "request failed");
        let message = err.to_string();

        if let Some(route) = &self.config.routing.error_route {
            let params: Parameters = [("error", message.as_str())].into_iter().collect();
            let mut extensions = Extensions::new();
            extensions.insert(Arc::new(err));

            match self.dispatcher.render_route_with(route, params, extensions) {
                Ok(body) => return Response::html(StatusCode::InternalServerError, body),
                Err(nested) => error!(route = %route, error = %nested, "error route failed"),
            }
        }

        let body = if self.config.debug {
            message
        } else {
            StatusCode::InternalServerError.canonical_reason().to_owned()
        };
        Response::text(StatusCode::InternalServerError, body)
    }

    /// Run an action from the command line.
    ///
    /// `target` is `Namespace::Controller.method`; `/` and `\` are accepted as
    /// namespace separators. Each `key=value` argument becomes a parameter and
    /// every other argument a positional one (`"0"`, `"1"`, ...). Unlike a
    /// direct action URL, any action may be run.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedActionUrl`] for a target without a method, then the
    /// same failures as a direct action call.
    pub fn run_action(&self, target: &str, args: &[String]) -> Result<String> {
        let (controller, action) = target
            .rsplit_once('.')
            .filter(|(controller, action)| !controller.is_empty() && !action.is_empty())
            .ok_or_else(|| Error::MalformedActionUrl {
                url: target.to_owned(),
                prefix: String::new(),
            })?;
        let name = controller.replace(['/', '\\'], "::");

        let mut params = Parameters::new();
        let mut position = 0;
        for arg in args {
            match arg.split_once('=') {
                Some((key, value)) if !key.is_empty() => params.insert(key, value),
                _ => {
                    params.insert(position.to_string(), arg.as_str());
                    position += 1;
                }
            }
        }

        let mut instance = self.dispatcher.controllers().instantiate(&name)?;
        debug!(controller = %name, action, "running action from the command line");
        let mut ctx = Context::new(params, self.dispatcher.views().clone(), Extensions::new());
        instance.invoke(action, &mut ctx)
    }
}
