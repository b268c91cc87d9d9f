//! The dispatcher: resolves a URL and method to an action and runs it.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::DEFAULT_ACTION_PREFIX;
use crate::context::{Context, Extensions, Parameters};
use crate::controller::ControllerRegistry;
use crate::error::{Error, Result};
use crate::http::{Method, percent_decode};
use crate::security::check_parameters;
use crate::view::ViewEngine;

use super::RouteTable;

/// Label used when route captures fail the injection scan.
const CAPTURES_LABEL: &str = "Route pattern captures";

/// Knobs the dispatcher reads on every request.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Path prefix of direct action calls. Must start and end with `/`.
    pub action_prefix: String,
    /// Route rendered when nothing matched, with the parameter `url`.
    pub not_found_route: Option<String>,
    /// Web root checked for static files; `None` disables the passthrough.
    pub static_root: Option<PathBuf>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            action_prefix: DEFAULT_ACTION_PREFIX.to_owned(),
            not_found_route: None,
            static_root: None,
        }
    }
}

/// Outcome of [`Dispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// An action ran and produced this body.
    Rendered(String),
    /// The host should serve this file as-is.
    PassThrough(PathBuf),
    /// Nothing matched and no not-found route is configured.
    NotFound,
}

/// Walks the passthrough, direct action, route table and not-found tiers
/// for each request.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use fasttrack::config::Paths;
/// use fasttrack::controller::{Actions, Controller, ControllerRegistry};
/// use fasttrack::context::Parameters;
/// use fasttrack::http::Method;
/// use fasttrack::router::{Dispatch, DispatchSettings, Dispatcher, RouteTable};
/// use fasttrack::view::{MemoryLoader, ViewEngine};
/// use fasttrack::{Context, Result};
///
/// #[derive(Default)]
/// struct Hello;
///
/// impl Hello {
///     fn greet(&mut self, ctx: &mut Context) -> Result<String> {
///         Ok(format!("hello {}", ctx.param("name").unwrap_or("nobody")))
///     }
/// }
///
/// impl Controller for Hello {
///     fn actions() -> Actions<Self> {
///         Actions::new().action("greet", Self::greet)
///     }
/// }
///
/// let mut routes = RouteTable::new();
/// routes.add("greet", "/hello/(?P<name>[a-z]+)", "App::Hello", "greet");
/// let mut controllers = ControllerRegistry::new();
/// controllers.register::<Hello>("App::Hello");
/// let views = ViewEngine::new(Paths::default(), Arc::new(MemoryLoader::new()));
///
/// let dispatcher = Dispatcher::new(routes, controllers, views, DispatchSettings::default());
/// let outcome = dispatcher.dispatch("/hello/ferris?x=1", &Method::Get, &Parameters::new()).unwrap();
/// assert_eq!(outcome, Dispatch::Rendered("hello ferris".into()));
/// ```
#[derive(Debug)]
pub struct Dispatcher {
    routes: RouteTable,
    controllers: ControllerRegistry,
    views: ViewEngine,
    settings: DispatchSettings,
}

impl Dispatcher {
    /// Create a dispatcher over a populated route table and controller registry.
    pub fn new(
        routes: RouteTable,
        controllers: ControllerRegistry,
        views: ViewEngine,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            routes,
            controllers,
            views,
            settings,
        }
    }

    /// Returns the route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Returns the controller registry.
    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    /// Returns the view engine handed to every action.
    pub fn views(&self) -> &ViewEngine {
        &self.views
    }

    /// Returns the dispatch settings.
    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Resolve `raw_url` and run the selected action.
    ///
    /// `query` is handed to direct action calls; routed actions receive their
    /// pattern captures merged with the route defaults instead.
    ///
    /// # Errors
    ///
    /// Any routing failure ([`Error::MalformedActionUrl`],
    /// [`Error::NotAController`], [`Error::ActionNotFound`],
    /// [`Error::ActionNotAllowed`], [`Error::InvalidRoutePattern`],
    /// [`Error::SuspiciousInputDetected`]) and whatever the action returns.
    pub fn dispatch(&self, raw_url: &str, method: &Method, query: &Parameters) -> Result<Dispatch> {
        self.dispatch_with(raw_url, method, query, Extensions::new())
    }

    /// Like [`dispatch`](Self::dispatch), forwarding `extensions` to the action.
    pub fn dispatch_with(
        &self,
        raw_url: &str,
        method: &Method,
        query: &Parameters,
        extensions: Extensions,
    ) -> Result<Dispatch> {
        let path = raw_url.split_once('?').map_or(raw_url, |(path, _)| path);

        if let Some(file) = self.static_file(path) {
            debug!(path, file = %file.display(), "static passthrough");
            return Ok(Dispatch::PassThrough(file));
        }

        if let Some(target) = path.strip_prefix(self.settings.action_prefix.as_str()) {
            return self
                .call_action(path, target, query.clone(), extensions)
                .map(Dispatch::Rendered);
        }

        for (name, route) in self.routes.iter() {
            let Some(captures) = route.captures(name, path)? else {
                continue;
            };
            if !route.allowed_methods().allows(method) {
                debug!(route = name, %method, "pattern matched but method is not allowed");
                continue;
            }

            debug!(route = name, path, "route matched");
            check_parameters(&captures, CAPTURES_LABEL)?;
            return self
                .render_route_with(name, captures, extensions)
                .map(Dispatch::Rendered);
        }

        match &self.settings.not_found_route {
            Some(route) => {
                debug!(path, route = %route, "no route matched, rendering not-found route");
                let params: Parameters = [("url", path)].into_iter().collect();
                self.render_route_with(route, params, extensions)
                    .map(Dispatch::Rendered)
            }
            None => {
                debug!(path, "no route matched");
                Ok(Dispatch::NotFound)
            }
        }
    }

    /// Run the action behind the route `name` with `params`, filling in the
    /// route defaults for missing keys.
    ///
    /// # Errors
    ///
    /// [`Error::RouteNotFound`], [`Error::NotAController`],
    /// [`Error::ActionNotFound`] or whatever the action returns.
    pub fn render_route(&self, name: &str, params: Parameters) -> Result<String> {
        self.render_route_with(name, params, Extensions::new())
    }

    /// Like [`render_route`](Self::render_route), forwarding `extensions`.
    pub fn render_route_with(&self, name: &str, mut params: Parameters, extensions: Extensions) -> Result<String> {
        let route = self.routes.lookup(name)?;
        params.merge_defaults(route.defaults());

        let mut controller = self.controllers.instantiate(route.controller())?;
        if !controller.has_action(route.action()) {
            return Err(Error::ActionNotFound {
                controller: route.controller().to_owned(),
                action: route.action().to_owned(),
            });
        }

        debug!(route = name, controller = route.controller(), action = route.action(), "running action");
        let mut ctx = Context::new(params, self.views.clone(), extensions);
        controller.invoke(route.action(), &mut ctx)
    }

    // `target` is the path with the action prefix removed:
    // `Namespace/Controller.method`.
    fn call_action(&self, path: &str, target: &str, params: Parameters, extensions: Extensions) -> Result<String> {
        let (controller_path, action) = target
            .split_once('.')
            .filter(|(controller, action)| !controller.is_empty() && !action.is_empty())
            .ok_or_else(|| Error::MalformedActionUrl {
                url: path.to_owned(),
                prefix: self.settings.action_prefix.clone(),
            })?;

        let name = controller_path.replace('/', "::");
        let mut controller = self.controllers.instantiate(&name)?;
        if !controller.has_action(action) {
            return Err(Error::ActionNotFound {
                controller: name,
                action: action.to_owned(),
            });
        }
        if !controller.is_action_url_allowed(action) {
            return Err(Error::ActionNotAllowed {
                controller: name,
                action: action.to_owned(),
            });
        }

        debug!(controller = %name, action, "direct action call");
        let mut ctx = Context::new(params, self.views.clone(), extensions);
        controller.invoke(action, &mut ctx)
    }

    fn static_file(&self, path: &str) -> Option<PathBuf> {
        let root = self.settings.static_root.as_deref()?;
        let relative = percent_decode(path);
        if relative.split(['/', '\\']).any(|segment| segment == "..") {
            return None;
        }
        let file = root.join(Path::new(relative.trim_start_matches('/')));
        file.is_file().then_some(file)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::sync::Arc;

    use super::*;
    use crate::config::Paths;
    use crate::controller::{Actions, Controller};
    use crate::router::RouteDefinition;
    use crate::view::MemoryLoader;

    thread_local! {
        static SECRET_RUNS: Cell<u32> = const { Cell::new(0) };
    }

    #[derive(Default)]
    struct Pages;

    impl Pages {
        fn show(&mut self, ctx: &mut Context) -> Result<String> {
            Ok(format!(
                "show:{}:{}",
                ctx.param("slug").unwrap_or("-"),
                ctx.param("lang").unwrap_or("-")
            ))
        }

        fn catch_all(&mut self, _ctx: &mut Context) -> Result<String> {
            Ok("catch-all".into())
        }

        fn missing(&mut self, ctx: &mut Context) -> Result<String> {
            Ok(format!("missing:{}", ctx.param("url").unwrap_or("-")))
        }

        fn ping(&mut self, ctx: &mut Context) -> Result<String> {
            Ok(format!("pong:{}", ctx.param("n").unwrap_or("-")))
        }

        fn secret(&mut self, _ctx: &mut Context) -> Result<String> {
            SECRET_RUNS.with(|runs| runs.set(runs.get() + 1));
            Ok("secret".into())
        }

        fn layout(&mut self, ctx: &mut Context) -> Result<String> {
            ctx.render("~/views/page.html", ctx.params())
        }

        fn tagged(&mut self, ctx: &mut Context) -> Result<String> {
            Ok(ctx.extensions().get::<String>().cloned().unwrap_or_default())
        }
    }

    impl Controller for Pages {
        fn actions() -> Actions<Self> {
            Actions::new()
                .action("show", Self::show)
                .action("catch_all", Self::catch_all)
                .action("missing", Self::missing)
                .action("secret", Self::secret)
                .action("layout", Self::layout)
                .action("tagged", Self::tagged)
                .action_url("ping", Self::ping)
        }
    }

    fn views() -> ViewEngine {
        let loader = MemoryLoader::new()
            .with("./views/master.html", "<h1>{% declare title %}</h1>{% declare body %}")
            .with(
                "./views/page.html",
                "{% inherits \"~/views/master.html\" %}{% block title %}{{ slug }}{% endblock %}{% block body %}<p>{{ lang }}</p>{% endblock %}",
            );
        ViewEngine::new(Paths::default(), Arc::new(loader))
    }

    fn controllers() -> ControllerRegistry {
        let mut controllers = ControllerRegistry::new();
        controllers.register::<Pages>("Site::Pages");
        controllers
    }

    fn dispatcher(routes: RouteTable, settings: DispatchSettings) -> Dispatcher {
        Dispatcher::new(routes, controllers(), views(), settings)
    }

    fn get(dispatcher: &Dispatcher, url: &str) -> Result<Dispatch> {
        dispatcher.dispatch(url, &Method::Get, &Parameters::new())
    }

    #[test]
    fn first_registered_route_wins() {
        let mut routes = RouteTable::new();
        routes.add("catch_all", "/pages/.*", "Site::Pages", "catch_all");
        routes.add("page", "/pages/(?P<slug>[a-z]+)", "Site::Pages", "show");
        let dispatcher = dispatcher(routes, DispatchSettings::default());

        assert_eq!(get(&dispatcher, "/pages/about").unwrap(), Dispatch::Rendered("catch-all".into()));
    }

    #[test]
    fn defaults_never_override_captures() {
        let mut routes = RouteTable::new();
        routes
            .add("page", "/(?P<lang>[a-z]{2})/(?P<slug>[a-z]+)", "Site::Pages", "show")
            .set_default("lang", "en")
            .set_default("slug", "home");
        routes.register(
            "plain",
            RouteDefinition::new("/about", "Site::Pages", "show").default("lang", "en"),
        );
        let dispatcher = dispatcher(routes, DispatchSettings::default());

        assert_eq!(get(&dispatcher, "/fr/contact").unwrap(), Dispatch::Rendered("show:contact:fr".into()));
        assert_eq!(get(&dispatcher, "/about").unwrap(), Dispatch::Rendered("show:-:en".into()));
    }

    #[test]
    fn method_filter_falls_through_to_later_routes() {
        let mut routes = RouteTable::new();
        routes
            .add("page", "/pages/(?P<slug>[a-z]+)", "Site::Pages", "show")
            .set_methods("GET,POST");
        routes.add("fallback", "/pages/.*", "Site::Pages", "catch_all");
        let dispatcher = dispatcher(routes, DispatchSettings::default());

        let post = dispatcher.dispatch("/pages/a", &Method::Post, &Parameters::new()).unwrap();
        assert_eq!(post, Dispatch::Rendered("show:a:-".into()));
        let delete = dispatcher.dispatch("/pages/a", &Method::Delete, &Parameters::new()).unwrap();
        assert_eq!(delete, Dispatch::Rendered("catch-all".into()));
    }

    #[test]
    fn query_string_is_ignored_for_matching() {
        let mut routes = RouteTable::new();
        routes.add("page", "/pages/(?P<slug>[a-z]+)", "Site::Pages", "show");
        let dispatcher = dispatcher(routes, DispatchSettings::default());

        assert_eq!(
            get(&dispatcher, "/pages/faq?slug=evil&x=1").unwrap(),
            Dispatch::Rendered("show:faq:-".into())
        );
    }

    #[test]
    fn unmatched_url_without_not_found_route() {
        let dispatcher = dispatcher(RouteTable::new(), DispatchSettings::default());
        assert_eq!(get(&dispatcher, "/nowhere").unwrap(), Dispatch::NotFound);
    }

    #[test]
    fn unmatched_url_renders_not_found_route_with_url() {
        let mut routes = RouteTable::new();
        routes.add("not_found", "/__never__", "Site::Pages", "missing");
        let settings = DispatchSettings {
            not_found_route: Some("not_found".into()),
            ..DispatchSettings::default()
        };
        let dispatcher = dispatcher(routes, settings);

        assert_eq!(
            get(&dispatcher, "/nowhere?a=b").unwrap(),
            Dispatch::Rendered("missing:/nowhere".into())
        );
    }

    #[test]
    fn missing_not_found_route_is_an_error() {
        let settings = DispatchSettings {
            not_found_route: Some("not_found".into()),
            ..DispatchSettings::default()
        };
        let dispatcher = dispatcher(RouteTable::new(), settings);
        assert!(matches!(get(&dispatcher, "/x"), Err(Error::RouteNotFound { name }) if name == "not_found"));
    }

    #[test]
    fn suspicious_capture_aborts_before_the_action() {
        let mut routes = RouteTable::new();
        routes.add("secret", "/s/(?P<q>.+)", "Site::Pages", "secret");
        let dispatcher = dispatcher(routes, DispatchSettings::default());
        SECRET_RUNS.with(|runs| runs.set(0));

        let result = get(&dispatcher, "/s/%3Cscript%3Ealert(1)");
        assert!(matches!(
            result,
            Err(Error::SuspiciousInputDetected { label }) if label == "Route pattern captures"
        ));
        assert_eq!(SECRET_RUNS.with(Cell::get), 0);
    }

    #[test]
    fn invalid_pattern_surfaces_at_match_time() {
        let mut routes = RouteTable::new();
        routes.add("broken", "/broken/(", "Site::Pages", "show");
        let dispatcher = dispatcher(routes, DispatchSettings::default());
        assert!(matches!(
            get(&dispatcher, "/anything"),
            Err(Error::InvalidRoutePattern { name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn direct_action_call_runs_allow_listed_action() {
        let dispatcher = dispatcher(RouteTable::new(), DispatchSettings::default());
        let query: Parameters = [("n", "7")].into_iter().collect();

        let outcome = dispatcher
            .dispatch("/_fasttrack/action/Site/Pages.ping?n=7", &Method::Get, &query)
            .unwrap();
        assert_eq!(outcome, Dispatch::Rendered("pong:7".into()));
    }

    #[test]
    fn direct_action_call_rejects_unlisted_action_without_running_it() {
        let dispatcher = dispatcher(RouteTable::new(), DispatchSettings::default());
        SECRET_RUNS.with(|runs| runs.set(0));

        assert!(matches!(
            get(&dispatcher, "/_fasttrack/action/Site/Pages.secret"),
            Err(Error::ActionNotAllowed { controller, action }) if controller == "Site::Pages" && action == "secret"
        ));
        assert_eq!(SECRET_RUNS.with(Cell::get), 0);
    }

    #[test]
    fn direct_action_call_failures() {
        let dispatcher = dispatcher(RouteTable::new(), DispatchSettings::default());

        for url in ["/_fasttrack/action/Site/Pages", "/_fasttrack/action/.ping", "/_fasttrack/action/Site/Pages."] {
            assert!(
                matches!(get(&dispatcher, url), Err(Error::MalformedActionUrl { .. })),
                "{url} should be malformed"
            );
        }
        assert!(matches!(
            get(&dispatcher, "/_fasttrack/action/Site/Nope.ping"),
            Err(Error::NotAController { name }) if name == "Site::Nope"
        ));
        assert!(matches!(
            get(&dispatcher, "/_fasttrack/action/Site/Pages.nope"),
            Err(Error::ActionNotFound { action, .. }) if action == "nope"
        ));
    }

    #[test]
    fn custom_action_prefix() {
        let settings = DispatchSettings {
            action_prefix: "/rpc/".into(),
            ..DispatchSettings::default()
        };
        let dispatcher = dispatcher(RouteTable::new(), settings);
        assert_eq!(get(&dispatcher, "/rpc/Site/Pages.ping").unwrap(), Dispatch::Rendered("pong:-".into()));
        assert_eq!(get(&dispatcher, "/_fasttrack/action/Site/Pages.ping").unwrap(), Dispatch::NotFound);
    }

    #[test]
    fn render_route_failures() {
        let mut routes = RouteTable::new();
        routes.add("ghost", "/ghost", "Site::Ghost", "show");
        routes.add("nope", "/nope", "Site::Pages", "nope");
        let dispatcher = dispatcher(routes, DispatchSettings::default());

        assert!(matches!(
            dispatcher.render_route("missing", Parameters::new()),
            Err(Error::RouteNotFound { .. })
        ));
        assert!(matches!(
            dispatcher.render_route("ghost", Parameters::new()),
            Err(Error::NotAController { name }) if name == "Site::Ghost"
        ));
        assert!(matches!(
            dispatcher.render_route("nope", Parameters::new()),
            Err(Error::ActionNotFound { .. })
        ));
    }

    #[test]
    fn routed_action_renders_inherited_view() {
        let mut routes = RouteTable::new();
        routes
            .add("page", "/(?P<slug>[a-z]+)", "Site::Pages", "layout")
            .set_default("lang", "en");
        let dispatcher = dispatcher(routes, DispatchSettings::default());

        assert_eq!(
            get(&dispatcher, "/intro").unwrap(),
            Dispatch::Rendered("<h1>intro</h1><p>en</p>".into())
        );
    }

    #[test]
    fn extensions_reach_the_action() {
        let mut routes = RouteTable::new();
        routes.add("tagged", "/tagged", "Site::Pages", "tagged");
        let dispatcher = dispatcher(routes, DispatchSettings::default());

        let mut extensions = Extensions::new();
        extensions.insert(String::from("from the host"));
        let outcome = dispatcher
            .dispatch_with("/tagged", &Method::Get, &Parameters::new(), extensions)
            .unwrap();
        assert_eq!(outcome, Dispatch::Rendered("from the host".into()));
    }

    #[test]
    fn static_passthrough_serves_existing_files_only() {
        let root = std::env::temp_dir().join(format!("fasttrack-dispatch-{}", std::process::id()));
        std::fs::create_dir_all(root.join("css")).unwrap();
        std::fs::write(root.join("css/site.css"), "body{}").unwrap();

        let mut routes = RouteTable::new();
        routes.add("any", "/.*", "Site::Pages", "catch_all");
        let settings = DispatchSettings {
            static_root: Some(root.clone()),
            ..DispatchSettings::default()
        };
        let dispatcher = dispatcher(routes, settings);

        assert_eq!(
            get(&dispatcher, "/css/site.css?v=2").unwrap(),
            Dispatch::PassThrough(root.join("css/site.css"))
        );
        // Directories and missing files fall through to routing.
        assert_eq!(get(&dispatcher, "/css").unwrap(), Dispatch::Rendered("catch-all".into()));
        assert_eq!(get(&dispatcher, "/css/missing.css").unwrap(), Dispatch::Rendered("catch-all".into()));
        assert_eq!(
            get(&dispatcher, "/css/../css/site.css").unwrap(),
            Dispatch::Rendered("catch-all".into())
        );

        std::fs::remove_dir_all(&root).unwrap();
    }
}
