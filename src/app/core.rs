use parking_lot::{Mutex, RwLock};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn};

use super::hooks::{Hook, Hooks};
use super::provider::ServiceProvider;
use crate::config::Config;
use crate::container::Container;
use crate::error::{ConfigError, ContainerError, CoreError, DispatchError, DispatchResult};
use crate::executable::Executable;
use crate::http::{Request, Response, Sink, DEFAULT_PROTOCOL};
use crate::ids::DispatchId;
use crate::middleware::{run_chain, Middleware};
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::router::{loader, RouteMatch, Router};
use crate::runtime_config::RuntimeConfig;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header whose value, when it is a valid ULID, becomes the dispatch id.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Container key holding the not-found [`Failure`] while its hook runs.
pub const NOT_FOUND_KEY: &str = "not.found";
/// Container key holding the internal-error [`Failure`] while its hook runs.
pub const EXCEPTION_KEY: &str = "exception";

/// Which failure path a [`Failure`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    Internal,
}

/// The error a failure hook is handling, as bound in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureKind {
    fn hook_slot(self) -> (Hook, &'static str) {
        match self {
            FailureKind::NotFound => (Hook::NotFound, NOT_FOUND_KEY),
            FailureKind::Internal => (Hook::InternalError, EXCEPTION_KEY),
        }
    }
}

impl Failure {
    fn from_error(error: &DispatchError) -> Self {
        let kind = if error.is_not_found() {
            FailureKind::NotFound
        } else {
            FailureKind::Internal
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        match self.kind {
            FailureKind::NotFound => 404,
            FailureKind::Internal => 500,
        }
    }

    /// Body written when no hook handles the failure.
    #[must_use]
    pub fn default_body(&self) -> String {
        match self.kind {
            FailureKind::NotFound => self.message.clone(),
            FailureKind::Internal => format!("Internal error: {}", self.message),
        }
    }
}

type RouteDeclaration = Box<dyn Fn(&mut Router) -> Result<(), ConfigError> + Send>;

/// The application core: boot, route, dispatch, respond.
///
/// ```rust
/// use mvcore::{Core, Request};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let dir = std::env::temp_dir().join("mvcore-doc-missing");
/// let mut app = Core::new(&dir);
/// app.registry().register_fn("Pages", |inv| {
///     let response = inv.service::<mvcore::Response>("response")?;
///     response.set_body(format!("page {}", inv.params().get("slug").unwrap_or("")));
///     Ok(())
/// });
/// app.routes(|router| {
///     router.get("pages/:slug", "Pages", "show")?;
///     Ok(())
/// });
/// app.set_request(Request::new("GET", "/pages/about")?);
/// app.set_response_sink(Box::new(std::io::sink()));
///
/// app.boot()?.execute()?;
/// let response = app.container().get::<mvcore::Response>("response")?;
/// assert_eq!(response.body(), "page about");
/// # Ok(())
/// # }
/// ```
pub struct Core {
    paths: RuntimeConfig,
    namespace_prefix: String,
    container: Arc<Container>,
    registry: Arc<Registry>,
    resolver: Resolver,
    services: Vec<Box<dyn ServiceProvider>>,
    middleware: Vec<Executable>,
    layers: Vec<Arc<dyn Middleware>>,
    hooks: Hooks,
    declarations: Vec<RouteDeclaration>,
    routes_loaded: bool,
    pending_request: Option<Request>,
    pending_sink: Arc<Mutex<Option<Sink>>>,
    booted: bool,
}

impl Core {
    /// A core rooted at `app_path`, with the default config, routes and
    /// views locations below it.
    pub fn new(app_path: impl AsRef<Path>) -> Self {
        Self::with_paths(RuntimeConfig::for_app(app_path))
    }

    /// A core using the paths from the `MVCORE_*` environment variables.
    #[must_use]
    pub fn from_runtime_config() -> Self {
        Self::with_paths(RuntimeConfig::from_env())
    }

    #[must_use]
    pub fn with_paths(paths: RuntimeConfig) -> Self {
        let container = Arc::new(Container::new());
        let registry = Arc::new(Registry::new());
        let resolver = Resolver::new(Arc::clone(&container), Arc::clone(&registry));
        Self {
            paths,
            namespace_prefix: String::new(),
            container,
            registry,
            resolver,
            services: Vec::new(),
            middleware: Vec::new(),
            layers: Vec::new(),
            hooks: Hooks::default(),
            declarations: Vec::new(),
            routes_loaded: false,
            pending_request: None,
            pending_sink: Arc::new(Mutex::new(None)),
            booted: false,
        }
    }

    #[must_use]
    pub fn container(&self) -> &Container {
        &self.container
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    #[must_use]
    pub fn is_booted(&self) -> bool {
        self.booted
    }

    #[must_use]
    pub fn app_path(&self) -> &Path {
        &self.paths.app_path
    }

    pub fn set_app_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.paths.app_path = path.into();
        self
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.paths.config_path
    }

    pub fn set_config_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.paths.config_path = path.into();
        self
    }

    #[must_use]
    pub fn routes_path(&self) -> &Path {
        &self.paths.routes_path
    }

    pub fn set_routes_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.paths.routes_path = path.into();
        self
    }

    #[must_use]
    pub fn views_path(&self) -> &Path {
        &self.paths.views_path
    }

    pub fn set_views_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.paths.views_path = path.into();
        self
    }

    #[must_use]
    pub fn namespace_prefix(&self) -> &str {
        &self.namespace_prefix
    }

    /// Set the prefix the resolver tries in front of unknown class names.
    /// A trailing `\` is added when missing.
    pub fn set_namespace_prefix(&mut self, prefix: &str) -> &mut Self {
        self.namespace_prefix = if prefix.is_empty() || prefix.ends_with('\\') {
            prefix.to_string()
        } else {
            format!("{prefix}\\")
        };
        self.resolver.set_namespace_prefix(self.namespace_prefix.clone());
        self
    }

    /// Attach `class::action` to a lifecycle point, replacing any previous
    /// executable there.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTarget`] for invalid names.
    pub fn set_hook<I, K, V>(&mut self, hook: Hook, class: &str, action: &str, params: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arc<str>>,
        V: Into<String>,
    {
        let executable = Executable::with_params(class, action, params)?;
        if self.hooks.set(hook, executable).is_some() {
            debug!(hook = %hook, "Replaced existing hook");
        }
        Ok(self)
    }

    /// [`Core::set_hook`] with the hook named by its dotted key.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownHook`] for keys outside the fixed set, plus
    /// those of [`Core::set_hook`].
    pub fn set_hook_key(&mut self, key: &str, class: &str, action: &str) -> Result<&mut Self, ConfigError> {
        let hook = key.parse::<Hook>()?;
        self.set_hook(hook, class, action, std::iter::empty::<(&str, &str)>())
    }

    #[must_use]
    pub fn hook(&self, hook: Hook) -> Option<&Executable> {
        self.hooks.get(hook)
    }

    /// Append an executable to the global middleware stack. Entries run in
    /// registration order before the matched route.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidTarget`] for invalid names.
    pub fn add_middleware<I, K, V>(&mut self, class: &str, action: &str, params: I) -> Result<&mut Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Arc<str>>,
        V: Into<String>,
    {
        self.middleware.push(Executable::with_params(class, action, params)?);
        Ok(self)
    }

    /// Wrap the whole dispatch (global stack plus route chain) in
    /// `middleware`. The first wrapper added is the outermost.
    pub fn wrap(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Register a service provider, run once during boot.
    pub fn add_service(&mut self, provider: impl ServiceProvider + 'static) -> &mut Self {
        self.services.push(Box::new(provider));
        self
    }

    /// Declare routes in code. Declarations run after the routes file,
    /// when the first request is routed. A table that failed to build is
    /// rebuilt from scratch on the next request.
    pub fn routes<F>(&mut self, declare: F) -> &mut Self
    where
        F: Fn(&mut Router) -> Result<(), ConfigError> + Send + 'static,
    {
        self.declarations.push(Box::new(declare));
        self
    }

    /// Use `request` instead of building one from the process environment.
    pub fn set_request(&mut self, request: Request) -> &mut Self {
        if self.booted {
            self.container.set("request", request);
        } else {
            self.pending_request = Some(request);
        }
        self
    }

    /// Flush the response to `sink` instead of stdout.
    pub fn set_response_sink(&mut self, sink: Sink) -> &mut Self {
        if self.container.is_resolved("response") {
            if let Ok(response) = self.container.get::<Response>("response") {
                response.set_sink(sink);
                return self;
            }
        }
        *self.pending_sink.lock() = Some(sink);
        self
    }

    /// The shared route table.
    ///
    /// # Errors
    ///
    /// [`ContainerError::UnknownBinding`] before boot.
    pub fn router(&self) -> Result<Arc<RwLock<Router>>, ContainerError> {
        self.container.get::<RwLock<Router>>("router")
    }

    fn lifecycle_hook(&self, hook: Hook) -> Result<(), CoreError> {
        match self.run_hook(hook) {
            Ok(()) | Err(DispatchError::Stop) => Ok(()),
            Err(e) => Err(CoreError::Boot(anyhow::Error::new(e).context(format!("{hook} hook failed")))),
        }
    }

    fn run_hook(&self, hook: Hook) -> DispatchResult {
        match self.hooks.get(hook) {
            Some(executable) => {
                debug!(hook = %hook, class = %executable.class(), action = %executable.action(), "Running hook");
                executable.execute(&self.resolver)
            }
            None => Ok(()),
        }
    }

    /// Boot the application. Runs once; later calls do nothing.
    ///
    /// # Errors
    ///
    /// [`CoreError::Config`] for a malformed configuration file,
    /// [`CoreError::Boot`] when a boot hook or service provider fails.
    pub fn boot(&mut self) -> Result<&mut Self, CoreError> {
        if self.booted {
            debug!("Boot skipped: already booted");
            return Ok(self);
        }
        let start = Instant::now();
        info!(app_path = %self.paths.app_path.display(), version = VERSION, "Boot start");

        self.lifecycle_hook(Hook::BeforeBoot)?;

        let config = Config::load(&self.paths.config_path)?;
        self.container.set("config", config);

        match self.pending_request.take() {
            Some(request) => self.container.set("request", request),
            None => self.container.singleton("request", |_| Ok(Request::from_env()?)),
        }

        let pending_sink = Arc::clone(&self.pending_sink);
        self.container.singleton("response", move |c| {
            let protocol = c
                .get::<Request>("request")
                .map(|r| r.protocol_version().to_string())
                .unwrap_or_else(|_| DEFAULT_PROTOCOL.to_string());
            let sink = pending_sink.lock().take().unwrap_or_else(|| Box::new(io::stdout()));
            Ok(Response::with_sink(protocol, sink))
        });

        self.container.singleton("router", |_| Ok(RwLock::new(Router::new())));

        for provider in &self.services {
            debug!(provider = provider.name(), "Registering service provider");
            provider
                .register(&self.container, &self.registry)
                .map_err(|e| CoreError::Boot(e.context(format!("service provider {} failed", provider.name()))))?;
        }

        self.lifecycle_hook(Hook::AfterBoot)?;

        self.booted = true;
        info!(
            providers = self.services.len(),
            duration_us = start.elapsed().as_micros() as u64,
            "Boot complete"
        );
        Ok(self)
    }

    /// Route the active request and run its handlers.
    ///
    /// Failures inside the dispatch never escape. A stop signal ends the
    /// dispatch quietly. Not-found and every other error are turned into a
    /// response by the matching hook or a default body.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotBooted`] before [`Core::boot`].
    pub fn execute(&mut self) -> Result<&mut Self, CoreError> {
        if !self.booted {
            return Err(CoreError::NotBooted);
        }
        let dispatch_id = DispatchId::from_header_or_new(
            self.container
                .get::<Request>("request")
                .ok()
                .as_deref()
                .and_then(|r| r.header(REQUEST_ID_HEADER)),
        );
        let span = info_span!("dispatch", dispatch_id = %dispatch_id);
        let _guard = span.enter();
        let start = Instant::now();

        let outcome = self.load_routes().and_then(|()| self.route_request());
        match outcome {
            Ok(()) => {}
            Err(DispatchError::Stop) => debug!("Dispatch stopped"),
            Err(e) => self.handle_failure(e),
        }

        info!(duration_us = start.elapsed().as_micros() as u64, "Dispatch complete");
        Ok(self)
    }

    /// Build the routing table on a scratch router and publish it only when
    /// every declaration and condition succeeded.
    fn load_routes(&mut self) -> DispatchResult {
        if self.routes_loaded {
            return Ok(());
        }
        let router = self.router()?;
        let mut table = router.read().clone();
        let decls = loader::load_routes(&self.paths.routes_path).map_err(anyhow::Error::new)?;
        loader::apply(&mut table, &decls, &self.registry).map_err(anyhow::Error::new)?;
        for declare in &self.declarations {
            declare(&mut table).map_err(anyhow::Error::new)?;
        }
        table.compile_all().map_err(anyhow::Error::new)?;

        let routes_count = table.len();
        *router.write() = table;
        self.declarations.clear();
        self.routes_loaded = true;
        info!(routes_count, "Routing table loaded");
        Ok(())
    }

    fn route_request(&self) -> DispatchResult {
        self.run_hook(Hook::BeforeRouting)?;

        let request = self.container.get::<Request>("request")?;
        let matched: Option<RouteMatch> = self.router()?.read().route(request.uri(), request.method());

        match &matched {
            Some(m) => request.merge_query(&m.params),
            None => self.route_not_found()?,
        }

        let stack = || -> DispatchResult {
            for executable in &self.middleware {
                executable.execute(&self.resolver)?;
            }
            match &matched {
                Some(m) => m.dispatch(&self.resolver),
                None => Ok(()),
            }
        };
        run_chain(&self.layers, &self.resolver, &stack)?;

        self.run_hook(Hook::AfterRouting)
    }

    /// No route matched. Without a `not.found` hook the default body is
    /// written. Otherwise the hook's outcome is the dispatch outcome: a stop
    /// ends the dispatch and any other error takes the internal-error path.
    fn route_not_found(&self) -> DispatchResult {
        let failure = Failure::from_error(&DispatchError::not_found());
        warn!(message = %failure.message, "No route matched");
        match self.run_failure_hook(&failure) {
            None => {
                self.write_default(&failure);
                Ok(())
            }
            Some(Err(e)) if e.is_not_found() => {
                warn!(error = %e, "not.found hook signalled not found");
                self.write_default(&Failure::from_error(&e));
                Err(DispatchError::Stop)
            }
            Some(result) => result,
        }
    }

    /// Bind `failure` under its container key and run the matching hook.
    /// `None` when no hook is registered.
    fn run_failure_hook(&self, failure: &Failure) -> Option<DispatchResult> {
        let (hook, key) = failure.kind.hook_slot();
        let executable = self.hooks.get(hook)?;
        self.container.set(key, failure.clone());
        Some(executable.execute(&self.resolver))
    }

    /// Last-resort failure handling: nothing escapes from here.
    fn handle_failure(&self, error: DispatchError) {
        let failure = Failure::from_error(&error);
        match failure.kind {
            FailureKind::NotFound => warn!(message = %failure.message, "Not found"),
            FailureKind::Internal => error!(error = %error, "Internal error during dispatch"),
        }

        let fallback = match self.run_failure_hook(&failure) {
            None => Some(failure),
            Some(Ok(()) | Err(DispatchError::Stop)) => None,
            Some(Err(hook_error)) => {
                let (hook, _) = failure.kind.hook_slot();
                error!(hook = %hook, error = %hook_error, "Failure hook failed");
                Some(Failure::from_error(&hook_error))
            }
        };

        if let Some(failure) = fallback {
            self.write_default(&failure);
        }
    }

    fn write_default(&self, failure: &Failure) {
        match self.container.get::<Response>("response") {
            Ok(response) => {
                response.set_status(failure.status()).set_body(failure.default_body());
            }
            Err(e) => error!(error = %e, "No response available for failure body"),
        }
    }

    /// Flush the response, then run the `after.response` hook.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotBooted`] before [`Core::boot`],
    /// [`CoreError::Response`] when the response cannot be built or written.
    pub fn send_response(&mut self) -> Result<&mut Self, CoreError> {
        if !self.booted {
            return Err(CoreError::NotBooted);
        }
        let response = self
            .container
            .get::<Response>("response")
            .map_err(|e| CoreError::Response(e.into()))?;
        let written = response.send().map_err(|e| CoreError::Response(e.into()))?;
        info!(status = response.status(), written, "Response sent");

        match self.run_hook(Hook::AfterResponse) {
            Ok(()) | Err(DispatchError::Stop) => {}
            Err(e) => error!(error = %e, "after.response hook failed"),
        }
        Ok(self)
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("paths", &self.paths)
            .field("namespace_prefix", &self.namespace_prefix)
            .field("services", &self.services.len())
            .field("middleware", &self.middleware)
            .field("layers", &self.layers.len())
            .field("hooks", &self.hooks)
            .field("booted", &self.booted)
            .finish_non_exhaustive()
    }
}
