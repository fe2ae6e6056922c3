use mvcore::error::NOT_FOUND_BODY;
use mvcore::{
    Config, ConfigError, Container, CoreError, DispatchError, DispatchId, DispatchResult, Failure, FailureKind, Hook, Invocation,
    Next, Registry, Request, Resolver, Response,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod common;
use common::{describe, recording_class, response, test_app, Recorder};

fn set_body(inv: &Invocation<'_>, body: &str) -> DispatchResult {
    inv.service::<Response>("response")?.set_body(body);
    Ok(())
}

#[test]
fn test_execute_and_send_require_boot() {
    let (_dir, mut app, sink) = test_app("GET", "/");
    assert!(!app.is_booted());
    assert!(matches!(app.execute(), Err(CoreError::NotBooted)));
    assert!(matches!(app.send_response(), Err(CoreError::NotBooted)));
    assert!(!app.container().has("response"));
    assert!(sink.contents().is_empty());
}

#[test]
fn test_boot_is_idempotent() {
    let (_dir, mut app, _sink) = test_app("GET", "/");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Hooks", &recorder);
    let providers = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&providers);
    app.add_service(move |_: &Container, _: &Registry| -> anyhow::Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    app.set_hook(Hook::BeforeBoot, "Hooks", "beforeBoot", [("k", "v")]).unwrap();
    app.set_hook_key("after.boot", "Hooks", "afterBoot").unwrap();

    app.boot().unwrap();
    app.boot().unwrap();
    assert!(app.is_booted());
    assert_eq!(providers.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.entries(), vec!["Hooks::beforeBoot(k=v)", "Hooks::afterBoot"]);
}

#[test]
fn test_boot_binds_core_services() {
    let (dir, mut app, _sink) = test_app("GET", "/");
    std::fs::write(dir.path().join("config.yaml"), "site:\n  name: Example\n").unwrap();
    app.boot().unwrap();

    for key in ["config", "request", "response", "router"] {
        assert!(app.container().has(key), "missing {key}");
    }
    let config = app.container().get::<Config>("config").unwrap();
    assert_eq!(config.get("site.name").and_then(|v| v.as_str()), Some("Example"));
    assert!(!app.container().is_resolved("response"));
}

#[test]
fn test_missing_config_is_empty() {
    let (_dir, mut app, _sink) = test_app("GET", "/");
    app.boot().unwrap();
    assert!(app.container().get::<Config>("config").unwrap().is_empty());
}

#[test]
fn test_malformed_config_fails_boot() {
    let (dir, mut app, _sink) = test_app("GET", "/");
    std::fs::write(dir.path().join("config.yaml"), "site: [unclosed\n").unwrap();
    assert!(matches!(app.boot(), Err(CoreError::Config(ConfigError::File { .. }))));
    assert!(!app.is_booted());
}

#[test]
fn test_failing_provider_aborts_boot() {
    let (_dir, mut app, _sink) = test_app("GET", "/");
    app.add_service(|_: &Container, _: &Registry| -> anyhow::Result<()> { Err(anyhow::anyhow!("no database")) });
    let err = app.boot().unwrap_err();
    assert!(matches!(err, CoreError::Boot(_)));
    assert!(!app.is_booted());
}

#[test]
fn test_before_boot_stop_is_not_an_error() {
    let (_dir, mut app, _sink) = test_app("GET", "/");
    app.registry().register_fn("Gate", |_| Err(DispatchError::Stop));
    app.set_hook_key("before.boot", "Gate", "check").unwrap();
    app.boot().unwrap();
    assert!(app.is_booted());
}

#[test]
fn test_matched_route_runs_and_merges_query() {
    let (_dir, mut app, sink) = test_app("GET", "/article/2024/my-post?ref=home");
    app.registry().register_fn("Articles", |inv| {
        let year: u16 = inv.param("year")?;
        set_body(inv, &format!("{year}:{}", inv.param::<String>("slug")?))
    });
    app.routes(|router| {
        router
            .get("article/:year/:slug", "Articles", "show")?
            .where_named("year", "numeric")?;
        Ok(())
    });

    app.boot().unwrap().execute().unwrap().send_response().unwrap();

    let request = app.container().get::<Request>("request").unwrap();
    assert_eq!(request.query_param("year").as_deref(), Some("2024"));
    assert_eq!(request.query_param("slug").as_deref(), Some("my-post"));
    assert_eq!(request.query_param("ref").as_deref(), Some("home"));
    assert_eq!(response(&app).status(), 200);
    assert_eq!(sink.contents(), "2024:my-post");
}

#[test]
fn test_constraint_failure_is_not_found() {
    let (_dir, mut app, _sink) = test_app("GET", "/article/abcd/my-post");
    app.registry().register_fn("Articles", |_| Err(DispatchError::internal("must not run")));
    app.routes(|router| {
        router.get("article/:year/:slug", "Articles", "show")?.where_named("year", "numeric")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    assert_eq!(response(&app).status(), 404);
}

#[test]
fn test_default_not_found_response() {
    let (_dir, mut app, sink) = test_app("GET", "/unknown/path");
    app.boot().unwrap();
    app.execute().unwrap();
    app.send_response().unwrap();

    assert_eq!(response(&app).status(), 404);
    assert_eq!(sink.contents(), NOT_FOUND_BODY);
}

#[test]
fn test_not_found_hook_receives_failure_and_routing_continues() {
    let (_dir, mut app, _sink) = test_app("POST", "/unknown/path");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Audit", &recorder);
    let seen = recorder.clone();
    app.registry().register_fn("Errors", move |inv| {
        let failure = inv.service::<Failure>("not.found")?;
        seen.push(format!("{:?}", failure.kind));
        let response = inv.service::<Response>("response")?;
        response.set_status(404).set_body("custom not found");
        Ok(())
    });
    app.set_hook(Hook::NotFound, "Errors", "notFound", Vec::<(&str, &str)>::new()).unwrap();
    app.set_hook_key("after.routing", "Audit", "afterRouting").unwrap();
    app.add_middleware("Audit", "global", Vec::<(&str, &str)>::new()).unwrap();

    app.boot().unwrap().execute().unwrap();

    assert_eq!(recorder.entries(), vec!["NotFound", "Audit::global", "Audit::afterRouting"]);
    assert_eq!(response(&app).body(), "custom not found");
}

#[test]
fn test_handler_not_found_with_message() {
    let (_dir, mut app, _sink) = test_app("GET", "/posts/9");
    app.registry().register_fn("Posts", |_| Err(DispatchError::not_found_with("no such post")));
    app.routes(|router| {
        router.get("posts/:id", "Posts", "show")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    let response = response(&app);
    assert_eq!(response.status(), 404);
    assert_eq!(response.body(), "no such post");
}

#[test]
fn test_default_internal_error_response() {
    let (_dir, mut app, _sink) = test_app("GET", "/boom");
    app.registry().register_fn("Broken", |_| Err(anyhow::anyhow!("boom").into()));
    app.routes(|router| {
        router.get("boom", "Broken", "explode")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    let response = response(&app);
    assert_eq!(response.status(), 500);
    assert_eq!(response.body(), "Internal error: boom");
}

#[test]
fn test_unresolvable_class_is_internal_error() {
    let (_dir, mut app, _sink) = test_app("GET", "/ghost");
    app.routes(|router| {
        router.get("ghost", "Ghost", "index")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    let response = response(&app);
    assert_eq!(response.status(), 500);
    assert!(response.body().contains("Ghost"));
}

#[test]
fn test_internal_error_hook_receives_message() {
    let (_dir, mut app, _sink) = test_app("GET", "/boom");
    app.registry().register_fn("Broken", |_| Err(DispatchError::internal("disk full")));
    app.registry().register_fn("Errors", |inv| {
        let failure = inv.service::<Failure>("exception")?;
        assert_eq!(failure.kind, FailureKind::Internal);
        let response = inv.service::<Response>("response")?;
        response.set_status(503).set_body(format!("sorry: {}", failure.message));
        Ok(())
    });
    app.set_hook_key("internal.error", "Errors", "handle").unwrap();
    app.routes(|router| {
        router.get("boom", "Broken", "explode")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    let response = response(&app);
    assert_eq!(response.status(), 503);
    assert_eq!(response.body(), "sorry: disk full");
}

#[test]
fn test_failing_hook_falls_back_to_default_body() {
    let (_dir, mut app, _sink) = test_app("GET", "/missing");
    app.registry().register_fn("Errors", |_| Err(DispatchError::internal("template missing")));
    app.set_hook_key("not.found", "Errors", "notFound").unwrap();
    app.boot().unwrap().execute().unwrap();
    let response = response(&app);
    assert_eq!(response.status(), 500);
    assert_eq!(response.body(), "Internal error: template missing");
}

#[test]
fn test_not_found_hook_stop_ends_dispatch() {
    let (_dir, mut app, _sink) = test_app("GET", "/unknown/path");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Audit", &recorder);
    app.registry().register_fn("Errors", |inv| {
        inv.service::<Response>("response")?.set_status(410).set_body("gone");
        Err(DispatchError::Stop)
    });
    app.set_hook_key("not.found", "Errors", "notFound").unwrap();
    app.set_hook_key("after.routing", "Audit", "afterRouting").unwrap();
    app.add_middleware("Audit", "global", Vec::<(&str, &str)>::new()).unwrap();

    app.boot().unwrap().execute().unwrap();

    assert!(recorder.entries().is_empty());
    let response = response(&app);
    assert_eq!(response.status(), 410);
    assert_eq!(response.body(), "gone");
}

#[test]
fn test_not_found_hook_error_reaches_internal_error_hook() {
    let (_dir, mut app, _sink) = test_app("GET", "/unknown/path");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Audit", &recorder);
    app.registry().register_fn("Errors", |inv| match inv.action() {
        "notFound" => Err(DispatchError::internal("template missing")),
        _ => {
            let failure = inv.service::<Failure>("exception")?;
            assert_eq!(failure.kind, FailureKind::Internal);
            inv.service::<Response>("response")?
                .set_status(503)
                .set_body(format!("sorry: {}", failure.message));
            Ok(())
        }
    });
    app.set_hook_key("not.found", "Errors", "notFound").unwrap();
    app.set_hook_key("internal.error", "Errors", "handle").unwrap();
    app.set_hook_key("after.routing", "Audit", "afterRouting").unwrap();
    app.add_middleware("Audit", "global", Vec::<(&str, &str)>::new()).unwrap();

    app.boot().unwrap().execute().unwrap();

    assert!(recorder.entries().is_empty());
    let response = response(&app);
    assert_eq!(response.status(), 503);
    assert_eq!(response.body(), "sorry: template missing");
}

#[test]
fn test_not_found_hook_signalling_not_found_writes_its_body() {
    let (_dir, mut app, _sink) = test_app("GET", "/unknown/path");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Audit", &recorder);
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    app.registry().register_fn("Errors", move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
        Err(DispatchError::not_found_with("nothing here"))
    });
    app.set_hook_key("not.found", "Errors", "notFound").unwrap();
    app.set_hook_key("after.routing", "Audit", "afterRouting").unwrap();

    app.boot().unwrap().execute().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(recorder.entries().is_empty());
    let response = response(&app);
    assert_eq!(response.status(), 404);
    assert_eq!(response.body(), "nothing here");
}

#[test]
fn test_internal_error_hook_stop_keeps_its_response() {
    let (_dir, mut app, _sink) = test_app("GET", "/boom");
    app.registry().register_fn("Broken", |_| Err(DispatchError::internal("disk full")));
    app.registry().register_fn("Errors", |inv| {
        inv.service::<Response>("response")?.set_status(503).set_body("maintenance");
        Err(DispatchError::Stop)
    });
    app.set_hook_key("internal.error", "Errors", "handle").unwrap();
    app.routes(|router| {
        router.get("boom", "Broken", "explode")?;
        Ok(())
    });

    app.boot().unwrap().execute().unwrap();

    let response = response(&app);
    assert_eq!(response.status(), 503);
    assert_eq!(response.body(), "maintenance");
}

#[test]
fn test_stop_leaves_response_as_is() {
    let (_dir, mut app, _sink) = test_app("GET", "/login");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Audit", &recorder);
    app.registry().register_fn("Auth", |inv| {
        let response = inv.service::<Response>("response")?;
        response.set_status(302).set_header("Location", "/signin");
        Err(DispatchError::Stop)
    });
    app.set_hook_key("after.routing", "Audit", "afterRouting").unwrap();
    app.routes(|router| {
        router.get("login", "Auth", "redirect")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();

    let response = response(&app);
    assert_eq!(response.status(), 302);
    assert_eq!(response.header("location").as_deref(), Some("/signin"));
    assert!(recorder.entries().is_empty());
}

#[test]
fn test_full_lifecycle_order() {
    let (_dir, mut app, _sink) = test_app("GET", "/posts/5");
    let recorder = Recorder::default();
    for class in ["Hooks", "Global", "Posts"] {
        recording_class(app.registry(), class, &recorder);
    }
    let (outer, route_layer) = (recorder.clone(), recorder.clone());
    app.set_hook_key("before.boot", "Hooks", "beforeBoot").unwrap();
    app.set_hook_key("after.boot", "Hooks", "afterBoot").unwrap();
    app.set_hook_key("before.routing", "Hooks", "beforeRouting").unwrap();
    app.set_hook_key("after.routing", "Hooks", "afterRouting").unwrap();
    app.set_hook_key("after.response", "Hooks", "afterResponse").unwrap();
    app.add_middleware("Global", "first", Vec::<(&str, &str)>::new()).unwrap();
    app.add_middleware("Global", "second", [("mode", "strict")]).unwrap();
    app.wrap(move |_: &Resolver, next: Next<'_>| {
        outer.push("wrap before");
        let result = next();
        outer.push("wrap after");
        result
    });
    app.routes(move |router| {
        let route_layer = route_layer.clone();
        router.get("posts/:id", "Posts", "show")?.add_middleware(move |_: &Resolver, next: Next<'_>| {
            route_layer.push("route middleware");
            next()
        });
        Ok(())
    });

    app.boot().unwrap().execute().unwrap().send_response().unwrap();

    assert_eq!(
        recorder.entries(),
        vec![
            "Hooks::beforeBoot",
            "Hooks::afterBoot",
            "Hooks::beforeRouting",
            "wrap before",
            "Global::first",
            "Global::second(mode=strict)",
            "route middleware",
            "Posts::show(id=5)",
            "wrap after",
            "Hooks::afterRouting",
            "Hooks::afterResponse",
        ]
    );
}

#[test]
fn test_global_middleware_error_skips_route() {
    let (_dir, mut app, _sink) = test_app("GET", "/admin");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Admin", &recorder);
    app.registry().register_fn("Firewall", |_| Err(DispatchError::not_found()));
    app.add_middleware("Firewall", "check", Vec::<(&str, &str)>::new()).unwrap();
    app.routes(|router| {
        router.get("admin", "Admin", "index")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    assert!(recorder.entries().is_empty());
    assert_eq!(response(&app).status(), 404);
}

#[test]
fn test_send_response_writes_once_and_runs_hook() {
    let (_dir, mut app, sink) = test_app("GET", "/hello");
    let sends = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&sends);
    app.registry().register_fn("Hello", |inv| set_body(inv, "hello"));
    app.registry().register_fn("After", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    app.set_hook_key("after.response", "After", "log").unwrap();
    app.routes(|router| {
        router.get("hello", "Hello", "index")?;
        Ok(())
    });

    app.boot().unwrap().execute().unwrap();
    app.send_response().unwrap().send_response().unwrap();

    assert_eq!(sink.contents(), "hello");
    assert!(response(&app).is_sent());
    assert_eq!(sends.load(Ordering::SeqCst), 2);
}

#[test]
fn test_routes_are_declared_once() {
    let (_dir, mut app, _sink) = test_app("GET", "/a");
    let recorder = Recorder::default();
    recording_class(app.registry(), "Pages", &recorder);
    app.routes(|router| {
        router.get("a", "Pages", "a")?;
        router.get("b", "Pages", "b")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    app.set_request(Request::new("GET", "/b").unwrap());
    app.execute().unwrap();

    assert_eq!(app.router().unwrap().read().len(), 2);
    assert_eq!(recorder.entries(), vec!["Pages::a", "Pages::b"]);
}

#[test]
fn test_failed_route_load_is_rebuilt_from_scratch() {
    let (dir, mut app, _sink) = test_app("GET", "/b");
    std::fs::write(dir.path().join("routes.yaml"), "- pattern: a\n  class: Pages\n  action: a\n").unwrap();
    let recorder = Recorder::default();
    recording_class(app.registry(), "Pages", &recorder);
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    app.routes(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(ConfigError::UnknownPreset("weekday".into()));
        }
        Ok(())
    });
    app.routes(|router| {
        router.get("b", "Pages", "b")?;
        Ok(())
    });

    app.boot().unwrap().execute().unwrap();
    assert_eq!(response(&app).status(), 500);
    assert!(app.router().unwrap().read().is_empty());
    assert!(recorder.entries().is_empty());

    app.execute().unwrap();
    let patterns: Vec<String> = app
        .router()
        .unwrap()
        .read()
        .routes()
        .iter()
        .map(|r| r.pattern().to_string())
        .collect();
    assert_eq!(patterns, vec!["a", "b"]);
    assert_eq!(recorder.entries(), vec!["Pages::b"]);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    app.execute().unwrap();
    assert_eq!(app.router().unwrap().read().len(), 2);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn test_dispatch_id_follows_request_header() {
    let logs = tracing_util::TestTracing::init();
    let (_dir, mut app, _sink) = test_app("GET", "/");
    let upstream = DispatchId::new();
    let mut request = Request::new("GET", "/").unwrap();
    request.set_header("X-Request-Id", upstream.to_string());
    app.set_request(request);

    app.boot().unwrap().execute().unwrap();

    let span = logs.span("dispatch").unwrap();
    assert_eq!(span.field("dispatch_id"), Some(upstream.to_string().as_str()));
}

#[test]
fn test_invalid_registration_fails_immediately() {
    let (_dir, mut app, _sink) = test_app("GET", "/");
    assert!(matches!(
        app.set_hook_key("before.everything", "Hooks", "run"),
        Err(ConfigError::UnknownHook(_))
    ));
    assert!(matches!(
        app.set_hook(Hook::AfterBoot, "", "run", Vec::<(&str, &str)>::new()),
        Err(ConfigError::InvalidTarget { .. })
    ));
    assert!(matches!(
        app.add_middleware("Global", "not valid", Vec::<(&str, &str)>::new()),
        Err(ConfigError::InvalidTarget { .. })
    ));
    assert!(app.hook(Hook::AfterBoot).is_none());
}

#[test]
fn test_namespace_prefix_resolves_short_names() {
    let (_dir, mut app, _sink) = test_app("GET", "/");
    let recorder = Recorder::default();
    let seen = recorder.clone();
    app.registry().register_fn("App\\Controllers\\Home", move |inv| {
        seen.push(describe("Home", inv));
        Ok(())
    });
    app.set_namespace_prefix("App\\Controllers");
    app.routes(|router| {
        router.get("/", "Home", "index")?;
        Ok(())
    });
    app.boot().unwrap().execute().unwrap();
    assert_eq!(recorder.entries(), vec!["Home::index"]);
}

#[test]
fn test_response_protocol_follows_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut app = mvcore::Core::new(dir.path());
    let request = Request::from_cgi([
        ("REQUEST_METHOD", "GET"),
        ("REQUEST_URI", "/index.php/about?x=1"),
        ("SCRIPT_NAME", "/index.php"),
        ("SERVER_PROTOCOL", "HTTP/1.0"),
    ])
    .unwrap();
    app.set_request(request);
    app.set_response_sink(Box::new(std::io::sink()));
    app.boot().unwrap();
    assert_eq!(response(&app).protocol_version(), "HTTP/1.0");
    assert_eq!(app.container().get::<Request>("request").unwrap().uri(), "about");
}
