use http::Method;
use mvcore::router::{Route, Router};
use proptest::prelude::*;

fn arb_segments() -> impl Strategy<Value = Vec<(String, String)>> {
    // (literal prefix segment, token value) pairs
    prop::collection::vec(("[a-z]{1,6}", "[a-zA-Z0-9_-]{1,8}"), 1..5)
}

fn arb_method() -> impl Strategy<Value = Method> {
    prop::sample::select(vec![
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ])
}

fn build(segments: &[(String, String)]) -> (String, String) {
    let pattern: Vec<String> = segments
        .iter()
        .enumerate()
        .map(|(i, (literal, _))| format!("{literal}/:t{i}"))
        .collect();
    let uri: Vec<String> = segments
        .iter()
        .map(|(literal, value)| format!("{literal}/{value}"))
        .collect();
    (pattern.join("/"), uri.join("/"))
}

proptest! {
    #[test]
    fn prop_default_tokens_capture_in_order(segments in arb_segments()) {
        let (pattern, uri) = build(&segments);
        let route = Route::new(&pattern, Method::GET, "C", "a").unwrap();
        let params = route.match_request(&uri, &Method::GET);
        prop_assert!(params.is_some(), "{} should match {}", pattern, uri);
        let params = params.unwrap();
        let got: Vec<(String, String)> = params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let want: Vec<(String, String)> = segments
            .iter()
            .enumerate()
            .map(|(i, (_, value))| (format!("t{i}"), value.clone()))
            .collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn prop_other_methods_never_match(segments in arb_segments(), allowed in arb_method(), other in arb_method()) {
        prop_assume!(allowed != other);
        let (pattern, uri) = build(&segments);
        let route = Route::new(&pattern, allowed.clone(), "C", "a").unwrap();
        prop_assert!(route.matches(&uri, &allowed));
        prop_assert!(!route.matches(&uri, &other));
    }

    #[test]
    fn prop_override_only_touches_its_parameter(
        number in "[0-9]{1,6}",
        word in "[a-z]{1,6}",
        other in "[a-zA-Z_-]{1,6}",
    ) {
        let mut route = Route::new("x/:n/:w", Method::GET, "C", "a").unwrap();
        route.where_regex("n", "[0-9]+").unwrap();
        let number_word = format!("x/{number}/{word}");
        let other_word = format!("x/{other}/{word}");
        let number_other = format!("x/{number}/{other}");
        prop_assert!(route.matches(&number_word, &Method::GET));
        prop_assert!(!route.matches(&other_word, &Method::GET));
        prop_assert!(route.matches(&number_other, &Method::GET));
    }

    #[test]
    fn prop_first_registered_route_wins(value in "[a-z0-9]{1,10}") {
        let mut router = Router::new();
        router.get("item/:id", "Items", "first").unwrap();
        router.get("item/:slug", "Items", "second").unwrap();
        let m = router.route(&format!("item/{value}"), &Method::GET).unwrap();
        prop_assert_eq!(m.index, 0);
        prop_assert_eq!(m.param("id"), Some(value.as_str()));
    }
}
