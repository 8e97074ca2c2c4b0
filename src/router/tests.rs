use super::*;
use crate::kernel::RouteTarget;
use crate::middleware::MiddlewareDecl;
use crate::server::Response;
use http::Method;

fn target() -> RouteTarget {
    RouteTarget::from_fn(|| Response::text(200, "ok"))
}

fn named(name: &str) -> RouteOptions {
    RouteOptions {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

#[test]
fn test_root_path() {
    let t = PathTemplate::compile("/").unwrap();
    assert!(t.captures("/").is_some());
    assert!(t.param_names().is_empty());
}

#[test]
fn test_parameterized_path() {
    let t = PathTemplate::compile("/items/{id}").unwrap();
    let params = t.captures("/items/123").unwrap();
    assert_eq!(params[0].0.as_ref(), "id");
    assert_eq!(params[0].1, "123");
    assert!(t.captures("/items").is_none());
    assert!(t.captures("/items/1/2").is_none());
}

#[test]
fn test_literal_text_around_parameter() {
    let t = PathTemplate::compile("/files/{name}.json").unwrap();
    let params = t.captures("/files/report.json").unwrap();
    assert_eq!(params[0].1, "report");
    assert!(t.captures("/files/report.xml").is_none());
}

#[test]
fn test_regex_metacharacters_are_literal() {
    let t = PathTemplate::compile("/v1.0/a+b").unwrap();
    assert!(t.captures("/v1.0/a+b").is_some());
    assert!(t.captures("/v1x0/aab").is_none());
}

#[test]
fn test_optional_parameter_must_trail() {
    assert!(PathTemplate::compile("/posts/{page?}").is_ok());
    assert!(matches!(
        PathTemplate::compile("/posts/{page?}/edit"),
        Err(RouteError::InvalidTemplate { .. })
    ));
    assert!(PathTemplate::compile("/posts-{page?}").is_err());
}

#[test]
fn test_malformed_templates_rejected() {
    assert!(PathTemplate::compile("/a/{id").is_err());
    assert!(PathTemplate::compile("/a/id}").is_err());
    assert!(PathTemplate::compile("/a/{}").is_err());
    assert!(PathTemplate::compile("/a/{id}/b/{id}").is_err());
}

#[test]
fn test_optional_root_parameter() {
    let t = PathTemplate::compile("/{lang?}").unwrap();
    assert!(t.captures("/").unwrap().is_empty());
    assert_eq!(t.captures("/en").unwrap()[0].1, "en");
}

#[test]
fn test_params_are_percent_decoded() {
    let t = PathTemplate::compile("/tags/{tag}").unwrap();
    assert_eq!(t.captures("/tags/caf%C3%A9").unwrap()[0].1, "café");
}

#[test]
fn test_full_path_composition() {
    let mut r = Router::new();
    assert_eq!(r.full_path(""), "/");
    assert_eq!(r.full_path("users"), "/users");
    r.push_prefix("/api/");
    r.push_prefix("v1");
    assert_eq!(r.full_path("/users/{id}"), "/api/v1/users/{id}");
    assert_eq!(r.full_path(""), "/api/v1");
    assert_eq!(r.pop_prefix().as_deref(), Some("v1"));
    assert_eq!(r.full_path("/"), "/api");
    r.pop_prefix();
    assert_eq!(r.full_path("/"), "/");
}

#[test]
fn test_first_registered_wins() {
    let mut r = Router::new();
    let first = r
        .add_route(Method::GET, "/users/{id}", target(), RouteOptions::default())
        .unwrap();
    r.add_route(Method::GET, "/users/me", target(), RouteOptions::default())
        .unwrap();
    let m = r.match_route(&Method::GET, "/users/me", None).matched.unwrap();
    assert_eq!(m.id, first);
}

#[test]
fn test_trailing_slash_is_ignored() {
    let mut r = Router::new();
    r.add_route(Method::GET, "/users", target(), RouteOptions::default())
        .unwrap();
    assert!(r.match_route(&Method::GET, "/users/", None).matched.is_some());
}

#[test]
fn test_allowed_methods_accumulate_across_routes() {
    let mut r = Router::new();
    r.add_route(Method::GET, "/things/{id}", target(), RouteOptions::default())
        .unwrap();
    r.add_route(Method::PUT, "/things/{id}", target(), RouteOptions::default())
        .unwrap();
    r.add_route(Method::DELETE, "/things/{slug}", target(), RouteOptions::default())
        .unwrap();
    let outcome = r.match_route(&Method::POST, "/things/9", None);
    assert!(outcome.matched.is_none());
    assert_eq!(
        outcome.allowed_methods,
        vec![Method::GET, Method::PUT, Method::DELETE]
    );

    let none = r.match_route(&Method::GET, "/nothing", None);
    assert!(none.matched.is_none());
    assert!(none.allowed_methods.is_empty());
}

#[test]
fn test_host_constraint_filters_before_path() {
    let mut r = Router::new();
    r.add_route(
        Method::GET,
        "/",
        target(),
        RouteOptions {
            host: Some(HostConstraint::parse("admin.example.com").unwrap()),
            name: Some("admin".into()),
            ..Default::default()
        },
    )
    .unwrap();
    let public = r
        .add_route(Method::POST, "/", target(), RouteOptions::default())
        .unwrap();

    // Host-ineligible route contributes nothing to the allowed set.
    let outcome = r.match_route(&Method::GET, "/", Some("www.example.com"));
    assert!(outcome.matched.is_none());
    assert_eq!(outcome.allowed_methods, vec![Method::POST]);

    let admin = r.match_route(&Method::GET, "/", Some("ADMIN.example.com"));
    assert_eq!(admin.matched.unwrap().route.name.as_deref(), Some("admin"));

    let post = r.match_route(&Method::POST, "/", None);
    assert_eq!(post.matched.unwrap().id, public);
}

#[test]
fn test_url_for_required_and_optional() {
    let mut r = Router::new();
    r.add_route(Method::GET, "/archive/{year}/{month?}", target(), named("archive"))
        .unwrap();
    assert_eq!(
        r.url_for("archive", [("year", "2024")], None).unwrap(),
        "/archive/2024"
    );
    assert_eq!(
        r.url_for("archive", [("year", "2024"), ("month", "05")], None)
            .unwrap(),
        "/archive/2024/05"
    );
    assert_eq!(
        r.url_for("archive", Vec::<(&str, &str)>::new(), None),
        Err(RouteError::MissingParameter {
            route: "archive".into(),
            param: "year".into()
        })
    );
    assert!(matches!(
        r.url_for("nope", [("a", "b")], None),
        Err(RouteError::UnknownName(_))
    ));
}

#[test]
fn test_url_for_appends_encoded_query() {
    let mut r = Router::new();
    r.add_route(Method::GET, "/search", target(), named("search"))
        .unwrap();
    let url = r
        .url_for(
            "search",
            Vec::<(&str, &str)>::new(),
            Some(&[("q", "rust lang"), ("page", "2")]),
        )
        .unwrap();
    assert_eq!(url, "/search?q=rust+lang&page=2");
}

#[test]
fn test_update_route_renames_and_merges() {
    let mut r = Router::new();
    let id = r
        .add_route(Method::GET, "/users/{id}", target(), named("old"))
        .unwrap();
    r.update_route(
        id,
        RouteUpdate {
            name: Some("users.show".into()),
            middleware: Some(vec![MiddlewareDecl::parse("auth")]),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(r.route_by_name("old").is_none());
    assert_eq!(r.url_for("users.show", [("id", 7)], None).unwrap(), "/users/7");
    assert_eq!(r.route(id).unwrap().middleware.len(), 1);
    assert_eq!(
        r.update_route(RouteId(99), RouteUpdate::default()),
        Err(RouteError::UnknownRoute(99))
    );
}
