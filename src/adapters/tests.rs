use super::*;

#[test]
fn test_method_parsing() {
    assert_eq!(Method::try_from("get"), Ok(Method::Get));
    assert_eq!(Method::try_from(" PATCH "), Ok(Method::Patch));
    assert_eq!(Method::try_from(""), Err(RequestError::MissingMethod));
    assert_eq!(
        Method::try_from("BREW"),
        Err(RequestError::InvalidMethod("BREW".to_string()))
    );
}

#[test]
fn test_request_error_display() {
    assert_eq!(
        RequestError::InvalidMethod("BREW".into()).to_string(),
        "Invalid HTTP method: BREW"
    );
    assert_eq!(
        RequestError::MissingMethod.to_string(),
        "HTTP method not specified"
    );
}

#[test]
fn test_validate_uri() {
    assert_eq!(validate_uri("/path?q=1"), Ok("/path?q=1"));
    assert_eq!(
        validate_uri("/a\0b"),
        Err(RequestError::InvalidUri("/a%00b".to_string()))
    );
}

#[test]
fn test_methods_allowing_body() {
    let with_body: Vec<_> = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Patch,
        Method::Head,
        Method::Options,
    ]
    .into_iter()
    .filter(Method::allows_body)
    .collect();

    assert_eq!(with_body, vec![Method::Post, Method::Put, Method::Patch]);
}

#[test]
fn test_header_env_name() {
    assert_eq!(header_env_name("X-Requested-With"), "HTTP_X_REQUESTED_WITH");
    assert_eq!(header_env_name("accept"), "HTTP_ACCEPT");
    assert_eq!(header_env_name("Content-Type"), "CONTENT_TYPE");
    assert_eq!(header_env_name("content-length"), "CONTENT_LENGTH");
}

#[test]
fn test_host_request_env_vars() {
    let request = HostRequest::post("/login")
        .with_content_type("application/json")
        .with_header("X-CSRF-TOKEN", "abc")
        .with_raw_cookie_header("laravel_session=s1")
        .with_cookie("XSRF-TOKEN", "t1")
        .with_body(br#"{"a":1}"#.to_vec());

    let vars = request.env_vars();
    let map: std::collections::HashMap<_, _> = vars.into_iter().collect();

    assert_eq!(map.get("CONTENT_TYPE").map(String::as_str), Some("application/json"));
    assert_eq!(map.get("HTTP_X_CSRF_TOKEN").map(String::as_str), Some("abc"));
    assert_eq!(
        map.get("HTTP_COOKIE").map(String::as_str),
        Some("laravel_session=s1; XSRF-TOKEN=t1")
    );
    assert_eq!(request.body(), Some(&br#"{"a":1}"#[..]));
}

#[test]
fn test_host_request_without_cookies() {
    let request = HostRequest::get("/");
    assert_eq!(request.cookie_header(), None);
    assert!(request.env_vars().is_empty());
    assert_eq!(request.body(), None);
}

#[test]
fn test_management_command_parse() {
    let cmd = ManagementCommand::parse("migrate  --force   --seed");
    assert_eq!(cmd.args(), ["migrate", "--force", "--seed"]);
    assert_eq!(cmd.argv(), vec!["php", "migrate", "--force", "--seed"]);
}

#[test]
fn test_management_command_empty() {
    let cmd = ManagementCommand::parse("   ");
    assert!(cmd.is_empty());
    assert_eq!(cmd.argv(), vec!["php"]);
}

#[test]
fn test_management_command_caps_argv() {
    let line = vec!["x"; 300].join(" ");
    let cmd = ManagementCommand::parse(&line);

    assert_eq!(cmd.argv().len(), MAX_ARGV);
    assert_eq!(cmd.args().len(), MAX_ARGV - 1);
}

#[test]
fn test_management_command_builder() {
    let cmd = ManagementCommand::new()
        .with_args(["route:list"])
        .with_env("APP_ENV", "testing")
        .with_working_dir("/app");

    assert_eq!(cmd.env_vars(), [("APP_ENV".to_string(), "testing".to_string())]);
    assert_eq!(cmd.working_dir(), Some(std::path::Path::new("/app")));
}

#[cfg(feature = "http")]
#[test]
fn test_from_http_request() {
    let req = http::Request::builder()
        .method("PUT")
        .uri("http://127.0.0.1/profile?tab=2")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("cookie", "a=1")
        .body(b"name=x".to_vec())
        .unwrap();

    let request = from_http_request(req).unwrap();

    assert_eq!(request.method(), Method::Put);
    assert_eq!(request.uri(), "/profile?tab=2");
    assert_eq!(request.body(), Some(&b"name=x"[..]));
    assert_eq!(request.cookie_header().as_deref(), Some("a=1"));
}

#[cfg(feature = "http")]
#[test]
fn test_from_http_request_rejects_unknown_method() {
    let req = http::Request::builder()
        .method("PROPFIND")
        .uri("/")
        .body(Vec::<u8>::new())
        .unwrap();

    assert_eq!(
        from_http_request(req).unwrap_err(),
        RequestError::InvalidMethod("PROPFIND".to_string())
    );
}
