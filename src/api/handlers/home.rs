use axum::response::Html;

const HOME_PAGE: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>didgate</title>
  </head>
  <body>
    <h1>didgate</h1>
    <p>Request a challenge from <code>GET /login</code>, sign it with your DID wallet
    and submit the signature to <code>POST /verify</code> as <code>{"sign": ...}</code>.</p>
  </body>
</html>
"#;

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Home page"),
    ),
    tag = "gateway"
)]
pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}
