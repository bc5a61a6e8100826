//! A test client for the whole site: one in-memory database, a cookie jar for
//! the session and an outbox in place of Mailgun.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::SqlitePool;
use tower::ServiceExt;

use seglarklubb::config::Config;
use seglarklubb::email::{Mailer, OutgoingEmail};
use seglarklubb::models::member::{Member, NewMember};
use seglarklubb::state::AppState;
use seglarklubb::util::hash_password;

pub const PASSWORD: &str = "segla hela dagen";

#[derive(Default)]
pub struct Outbox(Mutex<Vec<OutgoingEmail>>);

#[async_trait]
impl Mailer for Outbox {
    async fn deliver(&self, email: OutgoingEmail) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(email);
        Ok(())
    }
}

impl Outbox {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> OutgoingEmail {
        self.0.lock().unwrap().last().cloned().expect("no email was sent")
    }

    /// The path of the link in the last email, e.g. `/activate/abc123`
    pub fn last_link(&self) -> String {
        let html = self.last().html;
        let start = html.find("http://localhost/").expect("the email has a link") + "http://localhost".len();
        html[start..]
            .chars()
            .take_while(|c| *c != '"' && *c != '<')
            .collect()
    }
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub outbox: Arc<Outbox>,
    cookie: Option<String>,
}

pub struct Page {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl Page {
    pub fn redirects_to(&self, path: &str) -> bool {
        self.status == StatusCode::SEE_OTHER && self.location.as_deref() == Some(path)
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::for_testing()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let pool = seglarklubb::db::connect(&config.database_url)
            .await
            .expect("Failed to open the test database");
        let outbox = Arc::new(Outbox::default());
        let state = AppState::with_mailer(pool.clone(), config, outbox.clone());
        let router = seglarklubb::build_app(state)
            .await
            .expect("Failed to build the app");

        Self {
            router,
            pool,
            outbox,
            cookie: None,
        }
    }

    /// The `id=...` session cookie the client currently holds.
    pub fn session_cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Sends a cookie from an earlier session from now on.
    pub fn use_session_cookie(&mut self, cookie: &str) {
        self.cookie = Some(cookie.to_owned());
    }

    /// Forgets the session, like a visitor with a fresh browser.
    pub fn clear_cookies(&mut self) {
        self.cookie = None;
    }

    pub async fn send(&mut self, request: Request<Body>) -> Page {
        let response = self.router.clone().oneshot(request).await.unwrap();
        self.read(response).await
    }

    async fn read(&mut self, response: Response<Body>) -> Page {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let value = value.to_str().unwrap();
            let pair = value.split(';').next().unwrap().trim();
            if pair.starts_with("id=") {
                let removed = pair == "id=" || value.contains("Max-Age=0");
                self.cookie = if removed { None } else { Some(pair.to_owned()) };
            }
        }

        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|value| value.to_str().unwrap().to_owned());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        Page {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// Starts a request carrying the session cookie.
    pub fn request(&self, method: &str, path: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&mut self, path: &str) -> Page {
        let request = self.request("GET", path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// Posts a form exactly as given, without adding a CSRF token.
    pub async fn post_raw(&mut self, path: &str, fields: &[(&str, &str)]) -> Page {
        let request = self
            .request("POST", path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(encode_form(fields)))
            .unwrap();
        self.send(request).await
    }

    /// Posts a form the way a browser would, with the session's CSRF token.
    pub async fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> Page {
        let token = self.csrf_token().await;
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", &token));
        self.post_raw(path, &fields).await
    }

    /// Follows a redirect and returns the page it leads to.
    pub async fn follow(&mut self, page: Page) -> Page {
        assert_eq!(page.status, StatusCode::SEE_OTHER, "not a redirect: {}", page.body);
        let location = page.location.expect("redirect without a location");
        self.get(&location).await
    }

    /// Loads a page with a form and reads the CSRF token out of it.
    pub async fn csrf_token(&mut self) -> String {
        let page = self.get("/forgot-password").await;
        scrape_csrf_token(&page.body)
    }

    pub async fn log_in(&mut self, email: &str, password: &str) -> Page {
        self.post("/login", &[("email", email), ("password", password)])
            .await
    }

    /// Adds a member with an activated login.
    pub async fn member(&self, email: &str, first_name: &str, is_admin: bool) -> Member {
        let id = Member::create(
            NewMember {
                email: email.to_owned(),
                first_name: first_name.to_owned(),
                last_name: "Berg".to_owned(),
                is_admin,
                ..Default::default()
            },
            &self.pool,
        )
        .await
        .unwrap();
        let hash = hash_password(PASSWORD, 4).await.unwrap();
        Member::set_password(email, &hash, &self.pool).await.unwrap();
        Member::with_id(id, &self.pool).await.unwrap()
    }

    /// Adds an administrator and logs in as them.
    pub async fn logged_in_admin(&mut self) -> Member {
        let admin = self.member("styrelsen@example.org", "Stina", true).await;
        let page = self.log_in(&admin.email, PASSWORD).await;
        assert!(page.redirects_to("/"), "admin login failed: {:?}", page.location);
        admin
    }

    pub async fn logged_in_member(&mut self) -> Member {
        let member = self.member("anna@example.org", "Anna", false).await;
        let page = self.log_in(&member.email, PASSWORD).await;
        assert!(page.redirects_to("/"), "member login failed: {:?}", page.location);
        member
    }
}

pub fn scrape_csrf_token(html: &str) -> String {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker).expect("the page has no CSRF token") + marker.len();
    html[start..].chars().take_while(|c| *c != '"').collect()
}

fn encode_form(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(name, value)| format!("{}={}", encode(name), encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(value: &str) -> String {
    value
        .bytes()
        .map(|byte| match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (byte as char).to_string()
            }
            b' ' => "+".to_owned(),
            _ => format!("%{byte:02X}"),
        })
        .collect()
}
