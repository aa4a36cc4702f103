//!
//! careway CLI binary
//! ------------------
//! Command-line client for the booking platform API. Keeps the credential record in a
//! local directory so a login survives across invocations, and sends every call through
//! the same gateway the application uses.

use std::env;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast::error::TryRecvError;
use tracing_subscriber::{fmt, EnvFilter};

use careway::gateway::{post_login_target, ApiClient, History, Navigator};
use careway::identity::{AuthService, LoginRequest, RegisterRequest, SessionStore};
use careway::notify::NotificationHub;
use careway::storage::FileBackend;
use careway::GatewayConfig;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [flags] login <email> <password>\n  {program} [flags] register --email <e> --password <p> --first-name <f> --last-name <l> [--phone <n>] [--country <c>] [--role <r>]\n  {program} [flags] logout\n  {program} [flags] whoami\n  {program} [flags] get <path>\n  {program} [flags] forgot-password <email>\n  {program} [flags] reset-password <token> <new_password>\n\nFlags:\n  --config <file>          JSON config file (api_url, timeout_ms, login_route, credentials_dir)\n  --api <url>              API base URL (env CAREWAY_API_URL, default http://127.0.0.1:8080)\n  --dir <path>             Credential directory (env CAREWAY_CREDENTIALS_DIR, default .careway)\n  --timeout-ms <n>         Per-request timeout (env CAREWAY_TIMEOUT_MS, default 30000)\n  --from <route>           Route to report after login (as if redirected from it)\n  -h, --help               Show this help\n\nExamples:\n  {program} login a@b.com 'Secret123!'\n  {program} get /api/reservations/my\n  {program} --api https://api.example.com whoami"
    );
}

fn take_value(args: &[String], i: usize, flag: &str, program: &str) -> String {
    match args.get(i + 1) {
        Some(v) => v.clone(),
        None => {
            eprintln!("{} requires a value", flag);
            print_usage(program);
            std::process::exit(2);
        }
    }
}

fn parse_register(args: &[String], program: &str) -> Result<RegisterRequest> {
    let mut req = RegisterRequest::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        let v = take_value(args, i, flag, program);
        match flag {
            "--email" => req.email = v,
            "--password" => req.password = v,
            "--first-name" => req.first_name = v,
            "--last-name" => req.last_name = v,
            "--phone" => req.phone = Some(v),
            "--country" => req.country = Some(v),
            "--role" => req.role = Some(v),
            unk => return Err(anyhow!("unrecognized register flag: {}", unk)),
        }
        i += 2;
    }
    if req.email.is_empty() || req.password.is_empty() {
        return Err(anyhow!("register requires --email and --password"));
    }
    Ok(req)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid log filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let mut args: Vec<String> = env::args().collect();
    let program = args.remove(0);

    let mut config_path: Option<String> = None;
    let mut api: Option<String> = None;
    let mut dir: Option<String> = None;
    let mut timeout_ms: Option<u64> = None;
    let mut from: Option<String> = None;
    let mut rest: Vec<String> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => { config_path = Some(take_value(&args, i, "--config", &program)); i += 2; continue; }
            "--api" => { api = Some(take_value(&args, i, "--api", &program)); i += 2; continue; }
            "--dir" => { dir = Some(take_value(&args, i, "--dir", &program)); i += 2; continue; }
            "--timeout-ms" => {
                let v = take_value(&args, i, "--timeout-ms", &program);
                timeout_ms = Some(v.parse().with_context(|| format!("invalid --timeout-ms '{}'", v))?);
                i += 2; continue;
            }
            "--from" => { from = Some(take_value(&args, i, "--from", &program)); i += 2; continue; }
            "-h" | "--help" => { print_usage(&program); return Ok(()); }
            _ => { rest = args[i..].to_vec(); break; }
        }
    }

    // file, then environment, then flags
    let mut config = match &config_path {
        Some(p) => GatewayConfig::load_file(p)?.with_overrides(|k| env::var(k).ok()),
        None => GatewayConfig::from_env(),
    };
    if let Some(v) = api { config.api_url = v; }
    if let Some(v) = dir { config.credentials_dir = v.into(); }
    if let Some(v) = timeout_ms.filter(|ms| *ms > 0) { config.timeout_ms = v; }
    if rest.is_empty() {
        print_usage(&program);
        std::process::exit(2);
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?;
    rt.block_on(run(&program, config, from, rest))
}

async fn run(program: &str, config: GatewayConfig, from: Option<String>, rest: Vec<String>) -> Result<()> {
    let backend = FileBackend::open(&config.credentials_dir)
        .with_context(|| format!("Failed to open credential store at {}", config.credentials_dir.display()))?;
    let sessions = Arc::new(SessionStore::new(Arc::new(backend)));
    sessions.hydrate();

    let start = match rest[0].as_str() {
        "get" => rest.get(1).cloned().unwrap_or_else(|| "/".into()),
        _ => "/".to_string(),
    };
    let history = Arc::new(History::starting_at(&start));
    let hub = Arc::new(NotificationHub::default());
    let mut notifications = hub.subscribe();
    let client = ApiClient::new(&config, sessions.clone(), history.clone(), hub.clone())?;
    let auth = AuthService::new(client.clone());

    let outcome = dispatch(program, &auth, &client, from, &rest).await;

    loop {
        match notifications.try_recv() {
            Ok(n) => eprintln!("[{}] {} ({})", n.kind, n.message, n.code),
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    if let Some(loc) = history.current_location().filter(|l| l.starts_with(client.login_route())) {
        eprintln!("session expired; sign in again (redirected to {})", loc);
    }
    outcome
}

async fn dispatch(program: &str, auth: &AuthService, client: &ApiClient, from: Option<String>, rest: &[String]) -> Result<()> {
    match rest[0].as_str() {
        "login" => {
            let (Some(email), Some(password)) = (rest.get(1), rest.get(2)) else {
                print_usage(program);
                std::process::exit(2);
            };
            let req = LoginRequest { email: email.clone(), password: password.clone() };
            // login suppresses the global notification, so show the message here
            let session = auth.login(&req).await.map_err(|e| anyhow!("login failed: {}", e.message()))?;
            if let Some(user) = &session.user {
                println!("signed in as {} ({})", user.display_name(), user.roles.join(", "));
            }
            println!("continue at {}", post_login_target(from.as_deref()));
        }
        "register" => {
            let req = parse_register(&rest[1..], program)?;
            let session = auth.register(&req).await?;
            if let Some(user) = &session.user {
                println!("registered and signed in as {}", user.email);
            }
        }
        "logout" => {
            auth.logout().await;
            println!("signed out");
        }
        "whoami" => {
            let session = auth.session();
            match &session.user {
                Some(user) => println!("{}", serde_json::to_string_pretty(&user.to_value())?),
                None => println!("not signed in"),
            }
        }
        "get" => {
            let path = rest.get(1).map(String::as_str).unwrap_or("/");
            let resp = client.get(path).await?;
            println!("{}", serde_json::to_string_pretty(&resp.body)?);
        }
        "forgot-password" => {
            let Some(email) = rest.get(1) else {
                print_usage(program);
                std::process::exit(2);
            };
            auth.forgot_password(email).await?;
            println!("if the account exists, a reset link has been sent");
        }
        "reset-password" => {
            let (Some(token), Some(pw)) = (rest.get(1), rest.get(2)) else {
                print_usage(program);
                std::process::exit(2);
            };
            auth.reset_password(token, pw).await?;
            println!("password updated");
        }
        unk => {
            eprintln!("Unrecognized command: {}", unk);
            print_usage(program);
            std::process::exit(2);
        }
    }
    Ok(())
}
