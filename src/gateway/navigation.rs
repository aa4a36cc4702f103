use parking_lot::RwLock;

/// Collaborator that owns the UI's location. The gateway and route guard only ask where
/// the user is and tell it where to go.
pub trait Navigator: Send + Sync {
    fn current_location(&self) -> Option<String>;
    fn navigate(&self, to: &str);
}

/// Login route with the originating location preserved as `?from=`.
pub fn login_redirect(login_route: &str, from: Option<&str>) -> String {
    match from.filter(|f| !f.is_empty() && !is_login_location(login_route, f)) {
        Some(f) => format!("{}?from={}", login_route, urlencoding::encode(f)),
        None => login_route.to_string(),
    }
}

/// Where to go after a successful login: the preserved origin, or `/`.
pub fn post_login_target(from: Option<&str>) -> String {
    match from.map(str::trim).filter(|f| f.starts_with('/') && !f.starts_with("//")) {
        Some(f) => f.to_string(),
        None => "/".to_string(),
    }
}

/// Extract and decode the `from` parameter of a login location.
pub fn origin_from_login_location(location: &str) -> Option<String> {
    let (_, query) = location.split_once('?')?;
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "from")
        .and_then(|(_, v)| urlencoding::decode(v).ok())
        .map(|v| v.into_owned())
}

fn is_login_location(login_route: &str, location: &str) -> bool {
    let path = location.split(&['?', '#'][..]).next().unwrap_or(location);
    path == login_route
}

/// In-memory navigation history. Used by the CLI and by embedding code without a real UI.
#[derive(Debug, Default)]
pub struct History {
    entries: RwLock<Vec<String>>,
}

impl History {
    pub fn starting_at(location: &str) -> Self {
        Self { entries: RwLock::new(vec![location.to_string()]) }
    }

    pub fn entries(&self) -> Vec<String> { self.entries.read().clone() }

    /// Number of times `navigate` was called with a location starting with `prefix`.
    pub fn count_prefixed(&self, prefix: &str) -> usize {
        self.entries.read().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

impl Navigator for History {
    fn current_location(&self) -> Option<String> { self.entries.read().last().cloned() }
    fn navigate(&self, to: &str) { self.entries.write().push(to.to_string()); }
}
