// Reserved username deny list.

use std::collections::HashSet;
use std::sync::OnceLock;

/// Usernames that can never be registered: system/admin names, route
/// segments, and common placeholder values.
const RESERVED_USERNAMES: &[&str] = &[
    // System/admin
    "admin", "administrator", "root", "system", "sys", "moderator", "mod",
    // Service/API
    "api", "service", "services", "www", "mail", "email", "support", "help",
    "info", "contact", "about", "terms", "privacy", "legal",
    // Placeholder values
    "null", "undefined", "true", "false", "test", "testing", "demo",
    "example", "sample",
    // Auth routes
    "auth", "login", "logout", "register", "registration", "signup",
    "signin", "signout", "password", "reset", "verify", "verification",
    // User management routes
    "user", "users", "account", "accounts", "profile", "profiles",
    "settings",
    // Common paths
    "home", "index", "dashboard", "app", "application", "blog", "news",
    "feed", "search", "explore",
];

fn reserved_set() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| RESERVED_USERNAMES.iter().copied().collect())
}

/// Case-insensitive check against the deny list.
pub fn is_reserved(username: &str) -> bool {
    reserved_set().contains(username.trim().to_lowercase().as_str())
}
