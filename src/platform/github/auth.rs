/// Environment variables consulted, in order, when no token is configured.
const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Resolve the GitHub token: explicit configuration first, then the environment.
///
/// Returns `None` when nothing is set; the provider then talks to GitHub
/// anonymously, which works for public repositories.
pub fn resolve_token(configured: Option<&str>) -> Option<String> {
    resolve_token_with(configured, |name| std::env::var(name).ok())
}

fn resolve_token_with<F>(configured: Option<&str>, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = configured.map(str::trim).filter(|t| !t.is_empty()) {
        return Some(token.to_string());
    }

    TOKEN_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_token_wins() {
        let token = resolve_token_with(Some("ghp_config"), |_| Some("ghp_env".into()));
        assert_eq!(token.as_deref(), Some("ghp_config"));
    }

    #[test]
    fn test_env_fallback_order() {
        let token = resolve_token_with(None, |name| match name {
            "GITHUB_TOKEN" => Some("   ".into()),
            "GH_TOKEN" => Some("gho_cli".into()),
            _ => None,
        });
        assert_eq!(token.as_deref(), Some("gho_cli"));
    }

    #[test]
    fn test_blank_config_falls_through() {
        let token = resolve_token_with(Some(""), |_| None);
        assert_eq!(token, None);
    }
}
