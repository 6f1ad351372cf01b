use crate::config::RewriteRule;

/// Rewrite `path` with the configured rule. `None` when the rule does not match
/// or the rewrite leaves nothing to serve.
pub(crate) fn rewrite(rule: &RewriteRule, path: &str) -> Option<String> {
    let rewritten = rule.apply(path)?;
    let trimmed = rewritten.trim_start_matches('/');
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
