use rand::prelude::IndexedRandom;

/// Picks one template uniformly at random and fills it in. Variety is the
/// point; callers that need determinism pass a single-element slice.
pub fn compose(templates: &[String], target: &str, reason: &str) -> String {
    let template = templates
        .choose(&mut rand::rng())
        .map(String::as_str)
        .unwrap_or("已将 {target} 移出群聊，理由：{reason}");
    fill(template, target, reason)
}

/// Named placeholder substitution. Placeholders the template does not
/// carry are simply ignored; this never fails.
fn fill(template: &str, target: &str, reason: &str) -> String {
    template
        .replace("{target}", target)
        .replace("{user_id}", target)
        .replace("{reason}", reason)
}
