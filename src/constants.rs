//! Embedded metadata for tokens the tracker knows out of the box.

use std::sync::OnceLock;

use crate::config::TokenConfig;

/// Static list of builtin tokens loaded from data/builtin_tokens.json
static BUILTIN_TOKENS: OnceLock<Vec<TokenConfig>> = OnceLock::new();

/// Builtin token metadata, loaded once from the embedded JSON list.
///
/// User config entries take precedence over these on symbol collisions;
/// the merge happens during config loading.
pub fn builtin_tokens() -> &'static [TokenConfig] {
    BUILTIN_TOKENS.get_or_init(|| {
        serde_json::from_str(include_str!("../data/builtin_tokens.json")).unwrap_or_else(|e| {
            eprintln!("Failed to load builtin token list: {}", e);
            vec![]
        })
    })
}
