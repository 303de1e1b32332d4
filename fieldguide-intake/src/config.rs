//! Configuration resolution for fieldguide-intake
//!
//! The signed-in guide identity is resolved with Database → ENV → TOML
//! priority. No identity is not an error here: the intake session reports
//! "Not logged in." when it starts.

use fieldguide_common::config::TomlConfig;
use fieldguide_common::Result;
use sqlx::{Pool, Sqlite};
use tracing::{info, warn};

/// Environment variable holding the guide's user id
pub const GUIDE_USER_ENV: &str = "FIELDGUIDE_GUIDE_USER";

/// Resolve the signed-in guide's user id from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_guide_user(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Option<String>> {
    let db_user = crate::db::settings::get_guide_user_id(db)
        .await?
        .filter(|u| is_valid_user_id(u));
    let env_user = std::env::var(GUIDE_USER_ENV)
        .ok()
        .filter(|u| is_valid_user_id(u));
    let toml_user = toml_config
        .guide_user_id
        .clone()
        .filter(|u| is_valid_user_id(u));

    let candidates = [
        ("database", db_user),
        ("environment", env_user),
        ("TOML", toml_user),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(_, user)| user.is_some())
        .map(|(source, _)| *source)
        .collect();
    if sources.len() > 1 {
        warn!(
            "Guide user found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    match candidates.into_iter().find_map(|(source, user)| user.map(|u| (source, u))) {
        Some((source, user)) => {
            info!(user = %user, "Guide user loaded from {}", source);
            Ok(Some(user))
        }
        None => {
            warn!(
                "No guide user configured. Sign in with POST /session/start, set {}, or add guide_user_id to the TOML config",
                GUIDE_USER_ENV
            );
            Ok(None)
        }
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.trim().is_empty()
}
