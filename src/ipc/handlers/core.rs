use crate::config::{normalize_base_url, DEFAULT_API_BASE_URL};
use crate::db;
use crate::ipc::error::{err, ok, respond, HandlerErr};
use crate::ipc::types::{AppState, BaseUrlSource, Request};
use crate::session::AUTH_FLAG_COOKIE;
use serde_json::json;
use std::path::PathBuf;

const BASE_URL_SETTING: &str = "config.apiBaseUrl";

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "apiBaseUrl": state.backend.base_url(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let conn = match db::open_db(&path) {
        Ok(conn) => conn,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };

    // Persisted session wins; otherwise keep whatever was established in memory.
    let session_restored = match restore_session(state, &conn) {
        Ok(v) => v,
        Err(e) => return HandlerErr::db(e).response(&req.id),
    };

    match db::settings_get_json(&conn, BASE_URL_SETTING) {
        Ok(Some(v)) => {
            if let Some(url) = v.as_str() {
                if state.config.apply_persisted_base_url(url) {
                    state.backend.set_base_url(&state.config.api_base_url);
                    state.base_url_source = BaseUrlSource::Workspace;
                    state.cache.clear();
                }
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "ignoring unreadable base url setting"),
    }

    state.workspace = Some(path.clone());
    state.db = Some(conn);
    tracing::info!(workspace = %path.display(), session_restored, "workspace selected");
    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "sessionRestored": session_restored,
            "apiBaseUrl": state.backend.base_url(),
        }),
    )
}

fn restore_session(state: &mut AppState, conn: &rusqlite::Connection) -> anyhow::Result<bool> {
    let mut restored = false;

    let cookies = db::cookies_load(conn)?;
    if !cookies.is_empty() {
        state.session.jar.load(cookies);
        restored = true;
    } else if !state.session.jar.is_empty() {
        db::cookies_replace(conn, state.session.jar.cookies())?;
        state.session.jar.take_dirty();
    }

    match db::flag_load(conn, AUTH_FLAG_COOKIE)? {
        Some(expires_at) => {
            state.session.flag_expires_at = Some(expires_at);
            restored = true;
        }
        None => db::flag_store(conn, AUTH_FLAG_COOKIE, state.session.flag_expires_at)?,
    }
    Ok(restored)
}

fn config_view(state: &AppState) -> serde_json::Value {
    json!({
        "apiBaseUrl": state.backend.base_url(),
        "apiBaseUrlSource": state.base_url_source.as_str(),
        "httpTimeoutSecs": state.config.http_timeout.as_secs(),
        "dedupeMs": state.config.dedupe_window.as_millis() as u64,
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
    })
}

fn handle_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, config_view(state))
}

fn config_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(raw) = params.get("apiBaseUrl") else {
        return Err(HandlerErr::bad_params("missing params.apiBaseUrl"));
    };
    let url = match raw {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => normalize_base_url(s),
        _ => return Err(HandlerErr::bad_params("params.apiBaseUrl must be a string")),
    };
    if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(HandlerErr::bad_params("apiBaseUrl must start with http:// or https://"));
    }
    let Some(conn) = state.db.as_ref() else {
        return Err(HandlerErr::no_workspace());
    };

    let stored = if url.is_empty() {
        serde_json::Value::Null
    } else {
        json!(url)
    };
    db::settings_set_json(conn, BASE_URL_SETTING, &stored).map_err(HandlerErr::db)?;

    let applied = if state.config.api_base_url_from_env {
        false
    } else if url.is_empty() {
        state.config.api_base_url = DEFAULT_API_BASE_URL.to_string();
        state.base_url_source = BaseUrlSource::Default;
        true
    } else {
        state.config.apply_persisted_base_url(&url);
        state.base_url_source = BaseUrlSource::Workspace;
        true
    };
    if applied {
        state.backend.set_base_url(&state.config.api_base_url);
        state.cache.clear();
        tracing::info!(api_base_url = %state.config.api_base_url, "backend base url changed");
    }

    let mut view = config_view(state);
    view["applied"] = json!(applied);
    Ok(view)
}

fn handle_config_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    respond(&req.id, config_set(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "config.get" => Some(handle_config_get(state, req)),
        "config.set" => Some(handle_config_set(state, req)),
        _ => None,
    }
}
