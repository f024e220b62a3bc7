use crate::backend::Call;
use crate::gate;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{self, authorization};
use crate::ipc::types::{AppState, Request};
use crate::session::User;
use chrono::Utc;
use serde_json::{json, Value};

/// The login response nests the user under `data`; `/auth/me` does not.
fn user_from_body(body: &Value) -> Option<User> {
    User::from_json(body.pointer("/data/user"))
        .or_else(|| User::from_json(body.get("user")))
        .or_else(|| User::from_json(body.get("data")))
}

fn state_view(state: &AppState) -> Value {
    let now = Utc::now();
    json!({
        "user": state.session.user,
        "authenticated": state.session.user.is_some(),
        "hasAuthFlag": state.session.has_auth_flag(now),
        "flagExpiresAt": state
            .session
            .flag_expires_at
            .filter(|t| *t > now)
            .map(|t| t.to_rfc3339()),
    })
}

fn login(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let email = params
        .get("email")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    let password = params.get("password").and_then(|v| v.as_str()).unwrap_or("");
    if email.is_empty() || password.is_empty() {
        return Err(HandlerErr::bad_params("email and password are required"));
    }

    let call = Call::post("/auth/login", json!({ "email": email, "password": password }))
        .authorization(authorization(params));
    let resp = match helpers::send(state, call) {
        Ok(r) => r,
        Err(e) => {
            tracing::info!(email, code = e.code, "login rejected");
            return Err(e);
        }
    };

    state.session.set_auth_flag(Utc::now());
    state.session.user = user_from_body(&resp.body);
    // A new identity must not see the previous one's cached reads.
    state.cache.clear();
    helpers::persist_session(state);
    tracing::info!(email, "login succeeded");

    // Silent confirmation; a failure leaves the context signed out.
    let confirmed = match helpers::send(state, Call::get("/auth/me").authorization(authorization(params))) {
        Ok(me) => {
            state.session.user = user_from_body(&me.body);
            true
        }
        Err(e) => {
            tracing::warn!(code = e.code, "session confirmation failed after login");
            state.session.user = None;
            false
        }
    };

    let mut out = state_view(state);
    out["confirmed"] = json!(confirmed);
    Ok(out)
}

fn handle_login(state: &mut AppState, req: &Request) -> Value {
    respond(&req.id, login(state, &req.params))
}

/// Rehydrate from the HTTP-only session cookie.
fn handle_me(state: &mut AppState, req: &Request) -> Value {
    let call = Call::get("/auth/me").authorization(authorization(&req.params));
    let result = match helpers::send(state, call) {
        Ok(resp) => {
            state.session.user = user_from_body(&resp.body);
            if state.session.user.is_none() {
                state.session.clear_auth_flag();
                helpers::persist_session(state);
            }
            let mut out = state_view(state);
            out["rehydrated"] = json!(state.session.user.is_some());
            out
        }
        Err(e) => {
            tracing::debug!(code = e.code, "rehydrate failed, clearing auth flag");
            state.session.user = None;
            state.session.clear_auth_flag();
            helpers::persist_session(state);
            let mut out = state_view(state);
            out["rehydrated"] = json!(false);
            out["error"] = json!({ "code": e.code, "message": e.message });
            out
        }
    };
    respond(&req.id, Ok(result))
}

fn handle_logout(state: &mut AppState, req: &Request) -> Value {
    let call = Call::post("/auth/logout", json!({})).authorization(authorization(&req.params));
    let acknowledged = match helpers::send(state, call) {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(code = e.code, message = %e.message, "backend logout failed, signing out locally");
            false
        }
    };
    state.session.sign_out();
    state.cache.clear();
    helpers::persist_session(state);
    tracing::info!(acknowledged, "logged out");

    let mut out = state_view(state);
    out["backendAcknowledged"] = json!(acknowledged);
    respond(&req.id, Ok(out))
}

fn handle_state(state: &mut AppState, req: &Request) -> Value {
    respond(&req.id, Ok(state_view(state)))
}

fn nav_check(state: &mut AppState, params: &Value) -> Result<Value, HandlerErr> {
    let Some(path) = params.get("path").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("missing params.path"));
    };
    let decision = gate::check(path, state.session.has_auth_flag(Utc::now()));
    serde_json::to_value(decision).map_err(|e| HandlerErr::new("bad_params", e.to_string()))
}

fn handle_nav_check(state: &mut AppState, req: &Request) -> Value {
    respond(&req.id, nav_check(state, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.me" => Some(handle_me(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.state" => Some(handle_state(state, req)),
        "nav.check" => Some(handle_nav_check(state, req)),
        _ => None,
    }
}
