use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;

/// Credentials are compared as plain field equality against the stored user
/// row, matching the portal this replaces. Deactivated accounts never match.
fn handle_auth_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match req.params.get("email").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing email", None),
    };
    let password = match req.params.get("password").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing password", None),
    };

    let row = conn
        .query_row(
            "SELECT id, email, name, role, nic, designation, subject, assigned_class,
                    contact, service_type, active, address, dob, first_appointment_date,
                    current_school_join_date, qualifications, profile_pic
             FROM users
             WHERE email = ? AND password = ? AND active = 1",
            (&email, &password),
            super::users::user_row_to_json,
        )
        .optional();

    match row {
        Ok(Some(user)) => ok(&req.id, json!({ "user": user })),
        Ok(None) => err(
            &req.id,
            "invalid_credentials",
            "invalid email or password, or account deactivated",
            None,
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_auth_login(state, req)),
        _ => None,
    }
}
