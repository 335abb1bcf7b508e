use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const SCHOOL_PROFILE_KEY: &str = "school_profile";
const ENROLMENT_STATS_KEY: &str = "enrolment_stats";

fn handle_school_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match db::settings_get_json(conn, SCHOOL_PROFILE_KEY) {
        Ok(profile) => ok(
            &req.id,
            json!({ "profile": profile.unwrap_or(serde_json::Value::Null) }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_school_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(profile) = req.params.get("profile").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "missing params.profile", None);
    };

    match db::settings_set_json(conn, SCHOOL_PROFILE_KEY, profile) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

/// A fresh workspace reports zeroed enrolment rows for grades 1-11 rather
/// than an absent document.
fn empty_grade_data() -> serde_json::Value {
    let rows: Vec<serde_json::Value> = (1..=11)
        .map(|grade| json!({ "grade": grade.to_string(), "boys": 0, "girls": 0 }))
        .collect();
    json!(rows)
}

fn handle_stats_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match db::settings_get_json(conn, ENROLMENT_STATS_KEY) {
        Ok(Some(grade_data)) => ok(&req.id, json!({ "gradeData": grade_data })),
        Ok(None) => ok(&req.id, json!({ "gradeData": empty_grade_data() })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_stats_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(grade_data) = req.params.get("gradeData").filter(|v| v.is_array()) else {
        return err(&req.id, "bad_params", "missing params.gradeData", None);
    };

    match db::settings_set_json(conn, ENROLMENT_STATS_KEY, grade_data) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "school.get" => Some(handle_school_get(state, req)),
        "school.update" => Some(handle_school_update(state, req)),
        "stats.get" => Some(handle_stats_get(state, req)),
        "stats.save" => Some(handle_stats_save(state, req)),
        _ => None,
    }
}
