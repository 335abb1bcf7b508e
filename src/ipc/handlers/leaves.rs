use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::{Local, NaiveDate};
use serde_json::json;
use uuid::Uuid;

const LEAVE_TYPES: [&str; 4] = ["Casual Leave", "Medical Leave", "Duty Leave", "No Pay Leave"];

/// Inclusive day span of the request, or null when either date fails to
/// parse as YYYY-MM-DD.
fn leave_days(start: &str, end: &str) -> Option<i64> {
    let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").ok()?;
    let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").ok()?;
    let days = (end - start).num_days() + 1;
    (days > 0).then_some(days)
}

fn leave_row_to_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: String = row.get(0)?;
    let teacher_id: String = row.get(1)?;
    let teacher_name: String = row.get(2)?;
    let leave_type: String = row.get(3)?;
    let start_date: String = row.get(4)?;
    let end_date: String = row.get(5)?;
    let reason: String = row.get(6)?;
    let status: String = row.get(7)?;
    let applied_date: String = row.get(8)?;
    Ok(json!({
        "id": id,
        "teacherId": teacher_id,
        "teacherName": teacher_name,
        "type": leave_type,
        "startDate": start_date,
        "endDate": end_date,
        "days": leave_days(&start_date, &end_date),
        "reason": reason,
        "status": status,
        "appliedDate": applied_date
    }))
}

fn handle_leaves_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let teacher_id = req.params.get("teacherId").and_then(|v| v.as_str());
    let (sql, binds): (&str, Vec<String>) = match teacher_id {
        Some(t) => (
            "SELECT id, teacher_id, teacher_name, type, start_date, end_date, reason,
                    status, applied_date
             FROM leaves WHERE teacher_id = ?
             ORDER BY applied_date DESC, rowid DESC",
            vec![t.to_string()],
        ),
        None => (
            "SELECT id, teacher_id, teacher_name, type, start_date, end_date, reason,
                    status, applied_date
             FROM leaves
             ORDER BY applied_date DESC, rowid DESC",
            vec![],
        ),
    };

    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds.iter()), leave_row_to_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(leaves) => ok(&req.id, json!({ "leaves": leaves })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_leaves_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let required = |key: &str| -> Result<String, serde_json::Value> {
        match req.params.get(key).and_then(|v| v.as_str()) {
            Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
        }
    };
    let teacher_id = match required("teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_name = match required("teacherName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let leave_type = match req.params.get("type").and_then(|v| v.as_str()) {
        Some(v) if LEAVE_TYPES.contains(&v) => v.to_string(),
        _ => {
            return err(
                &req.id,
                "bad_params",
                "type must be one of: Casual Leave, Medical Leave, Duty Leave, No Pay Leave",
                None,
            )
        }
    };
    let start_date = match required("startDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let end_date = match required("endDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let reason = match required("reason") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let leave_id = Uuid::new_v4().to_string();
    let applied_date = Local::now().date_naive().format("%Y-%m-%d").to_string();

    let result = conn.execute(
        "INSERT INTO leaves(id, teacher_id, teacher_name, type, start_date, end_date,
                            reason, status, applied_date)
         VALUES(?, ?, ?, ?, ?, ?, ?, 'PENDING', ?)",
        rusqlite::params![
            leave_id,
            teacher_id,
            teacher_name,
            leave_type,
            start_date,
            end_date,
            reason,
            applied_date,
        ],
    );

    match result {
        Ok(_) => ok(
            &req.id,
            json!({
                "leaveId": leave_id,
                "status": "PENDING",
                "appliedDate": applied_date,
                "days": leave_days(&start_date, &end_date)
            }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "leaves" })),
        ),
    }
}

fn handle_leaves_update_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let leave_id = match req.params.get("leaveId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing leaveId", None),
    };
    let status = match req.params.get("status").and_then(|v| v.as_str()) {
        Some("APPROVED") => "APPROVED",
        Some("REJECTED") => "REJECTED",
        _ => {
            return err(
                &req.id,
                "bad_params",
                "status must be APPROVED or REJECTED",
                None,
            )
        }
    };

    match conn.execute(
        "UPDATE leaves SET status = ? WHERE id = ?",
        (&status, &leave_id),
    ) {
        Ok(0) => err(
            &req.id,
            "not_found",
            "leave request not found",
            Some(json!({ "leaveId": leave_id })),
        ),
        Ok(_) => ok(&req.id, json!({ "leaveId": leave_id, "status": status })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "leaves.list" => Some(handle_leaves_list(state, req)),
        "leaves.apply" => Some(handle_leaves_apply(state, req)),
        "leaves.updateStatus" => Some(handle_leaves_update_status(state, req)),
        _ => None,
    }
}
