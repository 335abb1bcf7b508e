use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

/// Shared row mapper for the user projection. Passwords are never part of
/// any response payload.
pub fn user_row_to_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: String = row.get(0)?;
    let email: String = row.get(1)?;
    let name: String = row.get(2)?;
    let role: String = row.get(3)?;
    let nic: Option<String> = row.get(4)?;
    let designation: Option<String> = row.get(5)?;
    let subject: Option<String> = row.get(6)?;
    let assigned_class: Option<String> = row.get(7)?;
    let contact: Option<String> = row.get(8)?;
    let service_type: Option<String> = row.get(9)?;
    let active: i64 = row.get(10)?;
    let address: Option<String> = row.get(11)?;
    let dob: Option<String> = row.get(12)?;
    let first_appointment_date: Option<String> = row.get(13)?;
    let current_school_join_date: Option<String> = row.get(14)?;
    let qualifications: Option<String> = row.get(15)?;
    let profile_pic: Option<String> = row.get(16)?;
    Ok(json!({
        "id": id,
        "email": email,
        "name": name,
        "role": role,
        "nic": nic,
        "designation": designation,
        "subject": subject,
        "assignedClass": assigned_class,
        "contact": contact,
        "serviceType": service_type,
        "active": active != 0,
        "address": address,
        "dob": dob,
        "firstAppointmentDate": first_appointment_date,
        "currentSchoolJoinDate": current_school_join_date,
        "qualifications": qualifications,
        "profilePic": profile_pic
    }))
}

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT id, email, name, role, nic, designation, subject, assigned_class,
                contact, service_type, active, address, dob, first_appointment_date,
                current_school_join_date, qualifications, profile_pic
         FROM users
         ORDER BY name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], user_row_to_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(users) => ok(&req.id, json!({ "users": users })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_users_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(user) = req.params.get("user").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing params.user", None);
    };

    let email = match user.get("email").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing email", None),
    };
    let name = match user.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let role = match user.get("role").and_then(|v| v.as_str()) {
        Some("ADMIN") => "ADMIN",
        Some("TEACHER") => "TEACHER",
        _ => {
            return err(
                &req.id,
                "bad_params",
                "role must be ADMIN or TEACHER",
                None,
            )
        }
    };

    let user_id = user
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let password = user
        .get("password")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let active = user.get("active").and_then(|v| v.as_bool()).unwrap_or(true);

    let opt = |key: &str| -> Option<String> {
        user.get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    let exists: Option<i64> = match conn
        .query_row("SELECT 1 FROM users WHERE id = ?", [&user_id], |r| r.get(0))
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() && password.is_none() {
        return err(&req.id, "bad_params", "missing password for new user", None);
    }

    // Omitting password on update keeps the stored one. The NOT NULL column
    // rules out a single upsert statement here.
    let write = if exists.is_some() {
        conn.execute(
            "UPDATE users SET
               email = ?,
               password = COALESCE(?, password),
               name = ?,
               role = ?,
               nic = ?,
               designation = ?,
               subject = ?,
               assigned_class = ?,
               contact = ?,
               service_type = ?,
               active = ?,
               address = ?,
               dob = ?,
               first_appointment_date = ?,
               current_school_join_date = ?,
               qualifications = ?,
               profile_pic = ?
             WHERE id = ?",
            rusqlite::params![
                email,
                password,
                name,
                role,
                opt("nic"),
                opt("designation"),
                opt("subject"),
                opt("assignedClass"),
                opt("contact"),
                opt("serviceType"),
                active as i64,
                opt("address"),
                opt("dob"),
                opt("firstAppointmentDate"),
                opt("currentSchoolJoinDate"),
                opt("qualifications"),
                opt("profilePic"),
                user_id,
            ],
        )
    } else {
        conn.execute(
            "INSERT INTO users(id, email, password, name, role, nic, designation, subject,
                               assigned_class, contact, service_type, active, address, dob,
                               first_appointment_date, current_school_join_date,
                               qualifications, profile_pic)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                user_id,
                email,
                password,
                name,
                role,
                opt("nic"),
                opt("designation"),
                opt("subject"),
                opt("assignedClass"),
                opt("contact"),
                opt("serviceType"),
                active as i64,
                opt("address"),
                opt("dob"),
                opt("firstAppointmentDate"),
                opt("currentSchoolJoinDate"),
                opt("qualifications"),
                opt("profilePic"),
            ],
        )
    };

    match write {
        Ok(_) => ok(&req.id, json!({ "userId": user_id })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_users_list(state, req)),
        "users.save" => Some(handle_users_save(state, req)),
        _ => None,
    }
}
