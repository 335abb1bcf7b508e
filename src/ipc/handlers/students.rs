use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

pub fn student_row_to_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: String = row.get(0)?;
    let index_no: Option<String> = row.get(1)?;
    let name_with_initials: String = row.get(2)?;
    let full_name: Option<String> = row.get(3)?;
    let dob: Option<String> = row.get(4)?;
    let grade: String = row.get(5)?;
    let class: String = row.get(6)?;
    let gender: Option<String> = row.get(7)?;
    let contact_no: Option<String> = row.get(8)?;
    let teacher_id: Option<String> = row.get(9)?;
    Ok(json!({
        "id": id,
        "indexNo": index_no,
        "nameWithInitials": name_with_initials,
        "fullName": full_name,
        "dob": dob,
        "grade": grade,
        "class": class,
        "gender": gender,
        "contactNo": contact_no,
        "teacherId": teacher_id
    }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut sql = String::from(
        "SELECT id, index_no, name_with_initials, full_name, dob, grade, class,
                gender, contact_no, teacher_id
         FROM students
         WHERE 1 = 1",
    );
    let mut binds: Vec<String> = Vec::new();
    if let Some(teacher_id) = req.params.get("teacherId").and_then(|v| v.as_str()) {
        sql.push_str(" AND teacher_id = ?");
        binds.push(teacher_id.to_string());
    }
    if let Some(grade) = req.params.get("grade").and_then(|v| v.as_str()) {
        sql.push_str(" AND grade = ?");
        binds.push(grade.to_string());
    }
    if let Some(class) = req.params.get("class").and_then(|v| v.as_str()) {
        sql.push_str(" AND class = ?");
        binds.push(class.to_string());
    }
    sql.push_str(" ORDER BY grade, class, index_no, rowid");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds.iter()), student_row_to_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(student) = req.params.get("student").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing params.student", None);
    };

    let name_with_initials = match student.get("nameWithInitials").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing nameWithInitials", None),
    };
    let grade = match student.get("grade").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing grade", None),
    };
    let class = match student.get("class").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing class", None),
    };

    let student_id = student
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let opt = |key: &str| -> Option<String> {
        student
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    let result = conn.execute(
        "INSERT INTO students(id, index_no, name_with_initials, full_name, dob, grade,
                              class, gender, contact_no, teacher_id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           index_no = excluded.index_no,
           name_with_initials = excluded.name_with_initials,
           full_name = excluded.full_name,
           dob = excluded.dob,
           grade = excluded.grade,
           class = excluded.class,
           gender = excluded.gender,
           contact_no = excluded.contact_no,
           teacher_id = excluded.teacher_id",
        rusqlite::params![
            student_id,
            opt("indexNo"),
            name_with_initials,
            opt("fullName"),
            opt("dob"),
            grade,
            class,
            opt("gender"),
            opt("contactNo"),
            opt("teacherId"),
        ],
    );

    match result {
        Ok(_) => ok(&req.id, json!({ "studentId": student_id })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.save" => Some(handle_students_save(state, req)),
        _ => None,
    }
}
