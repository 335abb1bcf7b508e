use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

const SUBJECT_CATEGORIES: [&str; 4] = ["Core", "Category 1", "Category 2", "Category 3"];

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let grade = req.params.get("grade").and_then(|v| v.as_str());
    let (sql, binds): (&str, Vec<String>) = match grade {
        Some(g) => (
            "SELECT id, name, grade, category FROM subjects WHERE grade = ? ORDER BY category, name",
            vec![g.to_string()],
        ),
        None => (
            "SELECT id, name, grade, category FROM subjects ORDER BY grade, category, name",
            vec![],
        ),
    };

    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds.iter()), |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let grade: String = row.get(2)?;
            let category: String = row.get(3)?;
            Ok(json!({ "id": id, "name": name, "grade": grade, "category": category }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_subjects_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(subject) = req.params.get("subject").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing params.subject", None);
    };
    let name = match subject.get("name").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing name", None),
    };
    let grade = match subject.get("grade").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing grade", None),
    };
    let category = match subject.get("category").and_then(|v| v.as_str()) {
        Some(v) if SUBJECT_CATEGORIES.contains(&v) => v.to_string(),
        _ => {
            return err(
                &req.id,
                "bad_params",
                "category must be one of: Core, Category 1, Category 2, Category 3",
                None,
            )
        }
    };

    let subject_id = subject
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let result = conn.execute(
        "INSERT INTO subjects(id, name, grade, category) VALUES(?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           grade = excluded.grade,
           category = excluded.category",
        (&subject_id, &name, &grade, &category),
    );

    match result {
        Ok(_) => ok(&req.id, json!({ "subjectId": subject_id })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "subjects.save" => Some(handle_subjects_save(state, req)),
        _ => None,
    }
}
