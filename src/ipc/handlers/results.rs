use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

/// Loads the whole exam cohort (registry grade/class attached where the
/// student is known) and rewrites both rank columns. Full recomputation on
/// every save; runs inside the caller's transaction.
fn rerank_exam(conn: &Connection, exam_id: &str) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT er.id, er.average, s.grade, s.class
         FROM exam_results er
         LEFT JOIN students s ON s.id = er.student_id
         WHERE er.exam_id = ?
         ORDER BY er.rowid",
    )?;
    let entries = stmt
        .query_map([exam_id], |row| {
            Ok(calc::RankEntry {
                result_id: row.get(0)?,
                average: row.get(1)?,
                grade: row.get(2)?,
                class_name: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for rank in calc::assign_ranks(&entries) {
        conn.execute(
            "UPDATE exam_results SET grade_rank = ?, class_rank = ? WHERE id = ?",
            rusqlite::params![rank.grade_rank, rank.class_rank, rank.result_id],
        )?;
    }
    Ok(())
}

fn subject_results_json(
    conn: &Connection,
    exam_result_id: &str,
) -> rusqlite::Result<Vec<serde_json::Value>> {
    let mut stmt = conn.prepare(
        "SELECT subject_id, subject_name, marks, grade
         FROM subject_results
         WHERE exam_result_id = ?
         ORDER BY sort_order",
    )?;
    stmt.query_map([exam_result_id], |row| {
        let subject_id: String = row.get(0)?;
        let subject_name: String = row.get(1)?;
        let marks: f64 = row.get(2)?;
        let grade: String = row.get(3)?;
        Ok(json!({
            "subjectId": subject_id,
            "subjectName": subject_name,
            "marks": marks,
            "grade": grade
        }))
    })?
    .collect()
}

fn handle_results_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let exam_id = match req.params.get("examId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing examId", None),
    };
    let Some(marks) = req.params.get("marks").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing params.marks", None);
    };

    // Marks that are absent or non-numeric count as 0. Grades and totals the
    // caller may have attached are discarded and derived fresh.
    let mut subject_marks: Vec<calc::SubjectMark> = Vec::with_capacity(marks.len());
    for entry in marks {
        let Some(subject_id) = entry.get("subjectId").and_then(|v| v.as_str()) else {
            return err(
                &req.id,
                "bad_params",
                "every marks entry needs a subjectId",
                None,
            );
        };
        subject_marks.push(calc::SubjectMark {
            subject_id: subject_id.to_string(),
            subject_name: entry
                .get("subjectName")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            marks: entry.get("marks").and_then(|v| v.as_f64()).unwrap_or(0.0),
        });
    }

    let normalized = calc::normalize_subjects(subject_marks);
    let totals = calc::compute_totals(&normalized);

    let student_index_no: Option<String> = match conn
        .query_row(
            "SELECT index_no FROM students WHERE id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v.flatten(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Natural key first, (studentId, examId) pair as the fallback for rows
    // written before the composite id convention.
    let natural_id = format!("{}_{}", student_id, exam_id);
    let existing: Option<String> = match tx
        .query_row(
            "SELECT id FROM exam_results WHERE id = ?",
            [&natural_id],
            |r| r.get(0),
        )
        .optional()
        .and_then(|found| match found {
            Some(id) => Ok(Some(id)),
            None => tx
                .query_row(
                    "SELECT id FROM exam_results WHERE student_id = ? AND exam_id = ?",
                    (&student_id, &exam_id),
                    |r| r.get(0),
                )
                .optional(),
        }) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let result_id = match &existing {
        Some(id) => {
            let replaced = tx
                .execute(
                    "UPDATE exam_results
                     SET student_id = ?, student_index_no = ?, exam_id = ?,
                         total_marks = ?, average = ?
                     WHERE id = ?",
                    rusqlite::params![
                        student_id,
                        student_index_no,
                        exam_id,
                        totals.total_marks,
                        totals.average,
                        id,
                    ],
                )
                .and_then(|_| {
                    tx.execute("DELETE FROM subject_results WHERE exam_result_id = ?", [id])
                });
            if let Err(e) = replaced {
                let _ = tx.rollback();
                return err(
                    &req.id,
                    "db_update_failed",
                    e.to_string(),
                    Some(json!({ "table": "exam_results" })),
                );
            }
            id.clone()
        }
        None => {
            if let Err(e) = tx.execute(
                "INSERT INTO exam_results(id, student_id, student_index_no, exam_id,
                                          total_marks, average, class_rank, grade_rank)
                 VALUES(?, ?, ?, ?, ?, ?, NULL, NULL)",
                rusqlite::params![
                    natural_id,
                    student_id,
                    student_index_no,
                    exam_id,
                    totals.total_marks,
                    totals.average,
                ],
            ) {
                let _ = tx.rollback();
                return err(
                    &req.id,
                    "db_insert_failed",
                    e.to_string(),
                    Some(json!({ "table": "exam_results" })),
                );
            }
            natural_id
        }
    };

    for (sort_order, subject) in normalized.iter().enumerate() {
        if let Err(e) = tx.execute(
            "INSERT INTO subject_results(id, exam_result_id, subject_id, subject_name,
                                         marks, grade, sort_order)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                result_id,
                subject.subject_id,
                subject.subject_name,
                subject.marks,
                subject.grade.as_str(),
                sort_order as i64,
            ],
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "table": "subject_results" })),
            );
        }
    }

    if let Err(e) = rerank_exam(&tx, &exam_id) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "exam_results" })),
        );
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    let ranks = conn
        .query_row(
            "SELECT class_rank, grade_rank FROM exam_results WHERE id = ?",
            [&result_id],
            |r| Ok((r.get::<_, Option<i64>>(0)?, r.get::<_, Option<i64>>(1)?)),
        )
        .unwrap_or((None, None));

    ok(
        &req.id,
        json!({
            "resultId": result_id,
            "totalMarks": totals.total_marks,
            "average": totals.average,
            "classRank": ranks.0,
            "gradeRank": ranks.1
        }),
    )
}

fn handle_results_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let exam_id = match req.params.get("examId").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing examId", None),
    };

    let mut sql = String::from(
        "SELECT er.id, er.student_id, er.student_index_no, er.exam_id,
                er.total_marks, er.average, er.class_rank, er.grade_rank
         FROM exam_results er
         LEFT JOIN students s ON s.id = er.student_id
         WHERE er.exam_id = ?",
    );
    let mut binds: Vec<String> = vec![exam_id];
    if let Some(grade) = req.params.get("grade").and_then(|v| v.as_str()) {
        sql.push_str(" AND s.grade = ?");
        binds.push(grade.to_string());
    }
    let class_filter = req.params.get("class").and_then(|v| v.as_str());
    if let Some(class) = class_filter {
        sql.push_str(" AND s.class = ?");
        binds.push(class.to_string());
    }
    if class_filter.is_some() {
        sql.push_str(" ORDER BY er.class_rank IS NULL, er.class_rank, er.rowid");
    } else {
        sql.push_str(" ORDER BY er.rowid");
    }

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(binds.iter()), |row| {
            let id: String = row.get(0)?;
            let student_id: String = row.get(1)?;
            let student_index_no: Option<String> = row.get(2)?;
            let exam_id: String = row.get(3)?;
            let total_marks: f64 = row.get(4)?;
            let average: f64 = row.get(5)?;
            let class_rank: Option<i64> = row.get(6)?;
            let grade_rank: Option<i64> = row.get(7)?;
            Ok(json!({
                "id": id,
                "studentId": student_id,
                "studentIndexNo": student_index_no,
                "examId": exam_id,
                "totalMarks": total_marks,
                "average": average,
                "classRank": class_rank,
                "gradeRank": grade_rank
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    let mut results = match rows {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    for result in &mut results {
        let id = result
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        match subject_results_json(conn, &id) {
            Ok(subjects) => result["results"] = json!(subjects),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    ok(&req.id, json!({ "results": results }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.save" => Some(handle_results_save(state, req)),
        "results.list" => Some(handle_results_list(state, req)),
        _ => None,
    }
}
