use crate::calc;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

use super::students;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

fn load_exam(
    conn: &Connection,
    req: &Request,
    exam_id: &str,
) -> Result<serde_json::Value, serde_json::Value> {
    conn.query_row(
        "SELECT id, title, year, term FROM exams WHERE id = ?",
        [exam_id],
        |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let year: String = row.get(2)?;
            let term: String = row.get(3)?;
            Ok(json!({ "id": id, "title": title, "year": year, "term": term }))
        },
    )
    .optional()
    .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?
    .ok_or_else(|| {
        err(
            &req.id,
            "not_found",
            "exam not found",
            Some(json!({ "examId": exam_id })),
        )
    })
}

fn school_profile(
    conn: &Connection,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    db::settings_get_json(conn, "school_profile")
        .map(|v| v.unwrap_or(serde_json::Value::Null))
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

fn subject_rows(
    conn: &Connection,
    req: &Request,
    exam_result_id: &str,
) -> Result<Vec<(String, String, f64, String)>, serde_json::Value> {
    let mut stmt = conn
        .prepare(
            "SELECT subject_id, subject_name, marks, grade
             FROM subject_results
             WHERE exam_result_id = ?
             ORDER BY sort_order",
        )
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    stmt.query_map([exam_result_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

fn subjects_json(rows: &[(String, String, f64, String)]) -> Vec<serde_json::Value> {
    rows.iter()
        .map(|(subject_id, subject_name, marks, grade)| {
            json!({
                "subjectId": subject_id,
                "subjectName": subject_name,
                "marks": marks,
                "grade": grade
            })
        })
        .collect()
}

/// Grade tally for a report card. Letters outside the scale count as W,
/// matching the certificate layout this feeds.
fn tally(counts: &mut [i64; 5], letter: &str) {
    let grade = calc::Grade::from_letter(letter).unwrap_or(calc::Grade::W);
    let slot = match grade {
        calc::Grade::A => 0,
        calc::Grade::B => 1,
        calc::Grade::C => 2,
        calc::Grade::S => 3,
        calc::Grade::W => 4,
    };
    counts[slot] += 1;
}

fn handle_report_card_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let student = match conn
        .query_row(
            "SELECT id, index_no, name_with_initials, full_name, dob, grade, class,
                    gender, contact_no, teacher_id
             FROM students WHERE id = ?",
            [&student_id],
            students::student_row_to_json,
        )
        .optional()
    {
        Ok(Some(v)) => v,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "studentId": student_id })),
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let exam = match load_exam(conn, req, &exam_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let school = match school_profile(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let record = match conn
        .query_row(
            "SELECT id, total_marks, average, class_rank, grade_rank
             FROM exam_results
             WHERE student_id = ? AND exam_id = ?",
            (&student_id, &exam_id),
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                ))
            },
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut counts = [0i64; 5];
    let result = match record {
        Some((result_id, total_marks, average, class_rank, grade_rank)) => {
            let subjects = match subject_rows(conn, req, &result_id) {
                Ok(v) => v,
                Err(e) => return e,
            };
            for (_, _, _, letter) in &subjects {
                tally(&mut counts, letter);
            }
            json!({
                "id": result_id,
                "totalMarks": total_marks,
                "average": calc::round_display_1dp(average),
                "classRank": class_rank,
                "gradeRank": grade_rank,
                "results": subjects_json(&subjects)
            })
        }
        None => serde_json::Value::Null,
    };

    ok(
        &req.id,
        json!({
            "student": student,
            "exam": exam,
            "school": school,
            "result": result,
            "passes": {
                "A": counts[0],
                "B": counts[1],
                "C": counts[2],
                "S": counts[3],
                "W": counts[4]
            }
        }),
    )
}

fn handle_master_schedule_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match required_str(req, "grade") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class = match required_str(req, "class") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let exam = match load_exam(conn, req, &exam_id) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let school = match school_profile(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut stmt = match conn.prepare(
        "SELECT er.id, er.class_rank, er.total_marks, er.average,
                s.index_no, s.name_with_initials
         FROM exam_results er
         JOIN students s ON s.id = er.student_id
         WHERE er.exam_id = ? AND s.grade = ? AND s.class = ?
         ORDER BY er.class_rank IS NULL, er.class_rank, er.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let ranked = stmt
        .query_map((&exam_id, &grade, &class), |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<i64>>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let ranked = match ranked {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut counts = [0i64; 5];
    let mut total_graded = 0i64;
    let mut rows = Vec::with_capacity(ranked.len());
    for (result_id, class_rank, total_marks, average, index_no, name) in ranked {
        let subjects = match subject_rows(conn, req, &result_id) {
            Ok(v) => v,
            Err(e) => return e,
        };
        for (_, _, _, letter) in &subjects {
            tally(&mut counts, letter);
            total_graded += 1;
        }
        rows.push(json!({
            "rank": class_rank,
            "indexNo": index_no,
            "name": name,
            "subjects": subjects_json(&subjects),
            "totalMarks": total_marks,
            "average": calc::round_display_1dp(average)
        }));
    }

    ok(
        &req.id,
        json!({
            "exam": exam,
            "school": school,
            "grade": grade,
            "class": class,
            "rows": rows,
            "summary": {
                "A": counts[0],
                "B": counts[1],
                "C": counts[2],
                "S": counts[3],
                "W": counts[4],
                "total": total_graded
            }
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.reportCardModel" => Some(handle_report_card_model(state, req)),
        "reports.masterScheduleModel" => Some(handle_master_schedule_model(state, req)),
        _ => None,
    }
}
