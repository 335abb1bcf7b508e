
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar, temp_dir};

fn add_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    grade: &str,
    class: &str,
) -> String {
    request_ok(
        stdin,
        reader,
        id,
        "students.save",
        json!({ "student": { "nameWithInitials": name, "grade": grade, "class": class } }),
    )
    .get("studentId")
    .and_then(|v| v.as_str())
    .expect("studentId")
    .to_string()
}

fn save_single_mark(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student_id: &str,
    exam_id: &str,
    marks: f64,
) -> serde_json::Value {
    request_ok(
        stdin,
        reader,
        id,
        "results.save",
        json!({
            "studentId": student_id,
            "examId": exam_id,
            "marks": [{ "subjectId": "sub-maths", "subjectName": "Mathematics", "marks": marks }]
        }),
    )
}

fn ranks_by_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    exam_id: &str,
) -> std::collections::HashMap<String, (Option<i64>, Option<i64>)> {
    request_ok(stdin, reader, id, "results.list", json!({ "examId": exam_id }))
        .get("results")
        .and_then(|v| v.as_array())
        .expect("results array")
        .iter()
        .map(|r| {
            (
                r["studentId"].as_str().unwrap().to_string(),
                (r["classRank"].as_i64(), r["gradeRank"].as_i64()),
            )
        })
        .collect()
}

#[test]
fn class_rank_restarts_per_class_and_grade_rank_spans_the_grade() {
    let workspace = temp_dir("tmsd-rank-scoping");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let exam_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.save",
        json!({ "exam": { "title": "Mid Year", "year": "2026", "term": "2" } }),
    )["examId"]
        .as_str()
        .unwrap()
        .to_string();

    let a1 = add_student(&mut stdin, &mut reader, "3", "A. One", "11", "A");
    let a2 = add_student(&mut stdin, &mut reader, "4", "A. Two", "11", "A");
    let b1 = add_student(&mut stdin, &mut reader, "5", "B. One", "11", "B");
    let b2 = add_student(&mut stdin, &mut reader, "6", "B. Two", "11", "B");
    let g9 = add_student(&mut stdin, &mut reader, "7", "G. Nine", "9", "A");

    let _ = save_single_mark(&mut stdin, &mut reader, "8", &a1, &exam_id, 80.0);
    let _ = save_single_mark(&mut stdin, &mut reader, "9", &a2, &exam_id, 60.0);
    let _ = save_single_mark(&mut stdin, &mut reader, "10", &b1, &exam_id, 90.0);
    let _ = save_single_mark(&mut stdin, &mut reader, "11", &b2, &exam_id, 70.0);
    let _ = save_single_mark(&mut stdin, &mut reader, "12", &g9, &exam_id, 99.0);

    let ranks = ranks_by_student(&mut stdin, &mut reader, "13", &exam_id);

    // Class ranks restart at 1 within each class.
    assert_eq!(ranks[&a1], (Some(1), Some(2)));
    assert_eq!(ranks[&a2], (Some(2), Some(4)));
    assert_eq!(ranks[&b1], (Some(1), Some(1)));
    assert_eq!(ranks[&b2], (Some(2), Some(3)));

    // A different grade ranks independently.
    assert_eq!(ranks[&g9], (Some(1), Some(1)));

    // Filtering to one class lists in rank order.
    let class_b = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "results.list",
        json!({ "examId": exam_id, "grade": "11", "class": "B" }),
    );
    let order: Vec<&str> = class_b["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["studentId"].as_str().unwrap())
        .collect();
    assert_eq!(order, vec![b1.as_str(), b2.as_str()]);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn ties_keep_insertion_order_and_ranks_stay_dense() {
    let workspace = temp_dir("tmsd-rank-ties");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let exam_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.save",
        json!({ "exam": { "title": "Unit Test", "year": "2026", "term": "1" } }),
    )["examId"]
        .as_str()
        .unwrap()
        .to_string();

    let top = add_student(&mut stdin, &mut reader, "3", "T. Top", "8", "A");
    let tie_first = add_student(&mut stdin, &mut reader, "4", "T. First", "8", "A");
    let tie_second = add_student(&mut stdin, &mut reader, "5", "T. Second", "8", "A");

    let _ = save_single_mark(&mut stdin, &mut reader, "6", &top, &exam_id, 90.0);
    let _ = save_single_mark(&mut stdin, &mut reader, "7", &tie_first, &exam_id, 72.0);
    let _ = save_single_mark(&mut stdin, &mut reader, "8", &tie_second, &exam_id, 72.0);

    let ranks = ranks_by_student(&mut stdin, &mut reader, "9", &exam_id);
    assert_eq!(ranks[&top].0, Some(1));
    assert_eq!(ranks[&tie_first].0, Some(2));
    assert_eq!(ranks[&tie_second].0, Some(3));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unregistered_student_saves_with_null_ranks_and_does_not_disturb_the_cohort() {
    let workspace = temp_dir("tmsd-rank-ghost");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let exam_id = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "exams.save",
        json!({ "exam": { "title": "Unit Test", "year": "2026", "term": "3" } }),
    )["examId"]
        .as_str()
        .unwrap()
        .to_string();

    let known = add_student(&mut stdin, &mut reader, "3", "K. Known", "7", "A");
    let _ = save_single_mark(&mut stdin, &mut reader, "4", &known, &exam_id, 50.0);

    // No students.save for this id: the save must still succeed, with a
    // higher average and no rank.
    let ghost = save_single_mark(&mut stdin, &mut reader, "5", "ghost-student", &exam_id, 95.0);
    assert!(ghost.get("classRank").map(|v| v.is_null()).unwrap_or(false));
    assert!(ghost.get("gradeRank").map(|v| v.is_null()).unwrap_or(false));

    let ranks = ranks_by_student(&mut stdin, &mut reader, "6", &exam_id);
    assert_eq!(ranks[&known], (Some(1), Some(1)));
    assert_eq!(ranks["ghost-student"], (None, None));

    drop(stdin);
    let _ = child.wait();
}
