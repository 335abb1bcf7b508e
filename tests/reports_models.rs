
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

fn setup_exam(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "setup-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        stdin,
        reader,
        "setup-exam",
        "exams.save",
        json!({ "exam": { "title": "Third Term Test", "year": "2026", "term": "3" } }),
    )["examId"]
        .as_str()
        .expect("examId")
        .to_string()
}

#[test]
fn report_card_tallies_passes_and_rounds_the_average() {
    let workspace = temp_dir("tmsd-report-card");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let exam_id = setup_exam(&mut stdin, &mut reader, &workspace);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "results.save",
        json!({
            "studentId": "s1",
            "examId": exam_id,
            "marks": [
                { "subjectId": "sub-maths", "subjectName": "Mathematics", "marks": 80 },
                { "subjectId": "sub-science", "subjectName": "Science", "marks": 60 },
                { "subjectId": "sub-history", "subjectName": "History", "marks": 45 },
                { "subjectId": "sub-tamil", "subjectName": "Tamil", "marks": 30 }
            ]
        }),
    );

    let card = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "reports.reportCardModel",
        json!({ "studentId": "s1", "examId": exam_id }),
    );

    assert_eq!(
        card.pointer("/student/nameWithInitials").and_then(|v| v.as_str()),
        Some("Zaid Mohamed")
    );
    assert_eq!(
        card.pointer("/exam/title").and_then(|v| v.as_str()),
        Some("Third Term Test")
    );
    assert!(card.pointer("/school/name").and_then(|v| v.as_str()).is_some());

    assert_eq!(card.pointer("/result/totalMarks").and_then(|v| v.as_f64()), Some(215.0));
    assert_eq!(card.pointer("/result/average").and_then(|v| v.as_f64()), Some(53.8));
    assert_eq!(card.pointer("/passes/A").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(card.pointer("/passes/B").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(card.pointer("/passes/C").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(card.pointer("/passes/S").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(card.pointer("/passes/W").and_then(|v| v.as_i64()), Some(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn report_card_without_a_saved_result_returns_null_result_and_zero_passes() {
    let workspace = temp_dir("tmsd-report-card-empty");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let exam_id = setup_exam(&mut stdin, &mut reader, &workspace);

    let card = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.reportCardModel",
        json!({ "studentId": "s2", "examId": exam_id }),
    );
    assert!(card["result"].is_null());
    assert_eq!(card.pointer("/passes/A").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(card.pointer("/passes/W").and_then(|v| v.as_i64()), Some(0));

    let missing_student = request(
        &mut stdin,
        &mut reader,
        "2",
        "reports.reportCardModel",
        json!({ "studentId": "nobody", "examId": exam_id }),
    );
    assert_eq!(error_code(&missing_student), "not_found");

    let missing_exam = request(
        &mut stdin,
        &mut reader,
        "3",
        "reports.reportCardModel",
        json!({ "studentId": "s1", "examId": "no-such-exam" }),
    );
    assert_eq!(error_code(&missing_exam), "not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn master_schedule_orders_rows_by_class_rank_with_a_grade_distribution() {
    let workspace = temp_dir("tmsd-master-schedule");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let exam_id = setup_exam(&mut stdin, &mut reader, &workspace);

    // Seeded students s1 and s2 are both in grade 10 class A.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "results.save",
        json!({
            "studentId": "s1",
            "examId": exam_id,
            "marks": [
                { "subjectId": "sub-maths", "subjectName": "Mathematics", "marks": 55 },
                { "subjectId": "sub-science", "subjectName": "Science", "marks": 40 }
            ]
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "results.save",
        json!({
            "studentId": "s2",
            "examId": exam_id,
            "marks": [
                { "subjectId": "sub-maths", "subjectName": "Mathematics", "marks": 85 },
                { "subjectId": "sub-science", "subjectName": "Science", "marks": 66 }
            ]
        }),
    );

    let schedule = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "reports.masterScheduleModel",
        json!({ "examId": exam_id, "grade": "10", "class": "A" }),
    );

    let rows = schedule["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["rank"].as_i64(), Some(1));
    assert_eq!(rows[0]["name"].as_str(), Some("Sara Ibrahim"));
    assert_eq!(rows[0]["average"].as_f64(), Some(75.5));
    assert_eq!(rows[1]["rank"].as_i64(), Some(2));
    assert_eq!(rows[1]["average"].as_f64(), Some(47.5));

    // Grades across the class: 85 A, 66 B, 55 C, 40 S.
    assert_eq!(schedule.pointer("/summary/A").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(schedule.pointer("/summary/B").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(schedule.pointer("/summary/C").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(schedule.pointer("/summary/S").and_then(|v| v.as_i64()), Some(1));
    assert_eq!(schedule.pointer("/summary/W").and_then(|v| v.as_i64()), Some(0));
    assert_eq!(schedule.pointer("/summary/total").and_then(|v| v.as_i64()), Some(4));

    drop(stdin);
    let _ = child.wait();
}
