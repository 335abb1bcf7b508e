use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("tms.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            password TEXT NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            nic TEXT,
            designation TEXT,
            subject TEXT,
            assigned_class TEXT,
            contact TEXT,
            service_type TEXT,
            active INTEGER NOT NULL,
            address TEXT,
            dob TEXT,
            first_appointment_date TEXT,
            current_school_join_date TEXT,
            qualifications TEXT,
            profile_pic TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            index_no TEXT,
            name_with_initials TEXT NOT NULL,
            full_name TEXT,
            dob TEXT,
            grade TEXT NOT NULL,
            class TEXT NOT NULL,
            gender TEXT,
            contact_no TEXT,
            teacher_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_grade_class ON students(grade, class)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_teacher ON students(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exams(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            year TEXT NOT NULL,
            term TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade TEXT NOT NULL,
            category TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_grade ON subjects(grade)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exam_results(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            student_index_no TEXT,
            exam_id TEXT NOT NULL,
            total_marks REAL NOT NULL,
            average REAL NOT NULL,
            class_rank INTEGER,
            grade_rank INTEGER,
            UNIQUE(student_id, exam_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exam_results_exam ON exam_results(exam_id)",
        [],
    )?;

    // Workspaces written before grade-scoped ranking only carried class_rank.
    ensure_exam_results_grade_rank(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_results(
            id TEXT PRIMARY KEY,
            exam_result_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            marks REAL NOT NULL,
            grade TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(exam_result_id) REFERENCES exam_results(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subject_results_result ON subject_results(exam_result_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS leaves(
            id TEXT PRIMARY KEY,
            teacher_id TEXT NOT NULL,
            teacher_name TEXT NOT NULL,
            type TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL,
            applied_date TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_leaves_teacher ON leaves(teacher_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS news(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            date TEXT NOT NULL,
            category TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )?;

    seed_initial_data(&conn)?;

    Ok(conn)
}

fn ensure_exam_results_grade_rank(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "exam_results", "grade_rank")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE exam_results ADD COLUMN grade_rank INTEGER", [])?;
    Ok(())
}

/// First-run dataset matching the original portal: an admin account, one
/// sample teacher, the school profile, a welcome notice and two students.
/// Skipped whenever any user already exists.
fn seed_initial_data(conn: &Connection) -> anyhow::Result<()> {
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
    if user_count > 0 {
        return Ok(());
    }

    conn.execute(
        "INSERT INTO users(id, email, password, name, role, nic, designation, subject,
                           assigned_class, contact, service_type, active)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        (
            "admin1",
            "teacher@nikawewa.edu",
            "Admin",
            "School Administrator",
            "ADMIN",
            "198012345678",
            "Principal",
            "Administration",
            "N/A",
            "0112345678",
            "SLEAS Class I",
        ),
    )?;
    conn.execute(
        "INSERT INTO users(id, email, password, name, role, nic, designation, subject,
                           assigned_class, contact, service_type, active)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)",
        (
            "teacher1",
            "ahmed@nikawewa.edu",
            "password123",
            "Ahmed Fawaz",
            "TEACHER",
            "199023456789",
            "Graduate Teacher",
            "Mathematics",
            "Grade 10-A",
            "0771234567",
            "SLTS Class II-II",
        ),
    )?;

    settings_set_json(
        conn,
        "school_profile",
        &json!({
            "name": "A/Nikawewa Muslim Vidyalaya",
            "address": "Nikawewa, Anuradhapura, Sri Lanka",
            "academicYear": "2024",
            "termDates": {
                "term1": "2024-01-10 to 2024-04-05",
                "term2": "2024-04-20 to 2024-08-15",
                "term3": "2024-09-01 to 2024-12-05"
            },
            "logoUrl": "https://picsum.photos/200"
        }),
    )?;

    conn.execute(
        "INSERT INTO news(id, title, content, date, category) VALUES(?, ?, ?, ?, ?)",
        (
            "1",
            "Monthly Staff Meeting",
            "All teachers are requested to attend the monthly progress meeting on Monday.",
            "2024-03-20",
            "Notice",
        ),
    )?;

    conn.execute(
        "INSERT INTO students(id, name_with_initials, grade, class, teacher_id)
         VALUES(?, ?, ?, ?, ?)",
        ("s1", "Zaid Mohamed", "10", "A", "teacher1"),
    )?;
    conn.execute(
        "INSERT INTO students(id, name_with_initials, grade, class, teacher_id)
         VALUES(?, ?, ?, ?, ?)",
        ("s2", "Sara Ibrahim", "10", "A", "teacher1"),
    )?;

    Ok(())
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let text = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, &text),
    )?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let text: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match text {
        Some(t) => Ok(Some(serde_json::from_str(&t)?)),
        None => Ok(None),
    }
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
