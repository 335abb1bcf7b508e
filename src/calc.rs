use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Letter grades used on report schedules. Thresholds are inclusive lower
/// bounds, evaluated highest-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    S,
    W,
}

impl Grade {
    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::S => "S",
            Grade::W => "W",
        }
    }

    pub fn from_letter(s: &str) -> Option<Grade> {
        match s {
            "A" => Some(Grade::A),
            "B" => Some(Grade::B),
            "C" => Some(Grade::C),
            "S" => Some(Grade::S),
            "W" => Some(Grade::W),
            _ => None,
        }
    }
}

/// Any numeric input classifies; out-of-range marks are the caller's
/// responsibility.
pub fn classify(marks: f64) -> Grade {
    if marks >= 75.0 {
        Grade::A
    } else if marks >= 65.0 {
        Grade::B
    } else if marks >= 50.0 {
        Grade::C
    } else if marks >= 35.0 {
        Grade::S
    } else {
        Grade::W
    }
}

/// Display rounding to one decimal place. Computation keeps full precision;
/// only report models round.
pub fn round_display_1dp(x: f64) -> f64 {
    (10.0 * x).round() / 10.0
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMark {
    pub subject_id: String,
    #[serde(default)]
    pub subject_name: String,
    pub marks: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub subject_id: String,
    pub subject_name: String,
    pub marks: f64,
    pub grade: Grade,
}

/// Attaches a grade to each subject mark. Order is preserved; any grade the
/// caller may have supplied is ignored and derived fresh.
pub fn normalize_subjects(marks: Vec<SubjectMark>) -> Vec<SubjectResult> {
    marks
        .into_iter()
        .map(|m| SubjectResult {
            grade: classify(m.marks),
            subject_id: m.subject_id,
            subject_name: m.subject_name,
            marks: m.marks,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultTotals {
    pub total_marks: f64,
    pub average: f64,
}

pub fn compute_totals(results: &[SubjectResult]) -> ResultTotals {
    let total_marks: f64 = results.iter().map(|r| r.marks).sum();
    let average = if results.is_empty() {
        0.0
    } else {
        total_marks / results.len() as f64
    };
    ResultTotals {
        total_marks,
        average,
    }
}

/// One exam result as the rank assigner sees it. `grade`/`class_name` come
/// from the student registry; both are None when the student is unknown.
#[derive(Debug, Clone)]
pub struct RankEntry {
    pub result_id: String,
    pub average: f64,
    pub grade: Option<String>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RankAssignment {
    pub result_id: String,
    pub grade_rank: Option<i64>,
    pub class_rank: Option<i64>,
}

/// Two-level rank assignment over one exam's results.
///
/// gradeRank is the 1-based position within the exam×grade partition,
/// classRank within the exam×grade×class partition, both ordered by average
/// descending. Sorting is stable, so ties keep cohort load order. Entries
/// that cannot be matched to a registry grade (or class) are excluded from
/// the corresponding partition and keep a null rank.
///
/// This is a full recomputation over the cohort on every call, O(n log n).
pub fn assign_ranks(entries: &[RankEntry]) -> Vec<RankAssignment> {
    let mut out: Vec<RankAssignment> = entries
        .iter()
        .map(|e| RankAssignment {
            result_id: e.result_id.clone(),
            grade_rank: None,
            class_rank: None,
        })
        .collect();

    let mut by_grade: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut by_grade_class: HashMap<(&str, &str), Vec<usize>> = HashMap::new();
    for (i, e) in entries.iter().enumerate() {
        let Some(grade) = e.grade.as_deref() else {
            continue;
        };
        by_grade.entry(grade).or_default().push(i);
        if let Some(class_name) = e.class_name.as_deref() {
            by_grade_class
                .entry((grade, class_name))
                .or_default()
                .push(i);
        }
    }

    for indexes in by_grade.values_mut() {
        sort_desc_by_average(indexes, entries);
        for (pos, &i) in indexes.iter().enumerate() {
            out[i].grade_rank = Some(pos as i64 + 1);
        }
    }
    for indexes in by_grade_class.values_mut() {
        sort_desc_by_average(indexes, entries);
        for (pos, &i) in indexes.iter().enumerate() {
            out[i].class_rank = Some(pos as i64 + 1);
        }
    }

    out
}

fn sort_desc_by_average(indexes: &mut [usize], entries: &[RankEntry]) {
    indexes.sort_by(|&a, &b| {
        entries[b]
            .average
            .partial_cmp(&entries[a].average)
            .unwrap_or(Ordering::Equal)
    });
}
