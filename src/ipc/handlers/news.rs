use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Local;
use serde_json::json;
use uuid::Uuid;

const NEWS_CATEGORIES: [&str; 3] = ["Notice", "Event", "Circular"];

fn handle_news_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let mut stmt = match conn.prepare(
        "SELECT id, title, content, date, category
         FROM news
         ORDER BY date DESC, rowid DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let content: String = row.get(2)?;
            let date: String = row.get(3)?;
            let category: String = row.get(4)?;
            Ok(json!({
                "id": id,
                "title": title,
                "content": content,
                "date": date,
                "category": category
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(news) => ok(&req.id, json!({ "news": news })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_news_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let title = match req.params.get("title").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing title", None),
    };
    let content = match req.params.get("content").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing content", None),
    };
    let category = match req.params.get("category").and_then(|v| v.as_str()) {
        Some(v) if NEWS_CATEGORIES.contains(&v) => v.to_string(),
        _ => {
            return err(
                &req.id,
                "bad_params",
                "category must be one of: Notice, Event, Circular",
                None,
            )
        }
    };

    let news_id = Uuid::new_v4().to_string();
    let date = Local::now().date_naive().format("%Y-%m-%d").to_string();

    let result = conn.execute(
        "INSERT INTO news(id, title, content, date, category) VALUES(?, ?, ?, ?, ?)",
        (&news_id, &title, &content, &date, &category),
    );

    match result {
        Ok(_) => ok(&req.id, json!({ "newsId": news_id, "date": date })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "news" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "news.list" => Some(handle_news_list(state, req)),
        "news.add" => Some(handle_news_add(state, req)),
        _ => None,
    }
}
