
use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn seeded_admin_can_log_in_and_wrong_password_is_rejected() {
    let workspace = temp_dir("tmsd-auth");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.login",
        json!({ "email": "teacher@nikawewa.edu", "password": "Admin" }),
    );
    let user = login.get("user").expect("user");
    assert_eq!(user["role"].as_str(), Some("ADMIN"));
    assert_eq!(user["name"].as_str(), Some("School Administrator"));
    assert!(user.get("password").is_none());

    let rejected = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.login",
        json!({ "email": "teacher@nikawewa.edu", "password": "wrong" }),
    );
    assert_eq!(error_code(&rejected), "invalid_credentials");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn user_listing_never_carries_passwords() {
    let workspace = temp_dir("tmsd-user-listing");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let listed = request_ok(&mut stdin, &mut reader, "2", "users.list", json!({}));
    let users = listed.get("users").and_then(|v| v.as_array()).expect("users");
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("password").is_none(), "password leaked: {}", user);
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn updating_a_user_without_password_keeps_the_stored_one() {
    let workspace = temp_dir("tmsd-user-update");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "users.save",
        json!({ "user": {
            "id": "teacher1",
            "email": "ahmed@nikawewa.edu",
            "name": "Ahmed Fawaz",
            "role": "TEACHER",
            "designation": "Senior Graduate Teacher"
        }}),
    );

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.login",
        json!({ "email": "ahmed@nikawewa.edu", "password": "password123" }),
    );
    assert_eq!(
        login.pointer("/user/designation").and_then(|v| v.as_str()),
        Some("Senior Graduate Teacher")
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn new_users_need_a_password_and_deactivated_accounts_cannot_log_in() {
    let workspace = temp_dir("tmsd-user-lifecycle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let missing_password = request(
        &mut stdin,
        &mut reader,
        "2",
        "users.save",
        json!({ "user": { "email": "new@nikawewa.edu", "name": "New Teacher", "role": "TEACHER" } }),
    );
    assert_eq!(error_code(&missing_password), "bad_params");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "users.save",
        json!({ "user": {
            "id": "teacher1",
            "email": "ahmed@nikawewa.edu",
            "name": "Ahmed Fawaz",
            "role": "TEACHER",
            "active": false
        }}),
    );
    let rejected = request(
        &mut stdin,
        &mut reader,
        "4",
        "auth.login",
        json!({ "email": "ahmed@nikawewa.edu", "password": "password123" }),
    );
    assert_eq!(error_code(&rejected), "invalid_credentials");

    drop(stdin);
    let _ = child.wait();
}
