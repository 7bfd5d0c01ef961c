mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{
    fixture_path, request_err, request_ok, spawn_sidecar, spawn_sidecar_with_env, temp_dir,
};

#[test]
fn library_methods_require_an_open_store() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["version"].as_str().is_some());
    assert!(health["workspacePath"].is_null());
    assert!(health["backend"].is_null());
    assert_eq!(health["loanPeriodDays"].as_i64(), Some(14));

    for (i, method) in [
        "books.list",
        "books.genres",
        "issues.list",
        "issues.overdue",
        "library.summary",
    ]
    .iter()
    .enumerate()
    {
        let id = format!("nows-{i}");
        let code = request_err(&mut stdin, &mut reader, &id, method, json!({}));
        assert_eq!(code, "no_workspace", "{method}");
    }

    let code = request_err(&mut stdin, &mut reader, "2", "books.teleport", json!({}));
    assert_eq!(code, "not_implemented");
    let code = request_err(&mut stdin, &mut reader, "3", "workspace.select", json!({}));
    assert_eq!(code, "bad_params");
}

#[test]
fn malformed_lines_get_bad_json_without_id() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response");
    assert_eq!(value["ok"].as_bool(), Some(false));
    assert_eq!(value["error"]["code"].as_str(), Some("bad_json"));
    assert!(value.get("id").is_none());

    // The loop keeps serving after a bad line.
    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health["version"].as_str().is_some());
}

#[test]
fn bundled_fixtures_answer_catalog_and_ledger_queries() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let opened = request_ok(&mut stdin, &mut reader, "1", "workspace.openMemory", json!({}));
    assert_eq!(opened["backend"].as_str(), Some("memory"));
    assert_eq!(opened["books"].as_i64(), Some(6));
    assert_eq!(opened["issues"].as_i64(), Some(5));

    let health = request_ok(&mut stdin, &mut reader, "2", "health", json!({}));
    assert_eq!(health["backend"].as_str(), Some("memory"));

    let all = request_ok(&mut stdin, &mut reader, "3", "books.list", json!({}));
    let titles: Vec<&str> = all["books"]
        .as_array()
        .expect("books")
        .iter()
        .filter_map(|b| b["title"].as_str())
        .collect();
    assert_eq!(titles.len(), 6);
    assert_eq!(titles.first(), Some(&"Calculus: Early Transcendentals"));

    let search = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "books.list",
        json!({ "search": "ALGORITHMS" }),
    );
    assert_eq!(search["books"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(search["books"][0]["id"].as_i64(), Some(1));

    let by_genre = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "books.list",
        json!({ "genre": "Computer Science", "availability": "available" }),
    );
    assert_eq!(by_genre["books"].as_array().map(|a| a.len()), Some(2));

    let unavailable = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "books.list",
        json!({ "availability": "unavailable" }),
    );
    assert_eq!(unavailable["books"][0]["id"].as_i64(), Some(4));

    let genres = request_ok(&mut stdin, &mut reader, "7", "books.genres", json!({}));
    assert_eq!(
        genres["genres"],
        json!([
            "Chemistry",
            "Computer Science",
            "Economics",
            "Mathematics",
            "Software Engineering"
        ])
    );

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "library.summary",
        json!({ "asOf": "2024-05-16" }),
    );
    assert_eq!(summary["titleCount"].as_i64(), Some(6));
    assert_eq!(summary["totalCopies"].as_i64(), Some(17));
    assert_eq!(summary["availableCopies"].as_i64(), Some(13));
    assert_eq!(summary["activeIssues"].as_i64(), Some(4));
    assert_eq!(summary["overdueIssues"].as_i64(), Some(2));
    assert_eq!(summary["returnedIssues"].as_i64(), Some(1));

    let overdue = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "issues.overdue",
        json!({ "asOf": "2024-05-16" }),
    );
    let ids: Vec<i64> = overdue["issues"]
        .as_array()
        .expect("issues")
        .iter()
        .filter_map(|r| r["id"].as_i64())
        .collect();
    assert_eq!(ids, vec![1, 4]);

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "issues.byStudent",
        json!({ "studentId": "1" }),
    );
    assert_eq!(student["issues"].as_array().map(|a| a.len()), Some(2));

    let returned = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "issues.list",
        json!({ "status": "returned" }),
    );
    assert_eq!(returned["issues"][0]["id"].as_i64(), Some(5));

    let for_book = request_ok(
        &mut stdin,
        &mut reader,
        "11b",
        "issues.list",
        json!({ "bookId": "1", "studentId": 2 }),
    );
    assert_eq!(for_book["issues"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(for_book["issues"][0]["id"].as_i64(), Some(2));
    let code = request_err(
        &mut stdin,
        &mut reader,
        "11c",
        "issues.list",
        json!({ "bookId": "one" }),
    );
    assert_eq!(code, "bad_params");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "11d",
        "issues.overdue",
        json!({ "asOf": "2024-05-16garbage" }),
    );
    assert_eq!(code, "validation");
    assert_eq!(returned["issues"][0]["returnDate"].as_str(), Some("2024-03-22"));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "12",
        "issues.issue",
        json!({ "bookId": 4, "studentId": 9 }),
    );
    assert_eq!(code, "unavailable");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "13",
        "issues.extendDue",
        json!({ "issueId": 5, "dueDate": "2024-04-30" }),
    );
    assert_eq!(code, "invalid_state");
    let extended = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "issues.extendDue",
        json!({ "issueId": 4, "dueDate": "2024-04-30" }),
    );
    assert_eq!(extended["dueDate"].as_str(), Some("2024-04-30"));
}

#[test]
fn catalog_mutations_validate_and_report_error_codes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "workspace.openMemory", json!({}));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "books.create",
        json!({ "title": "  ", "author": "Nobody", "isbn": "x-1", "genre": "Misc",
                "publicationYear": 2001, "totalCopies": 1 }),
    );
    assert_eq!(code, "validation");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "books.create",
        json!({ "title": "Copy", "author": "Nobody", "isbn": "978-0132350884",
                "genre": "Misc", "publicationYear": 2001, "totalCopies": 1 }),
    );
    assert_eq!(code, "validation");

    // Book 1 has 5 copies with 2 out; shrinking by 3 leaves none on the shelf.
    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "books.update",
        json!({ "bookId": 1, "patch": { "totalCopies": 2, "genre": "Algorithms" } }),
    );
    assert_eq!(updated["totalCopies"].as_i64(), Some(2));
    assert_eq!(updated["availableCopies"].as_i64(), Some(0));
    assert_eq!(updated["genre"].as_str(), Some("Algorithms"));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "books.update",
        json!({ "bookId": 1, "patch": { "totalCopies": -1 } }),
    );
    assert_eq!(code, "validation");
    let code = request_err(&mut stdin, &mut reader, "6", "books.update", json!({ "bookId": 1 }));
    assert_eq!(code, "bad_params");

    let adjusted = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "books.adjustAvailability",
        json!({ "bookId": 5, "delta": -2 }),
    );
    assert_eq!(adjusted["availableCopies"].as_i64(), Some(0));
    let code = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "books.adjustAvailability",
        json!({ "bookId": 5, "delta": -1 }),
    );
    assert_eq!(code, "invalid_state");

    request_ok(&mut stdin, &mut reader, "9", "books.delete", json!({ "bookId": 6 }));
    let code = request_err(&mut stdin, &mut reader, "10", "books.get", json!({ "bookId": 6 }));
    assert_eq!(code, "not_found");
    let code = request_err(&mut stdin, &mut reader, "11", "books.delete", json!({ "bookId": 6 }));
    assert_eq!(code, "not_found");
}

#[test]
fn fixtures_import_into_a_fresh_workspace() {
    let workspace = temp_dir("campusd-fixture-import");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let fixtures = fixture_path("fixtures/library.json");
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "library.importFixtures",
        json!({ "path": fixtures.to_string_lossy() }),
    );
    assert_eq!(imported["books"].as_i64(), Some(6));
    assert_eq!(imported["issues"].as_i64(), Some(5));

    // Ids already present: the whole seed is rejected.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "library.importFixtures",
        json!({ "path": fixtures.to_string_lossy() }),
    );
    assert_eq!(code, "validation");
    let listed = request_ok(&mut stdin, &mut reader, "4", "books.list", json!({}));
    assert_eq!(listed["books"].as_array().map(|a| a.len()), Some(6));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "library.importFixtures",
        json!({ "path": workspace.join("missing.json").to_string_lossy() }),
    );
    assert_eq!(code, "io_failed");

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn environment_settings_reach_the_sidecar() {
    let workspace = temp_dir("campusd-env-workspace");
    let workspace_str = workspace.to_string_lossy().to_string();
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[
        ("CAMPUSD_WORKSPACE", workspace_str.as_str()),
        ("CAMPUSD_LOAN_PERIOD_DAYS", "21"),
    ]);

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["loanPeriodDays"].as_i64(), Some(21));
    assert_eq!(health["backend"].as_str(), Some("sqlite"));
    assert_eq!(health["workspacePath"].as_str(), Some(workspace_str.as_str()));

    let book = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "books.create",
        json!({ "title": "Middlemarch", "author": "George Eliot", "isbn": "978-0-14-143954-9",
                "genre": "Fiction", "publicationYear": 1871, "totalCopies": 1 }),
    );
    let issued = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "issues.issue",
        json!({ "bookId": book["id"], "studentId": 3 }),
    );
    let issue_date =
        chrono::NaiveDate::parse_from_str(issued["issueDate"].as_str().expect("issueDate"), "%Y-%m-%d")
            .expect("issue date");
    let due_date =
        chrono::NaiveDate::parse_from_str(issued["dueDate"].as_str().expect("dueDate"), "%Y-%m-%d")
            .expect("due date");
    assert_eq!((due_date - issue_date).num_days(), 21);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn out_of_range_loan_period_stops_startup() {
    let (mut child, _stdin, _reader) =
        spawn_sidecar_with_env(&[("CAMPUSD_LOAN_PERIOD_DAYS", "100000000")]);
    let status = child.wait().expect("wait for campusd");
    assert!(!status.success());
}
