//! Integration tests for the study group backend.

use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime, Weekday};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::scheduling::SchedulingRules;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            reminder_interval_secs: 0,
            reminder_lead_minutes: 30,
            rules: SchedulingRules::default(),
            warnings: Vec::new(),
        };

        let app = create_router(AppState::new(Repository::new(pool), config));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn put(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let resp = self
            .client
            .put(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let resp = self.client.delete(self.url(path)).send().await.unwrap();
        (resp.status(), resp.json().await.unwrap())
    }

    async fn create_student(&self, name: &str, availability: &[&str]) -> String {
        let (status, body) = self
            .post(
                "/api/students",
                json!({ "name": name, "availability": availability }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn create_group(&self, name: &str, max_members: i64, member_ids: &[&str]) -> Value {
        let (status, body) = self
            .post(
                "/api/groups",
                json!({
                    "name": name,
                    "subject": "Mathematics",
                    "maxMembers": max_members,
                    "memberIds": member_ids
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"].clone()
    }

    /// Alice and Bob share Monday 10:00-11:30 and Friday 22:00-23:00. Alice alone has
    /// Tuesday 09:00-10:00.
    async fn study_group(&self) -> String {
        let alice = self
            .create_student(
                "Alice",
                &["MON_10:00-11:30", "TUE_09:00-10:00", "FRI_22:00-23:00"],
            )
            .await;
        let bob = self
            .create_student("Bob", &["MON_10:00-11:30", "FRI_22:00-23:00"])
            .await;
        let group = self.create_group("Calculus", 6, &[&alice, &bob]).await;
        group["id"].as_str().unwrap().to_string()
    }

    async fn create_session(&self, group_id: &str, start: NaiveDateTime, minutes: i64) -> Value {
        let (status, body) = self
            .post(
                "/api/sessions",
                json!({
                    "groupId": group_id,
                    "title": "Limits and continuity",
                    "scheduledTime": iso(start),
                    "durationMinutes": minutes
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"].clone()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// First `weekday` strictly after today, so it is always inside the search horizon.
fn next(weekday: Weekday) -> NaiveDate {
    let mut day = today() + Days::new(1);
    while day.weekday() != weekday {
        day = day + Days::new(1);
    }
    day
}

fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_hms_opt(hour, minute, 0).unwrap()
}

fn iso(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Request without API key
    let resp = Client::new()
        .get(fixture.url("/api/students"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_auth_invalid_psk() {
    let fixture = TestFixture::new().await;

    // Request with wrong API key
    let resp = Client::new()
        .get(fixture.url("/api/students"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_auth_valid_psk_and_bearer() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture.get("/api/students").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let resp = Client::new()
        .get(fixture.url("/api/groups"))
        .header("Authorization", "Bearer test-api-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_auth_disabled_without_psk() {
    let fixture = TestFixture::with_psk(None).await;
    let (status, _) = fixture.get("/api/sessions/upcoming").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_membership_maintains_common_slots() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;

    let (status, body) = fixture
        .get(&format!("/api/groups/{}/common-slots", group_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["FRI_22:00-23:00", "MON_10:00-11:30"]));

    // Carol only shares Monday.
    let carol = fixture.create_student("Carol", &["MON_10:00-11:30"]).await;
    let (status, body) = fixture
        .post(
            &format!("/api/groups/{}/members", group_id),
            json!({ "studentId": carol }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["currentMembers"], 3);
    assert_eq!(body["data"]["commonSlots"], json!(["MON_10:00-11:30"]));

    // Joining twice changes nothing.
    let (_, body) = fixture
        .post(
            &format!("/api/groups/{}/members", group_id),
            json!({ "studentId": carol }),
        )
        .await;
    assert_eq!(body["data"]["currentMembers"], 3);

    // Carol widens her availability; the group follows.
    let (status, _) = fixture
        .put(
            &format!("/api/students/{}/availability", carol),
            json!({ "availability": ["MON_10:00-11:30", "FRI_22:00-23:00"] }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = fixture.get(&format!("/api/groups/{}", group_id)).await;
    assert_eq!(body["data"]["commonSlots"].as_array().unwrap().len(), 2);

    let (status, body) = fixture
        .delete(&format!("/api/groups/{}/members/{}", group_id, carol))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["currentMembers"], 2);
}

#[tokio::test]
async fn test_full_group_rejects_and_reopens() {
    let fixture = TestFixture::new().await;
    let alice = fixture.create_student("Alice", &[]).await;
    let bob = fixture.create_student("Bob", &[]).await;
    let carol = fixture.create_student("Carol", &[]).await;

    let group = fixture.create_group("Pair", 2, &[&alice, &bob]).await;
    assert_eq!(group["status"], "FULL");
    let group_id = group["id"].as_str().unwrap();

    let (status, body) = fixture
        .post(
            &format!("/api/groups/{}/members", group_id),
            json!({ "studentId": carol }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, body) = fixture
        .delete(&format!("/api/groups/{}/members/{}", group_id, bob))
        .await;
    assert_eq!(body["data"]["status"], "ACTIVE");
}

#[tokio::test]
async fn test_group_validation_and_not_found() {
    let fixture = TestFixture::new().await;

    let (status, body) = fixture
        .post("/api/groups", json!({ "name": "  ", "subject": "Physics" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = fixture
        .post(
            "/api/groups",
            json!({ "name": "Ghosts", "subject": "Physics", "memberIds": ["nobody"] }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = fixture.get("/api/groups/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture.get("/api/students/nonexistent").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_session_in_common_slot_is_clean() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;

    let session = fixture
        .create_session(&group_id, at(next(Weekday::Mon), 10, 0), 60)
        .await;

    assert_eq!(session["conflicts"], json!([]));
    assert_eq!(session["status"], "SCHEDULED");
    assert_eq!(session["type"], "STUDY");
    assert_eq!(session["attendeeIds"].as_array().unwrap().len(), 2);
    assert!(session["recommendation"]
        .as_str()
        .unwrap()
        .starts_with("Recommended duration:"));
}

#[tokio::test]
async fn test_conflicting_session_is_created_with_conflicts() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;

    let (status, body) = fixture
        .post(
            "/api/sessions",
            json!({
                "groupId": group_id,
                "title": "Series",
                "scheduledTime": iso(at(next(Weekday::Tue), 9, 0)),
                "durationMinutes": 60,
                "type": "EXAM_PREP"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    let session = &body["data"];
    let conflicts = session["conflicts"].as_array().unwrap();
    assert_eq!(conflicts[0], "Bob is not available at TUE_09:00-10:00");
    assert!(conflicts
        .last()
        .unwrap()
        .as_str()
        .unwrap()
        .starts_with("Suggested alternatives: "));
    assert_eq!(session["conflictDetails"][0]["kind"], "UNAVAILABLE");
    assert!(session["recommendation"]
        .as_str()
        .unwrap()
        .ends_with("Focus on practice problems and review key concepts."));

    let (_, body) = fixture.get("/api/sessions/conflicts").await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_overlapping_sessions_of_groups_sharing_a_member() {
    let fixture = TestFixture::new().await;
    let alice = fixture.create_student("Alice", &["MON_10:00-11:30"]).await;
    let bob = fixture.create_student("Bob", &["MON_10:00-11:30"]).await;
    let zoe = fixture.create_student("Zoe", &["MON_10:00-11:30"]).await;
    let first = fixture.create_group("Algebra", 6, &[&alice, &bob]).await;
    let second = fixture.create_group("Geometry", 6, &[&bob, &zoe]).await;

    let monday = next(Weekday::Mon);
    fixture
        .create_session(first["id"].as_str().unwrap(), at(monday, 10, 0), 60)
        .await;
    let clash = fixture
        .create_session(second["id"].as_str().unwrap(), at(monday, 10, 10), 60)
        .await;

    let conflicts = clash["conflicts"].as_array().unwrap();
    assert!(conflicts.contains(&json!("Conflicts with 1 existing session(s)")));
}

#[tokio::test]
async fn test_force_schedule() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;
    let session = fixture
        .create_session(&group_id, at(next(Weekday::Tue), 9, 0), 60)
        .await;
    let id = session["id"].as_str().unwrap();
    let before = session["conflicts"].as_array().unwrap().len();

    let (status, body) = fixture
        .post(
            &format!("/api/sessions/{}/force-schedule", id),
            json!({ "reason": "Only slot before the exam" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let conflicts = body["data"]["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), before + 1);
    assert_eq!(
        conflicts.last().unwrap(),
        "FORCE SCHEDULED: Only slot before the exam"
    );
    assert_eq!(body["data"]["status"], "SCHEDULED");

    let (status, body) = fixture
        .post(
            &format!("/api/sessions/{}/force-schedule", id),
            json!({ "reason": "" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_update_session_reevaluates() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;
    let session = fixture
        .create_session(&group_id, at(next(Weekday::Tue), 9, 0), 60)
        .await;
    let id = session["id"].as_str().unwrap();

    let (status, body) = fixture
        .put(
            &format!("/api/sessions/{}", id),
            json!({ "scheduledTime": iso(at(next(Weekday::Mon), 10, 0)), "durationMinutes": 90 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["conflicts"], json!([]));
    assert_eq!(body["data"]["durationMinutes"], 90);

    let (status, _) = fixture
        .put(&format!("/api/sessions/{}", id), json!({ "title": "" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_session_validation() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;
    let start = iso(at(next(Weekday::Mon), 10, 0));

    let (status, _) = fixture
        .post(
            "/api/sessions",
            json!({ "groupId": group_id, "title": " ", "scheduledTime": start }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = fixture
        .post(
            "/api/sessions",
            json!({ "groupId": group_id, "title": "Zero", "scheduledTime": start, "durationMinutes": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = fixture
        .post(
            "/api/sessions",
            json!({ "groupId": group_id, "title": "Marathon", "scheduledTime": start, "durationMinutes": 1_000_000_000_000i64 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture
        .post(
            "/api/sessions",
            json!({ "groupId": "missing", "title": "Lost", "scheduledTime": start }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_delete_session() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;
    let session = fixture
        .create_session(&group_id, at(next(Weekday::Mon), 10, 0), 60)
        .await;
    let path = format!("/api/sessions/{}", session["id"].as_str().unwrap());

    let (status, _) = fixture.delete(&path).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = fixture.delete(&path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = fixture.get(&path).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_group_removes_its_sessions() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;
    let session = fixture
        .create_session(&group_id, at(next(Weekday::Mon), 10, 0), 60)
        .await;

    let (status, _) = fixture.delete(&format!("/api/groups/{}", group_id)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = fixture
        .get(&format!("/api/sessions/{}", session["id"].as_str().unwrap()))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = fixture.delete(&format!("/api/groups/{}", group_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_suggest_times_best_score_first() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;
    let path = format!("/api/groups/{}/suggest-times", group_id);

    let (status, body) = fixture
        .post(&path, json!({ "durationMinutes": 60, "count": 5 }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let times: Vec<NaiveDateTime> = serde_json::from_value(body["data"].clone()).unwrap();
    assert!(!times.is_empty() && times.len() <= 5);
    let horizon_end = today() + Days::new(14);
    for t in &times {
        assert!(t.date() > today() && t.date() <= horizon_end);
    }
    // Monday mornings score 100, Friday nights 30.
    let first_late = times.iter().position(|t| t.weekday() == Weekday::Fri);
    if let Some(idx) = first_late {
        assert!(times[..idx].iter().all(|t| t.weekday() == Weekday::Mon));
        assert!(times[idx..].iter().all(|t| t.weekday() == Weekday::Fri));
    }
    assert_eq!(times[0].weekday(), Weekday::Mon);

    let (status, _) = fixture.post(&path, json!({ "count": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = fixture
        .post("/api/groups/missing/suggest-times", json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lifecycle_attendance_and_analytics() {
    let fixture = TestFixture::new().await;
    let group_id = fixture.study_group().await;
    let session = fixture
        .create_session(&group_id, at(next(Weekday::Mon), 10, 0), 60)
        .await;
    let id = session["id"].as_str().unwrap();
    fixture
        .create_session(&group_id, at(next(Weekday::Tue), 9, 0), 60)
        .await;

    // Cannot complete a session that never started.
    let (status, _) = fixture
        .post(
            &format!("/api/sessions/{}/status", id),
            json!({ "status": "COMPLETED" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for next_status in ["IN_PROGRESS", "COMPLETED"] {
        let (status, body) = fixture
            .post(
                &format!("/api/sessions/{}/status", id),
                json!({ "status": next_status }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], next_status);
    }

    let (status, _) = fixture
        .post(
            &format!("/api/sessions/{}/attendance", id),
            json!({ "actualAttendees": 5 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = fixture
        .post(
            &format!("/api/sessions/{}/attendance", id),
            json!({ "actualAttendees": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["actualAttendees"], 1);

    let (status, body) = fixture
        .put(
            &format!("/api/sessions/{}/notes", id),
            json!({ "notes": "Covered the squeeze theorem" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["notes"], "Covered the squeeze theorem");

    let (status, body) = fixture
        .get(&format!("/api/groups/{}/analytics", group_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["totalSessions"], 2);
    assert_eq!(stats["completedSessions"], 1);
    assert_eq!(stats["averageAttendancePercent"], 50.0);
    assert_eq!(stats["conflictRatePercent"], 50.0);
    assert_eq!(stats["sessionTypeDistribution"]["STUDY"], 2);
}

#[tokio::test]
async fn test_session_listings() {
    let fixture = TestFixture::new().await;
    let alice = fixture.create_student("Alice", &["MON_10:00-11:30"]).await;
    let group = fixture.create_group("Solo", 6, &[&alice]).await;
    let group_id = group["id"].as_str().unwrap();

    let later = fixture
        .create_session(group_id, at(next(Weekday::Mon) + Days::new(7), 10, 0), 60)
        .await;
    let sooner = fixture
        .create_session(group_id, at(next(Weekday::Mon), 10, 0), 60)
        .await;

    let (_, body) = fixture.get("/api/sessions/upcoming").await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![sooner["id"].as_str().unwrap(), later["id"].as_str().unwrap()]
    );

    let (_, body) = fixture
        .get(&format!("/api/groups/{}/sessions", group_id))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = fixture
        .get(&format!("/api/students/{}/sessions", alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = fixture.get("/api/students/nobody/sessions").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
