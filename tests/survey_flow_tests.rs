// tests/survey_flow_tests.rs
//
// End-to-end submission and statistics flows against PostgreSQL.
// Run with `DATABASE_URL=... cargo test -- --ignored`.

use std::net::SocketAddr;

use serde_json::{Value, json};
use sqlx::{PgPool, postgres::PgPoolOptions};
use survey_backend::{config::Config, handlers::auth::seed_admin, routes, state::AppState};

const API_TOKEN: &str = "test-api-token";

struct TestApp {
    address: String,
    pool: PgPool,
    client: reqwest::Client,
}

async fn connect() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    pool
}

async fn spawn_app_with(allow_multiple_responses: bool) -> TestApp {
    let pool = connect().await;

    let config = Config {
        database_url: String::new(),
        jwt_secret: "flow_test_secret".to_string(),
        jwt_expiration: 600,
        api_token: API_TOKEN.to_string(),
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        allow_multiple_responses,
        // Lets each test pose as many respondents from one machine.
        trust_forwarded_for: true,
        port: 0,
        submit_rate_limit: None,
    };

    let app = routes::create_router(AppState::new(pool.clone(), config));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        client: reqwest::Client::new(),
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(false).await
}

/// A fresh random IPv4 address per call, so tests never collide on identity.
fn random_ip() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    format!("10.{}.{}.{}", bytes[0], bytes[1], bytes[2])
}

async fn create_survey(pool: &PgPool, active: bool) -> i64 {
    sqlx::query_scalar("INSERT INTO surveys (title, is_active) VALUES ($1, $2) RETURNING id")
        .bind(format!("Survey {}", uuid::Uuid::new_v4()))
        .bind(active)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn create_question(pool: &PgPool, survey_id: i64, question_type: &str) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO questions (survey_id, text, type) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(survey_id)
    .bind(format!("A {} question", question_type))
    .bind(question_type)
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn create_option(pool: &PgPool, question_id: i64, text: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO options (question_id, text) VALUES ($1, $2) RETURNING id")
        .bind(question_id)
        .bind(text)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn count_responses(pool: &PgPool, survey_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM responses WHERE survey_id = $1")
        .bind(survey_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn count_answers(pool: &PgPool, survey_id: i64) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM answers a JOIN responses r ON r.id = a.response_id WHERE r.survey_id = $1",
    )
    .bind(survey_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

impl TestApp {
    async fn submit(&self, survey_id: i64, ip: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(format!("{}/api/surveys/{}/responses", self.address, survey_id))
            .header("X-API-Token", API_TOKEN)
            .header("X-Forwarded-For", ip)
            .json(&body)
            .send()
            .await
            .expect("Submit failed");
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    async fn results(&self, survey_id: i64) -> Value {
        let response = self
            .client
            .get(format!("{}/api/surveys/{}/results", self.address, survey_id))
            .header("X-API-Token", API_TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        response.json().await.unwrap()
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn choice_statistics_three_to_one() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "single_choice").await;
    let a = create_option(&app.pool, question_id, "A").await;
    let b = create_option(&app.pool, question_id, "B").await;

    for option_id in [a, a, a, b] {
        let (status, body) = app
            .submit(
                survey_id,
                &random_ip(),
                json!({ "answers": [{ "question_id": question_id, "option_id": option_id }] }),
            )
            .await;
        assert_eq!(status, 201);
        assert_eq!(body["status"], "ok");
    }

    let stats = app.results(survey_id).await;
    assert_eq!(stats["total_responses"], 4);
    let question = &stats["questions"][0];
    assert_eq!(question["type"], "single_choice");
    assert_eq!(question["kind"], "choices");
    assert_eq!(
        question["options"],
        json!([
            { "id": a, "text": "A", "count": 3, "percent": 75.0 },
            { "id": b, "text": "B", "count": 1, "percent": 25.0 },
        ])
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn unanswered_choice_question_reports_zero_percent() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "multiple_choice").await;
    for text in ["X", "Y", "Z"] {
        create_option(&app.pool, question_id, text).await;
    }

    let stats = app.results(survey_id).await;
    let options = stats["questions"][0]["options"].as_array().unwrap();
    assert_eq!(options.len(), 3);
    for option in options {
        assert_eq!(option["count"], 0);
        assert_eq!(option["percent"], 0.0);
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn text_answers_are_grouped_by_value() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "text").await;

    for colour in ["red", " red ", "blue", "   "] {
        app.submit(
            survey_id,
            &random_ip(),
            json!({ "answers": [{ "question_id": question_id, "text_answer": colour }] }),
        )
        .await;
    }

    let stats = app.results(survey_id).await;
    let question = &stats["questions"][0];
    assert_eq!(question["kind"], "values");
    assert_eq!(
        question["values"],
        json!([
            { "value": "red", "count": 2, "percent": 66.67 },
            { "value": "blue", "count": 1, "percent": 33.33 },
        ])
    );
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn long_text_answers_are_listed_raw() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "long_text").await;

    for text in ["First thoughts", "Second thoughts"] {
        app.submit(
            survey_id,
            &random_ip(),
            json!({ "answers": [{ "question_id": question_id, "text_answer": text }] }),
        )
        .await;
    }

    let stats = app.results(survey_id).await;
    let question = &stats["questions"][0];
    assert_eq!(question["kind"], "text_answers");
    assert_eq!(question["text_answers"], json!(["First thoughts", "Second thoughts"]));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn ratings_are_listed_raw_and_out_of_range_dropped() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "rating_1_5").await;

    for score in ["5", "3", "5", "9", "0"] {
        app.submit(
            survey_id,
            &random_ip(),
            json!({ "answers": [{ "question_id": question_id, "text_answer": score }] }),
        )
        .await;
    }

    let stats = app.results(survey_id).await;
    let question = &stats["questions"][0];
    assert_eq!(question["type"], "rating_1_5");
    assert_eq!(question["kind"], "text_answers");
    assert_eq!(question["text_answers"], json!(["5", "3", "5"]));
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn unknown_survey_is_reported_before_the_payload() {
    let app = spawn_app().await;
    let inactive = create_survey(&app.pool, false).await;

    for (survey_id, body) in [(i64::MAX, "{not json"), (inactive, "{}")] {
        let response = app
            .client
            .post(format!("{}/api/surveys/{}/responses", app.address, survey_id))
            .header("X-API-Token", API_TOKEN)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 404);
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["error"], "not_found");
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn malformed_payloads_for_an_active_survey_are_bad_requests() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "text").await;

    let cases = [
        ("{not json".to_string(), "invalid_json"),
        ("{}".to_string(), "invalid_json"),
        ("[]".to_string(), "invalid_json"),
        (json!({ "client_token": "abc" }).to_string(), "answers_required"),
        (json!({ "answers": [] }).to_string(), "answers_required"),
        (json!({ "answers": "A" }).to_string(), "answers_required"),
        (
            json!({ "client_token": 123, "answers": [{ "question_id": question_id, "text_answer": "x" }] })
                .to_string(),
            "client_token must be a string",
        ),
    ];

    for (body, expected) in cases {
        // Token in the query string instead of the header.
        let response = app
            .client
            .post(format!(
                "{}/api/surveys/{}/responses?api_token={}",
                app.address, survey_id, API_TOKEN
            ))
            .header("Content-Type", "application/json")
            .body(body.clone())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 400, "body {body}");
        let error: Value = response.json().await.unwrap();
        assert_eq!(error["error"], expected, "body {body}");
    }

    assert_eq!(count_responses(&app.pool, survey_id).await, 0);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn second_submission_from_same_identity_is_a_no_op() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "text").await;
    let body = json!({ "answers": [{ "question_id": question_id, "text_answer": "hi" }] });
    let ip = random_ip();

    let (status, _) = app.submit(survey_id, &ip, body.clone()).await;
    assert_eq!(status, 201);

    let (status, second) = app.submit(survey_id, &ip, body).await;
    assert_eq!(status, 200);
    assert_eq!(second["status"], "already_answered");

    assert_eq!(count_responses(&app.pool, survey_id).await, 1);
    assert_eq!(count_answers(&app.pool, survey_id).await, 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn client_token_deduplicates_across_addresses() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "number").await;
    let token = uuid::Uuid::new_v4().to_string();

    let (status, _) = app
        .submit(
            survey_id,
            &random_ip(),
            json!({ "client_token": token, "answers": [{ "question_id": question_id, "text_answer": "7" }] }),
        )
        .await;
    assert_eq!(status, 201);

    let (status, body) = app
        .submit(
            survey_id,
            &random_ip(),
            json!({ "client_token": token, "answers": [{ "question_id": question_id, "text_answer": "8" }] }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "already_answered");
    assert_eq!(count_responses(&app.pool, survey_id).await, 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn concurrent_duplicates_create_one_response() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "text").await;
    let ip = random_ip();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = app.client.clone();
        let url = format!("{}/api/surveys/{}/responses", app.address, survey_id);
        let ip = ip.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .header("X-API-Token", API_TOKEN)
                .header("X-Forwarded-For", ip)
                .json(&json!({ "answers": [{ "question_id": question_id, "text_answer": "race" }] }))
                .send()
                .await
                .unwrap()
                .status()
                .as_u16()
        }));
    }

    let mut created = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        assert!(status == 201 || status == 200, "unexpected status {status}");
        if status == 201 {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    assert_eq!(count_responses(&app.pool, survey_id).await, 1);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn repeated_submissions_allowed_when_dedup_is_off() {
    let app = spawn_app_with(true).await;
    let survey_id = create_survey(&app.pool, true).await;
    let question_id = create_question(&app.pool, survey_id, "text").await;
    let ip = random_ip();

    for _ in 0..2 {
        let (status, _) = app
            .submit(
                survey_id,
                &ip,
                json!({ "answers": [{ "question_id": question_id, "text_answer": "again" }] }),
            )
            .await;
        assert_eq!(status, 201);
    }

    assert_eq!(count_responses(&app.pool, survey_id).await, 2);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn invalid_entries_are_dropped_and_the_rest_kept() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let colour = create_question(&app.pool, survey_id, "single_choice").await;
    let red = create_option(&app.pool, colour, "Red").await;
    let other = create_question(&app.pool, survey_id, "single_choice").await;
    let foreign = create_option(&app.pool, other, "Foreign").await;
    let comment = create_question(&app.pool, survey_id, "text").await;

    let (status, body) = app
        .submit(
            survey_id,
            &random_ip(),
            json!({ "answers": [
                { "question_id": 999_999_999, "option_id": red },
                { "question_id": colour, "option_id": foreign },
                { "question_id": colour, "option_id": red },
                { "question_id": comment, "text_answer": "   " },
            ] }),
        )
        .await;

    assert_eq!(status, 201);
    assert_eq!(body["answers_recorded"], 1);

    let stored: Vec<(i64, Option<i64>)> = sqlx::query_as(
        "SELECT a.question_id, a.option_id FROM answers a JOIN responses r ON r.id = a.response_id WHERE r.survey_id = $1",
    )
    .bind(survey_id)
    .fetch_all(&app.pool)
    .await
    .unwrap();
    assert_eq!(stored, vec![(colour, Some(red))]);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn inactive_or_missing_survey_is_not_found() {
    let app = spawn_app().await;
    let inactive = create_survey(&app.pool, false).await;
    let question_id = create_question(&app.pool, inactive, "text").await;
    let body = json!({ "answers": [{ "question_id": question_id, "text_answer": "x" }] });

    let (status, error) = app.submit(inactive, &random_ip(), body.clone()).await;
    assert_eq!(status, 404);
    assert_eq!(error["error"], "not_found");
    assert_eq!(count_responses(&app.pool, inactive).await, 0);

    let (status, _) = app.submit(i64::MAX, &random_ip(), body).await;
    assert_eq!(status, 404);

    // Inactive surveys are hidden from the catalog but still have statistics.
    let catalog: Vec<Value> = app
        .client
        .get(format!("{}/api/surveys", app.address))
        .header("X-API-Token", API_TOKEN)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(catalog.iter().all(|s| s["id"] != inactive));
    assert_eq!(app.results(inactive).await["survey"]["id"], inactive);
}

#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn web_form_submission_and_respondent_index() {
    let app = spawn_app().await;
    let survey_id = create_survey(&app.pool, true).await;
    let pick = create_question(&app.pool, survey_id, "multiple_choice").await;
    let one = create_option(&app.pool, pick, "One").await;
    let two = create_option(&app.pool, pick, "Two").await;
    let rating = create_question(&app.pool, survey_id, "rating_1_5").await;
    let ip = random_ip();

    let form = format!(
        "question_{pick}_multi={one}&question_{pick}_multi={two}&question_{rating}=4"
    );
    let response = app
        .client
        .post(format!("{}/surveys/{}", app.address, survey_id))
        .header("X-Forwarded-For", &ip)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    assert_eq!(count_answers(&app.pool, survey_id).await, 3);

    let view: Value = app
        .client
        .get(format!("{}/surveys/{}", app.address, survey_id))
        .header("X-Forwarded-For", &ip)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["already_answered"], true);
    assert_eq!(view["questions"][0]["options"].as_array().unwrap().len(), 2);

    let index: Value = app
        .client
        .get(format!("{}/surveys", app.address))
        .header("X-Forwarded-For", &ip)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let completed = index["completed"].as_array().unwrap();
    assert!(completed.iter().any(|s| s["id"] == survey_id));
    assert!(index["available"].as_array().unwrap().iter().all(|s| s["id"] != survey_id));

    let stats = app.results(survey_id).await;
    assert_eq!(stats["questions"][1]["kind"], "text_answers");
    assert_eq!(stats["questions"][1]["text_answers"], json!(["4"]));
}

// Seeding removes every other admin account, so only this test seeds one.
#[tokio::test]
#[ignore = "requires PostgreSQL (DATABASE_URL)"]
async fn admin_manages_surveys_and_deletion_cascades() {
    let app = spawn_app().await;
    let username = format!("admin_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    seed_admin(&app.pool, &username, "s3cret").await.unwrap();

    let bad_login = app
        .client
        .post(format!("{}/admin/login", app.address))
        .json(&json!({ "username": username, "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_login.status().as_u16(), 401);

    let login: Value = app
        .client
        .post(format!("{}/admin/login", app.address))
        .json(&json!({ "username": username, "password": "s3cret" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let token = login["token"].as_str().expect("Token not found").to_string();

    // Missing or blank titles are readable validation errors.
    for title in ["", "   "] {
        let invalid = app
            .client
            .post(format!("{}/admin/surveys", app.address))
            .bearer_auth(&token)
            .json(&json!({ "title": title }))
            .send()
            .await
            .unwrap();
        assert_eq!(invalid.status().as_u16(), 400);
        let error: Value = invalid.json().await.unwrap();
        assert!(error["error"].as_str().unwrap().contains("Title is required"));
    }

    let survey: Value = app
        .client
        .post(format!("{}/admin/surveys", app.address))
        .bearer_auth(&token)
        .json(&json!({ "title": "Lunch", "description": "<b>Be honest</b><script>x</script>" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let survey_id = survey["id"].as_i64().unwrap();
    assert_eq!(survey["description"], "<b>Be honest</b>");

    let unknown_type = app
        .client
        .post(format!("{}/admin/surveys/{}/questions", app.address, survey_id))
        .bearer_auth(&token)
        .json(&json!({ "text": "Rank these", "type": "ranking" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_type.status().as_u16(), 400);

    let question: Value = app
        .client
        .post(format!("{}/admin/surveys/{}/questions", app.address, survey_id))
        .bearer_auth(&token)
        .json(&json!({ "text": "Soup or salad?", "type": "single_choice" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let question_id = question["id"].as_i64().unwrap();

    let option: Value = app
        .client
        .post(format!("{}/admin/questions/{}/options", app.address, question_id))
        .bearer_auth(&token)
        .json(&json!({ "text": "Soup" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let option_id = option["id"].as_i64().unwrap();

    let (status, _) = app
        .submit(
            survey_id,
            &random_ip(),
            json!({ "answers": [{ "question_id": question_id, "option_id": option_id }] }),
        )
        .await;
    assert_eq!(status, 201);

    // Answered questions keep their type.
    let retype = app
        .client
        .put(format!("{}/admin/questions/{}", app.address, question_id))
        .bearer_auth(&token)
        .json(&json!({ "type": "text" }))
        .send()
        .await
        .unwrap();
    assert_eq!(retype.status().as_u16(), 409);

    let listing: Vec<Value> = app
        .client
        .get(format!("{}/admin/surveys", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = listing.iter().find(|s| s["id"] == survey_id).unwrap();
    assert_eq!(entry["response_count"], 1);

    let deleted = app
        .client
        .delete(format!("{}/admin/surveys/{}", app.address, survey_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    assert_eq!(count_responses(&app.pool, survey_id).await, 0);
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM options WHERE id = $1")
        .bind(option_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(orphans, 0);

    // Re-seeding under a new name replaces the account.
    let renamed = format!("admin_{}", &uuid::Uuid::new_v4().to_string()[..8]);
    seed_admin(&app.pool, &renamed, "n3w").await.unwrap();

    let old_login = app
        .client
        .post(format!("{}/admin/login", app.address))
        .json(&json!({ "username": username, "password": "s3cret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(old_login.status().as_u16(), 401);

    let new_login = app
        .client
        .post(format!("{}/admin/login", app.address))
        .json(&json!({ "username": renamed, "password": "n3w" }))
        .send()
        .await
        .unwrap();
    assert_eq!(new_login.status().as_u16(), 200);

    let admins: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM admins")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(admins, 1);
}
