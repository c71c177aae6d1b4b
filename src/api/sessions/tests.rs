use axum::http::{Method, StatusCode};
use serde_json::json;
use time::Duration;
use tower::ServiceExt;

use crate::db::types::OptionLabel;
use crate::test_support::{self, ExamFlags};

struct Started {
    token: String,
    session_id: String,
    question_ids: Vec<String>,
}

async fn start_exam(ctx: &test_support::TestContext, flags: ExamFlags) -> Started {
    let student = test_support::insert_student(&ctx.state, "csc/2021/001").await;
    let exam = test_support::create_exam(&ctx.state, "CSC201", 30, flags).await;
    let mut question_ids = Vec::new();
    for (text, correct) in [
        ("Which gate outputs 1 only when both inputs are 1?", OptionLabel::A),
        ("Binary 101 equals?", OptionLabel::C),
        ("Which is a stack operation?", OptionLabel::B),
    ] {
        let question = test_support::add_question(&ctx.state, &exam.id, text, correct).await;
        question_ids.push(question.id);
    }
    let token = test_support::bearer_token(&student, ctx.state.settings());

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            &format!("/api/v1/exams/{}/session", exam.id),
            Some(&token),
            None,
        ))
        .await
        .expect("start session");
    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");

    Started { token, session_id: body["id"].as_str().expect("session id").to_string(), question_ids }
}

async fn answer(
    ctx: &test_support::TestContext,
    started: &Started,
    question_id: &str,
    option: &str,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PUT,
            &format!("/api/v1/sessions/{}/answers/{question_id}", started.session_id),
            Some(&started.token),
            Some(json!({"option": option})),
        ))
        .await
        .expect("answer");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn call(
    ctx: &test_support::TestContext,
    method: Method,
    uri: &str,
    token: &str,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, Some(token), None))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

#[tokio::test]
async fn starting_twice_resumes_the_same_session() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(&ctx, ExamFlags::default()).await;

    let (status, session) =
        call(&ctx, Method::GET, &format!("/api/v1/sessions/{}", started.session_id), &started.token)
            .await;
    assert_eq!(status, StatusCode::OK, "response: {session}");
    let exam_id = session["exam_id"].as_str().unwrap().to_string();

    ctx.clock.advance(Duration::minutes(5));
    let (status, again) =
        call(&ctx, Method::POST, &format!("/api/v1/exams/{exam_id}/session"), &started.token).await;
    assert_eq!(status, StatusCode::OK, "response: {again}");
    assert_eq!(again["id"], started.session_id.as_str());
    assert_eq!(again["remaining_seconds"], 25 * 60);
}

#[tokio::test]
async fn hidden_exam_cannot_be_started() {
    let ctx = test_support::setup_test_context().await;
    let student = test_support::insert_student(&ctx.state, "csc/2021/002").await;
    let exam = test_support::create_exam(
        &ctx.state,
        "CSC202",
        30,
        ExamFlags { visible: false, ..ExamFlags::default() },
    )
    .await;
    let token = test_support::bearer_token(&student, ctx.state.settings());

    let (status, _) =
        call(&ctx, Method::POST, &format!("/api/v1/exams/{}/session", exam.id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, list) = call(&ctx, Method::GET, "/api/v1/exams", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(list.as_array().unwrap().iter().all(|item| item["id"] != exam.id.as_str()));
}

#[tokio::test]
async fn questions_are_paginated_without_answer_key() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(&ctx, ExamFlags::default()).await;
    answer(&ctx, &started, &started.question_ids[2], "B").await;

    let (status, page) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/sessions/{}/questions?page=2&per_page=2", started.session_id),
        &started.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {page}");
    assert_eq!(page["total_count"], 3);
    assert_eq!(page["total_pages"], 2);

    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["number"], 3);
    assert_eq!(items[0]["id"], started.question_ids[2].as_str());
    assert_eq!(items[0]["selected"], "B");
    assert!(items[0].get("correct_option").is_none());
}

#[tokio::test]
async fn answers_overwrite_and_bad_labels_are_rejected() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(&ctx, ExamFlags::default()).await;
    let first = started.question_ids[0].clone();

    let (status, body) = answer(&ctx, &started, &first, "B").await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    let (status, _) = answer(&ctx, &started, &first, "A").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = answer(&ctx, &started, &first, "E").await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let (status, _) = answer(&ctx, &started, "no-such-question", "A").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, session) =
        call(&ctx, Method::GET, &format!("/api/v1/sessions/{}", started.session_id), &started.token)
            .await;
    assert_eq!(session["answers"][first.as_str()], "A");
    assert_eq!(session["answers"].as_object().unwrap().len(), 1);
}

#[tokio::test]
async fn submit_grades_and_discloses_score_only() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(&ctx, ExamFlags::default()).await;
    answer(&ctx, &started, &started.question_ids[0], "A").await;
    answer(&ctx, &started, &started.question_ids[1], "D").await;

    let submit_uri = format!("/api/v1/sessions/{}/submit", started.session_id);
    let (status, result) = call(&ctx, Method::POST, &submit_uri, &started.token).await;
    assert_eq!(status, StatusCode::OK, "response: {result}");
    assert_eq!(result["status"], "submitted");
    assert_eq!(result["score"]["correct"], 1);
    assert_eq!(result["score"]["total"], 3);
    assert!(result["review"].is_null());

    let (status, again) = call(&ctx, Method::POST, &submit_uri, &started.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["score"], result["score"]);

    let (status, _) = answer(&ctx, &started, &started.question_ids[2], "B").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn result_is_withheld_until_exam_allows_it() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(
        &ctx,
        ExamFlags { visible: true, allow_review: false, allow_result: false },
    )
    .await;

    let result_uri = format!("/api/v1/sessions/{}/result", started.session_id);
    let (status, _) = call(&ctx, Method::GET, &result_uri, &started.token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&ctx, Method::POST, &format!("/api/v1/sessions/{}/submit", started.session_id), &started.token)
        .await;
    let (status, result) = call(&ctx, Method::GET, &result_uri, &started.token).await;
    assert_eq!(status, StatusCode::OK, "response: {result}");
    assert!(result["score"].is_null());
    assert!(result["review"].is_null());
}

#[tokio::test]
async fn review_lists_every_question_when_allowed() {
    let ctx = test_support::setup_test_context().await;
    let started =
        start_exam(&ctx, ExamFlags { visible: true, allow_review: true, allow_result: true })
            .await;
    answer(&ctx, &started, &started.question_ids[1], "C").await;

    let (_, result) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/sessions/{}/submit", started.session_id),
        &started.token,
    )
    .await;

    let review = result["review"].as_array().expect("review");
    assert_eq!(review.len(), 3);
    assert_eq!(review[1]["is_correct"], true);
    assert_eq!(review[0]["selected"], serde_json::Value::Null);
    assert_eq!(review[0]["correct_option"], "A");
}

#[tokio::test]
async fn tick_counts_down_and_expires_at_deadline() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(&ctx, ExamFlags::default()).await;
    answer(&ctx, &started, &started.question_ids[0], "A").await;
    let tick_uri = format!("/api/v1/sessions/{}/tick", started.session_id);

    ctx.clock.advance(Duration::seconds(90));
    let (status, tick) = call(&ctx, Method::POST, &tick_uri, &started.token).await;
    assert_eq!(status, StatusCode::OK, "response: {tick}");
    assert_eq!(tick["remaining_seconds"], 30 * 60 - 90);
    assert_eq!(tick["status"], "in_progress");

    ctx.clock.advance(Duration::minutes(30));
    let (_, tick) = call(&ctx, Method::POST, &tick_uri, &started.token).await;
    assert_eq!(tick["remaining_seconds"], 0);
    assert_eq!(tick["status"], "expired");

    let (status, _) = answer(&ctx, &started, &started.question_ids[1], "C").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, result) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/sessions/{}/result", started.session_id),
        &started.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "expired");
    assert_eq!(result["score"]["correct"], 1);
}

#[tokio::test]
async fn other_students_cannot_touch_a_session() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(&ctx, ExamFlags::default()).await;
    let intruder = test_support::insert_student(&ctx.state, "csc/2021/099").await;
    let token = test_support::bearer_token(&intruder, ctx.state.settings());

    let (status, body) =
        call(&ctx, Method::GET, &format!("/api/v1/sessions/{}", started.session_id), &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");

    let (status, _) = call(
        &ctx,
        Method::POST,
        &format!("/api/v1/sessions/{}/submit", started.session_id),
        &token,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(&ctx, Method::GET, "/api/v1/sessions/unknown", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let ctx = test_support::setup_test_context().await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(Method::GET, "/api/v1/exams", None, None))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admins_cannot_open_exam_sessions() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(&ctx.state, "registrar").await;
    let exam = test_support::create_exam(&ctx.state, "CSC203", 30, ExamFlags::default()).await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());

    let (status, body) =
        call(&ctx, Method::POST, &format!("/api/v1/exams/{}/session", exam.id), &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");

    let (status, _) = call(&ctx, Method::GET, "/api/v1/exams", &token).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn page_number_far_past_the_end_returns_an_empty_page() {
    let ctx = test_support::setup_test_context().await;
    let started = start_exam(&ctx, ExamFlags::default()).await;

    let (status, page) = call(
        &ctx,
        Method::GET,
        &format!("/api/v1/sessions/{}/questions?page={}", started.session_id, u64::MAX),
        &started.token,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {page}");
    assert!(page["items"].as_array().unwrap().is_empty());
    assert_eq!(page["total_count"], 3);
}
