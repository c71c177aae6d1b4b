use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::OptionLabel;
use crate::test_support::{self, ExamFlags, TestContext};

async fn send(
    ctx: &TestContext,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(method, uri, token, body))
        .await
        .expect("response");
    let status = response.status();
    (status, test_support::read_json(response).await)
}

async fn admin_token(ctx: &TestContext) -> String {
    let admin = test_support::insert_admin(&ctx.state, "registrar").await;
    test_support::bearer_token(&admin, ctx.state.settings())
}

fn question_payload(text: &str, correct: &str) -> serde_json::Value {
    json!({
        "text": text,
        "options": ["Lagos", "Abuja", "Kano", "Ibadan"],
        "correctAnswer": correct
    })
}

#[tokio::test]
async fn created_exam_is_hidden_until_published() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    let student = test_support::insert_student(&ctx.state, "gst/2022/010").await;
    let student_token = test_support::bearer_token(&student, ctx.state.settings());

    let (status, created) = send(
        &ctx,
        Method::POST,
        "/api/v1/admin/exams",
        Some(&token),
        Some(json!({"courseCode": " GST101 ", "title": "Use of English", "durationMinutes": 45})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    assert_eq!(created["course_code"], "GST101");
    assert_eq!(created["visible"], false);
    assert_eq!(created["allow_result"], false);
    let exam_id = created["id"].as_str().unwrap().to_string();

    let (_, visible) = send(&ctx, Method::GET, "/api/v1/exams", Some(&student_token), None).await;
    assert_eq!(visible.as_array().unwrap().len(), 0);

    let (status, updated) = send(
        &ctx,
        Method::PATCH,
        &format!("/api/v1/admin/exams/{exam_id}"),
        Some(&token),
        Some(json!({"visible": true, "allowResult": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["visible"], true);
    assert_eq!(updated["allow_review"], false);
    assert_eq!(updated["title"], "Use of English");

    let (_, visible) = send(&ctx, Method::GET, "/api/v1/exams", Some(&student_token), None).await;
    assert_eq!(visible[0]["id"], exam_id.as_str());

    let (_, all) = send(&ctx, Method::GET, "/api/v1/admin/exams", Some(&token), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn exam_validation_errors_are_bad_requests() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/api/v1/admin/exams",
        Some(&token),
        Some(json!({"course_code": "MTH101", "title": "   ", "duration_minutes": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/api/v1/admin/exams",
        Some(&token),
        Some(json!({"course_code": "MTH101", "title": "Algebra", "duration_minutes": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &ctx,
        Method::PATCH,
        "/api/v1/admin/exams/missing",
        Some(&token),
        Some(json!({"visible": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn questions_can_be_added_edited_and_deleted() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    let exam = test_support::create_exam(&ctx.state, "GEO101", 20, ExamFlags::default()).await;
    let questions_uri = format!("/api/v1/admin/exams/{}/questions", exam.id);

    let (status, question) = send(
        &ctx,
        Method::POST,
        &questions_uri,
        Some(&token),
        Some(question_payload("Capital of Nigeria?", "b")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {question}");
    assert_eq!(question["correct_option"], "B");
    let question_id = question["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &ctx,
        Method::POST,
        &questions_uri,
        Some(&token),
        Some(question_payload("  capital   of NIGERIA? ", "A")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {body}");

    let (status, _) = send(
        &ctx,
        Method::POST,
        &questions_uri,
        Some(&token),
        Some(question_payload("Largest city?", "E")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, edited) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/admin/questions/{question_id}"),
        Some(&token),
        Some(question_payload("Capital of Nigeria since 1991?", "B")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {edited}");
    assert_eq!(edited["text"], "Capital of Nigeria since 1991?");

    let (_, listed) = send(&ctx, Method::GET, &questions_uri, Some(&token), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &ctx,
        Method::DELETE,
        &format!("/api/v1/admin/questions/{question_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(
        &ctx,
        Method::DELETE,
        &format!("/api/v1/admin/questions/{question_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn csv_import_reports_duplicates_and_bad_rows() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    let exam = test_support::create_exam(&ctx.state, "BIO101", 20, ExamFlags::default()).await;
    test_support::add_question(&ctx.state, &exam.id, "Unit of life?", OptionLabel::A).await;

    let csv = "Question,OptionA,OptionB,OptionC,OptionD,CorrectAnswer\n\
               Unit of life?,Cell,Atom,Organ,Tissue,A\n\
               \"Powerhouse of the cell, in short?\",Nucleus,Mitochondria,Ribosome,Golgi,B\n\
               Missing answer,One,Two,Three,Four,\n\
               Bad label,One,Two,Three,Four,F\n";

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::text_request(
            Method::POST,
            &format!("/api/v1/admin/exams/{}/questions/import", exam.id),
            &token,
            csv,
        ))
        .await
        .expect("import");
    let status = response.status();
    let report = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {report}");
    assert_eq!(report["imported"], 1);
    assert_eq!(report["skipped_duplicates"], 1);

    let warnings = report["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings[0]["line"], 4);
    assert_eq!(warnings[1]["line"], 5);

    let questions = ctx.state.stores().catalog.list_questions(&exam.id).await.unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[1].text, "Powerhouse of the cell, in short?");
    assert_eq!(questions[1].correct_option, OptionLabel::B);
}

#[tokio::test]
async fn answer_key_fix_changes_grades_only_after_regrade() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    let exam = test_support::create_exam(&ctx.state, "CHM101", 20, ExamFlags::default()).await;
    let question =
        test_support::add_question(&ctx.state, &exam.id, "Symbol for sodium?", OptionLabel::A)
            .await;

    let student = test_support::insert_student(&ctx.state, "chm/2023/004").await;
    let manager = ctx.state.manager();
    let view = manager.start_session(&student, &exam.id).await.unwrap();
    manager.submit_answer(&view.session_id, &question.id, "D").await.unwrap();
    let graded = manager.submit(&view.session_id).await.unwrap();
    assert_eq!(graded.score.correct, 0);

    let (status, _) = send(
        &ctx,
        Method::PUT,
        &format!("/api/v1/admin/questions/{}", question.id),
        Some(&token),
        Some(json!({
            "text": "Symbol for sodium?",
            "options": ["w", "x", "y", "z"],
            "correct_option": "D"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let result = manager.result(&view.session_id).await.unwrap();
    assert_eq!(result.score.map(|score| score.correct), Some(0));

    let (status, body) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/admin/exams/{}/regrade", exam.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(body["regraded_sessions"], 1);

    let result = manager.result(&view.session_id).await.unwrap();
    assert_eq!(result.score.map(|score| score.correct), Some(1));
}

#[tokio::test]
async fn admin_creates_student_who_can_log_in() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;

    let (status, created) = send(
        &ctx,
        Method::POST,
        "/api/v1/admin/users",
        Some(&token),
        Some(json!({
            "studentId": " CSC/2020/123 ",
            "fullName": "Ada Obi",
            "department": "Computer Science",
            "password": "s3cret!"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    assert_eq!(created["login_key"], "csc/2020/123");
    assert_eq!(created["role"], "student");

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/api/v1/admin/users",
        Some(&token),
        Some(json!({"login": "csc/2020/123", "full_name": "Copy", "password": "another"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, login) = send(
        &ctx,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"studentId": "csc/2020/123", "password": "s3cret!"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {login}");
    assert_eq!(login["token_type"], "bearer");
    let access_token = login["access_token"].as_str().unwrap().to_string();

    let (status, me) = send(&ctx, Method::GET, "/api/v1/auth/me", Some(&access_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["full_name"], "Ada Obi");

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({"login": "CSC/2020/123", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_use_admin_routes() {
    let ctx = test_support::setup_test_context().await;
    let student = test_support::insert_student(&ctx.state, "csc/2021/050").await;
    let token = test_support::bearer_token(&student, ctx.state.settings());

    let (status, body) = send(&ctx, Method::GET, "/api/v1/admin/exams", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "response: {body}");

    let (status, _) = send(
        &ctx,
        Method::POST,
        "/api/v1/admin/users",
        Some(&token),
        Some(json!({"login": "x", "full_name": "X", "password": "secret1"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_an_exam_removes_its_questions_and_sessions() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    let exam = test_support::create_exam(&ctx.state, "AGR101", 20, ExamFlags::default()).await;
    test_support::add_question(&ctx.state, &exam.id, "Main crop?", OptionLabel::C).await;
    let student = test_support::insert_student(&ctx.state, "agr/2022/001").await;
    let view = ctx.state.manager().start_session(&student, &exam.id).await.unwrap();

    let uri = format!("/api/v1/admin/exams/{}", exam.id);
    let (status, _) = send(&ctx, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(ctx.state.stores().catalog.find_exam(&exam.id).await.unwrap().is_none());
    assert!(ctx.state.stores().catalog.list_questions(&exam.id).await.unwrap().is_empty());
    assert!(ctx.state.manager().session(&view.session_id).await.is_err());

    let (status, _) = send(&ctx, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn roster_import_creates_students_and_skips_known_keys() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    test_support::insert_student(&ctx.state, "0001").await;

    let csv = "matric,name,password\n\
               0001,Jane Doe,pass123\n\
               0002,\"Okafor, Emeka\",pass456\n\
               0003,,pass789\n";
    let response = ctx
        .app
        .clone()
        .oneshot(test_support::text_request(
            Method::POST,
            "/api/v1/admin/users/import?department=Physics",
            &token,
            csv,
        ))
        .await
        .expect("import");
    let status = response.status();
    let report = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {report}");
    assert_eq!(report["created"], 1);
    assert_eq!(report["skipped_duplicates"], 1);
    assert_eq!(report["warnings"][0]["line"], 4);

    let (status, listed) =
        send(&ctx, Method::GET, "/api/v1/admin/users?search=okafor", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "response: {listed}");
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["login_key"], "0002");
    assert_eq!(listed[0]["department"], "Physics");

    let (_, students) = send(&ctx, Method::GET, "/api/v1/admin/users", Some(&token), None).await;
    assert_eq!(students.as_array().unwrap().len(), 2);

    let (_, admins) =
        send(&ctx, Method::GET, "/api/v1/admin/users?role=admin", Some(&token), None).await;
    assert_eq!(admins[0]["login_key"], "registrar");
}

#[tokio::test]
async fn extra_time_set_by_admin_lengthens_new_sessions() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    let exam = test_support::create_exam(&ctx.state, "ENG101", 30, ExamFlags::default()).await;
    let student = test_support::insert_student(&ctx.state, "eng/2022/014").await;

    let (status, updated) = send(
        &ctx,
        Method::PATCH,
        &format!("/api/v1/admin/users/{}", student.id),
        Some(&token),
        Some(json!({"extraTime": 10, "fullName": "Ngozi Eze"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {updated}");
    assert_eq!(updated["extra_time_minutes"], 10);
    assert_eq!(updated["full_name"], "Ngozi Eze");

    let student_token = test_support::bearer_token(&student, ctx.state.settings());
    let (status, session) = send(
        &ctx,
        Method::POST,
        &format!("/api/v1/exams/{}/session", exam.id),
        Some(&student_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "response: {session}");
    assert_eq!(session["remaining_seconds"], 40 * 60);

    let (status, _) = send(
        &ctx,
        Method::PATCH,
        &format!("/api/v1/admin/users/{}", student.id),
        Some(&token),
        Some(json!({"extraTime": -5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_student_removes_their_sessions() {
    let ctx = test_support::setup_test_context().await;
    let token = admin_token(&ctx).await;
    let exam = test_support::create_exam(&ctx.state, "HIS101", 20, ExamFlags::default()).await;
    let student = test_support::insert_student(&ctx.state, "his/2022/003").await;
    let view = ctx.state.manager().start_session(&student, &exam.id).await.unwrap();

    let uri = format!("/api/v1/admin/users/{}", student.id);
    let (status, _) = send(&ctx, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.state.stores().users.find_user(&student.id).await.unwrap().is_none());
    assert!(ctx.state.manager().session(&view.session_id).await.is_err());

    let (status, _) = send(&ctx, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admins_cannot_delete_or_deactivate_themselves() {
    let ctx = test_support::setup_test_context().await;
    let admin = test_support::insert_admin(&ctx.state, "registrar").await;
    let token = test_support::bearer_token(&admin, ctx.state.settings());
    let uri = format!("/api/v1/admin/users/{}", admin.id);

    let (status, _) = send(&ctx, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        send(&ctx, Method::PATCH, &uri, Some(&token), Some(json!({"isActive": false}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
