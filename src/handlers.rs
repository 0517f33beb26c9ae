// src/handlers.rs
use crate::blob::ResultsDisplay;
use crate::payload::parse_analysis_result;
use crate::view::{ResultsViewModel, UiAction, assemble};
use crate::{AppState, errors::AdlensError, models::*};
use actix_multipart::{Field, Multipart};
use actix_web::{Error, HttpResponse, web};
use bytes::Bytes;
use futures_util::TryStreamExt;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/guidelines", web::get().to(list_guidelines))
            .route("/guidelines", web::post().to(create_guideline))
            .route("/guidelines/clean", web::post().to(clean_guidelines))
            .route("/guidelines/{id}", web::put().to(update_guideline))
            .route("/guidelines/{id}", web::delete().to(delete_guideline))
            .route("/analyze", web::post().to(analyze))
            .route("/results/{session_id}", web::get().to(get_results))
            .route(
                "/results/{session_id}/display",
                web::delete().to(close_display),
            )
            .route("/results/{session_id}/ui", web::post().to(apply_ui_action))
            .route("/results/{session_id}/chat", web::post().to(send_chat))
            .route("/blobs/{blob_id}", web::get().to(get_blob)),
    );
}

pub async fn list_guidelines(data: web::Data<AppState>) -> Result<HttpResponse, AdlensError> {
    let guidelines = data.guidelines.list().await?;
    Ok(HttpResponse::Ok().json(guidelines))
}

pub async fn create_guideline(
    data: web::Data<AppState>,
    body: web::Json<GuidelineDraft>,
) -> Result<HttpResponse, AdlensError> {
    let created = data.guidelines.create(&body).await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn update_guideline(
    path: web::Path<String>,
    data: web::Data<AppState>,
    body: web::Json<GuidelineDraft>,
) -> Result<HttpResponse, AdlensError> {
    let updated = data.guidelines.update(&path, &body).await?;
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn delete_guideline(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AdlensError> {
    data.guidelines.delete(&path).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[derive(Debug, Deserialize)]
pub struct CleanRequest {
    pub rules: Vec<String>,
}

pub async fn clean_guidelines(
    data: web::Data<AppState>,
    body: web::Json<CleanRequest>,
) -> Result<HttpResponse, AdlensError> {
    let text = rules_text(&body.rules)?;
    let cleanup = data.analysis_client.clean_guidelines(&text).await?;
    Ok(HttpResponse::Ok().json(cleanup))
}

async fn read_field(field: &mut Field) -> Result<Vec<u8>, Error> {
    let mut buffer = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

async fn read_text(field: &mut Field) -> Result<String, Error> {
    let bytes = read_field(field).await?;
    String::from_utf8(bytes)
        .map(|text| text.trim().to_string())
        .map_err(|_| AdlensError::Validation("Form fields must be UTF-8 text".to_string()).into())
}

pub async fn analyze(
    mut payload: Multipart,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let mut raw_images = Vec::new();
    let mut guideline_id = String::new();
    let mut ad_brief = String::new();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().to_string();
        match name.as_str() {
            "images" => {
                let filename = field
                    .content_disposition()
                    .get_filename()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("image-{}", raw_images.len() + 1));
                let content_type = field.content_type().map(|ct| ct.to_string());
                let image_data = read_field(&mut field).await?;
                raw_images.push((filename, content_type, image_data));
            }
            "brandID" => guideline_id = read_text(&mut field).await?,
            "adBrief" => ad_brief = read_text(&mut field).await?,
            other => {
                debug!("Ignoring unexpected form field {:?}", other);
                read_field(&mut field).await?;
            }
        }
    }

    if guideline_id.is_empty() {
        return Err(AdlensError::Validation("Please select a guideline first".to_string()).into());
    }
    if ad_brief.is_empty() {
        return Err(
            AdlensError::Validation("Please enter your campaign details".to_string()).into(),
        );
    }
    if raw_images.is_empty() {
        return Err(AdlensError::Validation("Upload at least one ad creative".to_string()).into());
    }

    let mut images = Vec::with_capacity(raw_images.len());
    for (filename, content_type, image_data) in raw_images {
        let processor = data.image_processor.clone();
        let prepared =
            tokio::task::spawn_blocking(move || processor.prepare(filename, content_type, image_data))
                .await
                .map_err(|e| AdlensError::ImageProcessing(format!("Image worker failed: {}", e)))??;
        images.push(prepared);
    }

    info!(
        "Submitting {} image(s) for review against guideline {}",
        images.len(),
        guideline_id
    );

    let raw_result = data
        .analysis_client
        .submit_batch_review(&images, &guideline_id, &ad_brief)
        .await?;

    let result = parse_analysis_result(&raw_result, images.len()).map_err(|e| {
        error!("Rejected batch review payload: {}", e);
        e
    })?;

    let session = AnalysisSession {
        id: Uuid::new_v4(),
        guideline_id,
        ad_brief,
        images,
        result,
        ui: Default::default(),
        created_at: chrono::Utc::now(),
    };
    data.sessions.save(&session).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "session_id": session.id,
        "image_count": session.images.len(),
        "results_path": format!("/api/v1/results/{}", session.id)
    })))
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultsResponse {
    Ready {
        session_id: Uuid,
        view: ResultsViewModel,
    },
    AnalysisIncomplete {
        session_id: Uuid,
    },
    NoResults {
        message: String,
        return_to: String,
    },
}

fn no_results() -> HttpResponse {
    HttpResponse::NotFound().json(ResultsResponse::NoResults {
        message: "No analysis results yet".to_string(),
        return_to: "/analyze".to_string(),
    })
}

pub async fn get_results(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AdlensError> {
    let session_id = path.into_inner();

    let Some(session) = data.sessions.load(&session_id).await? else {
        // An expired session takes its display with it.
        data.displays.close(&session_id);
        return Ok(no_results());
    };

    // The catalog only feeds the matched-persona list; render without it.
    let catalog = match data.analysis_client.fetch_persona_catalog().await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("Rendering results without persona catalog: {}", e);
            Vec::new()
        }
    };

    let mut view = assemble(&session.result, &session.images, &catalog, &session.ui)?;

    if view.analysis_incomplete {
        data.displays.close(&session_id);
        return Ok(HttpResponse::Ok().json(ResultsResponse::AnalysisIncomplete { session_id }));
    }

    let mut display = ResultsDisplay::new();
    for image_view in &mut view.images {
        let image = &session.images[image_view.image_index];
        let handle = data.blobs.acquire(
            session_id,
            Bytes::from(image.data.clone()),
            image.content_type.clone(),
        );
        image_view.preview_url = Some(display.show(image_view.image_index, handle));
    }
    debug!(
        "Opened results display for session {} with {} image(s)",
        session_id,
        display.image_count()
    );
    data.displays.open(session_id, display);

    Ok(HttpResponse::Ok().json(ResultsResponse::Ready { session_id, view }))
}

pub async fn close_display(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AdlensError> {
    if data.displays.close(&path) {
        debug!(
            "Closed results display for session {} ({} blob(s) still live)",
            *path,
            data.blobs.live_count()
        );
    }
    Ok(HttpResponse::NoContent().finish())
}

async fn load_session(data: &AppState, session_id: &Uuid) -> Result<AnalysisSession, AdlensError> {
    data.sessions
        .load(session_id)
        .await?
        .ok_or_else(|| AdlensError::NotFound(format!("No analysis session {}", session_id)))
}

pub async fn apply_ui_action(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<UiAction>,
) -> Result<HttpResponse, AdlensError> {
    let session_id = path.into_inner();
    let _guard = data.session_locks.acquire(session_id).await;

    let mut session = load_session(&data, &session_id).await?;
    session.ui.apply(body.into_inner(), &session.result)?;
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(&session.ui))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

pub async fn send_chat(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, AdlensError> {
    let session_id = path.into_inner();

    let ticket = {
        let _guard = data.session_locks.acquire(session_id).await;
        let mut session = load_session(&data, &session_id).await?;
        let ticket = session.ui.begin_chat_send(&body.message)?;
        data.sessions.save(&session).await?;
        ticket
    };

    // The session is unlocked while the persona answers.
    let outcome = data
        .analysis_client
        .send_chat(body.message.trim(), &ticket.interaction_id)
        .await;

    // Other requests may have changed the UI state while we waited.
    let _guard = data.session_locks.acquire(session_id).await;
    let mut session = load_session(&data, &session_id).await?;
    let reply = match outcome {
        Ok(reply) => reply,
        Err(e) => {
            session.ui.fail_chat_reply(&ticket);
            data.sessions.save(&session).await?;
            return Err(e);
        }
    };

    if !session.ui.receive_chat_reply(&ticket, reply) {
        debug!(
            "Dropped reply for closed chat context {} of session {}",
            ticket.context, session_id
        );
    }
    data.sessions.save(&session).await?;
    Ok(HttpResponse::Ok().json(session.ui.chat()))
}

pub async fn get_blob(
    path: web::Path<Uuid>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, AdlensError> {
    let blob_id = path.into_inner();
    let not_displayed = || AdlensError::NotFound(format!("Blob {} is not displayed", blob_id));

    data.displays.sweep();
    let blob = data.blobs.get(&blob_id).ok_or_else(not_displayed)?;
    if !data.sessions.exists(&blob.owner).await? {
        data.displays.close(&blob.owner);
        return Err(not_displayed());
    }

    Ok(HttpResponse::Ok()
        .content_type(blob.content_type)
        .body(blob.data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{BlobRegistry, DisplayRegistry};
    use crate::services::image_processor::tests::png;
    use crate::services::{
        AnalysisClient, ImageProcessor, MemorySessionStore, RemoteGuidelineRepository,
        SessionLocks,
    };
    use crate::view::ResultsUiState;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpServer, test};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    const HOUR: Duration = Duration::from_secs(3600);

    async fn fake_batch_review() -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "brandReviews": [{ "respOBJ": { "evaluations": [
                { "guideline": "Logo visible", "score": 4, "feedback": "Clear logo" },
                { "guideline": "Brand colours", "score": 3, "feedback": "Mostly on palette" }
            ] } }],
            "personaReviews": [{
                "imageIdentifiedPersonasList": ["p1"],
                "results": [{
                    "persona": "Young Professional",
                    "result": { "Simplicity": 4, "Relevance": 5 },
                    "interactionID": "int-1"
                }]
            }]
        }))
    }

    async fn fake_catalog() -> HttpResponse {
        HttpResponse::Ok().json(json!([
            { "id": "p1", "name": "Young Professional", "age": 28, "interests": ["tech"] },
            { "id": "p2", "name": "Retiree" }
        ]))
    }

    async fn fake_chat(body: web::Json<Value>) -> HttpResponse {
        // Long enough for a second send to start before this one answers.
        actix_web::rt::time::sleep(Duration::from_millis(50)).await;
        HttpResponse::Ok().json(json!({
            "message": format!("You asked: {}", body["userMessage"].as_str().unwrap_or(""))
        }))
    }

    fn spawn_fake_service() -> String {
        let server = HttpServer::new(|| {
            App::new()
                .route("/brand/batchBrandReview", web::post().to(fake_batch_review))
                .route("/persona/getPersonas", web::get().to(fake_catalog))
                .route("/persona/chat", web::post().to(fake_chat))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .expect("bind fake service");
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    fn state(base_url: String) -> AppState {
        state_with_ttls(base_url, HOUR, HOUR)
    }

    fn state_with_ttls(base_url: String, session_ttl: Duration, display_ttl: Duration) -> AppState {
        let analysis_client = Arc::new(AnalysisClient::new(base_url));
        AppState {
            sessions: Arc::new(MemorySessionStore::new(session_ttl)),
            session_locks: SessionLocks::new(),
            guidelines: Arc::new(RemoteGuidelineRepository::new(analysis_client.clone())),
            analysis_client,
            image_processor: Arc::new(ImageProcessor::new(2048)),
            blobs: BlobRegistry::new(),
            displays: DisplayRegistry::new(display_ttl),
        }
    }

    fn session(persona_reviews: Vec<Option<PersonaReviewSet>>) -> AnalysisSession {
        let count = persona_reviews.len();
        AnalysisSession {
            id: Uuid::new_v4(),
            guideline_id: "g1".to_string(),
            ad_brief: "Spring sale".to_string(),
            images: (0..count)
                .map(|index| UploadedImage {
                    filename: format!("ad-{}.png", index),
                    content_type: "image/png".to_string(),
                    data: vec![index as u8; 4],
                })
                .collect(),
            result: AnalysisResult {
                brand_reviews: (0..count)
                    .map(|_| BrandReview {
                        evaluations: vec![Evaluation {
                            guideline: "Logo".to_string(),
                            score: 2,
                            feedback: "Small".to_string(),
                        }],
                    })
                    .collect(),
                persona_reviews,
            },
            ui: ResultsUiState::default(),
            created_at: chrono::Utc::now(),
        }
    }

    fn persona_set() -> PersonaReviewSet {
        PersonaReviewSet {
            identified_personas: vec!["p1".to_string()],
            results: vec![PersonaReview {
                persona: "Young Professional".to_string(),
                result: PersonaResult::new(),
                interaction_id: "int-1".to_string(),
            }],
        }
    }

    fn multipart_body(boundary: &str, parts: Vec<(&str, Option<&str>, Vec<u8>)>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                ),
            }
            body.extend_from_slice(&content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }

    #[actix_web::test]
    async fn unknown_session_renders_no_results_placeholder() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state("http://127.0.0.1:1".to_string())))
                .configure(routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/results/{}", Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "no_results");
        assert_eq!(body["return_to"], "/analyze");
    }

    #[actix_web::test]
    async fn results_open_a_display_and_closing_releases_blobs() {
        let state = state(spawn_fake_service());
        let stored = session(vec![Some(persona_set()), None]);
        state.sessions.save(&stored).await.unwrap();
        let blobs = state.blobs.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/results/{}", stored.id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["view"]["analysis_incomplete"], false);
        assert_eq!(body["view"]["images"].as_array().unwrap().len(), 1);
        assert_eq!(body["view"]["images"][0]["rating"]["label"], "Somewhat Aligned");
        assert_eq!(body["view"]["matched_personas"][0]["id"], "p1");
        assert_eq!(blobs.live_count(), 1);

        let blob_url = body["view"]["images"][0]["preview_url"].as_str().unwrap().to_string();
        let resp = test::call_service(&app, test::TestRequest::get().uri(&blob_url).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(test::read_body(resp).await, Bytes::from(vec![0u8; 4]));

        let req = test::TestRequest::delete()
            .uri(&format!("/api/v1/results/{}/display", stored.id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
        assert_eq!(blobs.live_count(), 0);

        let resp = test::call_service(&app, test::TestRequest::get().uri(&blob_url).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn abandoned_displays_expire_with_the_session() {
        let ttl = Duration::from_millis(300);
        let state = state_with_ttls(spawn_fake_service(), ttl, ttl);
        let stored = session(vec![Some(persona_set())]);
        state.sessions.save(&stored).await.unwrap();
        let blobs = state.blobs.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/results/{}", stored.id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let blob_url = body["view"]["images"][0]["preview_url"].as_str().unwrap().to_string();
        assert_eq!(blobs.live_count(), 1);

        // The browser left without closing the display.
        actix_web::rt::time::sleep(Duration::from_millis(400)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri(&blob_url).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(blobs.live_count(), 0);

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/results/{}", stored.id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn blobs_of_an_expired_session_are_not_served() {
        let state = state_with_ttls(spawn_fake_service(), Duration::from_millis(300), HOUR);
        let stored = session(vec![Some(persona_set())]);
        state.sessions.save(&stored).await.unwrap();
        let blobs = state.blobs.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/results/{}", stored.id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let blob_url = body["view"]["images"][0]["preview_url"].as_str().unwrap().to_string();

        actix_web::rt::time::sleep(Duration::from_millis(400)).await;

        // The display itself is still young, but its session is gone.
        let resp = test::call_service(&app, test::TestRequest::get().uri(&blob_url).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(blobs.live_count(), 0);
    }

    #[actix_web::test]
    async fn reopening_results_does_not_leak_blobs() {
        let state = state(spawn_fake_service());
        let stored = session(vec![Some(persona_set()), Some(persona_set())]);
        state.sessions.save(&stored).await.unwrap();
        let blobs = state.blobs.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        for _ in 0..3 {
            let req = test::TestRequest::get()
                .uri(&format!("/api/v1/results/{}", stored.id))
                .to_request();
            assert!(test::call_service(&app, req).await.status().is_success());
        }
        assert_eq!(blobs.live_count(), 2);
    }

    #[actix_web::test]
    async fn all_missing_persona_data_reports_incomplete() {
        let state = state("http://127.0.0.1:1".to_string());
        let stored = session(vec![None]);
        state.sessions.save(&stored).await.unwrap();
        let blobs = state.blobs.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/v1/results/{}", stored.id))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "analysis_incomplete");
        assert_eq!(blobs.live_count(), 0);
    }

    #[actix_web::test]
    async fn ui_actions_persist_in_the_session() {
        let state = state("http://127.0.0.1:1".to_string());
        let stored = session(vec![Some(persona_set())]);
        state.sessions.save(&stored).await.unwrap();
        let sessions = state.sessions.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/ui", stored.id))
            .set_json(json!({ "action": "toggle_guideline", "image": 0, "evaluation": 0 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let reloaded = sessions.load(&stored.id).await.unwrap().unwrap();
        assert!(reloaded.ui.is_guideline_expanded(0, 0));

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/ui", stored.id))
            .set_json(json!({ "action": "open_preview", "image": 4 }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn chat_rejects_empty_input_and_records_replies() {
        let state = state(spawn_fake_service());
        let stored = session(vec![Some(persona_set())]);
        state.sessions.save(&stored).await.unwrap();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/ui", stored.id))
            .set_json(json!({ "action": "open_chat", "interaction_id": "int-1" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/chat", stored.id))
            .set_json(json!({ "message": "  " }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/chat", stored.id))
            .set_json(json!({ "message": "Is the logo clear?" }))
            .to_request();
        let chat: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(chat["persona"], "Young Professional");
        assert_eq!(chat["awaiting_reply"], false);
        let transcript = chat["transcript"].as_array().unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0]["isUser"], true);
        assert_eq!(transcript[1]["text"], "You asked: Is the logo clear?");
    }

    #[actix_web::test]
    async fn overlapping_chat_sends_keep_both_replies() {
        let state = state(spawn_fake_service());
        let stored = session(vec![Some(persona_set())]);
        state.sessions.save(&stored).await.unwrap();
        let sessions = state.sessions.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/ui", stored.id))
            .set_json(json!({ "action": "open_chat", "interaction_id": "int-1" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let send = |message: &str| {
            test::TestRequest::post()
                .uri(&format!("/api/v1/results/{}/chat", stored.id))
                .set_json(json!({ "message": message }))
                .to_request()
        };
        let (first, second) = futures_util::future::join(
            test::call_service(&app, send("Is the logo clear?")),
            test::call_service(&app, send("Would you share it?")),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);

        let reloaded = sessions.load(&stored.id).await.unwrap().unwrap();
        let chat = reloaded.ui.chat().unwrap();
        assert!(!chat.awaiting_reply);
        assert_eq!(chat.pending_replies, 0);
        let replies: Vec<&str> = chat
            .transcript
            .iter()
            .filter(|message| !message.is_user)
            .map(|message| message.text.as_str())
            .collect();
        assert_eq!(replies.len(), 2);
        assert!(replies.contains(&"You asked: Is the logo clear?"));
        assert!(replies.contains(&"You asked: Would you share it?"));
        assert_eq!(chat.transcript.len(), 4);
    }

    #[actix_web::test]
    async fn failed_chat_clears_the_typing_indicator() {
        let state = state("http://127.0.0.1:1".to_string());
        let stored = session(vec![Some(persona_set())]);
        state.sessions.save(&stored).await.unwrap();
        let sessions = state.sessions.clone();
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/ui", stored.id))
            .set_json(json!({ "action": "open_chat", "interaction_id": "int-1" }))
            .to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/results/{}/chat", stored.id))
            .set_json(json!({ "message": "Hello?" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_GATEWAY);

        let reloaded = sessions.load(&stored.id).await.unwrap().unwrap();
        let chat = reloaded.ui.chat().unwrap();
        assert!(!chat.awaiting_reply);
        assert_eq!(chat.transcript.len(), 1);
    }

    #[actix_web::test]
    async fn analyze_requires_a_selected_guideline() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state("http://127.0.0.1:1".to_string())))
                .configure(routes),
        )
        .await;

        let boundary = "adlens-boundary";
        let body = multipart_body(
            boundary,
            vec![
                ("images", Some("ad.png"), png(8, 8)),
                ("adBrief", None, b"Summer".to_vec()),
            ],
        );
        let req = test::TestRequest::post()
            .uri("/api/v1/analyze")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "Validation error: Please select a guideline first"
        );
    }

    #[actix_web::test]
    async fn analyze_stores_a_session_that_renders() {
        let state = state(spawn_fake_service());
        let app =
            test::init_service(App::new().app_data(web::Data::new(state)).configure(routes)).await;

        let boundary = "adlens-boundary";
        let body = multipart_body(
            boundary,
            vec![
                ("images", Some("ad.png"), png(8, 8)),
                ("brandID", None, b"g1".to_vec()),
                ("adBrief", None, b"Summer launch for students".to_vec()),
            ],
        );
        let req = test::TestRequest::post()
            .uri("/api/v1/analyze")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", boundary),
            ))
            .set_payload(body)
            .to_request();
        let submitted: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(submitted["image_count"], 1);

        let results_path = submitted["results_path"].as_str().unwrap().to_string();
        let req = test::TestRequest::get().uri(&results_path).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "ready");
        let image = &body["view"]["images"][0];
        assert_eq!(image["filename"], "ad.png");
        assert_eq!(image["brand_score"], 4);
        assert_eq!(image["worst_evaluation"], 1);
        assert_eq!(image["personas"][0]["initials"], "YP");
        assert_eq!(image["personas"][0]["score"], 5);
    }
}
