use axum::{Json, extract::State, http::StatusCode};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use serde::{Deserialize, Serialize};
use ttt_server_domain::{ServiceError, app::AppState, player::PlayerUsername};
use validator::Validate;

use crate::{MyServiceError, jwt::Session};

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 32))]
    pub username: PlayerUsername,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub password: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: PlayerUsername,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub username: PlayerUsername,
    pub current_room: Option<String>,
}

pub async fn register(
    State(app): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<StatusCode, MyServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::BadRequest(e.to_string()))?;
    app.player_service
        .register(
            &request.username,
            &request.name,
            &request.password,
            &request.email,
        )
        .await?;
    Ok(StatusCode::CREATED)
}

pub async fn login(
    State(app): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, MyServiceError> {
    let token = app
        .player_service
        .login(&request.username, &request.password)
        .await?;
    Ok(Json(LoginResponse { token }))
}

/// Ends the session and revokes the presented token for the rest of its lifetime.
pub async fn logout(
    Session(session): Session,
    TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
    State(app): State<AppState>,
) -> Result<StatusCode, MyServiceError> {
    let expires_at = app.jwt_service.token_expiry(bearer.token())?;
    app.session_service.revoke_token(bearer.token(), expires_at);
    app.session_service.end_session(&session.username);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session(Session(session): Session) -> Json<SessionResponse> {
    Json(SessionResponse {
        username: session.username,
        current_room: session.current_room,
    })
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRequestParts;
    use ttt_server_domain::session::SessionContext;

    use super::*;
    use crate::test_util::test_app;

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            name: "Alice".to_string(),
            password: "secret".to_string(),
            email: email.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let app = test_app().await;
        let status = register(
            State(app.clone()),
            Json(register_request("alice", "alice@example.com")),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);

        let Json(response) = login(
            State(app.clone()),
            Json(LoginRequest {
                username: "alice".to_string(),
                password: "secret".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(app.jwt_service.validate_jwt(&response.token).unwrap(), "alice");

        let wrong = login(
            State(app.clone()),
            Json(LoginRequest {
                username: "alice".to_string(),
                password: "nope".to_string(),
            }),
        )
        .await;
        assert!(matches!(
            wrong,
            Err(MyServiceError(ServiceError::InvalidCredentials))
        ));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let app = test_app().await;
        assert!(matches!(
            register(State(app.clone()), Json(register_request("", "a@example.com"))).await,
            Err(MyServiceError(ServiceError::BadRequest(..)))
        ));
        assert!(matches!(
            register(State(app.clone()), Json(register_request("alice", "not-an-email"))).await,
            Err(MyServiceError(ServiceError::BadRequest(..)))
        ));

        register(
            State(app.clone()),
            Json(register_request("alice", "alice@example.com")),
        )
        .await
        .unwrap();
        assert!(matches!(
            register(
                State(app.clone()),
                Json(register_request("alice", "alice@example.com"))
            )
            .await,
            Err(MyServiceError(ServiceError::AlreadyExists(..)))
        ));
    }

    async fn session_from_token(app: &AppState, token: &str) -> Result<Session, MyServiceError> {
        let (mut parts, _) = axum::http::Request::builder()
            .header("Authorization", format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts();
        Session::from_request_parts(&mut parts, app).await
    }

    #[tokio::test]
    async fn test_session_follows_room_membership() {
        let app = test_app().await;
        let alice = "alice".to_string();
        app.room_service
            .join_room(&"1".to_string(), &alice)
            .await
            .unwrap();

        let Json(session) = get_session(Session(app.session_service.get_session(&alice))).await;
        assert_eq!(session.username, "alice");
        assert_eq!(session.current_room.as_deref(), Some("1"));

        let token = app.jwt_service.generate_jwt(&alice).unwrap();
        let status = logout(
            Session(SessionContext::new(alice.clone())),
            TypedHeader(Authorization::bearer(&token).unwrap()),
            State(app.clone()),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(app.session_service.get_session(&alice).current_room, None);
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let app = test_app().await;
        let alice = "alice".to_string();
        let token = app.jwt_service.generate_jwt(&alice).unwrap();
        let other_token = app.jwt_service.generate_jwt(&"bob".to_string()).unwrap();

        let Session(session) = session_from_token(&app, &token).await.unwrap();
        assert_eq!(session.username, "alice");

        logout(
            Session(session),
            TypedHeader(Authorization::bearer(&token).unwrap()),
            State(app.clone()),
        )
        .await
        .unwrap();

        assert!(matches!(
            session_from_token(&app, &token).await,
            Err(MyServiceError(ServiceError::Unauthorized(..)))
        ));
        assert!(session_from_token(&app, &other_token).await.is_ok());
    }
}
