use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use sea_orm::EntityTrait;
use woofadaar_types::anyhow;

use crate::{
    entity::user,
    error::{ApiError, AuthorizationError},
    permission::GlobalPermission,
    state::AppState,
};

#[derive(Debug, Clone)]
pub struct TokenUser {
    pub sub: String,
}

/// Verified request identity, inserted by `jwt_middleware`.
#[derive(Debug, Clone)]
pub enum AppUser {
    Token(TokenUser),
    Unauthorized,
}

impl AppUser {
    pub fn sub(&self) -> Result<String, AuthorizationError> {
        match self {
            AppUser::Token(user) => Ok(user.sub.clone()),
            AppUser::Unauthorized => Err(AuthorizationError::unauthorized(
                "Authentication required".to_string(),
            )),
        }
    }

    pub async fn get_user(&self, state: &AppState) -> Result<user::Model, AuthorizationError> {
        let sub = self.sub()?;
        user::Entity::find_by_id(&sub)
            .one(&state.db)
            .await?
            .ok_or_else(|| AuthorizationError::from(anyhow!("User not found")))
    }

    pub async fn global_permission(&self, state: &AppState) -> Result<GlobalPermission, ApiError> {
        let sub = self.sub()?;

        let bits = match state.permission_cache.get(&sub) {
            Some(bits) => bits,
            None => {
                let user = user::Entity::find_by_id(&sub)
                    .one(&state.db)
                    .await?
                    .ok_or_else(|| anyhow!("User not found"))?;
                state.permission_cache.insert(sub.clone(), user.permission);
                user.permission
            }
        };

        GlobalPermission::from_bits(bits)
            .ok_or_else(|| ApiError::from(anyhow!("Invalid permission bits")))
    }

    pub async fn check_global_permission(
        &self,
        state: &AppState,
        permission: GlobalPermission,
    ) -> Result<GlobalPermission, ApiError> {
        let global_permission = self.global_permission(state).await?;
        let has_permission = global_permission.contains(permission)
            || global_permission.contains(GlobalPermission::ADMIN);
        if has_permission {
            Ok(global_permission)
        } else {
            Err(ApiError::FORBIDDEN)
        }
    }
}

pub async fn jwt_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response<Body>, AuthorizationError> {
    let mut request = request;
    if let Some(auth_header) = request.headers().get(AUTHORIZATION)
        && let Ok(token) = auth_header.to_str()
    {
        let token = if token.starts_with("Bearer ") {
            &token[7..]
        } else {
            token
        };

        let token = token.trim();
        let claims = state.validate_token(token)?;
        let sub = claims.get("sub").ok_or(anyhow!("sub not found"))?;
        let sub = sub.as_str().ok_or(anyhow!("sub not a string"))?;
        let user = AppUser::Token(TokenUser {
            sub: sub.to_string(),
        });
        request.extensions_mut().insert::<AppUser>(user);
        return Ok(next.run(request).await);
    }

    request
        .extensions_mut()
        .insert::<AppUser>(AppUser::Unauthorized);
    Ok(next.run(request).await)
}
