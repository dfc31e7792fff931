use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};

use crate::domain::{Role, UserId};

use super::error::ApiError;

/// 上流のゲートウェイが設定する利用者IDのヘッダー
pub const USER_ID_HEADER: &str = "x-user-id";

/// 利用者の権限のヘッダー（省略時は USER）
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// 認証済みの利用者
///
/// 認証そのものは上流で済んでいる前提で、転送されたヘッダーを読むだけ。
/// ヘッダーが無い、または不正な場合は 401。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// 本人または管理者のみ他の利用者の記録を参照できる
    pub fn can_view(&self, user_id: UserId) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .ok_or(ApiError::Unauthorized)?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => Role::User,
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|value| value.trim().parse::<Role>().ok())
                .ok_or(ApiError::Unauthorized)?,
        };

        Ok(Self {
            user_id: UserId::new(user_id),
            role,
        })
    }
}

/// 管理者のみ通す
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, "admin route requested by non-admin");
            return Err(ApiError::Forbidden);
        }
        Ok(Self(user))
    }
}

/// JSONボディ（不正な場合は ErrorResponse 形式の 400）
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// パスパラメータ
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// クエリパラメータ
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<CurrentUser, ApiError> {
        let mut builder = Request::builder().uri("/borrow/me");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_role_defaults_to_user() {
        let user = extract(&[(USER_ID_HEADER, "12")]).await.unwrap();

        assert_eq!(user.user_id, UserId::new(12));
        assert_eq!(user.role, Role::User);
        assert!(!user.can_view(UserId::new(13)));
        assert!(user.can_view(UserId::new(12)));
    }

    #[tokio::test]
    async fn test_admin_role_is_case_insensitive() {
        let user = extract(&[(USER_ID_HEADER, "1"), (USER_ROLE_HEADER, "admin")])
            .await
            .unwrap();

        assert!(user.is_admin());
        assert!(user.can_view(UserId::new(99)));
    }

    #[tokio::test]
    async fn test_missing_or_invalid_identity_is_unauthorized() {
        assert!(matches!(extract(&[]).await, Err(ApiError::Unauthorized)));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "abc")]).await,
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "0")]).await,
            Err(ApiError::Unauthorized)
        ));
        assert!(matches!(
            extract(&[(USER_ID_HEADER, "5"), (USER_ROLE_HEADER, "ROOT")]).await,
            Err(ApiError::Unauthorized)
        ));
    }
}
