use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};

use crate::{crypto::FieldCipher, users::User, Error, DB};

#[derive(Clone, Debug, FromRequestParts)]
pub struct BaseParams {
    pub ctx: Ctx,
    #[from_request(via(Extension))]
    pub db: DB,
    #[from_request(via(Extension))]
    pub cipher: FieldCipher,
}

impl BaseParams {
    pub fn new(db: DB, cipher: FieldCipher, ctx: Ctx) -> Self {
        Self { ctx, db, cipher }
    }
}

/// The authenticated caller. Only available behind `users::auth::require_user`.
#[derive(Clone, Debug)]
pub struct Ctx {
    pub user: User,
}

impl Ctx {
    pub fn new(user: User) -> Self {
        Self { user }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<User>()
            .cloned()
            .map(Self::new)
            .ok_or(Error::Unauthorized)
    }
}
