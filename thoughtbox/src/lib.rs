pub mod app;
pub mod client;
pub mod config;
pub mod crypto;
pub mod ctx;
pub mod db;
pub mod errors;
pub mod health;
pub mod notes;
pub mod openapi;
pub mod search;
pub mod state;
pub mod telemetry;
pub mod users;

pub use config::config;
pub use db::{init_db, DB};
pub use errors::{Error, Result};

#[cfg(test)]
pub mod tests {
    use crate::{
        app::{create, AppParams},
        crypto::FieldCipher,
        errors::{Error, Result},
        state::AppState,
        users::{create_user, CreateUserParameters, User},
        DB,
    };
    use aide::axum::ApiRouter;
    use axum_test::TestServer;

    pub fn test_cipher() -> FieldCipher {
        FieldCipher::new("test-encryption-secret")
    }

    /// Creates a user and returns it together with its bearer token.
    pub async fn test_user(db: &DB, email: &str) -> (User, String) {
        create_user(db, CreateUserParameters { email: email.into() })
            .await
            .unwrap()
    }

    pub async fn test_server<R>(db: DB, router: R) -> Result<TestServer>
    where
        R: FnOnce(AppState) -> ApiRouter,
    {
        let (app, _) = create(AppParams {
            db,
            cipher: test_cipher(),
            router,
        })
        .await?;

        let config = TestServer::builder().mock_transport().into_config();

        TestServer::new_with_config(app, config).map_err(|e| Error::App(e.into()))
    }
}
