use std::sync::Arc;

use crate::{
    auth::JwtService,
    config::Config,
    services::{FileService, UserStore},
    storage::{ObjectStore, UrlSigner},
};

pub mod auth;
pub mod files;
pub mod health;
pub mod user;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub users: Arc<dyn UserStore>,
    pub files: FileService,
    pub store: Arc<dyn ObjectStore>,
    pub jwt: Arc<JwtService>,
    pub signer: UrlSigner,
}
