pub(super) mod data;
pub(super) mod publish;
pub(super) mod refresh;
pub(super) mod token;

use serde::Deserialize;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Body of the endpoints that only need the account credential.
#[derive(Default, Deserialize)]
pub(super) struct CredentialBody {
    #[serde(default, alias = "access_token", alias = "token")]
    pub credential: Option<String>,
}

/// A token cancelled when the returned guard drops, which happens when axum
/// drops the handler future after the client disconnects.
pub(super) fn request_scope() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}
