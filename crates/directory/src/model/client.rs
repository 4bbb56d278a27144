//! Registered OAuth client applications.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iamdir_core::{ClientId, Entity};

use super::Timestamped;

/// An application registered with the directory.
///
/// # Invariants
/// - `client_id` is non-empty and globally unique.
/// - `secret_digest` is only ever a hash; the plain secret is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: ClientId,
    pub client_id: String,
    #[serde(skip_serializing, default)]
    pub secret_digest: String,
    pub name: String,
    pub description: Option<String>,
    pub redirect_uris: BTreeSet<String>,
    pub grant_types: BTreeSet<String>,
    pub scopes: BTreeSet<String>,
    pub enabled: bool,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Client {
    type Id = ClientId;

    fn id(&self) -> Self::Id {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Timestamped for Client {
    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

/// Candidate for `create_client`. New clients always start enabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClient {
    pub client_id: String,
    pub secret: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub redirect_uris: BTreeSet<String>,
    #[serde(default)]
    pub grant_types: BTreeSet<String>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    pub created_by: Option<String>,
}

impl NewClient {
    pub fn new(
        client_id: impl Into<String>,
        secret: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Replacement values for a client's mutable fields.
///
/// `secret` replaces the stored digest only when present and non-blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPatch {
    pub client_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub redirect_uris: BTreeSet<String>,
    #[serde(default)]
    pub grant_types: BTreeSet<String>,
    #[serde(default)]
    pub scopes: BTreeSet<String>,
    pub secret: Option<String>,
    pub enabled: bool,
}

impl From<&Client> for ClientPatch {
    fn from(client: &Client) -> Self {
        Self {
            client_id: client.client_id.clone(),
            name: client.name.clone(),
            description: client.description.clone(),
            redirect_uris: client.redirect_uris.clone(),
            grant_types: client.grant_types.clone(),
            scopes: client.scopes.clone(),
            secret: None,
            enabled: client.enabled,
        }
    }
}
