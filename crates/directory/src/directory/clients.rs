use iamdir_core::{ClientId, DirectoryError, DirectoryResult, Page, PageRequest};

use super::{Directory, required};
use crate::model::{Client, ClientPatch, NewClient};

impl Directory {
    /// Registers a client. The secret is hashed and the client starts enabled.
    pub fn create_client(&self, candidate: NewClient) -> DirectoryResult<Client> {
        let client_id = required("clientId", &candidate.client_id)?;
        let name = required("name", &candidate.name)?;
        let secret = required("clientSecret", &candidate.secret)?;

        if self.store.find_client_by_client_id(&client_id)?.is_some() {
            return Err(DirectoryError::duplicate("client", "clientId", client_id));
        }

        let mut client = Client {
            id: ClientId::new(),
            client_id,
            secret_digest: self.hasher.hash(&secret)?,
            name,
            description: candidate.description,
            redirect_uris: candidate.redirect_uris,
            grant_types: candidate.grant_types,
            scopes: candidate.scopes,
            enabled: true,
            created_by: candidate.created_by,
            created_at: Default::default(),
            updated_at: Default::default(),
        };
        self.before_insert(&mut client);
        self.store.save_client(&client)?;

        tracing::info!(client = %client.client_id, "oauth client registered");
        Ok(client)
    }

    pub fn update_client(&self, id: ClientId, patch: ClientPatch) -> DirectoryResult<Client> {
        let mut client = self.get_client(id)?;
        let client_id = required("clientId", &patch.client_id)?;
        let name = required("name", &patch.name)?;

        if self
            .store
            .find_client_by_client_id(&client_id)?
            .is_some_and(|other| other.id != id)
        {
            return Err(DirectoryError::duplicate("client", "clientId", client_id));
        }

        if let Some(secret) = patch.secret.as_deref().filter(|s| !s.trim().is_empty()) {
            client.secret_digest = self.hasher.hash(secret)?;
        }
        client.client_id = client_id;
        client.name = name;
        client.description = patch.description;
        client.redirect_uris = patch.redirect_uris;
        client.grant_types = patch.grant_types;
        client.scopes = patch.scopes;
        client.enabled = patch.enabled;
        self.before_update(&mut client);
        self.store.save_client(&client)?;

        tracing::debug!(client = %client.client_id, enabled = client.enabled, "oauth client updated");
        Ok(client)
    }

    /// Replaces the client secret unconditionally.
    pub fn rotate_client_secret(&self, id: ClientId, new_secret: &str) -> DirectoryResult<Client> {
        let secret = required("clientSecret", new_secret)?;
        let mut client = self.get_client(id)?;
        client.secret_digest = self.hasher.hash(&secret)?;
        self.before_update(&mut client);
        self.store.save_client(&client)?;

        tracing::info!(client = %client.client_id, "oauth client secret rotated");
        Ok(client)
    }

    /// True iff the client exists, is enabled and `secret` matches.
    pub fn verify_client_credentials(&self, client_id: &str, secret: &str) -> DirectoryResult<bool> {
        Ok(self
            .store
            .find_client_by_client_id(client_id)?
            .is_some_and(|client| client.enabled && self.hasher.verify(secret, &client.secret_digest)))
    }

    pub fn delete_client(&self, id: ClientId) -> DirectoryResult<()> {
        let client = self.get_client(id)?;
        self.store.delete_client(id)?;

        tracing::info!(client = %client.client_id, "oauth client deleted");
        Ok(())
    }

    pub fn get_client(&self, id: ClientId) -> DirectoryResult<Client> {
        self.store
            .find_client(id)?
            .ok_or_else(|| DirectoryError::not_found("client", id))
    }

    pub fn find_client_by_client_id(&self, client_id: &str) -> DirectoryResult<Option<Client>> {
        Ok(self.store.find_client_by_client_id(client_id)?)
    }

    pub fn search_clients(&self, query: Option<&str>, page: PageRequest) -> DirectoryResult<Page<Client>> {
        Ok(self.store.search_clients(query, page)?)
    }
}
