use crate::clicks::{ClickRecorder, ClickRequest};
use crate::models::{CreateLinkRequest, Link, LinkPatch, NewLink};
use crate::shortcode::CodeGenerator;
use crate::storage::{LinkStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use url::Url;

const MAX_ALIAS_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("destination is not a valid absolute http(s) URL")]
    InvalidUrl,
    #[error("alias must be 1-{MAX_ALIAS_LENGTH} characters of [A-Za-z0-9_-]")]
    InvalidAlias,
    #[error("alias already taken")]
    AliasTaken,
    #[error("could not generate a free short code")]
    GenerationExhausted,
    #[error("not found")]
    NotFound,
    /// Deliberately conflates "does not exist" and "not yours" so the API
    /// never confirms the existence of another owner's link.
    #[error("not found")]
    NotFoundOrForbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            // Callers that care about which identifier collided handle
            // DuplicateIdentifier before falling through to this impl.
            StoreError::DuplicateIdentifier(_) => ServiceError::AliasTaken,
            StoreError::Other(e) => ServiceError::Internal(e),
        }
    }
}

/// Orchestrates creation, resolution, mutation and click dispatch.
pub struct LinkService {
    store: Arc<dyn LinkStore>,
    recorder: Arc<ClickRecorder>,
    generator: CodeGenerator,
    max_attempts: u32,
}

impl LinkService {
    pub fn new(
        store: Arc<dyn LinkStore>,
        recorder: Arc<ClickRecorder>,
        generator: CodeGenerator,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            recorder,
            generator,
            max_attempts,
        }
    }

    pub fn store(&self) -> &Arc<dyn LinkStore> {
        &self.store
    }

    /// Create one link, generating a short code unless the caller supplied a
    /// custom alias that it also wants as a vanity identifier. The store's
    /// namespace constraint is the authority: a losing race on a generated
    /// code retries, a losing race on a user alias is terminal.
    pub async fn create_link(
        &self,
        request: CreateLinkRequest,
        owner_id: Option<String>,
    ) -> Result<Link, ServiceError> {
        let parsed = validate_long_url(&request.long_url)?;

        if let Some(alias) = &request.custom_alias {
            validate_alias(alias)?;
            // Fast pre-check; the create transaction re-checks authoritatively.
            if self.store.identifier_exists(alias).await? {
                return Err(ServiceError::AliasTaken);
            }
        }

        let title = match request.title {
            Some(title) => Some(title),
            None => parsed.host_str().map(derive_title),
        };

        for _ in 0..self.max_attempts {
            let new = NewLink {
                long_url: request.long_url.clone(),
                short_code: self.generator.generate(),
                custom_alias: request.custom_alias.clone(),
                title: title.clone(),
                tags: request.tags.clone(),
                owner_id: owner_id.clone(),
                created_at: chrono::Utc::now().timestamp(),
            };

            match self.store.create_link(&new).await {
                Ok(link) => return Ok(link),
                Err(StoreError::DuplicateIdentifier(taken))
                    if request.custom_alias.as_deref() == Some(taken.as_str()) =>
                {
                    return Err(ServiceError::AliasTaken);
                }
                // Generated code lost the race; try a fresh one.
                Err(StoreError::DuplicateIdentifier(_)) => continue,
                Err(StoreError::Other(e)) => return Err(ServiceError::Internal(e)),
            }
        }

        error!(
            attempts = self.max_attempts,
            length = self.generator.length(),
            "short code generation exhausted"
        );
        Err(ServiceError::GenerationExhausted)
    }

    /// Batch create with per-item isolation: one bad item never aborts the
    /// rest of the batch.
    pub async fn create_bulk(
        &self,
        requests: Vec<CreateLinkRequest>,
        owner_id: Option<String>,
    ) -> Vec<Result<Link, ServiceError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.create_link(request, owner_id.clone()).await);
        }
        results
    }

    /// Map an identifier back to its link. Short codes take precedence over
    /// aliases; a miss is the expected outcome for mistyped paths, not an
    /// error worth logging.
    pub async fn resolve(&self, identifier: &str) -> Result<Link, ServiceError> {
        if let Some(link) = self.store.get_by_code(identifier).await? {
            return Ok(link);
        }
        if let Some(link) = self.store.get_by_alias(identifier).await? {
            return Ok(link);
        }
        Err(ServiceError::NotFound)
    }

    /// Resolve for an end-user redirect: the click is dispatched to the
    /// recorder and the link returned immediately, so the redirect response
    /// never waits on analytics writes.
    pub async fn resolve_for_redirect(
        &self,
        identifier: &str,
        click: ClickRequest,
    ) -> Result<Link, ServiceError> {
        let link = self.resolve(identifier).await?;
        self.recorder.record(link.id, click);
        Ok(link)
    }

    /// Explicit click beacon for non-redirect clients.
    pub async fn record_click(
        &self,
        identifier: &str,
        click: ClickRequest,
    ) -> Result<(), ServiceError> {
        let link = self.resolve(identifier).await?;
        self.recorder.record(link.id, click);
        Ok(())
    }

    /// Only the alias and tags are mutable. An alias change re-runs the
    /// namespace check, excluding the link's own current alias.
    pub async fn update_link(
        &self,
        id: i64,
        owner_id: &str,
        patch: LinkPatch,
    ) -> Result<Link, ServiceError> {
        let link = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFoundOrForbidden)?;

        if link.owner_id.as_deref() != Some(owner_id) {
            return Err(ServiceError::NotFoundOrForbidden);
        }

        if let Some(alias_change) = &patch.custom_alias {
            if let Some(alias) = alias_change {
                validate_alias(alias)?;
            }
            match self
                .store
                .update_alias(id, alias_change.as_deref())
                .await
            {
                Ok(true) => {}
                Ok(false) => return Err(ServiceError::NotFoundOrForbidden),
                Err(StoreError::DuplicateIdentifier(_)) => return Err(ServiceError::AliasTaken),
                Err(StoreError::Other(e)) => return Err(ServiceError::Internal(e)),
            }
        }

        if let Some(tags) = &patch.tags {
            if !self.store.update_tags(id, tags).await? {
                return Err(ServiceError::NotFoundOrForbidden);
            }
        }

        self.store
            .get_by_id(id)
            .await?
            .ok_or(ServiceError::NotFoundOrForbidden)
    }

    pub async fn delete_link(&self, id: i64, owner_id: &str) -> Result<(), ServiceError> {
        if self.store.delete_link(id, owner_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFoundOrForbidden)
        }
    }

    pub async fn list_links(
        &self,
        owner_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Link>, ServiceError> {
        Ok(self.store.list_by_owner(owner_id, limit, offset).await?)
    }

}

fn validate_long_url(long_url: &str) -> Result<Url, ServiceError> {
    let parsed = Url::parse(long_url).map_err(|_| ServiceError::InvalidUrl)?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ServiceError::InvalidUrl);
    }
    Ok(parsed)
}

fn validate_alias(alias: &str) -> Result<(), ServiceError> {
    let valid_chars = alias
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if alias.is_empty() || alias.len() > MAX_ALIAS_LENGTH || !valid_chars {
        return Err(ServiceError::InvalidAlias);
    }
    Ok(())
}

/// Display title derived from the destination host: "example.com" becomes
/// "Example.com".
fn derive_title(host: &str) -> String {
    let mut chars = host.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
