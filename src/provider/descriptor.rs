//! Static description of an OAuth-backed provider: where its endpoints live, which grants it
//! accepts, and how requests to it must be shaped.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant types and grant sets.
pub mod grant;
/// Request-shaping differences between providers.
pub mod quirks;

pub use builder::*;
pub use grant::*;
pub use quirks::*;

// self
use crate::{_prelude::*, auth::ProviderId};

/// How the broker authenticates itself at a token endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	/// Secret in an HTTP Basic `Authorization` header (Provider A).
	#[default]
	ClientSecretBasic,
	/// Secret as a form field next to `client_id`.
	ClientSecretPost,
	/// No secret; `client_id` in the form body and a PKCE verifier prove the caller.
	NoneWithPkce,
}

/// Endpoints a descriptor points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Browser-facing consent page; absent for app-only providers.
	pub authorization: Option<Url>,
	/// Token endpoint for exchanges and refreshes.
	pub token: Url,
}

/// Validated, immutable provider description shared by a provider's flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Provider identifier.
	pub id: ProviderId,
	/// Endpoint locations.
	pub endpoints: ProviderEndpoints,
	/// Grants the provider accepts.
	pub grants: GrantSet,
	/// Token-endpoint client authentication.
	pub preferred_client_auth_method: ClientAuthMethod,
	/// Request-shaping quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id)
	}

	/// Checks whether the descriptor supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.grants.contains(grant)
	}

	/// Authorization endpoint, or the validation error a descriptor without one would raise.
	pub fn authorization_endpoint(&self) -> Result<&Url, ProviderDescriptorError> {
		self.endpoints.authorization.as_ref().ok_or(ProviderDescriptorError::MissingAuthorizationEndpoint)
	}
}
