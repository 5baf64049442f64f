// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{
		ClientAuthMethod, GrantSet, GrantType, ProviderDescriptor, ProviderEndpoints,
		ProviderQuirks,
	},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum ProviderDescriptorError {
	/// Authorization Code support needs an authorization endpoint.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Token endpoint is mandatory for every grant.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// At least one grant must be supported.
	#[error("Descriptor must enable at least one grant type.")]
	NoSupportedGrants,
	/// A PKCE requirement only makes sense with Authorization Code support.
	#[error("Requiring PKCE needs the authorization_code grant.")]
	PkceRequiredWithoutAuthorizationCode,
	/// Endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Scope delimiters must be printable.
	#[error("Scope delimiter must be a printable character.")]
	InvalidScopeDelimiter {
		/// Invalid delimiter that was supplied.
		delimiter: char,
	},
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Debug)]
pub struct ProviderDescriptorBuilder {
	id: ProviderId,
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	grants: GrantSet,
	preferred_client_auth_method: ClientAuthMethod,
	quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			authorization_endpoint: None,
			token_endpoint: None,
			grants: GrantSet::default(),
			preferred_client_auth_method: ClientAuthMethod::default(),
			quirks: ProviderQuirks::default(),
		}
	}

	/// Sets the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Marks a single grant type as supported.
	pub fn support_grant(mut self, grant: GrantType) -> Self {
		self.grants = self.grants.with(grant);

		self
	}

	/// Overrides the preferred client authentication method.
	pub fn preferred_client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.preferred_client_auth_method = method;

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let token = self.token_endpoint.ok_or(ProviderDescriptorError::MissingTokenEndpoint)?;
		let descriptor = ProviderDescriptor {
			id: self.id,
			endpoints: ProviderEndpoints { authorization: self.authorization_endpoint, token },
			grants: self.grants,
			preferred_client_auth_method: self.preferred_client_auth_method,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		if self.grants.is_empty() {
			return Err(ProviderDescriptorError::NoSupportedGrants);
		}
		if self.quirks.requires_pkce() && !self.supports(GrantType::AuthorizationCode) {
			return Err(ProviderDescriptorError::PkceRequiredWithoutAuthorizationCode);
		}

		match self.endpoints.authorization.as_ref() {
			Some(authorization) => validate_endpoint("authorization", authorization)?,
			None if self.grants.iter().any(GrantType::needs_authorization_endpoint) =>
				return Err(ProviderDescriptorError::MissingAuthorizationEndpoint),
			None => {},
		}

		validate_endpoint("token", &self.endpoints.token)?;

		if self.quirks.scope_delimiter.is_control() {
			return Err(ProviderDescriptorError::InvalidScopeDelimiter {
				delimiter: self.quirks.scope_delimiter,
			});
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	if url.scheme() != "https" {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn id() -> ProviderId {
		ProviderId::new("tidal").expect("Provider fixture should be valid.")
	}

	fn url(value: &str) -> Url {
		Url::parse(value).expect("URL fixture should parse.")
	}

	#[test]
	fn client_credentials_descriptor_needs_no_authorization_endpoint() {
		let descriptor = ProviderDescriptor::builder(id())
			.token_endpoint(url("https://accounts.example.com/api/token"))
			.support_grant(GrantType::ClientCredentials)
			.build()
			.expect("Client credentials descriptor should build.");

		assert!(descriptor.endpoints.authorization.is_none());
		assert!(descriptor.supports(GrantType::ClientCredentials));
		assert!(!descriptor.supports(GrantType::RefreshToken));
	}

	#[test]
	fn authorization_code_requires_authorization_endpoint() {
		let err = ProviderDescriptor::builder(id())
			.token_endpoint(url("https://auth.example.com/token"))
			.support_grant(GrantType::AuthorizationCode)
			.build()
			.expect_err("Authorization code without an authorization endpoint should fail.");

		assert_eq!(err, ProviderDescriptorError::MissingAuthorizationEndpoint);
	}

	#[test]
	fn insecure_endpoints_are_rejected() {
		let err = ProviderDescriptor::builder(id())
			.authorization_endpoint(url("http://login.example.com/authorize"))
			.token_endpoint(url("https://auth.example.com/token"))
			.support_grant(GrantType::AuthorizationCode)
			.build()
			.expect_err("Plain HTTP endpoints should be rejected.");

		assert!(matches!(
			err,
			ProviderDescriptorError::InsecureEndpoint { endpoint: "authorization", .. }
		));
	}

	#[test]
	fn pkce_and_grants_are_cross_checked() {
		let base = || {
			ProviderDescriptor::builder(id()).token_endpoint(url("https://auth.example.com/token"))
		};

		assert_eq!(base().build().err(), Some(ProviderDescriptorError::NoSupportedGrants));
		assert_eq!(
			base()
				.support_grant(GrantType::ClientCredentials)
				.quirks(ProviderQuirks::pkce_required())
				.build()
				.err(),
			Some(ProviderDescriptorError::PkceRequiredWithoutAuthorizationCode)
		);
		assert_eq!(
			base()
				.support_grant(GrantType::ClientCredentials)
				.quirks(ProviderQuirks { scope_delimiter: '\n', ..Default::default() })
				.build()
				.err(),
			Some(ProviderDescriptorError::InvalidScopeDelimiter { delimiter: '\n' })
		);
	}
}
