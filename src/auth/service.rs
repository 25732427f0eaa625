//! Stateless token issuance and verification.
//!
//! Tokens use the JWT compact form with an HS256 signature:
//! `base64url(header).base64url(claims).base64url(hmac)`. The service keeps no per-token state;
//! verification depends only on the signing key and the current instant, so any number of
//! handlers can verify concurrently without coordination.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
// self
use crate::{
	_prelude::*,
	auth::{Claim, Identity, IdentityRegistry, Role, SigningKey, SubjectId, Token},
	clock::Clock,
	config,
	error::ConfigError,
};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Debug, Deserialize)]
struct TokenHeader {
	alg: String,
}

/// Issues and verifies signed identity claims.
#[derive(Clone)]
pub struct TokenService {
	key: SigningKey,
	mac: HmacSha256,
	registry: Arc<dyn IdentityRegistry>,
	clock: Arc<dyn Clock>,
	lifetime: Duration,
}
impl TokenService {
	/// Lifetime embedded in every issued claim unless overridden.
	pub const DEFAULT_LIFETIME: Duration = Duration::hours(1);

	/// Creates a service signing with `key` and resolving logins through `registry`.
	///
	/// Fails with [`ConfigError::EmptySigningSecret`] for an empty key.
	pub fn new(
		key: SigningKey,
		registry: Arc<dyn IdentityRegistry>,
		clock: Arc<dyn Clock>,
	) -> Result<Self, ConfigError> {
		if key.is_empty() {
			return Err(ConfigError::EmptySigningSecret);
		}

		let mac = <HmacSha256 as Mac>::new_from_slice(key.expose())
			.map_err(|_| ConfigError::EmptySigningSecret)?;

		Ok(Self { key, mac, registry, clock, lifetime: Self::DEFAULT_LIFETIME })
	}

	/// Overrides the claim lifetime.
	///
	/// The lifetime must be positive and no longer than [`config::MAX_DURATION`].
	pub fn with_lifetime(mut self, lifetime: Duration) -> Result<Self, ConfigError> {
		config::validate_duration("auth.token_lifetime", lifetime)?;

		self.lifetime = lifetime;

		Ok(self)
	}

	/// Lifetime embedded in issued claims.
	pub fn lifetime(&self) -> Duration {
		self.lifetime
	}

	/// Resolves `username` through the registry and issues a token for it.
	pub fn login(&self, username: &str) -> Result<Token> {
		let identity = self
			.registry
			.lookup(username)
			.ok_or_else(|| Error::UnknownSubject { username: username.to_owned() })?;

		Ok(self.issue(&identity))
	}

	/// Issues a token for a registered identity using the service clock.
	pub fn issue(&self, identity: &Identity) -> Token {
		self.issue_at(identity.id, identity.role.clone(), self.clock.now())
	}

	/// Issues a token for `sub`/`role` as if the current instant were `now`.
	pub fn issue_at(&self, sub: SubjectId, role: Role, now: OffsetDateTime) -> Token {
		let claim = Claim::new(sub, role, now, self.lifetime);
		let header = URL_SAFE_NO_PAD.encode(HEADER);
		let payload = URL_SAFE_NO_PAD.encode(
			serde_json::json!({
				"sub": claim.sub.0,
				"role": claim.role.as_ref(),
				"iat": claim.iat.unix_timestamp(),
				"exp": claim.exp.unix_timestamp(),
			})
			.to_string(),
		);
		let signature = URL_SAFE_NO_PAD.encode(self.sign(&header, &payload));

		Token::new(format!("{header}.{payload}.{signature}"))
	}

	/// Verifies a token against the service clock.
	pub fn verify(&self, token: Option<&str>) -> Result<Claim> {
		self.verify_at(token, self.clock.now())
	}

	/// Verifies a token as if the current instant were `now`.
	///
	/// Checks run in a fixed order: presence, shape, signature, header algorithm, claim
	/// decoding, expiry.
	pub fn verify_at(&self, token: Option<&str>, now: OffsetDateTime) -> Result<Claim> {
		let token = token.map(str::trim).filter(|t| !t.is_empty()).ok_or(Error::MissingToken)?;
		let mut segments = token.split('.');
		let (Some(header), Some(payload), Some(signature), None) =
			(segments.next(), segments.next(), segments.next(), segments.next())
		else {
			return Err(invalid("expected three segments"));
		};
		let provided =
			URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid("signature is not base64url"))?;
		let expected = self.sign(header, payload);

		if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
			return Err(invalid("signature mismatch"));
		}

		let header: TokenHeader = decode_segment(header).ok_or(invalid("header is malformed"))?;

		if header.alg != ALGORITHM {
			return Err(invalid("unsupported algorithm"));
		}

		let claim: Claim = decode_segment(payload).ok_or(invalid("claims are malformed"))?;

		if claim.is_expired_at(now) {
			return Err(Error::ExpiredToken { expired_at: claim.exp });
		}

		Ok(claim)
	}

	fn sign(&self, header: &str, payload: &str) -> Vec<u8> {
		let mut mac = self.mac.clone();

		mac.update(header.as_bytes());
		mac.update(b".");
		mac.update(payload.as_bytes());

		mac.finalize().into_bytes().to_vec()
	}
}
impl Debug for TokenService {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenService")
			.field("key", &self.key)
			.field("lifetime", &self.lifetime)
			.finish()
	}
}

/// Checks a verified claim against the role a route requires.
pub fn authorize(claim: &Claim, required: &Role) -> Result<()> {
	if claim.has_role(required) {
		Ok(())
	} else {
		Err(Error::Forbidden { required: required.to_string(), actual: claim.role.to_string() })
	}
}

/// Extracts the credential from an `Authorization: Bearer <token>` header value.
///
/// The credential is the second whitespace-separated word. The scheme word is not checked, so a
/// credential sent under another scheme reaches verification and is rejected there as invalid
/// rather than treated as missing.
pub fn bearer_token(header: &str) -> Option<&str> {
	header.split_whitespace().nth(1)
}

fn invalid(reason: &'static str) -> Error {
	Error::InvalidToken { reason }
}

fn decode_segment<T>(segment: &str) -> Option<T>
where
	T: for<'de> Deserialize<'de>,
{
	let bytes = URL_SAFE_NO_PAD.decode(segment).ok()?;

	serde_json::from_slice(&bytes).ok()
}
