//! Common test utilities and fixtures.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use uuid::Uuid;

use kc_saml_sp::signature::{SignatureAlgorithm, SignatureConfig};
use kc_saml_sp::{status_codes, Settings, XmlSigner};

/// Signing key of the test identity provider.
pub const IDP_KEY: &str = include_str!("../../../testdata/idp_key.pem");
/// Certificate of the test identity provider.
pub const IDP_CERT: &str = include_str!("../../../testdata/idp_cert.pem");
/// SHA-1 fingerprint of [`IDP_CERT`].
pub const IDP_FINGERPRINT: &str = "15:61:0D:7A:8B:7E:34:C9:EB:BF:60:B2:C4:18:DB:55:63:9A:21:F0";
/// A key the service provider does not trust.
pub const ROGUE_KEY: &str = include_str!("../../../testdata/rogue_key.pem");
/// Certificate matching [`ROGUE_KEY`].
pub const ROGUE_CERT: &str = include_str!("../../../testdata/rogue_cert.pem");
/// P-256 signing key of an identity provider using ECDSA.
pub const EC_KEY: &str = include_str!("../../../testdata/ec_key.pem");
/// Certificate matching [`EC_KEY`].
pub const EC_CERT: &str = include_str!("../../../testdata/ec_cert.pem");

/// Issuer used by every fixture.
pub const IDP_ENTITY_ID: &str = "https://idp.example.com/metadata";

/// Initializes tracing once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kc_saml_sp=debug")
        .with_test_writer()
        .try_init();
}

/// Settings trusting the test IdP certificate.
pub fn trusted_settings() -> Settings {
    Settings::default().with_idp_cert(IDP_CERT)
}

/// Formats an instant the way identity providers emit it.
pub fn instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Generates a fresh XML ID.
pub fn new_id() -> String {
    format!("_{}", Uuid::new_v4().simple())
}

/// Builds SAML Response documents for tests.
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    /// ID of the Response element.
    pub response_id: String,
    /// ID of the assertion.
    pub assertion_id: String,
    /// Top-level status code.
    pub status: String,
    /// `NameID` of the subject.
    pub name_id: String,
    /// `Conditions` bounds; `None` omits the element.
    pub conditions: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Attribute names and values.
    pub attributes: Vec<(String, String)>,
    /// `SessionIndex` of the authentication statement.
    pub session_index: String,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            response_id: new_id(),
            assertion_id: new_id(),
            status: status_codes::SUCCESS.to_string(),
            name_id: "jdoe@example.org".to_string(),
            conditions: Some((now - Duration::minutes(5), now + Duration::minutes(5))),
            attributes: vec![
                ("eduPersonPrincipalName".to_string(), "jdoe@example.org".to_string()),
                ("mail".to_string(), "john.doe@example.org".to_string()),
            ],
            session_index: new_id(),
        }
    }
}

impl ResponseBuilder {
    /// Sets the top-level status code.
    #[must_use]
    pub fn status(mut self, status: &str) -> Self {
        self.status = status.to_string();
        self
    }

    /// Sets the `Conditions` bounds.
    #[must_use]
    pub fn conditions(mut self, not_before: DateTime<Utc>, not_on_or_after: DateTime<Utc>) -> Self {
        self.conditions = Some((not_before, not_on_or_after));
        self
    }

    /// Omits the `Conditions` element.
    #[must_use]
    pub fn without_conditions(mut self) -> Self {
        self.conditions = None;
        self
    }

    /// Renders the assertion element.
    pub fn assertion(&self) -> String {
        let now = instant(Utc::now());
        let conditions = self.conditions.map_or_else(String::new, |(nb, noa)| {
            format!(
                r#"<saml:Conditions NotBefore="{}" NotOnOrAfter="{}"><saml:AudienceRestriction><saml:Audience>https://sp.example.com</saml:Audience></saml:AudienceRestriction></saml:Conditions>"#,
                instant(nb),
                instant(noa)
            )
        });
        let attributes: String = self
            .attributes
            .iter()
            .map(|(name, value)| {
                format!(
                    r#"<saml:Attribute Name="{name}"><saml:AttributeValue>{value}</saml:AttributeValue></saml:Attribute>"#
                )
            })
            .collect();

        format!(
            r#"<saml:Assertion xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{id}" Version="2.0" IssueInstant="{now}">
    <saml:Issuer>{issuer}</saml:Issuer>
    <saml:Subject>
      <saml:NameID Format="urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress">{name_id}</saml:NameID>
      <saml:SubjectConfirmation Method="urn:oasis:names:tc:SAML:2.0:cm:bearer"/>
    </saml:Subject>
    {conditions}
    <saml:AuthnStatement AuthnInstant="{now}" SessionIndex="{session}">
      <saml:AuthnContext><saml:AuthnContextClassRef>urn:oasis:names:tc:SAML:2.0:ac:classes:PasswordProtectedTransport</saml:AuthnContextClassRef></saml:AuthnContext>
    </saml:AuthnStatement>
    <saml:AttributeStatement>{attributes}</saml:AttributeStatement>
  </saml:Assertion>"#,
            id = self.assertion_id,
            issuer = IDP_ENTITY_ID,
            name_id = self.name_id,
            session = self.session_index,
        )
    }

    /// Renders the unsigned Response around `assertions`.
    pub fn wrap(&self, assertions: &str) -> String {
        format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="{id}" Version="2.0" IssueInstant="{now}" Destination="https://sp.example.com/acs">
  <saml:Issuer>{issuer}</saml:Issuer>
  <samlp:Status><samlp:StatusCode Value="{status}"/></samlp:Status>
  {assertions}
</samlp:Response>"#,
            id = self.response_id,
            now = instant(Utc::now()),
            issuer = IDP_ENTITY_ID,
            status = self.status,
        )
    }

    /// Renders the unsigned Response.
    pub fn build(&self) -> String {
        self.wrap(&self.assertion())
    }

    /// Renders the Response with the assertion signed by the test IdP.
    pub fn signed(&self) -> anyhow::Result<String> {
        self.signed_by(IDP_KEY, IDP_CERT)
    }

    /// Renders the Response with the assertion signed by `key`.
    pub fn signed_by(&self, key: &str, cert: &str) -> anyhow::Result<String> {
        let signer = XmlSigner::from_pem(key, Some(cert))?;
        Ok(signer.sign(&self.build(), &self.assertion_id)?)
    }

    /// Renders the Response with the assertion signed by the ECDSA identity provider.
    pub fn ec_signed(&self) -> anyhow::Result<String> {
        let signer = XmlSigner::from_pem(EC_KEY, Some(EC_CERT))?
            .with_config(SignatureConfig::with_algorithm(SignatureAlgorithm::EcdsaSha256));
        Ok(signer.sign(&self.build(), &self.assertion_id)?)
    }

    /// Renders the Response signed at the Response level.
    pub fn response_signed(&self) -> anyhow::Result<String> {
        let signer = XmlSigner::from_pem(IDP_KEY, Some(IDP_CERT))?;
        Ok(signer.sign(&self.build(), &self.response_id)?)
    }
}
