//! Notifier configuration document.
//!
//! ```yaml
//! apiVersion: cloud-build-notifiers/v1
//! kind: GitHubIssuesNotifier
//! metadata:
//!   name: widgets-failures
//! spec:
//!   notification:
//!     filter: build.status == "FAILURE"
//!     params:
//!       branch: $(build.substitutions.BRANCH_NAME)
//!     delivery:
//!       githubRepo: acme/widgets
//!       githubToken:
//!         secretRef: github-token
//!     template:
//!       type: jinja
//!       uri: issue.json.j2
//!   secrets:
//!     - name: github-token
//!       value: env:GITHUB_TOKEN
//! ```
//!
//! Parsing and validation are pure; reading the template file and fetching
//! the secret are left to the host.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{RepositoryId, SecretRef, SetupError};

/// Accepted `apiVersion`.
pub const API_VERSION: &str = "cloud-build-notifiers/v1";
/// Accepted `kind`.
pub const NOTIFIER_KIND: &str = "GitHubIssuesNotifier";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifierDocument {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub spec: NotifierSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotifierSpec {
    pub notification: NotificationSpec,
    #[serde(default)]
    pub secrets: Vec<SecretSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationSpec {
    /// Filter expression; empty accepts every event.
    #[serde(default)]
    pub filter: String,
    /// Template bindings, resolved per event by [`crate::ParamBindingResolver`].
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    pub delivery: DeliverySpec,
    #[serde(default)]
    pub template: Option<TemplateSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySpec {
    #[serde(default)]
    pub github_repo: Option<String>,
    #[serde(default)]
    pub github_token: Option<SecretRefSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretRefSpec {
    pub secret_ref: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateSpec {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A named secret and the resource the host's secret store resolves.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SecretSpec {
    pub name: String,
    pub value: String,
}

/// Where the issue template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Inline(String),
    /// Location for the host to load (file path or `file://` URI).
    Uri(String),
}

impl NotifierDocument {
    /// Parses and validates a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, SetupError> {
        let document: Self = serde_yaml::from_str(text).map_err(SetupError::Document)?;
        document.validate()?;
        Ok(document)
    }

    fn validate(&self) -> Result<(), SetupError> {
        if self.api_version != API_VERSION {
            return Err(SetupError::UnsupportedDocument {
                expected: API_VERSION,
                found: self.api_version.clone(),
            });
        }
        if self.kind != NOTIFIER_KIND {
            return Err(SetupError::UnsupportedDocument {
                expected: NOTIFIER_KIND,
                found: self.kind.clone(),
            });
        }
        self.repository()?;
        self.token_secret_resource()?;
        self.template_source()?;
        Ok(())
    }

    /// `spec.notification.delivery.githubRepo`.
    pub fn repository(&self) -> Result<RepositoryId, SetupError> {
        let slug = self
            .spec
            .notification
            .delivery
            .github_repo
            .as_deref()
            .ok_or_else(|| SetupError::InvalidField {
                field: "githubRepo",
                message: "expected delivery config to have string field `githubRepo`".into(),
            })?;
        RepositoryId::parse(slug).ok_or_else(|| SetupError::InvalidField {
            field: "githubRepo",
            message: format!("{slug:?} is not an owner/name slug"),
        })
    }

    /// `spec.notification.delivery.githubToken.secretRef`.
    pub fn token_secret_ref(&self) -> Result<SecretRef, SetupError> {
        self.spec
            .notification
            .delivery
            .github_token
            .as_ref()
            .and_then(|token| SecretRef::new(token.secret_ref.trim()))
            .ok_or_else(|| SetupError::InvalidField {
                field: "githubToken",
                message: "expected delivery config to have `githubToken.secretRef`".into(),
            })
    }

    /// Secret store resource for the token secret reference.
    pub fn token_secret_resource(&self) -> Result<&str, SetupError> {
        let secret_ref = self.token_secret_ref()?;
        self.spec
            .secrets
            .iter()
            .find(|secret| secret.name == secret_ref.as_str())
            .map(|secret| secret.value.as_str())
            .ok_or_else(|| SetupError::SecretNotDeclared {
                secret_ref: secret_ref.to_string(),
            })
    }

    /// `spec.notification.template`; inline content wins over a URI.
    pub fn template_source(&self) -> Result<TemplateSource, SetupError> {
        let template = self
            .spec
            .notification
            .template
            .as_ref()
            .ok_or_else(|| SetupError::InvalidField {
                field: "template",
                message: "expected notification config to have a `template`".into(),
            })?;
        if let Some(content) = template.content.as_ref().filter(|c| !c.trim().is_empty()) {
            return Ok(TemplateSource::Inline(content.clone()));
        }
        template
            .uri
            .as_ref()
            .filter(|uri| !uri.trim().is_empty())
            .map(|uri| TemplateSource::Uri(uri.trim().to_string()))
            .ok_or_else(|| SetupError::InvalidField {
                field: "template",
                message: "template needs either `content` or `uri`".into(),
            })
    }
}
