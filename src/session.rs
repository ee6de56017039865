//! A thin Keystone v3 session: password auth, service catalog lookup and
//! token-authenticated JSON requests.
//!
//! This is deliberately the smallest useful subset of what keystoneauth does
//! for the original checks: one auth method, one token per process, no
//! re-authentication and no retries.

use std::path::PathBuf;
use std::time::Instant;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::ProbeError;

const TOKEN_HEADER: &str = "X-Auth-Token";

/// The OpenStack connection flags shared by every check. Each falls back to
/// the conventional `OS_*` environment variable, so an existing
/// `openrc`-sourced shell works unchanged.
#[derive(Debug, clap::Args)]
pub struct SessionArgs {
    /// Keystone endpoint, including the version path, e.g. https://keystone:5000/v3
    #[arg(long, env = "OS_AUTH_URL", value_name = "URL")]
    pub os_auth_url: String,

    #[arg(long, env = "OS_USERNAME", value_name = "NAME")]
    pub os_username: String,

    #[arg(long, env = "OS_PASSWORD", value_name = "SECRET", hide_env_values = true)]
    pub os_password: String,

    #[arg(long, env = "OS_PROJECT_NAME", value_name = "NAME")]
    pub os_project_name: String,

    #[arg(long, env = "OS_USER_DOMAIN_NAME", value_name = "NAME", default_value = "Default")]
    pub os_user_domain_name: String,

    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME", value_name = "NAME", default_value = "Default")]
    pub os_project_domain_name: String,

    /// Restrict catalog lookups to this region.
    #[arg(long, env = "OS_REGION_NAME", value_name = "REGION")]
    pub os_region_name: Option<String>,

    #[arg(long, env = "OS_INTERFACE", value_enum, default_value = "public")]
    pub os_interface: Interface,

    /// Skip the catalog and talk to this service URL directly.
    #[arg(long, env = "OS_ENDPOINT_OVERRIDE", value_name = "URL")]
    pub os_endpoint_override: Option<String>,

    /// PEM bundle to trust in addition to the system roots.
    #[arg(long, env = "OS_CACERT", value_name = "FILE")]
    pub os_cacert: Option<PathBuf>,

    /// Do not verify TLS certificates.
    #[arg(long)]
    pub insecure: bool,

    /// HTTP timeout in seconds, passed through to every request.
    #[arg(long, value_name = "SECONDS", default_value_t = 10)]
    pub timeout: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Interface {
    Public,
    Internal,
    Admin,
}

impl Interface {
    fn as_str(self) -> &'static str {
        match self {
            Interface::Public => "public",
            Interface::Internal => "internal",
            Interface::Admin => "admin",
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenDocument {
    token: TokenBody,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    #[serde(default)]
    catalog: Vec<CatalogService>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogService {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CatalogEndpoint {
    pub interface: String,
    #[serde(default)]
    pub region: Option<String>,
    pub url: String,
}

/// An authenticated connection to one OpenStack cloud.
pub struct Session {
    http: reqwest::blocking::Client,
    token: String,
    catalog: Vec<CatalogService>,
    auth_url: String,
    auth_seconds: f64,
    interface: Interface,
    region: Option<String>,
    endpoint_override: Option<String>,
}

impl Session {
    /// Authenticate against Keystone with the password method.
    ///
    /// The elapsed wall time of the token request is recorded for
    /// check-keystone-token.
    pub fn connect(args: &SessionArgs) -> Result<Session, ProbeError> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(args.timeout));
        if args.insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &args.os_cacert {
            let pem = std::fs::read(path).map_err(|source| ProbeError::CaBundle {
                path: path.display().to_string(),
                source,
            })?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        let http = builder.build()?;

        let auth_url = args.os_auth_url.trim_end_matches('/').to_owned();
        let url = format!("{}/auth/tokens", auth_url);
        debug!(%url, user = %args.os_username, "requesting token");

        let started = Instant::now();
        let response = http.post(&url).json(&auth_payload(args)).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Auth(format!(
                "keystone returned {} for {}",
                status, url
            )));
        }

        let token = response
            .headers()
            .get("x-subject-token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| ProbeError::Auth("no X-Subject-Token in response".to_owned()))?;
        let document: TokenDocument = response.json()?;
        let auth_seconds = started.elapsed().as_secs_f64();
        info!(seconds = auth_seconds, "authenticated");

        Ok(Session {
            http,
            token,
            catalog: document.token.catalog,
            auth_url,
            auth_seconds,
            interface: args.os_interface,
            region: args.os_region_name.clone(),
            endpoint_override: args.os_endpoint_override.clone(),
        })
    }

    /// How long the token request took, in seconds.
    pub fn auth_seconds(&self) -> f64 {
        self.auth_seconds
    }

    /// The normalized Keystone URL the session authenticated against.
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Resolve the base URL for a service type, honoring the endpoint
    /// override, the selected interface and the region filter.
    pub fn endpoint(&self, service_type: &str) -> Result<String, ProbeError> {
        if let Some(url) = &self.endpoint_override {
            return Ok(url.trim_end_matches('/').to_owned());
        }

        select_endpoint(
            &self.catalog,
            service_type,
            self.interface,
            self.region.as_deref(),
        )
        .ok_or_else(|| {
            ProbeError::Endpoint(format!(
                "no {} endpoint for interface {}{} in the service catalog",
                service_type,
                self.interface.as_str(),
                self.region
                    .as_deref()
                    .map(|r| format!(", region {}", r))
                    .unwrap_or_default(),
            ))
        })
    }

    pub fn get_json(&self, url: &str) -> Result<serde_json::Value, ProbeError> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }

    pub fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProbeError> {
        debug!(%url, "POST");
        let response = self
            .http
            .post(url)
            .header(TOKEN_HEADER, &self.token)
            .json(body)
            .send()?
            .error_for_status()?;
        Ok(response.json()?)
    }
}

fn auth_payload(args: &SessionArgs) -> serde_json::Value {
    json!({
        "auth": {
            "identity": {
                "methods": ["password"],
                "password": {
                    "user": {
                        "name": args.os_username,
                        "domain": { "name": args.os_user_domain_name },
                        "password": args.os_password,
                    }
                }
            },
            "scope": {
                "project": {
                    "name": args.os_project_name,
                    "domain": { "name": args.os_project_domain_name },
                }
            }
        }
    })
}

fn select_endpoint(
    catalog: &[CatalogService],
    service_type: &str,
    interface: Interface,
    region: Option<&str>,
) -> Option<String> {
    catalog
        .iter()
        .filter(|service| service.service_type == service_type)
        .flat_map(|service| &service.endpoints)
        .find(|endpoint| {
            endpoint.interface == interface.as_str()
                && region.map_or(true, |r| endpoint.region.as_deref() == Some(r))
        })
        .map(|endpoint| endpoint.url.trim_end_matches('/').to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<CatalogService> {
        serde_json::from_value(serde_json::json!([
            {
                "type": "metric",
                "name": "gnocchi",
                "endpoints": [
                    { "interface": "public", "region": "RegionOne", "url": "https://gnocchi.example/" },
                    { "interface": "internal", "region": "RegionOne", "url": "http://10.0.0.5:8041" },
                ]
            },
            {
                "type": "network",
                "name": "neutron",
                "endpoints": [
                    { "interface": "public", "region": "RegionTwo", "url": "https://neutron.example:9696" },
                ]
            }
        ]))
        .unwrap()
    }

    #[test]
    fn test_select_by_type_and_interface() {
        let url = select_endpoint(&catalog(), "metric", Interface::Internal, None).unwrap();
        assert_eq!(url, "http://10.0.0.5:8041");
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let url = select_endpoint(&catalog(), "metric", Interface::Public, None).unwrap();
        assert_eq!(url, "https://gnocchi.example");
    }

    #[test]
    fn test_region_filter() {
        assert!(select_endpoint(&catalog(), "network", Interface::Public, Some("RegionOne")).is_none());
        assert!(select_endpoint(&catalog(), "network", Interface::Public, Some("RegionTwo")).is_some());
    }

    #[test]
    fn test_unknown_service() {
        assert!(select_endpoint(&catalog(), "baremetal", Interface::Public, None).is_none());
    }

    #[test]
    fn test_auth_payload_shape() {
        let args = SessionArgs {
            os_auth_url: "https://keystone:5000/v3/".into(),
            os_username: "monitor".into(),
            os_password: "hunter2".into(),
            os_project_name: "ops".into(),
            os_user_domain_name: "Default".into(),
            os_project_domain_name: "Default".into(),
            os_region_name: None,
            os_interface: Interface::Public,
            os_endpoint_override: None,
            os_cacert: None,
            insecure: false,
            timeout: 10,
        };
        let payload = auth_payload(&args);
        assert_eq!(payload["auth"]["identity"]["methods"][0], "password");
        assert_eq!(
            payload["auth"]["identity"]["password"]["user"]["name"],
            "monitor"
        );
        assert_eq!(payload["auth"]["scope"]["project"]["name"], "ops");
    }
}
