use crate::{Error, Result};
use hudsucker::certificate_authority::RcgenAuthority;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair,
    KeyUsagePurpose,
};
use rustls::crypto::aws_lc_rs::default_provider;
use std::fs;
use std::path::{Path, PathBuf};

/// Leaf certificates kept by the proxy between connections
const LEAF_CACHE_SIZE: u64 = 1_000;

/// CA certificate used to sign the per-host certificates of intercepted HTTPS
/// connections
pub struct CertificateAuthority {
    cert_pem: String,
    key_pem: String,
}

impl CertificateAuthority {
    pub fn generate() -> Result<Self> {
        tracing::info!("Generating new harcap CA certificate");

        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, "harcap Capture Proxy CA");
        dn.push(DnType::OrganizationName, "harcap");

        let mut params = CertificateParams::default();
        params.distinguished_name = dn;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];

        let key_pair = KeyPair::generate()
            .map_err(|e| Error::Certificate(format!("Failed to generate key pair: {}", e)))?;
        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| Error::Certificate(format!("Failed to generate CA certificate: {}", e)))?;

        Ok(Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
        })
    }

    pub fn load_from_pem(cert_path: &Path, key_path: &Path) -> Result<Self> {
        tracing::debug!("Loading CA certificate from {}", cert_path.display());

        Ok(Self {
            cert_pem: fs::read_to_string(cert_path)?,
            key_pem: fs::read_to_string(key_path)?,
        })
    }

    pub fn save_to_pem(&self, cert_path: &Path, key_path: &Path) -> Result<()> {
        for parent in [cert_path.parent(), key_path.parent()].into_iter().flatten() {
            fs::create_dir_all(parent)?;
        }

        fs::write(cert_path, &self.cert_pem)?;
        fs::write(key_path, &self.key_pem)?;

        tracing::info!("Saved CA certificate to {}", cert_path.display());
        Ok(())
    }

    pub fn cert_pem(&self) -> &str {
        &self.cert_pem
    }

    pub fn key_pem(&self) -> &str {
        &self.key_pem
    }

    /// `~/.harcap/ca.crt` and `~/.harcap/ca.key`
    pub fn default_paths() -> Result<(PathBuf, PathBuf)> {
        let home = dirs::home_dir().ok_or(Error::NoHomeDir)?;

        let dir = home.join(".harcap");
        Ok((dir.join("ca.crt"), dir.join("ca.key")))
    }

    /// Load the CA stored at the given paths, generating and saving a new one
    /// when either file is missing. The flag tells whether it was generated.
    pub fn load_or_generate(cert_path: &Path, key_path: &Path) -> Result<(Self, bool)> {
        if cert_path.exists() && key_path.exists() {
            return Ok((Self::load_from_pem(cert_path, key_path)?, false));
        }

        tracing::info!("No CA certificate at {}", cert_path.display());
        let ca = Self::generate()?;
        ca.save_to_pem(cert_path, key_path)?;
        Ok((ca, true))
    }

    /// The signing authority handed to the proxy
    pub fn to_authority(&self) -> Result<RcgenAuthority> {
        let key_pair = KeyPair::from_pem(&self.key_pem)
            .map_err(|e| Error::Certificate(format!("Failed to parse private key: {}", e)))?;
        let issuer = Issuer::from_ca_cert_pem(&self.cert_pem, key_pair)
            .map_err(|e| Error::Certificate(format!("Failed to parse CA certificate: {}", e)))?;

        Ok(RcgenAuthority::new(issuer, LEAF_CACHE_SIZE, default_provider()))
    }
}
