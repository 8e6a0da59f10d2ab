//! Intercepting proxy that feeds the harcap capture engine

pub mod cert;
pub mod error;
pub mod handler;
pub mod server;

pub use cert::CertificateAuthority;
pub use error::{Error, Result};
pub use handler::{HarCaptureHandler, classify_upstream_error};
pub use server::{ProxyServer, ctrl_c};
