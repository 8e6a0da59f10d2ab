use anyhow::{Context, Result};
use console::style;
use harcap_core::capture::{CaptureTypeSet, HarRecorder};
use harcap_core::har::{Har, HarWriter};
use harcap_proxy::{CertificateAuthority, ProxyServer};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ProxyOptions {
    pub port: u16,
    pub output: PathBuf,
    /// Comma separated capture type names
    pub capture_types: Option<String>,
    pub cert: Option<PathBuf>,
    pub key: Option<PathBuf>,
    pub page_ref: Option<String>,
    pub page_title: Option<String>,
}

/// A recorder configured from the options. Fails on unknown capture types
/// before anything else happens.
pub fn build_recorder(options: &ProxyOptions) -> Result<HarRecorder> {
    let capture_types = match &options.capture_types {
        Some(list) => CaptureTypeSet::parse(list)
            .with_context(|| format!("Invalid --capture-types '{}'", list))?,
        None => CaptureTypeSet::new(),
    };
    tracing::info!("Capture types: {}", capture_types);

    let recorder = HarRecorder::with_capture_types(capture_types);
    if options.page_ref.is_some() || options.page_title.is_some() {
        recorder.new_document(options.page_ref.as_deref(), options.page_title.as_deref());
    }

    Ok(recorder)
}

pub fn execute(options: &ProxyOptions) -> Result<()> {
    let recorder = Arc::new(build_recorder(options)?);
    let ca = load_ca(options.cert.as_deref(), options.key.as_deref())?;

    let server = ProxyServer::new(options.port, ca, Arc::clone(&recorder));
    let addr = server.addr();

    println!("{} {}", style("Output:").bold(), options.output.display());
    println!();
    println!("Configure your browser or application to use this proxy:");
    println!("  HTTP Proxy:  {}", addr);
    println!("  HTTPS Proxy: {}", addr);
    println!();
    println!("Press Ctrl+C to stop capturing and write the HAR file...");
    println!();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.run(harcap_proxy::ctrl_c()))?;

    println!();
    println!("{}", style("Proxy stopped").bold());

    let har = recorder.end_document().unwrap_or_else(Har::empty);
    write_har(&har, &options.output)
}

/// Write the final document, reporting what was captured
pub fn write_har(har: &Har, output: &Path) -> Result<()> {
    HarWriter::to_file(har, output)
        .with_context(|| format!("Failed to write HAR to {}", output.display()))?;

    let failed = har
        .log
        .entries
        .iter()
        .filter(|e| e.response.error_message.is_some())
        .count();

    println!(
        "Captured {} requests across {} pages ({} without a response)",
        style(har.log.entries.len()).cyan(),
        har.log.pages.len(),
        failed
    );
    println!("{} {}", style("HAR file written to:").green(), output.display());

    Ok(())
}

fn load_ca(cert: Option<&Path>, key: Option<&Path>) -> Result<CertificateAuthority> {
    if let (Some(cert), Some(key)) = (cert, key) {
        tracing::info!("Loading CA certificate from {}", cert.display());
        return CertificateAuthority::load_from_pem(cert, key)
            .with_context(|| format!("Failed to load CA certificate {}", cert.display()));
    }

    let (cert_path, key_path) = CertificateAuthority::default_paths()?;
    let (ca, generated) = CertificateAuthority::load_or_generate(&cert_path, &key_path)?;

    if generated {
        println!("New CA certificate generated and saved to:");
        println!("   Certificate: {}", cert_path.display());
        println!("   Private Key: {}", key_path.display());
        println!();
        println!(
            "{}",
            style("Install this certificate in your trust store to capture HTTPS traffic.")
                .yellow()
        );
        println!();
    }

    Ok(ca)
}
