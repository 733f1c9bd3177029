use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Export the audit logs of a Harbor instance to audit_logs.csv
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Hostname or IP of Harbor instance
    #[arg(long, default_value = "10.202.250.197")]
    hostname: String,

    /// Username of Harbor instance
    #[arg(long, default_value = "admin")]
    username: String,

    /// Password of Harbor instance
    #[arg(long, default_value = "Harbor12345")]
    password: String,

    /// Query string to filter audit logs, such as: operation=delete,resource=~nginx,username=admin
    #[arg(long, default_value = "")]
    q: String,

    /// Accept self-signed or otherwise invalid certificates
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    insecure_skip_verify: bool,

    /// PEM encoded CA certificate to trust
    #[arg(long)]
    ca_cert: Option<std::path::PathBuf>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn client(&self) -> audit_log_export::Result<audit_log_export::Client> {
        if self.hostname.is_empty() {
            return Err(audit_log_export::Error::config("Hostname is required"));
        }

        let mut builder = audit_log_export::Client::builder();
        if self.insecure_skip_verify {
            builder = builder.danger_accept_invalid_certs();
        }
        if let Some(ca_cert) = &self.ca_cert {
            builder = builder.add_root_certificate(&std::fs::read(ca_cert)?)?;
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(std::time::Duration::from_secs(timeout));
        }

        builder.build(
            &format!("https://{}", self.hostname),
            &self.username,
            &self.password,
        )
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = cli.client()?;

    let count = audit_log_export::export_audit_logs(
        &client,
        &cli.q,
        audit_log_export::exporter::OUTPUT_FILE,
    )
    .await
    .context("export audit logs")?;
    tracing::info!(
        "wrote {} audit logs to {}",
        count,
        audit_log_export::exporter::OUTPUT_FILE
    );

    Ok(())
}
