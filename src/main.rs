//! kubecheck: monitoring checks for Kubernetes clusters

mod cli;
mod handler;

use chrono::Utc;
use clap::Parser;
use cli::{Cli, Command};
use color_eyre::Result;
use kubecheck_client::{ConnectionOptions, KubeClient, SystemResolver};
use kubecheck_core::{QueryError, Status, Verdict, run_check};
use std::fs::File;
use std::path::Path;
use tracing::Level;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, prelude::*};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    color_eyre::install()?;
    init_logging(cli.debug, cli.log_file.as_deref())?;

    // kube pulls in rustls, pick the ring provider explicitly
    let _ = rustls::crypto::ring::default_provider().install_default();

    let options = ConnectionOptions::from(cli.connection);

    if let Command::DeletePod { name, namespace } = &cli.command {
        println!("{}", delete_pod(&options, name.clone(), namespace).await);
        return Ok(());
    }

    let check = cli.command.check_name();
    let verdict = run_command(&cli.command, &options).await;
    println!("{}", verdict.render(check));
    std::process::exit(verdict.status.exit_code());
}

/// Log to stderr, or to `log_file` when given. Stdout carries the check
/// result only.
fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    // Quiet down the HTTP stack underneath kube
    let filter = if debug {
        EnvFilter::from_default_env()
            .add_directive(Level::DEBUG.into())
            .add_directive("hyper=info".parse()?)
            .add_directive("hyper_util=info".parse()?)
            .add_directive("tower=info".parse()?)
            .add_directive("rustls=info".parse()?)
            .add_directive("kube_client=info".parse()?)
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    let (writer, ansi) = match log_file {
        Some(path) => (BoxMakeWriter::new(File::create(path)?), false),
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(false),
        )
        .with(filter)
        .init();
    Ok(())
}

async fn run_command(command: &Command, options: &ConnectionOptions) -> Verdict {
    let client = match KubeClient::connect(options).await {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("{}", e);
            return Verdict::new(Status::Critical, e.to_string());
        }
    };

    if let Command::ApiserverAvailable = command {
        return apiserver_verdict(client.healthz().await);
    }

    let Some(config) = command.check_config() else {
        return Verdict::new(Status::Unknown, "Not a resource check");
    };
    let namespace = match options.namespace() {
        Ok(namespace) => namespace,
        Err(e) => return Verdict::new(Status::Critical, e.to_string()),
    };
    let config = config.with_namespace(namespace);
    tracing::debug!("Running {:?}", config);

    run_check(&client, &SystemResolver, &config, Utc::now()).await
}

fn apiserver_verdict(result: Result<String, QueryError>) -> Verdict {
    match result {
        Ok(_) => Verdict::ok("Kubernetes API server is available"),
        Err(QueryError::Connection(e)) => {
            tracing::warn!("Health probe failed: {}", e);
            Verdict::new(Status::Warning, "Host is unavailable")
        }
        Err(e) => Verdict::new(
            Status::Critical,
            format!("Kubernetes API server is unavailable: {}", e),
        ),
    }
}

async fn delete_pod(options: &ConnectionOptions, name: Option<String>, namespace: &str) -> String {
    let name = match handler::resolve_pod_name(name) {
        Ok(name) => name,
        Err(e) => return format!("No pod to delete: {}", e),
    };
    match KubeClient::connect(options).await {
        Ok(client) => handler::delete_pod(&client, &name, namespace).await,
        Err(e) => format!("Unable to delete pod {}/{}: {}", namespace, name, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apiserver_available() {
        let verdict = apiserver_verdict(Ok("ok".to_string()));
        assert_eq!(verdict.status, Status::Ok);
        assert_eq!(
            verdict.render("ApiServerAvailable"),
            "ApiServerAvailable OK: Kubernetes API server is available"
        );
    }

    #[test]
    fn test_apiserver_unreachable_is_warning() {
        let verdict = apiserver_verdict(Err(QueryError::Connection("refused".to_string())));
        assert_eq!(verdict.status, Status::Warning);
        assert_eq!(verdict.message, "Host is unavailable");
    }

    #[test]
    fn test_apiserver_rejection_is_critical() {
        let verdict = apiserver_verdict(Err(QueryError::Api {
            code: 500,
            message: "etcd failed".to_string(),
        }));
        assert_eq!(verdict.status, Status::Critical);
        assert_eq!(verdict.status.exit_code(), 2);
    }
}
