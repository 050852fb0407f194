//! Operator check for the local inference service.
//!
//! Prints the connection status, then classifies either a JSON file of
//! emails given as the first argument or a built-in sample. Exits non-zero
//! when the service is unreachable or the run fails.

use std::process::ExitCode;
use std::{env, fs};

use classifier::{Classifier, ClassifierConfig, EmailRecord};
use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_ansi(false))
        .init();

    let config = match env::var("SLM_CONFIG") {
        Ok(path) => ClassifierConfig::from_file(&path)?,
        Err(_) => ClassifierConfig::default(),
    };

    let classifier = Classifier::new(config)?;

    let status = classifier.client().connection_status().await;
    println!("{}", serde_json::to_string_pretty(&status)?);

    if !status.reachable {
        eprintln!("Inference service is not reachable. Start it and retry.");
        return Ok(ExitCode::FAILURE);
    }

    let emails: Vec<EmailRecord> = match env::args().nth(1) {
        Some(path) => serde_json::from_str(&fs::read_to_string(&path)?)?,
        None => vec![sample_email()],
    };

    match classifier.classify(&emails).await {
        Ok(results) => {
            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Classification failed: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn sample_email() -> EmailRecord {
    EmailRecord {
        subject: "Your application to Initech".to_string(),
        sender: "recruiting@initech.com".to_string(),
        body: "Hi, thanks for applying to the Platform Engineer role. \
               We'd like to schedule a phone screen next week."
            .to_string(),
    }
}
